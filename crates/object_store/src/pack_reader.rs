//! Random-access decode of packed objects, plus the batched read path that
//! sorts by `(pack_id, offset)` and streams sequentially per pack, since
//! sequential reads through a pack dominate random per-object reads.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::codec::Decoder;
use crate::error::{Error, Result};

/// Read-only access to `packs/<N>` files.
pub struct PackReader {
    packs_dir: PathBuf,
}

impl PackReader {
    /// Open the reader rooted at `<container_root>/packs`.
    pub fn open(container_root: &Path) -> Self {
        PackReader { packs_dir: container_root.join("packs") }
    }

    /// Read exactly `length` bytes at `offset` in pack `pack_id`, decoding
    /// if `compressed`.
    pub fn read(
        &self,
        pack_id: u64,
        offset: u64,
        length: u64,
        compressed: bool,
        compression_name: &str,
    ) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_to(pack_id, offset, length, compressed, compression_name, &mut out)?;
        Ok(out)
    }

    /// Like [`read`](Self::read), but streams into `sink` instead of
    /// materializing the whole object.
    pub fn copy_to(
        &self,
        pack_id: u64,
        offset: u64,
        length: u64,
        compressed: bool,
        compression_name: &str,
        sink: &mut impl std::io::Write,
    ) -> Result<()> {
        let path = self.packs_dir.join(pack_id.to_string());
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if offset.saturating_add(length) > file_len {
            return Err(Error::Corrupt(format!(
                "pack {pack_id} is shorter than catalog entry at offset {offset} length {length}"
            )));
        }
        file.seek(SeekFrom::Start(offset))?;
        let mut slice = file.take(length);

        if compressed {
            crate::codec::ensure_known_algorithm(compression_name)?;
            let mut dec = Decoder::new(slice);
            std::io::copy(&mut dec, sink)
                .map_err(|e| Error::Corrupt(format!("zlib decode failed: {e}")))?;
        } else {
            std::io::copy(&mut slice, sink)?;
        }
        Ok(())
    }

    /// One lookup request for the batched read path.
    pub fn batched_read(&self, requests: &[BatchedReadRequest]) -> Result<HashMap<String, Vec<u8>>> {
        let mut ordered: Vec<&BatchedReadRequest> = requests.iter().collect();
        ordered.sort_by_key(|r| (r.pack_id, r.offset));

        let mut out = HashMap::with_capacity(requests.len());
        let mut current: Option<(u64, File)> = None;
        for req in ordered {
            if current.as_ref().map(|(id, _)| *id) != Some(req.pack_id) {
                let path = self.packs_dir.join(req.pack_id.to_string());
                current = Some((req.pack_id, File::open(&path)?));
            }
            let (_, file) = current.as_mut().expect("just opened above");
            let file_len = file.metadata()?.len();
            if req.offset.saturating_add(req.length) > file_len {
                return Err(Error::Corrupt(format!(
                    "pack {} is shorter than catalog entry for {}",
                    req.pack_id, req.hashkey
                )));
            }
            file.seek(SeekFrom::Start(req.offset))?;
            let mut bytes = Vec::with_capacity(req.length as usize);
            let slice = file.take(req.length);
            if req.compressed {
                crate::codec::ensure_known_algorithm(&req.compression_name)?;
                let mut dec = Decoder::new(slice);
                dec.read_to_end(&mut bytes)
                    .map_err(|e| Error::Corrupt(format!("zlib decode failed: {e}")))?;
            } else {
                let mut slice = slice;
                slice.read_to_end(&mut bytes)?;
            }
            out.insert(req.hashkey.clone(), bytes);
        }
        Ok(out)
    }
}

/// One entry in a batched-read request list.
#[derive(Clone, Debug)]
pub struct BatchedReadRequest {
    /// Object identity, used as the result map's key.
    pub hashkey: String,
    /// Which pack file.
    pub pack_id: u64,
    /// Byte offset within that pack.
    pub offset: u64,
    /// Bytes to read.
    pub length: u64,
    /// Whether the stored bytes are compressed.
    pub compressed: bool,
    /// Codec name, if compressed.
    pub compression_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack_writer::{CompressDecision, PackWriter};
    use crate::config::HashType;

    #[test]
    fn read_past_eof_is_corrupt_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = PackWriter::open(dir.path(), 1 << 20, HashType::Sha256).unwrap();
        let r = w.append_stream(std::io::Cursor::new(b"hi"), CompressDecision::Raw).unwrap();
        w.sync().unwrap();

        let reader = PackReader::open(dir.path());
        let err = reader.read(r.pack_id, r.offset, r.length + 100, false, "").unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }

    #[test]
    fn batched_read_sorts_and_streams_per_pack() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = PackWriter::open(dir.path(), 1 << 20, HashType::Sha256).unwrap();
        let mut reqs = Vec::new();
        for i in 0..5 {
            let data = format!("object-{i}").into_bytes();
            let r = w.append_stream(std::io::Cursor::new(data.clone()), CompressDecision::Raw).unwrap();
            reqs.push((
                BatchedReadRequest {
                    hashkey: r.hashkey.clone(),
                    pack_id: r.pack_id,
                    offset: r.offset,
                    length: r.length,
                    compressed: false,
                    compression_name: String::new(),
                },
                data,
            ));
        }
        w.sync().unwrap();

        let reader = PackReader::open(dir.path());
        let requests: Vec<_> = reqs.iter().map(|(r, _)| r.clone()).collect();
        let results = reader.batched_read(&requests).unwrap();
        for (req, expected) in &reqs {
            assert_eq!(results.get(&req.hashkey).unwrap(), expected);
        }
    }
}
