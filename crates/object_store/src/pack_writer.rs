//! Append-only pack-file writer with size-target rollover. Many objects are
//! appended to one pack file, each remembering its own offset, rather than
//! one file per object.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::{Encoder, CHUNK_SIZE};
use crate::config::HashType;
use crate::error::Result;
use crate::hasher::new_hasher;

/// Per-object compression decision, resolved from a `CompressMode` policy
/// (possibly per-object, for `AUTO`) before the bytes are appended.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressDecision {
    /// Store the object's raw bytes.
    Raw,
    /// Store zlib-compressed bytes at the given level.
    Zlib {
        /// zlib compression level, 0-9.
        level: u32,
    },
}

/// The outcome of appending one object to a pack.
#[derive(Clone, Debug)]
pub struct AppendResult {
    /// Object identity.
    pub hashkey: String,
    /// Which pack file the bytes landed in.
    pub pack_id: u64,
    /// Byte offset within that pack.
    pub offset: u64,
    /// Bytes written (encoded length, if compressed).
    pub length: u64,
    /// Original uncompressed size.
    pub size: u64,
    /// Whether the bytes are compressed.
    pub compressed: bool,
    /// Codec name, or empty if uncompressed.
    pub compression_name: String,
}

/// Appends objects to `packs/<N>`, rolling over to `N+1` once the current
/// pack's post-write size would exceed `pack_size_target`.
pub struct PackWriter {
    packs_dir: PathBuf,
    pack_size_target: u64,
    hash_type: HashType,
    current_pack_id: u64,
    current_pack_size: u64,
    open_pack: Option<(u64, File)>,
}

impl PackWriter {
    /// Open the writer, scanning `packs/` for the largest existing `pack_id`
    /// and that file's current size.
    pub fn open(container_root: &Path, pack_size_target: u64, hash_type: HashType) -> Result<Self> {
        let packs_dir = container_root.join("packs");
        fs::create_dir_all(&packs_dir)?;

        let mut max_id: Option<u64> = None;
        for entry in fs::read_dir(&packs_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Ok(id) = name.parse::<u64>() {
                    max_id = Some(max_id.map_or(id, |m| m.max(id)));
                }
            }
        }
        let current_pack_id = max_id.unwrap_or(0);
        let current_pack_size = match fs::metadata(packs_dir.join(current_pack_id.to_string())) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        Ok(PackWriter {
            packs_dir,
            pack_size_target,
            hash_type,
            current_pack_id,
            current_pack_size,
            open_pack: None,
        })
    }

    /// Truncate pack `pack_id` down to `high_water_mark` bytes, discarding
    /// any dead tail left by a crash between append and catalog commit. Must
    /// be called before resuming writes to that pack.
    pub fn recover(&mut self, pack_id: u64, high_water_mark: u64) -> Result<()> {
        let path = self.packs_dir.join(pack_id.to_string());
        if let Ok(meta) = fs::metadata(&path) {
            if meta.len() > high_water_mark {
                let f = OpenOptions::new().write(true).open(&path)?;
                f.set_len(high_water_mark)?;
            }
        }
        if pack_id == self.current_pack_id {
            self.current_pack_size = high_water_mark;
        }
        Ok(())
    }

    fn ensure_pack_open(&mut self) -> Result<()> {
        if self.current_pack_size >= self.pack_size_target {
            self.current_pack_id += 1;
            self.current_pack_size = 0;
            self.open_pack = None;
            crate::observer::observer().pack_rolled_over(self.current_pack_id);
        }
        if self.open_pack.as_ref().map(|(id, _)| *id) != Some(self.current_pack_id) {
            let path = self.packs_dir.join(self.current_pack_id.to_string());
            let f = OpenOptions::new().create(true).append(true).open(&path)?;
            self.open_pack = Some((self.current_pack_id, f));
        }
        Ok(())
    }

    /// Append one object, tee'd through the hasher and (if requested)
    /// through the zlib encoder. The rollover decision is made before
    /// writing, so a single object larger than `pack_size_target` is still
    /// written whole into its own pack.
    pub fn append_stream(
        &mut self,
        mut source: impl Read,
        decision: CompressDecision,
    ) -> Result<AppendResult> {
        self.ensure_pack_open()?;
        let (pack_id, file) = self.open_pack.as_mut().expect("ensure_pack_open just set this");
        let offset = self.current_pack_size;

        let mut hasher = new_hasher(self.hash_type);
        let mut size: u64 = 0;
        let length;
        let compressed;
        let compression_name;

        match decision {
            CompressDecision::Raw => {
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    let n = source.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                    file.write_all(&buf[..n])?;
                    size += n as u64;
                }
                length = size;
                compressed = false;
                compression_name = String::new();
            }
            CompressDecision::Zlib { level } => {
                let mut enc = Encoder::new(CountingWriter::new(&mut *file), level);
                let mut buf = vec![0u8; CHUNK_SIZE];
                loop {
                    let n = source.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                    enc.write_all(&buf[..n])?;
                    size += n as u64;
                }
                let counting = enc.finish()?;
                length = counting.count;
                compressed = true;
                compression_name = "zlib".to_string();
            }
        }

        let hashkey = hasher.finalize();
        self.current_pack_size += length;

        Ok(AppendResult {
            hashkey,
            pack_id: *pack_id,
            offset,
            length,
            size,
            compressed,
            compression_name,
        })
    }

    /// Flush and `fsync` the currently open pack file. Must be called before
    /// the corresponding catalog transaction commits.
    pub fn sync(&mut self) -> Result<()> {
        if let Some((_, f)) = self.open_pack.as_mut() {
            f.flush()?;
            f.sync_all()?;
        }
        Ok(())
    }

    /// Release the held pack handle. Safe to call between batches to keep at
    /// most one output handle open at a time.
    pub fn close(&mut self) {
        self.open_pack = None;
    }

    /// The pack id a not-yet-written object would currently land in.
    pub fn current_pack_id(&self) -> u64 {
        self.current_pack_id
    }
}

/// Tees bytes through to an inner writer while counting how many were
/// written, so the encoder's caller learns the encoded length without a
/// second pass over the pack file.
struct CountingWriter<W: Write + Seek> {
    inner: W,
    count: u64,
}

impl<W: Write + Seek> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write + Seek> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write + Seek> Seek for CountingWriter<W> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.inner.seek(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack_reader::PackReader;

    #[test]
    fn append_then_read_back_raw() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = PackWriter::open(dir.path(), 1024 * 1024, HashType::Sha256).unwrap();
        let r1 = w
            .append_stream(std::io::Cursor::new(b"hello"), CompressDecision::Raw)
            .unwrap();
        let r2 = w
            .append_stream(std::io::Cursor::new(b"world!"), CompressDecision::Raw)
            .unwrap();
        w.sync().unwrap();
        assert_eq!(r1.offset, 0);
        assert_eq!(r2.offset, 5);

        let reader = PackReader::open(dir.path());
        assert_eq!(
            reader.read(r1.pack_id, r1.offset, r1.length, false, "").unwrap(),
            b"hello"
        );
        assert_eq!(
            reader.read(r2.pack_id, r2.offset, r2.length, false, "").unwrap(),
            b"world!"
        );
    }

    #[test]
    fn rollover_writes_to_new_pack_when_target_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = PackWriter::open(dir.path(), 10, HashType::Sha256).unwrap();
        let r1 = w
            .append_stream(std::io::Cursor::new(vec![b'a'; 20]), CompressDecision::Raw)
            .unwrap();
        let r2 = w
            .append_stream(std::io::Cursor::new(vec![b'b'; 5]), CompressDecision::Raw)
            .unwrap();
        w.sync().unwrap();
        // First object alone exceeds the target; it still lands whole in pack 0.
        assert_eq!(r1.pack_id, 0);
        assert_eq!(r1.offset, 0);
        // Next object rolls to pack 1 since pack 0 is already >= target.
        assert_eq!(r2.pack_id, 1);
        assert_eq!(r2.offset, 0);
    }

    #[test]
    fn compressed_append_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = PackWriter::open(dir.path(), 1024 * 1024, HashType::Sha256).unwrap();
        let data = b"compress me compress me compress me ".repeat(50);
        let r = w
            .append_stream(std::io::Cursor::new(data.clone()), CompressDecision::Zlib { level: 6 })
            .unwrap();
        w.sync().unwrap();
        assert!(r.compressed);
        assert_eq!(r.size, data.len() as u64);
        assert!(r.length < r.size);

        let reader = PackReader::open(dir.path());
        let got = reader
            .read(r.pack_id, r.offset, r.length, true, &r.compression_name)
            .unwrap();
        assert_eq!(got, data);
    }
}
