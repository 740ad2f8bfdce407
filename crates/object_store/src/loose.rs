//! One-file-per-object storage with two-level directory fanout.
//!
//! Publishing streams into a uniquely named temp file under a scratch
//! directory, `fsync`s it, then atomically renames it into place, treating a
//! racing `AlreadyExists` rename as the idempotent "someone else just
//! published the same content" case. Loose objects are always stored raw,
//! with no compression or encryption.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::codec::CHUNK_SIZE;
use crate::config::HashType;
use crate::error::{Error, Result};
use crate::hasher::new_hasher;

/// Loose-layout object store rooted at `<container>/loose`.
pub struct LooseStore {
    root: PathBuf,
    sandbox: PathBuf,
    prefix_len: usize,
    hash_type: HashType,
}

impl LooseStore {
    /// Open the loose store at `<container_root>/loose`, using
    /// `<container_root>/sandbox` for staging writes.
    pub fn open(container_root: &Path, prefix_len: usize, hash_type: HashType) -> Result<Self> {
        let root = container_root.join("loose");
        let sandbox = container_root.join("sandbox");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&sandbox)?;
        Ok(LooseStore { root, sandbox, prefix_len, hash_type })
    }

    fn dest_path(&self, hashkey: &str) -> PathBuf {
        let (shard, rest) = hashkey.split_at(self.prefix_len);
        self.root.join(shard).join(rest)
    }

    fn unique_sandbox_path(&self) -> PathBuf {
        let mut i: u64 = 0;
        loop {
            let candidate = self.sandbox.join(format!("{}-{}.tmp", std::process::id(), i));
            if !candidate.exists() {
                return candidate;
            }
            i = i.wrapping_add(1);
        }
    }

    /// Stream `source` into the loose layout, returning `(size, hashkey)`.
    /// Idempotent: writing the same bytes twice returns the same key and
    /// leaves exactly one file behind.
    pub fn insert(&self, mut source: impl Read) -> Result<(u64, String)> {
        let tmp_path = self.unique_sandbox_path();
        let mut hasher = new_hasher(self.hash_type);
        let mut size: u64 = 0;
        {
            let mut tmp = File::create(&tmp_path)?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                let n = source.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                tmp.write_all(&buf[..n])?;
                size += n as u64;
            }
            tmp.sync_all()?;
        }
        let hashkey = hasher.finalize();
        let dest = self.dest_path(&hashkey);

        if dest.exists() {
            fs::remove_file(&tmp_path)?;
            return Ok((size, hashkey));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::rename(&tmp_path, &dest) {
            Ok(()) => {}
            Err(e) if dest.exists() => {
                // Racing twin published first; our copy is redundant.
                let _ = fs::remove_file(&tmp_path);
                let _ = e;
            }
            Err(e) => return Err(Error::Io(e)),
        }
        Ok((size, hashkey))
    }

    /// Open a read handle for `hashkey`, or [`Error::NotFound`].
    pub fn open_read(&self, hashkey: &str) -> Result<File> {
        match File::open(self.dest_path(hashkey)) {
            Ok(f) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// True iff a loose file for `hashkey` exists.
    pub fn exists(&self, hashkey: &str) -> bool {
        self.dest_path(hashkey).exists()
    }

    /// Size in bytes of the loose file for `hashkey`, without reading its
    /// content.
    pub fn size(&self, hashkey: &str) -> Result<u64> {
        Ok(self.open_read(hashkey)?.metadata()?.len())
    }

    /// Copy the full object into `sink`.
    pub fn copy_to(&self, hashkey: &str, sink: &mut impl Write) -> Result<u64> {
        let mut f = self.open_read(hashkey)?;
        Ok(std::io::copy(&mut f, sink)?)
    }

    /// Read the full object into memory.
    pub fn read_to_vec(&self, hashkey: &str) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.copy_to(hashkey, &mut out)?;
        Ok(out)
    }

    /// Remove the loose file for `hashkey`; a no-op if already gone.
    pub fn delete(&self, hashkey: &str) -> Result<()> {
        match fs::remove_file(self.dest_path(hashkey)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Traverse the two-level fanout, yielding every loose hash key. Order
    /// is unspecified; each key appears at most once.
    pub fn iter_keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        if !self.root.exists() {
            return Ok(keys);
        }
        for shard_entry in fs::read_dir(&self.root)? {
            let shard_entry = shard_entry?;
            let shard_name = shard_entry.file_name();
            let Some(shard_name) = shard_name.to_str() else { continue };
            if shard_name.len() != self.prefix_len || !is_hex(shard_name) {
                continue;
            }
            if !shard_entry.path().is_dir() {
                continue;
            }
            for rest_entry in fs::read_dir(shard_entry.path())? {
                let rest_entry = rest_entry?;
                let Some(rest_name) = rest_entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                if !is_hex(&rest_name) {
                    continue;
                }
                keys.push(format!("{shard_name}{rest_name}"));
            }
        }
        Ok(keys)
    }
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix_len: usize) -> (tempfile::TempDir, LooseStore) {
        let dir = tempfile::tempdir().unwrap();
        let ls = LooseStore::open(dir.path(), prefix_len, HashType::Sha256).unwrap();
        (dir, ls)
    }

    #[test]
    fn insert_and_read_roundtrip() {
        let (_dir, ls) = store(2);
        let (size, key) = ls.insert(std::io::Cursor::new(b"hello")).unwrap();
        assert_eq!(size, 5);
        assert_eq!(ls.read_to_vec(&key).unwrap(), b"hello");
    }

    #[test]
    fn insert_is_idempotent() {
        let (_dir, ls) = store(2);
        let (_, k1) = ls.insert(std::io::Cursor::new(b"dup")).unwrap();
        let (_, k2) = ls.insert(std::io::Cursor::new(b"dup")).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(ls.iter_keys().unwrap().len(), 1);
    }

    #[test]
    fn missing_key_is_not_found() {
        let (_dir, ls) = store(2);
        let missing = "0".repeat(64);
        assert!(matches!(ls.open_read(&missing), Err(Error::NotFound)));
    }

    #[test]
    fn delete_then_iter_keys_is_empty() {
        let (_dir, ls) = store(2);
        let (_, key) = ls.insert(std::io::Cursor::new(b"x")).unwrap();
        ls.delete(&key).unwrap();
        ls.delete(&key).unwrap(); // tolerated
        assert!(ls.iter_keys().unwrap().is_empty());
    }
}
