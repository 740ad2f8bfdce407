//! Public facade: lookup precedence, lifecycle, and size/count aggregations.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::catalog::{Catalog, NewEntry, PackedEntry};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::ContainerLock;
use crate::loose::LooseStore;
use crate::observer::observer;
use crate::pack_reader::{BatchedReadRequest, PackReader};
use crate::pack_writer::{CompressDecision, PackWriter};
use crate::packer::{CompressMode, Packer, PackerOptions};

/// A batch of pack appends whose catalog transaction has not yet committed.
/// Lets a caller stage pack bytes (durable on disk, `fsync`'d) without making
/// them visible to readers until [`commit`](Self::commit) is called.
pub struct StagedBatch<'a> {
    container: &'a Container,
    rows: Vec<NewEntry>,
    hashkeys: Vec<String>,
}

impl<'a> StagedBatch<'a> {
    /// Commit the staged rows to the catalog in one transaction. Returns the
    /// hash keys in the same order the inputs were appended.
    pub fn commit(self) -> Result<Vec<String>> {
        self.container.catalog.lock().expect("catalog lock poisoned").insert_many(&self.rows)?;
        Ok(self.hashkeys)
    }
}

/// The on-disk root directory holding `loose/`, `packs/`, `packs.idx`,
/// `sandbox/`, `config`, and `.lock`.
pub struct Container {
    root: PathBuf,
    config: Config,
    loose: LooseStore,
    catalog: Mutex<Catalog>,
    writer: Mutex<PackWriter>,
    reader: PackReader,
}

fn config_path(root: &Path) -> PathBuf {
    root.join("config")
}

/// True iff `root` holds a complete, consistent container: `config`,
/// `loose/`, `packs/`, and a readable catalog schema.
pub fn is_initialised(root: &Path) -> bool {
    if !config_path(root).exists() || !root.join("loose").is_dir() || !root.join("packs").is_dir()
    {
        return false;
    }
    Catalog::open(&root.join("packs.idx")).is_ok()
}

impl Container {
    /// Create the directory layout, write `config`, and initialize the
    /// catalog schema. Idempotent when parameters match an existing
    /// initialized container; `clear` destroys and recreates regardless.
    pub fn init_container(
        root: &Path,
        pack_size_target: u64,
        compression_algorithm: &str,
        hash_type: &str,
        loose_prefix_len: usize,
        clear: bool,
    ) -> Result<Container> {
        let config = Config::new(pack_size_target, compression_algorithm, hash_type, loose_prefix_len)?;

        if clear && root.exists() {
            fs::remove_dir_all(root)?;
        }
        fs::create_dir_all(root)?;

        if is_initialised(root) {
            let existing = Self::read_config(root)?;
            if existing.hash_type != config.hash_type
                || existing.compression_algorithm != config.compression_algorithm
                || existing.pack_size_target != config.pack_size_target
                || existing.loose_prefix_len != config.loose_prefix_len
            {
                return Err(Error::Config(
                    "init_container called with parameters that differ from the existing \
                     container; pass clear=true to reinitialize"
                        .into(),
                ));
            }
            return Container::open(root);
        }

        fs::write(config_path(root), serde_json::to_vec_pretty(&config)?)?;
        fs::create_dir_all(root.join("loose"))?;
        fs::create_dir_all(root.join("packs"))?;
        fs::create_dir_all(root.join("sandbox"))?;
        Catalog::open(&root.join("packs.idx"))?; // creates schema

        Container::open(root)
    }

    fn read_config(root: &Path) -> Result<Config> {
        let bytes = fs::read(config_path(root))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Config(format!("malformed config: {e}")))
    }

    /// Open an already-initialized container.
    pub fn open(root: &Path) -> Result<Container> {
        if !is_initialised(root) {
            return Err(Error::NotInitialised);
        }
        let config = Self::read_config(root)?;
        let loose = LooseStore::open(root, config.loose_prefix_len, config.hash_type)?;
        let catalog = Catalog::open(&root.join("packs.idx"))?;
        let mut writer = PackWriter::open(root, config.pack_size_target, config.hash_type)?;
        // A crash between `append_stream` and the following catalog commit
        // leaves dead tail bytes past the last committed offset; truncate
        // them before resuming writes.
        let hwm = catalog.pack_high_water_mark(writer.current_pack_id())?;
        writer.recover(writer.current_pack_id(), hwm)?;
        let reader = PackReader::open(root);
        Ok(Container {
            root: root.to_path_buf(),
            config,
            loose,
            catalog: Mutex::new(catalog),
            writer: Mutex::new(writer),
            reader,
        })
    }

    /// True iff this root is a complete, consistent container.
    pub fn is_initialised(&self) -> bool {
        is_initialised(&self.root)
    }

    /// The container's immutable configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> Result<ContainerLock> {
        ContainerLock::acquire(&self.root)
    }

    // ---- writes -------------------------------------------------------

    /// Store bytes in the loose layout, returning their hash key. Idempotent
    /// on duplicate content.
    pub fn add_object(&self, bytes: &[u8]) -> Result<String> {
        self.add_streamed_object(std::io::Cursor::new(bytes))
    }

    /// Stream an object into the loose layout, returning its hash key.
    pub fn add_streamed_object(&self, source: impl std::io::Read) -> Result<String> {
        let (size, key) = self.loose.insert(source)?;
        observer().object_added(size);
        Ok(key)
    }

    /// Append `bytes` directly to a pack and commit its catalog row,
    /// bypassing the loose layout entirely.
    pub fn add_object_to_packs(&self, bytes: &[u8], compress: bool) -> Result<String> {
        self.add_streamed_object_to_packs(std::io::Cursor::new(bytes), compress)
    }

    /// Streaming single-object variant of [`add_object_to_packs`](Self::add_object_to_packs).
    pub fn add_streamed_object_to_packs(
        &self,
        source: impl std::io::Read,
        compress: bool,
    ) -> Result<String> {
        let decision = if compress {
            CompressDecision::Zlib { level: self.config.compression_algorithm.level }
        } else {
            CompressDecision::Raw
        };
        let mut writer = self.writer.lock().expect("pack writer lock poisoned");
        let result = writer.append_stream(source, decision)?;
        writer.sync()?;
        drop(writer);

        observer().bytes_written(result.length);
        let row = NewEntry {
            hashkey: result.hashkey.clone(),
            entry: PackedEntry {
                pack_id: result.pack_id,
                offset: result.offset,
                length: result.length,
                size: result.size,
                compressed: result.compressed,
                compression_name: result.compression_name,
            },
        };
        self.catalog.lock().expect("catalog lock poisoned").insert_many(&[row])?;
        Ok(result.hashkey)
    }

    /// Pack a batch of in-memory objects in one pack-write + catalog
    /// transaction. Returns hash keys in the same order as `contents`; a
    /// duplicate within the batch is appended only once but still appears in
    /// the returned list.
    pub fn add_objects_to_pack(&self, contents: &[Vec<u8>], compress: bool) -> Result<Vec<String>> {
        self.add_objects_to_pack_staged(contents, compress)?.commit()
    }

    /// Like [`add_objects_to_pack`](Self::add_objects_to_pack), but returns a
    /// [`StagedBatch`] that must be explicitly committed — lets a caller
    /// exercise the path where pack bytes are durable but the catalog row is
    /// not yet visible.
    pub fn add_objects_to_pack_staged(
        &self,
        contents: &[Vec<u8>],
        compress: bool,
    ) -> Result<StagedBatch<'_>> {
        let decision = if compress {
            CompressDecision::Zlib { level: self.config.compression_algorithm.level }
        } else {
            CompressDecision::Raw
        };

        let mut writer = self.writer.lock().expect("pack writer lock poisoned");
        let mut rows = Vec::with_capacity(contents.len());
        let mut hashkeys = Vec::with_capacity(contents.len());
        let mut seen = std::collections::HashSet::new();

        for bytes in contents {
            let result = writer.append_stream(std::io::Cursor::new(bytes), decision)?;
            hashkeys.push(result.hashkey.clone());
            observer().bytes_written(result.length);
            if seen.insert(result.hashkey.clone()) {
                rows.push(NewEntry {
                    hashkey: result.hashkey.clone(),
                    entry: PackedEntry {
                        pack_id: result.pack_id,
                        offset: result.offset,
                        length: result.length,
                        size: result.size,
                        compressed: result.compressed,
                        compression_name: result.compression_name,
                    },
                });
            }
        }
        writer.sync()?;
        drop(writer);

        Ok(StagedBatch { container: self, rows, hashkeys })
    }

    // ---- reads ----------------------------------------------------------

    /// Loose-then-packed lookup.
    pub fn get_object_content(&self, hashkey: &str) -> Result<Vec<u8>> {
        if self.loose.exists(hashkey) {
            let bytes = self.loose.read_to_vec(hashkey)?;
            observer().bytes_read(bytes.len() as u64);
            return Ok(bytes);
        }
        let entry = self
            .catalog
            .lock()
            .expect("catalog lock poisoned")
            .lookup(hashkey)?
            .ok_or(Error::NotFound)?;
        let bytes = self.reader.read(
            entry.pack_id,
            entry.offset,
            entry.length,
            entry.compressed,
            &entry.compression_name,
        )?;
        observer().bytes_read(bytes.len() as u64);
        Ok(bytes)
    }

    /// Batched loose-then-packed lookup. Splits into loose-present and
    /// loose-absent in one pass, then issues a single catalog query and a
    /// batched, offset-sorted pack read for the rest.
    /// `skip_if_missing=false` includes absent keys as `None`.
    pub fn get_objects_content(
        &self,
        hashkeys: &[String],
        skip_if_missing: bool,
    ) -> Result<HashMap<String, Option<Vec<u8>>>> {
        let mut out = HashMap::with_capacity(hashkeys.len());
        let mut remaining = Vec::new();

        for key in hashkeys {
            if self.loose.exists(key) {
                let bytes = self.loose.read_to_vec(key)?;
                observer().bytes_read(bytes.len() as u64);
                out.insert(key.clone(), Some(bytes));
            } else {
                remaining.push(key.clone());
            }
        }

        if !remaining.is_empty() {
            let found = self.catalog.lock().expect("catalog lock poisoned").lookup_many(&remaining)?;
            let requests: Vec<BatchedReadRequest> = remaining
                .iter()
                .filter_map(|k| found.get(k).map(|e| (k, e)))
                .map(|(k, e)| BatchedReadRequest {
                    hashkey: k.clone(),
                    pack_id: e.pack_id,
                    offset: e.offset,
                    length: e.length,
                    compressed: e.compressed,
                    compression_name: e.compression_name.clone(),
                })
                .collect();
            let mut read_bytes: HashMap<String, Vec<u8>> = if requests.is_empty() {
                HashMap::new()
            } else {
                self.reader.batched_read(&requests)?
            };

            for key in &remaining {
                match read_bytes.remove(key) {
                    Some(bytes) => {
                        observer().bytes_read(bytes.len() as u64);
                        out.insert(key.clone(), Some(bytes));
                    }
                    None if skip_if_missing => {}
                    None => {
                        out.insert(key.clone(), None);
                    }
                }
            }
        }

        Ok(out)
    }

    /// Union of loose and packed keys, de-duplicated. Order is unspecified.
    pub fn list_all_objects(&self) -> Result<Vec<String>> {
        let mut keys: std::collections::HashSet<String> = self.loose.iter_keys()?.into_iter().collect();
        keys.extend(self.catalog.lock().expect("catalog lock poisoned").all_keys()?);
        Ok(keys.into_iter().collect())
    }

    /// `|loose files| + |catalog rows|`.
    pub fn count_objects(&self) -> Result<u64> {
        let loose = self.loose.iter_keys()?.len() as u64;
        let packed = self.catalog.lock().expect("catalog lock poisoned").count()?;
        Ok(loose + packed)
    }

    /// Sum of raw object sizes, loose and packed.
    pub fn get_total_size(&self) -> Result<u64> {
        let mut total: u64 = 0;
        for key in self.loose.iter_keys()? {
            total += self.loose.size(&key)?;
        }
        total += self.catalog.lock().expect("catalog lock poisoned").sum_size()?;
        Ok(total)
    }

    /// Number of pack files present.
    pub fn count_pack_file(&self) -> Result<u64> {
        let mut n = 0u64;
        for entry in fs::read_dir(self.root.join("packs"))? {
            let entry = entry?;
            if entry.file_name().to_str().is_some_and(|s| s.parse::<u64>().is_ok()) {
                n += 1;
            }
        }
        Ok(n)
    }

    // ---- migration --------------------------------------------------------

    /// Migrate every loose object into packs under `mode`, holding the
    /// container-wide advisory lock for the duration.
    pub fn pack_all_loose(&self, mode: CompressMode) -> Result<u64> {
        self.pack_all_loose_with(mode, PackerOptions::default())
    }

    /// Like [`pack_all_loose`](Self::pack_all_loose), with explicit control
    /// over the `validate_objects`/`fsync`/`batch_size` knobs.
    pub fn pack_all_loose_with(&self, mode: CompressMode, options: PackerOptions) -> Result<u64> {
        let _lock = self.lock()?;
        let mut writer = self.writer.lock().expect("pack writer lock poisoned");
        let mut catalog = self.catalog.lock().expect("catalog lock poisoned");
        Packer::pack_all_loose(
            &self.loose,
            &mut writer,
            &mut catalog,
            self.config.hash_type,
            self.config.compression_algorithm,
            mode,
            options,
        )
    }
}
