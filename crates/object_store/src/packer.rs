//! `pack_all_loose`: migrates every loose object into packs under a
//! compression policy, crash-safely.

use crate::catalog::{Catalog, NewEntry, PackedEntry};
use crate::config::{CompressionAlgorithm, HashType};
use crate::error::Result;
use crate::loose::LooseStore;
use crate::observer::observer;
use crate::pack_writer::{CompressDecision, PackWriter};

/// How many loose objects to fold into one pack-write + catalog-commit
/// batch. Amortizes pack-file and transaction overhead.
pub const DEFAULT_BATCH_SIZE: usize = 256;

/// Compression policy for a `pack_all_loose` run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompressMode {
    /// Never compress.
    No,
    /// Always compress with the container's default algorithm.
    Yes,
    /// Preserve prior state. Vacuous for loose objects (always uncompressed),
    /// so this behaves identically to `No`.
    Keep,
    /// Per-object heuristic: compress if it's worth it.
    Auto,
}

/// Options for a `pack_all_loose` run.
#[derive(Clone, Copy, Debug)]
pub struct PackerOptions {
    /// Re-hash each object's bytes as they're read from loose, to catch a
    /// loose file corrupted since it was written.
    pub validate_objects: bool,
    /// Fsync each pack file before its catalog transaction commits.
    pub fsync: bool,
    /// Loose objects per pack-write + catalog-commit batch.
    pub batch_size: usize,
}

impl Default for PackerOptions {
    fn default() -> Self {
        PackerOptions { validate_objects: true, fsync: true, batch_size: DEFAULT_BATCH_SIZE }
    }
}

fn resolve_decision(
    mode: CompressMode,
    algorithm: CompressionAlgorithm,
    sample: &[u8],
) -> Result<CompressDecision> {
    match mode {
        CompressMode::No | CompressMode::Keep => Ok(CompressDecision::Raw),
        CompressMode::Yes => Ok(CompressDecision::Zlib { level: algorithm.level }),
        CompressMode::Auto => {
            if crate::codec::auto_should_compress(sample, algorithm.level)? {
                Ok(CompressDecision::Zlib { level: algorithm.level })
            } else {
                Ok(CompressDecision::Raw)
            }
        }
    }
}

/// Migrates loose objects into packs. Holds no state of its own beyond what
/// it borrows for the duration of one `pack_all_loose` call.
pub struct Packer;

impl Packer {
    /// Run the migration: enumerate loose keys, process them in batches,
    /// fsync + commit each batch, then delete the loose copies it just
    /// packed.
    pub fn pack_all_loose(
        loose: &LooseStore,
        writer: &mut PackWriter,
        catalog: &mut Catalog,
        hash_type: HashType,
        algorithm: CompressionAlgorithm,
        mode: CompressMode,
        options: PackerOptions,
    ) -> Result<u64> {
        let keys = loose.iter_keys()?;
        let mut migrated: u64 = 0;

        for batch in keys.chunks(options.batch_size.max(1)) {
            let mut rows = Vec::with_capacity(batch.len());

            for hashkey in batch {
                let bytes = loose.read_to_vec(hashkey)?;
                if options.validate_objects {
                    let actual = crate::hasher::digest_hex(hash_type, &bytes);
                    if &actual != hashkey {
                        return Err(crate::error::Error::Corrupt(format!(
                            "loose object {hashkey} does not hash to its own name (got {actual})"
                        )));
                    }
                }
                let decision = resolve_decision(mode, algorithm, &bytes)?;
                let result = writer.append_stream(std::io::Cursor::new(bytes), decision)?;
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

            if options.fsync {
                writer.sync()?;
            }
            catalog.insert_many(&rows)?;

            for hashkey in batch {
                loose.delete(hashkey)?;
            }
            migrated += batch.len() as u64;
            observer().objects_migrated(batch.len() as u64);
        }

        writer.close();
        Ok(migrated)
    }
}
