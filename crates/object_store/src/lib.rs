//! Content-addressed object store (loose + packed layouts)
//!
//! Overview
//! - Content-addressable identity: the configured digest (SHA-256 by
//!   default) computed over an object's raw, uncompressed bytes.
//! - Two physical layouts: `loose` (one file per object, fanned out by a
//!   hex-prefix directory, for fast ingress) and `packed` (many objects
//!   concatenated into bounded-size pack files, indexed by a SQLite catalog,
//!   for bulk storage and efficient batched reads).
//! - Lookup precedence: loose is authoritative until an object's packed
//!   catalog row commits, after which either location is valid and the
//!   loose copy is pure cleanup (see `Packer::pack_all_loose`).
//! - Atomicity & durability: loose writes land via stage-then-rename;
//!   packed writes are `fsync`'d before their catalog transaction commits.
//! - Fail-closed: a pack read that would run past the end of its file, or a
//!   decode failure, is reported as `Error::Corrupt`, never silently
//!   truncated.
//!
//! Non-goals
//! - Mutating or deleting already-written objects.
//! - Cross-host distribution or replication.
//! - Authenticated/encrypted-at-rest storage.
//! - Secondary indexes beyond primary-key lookup.
//!
//! Usage example
//! ```rust
//! use object_store::Container;
//! let dir = tempfile::tempdir().unwrap();
//! let cnt = Container::init_container(dir.path(), 4 * 1024 * 1024 * 1024, "zlib:+1", "sha256", 2, false).unwrap();
//! let key = cnt.add_object(b"test").unwrap();
//! assert_eq!(key, "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08");
//! assert_eq!(cnt.get_object_content(&key).unwrap(), b"test");
//! ```

#![warn(missing_docs)]

mod catalog;
mod codec;
mod config;
mod container;
mod error;
mod hasher;
mod lock;
mod loose;
mod observer;
mod pack_reader;
mod pack_writer;
mod packer;

pub use catalog::PackedEntry;
pub use codec::CHUNK_SIZE;
pub use config::{CompressionAlgorithm, Config, HashType};
pub use container::{is_initialised, Container, StagedBatch};
pub use error::{Error, Result};
pub use hasher::digest_hex;
pub use observer::{observer, set_observer, Observer, ObserverSpan};
pub use pack_writer::CompressDecision;
pub use packer::{CompressMode, PackerOptions};
