//! Container configuration: the parameters fixed at `init_container` time and
//! persisted to the container's `config` file as JSON.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Digest algorithm used for object identity.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    /// SHA-256, 64 lowercase hex chars.
    Sha256,
}

impl HashType {
    /// Hex-string length produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            HashType::Sha256 => 64,
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(HashType::Sha256),
            other => Err(Error::Config(format!("unknown hash_type: {other}"))),
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashType::Sha256 => write!(f, "sha256"),
        }
    }
}

/// A parsed compression token: `<name>[(:|+)<level>]`.
///
/// Only `zlib` is recognized (spec grammar names no other algorithm). Both
/// `zlib+N` and `zlib:+N` are accepted on input; the canonical form written
/// back to `config` and the catalog is always `zlib:+N`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompressionAlgorithm {
    /// zlib compression level, 0-9.
    pub level: u32,
}

impl CompressionAlgorithm {
    /// Canonical string form, e.g. `zlib:+1`.
    pub fn canonical(&self) -> String {
        format!("zlib:+{}", self.level)
    }

    /// Parse either `zlib+N` or `zlib:+N`.
    pub fn parse(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("zlib:+")
            .or_else(|| s.strip_prefix("zlib+"))
            .ok_or_else(|| Error::Config(format!("unrecognized compression token: {s}")))?;
        let level: u32 = rest
            .parse()
            .map_err(|_| Error::Config(format!("bad compression level in token: {s}")))?;
        if level > 9 {
            return Err(Error::Config(format!("compression level out of range: {level}")));
        }
        Ok(CompressionAlgorithm { level })
    }
}

impl Serialize for CompressionAlgorithm {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for CompressionAlgorithm {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CompressionAlgorithm::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Current on-disk layout version. Bumped only if the layout changes.
pub const CONTAINER_VERSION: u32 = 1;

/// Container parameters, set once at `init_container` and immutable after.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Digest used for object identity.
    pub hash_type: HashType,
    /// Default codec + level for packed writes.
    pub compression_algorithm: CompressionAlgorithm,
    /// Soft upper bound (bytes) per pack file.
    pub pack_size_target: u64,
    /// Loose directory fanout depth, in hex chars.
    pub loose_prefix_len: usize,
    /// On-disk layout version.
    pub container_version: u32,
}

impl Config {
    /// Build a config from the init parameters, validating the compression
    /// token and hash type.
    pub fn new(
        pack_size_target: u64,
        compression_algorithm: &str,
        hash_type: &str,
        loose_prefix_len: usize,
    ) -> Result<Self> {
        if loose_prefix_len == 0 {
            return Err(Error::Config("loose_prefix_len must be >= 1".into()));
        }
        Ok(Config {
            hash_type: HashType::parse(hash_type)?,
            compression_algorithm: CompressionAlgorithm::parse(compression_algorithm)?,
            pack_size_target,
            loose_prefix_len,
            container_version: CONTAINER_VERSION,
        })
    }
}
