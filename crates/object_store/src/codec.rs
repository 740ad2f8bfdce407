//! Streaming compression codec.
//!
//! Only `zlib` is recognized. Encoder/decoder are thin wrappers over
//! `flate2`.

use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Chunk size used for all streaming I/O.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Wraps a writer, zlib-compressing everything written to it at `level`.
/// Call [`finish`](Self::finish) to flush the trailing zlib stream.
pub struct Encoder<W: Write>(flate2::write::ZlibEncoder<W>);

impl<W: Write> Encoder<W> {
    /// Wrap `inner`, compressing at the given level (0-9).
    pub fn new(inner: W, level: u32) -> Self {
        Encoder(flate2::write::ZlibEncoder::new(inner, flate2::Compression::new(level)))
    }

    /// Flush the zlib trailer and return the inner writer.
    pub fn finish(self) -> Result<W> {
        self.0.finish().map_err(Error::Io)
    }
}

impl<W: Write> Write for Encoder<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

/// Wraps a reader, zlib-decompressing everything read from it.
pub struct Decoder<R: Read>(flate2::read::ZlibDecoder<R>);

impl<R: Read> Decoder<R> {
    /// Wrap `inner`, decompressing a zlib stream read from it.
    pub fn new(inner: R) -> Self {
        Decoder(flate2::read::ZlibDecoder::new(inner))
    }
}

impl<R: Read> Read for Decoder<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            // flate2 reports truncated/malformed streams as generic io errors;
            // surface them distinctly so callers can tell corruption from EOF.
            io::Error::new(e.kind(), format!("zlib decode: {e}"))
        })
    }
}

/// Recognized compression algorithm names.
pub fn ensure_known_algorithm(name: &str) -> Result<()> {
    if name == "zlib" {
        Ok(())
    } else {
        Err(Error::Config(format!("unknown compression algorithm: {name}")))
    }
}

/// Heuristic for `CompressMode::AUTO`: compress if the first 4 KiB (or the
/// whole object, if smaller) zlib-compresses to <= 90% of its original size.
/// Deterministic given the object bytes.
pub fn auto_should_compress(sample: &[u8], level: u32) -> Result<bool> {
    if sample.is_empty() {
        return Ok(false);
    }
    let probe = &sample[..sample.len().min(4096)];
    let mut enc = Encoder::new(Vec::new(), level);
    enc.write_all(probe)?;
    let compressed = enc.finish()?;
    Ok((compressed.len() as f64) <= 0.90 * (probe.len() as f64))
}
