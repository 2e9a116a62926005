//! Gzip compression utilities

use crate::error::{BlobError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Gzip compress data.
pub fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Gzip decompress data.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| BlobError::Decompression(e.to_string()))?;
    Ok(decompressed)
}

/// Check if content type should be compressed.
///
/// PDF and image payloads are already compressed internally; squeezing them
/// again wastes CPU for no size win.
pub fn should_compress(content_type: &str) -> bool {
    let ct = content_type.to_lowercase();
    ct.contains("json") || ct.contains("text") || ct.contains("xml") || ct.contains("csv")
}
