//! Compression framing for outbound/inbound datagrams
//!
//! Format:
//! - `[0x00][payload]` uncompressed
//! - `[0x01][u32 LE original size][lz4 block]` compressed
//!
//! Buffers below `min_size` are never compressed, and a compressed form
//! that would not be smaller than the original falls back to `0x00`.

use tracing::debug;

pub const FLAG_UNCOMPRESSED: u8 = 0x00;
pub const FLAG_COMPRESSED: u8 = 0x01;
/// Flag byte plus the u32 size field
pub const COMPRESSED_HEADER_SIZE: usize = 5;
/// Largest original size accepted when decompressing
pub const MAX_DECOMPRESSED_SIZE: usize = 1024 * 1024;
pub const DEFAULT_MIN_SIZE: usize = 128;

/// Errors raised by [`decompress`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompressionError {
    #[error("Empty buffer")]
    Empty,
    #[error("Unknown compression flag: {0:#04x}")]
    UnknownFlag(u8),
    #[error("Compressed frame truncated: {0} bytes")]
    Truncated(usize),
    #[error("Invalid original size: {0}")]
    InvalidSize(usize),
    #[error("Decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("LZ4 error: {0}")]
    Lz4(String),
}

/// Compression settings
#[derive(Debug, Clone, Copy)]
pub struct CompressionConfig {
    /// Minimum buffer size before compression is attempted
    pub min_size: usize,
    pub enabled: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_MIN_SIZE,
            enabled: true,
        }
    }
}

/// Cumulative compression counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionStats {
    /// Frames emitted with the compressed flag
    pub total_compressed: u64,
    /// Frames emitted with the uncompressed flag
    pub total_uncompressed: u64,
    /// Payload bytes before framing
    pub bytes_in: u64,
    /// Framed bytes produced
    pub bytes_out: u64,
}

impl CompressionStats {
    /// Output/input byte ratio (1.0 when nothing was processed)
    pub fn ratio(&self) -> f64 {
        if self.bytes_in == 0 {
            1.0
        } else {
            self.bytes_out as f64 / self.bytes_in as f64
        }
    }
}

/// Stateful compressor that tracks stats across frames
#[derive(Debug, Default)]
pub struct Compressor {
    config: CompressionConfig,
    stats: CompressionStats,
}

impl Compressor {
    pub fn new(config: CompressionConfig) -> Self {
        Self {
            config,
            stats: CompressionStats::default(),
        }
    }

    /// Frame `data`, compressing when it pays off
    pub fn compress(&mut self, data: &[u8]) -> Vec<u8> {
        let framed = compress_with(data, &self.config);
        if framed.first() == Some(&FLAG_COMPRESSED) {
            self.stats.total_compressed += 1;
        } else {
            self.stats.total_uncompressed += 1;
        }
        self.stats.bytes_in += data.len() as u64;
        self.stats.bytes_out += framed.len() as u64;
        framed
    }

    pub fn stats(&self) -> CompressionStats {
        self.stats
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }
}

fn uncompressed_frame(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 1);
    out.push(FLAG_UNCOMPRESSED);
    out.extend_from_slice(data);
    out
}

/// Frame `data` according to `config`
pub fn compress_with(data: &[u8], config: &CompressionConfig) -> Vec<u8> {
    if !config.enabled || data.len() < config.min_size || data.len() > MAX_DECOMPRESSED_SIZE {
        return uncompressed_frame(data);
    }

    let compressed = lz4_flex::compress(data);
    if COMPRESSED_HEADER_SIZE + compressed.len() >= data.len() {
        debug!(
            "Compression not worth it ({} -> {} bytes), sending raw",
            data.len(),
            compressed.len()
        );
        return uncompressed_frame(data);
    }

    let mut out = Vec::with_capacity(COMPRESSED_HEADER_SIZE + compressed.len());
    out.push(FLAG_COMPRESSED);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

/// Frame `data` with the default settings
pub fn compress(data: &[u8]) -> Vec<u8> {
    compress_with(data, &CompressionConfig::default())
}

/// Unwrap a framed buffer
pub fn decompress(frame: &[u8]) -> Result<Vec<u8>, CompressionError> {
    let (&flag, body) = frame.split_first().ok_or(CompressionError::Empty)?;

    match flag {
        FLAG_UNCOMPRESSED => Ok(body.to_vec()),
        FLAG_COMPRESSED => {
            // header plus at least one byte of block data
            if frame.len() < COMPRESSED_HEADER_SIZE + 1 {
                return Err(CompressionError::Truncated(frame.len()));
            }
            let original_size =
                u32::from_le_bytes([body[0], body[1], body[2], body[3]]) as usize;
            if original_size == 0 || original_size > MAX_DECOMPRESSED_SIZE {
                return Err(CompressionError::InvalidSize(original_size));
            }

            let out = lz4_flex::decompress(&body[4..], original_size)
                .map_err(|e| CompressionError::Lz4(e.to_string()))?;
            if out.len() != original_size {
                return Err(CompressionError::SizeMismatch {
                    expected: original_size,
                    actual: out.len(),
                });
            }
            Ok(out)
        }
        other => Err(CompressionError::UnknownFlag(other)),
    }
}

/// True when the first byte looks like a compression flag
#[inline]
pub fn is_framed(data: &[u8]) -> bool {
    matches!(data.first(), Some(&FLAG_UNCOMPRESSED) | Some(&FLAG_COMPRESSED))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repetitive(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 7) as u8).collect()
    }

    #[test]
    fn test_small_buffer_stays_raw() {
        let data = repetitive(DEFAULT_MIN_SIZE - 1);
        let framed = compress(&data);
        assert_eq!(framed[0], FLAG_UNCOMPRESSED);
        assert_eq!(&framed[1..], &data[..]);
    }

    #[test]
    fn test_large_repetitive_compresses() {
        let data = repetitive(4096);
        let framed = compress(&data);
        assert_eq!(framed[0], FLAG_COMPRESSED);
        assert!(framed.len() < data.len());
        assert_eq!(decompress(&framed).unwrap(), data);
    }

    #[test]
    fn test_incompressible_falls_back() {
        // xorshift noise does not compress
        let mut x: u32 = 0x1234_5678;
        let data: Vec<u8> = (0..512)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                x as u8
            })
            .collect();
        let framed = compress(&data);
        assert_eq!(framed[0], FLAG_UNCOMPRESSED);
        assert_eq!(decompress(&framed).unwrap(), data);
    }

    #[test]
    fn test_round_trip_various_sizes() {
        for len in [0usize, 1, 127, 128, 129, 1000, 65_000] {
            let data = repetitive(len);
            assert_eq!(decompress(&compress(&data)).unwrap(), data, "len {}", len);
        }
    }

    #[test]
    fn test_disabled_config() {
        let config = CompressionConfig {
            min_size: 0,
            enabled: false,
        };
        let framed = compress_with(&repetitive(2048), &config);
        assert_eq!(framed[0], FLAG_UNCOMPRESSED);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(decompress(&[]), Err(CompressionError::Empty));
    }

    #[test]
    fn test_rejects_unknown_flag() {
        assert_eq!(decompress(&[0x42, 0xB5]), Err(CompressionError::UnknownFlag(0x42)));
    }

    #[test]
    fn test_rejects_truncated_header() {
        assert_eq!(
            decompress(&[FLAG_COMPRESSED, 10, 0, 0]),
            Err(CompressionError::Truncated(4))
        );
    }

    #[test]
    fn test_rejects_bad_original_size() {
        let zero = [FLAG_COMPRESSED, 0, 0, 0, 0, 0xAA];
        assert_eq!(decompress(&zero), Err(CompressionError::InvalidSize(0)));

        let huge = (MAX_DECOMPRESSED_SIZE as u32 + 1).to_le_bytes();
        let frame = [FLAG_COMPRESSED, huge[0], huge[1], huge[2], huge[3], 0xAA];
        assert!(matches!(decompress(&frame), Err(CompressionError::InvalidSize(_))));
    }

    #[test]
    fn test_rejects_size_mismatch() {
        let data = repetitive(1024);
        let mut framed = compress(&data);
        assert_eq!(framed[0], FLAG_COMPRESSED);
        // Lie about the original size
        framed[1..5].copy_from_slice(&2048u32.to_le_bytes());
        assert!(decompress(&framed).is_err());
    }

    #[test]
    fn test_compressor_stats() {
        let mut compressor = Compressor::new(CompressionConfig::default());
        compressor.compress(&repetitive(10));
        compressor.compress(&repetitive(4096));

        let stats = compressor.stats();
        assert_eq!(stats.total_uncompressed, 1);
        assert_eq!(stats.total_compressed, 1);
        assert_eq!(stats.bytes_in, 4106);
        assert!(stats.ratio() < 1.0);
    }

    #[test]
    fn test_is_framed() {
        assert!(is_framed(&[0x00, 1]));
        assert!(is_framed(&[0x01]));
        assert!(!is_framed(&[0x42, 0xB5]));
        assert!(!is_framed(&[]));
    }
}
