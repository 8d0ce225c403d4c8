//! Wire codec stack
//!
//! Three layers sharing one byte buffer:
//! - [`binary`]: fixed-width little-endian integers, floats, strings
//! - [`quantized`]: lossy fixed-point fields (position, velocity, angle, health)
//! - [`compression`]: flag-byte framing with LZ4 and a size threshold

pub mod binary;
pub mod compression;
pub mod quantized;

pub use binary::{BinaryReader, BinaryWriter, DecodeError};
pub use compression::{CompressionConfig, CompressionError, CompressionStats, Compressor};
pub use quantized::{QuantizedRead, QuantizedWrite};
