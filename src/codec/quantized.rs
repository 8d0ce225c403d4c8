//! Lossy fixed-point encodings for per-entity state
//!
//! | Field | Wire | Step | Range |
//! |---|---|---|---|
//! | position axis | u16 | 0.1 | [0, 6553.5] |
//! | velocity axis | i8 | 10 | [-1270, 1270] |
//! | angle | u8 | 360/255 deg | [0, 360) |
//! | health | u8 + u8 | 1 or 1 % | raw when max <= 255, else percent |
//!
//! Out-of-range values clamp. Rounding keeps the round-trip error within
//! half a step.

use crate::codec::binary::{BinaryReader, BinaryWriter, DecodeError};

pub const POSITION_SCALE: f32 = 10.0;
pub const POSITION_MAX: f32 = u16::MAX as f32 / POSITION_SCALE;
pub const VELOCITY_SCALE: f32 = 10.0;
pub const VELOCITY_MAX: f32 = i8::MAX as f32 * VELOCITY_SCALE;

#[inline]
pub fn quantize_position(value: f32) -> u16 {
    (value.clamp(0.0, POSITION_MAX) * POSITION_SCALE).round() as u16
}

#[inline]
pub fn dequantize_position(value: u16) -> f32 {
    value as f32 / POSITION_SCALE
}

#[inline]
pub fn quantize_velocity(value: f32) -> i8 {
    (value.clamp(-VELOCITY_MAX, VELOCITY_MAX) / VELOCITY_SCALE).round() as i8
}

#[inline]
pub fn dequantize_velocity(value: i8) -> f32 {
    value as f32 * VELOCITY_SCALE
}

/// Map degrees (any range) onto one byte
#[inline]
pub fn quantize_angle(degrees: f32) -> u8 {
    let normalized = degrees.rem_euclid(360.0);
    (normalized / 360.0 * 255.0).round() as u8
}

#[inline]
pub fn dequantize_angle(value: u8) -> f32 {
    value as f32 * 360.0 / 255.0
}

/// Health as a byte pair: raw when it fits, otherwise percent of max
pub fn quantize_health(current: i32, max: i32) -> (u8, u8) {
    let current = current.max(0);
    let max = max.max(0);
    if max <= u8::MAX as i32 {
        (current.min(max) as u8, max as u8)
    } else {
        let percent = (current as i64 * 100 / max as i64).min(100);
        (percent as u8, 100)
    }
}

/// Pack up to eight flags, first flag in the lowest bit
pub fn pack_flags(flags: &[bool]) -> u8 {
    flags
        .iter()
        .take(8)
        .enumerate()
        .fold(0u8, |acc, (i, &set)| if set { acc | (1 << i) } else { acc })
}

pub fn unpack_flags(byte: u8) -> [bool; 8] {
    std::array::from_fn(|i| byte & (1 << i) != 0)
}

/// Semantic field writers layered on [`BinaryWriter`]
pub trait QuantizedWrite {
    fn write_position(&mut self, x: f32, y: f32) -> &mut Self;
    fn write_velocity(&mut self, vx: f32, vy: f32) -> &mut Self;
    fn write_angle(&mut self, degrees: f32) -> &mut Self;
    fn write_quantized_health(&mut self, current: i32, max: i32) -> &mut Self;
    fn write_flags(&mut self, flags: &[bool]) -> &mut Self;
}

impl QuantizedWrite for BinaryWriter {
    fn write_position(&mut self, x: f32, y: f32) -> &mut Self {
        self.write_u16(quantize_position(x))
            .write_u16(quantize_position(y))
    }

    fn write_velocity(&mut self, vx: f32, vy: f32) -> &mut Self {
        self.write_i8(quantize_velocity(vx))
            .write_i8(quantize_velocity(vy))
    }

    fn write_angle(&mut self, degrees: f32) -> &mut Self {
        self.write_u8(quantize_angle(degrees))
    }

    fn write_quantized_health(&mut self, current: i32, max: i32) -> &mut Self {
        let (cur, max) = quantize_health(current, max);
        self.write_u8(cur).write_u8(max)
    }

    fn write_flags(&mut self, flags: &[bool]) -> &mut Self {
        self.write_u8(pack_flags(flags))
    }
}

/// Readers matching [`QuantizedWrite`]
pub trait QuantizedRead {
    fn read_position(&mut self) -> Result<(f32, f32), DecodeError>;
    fn read_velocity(&mut self) -> Result<(f32, f32), DecodeError>;
    fn read_angle(&mut self) -> Result<f32, DecodeError>;
    fn read_quantized_health(&mut self) -> Result<(u8, u8), DecodeError>;
    fn read_flags(&mut self) -> Result<[bool; 8], DecodeError>;
}

impl QuantizedRead for BinaryReader<'_> {
    fn read_position(&mut self) -> Result<(f32, f32), DecodeError> {
        let x = dequantize_position(self.read_u16()?);
        let y = dequantize_position(self.read_u16()?);
        Ok((x, y))
    }

    fn read_velocity(&mut self) -> Result<(f32, f32), DecodeError> {
        let vx = dequantize_velocity(self.read_i8()?);
        let vy = dequantize_velocity(self.read_i8()?);
        Ok((vx, vy))
    }

    fn read_angle(&mut self) -> Result<f32, DecodeError> {
        Ok(dequantize_angle(self.read_u8()?))
    }

    fn read_quantized_health(&mut self) -> Result<(u8, u8), DecodeError> {
        Ok((self.read_u8()?, self.read_u8()?))
    }

    fn read_flags(&mut self) -> Result<[bool; 8], DecodeError> {
        Ok(unpack_flags(self.read_u8()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_error_bound() {
        let mut v = 0.0f32;
        while v <= POSITION_MAX {
            let back = dequantize_position(quantize_position(v));
            assert!((back - v).abs() <= 0.05 + 1e-3, "{} -> {}", v, back);
            v += 0.37;
        }
        assert_eq!(dequantize_position(quantize_position(6553.5)), 6553.5);
    }

    #[test]
    fn test_position_clamps() {
        assert_eq!(quantize_position(-50.0), 0);
        assert_eq!(quantize_position(9000.0), u16::MAX);
        assert_eq!(quantize_position(f32::INFINITY), u16::MAX);
    }

    #[test]
    fn test_velocity_error_bound() {
        for raw in -1270..=1270 {
            let v = raw as f32;
            let back = dequantize_velocity(quantize_velocity(v));
            assert!((back - v).abs() <= 5.0, "{} -> {}", v, back);
        }
    }

    #[test]
    fn test_velocity_clamps() {
        assert_eq!(quantize_velocity(5000.0), 127);
        assert_eq!(quantize_velocity(-5000.0), -127);
        assert_eq!(dequantize_velocity(quantize_velocity(-300.0)), -300.0);
    }

    #[test]
    fn test_angle() {
        assert_eq!(quantize_angle(0.0), 0);
        assert_eq!(quantize_angle(360.0), 0);
        assert_eq!(quantize_angle(-90.0), quantize_angle(270.0));
        let back = dequantize_angle(quantize_angle(123.0));
        assert!((back - 123.0).abs() <= 360.0 / 255.0);
    }

    #[test]
    fn test_health_raw_and_percent() {
        assert_eq!(quantize_health(80, 100), (80, 100));
        assert_eq!(quantize_health(-5, 100), (0, 100));
        assert_eq!(quantize_health(1000, 2000), (50, 100));
        assert_eq!(quantize_health(2000, 2000), (100, 100));
        assert_eq!(quantize_health(0, 0), (0, 0));
    }

    #[test]
    fn test_flags() {
        let packed = pack_flags(&[true, false, true]);
        assert_eq!(packed, 0b101);
        let unpacked = unpack_flags(packed);
        assert!(unpacked[0] && !unpacked[1] && unpacked[2] && !unpacked[7]);
        // Extra flags beyond eight are ignored
        assert_eq!(pack_flags(&[true; 10]), 0xFF);
    }

    #[test]
    fn test_entity_record_size() {
        let mut w = BinaryWriter::new();
        w.write_position(100.0, 200.0)
            .write_velocity(-150.0, 0.0)
            .write_quantized_health(10, 10);
        assert_eq!(w.len(), 8);

        let data = w.into_inner();
        let mut r = BinaryReader::new(&data);
        assert_eq!(r.read_position().unwrap(), (100.0, 200.0));
        assert_eq!(r.read_velocity().unwrap(), (-150.0, 0.0));
        assert_eq!(r.read_quantized_health().unwrap(), (10, 10));
    }
}
