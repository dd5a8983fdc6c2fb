use std::io::prelude::*;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{EvxError, EvxResult};

// Integer division rounded half-away-from-zero, per the transform/quantizer
// numeric contract.
pub fn rounded_div(x: i32, d: i32) -> i32 {
  debug_assert!(d != 0);
  (x + sign(x) * (d.abs() / 2)) / d
}

pub fn sign(x: i32) -> i32 {
  if x > 0 {
    1
  } else if x < 0 {
    -1
  } else {
    0
  }
}

pub fn clip_range(v: i32, lo: i32, hi: i32) -> i32 {
  v.max(lo).min(hi)
}

// floor(log2(v)), treating v == 0 as 0 (the reference codec never calls this
// on a zero variance, but the clip that follows makes this safe either way).
pub fn log2(v: u32) -> u32 {
  if v == 0 {
    0
  } else {
    31 - v.leading_zeros()
  }
}

pub fn write_u16le<W: Write>(w: &mut W, value: u16) -> EvxResult<()> {
  w.write_u16::<LittleEndian>(value).map_err(|_| EvxError::CapacityLimit)
}

pub fn write_u32le<W: Write>(w: &mut W, value: u32) -> EvxResult<()> {
  w.write_u32::<LittleEndian>(value).map_err(|_| EvxError::CapacityLimit)
}

pub fn write_u8<W: Write>(w: &mut W, value: u8) -> EvxResult<()> {
  w.write_u8(value).map_err(|_| EvxError::CapacityLimit)
}

pub fn read_u16le<R: Read>(r: &mut R) -> EvxResult<u16> {
  r.read_u16::<LittleEndian>().map_err(|_| EvxError::InvalidResource("truncated stream".into()))
}

pub fn read_u32le<R: Read>(r: &mut R) -> EvxResult<u32> {
  r.read_u32::<LittleEndian>().map_err(|_| EvxError::InvalidResource("truncated stream".into()))
}

pub fn read_u8<R: Read>(r: &mut R) -> EvxResult<u8> {
  r.read_u8().map_err(|_| EvxError::InvalidResource("truncated stream".into()))
}
