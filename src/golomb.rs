// Exp-Golomb precoder. Not present anywhere in the retrieved reference
// corpus; built directly from the documented (value_bits, bit_count)
// contract rather than ported from any given implementation.

use crate::bitstream::BitBuffer;
use crate::error::EvxResult;

// Unsigned: v -> (v+1) in binary, emitted as n-1 leading zero bits followed
// by the n-bit value.
pub fn encode_unsigned(v: u32) -> (u32, u32) {
  let code = v + 1;
  let bits = 32 - code.leading_zeros();
  (code, 2 * bits - 1)
}

// Signed: maps v to 2|v| (plus 1 if negative) before the unsigned code.
pub fn encode_signed(v: i32) -> (u32, u32) {
  let mapped = if v > 0 { 2 * v as u32 } else { 2 * (-v) as u32 + 1 };
  encode_unsigned(mapped)
}

pub fn decode_unsigned_value(code: u32, bit_count: u32) -> u32 {
  let n = (bit_count + 1) / 2;
  let mask = if n == 32 { u32::MAX } else { (1u32 << n) - 1 };
  (code & mask) - 1
}

pub fn decode_signed_value(mapped: u32) -> i32 {
  if mapped % 2 == 0 {
    (mapped / 2) as i32
  } else {
    -((mapped / 2) as i32 + 1)
  }
}

// `read_unsigned` counts leading zero bits, consumes the terminating 1 bit,
// then reads the remaining `zeros` bits LSB-first via `read_bits`; the
// writer has to match that exact layout bit for bit rather than just
// shipping `code` out through `write_bits` in one call.
pub fn write_unsigned(buf: &mut BitBuffer, v: u32) -> EvxResult<()> {
  let code = v + 1;
  let bits = 32 - code.leading_zeros();
  let zeros = bits - 1;
  for _ in 0..zeros {
    buf.write_bit(0)?;
  }
  buf.write_bit(1)?;
  if zeros > 0 {
    let remainder = code & ((1u32 << zeros) - 1);
    buf.write_bits(remainder, zeros)?;
  }
  Ok(())
}

pub fn read_unsigned(buf: &mut BitBuffer) -> EvxResult<u32> {
  let mut zeros = 0u32;
  while buf.read_bit()? == 0 {
    zeros += 1;
  }
  let rest = if zeros == 0 { 0 } else { buf.read_bits(zeros)? };
  let code = (1u32 << zeros) | rest;
  Ok(code - 1)
}

pub fn write_signed(buf: &mut BitBuffer, v: i32) -> EvxResult<()> {
  let mapped = if v > 0 { 2 * v as u32 } else { 2 * (-v) as u32 + 1 };
  write_unsigned(buf, mapped)
}

pub fn read_signed(buf: &mut BitBuffer) -> EvxResult<i32> {
  let mapped = read_unsigned(buf)?;
  Ok(decode_signed_value(mapped))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unsigned_round_trip() {
    for v in 0u32..2000 {
      let (code, bits) = encode_unsigned(v);
      let decoded = decode_unsigned_value(code, bits);
      assert_eq!(decoded, v);
    }
  }

  #[test]
  fn signed_round_trip() {
    for v in -1000i32..1000 {
      let (code, _bits) = encode_signed(v);
      let mapped = code - 1;
      assert_eq!(decode_signed_value(mapped), v);
    }
  }

  #[test]
  fn bitstream_round_trip() {
    let mut buf = BitBuffer::new(1 << 16);
    for v in -500i32..500 {
      write_signed(&mut buf, v).unwrap();
    }
    for v in -500i32..500 {
      assert_eq!(read_signed(&mut buf).unwrap(), v);
    }
  }
}
