// Adaptive binary arithmetic coder. No arithmetic/range coder reference
// implementation exists anywhere in the retrieved corpus, so this is built
// directly from the documented interface contract: `encode(feed, out,
// final_flush_flag)`, `decode(num_bits, in, feed, final_flush_flag)`,
// `start_decode(in)`, `finish_encode(out)`, `clear()`, LSB-first bit
// ordering. Internally it's a standard carry-propagating binary range
// coder with a small table of adaptive per-bit-position-class contexts.

use crate::bitstream::BitBuffer;
use crate::error::{EvxError, EvxResult};

const PROB_BITS: u32 = 12;
const PROB_MAX: u16 = 1 << PROB_BITS;
const PROB_INIT: u16 = PROB_MAX / 2;
const ADAPT_SHIFT: u32 = 5;
const TOP: u32 = 1 << 24;
const NUM_CONTEXTS: usize = 64;

pub struct Abac {
  contexts: [u16; NUM_CONTEXTS],
  low: u64,
  range: u32,
  cache: u8,
  cache_size: u64,
  started: bool,

  // Decoder-side state.
  code: u32,
  input: Vec<u8>,
  input_pos: usize,
}

impl Abac {
  pub fn new() -> Self {
    let mut abac = Self {
      contexts: [PROB_INIT; NUM_CONTEXTS],
      low: 0,
      range: 0xFFFF_FFFF,
      cache: 0xFF,
      cache_size: 0,
      started: false,
      code: 0,
      input: Vec::new(),
      input_pos: 0,
    };
    abac.clear();
    abac
  }

  pub fn clear(&mut self) {
    self.contexts = [PROB_INIT; NUM_CONTEXTS];
    self.low = 0;
    self.range = 0xFFFF_FFFF;
    self.cache = 0xFF;
    self.cache_size = 1;
    self.started = false;
    self.code = 0;
    self.input.clear();
    self.input_pos = 0;
  }

  fn shift_low(&mut self, out: &mut BitBuffer) -> EvxResult<()> {
    if (self.low as u32) < 0xFF00_0000 || (self.low >> 32) != 0 {
      let carry = (self.low >> 32) as u8;
      if self.started {
        out.write_byte(self.cache.wrapping_add(carry))?;
      }
      while self.cache_size > 1 {
        out.write_byte(0xFFu8.wrapping_add(carry))?;
        self.cache_size -= 1;
      }
      self.cache = (self.low >> 24) as u8;
      self.started = true;
      self.cache_size = 1;
    } else {
      self.cache_size += 1;
    }
    self.low = (self.low << 8) & 0xFFFF_FFFF;
    Ok(())
  }

  fn encode_bit(&mut self, ctx: usize, bit: u8, out: &mut BitBuffer) -> EvxResult<()> {
    let prob = self.contexts[ctx];
    let bound = (self.range >> PROB_BITS) * prob as u32;
    if bit == 0 {
      self.range = bound;
      self.contexts[ctx] = prob + ((PROB_MAX - prob) >> ADAPT_SHIFT);
    } else {
      self.low += bound as u64;
      self.range -= bound;
      self.contexts[ctx] = prob - (prob >> ADAPT_SHIFT);
    }
    while self.range < TOP {
      self.shift_low(out)?;
      self.range <<= 8;
    }
    Ok(())
  }

  // Drains every bit currently queued in `feed`, entropy-coding each one
  // with a context chosen round-robin over the position-class table, and
  // appends the compressed bytes to `out`.
  pub fn encode(&mut self, feed: &mut BitBuffer, out: &mut BitBuffer, final_flush_flag: bool) -> EvxResult<()> {
    let mut ctx = 0usize;
    while !feed.empty() {
      let bit = feed.read_bit()?;
      self.encode_bit(ctx, bit, out)?;
      ctx = (ctx + 1) % NUM_CONTEXTS;
    }
    if final_flush_flag {
      self.finish_encode(out)?;
    }
    Ok(())
  }

  pub fn finish_encode(&mut self, out: &mut BitBuffer) -> EvxResult<()> {
    for _ in 0..5 {
      self.shift_low(out)?;
    }
    Ok(())
  }

  pub fn start_decode(&mut self, input: &[u8]) -> EvxResult<()> {
    self.input = input.to_vec();
    self.input_pos = 0;
    self.range = 0xFFFF_FFFF;
    self.code = 0;
    for _ in 0..4 {
      self.code = (self.code << 8) | self.next_byte();
    }
    Ok(())
  }

  fn next_byte(&mut self) -> u32 {
    let b = self.input.get(self.input_pos).copied().unwrap_or(0);
    self.input_pos += 1;
    b as u32
  }

  fn decode_bit(&mut self, ctx: usize) -> u8 {
    let prob = self.contexts[ctx];
    let bound = (self.range >> PROB_BITS) * prob as u32;
    let bit = if self.code < bound {
      self.range = bound;
      self.contexts[ctx] = prob + ((PROB_MAX - prob) >> ADAPT_SHIFT);
      0
    } else {
      self.code -= bound;
      self.range -= bound;
      self.contexts[ctx] = prob - (prob >> ADAPT_SHIFT);
      1
    };
    while self.range < TOP {
      self.code = (self.code << 8) | self.next_byte();
      self.range <<= 8;
    }
    bit
  }

  // Entropy-decodes `num_bits` bits from the stream started by
  // `start_decode`, pushing them into `feed` for the caller to then
  // consume via the fixed-width / Exp-Golomb readers.
  pub fn decode(&mut self, num_bits: u32, feed: &mut BitBuffer, _final_flush_flag: bool) -> EvxResult<()> {
    let mut ctx = 0usize;
    for _ in 0..num_bits {
      let bit = self.decode_bit(ctx);
      feed.write_bit(bit).map_err(|_| EvxError::CapacityLimit)?;
      ctx = (ctx + 1) % NUM_CONTEXTS;
    }
    Ok(())
  }
}

impl Default for Abac {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn round_trip_bits() {
    let bits: Vec<u8> = (0..500).map(|i| ((i * 37 + 11) % 5 == 0) as u8).collect();

    let mut feed = BitBuffer::new(1 << 16);
    let mut out = BitBuffer::new(1 << 16);
    let mut enc = Abac::new();
    for &b in &bits {
      feed.write_bit(b).unwrap();
    }
    enc.encode(&mut feed, &mut out, true).unwrap();

    let compressed = out.as_bytes().to_vec();
    let mut dec = Abac::new();
    dec.start_decode(&compressed).unwrap();
    let mut decoded_feed = BitBuffer::new(1 << 16);
    dec.decode(bits.len() as u32, &mut decoded_feed, true).unwrap();

    for &b in &bits {
      assert_eq!(decoded_feed.read_bit().unwrap(), b);
    }
  }
}
