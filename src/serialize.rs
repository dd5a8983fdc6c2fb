// Bitstream serializer / deserializer: packs and unpacks the six ordered
// groups of a slice body (block type, prediction target, motion vectors,
// sub-pel motion, quality, residuals) through the feed buffer and the ABAC.
//
// Several groups are variable-length (the Exp-Golomb-coded motion, quality
// and residual groups), so each group is framed with a fixed 24-bit ABAC-
// coded bit count ahead of its body. The decoder reads that count first and
// uses it to size its own `Abac::decode` call for the body, mirroring the
// length-prefixed framing the corpus uses for packet/box payloads.

use crate::abac::Abac;
use crate::bitstream::BitBuffer;
use crate::error::EvxResult;
use crate::golomb;
use crate::image::{ImageSet, Plane};
use crate::scan::ZIGZAG_8X8;
use crate::types::{BlockDescriptor, BlockType};

const GROUP_LEN_BITS: u32 = 24;

fn encode_group(feed: BitBuffer, abac: &mut Abac, out: &mut BitBuffer, flush: bool) -> EvxResult<()> {
  let len = feed.query_occupancy() as u32;
  let mut header = BitBuffer::new(GROUP_LEN_BITS as usize);
  header.write_bits(len, GROUP_LEN_BITS)?;
  abac.encode(&mut header, out, false)?;

  let mut body = feed;
  abac.encode(&mut body, out, flush)?;
  Ok(())
}

fn decode_group(abac: &mut Abac) -> EvxResult<BitBuffer> {
  let mut header = BitBuffer::new(GROUP_LEN_BITS as usize);
  abac.decode(GROUP_LEN_BITS, &mut header, false)?;
  let len = header.read_bits(GROUP_LEN_BITS)?;

  let mut body = BitBuffer::new(len as usize + 8);
  abac.decode(len, &mut body, false)?;
  Ok(body)
}

fn zigzag_raster(k: usize) -> (usize, usize) {
  let raster = ZIGZAG_8X8[k] as usize;
  (raster % 8, raster / 8)
}

fn encode_residual_block_8x8(feed: &mut BitBuffer, plane: &Plane, x0: usize, y0: usize, predictor: i32) -> EvxResult<i32> {
  let raw_dc = plane.get(x0, y0) as i32;

  let mut values = [0i32; 64];
  for k in 0..64 {
    let (col, row) = zigzag_raster(k);
    values[k] = plane.get(x0 + col, y0 + row) as i32;
  }
  values[0] -= predictor;

  let mut last_nonzero: i32 = -1;
  for (k, &v) in values.iter().enumerate() {
    if v != 0 {
      last_nonzero = k as i32;
    }
  }

  golomb::write_unsigned(feed, (last_nonzero + 1) as u32)?;
  for &v in values.iter().take((last_nonzero + 1) as usize) {
    golomb::write_signed(feed, v)?;
  }

  Ok(raw_dc)
}

fn decode_residual_block_8x8(feed: &mut BitBuffer, plane: &mut Plane, x0: usize, y0: usize, predictor: i32) -> EvxResult<i32> {
  let count = golomb::read_unsigned(feed)?;

  let mut values = [0i32; 64];
  for v in values.iter_mut().take(count as usize) {
    *v = golomb::read_signed(feed)?;
  }
  values[0] += predictor;

  for k in 0..64 {
    let (col, row) = zigzag_raster(k);
    plane.set(x0 + col, y0 + row, values[k] as i16);
  }

  Ok(plane.get(x0, y0) as i32)
}

pub struct SliceParams {
  pub width_blocks: usize,
  pub height_blocks: usize,
  pub reference_count: usize,
}

impl SliceParams {
  // Prediction targets run 0 (intra, never written) through
  // `reference_count` inclusive, so the field needs enough bits to hold
  // the value `reference_count` itself, not just `reference_count - 1`.
  fn target_bits(&self) -> u32 {
    32 - (self.reference_count as u32).leading_zeros()
  }
}

pub fn serialize_slice(params: &SliceParams, descriptors: &[BlockDescriptor], output: &ImageSet, out: &mut BitBuffer, abac: &mut Abac) -> EvxResult<()> {
  let num_blocks = descriptors.len();

  // Group 1: block type, 3 bits each.
  let mut feed = BitBuffer::new(num_blocks * 3 + 8);
  for d in descriptors {
    feed.write_bits(d.block_type.code() as u32, 3)?;
  }
  encode_group(feed, abac, out, false)?;

  // Group 2: prediction target for non-intra blocks.
  let target_bits = params.target_bits();
  let mut feed = BitBuffer::new(num_blocks * target_bits as usize + 8);
  for d in descriptors {
    if !d.block_type.is_intra() {
      feed.write_bits(d.prediction_target as u32, target_bits)?;
    }
  }
  encode_group(feed, abac, out, false)?;

  // Group 3: motion vectors, X subgroup then Y subgroup, each a running delta.
  let mut feed = BitBuffer::new(num_blocks * 64 + 8);
  let mut last_x = 0i32;
  for d in descriptors {
    if d.block_type.is_motion() {
      golomb::write_signed(&mut feed, d.motion_x as i32 - last_x)?;
      last_x = d.motion_x as i32;
    }
  }
  let mut last_y = 0i32;
  for d in descriptors {
    if d.block_type.is_motion() {
      golomb::write_signed(&mut feed, d.motion_y as i32 - last_y)?;
      last_y = d.motion_y as i32;
    }
  }
  encode_group(feed, abac, out, false)?;

  // Group 4: sub-pel motion, three subgroups (sp_pred, sp_amount, sp_index).
  let mut feed = BitBuffer::new(num_blocks * 5 + 8);
  for d in descriptors {
    if d.block_type.is_motion() {
      feed.write_bit(d.sp_pred as u8)?;
    }
  }
  for d in descriptors {
    if d.block_type.is_motion() && d.sp_pred {
      feed.write_bit(d.sp_amount)?;
    }
  }
  for d in descriptors {
    if d.block_type.is_motion() && d.sp_pred {
      feed.write_bits(d.sp_index as u32, 3)?;
    }
  }
  encode_group(feed, abac, out, false)?;

  // Group 5: per-block quality, running delta, skipping copy blocks.
  let mut feed = BitBuffer::new(num_blocks * 32 + 8);
  let mut last_q = 0i32;
  for d in descriptors {
    if !d.block_type.is_copy() {
      golomb::write_signed(&mut feed, d.q_index as i32 - last_q)?;
      last_q = d.q_index as i32;
    }
  }
  encode_group(feed, abac, out, false)?;

  // Group 6: residuals, channel order Y, U, V.
  let mut feed = BitBuffer::new(num_blocks * 64 * 8);
  serialize_luma_residuals(params, descriptors, &output.y, &mut feed)?;
  serialize_chroma_residuals(params, descriptors, &output.u, &mut feed)?;
  serialize_chroma_residuals(params, descriptors, &output.v, &mut feed)?;
  encode_group(feed, abac, out, true)?;

  Ok(())
}

fn serialize_luma_residuals(params: &SliceParams, descriptors: &[BlockDescriptor], plane: &Plane, feed: &mut BitBuffer) -> EvxResult<()> {
  let mut q2_row = vec![0i32; params.width_blocks];
  let mut q3_row = vec![0i32; params.width_blocks];

  for by in 0..params.height_blocks {
    let mut left_q2 = 0i32;
    for bx in 0..params.width_blocks {
      let idx = by * params.width_blocks + bx;
      let d = descriptors[idx];
      if d.block_type.is_copy() {
        continue;
      }
      let x0 = bx * 16;
      let y0 = by * 16;

      let q1_pred = if bx > 0 {
        left_q2
      } else if by > 0 {
        q3_row[bx]
      } else {
        0
      };

      let q1_dc = encode_residual_block_8x8(feed, plane, x0, y0, q1_pred)?;
      let q2_dc = encode_residual_block_8x8(feed, plane, x0 + 8, y0, q1_dc)?;
      let q3_dc = encode_residual_block_8x8(feed, plane, x0, y0 + 8, q1_dc)?;
      let _q4_dc = encode_residual_block_8x8(feed, plane, x0 + 8, y0 + 8, q3_dc)?;

      left_q2 = q2_dc;
      q2_row[bx] = q2_dc;
      q3_row[bx] = q3_dc;
    }
  }
  Ok(())
}

fn serialize_chroma_residuals(params: &SliceParams, descriptors: &[BlockDescriptor], plane: &Plane, feed: &mut BitBuffer) -> EvxResult<()> {
  let mut above_row = vec![0i32; params.width_blocks];

  for by in 0..params.height_blocks {
    let mut left = 0i32;
    for bx in 0..params.width_blocks {
      let idx = by * params.width_blocks + bx;
      let d = descriptors[idx];
      if d.block_type.is_copy() {
        continue;
      }
      let x0 = bx * 8;
      let y0 = by * 8;

      let pred = if bx > 0 {
        left
      } else if by > 0 {
        above_row[bx]
      } else {
        0
      };

      let dc = encode_residual_block_8x8(feed, plane, x0, y0, pred)?;
      left = dc;
      above_row[bx] = dc;
    }
  }
  Ok(())
}

pub fn deserialize_slice(params: &SliceParams, num_blocks: usize, input: &[u8], output: &mut ImageSet, abac: &mut Abac) -> EvxResult<Vec<BlockDescriptor>> {
  abac.start_decode(input)?;

  // Group 1.
  let mut feed = decode_group(abac)?;
  let mut descriptors = Vec::with_capacity(num_blocks);
  for _ in 0..num_blocks {
    let code = feed.read_bits(3)? as u8;
    let mut d = BlockDescriptor::empty();
    d.block_type = BlockType::from_code(code);
    descriptors.push(d);
  }

  // Group 2.
  let target_bits = params.target_bits();
  let mut feed = decode_group(abac)?;
  for d in descriptors.iter_mut() {
    if !d.block_type.is_intra() {
      d.prediction_target = feed.read_bits(target_bits)? as u8;
    }
  }

  // Group 3.
  let mut feed = decode_group(abac)?;
  let mut last_x = 0i32;
  for d in descriptors.iter_mut() {
    if d.block_type.is_motion() {
      last_x += golomb::read_signed(&mut feed)?;
      d.motion_x = last_x as i16;
    }
  }
  let mut last_y = 0i32;
  for d in descriptors.iter_mut() {
    if d.block_type.is_motion() {
      last_y += golomb::read_signed(&mut feed)?;
      d.motion_y = last_y as i16;
    }
  }

  // Group 4.
  let mut feed = decode_group(abac)?;
  for d in descriptors.iter_mut() {
    if d.block_type.is_motion() {
      d.sp_pred = feed.read_bit()? != 0;
    }
  }
  for d in descriptors.iter_mut() {
    if d.block_type.is_motion() && d.sp_pred {
      d.sp_amount = feed.read_bit()?;
    }
  }
  for d in descriptors.iter_mut() {
    if d.block_type.is_motion() && d.sp_pred {
      d.sp_index = feed.read_bits(3)? as u8;
    }
  }

  // Group 5.
  let mut feed = decode_group(abac)?;
  let mut last_q = 0i32;
  for d in descriptors.iter_mut() {
    if !d.block_type.is_copy() {
      last_q += golomb::read_signed(&mut feed)?;
      d.q_index = last_q as u8;
    }
  }

  // Group 6.
  let mut feed = decode_group(abac)?;
  deserialize_luma_residuals(params, &descriptors, &mut output.y, &mut feed)?;
  deserialize_chroma_residuals(params, &descriptors, &mut output.u, &mut feed)?;
  deserialize_chroma_residuals(params, &descriptors, &mut output.v, &mut feed)?;

  Ok(descriptors)
}

fn deserialize_luma_residuals(params: &SliceParams, descriptors: &[BlockDescriptor], plane: &mut Plane, feed: &mut BitBuffer) -> EvxResult<()> {
  let mut q2_row = vec![0i32; params.width_blocks];
  let mut q3_row = vec![0i32; params.width_blocks];

  for by in 0..params.height_blocks {
    let mut left_q2 = 0i32;
    for bx in 0..params.width_blocks {
      let idx = by * params.width_blocks + bx;
      let d = descriptors[idx];
      if d.block_type.is_copy() {
        continue;
      }
      let x0 = bx * 16;
      let y0 = by * 16;

      let q1_pred = if bx > 0 {
        left_q2
      } else if by > 0 {
        q3_row[bx]
      } else {
        0
      };

      let q1_dc = decode_residual_block_8x8(feed, plane, x0, y0, q1_pred)?;
      let q2_dc = decode_residual_block_8x8(feed, plane, x0 + 8, y0, q1_dc)?;
      let q3_dc = decode_residual_block_8x8(feed, plane, x0, y0 + 8, q1_dc)?;
      let _q4_dc = decode_residual_block_8x8(feed, plane, x0 + 8, y0 + 8, q3_dc)?;

      left_q2 = q2_dc;
      q2_row[bx] = q2_dc;
      q3_row[bx] = q3_dc;
    }
  }
  Ok(())
}

fn deserialize_chroma_residuals(params: &SliceParams, descriptors: &[BlockDescriptor], plane: &mut Plane, feed: &mut BitBuffer) -> EvxResult<()> {
  let mut above_row = vec![0i32; params.width_blocks];

  for by in 0..params.height_blocks {
    let mut left = 0i32;
    for bx in 0..params.width_blocks {
      let idx = by * params.width_blocks + bx;
      let d = descriptors[idx];
      if d.block_type.is_copy() {
        continue;
      }
      let x0 = bx * 8;
      let y0 = by * 8;

      let pred = if bx > 0 {
        left
      } else if by > 0 {
        above_row[bx]
      } else {
        0
      };

      let dc = decode_residual_block_8x8(feed, plane, x0, y0, pred)?;
      left = dc;
      above_row[bx] = dc;
    }
  }
  Ok(())
}
