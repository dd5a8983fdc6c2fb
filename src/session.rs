// Top-level codec session: owns the reference ring, the per-frame scratch
// image sets, the block table and the entropy engine, and drives the
// encode/decode pipelines one macroblock at a time. Grounded on
// original_source/evx1enc.cpp / evx1dec.cpp's `evx_context` lifecycle
// (`engine_encode_frame`/`engine_decode_frame`, the ring's `F mod R`
// indexing via `query_prediction_index_by_offset`).

use std::io::{Read, Write};

use log::{debug, info, warn};

use crate::abac::Abac;
use crate::bitstream::BitBuffer;
use crate::classify::classify_block;
use crate::config::Config;
use crate::convert::{rgb_to_yuv, yuv_to_rgb};
use crate::decode::decode_macroblock;
use crate::deblock::deblock_image_set;
use crate::encode::encode_macroblock;
use crate::error::{EvxError, EvxResult};
use crate::image::{ImageSet, Plane, RgbImage};
use crate::serialize::{deserialize_slice, serialize_slice, SliceParams};
use crate::types::{BlockDescriptor, FrameType};
use crate::util::{clip_range, read_u16le, read_u32le, read_u8, write_u16le, write_u32le, write_u8};

const MAGIC: &[u8; 4] = b"EVX1";
const VERSION: u16 = 0x0100;
const HEADER_SIZE: u16 = 13;

// convert.rs's CHROMINANCE_SHIFT: the colorless value in the shifted
// internal representation, used to seed chroma planes when disabled.
const CHROMINANCE_NEUTRAL: i16 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeekState {
  Source,
  Destination,
  BlockTable,
  QuantTable,
  BlockVariance,
  SpmpTable,
}

fn round_up_16(v: usize) -> usize {
  (v + 15) / 16 * 16
}

fn replicate_edge(plane: &mut Plane, valid_w: usize, valid_h: usize) {
  for y in 0..valid_h {
    let edge = plane.get(valid_w - 1, y);
    for x in valid_w..plane.width {
      plane.set(x, y, edge);
    }
  }
  for y in valid_h..plane.height {
    for x in 0..plane.width {
      let v = plane.get(x, valid_h - 1);
      plane.set(x, y, v);
    }
  }
}

fn pad_into(padded: &mut ImageSet, unpadded: &ImageSet) {
  for y in 0..unpadded.y.height {
    padded.y.row_mut(y)[..unpadded.y.width].copy_from_slice(unpadded.y.row(y));
  }
  for y in 0..unpadded.u.height {
    padded.u.row_mut(y)[..unpadded.u.width].copy_from_slice(unpadded.u.row(y));
    padded.v.row_mut(y)[..unpadded.v.width].copy_from_slice(unpadded.v.row(y));
  }
  replicate_edge(&mut padded.y, unpadded.y.width, unpadded.y.height);
  replicate_edge(&mut padded.u, unpadded.u.width, unpadded.u.height);
  replicate_edge(&mut padded.v, unpadded.v.width, unpadded.v.height);
}

fn crop(padded: &ImageSet, width: usize, height: usize) -> ImageSet {
  let mut out = ImageSet::new(width, height);
  for y in 0..height {
    out.y.row_mut(y).copy_from_slice(&padded.y.row(y)[..width]);
  }
  for y in 0..height / 2 {
    out.u.row_mut(y).copy_from_slice(&padded.u.row(y)[..width / 2]);
    out.v.row_mut(y).copy_from_slice(&padded.v.row(y)[..width / 2]);
  }
  out
}

fn ring_slot(frame_index: u32, offset: u8, ring_len: usize) -> usize {
  let r = ring_len as i64;
  ((frame_index as i64 - offset as i64).rem_euclid(r)) as usize
}

pub struct Session {
  cfg: Config,
  quality: u8,

  allocated: bool,
  header_emitted: bool,
  header_validated: bool,

  width: usize,
  height: usize,
  width_padded: usize,
  height_padded: usize,
  width_in_blocks: usize,
  height_in_blocks: usize,

  frame_index: u32,
  next_frame_type: FrameType,
  last_dest_index: Option<usize>,

  input: ImageSet,
  output: ImageSet,
  transform: ImageSet,
  ring: Vec<ImageSet>,

  descriptors: Vec<BlockDescriptor>,
  abac: Abac,
}

impl Session {
  pub fn new(cfg: Config) -> Self {
    let quality = clip_range(cfg.default_quality as i32, 1, 31) as u8;
    Self {
      cfg,
      quality,
      allocated: false,
      header_emitted: false,
      header_validated: false,
      width: 0,
      height: 0,
      width_padded: 0,
      height_padded: 0,
      width_in_blocks: 0,
      height_in_blocks: 0,
      frame_index: 0,
      next_frame_type: FrameType::Intra,
      last_dest_index: None,
      input: ImageSet::new(0, 0),
      output: ImageSet::new(0, 0),
      transform: ImageSet::new(0, 0),
      ring: Vec::new(),
      descriptors: Vec::new(),
      abac: Abac::new(),
    }
  }

  pub fn clear(&mut self) {
    self.allocated = false;
    self.header_emitted = false;
    self.header_validated = false;
    self.frame_index = 0;
    self.next_frame_type = FrameType::Intra;
    self.last_dest_index = None;
    self.abac.clear();
    self.ring.clear();
    self.descriptors.clear();
  }

  pub fn insert_intra(&mut self) {
    self.next_frame_type = FrameType::Intra;
  }

  pub fn set_quality(&mut self, quality: u8) {
    self.quality = clip_range(quality as i32, 1, 31) as u8;
  }

  fn allocate(&mut self, width: usize, height: usize) -> EvxResult<()> {
    if width == 0 || height == 0 || width % 2 != 0 || height % 2 != 0 {
      return Err(EvxError::InvalidArg("frame dimensions must be even and non-zero".into()));
    }
    self.width = width;
    self.height = height;
    self.width_padded = round_up_16(width);
    self.height_padded = round_up_16(height);
    self.width_in_blocks = self.width_padded / 16;
    self.height_in_blocks = self.height_padded / 16;

    self.input = ImageSet::new(self.width_padded, self.height_padded);
    self.output = ImageSet::new(self.width_padded, self.height_padded);
    self.transform = ImageSet::new(self.width_padded, self.height_padded);
    self.ring = (0..self.cfg.reference_frame_count).map(|_| ImageSet::new(self.width_padded, self.height_padded)).collect();
    self.descriptors = vec![BlockDescriptor::empty(); self.width_in_blocks * self.height_in_blocks];

    if !self.cfg.enable_chroma {
      // Chroma planes are never written when disabled; seed them to the
      // neutral (colorless) value instead of leaving them at zero.
      self.input.u.fill(CHROMINANCE_NEUTRAL);
      self.input.v.fill(CHROMINANCE_NEUTRAL);
      self.output.u.fill(CHROMINANCE_NEUTRAL);
      self.output.v.fill(CHROMINANCE_NEUTRAL);
      for r in &mut self.ring {
        r.u.fill(CHROMINANCE_NEUTRAL);
        r.v.fill(CHROMINANCE_NEUTRAL);
      }
    }

    self.allocated = true;
    Ok(())
  }

  fn slice_params(&self) -> SliceParams {
    SliceParams { width_blocks: self.width_in_blocks, height_blocks: self.height_in_blocks, reference_count: self.cfg.reference_frame_count }
  }

  fn write_header(&mut self, out: &mut impl Write) -> EvxResult<()> {
    out.write_all(MAGIC).map_err(|_| EvxError::CapacityLimit)?;
    write_u16le(out, HEADER_SIZE)?;
    write_u8(out, self.cfg.reference_frame_count as u8)?;
    write_u16le(out, VERSION)?;
    write_u16le(out, self.width as u16)?;
    write_u16le(out, self.height as u16)?;
    self.header_emitted = true;
    info!("emitted stream header: {}x{}, {} references", self.width, self.height, self.cfg.reference_frame_count);
    Ok(())
  }

  // Reads and validates the stream header if it hasn't been read yet,
  // allocating the session's frame buffers from the dimensions it carries.
  // Idempotent: a second call just returns the already-known dimensions,
  // so the decode CLI can call this up front to size its output buffer
  // before the first `decode()` call.
  pub fn read_stream_header(&mut self, input: &mut impl Read) -> EvxResult<(usize, usize)> {
    if !self.header_validated {
      self.read_header(input)?;
    }
    Ok((self.width, self.height))
  }

  fn read_header(&mut self, input: &mut impl Read) -> EvxResult<()> {
    let mut magic = [0u8; 4];
    input.read_exact(&mut magic).map_err(|_| EvxError::InvalidResource("truncated stream header".into()))?;
    if &magic != MAGIC {
      return Err(EvxError::InvalidResource("bad stream magic".into()));
    }
    let size = read_u16le(input)?;
    if size != HEADER_SIZE {
      return Err(EvxError::InvalidResource("unexpected header size".into()));
    }
    let ref_count = read_u8(input)?;
    if ref_count as usize != self.cfg.reference_frame_count {
      return Err(EvxError::InvalidResource("reference count mismatch with configured session".into()));
    }
    let version = read_u16le(input)?;
    if version != VERSION {
      return Err(EvxError::InvalidResource("unsupported stream version".into()));
    }
    let width = read_u16le(input)? as usize;
    let height = read_u16le(input)? as usize;
    self.allocate(width, height)?;
    self.header_validated = true;
    info!("validated stream header: {}x{}, {} references", width, height, ref_count);
    Ok(())
  }

  fn gather_references(&self, dest_index: usize) -> Vec<ImageSet> {
    if self.cfg.reference_frame_count <= 1 {
      return Vec::new();
    }
    (1..self.cfg.reference_frame_count)
      .map(|k| {
        let idx = ring_slot(self.frame_index, k as u8, self.cfg.reference_frame_count);
        if idx == dest_index {
          self.ring[dest_index].clone()
        } else {
          self.ring[idx].clone()
        }
      })
      .collect()
  }

  fn encode_slice(&mut self, frame_type: FrameType, dest_index: usize) {
    let references_owned = self.gather_references(dest_index);
    let references: Vec<&ImageSet> = references_owned.iter().collect();
    let frame_is_inter = frame_type == FrameType::Inter && self.cfg.allow_inter_frames;
    let classify_refs: &[&ImageSet] = if frame_is_inter { &references } else { &[] };

    let mut idx = 0;
    for by in 0..self.height_in_blocks {
      for bx in 0..self.width_in_blocks {
        let sx = bx * 16;
        let sy = by * 16;
        let classification = classify_block(&self.input, sx, sy, self.quality, classify_refs);
        let desc = encode_macroblock(
          &self.cfg, self.quality, &self.input,
          &mut self.ring[dest_index], &references,
          &mut self.transform, &mut self.output,
          bx, by, classification.descriptor,
        );
        self.descriptors[idx] = desc;
        idx += 1;
      }
    }
  }

  fn decode_slice(&mut self, dest_index: usize) {
    let references_owned = self.gather_references(dest_index);
    let references: Vec<&ImageSet> = references_owned.iter().collect();

    let mut idx = 0;
    for by in 0..self.height_in_blocks {
      for bx in 0..self.width_in_blocks {
        let d = self.descriptors[idx];
        decode_macroblock(&self.cfg, &self.output, &mut self.ring[dest_index], &references, &mut self.transform, bx, by, &d);
        idx += 1;
      }
    }
  }

  fn advance_frame_bookkeeping(&mut self) {
    self.frame_index += 1;
    if !self.cfg.allow_inter_frames {
      self.next_frame_type = FrameType::Intra;
    } else if self.cfg.periodic_intra_rate != 0 && self.frame_index % self.cfg.periodic_intra_rate == 0 {
      self.next_frame_type = FrameType::Intra;
      info!("periodic intra refresh scheduled at frame {}", self.frame_index);
    } else {
      self.next_frame_type = FrameType::Inter;
    }
  }

  pub fn encode(&mut self, rgb: &[u8], width: usize, height: usize, out: &mut impl Write) -> EvxResult<()> {
    if self.allocated && (width != self.width || height != self.height) {
      warn!("frame {}x{} does not match session dimensions {}x{}", width, height, self.width, self.height);
      return Err(EvxError::InvalidResource("frame dimensions changed mid-stream".into()));
    }
    if !self.allocated {
      self.allocate(width, height)?;
    }
    if !self.header_emitted {
      self.write_header(out)?;
    }
    if rgb.len() != width * height * 3 {
      return Err(EvxError::InvalidArg("rgb buffer does not match width*height*3".into()));
    }

    let mut rgb_image = RgbImage::new(width, height);
    rgb_image.data.copy_from_slice(rgb);
    let mut unpadded = ImageSet::new(width, height);
    rgb_to_yuv(&rgb_image, &mut unpadded)?;
    pad_into(&mut self.input, &unpadded);

    let frame_type = self.next_frame_type;
    let dest_index = ring_slot(self.frame_index, 0, self.cfg.reference_frame_count);
    debug!("encoding frame {} as {:?} into ring slot {}", self.frame_index, frame_type, dest_index);

    self.encode_slice(frame_type, dest_index);

    write_u8(out, frame_type.to_u8())?;
    write_u32le(out, self.frame_index)?;
    write_u16le(out, self.quality as u16)?;

    self.abac.clear();
    let mut slice_bits = BitBuffer::new((self.width_padded * self.height_padded * 2 + 4096) * 8);
    serialize_slice(&self.slice_params(), &self.descriptors, &self.output, &mut slice_bits, &mut self.abac)
      .map_err(|e| EvxError::ExecutionFailure(Box::new(e)))?;
    let slice_bytes = slice_bits.as_bytes();
    write_u32le(out, slice_bytes.len() as u32)?;
    out.write_all(slice_bytes).map_err(|_| EvxError::CapacityLimit)?;

    if self.cfg.enable_deblocking {
      deblock_image_set(&mut self.ring[dest_index], &self.descriptors);
    }
    self.last_dest_index = Some(dest_index);

    self.advance_frame_bookkeeping();
    Ok(())
  }

  pub fn decode(&mut self, input: &mut impl Read, rgb_out: &mut [u8]) -> EvxResult<()> {
    if !self.header_validated {
      self.read_header(input)?;
    }
    if rgb_out.len() != self.width * self.height * 3 {
      return Err(EvxError::InvalidArg("rgb_out buffer does not match session dimensions".into()));
    }

    let frame_type_byte = read_u8(input)?;
    let frame_type = FrameType::from_u8(frame_type_byte).ok_or_else(|| EvxError::InvalidResource("unknown frame type".into()))?;
    let frame_index = read_u32le(input)?;
    self.quality = read_u16le(input)? as u8;
    let slice_len = read_u32le(input)? as usize;
    let mut slice_bytes = vec![0u8; slice_len];
    input.read_exact(&mut slice_bytes).map_err(|_| EvxError::InvalidResource("truncated slice payload".into()))?;

    self.frame_index = frame_index;
    let dest_index = ring_slot(self.frame_index, 0, self.cfg.reference_frame_count);
    debug!("decoding frame {} as {:?} into ring slot {}", frame_index, frame_type, dest_index);

    self.abac.clear();
    let num_blocks = self.width_in_blocks * self.height_in_blocks;
    self.descriptors = deserialize_slice(&self.slice_params(), num_blocks, &slice_bytes, &mut self.output, &mut self.abac)
      .map_err(|e| EvxError::ExecutionFailure(Box::new(e)))?;

    self.decode_slice(dest_index);

    if self.cfg.enable_deblocking {
      deblock_image_set(&mut self.ring[dest_index], &self.descriptors);
    }
    self.last_dest_index = Some(dest_index);

    let cropped = crop(&self.ring[dest_index], self.width, self.height);
    let mut rgb_image = RgbImage::new(self.width, self.height);
    yuv_to_rgb(&cropped, &mut rgb_image)?;
    rgb_out.copy_from_slice(&rgb_image.data);

    self.advance_frame_bookkeeping();
    Ok(())
  }

  pub fn peek(&self, state: PeekState, buffer: &mut [u8]) -> EvxResult<()> {
    let dest_index = self.last_dest_index.ok_or_else(|| EvxError::InvalidResource("no frame has been processed yet".into()))?;
    if buffer.len() != self.width * self.height * 3 {
      return Err(EvxError::InvalidArg("peek buffer does not match session dimensions".into()));
    }

    match state {
      PeekState::Source => {
        let cropped = crop(&self.input, self.width, self.height);
        let mut rgb = RgbImage::new(self.width, self.height);
        yuv_to_rgb(&cropped, &mut rgb)?;
        buffer.copy_from_slice(&rgb.data);
      }
      PeekState::Destination => {
        let cropped = crop(&self.ring[dest_index], self.width, self.height);
        let mut rgb = RgbImage::new(self.width, self.height);
        yuv_to_rgb(&cropped, &mut rgb)?;
        buffer.copy_from_slice(&rgb.data);
      }
      PeekState::BlockTable => {
        for by in 0..self.height_in_blocks {
          for bx in 0..self.width_in_blocks {
            let d = self.descriptors[by * self.width_in_blocks + bx];
            let color = (
              if d.block_type.is_intra() { 255 } else { 0 },
              if d.block_type.is_motion() { 255 } else { 0 },
              if d.block_type.is_copy() { 255 } else { 0 },
            );
            self.paint_block(buffer, bx, by, color);
          }
        }
      }
      PeekState::QuantTable => {
        for by in 0..self.height_in_blocks {
          for bx in 0..self.width_in_blocks {
            let d = self.descriptors[by * self.width_in_blocks + bx];
            let color = if d.is_copy() {
              (255, 0, 0)
            } else {
              let shade = clip_range(255 - 15 * d.q_index as i32, 0, 255) as u8;
              (shade, shade, shade)
            };
            self.paint_block(buffer, bx, by, color);
          }
        }
      }
      PeekState::BlockVariance => {
        for by in 0..self.height_in_blocks {
          for bx in 0..self.width_in_blocks {
            let d = self.descriptors[by * self.width_in_blocks + bx];
            let color = if d.is_copy() {
              (255, 0, 0)
            } else {
              let shade = clip_range((d.variance / 30) as i32, 0, 255) as u8;
              (shade, shade, shade)
            };
            self.paint_block(buffer, bx, by, color);
          }
        }
      }
      PeekState::SpmpTable => {
        for by in 0..self.height_in_blocks {
          for bx in 0..self.width_in_blocks {
            let d = self.descriptors[by * self.width_in_blocks + bx];
            let color = if !d.sp_pred {
              (0, 0, 0)
            } else {
              (0, 255 * d.sp_amount, 255 * (1 - d.sp_amount))
            };
            self.paint_block(buffer, bx, by, color);
          }
        }
      }
    }
    Ok(())
  }

  fn paint_block(&self, buffer: &mut [u8], bx: usize, by: usize, color: (u8, u8, u8)) {
    let x0 = bx * 16;
    let y0 = by * 16;
    for y in y0..(y0 + 16).min(self.height) {
      for x in x0..(x0 + 16).min(self.width) {
        let idx = (y * self.width + x) * 3;
        buffer[idx] = color.0;
        buffer[idx + 1] = color.1;
        buffer[idx + 2] = color.2;
      }
    }
  }
}
