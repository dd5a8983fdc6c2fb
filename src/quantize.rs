// MPEG-style weighted quantization with adaptive per-block qp, plus a
// linear (qp-only) alternate path gated by `Config::linear_quantization`.

use crate::analysis::variance;
use crate::config::Config;
use crate::image::Plane;
use crate::types::BlockType;
use crate::util::{clip_range, log2, rounded_div, sign};

const SCALE_FACTOR: i32 = 16;
pub const MAX_QP: i32 = 31;

pub const INTRA_QM: [i32; 64] = [
   8, 17, 18, 19, 21, 23, 25, 27,
  17, 18, 19, 21, 23, 25, 27, 28,
  20, 21, 22, 23, 24, 26, 28, 30,
  21, 22, 23, 24, 26, 28, 30, 32,
  22, 23, 24, 26, 28, 30, 32, 35,
  23, 24, 26, 28, 30, 32, 35, 38,
  25, 26, 28, 30, 32, 35, 38, 41,
  27, 28, 30, 32, 35, 38, 41, 45,
];

pub const INTER_QM: [i32; 64] = [
  16, 17, 18, 19, 20, 21, 22, 23,
  17, 18, 19, 20, 21, 22, 23, 24,
  18, 19, 20, 21, 22, 23, 24, 25,
  19, 20, 21, 22, 23, 24, 26, 27,
  20, 21, 22, 23, 25, 26, 27, 28,
  21, 22, 23, 24, 26, 27, 28, 30,
  22, 23, 24, 26, 27, 28, 30, 31,
  23, 24, 25, 27, 28, 30, 31, 33,
];

pub fn luma_dc_scale(qp: i32) -> i32 {
  if qp < 5 {
    8
  } else if qp < 9 {
    qp << 1
  } else if qp < 25 {
    qp + 8
  } else {
    (qp << 1) - 16
  }
}

pub fn chroma_dc_scale(qp: i32) -> i32 {
  if qp < 5 {
    8
  } else if qp < 25 {
    (qp + 13) >> 1
  } else {
    qp - 6
  }
}

fn div(rounded: bool, x: i32, d: i32) -> i32 {
  if rounded {
    rounded_div(x, d)
  } else {
    x / d
  }
}

fn quantize_weighted_8x8(cfg: &Config, qm: &[i32; 64], dc_scale_fn: fn(i32) -> i32, qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let qm_value = qm[k + j * 8];
      let source = src.get(x0 + k, y0 + j) as i32;
      let value = div(cfg.rounded_quantization, div(cfg.rounded_quantization, source * SCALE_FACTOR, qm_value), qp << 1);
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
  let dc = div(cfg.rounded_quantization, src.get(x0, y0) as i32, dc_scale_fn(qp));
  dst.set(dx0, dy0, dc as i16);
}

fn quantize_inter_8x8(cfg: &Config, qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let qm_value = INTER_QM[k + j * 8];
      let source = src.get(x0 + k, y0 + j) as i32;
      let qfactor = div(cfg.rounded_quantization, source * SCALE_FACTOR, qm_value);
      let value = div(cfg.rounded_quantization, qfactor - sign(qfactor) * qp, qp << 1);
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
}

fn quantize_linear_8x8(cfg: &Config, qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let source = src.get(x0 + k, y0 + j) as i32;
      let value = div(cfg.rounded_quantization, source, qp << 1);
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
}

fn quantize_inter_linear_8x8(cfg: &Config, qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let source = src.get(x0 + k, y0 + j) as i32;
      let qm_value = source.abs() - (qp >> 1);
      let mut value = div(cfg.rounded_quantization, qm_value, qp << 1);
      value *= sign(source);
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
}

fn inverse_quantize_weighted_8x8(qm: &[i32; 64], dc_scale_fn: fn(i32) -> i32, qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let qm_value = qm[k + j * 8];
      let source = src.get(x0 + k, y0 + j) as i32;
      let value = (2 * source * qm_value * qp) / SCALE_FACTOR;
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
  let dc = src.get(x0, y0) as i32 * dc_scale_fn(qp);
  dst.set(dx0, dy0, dc as i16);
}

fn inverse_quantize_inter_8x8(qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let qm_value = INTER_QM[k + j * 8];
      let source = src.get(x0 + k, y0 + j) as i32;
      let value = (2 * source * qm_value * qp) / SCALE_FACTOR;
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
}

fn inverse_quantize_linear_8x8(qp: u8, src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let qp = qp as i32;
  for j in 0..8 {
    for k in 0..8 {
      let source = src.get(x0 + k, y0 + j) as i32;
      let mut value = 0;
      if source != 0 {
        let mod_qp = (qp + 1) % 2;
        let qm_value = (source.abs() << 1) + 1;
        value = qm_value * qp - mod_qp;
        value *= sign(source);
      }
      dst.set(dx0 + k, dy0 + j, value as i16);
    }
  }
}

// Locations of the four luma 8x8 quadrants and the two chroma 8x8 blocks
// within a macroblock-shaped quantize/dequantize call, expressed as
// (x offset, y offset, is_chroma).
struct MacroblockLayout<'a> {
  y: &'a Plane,
  u: &'a Plane,
  v: &'a Plane,
  x0: usize,
  y0: usize,
  cx0: usize,
  cy0: usize,
}

pub fn quantize_macroblock(cfg: &Config, block_type: BlockType, qp: u8, src_y: &Plane, src_u: &Plane, src_v: &Plane, x0: usize, y0: usize, cx0: usize, cy0: usize, dst_y: &mut Plane, dst_u: &mut Plane, dst_v: &mut Plane) {
  if !cfg.quantization_enabled {
    copy_8x8_quadrants(src_y, x0, y0, dst_y, x0, y0);
    copy_8x8(src_u, cx0, cy0, dst_u, cx0, cy0);
    copy_8x8(src_v, cx0, cy0, dst_v, cx0, cy0);
    return;
  }

  let is_intra = block_type.is_intra() && !block_type.is_motion();

  for (qx, qy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
    if cfg.linear_quantization {
      if is_intra {
        quantize_linear_8x8(cfg, qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
      } else {
        quantize_inter_linear_8x8(cfg, qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
      }
    } else if is_intra {
      quantize_weighted_8x8(cfg, &INTRA_QM, luma_dc_scale, qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
    } else {
      quantize_inter_8x8(cfg, qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
    }
  }

  if cfg.enable_chroma {
    for (src_c, dst_c) in [(src_u, &mut *dst_u), (src_v, &mut *dst_v)] {
      if cfg.linear_quantization {
        if is_intra {
          quantize_linear_8x8(cfg, qp, src_c, cx0, cy0, dst_c, cx0, cy0);
        } else {
          quantize_inter_linear_8x8(cfg, qp, src_c, cx0, cy0, dst_c, cx0, cy0);
        }
      } else if is_intra {
        quantize_weighted_8x8(cfg, &INTRA_QM, chroma_dc_scale, qp, src_c, cx0, cy0, dst_c, cx0, cy0);
      } else {
        quantize_inter_8x8(cfg, qp, src_c, cx0, cy0, dst_c, cx0, cy0);
      }
    }
  }
}

pub fn inverse_quantize_macroblock(cfg: &Config, block_type: BlockType, qp: u8, src_y: &Plane, src_u: &Plane, src_v: &Plane, x0: usize, y0: usize, cx0: usize, cy0: usize, dst_y: &mut Plane, dst_u: &mut Plane, dst_v: &mut Plane) {
  if !cfg.quantization_enabled {
    copy_8x8_quadrants(src_y, x0, y0, dst_y, x0, y0);
    copy_8x8(src_u, cx0, cy0, dst_u, cx0, cy0);
    copy_8x8(src_v, cx0, cy0, dst_v, cx0, cy0);
    return;
  }

  let is_intra = block_type.is_intra() && !block_type.is_motion();

  for (qx, qy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
    if cfg.linear_quantization {
      inverse_quantize_linear_8x8(qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
    } else if is_intra {
      inverse_quantize_weighted_8x8(&INTRA_QM, luma_dc_scale, qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
    } else {
      inverse_quantize_inter_8x8(qp, src_y, x0 + qx, y0 + qy, dst_y, x0 + qx, y0 + qy);
    }
  }

  if cfg.enable_chroma {
    for (src_c, dst_c) in [(src_u, &mut *dst_u), (src_v, &mut *dst_v)] {
      if cfg.linear_quantization {
        inverse_quantize_linear_8x8(qp, src_c, cx0, cy0, dst_c, cx0, cy0);
      } else if is_intra {
        inverse_quantize_weighted_8x8(&INTRA_QM, chroma_dc_scale, qp, src_c, cx0, cy0, dst_c, cx0, cy0);
      } else {
        inverse_quantize_inter_8x8(qp, src_c, cx0, cy0, dst_c, cx0, cy0);
      }
    }
  }
}

fn copy_8x8(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  for j in 0..8 {
    for i in 0..8 {
      dst.set(dx0 + i, dy0 + j, src.get(x0 + i, y0 + j));
    }
  }
}

fn copy_8x8_quadrants(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  for (qx, qy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
    copy_8x8(src, x0 + qx, y0 + qy, dst, dx0 + qx, dy0 + qy);
  }
}

// Luma only, 16x16 -- matches `compute_block_variance2`, which never
// touches chroma.
fn gather_samples(layout: &MacroblockLayout) -> Vec<i32> {
  let mut samples = Vec::with_capacity(16 * 16);
  for (qx, qy) in [(0, 0), (8, 0), (0, 8), (8, 8)] {
    for j in 0..8 {
      for i in 0..8 {
        samples.push(layout.y.get(layout.x0 + qx + i, layout.y0 + qy + j) as i32);
      }
    }
  }
  samples
}

// Energy of a macroblock's luma transform-domain samples, recorded on the
// block descriptor for the `BlockVariance` debug view.
pub fn block_variance(layout: &MacroblockLayout) -> u32 {
  variance(&gather_samples(layout))
}

// Adaptive qp selection: scales the user-chosen quality halfway toward an
// index derived from the candidate block's luma transform-domain variance.
// Disabled by `Config::adaptive_quantization`, in which case qp is simply
// the session quality.
pub fn select_block_qp(cfg: &Config, quality: u8, layout: &MacroblockLayout) -> u8 {
  if !cfg.quantization_enabled {
    return 0;
  }
  if !cfg.adaptive_quantization {
    return quality;
  }

  let v = variance(&gather_samples(layout));
  let quality = quality as i32;
  let idx = clip_range((log2(v) / 2) as i32, 1, MAX_QP);

  let qp = if idx > quality {
    quality + ((idx - quality) >> 1)
  } else if idx < quality {
    quality - ((quality - idx) >> 1)
  } else {
    quality
  };
  clip_range(qp, 1, MAX_QP) as u8
}

pub fn make_layout<'a>(y: &'a Plane, u: &'a Plane, v: &'a Plane, x0: usize, y0: usize, cx0: usize, cy0: usize) -> MacroblockLayout<'a> {
  MacroblockLayout { y, u, v, x0, y0, cx0, cy0 }
}
