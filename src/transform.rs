// Fixed-point 2D DCT-II, 8x8 only. Luma's 16x16 transform is composed of
// four independent 8x8 transforms over the four quadrants (see
// macroblock.rs) -- there is no cross-quadrant mixing, and no call site
// anywhere in this codec ever needs a native 4x4 or 16x16 kernel.

use crate::image::Plane;
use crate::util::rounded_div;
use crate::xftables::TRIG_8X8;

fn forward_transform_line(src: &[i32; 8]) -> [i32; 8] {
  let mut dst = [0i32; 8];
  for i in 0..8 {
    let mut total: i64 = 0;
    for k in 0..8 {
      total += src[k] as i64 * TRIG_8X8[i * 8 + k] as i64;
    }
    let scaled = if i == 0 { (total * 45) / 128 } else { total / 2 };
    dst[i] = rounded_div(scaled as i32, 128);
  }
  dst
}

// Each frequency coefficient `k` carries its own C(k) normalization, so the
// scale decision is applied per term (keyed on the source index k) before
// accumulating, not once to the summed total.
fn inverse_transform_line(src: &[i32; 8]) -> [i32; 8] {
  let mut dst = [0i32; 8];
  for i in 0..8 {
    let mut total: i64 = 0;
    for k in 0..8 {
      let term = src[k] as i64 * TRIG_8X8[k * 8 + i] as i64;
      total += if k == 0 { (term * 45) / 128 } else { term / 2 };
    }
    dst[i] = rounded_div(total as i32, 128);
  }
  dst
}

fn row_pass(block: &mut [[i32; 8]; 8], line: fn(&[i32; 8]) -> [i32; 8]) {
  for row in 0..8 {
    block[row] = line(&block[row]);
  }
}

fn column_pass(block: &mut [[i32; 8]; 8], line: fn(&[i32; 8]) -> [i32; 8]) {
  for col in 0..8 {
    let mut column = [0i32; 8];
    for row in 0..8 {
      column[row] = block[row][col];
    }
    let transformed = line(&column);
    for row in 0..8 {
      block[row][col] = transformed[row];
    }
  }
}

fn dct_8x8(block: &mut [[i32; 8]; 8], forward: bool) {
  if forward {
    row_pass(block, forward_transform_line);
    column_pass(block, forward_transform_line);
  } else {
    // Reverse of the forward order: column pass, then row pass.
    column_pass(block, inverse_transform_line);
    row_pass(block, inverse_transform_line);
  }
}

fn load_block(src: &Plane, x0: usize, y0: usize) -> [[i32; 8]; 8] {
  let mut block = [[0i32; 8]; 8];
  for j in 0..8 {
    for k in 0..8 {
      block[j][k] = src.get(x0 + k, y0 + j) as i32;
    }
  }
  block
}

fn load_block_diff(src: &Plane, x0: usize, y0: usize, sub: &Plane, sx0: usize, sy0: usize) -> [[i32; 8]; 8] {
  let mut block = [[0i32; 8]; 8];
  for j in 0..8 {
    for k in 0..8 {
      block[j][k] = src.get(x0 + k, y0 + j) as i32 - sub.get(sx0 + k, sy0 + j) as i32;
    }
  }
  block
}

fn store_block(block: &[[i32; 8]; 8], dst: &mut Plane, x0: usize, y0: usize) {
  for j in 0..8 {
    for k in 0..8 {
      dst.set(x0 + k, y0 + j, block[j][k] as i16);
    }
  }
}

fn store_block_add(block: &[[i32; 8]; 8], add: &Plane, ax0: usize, ay0: usize, dst: &mut Plane, x0: usize, y0: usize) {
  for j in 0..8 {
    for k in 0..8 {
      let value = block[j][k] + add.get(ax0 + k, ay0 + j) as i32;
      dst.set(x0 + k, y0 + j, value as i16);
    }
  }
}

pub fn forward_transform_8x8(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let mut block = load_block(src, x0, y0);
  dct_8x8(&mut block, true);
  store_block(&block, dst, dx0, dy0);
}

pub fn inverse_transform_8x8(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  let mut block = load_block(src, x0, y0);
  dct_8x8(&mut block, false);
  store_block(&block, dst, dx0, dy0);
}

// DCT(src - sub)
pub fn sub_transform_8x8(
  src: &Plane, x0: usize, y0: usize,
  sub: &Plane, sx0: usize, sy0: usize,
  dst: &mut Plane, dx0: usize, dy0: usize,
) {
  let mut block = load_block_diff(src, x0, y0, sub, sx0, sy0);
  dct_8x8(&mut block, true);
  store_block(&block, dst, dx0, dy0);
}

// IDCT(src) + add
pub fn inverse_transform_add_8x8(
  src: &Plane, x0: usize, y0: usize,
  add: &Plane, ax0: usize, ay0: usize,
  dst: &mut Plane, dx0: usize, dy0: usize,
) {
  let mut block = load_block(src, x0, y0);
  dct_8x8(&mut block, false);
  store_block_add(&block, add, ax0, ay0, dst, dx0, dy0);
}

// Four-quadrant composition used for luma's 16x16 region. `offs` gives the
// (x,y) base of the 16x16 region in each plane.
const QUADRANTS: [(usize, usize); 4] = [(0, 0), (8, 0), (0, 8), (8, 8)];

pub fn forward_transform_16x16(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  for (qx, qy) in QUADRANTS {
    forward_transform_8x8(src, x0 + qx, y0 + qy, dst, dx0 + qx, dy0 + qy);
  }
}

pub fn inverse_transform_16x16(src: &Plane, x0: usize, y0: usize, dst: &mut Plane, dx0: usize, dy0: usize) {
  for (qx, qy) in QUADRANTS {
    inverse_transform_8x8(src, x0 + qx, y0 + qy, dst, dx0 + qx, dy0 + qy);
  }
}

pub fn sub_transform_16x16(
  src: &Plane, x0: usize, y0: usize,
  sub: &Plane, sx0: usize, sy0: usize,
  dst: &mut Plane, dx0: usize, dy0: usize,
) {
  for (qx, qy) in QUADRANTS {
    sub_transform_8x8(src, x0 + qx, y0 + qy, sub, sx0 + qx, sy0 + qy, dst, dx0 + qx, dy0 + qy);
  }
}

pub fn inverse_transform_add_16x16(
  src: &Plane, x0: usize, y0: usize,
  add: &Plane, ax0: usize, ay0: usize,
  dst: &mut Plane, dx0: usize, dy0: usize,
) {
  for (qx, qy) in QUADRANTS {
    inverse_transform_add_8x8(src, x0 + qx, y0 + qy, add, ax0 + qx, ay0 + qy, dst, dx0 + qx, dy0 + qy);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn forward_then_inverse_preserves_flat_block() {
    let mut src = Plane::new(8, 8);
    for y in 0..8 {
      for x in 0..8 {
        src.set(x, y, 42);
      }
    }
    let mut coeffs = Plane::new(8, 8);
    forward_transform_8x8(&src, 0, 0, &mut coeffs, 0, 0);
    // A flat block should have all energy in the DC coefficient.
    assert_ne!(coeffs.get(0, 0), 0);
    for y in 0..8 {
      for x in 0..8 {
        if x != 0 || y != 0 {
          assert_eq!(coeffs.get(x, y), 0);
        }
      }
    }

    let mut recon = Plane::new(8, 8);
    inverse_transform_8x8(&coeffs, 0, 0, &mut recon, 0, 0);
    for y in 0..8 {
      for x in 0..8 {
        assert!((recon.get(x, y) as i32 - 42).abs() <= 1);
      }
    }
  }
}
