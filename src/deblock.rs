// In-loop deblocking filter. Boundary strength is derived purely from the
// two neighboring blocks' copy-flag state; both luma and chroma traverse
// edges at a uniform step of 8 samples (see DESIGN.md decision 5 — the
// source's single `EVX_DEBLOCK_STEP_SIZE` constant applies to both channels,
// only the macroblock-size used for boundary-strength lookup differs).

use log::trace;

use crate::image::Plane;
use crate::types::BlockDescriptor;
use crate::util::rounded_div;

const STEP_SIZE: usize = 8;

const ALPHA_TABLE: [i32; 32] = [
  0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 2, 2, 3, 3, 4, 5, 6, 7, 8, 9, 10, 12, 14, 16, 18, 20, 22, 24, 26, 29, 32, 35,
];

const BETA_TABLE: [i32; 32] = [
  0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 10, 11,
];

fn compute_average_qp(left: &BlockDescriptor, right: &BlockDescriptor) -> u8 {
  let (left_copy, right_copy) = (left.is_copy(), right.is_copy());
  if !left_copy && !right_copy {
    ((left.q_index as u16 + right.q_index as u16) >> 1) as u8
  } else if !left_copy {
    left.q_index
  } else if !right_copy {
    right.q_index
  } else {
    0
  }
}

fn compute_deblock_strength(left: &BlockDescriptor, right: &BlockDescriptor) -> u8 {
  let (left_copy, right_copy) = (left.is_copy(), right.is_copy());
  if left_copy && right_copy {
    0
  } else if left_copy != right_copy {
    1
  } else {
    2
  }
}

#[allow(clippy::too_many_arguments)]
fn deblock_filter_values(p3: i32, p2: i32, p1: i32, p0: i32, q0: i32, q1: i32, q2: i32, q3: i32, average_qp: u8, strength: u8, is_luma: bool) -> Option<(i32, i32, i32, i32, i32, i32)> {
  let delta_p0q0 = (p0 - q0).abs();
  let delta_p1p0 = (p1 - p0).abs();
  let delta_q1q0 = (q1 - q0).abs();

  let alpha = ALPHA_TABLE[average_qp as usize];
  let beta = BETA_TABLE[average_qp as usize];
  if delta_p0q0 >= alpha || delta_p1p0 >= beta || delta_q1q0 >= beta {
    return None;
  }

  let (mut out_p2, mut out_p1, mut out_p0) = (p2, p1, p0);
  let (mut out_q0, mut out_q1, mut out_q2) = (q0, q1, q2);

  match strength {
    2 => {
      out_p0 = rounded_div(p2 + 2 * p1 + 2 * p0 + 2 * q0 + q1, 8);
      out_p1 = rounded_div(p2 + p1 + p0 + q0, 4);
      out_q0 = rounded_div(p1 + 2 * p0 + 2 * q0 + 2 * q1 + q2, 8);
      out_q1 = rounded_div(p0 + q0 + q1 + q2, 4);
      if is_luma {
        out_p2 = rounded_div(2 * p3 + 3 * p2 + p1 + p0 + q0, 8);
        out_q2 = rounded_div(2 * q3 + 3 * q2 + q1 + q0 + p0, 8);
      }
    }
    1 => {
      out_p0 = rounded_div((q0 + p0) * 4 + p1 - q1, 8);
      out_q0 = rounded_div((q0 + p0) * 4 + q1 - p1, 8);
      if is_luma {
        out_p1 = rounded_div(p2 * 4 + p0 * 2 + q0 * 2, 8);
        out_q1 = rounded_div(q2 * 4 + q0 * 2 + p0 * 2, 8);
      }
    }
    _ => {}
  }

  Some((out_p2, out_p1, out_p0, out_q0, out_q1, out_q2))
}

fn deblock_vertical_edge(plane: &mut Plane, edge_x: usize, start_y: usize, average_qp: u8, strength: u8, is_luma: bool) {
  for row in 0..STEP_SIZE {
    let y = start_y + row;
    let q0 = plane.get(edge_x, y) as i32;
    let q1 = plane.get(edge_x + 1, y) as i32;
    let q2 = plane.get(edge_x + 2, y) as i32;
    let q3 = plane.get(edge_x + 3, y) as i32;
    let p0 = plane.get(edge_x - 1, y) as i32;
    let p1 = plane.get(edge_x - 2, y) as i32;
    let p2 = plane.get(edge_x - 3, y) as i32;
    let p3 = plane.get(edge_x - 4, y) as i32;

    if let Some((np2, np1, np0, nq0, nq1, nq2)) = deblock_filter_values(p3, p2, p1, p0, q0, q1, q2, q3, average_qp, strength, is_luma) {
      plane.set(edge_x - 3, y, np2 as i16);
      plane.set(edge_x - 2, y, np1 as i16);
      plane.set(edge_x - 1, y, np0 as i16);
      plane.set(edge_x, y, nq0 as i16);
      plane.set(edge_x + 1, y, nq1 as i16);
      plane.set(edge_x + 2, y, nq2 as i16);
    }
  }
}

fn deblock_horizontal_edge(plane: &mut Plane, start_x: usize, edge_y: usize, average_qp: u8, strength: u8, is_luma: bool) {
  for col in 0..STEP_SIZE {
    let x = start_x + col;
    let q0 = plane.get(x, edge_y) as i32;
    let q1 = plane.get(x, edge_y + 1) as i32;
    let q2 = plane.get(x, edge_y + 2) as i32;
    let q3 = plane.get(x, edge_y + 3) as i32;
    let p0 = plane.get(x, edge_y - 1) as i32;
    let p1 = plane.get(x, edge_y - 2) as i32;
    let p2 = plane.get(x, edge_y - 3) as i32;
    let p3 = plane.get(x, edge_y - 4) as i32;

    if let Some((np2, np1, np0, nq0, nq1, nq2)) = deblock_filter_values(p3, p2, p1, p0, q0, q1, q2, q3, average_qp, strength, is_luma) {
      plane.set(x, edge_y - 3, np2 as i16);
      plane.set(x, edge_y - 2, np1 as i16);
      plane.set(x, edge_y - 1, np0 as i16);
      plane.set(x, edge_y, nq0 as i16);
      plane.set(x, edge_y + 1, nq1 as i16);
      plane.set(x, edge_y + 2, nq2 as i16);
    }
  }
}

fn macroblock_index(i: usize, j: usize, macroblock_size: usize, width_in_blocks: usize) -> usize {
  (i / macroblock_size) + (j / macroblock_size) * width_in_blocks
}

fn vertical_boundary(i: usize, j: usize, descriptors: &[BlockDescriptor], macroblock_size: usize, width_in_blocks: usize) -> (u8, u8) {
  let left = &descriptors[macroblock_index(i - 1, j, macroblock_size, width_in_blocks)];
  let right = &descriptors[macroblock_index(i, j, macroblock_size, width_in_blocks)];
  (compute_deblock_strength(left, right), compute_average_qp(left, right))
}

fn horizontal_boundary(i: usize, j: usize, descriptors: &[BlockDescriptor], macroblock_size: usize, width_in_blocks: usize) -> (u8, u8) {
  let left = &descriptors[macroblock_index(i, j - 1, macroblock_size, width_in_blocks)];
  let right = &descriptors[macroblock_index(i, j, macroblock_size, width_in_blocks)];
  (compute_deblock_strength(left, right), compute_average_qp(left, right))
}

// `macroblock_size` is the per-channel block edge length (16 for luma, 8 for
// chroma); `descriptors` is always indexed by the canonical 16x16 macroblock
// grid, which lines up because the chroma plane's width is halved in lockstep
// with its macroblock size.
pub fn deblock_plane(plane: &mut Plane, descriptors: &[BlockDescriptor], macroblock_size: usize, is_luma: bool) {
  let width = plane.width;
  let height = plane.height;
  let width_in_blocks = width / macroblock_size;

  let mut i = STEP_SIZE;
  while i < width {
    let (strength, average_qp) = vertical_boundary(i, 0, descriptors, macroblock_size, width_in_blocks);
    trace!("deblock vedge x={i} y=0 strength={strength} qp={average_qp}");
    if strength != 0 {
      deblock_vertical_edge(plane, i, 0, average_qp, strength, is_luma);
    }
    i += STEP_SIZE;
  }

  let mut j = STEP_SIZE;
  while j < height {
    let (strength, average_qp) = horizontal_boundary(0, j, descriptors, macroblock_size, width_in_blocks);
    trace!("deblock hedge x=0 y={j} strength={strength} qp={average_qp}");
    if strength != 0 {
      deblock_horizontal_edge(plane, 0, j, average_qp, strength, is_luma);
    }

    let mut i = STEP_SIZE;
    while i < width {
      let (strength, average_qp) = horizontal_boundary(i, j, descriptors, macroblock_size, width_in_blocks);
      trace!("deblock hedge x={i} y={j} strength={strength} qp={average_qp}");
      if strength != 0 {
        deblock_horizontal_edge(plane, i, j, average_qp, strength, is_luma);
      }

      let (strength, average_qp) = vertical_boundary(i, j, descriptors, macroblock_size, width_in_blocks);
      trace!("deblock vedge x={i} y={j} strength={strength} qp={average_qp}");
      if strength != 0 {
        deblock_vertical_edge(plane, i, j, average_qp, strength, is_luma);
      }

      i += STEP_SIZE;
    }

    j += STEP_SIZE;
  }
}

pub fn deblock_image_set(image: &mut crate::image::ImageSet, descriptors: &[BlockDescriptor]) {
  deblock_plane(&mut image.y, descriptors, 16, true);
  deblock_plane(&mut image.u, descriptors, 8, false);
  deblock_plane(&mut image.v, descriptors, 8, false);
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::{BlockDescriptor, BlockType};

  #[test]
  fn flat_region_stays_flat() {
    let mut plane = Plane::new(32, 32);
    plane.fill(64);
    let mut descriptors = vec![BlockDescriptor::empty(); 4];
    for d in descriptors.iter_mut() {
      d.block_type = BlockType::new(false, true, false);
      d.q_index = 10;
    }
    deblock_plane(&mut plane, &descriptors, 16, true);
    for y in 0..32 {
      for x in 0..32 {
        assert_eq!(plane.get(x, y), 64);
      }
    }
  }
}
