// Integer-grid hierarchical motion search plus half/quarter-pel refinement.
// One reference plane trio (luma + both chroma) is searched at a time; the
// classifier (classify.rs) drives this once per candidate reference.

use crate::analysis::{mad, sad_16x16, MadInputs};
use crate::image::ImageSet;
use crate::util::rounded_div;

pub const SEARCH_RADIUS: i32 = 16;
pub const SAD_THRESHOLD: u32 = 8 * 1024;

pub fn mad_skip_threshold(quality: u8) -> u32 {
  ((quality as u32) >> 2) + 1
}

// Eight 8-neighbor sub-pel directions, numbered per the fixed bidirectional
// map: top row 0,1,2; middle row 3 (left), 4 (right); bottom row 5,6,7.
pub fn frac_index_from_direction(i: i32, j: i32) -> u8 {
  match (i + 1, j + 1) {
    (0, 0) => 0,
    (1, 0) => 1,
    (2, 0) => 2,
    (0, 1) => 3,
    (2, 1) => 4,
    (0, 2) => 5,
    (1, 2) => 6,
    (2, 2) => 7,
    _ => unreachable!("not a valid 8-neighbor direction"),
  }
}

pub fn direction_from_frac_index(idx: u8) -> (i32, i32) {
  match idx {
    0..=2 => (idx as i32 - 1, -1),
    3 => (-1, 0),
    4 => (1, 0),
    5..=7 => (idx as i32 - 6, 1),
    _ => unreachable!("sp_index out of range"),
  }
}

#[derive(Clone, Copy, Debug)]
pub struct Selection {
  pub best_sad: u32,
  pub best_mad: u32,
  pub best_ssd: u64,
  pub best_x: i32,
  pub best_y: i32,
  pub sp_enabled: bool,
  pub sp_amount: u8,
  pub sp_index: u8,
}

impl Selection {
  fn is_skip(&self, mad_skip: u32) -> bool {
    self.best_mad < mad_skip
  }
}

fn mad_inputs<'a>(img: &'a ImageSet, x: usize, y: usize) -> MadInputs<'a> {
  MadInputs { y: (&img.y, x, y), u: (&img.u, x / 2, y / 2), v: (&img.v, x / 2, y / 2) }
}

// Evaluate a candidate integer position against the running selection,
// following the source's actual tie-break precedence: a plain SAD
// improvement always wins; `sad_threshold` only gates the SAD-tie /
// ssd-tiebreak disjunct, not the plain-improvement one.
fn evaluate_candidate(sel: &mut Selection, src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, cx: i32, cy: i32, mad_skip: u32) {
  if cx < 0 || cy < 0 {
    return;
  }
  let (cx, cy) = (cx as usize, cy as usize);
  if cx + 16 > reference.y.width || cy + 16 > reference.y.height {
    return;
  }

  let candidate_sad = sad_16x16(&src.y, sx, sy, &reference.y, cx, cy);
  let candidate_mad = mad(&mad_inputs(src, sx, sy), &mad_inputs(reference, cx, cy));
  let dx = cx as i32 - sx as i32;
  let dy = cy as i32 - sy as i32;
  let ssd_from_origin = (dx * dx + dy * dy) as u64;

  let is_skip = candidate_mad < mad_skip;

  let replace = if sel.is_skip(mad_skip) {
    is_skip && (candidate_mad < sel.best_mad || (candidate_mad == sel.best_mad && ssd_from_origin < sel.best_ssd))
  } else {
    candidate_sad < sel.best_sad
      || (candidate_sad == sel.best_sad && ssd_from_origin < sel.best_ssd && candidate_sad < SAD_THRESHOLD)
      || is_skip
  };

  if replace {
    sel.best_sad = candidate_sad;
    sel.best_mad = candidate_mad;
    sel.best_ssd = ssd_from_origin;
    sel.best_x = dx;
    sel.best_y = dy;
  }
}

fn logarithmic_refine(sel: &mut Selection, src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, mad_skip: u32, reject_unreconstructed: bool) {
  let mut radius = SEARCH_RADIUS;
  while radius >= 1 {
    let base_x = sx as i32 + sel.best_x;
    let base_y = sy as i32 + sel.best_y;
    for dj in [-radius, 0, radius] {
      for di in [-radius, 0, radius] {
        if di == 0 && dj == 0 {
          continue;
        }
        let cx = base_x + di;
        let cy = base_y + dj;
        if reject_unreconstructed && cy > sy as i32 - 16 && cx > sx as i32 - 16 {
          continue;
        }
        evaluate_candidate(sel, src, sx, sy, reference, cx, cy, mad_skip);
      }
    }
    radius /= 2;
  }
}

// Initial "triangle" scan used only by intra search, sweeping the
// not-yet-reconstructed boundary before logarithmic refinement takes over.
fn triangle_scan(sel: &mut Selection, src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, mad_skip: u32) {
  let r = SEARCH_RADIUS;
  let mut i = -r;
  while i <= r {
    let mut j = -2 * r;
    while j <= 0 {
      let cx = sx as i32 + i;
      let cy = sy as i32 + j;
      if !(cy > sy as i32 - 16 && cx > sx as i32 - 16) {
        evaluate_candidate(sel, src, sx, sy, reference, cx, cy, mad_skip);
      }
      j += r;
    }
    i += r;
  }
}

fn blended_sample(best: i32, neighbor: i32, amount: u8) -> i32 {
  if amount == 0 {
    rounded_div(best + neighbor, 2)
  } else {
    rounded_div(3 * best + neighbor, 4)
  }
}

// Synthesizes a sub-pel-interpolated 16x16 luma / 8x8 chroma block from the
// integer match `best` and its 8-neighbor `nb`, writing the result into
// `dst` at the macroblock's own position (overwriting the plain-copy
// integer prediction already sitting there from the caller).
pub fn synthesize_subpel(reference: &ImageSet, best_x: usize, best_y: usize, nb_x: i32, nb_y: i32, amount: u8, dst: &mut ImageSet, dx0: usize, dy0: usize) {
  for j in 0..16usize {
    for i in 0..16usize {
      let nx = (nb_x + i as i32).clamp(0, reference.y.width as i32 - 1) as usize;
      let ny = (nb_y + j as i32).clamp(0, reference.y.height as i32 - 1) as usize;
      let best = reference.y.get(best_x + i, best_y + j) as i32;
      let nb = reference.y.get(nx, ny) as i32;
      dst.y.set(dx0 + i, dy0 + j, blended_sample(best, nb, amount) as i16);
    }
  }
  let (cbx, cby) = (best_x / 2, best_y / 2);
  let (cdx, cdy) = (dx0 / 2, dy0 / 2);
  for j in 0..8usize {
    for i in 0..8usize {
      let nx = ((nb_x / 2) + i as i32).clamp(0, reference.u.width as i32 - 1) as usize;
      let ny = ((nb_y / 2) + j as i32).clamp(0, reference.u.height as i32 - 1) as usize;
      let best_u = reference.u.get(cbx + i, cby + j) as i32;
      let nb_u = reference.u.get(nx, ny) as i32;
      dst.u.set(cdx + i, cdy + j, blended_sample(best_u, nb_u, amount) as i16);

      let best_v = reference.v.get(cbx + i, cby + j) as i32;
      let nb_v = reference.v.get(nx, ny) as i32;
      dst.v.set(cdx + i, cdy + j, blended_sample(best_v, nb_v, amount) as i16);
    }
  }
}

fn subpel_refine(sel: &mut Selection, src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, mad_skip: u32, reject_unreconstructed: bool) {
  let best_x = (sx as i32 + sel.best_x) as usize;
  let best_y = (sy as i32 + sel.best_y) as usize;

  for amount in [0u8, 1u8] {
    for j in -1..=1 {
      for i in -1..=1 {
        if i == 0 && j == 0 {
          continue;
        }
        let nb_x = best_x as i32 + i;
        let nb_y = best_y as i32 + j;
        if reject_unreconstructed && nb_y > sy as i32 - 16 && nb_x > sx as i32 - 16 {
          continue;
        }
        if nb_x < 0 || nb_y < 0 || (nb_x as usize) + 16 > reference.y.width || (nb_y as usize) + 16 > reference.y.height {
          continue;
        }

        let mut candidate = ImageSet::new(16, 16);
        synthesize_subpel(reference, best_x, best_y, nb_x, nb_y, amount, &mut candidate, 0, 0);

        let candidate_sad = sad_16x16(&src.y, sx, sy, &candidate.y, 0, 0);
        let candidate_mad = mad(&mad_inputs(src, sx, sy), &MadInputs { y: (&candidate.y, 0, 0), u: (&candidate.u, 0, 0), v: (&candidate.v, 0, 0) });
        let is_skip = candidate_mad < mad_skip;

        let replace = if sel.is_skip(mad_skip) {
          is_skip && candidate_mad < sel.best_mad
        } else {
          (candidate_sad < sel.best_sad && candidate_sad < SAD_THRESHOLD) || is_skip
        };

        if replace {
          sel.best_sad = candidate_sad;
          sel.best_mad = candidate_mad;
          sel.sp_enabled = true;
          sel.sp_amount = amount;
          sel.sp_index = frac_index_from_direction(i, j);
        }
      }
    }
  }
}

fn baseline_selection(src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, cx: usize, cy: usize) -> Selection {
  let sad = sad_16x16(&src.y, sx, sy, &reference.y, cx, cy);
  let m = mad(&mad_inputs(src, sx, sy), &mad_inputs(reference, cx, cy));
  Selection { best_sad: sad, best_mad: m, best_ssd: 0, best_x: cx as i32 - sx as i32, best_y: cy as i32 - sy as i32, sp_enabled: false, sp_amount: 0, sp_index: 0 }
}

// Intra search: baseline is the block's own position (the "copy from
// nowhere" self-match), scanned via the triangle pattern then refined
// logarithmically, always rejecting positions in the not-yet-reconstructed
// region of the current frame.
pub fn search_intra(src: &ImageSet, sx: usize, sy: usize, quality: u8) -> Selection {
  let mad_skip = mad_skip_threshold(quality);
  let mut sel = baseline_selection(src, sx, sy, src, sx, sy);
  triangle_scan(&mut sel, src, sx, sy, src, mad_skip);
  logarithmic_refine(&mut sel, src, sx, sy, src, mad_skip, true);
  if !sel.is_skip(mad_skip) {
    subpel_refine(&mut sel, src, sx, sy, src, mad_skip, true);
  }
  sel
}

// Inter search against one reference: baseline is the co-located block,
// full search only runs if that baseline isn't already a skip candidate.
pub fn search_inter(src: &ImageSet, sx: usize, sy: usize, reference: &ImageSet, quality: u8) -> Selection {
  let mad_skip = mad_skip_threshold(quality);
  let mut sel = baseline_selection(src, sx, sy, reference, sx, sy);
  if !sel.is_skip(mad_skip) {
    logarithmic_refine(&mut sel, src, sx, sy, reference, mad_skip, false);
    subpel_refine(&mut sel, src, sx, sy, reference, mad_skip, false);
  }
  sel
}
