// Selects, per macroblock, which of the intra self-search and the inter
// searches (one per reference) wins, and fills in the block descriptor.

use log::trace;

use crate::image::ImageSet;
use crate::motion::{mad_skip_threshold, search_inter, search_intra, Selection};
use crate::types::{BlockDescriptor, BlockType};

pub struct Classification {
  pub descriptor: BlockDescriptor,
  pub selection: Selection,
}

// `references[k-1]` is the reference image set at offset k (k = 1..R-1);
// pass an empty slice to force intra-only classification.
pub fn classify_block(src: &ImageSet, sx: usize, sy: usize, quality: u8, references: &[&ImageSet]) -> Classification {
  let mad_skip = mad_skip_threshold(quality);

  let intra_sel = search_intra(src, sx, sy, quality);
  let mut best_sel = intra_sel;
  let mut best_target: u8 = 0;
  let mut best_is_intra = true;

  for (k, reference) in references.iter().enumerate() {
    let inter_sel = search_inter(src, sx, sy, reference, quality);
    let inter_is_copy = inter_sel.best_mad < mad_skip;
    let best_is_copy = best_sel.best_mad < mad_skip;

    let take_inter = if inter_is_copy != best_is_copy {
      inter_is_copy
    } else {
      inter_sel.best_sad < best_sel.best_sad
    };

    if take_inter {
      best_sel = inter_sel;
      best_target = (k + 1) as u8;
      best_is_intra = false;
    }
  }

  let is_motion = best_sel.best_x != 0 || best_sel.best_y != 0 || best_sel.sp_enabled;
  let is_copy = best_sel.best_mad < mad_skip;

  let descriptor = BlockDescriptor {
    block_type: BlockType::new(best_is_intra, is_motion, is_copy),
    prediction_target: if best_is_intra { 0 } else { best_target },
    motion_x: best_sel.best_x as i16,
    motion_y: best_sel.best_y as i16,
    sp_pred: best_sel.sp_enabled,
    sp_amount: best_sel.sp_amount,
    sp_index: best_sel.sp_index,
    q_index: 0,
    variance: 0,
  };

  trace!(
    "classify ({sx},{sy}): type={:?} target={} mv=({},{}) sp={}",
    descriptor.block_type, descriptor.prediction_target, descriptor.motion_x, descriptor.motion_y, descriptor.sp_pred
  );

  Classification { descriptor, selection: best_sel }
}
