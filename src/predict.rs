// Shared macroblock prediction fetch used by both the encode and decode
// pipelines. Mirrors macroblock.h's `create_macroblock` /
// `create_subpixel_macroblock`: intra motion reads from the current,
// partially-reconstructed ring slot; inter motion reads from a fully
// decoded prior reference. Both resolve through this one path, since the
// descriptor alone (motion vector, sub-pel fields) doesn't say which.

use crate::image::ImageSet;
use crate::motion::{direction_from_frac_index, synthesize_subpel};
use crate::types::BlockDescriptor;

fn copy_block(reference: &ImageSet, x0: usize, y0: usize, dst: &mut ImageSet) {
  for j in 0..16 {
    for i in 0..16 {
      dst.y.set(i, j, reference.y.get(x0 + i, y0 + j));
    }
  }
  let (cx0, cy0) = (x0 / 2, y0 / 2);
  for j in 0..8 {
    for i in 0..8 {
      dst.u.set(i, j, reference.u.get(cx0 + i, cy0 + j));
      dst.v.set(i, j, reference.v.get(cx0 + i, cy0 + j));
    }
  }
}

// Resolves the predicted 16x16 luma / 8x8 chroma macroblock named by `d`'s
// motion fields within `reference`, at `(x0, y0)` the block's own luma
// position. Valid for every non-intra-default block type, including
// zero-motion ones (motion_x/y and sp_pred are 0/false there, so this
// degrades to a plain co-located fetch).
pub fn build_prediction(reference: &ImageSet, x0: usize, y0: usize, d: &BlockDescriptor) -> ImageSet {
  let ix = (x0 as i32 + d.motion_x as i32) as usize;
  let iy = (y0 as i32 + d.motion_y as i32) as usize;

  let mut pred = ImageSet::new(16, 16);
  if d.sp_pred {
    let (di, dj) = direction_from_frac_index(d.sp_index);
    let nb_x = ix as i32 + di;
    let nb_y = iy as i32 + dj;
    synthesize_subpel(reference, ix, iy, nb_x, nb_y, d.sp_amount, &mut pred, 0, 0);
  } else {
    copy_block(reference, ix, iy, &mut pred);
  }
  pred
}

pub fn write_prediction(pred: &ImageSet, recon: &mut ImageSet, x0: usize, y0: usize, enable_chroma: bool) {
  for j in 0..16 {
    for i in 0..16 {
      recon.y.set(x0 + i, y0 + j, pred.y.get(i, j));
    }
  }
  if enable_chroma {
    let (cx0, cy0) = (x0 / 2, y0 / 2);
    for j in 0..8 {
      for i in 0..8 {
        recon.u.set(cx0 + i, cy0 + j, pred.u.get(i, j));
        recon.v.set(cx0 + i, cy0 + j, pred.v.get(i, j));
      }
    }
  }
}
