// Per-macroblock reconstruction. Dispatches on `block_type` exactly as
// decode.cpp's `decode_block` does; this same function is also the
// encoder's own reconstruction step (see encode.rs), so the two sides of a
// stream never see divergent reference rings.

use crate::config::Config;
use crate::image::ImageSet;
use crate::predict::{build_prediction, write_prediction};
use crate::quantize;
use crate::transform;
use crate::types::{BlockDescriptor, INTRA_DEFAULT};

#[allow(clippy::too_many_arguments)]
pub fn decode_macroblock(
  cfg: &Config,
  quantized: &ImageSet,
  recon: &mut ImageSet,
  references: &[&ImageSet],
  transform_buf: &mut ImageSet,
  bx: usize,
  by: usize,
  d: &BlockDescriptor,
) {
  let (x0, y0) = (bx * 16, by * 16);
  let (cx0, cy0) = (bx * 8, by * 8);

  if d.block_type.is_copy() {
    let reference: &ImageSet = if d.block_type.is_intra() { &*recon } else { references[d.prediction_target as usize - 1] };
    let pred = build_prediction(reference, x0, y0, d);
    write_prediction(&pred, recon, x0, y0, cfg.enable_chroma);
    return;
  }

  if d.block_type == INTRA_DEFAULT {
    quantize::inverse_quantize_macroblock(
      cfg, d.block_type, d.q_index,
      &quantized.y, &quantized.u, &quantized.v, x0, y0, cx0, cy0,
      &mut transform_buf.y, &mut transform_buf.u, &mut transform_buf.v,
    );
    transform::inverse_transform_16x16(&transform_buf.y, x0, y0, &mut recon.y, x0, y0);
    if cfg.enable_chroma {
      transform::inverse_transform_8x8(&transform_buf.u, cx0, cy0, &mut recon.u, cx0, cy0);
      transform::inverse_transform_8x8(&transform_buf.v, cx0, cy0, &mut recon.v, cx0, cy0);
    }
    return;
  }

  let reference: &ImageSet = if d.block_type.is_intra() { &*recon } else { references[d.prediction_target as usize - 1] };
  let pred = build_prediction(reference, x0, y0, d);

  quantize::inverse_quantize_macroblock(
    cfg, d.block_type, d.q_index,
    &quantized.y, &quantized.u, &quantized.v, x0, y0, cx0, cy0,
    &mut transform_buf.y, &mut transform_buf.u, &mut transform_buf.v,
  );
  transform::inverse_transform_add_16x16(&transform_buf.y, x0, y0, &pred.y, 0, 0, &mut recon.y, x0, y0);
  if cfg.enable_chroma {
    transform::inverse_transform_add_8x8(&transform_buf.u, cx0, cy0, &pred.u, 0, 0, &mut recon.u, cx0, cy0);
    transform::inverse_transform_add_8x8(&transform_buf.v, cx0, cy0, &pred.v, 0, 0, &mut recon.v, cx0, cy0);
  }
}
