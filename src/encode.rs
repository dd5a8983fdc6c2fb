// Per-macroblock encode pipeline. Builds the residual (or, for copy block
// types, nothing at all) against the descriptor the classifier already
// filled in, quantizes it, then immediately runs the decode pipeline over
// the result to reconstruct into the current ring slot — see decode.rs.
// This mirrors encode.cpp's `encode_slice` using the decoder frontend as
// its own reverse pipeline for reference-ring parity.

use crate::config::Config;
use crate::decode::decode_macroblock;
use crate::image::ImageSet;
use crate::predict::build_prediction;
use crate::quantize;
use crate::transform;
use crate::types::{BlockDescriptor, INTRA_DEFAULT};

#[allow(clippy::too_many_arguments)]
pub fn encode_macroblock(
  cfg: &Config,
  quality: u8,
  src: &ImageSet,
  recon: &mut ImageSet,
  references: &[&ImageSet],
  transform_buf: &mut ImageSet,
  output: &mut ImageSet,
  bx: usize,
  by: usize,
  mut d: BlockDescriptor,
) -> BlockDescriptor {
  let (x0, y0) = (bx * 16, by * 16);
  let (cx0, cy0) = (bx * 8, by * 8);

  if !d.block_type.is_copy() {
    if d.block_type == INTRA_DEFAULT {
      transform::forward_transform_16x16(&src.y, x0, y0, &mut transform_buf.y, x0, y0);
      if cfg.enable_chroma {
        transform::forward_transform_8x8(&src.u, cx0, cy0, &mut transform_buf.u, cx0, cy0);
        transform::forward_transform_8x8(&src.v, cx0, cy0, &mut transform_buf.v, cx0, cy0);
      }
    } else {
      let reference: &ImageSet = if d.block_type.is_intra() { &*recon } else { references[d.prediction_target as usize - 1] };
      let pred = build_prediction(reference, x0, y0, &d);

      transform::sub_transform_16x16(&src.y, x0, y0, &pred.y, 0, 0, &mut transform_buf.y, x0, y0);
      if cfg.enable_chroma {
        transform::sub_transform_8x8(&src.u, cx0, cy0, &pred.u, 0, 0, &mut transform_buf.u, cx0, cy0);
        transform::sub_transform_8x8(&src.v, cx0, cy0, &pred.v, 0, 0, &mut transform_buf.v, cx0, cy0);
      }
    }

    let layout = quantize::make_layout(&transform_buf.y, &transform_buf.u, &transform_buf.v, x0, y0, cx0, cy0);
    d.q_index = quantize::select_block_qp(cfg, quality, &layout);
    d.variance = quantize::block_variance(&layout);
    quantize::quantize_macroblock(
      cfg, d.block_type, d.q_index,
      &transform_buf.y, &transform_buf.u, &transform_buf.v, x0, y0, cx0, cy0,
      &mut output.y, &mut output.u, &mut output.v,
    );
  }

  decode_macroblock(cfg, output, recon, references, transform_buf, bx, by, &d);
  d
}
