// RGB <-> YUV 4:2:0 color space conversion. Luma is computed per pixel;
// chroma is accumulated over each 2x2 pixel block and averaged with
// rounding, matching the shift-baked-into-the-sum trick of summing four
// already-offset chroma samples and dividing by four in one step.

use crate::error::{EvxError, EvxResult};
use crate::image::{ImageSet, RgbImage};

const LUMINANCE_SHIFT: i32 = 16;
const CHROMINANCE_SHIFT: i32 = 128;

fn luma(r: u8, g: u8, b: u8) -> i16 {
  let (r, g, b) = (r as i32, g as i32, b as i32);
  (((77 * r + 150 * g + 29 * b + 128) >> 8) + LUMINANCE_SHIFT) as i16
}

fn chroma_u_raw(r: i32, g: i32, b: i32) -> i32 {
  (-43 * r - 85 * g + 128 * b + 128) / 256
}

fn chroma_v_raw(r: i32, g: i32, b: i32) -> i32 {
  (128 * r - 107 * g - 21 * b + 128) / 256
}

fn saturate(v: i32) -> u8 {
  v.clamp(0, 255) as u8
}

fn check_even_dims(width: usize, height: usize) -> EvxResult<()> {
  if width % 2 != 0 || height % 2 != 0 {
    return Err(EvxError::InvalidResource("conversion requires even image dimensions".into()));
  }
  Ok(())
}

pub fn rgb_to_yuv(src: &RgbImage, dest: &mut ImageSet) -> EvxResult<()> {
  let width = src.width.min(dest.y.width).min(dest.u.width * 2).min(dest.v.width * 2);
  let height = src.height.min(dest.y.height).min(dest.u.height * 2).min(dest.v.height * 2);
  check_even_dims(width, height)?;

  for by in (0..height).step_by(2) {
    for bx in (0..width).step_by(2) {
      let (r00, g00, b00) = src.pixel(bx, by);
      let (r01, g01, b01) = src.pixel(bx + 1, by);
      let (r10, g10, b10) = src.pixel(bx, by + 1);
      let (r11, g11, b11) = src.pixel(bx + 1, by + 1);

      dest.y.set(bx, by, luma(r00, g00, b00));
      dest.y.set(bx + 1, by, luma(r01, g01, b01));
      dest.y.set(bx, by + 1, luma(r10, g10, b10));
      dest.y.set(bx + 1, by + 1, luma(r11, g11, b11));

      let samples = [(r00, g00, b00), (r01, g01, b01), (r10, g10, b10), (r11, g11, b11)];
      let mut u_acc = 0i32;
      let mut v_acc = 0i32;
      for &(r, g, b) in &samples {
        let (r, g, b) = (r as i32, g as i32, b as i32);
        u_acc += chroma_u_raw(r, g, b) + CHROMINANCE_SHIFT;
        v_acc += chroma_v_raw(r, g, b) + CHROMINANCE_SHIFT;
      }

      dest.u.set(bx / 2, by / 2, ((u_acc + 2) >> 2) as i16);
      dest.v.set(bx / 2, by / 2, ((v_acc + 2) >> 2) as i16);
    }
  }
  Ok(())
}

pub fn yuv_to_rgb(src: &ImageSet, dest: &mut RgbImage) -> EvxResult<()> {
  let width = dest.width.min(src.y.width).min(src.u.width * 2).min(src.v.width * 2);
  let height = dest.height.min(src.y.height).min(src.u.height * 2).min(src.v.height * 2);
  check_even_dims(width, height)?;

  for by in (0..height).step_by(2) {
    for bx in (0..width).step_by(2) {
      let u = src.u.get(bx / 2, by / 2) as i32 - CHROMINANCE_SHIFT;
      let v = src.v.get(bx / 2, by / 2) as i32 - CHROMINANCE_SHIFT;

      for &(dx, dy) in &[(0usize, 0usize), (1, 0), (0, 1), (1, 1)] {
        let y = src.y.get(bx + dx, by + dy) as i32 - LUMINANCE_SHIFT;
        let r = saturate((256 * y + 358 * v + 128) >> 8);
        let g = saturate((256 * y - 88 * u - 182 * v + 128) >> 8);
        let b = saturate((256 * y + 452 * u + 128) >> 8);
        dest.set_pixel(bx + dx, by + dy, (r, g, b));
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn gray_round_trips_close() {
    let mut rgb = RgbImage::new(4, 4);
    for y in 0..4 {
      for x in 0..4 {
        rgb.set_pixel(x, y, (128, 128, 128));
      }
    }
    let mut yuv = ImageSet::new(4, 4);
    rgb_to_yuv(&rgb, &mut yuv).unwrap();

    let mut back = RgbImage::new(4, 4);
    yuv_to_rgb(&yuv, &mut back).unwrap();

    let (r, g, b) = back.pixel(1, 1);
    assert!((r as i32 - 128).abs() <= 2);
    assert!((g as i32 - 128).abs() <= 2);
    assert!((b as i32 - 128).abs() <= 2);
  }
}
