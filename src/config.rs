// Session-wide feature toggles. Both sides of a stream must agree on these;
// only `reference_frame_count` actually travels in the stream header.
#[derive(Clone, Debug)]
pub struct Config {
  pub allow_inter_frames: bool,
  pub reference_frame_count: usize,
  pub default_quality: u8,
  pub periodic_intra_rate: u32,
  pub enable_chroma: bool,
  pub quantization_enabled: bool,
  pub linear_quantization: bool,
  pub rounded_quantization: bool,
  pub adaptive_quantization: bool,
  pub enable_deblocking: bool,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      allow_inter_frames: true,
      reference_frame_count: 4,
      default_quality: 8,
      periodic_intra_rate: 3600,
      enable_chroma: true,
      quantization_enabled: true,
      linear_quantization: false,
      rounded_quantization: true,
      adaptive_quantization: true,
      enable_deblocking: true,
    }
  }
}
