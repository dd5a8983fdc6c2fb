// Fixed-point DCT-II cosine coefficients, scaled by 128. Only the 8x8
// kernel is needed: luma's 16x16 transform is four independent 8x8
// transforms over the four quadrants, and no macroblock-level call site
// ever invokes a native 4x4 or 16x16 kernel.

pub const TRIG_8X8: [i32; 64] = [
  128,  128,  128,  128,  128,  128,  128,  128,
  126,  106,   71,   25,  -25,  -71, -106, -126,
  118,   49,  -49, -118, -118,  -49,   49,  118,
  106,  -25, -126,  -71,   71,  126,   25, -106,
   91,  -91,  -91,   91,   91,  -91,  -91,   91,
   71, -126,   25,  106, -106,  -25,  126,  -71,
   49, -118,  118,  -49,  -49,  118, -118,   49,
   25,  -71,  106, -126,  126, -106,   71,  -25,
];
