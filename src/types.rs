// Block classification and the per-macroblock descriptor. The three-bit
// composition (intra | motion<<1 | copy<<2) is externally visible on the
// wire, so it's kept as a packed field with explicit accessors rather than
// a plain enum discriminant.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockType(u8);

impl BlockType {
  pub fn new(intra: bool, motion: bool, copy: bool) -> Self {
    Self((intra as u8) | ((motion as u8) << 1) | ((copy as u8) << 2))
  }

  pub fn from_code(code: u8) -> Self {
    debug_assert!(code < 8);
    Self(code)
  }

  pub fn code(self) -> u8 {
    self.0
  }

  pub fn is_intra(self) -> bool {
    self.0 & 1 != 0
  }

  pub fn is_motion(self) -> bool {
    self.0 & 2 != 0
  }

  pub fn is_copy(self) -> bool {
    self.0 & 4 != 0
  }
}

pub const INTRA_DEFAULT: BlockType = BlockType(0b001);
pub const INTRA_MOTION_COPY: BlockType = BlockType(0b111);
pub const INTRA_MOTION_DELTA: BlockType = BlockType(0b011);
pub const INTER_COPY: BlockType = BlockType(0b100);
pub const INTER_DELTA: BlockType = BlockType(0b000);
pub const INTER_MOTION_COPY: BlockType = BlockType(0b110);
pub const INTER_MOTION_DELTA: BlockType = BlockType(0b010);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
  Intra,
  Inter,
}

impl FrameType {
  pub fn to_u8(self) -> u8 {
    match self {
      FrameType::Intra => 0,
      FrameType::Inter => 1,
    }
  }

  pub fn from_u8(v: u8) -> Option<Self> {
    match v {
      0 => Some(FrameType::Intra),
      1 => Some(FrameType::Inter),
      _ => None,
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelType {
  Luma,
  Chroma,
}

// Per-macroblock descriptor, one per block, re-filled every frame.
#[derive(Clone, Copy, Debug)]
pub struct BlockDescriptor {
  pub block_type: BlockType,
  pub prediction_target: u8,
  pub motion_x: i16,
  pub motion_y: i16,
  pub sp_pred: bool,
  pub sp_amount: u8,
  pub sp_index: u8,
  pub q_index: u8,
  pub variance: u32,
}

impl BlockDescriptor {
  pub fn empty() -> Self {
    Self {
      block_type: INTRA_DEFAULT,
      prediction_target: 0,
      motion_x: 0,
      motion_y: 0,
      sp_pred: false,
      sp_amount: 0,
      sp_index: 0,
      q_index: 0,
      variance: 0,
    }
  }

  pub fn is_copy(&self) -> bool {
    self.block_type.is_copy()
  }
}

// Frame descriptor emitted once per frame in the bitstream.
#[derive(Clone, Copy, Debug)]
pub struct FrameDescriptor {
  pub frame_type: FrameType,
  pub frame_index: u32,
  pub quality: u16,
}
