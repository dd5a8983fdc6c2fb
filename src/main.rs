mod abac;
mod analysis;
mod array2d;
mod bitstream;
mod classify;
mod config;
mod convert;
mod deblock;
mod decode;
mod encode;
mod error;
mod frame;
mod golomb;
mod image;
mod motion;
mod predict;
mod quantize;
mod scan;
mod serialize;
mod session;
mod transform;
mod types;
mod util;
mod xftables;
mod y4m;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};

use config::Config;
use convert::{rgb_to_yuv, yuv_to_rgb};
use error::EvxResult;
use frame::Frame;
use image::{ImageSet, RgbImage};
use session::{PeekState, Session};
use y4m::{Y4MReader, Y4MWriter};

#[derive(Parser)]
#[command(name = "evx1", about = "Reference EVX-1 hybrid video codec")]
struct Cli {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Encode a Y4M (or, with --raw-rgb, flat packed RGB24) file into an EVX-1 bitstream.
  Encode(EncodeArgs),
  /// Decode an EVX-1 bitstream back into a Y4M (or, with --raw-rgb, flat packed RGB24) file.
  Decode(DecodeArgs),
  /// Decode a bitstream while dumping a per-frame diagnostic view as PPM images.
  Peek(PeekArgs),
}

#[derive(clap::Args)]
struct EncodeArgs {
  input: PathBuf,
  output: PathBuf,

  #[arg(long, default_value_t = 8)]
  quality: u8,
  #[arg(long, default_value_t = 4)]
  references: usize,
  #[arg(long, default_value_t = 3600)]
  intra_period: u32,
  #[arg(long)]
  no_inter: bool,
  #[arg(long)]
  no_chroma: bool,
  #[arg(long)]
  no_deblock: bool,
  #[arg(long)]
  linear_quantization: bool,

  /// Treat the input as flat packed RGB24 instead of Y4M; requires --width/--height.
  #[arg(long)]
  raw_rgb: bool,
  #[arg(long)]
  width: Option<usize>,
  #[arg(long)]
  height: Option<usize>,
}

#[derive(clap::Args)]
struct DecodeArgs {
  input: PathBuf,
  output: PathBuf,

  #[arg(long, default_value_t = 4)]
  references: usize,

  /// Write flat packed RGB24 instead of Y4M.
  #[arg(long)]
  raw_rgb: bool,
}

#[derive(clap::Args)]
struct PeekArgs {
  input: PathBuf,
  out_dir: PathBuf,

  #[arg(long, value_enum, default_value_t = PeekStateArg::BlockTable)]
  state: PeekStateArg,
  #[arg(long, default_value_t = 4)]
  references: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum PeekStateArg {
  Source,
  Destination,
  BlockTable,
  QuantTable,
  BlockVariance,
  SpmpTable,
}

impl From<PeekStateArg> for PeekState {
  fn from(v: PeekStateArg) -> Self {
    match v {
      PeekStateArg::Source => PeekState::Source,
      PeekStateArg::Destination => PeekState::Destination,
      PeekStateArg::BlockTable => PeekState::BlockTable,
      PeekStateArg::QuantTable => PeekState::QuantTable,
      PeekStateArg::BlockVariance => PeekState::BlockVariance,
      PeekStateArg::SpmpTable => PeekState::SpmpTable,
    }
  }
}

// The Frame type (frame.rs) stores plain 8-bit YCbCr with the same
// limited-range bias convert.rs's internal i16 ImageSet already carries, so
// Y4M frames load straight into an ImageSet without an RGB round trip.
fn frame_to_image_set(frame: &Frame) -> ImageSet {
  let mut img = ImageSet::new(frame.y().width, frame.y().height);
  for y in 0..frame.y().height {
    for x in 0..frame.y().width {
      img.y.set(x, y, frame.y().data[y * frame.y().stride + x] as i16);
    }
  }
  for y in 0..frame.u().height {
    for x in 0..frame.u().width {
      img.u.set(x, y, frame.u().data[y * frame.u().stride + x] as i16);
      img.v.set(x, y, frame.v().data[y * frame.v().stride + x] as i16);
    }
  }
  img
}

fn image_set_to_frame(img: &ImageSet) -> Frame {
  let mut frame = Frame::new(img.y.width, img.y.height);
  for y in 0..img.y.height {
    for x in 0..img.y.width {
      frame.y_mut().data[y * img.y.width + x] = img.y.get(x, y).clamp(0, 255) as u8;
    }
  }
  for y in 0..img.u.height {
    for x in 0..img.u.width {
      frame.u_mut().data[y * img.u.width + x] = img.u.get(x, y).clamp(0, 255) as u8;
      frame.v_mut().data[y * img.v.width + x] = img.v.get(x, y).clamp(0, 255) as u8;
    }
  }
  frame
}

fn frame_to_rgb(frame: &Frame) -> EvxResult<RgbImage> {
  let img = frame_to_image_set(frame);
  let mut rgb = RgbImage::new(img.y.width, img.y.height);
  yuv_to_rgb(&img, &mut rgb)?;
  Ok(rgb)
}

fn rgb_to_frame(rgb: &RgbImage) -> EvxResult<Frame> {
  let mut img = ImageSet::new(rgb.width, rgb.height);
  rgb_to_yuv(rgb, &mut img)?;
  Ok(image_set_to_frame(&img))
}

fn has_more(r: &mut impl BufRead) -> bool {
  !r.fill_buf().map(|b| b.is_empty()).unwrap_or(true)
}

fn run_encode(args: EncodeArgs) -> EvxResult<()> {
  let cfg = Config {
    allow_inter_frames: !args.no_inter,
    reference_frame_count: args.references,
    default_quality: args.quality,
    periodic_intra_rate: args.intra_period,
    enable_chroma: !args.no_chroma,
    quantization_enabled: true,
    linear_quantization: args.linear_quantization,
    rounded_quantization: true,
    adaptive_quantization: true,
    enable_deblocking: !args.no_deblock,
  };

  let output = File::create(&args.output).map_err(|e| error::EvxError::InvalidResource(format!("creating {}: {e}", args.output.display())))?;
  let mut out = BufWriter::new(output);

  let mut session = Session::new(cfg);
  session.set_quality(args.quality);

  let mut frame_count = 0u32;

  if args.raw_rgb {
    let (width, height) = raw_rgb_dims(args.width, args.height)?;
    let frame_bytes = width * height * 3;
    let input = File::open(&args.input).map_err(|e| error::EvxError::InvalidResource(format!("opening {}: {e}", args.input.display())))?;
    let mut reader = BufReader::new(input);
    let mut frame_buf = vec![0u8; frame_bytes];
    while has_more(&mut reader) {
      reader.read_exact(&mut frame_buf).map_err(|e| error::EvxError::InvalidResource(format!("reading raw rgb frame: {e}")))?;
      session.encode(&frame_buf, width, height, &mut out)?;
      frame_count += 1;
      info!("encoded frame {frame_count}");
    }
  } else {
    let input = File::open(&args.input).map_err(|e| error::EvxError::InvalidResource(format!("opening {}: {e}", args.input.display())))?;
    let mut reader = BufReader::new(input);
    let mut y4m = Y4MReader::new(&mut reader);
    while y4m.has_next_frame() {
      let frame = y4m.read_frame();
      let rgb = frame_to_rgb(&frame)?;
      session.encode(&rgb.data, rgb.width, rgb.height, &mut out)?;
      frame_count += 1;
      info!("encoded frame {frame_count}");
    }
  }

  out.flush().map_err(|_| error::EvxError::CapacityLimit)?;
  info!("encoded {frame_count} frames to {}", args.output.display());
  Ok(())
}

fn raw_rgb_dims(width: Option<usize>, height: Option<usize>) -> EvxResult<(usize, usize)> {
  match (width, height) {
    (Some(w), Some(h)) => Ok((w, h)),
    _ => Err(error::EvxError::InvalidArg("--raw-rgb requires --width and --height".into())),
  }
}

fn run_decode(args: DecodeArgs) -> EvxResult<()> {
  let cfg = Config { reference_frame_count: args.references, ..Config::default() };

  let input = File::open(&args.input).map_err(|e| error::EvxError::InvalidResource(format!("opening {}: {e}", args.input.display())))?;
  let mut reader = BufReader::new(input);

  let mut session = Session::new(cfg);
  let (width, height) = session.read_stream_header(&mut reader)?;

  let output = File::create(&args.output).map_err(|e| error::EvxError::InvalidResource(format!("creating {}: {e}", args.output.display())))?;
  let mut rgb_buf = vec![0u8; width * height * 3];
  let mut frame_count = 0u32;

  if args.raw_rgb {
    let mut out = BufWriter::new(output);
    while has_more(&mut reader) {
      session.decode(&mut reader, &mut rgb_buf)?;
      out.write_all(&rgb_buf).map_err(|_| error::EvxError::CapacityLimit)?;
      frame_count += 1;
      info!("decoded frame {frame_count}");
    }
    out.flush().map_err(|_| error::EvxError::CapacityLimit)?;
  } else {
    let mut y4m = Y4MWriter::new(BufWriter::new(output), width, height);
    while has_more(&mut reader) {
      session.decode(&mut reader, &mut rgb_buf)?;
      let rgb = RgbImage { width, height, data: rgb_buf.clone().into_boxed_slice() };
      let frame = rgb_to_frame(&rgb)?;
      y4m.write_frame(&frame);
      frame_count += 1;
      info!("decoded frame {frame_count}");
    }
  }

  info!("decoded {frame_count} frames to {}", args.output.display());
  Ok(())
}

fn run_peek(args: PeekArgs) -> EvxResult<()> {
  let cfg = Config { reference_frame_count: args.references, ..Config::default() };

  let input = File::open(&args.input).map_err(|e| error::EvxError::InvalidResource(format!("opening {}: {e}", args.input.display())))?;
  let mut reader = BufReader::new(input);

  let mut session = Session::new(cfg);
  let (width, height) = session.read_stream_header(&mut reader)?;

  std::fs::create_dir_all(&args.out_dir).map_err(|e| error::EvxError::InvalidResource(format!("creating {}: {e}", args.out_dir.display())))?;

  let mut rgb_buf = vec![0u8; width * height * 3];
  let mut frame_count = 0u32;
  while has_more(&mut reader) {
    session.decode(&mut reader, &mut rgb_buf)?;

    let mut view = vec![0u8; width * height * 3];
    session.peek(args.state.into(), &mut view)?;

    let ppm_path = args.out_dir.join(format!("frame-{frame_count:05}.ppm"));
    let mut ppm = File::create(&ppm_path).map_err(|e| error::EvxError::InvalidResource(format!("creating {}: {e}", ppm_path.display())))?;
    write!(ppm, "P6\n{width} {height}\n255\n").map_err(|_| error::EvxError::CapacityLimit)?;
    ppm.write_all(&view).map_err(|_| error::EvxError::CapacityLimit)?;

    frame_count += 1;
  }

  info!("wrote {frame_count} diagnostic frames to {}", args.out_dir.display());
  Ok(())
}

fn main() -> ExitCode {
  env_logger::init();
  let cli = Cli::parse();

  let result = match cli.command {
    Command::Encode(args) => run_encode(args),
    Command::Decode(args) => run_decode(args),
    Command::Peek(args) => run_peek(args),
  };

  if let Err(e) = result {
    error!("{e}");
    return ExitCode::FAILURE;
  }
  ExitCode::SUCCESS
}
