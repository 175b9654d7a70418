//! Headless snapshot renderer
//!
//! Runs a single frame through a vidgpu session with an offscreen target and writes the
//! composited result to an image file.
//!
//! # Usage
//! ```bash
//! cargo run --example snapshot -- input.png output.png --effect "Mode A" --compare --split 30
//! ```

use std::path::PathBuf;

use clap::Parser;
use vidgpu::{FALLBACK_DIMENSIONS, FrameSequencePlayer, Session, SessionToken, Settings, SourceSelection, SurfaceRequest};

#[derive(Parser)]
#[command(version, about = "Render one enhanced frame to an image file")]
struct Args {
    /// Input image, or a directory whose first frame is used
    input: PathBuf,

    /// Output image file path
    output: PathBuf,

    /// Effect identifier, e.g. "Restore-CNNM" or "Mode C+A"
    #[arg(long, short, default_value = "Mode A")]
    effect: String,

    /// Split the output against the unprocessed frame
    #[arg(long, short)]
    compare: bool,

    /// Comparison split position in percent
    #[arg(long, default_value_t = 50.0)]
    split: f32,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = Settings {
        effect: args.effect.clone(),
        compare_on: args.compare,
        split_ratio: args.split,
        ..Default::default()
    };

    println!("Initializing GPU...");
    let token = SessionToken::new();
    let mut session = pollster::block_on(Session::init(
        SurfaceRequest::Offscreen { size: FALLBACK_DIMENSIONS },
        FrameSequencePlayer::new(1),
        &SourceSelection::file(args.input.clone()),
        settings,
        &token,
    ))?;
    session.pause()?;

    let (input_width, input_height) = session.video_dimensions().unwrap_or_default();
    let (output_width, output_height) = session.output_dimensions().unwrap_or_default();
    println!("Rendered {input_width}x{input_height} input with '{}' to {output_width}x{output_height}", args.effect);

    let image = pollster::block_on(session.capture_frame())?;
    image.save(&args.output)?;
    println!("Saved result to: {}", args.output.display());

    session.teardown();
    Ok(())
}
