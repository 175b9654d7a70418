//! Windowed frame-sequence player
//!
//! Plays a still image or a directory of frames through a vidgpu session and shows the
//! enhanced output in a window. Effects, comparison and split can be changed while playing.
//!
//! # Usage
//! ```bash
//! cargo run --example player -- frames/ --fps 24 --effect "Mode A" --compare
//! ```

mod app;

use std::path::PathBuf;

use clap::Parser;
use vidgpu::Settings;
use winit::event_loop::{ControlFlow, EventLoop};

use crate::app::PlayerApp;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Image file or directory of equally sized frames
    source: PathBuf,

    /// Playback rate in frames per second
    #[arg(long, default_value_t = 24)]
    fps: u32,

    /// Initial effect, e.g. "Original", "Restore-CNNM" or "Mode A"
    #[arg(long, short, default_value = "Original")]
    effect: String,

    /// Start with the side-by-side comparison enabled
    #[arg(long, short)]
    compare: bool,

    /// Comparison split position in percent
    #[arg(long, default_value_t = 50.0)]
    split: f32,

    /// JSON settings file; command-line flags are ignored when given
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Start paused
    #[arg(long, short)]
    paused: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let settings = match &args.settings {
        Some(path) => Settings::from_json(&std::fs::read_to_string(path)?)?,
        None => Settings {
            effect: args.effect.clone(),
            compare_on: args.compare,
            split_ratio: args.split,
            ..Default::default()
        },
    };

    tracing::info!(source = %args.source.display(), effect = %settings.effect, "starting player");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = PlayerApp::new(args.source, args.fps, settings, args.paused);
    event_loop.run_app(&mut app)?;
    Ok(())
}
