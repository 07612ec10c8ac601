//! # Shadow/Bloom Demo
//!
//! Loads a scene procedure descriptor and renders a grid of lit objects
//! with it for a fixed number of frames.
//!
//! ```bash
//! cargo run -p umbra-demos --bin shadow_bloom -- --backend wgpu --frames 10
//! cargo run -p umbra-demos --bin shadow_bloom -- --profile legacy --no-shadows
//! ```

use std::path::PathBuf;

use clap::Parser;
use umbra_demos::{CliBackend, CliProfile, DemoOptions};

#[derive(Parser, Debug)]
#[command(name = "shadow_bloom")]
#[command(about = "Render a scene procedure over a demo scene")]
#[command(version)]
struct Args {
    /// Graphics backend
    #[arg(long, value_enum, default_value_t = CliBackend::Null)]
    backend: CliBackend,

    /// Capability profile of the null backend
    #[arg(long, value_enum, default_value_t = CliProfile::Modern)]
    profile: CliProfile,

    /// Procedure descriptor (.ron or .toml)
    #[arg(long, default_value = "assets/procedures/shadow_bloom.ron")]
    procedure: PathBuf,

    /// Number of frames to render
    #[arg(long, default_value_t = 60)]
    frames: u32,

    /// Back buffer width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Back buffer height
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Skip the shadow pass
    #[arg(long)]
    no_shadows: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    umbra_graphics::init();

    let args = Args::parse();
    let options = DemoOptions {
        backend: args.backend,
        profile: args.profile,
        procedure: args.procedure,
        frames: args.frames,
        width: args.width,
        height: args.height,
        shadows: !args.no_shadows,
    };

    let summary = umbra_demos::run(&options)?;
    log::info!(
        "Rendered {} frames: {} draws, {} skipped, {} batches",
        summary.frames,
        summary.drawn,
        summary.skipped,
        summary.batches
    );
    Ok(())
}
