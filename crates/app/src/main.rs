use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use clap::{Parser, Subcommand};
use saber_preview_core::{
    capture::PngEncoder, params::catalog, scene::BLADE_NODE, AppConfig, CaptureCoordinator,
    CaptureNaming, Extent, HeadlessRenderer, PreviewSession, SceneGraph, SharedRenderer,
    SharedScene,
};
use tracing_subscriber::EnvFilter;

fn main() -> saber_preview_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Params { assets } => run_params(&assets),
        Commands::Photo {
            assets,
            output,
            resolution,
            name,
            png,
        } => run_photo(&assets, &output, resolution.as_deref(), name, png),
        Commands::Run {
            assets,
            frames,
            fps,
            toggle_every,
        } => run_frames(&assets, frames, fps, toggle_every),
    }
}

fn open_session(assets: &Path, canvas: Extent) -> saber_preview_core::Result<PreviewSession> {
    let config = AppConfig::load_dir(assets);
    let renderer: SharedRenderer = Arc::new(Mutex::new(HeadlessRenderer::new(canvas)));
    let scene: SharedScene = Arc::new(Mutex::new(SceneGraph::with_saber()));

    let mut session = PreviewSession::new(renderer, scene)?;
    session.apply_settings(&config.scene)?;
    session.apply_model_state(&config.model)?;
    Ok(session)
}

fn run_params(assets: &Path) -> saber_preview_core::Result<()> {
    tracing::info!(?assets, "resolving parameters");
    let session = open_session(assets, Extent::new(1280, 720))?;

    for parameter in session.store().parameters() {
        let display = session.store().display(&parameter.key).unwrap_or_default();
        match session.store().resolved_range(&parameter.key) {
            Some((min, max)) => println!("{:<20} {:>12}   [{min}, {max}]", parameter.key, display),
            None => println!("{:<20} {:>12}", parameter.key, display),
        }
    }
    Ok(())
}

fn run_photo(
    assets: &Path,
    output: &Path,
    resolution: Option<&str>,
    name: Option<String>,
    png: bool,
) -> saber_preview_core::Result<()> {
    let session = open_session(assets, Extent::new(1280, 720))?;

    let naming = name.map(CaptureNaming::Fixed).unwrap_or_default();
    let mut coordinator =
        CaptureCoordinator::new(session.renderer_handle(), session.scene_handle()).with_naming(naming);
    if png {
        coordinator = coordinator.with_encoder(PngEncoder);
    }
    let mut session = session.with_capture(coordinator);
    if let Some(resolution) = resolution {
        session.set(catalog::PHOTO_RESOLUTION, resolution)?;
    }

    let photo = session.take_photo()?;
    std::fs::create_dir_all(output)?;
    let path = output.join(&photo.name);
    std::fs::write(&path, &photo.bytes)?;
    tracing::info!(?path, width = photo.extent.width, height = photo.extent.height, "photo written");
    Ok(())
}

fn run_frames(assets: &Path, frames: u64, fps: u32, toggle_every: u64) -> saber_preview_core::Result<()> {
    tracing::info!(frames, fps, "driving headless session");
    let mut session = open_session(assets, Extent::new(640, 360))?;
    let delta = Duration::from_secs_f64(1.0 / f64::from(fps.max(1)));

    for frame in 1..=frames {
        if toggle_every > 0 && frame % toggle_every == 0 {
            let on = session.toggle_blade()?;
            tracing::info!(frame, on, "blade toggled");
        }
        let tick = session.tick(delta)?;
        if let Some(target) = session.toggles().target(BLADE_NODE) {
            if target.state.is_transitioning() {
                tracing::debug!(frame = tick.frame, scale = target.value(), "blade animating");
            }
        }
    }

    let blade = session.store().display(catalog::BLADE_ON).unwrap_or_default();
    tracing::info!(frames, blade = %blade, "run finished");
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Saber 3D preview tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the startup documents and print the resolved parameter table.
    Params {
        /// Directory holding initial-scene-settings.json and saber-initial-state.json.
        #[arg(short, long, default_value = "assets")]
        assets: PathBuf,
    },
    /// Take one photo with the headless renderer.
    Photo {
        #[arg(short, long, default_value = "assets")]
        assets: PathBuf,
        /// Directory the photo is written to.
        #[arg(short, long, default_value = "photos")]
        output: PathBuf,
        /// Resolution label such as `1920x1080`, `hd` or `canvas`.
        #[arg(short, long)]
        resolution: Option<String>,
        /// Fixed file name instead of a timestamped one.
        #[arg(long)]
        name: Option<String>,
        /// Encode as PNG instead of JPEG.
        #[arg(long)]
        png: bool,
    },
    /// Drive the session for a number of frames, toggling the blade.
    Run {
        #[arg(short, long, default_value = "assets")]
        assets: PathBuf,
        #[arg(short, long, default_value_t = 120)]
        frames: u64,
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Toggle the blade every N frames; 0 disables.
        #[arg(short, long, default_value_t = 45)]
        toggle_every: u64,
    },
}
