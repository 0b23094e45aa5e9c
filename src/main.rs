use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use clip_compositor::{composition::CompositionEngine, config::Config, CompositorError};

#[derive(Parser)]
#[command(
    name = "clip-compositor",
    version,
    about = "Join video clips and images into one crossfaded video",
    long_about = "Clip-Compositor joins an ordered list of video clips and still images into a single video. \
                  Consecutive clips are crossfaded and each clip's audio stays aligned with its picture; \
                  images are held on screen in silence."
)]
struct Cli {
    /// Input clips in playback order (videos, or png/jpg/jpeg/bmp/gif images)
    #[arg(required = true)]
    clips: Vec<PathBuf>,

    /// Output video file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Crossfade duration in seconds
    #[arg(long)]
    transition: Option<f64>,

    /// How long each image is shown, in seconds
    #[arg(long)]
    image_duration: Option<f64>,

    /// Output width (defaults to the first clip's width)
    #[arg(long)]
    width: Option<u32>,

    /// Output height (defaults to the first clip's height)
    #[arg(long)]
    height: Option<u32>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Background music file
    #[arg(long)]
    music: Option<PathBuf>,

    /// Background music volume
    #[arg(long)]
    music_volume: Option<f64>,

    /// Print the ffmpeg command instead of encoding
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line flags take precedence over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(transition) = self.transition {
            config.composition.transition_duration = transition;
        }
        if let Some(duration) = self.image_duration {
            config.composition.default_image_duration = duration;
        }
        if self.width.is_some() {
            config.video.width = self.width;
        }
        if self.height.is_some() {
            config.video.height = self.height;
        }
        if let Some(fps) = self.fps {
            config.video.fps = fps;
        }
        if let Some(music) = &self.music {
            config.music.path = Some(music.clone());
        }
        if let Some(volume) = self.music_volume {
            config.music.volume = volume;
        }
    }

    fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            PathBuf::from("output")
                .join("final_videos")
                .join(format!("composition_{}.mp4", stamp))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Clip-Compositor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);

    let output = cli.output_path();
    let engine = CompositionEngine::new(config);

    if cli.dry_run {
        let command = engine.dry_run(&cli.clips, &output).await.map_err(report_error)?;
        println!("{}", command);
        return Ok(());
    }

    let report = engine.compose(&cli.clips, &output).await.map_err(report_error)?;

    for skipped in &report.skipped {
        warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    info!("Composition complete! Output saved to: {:?}", report.output);
    Ok(())
}

fn report_error(e: CompositorError) -> anyhow::Error {
    error!("{}", e.user_message());
    anyhow::Error::new(e)
}
