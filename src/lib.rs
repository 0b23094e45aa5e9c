//! # Clip Compositor
//!
//! Join an ordered list of video clips and still images into one video with
//! crossfades between consecutive clips, while every clip's audio stays aligned
//! to where its picture appears.
//!
//! The heavy lifting is done by `ffmpeg`/`ffprobe`, run as subprocesses. This
//! library decides what to run: it probes inputs, turns images into silent
//! clips, schedules clip offsets, and builds one filtergraph for the final encode.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clip_compositor::{composition::CompositionEngine, config::Config};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let engine = CompositionEngine::new(Config::default());
//! let report = engine
//!     .compose(&["intro.mp4", "chart.png", "outro.mp4"], "output/final.mp4")
//!     .await?;
//!
//! println!("{} clips, {:.1}s", report.clip_count, report.total_duration);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`media`] - Probing and input normalization
//! - [`composition`] - Timeline scheduling and the composition engine
//! - [`video`] - Crossfaded video track
//! - [`audio`] - Delay-aligned narration mix and background music
//! - [`encode`] - Final ffmpeg invocation and diagnostics
//! - [`graph`] - Filtergraph model
//! - [`config`] - Configuration management

pub mod audio;
pub mod composition;
pub mod config;
pub mod encode;
pub mod error;
pub mod graph;
pub mod media;
pub mod tool;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{CompositionEngine, CompositionReport, Timeline},
    config::Config,
    error::{CompositorError, Result},
};
