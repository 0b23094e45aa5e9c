//! # Composition Engine
//!
//! Coordinates inspection, normalization, scheduling, filtergraph planning and
//! encoding to turn an ordered list of clips into one crossfaded video.

pub mod engine;
pub mod timeline;

pub use engine::{CompositionEngine, CompositionReport, PreparedClips, SkippedInput};
pub use timeline::Timeline;
