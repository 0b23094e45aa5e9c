//! # Media Module
//!
//! Input inspection and normalization: probing videos with ffprobe, checking
//! images, and wrapping images as silent clips at the target resolution.

pub mod normalizer;
pub mod prober;
pub mod types;

pub use normalizer::{resolve_target, Candidate, InputNormalizer, TempClips};
pub use prober::{parse_ffprobe_json, MediaProber};
pub use types::{Clip, ClipKind, MediaInfo};
