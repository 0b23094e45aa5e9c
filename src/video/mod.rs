//! # Video Track Module
//!
//! Scales, pads and standardizes every clip, then chains them with crossfades
//! placed at the scheduled offsets.

pub mod track;

pub use track::{letterbox_filters, VideoTrack, VideoTrackBuilder};
