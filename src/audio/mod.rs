//! # Audio Module
//!
//! Delay-aligned narration mixing and the optional background music bed.
//!
//! Every clip contributes exactly one stream: its own audio, or generated
//! silence of the clip's duration. Streams are delayed to the clip's scheduled
//! offset and summed.

pub mod music;
pub mod track;

pub use music::{BackgroundMusicMixer, MusicBed};
pub use track::{AudioSegment, AudioTrack, AudioTrackBuilder};
