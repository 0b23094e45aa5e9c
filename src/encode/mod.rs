//! # Encoder/Muxer
//!
//! Assembles the single final ffmpeg invocation from the built tracks, runs it,
//! and turns its stderr into [`Diagnostics`](crate::error::Diagnostics).

pub mod diagnostics;
pub mod muxer;

pub use muxer::{output_args, EncodeOutcome, EncodePlan, MediaInput, Muxer};
