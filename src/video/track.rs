use tracing::debug;

use crate::composition::timeline::Timeline;
use crate::error::{CompositionError, Result};
use crate::graph::{seconds, Filter, FilterChain, FilterGraph};
use crate::media::types::Clip;

/// The only transition style the compositor renders
pub const TRANSITION: &str = "fade";

/// Output pad and length of a built video track
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTrack {
    pub label: String,
    pub duration: f64,
}

/// Aspect-preserving downscale-to-fit followed by centered black padding
pub fn letterbox_filters((width, height): (u32, u32)) -> Vec<Filter> {
    vec![
        Filter::new("scale")
            .arg(format!("{}:{}", width, height))
            .opt("force_original_aspect_ratio", "decrease")
            .opt("flags", "bicubic"),
        Filter::new("pad")
            .arg(format!("{}:{}:(ow-iw)/2:(oh-ih)/2", width, height))
            .opt("color", "black"),
    ]
}

/// Builds the crossfaded video track
///
/// Clip `i` is read from ffmpeg input `i`.
#[derive(Debug, Clone)]
pub struct VideoTrackBuilder {
    target: (u32, u32),
    fps: u32,
    pixel_format: String,
}

impl VideoTrackBuilder {
    pub fn new(target: (u32, u32), fps: u32, pixel_format: impl Into<String>) -> Self {
        Self {
            target,
            fps,
            pixel_format: pixel_format.into(),
        }
    }

    /// Normalizing chain for one clip: letterbox if needed, then fps, SAR and format
    ///
    /// A clip shorter than `span` holds its last frame for the remainder.
    pub fn clip_chain(&self, index: usize, clip: &Clip, span: f64) -> FilterChain {
        let mut chain = FilterChain::from_input(format!("{}:v", index));
        if clip.needs_scaling(self.target) {
            chain = chain.then_all(letterbox_filters(self.target));
        }
        chain = chain
            .then(Filter::new("fps").opt("fps", self.fps).opt("round", "near"))
            .then(Filter::new("setsar").opt("sar", "1/1"))
            .then(Filter::new("format").opt("pix_fmts", &self.pixel_format));

        let hold = span - clip.duration;
        if hold > 0.0 {
            chain = chain.then(
                Filter::new("tpad")
                    .opt("stop_mode", "clone")
                    .opt("stop_duration", seconds(hold)),
            );
        }
        chain.output(format!("v{}", index))
    }

    /// Append the video track for `clips` to `graph`
    ///
    /// Each crossfade starts exactly at the later clip's scheduled offset, so the
    /// cut points match the audio delays.
    pub fn build(&self, clips: &[Clip], timeline: &Timeline, graph: &mut FilterGraph) -> Result<VideoTrack> {
        if clips.is_empty() || clips.len() != timeline.len() {
            return Err(CompositionError::GraphConstruction {
                reason: format!(
                    "video track needs one offset per clip ({} clips, {} offsets)",
                    clips.len(),
                    timeline.len()
                ),
            }
            .into());
        }

        let normalized: Vec<String> = clips
            .iter()
            .zip(timeline.spans())
            .enumerate()
            .map(|(i, (clip, &span))| graph.push(self.clip_chain(i, clip, span)))
            .collect();

        let mut current = normalized[0].clone();
        for (i, next) in normalized.iter().enumerate().skip(1) {
            let offset = timeline.offsets()[i];
            debug!("Crossfade into clip {} at {:.3}s", i, offset);
            current = graph.push(
                FilterChain::from_inputs([current.as_str(), next.as_str()])
                    .then(
                        Filter::new("xfade")
                            .opt("transition", TRANSITION)
                            .opt("duration", seconds(timeline.transition()))
                            .opt("offset", seconds(offset)),
                    )
                    .output(format!("vx{}", i)),
            );
        }

        Ok(VideoTrack {
            label: current,
            duration: timeline.total(),
        })
    }
}
