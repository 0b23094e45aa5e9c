use tracing::debug;

use crate::composition::timeline::Timeline;
use crate::config::AudioConfig;
use crate::error::{CompositionError, Result};
use crate::graph::{seconds, Filter, FilterChain, FilterGraph};
use crate::media::types::Clip;

/// Where one clip's audio lands on the master timeline
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Delay applied to the stream, in whole milliseconds
    pub delay_ms: u64,
    pub duration: f64,
    /// Generated silence rather than the clip's own audio
    pub silent: bool,
}

impl AudioSegment {
    pub fn start(&self) -> f64 {
        self.delay_ms as f64 / 1000.0
    }

    pub fn end(&self) -> f64 {
        self.start() + self.duration
    }
}

/// Output pad of the narration mix plus the placement of every contributing stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub label: String,
    pub segments: Vec<AudioSegment>,
}

impl AudioTrack {
    /// Length of the mix: the longest delayed stream
    pub fn duration(&self) -> f64 {
        self.segments.iter().map(AudioSegment::end).fold(0.0, f64::max)
    }
}

/// Builds the delay-aligned narration mix
///
/// Clip `i` is read from ffmpeg input `i`.
#[derive(Debug, Clone)]
pub struct AudioTrackBuilder {
    format: AudioConfig,
}

impl AudioTrackBuilder {
    pub fn new(format: &AudioConfig) -> Self {
        Self { format: format.clone() }
    }

    /// Conversion to the common sample format, rate and layout
    pub fn format_filter(&self) -> Filter {
        Filter::new("aformat")
            .opt("sample_fmts", &self.format.sample_format)
            .opt("sample_rates", self.format.sample_rate)
            .opt("channel_layouts", &self.format.channel_layout)
    }

    /// Same delay on every channel
    pub fn delay_filter(&self, delay_ms: u64) -> Filter {
        let per_channel = vec![delay_ms.to_string(); self.format.channel_count()];
        Filter::new("adelay").opt("delays", per_channel.join("|"))
    }

    /// Source chain for one clip: its own audio, or silence of exactly its duration
    ///
    /// A clip shorter than `span` is padded with silence up to it.
    pub fn clip_chain(&self, index: usize, clip: &Clip, delay_ms: u64, span: f64) -> FilterChain {
        let length = span.max(clip.duration);
        let chain = if clip.has_audio {
            let chain = FilterChain::from_input(format!("{}:a", index))
                .then(self.format_filter())
                .then(Filter::new("aresample"));
            if length > clip.duration {
                chain.then(Filter::new("apad").opt("whole_dur", seconds(length)))
            } else {
                chain
            }
        } else {
            FilterChain::source(
                Filter::new("anullsrc")
                    .opt("channel_layout", &self.format.channel_layout)
                    .opt("sample_rate", self.format.sample_rate),
            )
            .then(Filter::new("atrim").opt("duration", seconds(length)))
            .then(self.format_filter())
        };

        chain.then(self.delay_filter(delay_ms)).output(format!("a{}", index))
    }

    /// Append the narration mix for `clips` to `graph`
    ///
    /// Streams are summed with the `longest` duration policy so narration after
    /// the first clip is never truncated.
    pub fn build(&self, clips: &[Clip], timeline: &Timeline, graph: &mut FilterGraph) -> Result<AudioTrack> {
        if clips.is_empty() || clips.len() != timeline.len() {
            return Err(CompositionError::GraphConstruction {
                reason: format!(
                    "audio track needs one offset per clip ({} clips, {} offsets)",
                    clips.len(),
                    timeline.len()
                ),
            }
            .into());
        }

        let mut labels = Vec::with_capacity(clips.len());
        let mut segments = Vec::with_capacity(clips.len());

        for (i, ((clip, offset), &span)) in clips
            .iter()
            .zip(timeline.offsets())
            .zip(timeline.spans())
            .enumerate()
        {
            let delay_ms = delay_millis(*offset);
            debug!(
                "Audio for clip {} ({}) delayed {}ms{}",
                i,
                clip.name(),
                delay_ms,
                if clip.has_audio { "" } else { " (silence)" }
            );

            labels.push(graph.push(self.clip_chain(i, clip, delay_ms, span)));
            segments.push(AudioSegment {
                delay_ms,
                duration: span.max(clip.duration),
                silent: !clip.has_audio,
            });
        }

        let label = if labels.len() == 1 {
            labels.remove(0)
        } else {
            let count = labels.len();
            graph.push(
                FilterChain::from_inputs(labels)
                    .then(Filter::new("amix").opt("inputs", count).opt("duration", "longest"))
                    .output("narration"),
            )
        };

        Ok(AudioTrack { label, segments })
    }
}

/// Offset in seconds to a whole-millisecond delay
pub fn delay_millis(offset: f64) -> u64 {
    (offset.max(0.0) * 1000.0).round() as u64
}
