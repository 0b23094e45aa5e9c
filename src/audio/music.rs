use std::path::PathBuf;

use tracing::{info, warn};

use crate::audio::track::AudioTrackBuilder;
use crate::config::Config;
use crate::encode::MediaInput;
use crate::graph::{seconds, Filter, FilterChain, FilterGraph};
use crate::media::prober::MediaProber;

/// A probed music file ready to be laid under the narration
#[derive(Debug, Clone, PartialEq)]
pub struct MusicBed {
    pub path: PathBuf,
    pub duration: f64,
}

/// Lays an attenuated, looped or trimmed music bed under the narration mix
pub struct BackgroundMusicMixer {
    prober: MediaProber,
    path: Option<PathBuf>,
    volume: f64,
    format: AudioTrackBuilder,
}

impl BackgroundMusicMixer {
    pub fn new(config: &Config) -> Self {
        Self {
            prober: MediaProber::new(&config.tools, &config.probe),
            path: config.music.path.clone(),
            volume: config.music.volume,
            format: AudioTrackBuilder::new(&config.audio),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.path.is_some()
    }

    /// Probe the configured music file
    ///
    /// Any problem is logged and the music is left out; it never fails the job.
    pub async fn load(&self) -> Option<MusicBed> {
        let path = self.path.as_ref()?;

        if !path.exists() {
            warn!("Background music not found: {}; continuing without it", path.display());
            return None;
        }

        match self.prober.probe(path).await {
            Ok(info) if info.has_audio => {
                info!("Background music: {} ({:.2}s)", path.display(), info.duration);
                Some(MusicBed {
                    path: path.clone(),
                    duration: info.duration,
                })
            }
            Ok(_) => {
                warn!("Background music has no audio stream: {}; skipping", path.display());
                None
            }
            Err(e) => {
                warn!("Could not probe background music ({}); skipping", e);
                None
            }
        }
    }

    /// Input for the music file, looped when shorter than `total`
    pub fn input(&self, bed: &MusicBed, total: f64) -> MediaInput {
        if bed.duration < total {
            info!("Looping background music ({:.2}s) to cover {:.2}s", bed.duration, total);
            MediaInput::looped(&bed.path)
        } else {
            MediaInput::new(&bed.path)
        }
    }

    /// Append the music chain and the final merge to `graph`
    ///
    /// The narration comes first in the merge and decides its length.
    pub fn mix(
        &self,
        input_index: usize,
        narration: &str,
        total: f64,
        transition: f64,
        graph: &mut FilterGraph,
    ) -> String {
        let music = graph.push(
            FilterChain::from_input(format!("{}:a", input_index))
                .then(Filter::new("atrim").opt("duration", seconds(total)))
                .then(Filter::new("volume").arg(self.volume))
                .then(self.format.format_filter())
                .then(Filter::new("aresample"))
                .output("music"),
        );

        graph.push(
            FilterChain::from_inputs([narration, music.as_str()])
                .then(
                    Filter::new("amix")
                        .opt("inputs", 2)
                        .opt("duration", "first")
                        .opt("dropout_transition", seconds(2.0 * transition)),
                )
                .output("aout"),
        )
    }
}
