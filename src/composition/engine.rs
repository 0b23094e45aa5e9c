use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{
    audio::{AudioTrackBuilder, BackgroundMusicMixer, MusicBed},
    composition::timeline::Timeline,
    config::Config,
    encode::{output_args, EncodePlan, MediaInput, Muxer},
    error::{CompositionError, Diagnostics, Result},
    graph::FilterGraph,
    media::{
        normalizer::{resolve_target, Candidate, InputNormalizer, TempClips},
        types::Clip,
    },
    video::VideoTrackBuilder,
};

/// An input left out of the composition, and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedInput {
    pub path: PathBuf,
    pub reason: String,
}

/// Validated, normalized and scheduled clips, ready to be planned
///
/// Owns the temporary image wrappers; they are deleted when this is dropped.
#[derive(Debug)]
pub struct PreparedClips {
    pub clips: Vec<Clip>,
    pub skipped: Vec<SkippedInput>,
    pub target: (u32, u32),
    pub timeline: Timeline,
    pub temps: TempClips,
}

/// Summary of a finished composition
#[derive(Debug, Clone)]
pub struct CompositionReport {
    pub output: PathBuf,
    pub clip_count: usize,
    pub clips: Vec<Clip>,
    pub skipped: Vec<SkippedInput>,
    pub resolution: (u32, u32),
    pub timeline: Timeline,
    pub total_duration: f64,
    pub music: Option<MusicBed>,
    pub file_size: u64,
    pub diagnostics: Diagnostics,
}

/// Main composition engine that turns an ordered list of clips into one video
///
/// The engine follows a clear pipeline:
/// 1. Inspection - Probe videos and check images, skipping unusable inputs
/// 2. Normalization - Pick the target size, wrap images as silent clips
/// 3. Scheduling - Compute every clip's start offset
/// 4. Planning - Build the crossfaded video track and the delay-aligned audio mix
/// 5. Encoding - Run ffmpeg once and verify the output
pub struct CompositionEngine {
    config: Config,
    normalizer: InputNormalizer,
    music: BackgroundMusicMixer,
    muxer: Muxer,
}

impl CompositionEngine {
    /// Create a new composition engine with the given configuration
    pub fn new(config: Config) -> Self {
        Self {
            normalizer: InputNormalizer::new(&config),
            music: BackgroundMusicMixer::new(&config),
            muxer: Muxer::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Compose `clip_paths`, in order, into `output_path`
    ///
    /// Unusable inputs are skipped and listed in the report. The job fails only
    /// when nothing usable remains or the encode itself fails. Temporary files are
    /// removed on every path.
    pub async fn compose<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        clip_paths: &[P],
        output_path: Q,
    ) -> Result<CompositionReport> {
        let output = absolute(output_path.as_ref())?;

        info!("🎬 Starting composition");
        info!("   Clips: {}", clip_paths.len());
        info!("   Output: {:?}", output);

        let mut prepared = self.prepare(clip_paths, &output).await?;

        // Pipeline Step 4: Planning
        info!("🧩 Step 4: Building filtergraph...");
        let music = self.music.load().await;
        let plan = self.plan(&prepared, music.as_ref(), &output)?;
        debug!("   Command: {}", plan.command_line(self.muxer.ffmpeg()));

        // Pipeline Step 5: Encoding
        info!("🎞️  Step 5: Encoding final video...");
        let outcome = self.muxer.encode(&plan).await;
        prepared.temps.cleanup();
        let outcome = outcome?;

        let report = CompositionReport {
            output,
            clip_count: prepared.clips.len(),
            resolution: prepared.target,
            total_duration: prepared.timeline.total(),
            timeline: prepared.timeline.clone(),
            clips: std::mem::take(&mut prepared.clips),
            skipped: std::mem::take(&mut prepared.skipped),
            music,
            file_size: outcome.size,
            diagnostics: outcome.diagnostics,
        };

        info!("🎉 Composition complete! Output saved to: {:?}", report.output);
        info!(
            "   {} clip(s), {:.2}s, {} bytes, {} skipped",
            report.clip_count,
            report.total_duration,
            report.file_size,
            report.skipped.len()
        );
        Ok(report)
    }

    /// Run steps 1-3 and return the scheduled clips without encoding
    ///
    /// Image wrappers are written next to `output_path`, whose directory is
    /// created if needed.
    pub async fn prepare<P: AsRef<Path>>(&self, clip_paths: &[P], output_path: &Path) -> Result<PreparedClips> {
        self.config.validate()?;

        if clip_paths.is_empty() {
            return Err(CompositionError::NoInputs.into());
        }

        let output = absolute(output_path)?;
        let work_dir = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&work_dir).await?;

        // Pipeline Step 1: Inspection
        let (candidates, mut skipped) = self.inspect_inputs(clip_paths).await?;

        // Pipeline Step 2: Normalization
        let mut temps = TempClips::new();
        let (clips, target) = self
            .normalize_inputs(candidates, &work_dir, &mut temps, &mut skipped)
            .await?;

        if clips.is_empty() {
            return Err(CompositionError::NoValidClips {
                requested: clip_paths.len(),
            }
            .into());
        }

        // Pipeline Step 3: Scheduling
        let timeline = self.schedule(&clips);

        Ok(PreparedClips {
            clips,
            skipped,
            target,
            timeline,
            temps,
        })
    }

    /// Prepare the clips and render the ffmpeg command that would be run
    pub async fn dry_run<P: AsRef<Path>, Q: AsRef<Path>>(&self, clip_paths: &[P], output_path: Q) -> Result<String> {
        let output = absolute(output_path.as_ref())?;
        let prepared = self.prepare(clip_paths, &output).await?;
        let music = self.music.load().await;
        let plan = self.plan(&prepared, music.as_ref(), &output)?;
        if !prepared.temps.is_empty() {
            warn!(
                "Dry run: {} temporary image clip(s) are removed on return",
                prepared.temps.len()
            );
        }
        Ok(plan.command_line(self.muxer.ffmpeg()))
    }

    // ==========================================
    // PIPELINE STEP 1: INSPECTION
    // ==========================================

    async fn inspect_inputs<P: AsRef<Path>>(&self, clip_paths: &[P]) -> Result<(Vec<Candidate>, Vec<SkippedInput>)> {
        info!("🔍 Step 1: Inspecting {} input(s)...", clip_paths.len());

        let mut candidates = Vec::with_capacity(clip_paths.len());
        let mut skipped = Vec::new();

        for (i, path) in clip_paths.iter().enumerate() {
            let path = absolute(path.as_ref())?;
            debug!("   [{}/{}] {}", i + 1, clip_paths.len(), path.display());

            match self.normalizer.inspect(&path).await {
                Ok(candidate) => candidates.push(candidate),
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping {}: {}", path.display(), e);
                    skipped.push(SkippedInput {
                        path,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!("   ✅ {} usable, {} skipped", candidates.len(), skipped.len());
        Ok((candidates, skipped))
    }

    // ==========================================
    // PIPELINE STEP 2: NORMALIZATION
    // ==========================================

    /// Normalize candidates in order and return the clips with the job's target size
    ///
    /// The target comes from the first candidate that normalizes successfully, so
    /// a dropped input never decides the output size.
    async fn normalize_inputs(
        &self,
        candidates: Vec<Candidate>,
        work_dir: &Path,
        temps: &mut TempClips,
        skipped: &mut Vec<SkippedInput>,
    ) -> Result<(Vec<Clip>, (u32, u32))> {
        info!("📐 Step 2: Normalizing {} clip(s)...", candidates.len());

        let mut target: Option<(u32, u32)> = None;
        let mut clips = Vec::with_capacity(candidates.len());
        for (i, candidate) in candidates.into_iter().enumerate() {
            let source = candidate.path().to_path_buf();
            let clip_target = target.unwrap_or_else(|| resolve_target(&self.config, Some(&candidate)));

            match self.normalizer.normalize(i, candidate, clip_target, work_dir, temps).await {
                Ok(clip) => {
                    if target.is_none() {
                        info!("   Target resolution: {}x{}", clip_target.0, clip_target.1);
                        target = Some(clip_target);
                    }
                    debug!(
                        "      {:02} - {} ({:?}, {:.2}s, audio: {})",
                        clips.len(),
                        clip.name(),
                        clip.kind,
                        clip.duration,
                        clip.has_audio
                    );
                    clips.push(clip);
                }
                Err(e) if e.is_recoverable() => {
                    warn!("Skipping {}: {}", source.display(), e);
                    skipped.push(SkippedInput {
                        path: source,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!("   ✅ {} clip(s) ready", clips.len());
        let target = target.unwrap_or_else(|| resolve_target(&self.config, None));
        Ok((clips, target))
    }

    // ==========================================
    // PIPELINE STEP 3: SCHEDULING
    // ==========================================

    /// Schedule `clips` with the configured transition, warning about clamped clips
    pub fn schedule(&self, clips: &[Clip]) -> Timeline {
        info!("⏱️  Step 3: Scheduling timeline...");

        let durations: Vec<f64> = clips.iter().map(|c| c.duration).collect();
        let timeline = Timeline::schedule(&durations, self.config.composition.transition_duration);

        for &i in timeline.clamped() {
            warn!(
                "Clip {} ({:.2}s) is too short for the {:.2}s transition; held on its last frame for {:.2}s",
                clips[i].name(),
                clips[i].duration,
                timeline.transition(),
                timeline.spans()[i]
            );
        }

        for (i, (offset, duration)) in timeline.segments().enumerate() {
            debug!("      {:02} starts at {:.3}s for {:.3}s", i, offset, duration);
        }
        info!("   ✅ Total duration: {:.2}s", timeline.total());
        timeline
    }

    // ==========================================
    // PIPELINE STEP 4: PLANNING
    // ==========================================

    /// Build the encode plan for prepared clips without running anything
    ///
    /// Clip `i` is ffmpeg input `i`; the music bed, if any, follows the clips.
    pub fn plan(&self, prepared: &PreparedClips, music: Option<&MusicBed>, output: &Path) -> Result<EncodePlan> {
        let clips = &prepared.clips;
        let timeline = &prepared.timeline;
        let mut graph = FilterGraph::new();

        let video = VideoTrackBuilder::new(prepared.target, self.config.video.fps, &self.config.encoder.pixel_format)
            .build(clips, timeline, &mut graph)?;
        let narration = AudioTrackBuilder::new(&self.config.audio).build(clips, timeline, &mut graph)?;

        let mut inputs: Vec<MediaInput> = clips
            .iter()
            .map(|clip| MediaInput::limited(&clip.path, clip.duration))
            .collect();

        let audio_label = match music {
            Some(bed) => {
                inputs.push(self.music.input(bed, timeline.total()));
                self.music.mix(
                    clips.len(),
                    &narration.label,
                    timeline.total(),
                    timeline.transition(),
                    &mut graph,
                )
            }
            None => narration.label,
        };

        graph
            .check()
            .map_err(|reason| CompositionError::GraphConstruction { reason })?;

        Ok(EncodePlan {
            inputs,
            graph,
            video_label: video.label,
            audio_label,
            output_args: output_args(&self.config),
            output: output.to_path_buf(),
            duration: video.duration,
        })
    }
}

/// Resolve `path` against the current working directory
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::media::types::MediaInfo;
    use crate::tool;
    use tempfile::tempdir;

    fn video(path: &str, duration: f64, has_audio: bool) -> Clip {
        Clip::video(
            path,
            &MediaInfo {
                duration,
                width: Some(1280),
                height: Some(720),
                has_audio,
            },
        )
    }

    fn prepared(engine: &CompositionEngine, clips: Vec<Clip>) -> PreparedClips {
        let timeline = engine.schedule(&clips);
        PreparedClips {
            clips,
            skipped: Vec::new(),
            target: (1280, 720),
            timeline,
            temps: TempClips::new(),
        }
    }

    fn config_with_transition(transition: f64) -> Config {
        let mut config = Config::default();
        config.composition.transition_duration = transition;
        config
    }

    #[tokio::test]
    async fn test_no_inputs() {
        let engine = CompositionEngine::new(Config::default());
        let dir = tempdir().unwrap();
        let clips: Vec<PathBuf> = Vec::new();

        let result = engine.compose(&clips, dir.path().join("out.mp4")).await;
        assert!(matches!(
            result,
            Err(CompositorError::Composition(CompositionError::NoInputs))
        ));
    }

    #[tokio::test]
    async fn test_zero_valid_clips_produces_no_output() {
        let engine = CompositionEngine::new(Config::default());
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty.mp4");
        std::fs::write(&empty, b"x").unwrap();
        let clips = vec![dir.path().join("missing.mp4"), empty, dir.path().join("gone.png")];
        let output = dir.path().join("final").join("out.mp4");

        let result = engine.compose(&clips, &output).await;
        assert!(matches!(
            result,
            Err(CompositorError::Composition(CompositionError::NoValidClips { requested: 3 }))
        ));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.composition.transition_duration = 7.0;
        let engine = CompositionEngine::new(config);
        let dir = tempdir().unwrap();

        let result = engine.compose(&[dir.path().join("a.mp4")], dir.path().join("out.mp4")).await;
        assert!(matches!(result, Err(CompositorError::Config(_))));
    }

    #[test]
    fn test_plan_three_videos() {
        let engine = CompositionEngine::new(config_with_transition(1.0));
        let prepared = prepared(
            &engine,
            vec![
                video("/c/a.mp4", 6.0, true),
                video("/c/b.mp4", 6.0, false),
                video("/c/c.mp4", 6.0, true),
            ],
        );
        assert_eq!(prepared.timeline.offsets(), &[0.0, 5.0, 10.0]);

        let plan = engine.plan(&prepared, None, Path::new("/out/final.mp4")).unwrap();
        assert_eq!(plan.inputs.len(), 3);
        assert_eq!(plan.inputs[1].options, vec!["-t".to_string(), "6.000".to_string()]);
        assert_eq!(plan.video_label, "vx2");
        assert_eq!(plan.audio_label, "narration");
        assert!((plan.duration - 16.0).abs() < 1e-9);

        let graph = plan.graph.to_string();
        assert!(graph.contains("xfade=transition=fade:duration=1.000:offset=5.000"));
        assert!(graph.contains("xfade=transition=fade:duration=1.000:offset=10.000"));
        assert!(graph.contains("adelay=delays=10000|10000[a2]"));
        assert!(graph.contains("anullsrc=channel_layout=stereo:sample_rate=44100,atrim=duration=6.000"));
    }

    #[test]
    fn test_plan_image_then_video() {
        let engine = CompositionEngine::new(config_with_transition(0.5));
        let image = Clip::image_wrapper("/out/temp_img_0.mp4", "/c/chart.png", 6.0, (1280, 720));
        let prepared = prepared(&engine, vec![image, video("/c/talk.mp4", 4.0, true)]);

        let plan = engine.plan(&prepared, None, Path::new("/out/final.mp4")).unwrap();
        assert!((plan.duration - 9.5).abs() < 1e-9);
        assert_eq!(plan.inputs[0].path, PathBuf::from("/out/temp_img_0.mp4"));

        let graph = plan.graph.to_string();
        assert!(graph.contains("offset=5.500"));
        assert!(graph.contains("adelay=delays=5500|5500[a1]"));
        assert!(graph.contains("atrim=duration=6.000"));
    }

    #[test]
    fn test_plan_with_music_adds_input_and_merge() {
        let engine = CompositionEngine::new(config_with_transition(1.0));
        let prepared = prepared(&engine, vec![video("/c/a.mp4", 6.0, true), video("/c/b.mp4", 6.0, true)]);
        let bed = MusicBed {
            path: PathBuf::from("/m/bed.mp3"),
            duration: 4.0,
        };

        let plan = engine.plan(&prepared, Some(&bed), Path::new("/out/final.mp4")).unwrap();
        assert_eq!(plan.inputs.len(), 3);
        assert!(plan.inputs[2].is_looped());
        assert_eq!(plan.audio_label, "aout");
        assert_eq!(plan.graph.producer("music").unwrap().inputs(), &["2:a".to_string()]);
        assert!((plan.duration - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_plan_single_clip() {
        let engine = CompositionEngine::new(Config::default());
        let prepared = prepared(&engine, vec![video("/c/a.mp4", 3.0, false)]);

        let plan = engine.plan(&prepared, None, Path::new("/out/final.mp4")).unwrap();
        assert_eq!(plan.video_label, "v0");
        assert_eq!(plan.audio_label, "a0");
        let graph = plan.graph.to_string();
        assert!(!graph.contains("xfade"));
        assert!(!graph.contains("amix"));
    }

    #[test]
    fn test_clamped_clip_is_scheduled() {
        let engine = CompositionEngine::new(config_with_transition(0.6));
        let timeline = engine.schedule(&[video("/c/a.mp4", 0.3, true), video("/c/b.mp4", 5.0, true)]);
        assert_eq!(timeline.clamped(), &[0]);
        assert!((timeline.total() - 5.01).abs() < 1e-9);
    }

    #[test]
    fn test_plan_holds_short_last_clip() {
        let engine = CompositionEngine::new(config_with_transition(0.6));
        let prepared = prepared(&engine, vec![video("/c/a.mp4", 5.0, true), video("/c/b.mp4", 0.3, true)]);
        assert_eq!(prepared.timeline.clamped(), &[1]);

        let plan = engine.plan(&prepared, None, Path::new("/out/final.mp4")).unwrap();
        assert!((plan.duration - 5.0).abs() < 1e-9);

        let graph = plan.graph.to_string();
        assert!(graph.contains("tpad=stop_mode=clone:stop_duration=0.300[v1]"));
        assert!(graph.contains("apad=whole_dur=0.600"));
        assert!(graph.contains("xfade=transition=fade:duration=0.600:offset=4.400"));
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        image::RgbImage::from_fn(64, 48, |x, y| image::Rgb([(x * 4) as u8, (y * 5) as u8, ((x ^ y) * 3) as u8]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_dropped_inputs_keep_the_order_of_the_rest() {
        let dir = tempdir().unwrap();
        let a = write_png(dir.path(), "a.png");
        let b = write_png(dir.path(), "b.png");
        let missing = dir.path().join("missing.mp4");
        let tiny = dir.path().join("tiny.png");
        std::fs::write(&tiny, [0u8; 10]).unwrap();

        let engine = CompositionEngine::new(Config::default());
        let inputs = vec![a.clone(), missing.clone(), tiny.clone(), b.clone()];
        let (candidates, skipped) = engine.inspect_inputs(&inputs).await.unwrap();

        let kept: Vec<&Path> = candidates.iter().map(Candidate::path).collect();
        assert_eq!(kept, vec![a.as_path(), b.as_path()]);

        let dropped: Vec<&Path> = skipped.iter().map(|s| s.path.as_path()).collect();
        assert_eq!(dropped, vec![missing.as_path(), tiny.as_path()]);
        assert!(skipped[1].reason.contains("too small"));
    }

    #[tokio::test]
    async fn test_missing_ffprobe_fails_the_job() {
        let dir = tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, vec![0u8; 500]).unwrap();

        let mut config = Config::default();
        config.tools.ffprobe = PathBuf::from("definitely-not-ffprobe");
        let engine = CompositionEngine::new(config);

        let result = engine.compose(&[clip], dir.path().join("out.mp4")).await;
        assert!(matches!(
            result,
            Err(CompositorError::Encode(crate::error::EncodeError::ToolUnavailable { .. }))
        ));
    }

    #[tokio::test]
    async fn test_target_comes_from_first_surviving_clip() {
        if !Path::new("/bin/false").exists() && !Path::new("/usr/bin/false").exists() {
            return;
        }
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        // Every image conversion fails with a clean non-zero exit.
        config.tools.ffmpeg = PathBuf::from("false");
        let engine = CompositionEngine::new(config);

        let candidates = vec![
            Candidate::Image {
                path: dir.path().join("chart.png"),
                width: 800,
                height: 600,
            },
            Candidate::Video {
                path: PathBuf::from("/c/talk.mp4"),
                info: MediaInfo {
                    duration: 4.0,
                    width: Some(1920),
                    height: Some(1080),
                    has_audio: true,
                },
            },
        ];

        let mut temps = TempClips::new();
        let mut skipped = Vec::new();
        let (clips, target) = engine
            .normalize_inputs(candidates, dir.path(), &mut temps, &mut skipped)
            .await
            .unwrap();

        assert_eq!(target, (1920, 1080));
        assert_eq!(clips.len(), 1);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].path, dir.path().join("chart.png"));
    }

    fn ffmpeg_available(config: &Config) -> bool {
        tool::check_available(&config.tools.ffmpeg) && tool::check_available(&config.tools.ffprobe)
    }

    fn make_clip(dir: &Path, name: &str, seconds: u32, with_audio: bool) -> PathBuf {
        let path = dir.join(name);
        let duration = seconds.to_string();
        let mut cmd = std::process::Command::new("ffmpeg");
        cmd.args(["-y", "-v", "error", "-f", "lavfi", "-i"])
            .arg(format!("testsrc=size=320x240:rate=25:duration={}", duration));
        if with_audio {
            cmd.args(["-f", "lavfi", "-i"])
                .arg(format!("sine=frequency=440:duration={}", duration))
                .args(["-c:a", "aac", "-shortest"]);
        }
        cmd.args(["-c:v", "libx264", "-pix_fmt", "yuv420p"]).arg(&path);
        assert!(cmd.status().unwrap().success());
        path
    }

    #[tokio::test]
    async fn test_compose_end_to_end() {
        let mut config = config_with_transition(0.5);
        config.composition.default_image_duration = 2.0;
        if !ffmpeg_available(&config) {
            return;
        }

        let dir = tempdir().unwrap();
        let first = make_clip(dir.path(), "a.mp4", 2, true);
        let silent = make_clip(dir.path(), "b.mp4", 2, false);
        let chart = dir.path().join("chart.png");
        image::RgbImage::from_pixel(160, 90, image::Rgb([200, 40, 40]))
            .save(&chart)
            .unwrap();

        let output = dir.path().join("out").join("final.mp4");
        let engine = CompositionEngine::new(config);
        let clips = vec![first, chart, dir.path().join("missing.mp4"), silent];
        let report = engine.compose(&clips, &output).await.unwrap();

        assert_eq!(report.clip_count, 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.resolution, (320, 240));
        assert!((report.total_duration - 5.0).abs() < 0.2);
        assert!(report.file_size > 1000);
        assert!(output.exists());

        let leftovers = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("temp_img_"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
