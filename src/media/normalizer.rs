use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{NormalizeError, Result};
use crate::graph::{self, Filter};
use crate::media::prober::MediaProber;
use crate::media::types::{even_resolution, Clip, ClipKind, MediaInfo};
use crate::tool;
use crate::video::track::letterbox_filters;

/// An input that passed validation but has not been normalized yet
#[derive(Debug, Clone)]
pub enum Candidate {
    Video {
        path: PathBuf,
        info: MediaInfo,
    },
    Image {
        path: PathBuf,
        width: u32,
        height: u32,
    },
}

impl Candidate {
    pub fn path(&self) -> &Path {
        match self {
            Self::Video { path, .. } | Self::Image { path, .. } => path,
        }
    }
}

/// Temporary wrapper clips that live for one composition
///
/// Every registered file is deleted when the guard is dropped, on success,
/// error or panic alike.
#[derive(Debug, Default)]
pub struct TempClips {
    paths: Vec<TempPath>,
}

impl TempClips {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a uniquely named `.mp4` file in `dir` and track it for deletion
    pub fn reserve(&mut self, dir: &Path, index: usize, source: &Path) -> Result<PathBuf> {
        let prefix = format!("temp_img_{}_{}_", index, sanitize_stem(source));
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".mp4")
            .tempfile_in(dir)?
            .into_temp_path();

        let path = temp.to_path_buf();
        self.paths.push(temp);
        Ok(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove every tracked file now, returning how many were deleted
    pub fn cleanup(&mut self) -> usize {
        if self.paths.is_empty() {
            return 0;
        }

        info!("Cleaning up {} temporary file(s)", self.paths.len());
        let mut cleaned = 0;
        for temp in self.paths.drain(..) {
            let name = temp.to_path_buf();
            match temp.close() {
                Ok(()) => cleaned += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Error removing temp file {}: {}", name.display(), e),
            }
        }
        debug!("Cleaned up {} temporary file(s)", cleaned);
        cleaned
    }
}

impl Drop for TempClips {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Turns validated inputs into clips the track builders can consume
pub struct InputNormalizer {
    prober: MediaProber,
    ffmpeg: PathBuf,
    fps: u32,
    image_duration: f64,
    video_codec: String,
    pixel_format: String,
    video_bitrate: String,
    preset: String,
}

impl InputNormalizer {
    pub fn new(config: &Config) -> Self {
        Self {
            prober: MediaProber::new(&config.tools, &config.probe),
            ffmpeg: config.tools.ffmpeg.clone(),
            fps: config.video.fps,
            image_duration: config.composition.default_image_duration,
            video_codec: config.encoder.video_codec.clone(),
            pixel_format: config.encoder.pixel_format.clone(),
            video_bitrate: config.encoder.video_bitrate.clone(),
            preset: config.encoder.preset.clone(),
        }
    }

    /// Validate one input: probe videos, check images decode
    pub async fn inspect(&self, path: &Path) -> Result<Candidate> {
        match ClipKind::from_path(path) {
            ClipKind::Video => {
                let info = self.prober.probe(path).await?;
                Ok(Candidate::Video {
                    path: path.to_path_buf(),
                    info,
                })
            }
            ClipKind::Image => {
                self.prober.check_file(path)?;
                let (width, height) =
                    image::image_dimensions(path).map_err(|e| NormalizeError::UnreadableImage {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Candidate::Image {
                    path: path.to_path_buf(),
                    width,
                    height,
                })
            }
        }
    }

    /// Produce a composable clip from a validated input
    ///
    /// Images become silent wrapper videos at `target`; videos pass through.
    pub async fn normalize(
        &self,
        index: usize,
        candidate: Candidate,
        target: (u32, u32),
        temp_dir: &Path,
        temps: &mut TempClips,
    ) -> Result<Clip> {
        match candidate {
            Candidate::Video { path, info } => {
                let mut clip = Clip::video(path, &info);
                if clip.resolution().is_none() {
                    clip.width = Some(target.0);
                    clip.height = Some(target.1);
                }
                Ok(clip)
            }
            Candidate::Image { path, .. } => {
                let wrapper = temps.reserve(temp_dir, index, &path)?;
                self.image_to_video(&path, &wrapper, target).await
            }
        }
    }

    async fn image_to_video(&self, image: &Path, wrapper: &Path, target: (u32, u32)) -> Result<Clip> {
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!("Converting image '{}' to video ({:.1}s)...", name, self.image_duration);

        let args = self.image_args(image, wrapper, target);
        let output = tool::run(&self.ffmpeg, args).await?;

        if !output.success {
            let tail: Vec<&str> = output.stderr.lines().rev().take(5).collect();
            return Err(NormalizeError::ConversionFailed {
                path: image.display().to_string(),
                reason: tail.into_iter().rev().collect::<Vec<_>>().join(" | "),
            }
            .into());
        }

        let created = std::fs::metadata(wrapper).map(|m| m.len() > 0).unwrap_or(false);
        if !created {
            return Err(NormalizeError::OutputMissing {
                path: wrapper.display().to_string(),
            }
            .into());
        }

        let duration = match self.prober.probe(wrapper).await {
            Ok(probed) => {
                debug!("Created temp video {} ({:.2}s)", wrapper.display(), probed.duration);
                probed.duration
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Could not validate converted clip for '{}' ({}); using fallback duration {:.2}s",
                    name, e, self.image_duration
                );
                self.image_duration
            }
            Err(e) => return Err(e),
        };

        Ok(Clip::image_wrapper(wrapper, image, duration, target))
    }

    /// ffmpeg arguments that hold `image` for the configured duration
    pub fn image_args(&self, image: &Path, wrapper: &Path, target: (u32, u32)) -> Vec<OsString> {
        let filters: Vec<String> = letterbox_filters(target)
            .into_iter()
            .chain([
                Filter::new("setsar").opt("sar", "1/1"),
                Filter::new("fps").opt("fps", self.fps),
            ])
            .map(|f| f.to_string())
            .collect();

        let mut args: Vec<OsString> = Vec::new();
        let mut push = |arg: &str| args.push(OsString::from(arg));
        push("-y");
        push("-loop");
        push("1");
        push("-framerate");
        push(&self.fps.to_string());
        push("-t");
        push(&graph::seconds(self.image_duration));
        push("-i");
        args.push(image.as_os_str().to_owned());

        for arg in [
            "-vf".to_string(),
            filters.join(","),
            "-c:v".to_string(),
            self.video_codec.clone(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
            "-b:v".to_string(),
            self.video_bitrate.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-an".to_string(),
        ] {
            args.push(OsString::from(arg));
        }
        args.push(wrapper.as_os_str().to_owned());
        args
    }
}

/// Pick the job's target resolution
///
/// An explicit configuration wins; otherwise the first validated clip decides
/// (a video's native size, or the fallback size for an image).
pub fn resolve_target(config: &Config, first: Option<&Candidate>) -> (u32, u32) {
    let fallback = (config.video.fallback_width, config.video.fallback_height);
    let resolution = match (config.video.explicit_resolution(), first) {
        (Some(explicit), _) => explicit,
        (None, Some(Candidate::Video { info, .. })) => info.resolution().unwrap_or(fallback),
        (None, _) => fallback,
    };
    even_resolution(resolution)
}

/// Filesystem-safe, bounded version of a file name for temp file prefixes
fn sanitize_stem(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(50)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn video_candidate(width: Option<u32>, height: Option<u32>) -> Candidate {
        Candidate::Video {
            path: PathBuf::from("/clips/intro.mp4"),
            info: MediaInfo {
                duration: 6.0,
                width,
                height,
                has_audio: true,
            },
        }
    }

    #[test]
    fn test_target_from_first_video() {
        let config = Config::default();
        let first = video_candidate(Some(1920), Some(1080));
        assert_eq!(resolve_target(&config, Some(&first)), (1920, 1080));
    }

    #[test]
    fn test_target_explicit_wins() {
        let mut config = Config::default();
        config.video.width = Some(854);
        config.video.height = Some(480);
        let first = video_candidate(Some(1920), Some(1080));
        assert_eq!(resolve_target(&config, Some(&first)), (854, 480));
    }

    #[test]
    fn test_target_falls_back_for_images_and_degenerate_probes() {
        let config = Config::default();
        let image = Candidate::Image {
            path: PathBuf::from("/charts/a.png"),
            width: 800,
            height: 600,
        };
        assert_eq!(resolve_target(&config, Some(&image)), (1280, 720));
        assert_eq!(resolve_target(&config, Some(&video_candidate(None, None))), (1280, 720));
        assert_eq!(resolve_target(&config, None), (1280, 720));
    }

    #[test]
    fn test_target_is_even() {
        let config = Config::default();
        let first = video_candidate(Some(721), Some(405));
        assert_eq!(resolve_target(&config, Some(&first)), (720, 404));
    }

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem(Path::new("/x/run rate-chart.png")), "run_rate_chart_png");
        let long = "a".repeat(80) + ".png";
        assert_eq!(sanitize_stem(Path::new(&long)).len(), 50);
    }

    #[test]
    fn test_temp_clips_removed_on_drop() {
        let dir = tempdir().unwrap();
        let reserved = {
            let mut temps = TempClips::new();
            let path = temps.reserve(dir.path(), 0, Path::new("chart.png")).unwrap();
            assert!(path.exists());
            assert_eq!(temps.len(), 1);
            path
        };
        assert!(!reserved.exists());
    }

    #[test]
    fn test_temp_clips_cleanup_counts() {
        let dir = tempdir().unwrap();
        let mut temps = TempClips::new();
        let a = temps.reserve(dir.path(), 0, Path::new("a.png")).unwrap();
        let b = temps.reserve(dir.path(), 1, Path::new("b.png")).unwrap();
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("temp_img_0_a_png_"));

        std::fs::remove_file(&b).unwrap();
        assert_eq!(temps.cleanup(), 1);
        assert!(temps.is_empty());
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_video_without_dimensions_gets_target() {
        let dir = tempdir().unwrap();
        let normalizer = InputNormalizer::new(&Config::default());
        let mut temps = TempClips::new();

        let clip = normalizer
            .normalize(0, video_candidate(None, None), (1280, 720), dir.path(), &mut temps)
            .await
            .unwrap();

        assert_eq!(clip.resolution(), Some((1280, 720)));
        assert!(!clip.is_temporary);
        assert!(temps.is_empty());
    }

    #[test]
    fn test_image_args() {
        let normalizer = InputNormalizer::new(&Config::default());
        let args: Vec<String> = normalizer
            .image_args(Path::new("/c/chart.png"), Path::new("/o/tmp.mp4"), (1280, 720))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[vf + 1],
            "scale=1280:720:force_original_aspect_ratio=decrease:flags=bicubic,\
             pad=1280:720:(ow-iw)/2:(oh-ih)/2:color=black,setsar=sar=1/1,fps=fps=25"
        );
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "6.000"));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "/o/tmp.mp4");
    }
}
