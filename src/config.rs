use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Clip Compositor
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transition and image timing
    pub composition: CompositionConfig,

    /// Target video format
    pub video: VideoConfig,

    /// Common audio format every clip is converted to
    pub audio: AudioConfig,

    /// Optional background music bed
    pub music: MusicConfig,

    /// Output codec parameters
    pub encoder: EncoderConfig,

    /// Input validation thresholds
    pub probe: ProbeConfig,

    /// External engine binaries
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidValue {
            key: "config".to_string(),
            value: e.to_string(),
        })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.composition.validate()?;
        self.video.validate()?;
        self.audio.validate()?;
        self.music.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Transition and image timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Crossfade overlap between consecutive clips (seconds)
    pub transition_duration: f64,

    /// How long a still image is held on screen (seconds)
    pub default_image_duration: f64,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            transition_duration: 0.6,
            default_image_duration: 6.0,
        }
    }
}

impl CompositionConfig {
    fn validate(&self) -> Result<()> {
        if !self.transition_duration.is_finite() || self.transition_duration < 0.0 {
            return Err(invalid("composition.transition_duration", self.transition_duration).into());
        }

        if !self.default_image_duration.is_finite() || self.default_image_duration <= 0.0 {
            return Err(invalid("composition.default_image_duration", self.default_image_duration).into());
        }

        // Every image would otherwise be floored by the scheduler.
        if self.transition_duration >= self.default_image_duration {
            return Err(invalid(
                "composition.transition_duration",
                format!(
                    "{} (must be shorter than default_image_duration {})",
                    self.transition_duration, self.default_image_duration
                ),
            )
            .into());
        }

        Ok(())
    }
}

/// Target video format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Explicit output width; when unset the first valid clip decides
    pub width: Option<u32>,

    /// Explicit output height; when unset the first valid clip decides
    pub height: Option<u32>,

    /// Size used when nothing else determines the target
    pub fallback_width: u32,
    pub fallback_height: u32,

    /// Output frame rate
    pub fps: u32,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fallback_width: 1280,
            fallback_height: 720,
            fps: 25,
        }
    }
}

impl VideoConfig {
    /// Explicitly configured target size, if both dimensions are set
    pub fn explicit_resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width.is_some() != self.height.is_some() {
            return Err(invalid(
                "video.width/height",
                format!("{:?}x{:?} (set both or neither)", self.width, self.height),
            )
            .into());
        }

        if let Some((w, h)) = self.explicit_resolution() {
            if w < 2 || h < 2 {
                return Err(invalid("video.resolution", format!("{}x{}", w, h)).into());
            }
        }

        if self.fallback_width < 2 || self.fallback_height < 2 {
            return Err(invalid(
                "video.fallback_resolution",
                format!("{}x{}", self.fallback_width, self.fallback_height),
            )
            .into());
        }

        if self.fps == 0 {
            return Err(invalid("video.fps", self.fps).into());
        }

        Ok(())
    }
}

/// Common audio format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channel_layout: String,
    pub sample_format: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channel_layout: "stereo".to_string(),
            sample_format: "fltp".to_string(),
        }
    }
}

impl AudioConfig {
    /// Number of channels implied by the layout, used to build per-channel delays
    pub fn channel_count(&self) -> usize {
        match self.channel_layout.as_str() {
            "mono" => 1,
            "stereo" | "downmix" => 2,
            "2.1" | "3.0" => 3,
            "quad" | "4.0" => 4,
            "5.0" => 5,
            "5.1" => 6,
            "7.1" => 8,
            _ => 2,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(invalid("audio.sample_rate", self.sample_rate).into());
        }

        if self.channel_layout.trim().is_empty() {
            return Err(invalid("audio.channel_layout", "<empty>").into());
        }

        Ok(())
    }
}

/// Background music bed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub path: Option<PathBuf>,

    /// Linear gain applied to the music before mixing
    pub volume: f64,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            path: None,
            volume: 0.08,
        }
    }
}

impl MusicConfig {
    fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(invalid("music.volume", self.volume).into());
        }
        Ok(())
    }
}

/// Output codec parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub video_codec: String,
    pub pixel_format: String,
    pub crf: u8,
    pub preset: String,
    pub video_bitrate: String,
    pub audio_codec: String,
    pub audio_bitrate: String,

    /// Move the moov atom to the front for progressive playback
    pub faststart: bool,

    /// Outputs at or below this size (bytes) count as failed
    pub min_output_size: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            crf: 23,
            preset: "medium".to_string(),
            video_bitrate: "4000k".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            faststart: true,
            min_output_size: 1000,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.crf > 51 {
            return Err(invalid("encoder.crf", self.crf).into());
        }

        if self.video_codec.trim().is_empty() {
            return Err(invalid("encoder.video_codec", "<empty>").into());
        }

        if self.audio_codec.trim().is_empty() {
            return Err(invalid("encoder.audio_codec", "<empty>").into());
        }

        Ok(())
    }
}

/// Input validation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Files smaller than this (bytes) are treated as corrupt
    pub min_file_size: u64,

    /// Probed durations at or below this (seconds) are rejected
    pub min_duration: f64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            min_file_size: 100,
            min_duration: 0.01,
        }
    }
}

/// External engine binaries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.video.width = Some(1920);
        original_config.video.height = Some(1080);
        original_config.music.path = Some(PathBuf::from("bed.mp3"));

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.video.explicit_resolution(), Some((1920, 1080)));
        assert_eq!(loaded_config.music.path, Some(PathBuf::from("bed.mp3")));
        assert_eq!(loaded_config.audio.sample_rate, 44100);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[composition]\ntransition_duration = 1.0\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.composition.transition_duration, 1.0);
        assert_eq!(config.composition.default_image_duration, 6.0);
        assert_eq!(config.video.fps, 25);
        assert_eq!(config.encoder.video_codec, "libx264");
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::CompositorError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_transition_longer_than_image_rejected() {
        let mut config = Config::default();
        config.composition.transition_duration = 6.0;
        assert!(config.validate().is_err());

        config.composition.transition_duration = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_half_specified_resolution_rejected() {
        let mut config = Config::default();
        config.video.width = Some(1280);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_channel_count() {
        let mut audio = AudioConfig::default();
        assert_eq!(audio.channel_count(), 2);
        audio.channel_layout = "mono".to_string();
        assert_eq!(audio.channel_count(), 1);
        audio.channel_layout = "5.1".to_string();
        assert_eq!(audio.channel_count(), 6);
    }
}
