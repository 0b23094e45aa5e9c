use std::fmt;

use thiserror::Error;

/// Main error type for the Clip Compositor library
#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Encoding error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while inspecting a single input file
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("File is too small ({size} bytes), likely invalid: {path}")]
    TooSmall { path: String, size: u64 },

    #[error("Invalid duration ({duration:.3}s) in {path}")]
    InvalidDuration { path: String, duration: f64 },

    #[error("ffprobe failed for {path}: {stderr}")]
    ToolFailed { path: String, stderr: String },

    #[error("Could not parse ffprobe output for {path}: {reason}")]
    ParseFailed { path: String, reason: String },
}

/// Errors raised while turning an input into a composable clip
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Image could not be read: {path} - {reason}")]
    UnreadableImage { path: String, reason: String },

    #[error("Image to video conversion failed for {path}: {reason}")]
    ConversionFailed { path: String, reason: String },

    #[error("Converted clip was not created: {path}")]
    OutputMissing { path: String },
}

/// Job-level composition errors
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("No input clip paths provided")]
    NoInputs,

    #[error("No valid input clips found after pre-processing ({requested} requested)")]
    NoValidClips { requested: usize },

    #[error("Filtergraph construction failed: {reason}")]
    GraphConstruction { reason: String },
}

/// Errors raised by the final ffmpeg encode
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("{tool} not found. Please install FFmpeg.")]
    ToolUnavailable { tool: String },

    #[error("Failed to run {tool}: {reason}")]
    Spawn { tool: String, reason: String },

    #[error("ffmpeg exited with status {status}{diagnostics}")]
    ProcessFailed { status: String, diagnostics: Diagnostics },

    #[error("Output file not found after encoding: {path}{diagnostics}")]
    OutputMissing { path: String, diagnostics: Diagnostics },

    #[error("Output file is too small ({size} bytes): {path}{diagnostics}")]
    OutputTooSmall { path: String, size: u64, diagnostics: Diagnostics },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path} - {reason}")]
    ParseFailed { path: String, reason: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Excerpt of engine stderr used to localize a failure without re-running
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    /// Lines matching a known failure keyword (most recent last)
    pub error_lines: Vec<String>,

    /// Tail of the full stderr, used when no keyword matched
    pub tail: Vec<String>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.error_lines.is_empty() && self.tail.is_empty()
    }

    /// The most useful lines: keyword matches if any, otherwise the tail
    pub fn lines(&self) -> &[String] {
        if self.error_lines.is_empty() {
            &self.tail
        } else {
            &self.error_lines
        }
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.lines() {
            write!(f, "\n    {}", line)?;
        }
        Ok(())
    }
}

/// Convenience type alias for Results using CompositorError
pub type Result<T> = std::result::Result<T, CompositorError>;

impl CompositorError {
    /// Per-clip errors are absorbed by dropping the clip; everything else ends the job
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Probe(_) | Self::Normalize(_))
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Composition(CompositionError::NoValidClips { requested }) => {
                format!(
                    "None of the {} input clip(s) could be used. Check that the files exist and are valid media.",
                    requested
                )
            }
            Self::Encode(EncodeError::ToolUnavailable { tool }) => {
                format!("'{}' was not found. Install FFmpeg or set tools.{} in the configuration.", tool, tool)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
