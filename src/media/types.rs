use std::path::{Path, PathBuf};

/// Extensions treated as still images
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif"];

/// Kind of input media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipKind {
    Video,
    Image,
}

impl ClipKind {
    /// Classify a path by its extension (case-insensitive)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let is_image = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false);

        if is_image {
            Self::Image
        } else {
            Self::Video
        }
    }
}

/// What the prober learned about a file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds, always > 0
    pub duration: f64,

    /// Pixel dimensions of the first video stream, if usable
    pub width: Option<u32>,
    pub height: Option<u32>,

    pub has_audio: bool,
}

impl MediaInfo {
    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }
}

/// One input unit of the composition
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    /// Media actually fed to the encoder (a wrapper file for images)
    pub path: PathBuf,

    /// Path as supplied by the caller
    pub source: PathBuf,

    pub kind: ClipKind,

    /// Duration in seconds, always > 0
    pub duration: f64,

    pub width: Option<u32>,
    pub height: Option<u32>,

    pub has_audio: bool,

    /// Synthesized wrapper that must be deleted after composition
    pub is_temporary: bool,
}

impl Clip {
    /// A real video passed through with its probed metadata
    pub fn video<P: Into<PathBuf>>(path: P, info: &MediaInfo) -> Self {
        let path = path.into();
        Self {
            source: path.clone(),
            path,
            kind: ClipKind::Video,
            duration: info.duration,
            width: info.width,
            height: info.height,
            has_audio: info.has_audio,
            is_temporary: false,
        }
    }

    /// A silent wrapper clip synthesized from a still image
    pub fn image_wrapper<P: Into<PathBuf>, S: Into<PathBuf>>(
        wrapper: P,
        source: S,
        duration: f64,
        resolution: (u32, u32),
    ) -> Self {
        Self {
            path: wrapper.into(),
            source: source.into(),
            kind: ClipKind::Image,
            duration,
            width: Some(resolution.0),
            height: Some(resolution.1),
            has_audio: false,
            is_temporary: true,
        }
    }

    pub fn resolution(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some((w, h)),
            _ => None,
        }
    }

    /// Whether the clip must be scaled/padded to reach `target`
    pub fn needs_scaling(&self, target: (u32, u32)) -> bool {
        self.resolution() != Some(target)
    }

    /// Short name for logs
    pub fn name(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}

/// Round a resolution down to even dimensions, as yuv420p requires
pub fn even_resolution((width, height): (u32, u32)) -> (u32, u32) {
    ((width / 2 * 2).max(2), (height / 2 * 2).max(2))
}
