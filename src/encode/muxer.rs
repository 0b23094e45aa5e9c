use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::encode::diagnostics;
use crate::error::{Diagnostics, EncodeError, Result};
use crate::graph::{seconds, FilterGraph};
use crate::tool;

/// One `-i` input together with the options placed before it
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInput {
    pub path: PathBuf,
    pub options: Vec<String>,
}

impl MediaInput {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            options: Vec::new(),
        }
    }

    /// Read at most `duration` seconds of the input
    pub fn limited<P: Into<PathBuf>>(path: P, duration: f64) -> Self {
        Self::new(path).option("-t").option(seconds(duration))
    }

    /// Repeat the input indefinitely
    pub fn looped<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(path).option("-stream_loop").option("-1")
    }

    pub fn option<S: Into<String>>(mut self, value: S) -> Self {
        self.options.push(value.into());
        self
    }

    pub fn is_looped(&self) -> bool {
        self.options.iter().any(|o| o == "-stream_loop")
    }

    fn push_args(&self, args: &mut Vec<OsString>) {
        args.extend(self.options.iter().map(OsString::from));
        args.push(OsString::from("-i"));
        args.push(self.path.as_os_str().to_owned());
    }
}

/// Everything needed for the single final ffmpeg invocation
#[derive(Debug, Clone)]
pub struct EncodePlan {
    pub inputs: Vec<MediaInput>,
    pub graph: FilterGraph,
    pub video_label: String,
    pub audio_label: String,
    /// Codec and container options placed before the output path
    pub output_args: Vec<String>,
    pub output: PathBuf,
    /// Expected output length in seconds
    pub duration: f64,
}

impl EncodePlan {
    /// Full ffmpeg argument list
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args = Vec::new();
        for input in &self.inputs {
            input.push_args(&mut args);
        }

        for arg in [
            "-filter_complex".to_string(),
            self.graph.to_string(),
            "-map".to_string(),
            format!("[{}]", self.video_label),
            "-map".to_string(),
            format!("[{}]", self.audio_label),
        ] {
            args.push(OsString::from(arg));
        }

        args.extend(self.output_args.iter().map(OsString::from));
        args.push(self.output.as_os_str().to_owned());
        args
    }

    /// Shell-style rendering for logs and dry runs
    pub fn command_line(&self, ffmpeg: &Path) -> String {
        let mut line = tool::render_args(&[ffmpeg.as_os_str()]);
        line.push(' ');
        line.push_str(&tool::render_args(&self.to_args()));
        line
    }
}

/// Codec, rate and container options for the final output
pub fn output_args(config: &Config) -> Vec<String> {
    let encoder = &config.encoder;
    let mut args: Vec<String> = vec![
        "-c:v".into(),
        encoder.video_codec.clone(),
        "-pix_fmt".into(),
        encoder.pixel_format.clone(),
        "-r".into(),
        config.video.fps.to_string(),
        "-crf".into(),
        encoder.crf.to_string(),
        "-preset".into(),
        encoder.preset.clone(),
        "-b:v".into(),
        encoder.video_bitrate.clone(),
    ];
    if encoder.faststart {
        args.push("-movflags".into());
        args.push("+faststart".into());
    }
    args.extend([
        "-c:a".into(),
        encoder.audio_codec.clone(),
        "-b:a".into(),
        encoder.audio_bitrate.clone(),
        "-ar".into(),
        config.audio.sample_rate.to_string(),
        "-strict".into(),
        "-2".into(),
        "-y".into(),
    ]);
    args
}

/// Result of a successful encode
#[derive(Debug, Clone)]
pub struct EncodeOutcome {
    pub size: u64,
    pub diagnostics: Diagnostics,
}

/// Runs an [`EncodePlan`] and judges the result
pub struct Muxer {
    ffmpeg: PathBuf,
    min_output_size: u64,
}

impl Muxer {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg: config.tools.ffmpeg.clone(),
            min_output_size: config.encoder.min_output_size,
        }
    }

    pub fn ffmpeg(&self) -> &Path {
        &self.ffmpeg
    }

    /// Run the final encode
    ///
    /// Success means ffmpeg exited cleanly and left an output larger than the
    /// configured minimum size.
    pub async fn encode(&self, plan: &EncodePlan) -> Result<EncodeOutcome> {
        info!(
            "Encoding {} input(s) into {} ({:.2}s)",
            plan.inputs.len(),
            plan.output.display(),
            plan.duration
        );
        debug!("Filtergraph: {}", plan.graph);

        let output = tool::run(&self.ffmpeg, plan.to_args()).await?;
        let diagnostics = diagnostics::scan(&output.stderr);

        if !output.success {
            return Err(EncodeError::ProcessFailed {
                status: output.status,
                diagnostics,
            }
            .into());
        }

        let size = self.check_output(&plan.output, &diagnostics)?;

        if !diagnostics.error_lines.is_empty() {
            warn!("ffmpeg reported problems despite success:{}", diagnostics);
        } else if !diagnostics.is_empty() {
            debug!("ffmpeg output:{}", diagnostics);
        }
        info!("Output written: {} ({} bytes)", plan.output.display(), size);

        Ok(EncodeOutcome { size, diagnostics })
    }

    /// Size of the produced file, or the failure it represents
    pub fn check_output(&self, path: &Path, diagnostics: &Diagnostics) -> Result<u64> {
        let metadata = std::fs::metadata(path).map_err(|_| EncodeError::OutputMissing {
            path: path.display().to_string(),
            diagnostics: diagnostics.clone(),
        })?;

        let size = metadata.len();
        if size <= self.min_output_size {
            return Err(EncodeError::OutputTooSmall {
                path: path.display().to_string(),
                size,
                diagnostics: diagnostics.clone(),
            }
            .into());
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompositorError;
    use crate::graph::{Filter, FilterChain};
    use tempfile::tempdir;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    fn sample_plan() -> EncodePlan {
        let mut graph = FilterGraph::new();
        graph.push(
            FilterChain::from_input("0:v")
                .then(Filter::new("fps").opt("fps", 25))
                .output("v0"),
        );
        graph.push(
            FilterChain::from_input("0:a")
                .then(Filter::new("aresample"))
                .output("a0"),
        );
        EncodePlan {
            inputs: vec![MediaInput::limited("/clips/a.mp4", 4.0)],
            graph,
            video_label: "v0".to_string(),
            audio_label: "a0".to_string(),
            output_args: output_args(&Config::default()),
            output: PathBuf::from("/out/final.mp4"),
            duration: 4.0,
        }
    }

    #[test]
    fn test_default_output_args() {
        assert_eq!(
            output_args(&Config::default()).join(" "),
            "-c:v libx264 -pix_fmt yuv420p -r 25 -crf 23 -preset medium -b:v 4000k \
             -movflags +faststart -c:a aac -b:a 128k -ar 44100 -strict -2 -y"
        );
    }

    #[test]
    fn test_plan_args_order() {
        let args = strings(sample_plan().to_args());
        assert_eq!(&args[..4], &["-t", "4.000", "-i", "/clips/a.mp4"]);
        assert_eq!(args[4], "-filter_complex");
        assert_eq!(args[5], "[0:v]fps=fps=25[v0];[0:a]aresample[a0]");
        assert_eq!(&args[6..10], &["-map", "[v0]", "-map", "[a0]"]);
        assert_eq!(args.last().unwrap(), "/out/final.mp4");
        assert_eq!(args[args.len() - 2], "-y");
    }

    #[test]
    fn test_looped_input() {
        let input = MediaInput::looped("/music/bed.mp3");
        assert!(input.is_looped());
        let mut args = Vec::new();
        input.push_args(&mut args);
        assert_eq!(strings(args), vec!["-stream_loop", "-1", "-i", "/music/bed.mp3"]);
        assert!(!MediaInput::limited("/a.mp4", 1.0).is_looped());
    }

    #[test]
    fn test_command_line_quotes_graph() {
        let line = sample_plan().command_line(Path::new("ffmpeg"));
        assert!(line.starts_with("ffmpeg -t 4.000 -i /clips/a.mp4 -filter_complex '[0:v]"));
    }

    #[test]
    fn test_output_checks() {
        let dir = tempdir().unwrap();
        let muxer = Muxer::new(&Config::default());
        let diagnostics = Diagnostics::default();

        let missing = dir.path().join("missing.mp4");
        assert!(matches!(
            muxer.check_output(&missing, &diagnostics),
            Err(CompositorError::Encode(EncodeError::OutputMissing { .. }))
        ));

        let tiny = dir.path().join("tiny.mp4");
        std::fs::write(&tiny, vec![0u8; 1000]).unwrap();
        assert!(matches!(
            muxer.check_output(&tiny, &diagnostics),
            Err(CompositorError::Encode(EncodeError::OutputTooSmall { size: 1000, .. }))
        ));

        let ok = dir.path().join("ok.mp4");
        std::fs::write(&ok, vec![0u8; 1001]).unwrap();
        assert_eq!(muxer.check_output(&ok, &diagnostics).unwrap(), 1001);
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_reported() {
        let mut config = Config::default();
        config.tools.ffmpeg = PathBuf::from("definitely-not-a-real-ffmpeg");
        let muxer = Muxer::new(&config);

        let result = muxer.encode(&sample_plan()).await;
        assert!(matches!(
            result,
            Err(CompositorError::Encode(EncodeError::ToolUnavailable { .. }))
        ));
    }
}
