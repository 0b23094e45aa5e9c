//! # External Tool Runner
//!
//! Runs `ffmpeg`/`ffprobe` as async subprocesses and captures their output.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::error::{EncodeError, Result};

/// Captured result of one external tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    pub status: String,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// Whether `program -version` runs successfully
pub fn check_available<P: AsRef<Path>>(program: P) -> bool {
    std::process::Command::new(program.as_ref())
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Run `program` with `args` to completion, capturing stdout and stderr
pub async fn run<P, I, S>(program: P, args: I) -> Result<ToolOutput>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let program = program.as_ref().to_path_buf();
    let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    let tool = program.display().to_string();

    debug!("Running {} {}", tool, render_args(&args));

    let output = Command::new(&program)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EncodeError::ToolUnavailable { tool: tool.clone() }
            } else {
                EncodeError::Spawn {
                    tool: tool.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

    let status = match output.status.code() {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    };

    Ok(ToolOutput {
        success: output.status.success(),
        status,
        stdout: output.stdout,
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Shell-like rendering of an argument list for logs and dry runs
pub fn render_args<S: AsRef<std::ffi::OsStr>>(args: &[S]) -> String {
    args.iter()
        .map(|arg| {
            let arg = arg.as_ref().to_string_lossy();
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == ';' || c == '[' || c == '|') {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
