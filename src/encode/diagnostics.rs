use crate::error::Diagnostics;

/// Substrings (lowercase) that mark an ffmpeg stderr line as a likely failure cause
pub const KEYWORDS: &[&str] = &[
    "error",
    "failed",
    "unable",
    "invalid",
    "unknown",
    "can not",
    "cannot",
    "no such file",
];

/// Lines kept from either the keyword matches or the plain tail
pub const MAX_LINES: usize = 15;

/// Extract the lines most likely to explain an ffmpeg failure
pub fn scan(stderr: &str) -> Diagnostics {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect();

    let matches: Vec<&str> = lines.iter().copied().filter(|line| is_error_line(line)).collect();

    Diagnostics {
        error_lines: last_n(&matches),
        tail: last_n(&lines),
    }
}

pub fn is_error_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn last_n(lines: &[&str]) -> Vec<String> {
    let start = lines.len().saturating_sub(MAX_LINES);
    lines[start..].iter().map(|line| line.to_string()).collect()
}
