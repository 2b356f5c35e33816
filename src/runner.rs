//! Process boundary for the external encoder.
//!
//! One blocking child process per pass; stderr is captured so a failed
//! pass can surface what the encoder actually complained about.

use std::process::Command;

use tracing::{debug, info};

use crate::command::PassSpec;
use crate::error::{Result, ShrinkError};

/// Seam for the encode boundary; the search controller only sees this.
pub trait PassRunner {
    fn run(&self, spec: &PassSpec) -> Result<()>;
}

pub struct FfmpegRunner {
    /// Attach full encoder stderr to errors instead of a summary.
    pub verbose: bool,
}

pub fn is_ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok()
}

impl PassRunner for FfmpegRunner {
    fn run(&self, spec: &PassSpec) -> Result<()> {
        info!("🎞️  Running encode pass {}", spec.pass);
        debug!(args = ?spec.args, "ffmpeg invocation");

        let output = Command::new("ffmpeg").args(&spec.args).output()?;

        if output.status.success() {
            debug!(pass = spec.pass, "encode pass completed");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = if self.verbose {
            stderr.trim().to_string()
        } else {
            summarize_stderr(&stderr)
        };
        Err(ShrinkError::Encode {
            pass: spec.pass,
            exit_code: output.status.code(),
            message,
        })
    }
}

/// Last meaningful stderr line; ffmpeg puts the actual error there.
fn summarize_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no error output (run with --verbose for details)")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_stderr_takes_last_line() {
        let stderr = "frame=  100\nframe=  200\nConversion failed!\n\n";
        assert_eq!(summarize_stderr(stderr), "Conversion failed!");
    }

    #[test]
    fn test_summarize_stderr_empty() {
        assert!(summarize_stderr("").contains("--verbose"));
    }
}
