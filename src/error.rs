use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShrinkError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("FFprobe failed: {0}")]
    Probe(String),

    #[error(
        "Target size is infeasible: {target_mib:.2} MiB over {duration_secs}s \
         allows {total_kbps:.0} kbps total, audio alone needs {audio_kbps} kbps"
    )]
    InfeasibleTarget {
        target_mib: f64,
        duration_secs: u32,
        total_kbps: f64,
        audio_kbps: u32,
    },

    #[error("FFmpeg pass {pass} failed{}: {message}", .exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    Encode {
        pass: u8,
        exit_code: Option<i32>,
        message: String,
    },

    #[error("Output already exists: {} (use --overwrite to replace it)", .path.display())]
    PathConflict { path: PathBuf },

    #[error("External tool not found: {0} (is ffmpeg installed and in PATH?)")]
    ToolNotFound(String),

    #[error("Cancelled by user")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ShrinkError>;
