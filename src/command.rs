//! Two-pass command building.
//!
//! Translates a resolved job plus the current candidate video bitrate
//! into the two ffmpeg invocations: pass 1 analyzes into a stats file
//! and discards its output, pass 2 reuses the stats to hit the
//! requested rate and writes the final container.

use std::path::Path;

use crate::error::{Result, ShrinkError};
use crate::job::{AudioPolicy, AudioRate, EncodeJob};
use crate::types::{Bitrate, FileSize};

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// One ffmpeg invocation, ready to hand to the process boundary.
#[derive(Debug, Clone)]
pub struct PassSpec {
    pub pass: u8,
    pub args: Vec<String>,
}

/// Everything derived for one search attempt. Regenerated with a fresh
/// bitrate on every iteration, never mutated.
#[derive(Debug, Clone)]
pub struct PassPlan {
    pub video_bitrate: Bitrate,
    pub pass1: PassSpec,
    pub pass2: PassSpec,
}

/// Split the total bit budget between audio and video: the target size
/// in kilobits spread over the clip length, minus the audio's share.
/// Infeasible when audio alone eats the whole budget.
pub fn initial_video_bitrate(
    target: FileSize,
    length_secs: u32,
    audio_kbps: u32,
) -> Result<Bitrate> {
    let total_kbps = target.kilobits() / length_secs as f64;
    let video_kbps = total_kbps - audio_kbps as f64;
    if video_kbps <= 0.0 {
        return Err(ShrinkError::InfeasibleTarget {
            target_mib: target.as_mib(),
            duration_secs: length_secs,
            total_kbps,
            audio_kbps,
        });
    }
    Ok(Bitrate::from_kbps(video_kbps as u32).floored())
}

/// Build both pass specs for the given candidate bitrate.
pub fn build_plan(job: &EncodeJob, video_bitrate: Bitrate, stats_prefix: &Path) -> PassPlan {
    let stats = stats_prefix.to_string_lossy().to_string();

    let mut pass1 = common_head(job);
    pass1.push("-an".to_string());
    push_filters(job, &mut pass1);
    pass1.extend(["-vsync".to_string(), "cfr".to_string()]);
    push_video_args(job, video_bitrate, &mut pass1);
    pass1.extend([
        "-pass".to_string(),
        "1".to_string(),
        "-passlogfile".to_string(),
        stats.clone(),
        "-f".to_string(),
        "null".to_string(),
        NULL_DEVICE.to_string(),
    ]);

    let mut pass2 = common_head(job);
    push_filters(job, &mut pass2);
    push_video_args(job, video_bitrate, &mut pass2);
    pass2.extend([
        "-pass".to_string(),
        "2".to_string(),
        "-passlogfile".to_string(),
        stats,
    ]);
    push_audio_args(job, &mut pass2);
    pass2.extend(job.codec.container_args());
    pass2.push(job.output.to_string_lossy().to_string());

    PassPlan {
        video_bitrate,
        pass1: PassSpec { pass: 1, args: pass1 },
        pass2: PassSpec { pass: 2, args: pass2 },
    }
}

fn common_head(job: &EncodeJob) -> Vec<String> {
    let loglevel = if job.verbose { "info" } else { "error" };
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        loglevel.to_string(),
        "-y".to_string(),
        "-ss".to_string(),
        job.trim.start_timestamp(),
        "-to".to_string(),
        job.trim.end_timestamp(),
        "-i".to_string(),
        job.input.to_string_lossy().to_string(),
    ]
}

/// Filter chain in fixed order: crop, then scale, then fps.
pub fn filter_chain(job: &EncodeJob) -> Option<String> {
    let mut filters = Vec::new();
    if let Some(crop) = &job.crop {
        filters.push(crop.filter());
    }
    if let Some(res) = &job.resolution {
        filters.push(res.filter());
    }
    if let Some(fps) = job.framerate {
        filters.push(format!("fps={fps}"));
    }
    if filters.is_empty() {
        None
    } else {
        Some(filters.join(","))
    }
}

fn push_filters(job: &EncodeJob, args: &mut Vec<String>) {
    if let Some(chain) = filter_chain(job) {
        args.extend(["-vf".to_string(), chain]);
    }
}

fn push_video_args(job: &EncodeJob, video_bitrate: Bitrate, args: &mut Vec<String>) {
    args.extend([
        "-c:v".to_string(),
        job.codec.encoder_name().to_string(),
        "-b:v".to_string(),
        video_bitrate.ffmpeg_arg(),
        "-minrate".to_string(),
        video_bitrate.minrate_arg(),
        "-maxrate".to_string(),
        video_bitrate.maxrate_arg(),
        "-bufsize".to_string(),
        video_bitrate.bufsize_arg(),
    ]);
    args.extend(job.codec.extra_args());
    // Caller tuning goes last so it wins over the baked-in defaults.
    for (key, value) in &job.tuning {
        args.push(format!("-{key}"));
        args.push(value.clone());
    }
}

fn push_audio_args(job: &EncodeJob, args: &mut Vec<String>) {
    match &job.audio_policy {
        AudioPolicy::NoAudio => {
            args.push("-an".to_string());
            return;
        }
        AudioPolicy::Stream(index) => {
            args.extend([
                "-map".to_string(),
                "0:v:0".to_string(),
                "-map".to_string(),
                format!("0:a:{index}?"),
            ]);
        }
        AudioPolicy::Mix { streams, normalize } => {
            let inputs: String = streams.iter().map(|i| format!("[0:a:{i}]")).collect();
            let tail = if *normalize { ",loudnorm" } else { "" };
            let graph = format!("{inputs}amix=inputs={}{tail}[aout]", streams.len());
            args.extend([
                "-filter_complex".to_string(),
                graph,
                "-map".to_string(),
                "0:v:0".to_string(),
                "-map".to_string(),
                "[aout]".to_string(),
            ]);
        }
    }

    match job.audio_rate {
        AudioRate::Encode(bitrate) => {
            args.extend([
                "-c:a".to_string(),
                job.codec.audio_codec().to_string(),
                "-b:a".to_string(),
                bitrate.ffmpeg_arg(),
            ]);
        }
        AudioRate::CopySource { .. } => {
            args.extend(["-c:a".to_string(), "copy".to_string()]);
        }
    }
}
