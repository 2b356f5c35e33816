//! EncodeJob - the fully-resolved, immutable description of one
//! compression job.
//!
//! Built in two steps: `validate_options` checks everything that does
//! not need the input file (bad crop strings, unknown tuning keys,
//! contradictory flags), then `EncodeJob::resolve` folds in the probe
//! result (trim window against duration, audio stream selection,
//! output path).

use std::path::PathBuf;

use tracing::warn;

use crate::codec::CodecProfile;
use crate::config::Options;
use crate::error::{Result, ShrinkError};
use crate::output;
use crate::probe::ProbeResult;
use crate::timestamp::{self, timestamp_from_seconds};
use crate::types::{Bitrate, FileSize};

/// Assumed audio bitrate for budget math when the source does not
/// report one.
const FALLBACK_AUDIO_KBPS: u32 = 96;

/// Crop rectangle, parsed from a strict `WxHxXxY` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl CropRect {
    pub fn parse(s: &str) -> Result<Self> {
        let fields = parse_numeric_fields(s, 4)
            .ok_or_else(|| ShrinkError::Config(format!("invalid crop '{s}', expected WxHxXxY")))?;
        if fields[0] == 0 || fields[1] == 0 {
            return Err(ShrinkError::Config(format!(
                "invalid crop '{s}': width and height must be positive"
            )));
        }
        Ok(CropRect {
            width: fields[0],
            height: fields[1],
            x: fields[2],
            y: fields[3],
        })
    }

    pub fn filter(&self) -> String {
        format!("crop={}:{}:{}:{}", self.width, self.height, self.x, self.y)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// Output resolution, parsed from a strict `WxH` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn parse(s: &str) -> Result<Self> {
        let fields = parse_numeric_fields(s, 2)
            .ok_or_else(|| ShrinkError::Config(format!("invalid resolution '{s}', expected WxH")))?;
        if fields[0] == 0 || fields[1] == 0 {
            return Err(ShrinkError::Config(format!(
                "invalid resolution '{s}': dimensions must be positive"
            )));
        }
        Ok(Resolution {
            width: fields[0],
            height: fields[1],
        })
    }

    pub fn filter(&self) -> String {
        format!("scale={}:{}", self.width, self.height)
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

fn parse_numeric_fields(s: &str, count: usize) -> Option<Vec<u32>> {
    let parts: Vec<&str> = s.split('x').collect();
    if parts.len() != count {
        return None;
    }
    parts.iter().map(|p| p.parse::<u32>().ok()).collect()
}

/// Resolved trim window in whole seconds from the start of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    pub start: u32,
    pub end: u32,
}

impl TrimWindow {
    pub fn length(&self) -> u32 {
        self.end - self.start
    }

    pub fn start_timestamp(&self) -> String {
        timestamp_from_seconds(self.start)
    }

    pub fn end_timestamp(&self) -> String {
        timestamp_from_seconds(self.end)
    }
}

/// Which audio streams end up in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPolicy {
    NoAudio,
    /// A single audio stream (0-based index among audio streams).
    Stream(u32),
    /// Mix the given streams with `amix`, optionally loudness-normalized.
    Mix { streams: Vec<u32>, normalize: bool },
}

/// How the output audio is produced, and what it costs the bit budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRate {
    Encode(Bitrate),
    /// Stream-copy the source audio; `assumed` is what the budget math
    /// charges for it.
    CopySource { assumed: Bitrate },
}

impl AudioRate {
    pub fn budget_kbps(&self) -> u32 {
        match self {
            AudioRate::Encode(br) => br.kbps(),
            AudioRate::CopySource { assumed } => assumed.kbps(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_size: FileSize,
    pub codec: CodecProfile,
    pub audio_policy: AudioPolicy,
    pub audio_rate: AudioRate,
    pub crop: Option<CropRect>,
    pub resolution: Option<Resolution>,
    /// Framerate cap, already validated against the source rate.
    pub framerate: Option<f64>,
    pub trim: TrimWindow,
    pub duration: u32,
    pub approx: bool,
    pub verbose: bool,
    pub overwrite: bool,
    pub tuning: Vec<(String, String)>,
}

impl EncodeJob {
    /// Audio cost charged against the total bit budget, in kbps.
    pub fn audio_budget_kbps(&self) -> u32 {
        match self.audio_policy {
            AudioPolicy::NoAudio => 0,
            _ => self.audio_rate.budget_kbps(),
        }
    }
}

/// Static validation that needs no probe: surfaced before anything runs.
pub fn validate_options(opts: &Options) -> Result<()> {
    if opts.target_filesize <= 0.0 {
        return Err(ShrinkError::Config(format!(
            "target filesize must be positive, got {}",
            opts.target_filesize
        )));
    }
    if let Some(kbps) = opts.audio_br {
        if kbps == 0 {
            return Err(ShrinkError::Config(
                "audio bitrate must be positive".to_string(),
            ));
        }
    }
    if let Some(fps) = opts.framerate {
        if fps <= 0.0 {
            return Err(ShrinkError::Config(format!(
                "framerate must be positive, got {fps}"
            )));
        }
    }
    if !opts.crop.is_empty() {
        CropRect::parse(&opts.crop)?;
    }
    if !opts.resolution.is_empty() {
        Resolution::parse(&opts.resolution)?;
    }
    for (key, _) in &opts.codec_opts {
        if !opts.codec.allowed_tuning_keys().contains(&key.as_str()) {
            return Err(ShrinkError::Config(format!(
                "tuning key '{}' is not supported for {} (allowed: {})",
                key,
                opts.codec,
                opts.codec.allowed_tuning_keys().join(", ")
            )));
        }
    }
    if opts.no_audio && (opts.amix || !opts.astreams.is_empty()) {
        return Err(ShrinkError::Config(
            "--no-audio cannot be combined with --amix or --astreams".to_string(),
        ));
    }
    if opts.astreams.len() > 1 && !opts.amix {
        return Err(ShrinkError::Config(
            "multiple audio streams require --amix to mix them into one".to_string(),
        ));
    }
    if let (Some(from), Some(to)) = (&opts.from, &opts.to) {
        let from = timestamp::parse_time_value(from)?;
        let to = timestamp::parse_time_value(to)?;
        if from >= to {
            return Err(ShrinkError::Config(format!(
                "start time {} is not before end time {}",
                timestamp_from_seconds(from),
                timestamp_from_seconds(to)
            )));
        }
    }
    Ok(())
}

impl EncodeJob {
    /// Fold the probe result into a fully-resolved job. Assumes
    /// `validate_options` has already passed.
    pub fn resolve(opts: &Options, probe: &ProbeResult) -> Result<EncodeJob> {
        let duration = probe.duration.floor() as u32;
        let (trim, filename_derived) = resolve_trim(opts, duration)?;

        let target_size = FileSize::from_mib(opts.target_filesize);
        if !probe.size.is_zero() && target_size.bytes() >= probe.size.bytes() {
            return Err(ShrinkError::Config(format!(
                "target size {} is not below the input size {}",
                target_size, probe.size
            )));
        }

        if probe.stream_count > 2 {
            warn!(
                "⚠️ Input has more than two streams ({}); only the mapped video/audio streams are kept",
                probe.stream_count
            );
        }

        let (audio_policy, audio_rate) = resolve_audio(opts, probe)?;
        let framerate = resolve_framerate(opts.framerate, probe.frame_rate);

        let crop = if opts.crop.is_empty() {
            None
        } else {
            Some(CropRect::parse(&opts.crop)?)
        };
        let resolution = if opts.resolution.is_empty() {
            None
        } else {
            Some(Resolution::parse(&opts.resolution)?)
        };

        if let Some(res) = &resolution {
            let base_ratio = crop
                .as_ref()
                .map(CropRect::aspect_ratio)
                .unwrap_or_else(|| probe.aspect_ratio());
            if base_ratio > 0.0 && (base_ratio - res.aspect_ratio()).abs() > 0.01 {
                warn!(
                    "⚠️ Output aspect ratio {:.3} does not match the source's {:.3}; the video will be stretched",
                    res.aspect_ratio(),
                    base_ratio
                );
            }
        }

        let output = output::resolve_output(
            &opts.output,
            &opts.filename,
            opts.codec,
            &trim,
            filename_derived,
        )?;
        output::ensure_writable(&output, opts.overwrite)?;

        Ok(EncodeJob {
            input: opts.filename.clone(),
            output,
            target_size,
            codec: opts.codec,
            audio_policy,
            audio_rate,
            crop,
            resolution,
            framerate,
            trim,
            duration,
            approx: opts.approx,
            verbose: opts.verbose,
            overwrite: opts.overwrite,
            tuning: opts.codec_opts.clone(),
        })
    }
}

fn resolve_trim(opts: &Options, duration: u32) -> Result<(TrimWindow, bool)> {
    let mut start: Option<u32> = None;
    let mut end: Option<u32> = None;
    let mut filename_derived = false;

    if let Some(from) = &opts.from {
        start = Some(timestamp::parse_time_value(from)?);
    }
    if let Some(to) = &opts.to {
        end = Some(timestamp::parse_time_value(to)?);
    }

    if start.is_none() && end.is_none() && opts.filename_times {
        let stem = opts
            .filename
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        match timestamp::times_from_stem(&stem) {
            Some((s, e)) => {
                start = Some(s);
                end = e;
                filename_derived = true;
            }
            None => {
                warn!(
                    "⚠️ '{}' has an invalid time format in its name; encoding the whole file",
                    stem
                );
            }
        }
    }

    let start = start.unwrap_or(0);
    let end = end.unwrap_or(duration);

    if end > duration {
        return Err(ShrinkError::Config(format!(
            "end time {} is past the end of the video ({})",
            timestamp_from_seconds(end),
            timestamp_from_seconds(duration)
        )));
    }
    if start >= end {
        return Err(ShrinkError::Config(format!(
            "the video is {} long, but clipping was requested at {}..{}",
            timestamp_from_seconds(duration),
            timestamp_from_seconds(start),
            timestamp_from_seconds(end)
        )));
    }

    Ok((TrimWindow { start, end }, filename_derived))
}

fn resolve_audio(opts: &Options, probe: &ProbeResult) -> Result<(AudioPolicy, AudioRate)> {
    if opts.no_audio {
        return Ok((
            AudioPolicy::NoAudio,
            AudioRate::Encode(Bitrate::from_kbps(0)),
        ));
    }

    if probe.audio_streams.is_empty() {
        warn!("⚠️ No audio stream found in the input; the output will be silent");
        return Ok((
            AudioPolicy::NoAudio,
            AudioRate::Encode(Bitrate::from_kbps(0)),
        ));
    }

    for &index in &opts.astreams {
        if index as usize >= probe.audio_streams.len() {
            return Err(ShrinkError::Config(format!(
                "audio stream {} does not exist (input has {})",
                index,
                probe.audio_streams.len()
            )));
        }
    }

    let mut rate = match opts.audio_br {
        Some(kbps) => AudioRate::Encode(Bitrate::from_kbps(kbps)),
        None => {
            let assumed = probe.audio_streams[0].bit_rate_kbps.unwrap_or_else(|| {
                warn!(
                    "⚠️ Source does not report an audio bitrate; budgeting {} kbps",
                    FALLBACK_AUDIO_KBPS
                );
                FALLBACK_AUDIO_KBPS
            });
            AudioRate::CopySource {
                assumed: Bitrate::from_kbps(assumed),
            }
        }
    };

    let policy = if opts.amix {
        let streams = if opts.astreams.is_empty() {
            (0..probe.audio_streams.len() as u32).collect()
        } else {
            opts.astreams.clone()
        };
        if let AudioRate::CopySource { assumed } = rate {
            warn!("⚠️ Mixed audio cannot be stream-copied; re-encoding at {assumed}");
            rate = AudioRate::Encode(assumed);
        }
        AudioPolicy::Mix {
            streams,
            normalize: opts.amix_normalize,
        }
    } else {
        AudioPolicy::Stream(opts.astreams.first().copied().unwrap_or(0))
    };

    Ok((policy, rate))
}

fn resolve_framerate(requested: Option<f64>, probed: f64) -> Option<f64> {
    let fps = requested?;
    if probed > 0.0 && fps >= probed {
        warn!(
            "⚠️ Desired framerate {fps} is not below the source's {probed}; leaving the framerate alone"
        );
        return None;
    }
    Some(fps)
}
