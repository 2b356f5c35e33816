//! FFprobe adapter.
//!
//! Queries input metadata (duration, byte size, video geometry, audio
//! streams) via `ffprobe -print_format json`. Called exactly once per
//! job, before the trim window is validated.

use std::path::Path;
use std::process::Command;

use crate::error::{Result, ShrinkError};
use crate::types::FileSize;

#[derive(Debug, Clone)]
pub struct AudioStream {
    /// Position among the input's audio streams (0-based).
    pub index: u32,
    pub codec: String,
    /// Source bitrate in kbps, when the container reports one.
    pub bit_rate_kbps: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub duration: f64,
    pub size: FileSize,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub audio_streams: Vec<AudioStream>,
    pub stream_count: usize,
}

impl ProbeResult {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Seam for the metadata boundary; the search controller only sees this.
pub trait MediaProbe {
    fn probe(&self, path: &Path) -> Result<ProbeResult>;
}

pub struct FfprobeAdapter;

pub fn is_ffprobe_available() -> bool {
    which::which("ffprobe").is_ok()
}

impl MediaProbe for FfprobeAdapter {
    fn probe(&self, path: &Path) -> Result<ProbeResult> {
        if !path.is_file() {
            return Err(ShrinkError::Probe(format!(
                "input is not a readable file: {}",
                path.display()
            )));
        }

        let path_str = path.to_str().ok_or_else(|| {
            ShrinkError::Probe(format!("invalid path encoding: {}", path.display()))
        })?;

        let output = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "--",
                path_str,
            ])
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!(
                    "could not analyze {} (exit code {:?})",
                    path.display(),
                    output.status.code()
                )
            } else {
                format!("{}: {}", path.display(), stderr.trim())
            };
            return Err(ShrinkError::Probe(message));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ShrinkError::Probe(format!("unparsable ffprobe output: {e}")))?;

        parse_probe_json(&json)
    }
}

fn parse_probe_json(json: &serde_json::Value) -> Result<ProbeResult> {
    let format = &json["format"];
    let duration = format["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    if duration <= 0.0 {
        return Err(ShrinkError::Probe("input has no duration".to_string()));
    }
    let size = format["size"]
        .as_str()
        .and_then(|s| s.parse::<u64>().ok())
        .map(FileSize::new)
        .unwrap_or(FileSize::ZERO);

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| ShrinkError::Probe("no streams found".to_string()))?;
    if streams.is_empty() {
        return Err(ShrinkError::Probe("no decodable streams found".to_string()));
    }

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| ShrinkError::Probe("no video stream found".to_string()))?;

    let width = video_stream["width"].as_u64().unwrap_or(0) as u32;
    let height = video_stream["height"].as_u64().unwrap_or(0) as u32;
    let frame_rate = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("0/1"));

    let audio_streams: Vec<AudioStream> = streams
        .iter()
        .filter(|s| s["codec_type"].as_str() == Some("audio"))
        .enumerate()
        .map(|(i, s)| AudioStream {
            index: i as u32,
            codec: s["codec_name"].as_str().unwrap_or("unknown").to_string(),
            bit_rate_kbps: s["bit_rate"]
                .as_str()
                .and_then(|b| b.parse::<u64>().ok())
                .map(|bps| (bps / 1000) as u32),
        })
        .collect();

    Ok(ProbeResult {
        duration,
        size,
        width,
        height,
        frame_rate,
        audio_streams,
        stream_count: streams.len(),
    })
}

/// Parse ffprobe's `r_frame_rate` fraction (`30000/1001`) or a plain
/// number. Returns 0.0 when the rate is unknown.
pub fn parse_frame_rate(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let num = num.parse::<f64>().unwrap_or(0.0);
        let den = den.parse::<f64>().unwrap_or(0.0);
        if den > 0.0 && num > 0.0 {
            return num / den;
        }
        return 0.0;
    }
    match s.parse::<f64>() {
        Ok(v) if v > 0.0 => v,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        let cases: &[(&str, f64, f64)] = &[
            ("30/1", 30.0, 0.001),
            ("25/1", 25.0, 0.001),
            ("30000/1001", 30000.0 / 1001.0, 0.0001),
            ("24", 24.0, 0.001),
            ("59.94", 59.94, 0.01),
        ];
        for (input, expected, tolerance) in cases {
            let result = parse_frame_rate(input);
            assert!(
                (result - expected).abs() < *tolerance,
                "parse_frame_rate({input:?}): expected {expected}, got {result}"
            );
        }
    }

    #[test]
    fn test_parse_frame_rate_unknown() {
        assert_eq!(parse_frame_rate("0/1"), 0.0);
        assert_eq!(parse_frame_rate("30/0"), 0.0);
        assert_eq!(parse_frame_rate("invalid"), 0.0);
        assert_eq!(parse_frame_rate(""), 0.0);
    }

    fn fake_json() -> serde_json::Value {
        serde_json::json!({
            "format": {"duration": "120.0", "size": "53000000"},
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080, "r_frame_rate": "30/1"},
                {"codec_type": "audio", "codec_name": "aac", "bit_rate": "128000"}
            ]
        })
    }

    #[test]
    fn test_parse_probe_json() {
        let result = parse_probe_json(&fake_json()).unwrap();
        assert_eq!(result.duration, 120.0);
        assert_eq!(result.size.bytes(), 53_000_000);
        assert_eq!(result.width, 1920);
        assert_eq!(result.height, 1080);
        assert_eq!(result.frame_rate, 30.0);
        assert_eq!(result.stream_count, 2);
        assert_eq!(result.audio_streams.len(), 1);
        assert_eq!(result.audio_streams[0].bit_rate_kbps, Some(128));
        assert!((result.aspect_ratio() - 1920.0 / 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_json_no_video() {
        let mut json = fake_json();
        json["streams"] = serde_json::json!([
            {"codec_type": "audio", "codec_name": "aac", "bit_rate": "128000"}
        ]);
        assert!(matches!(
            parse_probe_json(&json),
            Err(ShrinkError::Probe(_))
        ));
    }

    #[test]
    fn test_parse_probe_json_no_duration() {
        let mut json = fake_json();
        json["format"] = serde_json::json!({});
        assert!(matches!(
            parse_probe_json(&json),
            Err(ShrinkError::Probe(_))
        ));
    }
}
