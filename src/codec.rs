//! Codec profiles - selectable encoder bundles.
//!
//! A profile ties together the ffmpeg encoder name, the audio codec it
//! pairs with, the mandated container extension, baked-in encoder
//! arguments, and the allow-list of tuning keys the caller may override.

use std::fmt;

use crate::error::{Result, ShrinkError};

/// Ordered roughly by playback compatibility: H.264 plays everywhere,
/// AV1 only on recent hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecProfile {
    Libx264,
    H264Nvenc,
    Libx265,
    HevcNvenc,
    LibvpxVp9,
    LibaomAv1,
}

impl Default for CodecProfile {
    fn default() -> Self {
        CodecProfile::Libx264
    }
}

impl CodecProfile {
    pub const ALL: [CodecProfile; 6] = [
        CodecProfile::Libx264,
        CodecProfile::H264Nvenc,
        CodecProfile::Libx265,
        CodecProfile::HevcNvenc,
        CodecProfile::LibvpxVp9,
        CodecProfile::LibaomAv1,
    ];

    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "libx264" => Ok(CodecProfile::Libx264),
            "h264_nvenc" => Ok(CodecProfile::H264Nvenc),
            "libx265" => Ok(CodecProfile::Libx265),
            "hevc_nvenc" => Ok(CodecProfile::HevcNvenc),
            "libvpx-vp9" => Ok(CodecProfile::LibvpxVp9),
            "libaom-av1" => Ok(CodecProfile::LibaomAv1),
            other => Err(ShrinkError::Config(format!(
                "unknown codec '{}', expected one of: {}",
                other,
                CodecProfile::ALL.map(|c| c.as_str()).join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CodecProfile::Libx264 => "libx264",
            CodecProfile::H264Nvenc => "h264_nvenc",
            CodecProfile::Libx265 => "libx265",
            CodecProfile::HevcNvenc => "hevc_nvenc",
            CodecProfile::LibvpxVp9 => "libvpx-vp9",
            CodecProfile::LibaomAv1 => "libaom-av1",
        }
    }

    /// The ffmpeg video encoder name (`-c:v`).
    pub fn encoder_name(&self) -> &'static str {
        self.as_str()
    }

    /// The audio codec this profile pairs with (`-c:a`).
    pub fn audio_codec(&self) -> &'static str {
        match self {
            CodecProfile::Libx264
            | CodecProfile::H264Nvenc
            | CodecProfile::Libx265
            | CodecProfile::HevcNvenc => "aac",
            CodecProfile::LibvpxVp9 | CodecProfile::LibaomAv1 => "libopus",
        }
    }

    /// Mandated container extension for the final artifact.
    pub fn container(&self) -> &'static str {
        match self {
            CodecProfile::Libx264
            | CodecProfile::H264Nvenc
            | CodecProfile::Libx265
            | CodecProfile::HevcNvenc => "mp4",
            CodecProfile::LibvpxVp9 | CodecProfile::LibaomAv1 => "webm",
        }
    }

    /// Baked-in encoder arguments applied to both passes.
    pub fn extra_args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            CodecProfile::Libx264 => &["-preset", "slow", "-profile:v", "high"],
            CodecProfile::H264Nvenc => {
                &["-preset", "p7", "-tune", "hq", "-rc", "vbr", "-profile:v", "high"]
            }
            CodecProfile::Libx265 => &["-preset", "slow", "-tag:v", "hvc1"],
            CodecProfile::HevcNvenc => &["-preset", "p7", "-tune", "hq", "-rc", "vbr", "-tag:v", "hvc1"],
            CodecProfile::LibvpxVp9 => &["-row-mt", "1", "-deadline", "good"],
            CodecProfile::LibaomAv1 => &["-cpu-used", "6", "-row-mt", "1"],
        };
        args.iter().map(|s| s.to_string()).collect()
    }

    /// Tuning keys the caller is allowed to override for this codec.
    pub fn allowed_tuning_keys(&self) -> &'static [&'static str] {
        match self {
            CodecProfile::Libx264 | CodecProfile::Libx265 => &["preset", "tune"],
            CodecProfile::H264Nvenc | CodecProfile::HevcNvenc => &["preset", "tune", "rc", "cq"],
            CodecProfile::LibvpxVp9 => &["row-mt", "cpu-used", "deadline", "tile-columns", "speed"],
            CodecProfile::LibaomAv1 => &["cpu-used", "row-mt", "tiles", "usage"],
        }
    }

    /// Container flags appended to pass 2 only.
    pub fn container_args(&self) -> Vec<String> {
        match self.container() {
            "mp4" => vec!["-movflags".to_string(), "+faststart".to_string()],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
