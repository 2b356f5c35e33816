//! Configuration: CLI flags layered over a JSON config file over
//! defaults, merged once into an immutable `Options` value before
//! anything runs.
//!
//! A flag that was left at its default yields to the config file; an
//! explicitly set flag always wins.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Deserializer};

use crate::codec::CodecProfile;
use crate::error::{Result, ShrinkError};

pub const DEFAULT_TARGET_MIB: f64 = 10.0;
pub const DEFAULT_AUDIO_KBPS: u32 = 96;
pub const DEFAULT_CODEC: &str = "libx264";

#[derive(Parser, Debug)]
#[command(name = "clip-shrink", version, about = "Compress a video clip under a target file size")]
pub struct Cli {
    /// The video file to compress.
    pub filename: PathBuf,

    /// Output directory or file path. Defaults to next to the input.
    #[arg(short, long, default_value = "")]
    pub output: String,

    /// Target file size in MiB.
    #[arg(short = 's', long, default_value_t = DEFAULT_TARGET_MIB)]
    pub target_filesize: f64,

    /// Audio bitrate in kbps.
    #[arg(short = 'a', long)]
    pub audio_br: Option<u32>,

    /// Stream-copy the source audio instead of re-encoding it.
    #[arg(long)]
    pub audio_copy: bool,

    /// Video codec profile.
    #[arg(short = 'c', long, default_value = DEFAULT_CODEC)]
    pub codec: String,

    /// Codec tuning options as a JSON object, e.g. '{"row-mt":1}'.
    #[arg(long)]
    pub codec_opts: Option<String>,

    /// Trim start, as HH:MM:SS or seconds.
    #[arg(long)]
    pub from: Option<String>,

    /// Trim end, as HH:MM:SS or seconds.
    #[arg(long)]
    pub to: Option<String>,

    /// Read the trim window from the file name (HHMMSS-HHMMSS).
    #[arg(long)]
    pub filename_times: bool,

    /// Accept the first encode even if it misses the target.
    #[arg(long)]
    pub approx: bool,

    /// Crop rectangle, WxHxXxY. Example: 1410x1080x255x0
    #[arg(short = 'x', long, default_value = "")]
    pub crop: String,

    /// Output resolution, WxH. Example: 1280x720
    #[arg(short = 'r', long, default_value = "")]
    pub resolution: String,

    /// Cap the output framerate.
    #[arg(short = 'f', long)]
    pub framerate: Option<f64>,

    /// Drop all audio.
    #[arg(long)]
    pub no_audio: bool,

    /// Mix the selected audio streams into one.
    #[arg(long)]
    pub amix: bool,

    /// Loudness-normalize the mixed audio.
    #[arg(long)]
    pub amix_normalize: bool,

    /// Comma-separated audio stream indices to keep.
    #[arg(long)]
    pub astreams: Option<String>,

    /// Show full encoder output in errors and logs.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Replace the output file if it already exists.
    #[arg(long)]
    pub overwrite: bool,

    /// JSON config file; explicit flags override its values.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// JSON config file contents. `audio_br: null` means "copy the source
/// audio", which is why the field is doubly optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub output: Option<String>,
    pub target_filesize: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub audio_br: Option<Option<u32>>,
    pub codec: Option<String>,
    pub codec_opts: Option<serde_json::Map<String, serde_json::Value>>,
    pub approx: Option<bool>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub filename_times: Option<bool>,
    pub crop: Option<String>,
    pub resolution: Option<String>,
    pub framerate: Option<f64>,
    pub no_audio: Option<bool>,
    pub amix: Option<bool>,
    pub amix_normalize: Option<bool>,
    pub astreams: Option<String>,
    pub verbose: Option<bool>,
    pub overwrite: Option<bool>,
}

/// Distinguishes an absent key (outer None) from an explicit null
/// (Some(None)).
fn nullable<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u32>::deserialize(deserializer).map(Some)
}

pub fn load_config(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|e| {
        ShrinkError::Config(format!("invalid config file {}: {e}", path.display()))
    })
}

/// The flat, merged configuration the rest of the tool consumes.
#[derive(Debug, Clone)]
pub struct Options {
    pub filename: PathBuf,
    pub output: String,
    /// Target size in MiB.
    pub target_filesize: f64,
    /// Audio bitrate in kbps; None copies the source audio.
    pub audio_br: Option<u32>,
    pub codec: CodecProfile,
    pub codec_opts: Vec<(String, String)>,
    pub approx: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub filename_times: bool,
    pub crop: String,
    pub resolution: String,
    pub framerate: Option<f64>,
    pub no_audio: bool,
    pub amix: bool,
    pub amix_normalize: bool,
    pub astreams: Vec<u32>,
    pub verbose: bool,
    pub overwrite: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filename: PathBuf::new(),
            output: String::new(),
            target_filesize: DEFAULT_TARGET_MIB,
            audio_br: Some(DEFAULT_AUDIO_KBPS),
            codec: CodecProfile::default(),
            codec_opts: Vec::new(),
            approx: false,
            from: None,
            to: None,
            filename_times: false,
            crop: String::new(),
            resolution: String::new(),
            framerate: None,
            no_audio: false,
            amix: false,
            amix_normalize: false,
            astreams: Vec::new(),
            verbose: false,
            overwrite: false,
        }
    }
}

impl Options {
    /// Merge CLI flags over the (optional) config file over defaults.
    pub fn resolve(cli: Cli) -> Result<Options> {
        let file = match &cli.config {
            Some(path) => load_config(path)?,
            None => FileConfig::default(),
        };

        let target_filesize = if cli.target_filesize != DEFAULT_TARGET_MIB {
            cli.target_filesize
        } else {
            file.target_filesize.unwrap_or(DEFAULT_TARGET_MIB)
        };

        let output = if cli.output.is_empty() {
            file.output.unwrap_or_default()
        } else {
            cli.output
        };

        let audio_br = if cli.audio_copy {
            None
        } else if let Some(kbps) = cli.audio_br {
            Some(kbps)
        } else if let Some(from_file) = file.audio_br {
            from_file
        } else {
            Some(DEFAULT_AUDIO_KBPS)
        };

        let codec_name = if cli.codec != DEFAULT_CODEC {
            cli.codec
        } else {
            file.codec.unwrap_or_else(|| DEFAULT_CODEC.to_string())
        };
        let codec = CodecProfile::parse(&codec_name)?;

        let codec_opts = match cli.codec_opts {
            Some(json) => parse_codec_opts_json(&json)?,
            None => file
                .codec_opts
                .map(|map| stringify_opts(&map))
                .unwrap_or_default(),
        };

        let crop = if cli.crop.is_empty() {
            file.crop.unwrap_or_default()
        } else {
            cli.crop
        };
        let resolution = if cli.resolution.is_empty() {
            file.resolution.unwrap_or_default()
        } else {
            cli.resolution
        };

        let astreams = match cli.astreams.or(file.astreams) {
            Some(list) => parse_astreams(&list)?,
            None => Vec::new(),
        };

        Ok(Options {
            filename: cli.filename,
            output,
            target_filesize,
            audio_br,
            codec,
            codec_opts,
            approx: cli.approx || file.approx.unwrap_or(false),
            from: cli.from.or(file.from),
            to: cli.to.or(file.to),
            filename_times: cli.filename_times || file.filename_times.unwrap_or(false),
            crop,
            resolution,
            framerate: cli.framerate.or(file.framerate),
            no_audio: cli.no_audio || file.no_audio.unwrap_or(false),
            amix: cli.amix || file.amix.unwrap_or(false),
            amix_normalize: cli.amix_normalize || file.amix_normalize.unwrap_or(false),
            astreams,
            verbose: cli.verbose || file.verbose.unwrap_or(false),
            overwrite: cli.overwrite || file.overwrite.unwrap_or(false),
        })
    }
}

fn parse_codec_opts_json(json: &str) -> Result<Vec<(String, String)>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| ShrinkError::Config(format!("invalid codec options '{json}': {e}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(stringify_opts(&map)),
        _ => Err(ShrinkError::Config(format!(
            "codec options must be a JSON object, got '{json}'"
        ))),
    }
}

fn stringify_opts(map: &serde_json::Map<String, serde_json::Value>) -> Vec<(String, String)> {
    map.iter()
        .map(|(key, value)| {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}

fn parse_astreams(list: &str) -> Result<Vec<u32>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>().map_err(|_| {
                ShrinkError::Config(format!("invalid audio stream index '{s}' in '{list}'"))
            })
        })
        .collect()
}
