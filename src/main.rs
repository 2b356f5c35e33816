use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use clip_shrink::config::{Cli, Options};
use clip_shrink::error::ShrinkError;
use clip_shrink::probe::{is_ffprobe_available, FfprobeAdapter};
use clip_shrink::runner::{is_ffmpeg_available, FfmpegRunner};
use clip_shrink::search::SearchController;

fn main() -> anyhow::Result<()> {
    let _ = clip_shrink::logging::init_logging(
        "clip_shrink",
        clip_shrink::logging::LogConfig::default(),
    );

    let cli = Cli::parse();
    let opts = Options::resolve(cli)?;

    if !is_ffmpeg_available() {
        return Err(ShrinkError::ToolNotFound("ffmpeg".to_string()).into());
    }
    if !is_ffprobe_available() {
        return Err(ShrinkError::ToolNotFound("ffprobe".to_string()).into());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        ctrlc::set_handler(move || {
            eprintln!("\nStopping after the current pass...");
            cancel.store(true, Ordering::SeqCst);
        })?;
    }

    info!("🎬 Compressing {}", opts.filename.display());
    info!("   Target: {} MiB ({})", opts.target_filesize, opts.codec);
    match opts.audio_br {
        Some(kbps) => info!("   Audio: {} kbps", kbps),
        None => info!("   Audio: copy from source"),
    }
    if opts.approx {
        info!("   🎯 Approximate mode: single encode cycle");
    }
    info!("");

    let spinner = if opts.verbose {
        None
    } else {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Encoding...");
        Some(pb)
    };

    let probe = FfprobeAdapter;
    let runner = FfmpegRunner {
        verbose: opts.verbose,
    };
    let result = SearchController::new(&probe, &runner)
        .with_cancel(Arc::clone(&cancel))
        .run(&opts);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = result?;

    info!("");
    info!("✅ Done after {} attempt(s)", outcome.attempts);
    info!("   Output: {}", outcome.output.display());
    info!("   Size: {}", outcome.final_size);
    info!("   Video bitrate: {}", outcome.video_bitrate);
    if let Some(warning) = &outcome.warning {
        warn!("⚠️  {}", warning);
    }

    Ok(())
}
