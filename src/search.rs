//! Bitrate search controller.
//!
//! Drives probe → pass 1 → pass 2 → measure, then decides whether to
//! accept the artifact, re-loop with a ratio-corrected bitrate, or stop.
//! Encoder output size is not a deterministic function of the requested
//! bitrate, so the search is bounded and must tolerate overshoot: a run
//! that never reaches the target keeps its last artifact and reports a
//! warning instead of failing outright.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::command::{build_plan, initial_video_bitrate, PassSpec};
use crate::config::Options;
use crate::error::{Result, ShrinkError};
use crate::job::{self, EncodeJob};
use crate::probe::MediaProbe;
use crate::runner::PassRunner;
use crate::types::{Bitrate, FileSize};

/// Bounded retry budget for the whole search.
pub const MAX_ATTEMPTS: u32 = 5;

/// Accept an artifact up to this fraction over the target.
pub const SIZE_TOLERANCE: f64 = 0.01;

/// When ratio correction fails to shrink the candidate (numerical
/// noise), clamp to this fraction of the previous one so the sequence
/// stays strictly decreasing.
pub const ADJUST_CLAMP: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GiveUpReason {
    AttemptsExhausted,
    NoImprovement,
}

/// Attached to an outcome whose artifact is still above target.
#[derive(Debug, Clone)]
pub struct ConvergenceWarning {
    pub reason: GiveUpReason,
    pub attempts: u32,
    pub final_size: FileSize,
    pub target: FileSize,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self.reason {
            GiveUpReason::AttemptsExhausted => "attempt budget exhausted",
            GiveUpReason::NoImprovement => "output size stopped improving",
        };
        write!(
            f,
            "did not reach the target after {} attempts ({}): final size {} vs target {}",
            self.attempts, reason, self.final_size, self.target
        )
    }
}

/// What the caller gets back: where the artifact landed and how the
/// search went.
#[derive(Debug, Clone)]
pub struct ShrinkOutcome {
    pub output: PathBuf,
    pub final_size: FileSize,
    pub attempts: u32,
    pub video_bitrate: Bitrate,
    pub warning: Option<ConvergenceWarning>,
}

/// Decision taken after measuring one attempt's artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Accept,
    Adjust(Bitrate),
    GiveUp(GiveUpReason),
}

/// The measure/adjust decision, kept pure so termination and tie-break
/// behavior can be tested without spawning anything.
pub(crate) fn assess(
    measured: FileSize,
    target: FileSize,
    current: Bitrate,
    previous_measured: Option<FileSize>,
    attempts_used: u32,
) -> Verdict {
    let limit = (target.bytes() as f64 * (1.0 + SIZE_TOLERANCE)) as u64;
    if measured.bytes() <= limit {
        return Verdict::Accept;
    }
    if let Some(previous) = previous_measured {
        if measured.bytes() >= previous.bytes() {
            return Verdict::GiveUp(GiveUpReason::NoImprovement);
        }
    }
    if attempts_used >= MAX_ATTEMPTS {
        return Verdict::GiveUp(GiveUpReason::AttemptsExhausted);
    }

    let ratio = target
        .ratio_to(measured)
        .unwrap_or(ADJUST_CLAMP)
        .min(ADJUST_CLAMP);
    let next = current.scaled(ratio).floored();
    if next >= current {
        // Already at the bitrate floor; going lower is impossible.
        return Verdict::GiveUp(GiveUpReason::NoImprovement);
    }
    Verdict::Adjust(next)
}

pub struct SearchController<'a> {
    probe: &'a dyn MediaProbe,
    runner: &'a dyn PassRunner,
    cancel: Option<Arc<AtomicBool>>,
    stats_prefix: Option<PathBuf>,
}

impl<'a> SearchController<'a> {
    pub fn new(probe: &'a dyn MediaProbe, runner: &'a dyn PassRunner) -> Self {
        Self {
            probe,
            runner,
            cancel: None,
            stats_prefix: None,
        }
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Override where the encoder's pass-1 statistics land (the default
    /// is a per-process path in the system temp directory).
    pub fn with_stats_prefix(mut self, prefix: PathBuf) -> Self {
        self.stats_prefix = Some(prefix);
        self
    }

    /// Run one job start to finish. The stats file is removed on every
    /// exit path; fatal errors also remove the partial output artifact.
    pub fn run(&self, opts: &Options) -> Result<ShrinkOutcome> {
        job::validate_options(opts)?;
        let probe = self.probe.probe(&opts.filename)?;
        let encode_job = EncodeJob::resolve(opts, &probe)?;

        let stats_prefix = self
            .stats_prefix
            .clone()
            .unwrap_or_else(default_stats_prefix);

        let result = self.search(&encode_job, &stats_prefix);
        cleanup_stats(&stats_prefix);
        if result.is_err() {
            let _ = fs::remove_file(&encode_job.output);
        }
        result
    }

    fn search(&self, encode_job: &EncodeJob, stats_prefix: &Path) -> Result<ShrinkOutcome> {
        let mut bitrate = initial_video_bitrate(
            encode_job.target_size,
            encode_job.trim.length(),
            encode_job.audio_budget_kbps(),
        )?;
        let mut previous_measured: Option<FileSize> = None;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            info!(
                "🔁 Attempt {}/{}: encoding at {}",
                attempts, MAX_ATTEMPTS, bitrate
            );
            let plan = build_plan(encode_job, bitrate, stats_prefix);

            self.check_cancel()?;
            self.run_pass_with_retry(&plan.pass1)?;
            self.check_cancel()?;
            self.run_pass_with_retry(&plan.pass2)?;

            let measured = measure_artifact(&encode_job.output)?;
            info!(
                "📏 Output is {} against a target of {}",
                measured, encode_job.target_size
            );

            if encode_job.approx {
                info!("✅ Approximate mode: accepting after one full cycle");
                return Ok(ShrinkOutcome {
                    output: encode_job.output.clone(),
                    final_size: measured,
                    attempts,
                    video_bitrate: bitrate,
                    warning: None,
                });
            }

            match assess(
                measured,
                encode_job.target_size,
                bitrate,
                previous_measured,
                attempts,
            ) {
                Verdict::Accept => {
                    info!("✅ Target met after {} attempt(s)", attempts);
                    return Ok(ShrinkOutcome {
                        output: encode_job.output.clone(),
                        final_size: measured,
                        attempts,
                        video_bitrate: bitrate,
                        warning: None,
                    });
                }
                Verdict::Adjust(next) => {
                    info!(
                        "📉 Still {} over target; restarting at {}",
                        measured.saturating_sub(encode_job.target_size),
                        next
                    );
                    fs::remove_file(&encode_job.output)?;
                    previous_measured = Some(measured);
                    bitrate = next;
                }
                Verdict::GiveUp(reason) => {
                    let warning = ConvergenceWarning {
                        reason,
                        attempts,
                        final_size: measured,
                        target: encode_job.target_size,
                    };
                    warn!("⚠️ {}; keeping the last artifact", warning);
                    return Ok(ShrinkOutcome {
                        output: encode_job.output.clone(),
                        final_size: measured,
                        attempts,
                        video_bitrate: bitrate,
                        warning: Some(warning),
                    });
                }
            }
        }
    }

    /// One transient retry per pass rules out filesystem races before
    /// the failure is surfaced as fatal.
    fn run_pass_with_retry(&self, spec: &PassSpec) -> Result<()> {
        match self.runner.run(spec) {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!("⚠️ Pass {} failed ({}); retrying once", spec.pass, first);
                self.runner.run(spec)
            }
        }
    }

    fn check_cancel(&self) -> Result<()> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(ShrinkError::Cancelled);
            }
        }
        Ok(())
    }
}

fn measure_artifact(path: &Path) -> Result<FileSize> {
    match fs::metadata(path) {
        Ok(meta) => Ok(FileSize::new(meta.len())),
        Err(_) => Err(ShrinkError::Encode {
            pass: 2,
            exit_code: None,
            message: format!("expected output artifact is missing: {}", path.display()),
        }),
    }
}

fn default_stats_prefix() -> PathBuf {
    std::env::temp_dir().join(format!("clip_shrink_{}", std::process::id()))
}

/// The analysis pass leaves `<prefix>-0.log` (and x264's mbtree
/// sidecar) behind; both go away on every terminal state.
fn cleanup_stats(prefix: &Path) {
    let prefix = prefix.to_string_lossy();
    for suffix in ["-0.log", "-0.log.mbtree"] {
        let _ = fs::remove_file(format!("{prefix}{suffix}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn mib(n: f64) -> FileSize {
        FileSize::from_mib(n)
    }

    #[test]
    fn test_assess_accepts_within_tolerance() {
        let target = mib(10.0);
        let current = Bitrate::from_kbps(1269);
        assert_eq!(
            assess(mib(9.5), target, current, None, 1),
            Verdict::Accept
        );
        assert_eq!(
            assess(target, target, current, None, 1),
            Verdict::Accept
        );
        // 1% over still passes, 2% does not.
        assert_eq!(
            assess(mib(10.05), target, current, None, 1),
            Verdict::Accept
        );
        assert_ne!(
            assess(mib(10.2), target, current, None, 1),
            Verdict::Accept
        );
    }

    #[test]
    fn test_assess_ratio_correction() {
        let target = mib(10.0);
        let current = Bitrate::from_kbps(1000);
        // 25% over target: corrected by the size ratio, not a fixed step.
        match assess(mib(12.5), target, current, None, 1) {
            Verdict::Adjust(next) => assert_eq!(next.kbps(), 800),
            other => panic!("expected Adjust, got {other:?}"),
        }
    }

    #[test]
    fn test_assess_clamps_tiny_overshoot() {
        let target = mib(10.0);
        let current = Bitrate::from_kbps(1000);
        // Barely over target: the raw ratio (~0.988) would shave only a
        // little; the clamp forces at least a 5% cut.
        match assess(mib(10.15), target, current, None, 1) {
            Verdict::Adjust(next) => assert_eq!(next.kbps(), 950),
            other => panic!("expected Adjust, got {other:?}"),
        }
    }

    #[test]
    fn test_assess_gives_up_without_improvement() {
        let target = mib(10.0);
        let current = Bitrate::from_kbps(1000);
        assert_eq!(
            assess(mib(12.0), target, current, Some(mib(11.0)), 2),
            Verdict::GiveUp(GiveUpReason::NoImprovement)
        );
        // Equal size counts as no improvement too.
        assert_eq!(
            assess(mib(12.0), target, current, Some(mib(12.0)), 2),
            Verdict::GiveUp(GiveUpReason::NoImprovement)
        );
    }

    #[test]
    fn test_assess_gives_up_when_budget_spent() {
        let target = mib(10.0);
        let current = Bitrate::from_kbps(1000);
        assert_eq!(
            assess(mib(12.0), target, current, Some(mib(13.0)), MAX_ATTEMPTS),
            Verdict::GiveUp(GiveUpReason::AttemptsExhausted)
        );
    }

    #[test]
    fn test_assess_gives_up_at_bitrate_floor() {
        let target = mib(1.0);
        let current = Bitrate::MIN_VIDEO;
        assert_eq!(
            assess(mib(2.0), target, current, None, 1),
            Verdict::GiveUp(GiveUpReason::NoImprovement)
        );
    }

    proptest! {
        /// Whenever the measurement exceeds target, the next candidate is
        /// strictly below the current one.
        #[test]
        fn adjusted_bitrate_is_monotonically_decreasing(
            kbps in 200u32..100_000,
            target_bytes in 1_000_000u64..1_000_000_000,
            over in 1.02f64..10.0,
            attempts in 1u32..MAX_ATTEMPTS,
        ) {
            let target = FileSize::new(target_bytes);
            let measured = FileSize::new((target_bytes as f64 * over) as u64);
            let current = Bitrate::from_kbps(kbps);
            match assess(measured, target, current, None, attempts) {
                Verdict::Adjust(next) => prop_assert!(next < current),
                Verdict::GiveUp(_) => {}
                Verdict::Accept => prop_assert!(false, "oversized artifact accepted"),
            }
        }

        /// The corrected candidate never exceeds 95% of the previous one.
        #[test]
        fn adjustment_respects_the_clamp(
            kbps in 200u32..100_000,
            target_bytes in 1_000_000u64..1_000_000_000,
            over in 1.02f64..10.0,
        ) {
            let target = FileSize::new(target_bytes);
            let measured = FileSize::new((target_bytes as f64 * over) as u64);
            let current = Bitrate::from_kbps(kbps);
            if let Verdict::Adjust(next) = assess(measured, target, current, None, 1) {
                prop_assert!(next.kbps() <= current.scaled(ADJUST_CLAMP).kbps());
            }
        }
    }
}
