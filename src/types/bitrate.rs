//! Bitrate - type-safe kilobits-per-second values.
//!
//! Carries the VBV ladder the encoder is driven with: minrate at 50%,
//! maxrate at 145% and bufsize at 200% of the nominal video bitrate.

use std::fmt;

pub const MINRATE_FACTOR: f64 = 0.5;
pub const MAXRATE_FACTOR: f64 = 1.45;
pub const BUFSIZE_FACTOR: f64 = 2.0;

/// Lowest video bitrate worth requesting; below this the encoder
/// produces unusable output anyway.
pub const MIN_VIDEO_KBPS: u32 = 100;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bitrate(u32);

impl Bitrate {
    pub const MIN_VIDEO: Bitrate = Bitrate(MIN_VIDEO_KBPS);

    #[inline]
    pub const fn from_kbps(kbps: u32) -> Self {
        Self(kbps)
    }

    #[inline]
    pub const fn kbps(&self) -> u32 {
        self.0
    }

    /// Scale by a ratio, truncating to whole kbps.
    pub fn scaled(&self, ratio: f64) -> Bitrate {
        Bitrate((self.0 as f64 * ratio) as u32)
    }

    /// Clamp up to the minimum usable video bitrate.
    pub fn floored(&self) -> Bitrate {
        Bitrate(self.0.max(MIN_VIDEO_KBPS))
    }

    /// Value formatted the way ffmpeg's rate options expect it.
    pub fn ffmpeg_arg(&self) -> String {
        format!("{}k", self.0)
    }

    pub fn minrate_arg(&self) -> String {
        format!("{}k", (self.0 as f64 * MINRATE_FACTOR) as u32)
    }

    pub fn maxrate_arg(&self) -> String {
        format!("{}k", (self.0 as f64 * MAXRATE_FACTOR) as u32)
    }

    pub fn bufsize_arg(&self) -> String {
        format!("{}k", (self.0 as f64 * BUFSIZE_FACTOR) as u32)
    }
}

impl fmt::Debug for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitrate({} kbps)", self.0)
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kbps", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ladder_args() {
        let br = Bitrate::from_kbps(1000);
        assert_eq!(br.ffmpeg_arg(), "1000k");
        assert_eq!(br.minrate_arg(), "500k");
        assert_eq!(br.maxrate_arg(), "1450k");
        assert_eq!(br.bufsize_arg(), "2000k");
    }

    #[test]
    fn test_scaled() {
        let br = Bitrate::from_kbps(1000);
        assert_eq!(br.scaled(0.5).kbps(), 500);
        assert_eq!(br.scaled(0.95).kbps(), 950);
        assert_eq!(br.scaled(1.0).kbps(), 1000);
    }

    #[test]
    fn test_floored() {
        assert_eq!(Bitrate::from_kbps(5).floored().kbps(), MIN_VIDEO_KBPS);
        assert_eq!(Bitrate::from_kbps(500).floored().kbps(), 500);
    }

    proptest! {
        #[test]
        fn scaling_down_never_increases(kbps in 1u32..1_000_000, ratio in 0.0f64..=1.0) {
            let br = Bitrate::from_kbps(kbps);
            prop_assert!(br.scaled(ratio).kbps() <= br.kbps());
        }

        #[test]
        fn floored_is_always_usable(kbps in 0u32..1_000_000) {
            prop_assert!(Bitrate::from_kbps(kbps).floored().kbps() >= MIN_VIDEO_KBPS);
        }
    }
}
