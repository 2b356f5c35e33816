//! FileSize - type-safe byte counts.
//!
//! Target sizes are given in MiB; the bit-budget math wants kilobits.
//! Keeping everything behind one newtype avoids unit mixups between the
//! two and the raw byte counts read back from the filesystem.

use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KIB: u64 = 1024;
    pub const MIB: u64 = 1024 * 1024;
    pub const GIB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Fractional MiB, truncated to whole bytes.
    pub fn from_mib(mib: f64) -> Self {
        Self((mib * Self::MIB as f64) as u64)
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    pub fn as_mib(&self) -> f64 {
        self.0 as f64 / Self::MIB as f64
    }

    /// Total size expressed in kilobits (1 kilobit = 1024 bits), so a
    /// 1 MiB file is exactly 8192 kilobits.
    pub fn kilobits(&self) -> f64 {
        self.0 as f64 * 8.0 / 1024.0
    }

    #[inline]
    pub fn saturating_sub(&self, other: FileSize) -> FileSize {
        FileSize(self.0.saturating_sub(other.0))
    }

    #[inline]
    pub fn saturating_add(&self, other: FileSize) -> FileSize {
        FileSize(self.0.saturating_add(other.0))
    }

    /// self / other, or None when other is zero.
    pub fn ratio_to(&self, other: FileSize) -> Option<f64> {
        if other.0 == 0 {
            None
        } else {
            Some(self.0 as f64 / other.0 as f64)
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn display(&self) -> String {
        if self.0 >= Self::GIB {
            format!("{:.2} GiB", self.0 as f64 / Self::GIB as f64)
        } else if self.0 >= Self::MIB {
            format!("{:.2} MiB", self.0 as f64 / Self::MIB as f64)
        } else if self.0 >= Self::KIB {
            format!("{:.2} KiB", self.0 as f64 / Self::KIB as f64)
        } else {
            format!("{} B", self.0)
        }
    }
}

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self::new(bytes)
    }
}

impl From<FileSize> for u64 {
    fn from(size: FileSize) -> Self {
        size.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_and_units() {
        let size = FileSize::new(1024);
        assert_eq!(size.bytes(), 1024);

        let mib = FileSize::from_mib(1.0);
        assert_eq!(mib.bytes(), 1024 * 1024);

        let half = FileSize::from_mib(0.5);
        assert_eq!(half.bytes(), 512 * 1024);
    }

    #[test]
    fn test_kilobits() {
        // The budget math relies on 1 MiB == 8192 kilobits.
        assert_eq!(FileSize::from_mib(1.0).kilobits(), 8192.0);
        assert_eq!(FileSize::from_mib(10.0).kilobits(), 81920.0);
        assert_eq!(FileSize::new(1024).kilobits(), 8.0);
    }

    #[test]
    fn test_saturating_sub() {
        let a = FileSize::new(100);
        let b = FileSize::new(30);

        assert_eq!(a.saturating_sub(b).bytes(), 70);
        assert_eq!(b.saturating_sub(a).bytes(), 0);
        assert_eq!(a.saturating_sub(a).bytes(), 0);
    }

    #[test]
    fn test_ratio_to() {
        let output = FileSize::new(500);
        let input = FileSize::new(1000);

        assert_eq!(output.ratio_to(input), Some(0.5));
        assert_eq!(input.ratio_to(output), Some(2.0));
        assert_eq!(output.ratio_to(FileSize::ZERO), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(FileSize::new(500).display(), "500 B");
        assert_eq!(FileSize::new(1024).display(), "1.00 KiB");
        assert_eq!(FileSize::new(1024 * 1024).display(), "1.00 MiB");
        assert_eq!(FileSize::new(1024 * 1024 * 1024).display(), "1.00 GiB");
    }

    #[test]
    fn test_as_mib_round_trip() {
        let size = FileSize::from_mib(10.0);
        assert!((size.as_mib() - 10.0).abs() < 1e-9);
    }
}
