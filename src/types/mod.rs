//! Type-safe wrappers for the quantities the bitrate search juggles.

pub mod bitrate;
pub mod file_size;

pub use bitrate::Bitrate;
pub use file_size::FileSize;
