//! Output path resolution.
//!
//! Turns the user's output spec (empty, a directory, or a full path)
//! into one absolute final path with the codec's mandated extension,
//! and refuses to clobber existing files unless asked to.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::codec::CodecProfile;
use crate::error::{Result, ShrinkError};
use crate::job::TrimWindow;
use crate::timestamp::compact_timestamp;

/// Resolve the final output path.
///
/// An empty spec lands next to the input; a directory gets a
/// synthesized `small_<stem>` file name. The name carries the trim
/// window when that came from the input's file name (the window is
/// what distinguishes two clips cut from the same source), otherwise a
/// wall-clock stamp.
pub fn resolve_output(
    spec: &str,
    input: &Path,
    codec: CodecProfile,
    trim: &TrimWindow,
    filename_derived_times: bool,
) -> Result<PathBuf> {
    let ext = codec.container();
    let spec_path = PathBuf::from(spec);

    if !spec.is_empty() && !spec_path.is_dir() {
        // A full file path: enforce the codec's container extension.
        let mut path = spec_path;
        match path.extension().map(|e| e.to_string_lossy().to_string()) {
            Some(found) if found == ext => {}
            found => {
                if let Some(found) = found {
                    warn!(
                        "⚠️ Output file name ends with .{found}, but {codec} requires .{ext}; renaming"
                    );
                }
                path.set_extension(ext);
            }
        }
        return Ok(path);
    }

    let dir = if spec.is_empty() {
        input
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        spec_path
    };

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().replace(' ', "_"))
        .ok_or_else(|| {
            ShrinkError::Config(format!("input has no file name: {}", input.display()))
        })?;

    let suffix = if filename_derived_times {
        format!(
            "{}-{}",
            compact_timestamp(trim.start),
            compact_timestamp(trim.end)
        )
    } else {
        chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
    };

    Ok(dir.join(format!("small_{stem}_{suffix}.{ext}")))
}

/// Fail with a conflict unless the path is free or overwriting was
/// explicitly requested.
pub fn ensure_writable(path: &Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        return Err(ShrinkError::PathConflict {
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trim() -> TrimWindow {
        TrimWindow { start: 10, end: 30 }
    }

    #[test]
    fn test_full_path_with_matching_extension() {
        let path = resolve_output("out/clip.mp4", Path::new("in.mp4"), CodecProfile::Libx264, &trim(), false)
            .unwrap();
        assert_eq!(path, PathBuf::from("out/clip.mp4"));
    }

    #[test]
    fn test_full_path_extension_rewritten() {
        let path = resolve_output("clip.txt", Path::new("in.mp4"), CodecProfile::Libx264, &trim(), false)
            .unwrap();
        assert_eq!(path, PathBuf::from("clip.mp4"));

        let path = resolve_output("clip.mp4", Path::new("in.mp4"), CodecProfile::LibvpxVp9, &trim(), false)
            .unwrap();
        assert_eq!(path, PathBuf::from("clip.webm"));
    }

    #[test]
    fn test_directory_gets_synthesized_name() {
        let dir = tempfile::tempdir().unwrap();
        let spec = dir.path().to_string_lossy().to_string();
        let path = resolve_output(
            &spec,
            Path::new("my clip.mp4"),
            CodecProfile::Libx264,
            &trim(),
            true,
        )
        .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, "small_my_clip_000010-000030.mp4");
        assert_eq!(path.parent().unwrap(), dir.path());
    }

    #[test]
    fn test_empty_spec_lands_next_to_input() {
        let path = resolve_output(
            "",
            Path::new("/videos/clip.mp4"),
            CodecProfile::Libx264,
            &trim(),
            true,
        )
        .unwrap();
        assert_eq!(path.parent().unwrap(), Path::new("/videos"));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("small_clip_"));
    }

    #[test]
    fn test_timestamp_suffix_when_not_filename_derived() {
        let path = resolve_output(
            "",
            Path::new("clip.mp4"),
            CodecProfile::Libx264,
            &trim(),
            false,
        )
        .unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        // small_clip_<14-digit stamp>.mp4
        assert!(name.starts_with("small_clip_"));
        let stamp = name
            .trim_start_matches("small_clip_")
            .trim_end_matches(".mp4");
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_ensure_writable_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exists.mp4");
        std::fs::write(&path, b"x").unwrap();

        assert!(matches!(
            ensure_writable(&path, false),
            Err(ShrinkError::PathConflict { .. })
        ));
        assert!(ensure_writable(&path, true).is_ok());
        assert!(ensure_writable(&dir.path().join("free.mp4"), false).is_ok());
    }
}
