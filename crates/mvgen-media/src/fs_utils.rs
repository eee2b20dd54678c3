//! Filesystem helpers for artifacts.
//!
//! Every artifact the pipeline produces lands through [`write_atomic`] or
//! [`move_file`]: content is written to a sibling temp file and renamed into
//! place, so an artifact that exists is always complete. Directory listings go
//! through [`list_files_with_extensions`], which applies natural ordering.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use mvgen_models::sort_paths_naturally;

use crate::error::{MediaError, MediaResult};

/// Sibling temp path for `dst`, keeping its extension so muxers can still
/// infer the container format.
pub fn partial_path(dst: &Path) -> PathBuf {
    let stem = dst
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let id = Uuid::new_v4().simple().to_string();
    let tag = &id[..8];
    let name = match dst.extension() {
        Some(ext) => format!(".{}.partial-{}.{}", stem, tag, ext.to_string_lossy()),
        None => format!(".{}.partial-{}", stem, tag),
    };
    dst.with_file_name(name)
}

async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Write `contents` to `dst` atomically (temp file in the same directory,
/// flushed, then renamed).
pub async fn write_atomic(dst: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> MediaResult<()> {
    let dst = dst.as_ref();
    ensure_parent(dst).await?;

    let tmp = partial_path(dst);
    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(contents.as_ref()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, dst).await
    }
    .await;

    if let Err(e) = result {
        let _ = fs::remove_file(&tmp).await;
        tracing::error!("Atomic write to {} failed: {}", dst.display(), e);
        return Err(MediaError::from(e));
    }
    Ok(())
}

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is attempted first. If that fails with EXDEV the file is
/// copied to a temp file next to `dst`, renamed into place, and the source is
/// removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+delete: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is 18 on Linux and macOS
    e.raw_os_error() == Some(18)
}

/// Copy file to destination (via temp file) then delete source.
async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = partial_path(dst);

    fs::copy(src, &tmp_dst).await.map_err(|e| {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        MediaError::from(e)
    })?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        tracing::error!(
            "Failed to rename temp file during cross-device move: {} -> {}: {}",
            tmp_dst.display(),
            dst.display(),
            e
        );
        return Err(MediaError::from(e));
    }

    // Best effort: the destination is already complete
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            extensions.iter().any(|e| ext.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true)
}

/// Regular files in `dir` whose extension matches one of `extensions`
/// (case-insensitive), in natural order. Hidden files, which include
/// in-flight temp files, are skipped. A missing directory lists as empty.
pub fn list_files_with_extensions(
    dir: impl AsRef<Path>,
    extensions: &[&str],
) -> MediaResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_extension(&path, extensions) && !is_partial(&path) {
            files.push(path);
        }
    }

    sort_paths_naturally(&mut files);
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_file_same_filesystem() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("dest.txt");

        fs::write(&src, b"test content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists(), "Source file should be removed");
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "test content");
    }

    #[tokio::test]
    async fn test_move_file_to_subdirectory_overwrites() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("source.txt");
        let dst = dir.path().join("subdir").join("dest.txt");

        fs::create_dir_all(dst.parent().unwrap()).await.unwrap();
        fs::write(&dst, b"old content").await.unwrap();
        fs::write(&src, b"new content").await.unwrap();

        move_file(&src, &dst).await.unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "new content");
    }

    #[test]
    fn test_is_cross_device_error() {
        let exdev_error = std::io::Error::from_raw_os_error(18);
        assert!(is_cross_device_error(&exdev_error));

        let not_found = std::io::Error::from_raw_os_error(2);
        assert!(!is_cross_device_error(&not_found));
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("nested").join("song_plan.json");

        write_atomic(&dst, b"[]").await.unwrap();
        write_atomic(&dst, b"[1]").await.unwrap();

        assert_eq!(fs::read_to_string(&dst).await.unwrap(), "[1]");
        let names: Vec<_> = std::fs::read_dir(dst.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_partial_path_keeps_extension() {
        let p = partial_path(Path::new("/out/final_video.mp4"));
        let name = p.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".final_video.partial-"));
        assert!(name.ends_with(".mp4"));
        assert_eq!(p.parent(), Some(Path::new("/out")));
    }

    #[test]
    fn test_list_files_natural_order_and_filter() {
        let dir = TempDir::new().unwrap();
        for name in ["10_b.MP4", "2_a.mov", "1_c.mp4", "notes.txt", ".1_x.partial-ab.mp4"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("3_dir.mp4")).unwrap();

        let files = list_files_with_extensions(dir.path(), &["mp4", "mov"]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["1_c.mp4", "2_a.mov", "10_b.MP4"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let files = list_files_with_extensions(dir.path().join("nope"), &["mp3"]).unwrap();
        assert!(files.is_empty());
    }
}
