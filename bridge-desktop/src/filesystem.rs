//! File mover implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileMover,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Moves finished files on the local disk.
#[derive(Debug, Default, Clone)]
pub struct LocalFileMover;

impl LocalFileMover {
    pub fn new() -> Self {
        Self
    }

    /// First free path in `dir` for `stem` + `ext`, trying `stem_dupN` on collision.
    async fn free_target(dir: &Path, stem: &str, ext: Option<&str>) -> Result<PathBuf> {
        let file_name = |stem: &str| match ext {
            Some(ext) => format!("{}.{}", stem, ext),
            None => stem.to_string(),
        };

        let mut candidate = dir.join(file_name(stem));
        let mut n = 1u32;
        while fs::try_exists(&candidate).await? {
            candidate = dir.join(file_name(&format!("{}_dup{}", stem, n)));
            n += 1;
        }
        Ok(candidate)
    }

    /// `rename`, falling back to copy + delete across filesystems.
    async fn relocate(src: &Path, dst: &Path) -> Result<()> {
        if fs::rename(src, dst).await.is_ok() {
            return Ok(());
        }
        fs::copy(src, dst).await?;
        fs::remove_file(src).await?;
        Ok(())
    }
}

#[async_trait]
impl FileMover for LocalFileMover {
    async fn move_with_dedup(
        &self,
        src: &Path,
        dst_dir: &Path,
        new_stem: Option<&str>,
    ) -> Result<PathBuf> {
        let stem = match new_stem {
            Some(stem) => stem.to_string(),
            None => src
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    BridgeError::OperationFailed(format!("no file name: {}", src.display()))
                })?,
        };
        let ext = src.extension().map(|e| e.to_string_lossy().into_owned());

        let direct = match &ext {
            Some(ext) => dst_dir.join(format!("{}.{}", stem, ext)),
            None => dst_dir.join(&stem),
        };
        if direct == src {
            debug!(path = ?src, "Source already at destination");
            return Ok(direct);
        }

        fs::create_dir_all(dst_dir).await?;
        let target = Self::free_target(dst_dir, &stem, ext.as_deref()).await?;
        Self::relocate(src, &target).await?;

        info!(from = ?src, to = ?target, "Moved file");
        Ok(target)
    }

    async fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        fs::write(path, text.as_bytes()).await?;
        debug!(path = ?path, size = text.len(), "Wrote file");
        Ok(())
    }

    async fn cleanup_empty_dirs(&self, root: &Path) -> Result<usize> {
        if !fs::try_exists(root).await? {
            return Ok(0);
        }

        // deepest first so parents become empty after their children go
        let dirs: Vec<PathBuf> = WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_dir())
            .map(|entry| entry.into_path())
            .collect();

        let mut removed = 0;
        for dir in dirs {
            let mut entries = fs::read_dir(&dir).await?;
            if entries.next_entry().await?.is_none() {
                fs::remove_dir(&dir).await?;
                debug!(path = ?dir, "Removed empty directory");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_move_into_new_directory() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("Artist - Song.lrc");
        std::fs::write(&src, "[00:01.00]hi").unwrap();

        let mover = LocalFileMover::new();
        let dst = mover
            .move_with_dedup(&src, &tmp.path().join("done"), None)
            .await
            .unwrap();

        assert_eq!(dst, tmp.path().join("done").join("Artist - Song.lrc"));
        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dst).unwrap(), "[00:01.00]hi");
    }

    #[tokio::test]
    async fn test_collision_appends_dup_suffix() {
        let tmp = TempDir::new().unwrap();
        let done = tmp.path().join("done");
        std::fs::create_dir(&done).unwrap();
        std::fs::write(done.join("song.mp3"), "old").unwrap();
        std::fs::write(done.join("song_dup1.mp3"), "older").unwrap();

        let src = tmp.path().join("song.mp3");
        std::fs::write(&src, "new").unwrap();

        let dst = LocalFileMover::new()
            .move_with_dedup(&src, &done, None)
            .await
            .unwrap();

        assert_eq!(dst, done.join("song_dup2.mp3"));
        assert_eq!(std::fs::read_to_string(done.join("song.mp3")).unwrap(), "old");
    }

    #[tokio::test]
    async fn test_rename_stem_keeps_extension() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("random name.lrc");
        std::fs::write(&src, "x").unwrap();

        let dst = LocalFileMover::new()
            .move_with_dedup(&src, tmp.path(), Some("Artist - Song"))
            .await
            .unwrap();

        assert_eq!(dst, tmp.path().join("Artist - Song.lrc"));
    }

    #[tokio::test]
    async fn test_move_onto_itself_is_noop() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("song.lrc");
        std::fs::write(&src, "x").unwrap();

        let dst = LocalFileMover::new()
            .move_with_dedup(&src, tmp.path(), None)
            .await
            .unwrap();

        assert_eq!(dst, src);
        assert!(src.exists());
        assert!(!tmp.path().join("song_dup1.lrc").exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_nested_empty_dirs_only() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/b/c")).unwrap();
        std::fs::create_dir_all(tmp.path().join("keep")).unwrap();
        std::fs::write(tmp.path().join("keep/file.mp3"), "x").unwrap();

        let removed = LocalFileMover::new()
            .cleanup_empty_dirs(tmp.path())
            .await
            .unwrap();

        assert_eq!(removed, 3);
        assert!(tmp.path().exists());
        assert!(!tmp.path().join("a").exists());
        assert!(tmp.path().join("keep/file.mp3").exists());
    }

    #[tokio::test]
    async fn test_write_text_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("song.lrc");
        std::fs::write(&path, "old").unwrap();

        LocalFileMover::new().write_text(&path, "new").await.unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "new");
    }
}
