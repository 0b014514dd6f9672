//! Filesystem Mover Abstraction
//!
//! The core decides *where* files go; implementations of [`FileMover`] carry
//! out the move, resolve name collisions and tidy up afterwards.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Declarative file operations used when a track is finished.
///
/// # Collision policy
///
/// When the destination name is taken, implementations append `_dup1`,
/// `_dup2`, ... to the file stem until a free name is found. Moving a file
/// onto its own current path is a no-op that returns the path unchanged.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileMover;
///
/// async fn archive(mover: &dyn FileMover, audio: &Path, done: &Path) -> Result<PathBuf> {
///     let moved = mover.move_with_dedup(audio, done, None).await?;
///     mover.cleanup_empty_dirs(audio.parent().unwrap()).await?;
///     Ok(moved)
/// }
/// ```
#[async_trait]
pub trait FileMover: Send + Sync {
    /// Move `src` into `dst_dir`, optionally renaming its stem (extension kept).
    ///
    /// Creates `dst_dir` if missing and returns the final path.
    async fn move_with_dedup(
        &self,
        src: &Path,
        dst_dir: &Path,
        new_stem: Option<&str>,
    ) -> Result<PathBuf>;

    /// Replace the contents of `path` with UTF-8 `text`.
    async fn write_text(&self, path: &Path, text: &str) -> Result<()>;

    /// Remove empty directories below `root` (never `root` itself).
    ///
    /// Returns the number of directories removed.
    async fn cleanup_empty_dirs(&self, root: &Path) -> Result<usize>;
}
