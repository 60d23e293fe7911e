//! Write-new-then-rename helpers shared by the file stores.
//!
//! A rename or a newly created file only survives power loss once the
//! containing directory has been fsynced as well, so every helper that
//! changes a directory entry syncs the directory afterwards.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::domain::StoreError;

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Replace `path` with `bytes` atomically.
///
/// Readers see either the old or the new content, never a mix. A crash
/// before the rename leaves the old file in place plus a stale `.tmp`, which
/// the next replace overwrites.
pub(crate) async fn replace_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = tmp_path(path);

    let mut file = fs::File::create(&tmp)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    file.sync_all().await.map_err(|e| StoreError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    sync_parent(path).await
}

/// Fsync the directory containing `path`.
pub(crate) async fn sync_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => sync_dir(dir).await,
        _ => sync_dir(Path::new(".")).await,
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<(), StoreError> {
    let handle = fs::File::open(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    handle.sync_all().await.map_err(|e| StoreError::io(dir, e))
}

// no directory fsync on this platform
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}

/// Create the parent directory of `path` if needed.
pub(crate) async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(());
    };
    if fs::metadata(dir).await.is_ok() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .await
        .map_err(|e| StoreError::io(dir, e))?;
    sync_parent(dir).await
}

/// Read `path` as UTF-8, treating a missing file as empty.
pub(crate) async fn read_or_empty(path: &Path) -> Result<String, StoreError> {
    match fs::read_to_string(path).await {
        Ok(s) => Ok(s),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
