//! Atomic text writes.
//!
//! Content goes to a temporary sibling file, is flushed to disk, and is then
//! renamed over the target. Readers see either the old file or the new one.
//! The same primitive backs the state file and any text artifact a
//! collaborator wants to save next to it.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::Result;

/// Write `content` to `path` atomically, creating parent directories.
pub async fn write_text_atomic(path: impl AsRef<Path>, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path_for(path)?;
    let result = match write_and_sync(&tmp, content).await {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&tmp).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp.display(), error = %cleanup, "failed to remove temporary file");
            }
        }
        return Err(e.into());
    }

    debug!(path = %path.display(), bytes = content.len(), "wrote file");
    Ok(())
}

async fn write_and_sync(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

/// `dir/.name.<pid>.tmp`, on the same filesystem as the target so the
/// rename stays atomic.
fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("not a file path: {}", path.display()),
        )
    })?;
    let tmp_name = format!(".{}.{}.tmp", name.to_string_lossy(), std::process::id());
    Ok(path.with_file_name(tmp_name))
}
