//! Crash-dump detection.

use std::path::{Path, PathBuf};

/// File name prefix of a crash dump.
pub const CORE_PREFIX: &str = "core";

/// List crash dumps directly inside each of `dirs`.
///
/// A dump is a regular file whose name starts with `core`. Directories that
/// do not exist (yet) are skipped. Results are sorted.
pub async fn find_core_dumps(dirs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut dumps = Vec::new();
    for dir in dirs {
        scan_dir(dir, &mut dumps).await?;
    }
    dumps.sort();
    Ok(dumps)
}

async fn scan_dir(dir: &Path, dumps: &mut Vec<PathBuf>) -> std::io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("core dump dir {} does not exist", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(CORE_PREFIX) {
            dumps.push(entry.path());
        }
    }
    Ok(())
}
