//! Blocking file helpers for the small files that must be written in one go.

use anyhow::{Context, Result};
use std::io::{ErrorKind, Write};
use std::path::Path;

pub(crate) fn create_dir_all(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path)
        .context(format!("Unable to create directory {}", path.display()))
}

/// Reads a file, returning `None` when it does not exist.
pub(crate) fn read_optional(path: impl AsRef<Path>) -> Result<Option<String>> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(Some(s)),
        Err(e) => match e.kind() {
            ErrorKind::NotFound => Ok(None),
            _ => Err(e).context(format!("Unable to read file {}", path.display())),
        },
    }
}

/// Writes `data` next to `path` and renames it into place, so readers see either the old contents
/// or the new contents.
pub(crate) fn write_replace(path: impl AsRef<Path>, data: &[u8]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    let mut f = std::fs::File::create(&tmp)
        .context(format!("Unable to create file {}", tmp.display()))?;
    f.write_all(data)
        .context(format!("Unable to write data to {}", tmp.display()))?;
    f.sync_all()
        .context(format!("Unable to flush {}", tmp.display()))?;
    std::fs::rename(&tmp, path).context(format!(
        "Unable to move {} to {}",
        tmp.display(),
        path.display()
    ))
}
