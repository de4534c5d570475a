//! Atomic file replacement
//!
//! Status snapshots and operator files are overwritten in place, and a
//! reader must never observe a half-written file. Writes land in a sibling
//! temp file first and rename over the target.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub(crate) fn replace_file(path: &Path, body: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
