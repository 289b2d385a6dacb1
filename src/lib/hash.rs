//! Content-addressing a directory tree.
//!
//! The digest identifies a directory by the bytes of its files alone: names
//! never enter the hash, and anything under a `.git` path is skipped. Both
//! of these are deliberate compatibility constraints with existing lock
//! files, not oversights. Preserve them exactly; "fixing" the scheme to
//! include filenames would silently invalidate every `sum` already
//! committed to a lock file in the wild.

use crate::err::{ErrorKind, Res};
use failure::ResultExt;
use sha2::{Digest, Sha256};
use std::{
    fs,
    io::Read,
    path::Path,
};
use walkdir::WalkDir;

/// Computes the base64 (standard, padded) SHA-256 digest of a directory's
/// file contents, walked in deterministic lexicographic order of full path.
pub fn hash_dir(dir: &Path) -> Res<String> {
    let mut paths: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.path().to_string_lossy().contains(".git"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    for path in paths {
        let mut file =
            fs::File::open(&path).with_context(|_| ErrorKind::FailedHashPkg(dir.to_path_buf()))?;
        loop {
            let n = file
                .read(&mut buf)
                .with_context(|_| ErrorKind::FailedHashPkg(dir.to_path_buf()))?;
            if n == 0 {
                break;
            }
            hasher.input(&buf[..n]);
        }
    }

    Ok(base64::encode(hasher.result().as_slice()))
}
