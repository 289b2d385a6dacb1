//! The global, process-shared package cache rooted at `kpm_home`.
//!
//! One directory per resolved `(name, version)` pair, named by the
//! dependency's `full_name`. Never garbage-collected automatically; a
//! process-wide advisory lock serializes mutation across concurrent
//! invocations (see `acquire_lock`).

use crate::err::Res;
use crate::hash::hash_dir;
use crate::package::Dependency;
use fs2::FileExt;
use slog::{info, Logger};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

pub struct Cache {
    root: PathBuf,
    logger: Logger,
    lock_file: Option<File>,
}

impl Cache {
    pub fn new(root: PathBuf, logger: Logger) -> Res<Self> {
        fs::create_dir_all(&root)?;
        Ok(Cache {
            root,
            logger,
            lock_file: None,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<kpm_home>/<full_name>`.
    pub fn path(&self, full_name: &str) -> PathBuf {
        self.root.join(full_name)
    }

    /// The directory exists, has a non-empty recorded sum, and that sum
    /// matches a fresh hash of its contents.
    pub fn exists_and_matches(&self, dep: &Dependency) -> bool {
        if dep.sum.is_empty() {
            return false;
        }
        let dir = self.path(&dep.full_name);
        if !dir.exists() {
            return false;
        }
        match hash_dir(&dir) {
            Ok(sum) => sum == dep.sum,
            Err(_) => false,
        }
    }

    /// Recursively deletes the cache entry for `full_name`, if present.
    /// Called before a re-fetch to evict stale content.
    pub fn remove(&self, full_name: &str) -> Res<()> {
        let dir = self.path(full_name);
        if dir.exists() {
            remove_dir_all::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Acquires the process-wide advisory lock over this cache. Blocks
    /// until available; logs a message while waiting.
    pub fn acquire_lock(&mut self) -> Res<()> {
        let path = self.root.join(".kpm-lock");
        let file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            info!(self.logger, "waiting for cache lock"; "path" => path.to_string_lossy().into_owned());
            file.lock_exclusive()?;
        }

        self.lock_file = Some(file);
        Ok(())
    }

    pub fn release_lock(&mut self) {
        if let Some(file) = self.lock_file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.release_lock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Source;
    use crate::util::build_logger;
    use std::fs::write;
    use tempdir::TempDir;

    #[test]
    fn exists_and_matches_requires_matching_hash() {
        let root = TempDir::new("kpm-cache").unwrap();
        let cache = Cache::new(root.path().to_path_buf(), build_logger(false)).unwrap();

        let mut dep = Dependency::new(
            "foo",
            Source::Local {
                path: "/tmp".to_string(),
            },
        );
        dep.full_name = "foo_1.0.0".to_string();
        dep.sum = "bogus".to_string();

        assert!(!cache.exists_and_matches(&dep));

        let entry = cache.path(&dep.full_name);
        fs::create_dir_all(&entry).unwrap();
        write(entry.join("a.txt"), "hi").unwrap();
        dep.sum = hash_dir(&entry).unwrap();

        assert!(cache.exists_and_matches(&dep));
    }

    #[test]
    fn remove_evicts_stale_entry() {
        let root = TempDir::new("kpm-cache").unwrap();
        let cache = Cache::new(root.path().to_path_buf(), build_logger(false)).unwrap();

        let entry = cache.path("foo_1.0.0");
        fs::create_dir_all(&entry).unwrap();
        assert!(entry.exists());

        cache.remove("foo_1.0.0").unwrap();
        assert!(!entry.exists());
    }

    #[test]
    fn lock_round_trips() {
        let root = TempDir::new("kpm-cache").unwrap();
        let mut cache = Cache::new(root.path().to_path_buf(), build_logger(false)).unwrap();
        cache.acquire_lock().unwrap();
        cache.release_lock();
    }
}
