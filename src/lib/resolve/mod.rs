//! Module `resolve` reconciles a project manifest against its lock and
//! transitively fetches whatever the lock doesn't already have on disk.
//!
//! Driven by an explicit worklist loop rather than self-recursion, so a
//! chain of refetches can't blow the stack.

use crate::err::{Error, ErrorKind, Res};
use crate::hash::hash_dir;
use crate::package::store::Package;
use crate::package::{Dependency, Source};
use crate::remote::{self, GitClient, OciRegistry, TarCodec};
use crate::retrieve::Cache;
use failure::ResultExt;
use indexmap::IndexMap;
use slog::{info, Logger};
use std::path::{Path, PathBuf};

pub mod vendor;

/// Reconciles, fetches, and verifies a project's dependency graph.
///
/// Holds references to the external collaborators (the cache, and the
/// OCI/Git/TAR drivers) as explicit values rather than reaching for
/// global state.
pub struct Resolver<'a> {
    pub cache: &'a mut Cache,
    pub registry: &'a dyn OciRegistry,
    pub git: &'a dyn GitClient,
    pub codec: &'a dyn TarCodec,
    pub logger: Logger,
}

enum Outcome {
    Clean,
    Refetched,
}

impl<'a> Resolver<'a> {
    pub fn new(
        cache: &'a mut Cache,
        registry: &'a dyn OciRegistry,
        git: &'a dyn GitClient,
        codec: &'a dyn TarCodec,
        logger: Logger,
    ) -> Self {
        Resolver {
            cache,
            registry,
            git,
            codec,
            logger,
        }
    }

    /// Reconciles `package.lock` against `package.manifest`, then
    /// repeatedly verifies (and, if `update`, refetches) every locked
    /// dependency until a pass completes with no refetch.
    pub fn resolve(&mut self, package: &mut Package, update: bool) -> Res<()> {
        self.reconcile(package);

        loop {
            let search_root = self.select_search_root(package)?;
            match self.verify_or_refetch(package, update, &search_root)? {
                Outcome::Clean => break,
                Outcome::Refetched => continue,
            }
        }

        package.persist()
    }

    /// Removes lock entries with no manifest counterpart, and seeds lock
    /// entries for manifest dependencies not yet resolved.
    fn reconcile(&mut self, package: &mut Package) {
        let stale: Vec<String> = package
            .lock
            .dependencies
            .keys()
            .filter(|name| !package.manifest.dependencies.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            info!(self.logger, "removing dependency no longer in manifest"; "name" => name.as_str());
            package.lock.dependencies.shift_remove(&name);
        }

        let missing: Vec<Dependency> = package
            .manifest
            .dependencies
            .iter()
            .filter(|(name, _)| !package.lock.dependencies.contains_key(*name))
            .map(|(_, dep)| dep.clone())
            .collect();
        for dep in missing {
            info!(self.logger, "adding dependency from manifest"; "name" => dep.name.as_str());
            package.lock.insert(dep);
        }
    }

    fn select_search_root(&mut self, package: &mut Package) -> Res<PathBuf> {
        if package.manifest.package.vendor {
            self.vendor(package)?;
            Ok(package.home_path.join(crate::config::VENDOR_DIR))
        } else {
            Ok(self.cache.root().to_path_buf())
        }
    }

    fn verify_or_refetch(
        &mut self,
        package: &mut Package,
        update: bool,
        search_root: &Path,
    ) -> Res<Outcome> {
        let names: Vec<String> = package.lock.dependencies.keys().cloned().collect();

        for name in names {
            let d = package.lock.dependencies.get(&name).unwrap().clone();
            let p = search_root.join(&d.full_name);

            if !update {
                if p.exists() {
                    package.lock.dependencies.get_mut(&name).unwrap().local_full_path = Some(p);
                }
                continue;
            }

            if p.exists() && check(&d, &p) {
                package.lock.dependencies.get_mut(&name).unwrap().local_full_path = Some(p);
                continue;
            }

            if d.is_local() {
                let path = d.local_path(&package.home_path);
                if !path.exists() {
                    return Err(ErrorKind::DependencyNotFound(path))?;
                }
                let sum = hash_dir(&path)
                    .with_context(|e| ErrorKind::CalSumFailed(e.to_string()))?;
                let entry = package.lock.dependencies.get_mut(&name).unwrap();
                entry.sum = sum;
                entry.local_full_path = Some(path);
                continue;
            }

            if package.manifest.package.vendor {
                self.vendor(package)?;
            } else {
                self.add_dep_to_pkg(package, &name)?;
            }
            return Ok(Outcome::Refetched);
        }

        Ok(Outcome::Clean)
    }

    /// Brings a single dependency (and its transitive closure) into the
    /// global cache, recording the result in both manifest and lock.
    pub fn add_dep_to_pkg(&mut self, package: &mut Package, name: &str) -> Res<()> {
        // The manifest is the source of truth for intent (e.g. a tag bump);
        // the lock is only consulted for names the manifest doesn't carry at
        // all (a transitive dependency that's never been added directly).
        let d = package
            .manifest
            .dependencies
            .get(name)
            .cloned()
            .or_else(|| package.lock.get(name).cloned())
            .ok_or_else(|| Error::from(ErrorKind::InvalidDependency(name.to_string())))?;

        match package.manifest.dependencies.get(name) {
            Some(existing) if existing == &d => {}
            _ => package.manifest.add_dependency(d),
        }

        self.download_deps(&package.manifest.dependencies.clone(), &mut package.lock, &package.home_path)?;
        Ok(())
    }

    /// The transitive acquisition algorithm. Returns everything now
    /// concretely resolved for `deps` (and anything discovered beneath
    /// it), and records the same into `lock` as a side effect.
    ///
    /// `base` is the directory a relative `Source::Local` path among `deps`
    /// is resolved against — the project root for the top-level call, or
    /// the owning dependency's own directory for a recursive call over a
    /// child manifest's dependencies.
    ///
    /// Conflict resolution is first-writer-wins: once a name is recorded
    /// in the returned map, deeper requirements for that name are
    /// ignored. This is a known limitation, preserved deliberately rather
    /// than unified behind a version-selection pass.
    pub fn download_deps(
        &mut self,
        deps: &IndexMap<String, Dependency>,
        lock: &mut crate::package::lockfile::Lock,
        base: &Path,
    ) -> Res<IndexMap<String, Dependency>> {
        let mut new: IndexMap<String, Dependency> = IndexMap::new();

        for (name, d) in deps {
            d.validate()?;

            if let Some(locked) = lock.get(name) {
                if self.cache.exists_and_matches(locked) {
                    new.insert(name.clone(), locked.clone());
                    continue;
                }
            }

            let expected = lock.get(name).map(|l| l.sum.clone()).unwrap_or_default();
            let prior_full_name = lock.get(name).map(|l| l.full_name.clone());

            let full_name = if d.full_name.is_empty() {
                d.derive_full_name()
            } else {
                d.full_name.clone()
            };
            self.cache.remove(&full_name)?;
            let target_dir = self.cache.path(&full_name);

            let mut fetched = remote::fetch(d, &target_dir, base, self.registry, self.git, self.codec)?;
            let local_path = fetched
                .local_full_path
                .clone()
                .ok_or_else(|| Error::from(ErrorKind::InternalBugMsg(
                    "fetcher did not set local_full_path".to_string(),
                )))?;
            fetched.sum = hash_dir(&local_path)
                .with_context(|e| ErrorKind::CalSumFailed(e.to_string()))?;

            if !fetched.is_local()
                && !expected.is_empty()
                && fetched.sum != expected
                && prior_full_name.as_deref() == Some(fetched.full_name.as_str())
            {
                return Err(ErrorKind::CheckSumMismatch {
                    full_name: fetched.full_name.clone(),
                    expected,
                    found: fetched.sum.clone(),
                })?;
            }

            lock.insert(fetched.clone());
            new.insert(name.clone(), fetched);
        }

        let top_level: Vec<String> = new.keys().cloned().collect();
        for name in top_level {
            let dir = new.get(&name).and_then(|d| d.local_full_path.clone());
            let child_manifest = dir
                .as_ref()
                .and_then(|dir| crate::package::load_child_manifest(dir));
            if let Some(child_manifest) = child_manifest {
                let child_base = dir.unwrap();
                let nested = self.download_deps(&child_manifest.dependencies, lock, &child_base)?;
                for (n, dep) in nested {
                    new.entry(n).or_insert(dep);
                }
            }
        }

        Ok(new)
    }
}

/// A locked dependency "checks out" at `path` if it has a recorded sum
/// and that sum matches a fresh hash of the directory.
fn check(dep: &Dependency, path: &Path) -> bool {
    if dep.sum.is_empty() {
        return false;
    }
    hash_dir(path).map(|s| s == dep.sum).unwrap_or(false)
}
