//! Component F, the Vendor Engine: materializes a project-local,
//! self-contained `<home>/vendor/` tree from the current lock.
//!
//! Implemented as a method on `Resolver` rather than a free function
//! because refreshing a stale entry needs the same fetch machinery as
//! the global-cache path (`add_dep_to_pkg`).

use super::{check, Resolver};
use crate::err::{Error, ErrorKind, Res};
use crate::package::store::Package;
use crate::package::Dependency;
use crate::util::{clear_dir, copy_dir};
use std::collections::HashSet;
use std::fs;

impl<'a> Resolver<'a> {
    /// Materializes every lock entry into `<home>/vendor/<full_name>`.
    ///
    /// A refetch during the pass restarts it from scratch: the snapshot
    /// taken at entry can grow (transitive deps discovered mid-refetch),
    /// so there's no way to pick up where a partial pass left off.
    pub fn vendor(&mut self, package: &mut Package) -> Res<()> {
        let vendor_root = package.home_path.join(crate::config::VENDOR_DIR);
        fs::create_dir_all(&vendor_root)?;

        'restart: loop {
            self.prune_removed_entries(package, &vendor_root)?;

            let snapshot: Vec<Dependency> = package.lock.dependencies.values().cloned().collect();

            for d in &snapshot {
                let vendor_dir = vendor_root.join(&d.full_name);

                if vendor_dir.exists() && check(d, &vendor_dir) {
                    continue;
                }

                let cache_dir = self.cache.path(&d.full_name);
                if cache_dir.exists() && check(d, &cache_dir) {
                    clear_dir(&vendor_dir)?;
                    copy_dir(&cache_dir, &vendor_dir)?;
                    continue;
                }

                if d.is_local() {
                    let source_path = d.local_path(&package.home_path);
                    if source_path.exists() && check(d, &source_path) {
                        clear_dir(&vendor_dir)?;
                        copy_dir(&source_path, &vendor_dir)?;
                        continue;
                    }
                }

                self.add_dep_to_pkg(package, &d.name).map_err(|e| {
                    Error::from(ErrorKind::FailedToVendorDependency(
                        d.name.clone(),
                        e.to_string(),
                    ))
                })?;
                continue 'restart;
            }

            return Ok(());
        }
    }

    /// Removes vendor entries whose dependency is no longer in the lock
    /// (e.g. dropped from the manifest and already reconciled out).
    fn prune_removed_entries(&self, package: &Package, vendor_root: &std::path::Path) -> Res<()> {
        let live: HashSet<String> = package
            .lock
            .dependencies
            .values()
            .map(|d| d.full_name.clone())
            .collect();

        if !vendor_root.exists() {
            return Ok(());
        }

        for entry in fs::read_dir(vendor_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if !live.contains(&name) {
                    remove_dir_all::remove_dir_all(entry.path())?;
                }
            }
        }

        Ok(())
    }
}
