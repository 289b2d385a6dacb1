//! Component D, the Manifest/Lock Store: parses, mutates, and persists
//! the two on-disk project files.

use super::lockfile::Lock;
use super::manifest::Manifest;
use super::Source;
use crate::config::{Settings, DEFAULT_KCL_OCI_MANIFEST_SUM, LOCK_FILE, MOD_FILE};
use crate::err::{ErrorKind, Res};
use crate::remote::OciRegistry;
use failure::ResultExt;
use std::fs;
use std::path::{Path, PathBuf};

/// The assembled state of a project: its intent, its concrete resolution,
/// and where on disk both live.
pub struct Package {
    pub manifest: Manifest,
    pub lock: Lock,
    pub home_path: PathBuf,
}

impl Package {
    /// Loads the manifest (required) and lock (optional) at `home_path`,
    /// then fills in registry defaults for any OCI dependency whose
    /// registry/repository are blank.
    pub fn load(home_path: &Path, settings: &Settings, registry: &dyn OciRegistry) -> Res<Self> {
        let manifest_path = home_path.join(MOD_FILE);
        let raw = fs::read_to_string(&manifest_path).context(ErrorKind::FailedLoadKclMod)?;
        let mut manifest: Manifest = raw.parse().context(ErrorKind::FailedLoadKclMod)?;

        fill_registry_defaults(&mut manifest, settings, registry);

        let lock = Lock::load(&home_path.join(LOCK_FILE))?;

        Ok(Package {
            manifest,
            lock,
            home_path: home_path.to_path_buf(),
        })
    }

    /// Atomically rewrites both the manifest and the lock to the current
    /// in-memory state. Failed resolves never call this, so the files on
    /// disk always reflect the last successful resolution.
    pub fn persist(&self) -> Res<()> {
        let manifest_raw = self.manifest.to_toml_string()?;
        let lock_raw = self.lock.to_toml_string()?;

        write_atomically(&self.home_path.join(MOD_FILE), &manifest_raw)?;
        write_atomically(&self.home_path.join(LOCK_FILE), &lock_raw)?;

        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &str) -> Res<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// For each OCI dependency with an empty `registry`, sets
/// `registry = settings.default_registry` and
/// `repository = <default_repo>/<name>`, then tries to seed `sum` from
/// the `DEFAULT_KCL_OCI_MANIFEST_SUM` annotation on the resolved
/// manifest, if the registry can be reached. A fresh clone of a project
/// can then start resolution already knowing a good sum, without having
/// fetched anything locally yet.
///
/// Failure to reach the registry here is not fatal: defaulting is a
/// best-effort convenience, not a correctness requirement (the sum will
/// simply be filled in for real on the first fetch).
fn fill_registry_defaults(manifest: &mut Manifest, settings: &Settings, registry: &dyn OciRegistry) {
    let names: Vec<String> = manifest.dependencies.keys().cloned().collect();
    for name in names {
        let needs_default = matches!(
            manifest.dependencies.get(&name).map(|d| &d.source),
            Some(Source::Oci { registry, .. }) if registry.is_empty()
        );
        if !needs_default {
            continue;
        }

        let repository = format!("{}/{}", settings.default_repo, name);
        let tag = manifest
            .dependencies
            .get(&name)
            .map(|d| d.source.tag().to_string())
            .unwrap_or_default();

        if let Some(dep) = manifest.dependencies.get_mut(&name) {
            dep.source = Source::Oci {
                registry: settings.default_registry.clone(),
                repository: repository.clone(),
                tag: tag.clone(),
            };
        }

        let seeded_sum = registry
            .fetch_manifest_json(&settings.default_registry, &repository, &tag)
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .and_then(|json| {
                json.get("annotations")
                    .and_then(|a| a.get(DEFAULT_KCL_OCI_MANIFEST_SUM))
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            });

        if let Some(sum) = seeded_sum {
            if let Some(dep) = manifest.dependencies.get_mut(&name) {
                dep.sum = sum;
            }
        }
    }
}
