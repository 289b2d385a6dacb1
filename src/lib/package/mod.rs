//! Data structures related to packages: dependencies, manifests, locks.

pub mod lockfile;
pub mod manifest;
pub mod store;

use crate::err::{ErrorKind, Res};
use failure::ResultExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A single dependency entry, as it appears in either the manifest (intent)
/// or the lock (concrete resolution).
///
/// Exactly one of `source`'s variants is ever populated; `full_name` is a
/// pure function of `(name, version)`. `local_full_path` and `sum` start
/// empty and are filled in once the dependency has actually been acquired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    /// Not required on disk: entries are keyed by name in both the
    /// manifest and lock tables, so this is backfilled from the table
    /// key after parsing (see `sync_names`) rather than demanded in the
    /// TOML itself.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub full_name: String,
    #[serde(skip)]
    pub local_full_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sum: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, source: Source) -> Self {
        Dependency {
            name: name.into(),
            version: String::new(),
            source,
            full_name: String::new(),
            local_full_path: None,
            sum: String::new(),
        }
    }

    /// `<name>_<version>`, falling back to the literal string `latest` when
    /// no concrete version has been resolved yet. Stable and side-effect free.
    ///
    /// Prefers the tag already pinned on `source` over `self.version`: a
    /// manifest-only dependency has its tag in `source` (e.g. `Source::Oci
    /// { tag, .. }`) long before anything ever sets `version` (that only
    /// happens once a fetcher actually resolves it). Computing this from
    /// `version` alone would give a manifest-only OCI dep at tag `1.0.0`
    /// the pre-fetch full_name `name_latest`, while the fetcher's own
    /// post-fetch `refresh_full_name` call produces `name_1.0.0` for the
    /// very same dependency — two different basenames for one cache entry.
    pub fn derive_full_name(&self) -> String {
        let tag = self.source.tag();
        let version = if !tag.is_empty() {
            tag
        } else if !self.version.is_empty() {
            self.version.as_str()
        } else {
            "latest"
        };
        format!("{}_{}", self.name, version)
    }

    /// Recomputes and stores `full_name` from the current `(name, version)`.
    pub fn refresh_full_name(&mut self) {
        self.full_name = self.derive_full_name();
    }

    pub fn is_local(&self) -> bool {
        matches!(self.source, Source::Local { .. })
    }

    /// Resolves this dependency's `Source::Local` path against `base` when
    /// it isn't already absolute, per §3's "absolute or manifest-relative".
    /// Panics if called on a non-Local dependency.
    pub fn local_path(&self, base: &Path) -> PathBuf {
        match &self.source {
            Source::Local { path } => {
                let p = PathBuf::from(path);
                if p.is_absolute() {
                    p
                } else {
                    base.join(p)
                }
            }
            _ => unreachable!("local_path called on a non-Local dependency"),
        }
    }

    pub fn validate(&self) -> Res<()> {
        if self.name.trim().is_empty() {
            return Err(ErrorKind::InvalidDependency(self.name.clone()))?;
        }
        Ok(())
    }
}

/// The source a dependency is fetched from. Exactly one variant is ever
/// populated for a given `Dependency`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Oci {
        registry: String,
        repository: String,
        #[serde(default)]
        tag: String,
    },
    Git {
        git: String,
        #[serde(default)]
        tag: String,
    },
    Local {
        path: String,
    },
}

impl Source {
    pub fn tag(&self) -> &str {
        match self {
            Source::Oci { tag, .. } => tag,
            Source::Git { tag, .. } => tag,
            Source::Local { .. } => "",
        }
    }

    pub fn set_tag(&mut self, new_tag: String) {
        match self {
            Source::Oci { tag, .. } => *tag = new_tag,
            Source::Git { tag, .. } => *tag = new_tag,
            Source::Local { .. } => {}
        }
    }
}

/// Backfills each entry's `name` from its table key. Both the manifest and
/// lock key their dependency tables by name, so the TOML on disk never
/// needs to spell `name` out inside the table itself (it may, for past
/// lock files that did — the key always wins).
pub fn sync_names(deps: &mut indexmap::IndexMap<String, Dependency>) {
    for (key, dep) in deps.iter_mut() {
        dep.name = key.clone();
    }
}

/// Loads a dependency's own manifest from its resolved location, if any.
/// Not every dependency has one (e.g. a bare tarball of generated sources).
pub fn load_child_manifest(dir: &PathBuf) -> Option<manifest::Manifest> {
    let path = dir.join(crate::config::MOD_FILE);
    let contents = std::fs::read_to_string(path).ok()?;
    manifest::Manifest::from_str(&contents)
        .context(ErrorKind::FailedLoadKclMod)
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_is_pure_and_defaults_to_latest() {
        let mut dep = Dependency::new(
            "foo",
            Source::Oci {
                registry: "ghcr.io".into(),
                repository: "kcl-lang/foo".into(),
                tag: String::new(),
            },
        );
        assert_eq!(dep.derive_full_name(), "foo_latest");

        dep.version = "1.0.0".to_string();
        assert_eq!(dep.derive_full_name(), "foo_1.0.0");
        dep.refresh_full_name();
        assert_eq!(dep.full_name, "foo_1.0.0");
    }

    #[test]
    fn validate_rejects_empty_name() {
        let dep = Dependency::new(
            "",
            Source::Local {
                path: "/tmp".into(),
            },
        );
        assert!(dep.validate().is_err());
    }
}
