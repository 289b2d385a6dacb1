//! Module `package/manifest` deals with the project manifest (`kcl.mod`).

use super::Dependency;
use crate::err::{Error, ErrorKind, Res};
use failure::ResultExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The project manifest: intent, not concrete resolution.
///
/// `dependencies` is an ordered map keyed by name; inserting the same name
/// twice overwrites the earlier entry (see `add_dependency`).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Manifest {
    pub package: PackageMeta,
    #[serde(default)]
    pub profile: Profile,
    #[serde(default)]
    pub dependencies: IndexMap<String, Dependency>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PackageMeta {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Entry source files compiled by the downstream compiler collaborator.
    #[serde(default)]
    pub entries: Vec<String>,
    /// When set, `resolve` materializes dependencies under `<home>/vendor`
    /// instead of the global cache.
    #[serde(default)]
    pub vendor: bool,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Options forwarded verbatim to the compiler collaborator.
    #[serde(default)]
    pub compile: Vec<String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>) -> Self {
        Manifest {
            package: PackageMeta {
                name: name.into(),
                version: default_version(),
                entries: vec![],
                vendor: false,
            },
            profile: Profile::default(),
            dependencies: IndexMap::new(),
        }
    }

    /// Adds or overwrites a dependency by name, per the "keyed by name;
    /// adding the same name overwrites" invariant.
    pub fn add_dependency(&mut self, dep: Dependency) {
        self.dependencies.insert(dep.name.clone(), dep);
    }

    pub fn to_toml_string(&self) -> Res<String> {
        toml::to_string_pretty(self)
            .map_err(failure::Error::from)
            .map_err(Error::from)
    }
}

impl FromStr for Manifest {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut manifest: Manifest = toml::from_str(raw)
            .context(ErrorKind::FailedLoadKclMod)
            .map_err(Error::from)?;
        super::sync_names(&mut manifest.dependencies);
        Ok(manifest)
    }
}
