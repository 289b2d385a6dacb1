//! Module `package/lockfile` deals with the concrete resolution recorded in
//! `kcl.mod.lock`.
//!
//! A missing lock file is not an error: it just means nothing has been
//! resolved yet (see `Lock::load`).

use super::Dependency;
use crate::err::{Error, ErrorKind, Res};
use failure::ResultExt;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// The concrete resolution of every dependency in the dependency graph,
/// keyed by name. Unlike the manifest, every entry here has `version`,
/// `full_name` and `sum` filled in.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Lock {
    #[serde(default)]
    pub dependencies: IndexMap<String, Dependency>,
}

impl Lock {
    /// Loads the lock at `path`, or an empty lock if the file does not
    /// exist yet.
    pub fn load(path: &Path) -> Res<Lock> {
        if !path.exists() {
            return Ok(Lock::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Lock::from_str(&raw)
    }

    pub fn to_toml_string(&self) -> Res<String> {
        toml::to_string_pretty(self)
            .map_err(failure::Error::from)
            .map_err(Error::from)
    }

    pub fn get(&self, name: &str) -> Option<&Dependency> {
        self.dependencies.get(name)
    }

    /// Records (or overwrites) the resolution for `dep.name`.
    pub fn insert(&mut self, dep: Dependency) {
        self.dependencies.insert(dep.name.clone(), dep);
    }
}

impl FromStr for Lock {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut lock: Lock = toml::from_str(raw)
            .context(ErrorKind::FailedLoadKclMod)
            .map_err(Error::from)?;
        super::sync_names(&mut lock.dependencies);
        Ok(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Source;

    #[test]
    fn missing_lockfile_is_not_an_error() {
        let lock = Lock::load(Path::new("/does/not/exist/kcl.mod.lock")).unwrap();
        assert!(lock.dependencies.is_empty());
    }

    #[test]
    fn valid_lockfile() {
        let lockfile = r#"
[dependencies.foo]
name = "foo"
version = "0.1.4"
registry = "ghcr.io"
repository = "kcl-lang/foo"
tag = "0.1.4"
full_name = "foo_0.1.4"
sum = "deadbeef"
"#;
        let parsed = Lock::from_str(lockfile).unwrap();
        assert_eq!(parsed.dependencies.len(), 1);
        assert_eq!(parsed.dependencies["foo"].sum, "deadbeef");
    }

    #[test]
    fn insert_overwrites_by_name() {
        let mut lock = Lock::default();
        let mut dep = Dependency::new(
            "foo",
            Source::Local {
                path: "/a".to_string(),
            },
        );
        dep.sum = "first".to_string();
        lock.insert(dep.clone());
        dep.sum = "second".to_string();
        lock.insert(dep);

        assert_eq!(lock.dependencies.len(), 1);
        assert_eq!(lock.get("foo").unwrap().sum, "second");
    }
}
