//! Pluggable source fetchers: OCI registries, Git repositories, and the
//! local filesystem.
//!
//! Each variant-specific module exposes a `fetch` free function with the
//! uniform contract from the top-level design: populate `target_dir` with
//! raw package contents and return the dependency with tag, `full_name`
//! and `local_full_path` normalized. The actual protocol/codec work is
//! delegated to the `OciRegistry`, `GitClient` and `TarCodec` traits below
//! so the fetch logic itself stays independent of wire formats.

pub mod git;
pub mod local;
pub mod oci;
pub mod tar;

use crate::err::Res;
use crate::package::{Dependency, Source};
use std::collections::HashMap;
use std::path::Path;

/// The OCI registry collaborator: pull/push artifacts, list and resolve
/// tags, and fetch raw manifest JSON.
pub trait OciRegistry {
    fn pull(&self, registry: &str, repository: &str, tag: &str, target_dir: &Path) -> Res<()>;
    fn push(
        &self,
        registry: &str,
        repository: &str,
        tag: &str,
        local_path: &Path,
        annotations: &HashMap<String, String>,
    ) -> Res<()>;
    fn list_tags(&self, registry: &str, repository: &str) -> Res<Vec<String>>;
    fn contains_tag(&self, registry: &str, repository: &str, tag: &str) -> Res<bool>;
    fn fetch_manifest_json(&self, registry: &str, repository: &str, tag: &str) -> Res<String>;
    fn login(&self, host: &str, user: &str, pass: &str) -> Res<()>;
    fn logout(&self, host: &str) -> Res<()>;
}

/// The Git collaborator: clone a URL at a ref into a directory.
pub trait GitClient {
    fn clone(&self, url: &str, tag: &str, into: &Path) -> Res<()>;
}

/// The TAR archive collaborator.
pub trait TarCodec {
    fn pack(&self, dir: &Path, archive: &Path) -> Res<()>;
    fn unpack(&self, archive: &Path, into: &Path) -> Res<()>;
}

/// Dispatches to the appropriate fetcher based on `dep.source`. `base` is
/// the directory a relative `Source::Local` path is resolved against; it
/// is ignored for the OCI and Git variants.
pub fn fetch(
    dep: &Dependency,
    target_dir: &Path,
    base: &Path,
    registry: &dyn OciRegistry,
    git: &dyn GitClient,
    codec: &dyn TarCodec,
) -> Res<Dependency> {
    match &dep.source {
        Source::Oci { .. } => self::oci::fetch(dep, target_dir, registry, codec),
        Source::Git { .. } => self::git::fetch(dep, target_dir, git),
        Source::Local { .. } => self::local::fetch(dep, base),
    }
}
