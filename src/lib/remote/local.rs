//! The Local source fetcher (component B, Local variant). There is no
//! acquisition step: the dependency already lives on disk.

use crate::err::Res;
use crate::package::Dependency;
use std::path::Path;

/// Binds `local_full_path` to the dependency's own `path`, resolved
/// against `base` when it isn't already absolute. Sum mismatches for
/// Local sources are never fatal; the Resolver simply recomputes `sum`
/// on every resolution.
pub fn fetch(dep: &Dependency, base: &Path) -> Res<Dependency> {
    let mut dep = dep.clone();
    let path = dep.local_path(base);

    dep.local_full_path = Some(path);
    dep.refresh_full_name();

    Ok(dep)
}
