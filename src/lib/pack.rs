//! Component G, the Packager: produces a distributable TAR of the
//! current project.

use crate::err::{Error, ErrorKind, Res};
use crate::package::store::Package;
use crate::resolve::Resolver;
use std::fs::File;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Produces `<home>/<name>-<version>.tar`. If the project is in vendor
/// mode, materializes the vendor tree first so the archive is
/// self-contained.
pub fn package(resolver: &mut Resolver, package: &mut Package) -> Res<PathBuf> {
    if package.manifest.package.vendor {
        resolver.vendor(package)?;
    }

    let out_path = package.home_path.join(format!(
        "{}-{}.tar",
        package.manifest.package.name, package.manifest.package.version
    ));

    archive(&package.home_path, &out_path)
        .map_err(|e| Error::from(ErrorKind::FailedToPackage(e.to_string())))?;

    Ok(out_path)
}

fn archive(home: &std::path::Path, out_path: &std::path::Path) -> Res<()> {
    let file = File::create(out_path)?;
    let mut builder = tar::Builder::new(file);

    let entries = WalkDir::new(home)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            let s = e.path().to_string_lossy();
            !s.contains(".git") && !s.contains(".tar")
        });

    for entry in entries {
        let rel = entry.path().strip_prefix(home).unwrap();
        builder
            .append_path_with_name(entry.path(), rel)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;
    }

    builder
        .finish()
        .map_err(failure::Error::from)
        .map_err(Error::from)?;

    Ok(())
}
