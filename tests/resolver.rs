//! Integration tests covering the resolver's core scenarios: fresh OCI
//! add, checksum drift, tag bump, transitive add, vendor round-trip, and
//! local source mutation.
//!
//! A flat integration-test file with inline fixtures; no `tests/data/` on
//! disk since every fixture here is constructed at runtime in a `TempDir`.

use kpm::err::ErrorKind;
use kpm::package::lockfile::Lock;
use kpm::package::manifest::Manifest;
use kpm::package::store::Package;
use kpm::package::{Dependency, Source};
use kpm::remote::{GitClient, OciRegistry, TarCodec};
use kpm::resolve::Resolver;
use kpm::retrieve::Cache;
use kpm::util::build_logger;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempdir::TempDir;

/// Serves a fixed set of `(repository, tag) -> file contents` pairs as
/// single-file OCI artifacts, packed into a real TAR so the fetcher's
/// untar step is exercised for real.
struct FakeOciRegistry {
    packages: HashMap<String, HashMap<String, String>>,
}

impl FakeOciRegistry {
    fn new() -> Self {
        FakeOciRegistry {
            packages: HashMap::new(),
        }
    }

    fn with_package(mut self, repository: &str, tag: &str, contents: &str) -> Self {
        self.packages
            .entry(repository.to_string())
            .or_default()
            .insert(tag.to_string(), contents.to_string());
        self
    }
}

impl OciRegistry for FakeOciRegistry {
    fn pull(&self, _registry: &str, repository: &str, tag: &str, target_dir: &Path) -> kpm::err::Res<()> {
        let contents = self
            .packages
            .get(repository)
            .and_then(|tags| tags.get(tag))
            .unwrap_or_else(|| panic!("no fixture for {}:{}", repository, tag));

        let src = TempDir::new("kpm-fake-oci-src").unwrap();
        fs::write(src.path().join("main.k"), contents).unwrap();

        fs::create_dir_all(target_dir)?;
        let tar_path = target_dir.join("layer-0.tar");
        let codec = kpm::remote::tar::DefaultTarCodec;
        codec.pack(src.path(), &tar_path)
    }

    fn push(
        &self,
        _registry: &str,
        _repository: &str,
        _tag: &str,
        _local_path: &Path,
        _annotations: &HashMap<String, String>,
    ) -> kpm::err::Res<()> {
        unimplemented!("not exercised by these tests")
    }

    fn list_tags(&self, _registry: &str, repository: &str) -> kpm::err::Res<Vec<String>> {
        Ok(self
            .packages
            .get(repository)
            .map(|tags| tags.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn contains_tag(&self, _registry: &str, repository: &str, tag: &str) -> kpm::err::Res<bool> {
        Ok(self
            .packages
            .get(repository)
            .map(|tags| tags.contains_key(tag))
            .unwrap_or(false))
    }

    fn fetch_manifest_json(&self, _registry: &str, _repository: &str, _tag: &str) -> kpm::err::Res<String> {
        Ok("{}".to_string())
    }

    fn login(&self, _host: &str, _user: &str, _pass: &str) -> kpm::err::Res<()> {
        unimplemented!()
    }

    fn logout(&self, _host: &str) -> kpm::err::Res<()> {
        unimplemented!()
    }
}

struct UnreachableGit;
impl GitClient for UnreachableGit {
    fn clone(&self, _url: &str, _tag: &str, _into: &Path) -> kpm::err::Res<()> {
        panic!("no git access expected in this test")
    }
}

fn oci_dep(name: &str, repository: &str, tag: &str) -> Dependency {
    Dependency::new(
        name,
        Source::Oci {
            registry: "registry.example".to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
        },
    )
}

fn fresh_package(home: &Path) -> Package {
    Package {
        manifest: Manifest::new("proj"),
        lock: Lock::default(),
        home_path: home.to_path_buf(),
    }
}

/// Scenario 1: fresh add of an OCI dependency against an empty lock.
#[test]
fn fresh_add_oci_populates_cache_and_lock() {
    let home = TempDir::new("kpm-scn1-home").unwrap();
    let cache_root = TempDir::new("kpm-scn1-cache").unwrap();

    let mut package = fresh_package(home.path());
    package
        .manifest
        .add_dependency(oci_dep("a", "r/a", "1.0.0"));

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let registry = FakeOciRegistry::new().with_package("r/a", "1.0.0", "x = 1");
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;
    let mut resolver = Resolver::new(&mut cache, &registry, &git, &codec, build_logger(false));

    resolver.resolve(&mut package, true).unwrap();

    let locked = package.lock.get("a").unwrap();
    assert_eq!(locked.full_name, "a_1.0.0");
    assert!(!locked.sum.is_empty());
    assert!(cache_root.path().join("a_1.0.0").exists());
    assert!(package.manifest.dependencies.contains_key("a"));
}

/// Scenario 2: a re-fetch of the same `full_name` that hashes differently
/// than the recorded sum is a `CheckSumMismatch`, and the lock on disk is
/// left untouched.
#[test]
fn checksum_drift_on_same_full_name_is_an_error() {
    let home = TempDir::new("kpm-scn2-home").unwrap();
    let cache_root = TempDir::new("kpm-scn2-cache").unwrap();

    let mut package = fresh_package(home.path());
    let mut dep = oci_dep("a", "r/a", "1.0.0");
    dep.full_name = "a_1.0.0".to_string();
    dep.sum = "AAA-not-the-real-hash".to_string();
    package.manifest.add_dependency(dep.clone());
    package.lock.insert(dep);
    package.persist().unwrap();

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let registry = FakeOciRegistry::new().with_package("r/a", "1.0.0", "brand new content");
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;
    let mut resolver = Resolver::new(&mut cache, &registry, &git, &codec, build_logger(false));

    let err = resolver.resolve(&mut package, true).unwrap_err();
    match err.kind() {
        ErrorKind::CheckSumMismatch { full_name, .. } => assert_eq!(full_name, "a_1.0.0"),
        other => panic!("expected CheckSumMismatch, got {:?}", other),
    }

    let raw = fs::read_to_string(home.path().join(kpm::config::LOCK_FILE)).unwrap();
    assert!(raw.contains("AAA-not-the-real-hash"));
}

/// Scenario 3: bumping the manifest's tag fetches into a new full_name and
/// never compares against the old sum.
#[test]
fn tag_bump_fetches_new_full_name_without_mismatch() {
    let home = TempDir::new("kpm-scn3-home").unwrap();
    let cache_root = TempDir::new("kpm-scn3-cache").unwrap();

    let mut package = fresh_package(home.path());
    let mut old = oci_dep("a", "r/a", "1.0.0");
    old.full_name = "a_1.0.0".to_string();
    old.sum = "whatever-the-old-sum-was".to_string();
    package.lock.insert(old);
    package.manifest.add_dependency(oci_dep("a", "r/a", "2.0.0"));

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let registry = FakeOciRegistry::new().with_package("r/a", "2.0.0", "v2 contents");
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;
    let mut resolver = Resolver::new(&mut cache, &registry, &git, &codec, build_logger(false));

    resolver.resolve(&mut package, true).unwrap();

    let locked = package.lock.get("a").unwrap();
    assert_eq!(locked.full_name, "a_2.0.0");
    assert!(cache_root.path().join("a_2.0.0").exists());
}

/// Scenario 4: a dependency whose own manifest declares a further
/// (Local) dependency is discovered transitively and lands in the lock,
/// while the top-level manifest keeps listing only the direct dependency.
#[test]
fn transitive_dependency_is_discovered_and_locked() {
    let home = TempDir::new("kpm-scn4-home").unwrap();
    let cache_root = TempDir::new("kpm-scn4-cache").unwrap();
    let b_src = TempDir::new("kpm-scn4-b").unwrap();
    fs::write(b_src.path().join("main.k"), "b = 1").unwrap();

    let child_manifest = format!(
        "[package]\nname = \"a\"\nversion = \"1.0.0\"\n\n[dependencies.b]\nname = \"b\"\npath = \"{}\"\n",
        b_src.path().to_string_lossy()
    );

    let mut package = fresh_package(home.path());
    package
        .manifest
        .add_dependency(oci_dep("a", "r/a", "1.0.0"));

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;

    // `a`'s package needs to carry a `kcl.mod` declaring `b`, which the
    // single-file `FakeOciRegistry` fixture above can't express; pack one
    // by hand instead.
    let pull_dir = TempDir::new("kpm-scn4-pull-src").unwrap();
    fs::write(pull_dir.path().join("main.k"), "a = 1").unwrap();
    fs::write(pull_dir.path().join("kcl.mod"), &child_manifest).unwrap();

    struct PackagedOciRegistry {
        src: std::path::PathBuf,
    }
    impl OciRegistry for PackagedOciRegistry {
        fn pull(&self, _: &str, _: &str, _: &str, target_dir: &Path) -> kpm::err::Res<()> {
            fs::create_dir_all(target_dir)?;
            let codec = kpm::remote::tar::DefaultTarCodec;
            codec.pack(&self.src, &target_dir.join("layer-0.tar"))
        }
        fn push(&self, _: &str, _: &str, _: &str, _: &Path, _: &HashMap<String, String>) -> kpm::err::Res<()> {
            unimplemented!()
        }
        fn list_tags(&self, _: &str, _: &str) -> kpm::err::Res<Vec<String>> {
            Ok(vec!["1.0.0".to_string()])
        }
        fn contains_tag(&self, _: &str, _: &str, _: &str) -> kpm::err::Res<bool> {
            Ok(true)
        }
        fn fetch_manifest_json(&self, _: &str, _: &str, _: &str) -> kpm::err::Res<String> {
            Ok("{}".to_string())
        }
        fn login(&self, _: &str, _: &str, _: &str) -> kpm::err::Res<()> {
            unimplemented!()
        }
        fn logout(&self, _: &str) -> kpm::err::Res<()> {
            unimplemented!()
        }
    }
    let packaged_registry = PackagedOciRegistry {
        src: pull_dir.path().to_path_buf(),
    };

    let mut resolver = Resolver::new(&mut cache, &packaged_registry, &git, &codec, build_logger(false));
    resolver.resolve(&mut package, true).unwrap();

    assert!(package.lock.get("a").is_some());
    assert!(package.lock.get("b").is_some());
    assert_eq!(package.manifest.dependencies.len(), 1);
    assert!(package.manifest.dependencies.contains_key("a"));
}

/// Scenario 5: vendor-mode resolution materializes every lock entry under
/// `<home>/vendor/`, and removing a dependency from the manifest prunes
/// its vendor directory and lock entry on the next resolve.
#[test]
fn vendor_round_trip_materializes_and_prunes() {
    let home = TempDir::new("kpm-scn5-home").unwrap();
    let cache_root = TempDir::new("kpm-scn5-cache").unwrap();

    let mut package = fresh_package(home.path());
    package.manifest.package.vendor = true;
    package
        .manifest
        .add_dependency(oci_dep("a", "r/a", "1.0.0"));
    package
        .manifest
        .add_dependency(oci_dep("b", "r/b", "1.0.0"));

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let registry = FakeOciRegistry::new()
        .with_package("r/a", "1.0.0", "a contents")
        .with_package("r/b", "1.0.0", "b contents");
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;
    let mut resolver = Resolver::new(&mut cache, &registry, &git, &codec, build_logger(false));

    resolver.resolve(&mut package, true).unwrap();

    let vendor_root = home.path().join("vendor");
    assert!(vendor_root.join("a_1.0.0").exists());
    assert!(vendor_root.join("b_1.0.0").exists());

    package.manifest.dependencies.shift_remove("a");
    resolver.resolve(&mut package, true).unwrap();

    assert!(!vendor_root.join("a_1.0.0").exists());
    assert!(vendor_root.join("b_1.0.0").exists());
    assert!(package.lock.get("a").is_none());
}

/// Scenario 6: a Local dependency's sum is silently refreshed on content
/// change; it is never a checksum-mismatch error.
#[test]
fn local_dependency_sum_refreshes_silently() {
    let home = TempDir::new("kpm-scn6-home").unwrap();
    let cache_root = TempDir::new("kpm-scn6-cache").unwrap();
    let local_src = TempDir::new("kpm-scn6-local").unwrap();
    fs::write(local_src.path().join("main.k"), "x = 1").unwrap();

    let mut package = fresh_package(home.path());
    package.manifest.add_dependency(Dependency::new(
        "l",
        Source::Local {
            path: local_src.path().to_string_lossy().into_owned(),
        },
    ));

    let mut cache = Cache::new(cache_root.path().to_path_buf(), build_logger(false)).unwrap();
    let registry = FakeOciRegistry::new();
    let git = UnreachableGit;
    let codec = kpm::remote::tar::DefaultTarCodec;
    let mut resolver = Resolver::new(&mut cache, &registry, &git, &codec, build_logger(false));

    resolver.resolve(&mut package, true).unwrap();
    let first_sum = package.lock.get("l").unwrap().sum.clone();

    fs::write(local_src.path().join("main.k"), "x = 2").unwrap();
    resolver.resolve(&mut package, true).unwrap();
    let second_sum = package.lock.get("l").unwrap().sum.clone();

    assert_ne!(first_sum, second_sum);
}
