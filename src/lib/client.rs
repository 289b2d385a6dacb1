//! Component H, the Client Facade: the thin orchestrator that ties
//! hashing, fetching, caching, resolving, vendoring and packaging
//! together behind the handful of operations a CLI (or any other
//! frontend) actually needs.

use crate::compiler::{Compiler, ShellCompiler};
use crate::config::{Settings, LOCK_FILE, MOD_FILE};
use crate::err::{Error, ErrorKind, Res};
use crate::package::lockfile::Lock;
use crate::package::manifest::Manifest;
use crate::package::store::Package;
use crate::package::{Dependency, Source};
use crate::remote::git::DefaultGitClient;
use crate::remote::oci::DefaultOciRegistry;
use crate::remote::tar::DefaultTarCodec;
use crate::remote::{GitClient, OciRegistry, TarCodec};
use crate::resolve::Resolver;
use crate::retrieve::Cache;
use crate::util::{Shell, Verbosity};
use slog::Logger;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Options accepted by `compile_with_opts`, mirroring what a `run`/
/// `compile` CLI subcommand would collect from its arguments.
#[derive(Default)]
pub struct CompileOpts {
    pub vendor: Option<bool>,
    pub entries: Vec<String>,
}

pub struct Client {
    settings: Settings,
    cache: Cache,
    registry: Box<dyn OciRegistry>,
    git: Box<dyn GitClient>,
    codec: Box<dyn TarCodec>,
    compiler: Box<dyn Compiler>,
    shell: Shell,
    logger: Logger,
}

impl Client {
    pub fn new(settings: Settings, logger: Logger) -> Res<Self> {
        let cache = Cache::new(settings.kpm_home.clone(), logger.clone())?;
        let credentials_path = settings.kpm_home.join("credentials.toml");

        Ok(Client {
            settings,
            cache,
            registry: Box::new(DefaultOciRegistry::new(credentials_path)),
            git: Box::new(DefaultGitClient),
            codec: Box::new(DefaultTarCodec),
            compiler: Box::new(ShellCompiler::default()),
            shell: Shell::new(Verbosity::Normal),
            logger,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn load_package(&self, path: &Path) -> Res<Package> {
        Package::load(path, &self.settings, self.registry.as_ref())
    }

    /// Runs `f` with the cache's advisory lock held for its whole duration,
    /// per §4.C/§5: any resolver invocation that may mutate the cache must
    /// hold the lock across the entire pass, not just around each fetch.
    fn with_cache_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> Res<T>) -> Res<T> {
        self.cache.acquire_lock()?;
        let result = f(self);
        self.cache.release_lock();
        result
    }

    fn resolve(&mut self, package: &mut Package, update: bool) -> Res<()> {
        self.with_cache_lock(|this| {
            let mut resolver = Resolver::new(
                &mut this.cache,
                this.registry.as_ref(),
                this.git.as_ref(),
                this.codec.as_ref(),
                this.logger.clone(),
            );
            resolver.resolve(package, update)
        })
    }

    /// Creates the manifest, lock, and a default entry file, each only if
    /// absent. An existing file is logged, not treated as an error.
    pub fn init_empty(&self, path: &Path) -> Res<()> {
        fs::create_dir_all(path)?;

        let manifest_path = path.join(MOD_FILE);
        if manifest_path.exists() {
            self.shell
                .status("exists", format!("{}", manifest_path.display()));
        } else {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("project")
                .to_string();
            fs::write(&manifest_path, Manifest::new(name).to_toml_string()?)?;
            self.shell
                .status("created", format!("{}", manifest_path.display()));
        }

        let lock_path = path.join(LOCK_FILE);
        if lock_path.exists() {
            self.shell.status("exists", format!("{}", lock_path.display()));
        } else {
            fs::write(&lock_path, Lock::default().to_toml_string()?)?;
            self.shell.status("created", format!("{}", lock_path.display()));
        }

        let entry_path = path.join("main.k");
        if entry_path.exists() {
            self.shell.status("exists", format!("{}", entry_path.display()));
        } else {
            fs::write(&entry_path, "")?;
            self.shell.status("created", format!("{}", entry_path.display()));
        }

        Ok(())
    }

    /// Adds `dep` to the manifest and resolves it (and its transitive
    /// closure) into the lock.
    pub fn add(&mut self, path: &Path, dep: Dependency) -> Res<()> {
        let mut package = self.load_package(path)?;
        package.manifest.add_dependency(dep);
        self.resolve(&mut package, true)
    }

    /// Re-verifies (and refetches as needed) the entire dependency graph.
    pub fn update(&mut self, path: &Path) -> Res<()> {
        let mut package = self.load_package(path)?;
        self.resolve(&mut package, true)
    }

    /// Produces `<home>/<name>-<version>.tar`, optionally vendoring first.
    pub fn package(&mut self, path: &Path, vendor: bool) -> Res<PathBuf> {
        let mut package = self.load_package(path)?;
        if vendor {
            package.manifest.package.vendor = true;
        }
        self.resolve(&mut package, true)?;

        self.with_cache_lock(|this| {
            let mut resolver = Resolver::new(
                &mut this.cache,
                this.registry.as_ref(),
                this.git.as_ref(),
                this.codec.as_ref(),
                this.logger.clone(),
            );
            crate::pack::package(&mut resolver, &mut package)
        })
    }

    /// Packages the project and pushes the resulting TAR as an OCI
    /// artifact under `tag`.
    pub fn push(
        &mut self,
        path: &Path,
        registry: &str,
        repository: &str,
        tag: &str,
        annotations: HashMap<String, String>,
    ) -> Res<PathBuf> {
        let tar_path = self.package(path, false)?;
        self.registry
            .push(registry, repository, tag, &tar_path, &annotations)?;
        Ok(tar_path)
    }

    /// Adds (if not already present) and immediately fetches `dep`,
    /// without requiring a full `resolve` pass over the rest of the
    /// graph to be re-verified first.
    pub fn pull(&mut self, path: &Path, dep: Dependency) -> Res<()> {
        let mut package = self.load_package(path)?;
        let name = dep.name.clone();
        package.manifest.add_dependency(dep);

        self.with_cache_lock(|this| {
            let mut resolver = Resolver::new(
                &mut this.cache,
                this.registry.as_ref(),
                this.git.as_ref(),
                this.codec.as_ref(),
                this.logger.clone(),
            );
            resolver.add_dep_to_pkg(&mut package, &name)
        })?;
        package.persist()
    }

    pub fn login(&self, host: &str, user: &str, pass: &str) -> Res<()> {
        self.registry.login(host, user, pass)
    }

    pub fn logout(&self, host: &str) -> Res<()> {
        self.registry.logout(host)
    }

    /// Loads the package, resolves it, and hands the resolved dependency
    /// map plus entry sources to the compiler collaborator.
    ///
    /// Entry precedence: CLI-supplied entries win; otherwise the
    /// manifest's `entries`; otherwise the project path itself.
    pub fn compile_with_opts(&mut self, path: &Path, opts: CompileOpts) -> Res<String> {
        let mut package = self.load_package(path)?;
        if let Some(vendor) = opts.vendor {
            package.manifest.package.vendor = vendor;
        }

        fs::create_dir_all(&self.settings.kpm_home)?;
        self.resolve(&mut package, true)?;

        let entries = if !opts.entries.is_empty() {
            opts.entries
        } else if !package.manifest.package.entries.is_empty() {
            package.manifest.package.entries.clone()
        } else {
            vec![package.home_path.to_string_lossy().into_owned()]
        };

        let dependency_paths: HashMap<String, PathBuf> = package
            .lock
            .dependencies
            .values()
            .filter_map(|d| d.local_full_path.clone().map(|p| (d.name.clone(), p)))
            .collect();

        self.compiler.compile(
            &entries,
            &dependency_paths,
            &package.home_path,
            &package.manifest.profile.compile,
        )
    }

    /// Accepts either a full `oci://registry/repository` URL or a bare
    /// `<name>[:<tag>]` reference against the default registry/repo. If
    /// the reference form supplies a tag and `cli_tag` is also given, the
    /// reference's tag wins and an advisory is logged.
    pub fn parse_oci_option(&self, source: &str, cli_tag: Option<String>) -> Res<Dependency> {
        if source.contains("://") {
            let url = Url::parse(source).map_err(|_| Error::from(ErrorKind::IsNotUrl(source.to_string())))?;
            if url.scheme() != "oci" {
                return Err(ErrorKind::UrlSchemeNotOci(source.to_string()))?;
            }
            let registry = url
                .host_str()
                .ok_or_else(|| Error::from(ErrorKind::IsNotUrl(source.to_string())))?
                .to_string();
            let repository = url.path().trim_start_matches('/').to_string();
            if repository.is_empty() {
                return Err(ErrorKind::IsNotUrl(source.to_string()))?;
            }
            let name = repository
                .rsplit('/')
                .next()
                .unwrap_or(&repository)
                .to_string();

            return Ok(Dependency::new(
                name,
                Source::Oci {
                    registry,
                    repository,
                    tag: cli_tag.unwrap_or_default(),
                },
            ));
        }

        let mut parts = source.splitn(2, ':');
        let name = parts.next().unwrap_or("").to_string();
        if name.trim().is_empty() {
            return Err(ErrorKind::IsNotRef(source.to_string()))?;
        }
        let ref_tag = parts.next().map(|s| s.to_string());

        let resolved_tag = match (&ref_tag, &cli_tag) {
            (Some(rt), Some(_)) => {
                self.shell.warn(format!(
                    "{} already specifies a tag; ignoring --tag",
                    ErrorKind::InvalidFlag(source.to_string())
                ));
                rt.clone()
            }
            (Some(rt), None) => rt.clone(),
            (None, Some(ct)) => ct.clone(),
            (None, None) => String::new(),
        };

        Ok(Dependency::new(
            name.clone(),
            Source::Oci {
                registry: self.settings.default_registry.clone(),
                repository: format!("{}/{}", self.settings.default_repo, name),
                tag: resolved_tag,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::build_logger;
    use tempdir::TempDir;

    fn client(home: &Path) -> Client {
        let settings = Settings::default().with_kpm_home(home.to_path_buf());
        Client::new(settings, build_logger(false)).unwrap()
    }

    #[test]
    fn init_empty_creates_files_once() {
        let project = TempDir::new("kpm-client-init").unwrap();
        let cache_home = TempDir::new("kpm-client-cache").unwrap();
        let c = client(cache_home.path());

        c.init_empty(project.path()).unwrap();
        assert!(project.path().join(MOD_FILE).exists());
        assert!(project.path().join(LOCK_FILE).exists());
        assert!(project.path().join("main.k").exists());

        // Second call should not error even though everything exists.
        c.init_empty(project.path()).unwrap();
    }

    #[test]
    fn parse_oci_option_handles_ref_form() {
        let cache_home = TempDir::new("kpm-client-cache2").unwrap();
        let c = client(cache_home.path());

        let dep = c.parse_oci_option("foo:1.0.0", None).unwrap();
        assert_eq!(dep.name, "foo");
        match dep.source {
            Source::Oci { tag, .. } => assert_eq!(tag, "1.0.0"),
            _ => panic!("expected oci source"),
        }
    }

    #[test]
    fn parse_oci_option_ref_tag_wins_over_cli_tag() {
        let cache_home = TempDir::new("kpm-client-cache3").unwrap();
        let c = client(cache_home.path());

        let dep = c
            .parse_oci_option("foo:1.0.0", Some("2.0.0".to_string()))
            .unwrap();
        match dep.source {
            Source::Oci { tag, .. } => assert_eq!(tag, "1.0.0"),
            _ => panic!("expected oci source"),
        }
    }

    #[test]
    fn parse_oci_option_handles_full_url() {
        let cache_home = TempDir::new("kpm-client-cache4").unwrap();
        let c = client(cache_home.path());

        let dep = c
            .parse_oci_option("oci://ghcr.io/kcl-lang/foo", Some("1.0.0".to_string()))
            .unwrap();
        assert_eq!(dep.name, "foo");
        match dep.source {
            Source::Oci {
                registry,
                repository,
                tag,
            } => {
                assert_eq!(registry, "ghcr.io");
                assert_eq!(repository, "kcl-lang/foo");
                assert_eq!(tag, "1.0.0");
            }
            _ => panic!("expected oci source"),
        }
    }
}
