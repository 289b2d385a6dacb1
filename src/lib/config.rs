//! Explicit runtime configuration for `kpm`.
//!
//! Earlier revisions kept this kind of thing behind a global, lazily
//! initialized singleton. That made testing two `Client`s with different
//! home directories in the same process impossible, so `Settings` is just a
//! plain value that the caller builds once (usually in `main`) and threads
//! through `Client::new`.

use directories::BaseDirs;
use std::{env, path::PathBuf};

pub const MOD_FILE: &str = "kcl.mod";
pub const LOCK_FILE: &str = "kcl.mod.lock";
pub const VENDOR_DIR: &str = "vendor";
pub const DEFAULT_KCL_OCI_MANIFEST_SUM: &str = "DEFAULT_KCL_OCI_MANIFEST_SUM";

/// Settings that change the behavior of the resolution/acquisition engine.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the global package cache (`KPM_HOME`, or `<home>/.kpm`).
    pub kpm_home: PathBuf,
    /// Registry host used to fill in blank OCI registry fields.
    pub default_registry: String,
    /// Repository namespace used to fill in blank OCI repository fields.
    pub default_repo: String,
}

impl Settings {
    /// Build settings from the environment, following the same precedence
    /// the CLI has always used: `KPM_HOME` wins, otherwise `<user home>/.kpm`.
    pub fn from_env() -> Self {
        let kpm_home = match env::var_os("KPM_HOME") {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => BaseDirs::new()
                .map(|b| b.home_dir().join(".kpm"))
                .unwrap_or_else(|| PathBuf::from(".kpm")),
        };

        Settings {
            kpm_home,
            default_registry: "ghcr.io".to_string(),
            default_repo: "kcl-lang".to_string(),
        }
    }

    pub fn with_kpm_home(mut self, home: PathBuf) -> Self {
        self.kpm_home = home;
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::from_env()
    }
}
