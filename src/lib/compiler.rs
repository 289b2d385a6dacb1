//! The compiler collaborator: opaque to the resolver, invoked only with
//! the resolved dependency map, entry files, and a working directory.
//!
//! Shells out to an external binary rather than linking a compiler
//! in-process.

use crate::err::{Error, ErrorKind, Res};
use failure::ResultExt;
use itertools::Itertools;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

/// `{dependency_name → absolute_directory}` plus the entries and options
/// the downstream compiler needs.
pub trait Compiler {
    fn compile(
        &self,
        entries: &[String],
        dependency_paths: &HashMap<String, PathBuf>,
        cwd: &Path,
        opts: &[String],
    ) -> Res<String>;
}

/// Shells out to a `kcl` binary on `PATH`, passing resolved dependency
/// directories as `-D name=path` arguments.
pub struct ShellCompiler {
    pub program: String,
}

impl Default for ShellCompiler {
    fn default() -> Self {
        ShellCompiler {
            program: "kcl".to_string(),
        }
    }
}

impl Compiler for ShellCompiler {
    fn compile(
        &self,
        entries: &[String],
        dependency_paths: &HashMap<String, PathBuf>,
        cwd: &Path,
        opts: &[String],
    ) -> Res<String> {
        let mut args: Vec<String> = entries.to_vec();
        args.extend(opts.iter().cloned());
        for (name, path) in dependency_paths {
            args.push("-D".to_string());
            args.push(format!("{}={}", name, path.display()));
        }

        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(cwd)
            .output()
            .with_context(|e| {
                ErrorKind::InternalBugMsg(format!(
                    "failed to spawn compiler `{} {}`: {}",
                    self.program,
                    args.iter().join(" "),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ErrorKind::InternalBugMsg(format!(
                "compiler exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ))
            .into());
        }

        String::from_utf8(output.stdout)
            .map_err(failure::Error::from)
            .map_err(Error::from)
    }
}
