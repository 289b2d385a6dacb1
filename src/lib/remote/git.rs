//! The Git source fetcher (component B, Git variant) and the default
//! `GitClient` collaborator, built on `git2` in the style of Cargo's own
//! git utilities.

use super::GitClient;
use crate::err::{Error, ErrorKind, Res};
use crate::package::{Dependency, Source};
use failure::ResultExt;
use std::path::Path;
use url::Url;

/// Materializes a Git-sourced dependency into `target_dir`.
pub fn fetch(dep: &Dependency, target_dir: &Path, git: &dyn GitClient) -> Res<Dependency> {
    let mut dep = dep.clone();
    let (url, tag) = match &dep.source {
        Source::Git { git, tag } => (git.clone(), tag.clone()),
        _ => unreachable!("git::fetch called with a non-Git dependency"),
    };

    git.clone(&url, &tag, target_dir)
        .with_context(|e| ErrorKind::FailedCloneFromGit(url.clone(), tag.clone(), e.to_string()))?;

    dep.version = tag;
    dep.local_full_path = Some(target_dir.to_path_buf());
    dep.refresh_full_name();

    Ok(dep)
}

pub struct DefaultGitClient;

impl GitClient for DefaultGitClient {
    /// Clones `url` into `into`, then checks out `tag` (a branch, tag, or
    /// commit ref). An empty `tag` leaves the repository on whatever ref
    /// the remote's default branch points to.
    fn clone(&self, url: &str, tag: &str, into: &Path) -> Res<()> {
        let parsed = Url::parse(url)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;

        let git_config = git2::Config::open_default().map_err(failure::Error::from)?;
        let opts = fetch_options(&git_config);

        let repo = git2::build::RepoBuilder::new()
            .fetch_options(opts)
            .clone(parsed.as_str(), into)
            .map_err(failure::Error::from)?;

        if !tag.is_empty() {
            checkout_ref(&repo, tag)?;
        }

        Ok(())
    }
}

fn checkout_ref(repo: &git2::Repository, refname: &str) -> Res<()> {
    let obj = repo
        .revparse_single(&format!("origin/{}", refname))
        .or_else(|_| repo.revparse_single(refname))
        .map_err(failure::Error::from)?;

    repo.checkout_tree(&obj, Some(git2::build::CheckoutBuilder::new().force()))
        .map_err(failure::Error::from)?;
    repo.set_head_detached(obj.id())
        .map_err(failure::Error::from)?;

    Ok(())
}

/// Builds fetch options carrying a credentials callback that tries, in
/// order: the URL's own credential helper, an ssh-agent key, and libgit2's
/// platform default. Good enough for anonymous clones and the common
/// credential-helper/ssh-agent cases; it does not attempt a full
/// multi-username ssh retry loop.
fn fetch_options<'a>(git_config: &'a git2::Config) -> git2::FetchOptions<'a> {
    let cfg = git_config.clone();
    let mut rcb = git2::RemoteCallbacks::new();
    rcb.credentials(move |request_url, username, allowed| {
        if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
            return git2::Cred::credential_helper(&cfg, request_url, username);
        }
        if allowed.contains(git2::CredentialType::SSH_KEY) {
            if let Some(user) = username {
                return git2::Cred::ssh_key_from_agent(user);
            }
        }
        git2::Cred::default()
    });

    let mut opts = git2::FetchOptions::new();
    opts.remote_callbacks(rcb)
        .download_tags(git2::AutotagOption::All);
    opts
}
