//! The OCI source fetcher (component B, OCI variant) and the default
//! `OciRegistry` collaborator: a plain blocking `reqwest::Client` hitting
//! a JSON API, adapted to the OCI Distribution Specification's `/v2/`
//! surface.

use super::{OciRegistry, TarCodec};
use crate::err::{Error, ErrorKind, Res};
use crate::package::{Dependency, Source};
use failure::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Materializes an OCI-sourced dependency into `target_dir`.
pub fn fetch(
    dep: &Dependency,
    target_dir: &Path,
    registry: &dyn OciRegistry,
    codec: &dyn TarCodec,
) -> Res<Dependency> {
    let mut dep = dep.clone();
    let (reg, repo) = match &dep.source {
        Source::Oci {
            registry,
            repository,
            ..
        } => (registry.clone(), repository.clone()),
        _ => unreachable!("oci::fetch called with a non-OCI dependency"),
    };

    let requested_tag = dep.source.tag().to_string();
    let (resolved_tag, actual_dir) = if requested_tag.is_empty() {
        let tag = select_latest_tag(registry, &reg, &repo)?;
        let dir = PathBuf::from(format!("{}-{}", target_dir.display(), tag));
        (tag, dir)
    } else {
        (requested_tag, target_dir.to_path_buf())
    };

    fs::create_dir_all(&actual_dir)?;
    dep.source.set_tag(resolved_tag.clone());

    registry
        .pull(&reg, &repo, &resolved_tag, &actual_dir)
        .with_context(|e| ErrorKind::FailedPull(repo.clone(), e.to_string()))?;

    let tar_members: Vec<PathBuf> = fs::read_dir(&actual_dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "tar").unwrap_or(false))
        .collect();

    if tar_members.len() != 1 {
        return Err(ErrorKind::InvalidKclPkg(tar_members.len()))?;
    }
    let tar_path = &tar_members[0];

    codec
        .unpack(tar_path, &actual_dir)
        .with_context(|e| ErrorKind::FailedUntarKclPkg(e.to_string()))?;
    fs::remove_file(tar_path)?;

    dep.version = resolved_tag;
    dep.refresh_full_name();

    // `actual_dir` was named after the tag we *asked* for (empty, if the
    // caller didn't pin one), not the one we got back; `full_name` is keyed
    // off the tag we actually resolved. Move the unpacked tree onto the
    // basename the cache will look it up by from now on, so this fetch's
    // own result is findable on the very next lookup instead of looking
    // like a cache miss and getting pulled again.
    let final_dir = target_dir
        .parent()
        .map(|parent| parent.join(&dep.full_name))
        .unwrap_or_else(|| actual_dir.clone());
    if final_dir != actual_dir {
        if final_dir.exists() {
            remove_dir_all::remove_dir_all(&final_dir)?;
        }
        fs::rename(&actual_dir, &final_dir)?;
    }
    dep.local_full_path = Some(final_dir);

    Ok(dep)
}

/// Selects the "latest" tag: the lexicographically-highest semver-sorted
/// tag, falling back to plain lexicographic ordering for tags that don't
/// parse as semver (e.g. `latest`, branch-like tags).
fn select_latest_tag(registry: &dyn OciRegistry, reg: &str, repo: &str) -> Res<String> {
    let tags = registry.list_tags(reg, repo)?;

    let mut semver_tags: Vec<(semver::Version, &String)> = tags
        .iter()
        .filter_map(|t| {
            let trimmed = t.trim_start_matches('v');
            semver::Version::parse(trimmed).ok().map(|v| (v, t))
        })
        .collect();

    if !semver_tags.is_empty() {
        semver_tags.sort_by(|a, b| a.0.cmp(&b.0));
        return Ok(semver_tags.last().unwrap().1.clone());
    }

    tags.into_iter()
        .max()
        .ok_or_else(|| ErrorKind::FailedPull(repo.to_string(), "no tags found".to_string()).into())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct OciManifest {
    #[serde(rename = "schemaVersion", default)]
    schema_version: i64,
    #[serde(rename = "mediaType", default)]
    media_type: String,
    config: OciDescriptor,
    layers: Vec<OciDescriptor>,
    #[serde(default)]
    annotations: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct OciDescriptor {
    #[serde(rename = "mediaType")]
    media_type: String,
    digest: String,
    size: u64,
}

const OCI_MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
const OCI_LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar";
const OCI_CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";

/// Credentials persisted across `login`/`logout` calls, keyed by registry
/// host. Stored alongside the cache as an explicit value rather than in a
/// process-wide global.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
struct Credentials {
    #[serde(default)]
    hosts: HashMap<String, (String, String)>,
}

pub struct DefaultOciRegistry {
    client: reqwest::blocking::Client,
    credentials_path: PathBuf,
}

impl DefaultOciRegistry {
    pub fn new(credentials_path: PathBuf) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");
        DefaultOciRegistry {
            client,
            credentials_path,
        }
    }

    fn base_url(&self, registry: &str, repository: &str) -> String {
        format!("https://{}/v2/{}", registry, repository)
    }

    fn load_credentials(&self) -> Credentials {
        fs::read_to_string(&self.credentials_path)
            .ok()
            .and_then(|raw| toml::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save_credentials(&self, creds: &Credentials) -> Res<()> {
        if let Some(parent) = self.credentials_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(creds)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;
        fs::write(&self.credentials_path, raw)?;
        Ok(())
    }

    fn authed(&self, registry: &str, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        let creds = self.load_credentials();
        match creds.hosts.get(registry) {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }
}

impl OciRegistry for DefaultOciRegistry {
    fn pull(&self, registry: &str, repository: &str, tag: &str, target_dir: &Path) -> Res<()> {
        let manifest_json = self.fetch_manifest_json(registry, repository, tag)?;
        let manifest: OciManifest = serde_json::from_str(&manifest_json)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;

        for (idx, layer) in manifest.layers.iter().enumerate() {
            let url = format!(
                "{}/blobs/{}",
                self.base_url(registry, repository),
                layer.digest
            );
            let resp = self
                .authed(registry, self.client.get(&url))
                .send()
                .map_err(failure::Error::from)?;
            if !resp.status().is_success() {
                return Err(ErrorKind::FailedPull(
                    repository.to_string(),
                    format!("fetching layer blob returned {}", resp.status()),
                )
                .into());
            }
            let bytes = resp.bytes().map_err(failure::Error::from)?;
            fs::write(target_dir.join(format!("layer-{}.tar", idx)), &bytes)?;
        }

        Ok(())
    }

    fn push(
        &self,
        registry: &str,
        repository: &str,
        tag: &str,
        local_path: &Path,
        annotations: &HashMap<String, String>,
    ) -> Res<()> {
        if self.contains_tag(registry, repository, tag)? {
            return Err(ErrorKind::PkgTagExists(repository.to_string(), tag.to_string()).into());
        }

        let layer_bytes = fs::read(local_path)?;
        let layer_digest = format!("sha256:{}", hex::encode(sha2_digest(&layer_bytes)));
        let config_bytes = b"{}";
        let config_digest = format!("sha256:{}", hex::encode(sha2_digest(config_bytes)));

        let base = self.base_url(registry, repository);
        self.upload_blob(registry, &base, &layer_digest, &layer_bytes)?;
        self.upload_blob(registry, &base, &config_digest, config_bytes)?;

        let manifest = OciManifest {
            schema_version: 2,
            media_type: OCI_MANIFEST_MEDIA_TYPE.to_string(),
            config: OciDescriptor {
                media_type: OCI_CONFIG_MEDIA_TYPE.to_string(),
                digest: config_digest,
                size: config_bytes.len() as u64,
            },
            layers: vec![OciDescriptor {
                media_type: OCI_LAYER_MEDIA_TYPE.to_string(),
                digest: layer_digest,
                size: layer_bytes.len() as u64,
            }],
            annotations: annotations.clone(),
        };
        let manifest_json = serde_json::to_vec(&manifest)
            .map_err(failure::Error::from)
            .map_err(Error::from)?;

        let url = format!("{}/manifests/{}", base, tag);
        let resp = self
            .authed(registry, self.client.put(&url))
            .header("Content-Type", OCI_MANIFEST_MEDIA_TYPE)
            .body(manifest_json)
            .send()
            .map_err(failure::Error::from)?;

        if !resp.status().is_success() {
            return Err(ErrorKind::FailedPull(
                repository.to_string(),
                format!("manifest push returned {}", resp.status()),
            )
            .into());
        }

        Ok(())
    }

    fn list_tags(&self, registry: &str, repository: &str) -> Res<Vec<String>> {
        let url = format!("{}/tags/list", self.base_url(registry, repository));
        let resp = self
            .authed(registry, self.client.get(&url))
            .send()
            .map_err(failure::Error::from)?;
        if !resp.status().is_success() {
            return Err(ErrorKind::FailedPull(
                repository.to_string(),
                format!("listing tags returned {}", resp.status()),
            )
            .into());
        }
        let list: TagList = resp.json().map_err(failure::Error::from)?;
        Ok(list.tags)
    }

    fn contains_tag(&self, registry: &str, repository: &str, tag: &str) -> Res<bool> {
        let url = format!("{}/manifests/{}", self.base_url(registry, repository), tag);
        let resp = self
            .authed(registry, self.client.head(&url))
            .send()
            .map_err(failure::Error::from)?;
        Ok(resp.status().is_success())
    }

    fn fetch_manifest_json(&self, registry: &str, repository: &str, tag: &str) -> Res<String> {
        let url = format!("{}/manifests/{}", self.base_url(registry, repository), tag);
        let resp = self
            .authed(registry, self.client.get(&url))
            .header("Accept", OCI_MANIFEST_MEDIA_TYPE)
            .send()
            .map_err(failure::Error::from)?;
        if !resp.status().is_success() {
            return Err(ErrorKind::FailedPull(
                repository.to_string(),
                format!("fetching manifest returned {}", resp.status()),
            )
            .into());
        }
        resp.text().map_err(|e| Error::from(failure::Error::from(e)))
    }

    fn login(&self, host: &str, user: &str, pass: &str) -> Res<()> {
        let mut creds = self.load_credentials();
        creds
            .hosts
            .insert(host.to_string(), (user.to_string(), pass.to_string()));
        self.save_credentials(&creds)
    }

    fn logout(&self, host: &str) -> Res<()> {
        let mut creds = self.load_credentials();
        creds.hosts.remove(host);
        self.save_credentials(&creds)
    }
}

impl DefaultOciRegistry {
    fn upload_blob(&self, registry: &str, base: &str, digest: &str, bytes: &[u8]) -> Res<()> {
        if self
            .authed(registry, self.client.head(&format!("{}/blobs/{}", base, digest)))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
        {
            return Ok(());
        }

        let start_url = format!("{}/blobs/uploads/", base);
        let start = self
            .authed(registry, self.client.post(&start_url))
            .send()
            .map_err(failure::Error::from)?;
        let location = start
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(&start_url)
            .to_string();

        let sep = if location.contains('?') { "&" } else { "?" };
        let put_url = format!("{}{}digest={}", location, sep, digest);
        let resp = self
            .authed(registry, self.client.put(&put_url))
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .map_err(failure::Error::from)?;

        if !resp.status().is_success() {
            return Err(
                ErrorKind::FailedPull("blob upload".to_string(), format!("{}", resp.status()))
                    .into(),
            );
        }
        Ok(())
    }
}

fn sha2_digest(bytes: &[u8]) -> Vec<u8> {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.input(bytes);
    hasher.result().to_vec()
}
