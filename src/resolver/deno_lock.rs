//! Resolver for `deno.lock` files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use super::key::{dedup_packages, infer_name_and_version, url_path};
use super::repo::{resolve_denoland_repo, resolve_jsr_repo, resolve_npm_repo};
use crate::api::RegistryApi;
use crate::error::AuditError;
use crate::model::{GithubRepo, Origin, Package};

/// Matches one `name@x.y.z` segment inside a chained npm key.
static NPM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@?[a-z0-9_./-]+@\d+\.\d+\.\d+").unwrap());

/// Matches version-pinned CDN path segments such as `/v135` or `/stable`.
static ESM_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/v[0-9]+|/stable").unwrap());

#[derive(Deserialize)]
struct DenoLockFile {
    #[serde(default)]
    jsr: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    npm: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    remote: BTreeMap<String, serde_json::Value>,
}

/// Resolver for Deno's lock format.
///
/// The `jsr` and `npm` sections key packages by `name@version`; the
/// `remote` section keys modules by full URL and feeds two origins,
/// `denoland` (deno.land hosting) and `esm` (esm.sh CDN).
pub struct DenoLockResolver;

#[async_trait]
impl super::Resolver for DenoLockResolver {
    fn name(&self) -> &'static str {
        "deno-lock"
    }

    fn origins(&self) -> &'static [Origin] {
        &[Origin::Jsr, Origin::Denoland, Origin::Npm, Origin::Esm]
    }

    fn extract(&self, path: &Path) -> Result<Vec<(Origin, Vec<String>)>, AuditError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuditError::LockFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let lock: DenoLockFile =
            serde_json::from_str(&content).map_err(|err| AuditError::LockFileParse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let remote: Vec<&String> = lock.remote.keys().collect();

        Ok(vec![
            (Origin::Jsr, lock.jsr.keys().cloned().collect()),
            (
                Origin::Denoland,
                remote
                    .iter()
                    .filter(|k| k.contains("https://deno.land"))
                    .map(|k| k.to_string())
                    .collect(),
            ),
            (Origin::Npm, lock.npm.keys().cloned().collect()),
            (
                Origin::Esm,
                remote
                    .iter()
                    .filter(|k| k.contains("https://esm.sh"))
                    .map(|k| k.to_string())
                    .collect(),
            ),
        ])
    }

    fn normalize(&self, origin: Origin, keys: &[String]) -> Vec<Package> {
        let pkgs = match origin {
            Origin::Jsr => keys
                .iter()
                .filter_map(|key| infer_name_and_version(key))
                .collect(),
            // npm keys may chain peer dependencies with `_` delimiters and
            // encode `/` as `+` (e.g. `pkg@1.0.0_peer@2.0.0`).
            Origin::Npm => keys
                .iter()
                .map(|key| key.replace('+', "/"))
                .flat_map(|key| {
                    NPM_KEY
                        .find_iter(&key)
                        .map(|m| m.as_str().trim_start_matches('_').to_string())
                        .collect::<Vec<_>>()
                })
                .filter_map(|key| infer_name_and_version(&key))
                .collect(),
            Origin::Esm => keys
                .iter()
                .filter_map(|key| url_path(key))
                .map(|path| ESM_ARTIFACT.replace_all(&path, "").into_owned())
                .filter_map(|path| infer_name_and_version(path.trim_start_matches('/')))
                .collect(),
            Origin::Denoland => keys
                .iter()
                .filter_map(|key| url_path(key))
                .map(|path| path.replace("/x/", "/"))
                .filter_map(|path| infer_name_and_version(path.trim_start_matches('/')))
                .collect(),
        };

        dedup_packages(pkgs)
    }

    async fn resolve_github_repo(
        &self,
        origin: Origin,
        pkg: &Package,
        api: &dyn RegistryApi,
    ) -> GithubRepo {
        match origin {
            Origin::Jsr => resolve_jsr_repo(api, pkg).await,
            Origin::Npm | Origin::Esm => resolve_npm_repo(api, pkg).await,
            Origin::Denoland => resolve_denoland_repo(api, pkg).await,
        }
    }
}
