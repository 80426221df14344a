//! Resolver for npm `package-lock.json` files (lockfile v2/v3).

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::key::{dedup_packages, infer_name_and_version};
use super::repo::{resolve_jsr_repo, resolve_npm_repo};
use crate::api::RegistryApi;
use crate::error::AuditError;
use crate::model::{GithubRepo, Origin, Package};

#[derive(Deserialize)]
struct PackageLockFile {
    #[serde(default)]
    packages: BTreeMap<String, PackageLockEntry>,
}

#[derive(Deserialize)]
struct PackageLockEntry {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Resolver for npm's lock format.
///
/// Entries are keyed by install path (`node_modules/...`); the package name
/// is the part after the last `node_modules/` segment. JSR packages
/// installed through npm compatibility carry a `name` field containing
/// `jsr` and are routed to the jsr origin.
pub struct PackageLockResolver;

fn entry_key(path: &str, entry: &PackageLockEntry) -> String {
    let name = match path.rfind("node_modules/") {
        Some(pos) => &path[pos + "node_modules/".len()..],
        None => path,
    };
    format!("{}@{}", name, entry.version.as_deref().unwrap_or_default())
}

#[async_trait]
impl super::Resolver for PackageLockResolver {
    fn name(&self) -> &'static str {
        "package-lock"
    }

    fn origins(&self) -> &'static [Origin] {
        &[Origin::Npm, Origin::Jsr]
    }

    fn extract(&self, path: &Path) -> Result<Vec<(Origin, Vec<String>)>, AuditError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuditError::LockFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let lock: PackageLockFile =
            serde_json::from_str(&content).map_err(|err| AuditError::LockFileParse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?;

        let mut npm = Vec::new();
        let mut jsr = Vec::new();

        // The root project itself is keyed by the empty string.
        for (key, entry) in lock.packages.iter().filter(|(key, _)| !key.is_empty()) {
            let raw = entry_key(key, entry);
            if entry.name.as_deref().is_some_and(|name| name.contains("jsr")) {
                jsr.push(raw);
            } else {
                npm.push(raw);
            }
        }

        Ok(vec![(Origin::Npm, npm), (Origin::Jsr, jsr)])
    }

    fn normalize(&self, _origin: Origin, keys: &[String]) -> Vec<Package> {
        dedup_packages(
            keys.iter()
                .filter_map(|key| infer_name_and_version(key))
                .collect(),
        )
    }

    async fn resolve_github_repo(
        &self,
        origin: Origin,
        pkg: &Package,
        api: &dyn RegistryApi,
    ) -> GithubRepo {
        match origin {
            Origin::Jsr => resolve_jsr_repo(api, pkg).await,
            _ => resolve_npm_repo(api, pkg).await,
        }
    }
}
