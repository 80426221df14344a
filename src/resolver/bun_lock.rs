//! Resolver for `bun.lock` files.
//!
//! Bun writes its lock file as JSON with comments and trailing commas; the
//! payload is stripped down to plain JSON before parsing since no stricter
//! structure is documented.

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
struct BunLockFile {
    #[serde(default)]
    packages: BTreeMap<String, serde_json::Value>,
}

/// Resolver for Bun's lock format.
///
/// Each `packages` entry is an array whose first element is a
/// `name@version` key. JSR packages come through Bun's npm compatibility
/// layer as `@jsr/scope__name` and are mapped back to `@scope/name`.
pub struct BunLockResolver;

/// Removes `//` and `/* */` comments and trailing commas so the content can
/// be handed to a strict JSON parser. String literals are left untouched.
fn strip_jsonc(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            ',' => {
                // Drop the comma if the next significant character closes a
                // collection.
                let mut lookahead = chars.clone();
                let mut trailing = false;
                for next in lookahead.by_ref() {
                    if next.is_whitespace() {
                        continue;
                    }
                    trailing = next == '}' || next == ']';
                    break;
                }
                if !trailing {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn first_element(value: &serde_json::Value) -> Option<&str> {
    value.as_array()?.first()?.as_str()
}

#[async_trait]
impl super::Resolver for BunLockResolver {
    fn name(&self) -> &'static str {
        "bun-lock"
    }

    fn origins(&self) -> &'static [Origin] {
        &[Origin::Npm, Origin::Jsr]
    }

    fn extract(&self, path: &Path) -> Result<Vec<(Origin, Vec<String>)>, AuditError> {
        let content = std::fs::read_to_string(path).map_err(|source| AuditError::LockFileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let lock: BunLockFile = serde_json::from_str(&strip_jsonc(&content)).map_err(|err| {
            AuditError::LockFileParse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        })?;

        let mut npm = Vec::new();
        let mut jsr = Vec::new();

        for key in lock.packages.values().filter_map(first_element) {
            if key.contains("@jsr/") {
                jsr.push(key.to_string());
            } else {
                npm.push(key.to_string());
            }
        }

        Ok(vec![(Origin::Npm, npm), (Origin::Jsr, jsr)])
    }

    fn normalize(&self, origin: Origin, keys: &[String]) -> Vec<Package> {
        let pkgs = match origin {
            // `@jsr/std__collections@1.0.10` -> `@std/collections@1.0.10`
            Origin::Jsr => keys
                .iter()
                .map(|key| key.replacen("jsr/", "", 1).replace("__", "/"))
                .filter_map(|key| infer_name_and_version(&key))
                .collect(),
            _ => keys
                .iter()
                .filter_map(|key| infer_name_and_version(key))
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
            _ => resolve_npm_repo(api, pkg).await,
        }
    }
}
