//! The resolution pipeline: lock file to resolved packages with advisories.
//!
//! Stages: extract raw keys per origin, normalize and deduplicate, resolve
//! each package's GitHub identity (bounded concurrency), group by
//! `(owner, repo)`, fetch advisories once per distinct repository, and
//! attach them to every package in the group. Advisory fetches are
//! O(distinct repositories), not O(packages).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{AdvisorySource, RegistryApi};
use crate::error::AuditError;
use crate::model::{Advisory, Origin, Package, ResolvedPackage};
use crate::resolver::get_resolver;

const DEFAULT_CONCURRENCY: usize = 8;

/// Options for a pipeline run.
#[derive(Clone)]
pub struct ResolveOptions {
    /// Maximum number of in-flight remote lookups.
    pub concurrency: usize,
    /// Cancelling this token stops new lookups and aborts in-flight ones;
    /// the run returns whatever completed.
    pub cancel: CancellationToken,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }
}

/// The pipeline result: every resolved package in encounter order, plus the
/// side list of packages whose repository could not be determined.
pub struct ResolutionOutcome {
    pub packages: Vec<ResolvedPackage>,
    pub unresolved: Vec<ResolvedPackage>,
    pub cancelled: bool,
}

/// Runs the full resolution pipeline for one lock file.
///
/// # Errors
///
/// Fails only for an unknown resolver name or an unreadable/malformed lock
/// file. Remote failures degrade to packages without advisories.
pub async fn resolve_packages(
    path: &Path,
    resolver_name: &str,
    registry: Arc<dyn RegistryApi>,
    advisories: Arc<dyn AdvisorySource>,
    options: ResolveOptions,
) -> Result<ResolutionOutcome, AuditError> {
    let resolver = get_resolver(resolver_name)
        .ok_or_else(|| AuditError::UnknownResolver(resolver_name.to_string()))?;

    let mut normalized: Vec<(Origin, Package)> = Vec::new();
    for (origin, keys) in resolver.extract(path)? {
        let packages = resolver.normalize(origin, &keys);
        debug!(
            resolver = resolver.name(),
            origin = %origin,
            keys = keys.len(),
            packages = packages.len(),
            "normalized lock-file section"
        );
        normalized.extend(packages.into_iter().map(|pkg| (origin, pkg)));
    }

    // Identity resolution is independent per package; run it on a bounded
    // worker set keyed by input index so output order survives.
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let mut join_set: JoinSet<Option<(usize, ResolvedPackage)>> = JoinSet::new();
    let mut cancelled = false;

    for (idx, (origin, pkg)) in normalized.iter().enumerate() {
        if options.cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        let origin = *origin;
        let pkg = pkg.clone();
        let resolver = Arc::clone(&resolver);
        let registry = Arc::clone(&registry);
        let semaphore = Arc::clone(&semaphore);
        let cancel = options.cancel.clone();

        join_set.spawn(async move {
            let _permit = semaphore.acquire().await.ok()?;
            tokio::select! {
                github = resolver.resolve_github_repo(origin, &pkg, registry.as_ref()) => {
                    Some((idx, ResolvedPackage::new(origin, pkg, github)))
                }
                _ = cancel.cancelled() => None,
            }
        });
    }

    let mut resolved_by_idx: Vec<Option<ResolvedPackage>> = vec![None; normalized.len()];
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(Some((idx, pkg))) => resolved_by_idx[idx] = Some(pkg),
            Ok(None) => cancelled = true,
            Err(err) => warn!(error = %err, "identity resolution task failed"),
        }
    }

    let mut packages: Vec<ResolvedPackage> = resolved_by_idx.into_iter().flatten().collect();

    // Group by repository so each distinct (owner, repo) is fetched exactly
    // once, no matter how many packages share it.
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, pkg) in packages.iter().enumerate() {
        if let Some(key) = pkg.github.key() {
            groups
                .entry(key.clone())
                .or_insert_with(|| {
                    group_order.push(key);
                    Vec::new()
                })
                .push(idx);
        }
    }

    let fetches = group_order.iter().map(|key| {
        let advisories = Arc::clone(&advisories);
        let semaphore = Arc::clone(&semaphore);
        let cancel = options.cancel.clone();
        async move {
            let _permit = semaphore.acquire().await.ok()?;
            if cancel.is_cancelled() {
                return None;
            }
            let (owner, repo) = key.split_once('/')?;
            tokio::select! {
                result = advisories.fetch_advisories(owner, repo) => match result {
                    Ok(list) => {
                        info!(repository = key.as_str(), advisories = list.len(), "fetched advisories");
                        Some(list)
                    }
                    Err(err) => {
                        warn!(repository = key.as_str(), error = %err, "unable to fetch advisories");
                        None
                    }
                },
                _ = cancel.cancelled() => None,
            }
        }
    });

    let results: Vec<Option<Vec<Advisory>>> = join_all(fetches).await;
    cancelled |= options.cancel.is_cancelled();

    for (key, fetched) in group_order.iter().zip(results) {
        if let Some(list) = fetched {
            for &idx in &groups[key] {
                packages[idx].advisories = Some(list.clone());
            }
        }
    }

    let unresolved: Vec<ResolvedPackage> = packages
        .iter()
        .filter(|pkg| pkg.github.key().is_none())
        .cloned()
        .collect();

    Ok(ResolutionOutcome {
        packages,
        unresolved,
        cancelled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DenolandMeta, JsrPackage, NpmPackage};
    use crate::error::ApiError;
    use crate::model::Severity;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registry fake: maps package names to repository URLs.
    #[derive(Default)]
    struct FakeRegistry {
        npm_repos: HashMap<String, String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RegistryApi for FakeRegistry {
        async fn fetch_jsr_package(&self, _: &str, _: &str) -> Result<JsrPackage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(
                r#"{"githubRepository": {"owner": "denoland", "name": "std"}}"#,
            )
            .unwrap())
        }

        async fn fetch_npm_package(&self, name: &str) -> Result<NpmPackage, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.npm_repos.get(name) {
                Some(url) => Ok(serde_json::from_value(
                    serde_json::json!({ "repository": { "url": url } }),
                )
                .unwrap()),
                None => Err(ApiError::Status {
                    status: 404,
                    url: format!("https://registry.npmjs.org/{}", name),
                }),
            }
        }

        async fn fetch_denoland_meta(&self, _: &str, _: &str) -> Result<DenolandMeta, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str("{}").unwrap())
        }
    }

    /// Advisory fake that counts fetches per repository.
    #[derive(Default)]
    struct FakeAdvisories {
        by_repo: HashMap<String, Vec<Advisory>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AdvisorySource for FakeAdvisories {
        async fn fetch_advisories(
            &self,
            owner: &str,
            repo: &str,
        ) -> Result<Vec<Advisory>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .by_repo
                .get(&format!("{}/{}", owner, repo))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn advisory(range: &str) -> Advisory {
        serde_json::from_value(serde_json::json!({
            "ghsa_id": "GHSA-pipe-pipe-pipe",
            "severity": "high",
            "vulnerabilities": [{
                "package": { "ecosystem": "npm", "name": "axios" },
                "vulnerable_version_range": range,
            }],
        }))
        .unwrap()
    }

    fn write_package_lock(entries: &[(&str, &str)]) -> tempfile::NamedTempFile {
        let packages: serde_json::Map<String, serde_json::Value> = entries
            .iter()
            .map(|(name, version)| {
                (
                    format!("node_modules/{}", name),
                    serde_json::json!({ "version": version }),
                )
            })
            .collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            serde_json::json!({ "packages": packages })
                .to_string()
                .as_bytes(),
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn unknown_resolver_fails_before_io() {
        let registry = Arc::new(FakeRegistry::default());
        let advisories = Arc::new(FakeAdvisories::default());
        let result = resolve_packages(
            Path::new("/nonexistent"),
            "cargo-lock",
            registry,
            advisories,
            ResolveOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(AuditError::UnknownResolver(name)) if name == "cargo-lock"));
    }

    #[tokio::test]
    async fn shared_repository_is_fetched_once() {
        // axios and follow-redirects both live under github.com/axios.
        let lock = write_package_lock(&[("axios", "1.7.1"), ("follow-redirects", "1.15.6")]);
        let registry = Arc::new(FakeRegistry {
            npm_repos: [
                (
                    "axios".to_string(),
                    "git+https://github.com/axios/axios.git".to_string(),
                ),
                (
                    "follow-redirects".to_string(),
                    "git+https://github.com/axios/axios.git".to_string(),
                ),
            ]
            .into(),
            calls: AtomicUsize::new(0),
        });
        let advisories = Arc::new(FakeAdvisories {
            by_repo: [("axios/axios".to_string(), vec![advisory("1.7.1")])].into(),
            calls: AtomicUsize::new(0),
        });

        let outcome = resolve_packages(
            lock.path(),
            "package-lock",
            registry,
            Arc::clone(&advisories) as Arc<dyn AdvisorySource>,
            ResolveOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(advisories.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.packages.len(), 2);
        assert!(outcome
            .packages
            .iter()
            .all(|pkg| pkg.advisories.as_ref().is_some_and(|a| a.len() == 1)));
        assert!(outcome.unresolved.is_empty());
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn unresolved_packages_survive_without_advisories() {
        let lock = write_package_lock(&[("axios", "1.7.1"), ("ghost-package", "0.0.1")]);
        let registry = Arc::new(FakeRegistry {
            npm_repos: [(
                "axios".to_string(),
                "https://github.com/axios/axios".to_string(),
            )]
            .into(),
            calls: AtomicUsize::new(0),
        });
        let advisories = Arc::new(FakeAdvisories::default());

        let outcome = resolve_packages(
            lock.path(),
            "package-lock",
            registry,
            advisories,
            ResolveOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.packages.len(), 2);
        assert_eq!(outcome.unresolved.len(), 1);
        assert_eq!(outcome.unresolved[0].name(), "ghost-package");
        assert!(outcome.unresolved[0].advisories.is_none());
    }

    #[tokio::test]
    async fn cancelled_run_returns_partial_results() {
        let lock = write_package_lock(&[("axios", "1.7.1")]);
        let registry = Arc::new(FakeRegistry::default());
        let advisories = Arc::new(FakeAdvisories::default());

        let options = ResolveOptions::default();
        options.cancel.cancel();

        let outcome = resolve_packages(
            lock.path(),
            "package-lock",
            registry,
            advisories,
            options,
        )
        .await
        .unwrap();

        assert!(outcome.cancelled);
        assert!(outcome.packages.is_empty());
    }

    #[tokio::test]
    async fn end_to_end_matched_package() {
        let lock = write_package_lock(&[("axios", "1.7.1")]);
        let registry = Arc::new(FakeRegistry {
            npm_repos: [(
                "axios".to_string(),
                "git+https://github.com/axios/axios.git".to_string(),
            )]
            .into(),
            calls: AtomicUsize::new(0),
        });
        let advisories = Arc::new(FakeAdvisories {
            by_repo: [("axios/axios".to_string(), vec![advisory("1.7.1")])].into(),
            calls: AtomicUsize::new(0),
        });

        let outcome = resolve_packages(
            lock.path(),
            "package-lock",
            registry,
            advisories,
            ResolveOptions::default(),
        )
        .await
        .unwrap();

        let matched = crate::matcher::match_vulnerable(&outcome.packages);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].name(), "axios");
        assert!(crate::matcher::meets_severity(&matched, Severity::High));
    }
}
