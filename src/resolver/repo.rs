//! Origin-specific GitHub repository resolution.
//!
//! Each function translates a package identity into a `(owner, repo)` pair
//! via one metadata source. Lookups fail soft: any error is logged and the
//! package is carried forward unresolved.

use tracing::warn;

use crate::api::RegistryApi;
use crate::model::{GithubRepo, Package};

/// Resolves a JSR package (`@scope/name`) through the JSR API.
pub(crate) async fn resolve_jsr_repo(api: &dyn RegistryApi, pkg: &Package) -> GithubRepo {
    let Some((scope, name)) = pkg.name.trim_start_matches('@').split_once('/') else {
        warn!(name = %pkg.name, "jsr package name has no scope");
        return GithubRepo::unresolved();
    };

    match api.fetch_jsr_package(scope, name).await {
        Ok(jsr) => match jsr.github_repository {
            Some(repo) => GithubRepo::new(repo.owner, repo.name),
            None => {
                warn!(name = %pkg.name, "no linked GitHub repository for jsr package");
                GithubRepo::unresolved()
            }
        },
        Err(err) => {
            warn!(name = %pkg.name, error = %err, "unable to fetch jsr package");
            GithubRepo::unresolved()
        }
    }
}

/// Resolves an npm package through the npm registry's repository link.
pub(crate) async fn resolve_npm_repo(api: &dyn RegistryApi, pkg: &Package) -> GithubRepo {
    match api.fetch_npm_package(&pkg.name).await {
        Ok(npm) => match npm.repository.and_then(|r| r.url) {
            Some(url) => parse_github_url(&url),
            None => {
                warn!(name = %pkg.name, "no repository link for npm package");
                GithubRepo::unresolved()
            }
        },
        Err(err) => {
            warn!(name = %pkg.name, error = %err, "unable to fetch npm package");
            GithubRepo::unresolved()
        }
    }
}

/// Resolves a deno.land module through the CDN's upload metadata.
pub(crate) async fn resolve_denoland_repo(api: &dyn RegistryApi, pkg: &Package) -> GithubRepo {
    let Some(version) = pkg.version.as_deref() else {
        return GithubRepo::unresolved();
    };

    match api.fetch_denoland_meta(&pkg.name, version).await {
        Ok(meta) => {
            let repository = meta.upload_options.and_then(|o| o.repository);
            match repository.as_deref().and_then(|r| r.split_once('/')) {
                Some((owner, repo)) => GithubRepo::new(owner, repo),
                None => {
                    warn!(name = %pkg.name, "no upload repository for deno.land module");
                    GithubRepo::unresolved()
                }
            }
        }
        Err(err) => {
            warn!(name = %pkg.name, error = %err, "unable to fetch deno.land module");
            GithubRepo::unresolved()
        }
    }
}

/// Extracts `(owner, repo)` from the repository URL shapes the npm registry
/// publishes: `git+https://github.com/owner/repo.git`,
/// `git://github.com/owner/repo.git#main`, plain `https` URLs, and so on.
fn parse_github_url(raw: &str) -> GithubRepo {
    let cleaned = raw.trim();
    let cleaned = cleaned.strip_prefix("git+").unwrap_or(cleaned);
    let cleaned = cleaned.split('#').next().unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix(".git").unwrap_or(cleaned);

    let Some(rest) = cleaned
        .split_once("github.com")
        .map(|(_, rest)| rest.trim_start_matches([':', '/']))
    else {
        warn!(url = raw, "repository url does not point at github.com");
        return GithubRepo::unresolved();
    };

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    match (segments.next(), segments.next()) {
        (Some(owner), Some(repo)) => GithubRepo::new(owner, repo),
        _ => {
            warn!(url = raw, "repository url has no owner/repo path");
            GithubRepo::unresolved()
        }
    }
}
