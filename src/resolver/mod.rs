//! Lock-file resolvers.
//!
//! This module provides the [`Resolver`] trait and one implementation per
//! supported lock-file format.
//!
//! # Available Resolvers
//!
//! | Resolver | Lock file | Origins |
//! |----------|-----------|---------|
//! | [`DenoLockResolver`] | `deno.lock` | jsr, denoland, npm, esm |
//! | [`PackageLockResolver`] | `package-lock.json` | npm, jsr |
//! | [`BunLockResolver`] | `bun.lock` | npm, jsr |
//!
//! A resolver turns one lock-file format into canonical packages: it
//! extracts raw key strings per origin, normalizes them into
//! `(name, version)` pairs, and maps each package onto a GitHub repository
//! via the origin-appropriate metadata source.

mod bun_lock;
mod deno_lock;
mod key;
mod package_lock;
mod repo;

pub use bun_lock::BunLockResolver;
pub use deno_lock::DenoLockResolver;
pub use package_lock::PackageLockResolver;

pub(crate) use key::{dedup_packages, infer_name_and_version};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::api::RegistryApi;
use crate::error::AuditError;
use crate::model::{GithubRepo, Origin, Package};

/// Trait for resolving one lock-file format into canonical packages.
///
/// Extraction failures are fatal for the run; normalization drops
/// unparseable keys with a warning, and repository resolution fails soft by
/// returning a [`GithubRepo`] with absent fields.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the registry name of this resolver.
    fn name(&self) -> &'static str;

    /// Returns the origins this resolver declares, in processing order.
    fn origins(&self) -> &'static [Origin];

    /// Reads the lock file and returns the raw key strings per origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not have the
    /// structure the format requires.
    fn extract(&self, path: &Path) -> Result<Vec<(Origin, Vec<String>)>, AuditError>;

    /// Parses raw keys into deduplicated `(name, version)` packages.
    ///
    /// Keys without a parseable version are dropped with a warning.
    fn normalize(&self, origin: Origin, keys: &[String]) -> Vec<Package>;

    /// Maps a package onto its GitHub repository via the metadata source
    /// appropriate for `origin`. Never fails: unresolvable packages yield
    /// [`GithubRepo::unresolved`].
    async fn resolve_github_repo(
        &self,
        origin: Origin,
        pkg: &Package,
        api: &dyn RegistryApi,
    ) -> GithubRepo;
}

/// Names of all registered resolvers.
pub const RESOLVER_NAMES: &[&str] = &["deno-lock", "package-lock", "bun-lock"];

/// Returns the resolver registered under `name`, if any.
pub fn get_resolver(name: &str) -> Option<Arc<dyn Resolver>> {
    match name {
        "deno-lock" => Some(Arc::new(DenoLockResolver)),
        "package-lock" => Some(Arc::new(PackageLockResolver)),
        "bun-lock" => Some(Arc::new(BunLockResolver)),
        _ => None,
    }
}
