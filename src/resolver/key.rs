//! Shared raw-key parsing helpers used by the resolver plugins.

use tracing::warn;

use crate::model::Package;

/// Splits a raw `name@version` key into a [`Package`].
///
/// The split happens at the last `@` that is not the leading scope marker,
/// so `@std/collections@1.0.10` yields `("@std/collections", "1.0.10")`.
/// Anything after a `/` in the version part is a sub-path and is dropped.
/// Returns `None` (with a warning) when no version can be inferred.
pub(crate) fn infer_name_and_version(key: &str) -> Option<Package> {
    let has_scope = key.starts_with('@');
    let searchable = if has_scope { &key[1..] } else { key };

    let Some(split) = searchable.rfind('@') else {
        warn!(key, "missing version for package");
        return None;
    };
    let split = if has_scope { split + 1 } else { split };

    let name = &key[..split];
    let version = key[split + 1..].split('/').next().unwrap_or_default();

    if name.is_empty() || version.is_empty() {
        warn!(key, "missing name or version for package");
        return None;
    }

    Some(Package::new(name, version))
}

/// Removes duplicate `(name, version)` pairs, keeping first-encounter order.
pub(crate) fn dedup_packages(pkgs: Vec<Package>) -> Vec<Package> {
    let mut seen = std::collections::HashSet::new();
    pkgs.into_iter()
        .filter(|pkg| seen.insert((pkg.name.clone(), pkg.version.clone())))
        .collect()
}

/// Returns the path component of a URL-shaped key, leading `/` included.
pub(crate) fn url_path(key: &str) -> Option<String> {
    let parsed = url::Url::parse(key).ok()?;
    Some(parsed.path().to_string())
}
