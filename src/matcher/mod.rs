//! Version matching: which resolved packages are actually affected by the
//! advisories fetched for their repository.
//!
//! An advisory existing for a package's repository does not make the
//! locked version vulnerable; the locked version must fall inside at least
//! one of the advisory's vulnerable version ranges.

mod range;

pub use range::{parse_range, VersionCandidate};

use std::collections::HashMap;

use semver::Version;
use tracing::warn;

use crate::model::{ResolvedPackage, Severity};

/// Returns the subset of `pkgs` whose locked version falls inside any
/// applicable advisory range.
///
/// A package with no advisories is never matched. A package whose locked
/// version cannot be parsed as semver but which has advisories is treated
/// as unverifiable and assumed vulnerable.
pub fn match_vulnerable(pkgs: &[ResolvedPackage]) -> Vec<ResolvedPackage> {
    pkgs.iter()
        .filter(|pkg| is_vulnerable(pkg))
        .cloned()
        .collect()
}

fn is_vulnerable(pkg: &ResolvedPackage) -> bool {
    let advisories = match &pkg.advisories {
        Some(advisories) if !advisories.is_empty() => advisories,
        _ => return false,
    };

    let version = match pkg.version().map(|v| Version::parse(v.trim_start_matches('v'))) {
        Some(Ok(version)) => version,
        _ => {
            warn!(
                package = %pkg.package,
                "locked version is not semver; assuming vulnerable"
            );
            return true;
        }
    };

    advisories
        .iter()
        .flat_map(|advisory| advisory.vulnerabilities.iter().flatten())
        .filter(|vuln| {
            vuln.package
                .as_ref()
                .and_then(|p| p.name.as_deref())
                .is_none_or(|declared| names_compatible(pkg.name(), declared))
        })
        .filter_map(|vuln| vuln.vulnerable_version_range.as_deref())
        .any(|raw| {
            let candidates = parse_range(raw);
            if candidates.is_empty() {
                warn!(
                    package = %pkg.package,
                    range = raw,
                    "skipping unparseable vulnerable version range"
                );
            }
            candidates.iter().any(|candidate| candidate.matches(&version))
        })
}

/// Whether an advisory's declared package name applies to a resolved
/// package: the full names must be equal (ASCII case-insensitive), or equal
/// after stripping a leading `@scope/` from either side.
pub fn names_compatible(resolved: &str, declared: &str) -> bool {
    fn unscoped(name: &str) -> &str {
        match name.strip_prefix('@').and_then(|rest| rest.split_once('/')) {
            Some((_, bare)) => bare,
            None => name,
        }
    }

    resolved.eq_ignore_ascii_case(declared)
        || unscoped(resolved).eq_ignore_ascii_case(unscoped(declared))
}

/// Removes ignored advisories from matched packages.
///
/// `ignores` maps a package name to the advisory identifiers (GHSA or CVE)
/// suppressed for it. A package whose advisories are all suppressed drops
/// out of the matched set entirely.
pub fn apply_ignores(
    matched: Vec<ResolvedPackage>,
    ignores: &HashMap<String, Vec<String>>,
) -> Vec<ResolvedPackage> {
    matched
        .into_iter()
        .filter_map(|mut pkg| {
            if let Some(ignored) = ignores.get(pkg.name()) {
                if let Some(advisories) = pkg.advisories.take() {
                    let kept: Vec<_> = advisories
                        .into_iter()
                        .filter(|a| !ignored.iter().any(|id| a.has_identifier(id)))
                        .collect();
                    if kept.is_empty() {
                        return None;
                    }
                    pkg.advisories = Some(kept);
                }
            }
            Some(pkg)
        })
        .collect()
}

/// Whether any matched package carries an advisory at or above `min`.
pub fn meets_severity(matched: &[ResolvedPackage], min: Severity) -> bool {
    matched
        .iter()
        .filter_map(|pkg| pkg.max_severity())
        .any(|severity| severity >= min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Advisory, GithubRepo, Origin, Package, Vulnerability, VulnerablePackage,
    };

    fn advisory(severity: Option<Severity>, ranges: &[&str]) -> Advisory {
        serde_json::from_value(serde_json::json!({
            "ghsa_id": "GHSA-test-test-test",
            "cve_id": "CVE-2024-0001",
            "severity": severity.map(|s| s.as_str()),
            "vulnerabilities": ranges
                .iter()
                .map(|r| serde_json::json!({
                    "package": { "ecosystem": "npm", "name": null },
                    "vulnerable_version_range": r,
                }))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    fn vuln_pkg(version: &str, ranges: &[&str]) -> ResolvedPackage {
        let mut pkg = ResolvedPackage::new(
            Origin::Npm,
            Package::new("pkg", version),
            GithubRepo::new("owner", "repo"),
        );
        pkg.advisories = Some(vec![advisory(Some(Severity::High), ranges)]);
        pkg
    }

    #[test]
    fn no_advisories_never_matches() {
        let pkg = ResolvedPackage::new(
            Origin::Npm,
            Package::new("pkg", "1.2.3"),
            GithubRepo::unresolved(),
        );
        assert!(match_vulnerable(&[pkg]).is_empty());

        let mut with_empty = vuln_pkg("1.2.3", &[]);
        with_empty.advisories = Some(vec![]);
        assert!(match_vulnerable(&[with_empty]).is_empty());
    }

    #[test]
    fn exact_version_matches() {
        assert_eq!(match_vulnerable(&[vuln_pkg("1.2.3", &["1.2.3"])]).len(), 1);
        assert!(match_vulnerable(&[vuln_pkg("1.2.3", &["1.2.2"])]).is_empty());
        assert!(match_vulnerable(&[vuln_pkg("1.2.3", &["1.2.4"])]).is_empty());
    }

    #[test]
    fn range_boundaries() {
        assert_eq!(match_vulnerable(&[vuln_pkg("1.2.3", &["<= 1.2.3"])]).len(), 1);
        assert_eq!(match_vulnerable(&[vuln_pkg("1.2.3", &[">= 1.2.3"])]).len(), 1);
        assert!(match_vulnerable(&[vuln_pkg("1.2.3", &["< 1.2.3"])]).is_empty());
        assert!(match_vulnerable(&[vuln_pkg("1.2.3", &[">= 1.2.4"])]).is_empty());
    }

    #[test]
    fn any_single_satisfying_range_is_enough() {
        assert_eq!(
            match_vulnerable(&[vuln_pkg("1.2.3", &["<= 1.2.3", ">= 2.0.0"])]).len(),
            1
        );
        assert_eq!(
            match_vulnerable(&[vuln_pkg("1.2.3", &["1.2.3", ">= 2.0.0"])]).len(),
            1
        );
        assert!(match_vulnerable(&[vuln_pkg("1.2.4", &["<= 1.2.3", ">= 2.0.0"])]).is_empty());
        assert!(match_vulnerable(&[vuln_pkg("1.2.2", &["1.2.3", ">= 2.0.0"])]).is_empty());
    }

    #[test]
    fn mixed_separator_ranges_from_real_advisories() {
        let range = "<7.26.10, 8.0.0-alpha.0 - 8.0.0-alpha.16";
        assert_eq!(match_vulnerable(&[vuln_pkg("7.25.9", &[range])]).len(), 1);
        assert_eq!(
            match_vulnerable(&[vuln_pkg("8.0.0-alpha.3", &[range])]).len(),
            1
        );
        assert!(match_vulnerable(&[vuln_pkg("7.27.0", &[range])]).is_empty());
        assert!(match_vulnerable(&[vuln_pkg("8.0.0-alpha.17", &[range])]).is_empty());
    }

    #[test]
    fn unparseable_range_is_skipped_not_fatal() {
        assert!(match_vulnerable(&[vuln_pkg("1.2.3", &["total garbage"])]).is_empty());
        assert_eq!(
            match_vulnerable(&[vuln_pkg("1.2.3", &["total garbage", "1.2.3"])]).len(),
            1
        );
    }

    #[test]
    fn unparseable_locked_version_assumes_vulnerable() {
        assert_eq!(
            match_vulnerable(&[vuln_pkg("not-a-version", &["< 9.9.9"])]).len(),
            1
        );
    }

    #[test]
    fn v_prefixed_locked_versions_parse() {
        assert_eq!(match_vulnerable(&[vuln_pkg("v1.2.3", &["<= 1.2.3"])]).len(), 1);
        assert!(match_vulnerable(&[vuln_pkg("v1.2.4", &["<= 1.2.3"])]).is_empty());
    }

    #[test]
    fn incompatible_declared_name_excludes_the_range() {
        let mut pkg = vuln_pkg("1.2.3", &[]);
        pkg.advisories = Some(vec![Advisory {
            vulnerabilities: Some(vec![Vulnerability {
                package: Some(VulnerablePackage {
                    ecosystem: Some("npm".to_string()),
                    name: Some("unrelated".to_string()),
                }),
                vulnerable_version_range: Some("<= 1.2.3".to_string()),
                patched_versions: None,
                vulnerable_functions: None,
            }]),
            ..advisory(Some(Severity::High), &[])
        }]);
        assert!(match_vulnerable(&[pkg]).is_empty());
    }

    #[test]
    fn scoped_and_bare_names_are_compatible() {
        assert!(names_compatible("@babel/helpers", "@babel/helpers"));
        assert!(names_compatible("@babel/helpers", "helpers"));
        assert!(names_compatible("helpers", "@babel/helpers"));
        assert!(names_compatible("Axios", "axios"));
        assert!(!names_compatible("@babel/helpers", "@babel/core"));
        assert!(!names_compatible("axios", "axios-retry"));
    }

    #[test]
    fn ignores_suppress_advisories_by_identifier() {
        let matched = vec![vuln_pkg("1.2.3", &["1.2.3"])];

        let mut ignores = HashMap::new();
        ignores.insert(
            "pkg".to_string(),
            vec!["GHSA-test-test-test".to_string()],
        );
        assert!(apply_ignores(matched.clone(), &ignores).is_empty());

        let mut by_cve = HashMap::new();
        by_cve.insert("pkg".to_string(), vec!["CVE-2024-0001".to_string()]);
        assert!(apply_ignores(matched.clone(), &by_cve).is_empty());

        let mut other = HashMap::new();
        other.insert("pkg".to_string(), vec!["GHSA-xxxx-xxxx-xxxx".to_string()]);
        assert_eq!(apply_ignores(matched, &other).len(), 1);
    }

    #[test]
    fn severity_threshold() {
        let matched = vec![vuln_pkg("1.2.3", &["1.2.3"])];
        assert!(meets_severity(&matched, Severity::High));
        assert!(meets_severity(&matched, Severity::Low));
        assert!(!meets_severity(&matched, Severity::Critical));
        assert!(!meets_severity(&[], Severity::Low));
    }
}
