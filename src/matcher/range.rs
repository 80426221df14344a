//! Normalization and parsing of advisory version-range strings.
//!
//! Advisory ranges are free text written by humans. Besides well-formed
//! semver requirements they contain comma- or semicolon-separated
//! alternatives, dash ranges (`1.2.0 - 1.4.0`), bare `N+` suffixes, and
//! malformed comparators (`=<`, `=>`). A strict parse is attempted first;
//! only strings the semver library rejects go through the normalization
//! pass, so ranges that are already valid keep their original semantics.

use std::sync::LazyLock;

use regex::Regex;
use semver::{Version, VersionReq};
use tracing::warn;

/// `X - Y` with mandatory whitespace around the dash, so prerelease dashes
/// inside the endpoints are never split points.
static DASH_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9A-Za-z.+-]+)\s+-\s+([0-9A-Za-z.+-]+)\s*$").unwrap());

/// A bare version number with a `+` suffix, e.g. `7+`.
static PLUS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:\.[0-9]+){0,2})\+\s*$").unwrap());

/// One parsed vulnerable-version candidate: either an exact version or a
/// requirement the locked version must satisfy.
#[derive(Debug, Clone)]
pub enum VersionCandidate {
    Exact(Version),
    Range(VersionReq),
}

impl VersionCandidate {
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            VersionCandidate::Exact(exact) => exact == version,
            VersionCandidate::Range(req) => req.matches(version),
        }
    }
}

/// Parses a vulnerable version range into candidates combined by OR.
///
/// An empty result means the string could not be parsed even after
/// normalization; the caller records the warning and skips the candidate.
pub fn parse_range(raw: &str) -> Vec<VersionCandidate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    // Strict pass. A bare version before a requirement: the semver library
    // reads `1.2.3` as the caret requirement `^1.2.3`, but an advisory
    // naming a single version means that exact version.
    if let Ok(version) = Version::parse(trimmed) {
        return vec![VersionCandidate::Exact(version)];
    }
    if let Ok(req) = VersionReq::parse(trimmed) {
        return vec![VersionCandidate::Range(req)];
    }

    // Normalization pass.
    let repaired = trimmed.replace("=<", "<=").replace("=>", ">=");

    repaired
        .split("||")
        .flat_map(|part| part.split([',', ';']))
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .filter_map(|alt| {
            let candidate = parse_alternative(alt);
            if candidate.is_none() {
                warn!(range = raw, alternative = alt, "unparseable version range");
            }
            candidate
        })
        .collect()
}

fn parse_alternative(alt: &str) -> Option<VersionCandidate> {
    if let Some(caps) = DASH_RANGE.captures(alt) {
        let req = VersionReq::parse(&format!(">={}, <={}", &caps[1], &caps[2])).ok()?;
        return Some(VersionCandidate::Range(req));
    }

    if let Some(caps) = PLUS_SUFFIX.captures(alt) {
        let req = VersionReq::parse(&format!(">={}", &caps[1])).ok()?;
        return Some(VersionCandidate::Range(req));
    }

    if let Ok(version) = Version::parse(alt) {
        return Some(VersionCandidate::Exact(version));
    }
    if let Ok(req) = VersionReq::parse(alt) {
        return Some(VersionCandidate::Range(req));
    }

    // Comparators separated by whitespace instead of commas, e.g.
    // `>=0.59.0 <2.79.2`. A dangling operator token is merged with the
    // version that follows it.
    let joined = join_comparators(alt)?;
    VersionReq::parse(&joined).ok().map(VersionCandidate::Range)
}

const OPERATORS: &[&str] = &["<=", ">=", "<", ">", "=", "^", "~"];

fn join_comparators(alt: &str) -> Option<String> {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in alt.split_whitespace() {
        if OPERATORS.contains(&token) {
            if pending_op.is_some() {
                return None;
            }
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{}{}", op, token)),
            None => comparators.push(token.to_string()),
        }
    }

    if pending_op.is_some() || comparators.len() < 2 {
        return None;
    }
    Some(comparators.join(", "))
}
