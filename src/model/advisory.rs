use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Severity;

/// A repository security advisory as published by the GitHub REST API.
///
/// Only the fields the audit consumes are modeled; unknown fields in the
/// payload are ignored. Advisories are immutable once fetched and shared
/// across every package in a repository group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advisory {
    pub ghsa_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cve_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub withdrawn_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<Vec<Vulnerability>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwes: Option<Vec<Cwe>>,
}

impl Advisory {
    /// Returns true if `id` names this advisory by GHSA or CVE identifier.
    pub fn has_identifier(&self, id: &str) -> bool {
        self.ghsa_id.eq_ignore_ascii_case(id)
            || self
                .cve_id
                .as_deref()
                .is_some_and(|cve| cve.eq_ignore_ascii_case(id))
    }
}

/// One vulnerable package entry within an advisory.
///
/// `vulnerable_version_range` is free-text from the advisory author and is
/// not guaranteed to be a valid semver range; the matcher normalizes it
/// before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<VulnerablePackage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_version_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patched_versions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerable_functions: Option<Vec<String>>,
}

/// The package an advisory vulnerability declares as affected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VulnerablePackage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A CWE classification attached to an advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cwe {
    pub cwe_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advisory_json() -> &'static str {
        r#"{
            "ghsa_id": "GHSA-jr5f-v2jv-69x6",
            "cve_id": "CVE-2025-27152",
            "summary": "SSRF in axios requests",
            "severity": "high",
            "html_url": "https://github.com/axios/axios/security/advisories/GHSA-jr5f-v2jv-69x6",
            "published_at": "2025-02-24T18:00:00Z",
            "vulnerabilities": [
                {
                    "package": { "ecosystem": "npm", "name": "axios" },
                    "vulnerable_version_range": "< 1.8.0",
                    "patched_versions": "1.8.0"
                }
            ],
            "cwes": [{ "cwe_id": "CWE-918", "name": "Server-Side Request Forgery" }],
            "credits": null,
            "state": "published"
        }"#
    }

    #[test]
    fn deserializes_github_payload_ignoring_unknown_fields() {
        let advisory: Advisory = serde_json::from_str(advisory_json()).unwrap();
        assert_eq!(advisory.ghsa_id, "GHSA-jr5f-v2jv-69x6");
        assert_eq!(advisory.severity, Some(Severity::High));
        let vulns = advisory.vulnerabilities.unwrap();
        assert_eq!(
            vulns[0].vulnerable_version_range.as_deref(),
            Some("< 1.8.0")
        );
        assert_eq!(
            vulns[0].package.as_ref().unwrap().name.as_deref(),
            Some("axios")
        );
    }

    #[test]
    fn has_identifier_matches_ghsa_and_cve() {
        let advisory: Advisory = serde_json::from_str(advisory_json()).unwrap();
        assert!(advisory.has_identifier("GHSA-jr5f-v2jv-69x6"));
        assert!(advisory.has_identifier("cve-2025-27152"));
        assert!(!advisory.has_identifier("GHSA-0000-0000-0000"));
    }
}
