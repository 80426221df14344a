//! Core data types for packages, advisories, and resolution results.
//!
//! This module contains the fundamental types used throughout lockaudit:
//!
//! - [`Package`] - A package declared in a lock file
//! - [`Origin`] - The lock-file section/ecosystem a package came from
//! - [`GithubRepo`] - The GitHub identity a package resolved to
//! - [`ResolvedPackage`] - A package with its GitHub identity and advisories
//! - [`Advisory`] - A published security advisory
//! - [`Severity`] - Advisory severity levels

mod advisory;
mod package;

pub use advisory::*;
pub use package::*;

use serde::{Deserialize, Serialize};

/// The ecosystem/section a package was declared under within a lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Jsr,
    Npm,
    Esm,
    Denoland,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Jsr => "jsr",
            Origin::Npm => "npm",
            Origin::Esm => "esm",
            Origin::Denoland => "denoland",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory severity, ordered from least to most severe.
///
/// `Unknown` covers advisories without a recognized severity and never
/// satisfies a configured minimum threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

// Serde derive cannot express `#[serde(other)]` on a non-last variant, and
// `Unknown` must stay first so the derived `Ord` ranks it lowest. These
// manual impls mirror the intended derive: lowercase names, a "moderate"
// alias for `Medium`, and any unrecognized value mapping to `Unknown`.
impl Serialize for Severity {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "low" => Severity::Low,
            "medium" | "moderate" => Severity::Medium,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Unknown,
        })
    }
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "unknown",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" | "moderate" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!(
                "unknown severity: {}. Use 'low', 'medium', 'high', or 'critical'",
                s
            )),
        }
    }
}
