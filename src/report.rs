//! Rendering and persistence of audit results.
//!
//! The run writes two files into the output directory: `report.md`, a
//! markdown summary of the matched packages and their advisories, and
//! `resolved-packages.json`, the full ordered list of resolved packages
//! for later inspection.

use anyhow::{Context, Result};
use std::path::Path;

use crate::model::ResolvedPackage;

const FALLBACK: &str = "N/A";

/// Renders the matched packages as a markdown report.
pub fn render_markdown(matched: &[ResolvedPackage]) -> String {
    let mut out = String::from("# Audit report\n");

    if matched.is_empty() {
        out.push_str("\nNo vulnerable packages found.\n");
        return out;
    }

    for pkg in matched {
        out.push_str(&format!(
            "\n## {} ({})\n",
            pkg.name(),
            pkg.version().unwrap_or(FALLBACK)
        ));

        for advisory in pkg.advisories.iter().flatten() {
            out.push_str("\n```\n");
            out.push_str(&format!(
                "Title: {}\n",
                advisory.summary.as_deref().unwrap_or(FALLBACK)
            ));
            out.push_str(&format!(
                "Severity: {}\n",
                advisory
                    .severity
                    .map(|s| s.as_str())
                    .unwrap_or(FALLBACK)
            ));
            out.push_str(&format!(
                "Details: {}\n",
                advisory.html_url.as_deref().unwrap_or(FALLBACK)
            ));
            out.push_str(&format!(
                "CVE: {}\n",
                advisory.cve_id.as_deref().unwrap_or(FALLBACK)
            ));
            out.push_str(&format!("GHSA: {}\n", advisory.ghsa_id));

            for vuln in advisory.vulnerabilities.iter().flatten() {
                let (name, ecosystem) = vuln
                    .package
                    .as_ref()
                    .map(|p| {
                        (
                            p.name.as_deref().unwrap_or(FALLBACK),
                            p.ecosystem.as_deref().unwrap_or(FALLBACK),
                        )
                    })
                    .unwrap_or((FALLBACK, FALLBACK));
                out.push_str(&format!("\nAffected package: {} ({})\n", name, ecosystem));
                out.push_str(&format!(
                    "Affected versions: {}\n",
                    vuln.vulnerable_version_range.as_deref().unwrap_or(FALLBACK)
                ));
                out.push_str(&format!(
                    "Patched versions: {}\n",
                    vuln.patched_versions.as_deref().unwrap_or(FALLBACK)
                ));
            }
            out.push_str("```\n");
        }
    }

    out
}

/// Recreates `dir` and writes `report.md` and `resolved-packages.json`.
pub fn write_reports(
    dir: &Path,
    resolved: &[ResolvedPackage],
    matched: &[ResolvedPackage],
) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to clear output dir {}", dir.display()));
        }
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output dir {}", dir.display()))?;

    std::fs::write(dir.join("report.md"), render_markdown(matched))
        .context("failed to write report.md")?;

    let json = serde_json::to_string_pretty(resolved)
        .context("failed to serialize resolved packages")?;
    std::fs::write(dir.join("resolved-packages.json"), json)
        .context("failed to write resolved-packages.json")?;

    Ok(())
}
