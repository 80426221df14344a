use serde::{Deserialize, Serialize};

use super::{Advisory, Origin};

/// A package declared in a lock file, identified by `(name, version)`.
///
/// `version` is `None` when the raw lock-file key carried no parseable
/// version. Such packages are dropped with a warning during normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Package {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.into()),
        }
    }

    pub fn without_version(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
        }
    }
}

impl std::fmt::Display for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The GitHub identity a package resolved to.
///
/// Both fields are `None` when the origin's metadata source knows no linked
/// repository for the package. Resolution fails soft: an unresolved package
/// stays in the pipeline, it just never joins an advisory group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubRepo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
}

impl GithubRepo {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            repo: Some(repo.into()),
        }
    }

    pub fn unresolved() -> Self {
        Self::default()
    }

    /// Returns the `owner/repo` grouping key, or `None` if either half is
    /// missing.
    pub fn key(&self) -> Option<String> {
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => Some(format!("{}/{}", owner, repo)),
            _ => None,
        }
    }
}

/// A package after GitHub-identity resolution, optionally carrying the
/// advisories fetched for its repository.
///
/// `advisories` is `None` until the pipeline's advisory step runs for the
/// package's repository group, and stays `None` for packages without a
/// resolved repository or whose group's fetch failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub origin: Origin,
    #[serde(flatten)]
    pub package: Package,
    #[serde(flatten)]
    pub github: GithubRepo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisories: Option<Vec<Advisory>>,
}

impl ResolvedPackage {
    pub fn new(origin: Origin, package: Package, github: GithubRepo) -> Self {
        Self {
            origin,
            package,
            github,
            advisories: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.package.name
    }

    pub fn version(&self) -> Option<&str> {
        self.package.version.as_deref()
    }

    /// Highest severity among the attached advisories.
    pub fn max_severity(&self) -> Option<super::Severity> {
        self.advisories
            .as_ref()?
            .iter()
            .filter_map(|a| a.severity)
            .max()
    }
}
