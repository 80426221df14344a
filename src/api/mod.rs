//! Remote collaborators: package metadata sources and the advisory source.
//!
//! Three registry-like services map a package identity to a GitHub
//! repository (JSR API, npm registry, deno.land CDN), and the GitHub REST
//! API serves repository security advisories. All of them sit behind the
//! [`RegistryApi`] and [`AdvisorySource`] traits so the pipeline can be
//! exercised against in-memory fakes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;
use crate::model::Advisory;

/// Package metadata lookups, one method per supported registry.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Fetches JSR package metadata for `@{scope}/{name}`.
    async fn fetch_jsr_package(&self, scope: &str, name: &str) -> Result<JsrPackage, ApiError>;

    /// Fetches npm registry metadata for a package.
    async fn fetch_npm_package(&self, name: &str) -> Result<NpmPackage, ApiError>;

    /// Fetches deno.land CDN upload metadata for a module at a version.
    async fn fetch_denoland_meta(
        &self,
        module: &str,
        version: &str,
    ) -> Result<DenolandMeta, ApiError>;
}

/// The advisory collaborator: repository security advisories by
/// `(owner, repo)`.
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    /// Fetches all published advisories for a repository. A repository
    /// without advisories (including one GitHub does not know) yields an
    /// empty list.
    async fn fetch_advisories(&self, owner: &str, repo: &str) -> Result<Vec<Advisory>, ApiError>;
}

/// JSR package payload (`https://api.jsr.io/scopes/{scope}/packages/{name}`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsrPackage {
    #[serde(default)]
    pub github_repository: Option<JsrGithubRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsrGithubRepository {
    pub owner: String,
    pub name: String,
}

/// npm registry payload (`https://registry.npmjs.org/{name}`), reduced to
/// the repository link.
#[derive(Debug, Clone, Deserialize)]
pub struct NpmPackage {
    #[serde(default)]
    pub repository: Option<NpmRepository>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NpmRepository {
    #[serde(default)]
    pub url: Option<String>,
}

/// deno.land CDN meta payload
/// (`https://cdn.deno.land/{module}/versions/{version}/meta/meta.json`).
#[derive(Debug, Clone, Deserialize)]
pub struct DenolandMeta {
    #[serde(default)]
    pub upload_options: Option<DenolandUploadOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DenolandUploadOptions {
    /// `owner/repo` of the repository the module was uploaded from.
    #[serde(default)]
    pub repository: Option<String>,
}

const USER_AGENT: &str = concat!("lockaudit/", env!("CARGO_PKG_VERSION"));
const GITHUB_API_VERSION: &str = "2022-11-28";

/// HTTP implementation of both collaborator traits.
///
/// Base URLs are overridable so tests can point at a local server; the
/// GitHub token is optional and only raises rate limits.
pub struct HttpApi {
    client: reqwest::Client,
    github_token: Option<String>,
    jsr_base: String,
    npm_base: String,
    denoland_base: String,
    github_base: String,
}

impl HttpApi {
    pub fn new(github_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            github_token,
            jsr_base: "https://api.jsr.io".to_string(),
            npm_base: "https://registry.npmjs.org".to_string(),
            denoland_base: "https://cdn.deno.land".to_string(),
            github_base: "https://api.github.com".to_string(),
        }
    }

    pub fn with_base_urls(
        mut self,
        jsr: impl Into<String>,
        npm: impl Into<String>,
        denoland: impl Into<String>,
        github: impl Into<String>,
    ) -> Self {
        self.jsr_base = jsr.into();
        self.npm_base = npm.into();
        self.denoland_base = denoland.into();
        self.github_base = github.into();
        self
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

impl Default for HttpApi {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl RegistryApi for HttpApi {
    async fn fetch_jsr_package(&self, scope: &str, name: &str) -> Result<JsrPackage, ApiError> {
        let url = format!("{}/scopes/{}/packages/{}", self.jsr_base, scope, name);
        self.get_json(&url).await
    }

    async fn fetch_npm_package(&self, name: &str) -> Result<NpmPackage, ApiError> {
        let url = format!("{}/{}", self.npm_base, name);
        self.get_json(&url).await
    }

    async fn fetch_denoland_meta(
        &self,
        module: &str,
        version: &str,
    ) -> Result<DenolandMeta, ApiError> {
        let url = format!(
            "{}/{}/versions/{}/meta/meta.json",
            self.denoland_base, module, version
        );
        self.get_json(&url).await
    }
}

#[async_trait]
impl AdvisorySource for HttpApi {
    async fn fetch_advisories(&self, owner: &str, repo: &str) -> Result<Vec<Advisory>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/security-advisories",
            self.github_base, owner, repo
        );

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);

        if let Some(token) = &self.github_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        // GitHub answers 404 for repositories it does not index; that is
        // "no advisories", not a failure.
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.json().await?)
    }
}
