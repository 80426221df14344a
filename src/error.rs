//! Error types.
//!
//! [`AuditError`] covers failures that abort a run; remote lookups report
//! [`ApiError`] and are handled soft by the callers, so a flaky registry
//! never kills an audit.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for an audit run.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("failed to read lock file {path}")]
    LockFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lock file {path}: {reason}")]
    LockFileParse { path: PathBuf, reason: String },

    #[error("unknown resolver '{0}'")]
    UnknownResolver(String),
}

/// Errors from remote metadata and advisory lookups.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_error_messages_name_the_path() {
        let err = AuditError::LockFileParse {
            path: PathBuf::from("deno.lock"),
            reason: "expected value at line 1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to parse lock file deno.lock: expected value at line 1"
        );

        let err = AuditError::UnknownResolver("yarn-lock".to_string());
        assert_eq!(err.to_string(), "unknown resolver 'yarn-lock'");
    }

    #[test]
    fn api_status_error_names_the_url() {
        let err = ApiError::Status {
            status: 403,
            url: "https://api.github.com/repos/a/b/security-advisories".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected status 403 from https://api.github.com/repos/a/b/security-advisories"
        );
    }
}
