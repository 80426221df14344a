pub mod api;
pub mod config;
pub mod error;
pub mod matcher;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod resolver;

pub use config::Config;
pub use error::{ApiError, AuditError};
pub use model::{
    Advisory, GithubRepo, Origin, Package, ResolvedPackage, Severity, Vulnerability,
};
pub use pipeline::{resolve_packages, ResolutionOutcome, ResolveOptions};
pub use resolver::Resolver;
