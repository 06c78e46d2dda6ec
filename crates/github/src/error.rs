use std::path::PathBuf;

use thiserror::Error;

/// The platform rejected our credentials for an installation. Never retried
/// here; the calling operation aborts and logs.
#[derive(Debug, Error)]
#[error("authorization failed for installation {installation_id}")]
pub struct AuthError {
    pub installation_id: u64,
    #[source]
    pub source: octocrab::Error,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    /// Terminal: re-listing will not produce a missing artifact.
    #[error("no artifact matching {label:?} attached to {owner}/{repo} run {run_id}")]
    NotFound { owner: String, repo: String, run_id: u64, label: String },
    #[error("failed to list artifacts for {owner}/{repo} run {run_id}")]
    List {
        owner: String,
        repo: String,
        run_id: u64,
        #[source]
        source: octocrab::Error,
    },
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request for {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("transfer to {} interrupted", path.display())]
    Transfer {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("writing {} failed", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("fetching download location {route} failed")]
    Api {
        route: String,
        #[source]
        source: octocrab::Error,
    },
    #[error("expected a redirect from {route}, got status {status}")]
    NoRedirect { route: String, status: u16 },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("workflow dispatch for {owner}/{repo} failed")]
    Request {
        owner: String,
        repo: String,
        #[source]
        source: octocrab::Error,
    },
    /// Dispatch endpoints are not idempotent, so a bad status is surfaced
    /// as-is; whether to retry is the caller's decision.
    #[error("workflow dispatch for {owner}/{repo} returned status {status}")]
    Status { owner: String, repo: String, status: u16 },
}
