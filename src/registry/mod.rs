//! Thunderstore package registry
//!
//! Resolves `<namespace>-<name>` packages within a community, with a
//! per-process cache and bounded retry on rate limiting, and downloads
//! package artifacts to temporary files.

mod cache;
mod client;
mod download;
mod retry;
mod types;

pub use cache::PackageCache;
pub use client::{RegistryClient, DEFAULT_REGISTRY_URL, LISTING_TIMEOUT};
pub use download::{download_artifact, DOWNLOAD_TIMEOUT};
pub use retry::{with_retry, with_retry_if, BackoffShape, RetryPolicy};
pub use types::{Package, PackageVersion};

use thiserror::Error;

use crate::http::TransportError;

/// Errors from registry lookups and artifact downloads.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid package name '{0}': expected <namespace>-<name>")]
    InvalidName(String),

    #[error("package {full_name} not found in community '{community}'")]
    NotFound { full_name: String, community: String },

    #[error("rate limited by {url} (HTTP 429)")]
    RateLimited { url: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to parse package listing for community '{community}'")]
    Parse {
        community: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error while downloading {url}")]
    Io {
        url: String,
        #[source]
        source: std::io::Error,
    },

    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    /// True for failures worth retrying: HTTP 429, or any error whose
    /// message mentions a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            RegistryError::RateLimited { .. } => true,
            RegistryError::HttpStatus { status, .. } => {
                *status == crate::http::STATUS_TOO_MANY_REQUESTS
            }
            RegistryError::Transport(e) => e.message.to_lowercase().contains("rate limit"),
            RegistryError::InvalidName(_)
            | RegistryError::NotFound { .. }
            | RegistryError::RetriesExhausted { .. } => false,
            other => other.to_string().to_lowercase().contains("rate limit"),
        }
    }

    /// True only for an HTTP 429 answer.
    pub fn is_too_many_requests(&self) -> bool {
        match self {
            RegistryError::RateLimited { .. } => true,
            RegistryError::HttpStatus { status, .. } => {
                *status == crate::http::STATUS_TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

/// Splits `<namespace>-<name>` on the first hyphen.
///
/// Both halves must be non-empty.
pub fn split_full_name(full_name: &str) -> Result<(&str, &str), RegistryError> {
    match full_name.split_once('-') {
        Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace, name))
        }
        _ => Err(RegistryError::InvalidName(full_name.to_string())),
    }
}
