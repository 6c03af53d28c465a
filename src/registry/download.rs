//! Artifact download to a temporary file.

use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::time::Duration;

use tracing::debug;

use super::retry::{with_retry_if, RetryPolicy};
use super::RegistryError;
use crate::http::HttpClient;

/// Timeout for a single artifact download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Downloads `url` into an anonymous temporary file, retrying on HTTP 429.
///
/// The returned file is positioned at offset 0. It is deleted when dropped.
pub fn download_artifact(
    http: &dyn HttpClient,
    policy: &RetryPolicy,
    url: &str,
) -> Result<File, RegistryError> {
    let operation = format!("download {}", url);
    with_retry_if(policy, &operation, RegistryError::is_too_many_requests, || {
        let mut response = http.get(url, DOWNLOAD_TIMEOUT)?;

        if response.is_rate_limited() {
            return Err(RegistryError::RateLimited {
                url: url.to_string(),
            });
        }
        if !response.is_ok() {
            return Err(RegistryError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }

        let io_err = |source: io::Error| RegistryError::Io {
            url: url.to_string(),
            source,
        };

        let mut file = tempfile::tempfile().map_err(io_err)?;
        let written = io::copy(&mut response.body, &mut file).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(file)
    })
}
