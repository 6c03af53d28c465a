//! Registry client with caching and rate-limit retry

use std::fs::File;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::download::download_artifact;
use super::retry::{with_retry, RetryPolicy};
use super::{split_full_name, Package, PackageCache, RegistryError};
use crate::http::HttpClient;

pub const DEFAULT_REGISTRY_URL: &str = "https://thunderstore.io";

/// Timeout for fetching a community's full package listing.
pub const LISTING_TIMEOUT: Duration = Duration::from_secs(30);

/// Thunderstore API client.
///
/// One instance is meant to be shared (via `Arc`) by every install in the
/// process so resolutions are cached across them.
pub struct RegistryClient {
    http: Arc<dyn HttpClient>,
    base_url: String,
    lookup_policy: RetryPolicy,
    download_policy: RetryPolicy,
    cache: PackageCache,
    /// Listing requests made this session
    request_count: AtomicUsize,
}

impl RegistryClient {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            lookup_policy: RetryPolicy::registry(),
            download_policy: RetryPolicy::download(),
            cache: PackageCache::new(),
            request_count: AtomicUsize::new(0),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policies(mut self, lookup: RetryPolicy, download: RetryPolicy) -> Self {
        self.lookup_policy = lookup;
        self.download_policy = download;
        self
    }

    pub fn http(&self) -> &Arc<dyn HttpClient> {
        &self.http
    }

    pub fn download_policy(&self) -> &RetryPolicy {
        &self.download_policy
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    pub fn listing_url(&self, community: &str) -> String {
        format!("{}/c/{}/api/v1/package/", self.base_url, community)
    }

    /// Resolves `<namespace>-<name>` within `community`.
    ///
    /// Malformed names and packages absent from the listing fail without
    /// retry. Successful resolutions are cached for the client's lifetime.
    pub fn resolve_package(
        &self,
        full_name: &str,
        community: &str,
    ) -> Result<Arc<Package>, RegistryError> {
        let (namespace, name) = split_full_name(full_name)?;

        if let Some(cached) = self.cache.get(community, full_name) {
            debug!("Cache hit for {} in {}", full_name, community);
            return Ok(cached);
        }

        let package = with_retry(
            &self.lookup_policy,
            &format!("resolve {}", full_name),
            || self.fetch_package(namespace, name, full_name, community),
        )?;

        let package = Arc::new(package);
        self.cache.insert(community, full_name, package.clone());
        Ok(package)
    }

    /// Downloads a package artifact with the download retry policy.
    pub fn download(&self, url: &str) -> Result<File, RegistryError> {
        download_artifact(self.http.as_ref(), &self.download_policy, url)
    }

    fn fetch_package(
        &self,
        namespace: &str,
        name: &str,
        full_name: &str,
        community: &str,
    ) -> Result<Package, RegistryError> {
        let url = self.listing_url(community);
        self.request_count.fetch_add(1, Ordering::Relaxed);
        debug!("Fetching package listing: {}", url);

        let response = self.http.get(&url, LISTING_TIMEOUT)?;
        if response.is_rate_limited() {
            return Err(RegistryError::RateLimited { url });
        }
        if !response.is_ok() {
            return Err(RegistryError::HttpStatus {
                url,
                status: response.status,
            });
        }

        let listing: Vec<Package> =
            serde_json::from_reader(response.body).map_err(|source| RegistryError::Parse {
                community: community.to_string(),
                source,
            })?;

        let mut package = listing
            .into_iter()
            .find(|p| p.matches(namespace, name))
            .ok_or_else(|| RegistryError::NotFound {
                full_name: full_name.to_string(),
                community: community.to_string(),
            })?;

        if package.is_deprecated {
            warn!("Package {} is deprecated", full_name);
        }

        package.order_versions();
        if let Some(latest) = package.latest() {
            info!("Resolved {} (latest {})", full_name, latest.version_number);
        } else {
            warn!("Package {} lists no versions", full_name);
        }

        Ok(package)
    }
}
