use async_trait::async_trait;
use cdnsync_core::{
    Backend, CdnApi, Domain, Error, Result, ServiceId, ServiceRecord, Settings, Validation,
    VersionInfo, VersionNumber,
};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use crate::wire::{self, Form};

/// Fastly API base URL
pub const FASTLY_API_BASE: &str = "https://api.fastly.com";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the API key
const AUTH_HEADER: &str = "Fastly-Key";

/// Fastly API v1 client
///
/// One HTTP request per trait call. No retries, no caching: failures go
/// straight back to the reconciler, which aborts the attempt.
///
/// # Security
///
/// The Debug implementation does NOT expose the API key.
pub struct FastlyClient {
    /// ⚠️ NEVER log this value
    api_key: String,
    base_url: Url,
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for FastlyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastlyClient")
            .field("api_key", &"<REDACTED>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl FastlyClient {
    /// Create a client for the public Fastly endpoint
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, FASTLY_API_BASE)
    }

    /// Create a client for a custom endpoint (proxies, tests)
    ///
    /// # Errors
    ///
    /// - Empty API key
    /// - Unparseable base URL
    /// - HTTP client construction failure
    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(Error::config("Fastly API key cannot be empty"));
        }

        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("Invalid Fastly base URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "Fastly base URL cannot hold a path: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url,
            client,
        })
    }

    // Segments are percent-encoded individually, so names containing '/'
    // or spaces stay within their segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config("Fastly base URL cannot hold a path"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn version_url(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        rest: &[&str],
    ) -> Result<Url> {
        let number = version.to_string();
        let mut segments = vec!["service", service.as_str(), "version", number.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    /// Send one request and decode the JSON response
    ///
    /// # Status mapping
    ///
    /// - 401/403 → [`Error::Authentication`]
    /// - 404 → [`Error::NotFound`]
    /// - 429 → [`Error::RateLimited`]
    /// - 5xx and anything else → [`Error::Provider`]
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        form: Option<Form>,
    ) -> Result<T> {
        tracing::debug!("Fastly {} {}", method, url.path());

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header(AUTH_HEADER, &self.api_key)
            .header("Accept", "application/json");
        if let Some(form) = &form {
            request = request.form(form);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let what = format!("{} {}", method, url.path());

            return Err(match status.as_u16() {
                401 | 403 => Error::auth(format!(
                    "Invalid API key or insufficient permissions ({}). Status: {}",
                    what, status
                )),
                404 => Error::not_found(format!("{}: {}", what, error_text)),
                429 => Error::rate_limited(format!(
                    "Rate limit exceeded ({}). Status: {}",
                    what, status
                )),
                500..=599 => Error::provider(
                    "fastly",
                    format!("Fastly server error: {} - {} - {}", what, status, error_text),
                ),
                _ => Error::provider(
                    "fastly",
                    format!("{} failed: {} - {}", what, status, error_text),
                ),
            });
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider("fastly", format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl CdnApi for FastlyClient {
    async fn create_service(&self, name: &str, comment: &str) -> Result<ServiceRecord> {
        let url = self.url(&["service"])?;
        let response: wire::ServiceResponse = self
            .request(Method::POST, url, Some(wire::service_form(name, comment)))
            .await?;

        tracing::info!("Created Fastly service {} ({})", response.name, response.id);

        // A new service only has its inactive draft
        let mut record: ServiceRecord = response.into();
        record.active_version = None;
        Ok(record)
    }

    async fn get_service(&self, service: &ServiceId) -> Result<ServiceRecord> {
        let url = self.url(&["service", service.as_str(), "details"])?;
        let response: wire::ServiceDetailsResponse = self.request(Method::GET, url, None).await?;
        Ok(response.into())
    }

    async fn update_service(&self, service: &ServiceId, name: &str) -> Result<ServiceRecord> {
        let url = self.url(&["service", service.as_str()])?;
        let response: wire::ServiceResponse = self
            .request(Method::PUT, url, Some(vec![("name", name.to_string())]))
            .await?;
        Ok(response.into())
    }

    async fn delete_service(&self, service: &ServiceId) -> Result<()> {
        let url = self.url(&["service", service.as_str()])?;
        let _: Value = self.request(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn list_services(&self) -> Result<Vec<ServiceRecord>> {
        let url = self.url(&["service"])?;
        let response: Vec<wire::ServiceResponse> = self.request(Method::GET, url, None).await?;
        Ok(response.into_iter().map(Into::into).collect())
    }

    async fn clone_version(
        &self,
        service: &ServiceId,
        from: VersionNumber,
    ) -> Result<VersionNumber> {
        let url = self.version_url(service, from, &["clone"])?;
        let response: wire::VersionResponse = self.request(Method::PUT, url, None).await?;
        Ok(VersionNumber::new(response.number))
    }

    async fn get_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<VersionInfo> {
        let url = self.version_url(service, version, &[])?;
        let response: wire::VersionResponse = self.request(Method::GET, url, None).await?;
        Ok(response.into())
    }

    async fn validate_version(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Validation> {
        let url = self.version_url(service, version, &["validate"])?;
        let response: wire::ValidationResponse = self.request(Method::GET, url, None).await?;
        Ok(response.into())
    }

    async fn activate_version(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        let url = self.version_url(service, version, &["activate"])?;
        let _: Value = self.request(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn deactivate_version(&self, service: &ServiceId, version: VersionNumber) -> Result<()> {
        let url = self.version_url(service, version, &["deactivate"])?;
        let _: Value = self.request(Method::PUT, url, None).await?;
        Ok(())
    }

    async fn get_settings(&self, service: &ServiceId, version: VersionNumber) -> Result<Settings> {
        let url = self.version_url(service, version, &["settings"])?;
        let response: wire::SettingsResponse = self.request(Method::GET, url, None).await?;
        Ok(response.into())
    }

    async fn update_settings(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        settings: &Settings,
    ) -> Result<()> {
        let url = self.version_url(service, version, &["settings"])?;
        let _: Value = self
            .request(Method::PUT, url, Some(wire::settings_form(settings)))
            .await?;
        Ok(())
    }

    async fn list_domains(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Vec<Domain>> {
        let url = self.version_url(service, version, &["domain"])?;
        let response: Vec<wire::DomainResponse> = self.request(Method::GET, url, None).await?;
        Ok(response.into_iter().map(Into::into).collect())
    }

    async fn create_domain(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        domain: &Domain,
    ) -> Result<()> {
        let url = self.version_url(service, version, &["domain"])?;
        let _: Value = self
            .request(Method::POST, url, Some(wire::domain_form(domain)))
            .await?;
        Ok(())
    }

    async fn delete_domain(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        name: &str,
    ) -> Result<()> {
        let url = self.version_url(service, version, &["domain", name])?;
        let _: Value = self.request(Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn list_backends(
        &self,
        service: &ServiceId,
        version: VersionNumber,
    ) -> Result<Vec<Backend>> {
        let url = self.version_url(service, version, &["backend"])?;
        let response: Vec<wire::BackendResponse> = self.request(Method::GET, url, None).await?;
        Ok(response.into_iter().map(Into::into).collect())
    }

    async fn create_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        backend: &Backend,
    ) -> Result<()> {
        let url = self.version_url(service, version, &["backend"])?;
        let _: Value = self
            .request(Method::POST, url, Some(wire::backend_form(backend)))
            .await?;
        Ok(())
    }

    async fn delete_backend(
        &self,
        service: &ServiceId,
        version: VersionNumber,
        name: &str,
    ) -> Result<()> {
        let url = self.version_url(service, version, &["backend", name])?;
        let _: Value = self.request(Method::DELETE, url, None).await?;
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fastly"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_rejected() {
        let result = FastlyClient::new("");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_api_key_not_exposed_in_debug() {
        let client = FastlyClient::new("secret_key_12345").unwrap();

        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_key_12345"));
        assert!(debug_str.contains("FastlyClient"));
    }

    #[test]
    fn test_version_url_encodes_names() {
        let client = FastlyClient::with_base_url("key", "http://localhost:8080").unwrap();
        let url = client
            .version_url(
                &ServiceId::new("SU1Z0isxPaozGVKXdv0eY"),
                VersionNumber::new(3),
                &["backend", "my origin"],
            )
            .unwrap();

        assert_eq!(
            url.path(),
            "/service/SU1Z0isxPaozGVKXdv0eY/version/3/backend/my%20origin"
        );
    }

    #[test]
    fn test_provider_name() {
        let client = FastlyClient::new("token").unwrap();
        assert_eq!(client.provider_name(), "fastly");
    }
}
