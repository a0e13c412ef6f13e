//! An implementation of the provisioning client which talks to the remote
//! control plane over HTTPS.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use async_trait::async_trait;
use dps_provisioning::{
    AddAllowedAddressRequest, AllowlistEntry, Config, ConfigKey, ConfigValueRequest,
    CreateConfigRequest, CreateServiceRequest, DefaultCredentials, ProvisioningClient, Service,
    ServiceConfigState, UpdateConfigRequest, UpdateServiceRequest,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header scoping every request to an organization.
pub const ORG_HEADER: &str = "x-mdb-org";

const API_PREFIX: [&str; 2] = ["provisioning", "v1"];

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Options for building an [`HttpProvisioningClient`].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Origin of the API (e.g. `https://api.skysql.com`).
    pub base_url: Url,

    /// API key sent on every request.
    pub api_key: String,

    /// Organization to scope requests to, if any.
    pub org_id: Option<String>,

    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientOptions {
    /// Options with the default request timeout and no organization scoping.
    #[must_use]
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            base_url,
            api_key: api_key.into(),
            org_id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Scope every request to the given organization.
    #[must_use]
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }
}

/// HTTP implementation of [`ProvisioningClient`].
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Clone, Debug)]
pub struct HttpProvisioningClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpProvisioningClient {
    /// Creates a new client from the given options.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key or organization id cannot be used as a
    /// header value, if the base URL cannot carry a path, or if the underlying
    /// HTTP client cannot be built.
    pub fn new(options: ClientOptions) -> Result<Self> {
        if options.base_url.cannot_be_a_base() {
            return Err(Error::BaseUrl(options.base_url.to_string()));
        }

        let mut headers = HeaderMap::new();

        let mut api_key = HeaderValue::from_str(&options.api_key)
            .map_err(|_| Error::InvalidHeader(API_KEY_HEADER))?;
        api_key.set_sensitive(true);
        headers.insert(HeaderName::from_static(API_KEY_HEADER), api_key);

        if let Some(org_id) = options.org_id.as_deref().filter(|org| !org.is_empty()) {
            headers.insert(
                HeaderName::from_static(ORG_HEADER),
                HeaderValue::from_str(org_id).map_err(|_| Error::InvalidHeader(ORG_HEADER))?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(options.request_timeout)
            .user_agent(concat!("dps/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: options.base_url,
            client,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::BaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<(RequestBuilder, String)> {
        let url = self.url(segments)?;
        let label = format!("{method} {}", url.path());
        debug!("{label}");
        Ok((self.client.request(method, url), label))
    }

    async fn checked(label: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let (method, path) = split_label(label);
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::NotFound { method, path });
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Status {
            method,
            path,
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, label: &str) -> Result<T> {
        let response = Self::checked(label, request.send().await?).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|source| {
            let (method, path) = split_label(label);
            Error::Json {
                method,
                path,
                source,
            }
        })
    }

    async fn send_empty(request: RequestBuilder, label: &str) -> Result<()> {
        Self::checked(label, request.send().await?).await?;
        Ok(())
    }
}

fn split_label(label: &str) -> (String, String) {
    let (method, path) = label.split_once(' ').unwrap_or((label, ""));
    (method.to_string(), path.to_string())
}

#[async_trait]
impl ProvisioningClient for HttpProvisioningClient {
    type Error = Error;

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<Service> {
        let (builder, label) = self.request(Method::POST, &["services"])?;
        Self::send_json(builder.json(request), &label).await
    }

    async fn get_service(&self, service_id: &str) -> Result<Service> {
        let (builder, label) = self.request(Method::GET, &["services", service_id])?;
        Self::send_json(builder, &label).await
    }

    async fn update_service(
        &self,
        service_id: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service> {
        let (builder, label) = self.request(Method::PATCH, &["services", service_id])?;
        Self::send_json(builder.json(request), &label).await
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        let (builder, label) = self.request(Method::DELETE, &["services", service_id])?;
        Self::send_empty(builder, &label).await
    }

    async fn apply_service_config(&self, service_id: &str, config_id: &str) -> Result<()> {
        let (builder, label) = self.request(Method::POST, &["services", service_id, "config"])?;
        let body = ServiceConfigState {
            config_id: config_id.to_string(),
        };
        Self::send_empty(builder.json(&body), &label).await
    }

    async fn remove_service_config(&self, service_id: &str) -> Result<()> {
        let (builder, label) = self.request(Method::DELETE, &["services", service_id, "config"])?;
        Self::send_empty(builder, &label).await
    }

    async fn get_default_credentials(&self, service_id: &str) -> Result<DefaultCredentials> {
        let (builder, label) =
            self.request(Method::GET, &["services", service_id, "security", "credentials"])?;
        Self::send_json(builder, &label).await
    }

    async fn list_allowed_addresses(&self, service_id: &str) -> Result<Vec<AllowlistEntry>> {
        let (builder, label) =
            self.request(Method::GET, &["services", service_id, "security", "allowlist"])?;
        Self::send_json(builder, &label).await
    }

    async fn add_allowed_address(
        &self,
        service_id: &str,
        request: &AddAllowedAddressRequest,
    ) -> Result<AllowlistEntry> {
        let (builder, label) =
            self.request(Method::POST, &["services", service_id, "security", "allowlist"])?;
        Self::send_json(builder.json(request), &label).await
    }

    async fn remove_allowed_address(&self, service_id: &str, ip_address: &str) -> Result<()> {
        let (builder, label) = self.request(
            Method::DELETE,
            &["services", service_id, "security", "allowlist", ip_address],
        )?;
        Self::send_empty(builder, &label).await
    }

    async fn create_config(&self, request: &CreateConfigRequest) -> Result<Config> {
        let (builder, label) = self.request(Method::POST, &["configs"])?;
        Self::send_json(builder.json(request), &label).await
    }

    async fn get_config(&self, config_id: &str) -> Result<Config> {
        let (builder, label) = self.request(Method::GET, &["configs", config_id])?;
        Self::send_json(builder, &label).await
    }

    async fn update_config(&self, config_id: &str, request: &UpdateConfigRequest) -> Result<Config> {
        let (builder, label) = self.request(Method::PATCH, &["configs", config_id])?;
        Self::send_json(builder.json(request), &label).await
    }

    async fn delete_config(&self, config_id: &str) -> Result<()> {
        let (builder, label) = self.request(Method::DELETE, &["configs", config_id])?;
        Self::send_empty(builder, &label).await
    }

    async fn set_config_value(
        &self,
        config_id: &str,
        variable: &str,
        value: &str,
        allow_restart: bool,
    ) -> Result<()> {
        let (builder, label) =
            self.request(Method::POST, &["configs", config_id, "values", variable])?;
        let body = ConfigValueRequest {
            value: value.to_string(),
        };
        let builder = builder
            .query(&[("allow_restart", allow_restart)])
            .json(&body);
        Self::send_empty(builder, &label).await
    }

    async fn unset_config_value(
        &self,
        config_id: &str,
        variable: &str,
        allow_restart: bool,
    ) -> Result<()> {
        let (builder, label) =
            self.request(Method::DELETE, &["configs", config_id, "values", variable])?;
        let builder = builder.query(&[("allow_restart", allow_restart)]);
        Self::send_empty(builder, &label).await
    }

    async fn get_config_keys(&self, topology: &str, version: &str) -> Result<Vec<ConfigKey>> {
        let (builder, label) = self.request(Method::GET, &["topologies", topology, "configs"])?;
        Self::send_json(builder.query(&[("version", version)]), &label).await
    }
}
