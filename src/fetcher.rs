use crate::{MetadataSource, PreviewError};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://open-apis.hax.cloud/api/services/website/metadata";

const DEFAULT_USER_AGENT: &str = "link-preview-card/0.1.0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the website metadata service.
///
/// One GET per call, no retries and no caching.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    endpoint: Url,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default()).unwrap_or_else(|e| {
            error!(error = %e, "Failed to create HTTP client");
            panic!("Failed to initialize HTTP client: {}", e);
        })
    }

    /// Creates a Fetcher from an explicit configuration.
    ///
    /// Fails if the endpoint is not an absolute URL or the HTTP client
    /// cannot be built.
    pub fn new_with_config(config: FetcherConfig) -> Result<Self, PreviewError> {
        let endpoint = Url::parse(&config.endpoint)?;

        let mut client_builder = Client::builder().user_agent(config.user_agent);

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(headers) = config.headers {
            client_builder = client_builder.default_headers(headers);
        }

        let client = client_builder
            .build()
            .map_err(|e| PreviewError::NetworkError(format!("Failed to build client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn with_client(client: Client, endpoint: &str) -> Result<Self, PreviewError> {
        Ok(Self {
            client,
            endpoint: Url::parse(endpoint)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Request URL for `link`, with the link percent-encoded into `q`.
    pub fn metadata_url(&self, link: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("q", link);
        url
    }

    #[instrument(level = "debug", skip(self), err)]
    pub async fn fetch(&self, link: &str) -> Result<Value, PreviewError> {
        let url = self.metadata_url(link);
        debug!(url = %url, "Starting metadata request");

        let response = self.client.get(url).send().await.map_err(|e| {
            error!(error = %e, link = %link, "Failed to send request");
            PreviewError::from_transport(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, link = %link, "Metadata service returned an error status");
            return Err(PreviewError::HttpStatusError(status.as_u16()));
        }

        let body = response.text().await.map_err(|e| {
            error!(error = %e, link = %link, "Failed to read response body");
            PreviewError::from_transport(e)
        })?;

        let json = serde_json::from_str::<Value>(&body)
            .map_err(|e| PreviewError::ParseError(e.to_string()))?;

        debug!(link = %link, content_length = body.len(), "Successfully fetched metadata");
        Ok(json)
    }
}

#[async_trait]
impl MetadataSource for Fetcher {
    async fn fetch_metadata(&self, link: &str) -> Result<Value, PreviewError> {
        self.fetch(link).await
    }
}

/// Settings for the metadata client.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     endpoint: "http://localhost:8080/metadata".to_string(),
///     timeout: None,
///     ..FetcherConfig::default()
/// })?;
/// ```
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub endpoint: String,
    pub user_agent: String,
    /// `None` waits on the network indefinitely.
    pub timeout: Option<Duration>,
    pub headers: Option<HeaderMap>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            headers: None,
        }
    }
}

impl FetcherConfig {
    /// Defaults, overridden by `LINK_PREVIEW_ENDPOINT` and
    /// `LINK_PREVIEW_TIMEOUT_SECS` (`0` disables the timeout).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("LINK_PREVIEW_ENDPOINT") {
            debug!(endpoint = %endpoint, "Using metadata endpoint from environment");
            config.endpoint = endpoint;
        }

        if let Ok(secs) = std::env::var("LINK_PREVIEW_TIMEOUT_SECS") {
            match secs.parse::<u64>() {
                Ok(0) => config.timeout = None,
                Ok(secs) => config.timeout = Some(Duration::from_secs(secs)),
                Err(e) => {
                    warn!(value = %secs, error = %e, "Ignoring invalid LINK_PREVIEW_TIMEOUT_SECS")
                }
            }
        }

        config
    }
}
