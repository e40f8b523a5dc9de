//! HTTP client for the dbt Cloud v3 API.
//!
//! Every call goes through [`DbtCloudClient::request_with_retry`], which
//! attaches the bearer token, retries transient failures at a constant
//! interval and maps a 404 to [`ProviderError::NotFound`].

pub mod credentials;

use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

/// The `status` object of every API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    /// HTTP status echoed by the API.
    #[serde(default)]
    pub code: u16,
    /// Whether the API considers the call successful.
    #[serde(default)]
    pub is_success: bool,
    /// Message meant for end users.
    #[serde(default)]
    pub user_message: Option<String>,
    /// Message meant for developers.
    #[serde(default)]
    pub developer_message: Option<String>,
}

/// Response envelope: `{ "data": ..., "status": ... }`.
///
/// `T` is an entity for single-object endpoints and `Vec<entity>` for lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// The payload.
    pub data: T,
    /// Call status.
    #[serde(default)]
    pub status: ResponseStatus,
}

/// Client bound to one account.
#[derive(Debug, Clone)]
pub struct DbtCloudClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    account_id: i64,
    max_retries: usize,
    retry_interval: Duration,
    retriable_status_codes: Vec<u16>,
}

impl DbtCloudClient {
    /// Build a client from a validated configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url()?,
            token: config.token.clone(),
            account_id: config.account_id,
            max_retries: config.max_retries,
            retry_interval: config.retry_interval(),
            retriable_status_codes: config.status_codes()?,
        })
    }

    /// The account every request is scoped to.
    pub fn account_id(&self) -> i64 {
        self.account_id
    }

    /// Absolute URL for an account-scoped path such as `projects/1/credentials/`.
    pub fn account_url(&self, path: &str) -> String {
        format!(
            "{}/v3/accounts/{}/{}",
            self.base_url,
            self.account_id,
            path.trim_start_matches('/')
        )
    }

    /// Send a request and decode the `data` of the response envelope.
    pub async fn send<T, B>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = body.map(serde_json::to_vec).transpose()?;
        let text = self
            .request_with_retry(method, url, query, body.as_deref())
            .await?;
        let envelope: Envelope<T> = serde_json::from_str(&text)?;
        Ok(envelope.data)
    }

    /// Send a request, retrying transient failures, and return the raw body
    /// of the first successful response.
    pub async fn request_with_retry(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let policy = ConstantBuilder::default()
            .with_delay(self.retry_interval)
            .with_max_times(self.max_retries);

        (|| async { self.request_once(method.clone(), url, query, body).await })
            .retry(policy)
            .when(|err: &ProviderError| err.is_retryable(&self.retriable_status_codes))
            .notify(|err, dur: Duration| {
                warn!(%method, url, error = %err, "retrying dbt Cloud request after {:?}", dur);
            })
            .await
    }

    async fn request_once(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<String, ProviderError> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(&self.token)
            .query(query);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(%method, url, status = status.as_u16(), "dbt Cloud API responded");

        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(format!("{method} {url}: {text}")));
        }
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}
