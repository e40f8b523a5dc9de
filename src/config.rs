//! Provider configuration.
//!
//! Values are layered, lowest precedence first:
//!
//! 1. built-in defaults,
//! 2. `DBT_CLOUD_*` environment variables (`DBT_CLOUD_TOKEN`,
//!    `DBT_CLOUD_ACCOUNT_ID`, `DBT_CLOUD_HOST_URL`, ...),
//! 3. attributes set in the provider block.

use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Prefix of the environment variables read by [`ProviderConfig::load`].
pub const ENV_PREFIX: &str = "DBT_CLOUD_";

/// Default API base URL.
pub const DEFAULT_HOST_URL: &str = "https://cloud.getdbt.com/api";

/// Settings needed to talk to the dbt Cloud API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the API, including the `/api` suffix.
    pub host_url: String,
    /// API token sent as a bearer token.
    pub token: String,
    /// Account owning every project the provider manages.
    pub account_id: i64,
    /// How many times a failed request is sent again.
    pub max_retries: usize,
    /// Pause between retries.
    pub retry_interval_seconds: u64,
    /// HTTP statuses worth retrying. Accepts numbers, numeric strings or a
    /// comma-separated string (`"429,503"`).
    #[serde(deserialize_with = "deserialize_status_codes")]
    pub retriable_status_codes: Vec<u16>,
    /// Per-request timeout.
    pub timeout_seconds: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            host_url: DEFAULT_HOST_URL.to_string(),
            token: String::new(),
            account_id: 0,
            max_retries: 3,
            retry_interval_seconds: 10,
            retriable_status_codes: vec![429, 500, 502, 503, 504],
            timeout_seconds: 30,
        }
    }
}

impl ProviderConfig {
    /// Merge the provider block over the environment and defaults.
    ///
    /// `null` attributes in `config` count as unset.
    pub fn load(config: &Value) -> Result<Self, ProviderError> {
        let explicit: serde_json::Map<String, Value> = config
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["token"]));
        // Env values are parsed as TOML-like scalars, which would turn a
        // numeric token into an integer and drop leading zeros.
        if let Ok(token) = std::env::var(format!("{ENV_PREFIX}TOKEN")) {
            figment = figment.merge(Serialized::default("token", token));
        }

        let loaded: Self = figment
            .merge(Serialized::defaults(explicit))
            .extract()
            .map_err(|err| ProviderError::Configuration(err.to_string()))?;

        loaded.check()?;
        Ok(loaded)
    }

    fn check(&self) -> Result<(), ProviderError> {
        if self.token.is_empty() {
            return Err(ProviderError::Configuration(format!(
                "missing API token; set `token` or {ENV_PREFIX}TOKEN"
            )));
        }
        if self.account_id <= 0 {
            return Err(ProviderError::Configuration(format!(
                "missing account ID; set `account_id` or {ENV_PREFIX}ACCOUNT_ID"
            )));
        }
        self.base_url()?;
        self.status_codes()?;
        Ok(())
    }

    /// The API base URL without a trailing slash.
    pub fn base_url(&self) -> Result<String, ProviderError> {
        let url = Url::parse(&self.host_url).map_err(|err| {
            ProviderError::Configuration(format!("invalid host_url {:?}: {err}", self.host_url))
        })?;
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// `retriable_status_codes`, each checked to be an HTTP status.
    pub fn status_codes(&self) -> Result<Vec<u16>, ProviderError> {
        self.retriable_status_codes
            .iter()
            .map(|&code| {
                if (100..=599).contains(&code) {
                    Ok(code)
                } else {
                    Err(ProviderError::Configuration(format!(
                        "invalid retriable status code {code}"
                    )))
                }
            })
            .collect()
    }

    /// Pause between retries.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("dbt Cloud provider configuration")
            .with_attribute(
                "host_url",
                Attribute::optional_string().with_description(format!(
                    "API base URL, defaults to {DEFAULT_HOST_URL} ({ENV_PREFIX}HOST_URL)"
                )),
            )
            .with_attribute(
                "token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description(format!("API token ({ENV_PREFIX}TOKEN)")),
            )
            .with_attribute(
                "account_id",
                Attribute::optional_int64()
                    .with_description(format!("Account ID ({ENV_PREFIX}ACCOUNT_ID)")),
            )
            .with_attribute(
                "max_retries",
                Attribute::optional_int64().with_description("Retries per request, default 3"),
            )
            .with_attribute(
                "retry_interval_seconds",
                Attribute::optional_int64()
                    .with_description("Seconds between retries, default 10"),
            )
            .with_attribute(
                "retriable_status_codes",
                Attribute::new(
                    AttributeType::list(AttributeType::String),
                    AttributeFlags::optional(),
                )
                .with_description("HTTP statuses to retry, default 429, 500, 502, 503, 504"),
            )
            .with_attribute(
                "timeout_seconds",
                Attribute::optional_int64().with_description("Request timeout, default 30"),
            )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusCode {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusCodes {
    List(Vec<StatusCode>),
    One(StatusCode),
}

fn parse_status_code<E: de::Error>(code: StatusCode) -> Result<Vec<u16>, E> {
    let parse = |text: &str| {
        text.trim()
            .parse::<u16>()
            .map_err(|_| E::custom(format!("invalid retriable status code {text:?}")))
    };
    match code {
        StatusCode::Number(n) => u16::try_from(n)
            .map(|n| vec![n])
            .map_err(|_| E::custom(format!("invalid retriable status code {n}"))),
        StatusCode::Text(text) => text
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(parse)
            .collect(),
    }
}

fn deserialize_status_codes<'de, D>(deserializer: D) -> Result<Vec<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let codes = match StatusCodes::deserialize(deserializer)? {
        StatusCodes::List(list) => list,
        StatusCodes::One(one) => vec![one],
    };
    let mut parsed = Vec::with_capacity(codes.len());
    for code in codes {
        parsed.extend(parse_status_code::<D::Error>(code)?);
    }
    Ok(parsed)
}
