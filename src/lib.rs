//! dbt Cloud credential provider
//!
//! Resources and data sources for **Apache Spark** and **Databricks**
//! credentials in dbt Cloud, served through the [`ProviderService`] contract
//! of an infrastructure-as-code host.
//!
//! # Overview
//!
//! - [`DbtCloudProvider`]: the provider, dispatching by type name
//! - [`resources`]: one adapter per resource / data source type
//! - [`client`]: the dbt Cloud v3 HTTP client (bearer auth, constant-interval retry)
//! - [`credential_details`]: credential field maps and the partial-update diff
//! - [`id`]: the `project_id:credential_id` composite ID
//! - [`plan`], [`schema`], [`validation`]: schema-driven planning and validation
//! - [`testing`]: a harness that drives a provider without the plugin transport
//!
//! # Types served
//!
//! | Type | Resource | Data source |
//! |---|---|---|
//! | `dbtcloud_apache_spark_credential` | yes | yes |
//! | `dbtcloud_databricks_credential` | yes | yes |
//!
//! # Quick Start
//!
//! ```no_run
//! use dbtcloud_credentials_provider::{DbtCloudProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), dbtcloud_credentials_provider::ProviderError> {
//! dbtcloud_credentials_provider::try_init_logging();
//!
//! let provider = DbtCloudProvider::new();
//! provider
//!     .configure(json!({"token": "dbtc_...", "account_id": 12345}))
//!     .await?;
//!
//! let state = provider
//!     .create(
//!         "dbtcloud_apache_spark_credential",
//!         json!({"project_id": 67890, "schema": "analytics", "target_name": "default"}),
//!     )
//!     .await?;
//! assert_eq!(state["id"], "67890:222");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod credential_details;
pub mod error;
pub mod id;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod validation;

pub use client::DbtCloudClient;
pub use config::ProviderConfig;
pub use credential_details::{CredentialDetails, Template};
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use plan::{plan_resource, AttributeChange, PlanResult};
pub use provider::DbtCloudProvider;
pub use schema::ProviderSchema;
pub use service::{ImportedResource, ProviderMetadata, ProviderService};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;

pub use serde_json;
pub use tracing;
