//! Resource and data source adapters.
//!
//! Each adapter maps one declarative type onto the credentials API. The
//! provider looks adapters up by type name and hands them the configured
//! [`DbtCloudClient`]; adapters own no state of their own.

pub mod databricks_credential;
pub mod spark_credential;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::client::DbtCloudClient;
use crate::error::ProviderError;
use crate::id;
use crate::schema::{Diagnostic, Schema};
use crate::validation;

pub use databricks_credential::{DatabricksCredentialDataSource, DatabricksCredentialResource};
pub use spark_credential::{ApacheSparkCredentialDataSource, ApacheSparkCredentialResource};

/// Summary of every failed import.
pub const IMPORT_ERROR_SUMMARY: &str = "Unexpected Import Identifier";

/// CRUD and import for one resource type.
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// The resource type name, e.g. `dbtcloud_apache_spark_credential`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Validate a configuration against the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Create the remote object and return the new state.
    async fn create(&self, client: &DbtCloudClient, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh `state` from the API.
    async fn read(&self, client: &DbtCloudClient, state: Value) -> Result<Value, ProviderError>;

    /// Apply the difference between `prior` and `planned`.
    async fn update(
        &self,
        client: &DbtCloudClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object. Deleting a missing object succeeds.
    async fn delete(&self, client: &DbtCloudClient, state: Value) -> Result<(), ProviderError>;

    /// Build state for an existing object from its composite ID.
    async fn import(&self, client: &DbtCloudClient, id: &str) -> Result<Value, ProviderError>;
}

/// Read-only lookup for one data source type.
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    /// The data source type name.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Validate a configuration against the schema.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Look the object up and return the populated attributes.
    async fn read(&self, client: &DbtCloudClient, config: Value) -> Result<Value, ProviderError>;
}

/// Every resource the provider serves.
pub fn resources() -> Vec<Box<dyn Resource>> {
    vec![
        Box::new(ApacheSparkCredentialResource),
        Box::new(DatabricksCredentialResource),
    ]
}

/// Every data source the provider serves.
pub fn data_sources() -> Vec<Box<dyn DataSource>> {
    vec![
        Box::new(ApacheSparkCredentialDataSource),
        Box::new(DatabricksCredentialDataSource),
    ]
}

/// Decode a state or config object into its typed model.
pub(crate) fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(value)?)
}

/// Encode a typed model back into a state object.
pub(crate) fn to_value<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// Parse an import ID, titling any failure [`IMPORT_ERROR_SUMMARY`].
pub(crate) fn parse_import_id(
    import_id: &str,
    resource_type: &str,
) -> Result<(i64, i64), ProviderError> {
    id::decode(import_id, resource_type)
        .map_err(|err| ProviderError::from(err).context(IMPORT_ERROR_SUMMARY))
}

/// Treat a 404 as success; the object is already gone.
pub(crate) fn ignore_not_found(result: Result<(), ProviderError>) -> Result<(), ProviderError> {
    match result {
        Err(err) if err.is_not_found() => Ok(()),
        other => other,
    }
}
