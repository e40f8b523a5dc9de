//! The dbt Cloud provider: dispatches host calls to the resource and data
//! source adapters by type name.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::DbtCloudClient;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::{plan_resource, PlanResult};
use crate::resources::{self, DataSource, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::{ImportedResource, ProviderMetadata, ProviderService};
use crate::validation;

/// Provider serving the Apache Spark and Databricks credential types.
pub struct DbtCloudProvider {
    client: RwLock<Option<Arc<DbtCloudClient>>>,
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSource>>,
}

impl Default for DbtCloudProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DbtCloudProvider {
    /// An unconfigured provider with every adapter registered.
    pub fn new() -> Self {
        Self {
            client: RwLock::new(None),
            resources: resources::resources()
                .into_iter()
                .map(|r| (r.type_name(), r))
                .collect(),
            data_sources: resources::data_sources()
                .into_iter()
                .map(|d| (d.type_name(), d))
                .collect(),
        }
    }

    /// Whether [`ProviderService::configure`] has succeeded.
    pub async fn is_configured(&self) -> bool {
        self.client.read().await.is_some()
    }

    async fn client(&self) -> Result<Arc<DbtCloudClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "the provider must be configured before managing resources".to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(resource_type)
            .map(|boxed| &**boxed)
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<&dyn DataSource, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .map(|boxed| &**boxed)
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

/// Fold the error diagnostics into one validation error, if any.
fn reject_invalid(diagnostics: &[Diagnostic]) -> Result<(), ProviderError> {
    let errors: Vec<String> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| match &d.detail {
            Some(detail) => format!("{}: {}", d.summary, detail),
            None => d.summary.clone(),
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::Validation(errors.join("; ")))
    }
}

#[async_trait::async_trait]
impl ProviderService for DbtCloudProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .values()
            .fold(schema, |s, r| s.with_resource(r.type_name(), r.schema()));
        self.data_sources
            .values()
            .fold(schema, |s, d| s.with_data_source(d.type_name(), d.schema()))
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|k| k.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|k| k.to_string()).collect(),
            plan_destroy: true,
        }
    }

    #[instrument(skip_all)]
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validation::validate(&ProviderConfig::schema(), &config))
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            warn!(diagnostics = diagnostics.len(), "provider configuration rejected");
            return Ok(diagnostics);
        }

        let client = match ProviderConfig::load(&config).and_then(|c| DbtCloudClient::new(&c)) {
            Ok(client) => client,
            Err(err) => {
                error!(error = %err, "provider configuration failed");
                return Ok(vec![err.to_diagnostic()]);
            }
        };

        info!(account_id = client.account_id(), "provider configured");
        *self.client.write().await = Some(Arc::new(client));
        Ok(diagnostics)
    }

    #[instrument(skip_all)]
    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        info!("provider stopped");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.resource(resource_type)?.validate(&config))
    }

    #[instrument(skip(self, state))]
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let current = self.resource(resource_type)?.schema().version;
        if u64::try_from(version).map_or(true, |v| v > current) {
            return Err(ProviderError::Validation(format!(
                "state version {version} of {resource_type} is newer than schema version {current}"
            )));
        }
        Ok(state)
    }

    #[instrument(skip(self, prior_state, proposed_state, config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        if !proposed_state.is_null() {
            reject_invalid(&resource.validate(&config))?;
        }

        let result = plan_resource(&resource.schema(), prior_state.as_ref(), &proposed_state);
        debug!(
            changes = result.changes.len(),
            requires_replace = result.requires_replace,
            "planned"
        );
        Ok(result)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.create(&client, planned_state).await.inspect_err(|err| {
            error!(error = %err, "create failed");
        })
    }

    #[instrument(skip(self, current_state))]
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.read(&client, current_state).await.inspect_err(|err| {
            error!(error = %err, "read failed");
        })
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource
            .update(&client, prior_state, planned_state)
            .await
            .inspect_err(|err| error!(error = %err, "update failed"))
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        resource.delete(&client, current_state).await.inspect_err(|err| {
            error!(error = %err, "delete failed");
        })
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;
        let state = resource
            .import(&client, id)
            .await
            .inspect_err(|err| error!(error = %err, "import failed"))?;
        info!("imported");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    #[instrument(skip(self, config))]
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(self.data_source(data_source_type)?.validate(&config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        reject_invalid(&data_source.validate(&config))?;
        let client = self.client().await?;
        data_source.read(&client, config).await.inspect_err(|err| {
            error!(error = %err, "data source read failed");
        })
    }
}
