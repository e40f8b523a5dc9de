//! `dbtcloud_apache_spark_credential`: Apache Spark credentials used through
//! a global connection. Only `schema` and `target_name` live on the
//! credential; host and cluster settings belong to the connection.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{from_value, ignore_not_found, parse_import_id, to_value, DataSource, Resource};
use crate::client::credentials::{Credential, CredentialPatch, APACHE_SPARK_ADAPTER_VERSION};
use crate::client::DbtCloudClient;
use crate::credential_details::{CredentialDetails, Template};
use crate::error::ProviderError;
use crate::id;
use crate::schema::{Attribute, Schema};

/// Type name of the resource and the data source.
pub const TYPE_NAME: &str = "dbtcloud_apache_spark_credential";

/// Name used in composite ID errors.
const ID_RESOURCE_NAME: &str = "apache_spark_credential";

/// Default of `target_name`.
pub const DEFAULT_TARGET_NAME: &str = "default";

pub(crate) const TARGET_NAME_DEPRECATION: &str = "This field is deprecated at the environment level \
(it was never possible to set it in the UI) and will be removed in a future release. Please remove \
it and set the target name at the job level or leverage environment variables.";

/// State of the resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApacheSparkCredentialModel {
    /// `project_id:credential_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Credential ID assigned by the API.
    #[serde(default)]
    pub credential_id: Option<i64>,
    /// Owning project.
    pub project_id: i64,
    /// Target name, `"default"` when unset.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Schema models are built in.
    #[serde(default)]
    pub schema: String,
}

impl ApacheSparkCredentialModel {
    fn target_name(&self) -> &str {
        self.target_name.as_deref().unwrap_or(DEFAULT_TARGET_NAME)
    }

    fn credential_details(&self) -> CredentialDetails {
        CredentialDetails::generate(
            Template::ApacheSpark,
            &[
                ("schema", json!(self.schema)),
                ("target_name", json!(self.target_name())),
            ],
        )
    }

    /// `(project_id, credential_id)`, preferring the explicit attributes and
    /// falling back to the composite `id`.
    fn ids(&self) -> Result<(i64, i64), ProviderError> {
        match self.credential_id {
            Some(credential_id) => Ok((self.project_id, credential_id)),
            None => Ok(id::decode(
                self.id.as_deref().unwrap_or_default(),
                ID_RESOURCE_NAME,
            )?),
        }
    }

    fn from_credential(credential: &Credential, credential_id: i64) -> Self {
        let details = &credential.unencrypted_credential_details;
        Self {
            id: Some(id::encode(credential.project_id, credential_id)),
            credential_id: Some(credential_id),
            project_id: credential.project_id,
            target_name: details
                .target_name
                .clone()
                .or_else(|| credential.target_name.clone()),
            schema: details.schema.clone().unwrap_or_default(),
        }
    }
}

/// State of the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApacheSparkCredentialDataSourceModel {
    /// `project_id:credential_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Credential to look up.
    pub credential_id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Target name.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Thread count.
    #[serde(default)]
    pub num_threads: Option<i64>,
    /// Schema models are built in.
    #[serde(default)]
    pub schema: Option<String>,
}

/// Resource adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApacheSparkCredentialResource;

#[async_trait::async_trait]
impl Resource for ApacheSparkCredentialResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Apache Spark credential resource")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The ID of this resource. Contains the project ID and the credential ID.",
                ),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64()
                    .with_force_new()
                    .with_description("Project ID to create the Apache Spark credential in"),
            )
            .with_attribute(
                "credential_id",
                Attribute::computed_int64()
                    .with_description("The system Apache Spark credential ID"),
            )
            .with_attribute(
                "target_name",
                Attribute::defaulted_string(DEFAULT_TARGET_NAME)
                    .with_description("Target name")
                    .with_deprecation(TARGET_NAME_DEPRECATION),
            )
            .with_attribute(
                "schema",
                Attribute::required_string()
                    .with_description("The schema where to create models"),
            )
    }

    async fn create(&self, client: &DbtCloudClient, planned: Value) -> Result<Value, ProviderError> {
        let mut model: ApacheSparkCredentialModel = from_value(planned)?;
        let credential = client
            .create_credential(
                model.project_id,
                APACHE_SPARK_ADAPTER_VERSION,
                model.credential_details(),
            )
            .await
            .map_err(|err| err.context("Error creating Apache Spark credential"))?;

        let credential_id = credential.require_id()?;
        model.id = Some(id::encode(credential.project_id, credential_id));
        model.credential_id = Some(credential_id);
        model.target_name = Some(model.target_name().to_string());
        info!(id = ?model.id, "created Apache Spark credential");
        to_value(&model)
    }

    async fn read(&self, client: &DbtCloudClient, state: Value) -> Result<Value, ProviderError> {
        let mut model: ApacheSparkCredentialModel = from_value(state)?;
        let (project_id, credential_id) = model.ids()?;

        let credential = client
            .get_credential(project_id, credential_id)
            .await
            .map_err(|err| {
                err.context(format!(
                    "Error reading Apache Spark credential {}",
                    id::encode(project_id, credential_id)
                ))
            })?;

        let details = credential.unencrypted_credential_details;
        model.schema = details.schema.unwrap_or_default();
        if let Some(target_name) = details.target_name {
            model.target_name = Some(target_name);
        }
        model.id = Some(id::encode(project_id, credential_id));
        model.credential_id = Some(credential_id);
        to_value(&model)
    }

    async fn update(
        &self,
        client: &DbtCloudClient,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ApacheSparkCredentialModel = from_value(prior)?;
        let mut planned: ApacheSparkCredentialModel = from_value(planned)?;
        let (project_id, credential_id) = prior.ids()?;

        let mut changed = planned.credential_details();
        changed.retain_changed(&prior.credential_details());

        if changed.is_empty() {
            debug!(project_id, credential_id, "no credential fields changed");
        } else {
            let patch = CredentialPatch {
                id: credential_id,
                credential_details: changed,
            };
            client
                .patch_credential(project_id, &patch)
                .await
                .map_err(|err| err.context("Error updating Apache Spark credential"))?;
        }

        planned.id = Some(id::encode(project_id, credential_id));
        planned.credential_id = Some(credential_id);
        planned.target_name = Some(planned.target_name().to_string());
        to_value(&planned)
    }

    async fn delete(&self, client: &DbtCloudClient, state: Value) -> Result<(), ProviderError> {
        let model: ApacheSparkCredentialModel = from_value(state)?;
        let (project_id, credential_id) = model.ids()?;

        ignore_not_found(client.delete_credential(project_id, credential_id).await)
            .map_err(|err| err.context("Error deleting Apache Spark credential"))
    }

    async fn import(&self, client: &DbtCloudClient, import_id: &str) -> Result<Value, ProviderError> {
        let (project_id, credential_id) = parse_import_id(import_id, ID_RESOURCE_NAME)?;

        let credential = client
            .get_credential(project_id, credential_id)
            .await
            .map_err(|err| err.context("Error getting Apache Spark credential"))?;

        to_value(&ApacheSparkCredentialModel::from_credential(
            &credential,
            credential_id,
        ))
    }
}

/// Data source adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApacheSparkCredentialDataSource;

#[async_trait::async_trait]
impl DataSource for ApacheSparkCredentialDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Apache Spark credential data source")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The ID of this data source. Contains the project ID and the credential ID.",
                ),
            )
            .with_attribute(
                "project_id",
                Attribute::required_int64().with_description("Project ID"),
            )
            .with_attribute(
                "credential_id",
                Attribute::required_int64().with_description("Credential ID"),
            )
            .with_attribute(
                "target_name",
                Attribute::computed_string().with_description("Target name"),
            )
            .with_attribute(
                "num_threads",
                Attribute::computed_int64().with_description("The number of threads to use"),
            )
            .with_attribute(
                "schema",
                Attribute::computed_string().with_description("The schema where to create models"),
            )
    }

    async fn read(&self, client: &DbtCloudClient, config: Value) -> Result<Value, ProviderError> {
        let query: ApacheSparkCredentialDataSourceModel = from_value(config)?;
        let credential = client
            .get_credential(query.project_id, query.credential_id)
            .await
            .map_err(|err| err.context("Error getting Apache Spark credential"))?;
        let credential_id = credential.require_id()?;

        to_value(&ApacheSparkCredentialDataSourceModel {
            id: Some(id::encode(query.project_id, credential_id)),
            credential_id,
            project_id: credential.project_id,
            target_name: credential.target_name,
            num_threads: Some(credential.threads),
            schema: credential.unencrypted_credential_details.schema,
        })
    }
}
