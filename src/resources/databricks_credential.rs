//! `dbtcloud_databricks_credential`: Databricks credentials, either for the
//! `databricks` adapter (with an optional Unity catalog) or the `spark`
//! adapter, optionally flagged for Semantic Layer use.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::spark_credential::{DEFAULT_TARGET_NAME, TARGET_NAME_DEPRECATION};
use super::{from_value, ignore_not_found, parse_import_id, to_value, DataSource, Resource};
use crate::client::credentials::{Credential, CredentialPatch, DATABRICKS_ADAPTER_VERSION};
use crate::client::DbtCloudClient;
use crate::credential_details::{CredentialDetails, Template};
use crate::error::ProviderError;
use crate::id;
use crate::schema::{Attribute, Diagnostic, Schema};
use crate::validation;

/// Type name of the resource and the data source.
pub const TYPE_NAME: &str = "dbtcloud_databricks_credential";

const ID_RESOURCE_NAME: &str = "databricks_credential";

/// `adapter_type` of the native Databricks adapter.
pub const ADAPTER_DATABRICKS: &str = "databricks";

/// `adapter_type` of the Spark adapter.
pub const ADAPTER_SPARK: &str = "spark";

/// Default of `schema`.
pub const DEFAULT_SCHEMA: &str = "default_schema";

/// State of the resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabricksCredentialModel {
    /// `project_id:credential_id`.
    #[serde(default)]
    pub id: Option<String>,
    /// Credential ID assigned by the API.
    #[serde(default)]
    pub credential_id: Option<i64>,
    /// Owning project.
    pub project_id: i64,
    /// Target name.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Personal access token. Never returned by the API.
    #[serde(default)]
    pub token: String,
    /// Unity catalog, `databricks` adapter only.
    #[serde(default)]
    pub catalog: Option<String>,
    /// Schema models are built in.
    #[serde(default)]
    pub schema: Option<String>,
    /// `databricks` or `spark`.
    #[serde(default)]
    pub adapter_type: Option<String>,
    /// Whether the credential serves the Semantic Layer.
    #[serde(default)]
    pub semantic_layer_credential: Option<bool>,
}

impl DatabricksCredentialModel {
    fn adapter_type(&self) -> &str {
        self.adapter_type.as_deref().unwrap_or(ADAPTER_DATABRICKS)
    }

    fn template(&self) -> Template {
        if self.adapter_type() == ADAPTER_SPARK {
            Template::DatabricksSpark
        } else {
            Template::Databricks
        }
    }

    fn credential_details(&self) -> CredentialDetails {
        CredentialDetails::generate(
            self.template(),
            &[
                ("token", json!(self.token)),
                ("catalog", json!(self.catalog.as_deref().unwrap_or_default())),
                ("schema", json!(self.schema.as_deref().unwrap_or(DEFAULT_SCHEMA))),
                (
                    "target_name",
                    json!(self.target_name.as_deref().unwrap_or(DEFAULT_TARGET_NAME)),
                ),
            ],
        )
    }

    fn ids(&self) -> Result<(i64, i64), ProviderError> {
        match self.credential_id {
            Some(credential_id) => Ok((self.project_id, credential_id)),
            None => Ok(id::decode(
                self.id.as_deref().unwrap_or_default(),
                ID_RESOURCE_NAME,
            )?),
        }
    }

    /// Fill defaults so state always carries concrete values.
    fn with_defaults(mut self) -> Self {
        self.target_name.get_or_insert_with(|| DEFAULT_TARGET_NAME.to_string());
        self.catalog.get_or_insert_with(String::new);
        self.schema.get_or_insert_with(|| DEFAULT_SCHEMA.to_string());
        self.adapter_type.get_or_insert_with(|| ADAPTER_DATABRICKS.to_string());
        self.semantic_layer_credential.get_or_insert(false);
        self
    }

    /// Overwrite the attributes the API reports back. `token` is kept.
    fn refresh(&mut self, credential: &Credential) {
        let details = &credential.unencrypted_credential_details;
        if let Some(schema) = &details.schema {
            self.schema = Some(schema.clone());
        }
        if let Some(target_name) = details.target_name.as_ref().or(credential.target_name.as_ref()) {
            self.target_name = Some(target_name.clone());
        }
        if self.adapter_type() == ADAPTER_DATABRICKS {
            self.catalog = Some(details.catalog.clone().unwrap_or_default());
        }
    }
}

/// The adapter behind an API credential. Only the Databricks field map
/// carries a `catalog`.
fn adapter_type_of(credential: &Credential) -> &'static str {
    if credential.credential_details.fields.contains_key("catalog") {
        ADAPTER_DATABRICKS
    } else {
        ADAPTER_SPARK
    }
}

/// State of the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabricksCredentialDataSourceModel {
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
    /// Unity catalog.
    #[serde(default)]
    pub catalog: Option<String>,
    /// Schema models are built in.
    #[serde(default)]
    pub schema: Option<String>,
    /// `databricks` or `spark`.
    #[serde(default)]
    pub adapter_type: Option<String>,
}

/// Resource adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabricksCredentialResource;

#[async_trait::async_trait]
impl Resource for DatabricksCredentialResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Databricks credential resource")
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
                    .with_description("Project ID to create the Databricks credential in"),
            )
            .with_attribute(
                "credential_id",
                Attribute::computed_int64().with_description("The system Databricks credential ID"),
            )
            .with_attribute(
                "target_name",
                Attribute::defaulted_string(DEFAULT_TARGET_NAME)
                    .with_description("Target name")
                    .with_deprecation(TARGET_NAME_DEPRECATION),
            )
            .with_attribute(
                "token",
                Attribute::required_string()
                    .sensitive()
                    .with_description("Token for Databricks user"),
            )
            .with_attribute(
                "catalog",
                Attribute::defaulted_string("").with_description(
                    "The catalog where to create models (only for the databricks adapter)",
                ),
            )
            .with_attribute(
                "schema",
                Attribute::defaulted_string(DEFAULT_SCHEMA).with_description(
                    "The schema where to create models. Optional only when \
                     semantic_layer_credential is set to true; otherwise, this field is required.",
                ),
            )
            .with_attribute(
                "adapter_type",
                Attribute::defaulted_string(ADAPTER_DATABRICKS)
                    .with_force_new()
                    .with_one_of(&[ADAPTER_DATABRICKS, ADAPTER_SPARK])
                    .with_description(
                        "The type of the adapter (databricks or spark). Optional only when \
                         semantic_layer_credential is set to true; otherwise, this field is required.",
                    ),
            )
            .with_attribute(
                "semantic_layer_credential",
                Attribute::defaulted_bool(false).with_description(
                    "This field indicates that the credential is used as part of the Semantic \
                     Layer configuration.",
                ),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);

        let semantic_layer = config
            .get("semantic_layer_credential")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !semantic_layer {
            for field in ["schema", "adapter_type"] {
                if config.get(field).is_none_or(Value::is_null) {
                    diagnostics.push(
                        Diagnostic::error(format!("Missing attribute '{field}'"))
                            .with_detail(format!(
                                "`{field}` must be provided when `semantic_layer_credential` is false."
                            ))
                            .with_attribute(field),
                    );
                }
            }
        }

        let spark_adapter =
            config.get("adapter_type").and_then(Value::as_str) == Some(ADAPTER_SPARK);
        let catalog = config.get("catalog").and_then(Value::as_str).unwrap_or_default();
        if spark_adapter && !catalog.is_empty() {
            diagnostics.push(
                Diagnostic::error("Invalid attribute 'catalog'")
                    .with_detail("`catalog` can only be set when `adapter_type` is `databricks`.")
                    .with_attribute("catalog"),
            );
        }
        diagnostics
    }

    async fn create(&self, client: &DbtCloudClient, planned: Value) -> Result<Value, ProviderError> {
        let mut model = from_value::<DatabricksCredentialModel>(planned)?.with_defaults();
        let credential = client
            .create_credential(
                model.project_id,
                DATABRICKS_ADAPTER_VERSION,
                model.credential_details(),
            )
            .await
            .map_err(|err| err.context("Error creating Databricks credential"))?;

        let credential_id = credential.require_id()?;
        model.id = Some(id::encode(credential.project_id, credential_id));
        model.credential_id = Some(credential_id);
        info!(
            id = ?model.id,
            adapter_type = model.adapter_type(),
            semantic_layer = model.semantic_layer_credential,
            "created Databricks credential"
        );
        to_value(&model)
    }

    async fn read(&self, client: &DbtCloudClient, state: Value) -> Result<Value, ProviderError> {
        let mut model = from_value::<DatabricksCredentialModel>(state)?.with_defaults();
        let (project_id, credential_id) = model.ids()?;

        let credential = client
            .get_credential(project_id, credential_id)
            .await
            .map_err(|err| {
                err.context(format!(
                    "Error reading Databricks credential {}",
                    id::encode(project_id, credential_id)
                ))
            })?;

        model.refresh(&credential);
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
        let prior = from_value::<DatabricksCredentialModel>(prior)?.with_defaults();
        let mut planned = from_value::<DatabricksCredentialModel>(planned)?.with_defaults();
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
                .map_err(|err| err.context("Error updating Databricks credential"))?;
        }

        planned.id = Some(id::encode(project_id, credential_id));
        planned.credential_id = Some(credential_id);
        to_value(&planned)
    }

    async fn delete(&self, client: &DbtCloudClient, state: Value) -> Result<(), ProviderError> {
        let model: DatabricksCredentialModel = from_value(state)?;
        let (project_id, credential_id) = model.ids()?;

        ignore_not_found(client.delete_credential(project_id, credential_id).await)
            .map_err(|err| err.context("Error deleting Databricks credential"))
    }

    async fn import(&self, client: &DbtCloudClient, import_id: &str) -> Result<Value, ProviderError> {
        let (project_id, credential_id) = parse_import_id(import_id, ID_RESOURCE_NAME)?;

        let credential = client
            .get_credential(project_id, credential_id)
            .await
            .map_err(|err| err.context("Error getting Databricks credential"))?;

        let mut model = DatabricksCredentialModel {
            id: Some(id::encode(project_id, credential_id)),
            credential_id: Some(credential_id),
            project_id,
            adapter_type: Some(adapter_type_of(&credential).to_string()),
            ..Default::default()
        }
        .with_defaults();
        model.refresh(&credential);
        to_value(&model)
    }
}

/// Data source adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatabricksCredentialDataSource;

#[async_trait::async_trait]
impl DataSource for DatabricksCredentialDataSource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Databricks credential data source")
            .with_attribute(
                "id",
                Attribute::computed_string().with_description(
                    "The ID of this resource. Contains the project ID and the credential ID.",
                ),
            )
            .with_attribute("project_id", Attribute::required_int64().with_description("Project ID"))
            .with_attribute(
                "credential_id",
                Attribute::required_int64().with_description("Credential ID"),
            )
            .with_attribute("target_name", Attribute::computed_string().with_description("Target name"))
            .with_attribute(
                "num_threads",
                Attribute::computed_int64().with_description("The number of threads to use"),
            )
            .with_attribute(
                "catalog",
                Attribute::computed_string().with_description("The catalog where to create models"),
            )
            .with_attribute(
                "schema",
                Attribute::computed_string().with_description("The schema where to create models"),
            )
            .with_attribute(
                "adapter_type",
                Attribute::computed_string()
                    .with_description("The type of the adapter (databricks or spark)"),
            )
    }

    async fn read(&self, client: &DbtCloudClient, config: Value) -> Result<Value, ProviderError> {
        let query: DatabricksCredentialDataSourceModel = from_value(config)?;
        let credential = client
            .get_credential(query.project_id, query.credential_id)
            .await
            .map_err(|err| err.context("Error getting Databricks credential"))?;
        let credential_id = credential.require_id()?;
        let adapter_type = adapter_type_of(&credential).to_string();
        let details = credential.unencrypted_credential_details;

        to_value(&DatabricksCredentialDataSourceModel {
            id: Some(id::encode(query.project_id, credential_id)),
            credential_id,
            project_id: credential.project_id,
            target_name: details.target_name.or(credential.target_name),
            num_threads: Some(credential.threads),
            catalog: details.catalog,
            schema: details.schema,
            adapter_type: Some(adapter_type),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(extra: Value) -> Value {
        let mut config = json!({"project_id": 1, "token": "dapi-secret"});
        if let (Some(base), Some(extra)) = (config.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        config
    }

    #[test]
    fn test_semantic_layer_relaxes_schema_requirement() {
        let resource = DatabricksCredentialResource;

        let diags = resource.validate(&config(json!({"adapter_type": "databricks"})));
        let error = diags
            .iter()
            .find(|d| d.is_error())
            .expect("missing schema must be reported");
        assert_eq!(error.attribute.as_deref(), Some("schema"));
        assert_eq!(
            error.detail.as_deref(),
            Some("`schema` must be provided when `semantic_layer_credential` is false.")
        );

        let diags = resource.validate(&config(json!({"semantic_layer_credential": true})));
        assert!(diags.iter().all(|d| !d.is_error()));

        let diags = resource.validate(&config(json!({"schema": "s", "adapter_type": "databricks"})));
        assert!(diags.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn test_adapter_type_is_constrained() {
        let diags = DatabricksCredentialResource
            .validate(&config(json!({"schema": "s", "adapter_type": "postgres"})));
        assert!(diags
            .iter()
            .any(|d| d.is_error() && d.attribute.as_deref() == Some("adapter_type")));
    }

    #[test]
    fn test_catalog_rejected_for_spark_adapter() {
        let resource = DatabricksCredentialResource;

        let diags = resource.validate(&config(
            json!({"schema": "s", "adapter_type": "spark", "catalog": "main"}),
        ));
        let error = diags
            .iter()
            .find(|d| d.is_error())
            .expect("catalog on the spark adapter must be reported");
        assert_eq!(error.attribute.as_deref(), Some("catalog"));

        for catalog in [json!(""), Value::Null] {
            let diags = resource.validate(&config(
                json!({"schema": "s", "adapter_type": "spark", "catalog": catalog}),
            ));
            assert!(diags.iter().all(|d| !d.is_error()));
        }

        let diags = resource.validate(&config(
            json!({"schema": "s", "adapter_type": "databricks", "catalog": "main"}),
        ));
        assert!(diags.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn test_template_follows_adapter_type() {
        let model = DatabricksCredentialModel {
            project_id: 1,
            token: "t".to_string(),
            catalog: Some("main".to_string()),
            ..Default::default()
        };
        let details = model.credential_details();
        assert_eq!(details.value("catalog"), Some(&json!("main")));
        assert_eq!(details.value("schema"), Some(&json!(DEFAULT_SCHEMA)));
        assert!(details.fields["token"].metadata.encrypt);

        let spark = DatabricksCredentialModel {
            adapter_type: Some(ADAPTER_SPARK.to_string()),
            ..model
        };
        let details = spark.credential_details();
        assert!(details.value("catalog").is_none());
        assert_eq!(details.fields.len(), 3);
    }

    #[test]
    fn test_token_change_patches_token_only() {
        let prior = DatabricksCredentialModel {
            project_id: 1,
            token: "old".to_string(),
            schema: Some("s".to_string()),
            ..Default::default()
        }
        .with_defaults();
        let planned = DatabricksCredentialModel {
            token: "new".to_string(),
            ..prior.clone()
        };

        let mut changed = planned.credential_details();
        changed.retain_changed(&prior.credential_details());
        let keys: Vec<&str> = changed.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["token"]);
    }
}
