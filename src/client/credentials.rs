//! Credentials endpoints: `/v3/accounts/{account}/projects/{project}/credentials/`.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::DbtCloudClient;
use crate::credential_details::CredentialDetails;
use crate::error::ProviderError;

/// Value of `state` for an active credential.
pub const STATE_ACTIVE: i64 = 1;

/// Threads requested for every new credential.
pub const NUM_THREADS_CREDENTIAL: i64 = 6;

/// `type` of credentials backed by an adapter.
pub const ADAPTER_CREDENTIAL_TYPE: &str = "adapter";

/// Adapter version of Apache Spark credentials.
pub const APACHE_SPARK_ADAPTER_VERSION: &str = "apache_spark_v0";

/// Adapter version of Databricks credentials.
pub const DATABRICKS_ADAPTER_VERSION: &str = "databricks_v0";

/// Plain-text projection of the credential details, used for read-back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnencryptedCredentialDetails {
    /// Schema models are built in.
    #[serde(default)]
    pub schema: Option<String>,
    /// Target name exposed to dbt.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Thread count.
    #[serde(default)]
    pub threads: Option<i64>,
    /// Unity catalog (Databricks only).
    #[serde(default)]
    pub catalog: Option<String>,
}

/// A credential as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential ID; absent only before creation.
    pub id: Option<i64>,
    /// Owning account.
    pub account_id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Credential kind (`adapter`).
    #[serde(rename = "type")]
    pub credential_type: String,
    /// Status flag, [`STATE_ACTIVE`] when live.
    pub state: i64,
    /// Thread count.
    #[serde(default)]
    pub threads: i64,
    /// Target name exposed to dbt.
    #[serde(default)]
    pub target_name: Option<String>,
    /// Adapter version, e.g. [`DATABRICKS_ADAPTER_VERSION`].
    #[serde(default)]
    pub adapter_version: Option<String>,
    /// Full field map.
    #[serde(default)]
    pub credential_details: CredentialDetails,
    /// Plain-text projection of the field map.
    #[serde(default)]
    pub unencrypted_credential_details: UnencryptedCredentialDetails,
}

impl Credential {
    /// The credential ID, which every persisted credential has.
    pub fn require_id(&self) -> Result<i64, ProviderError> {
        self.id.ok_or_else(|| {
            ProviderError::InvalidResponse("credential without an ID".to_string())
        })
    }
}

/// Body of a create request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCredential<'a> {
    /// Always `None`; the API assigns the ID.
    pub id: Option<i64>,
    /// Owning account.
    pub account_id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Credential kind.
    #[serde(rename = "type")]
    pub credential_type: &'a str,
    /// Status flag.
    pub state: i64,
    /// Thread count.
    pub threads: i64,
    /// Adapter version.
    pub adapter_version: &'a str,
    /// Field values.
    pub credential_details: CredentialDetails,
}

/// Body of a partial update: only the fields that changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CredentialPatch {
    /// Credential being patched.
    pub id: i64,
    /// Changed fields only.
    pub credential_details: CredentialDetails,
}

impl DbtCloudClient {
    fn credentials_path(&self, project_id: i64) -> String {
        self.account_url(&format!("projects/{project_id}/credentials/"))
    }

    fn credential_path(&self, project_id: i64, credential_id: i64) -> String {
        self.account_url(&format!("projects/{project_id}/credentials/{credential_id}/"))
    }

    /// Fetch one credential with its adapter.
    pub async fn get_credential(
        &self,
        project_id: i64,
        credential_id: i64,
    ) -> Result<Credential, ProviderError> {
        debug!(project_id, credential_id, "fetching credential");
        self.send(
            Method::GET,
            &self.credential_path(project_id, credential_id),
            &[("include_related", "[adapter]")],
            None::<&()>,
        )
        .await
    }

    /// Create an active adapter credential.
    pub async fn create_credential(
        &self,
        project_id: i64,
        adapter_version: &str,
        credential_details: CredentialDetails,
    ) -> Result<Credential, ProviderError> {
        let body = NewCredential {
            id: None,
            account_id: self.account_id(),
            project_id,
            credential_type: ADAPTER_CREDENTIAL_TYPE,
            state: STATE_ACTIVE,
            threads: NUM_THREADS_CREDENTIAL,
            adapter_version,
            credential_details,
        };
        let credential: Credential = self
            .send(Method::POST, &self.credentials_path(project_id), &[], Some(&body))
            .await?;
        info!(project_id, credential_id = ?credential.id, adapter_version, "created credential");
        Ok(credential)
    }

    /// Send a partial update.
    pub async fn patch_credential(
        &self,
        project_id: i64,
        patch: &CredentialPatch,
    ) -> Result<Credential, ProviderError> {
        let fields: Vec<&str> = patch
            .credential_details
            .fields
            .keys()
            .map(String::as_str)
            .collect();
        info!(project_id, credential_id = patch.id, ?fields, "patching credential");
        self.send(
            Method::PATCH,
            &self.credential_path(project_id, patch.id),
            &[],
            Some(patch),
        )
        .await
    }

    /// Delete a credential. A missing credential surfaces as
    /// [`ProviderError::NotFound`]; callers decide whether that matters.
    pub async fn delete_credential(
        &self,
        project_id: i64,
        credential_id: i64,
    ) -> Result<(), ProviderError> {
        self.request_with_retry(
            Method::DELETE,
            &self.credential_path(project_id, credential_id),
            &[],
            None,
        )
        .await?;
        info!(project_id, credential_id, "deleted credential");
        Ok(())
    }
}
