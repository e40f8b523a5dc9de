//! Credential-details field maps.
//!
//! The credentials API stores adapter settings as a map of field name to a
//! descriptor (`metadata` plus `value`). Requests are built from fixed JSON
//! templates so the payload follows the API's own field definitions; partial
//! updates reuse the same map with the unchanged fields removed.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Validation rules attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValidation {
    /// Whether the API requires a value.
    #[serde(default)]
    pub required: bool,
}

/// Descriptive metadata for a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    /// Human-readable label.
    #[serde(default)]
    pub label: String,
    /// Help text.
    #[serde(default)]
    pub description: String,
    /// Input kind, e.g. `text`.
    #[serde(default)]
    pub field_type: String,
    /// Whether the API stores the value encrypted.
    #[serde(default)]
    pub encrypt: bool,
    /// Whether environments may override the value.
    #[serde(default)]
    pub overrideable: bool,
    /// Server-side validation rules.
    #[serde(default)]
    pub validation: FieldValidation,
}

/// A single field: metadata plus its current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialField {
    /// Field description.
    #[serde(default)]
    pub metadata: FieldMetadata,
    /// Field value.
    #[serde(default)]
    pub value: Value,
}

/// The `credential_details` object of a credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialDetails {
    /// Fields keyed by name.
    #[serde(default)]
    pub fields: BTreeMap<String, CredentialField>,
    /// Display order; always sent empty.
    #[serde(default)]
    pub field_order: Vec<String>,
}

/// Which field template a credential is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    /// Apache Spark through a global connection: `schema`, `target_name`.
    ApacheSpark,
    /// Databricks adapter: `token`, `catalog`, `schema`, `target_name`.
    Databricks,
    /// Spark adapter managed through the Databricks resource: `token`,
    /// `schema`, `target_name`.
    DatabricksSpark,
}

const APACHE_SPARK_TEMPLATE: &str = r#"{
  "fields": {
    "schema": {
      "metadata": {
        "label": "Schema",
        "description": "User schema.",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": true }
      },
      "value": ""
    },
    "target_name": {
      "metadata": {
        "label": "Target Name",
        "description": "",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": false }
      },
      "value": ""
    }
  }
}"#;

const DATABRICKS_TEMPLATE: &str = r#"{
  "fields": {
    "token": {
      "metadata": {
        "label": "Token",
        "description": "Personalized user token.",
        "field_type": "text",
        "encrypt": true,
        "overrideable": false,
        "validation": { "required": true }
      },
      "value": ""
    },
    "catalog": {
      "metadata": {
        "label": "Catalog",
        "description": "Catalog name if Unity Catalog is enabled in your Databricks workspace.",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": false }
      },
      "value": ""
    },
    "schema": {
      "metadata": {
        "label": "Schema",
        "description": "User schema.",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": true }
      },
      "value": ""
    },
    "target_name": {
      "metadata": {
        "label": "Target Name",
        "description": "",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": false }
      },
      "value": ""
    }
  }
}"#;

const DATABRICKS_SPARK_TEMPLATE: &str = r#"{
  "fields": {
    "token": {
      "metadata": {
        "label": "Token",
        "description": "Personalized user token.",
        "field_type": "text",
        "encrypt": true,
        "overrideable": false,
        "validation": { "required": true }
      },
      "value": ""
    },
    "schema": {
      "metadata": {
        "label": "Schema",
        "description": "User schema.",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": true }
      },
      "value": ""
    },
    "target_name": {
      "metadata": {
        "label": "Target Name",
        "description": "",
        "field_type": "text",
        "encrypt": false,
        "overrideable": false,
        "validation": { "required": false }
      },
      "value": ""
    }
  }
}"#;

fn parse_template(name: &str, raw: &str) -> CredentialDetails {
    serde_json::from_str(raw)
        .unwrap_or_else(|err| panic!("built-in {name} credential template is invalid: {err}"))
}

static APACHE_SPARK: LazyLock<CredentialDetails> =
    LazyLock::new(|| parse_template("apache spark", APACHE_SPARK_TEMPLATE));
static DATABRICKS: LazyLock<CredentialDetails> =
    LazyLock::new(|| parse_template("databricks", DATABRICKS_TEMPLATE));
static DATABRICKS_SPARK: LazyLock<CredentialDetails> =
    LazyLock::new(|| parse_template("databricks spark", DATABRICKS_SPARK_TEMPLATE));

impl Template {
    fn defaults(self) -> &'static CredentialDetails {
        match self {
            Self::ApacheSpark => &APACHE_SPARK,
            Self::Databricks => &DATABRICKS,
            Self::DatabricksSpark => &DATABRICKS_SPARK,
        }
    }
}

impl CredentialDetails {
    /// Build a field map from `template`, filling each field's value from
    /// `values`. Template fields with no input get a `null` value.
    pub fn generate(template: Template, values: &[(&str, Value)]) -> Self {
        let fields = template
            .defaults()
            .fields
            .iter()
            .map(|(key, field)| {
                let value = values
                    .iter()
                    .find(|(name, _)| *name == key.as_str())
                    .map(|(_, value)| value.clone())
                    .unwrap_or(Value::Null);
                let field = CredentialField {
                    metadata: field.metadata.clone(),
                    value,
                };
                (key.clone(), field)
            })
            .collect();

        Self {
            fields,
            field_order: Vec::new(),
        }
    }

    /// Drop every field whose value equals the value of the same field in
    /// `prior`, leaving only what a PATCH has to send.
    pub fn retain_changed(&mut self, prior: &CredentialDetails) {
        self.fields.retain(|key, field| {
            prior
                .fields
                .get(key)
                .is_none_or(|old| old.value != field.value)
        });
    }

    /// Whether no field is left to send.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The value of a field, if present.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).map(|field| &field.value)
    }
}
