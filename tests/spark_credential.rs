mod common;

use common::{setup, FIRST_CREDENTIAL_ID, PROJECT_ID};
use dbtcloud_credentials_provider::resources::IMPORT_ERROR_SUMMARY;
use dbtcloud_credentials_provider::testing::{assert_plan_creates, ProviderTester};
use dbtcloud_credentials_provider::{DbtCloudProvider, ProviderError};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

const SPARK: &str = "dbtcloud_apache_spark_credential";

fn config(schema: &str) -> Value {
    json!({"project_id": PROJECT_ID, "schema": schema})
}

#[tokio::test]
async fn create_then_update_schema_patches_only_schema() {
    let (mock, tester) = setup().await;

    let created = assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);
    assert_eq!(created["id"], format!("{PROJECT_ID}:{FIRST_CREDENTIAL_ID}"));
    assert_eq!(created["credential_id"], FIRST_CREDENTIAL_ID);
    assert_eq!(created["schema"], "test_schema");
    assert_eq!(created["target_name"], "default");

    let body = mock.last_created_body();
    assert_eq!(body["type"], "adapter");
    assert_eq!(body["state"], 1);
    assert_eq!(body["threads"], 6);
    assert_eq!(body["adapter_version"], "apache_spark_v0");
    assert_eq!(body["credential_details"]["field_order"], json!([]));

    let updated = assert_ok!(
        tester
            .apply_update(SPARK, created.clone(), config("updated_schema"))
            .await
    );
    assert_eq!(updated["schema"], "updated_schema");
    assert_eq!(updated["id"], created["id"]);

    assert_eq!(mock.creates(), 1);
    assert_eq!(mock.updates(), 1);
    assert!(mock.reads() >= 1);

    let patches = mock.patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0]["id"], FIRST_CREDENTIAL_ID);
    let fields = patches[0]["credential_details"]["fields"]
        .as_object()
        .expect("patch carries a field map");
    assert_eq!(fields["schema"]["value"], "updated_schema");
    assert!(!fields.contains_key("target_name"));
}

#[tokio::test]
async fn update_without_changes_sends_no_patch() {
    let (mock, tester) = setup().await;

    let created = assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);
    let unchanged = assert_ok!(
        tester
            .apply_update(SPARK, created.clone(), config("test_schema"))
            .await
    );

    assert_eq!(unchanged, created);
    assert_eq!(mock.updates(), 0);
}

#[tokio::test]
async fn import_by_composite_id() {
    let (mock, tester) = setup().await;
    assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);

    let imported = assert_ok!(tester.import(SPARK, "67890:222").await);
    assert_eq!(imported["id"], "67890:222");
    assert_eq!(imported["project_id"], PROJECT_ID);
    assert_eq!(imported["credential_id"], 222);
    assert_eq!(imported["schema"], "test_schema");
    assert_eq!(imported["target_name"], "default");

    let reads = mock.reads();
    for bad in ["abc:222", "67890", "1:2:3", ""] {
        let err = assert_err!(tester.import(SPARK, bad).await);
        assert_eq!(err.to_diagnostic().summary, IMPORT_ERROR_SUMMARY, "{bad:?}");
    }
    assert_eq!(mock.reads(), reads);
}

#[tokio::test]
async fn read_sends_include_related() {
    let (mock, tester) = setup().await;
    assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);

    let queries = mock.read_queries.lock().unwrap().clone();
    assert!(!queries.is_empty());
    assert!(queries
        .iter()
        .all(|q| q.get("include_related").map(String::as_str) == Some("[adapter]")));
}

#[tokio::test]
async fn delete_of_missing_credential_succeeds() {
    let (mock, tester) = setup().await;

    let created = assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);
    assert_ok!(tester.destroy(SPARK, created.clone()).await);
    assert_ok!(tester.delete(SPARK, created.clone()).await);
    assert_eq!(mock.deletes(), 2);

    let err = assert_err!(tester.read(SPARK, created).await);
    assert!(err.is_not_found());
    assert!(err.to_string().contains("resource-not-found"));
}

#[tokio::test]
async fn update_of_missing_credential_fails() {
    let (_mock, tester) = setup().await;
    let prior = json!({
        "id": "67890:999",
        "credential_id": 999,
        "project_id": PROJECT_ID,
        "schema": "a",
        "target_name": "default"
    });

    let err = assert_err!(tester.update(SPARK, prior, config("b")).await);
    assert!(err.is_not_found());
    assert_eq!(err.to_diagnostic().summary, "Error updating Apache Spark credential");
}

#[tokio::test]
async fn update_uses_credential_id_without_composite_id() {
    let (mock, tester) = setup().await;
    let mut created = assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);
    created["id"] = Value::Null;

    let updated = assert_ok!(tester.update(SPARK, created, config("marts")).await);
    assert_eq!(updated["id"], format!("{PROJECT_ID}:{FIRST_CREDENTIAL_ID}"));
    assert_eq!(updated["credential_id"], FIRST_CREDENTIAL_ID);
    assert_eq!(mock.patches()[0]["id"], FIRST_CREDENTIAL_ID);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let (mock, tester) = setup().await;

    mock.fail_next(1, 503);
    assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);
    assert_eq!(mock.failures_served(), 1);
    assert_eq!(mock.creates(), 1);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (mock, tester) = setup().await;

    mock.fail_next(3, 400);
    let err = assert_err!(tester.apply_create(SPARK, config("test_schema")).await);
    assert_eq!(mock.failures_served(), 1);
    assert_eq!(mock.creates(), 0);
    assert_eq!(err.to_diagnostic().summary, "Error creating Apache Spark credential");
    assert!(err.to_string().contains("400-"));
}

#[tokio::test]
async fn missing_schema_fails_before_any_request() {
    let (mock, tester) = setup().await;

    let err = assert_err!(tester.plan_create(SPARK, json!({"project_id": PROJECT_ID})).await);
    assert!(matches!(err, ProviderError::Validation(_)));
    assert_eq!(mock.total_requests(), 0);
}

#[tokio::test]
async fn project_change_requires_replacement() {
    let (_mock, tester) = setup().await;

    let plan = assert_ok!(tester.plan_create(SPARK, config("test_schema")).await);
    assert_plan_creates(&plan);

    let created = assert_ok!(tester.create(SPARK, plan.planned_state).await);
    let plan = assert_ok!(
        tester
            .plan_update(SPARK, created, json!({"project_id": 1, "schema": "test_schema"}))
            .await
    );
    assert!(plan.requires_replace);
    assert_eq!(plan.planned_state["credential_id"], Value::Null);
}

#[tokio::test]
async fn data_source_reads_credential() {
    let (_mock, tester) = setup().await;
    assert_ok!(tester.apply_create(SPARK, config("test_schema")).await);

    let data = assert_ok!(
        tester
            .read_data_source(SPARK, json!({"project_id": PROJECT_ID, "credential_id": 222}))
            .await
    );
    assert_eq!(data["id"], "67890:222");
    assert_eq!(data["num_threads"], 6);
    assert_eq!(data["schema"], "test_schema");
    assert_eq!(data["target_name"], "default");

    let err = assert_err!(
        tester
            .read_data_source(SPARK, json!({"project_id": PROJECT_ID, "credential_id": 404}))
            .await
    );
    assert!(err.is_not_found());
}

#[tokio::test]
async fn wrong_token_is_rejected() {
    let (mock, addr) = common::spawn_mock().await;
    let tester = ProviderTester::new(DbtCloudProvider::new());
    let mut config_value = common::provider_config(addr);
    config_value["token"] = json!("wrong-token");
    assert_ok!(tester.configure(config_value).await);

    let err = assert_err!(tester.create(SPARK, json!({"project_id": PROJECT_ID, "schema": "s"})).await);
    assert!(matches!(
        err,
        ProviderError::Operation { ref source, .. }
            if matches!(**source, ProviderError::Api { status: 401, .. })
    ));
    assert_eq!(mock.creates(), 0);
}
