//! In-process mock of the dbt Cloud credentials API.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, AtomicU16, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dbtcloud_credentials_provider::testing::ProviderTester;
use dbtcloud_credentials_provider::DbtCloudProvider;
use serde_json::{json, Value};

pub const ACCOUNT_ID: i64 = 12345;
pub const PROJECT_ID: i64 = 67890;
pub const FIRST_CREDENTIAL_ID: i64 = 222;
pub const TOKEN: &str = "dummy-token";

#[derive(Debug)]
pub struct MockApi {
    pub creates: AtomicUsize,
    pub reads: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
    pub failures_served: AtomicUsize,
    next_id: AtomicI64,
    fail_remaining: AtomicUsize,
    fail_status: AtomicU16,
    credentials: Mutex<BTreeMap<i64, Value>>,
    pub created_bodies: Mutex<Vec<Value>>,
    pub patch_bodies: Mutex<Vec<Value>>,
    pub read_queries: Mutex<Vec<HashMap<String, String>>>,
}

impl Default for MockApi {
    fn default() -> Self {
        Self {
            creates: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            failures_served: AtomicUsize::new(0),
            next_id: AtomicI64::new(FIRST_CREDENTIAL_ID),
            fail_remaining: AtomicUsize::new(0),
            fail_status: AtomicU16::new(503),
            credentials: Mutex::new(BTreeMap::new()),
            created_bodies: Mutex::new(Vec::new()),
            patch_bodies: Mutex::new(Vec::new()),
            read_queries: Mutex::new(Vec::new()),
        }
    }
}

impl MockApi {
    /// Answer the next `times` requests with `status`.
    pub fn fail_next(&self, times: usize, status: u16) {
        self.fail_status.store(status, Ordering::SeqCst);
        self.fail_remaining.store(times, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn failures_served(&self) -> usize {
        self.failures_served.load(Ordering::SeqCst)
    }

    pub fn total_requests(&self) -> usize {
        self.creates() + self.reads() + self.updates() + self.deletes() + self.failures_served()
    }

    pub fn patches(&self) -> Vec<Value> {
        self.patch_bodies.lock().unwrap().clone()
    }

    pub fn last_created_body(&self) -> Value {
        self.created_bodies.lock().unwrap().last().cloned().unwrap_or(Value::Null)
    }

    fn injected_failure(&self) -> Option<Response> {
        self.fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()?;
        self.failures_served.fetch_add(1, Ordering::SeqCst);
        let status = StatusCode::from_u16(self.fail_status.load(Ordering::SeqCst))
            .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        Some(envelope(status, Value::Null, "injected failure"))
    }
}

fn envelope(status: StatusCode, data: Value, message: &str) -> Response {
    let body = json!({
        "data": data,
        "status": {
            "code": status.as_u16(),
            "is_success": status.is_success(),
            "user_message": message,
            "developer_message": ""
        }
    });
    (status, Json(body)).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {TOKEN}"))
}

fn unencrypted(details: &Value, threads: &Value) -> Value {
    let field = |name: &str| details["fields"][name]["value"].clone();
    json!({
        "schema": field("schema"),
        "target_name": field("target_name"),
        "threads": threads,
        "catalog": field("catalog"),
    })
}

fn refresh_projection(credential: &mut Value) {
    let projection = unencrypted(&credential["credential_details"], &credential["threads"]);
    credential["target_name"] = projection["target_name"].clone();
    credential["unencrypted_credential_details"] = projection;
}

async fn create_credential(
    State(mock): State<Arc<MockApi>>,
    Path((account_id, project_id)): Path<(i64, i64)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = mock.injected_failure() {
        return failure;
    }
    if !authorized(&headers) {
        return envelope(StatusCode::UNAUTHORIZED, Value::Null, "invalid token");
    }
    mock.creates.fetch_add(1, Ordering::SeqCst);
    mock.created_bodies.lock().unwrap().push(body.clone());

    let id = mock.next_id.fetch_add(1, Ordering::SeqCst);
    let mut credential = json!({
        "id": id,
        "account_id": account_id,
        "project_id": project_id,
        "type": body["type"],
        "state": body["state"],
        "threads": body["threads"],
        "adapter_version": body["adapter_version"],
        "credential_details": body["credential_details"],
    });
    refresh_projection(&mut credential);
    mock.credentials.lock().unwrap().insert(id, credential.clone());
    envelope(StatusCode::CREATED, credential, "")
}

async fn get_credential(
    State(mock): State<Arc<MockApi>>,
    Path((_account_id, project_id, credential_id)): Path<(i64, i64, i64)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(failure) = mock.injected_failure() {
        return failure;
    }
    mock.reads.fetch_add(1, Ordering::SeqCst);
    mock.read_queries.lock().unwrap().push(query);

    match mock.credentials.lock().unwrap().get(&credential_id) {
        Some(credential) if credential["project_id"] == project_id => {
            envelope(StatusCode::OK, credential.clone(), "")
        }
        _ => envelope(StatusCode::NOT_FOUND, Value::Null, "credential not found"),
    }
}

async fn patch_credential(
    State(mock): State<Arc<MockApi>>,
    Path((_account_id, _project_id, credential_id)): Path<(i64, i64, i64)>,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = mock.injected_failure() {
        return failure;
    }
    mock.updates.fetch_add(1, Ordering::SeqCst);
    mock.patch_bodies.lock().unwrap().push(body.clone());

    let mut credentials = mock.credentials.lock().unwrap();
    let Some(credential) = credentials.get_mut(&credential_id) else {
        return envelope(StatusCode::NOT_FOUND, Value::Null, "credential not found");
    };
    if let Some(fields) = body["credential_details"]["fields"].as_object() {
        for (name, field) in fields {
            credential["credential_details"]["fields"][name]["value"] = field["value"].clone();
        }
    }
    refresh_projection(credential);
    envelope(StatusCode::OK, credential.clone(), "")
}

async fn delete_credential(
    State(mock): State<Arc<MockApi>>,
    Path((_account_id, _project_id, credential_id)): Path<(i64, i64, i64)>,
) -> Response {
    if let Some(failure) = mock.injected_failure() {
        return failure;
    }
    mock.deletes.fetch_add(1, Ordering::SeqCst);
    match mock.credentials.lock().unwrap().remove(&credential_id) {
        Some(credential) => envelope(StatusCode::OK, credential, ""),
        None => envelope(StatusCode::NOT_FOUND, Value::Null, "credential not found"),
    }
}

/// Start the mock on an ephemeral port.
pub async fn spawn_mock() -> (Arc<MockApi>, SocketAddr) {
    dbtcloud_credentials_provider::try_init_logging();

    let mock = Arc::new(MockApi::default());
    let app = Router::new()
        .route(
            "/v3/accounts/{account_id}/projects/{project_id}/credentials/",
            post(create_credential),
        )
        .route(
            "/v3/accounts/{account_id}/projects/{project_id}/credentials/{credential_id}/",
            get(get_credential)
                .patch(patch_credential)
                .delete(delete_credential),
        )
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock listener");
    let addr = listener.local_addr().expect("mock listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock server failed");
    });
    (mock, addr)
}

pub fn provider_config(addr: SocketAddr) -> Value {
    json!({
        "host_url": format!("http://{addr}"),
        "token": TOKEN,
        "account_id": ACCOUNT_ID,
        "max_retries": 2,
        "retry_interval_seconds": 0,
        "timeout_seconds": 5
    })
}

/// A configured tester talking to a fresh mock.
pub async fn setup() -> (Arc<MockApi>, ProviderTester<DbtCloudProvider>) {
    let (mock, addr) = spawn_mock().await;
    let tester = ProviderTester::new(DbtCloudProvider::new());
    tester
        .configure(provider_config(addr))
        .await
        .expect("provider configuration failed");
    (mock, tester)
}
