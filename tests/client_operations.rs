//! Client-level flows over an in-memory dashboard

use async_trait::async_trait;
use ceph_rest_client::config::EngineConfig;
use ceph_rest_client::operations::block::RbdCreate;
use ceph_rest_client::transport::{ApiRequest, ApiResponse, Transport};
use ceph_rest_client::{CephClient, CephError, ConflictKind, Logger, Result};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct FakeDashboard {
    routes: Mutex<HashMap<String, VecDeque<(u16, Value)>>>,
    log: Mutex<Vec<String>>,
}

impl FakeDashboard {
    fn route(&self, key: &str, status: u16, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back((status, body));
    }

    fn calls(&self, key: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|k| *k == key).count()
    }
}

#[async_trait]
impl Transport for FakeDashboard {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let key = format!("{} {}", request.method, request.path);
        self.log.lock().unwrap().push(key.clone());
        let mut routes = self.routes.lock().unwrap();
        let queue = routes.entry(key).or_default();
        let (status, body) = if queue.len() > 1 {
            queue.pop_front().unwrap_or((404, Value::Null))
        } else {
            queue.front().cloned().unwrap_or((404, Value::Null))
        };
        let body = if body.is_null() { Vec::new() } else { body.to_string().into_bytes() };
        Ok(ApiResponse::new(status, body))
    }
}

fn client(dashboard: Arc<FakeDashboard>, max_attempts: u32) -> CephClient {
    let engine = EngineConfig::default()
        .with_max_attempts(max_attempts)
        .with_poll_interval(Duration::ZERO)
        .with_max_poll_cycles(5);
    CephClient::with_transport(dashboard, &engine, Logger::new_quiet())
}

fn create_task(success: bool, code: Option<&str>, end_time: &str) -> Value {
    json!({
        "name": "rbd/create",
        "metadata": {"pool_name": "rbd", "namespace": "tenant-a", "image_name": "vm-disk"},
        "begin_time": "2022-03-01T10:00:00.000000Z",
        "end_time": end_time,
        "duration": 0.5,
        "progress": 100,
        "success": success,
        "ret_value": null,
        "exception": code.map(|c| json!({"code": c.parse::<i64>().unwrap_or(0), "detail": "task error", "component": "rbd"}))
    })
}

#[tokio::test]
async fn login_create_and_logout() {
    let dashboard = Arc::new(FakeDashboard::default());
    dashboard.route(
        "POST auth",
        201,
        json!({"token": "a.eyJ1c2VybmFtZSI6ImFkbWluIn0.c", "username": "admin", "permissions": {}, "sso": false, "pwdUpdateRequired": false}),
    );
    dashboard.route("POST auth/logout", 200, Value::Null);
    dashboard.route("POST block/image", 202, Value::Null);
    dashboard.route(
        "GET task",
        200,
        json!({"executing_tasks": [{"name": "rbd/create", "metadata": {"pool_name": "rbd", "namespace": "tenant-a", "image_name": "vm-disk"}}], "finished_tasks": []}),
    );
    dashboard.route(
        "GET task",
        200,
        json!({"executing_tasks": [], "finished_tasks": [create_task(true, None, "2022-03-01T10:00:01.000000Z")]}),
    );

    let client = client(dashboard.clone(), 3);
    assert_eq!(client.login("admin", "secret").await.unwrap(), 201);
    assert!(client.session().is_logged_in());
    assert_eq!(
        client.session().token_claims().and_then(|c| c.username).as_deref(),
        Some("admin")
    );

    let status = client
        .block()
        .create_image(&RbdCreate::new("rbd", "vm-disk", 10 << 30).with_namespace("tenant-a"))
        .await
        .unwrap();
    assert_eq!(status, 201);
    assert_eq!(dashboard.calls("POST block/image"), 1);
    assert_eq!(dashboard.calls("GET task"), 2);

    client.logout().await.unwrap();
    assert!(!client.session().is_logged_in());
}

#[tokio::test]
async fn create_existing_image_reports_conflict_from_task() {
    let dashboard = Arc::new(FakeDashboard::default());
    dashboard.route("POST block/image", 201, Value::Null);
    dashboard.route(
        "GET task",
        200,
        json!({"executing_tasks": [], "finished_tasks": [create_task(false, Some("17"), "2022-03-01T10:00:01.000000Z")]}),
    );

    let err = client(dashboard.clone(), 4)
        .block()
        .create_image(&RbdCreate::new("rbd", "vm-disk", 1 << 30).with_namespace("tenant-a"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CephError::Conflict { kind: ConflictKind::ImageAlreadyExists, .. }
    ));
    assert_eq!(dashboard.calls("POST block/image"), 1);
}

#[tokio::test]
async fn task_for_other_image_is_not_mistaken_for_ours() {
    let dashboard = Arc::new(FakeDashboard::default());
    dashboard.route("POST block/image", 202, Value::Null);
    dashboard.route(
        "GET task",
        200,
        json!({"executing_tasks": [], "finished_tasks": [{
            "name": "rbd/create",
            "metadata": {"pool_name": "rbd", "namespace": null, "image_name": "vm-disk"},
            "end_time": "2022-03-01T10:00:01.000000Z",
            "success": true
        }]}),
    );

    // same name but the task belongs to the image outside the namespace
    let err = client(dashboard.clone(), 2)
        .block()
        .create_image(&RbdCreate::new("rbd", "vm-disk", 1 << 30).with_namespace("tenant-a"))
        .await
        .unwrap_err();

    assert!(matches!(err, CephError::TaskTimeout { cycles: 5, .. }));
    assert_eq!(dashboard.calls("GET task"), 5);
}

#[tokio::test]
async fn empty_identifiers_fail_before_any_request() {
    let dashboard = Arc::new(FakeDashboard::default());
    let client = client(dashboard.clone(), 3);

    assert!(matches!(client.login("", "pw").await, Err(CephError::Validation(_))));
    assert!(matches!(
        client.block().get_image("", None, "img").await,
        Err(CephError::Validation(_))
    ));
    assert!(matches!(
        client.snapshot().create_snapshot("rbd", None, "img", "").await,
        Err(CephError::Validation(_))
    ));
    assert!(matches!(
        client.namespace().create_namespace("", "ns").await,
        Err(CephError::Validation(_))
    ));
    assert!(dashboard.log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_deletes_share_one_client() {
    let dashboard = Arc::new(FakeDashboard::default());
    let names = ["a", "b", "c", "d"];
    for name in names {
        dashboard.route(&format!("DELETE block/image/rbd%2F{}", name), 204, Value::Null);
    }
    let finished: Vec<Value> = names
        .iter()
        .map(|name| {
            json!({
                "name": "rbd/delete",
                "metadata": {"image_spec": format!("rbd/{}", name)},
                "end_time": "2022-03-01T10:00:01.000000Z",
                "success": true
            })
        })
        .collect();
    dashboard.route("GET task", 200, json!({"executing_tasks": [], "finished_tasks": finished}));

    let client = client(dashboard.clone(), 3);
    let block = client.block();
    let statuses = futures::future::try_join_all(
        names.iter().map(|name| block.delete_image("rbd", None, name)),
    )
    .await
    .unwrap();

    assert_eq!(statuses, vec![204; 4]);
    for name in names {
        assert_eq!(dashboard.calls(&format!("DELETE block/image/rbd%2F{}", name)), 1);
    }
}
