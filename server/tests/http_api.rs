//! Tests del router HTTP completo usando `tower::ServiceExt::oneshot`.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::{build_router, AppState, ServerConfig, WaitRange};
use tower::ServiceExt;

fn test_app() -> (Router, AppState) {
    let config = ServerConfig {
        wait_range: WaitRange::new(0.05, 0.1),
        ..ServerConfig::default()
    };
    let state = AppState::new(&config);
    (build_router(state.clone()), state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn submit(app: &Router, input: Value) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/v2/test-endpoint/run",
        Some(json!({ "input": input })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_QUEUE");
    body["id"].as_str().unwrap().to_string()
}

async fn poll_terminal(app: &Router, id: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, Method::GET, &format!("/v2/ep/status/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        if matches!(
            body["status"].as_str(),
            Some("COMPLETED" | "CANCELLED" | "FAILED")
        ) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} no llegó a estado terminal");
}

// ---------------------------------------------------------------------------
// run + status
// ---------------------------------------------------------------------------

#[tokio::test]
async fn run_y_status_hasta_completed() {
    let (app, _) = test_app();
    let id = submit(&app, json!({"wait_time": 0.1, "task_name": "task_001"})).await;

    let job = poll_terminal(&app, &id).await;
    assert_eq!(job["id"], id.as_str());
    assert_eq!(job["status"], "COMPLETED");
    assert_eq!(job["output"]["wait_time"], json!(0.1));
    assert_eq!(job["output"]["input_data"]["task_name"], "task_001");
    assert!(job["output"]["result_text"].as_str().unwrap().contains(&id));
    assert_eq!(job["execution_time_ms"], 100);
    assert!(job["created_at"].is_string());
    assert!(job["started_at"].is_string());
    assert!(job["completed_at"].is_string());
}

#[tokio::test]
async fn endpoint_es_un_segmento_opaco() {
    let (app, _) = test_app();
    let id = submit(&app, json!({"wait_time": 0.0})).await;

    // se consulta con otro endpoint y lo encuentra igual
    let (status, body) = send(&app, Method::GET, &format!("/v2/otro/status/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
}

#[tokio::test]
async fn run_sin_input_usa_objeto_vacio() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::POST, "/v2/ep/run", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let id = body["id"].as_str().unwrap();
    let (_, job) = send(&app, Method::GET, &format!("/v2/ep/status/{id}"), None).await;
    assert_eq!(job["input"], json!({}));
}

#[tokio::test]
async fn run_con_input_invalido_es_400_y_no_crea_job() {
    let (app, state) = test_app();

    for bad in [
        json!({"input": [1, 2, 3]}),
        json!({"input": {"wait_time": "mucho"}}),
        json!({"input": {"wait_time": -2}}),
    ] {
        let (status, body) = send(&app, Method::POST, "/v2/ep/run", Some(bad)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    // body que ni siquiera es JSON
    let req = Request::builder()
        .method(Method::POST)
        .uri("/v2/ep/run")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{no es json"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(state.registry.health().total_count, 0);
}

#[tokio::test]
async fn status_de_id_desconocido_es_404() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/v2/ep/status/no-existe", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Job not found"}));
}

// ---------------------------------------------------------------------------
// cancel
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_inmediato_queda_cancelled() {
    let (app, _) = test_app();
    let id = submit(&app, json!({"wait_time": 0.2})).await;

    let (status, body) = send(&app, Method::POST, &format!("/v2/ep/cancel/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": id, "status": "CANCELLED"}));

    tokio::time::sleep(Duration::from_millis(400)).await;

    let (_, job) = send(&app, Method::GET, &format!("/v2/ep/status/{id}"), None).await;
    assert_eq!(job["status"], "CANCELLED");
    assert!(job.get("output").is_none());
}

#[tokio::test]
async fn cancel_de_id_desconocido_es_404() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::POST, "/v2/ep/cancel/no-existe", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Job not found");
}

// ---------------------------------------------------------------------------
// health / jobs / reset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_cuenta_jobs() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy", "active_jobs": 0, "total_jobs": 0}));

    submit(&app, json!({"wait_time": 1.0})).await;
    submit(&app, json!({"wait_time": 1.0})).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let (_, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(body["total_jobs"], 2);
    assert_eq!(body["active_jobs"], 2);
}

#[tokio::test]
async fn jobs_y_reset() {
    let (app, _) = test_app();
    for i in 0..3 {
        submit(&app, json!({"wait_time": 0.01, "index": i})).await;
    }

    let (status, body) = send(&app, Method::GET, "/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 3);

    let (status, body) = send(&app, Method::POST, "/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "All jobs cleared"}));

    let (_, body) = send(&app, Method::GET, "/jobs", None).await;
    assert_eq!(body, json!({"total": 0, "jobs": []}));
}

#[tokio::test]
async fn ruta_desconocida_es_404() {
    let (app, _) = test_app();
    let (status, _) = send(&app, Method::GET, "/no-existe", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
