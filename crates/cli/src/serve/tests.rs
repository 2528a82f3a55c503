//! Router tests driven through `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use vendorflow_engine::{EngineConfig, FixedOutreach, Procurement};
use vendorflow_storage::InMemoryStore;

use super::state::AppState;
use super::uploads::UploadStore;
use super::build_router;

struct Harness {
    app: Router,
    _uploads: tempfile::TempDir,
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        step_delay: Duration::from_millis(5),
        research_delay: Duration::from_millis(5),
        shortlist_size: 5,
    }
}

fn harness() -> Harness {
    let uploads = tempfile::tempdir().expect("tempdir");
    let procurement = Procurement::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(FixedOutreach::new()),
        fast_config(),
    );
    let state = Arc::new(AppState {
        procurement,
        uploads: UploadStore::new(uploads.path()),
    });
    Harness {
        app: build_router(state),
        _uploads: uploads,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

const BOUNDARY: &str = "vendorflow-test-boundary";

/// `(field, file name, content type, bytes)` parts.
fn multipart(uri: &str, parts: &[(&str, &str, &str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, file_name, content_type, data) in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn create_sugar(app: &Router) -> String {
    let (status, body) = send(
        app,
        with_json(
            "POST",
            "/api/executions",
            json!({
                "name": "Test",
                "materials": [{"name": "Sugar", "quantity": 10, "rate": 50}],
                "guardrails": {}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["execution"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness();
    let (status, body) = send(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_returns_201_with_derived_totals() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        with_json(
            "POST",
            "/api/executions",
            json!({
                "name": "Test",
                "materials": [{"name": "Sugar", "quantity": 10, "rate": 50}],
                "guardrails": {}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    let execution = &body["execution"];
    assert_eq!(execution["status"], "draft");
    assert_eq!(execution["materials"][0]["totalCost"], 500.0);
    assert_eq!(execution["processingStatus"]["totalCount"], 1);
    assert_eq!(execution["vendorsContacted"], 0);
    assert!(execution["createdAt"].is_string());
}

#[tokio::test]
async fn crud_round_trip() {
    let h = harness();
    let id = create_sugar(&h.app).await;

    let (status, body) = send(&h.app, get(&format!("/api/executions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"]["name"], "Test");

    let (status, body) = send(
        &h.app,
        with_json(
            "PUT",
            &format!("/api/executions/{id}"),
            json!({"materials": [{"name": "Sugar", "quantity": 2, "rate": 50}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"]["name"], "Test");
    assert_eq!(body["execution"]["materials"][0]["totalCost"], 100.0);

    let (status, body) = send(&h.app, get("/api/executions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executions"].as_array().unwrap().len(), 1);

    let (status, body) = send(&h.app, empty("DELETE", &format!("/api/executions/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = send(&h.app, get(&format!("/api/executions/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Execution not found");
}

#[tokio::test]
async fn deleting_unknown_execution_is_404() {
    let h = harness();
    let (status, body) = send(&h.app, empty("DELETE", "/api/executions/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn bad_requests_use_the_error_envelope() {
    let h = harness();

    let malformed = Request::post("/api/executions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&h.app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &h.app,
        with_json("POST", "/api/executions", json!({"name": " ", "materials": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "name is required");

    let (status, _) = send(&h.app, get("/api/executions/status/shipped")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&h.app, get("/api/nothing-here")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn well_formed_json_of_the_wrong_shape_is_400() {
    let h = harness();

    let (status, body) = send(
        &h.app,
        with_json("POST", "/api/executions", json!({"name": "X"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid JSON body");
    assert!(body["error"].as_str().unwrap().contains("materials"));

    let id = create_sugar(&h.app).await;
    let (status, body) = send(
        &h.app,
        with_json(
            "PUT",
            &format!("/api/executions/{id}/vendors/0"),
            json!({"status": "bogus"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid JSON body");
}

#[tokio::test]
async fn list_by_status_filters() {
    let h = harness();
    let a = create_sugar(&h.app).await;
    let _b = create_sugar(&h.app).await;
    send(
        &h.app,
        with_json(
            "PUT",
            &format!("/api/executions/{a}"),
            json!({"status": "completed"}),
        ),
    )
    .await;

    let (status, body) = send(&h.app, get("/api/executions/status/completed")).await;
    assert_eq!(status, StatusCode::OK);
    let executions = body["executions"].as_array().unwrap();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0]["id"], a.as_str());
}

#[tokio::test]
async fn processing_runs_to_email_sent_and_vendors_respond() {
    let h = harness();
    let id = create_sugar(&h.app).await;

    let (status, body) = send(&h.app, empty("POST", &format!("/api/process-materials/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"]["status"], "processing");
    assert_eq!(body["execution"]["processingStatus"]["isProcessing"], true);

    let (status, _) = send(&h.app, empty("POST", &format!("/api/process-materials/{id}"))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut body = Value::Null;
    for _ in 0..200 {
        let (_, polled) = send(&h.app, get(&format!("/api/process-materials/{id}/status"))).await;
        if polled["status"] == "email_sent" {
            body = polled;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(body["success"], true, "run did not finish: {body}");
    assert_eq!(body["processingStatus"]["processedCount"], 1);
    assert_eq!(body["processingStatus"]["isProcessing"], false);
    assert_eq!(body["processingStatus"]["results"][0]["material"], "Sugar");

    let (status, body) = send(
        &h.app,
        with_json(
            "PUT",
            &format!("/api/executions/{id}/vendors/0"),
            json!({"status": "responded", "notes": "call back"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"]["status"], "vendor_responded");
    assert_eq!(body["execution"]["vendors"][0]["notes"], "call back");
    assert!(body["execution"]["vendors"][0]["responseDate"].is_string());

    let (status, body) = send(
        &h.app,
        with_json(
            "PUT",
            &format!("/api/executions/{id}/vendors/7"),
            json!({"status": "responded"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Vendor not found");

    let (_, body) = send(&h.app, get("/api/recent-activity")).await;
    let kinds: Vec<&str> = body["activities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["activityType"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["vendor_response", "email_sent", "created"]);
}

#[tokio::test]
async fn cancel_reverts_to_draft() {
    let h = harness();
    let id = create_sugar(&h.app).await;
    send(&h.app, empty("POST", &format!("/api/process-materials/{id}"))).await;

    let (status, body) = send(
        &h.app,
        empty("POST", &format!("/api/process-materials/{id}/cancel")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["execution"]["status"], "draft");
    assert_eq!(body["execution"]["processingStatus"]["isProcessing"], false);

    let (status, _) = send(
        &h.app,
        empty("POST", "/api/process-materials/nope/cancel"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn research_attaches_five_vendors() {
    let h = harness();
    let id = create_sugar(&h.app).await;
    let (status, body) = send(&h.app, empty("POST", &format!("/api/executions/{id}/research"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Research triggered successfully");
    assert_eq!(body["execution"]["status"], "email_sent");
    assert_eq!(body["execution"]["vendorsContacted"], 5);
    assert_eq!(body["execution"]["vendors"][0]["name"], "Vendor A");
    assert_eq!(body["execution"]["vendors"][0]["price"], 50.0);
}

#[tokio::test]
async fn csv_import_parses_materials() {
    let h = harness();
    let csv = b"Material,Quantity in Kgs,Rate,COST,Certification if any\nSalt,20,15,,\n";
    let (status, body) = send(
        &h.app,
        multipart(
            "/api/import-materials-csv",
            &[("file", "materials.csv", "text/csv", csv)],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["certification"], "FSSAI");
    let salt = &body["materials"][0];
    assert_eq!(salt["id"], 1);
    assert_eq!(salt["name"], "Salt");
    assert_eq!(salt["quantity"], 20.0);
    assert_eq!(salt["rate"], 15.0);
    assert_eq!(salt["totalCost"], 300.0);
}

#[tokio::test]
async fn csv_import_rejects_missing_and_non_csv_files() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        multipart(
            "/api/import-materials-csv",
            &[("file", "quote.pdf", "application/pdf", b"%PDF-1.4")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please upload a CSV file.");

    let (status, body) = send(&h.app, multipart("/api/import-materials-csv", &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No file was uploaded.");
}

#[tokio::test]
async fn upload_stores_files_and_serves_them() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        multipart(
            "/api/upload",
            &[
                ("files", "materials.csv", "text/csv", b"Material\nSalt\n"),
                ("files", "quote.pdf", "application/pdf", b"%PDF-1.4"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["originalname"], "materials.csv");
    assert_eq!(files[0]["mimetype"], "text/csv");
    assert_eq!(files[0]["size"], 14);
    let stored = files[0]["filename"].as_str().unwrap();
    assert!(stored.starts_with("files-") && stored.ends_with(".csv"));

    let response = h
        .app
        .clone()
        .oneshot(get(&format!("/uploads/{stored}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"Material\nSalt\n");
}

#[tokio::test]
async fn upload_rejects_bad_types_and_too_many_files() {
    let h = harness();
    let (status, body) = send(
        &h.app,
        multipart("/api/upload", &[("files", "logo.png", "image/png", b"\x89PNG")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only CSV, Excel, and PDF files are allowed!");

    let parts: Vec<(&str, &str, &str, &[u8])> = (0..11)
        .map(|_| ("files", "m.csv", "text/csv", b"a\n".as_slice()))
        .collect();
    let (status, body) = send(&h.app, multipart("/api/upload", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Too many files");
    assert_eq!(
        std::fs::read_dir(h._uploads.path()).unwrap().count(),
        0,
        "partial uploads are removed"
    );

    let (status, body) = send(&h.app, multipart("/api/upload", &[])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No files were uploaded.");
}

#[tokio::test(start_paused = true)]
async fn stopping_the_server_drains_processing_runs() {
    let uploads = tempfile::tempdir().unwrap();
    let procurement = Procurement::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(FixedOutreach::new()),
        EngineConfig {
            step_delay: Duration::from_secs(60),
            ..fast_config()
        },
    );
    let state = Arc::new(AppState {
        procurement: procurement.clone(),
        uploads: UploadStore::new(uploads.path()),
    });
    let app = build_router(state);
    let id = create_sugar(&app).await;
    send(&app, empty("POST", &format!("/api/process-materials/{id}"))).await;
    assert!(procurement.processing.runs().is_active(&id).await);

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let server = async move {
        let _ = stopped.await;
        Ok::<(), std::io::Error>(())
    };
    stop.send(()).unwrap();
    super::serve_then_drain(server, &procurement).await.unwrap();

    assert!(procurement.processing.runs().is_empty().await);
}

#[tokio::test]
async fn server_errors_still_drain_runs() {
    let procurement = Procurement::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(FixedOutreach::new()),
        fast_config(),
    );
    let failed = async { Err::<(), _>(std::io::Error::other("listener closed")) };
    let err = super::serve_then_drain(failed, &procurement)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "listener closed");
    assert!(procurement.processing.runs().is_empty().await);
}
