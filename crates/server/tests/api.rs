//! Router-level tests: requests go through the full middleware stack via
//! `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use barangay::{FallbackQueue, LifecycleConfig, LifecycleManager};
use http_body_util::BodyExt;
use records::RecordsConfig;
use serde_json::{json, Value};
use server::{build_router, ServerConfig, ServerState};
use store::{InMemoryMedia, InMemoryStore};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_KEY: &str = "test-admin-key";
const BOUNDARY: &str = "barangay-test-boundary";

fn manager() -> Arc<LifecycleManager> {
    Arc::new(LifecycleManager::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryMedia::new()),
        RecordsConfig::default(),
        LifecycleConfig::default(),
    ))
}

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.admin_keys.insert(ADMIN_KEY.to_string());
    config.rate_limit_per_minute = 1000;
    config.metrics_enabled = false;
    config
}

fn app() -> Router {
    let state = ServerState::with_manager(test_config(), manager(), None);
    build_router(Arc::new(state))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let etag = response
        .headers()
        .get(header::ETAG)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, etag, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(mut request: Request<Body>) -> Request<Body> {
    request
        .headers_mut()
        .insert("x-admin-key", ADMIN_KEY.parse().unwrap());
    request
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn clearance(pickup: bool) -> Value {
    json!({
        "subject_name": "Rosario Villanueva",
        "category": "Barangay Clearance",
        "fields": { "purpose": "Employment" },
        "contact": { "primary": "09171230000" },
        "pickup": pickup,
    })
}

async fn create_document(app: &Router, pickup: bool) -> Value {
    let request = json_request("POST", "/api/documents", clearance(pickup));
    let (status, etag, body) = send(app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(etag.as_deref(), Some("\"1\""));
    body
}

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, _, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, _, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["store"], "ready");
}

#[tokio::test]
async fn create_then_track_by_code() {
    let app = app();
    let created = create_document(&app, true).await;
    let code = created["tracking_code"].as_str().unwrap();
    assert!(!created["pickup_code"].as_str().unwrap().is_empty());

    let uri = format!("/api/documents/track/by-number/{}", code.to_lowercase());
    let (status, etag, body) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(etag.as_deref(), Some("\"1\""));
    assert_eq!(body["id"], created["id"]);
    assert_eq!(body["status"], "pending");

    let (status, _, body) = send(&app, get("/api/documents/track/by-number/ABIS-NOPE0000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn invalid_submission_is_a_validation_error() {
    let app = app();
    let (status, _, body) = send(
        &app,
        json_request("POST", "/api/documents", json!({ "category": "Barangay Clearance" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn admin_routes_require_a_valid_key() {
    let app = app();
    let (status, _, body) = send(&app, get("/api/documents")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_FAILED");

    let mut wrong = get("/api/documents");
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());
    let (status, _, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut bearer = get("/api/documents");
    bearer.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {ADMIN_KEY}").parse().unwrap(),
    );
    let (status, _, body) = send(&app, bearer).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn patch_honours_if_match() {
    let app = app();
    let created = create_document(&app, false).await;
    let uri = format!("/api/documents/{}", created["id"].as_str().unwrap());

    let mut stale = admin(json_request("PATCH", &uri, json!({ "status": "approved" })));
    stale
        .headers_mut()
        .insert(header::IF_MATCH, "\"7\"".parse().unwrap());
    let (status, _, body) = send(&app, stale).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    let mut fresh = admin(json_request(
        "PATCH",
        &uri,
        json!({ "status": "approved", "remarks": "Bring a valid ID" }),
    ));
    fresh
        .headers_mut()
        .insert(header::IF_MATCH, "\"1\"".parse().unwrap());
    let (status, etag, body) = send(&app, fresh).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(etag.as_deref(), Some("\"2\""));
    assert_eq!(body["status"], "approved");
    assert_eq!(body["remarks"], "Bring a valid ID");
}

#[tokio::test]
async fn skipping_states_needs_override() {
    let app = app();
    let created = create_document(&app, false).await;
    let id = created["id"].as_str().unwrap();

    let (status, _, body) = send(
        &app,
        admin(json_request(
            "PATCH",
            &format!("/api/documents/{id}"),
            json!({ "status": "collected" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");

    let (status, _, body) = send(
        &app,
        admin(json_request(
            "POST",
            &format!("/api/documents/{id}/status-override"),
            json!({ "status": "collected", "reason": "released on paper" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "collected");
    let history = body["status_history"].as_array().unwrap();
    assert_eq!(history.last().unwrap()["overridden"], true);
    assert_eq!(history.last().unwrap()["actor"], "admin");
}

#[tokio::test]
async fn blotter_is_redacted_for_the_public() {
    let app = app();
    let request = multipart(
        "/api/blotter",
        &[
            Part::Text("title", "Stray dogs"),
            Part::Text("description", "Pack of dogs near the school gate"),
            Part::Text("reporter_name", "Nestor Bautista"),
            Part::Text("reporter_contact", "09175556666"),
            Part::Text("incident_date", "2024-11-02"),
            Part::Text("show_reporter", "false"),
            Part::File("attachments", "gate.jpg", b"\xFF\xD8\xFF\xE0"),
        ],
    );
    let (status, _, created) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["attachments"].as_array().unwrap().len(), 1);
    let token = created["public_token"].as_str().unwrap();

    let (status, _, body) = send(&app, get(&format!("/api/blotter/by-token/{token}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Stray dogs");
    assert!(body.get("reporter_name").is_none());
    assert!(body.get("reporter_contact").is_none());
    assert!(!body.to_string().contains("Nestor"));

    // The blotter id is not reachable through the document routes.
    let id = created["id"].as_str().unwrap();
    let (status, _, _) = send(&app, admin(get(&format!("/api/documents/{id}")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, pending) = send(&app, admin(get("/api/blotter/pending"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn too_many_attachments_are_refused() {
    let app = app();
    let file: &[u8] = b"img";
    let request = multipart(
        "/api/blotter",
        &[
            Part::Text("title", "Flooding"),
            Part::Text("description", "Drainage blocked"),
            Part::Text("reporter_name", "Ana"),
            Part::Text("reporter_contact", "0917"),
            Part::Text("incident_date", "2024-11-02"),
            Part::File("attachments", "1.jpg", file),
            Part::File("attachments", "2.jpg", file),
            Part::File("attachments", "3.jpg", file),
            Part::File("attachments", "4.jpg", file),
        ],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn certificate_upload_then_pickup_collect() {
    let app = app();
    let created = create_document(&app, true).await;
    let id = created["id"].as_str().unwrap();
    let pickup = created["pickup_code"].as_str().unwrap();

    let upload = admin(multipart(
        &format!("/api/documents/{id}/upload-certificate"),
        &[Part::File("certificate", "clearance.pdf", b"%PDF-1.7")],
    ));
    let (status, _, body) = send(&app, upload).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ready_for_pickup");
    assert_eq!(body["certificate"]["file_name"], "clearance.pdf");

    let lookup = admin(get(&format!("/api/documents/pickup/{pickup}")));
    let (status, _, view) = send(&app, lookup).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["category"], "Barangay Clearance");

    let collect = admin(
        Request::builder()
            .method("POST")
            .uri(format!("/api/documents/pickup/{pickup}/collect"))
            .body(Body::empty())
            .unwrap(),
    );
    let (status, _, view) = send(&app, collect).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "collected");
}

#[tokio::test]
async fn payment_proof_keeps_payment_status_and_method() {
    let app = app();
    let created = create_document(&app, false).await;
    let id = created["id"].as_str().unwrap();

    let request = multipart(
        &format!("/api/documents/{id}/update-payment"),
        &[
            Part::Text("paymentMethod", "bank"),
            Part::File("paymentProof", "deposit.png", b"\x89PNG"),
        ],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_method"], "gcash");
    assert_eq!(body["payment_status"], "pending");
    assert!(body["payment_proof"]["url"].as_str().is_some());

    // The method is an admin edit.
    let (status, _, body) = send(
        &app,
        admin(json_request(
            "PATCH",
            &format!("/api/documents/{id}"),
            json!({ "payment_method": "bank" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["payment_method"], "bank");
}

#[tokio::test]
async fn blotter_payment_proof_answers_with_redacted_view() {
    let app = app();
    let request = multipart(
        "/api/blotter",
        &[
            Part::Text("title", "Noise complaint"),
            Part::Text("description", "Karaoke past midnight"),
            Part::Text("reporter_name", "Hidden Reporter"),
            Part::Text("reporter_contact", "09170000999"),
            Part::Text("incident_date", "2024-11-05"),
            Part::Text("show_reporter", "false"),
        ],
    );
    let (status, _, created) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let id = created["id"].as_str().unwrap();

    let request = multipart(
        &format!("/api/blotter/{id}/update-payment"),
        &[
            Part::Text("paymentMethod", "at_site"),
            Part::File("paymentProof", "receipt.png", b"\x89PNG"),
        ],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["title"], "Noise complaint");
    assert!(body.get("subject_name").is_none());
    assert!(body.get("contact").is_none());
    assert!(body.get("payment_method").is_none());
    assert!(!body.to_string().contains("Hidden Reporter"));
    assert!(!body.to_string().contains("09170000999"));

    let (_, _, stored) = send(&app, admin(get(&format!("/api/blotter/{id}")))).await;
    assert_eq!(stored["payment_method"], "gcash");
    assert!(stored["payment_proof"]["url"].as_str().is_some());
}

#[tokio::test]
async fn crime_record_and_delete() {
    let app = app();
    let created = create_document(&app, false).await;
    let id = created["id"].as_str().unwrap();

    let (status, _, body) = send(
        &app,
        admin(json_request(
            "POST",
            &format!("/api/documents/{id}/set-crime-record"),
            json!({ "crime_record": "no" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["crime_record"], "no");

    let delete = admin(
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/documents/{id}"))
            .body(Body::empty())
            .unwrap(),
    );
    let (status, _, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let code = created["tracking_code"].as_str().unwrap();
    let (status, _, _) = send(&app, get(&format!("/api/documents/track/by-number/{code}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_round_trip() {
    let app = app();
    let (status, _, body) = send(
        &app,
        admin(json_request(
            "POST",
            "/api/settings/total_population",
            json!({ "value": 4821 }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], 4821);

    let (status, _, body) = send(&app, get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_population"], 4821);

    let (status, _, _) = send(
        &app,
        admin(json_request("POST", "/api/settings/Bad-Key", json!({ "value": 1 }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        json_request("POST", "/api/settings/total_population", json!({ "value": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn fallback_routes_report_queue() {
    let dir = TempDir::new().unwrap();
    let queue = Arc::new(FallbackQueue::open(dir.path().join("outbox.redb"), 5).unwrap());
    let state = ServerState::with_manager(test_config(), manager(), Some(queue));
    let router = build_router(Arc::new(state));

    let (status, _, body) = send(&router, admin(get("/api/admin/fallback"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["capacity"], 5);
    assert!(body["pending"].as_array().unwrap().is_empty());

    let reconcile = admin(
        Request::builder()
            .method("POST")
            .uri("/api/admin/fallback/reconcile")
            .body(Body::empty())
            .unwrap(),
    );
    let (status, _, body) = send(&router, reconcile).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remaining"], 0);

    // Without a queue the routes are absent.
    let (status, _, _) = send(&app(), admin(get("/api/admin/fallback"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_and_disabled_metrics() {
    let app = app();
    let (status, _, body) = send(&app, get("/api/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
