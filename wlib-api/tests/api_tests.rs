//! Integration tests for the wlib-api endpoints
//!
//! Drives the real router over an in-memory SQLite store: submission
//! classification and validation, membership gating with the
//! system-account bypass, id generation, checkout, review retrieval
//! with the phone-number projection, and the admin surface.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot`
use wlib_api::{build_router, AppState};
use wlib_common::config::Config;
use wlib_common::db::{self, init_memory_database};
use wlib_common::registry::VerifyPolicy;
use wlib_common::store::{SqliteStore, TabularStore};

async fn setup_store() -> Arc<SqliteStore> {
    let pool = init_memory_database().await.expect("schema init");
    Arc::new(SqliteStore::new(pool))
}

fn setup_app(store: Arc<SqliteStore>) -> axum::Router {
    let state = AppState::new(store, Config::default());
    build_router(state)
}

fn setup_app_with_policy(store: Arc<SqliteStore>, policy: VerifyPolicy) -> axum::Router {
    let config = Config {
        verify_policy: policy,
        ..Config::default()
    };
    build_router(AppState::new(store, config))
}

async fn seed_member(store: &SqliteStore, member_id: &str, phone: &str, name: &str) {
    store
        .append_row(
            db::MEMBERS,
            &[
                ("member_id", member_id.to_string()),
                ("phone_number", phone.to_string()),
                ("display_name", name.to_string()),
                ("registered_date", "2024-01-01".to_string()),
                ("active", "true".to_string()),
            ],
        )
        .await
        .expect("seed member");
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

fn add_wheel_payload() -> Value {
    json!({
        "lender_phone": "(555) 123-4567",
        "lender_display_name": "Jane Doe",
        "wheel_name": "Halo 90",
        "brand": "Luminous",
        "wheel_size": "90mm",
        "durometer": "85A",
        "material": "urethane",
        "best_for": ["park", "street"]
    })
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let app = setup_app(setup_store().await);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "wlib-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Classification and validation
// =============================================================================

#[tokio::test]
async fn unclassifiable_submission_is_rejected() {
    let app = setup_app(setup_store().await);

    let response = app
        .oneshot(post_json("/api/submit", &json!({"hello": "world"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Unknown submission type");
}

#[tokio::test]
async fn malformed_json_body_gets_error_envelope() {
    let app = setup_app(setup_store().await);

    let request = Request::builder()
        .method("POST")
        .uri("/api/submit")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn signup_missing_field_fails_before_any_write() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let payload = json!({
        "action": "signup",
        "phone_number": "5551234567",
        "display_name": "Jane Doe",
        "primary_style": "park"
        // experience_level missing
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Missing required field: experience_level");

    let signups = store.read_table(db::SIGNUPS).await.unwrap().unwrap();
    assert!(signups.rows.is_empty());
}

// =============================================================================
// Signup
// =============================================================================

#[tokio::test]
async fn signup_appends_audit_row() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let payload = json!({
        "action": "signup",
        "phone_number": "(555) 123-4567",
        "display_name": "Jane Doe",
        "experience_level": "intermediate",
        "primary_style": "park"
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);

    let signups = store.read_table(db::SIGNUPS).await.unwrap().unwrap();
    assert_eq!(signups.rows.len(), 1);
    let row = &signups.rows[0];
    assert_eq!(signups.cell(row, "display_name"), Some("Jane Doe"));
    assert_eq!(signups.cell(row, "primary_style"), Some("park"));
}

// =============================================================================
// Membership gate
// =============================================================================

#[tokio::test]
async fn unknown_phone_is_rejected_when_registry_has_data() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let payload = json!({
        "phone_number": "5559999999",
        "display_name": "Stranger",
        "wheel_id": "W001",
        "rating": 5
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found in member list"));

    let reviews = store.read_table(db::REVIEWS).await.unwrap().unwrap();
    assert!(reviews.rows.is_empty());
}

#[tokio::test]
async fn empty_registry_fails_open_by_default() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let payload = json!({
        "phone_number": "5559999999",
        "display_name": "Stranger",
        "wheel_id": "W001",
        "rating": 5
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn empty_registry_blocks_under_deny_policy() {
    let store = setup_store().await;
    let app = setup_app_with_policy(store, VerifyPolicy::deny());

    let payload = json!({
        "phone_number": "5559999999",
        "display_name": "Stranger",
        "wheel_id": "W001",
        "rating": 5
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn system_account_review_needs_no_phone() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let payload = json!({
        "display_name": "SFF Library",
        "wheel_id": "W001",
        "rating": 4,
        "review_text": "house set, well worn"
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reviews = store.read_table(db::REVIEWS).await.unwrap().unwrap();
    assert_eq!(reviews.rows.len(), 1);
    assert_eq!(reviews.cell(&reviews.rows[0], "phone_number"), Some(""));
}

#[tokio::test]
async fn non_system_review_without_phone_fails_validation() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store);

    let payload = json!({
        "display_name": "Jane Doe",
        "wheel_id": "W001",
        "rating": 4
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Missing required field: phone_number");
}

// =============================================================================
// Add wheel
// =============================================================================

#[tokio::test]
async fn add_wheel_generates_sequential_ids() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let response = app
        .clone()
        .oneshot(post_json("/api/submit", &add_wheel_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["wheel_id"], "W001");

    let response = app
        .oneshot(post_json("/api/submit", &add_wheel_payload()))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["wheel_id"], "W002");

    let inventory = store.read_table(db::INVENTORY).await.unwrap().unwrap();
    assert_eq!(inventory.rows.len(), 2);
    let row = &inventory.rows[0];
    assert_eq!(inventory.cell(row, "wheel_id"), Some("W001"));
    assert_eq!(inventory.cell(row, "status"), Some("available"));
    assert_eq!(inventory.cell(row, "lender_id"), Some("M001"));
    assert_eq!(inventory.cell(row, "best_for"), Some("park, street"));
    assert_eq!(inventory.cell(row, "wheel_material"), Some("urethane"));
    assert_eq!(inventory.cell(row, "bearings_included"), Some("No"));
}

#[tokio::test]
async fn add_wheel_defaults_empty_bearings_to_no() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let mut payload = add_wheel_payload();
    payload["bearings_included"] = json!("");

    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let inventory = store.read_table(db::INVENTORY).await.unwrap().unwrap();
    assert_eq!(inventory.cell(&inventory.rows[0], "bearings_included"), Some("No"));
}

#[tokio::test]
async fn add_wheel_from_system_account_leaves_lender_empty() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let mut payload = add_wheel_payload();
    payload["lender_display_name"] = json!("SFF Admin");
    payload.as_object_mut().unwrap().remove("lender_phone");

    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let inventory = store.read_table(db::INVENTORY).await.unwrap().unwrap();
    assert_eq!(inventory.cell(&inventory.rows[0], "lender_id"), Some(""));
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn checkout_marks_wheel_checked_out() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let response = app
        .clone()
        .oneshot(post_json("/api/submit", &add_wheel_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = json!({
        "action": "checkout",
        "phone_number": "5551234567",
        "display_name": "Jane Doe",
        "wheel_id": "W001"
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let inventory = store.read_table(db::INVENTORY).await.unwrap().unwrap();
    assert_eq!(inventory.cell(&inventory.rows[0], "status"), Some("checked out"));
}

#[tokio::test]
async fn checkout_of_unknown_wheel_leaves_inventory_unmodified() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let response = app
        .clone()
        .oneshot(post_json("/api/submit", &add_wheel_payload()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = json!({
        "action": "checkout",
        "phone_number": "5551234567",
        "display_name": "Jane Doe",
        "wheel_id": "W999"
    });
    let response = app.oneshot(post_json("/api/submit", &payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("W999"));

    let inventory = store.read_table(db::INVENTORY).await.unwrap().unwrap();
    assert_eq!(inventory.cell(&inventory.rows[0], "status"), Some("available"));
}

// =============================================================================
// Review retrieval
// =============================================================================

#[tokio::test]
async fn reviews_projection_excludes_phone_number() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    for (wheel, rating) in [("W001", 5), ("W002", 3)] {
        let payload = json!({
            "phone_number": "5551234567",
            "display_name": "Jane Doe",
            "wheel_id": wheel,
            "rating": rating,
            "review_text": "fine"
        });
        let response = app
            .clone()
            .oneshot(post_json("/api/submit", &payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.clone().oneshot(get("/api/reviews")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], true);
    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 2);
    for review in reviews {
        assert!(review.get("phone_number").is_none());
        assert!(review.get("display_name").is_some());
    }

    // Exact wheel_id filter
    let response = app.oneshot(get("/api/reviews?wheel_id=W002")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["wheel_id"], "W002");
    assert_eq!(reviews[0]["rating"], "3");
}

// =============================================================================
// Admin surface
// =============================================================================

#[tokio::test]
async fn reconcile_single_record_registers_member_once() {
    let store = setup_store().await;
    let app = setup_app(store.clone());

    let record = json!({
        "timestamp": "2024-01-01",
        "phone_number": "(555) 123-4567",
        "display_name": "Jane Doe",
        "email": "jane@x.com"
    });
    let response = app
        .clone()
        .oneshot(post_json("/api/admin/reconcile", &record))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["added"], 1);
    assert_eq!(body["member_id"], "M001");

    // Same record again: audit row appended, no new member
    let response = app
        .oneshot(post_json("/api/admin/reconcile", &record))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["added"], 0);
    assert_eq!(body["skipped"], 1);

    let members = store.read_table(db::MEMBERS).await.unwrap().unwrap();
    assert_eq!(members.rows.len(), 1);
    assert_eq!(members.cell(&members.rows[0], "phone_number"), Some("5551234567"));

    let intake = store.read_table(db::REGISTRATIONS).await.unwrap().unwrap();
    assert_eq!(intake.rows.len(), 2);
}

#[tokio::test]
async fn reconcile_empty_body_runs_bulk_pass() {
    let store = setup_store().await;
    for (phone, name) in [("(555) 123-4567", "Jane Doe"), ("bad", "Ghost")] {
        store
            .append_row(
                db::REGISTRATIONS,
                &[
                    ("timestamp", "2024-01-01".to_string()),
                    ("phone_number", phone.to_string()),
                    ("display_name", name.to_string()),
                ],
            )
            .await
            .unwrap();
    }
    let app = setup_app(store.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/admin/reconcile")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["added"], 1);
    assert_eq!(body["skipped"], 1);
}

#[tokio::test]
async fn deactivate_reports_whether_anything_changed() {
    let store = setup_store().await;
    seed_member(&store, "M001", "5551234567", "Jane Doe").await;
    let app = setup_app(store.clone());

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/admin/deactivate",
            &json!({"phone_number": "555-123-4567"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deactivated"], true);

    let members = store.read_table(db::MEMBERS).await.unwrap().unwrap();
    assert_eq!(members.cell(&members.rows[0], "active"), Some("false"));

    let response = app
        .oneshot(post_json(
            "/api/admin/deactivate",
            &json!({"phone_number": "5550000000"}),
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["deactivated"], false);
}
