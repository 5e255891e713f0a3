//! Submission endpoint: classify, validate, gate, execute
//!
//! One POST entry point receives every form submission. The payload is
//! dynamic JSON: an explicit `action` discriminator wins, otherwise the
//! kind is inferred from which fields are present, mirroring the forms
//! that feed the service. Validation happens before any side effect, and
//! all mutating paths run under the state write gate.

use axum::extract::rejection::JsonRejection;
use axum::{extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use wlib_common::db::{INVENTORY, REVIEWS, SIGNUPS};
use wlib_common::registry::{resolve_member_id, verify_member};
use wlib_common::store::TabularStore;
use wlib_common::Error;

use crate::{ApiResult, AppState};

/// The four submission kinds the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    Signup,
    Checkout,
    Review,
    AddWheel,
}

impl SubmissionKind {
    /// Fields that must be present and non-empty before anything runs.
    /// Phone fields with a system-account escape hatch are checked
    /// separately in the membership gate.
    fn required_fields(self) -> &'static [&'static str] {
        match self {
            SubmissionKind::Signup => {
                &["phone_number", "display_name", "experience_level", "primary_style"]
            }
            SubmissionKind::Checkout => &["phone_number", "display_name", "wheel_id"],
            SubmissionKind::Review => &["display_name", "wheel_id", "rating"],
            SubmissionKind::AddWheel => &[
                "lender_display_name",
                "wheel_name",
                "brand",
                "wheel_size",
                "durometer",
                "material",
            ],
        }
    }

    /// Which fields carry the submitter's display name and phone.
    fn identity_fields(self) -> (&'static str, &'static str) {
        match self {
            SubmissionKind::AddWheel => ("lender_display_name", "lender_phone"),
            _ => ("display_name", "phone_number"),
        }
    }
}

/// Classify a payload by shape. The explicit `action` discriminator
/// takes precedence; otherwise review fields, then add-wheel fields,
/// decide. `None` means unclassifiable.
pub fn classify(payload: &Value) -> Option<SubmissionKind> {
    match text_field(payload, "action").as_deref().map(str::trim) {
        Some("signup") => return Some(SubmissionKind::Signup),
        Some("checkout") => return Some(SubmissionKind::Checkout),
        _ => {}
    }
    if is_present(payload, "rating") || is_present(payload, "review_text") {
        return Some(SubmissionKind::Review);
    }
    if is_present(payload, "wheel_name") && is_present(payload, "brand") {
        return Some(SubmissionKind::AddWheel);
    }
    None
}

/// A field counts as present when it exists, is not null, and is not an
/// empty string.
fn is_present(payload: &Value, name: &str) -> bool {
    match payload.get(name) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Render a scalar field as text. Arrays and objects yield `None`.
fn text_field(payload: &Value, name: &str) -> Option<String> {
    match payload.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or_empty(payload: &Value, name: &str) -> String {
    text_field(payload, name).unwrap_or_default()
}

/// First missing required field fails the whole submission.
fn validate_required(kind: SubmissionKind, payload: &Value) -> Result<(), Error> {
    for field in kind.required_fields() {
        if !is_present(payload, field) {
            return Err(Error::Validation(format!("Missing required field: {}", field)));
        }
    }
    Ok(())
}

/// The `best_for` multi-select arrives as an array from the form and as
/// plain text from older clients; both normalize to delimited text.
fn normalize_best_for(payload: &Value) -> String {
    match payload.get("best_for") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn now_text() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Successful submission envelope. Failures go through `ApiError`.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wheel_id: Option<String>,
}

impl SubmitResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            wheel_id: None,
        }
    }
}

/// POST /api/submit
pub async fn submit(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    // Malformed bodies still get the structured failure envelope
    let Json(payload) =
        payload.map_err(|err| Error::Validation(format!("Invalid JSON body: {}", err)))?;

    let kind = classify(&payload)
        .ok_or_else(|| Error::Validation("Unknown submission type".to_string()))?;

    validate_required(kind, &payload)?;

    let (name_field, phone_field) = kind.identity_fields();
    let display_name = text_or_empty(&payload, name_field);
    let system_account = state.config.system_accounts.contains(&display_name);

    if system_account {
        info!("System account submission from {:?}, skipping verification", display_name);
    } else {
        // Review and add-wheel phones are only required for non-system
        // submitters, so the check lives here rather than in the fixed
        // required-field list.
        if !is_present(&payload, phone_field) {
            return Err(Error::Validation(format!("Missing required field: {}", phone_field)).into());
        }
        let phone = text_or_empty(&payload, phone_field);
        let verified = verify_member(state.store.as_ref(), state.config.verify_policy, &phone).await;
        if !verified {
            return Err(Error::Membership(
                "Phone number not found in member list. Please ensure you are a registered member."
                    .to_string(),
            )
            .into());
        }
    }

    // All execution paths mutate the store; serialize them so id
    // generation never races another append.
    let _guard = state.write_gate.lock().await;

    let response = match kind {
        SubmissionKind::Signup => handle_signup(&state, &payload).await?,
        SubmissionKind::Checkout => handle_checkout(&state, &payload).await?,
        SubmissionKind::Review => handle_review(&state, &payload).await?,
        SubmissionKind::AddWheel => handle_add_wheel(&state, &payload, system_account).await?,
    };

    Ok(Json(response))
}

/// Record a signup in the audit table when one exists. Its absence is
/// not an error; the canonical registry is maintained by reconciliation.
async fn handle_signup(state: &AppState, payload: &Value) -> Result<SubmitResponse, Error> {
    let store = state.store.as_ref();

    if store.has_table(SIGNUPS).await? {
        store
            .append_row(
                SIGNUPS,
                &[
                    ("timestamp", now_text()),
                    ("phone_number", text_or_empty(payload, "phone_number")),
                    ("display_name", text_or_empty(payload, "display_name")),
                    ("experience_level", text_or_empty(payload, "experience_level")),
                    ("primary_style", text_or_empty(payload, "primary_style")),
                ],
            )
            .await?;
        info!("Signup recorded for {:?}", text_or_empty(payload, "display_name"));
    } else {
        info!("No signups table; signup accepted without audit row");
    }

    Ok(SubmitResponse::ok("Signup submitted successfully"))
}

/// Mark a wheel as checked out. First row with an exact `wheel_id` match
/// wins; a missing wheel leaves the inventory untouched.
async fn handle_checkout(state: &AppState, payload: &Value) -> Result<SubmitResponse, Error> {
    let store = state.store.as_ref();
    let wheel_id = text_or_empty(payload, "wheel_id");
    let wheel_id = wheel_id.trim();

    let table = store
        .read_table(INVENTORY)
        .await?
        .ok_or_else(|| Error::NotFound("Inventory table not found".to_string()))?;

    let row = table
        .rows
        .iter()
        .find(|row| table.cell(row, "wheel_id") == Some(wheel_id))
        .ok_or_else(|| Error::NotFound(format!("Wheel {} not found in inventory", wheel_id)))?;

    store.update_cell(INVENTORY, row.id, "status", "checked out").await?;
    info!(
        "Wheel {} checked out by {:?}",
        wheel_id,
        text_or_empty(payload, "display_name")
    );

    Ok(SubmitResponse::ok("Wheel checked out successfully"))
}

/// Append a review row. The phone number is stored for audit but never
/// served back out (see the reviews endpoint).
async fn handle_review(state: &AppState, payload: &Value) -> Result<SubmitResponse, Error> {
    let store = state.store.as_ref();

    store
        .append_row(
            REVIEWS,
            &[
                // Blank for system accounts; the gate already ran
                ("phone_number", text_or_empty(payload, "phone_number")),
                ("display_name", text_or_empty(payload, "display_name")),
                ("wheel_id", text_or_empty(payload, "wheel_id")),
                ("wheel_name", text_or_empty(payload, "wheel_name")),
                ("experience_level", text_or_empty(payload, "experience_level")),
                ("hours_on_wheels", text_or_empty(payload, "hours_on_wheels")),
                ("rating", text_or_empty(payload, "rating")),
                ("review_text", text_or_empty(payload, "review_text")),
                ("environment", text_or_empty(payload, "environment")),
                ("timestamp", now_text()),
            ],
        )
        .await?;

    info!(
        "Review recorded for wheel {:?}",
        text_or_empty(payload, "wheel_id")
    );
    Ok(SubmitResponse::ok("Review submitted successfully"))
}

/// Add a wheel to the inventory with a freshly minted id.
async fn handle_add_wheel(
    state: &AppState,
    payload: &Value,
    system_account: bool,
) -> Result<SubmitResponse, Error> {
    let store = state.store.as_ref();

    if !store.has_table(INVENTORY).await? {
        return Err(Error::NotFound("Inventory table not found".to_string()));
    }

    let wheel_id = wlib_common::ids::next_id(store, INVENTORY, "wheel_id", "W").await?;

    // System accounts lend house wheels; their lender id stays empty
    let lender_id = if system_account {
        String::new()
    } else {
        resolve_member_id(store, &text_or_empty(payload, "lender_phone")).await
    };

    store
        .append_row(
            INVENTORY,
            &[
                ("wheel_id", wheel_id.clone()),
                ("wheel_name", text_or_empty(payload, "wheel_name")),
                ("brand", text_or_empty(payload, "brand")),
                ("wheel_size", text_or_empty(payload, "wheel_size")),
                ("wheel_material", text_or_empty(payload, "material")),
                ("durometer_category", text_or_empty(payload, "durometer")),
                ("best_for", normalize_best_for(payload)),
                ("status", "available".to_string()),
                ("lender_id", lender_id),
                (
                    "bearings_included",
                    text_field(payload, "bearings_included")
                        .filter(|s| !s.trim().is_empty())
                        .unwrap_or_else(|| "No".to_string()),
                ),
                ("bearing_size", text_or_empty(payload, "bearing_size")),
                ("bearing_material", text_or_empty(payload, "bearing_material")),
                ("timestamp", now_text()),
            ],
        )
        .await?;

    info!("Wheel added: {}", wheel_id);
    Ok(SubmitResponse {
        success: true,
        message: "Wheel added successfully".to_string(),
        wheel_id: Some(wheel_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_discriminator_takes_precedence() {
        // Review-shaped payload, but the action field decides
        let payload = json!({"action": "signup", "rating": 5});
        assert_eq!(classify(&payload), Some(SubmissionKind::Signup));

        let payload = json!({"action": "checkout", "wheel_name": "x", "brand": "y"});
        assert_eq!(classify(&payload), Some(SubmissionKind::Checkout));
    }

    #[test]
    fn review_inferred_from_rating_or_text() {
        assert_eq!(
            classify(&json!({"rating": 4})),
            Some(SubmissionKind::Review)
        );
        assert_eq!(
            classify(&json!({"review_text": "grippy"})),
            Some(SubmissionKind::Review)
        );
    }

    #[test]
    fn add_wheel_inferred_from_name_and_brand() {
        assert_eq!(
            classify(&json!({"wheel_name": "Halo", "brand": "Luminous"})),
            Some(SubmissionKind::AddWheel)
        );
        // Name alone is not enough
        assert_eq!(classify(&json!({"wheel_name": "Halo"})), None);
    }

    #[test]
    fn unknown_payload_is_unclassifiable() {
        assert_eq!(classify(&json!({})), None);
        assert_eq!(classify(&json!({"action": "dance"})), None);
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let payload = json!({
            "action": "checkout",
            "phone_number": "5551234567",
            "display_name": "Jane Doe",
            "wheel_id": ""
        });
        let err = validate_required(SubmissionKind::Checkout, &payload).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: wheel_id");
    }

    #[test]
    fn null_and_empty_fields_count_as_missing() {
        let payload = json!({"display_name": null, "wheel_id": "W001", "rating": 5});
        let err = validate_required(SubmissionKind::Review, &payload).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: display_name");

        // Numeric rating is present even when zero-ish
        let payload = json!({"display_name": "Jane", "wheel_id": "W001", "rating": 0});
        assert!(validate_required(SubmissionKind::Review, &payload).is_ok());
    }

    #[test]
    fn best_for_joins_arrays_and_passes_strings() {
        assert_eq!(
            normalize_best_for(&json!({"best_for": ["park", "street"]})),
            "park, street"
        );
        assert_eq!(
            normalize_best_for(&json!({"best_for": "trails"})),
            "trails"
        );
        assert_eq!(normalize_best_for(&json!({})), "");
    }
}
