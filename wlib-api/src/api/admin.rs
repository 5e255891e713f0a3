//! Maintenance endpoints: intake reconciliation and deactivation
//!
//! The reconcile endpoint serves both triggers the reconciler supports:
//! a JSON body carrying one intake record is the "new registration
//! arrived" event (the record is also appended to the intake table for
//! audit); an empty body runs a bulk pass over the whole intake table.

use axum::{body::Bytes, extract::State, Json};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use wlib_common::db::REGISTRATIONS;
use wlib_common::registry::{self, IntakeRecord, ReconcileOutcome};
use wlib_common::store::TabularStore;
use wlib_common::Error;

use crate::{ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub added: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// POST /api/admin/reconcile
pub async fn reconcile(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ReconcileResponse>> {
    let store = state.store.as_ref();
    let _guard = state.write_gate.lock().await;

    // Empty (or empty-object) body means bulk; anything else must parse
    // as a single intake record.
    let trimmed = std::str::from_utf8(&body).unwrap_or("").trim();
    if trimmed.is_empty() || trimmed == "{}" {
        let summary = registry::reconcile_all(store).await?;
        return Ok(Json(ReconcileResponse {
            success: true,
            added: summary.added,
            skipped: summary.skipped,
            member_id: None,
            reason: None,
        }));
    }

    let mut record: IntakeRecord = serde_json::from_str(trimmed)
        .map_err(|e| Error::Validation(format!("Invalid intake record: {}", e)))?;
    if record.timestamp.trim().is_empty() {
        record.timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    }

    // Keep the intake audit trail when the table exists
    if store.has_table(REGISTRATIONS).await? {
        store
            .append_row(
                REGISTRATIONS,
                &[
                    ("timestamp", record.timestamp.clone()),
                    ("phone_number", record.phone_number.clone()),
                    ("display_name", record.display_name.clone()),
                    ("email", record.email.clone()),
                ],
            )
            .await?;
    }

    let outcome = registry::reconcile_row(store, &record).await?;
    let response = match outcome {
        ReconcileOutcome::Added { member_id } => ReconcileResponse {
            success: true,
            added: 1,
            skipped: 0,
            member_id: Some(member_id),
            reason: None,
        },
        ReconcileOutcome::Skipped { reason } => ReconcileResponse {
            success: true,
            added: 0,
            skipped: 1,
            member_id: None,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct DeactivateRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub success: bool,
    pub deactivated: bool,
}

/// POST /api/admin/deactivate
///
/// A member that cannot be found is reported, not an error: the response
/// says whether anything changed.
pub async fn deactivate(
    State(state): State<AppState>,
    Json(request): Json<DeactivateRequest>,
) -> ApiResult<Json<DeactivateResponse>> {
    let _guard = state.write_gate.lock().await;

    let deactivated =
        registry::deactivate(state.store.as_ref(), &request.phone_number).await?;
    if !deactivated {
        info!("Deactivate request matched no member");
    }

    Ok(Json(DeactivateResponse {
        success: true,
        deactivated,
    }))
}
