//! Member registry reconciler
//!
//! Verifies membership against the canonical `members` table, resolves
//! phones to member ids, and upserts intake registrations into the
//! registry without duplication.
//!
//! Verification is governed by an explicit infrastructure-error policy.
//! The production default is fail-open: a missing table, missing column,
//! empty registry, or read error allows the submission through with a
//! warning instead of locking every member out because the registry is
//! mid-migration. Tests (and stricter deployments) run the same code
//! with the deny policy.

use crate::db::{MEMBERS, REGISTRATIONS};
use crate::ids::next_id;
use crate::phone::{is_canonical, normalize_phone};
use crate::store::TabularStore;
use crate::Result;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// How membership verification resolves infrastructure failures
/// (absent table, absent column, empty registry, store read error).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraErrorPolicy {
    /// Treat the failure as "member verified" (availability over gating)
    Allow,
    /// Treat the failure as "not a member"
    Deny,
}

/// Verification policy carried in application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    pub on_infra_error: InfraErrorPolicy,
}

impl VerifyPolicy {
    pub fn allow() -> Self {
        Self {
            on_infra_error: InfraErrorPolicy::Allow,
        }
    }

    pub fn deny() -> Self {
        Self {
            on_infra_error: InfraErrorPolicy::Deny,
        }
    }
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self::allow()
    }
}

enum Verification {
    Matched,
    NotMatched,
    Infra(String),
}

/// Scan the registry phone column for the canonical key. Distinguishes
/// a real miss from registry infrastructure problems so the policy can
/// decide what the latter mean.
async fn scan_registry(store: &dyn TabularStore, key: &str) -> Result<Verification> {
    let Some(table) = store.read_table(MEMBERS).await? else {
        return Ok(Verification::Infra("members table not found".to_string()));
    };
    let Some(phone_idx) = table.column_index("phone_number") else {
        return Ok(Verification::Infra(
            "phone_number column not found in members table".to_string(),
        ));
    };
    if table.is_empty() {
        return Ok(Verification::Infra("members table has no rows".to_string()));
    }

    // An empty canonical key never matches anything, including rows
    // whose own phone cell is blank.
    if !key.is_empty() {
        for row in &table.rows {
            let stored = row.cells.get(phone_idx).map(String::as_str).unwrap_or("");
            if normalize_phone(stored) == key {
                return Ok(Verification::Matched);
            }
        }
    }

    Ok(Verification::NotMatched)
}

/// Check whether `phone` belongs to a registered member.
///
/// Returns false only when the registry exists, has data, and no row
/// matches the canonical key; everything else resolves per `policy`.
pub async fn verify_member(store: &dyn TabularStore, policy: VerifyPolicy, phone: &str) -> bool {
    let key = normalize_phone(phone);
    let fallback = policy.on_infra_error == InfraErrorPolicy::Allow;

    match scan_registry(store, &key).await {
        Ok(Verification::Matched) => true,
        Ok(Verification::NotMatched) => false,
        Ok(Verification::Infra(reason)) => {
            warn!(
                "Member verification skipped ({}); policy {}",
                reason,
                if fallback { "allows" } else { "denies" }
            );
            fallback
        }
        Err(e) => {
            warn!(
                "Member verification failed ({}); policy {}",
                e,
                if fallback { "allows" } else { "denies" }
            );
            fallback
        }
    }
}

/// Resolve `phone` to the matching member's id, or the empty string when
/// there is no match, the registry is absent, or the needed columns are
/// missing. Errors are reported as warnings, never raised.
pub async fn resolve_member_id(store: &dyn TabularStore, phone: &str) -> String {
    let key = normalize_phone(phone);
    if key.is_empty() {
        return String::new();
    }

    let table = match store.read_table(MEMBERS).await {
        Ok(Some(table)) => table,
        Ok(None) => return String::new(),
        Err(e) => {
            warn!("Member id lookup failed: {}", e);
            return String::new();
        }
    };

    let (Some(phone_idx), Some(id_idx)) =
        (table.column_index("phone_number"), table.column_index("member_id"))
    else {
        return String::new();
    };

    for row in &table.rows {
        let stored = row.cells.get(phone_idx).map(String::as_str).unwrap_or("");
        if normalize_phone(stored) == key {
            return row.cells.get(id_idx).cloned().unwrap_or_default();
        }
    }

    String::new()
}

/// One raw registration from the intake source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRecord {
    #[serde(default)]
    pub timestamp: String,
    pub phone_number: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

/// Result of reconciling one intake record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Added { member_id: String },
    Skipped { reason: String },
}

/// Counts from a bulk reconcile pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Canonical keys of currently active members. Built once per reconcile
/// pass so bulk runs check duplicates in O(1) instead of rescanning the
/// registry per intake row.
async fn active_member_keys(store: &dyn TabularStore) -> Result<HashSet<String>> {
    let mut keys = HashSet::new();
    let Some(table) = store.read_table(MEMBERS).await? else {
        return Ok(keys);
    };
    let Some(phone_idx) = table.column_index("phone_number") else {
        return Ok(keys);
    };
    let active_idx = table.column_index("active");

    for row in &table.rows {
        // Rows without an active column count as active (legacy data)
        let active = match active_idx {
            Some(idx) => !row
                .cells
                .get(idx)
                .map(|v| v.trim().eq_ignore_ascii_case("false"))
                .unwrap_or(false),
            None => true,
        };
        if !active {
            continue;
        }
        let key = normalize_phone(row.cells.get(phone_idx).map(String::as_str).unwrap_or(""));
        if !key.is_empty() {
            keys.insert(key);
        }
    }
    Ok(keys)
}

async fn reconcile_with_keys(
    store: &dyn TabularStore,
    record: &IntakeRecord,
    existing: &mut HashSet<String>,
) -> Result<ReconcileOutcome> {
    let key = normalize_phone(&record.phone_number);
    if !is_canonical(&key) {
        warn!(
            "Skipping registration for {:?}: phone {:?} does not normalize to 10 digits",
            record.display_name, record.phone_number
        );
        return Ok(ReconcileOutcome::Skipped {
            reason: format!("phone number {:?} is not a 10-digit number", record.phone_number),
        });
    }
    if existing.contains(&key) {
        return Ok(ReconcileOutcome::Skipped {
            reason: "already registered".to_string(),
        });
    }

    let member_id = next_id(store, MEMBERS, "member_id", "M").await?;
    let registered_date = if record.timestamp.trim().is_empty() {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    } else {
        record.timestamp.clone()
    };

    store
        .append_row(
            MEMBERS,
            &[
                ("member_id", member_id.clone()),
                ("phone_number", key.clone()),
                ("display_name", record.display_name.clone()),
                ("email", record.email.clone()),
                ("registered_date", registered_date),
                ("active", "true".to_string()),
            ],
        )
        .await?;

    existing.insert(key);
    info!("Registered member {} ({})", member_id, record.display_name);
    Ok(ReconcileOutcome::Added { member_id })
}

/// Reconcile a single intake record into the registry.
///
/// Skips when the phone does not normalize to exactly 10 digits or when
/// an active member already holds the canonical key; otherwise appends a
/// new member with a fresh `M`-prefixed id. Idempotent: running twice
/// over the same record adds exactly one member.
pub async fn reconcile_row(
    store: &dyn TabularStore,
    record: &IntakeRecord,
) -> Result<ReconcileOutcome> {
    let mut existing = active_member_keys(store).await?;
    reconcile_with_keys(store, record, &mut existing).await
}

/// Reconcile the whole `registrations` intake table into the registry.
///
/// An absent intake table is not an error; it just reconciles nothing.
pub async fn reconcile_all(store: &dyn TabularStore) -> Result<ReconcileSummary> {
    let mut summary = ReconcileSummary::default();

    let Some(intake) = store.read_table(REGISTRATIONS).await? else {
        warn!("No registrations table; nothing to reconcile");
        return Ok(summary);
    };

    let mut existing = active_member_keys(store).await?;
    for row in &intake.rows {
        let record = IntakeRecord {
            timestamp: intake.cell(row, "timestamp").unwrap_or("").to_string(),
            phone_number: intake.cell(row, "phone_number").unwrap_or("").to_string(),
            display_name: intake.cell(row, "display_name").unwrap_or("").to_string(),
            email: intake.cell(row, "email").unwrap_or("").to_string(),
        };
        match reconcile_with_keys(store, &record, &mut existing).await? {
            ReconcileOutcome::Added { .. } => summary.added += 1,
            ReconcileOutcome::Skipped { .. } => summary.skipped += 1,
        }
    }

    info!(
        "Reconcile pass complete: {} added, {} skipped",
        summary.added, summary.skipped
    );
    Ok(summary)
}

/// Mark the first member matching `phone` as inactive.
///
/// Returns false (reported, not raised) when there is no registry, no
/// `active` column, or no matching member.
pub async fn deactivate(store: &dyn TabularStore, phone: &str) -> Result<bool> {
    let key = normalize_phone(phone);
    if key.is_empty() {
        return Ok(false);
    }

    let Some(table) = store.read_table(MEMBERS).await? else {
        warn!("Deactivate: members table not found");
        return Ok(false);
    };
    let Some(phone_idx) = table.column_index("phone_number") else {
        warn!("Deactivate: phone_number column not found");
        return Ok(false);
    };
    if table.column_index("active").is_none() {
        warn!("Deactivate: active column not found");
        return Ok(false);
    }

    for row in &table.rows {
        let stored = row.cells.get(phone_idx).map(String::as_str).unwrap_or("");
        if normalize_phone(stored) == key {
            let updated = store.update_cell(MEMBERS, row.id, "active", "false").await?;
            if updated {
                info!("Deactivated member with key {}", key);
            }
            return Ok(updated);
        }
    }

    Ok(false)
}
