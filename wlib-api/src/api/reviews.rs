//! Read-side review retrieval
//!
//! Projects review rows as header-keyed JSON objects. The stored
//! `phone_number` is always excluded from the projection, filtered or
//! not: reviews are public, member phones are not.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wlib_common::db::REVIEWS;
use wlib_common::Error;

use crate::{ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct ReviewsQuery {
    /// Optional exact-match filter
    pub wheel_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub success: bool,
    pub reviews: Vec<Value>,
}

/// GET /api/reviews
pub async fn get_reviews(
    State(state): State<AppState>,
    Query(query): Query<ReviewsQuery>,
) -> ApiResult<Json<ReviewsResponse>> {
    let table = state
        .store
        .read_table(REVIEWS)
        .await?
        .ok_or_else(|| Error::NotFound("Reviews table not found".to_string()))?;

    let filter = query.wheel_id.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let reviews = table
        .rows
        .iter()
        .filter(|row| match filter {
            Some(wheel_id) => table.cell(row, "wheel_id") == Some(wheel_id),
            None => true,
        })
        .map(|row| {
            let mut object = Map::new();
            for (idx, header) in table.headers.iter().enumerate() {
                if header == "phone_number" {
                    continue;
                }
                let cell = row.cells.get(idx).cloned().unwrap_or_default();
                object.insert(header.clone(), Value::String(cell));
            }
            Value::Object(object)
        })
        .collect();

    Ok(Json(ReviewsResponse {
        success: true,
        reviews,
    }))
}
