// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard statistics routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ClinicStats, SportHeatMap, StatsFilter};
use crate::routes::api::parse_json_body;
use crate::AppState;
use axum::{body::Bytes, extract::State, routing::post, Extension, Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard/stats", post(fetch_stats))
        .route("/api/dashboard/heatmap", post(fetch_heat_map))
}

/// Parse filters from a request body and scope them to the caller.
///
/// An empty body means no filters. Anything that is not an object of
/// string (or null) values is rejected as a whole.
pub fn scoped_filter(body: &Bytes, user: &AuthUser) -> Result<StatsFilter> {
    let filter = match parse_json_body(body)? {
        Value::Null => StatsFilter::default(),
        value @ Value::Object(_) => serde_json::from_value(value).map_err(|_| {
            AppError::BadRequest("Filter values must be strings".to_string())
        })?,
        _ => {
            return Err(AppError::BadRequest(
                "Filters must be a JSON object".to_string(),
            ))
        }
    };

    Ok(filter.scoped_for(user))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: ClinicStats,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct HeatMapResponse {
    pub success: bool,
    pub heatmap: SportHeatMap,
}

async fn fetch_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<StatsResponse>> {
    let filter = scoped_filter(&body, &user)?;
    tracing::debug!(email = %user.email, filter = ?filter, "Fetching dashboard stats");

    let stats = state.report_service.stats(&filter).await?;
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

async fn fetch_heat_map(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<HeatMapResponse>> {
    let filter = scoped_filter(&body, &user)?;

    let heatmap = state.report_service.heat_map(&filter).await?;
    Ok(Json(HeatMapResponse {
        success: true,
        heatmap,
    }))
}
