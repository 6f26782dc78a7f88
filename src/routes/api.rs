// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ReferenceKind, ReferenceOption};
use crate::services::NewReport;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sports", get(list_sports))
        .route("/api/healthcare-providers", get(list_healthcare_providers))
        .route("/api/reports", post(submit_report))
}

/// Parse a JSON request body, mapping syntax errors to 400.
pub(crate) fn parse_json_body(body: &Bytes) -> Result<serde_json::Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(|_| AppError::BadRequest("Invalid JSON body".to_string()))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub email: String,
    pub is_staff: bool,
}

/// Get the signed-in user.
async fn get_me(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse {
        email: user.email,
        is_staff: user.is_staff,
    })
}

// ─── Selection Lists ─────────────────────────────────────────

async fn list_sports(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ReferenceOption>>> {
    Ok(Json(
        state.reference_service.options(ReferenceKind::Sport).await?,
    ))
}

async fn list_healthcare_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ReferenceOption>>> {
    Ok(Json(
        state
            .reference_service
            .options(ReferenceKind::HealthcareProvider)
            .await?,
    ))
}

// ─── Report Submission ───────────────────────────────────────

/// Response for a successful submission.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SubmitReportResponse {
    pub success: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub week: u32,
    pub semester: String,
}

/// Submit a weekly report.
async fn submit_report(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: Bytes,
) -> Result<Json<SubmitReportResponse>> {
    let payload = parse_json_body(&body)?;
    let new_report = NewReport::from_payload(&payload).inspect_err(|e| {
        tracing::debug!(submitted_by = %user.email, error = %e, "Rejected report submission");
    })?;

    let report = state.report_service.submit(&user, new_report).await?;

    Ok(Json(SubmitReportResponse {
        success: true,
        id: report.id,
        week: report.week,
        semester: report.semester.to_string(),
    }))
}
