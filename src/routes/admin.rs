// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Staff-only routes: report export and reference data management.
//!
//! `require_staff` is applied in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::models::{ReferenceEntry, ReferenceKind, StatsFilter};
use crate::routes::api::parse_json_body;
use crate::services::export;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/reports/export", get(export_reports))
        .route("/api/admin/sports", post(create_sport))
        .route("/api/admin/sports/{id}/active", put(set_sport_active))
        .route(
            "/api/admin/healthcare-providers",
            post(create_healthcare_provider),
        )
        .route(
            "/api/admin/healthcare-providers/{id}/active",
            put(set_healthcare_provider_active),
        )
}

// ─── Export ──────────────────────────────────────────────────

/// Download matching reports as a CSV attachment.
async fn export_reports(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<StatsFilter>,
) -> Result<Response> {
    let filter = filter.normalized();
    let reports = state.report_service.reports(&filter).await?;
    let csv = export::reports_csv(&reports)?;

    tracing::info!(count = reports.len(), filter = ?filter, "Exported reports");

    let disposition = format!(
        "attachment; filename=\"clinic-reports-{}.csv\"",
        Utc::now().format("%Y%m%d")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

// ─── Reference Data ──────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateReferenceRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

/// Decode an admin request body, keeping failures in the JSON error shape.
fn parse_request<T: DeserializeOwned>(body: &Bytes, expected: &str) -> Result<T> {
    serde_json::from_value(parse_json_body(body)?)
        .map_err(|_| AppError::BadRequest(format!("Request body must be {}", expected)))
}

fn parse_entry_id(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid id: {}", raw)))
}

async fn create_entry(
    state: &AppState,
    kind: ReferenceKind,
    body: Bytes,
) -> Result<(StatusCode, Json<ReferenceEntry>)> {
    let request: CreateReferenceRequest = parse_request(&body, r#"{"name": string}"#)?;
    let entry = state.reference_service.create(kind, &request.name).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn create_sport(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ReferenceEntry>)> {
    create_entry(&state, ReferenceKind::Sport, body).await
}

async fn create_healthcare_provider(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<ReferenceEntry>)> {
    create_entry(&state, ReferenceKind::HealthcareProvider, body).await
}

async fn set_entry_active(
    state: &AppState,
    kind: ReferenceKind,
    raw_id: &str,
    body: Bytes,
) -> Result<Json<ReferenceEntry>> {
    let id = parse_entry_id(raw_id)?;
    let request: SetActiveRequest = parse_request(&body, r#"{"active": boolean}"#)?;
    Ok(Json(
        state
            .reference_service
            .set_active(kind, id, request.active)
            .await?,
    ))
}

async fn set_sport_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReferenceEntry>> {
    set_entry_active(&state, ReferenceKind::Sport, &id, body).await
}

async fn set_healthcare_provider_active(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ReferenceEntry>> {
    set_entry_active(&state, ReferenceKind::HealthcareProvider, &id, body).await
}
