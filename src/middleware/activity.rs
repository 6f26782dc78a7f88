// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authenticated request logging.
//!
//! Runs inside `require_auth`, so the `AuthUser` extension is present.
//! Records are written in the background after the response is built;
//! a failed write never affects the request.

use crate::ids;
use crate::middleware::auth::AuthUser;
use crate::models::UserActivity;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;

/// Record one `UserActivity` per authenticated request.
pub async fn record_activity(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let user = request.extensions().get::<AuthUser>().cloned();
    let action = request.uri().path().to_string();
    let ip_address = client_ip(request.headers());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let response = next.run(request).await;

    let Some(user) = user else {
        return response;
    };

    let now = Utc::now();
    let activity = UserActivity::new(
        &user.email,
        &action,
        &ip_address,
        &user_agent,
        &format_utc_rfc3339(now),
    );

    let document_id = match ids::new_token(&state.rng) {
        Ok(token) => format!("{}_{}", now.timestamp_micros(), token),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping activity record");
            return response;
        }
    };

    let db = state.db.clone();
    tokio::spawn(async move {
        if let Err(e) = db.record_activity(&document_id, &activity).await {
            tracing::warn!(
                error = %e,
                email = %activity.email,
                action = %activity.action,
                "Failed to record user activity"
            );
        }
    });

    response
}

/// First address in `X-Forwarded-For`, or empty when absent.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .unwrap_or_default()
}
