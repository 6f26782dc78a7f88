// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single sign-on routes.
//!
//! `/auth/login` redirects to the identity provider with an HMAC-signed
//! `state` bound to a nonce cookie. `/auth/callback` checks both, exchanges
//! the code, verifies the ID token and issues the session cookie.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ids;
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::services::IdTokenError;
use crate::AppState;

/// Readable by the frontend so it knows a session exists.
pub const LOGGED_IN_COOKIE: &str = "clinic_logged_in";
pub const NONCE_COOKIE: &str = "clinic_oauth_nonce";
pub const CALLBACK_PATH: &str = "/auth/callback";

/// How long a login attempt stays valid.
const STATE_MAX_AGE_SECS: u64 = 10 * 60;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(login))
        .route(CALLBACK_PATH, get(callback))
        .route("/auth/logout", post(logout))
}

fn redirect_uri(config: &Config) -> String {
    format!("{}{}", config.api_url.trim_end_matches('/'), CALLBACK_PATH)
}

fn secure_cookies(config: &Config) -> bool {
    config.frontend_url.starts_with("https://")
}

/// Parent domain of the frontend for the logged-in hint, or `None` on local hosts.
fn hint_cookie_domain(frontend_url: &str) -> Option<String> {
    let host = frontend_url
        .split("://")
        .nth(1)?
        .split(['/', ':'])
        .next()?
        .to_lowercase();

    if host == "localhost" || host.parse::<std::net::IpAddr>().is_ok() {
        return None;
    }

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 3 {
        return Some(host);
    }
    Some(labels[labels.len() - 2..].join("."))
}

fn nonce_cookie(config: &Config, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((NONCE_COOKIE, value))
        .path(CALLBACK_PATH)
        .http_only(true)
        .secure(secure_cookies(config))
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn session_cookie(config: &Config, value: String, max_age: time::Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure_cookies(config))
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

fn logged_in_cookie(config: &Config, value: String, max_age: time::Duration) -> Cookie<'static> {
    let mut builder = Cookie::build((LOGGED_IN_COOKIE, value))
        .path("/")
        .http_only(false)
        .secure(secure_cookies(config))
        .same_site(SameSite::Lax)
        .max_age(max_age);
    if let Some(domain) = hint_cookie_domain(&config.frontend_url) {
        builder = builder.domain(domain);
    }
    builder.build()
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_secs())
}

fn sign(payload: &str, key: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build the OAuth `state`: base64("nonce|issued_at_hex|signature_hex").
pub fn encode_state(nonce: &str, issued_at: u64, key: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", nonce, issued_at);
    let signature = sign(&payload, key)?;
    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a `state` and return its nonce if the signature and age check out.
pub fn verify_state(state: &str, key: &[u8], now: u64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    let mut parts = state_str.splitn(3, '|');
    let (nonce, issued_hex, signature_hex) = (parts.next()?, parts.next()?, parts.next()?);

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(format!("{}|{}", nonce, issued_hex).as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::warn!("OAuth state signature mismatch");
        return None;
    }

    let issued_at = u64::from_str_radix(issued_hex, 16).ok()?;
    if issued_at > now + 60 || now.saturating_sub(issued_at) > STATE_MAX_AGE_SECS {
        tracing::warn!(issued_at, now, "OAuth state expired");
        return None;
    }

    Some(nonce.to_string())
}

/// Start login: redirect to the identity provider.
async fn login(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Response> {
    let nonce = ids::new_token(&state.rng)?;
    let oauth_state = encode_state(&nonce, unix_now()?, &state.config.oauth_state_key)?;

    let auth_url = state
        .id_token_verifier
        .authorization_url(&redirect_uri(&state.config), &oauth_state, &nonce)
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    tracing::info!("Starting login, redirecting to identity provider");

    let max_age = time::Duration::seconds(STATE_MAX_AGE_SECS as i64);
    let jar = jar.add(nonce_cookie(&state.config, nonce, max_age));
    Ok((jar, Redirect::temporary(&auth_url)).into_response())
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn login_error(config: &Config, jar: CookieJar, code: &str) -> Response {
    let jar = jar.add(nonce_cookie(config, String::new(), time::Duration::ZERO));
    let url = format!(
        "{}/login?error={}",
        config.frontend_url.trim_end_matches('/'),
        urlencoding::encode(code)
    );
    (jar, Redirect::temporary(&url)).into_response()
}

/// Login callback: verify, exchange, and start the session.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<Response> {
    let config = &state.config;

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Identity provider returned an error");
        return Ok(login_error(config, jar, "access_denied"));
    }

    let (Some(code), Some(oauth_state)) = (params.code, params.state) else {
        return Ok(login_error(config, jar, "invalid_request"));
    };

    let Some(nonce) = verify_state(&oauth_state, &config.oauth_state_key, unix_now()?) else {
        return Ok(login_error(config, jar, "invalid_state"));
    };

    let cookie_matches = jar
        .get(NONCE_COOKIE)
        .is_some_and(|c| bool::from(c.value().as_bytes().ct_eq(nonce.as_bytes())));
    if !cookie_matches {
        tracing::warn!("OAuth nonce cookie missing or mismatched");
        return Ok(login_error(config, jar, "invalid_state"));
    }

    let verifier = &state.id_token_verifier;
    let identity = match verifier.exchange_code(&code, &redirect_uri(config)).await {
        Ok(id_token) => verifier.verify(&id_token, &nonce).await,
        Err(e) => Err(e),
    };
    let identity = match identity {
        Ok(identity) => identity,
        Err(IdTokenError::Forbidden(reason)) => {
            tracing::warn!(reason = %reason, "Login rejected");
            return Ok(login_error(config, jar, "login_failed"));
        }
        Err(IdTokenError::Transient(reason)) => {
            return Err(AppError::IdentityProvider(reason));
        }
    };

    if !config.is_allowed_email(&identity.email) {
        tracing::warn!(email = %identity.email, "Login refused: email domain not allowed");
        return Ok(login_error(config, jar, "domain_not_allowed"));
    }

    let jwt = create_jwt(&identity.email, &config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(
        email = %identity.email,
        is_staff = config.is_staff(&identity.email),
        "Login successful"
    );

    let session_age = time::Duration::seconds(SESSION_TTL_SECS as i64);
    let jar = jar
        .add(nonce_cookie(config, String::new(), time::Duration::ZERO))
        .add(session_cookie(config, jwt, session_age))
        .add(logged_in_cookie(config, "1".to_string(), session_age));

    let redirect = format!("{}/", config.frontend_url.trim_end_matches('/'));
    Ok((jar, Redirect::temporary(&redirect)).into_response())
}

/// Logout: expire every auth cookie.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let config = &state.config;
    let jar = jar
        .add(session_cookie(config, String::new(), time::Duration::ZERO))
        .add(logged_in_cookie(config, String::new(), time::Duration::ZERO))
        .add(nonce_cookie(config, String::new(), time::Duration::ZERO));

    (jar, StatusCode::NO_CONTENT).into_response()
}
