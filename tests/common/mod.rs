// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use clinic_reports::config::Config;
use clinic_reports::db::FirestoreDb;
use clinic_reports::middleware::auth::create_jwt;
use clinic_reports::routes::create_router;
use clinic_reports::services::{IdTokenVerifier, ProviderMetadata};
use clinic_reports::AppState;
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::sync::Arc;

pub const STUDENT_EMAIL: &str = "alice@university.edu";
pub const STAFF_EMAIL: &str = "faculty@university.edu";

pub const TEST_KID: &str = "test-key-1";
pub const TEST_ISSUER: &str = "https://login.example.edu/v2.0";

const TEST_PRIVATE_KEY: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/test_id_token_key.pem"
));
const TEST_PUBLIC_KEY: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/test_id_token_key.pub.pem"
));

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Provider endpoints used by the static-key verifier.
#[allow(dead_code)]
pub fn test_metadata() -> ProviderMetadata {
    ProviderMetadata {
        issuer: TEST_ISSUER.to_string(),
        authorization_endpoint: "https://login.example.edu/oauth2/v2.0/authorize".to_string(),
        token_endpoint: "https://login.example.edu/oauth2/v2.0/token".to_string(),
        jwks_uri: "https://login.example.edu/discovery/v2.0/keys".to_string(),
    }
}

/// Key for signing test ID tokens (matches the verifier's static key).
#[allow(dead_code)]
pub fn test_signing_key() -> EncodingKey {
    EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY).expect("valid test private key")
}

#[allow(dead_code)]
pub fn test_verifier(config: &Config) -> Arc<IdTokenVerifier> {
    let decoding_key = DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY).expect("valid test public key");
    Arc::new(
        IdTokenVerifier::new_with_static_key(config, test_metadata(), TEST_KID, decoding_key)
            .expect("static verifier"),
    )
}

/// Create a test app around the given config and database.
#[allow(dead_code)]
pub fn create_app(config: Config, db: FirestoreDb) -> (axum::Router, Arc<AppState>) {
    let verifier = test_verifier(&config);
    let state = Arc::new(AppState::new(config, db, verifier));
    (create_router(state.clone()), state)
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_app(Config::test_default(), test_db_offline())
}

#[allow(dead_code)]
pub fn create_test_app_with_frontend_url(frontend_url: &str) -> (axum::Router, Arc<AppState>) {
    let mut config = Config::test_default();
    config.frontend_url = frontend_url.to_string();
    create_app(config, test_db_offline())
}

/// Create a test app backed by the Firestore emulator.
#[allow(dead_code)]
pub async fn create_emulator_app() -> (axum::Router, Arc<AppState>) {
    create_app(Config::test_default(), test_db().await)
}

/// `Authorization` header value for a session as `email`.
#[allow(dead_code)]
pub fn bearer(state: &AppState, email: &str) -> String {
    let token = create_jwt(email, &state.config.jwt_signing_key).expect("create JWT");
    format!("Bearer {}", token)
}

/// Unique suffix so emulator tests don't see each other's data.
#[allow(dead_code)]
pub fn unique_suffix() -> String {
    format!(
        "{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}
