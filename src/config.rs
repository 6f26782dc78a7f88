// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment, so
//! everything is read once at startup.

use hkdf::Hkdf;
use sha2::Sha256;
use std::env;

/// Default identity provider authority (Microsoft Entra ID, any work/school tenant).
pub const DEFAULT_OIDC_AUTHORITY: &str = "https://login.microsoftonline.com/organizations/v2.0";

const OAUTH_STATE_KEY_INFO: &[u8] = b"clinic-reports oauth state v1";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for login redirects
    pub frontend_url: String,
    /// Public URL of this API (OAuth callback base)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// OIDC issuer base (discovery lives under `/.well-known/openid-configuration`)
    pub oidc_authority: String,
    /// OAuth client ID registered with the identity provider
    pub oidc_client_id: String,
    /// Email domains allowed to sign in (lowercase)
    pub allowed_domains: Vec<String>,
    /// Emails with staff (faculty) access (lowercase)
    pub staff_emails: Vec<String>,

    // --- Secrets ---
    /// OAuth client secret
    pub oidc_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();

        let oauth_state_key = match env::var("OAUTH_STATE_KEY") {
            Ok(key) => key.into_bytes(),
            Err(_) => derive_state_key(&jwt_signing_key)?,
        };

        let allowed_domains = parse_list(&env::var("ALLOWED_DOMAINS").unwrap_or_default());
        if allowed_domains.is_empty() {
            tracing::warn!("ALLOWED_DOMAINS is empty; every login will be refused");
        }

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            oidc_authority: env::var("OIDC_AUTHORITY")
                .unwrap_or_else(|_| DEFAULT_OIDC_AUTHORITY.to_string()),
            oidc_client_id: env::var("OIDC_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("OIDC_CLIENT_ID"))?,
            allowed_domains,
            staff_emails: parse_list(&env::var("STAFF_EMAILS").unwrap_or_default()),

            oidc_client_secret: env::var("OIDC_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("OIDC_CLIENT_SECRET"))?,
            jwt_signing_key,
            oauth_state_key,
        })
    }

    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            oidc_authority: "https://login.example.edu/v2.0".to_string(),
            oidc_client_id: "test_client_id".to_string(),
            allowed_domains: vec!["university.edu".to_string()],
            staff_emails: vec!["faculty@university.edu".to_string()],
            oidc_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key_32_bytes!!".to_vec(),
        }
    }

    /// Whether the email's domain is on the sign-in allowlist.
    pub fn is_allowed_email(&self, email: &str) -> bool {
        let Some((local, domain)) = email.trim().rsplit_once('@') else {
            return false;
        };
        if local.is_empty() {
            return false;
        }
        let domain = domain.to_lowercase();
        self.allowed_domains.iter().any(|d| *d == domain)
    }

    /// Whether the email has staff (faculty) access.
    pub fn is_staff(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.staff_emails.iter().any(|s| *s == email)
    }
}

/// Split a comma-separated list, trimming and lowercasing entries.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn derive_state_key(jwt_signing_key: &[u8]) -> Result<Vec<u8>, ConfigError> {
    let hk = Hkdf::<Sha256>::new(None, jwt_signing_key);
    let mut okm = [0u8; 32];
    hk.expand(OAUTH_STATE_KEY_INFO, &mut okm)
        .map_err(|e| ConfigError::Invalid(format!("OAuth state key derivation failed: {e}")))?;
    Ok(okm.to_vec())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
