// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenID Connect login: authorization code exchange and ID token verification.
//!
//! Provider metadata and signing keys are discovered from
//! `{authority}/.well-known/openid-configuration` and cached.

use crate::config::Config;
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;
const TENANT_PLACEHOLDER: &str = "{tenantid}";

/// Identity extracted from a valid ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Lowercased email
    pub email: String,
    pub subject: String,
}

/// ID token verification error categories.
#[derive(Debug, Clone, Error)]
pub enum IdTokenError {
    /// The token is invalid or its claims do not match expectations.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Discovery, key fetch or code exchange failed.
    #[error("transient: {0}")]
    Transient(String),
}

/// Endpoints published by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
}

#[derive(Clone)]
enum VerifierMode {
    Discovery { discovery_url: String },
    StaticKey {
        metadata: ProviderMetadata,
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct MetadataCacheEntry {
    metadata: ProviderMetadata,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Login client for the configured identity provider.
pub struct IdTokenVerifier {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    mode: VerifierMode,
    metadata_cache: RwLock<Option<MetadataCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl IdTokenVerifier {
    /// Create a verifier that discovers provider metadata and signing keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            config.oidc_authority.trim_end_matches('/')
        );

        tracing::info!(
            discovery_url = %discovery_url,
            client_id = %config.oidc_client_id,
            "Initialized ID token verifier"
        );

        Self::build(config, VerifierMode::Discovery { discovery_url })
    }

    /// Create a verifier with fixed metadata and a static RSA public key.
    ///
    /// Used by tests that mint their own ID tokens.
    pub fn new_with_static_key(
        config: &Config,
        metadata: ProviderMetadata,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static ID token kid must not be empty");
        }

        Self::build(
            config,
            VerifierMode::StaticKey {
                metadata,
                kid,
                decoding_key: Arc::new(decoding_key),
            },
        )
    }

    fn build(config: &Config, mode: VerifierMode) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building OIDC HTTP client")?;

        Ok(Self {
            http_client,
            client_id: config.oidc_client_id.clone(),
            client_secret: config.oidc_client_secret.clone(),
            mode,
            metadata_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Provider endpoints, from cache or discovery.
    pub async fn metadata(&self) -> Result<ProviderMetadata, IdTokenError> {
        let discovery_url = match &self.mode {
            VerifierMode::StaticKey { metadata, .. } => return Ok(metadata.clone()),
            VerifierMode::Discovery { discovery_url } => discovery_url,
        };

        {
            let cache = self.metadata_cache.read().await;
            if let Some(entry) = cache
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                return Ok(entry.metadata.clone());
            }
        }

        let response = self
            .http_client
            .get(discovery_url)
            .send()
            .await
            .map_err(|e| IdTokenError::Transient(format!("discovery request failed: {e}")))?;

        if !response.status().is_success() {
            // Keep serving stale metadata rather than failing every login.
            if let Some(entry) = self.metadata_cache.read().await.as_ref() {
                tracing::warn!(
                    status = %response.status(),
                    "OIDC discovery failed; using cached metadata"
                );
                return Ok(entry.metadata.clone());
            }
            return Err(IdTokenError::Transient(format!(
                "discovery returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);
        let metadata: ProviderMetadata = response
            .json()
            .await
            .map_err(|e| IdTokenError::Transient(format!("invalid discovery JSON: {e}")))?;

        *self.metadata_cache.write().await = Some(MetadataCacheEntry {
            metadata: metadata.clone(),
            expires_at: Instant::now() + ttl,
        });

        Ok(metadata)
    }

    /// URL of the provider's authorize endpoint for this login attempt.
    pub async fn authorization_url(
        &self,
        redirect_uri: &str,
        state: &str,
        nonce: &str,
    ) -> Result<String, IdTokenError> {
        let metadata = self.metadata().await?;
        Ok(format!(
            "{}?client_id={}&response_type=code&response_mode=query&scope={}&redirect_uri={}&state={}&nonce={}",
            metadata.authorization_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
            urlencoding::encode(nonce),
        ))
    }

    /// Exchange an authorization code for the raw ID token.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String, IdTokenError> {
        let metadata = self.metadata().await?;

        let response = self
            .http_client
            .post(&metadata.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", "openid email profile"),
            ])
            .send()
            .await
            .map_err(|e| IdTokenError::Transient(format!("token request failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, body = %body, "Authorization code rejected");
            return Err(IdTokenError::Forbidden(format!(
                "token endpoint returned status {status}"
            )));
        }
        if !status.is_success() {
            return Err(IdTokenError::Transient(format!(
                "token endpoint returned status {status}"
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| IdTokenError::Transient(format!("invalid token JSON: {e}")))?;

        tokens
            .id_token
            .ok_or_else(|| IdTokenError::Forbidden("token response has no id_token".to_string()))
    }

    /// Verify an ID token and return the signed-in identity.
    pub async fn verify(
        &self,
        id_token: &str,
        expected_nonce: &str,
    ) -> Result<VerifiedIdentity, IdTokenError> {
        let header = decode_header(id_token)
            .map_err(|e| IdTokenError::Forbidden(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(IdTokenError::Forbidden(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| IdTokenError::Forbidden("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;
        let metadata = self.metadata().await?;

        // Issuer is checked below: multi-tenant metadata carries a placeholder.
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.validate_nbf = true;
        validation.leeway = CLOCK_SKEW_SECS;

        let claims = decode::<IdTokenClaims>(id_token, decoding_key.as_ref(), &validation)
            .map_err(|e| IdTokenError::Forbidden(format!("JWT validation failed: {e}")))?
            .claims;

        tracing::debug!(
            subject = %claims.sub,
            issuer = %claims.iss,
            exp = claims.exp,
            "ID token claims"
        );

        if !issuer_matches(&metadata.issuer, &claims.iss, claims.tid.as_deref()) {
            return Err(IdTokenError::Forbidden(format!(
                "unexpected issuer: {}",
                claims.iss
            )));
        }

        validate_iat(claims.iat)?;

        if claims.nonce.as_deref() != Some(expected_nonce) {
            return Err(IdTokenError::Forbidden("nonce mismatch".to_string()));
        }

        let email = claims
            .email
            .or(claims.preferred_username)
            .or(claims.upn)
            .map(|e| e.trim().to_lowercase())
            .filter(|e| e.contains('@'))
            .ok_or_else(|| IdTokenError::Forbidden("missing email claim".to_string()))?;

        Ok(VerifiedIdentity {
            email,
            subject: claims.sub,
        })
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, IdTokenError> {
        if let VerifierMode::StaticKey {
            kid: static_kid,
            decoding_key,
            ..
        } = &self.mode
        {
            if kid == static_kid {
                return Ok(decoding_key.clone());
            }
            return Err(IdTokenError::Forbidden(format!(
                "unknown JWT kid for static verifier: {kid}"
            )));
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        // Providers rotate keys; a miss forces one refetch.
        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(IdTokenError::Forbidden(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), IdTokenError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.metadata().await?.jwks_uri;
        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| IdTokenError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IdTokenError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| IdTokenError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);
        if keys_by_kid.is_empty() {
            return Err(IdTokenError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.jwks_cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "JWKS cache refreshed");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    #[serde(default)]
    kid: String,
    kty: String,
    alg: Option<String>,
    #[serde(default)]
    n: String,
    #[serde(default)]
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    exp: usize,
    iat: Option<usize>,
    nonce: Option<String>,
    /// Tenant ID (multi-tenant providers)
    tid: Option<String>,
    email: Option<String>,
    preferred_username: Option<String>,
    upn: Option<String>,
}

/// RS256 signing keys by kid; other key types are skipped.
fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

/// Compare issuers, substituting the token's tenant into a templated issuer.
fn issuer_matches(expected: &str, actual: &str, tenant_id: Option<&str>) -> bool {
    let expected = expected.trim_end_matches('/');
    let actual = actual.trim_end_matches('/');

    if !expected.contains(TENANT_PLACEHOLDER) {
        return expected == actual;
    }

    match tenant_id {
        Some(tid) if !tid.is_empty() => expected.replace(TENANT_PLACEHOLDER, tid) == actual,
        _ => false,
    }
}

fn validate_iat(iat: Option<usize>) -> Result<(), IdTokenError> {
    let Some(iat) = iat else {
        return Err(IdTokenError::Forbidden("missing iat claim".to_string()));
    };

    if iat as u64 > now_unix_secs() + CLOCK_SKEW_SECS {
        return Err(IdTokenError::Forbidden(
            "iat claim is in the future".to_string(),
        ));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|raw| raw.trim_matches('"').parse::<u64>().ok())
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cache_control_max_age_valid() {
        assert_eq!(
            parse_cache_control_max_age("public, max-age=3600"),
            Some(3600)
        );
        assert_eq!(parse_cache_control_max_age("max-age=\"120\""), Some(120));
    }

    #[test]
    fn parse_cache_control_max_age_invalid() {
        assert_eq!(parse_cache_control_max_age("public, immutable"), None);
        assert_eq!(parse_cache_control_max_age("max-age=abc"), None);
        assert_eq!(parse_cache_control_max_age(""), None);
    }

    #[test]
    fn issuer_exact_match() {
        assert!(issuer_matches(
            "https://accounts.example.edu/",
            "https://accounts.example.edu",
            None
        ));
        assert!(!issuer_matches(
            "https://accounts.example.edu",
            "https://evil.example.com",
            None
        ));
    }

    #[test]
    fn issuer_tenant_template() {
        let expected = "https://login.microsoftonline.com/{tenantid}/v2.0";
        assert!(issuer_matches(
            expected,
            "https://login.microsoftonline.com/abc-123/v2.0",
            Some("abc-123")
        ));
        assert!(!issuer_matches(
            expected,
            "https://login.microsoftonline.com/abc-123/v2.0",
            Some("other")
        ));
        assert!(!issuer_matches(
            expected,
            "https://login.microsoftonline.com/abc-123/v2.0",
            None
        ));
    }

    #[test]
    fn iat_in_future_rejected() {
        let future = (now_unix_secs() + 3600) as usize;
        assert!(matches!(
            validate_iat(Some(future)),
            Err(IdTokenError::Forbidden(_))
        ));
        assert!(validate_iat(Some(now_unix_secs() as usize)).is_ok());
        assert!(validate_iat(None).is_err());
    }

    #[test]
    fn errors_carry_category_and_reason() {
        let err: Box<dyn std::error::Error> =
            Box::new(IdTokenError::Transient("jwks fetch timed out".to_string()));
        assert_eq!(err.to_string(), "transient: jwks fetch timed out");
        assert_eq!(
            IdTokenError::Forbidden("nonce mismatch".to_string()).to_string(),
            "forbidden: nonce mismatch"
        );
    }

    #[test]
    fn non_rsa_keys_skipped() {
        let jwks: Jwks = serde_json::from_value(serde_json::json!({
            "keys": [
                {"kid": "ec", "kty": "EC", "crv": "P-256"},
                {"kid": "enc", "kty": "RSA", "use": "enc", "n": "AQAB", "e": "AQAB"}
            ]
        }))
        .unwrap();
        assert!(usable_keys(jwks).is_empty());
    }
}
