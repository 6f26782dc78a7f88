// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Random identifiers for stored documents.

use ring::rand::{SecureRandom, SystemRandom};

/// Largest integer a JSON client can represent exactly (2^53 - 1).
pub const MAX_JSON_SAFE_ID: u64 = (1 << 53) - 1;

/// Generate a random non-zero document ID that survives a JSON number round trip.
///
/// Used for reports and reference entries alike.
pub fn new_document_id(rng: &SystemRandom) -> anyhow::Result<u64> {
    loop {
        let mut bytes = [0u8; 8];
        rng.fill(&mut bytes)
            .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
        let id = u64::from_be_bytes(bytes) & MAX_JSON_SAFE_ID;
        if id != 0 {
            return Ok(id);
        }
    }
}

/// Generate a random 128-bit hex token (document keys, OAuth nonces).
pub fn new_token(rng: &SystemRandom) -> anyhow::Result<String> {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes)
        .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
    Ok(hex::encode(bytes))
}
