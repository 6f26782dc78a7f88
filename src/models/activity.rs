// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User activity log record.

use serde::{Deserialize, Serialize};

const MAX_ACTION_LEN: usize = 500;
const MAX_IP_LEN: usize = 45;
const MAX_USER_AGENT_LEN: usize = 300;

/// One authenticated request, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserActivity {
    /// Authenticated user's email
    pub email: String,
    /// Request path
    pub action: String,
    pub ip_address: String,
    pub user_agent: String,
    /// When the request was handled (ISO 8601)
    pub created_at: String,
}

impl UserActivity {
    /// Build a record, truncating fields to their storage limits.
    pub fn new(email: &str, action: &str, ip_address: &str, user_agent: &str, now: &str) -> Self {
        Self {
            email: email.to_string(),
            action: truncate_chars(action, MAX_ACTION_LEN),
            ip_address: truncate_chars(ip_address, MAX_IP_LEN),
            user_agent: truncate_chars(user_agent, MAX_USER_AGENT_LEN),
            created_at: now.to_string(),
        }
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
