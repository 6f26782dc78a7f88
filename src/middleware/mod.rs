// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (authentication, activity logging, security headers).

pub mod activity;
pub mod auth;
pub mod security;

pub use activity::record_activity;
pub use auth::{require_auth, require_staff, AuthUser};
