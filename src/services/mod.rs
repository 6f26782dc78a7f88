// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod export;
pub mod id_token;
pub mod reference;
pub mod reports;

pub use id_token::{IdTokenError, IdTokenVerifier, ProviderMetadata, VerifiedIdentity};
pub use reference::ReferenceService;
pub use reports::{NewReport, ReportService};
