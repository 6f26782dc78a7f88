// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Clinic Reports: weekly patient-encounter reporting for athletic training students
//!
//! This crate provides the backend API for submitting weekly clinic reports,
//! assigning each report its semester and week, and aggregating dashboard
//! statistics for students and staff.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod semester;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use ring::rand::SystemRandom;
use services::{IdTokenVerifier, ReferenceService, ReportService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub id_token_verifier: Arc<IdTokenVerifier>,
    pub report_service: ReportService,
    pub reference_service: ReferenceService,
    pub rng: SystemRandom,
}

impl AppState {
    /// Wire services around a database handle.
    pub fn new(config: Config, db: FirestoreDb, id_token_verifier: Arc<IdTokenVerifier>) -> Self {
        Self {
            report_service: ReportService::new(db.clone()),
            reference_service: ReferenceService::new(db.clone()),
            config,
            db,
            id_token_verifier,
            rng: SystemRandom::new(),
        }
    }
}
