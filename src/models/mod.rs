// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod activity;
pub mod reference;
pub mod report;
pub mod stats;

pub use activity::UserActivity;
pub use reference::{HealthcareProvider, ReferenceEntry, ReferenceKind, ReferenceOption, Sport};
pub use report::{Category, CategoryCounts, Report};
pub use stats::{ClinicStats, SportHeatMap, StatsFilter};
