// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Reference entities selectable on the report form (sports, healthcare providers).

use crate::db::collections;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A named, activatable reference entry.
///
/// Inactive entries stay valid on historical reports but are hidden from
/// selection lists and rejected on new submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Entry ID (also used as document ID)
    pub id: u64,
    /// Display name (unique within its kind)
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub type Sport = ReferenceEntry;
pub type HealthcareProvider = ReferenceEntry;

/// Which reference collection an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Sport,
    HealthcareProvider,
}

impl ReferenceKind {
    pub fn collection(self) -> &'static str {
        match self {
            ReferenceKind::Sport => collections::SPORTS,
            ReferenceKind::HealthcareProvider => collections::HEALTHCARE_PROVIDERS,
        }
    }

    /// Label used in log lines and client messages.
    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Sport => "sport",
            ReferenceKind::HealthcareProvider => "healthcare provider",
        }
    }
}

/// Option shown in a selection list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ReferenceOption {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub id: u64,
    pub name: String,
}

impl From<&ReferenceEntry> for ReferenceOption {
    fn from(entry: &ReferenceEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name.clone(),
        }
    }
}

/// Active entries as selection options, sorted by name.
pub fn selectable_options(entries: &[ReferenceEntry]) -> Vec<ReferenceOption> {
    let mut options: Vec<ReferenceOption> = entries
        .iter()
        .filter(|e| e.active)
        .map(ReferenceOption::from)
        .collect();
    options.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    options
}
