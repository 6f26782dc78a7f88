// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sports and healthcare provider administration.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::ids;
use crate::models::reference::selectable_options;
use crate::models::{ReferenceEntry, ReferenceKind, ReferenceOption};
use ring::rand::SystemRandom;

const MAX_NAME_LEN: usize = 100;

/// Trim a proposed entry name and check its length.
pub fn normalize_name(kind: ReferenceKind, raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(AppError::Validation(format!(
            "{} name must be 1-{} characters",
            capitalize(kind.label()),
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Read and manage reference entries.
#[derive(Clone)]
pub struct ReferenceService {
    db: FirestoreDb,
    rng: SystemRandom,
}

impl ReferenceService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            rng: SystemRandom::new(),
        }
    }

    /// Active entries for a selection list.
    pub async fn options(&self, kind: ReferenceKind) -> Result<Vec<ReferenceOption>> {
        let entries = self.db.list_references(kind).await?;
        Ok(selectable_options(&entries))
    }

    /// Create a new active entry; names are unique within a kind.
    ///
    /// IDs are random, and the write fails rather than replacing an
    /// existing document.
    pub async fn create(&self, kind: ReferenceKind, raw_name: &str) -> Result<ReferenceEntry> {
        let name = normalize_name(kind, raw_name)?;

        let entries = self.db.list_references(kind).await?;
        if entries.iter().any(|e| e.name.eq_ignore_ascii_case(&name)) {
            return Err(AppError::Conflict(format!(
                "A {} named '{}' already exists",
                kind.label(),
                name
            )));
        }

        let entry = ReferenceEntry {
            id: ids::new_document_id(&self.rng)?,
            name,
            active: true,
        };
        self.db.insert_reference(kind, &entry).await?;

        tracing::info!(kind = kind.label(), id = entry.id, name = %entry.name, "Created reference entry");
        Ok(entry)
    }

    /// Activate or deactivate an entry. Historical reports are unaffected.
    pub async fn set_active(
        &self,
        kind: ReferenceKind,
        id: u64,
        active: bool,
    ) -> Result<ReferenceEntry> {
        let mut entry = self
            .db
            .get_reference(kind, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No {} with id {}", kind.label(), id)))?;

        if entry.active != active {
            entry.active = active;
            self.db.upsert_reference(kind, &entry).await?;
            tracing::info!(kind = kind.label(), id, active, "Updated reference entry");
        }

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(
            normalize_name(ReferenceKind::Sport, "  Soccer ").unwrap(),
            "Soccer"
        );

        let err = normalize_name(ReferenceKind::HealthcareProvider, "   ").unwrap_err();
        assert_eq!(
            err.client_message(),
            "Healthcare provider name must be 1-100 characters"
        );

        assert!(normalize_name(ReferenceKind::Sport, &"x".repeat(101)).is_err());
    }
}
