// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Reports (weekly clinic submissions)
//! - Reference entries (sports, healthcare providers)
//! - User activity (request log)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{ReferenceEntry, ReferenceKind, Report, StatsFilter, UserActivity};
use crate::semester::Term;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Round-trip a minimal query to confirm the database is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        let _: Vec<ReferenceEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::SPORTS)
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Report Operations ───────────────────────────────────────

    /// Store a new report.
    pub async fn create_report(&self, report: &Report) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::REPORTS)
            .document_id(report.id.to_string())
            .object(report)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a report by ID.
    pub async fn get_report(&self, report_id: u64) -> Result<Option<Report>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::REPORTS)
            .obj()
            .one(&report_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List reports matching the equality filters (absent filters match all).
    pub async fn list_reports(&self, filter: &StatsFilter) -> Result<Vec<Report>, AppError> {
        let email = filter.email.clone();
        let sport = filter.sport.clone();
        let clinical_site = filter.clinical_site.clone();

        self.get_client()?
            .fluent()
            .select()
            .from(collections::REPORTS)
            .filter(move |q| {
                q.for_all([
                    email.as_deref().and_then(|v| q.field("email").eq(v)),
                    sport.as_deref().and_then(|v| q.field("sport_name").eq(v)),
                    clinical_site
                        .as_deref()
                        .and_then(|v| q.field("clinical_site").eq(v)),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List a submitter's reports for one term.
    pub async fn list_reports_for_term(
        &self,
        email: &str,
        term: Term,
    ) -> Result<Vec<Report>, AppError> {
        let email = email.to_string();
        let semester = term.semester.as_str();
        let year = i64::from(term.year);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::REPORTS)
            .filter(move |q| {
                q.for_all([
                    q.field("email").eq(email.as_str()),
                    q.field("semester").eq(semester),
                    q.field("academic_year").eq(year),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Reference Operations ────────────────────────────────────

    /// Get a reference entry by ID, regardless of its active flag.
    pub async fn get_reference(
        &self,
        kind: ReferenceKind,
        id: u64,
    ) -> Result<Option<ReferenceEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(kind.collection())
            .obj()
            .one(&id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a reference entry by ID only if it is active.
    pub async fn get_active_reference(
        &self,
        kind: ReferenceKind,
        id: u64,
    ) -> Result<Option<ReferenceEntry>, AppError> {
        Ok(self.get_reference(kind, id).await?.filter(|e| e.active))
    }

    /// List every entry of a kind.
    pub async fn list_references(
        &self,
        kind: ReferenceKind,
    ) -> Result<Vec<ReferenceEntry>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(kind.collection())
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a reference entry.
    pub async fn upsert_reference(
        &self,
        kind: ReferenceKind,
        entry: &ReferenceEntry,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(kind.collection())
            .document_id(entry.id.to_string())
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Store a new reference entry; fails if the ID is already taken.
    pub async fn insert_reference(
        &self,
        kind: ReferenceKind,
        entry: &ReferenceEntry,
    ) -> Result<(), AppError> {
        let _: ReferenceEntry = self
            .get_client()?
            .fluent()
            .insert()
            .into(kind.collection())
            .document_id(entry.id.to_string())
            .object(entry)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── User Activity ───────────────────────────────────────────

    /// Store one user activity record under the given document ID.
    pub async fn record_activity(
        &self,
        document_id: &str,
        activity: &UserActivity,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USER_ACTIVITY)
            .document_id(document_id)
            .object(activity)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
