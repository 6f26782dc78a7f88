// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Report submission and dashboard queries.
//!
//! Handles the core workflow:
//! 1. Validate the submitted payload
//! 2. Resolve the active sport and healthcare provider
//! 3. Assign semester and week (serialized per submitter)
//! 4. Store the report in Firestore

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::ids;
use crate::middleware::auth::AuthUser;
use crate::models::stats::{aggregate, heat_map};
use crate::models::{
    Category, CategoryCounts, ClinicStats, ReferenceEntry, ReferenceKind, Report, SportHeatMap,
    StatsFilter,
};
use crate::semester::{self, Term};
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use dashmap::DashMap;
use ring::rand::SystemRandom;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, TryLockError};
use validator::{Validate, ValidationErrors};

pub const PROVIDER_REQUIRED_MESSAGE: &str =
    "Healthcare provider is required when you interacted with other healthcare professionals";

pub const SUBMITTER_MISMATCH_MESSAGE: &str = "Email must match your signed-in account";

/// Per-submitter locks serializing week assignment.
///
/// An entry lives only while some submission holds a [`SubmitterLock`] for it.
#[derive(Clone, Default)]
pub struct SubmissionLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl SubmissionLocks {
    /// A handle on the lock for `email`, created on first use.
    pub fn handle(&self, email: &str) -> SubmitterLock {
        let lock = self
            .locks
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SubmitterLock {
            locks: self.locks.clone(),
            email: email.to_string(),
            lock,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// One submission's claim on a submitter lock.
///
/// Dropping the last handle for an email removes its map entry, including
/// when the request is cancelled mid-submission.
pub struct SubmitterLock {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    email: String,
    lock: Arc<Mutex<()>>,
}

impl SubmitterLock {
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    pub fn try_lock(&self) -> std::result::Result<MutexGuard<'_, ()>, TryLockError> {
        self.lock.try_lock()
    }
}

impl Drop for SubmitterLock {
    fn drop(&mut self) {
        // The map and this handle are the only owners left
        self.locks.remove_if(&self.email, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}

/// A validated submission, ready for reference lookups.
#[derive(Debug, Clone, Validate)]
pub struct NewReport {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub sport_id: u64,
    #[validate(length(max = 100, message = "Clinical site must be at most 100 characters"))]
    pub clinical_site: Option<String>,
    pub counts: CategoryCounts,
    pub interacted_hcps: bool,
    /// Present iff `interacted_hcps`
    pub healthcare_provider_id: Option<u64>,
}

impl NewReport {
    /// Names of the fields a submission must carry.
    pub fn required_fields() -> Vec<&'static str> {
        let mut fields = vec!["first_name", "last_name", "email", "sport"];
        fields.extend(Category::ALL.iter().map(|c| c.field()));
        fields.push("interacted_hcps");
        fields
    }

    /// Parse and validate a raw JSON submission.
    ///
    /// Checks run in order: required fields, the conditional provider,
    /// field types, then field constraints.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        let data = payload.as_object().ok_or_else(|| {
            AppError::BadRequest("Request body must be a JSON object".to_string())
        })?;

        let missing: Vec<&str> = Self::required_fields()
            .into_iter()
            .filter(|f| data.get(*f).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let interacted_hcps = parse_flag(&data["interacted_hcps"]);
        let provider = data.get("healthcare_provider").filter(|v| is_truthy(v));
        if interacted_hcps && provider.is_none() {
            return Err(AppError::Validation(PROVIDER_REQUIRED_MESSAGE.to_string()));
        }

        let mut counts = [0u32; 9];
        for (slot, category) in counts.iter_mut().zip(Category::ALL) {
            *slot = parse_count(data, category.field())?;
        }

        let sport_id = parse_id(&data["sport"])
            .ok_or_else(|| AppError::Validation("Invalid sport selection".to_string()))?;

        let healthcare_provider_id = match provider {
            Some(value) if interacted_hcps => Some(parse_id(value).ok_or_else(|| {
                AppError::Validation("Invalid healthcare provider selection".to_string())
            })?),
            _ => None,
        };

        let new_report = Self {
            first_name: string_field(data, "first_name")?.trim().to_string(),
            last_name: string_field(data, "last_name")?.trim().to_string(),
            email: string_field(data, "email")?.trim().to_lowercase(),
            sport_id,
            clinical_site: optional_string_field(data, "clinical_site")?,
            counts,
            interacted_hcps,
            healthcare_provider_id,
        };

        new_report
            .validate()
            .map_err(|e| AppError::Validation(first_validation_message(&e)))?;

        Ok(new_report)
    }

    /// Students may only file reports under their own email; staff may
    /// file on a student's behalf.
    pub fn check_submitter(&self, user: &AuthUser) -> Result<()> {
        if user.is_staff || self.email.eq_ignore_ascii_case(&user.email) {
            Ok(())
        } else {
            Err(AppError::Validation(SUBMITTER_MISMATCH_MESSAGE.to_string()))
        }
    }
}

/// Interpret a yes/no flag the way the report form sends it (0/1, bool, "yes", ...).
pub fn parse_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f.trunc() != 0.0),
        Value::String(s) => {
            let s = s.trim().to_lowercase();
            match s.parse::<i64>() {
                Ok(i) => i != 0,
                Err(_) => matches!(s.as_str(), "true" | "yes" | "y"),
            }
        }
        _ => false,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Positive integer ID given as a JSON number or numeric string.
fn parse_id(value: &Value) -> Option<u64> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

fn parse_count(data: &Map<String, Value>, field: &str) -> Result<u32> {
    let invalid = || AppError::Validation(format!("{} must be a non-negative integer", field));
    match &data[field] {
        Value::Number(n) => n
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(invalid),
        Value::String(s) => s.trim().parse::<u32>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn string_field<'a>(data: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Validation(format!("{} must be a string", field)))
}

fn optional_string_field(data: &Map<String, Value>, field: &str) -> Result<Option<String>> {
    match data.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(_) => Err(AppError::Validation(format!("{} must be a string", field))),
    }
}

/// Pick a stable, client-facing message out of validator errors.
fn first_validation_message(errors: &ValidationErrors) -> String {
    let mut messages: Vec<(String, String)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let field = field.to_string();
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref())
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("Invalid value for {}", field));
            (field, message)
        })
        .collect();

    // Email problems are the most common; report them first.
    messages.sort_by(|a, b| (a.0 != "email", &a.0).cmp(&(b.0 != "email", &b.0)));
    messages
        .into_iter()
        .next()
        .map(|(_, message)| message)
        .unwrap_or_else(|| "Invalid submission".to_string())
}

/// Report submission and query service.
#[derive(Clone)]
pub struct ReportService {
    db: FirestoreDb,
    locks: SubmissionLocks,
    rng: SystemRandom,
}

impl ReportService {
    pub fn new(db: FirestoreDb) -> Self {
        Self {
            db,
            locks: SubmissionLocks::default(),
            rng: SystemRandom::new(),
        }
    }

    /// Create a report from a validated submission by `user`.
    ///
    /// Nothing is written unless the submitter check and every reference
    /// lookup succeed.
    pub async fn submit(&self, user: &AuthUser, new_report: NewReport) -> Result<Report> {
        new_report.check_submitter(user)?;

        let sport = self
            .db
            .get_active_reference(ReferenceKind::Sport, new_report.sport_id)
            .await?
            .ok_or_else(|| AppError::Validation("Invalid sport selection".to_string()))?;

        let provider = match new_report.healthcare_provider_id {
            Some(id) if new_report.interacted_hcps => Some(
                self.db
                    .get_active_reference(ReferenceKind::HealthcareProvider, id)
                    .await?
                    .ok_or_else(|| {
                        AppError::Validation("Invalid healthcare provider selection".to_string())
                    })?,
            ),
            _ => None,
        };

        let id = ids::new_document_id(&self.rng)?;

        // Count-then-write must not interleave for the same submitter.
        let report = {
            let handle = self.locks.handle(&new_report.email);
            let _guard = handle.lock().await;
            self.assign_and_store(id, new_report, sport, provider).await?
        };


        tracing::info!(
            report_id = report.id,
            email = %report.email,
            submitted_by = %user.email,
            sport = %report.sport_name,
            semester = %report.semester,
            year = report.academic_year,
            week = report.week,
            "Report submitted"
        );

        Ok(report)
    }

    /// Assign semester and week, then write. Callers hold the submitter's lock.
    async fn assign_and_store(
        &self,
        id: u64,
        new_report: NewReport,
        sport: ReferenceEntry,
        provider: Option<ReferenceEntry>,
    ) -> Result<Report> {
        let created_at = Utc::now();
        let term = Term::containing(created_at);
        let existing = self
            .db
            .list_reports_for_term(&new_report.email, term)
            .await?;
        let assignment = semester::assign(created_at, &new_report.email, &existing);

        let mut report = Report {
            id,
            first_name: new_report.first_name,
            last_name: new_report.last_name,
            email: new_report.email,
            sport_id: sport.id,
            sport_name: sport.name,
            clinical_site: new_report.clinical_site,
            immediate_emergency_care: 0,
            musculoskeletal_exam: 0,
            non_musculoskeletal_exam: 0,
            taping_bracing: 0,
            rehabilitation_reconditioning: 0,
            modalities: 0,
            pharmacology: 0,
            injury_illness_prevention: 0,
            non_sport_patient: 0,
            interacted_hcps: provider.is_some(),
            healthcare_provider_id: provider.as_ref().map(|p| p.id),
            healthcare_provider_name: provider.map(|p| p.name),
            semester: assignment.term.semester,
            academic_year: assignment.term.year,
            week: assignment.week,
            created_at: format_utc_rfc3339(created_at),
        };
        report.set_counts(new_report.counts);

        self.db.create_report(&report).await?;
        Ok(report)
    }

    /// Submitters with a submission currently in flight.
    pub fn pending_submitters(&self) -> usize {
        self.locks.len()
    }

    /// Reports matching `filter`, oldest first.
    pub async fn reports(&self, filter: &StatsFilter) -> Result<Vec<Report>> {
        let mut reports = self.db.list_reports(filter).await?;
        reports.retain(|r| filter.matches(r));
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(reports)
    }

    /// Dashboard statistics for the reports matching `filter`.
    pub async fn stats(&self, filter: &StatsFilter) -> Result<ClinicStats> {
        let reports = self.db.list_reports(filter).await?;
        Ok(aggregate(&reports, filter))
    }

    /// Per-sport weekly heat map for the reports matching `filter`.
    pub async fn heat_map(&self, filter: &StatsFilter) -> Result<SportHeatMap> {
        let reports = self.db.list_reports(filter).await?;
        Ok(heat_map(&reports, filter))
    }
}
