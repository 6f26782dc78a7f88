// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`); they are skipped otherwise. Every test uses
//! unique emails and reference IDs, so they can share one emulator.

use chrono::Utc;
use clinic_reports::db::FirestoreDb;
use clinic_reports::error::AppError;
use clinic_reports::middleware::AuthUser;
use clinic_reports::models::report::Report;
use clinic_reports::models::{ReferenceEntry, ReferenceKind, StatsFilter};
use clinic_reports::semester::{Semester, Term};
use clinic_reports::services::{NewReport, ReferenceService, ReportService};
use serde_json::json;

mod common;
use common::{test_db, unique_suffix};

fn unique_id() -> u64 {
    unique_suffix().parse::<u128>().unwrap() as u64 % (1 << 53)
}

fn unique_email() -> String {
    format!("student{}@university.edu", unique_suffix())
}

fn student(email: &str) -> AuthUser {
    AuthUser {
        email: email.to_string(),
        is_staff: false,
    }
}

async fn seed_reference(db: &FirestoreDb, kind: ReferenceKind, active: bool) -> ReferenceEntry {
    let entry = ReferenceEntry {
        id: unique_id(),
        name: format!("Entry {}", unique_suffix()),
        active,
    };
    db.upsert_reference(kind, &entry).await.unwrap();
    entry
}

fn submission(email: &str, sport_id: u64, provider_id: Option<u64>) -> NewReport {
    let mut payload = json!({
        "first_name": "Alice",
        "last_name": "Example",
        "email": email,
        "sport": sport_id,
        "clinical_site": "Sports Medicine",
        "immediate_emergency_care": 1,
        "musculoskeletal_exam": 2,
        "non_musculoskeletal_exam": 0,
        "taping_bracing": 1,
        "rehabilitation_reconditioning": 0,
        "modalities": 0,
        "pharmacology": 0,
        "injury_illness_prevention": 0,
        "non_sport_patient": 0,
        "interacted_hcps": provider_id.is_some(),
    });
    if let Some(id) = provider_id {
        payload["healthcare_provider"] = json!(id);
    }
    NewReport::from_payload(&payload).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
// REPORT STORAGE
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_report_round_trip() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;
    let provider = seed_reference(&db, ReferenceKind::HealthcareProvider, true).await;
    let email = unique_email();

    let created = service
        .submit(&student(&email), submission(&email, sport.id, Some(provider.id)))
        .await
        .unwrap();

    let stored: Report = db.get_report(created.id).await.unwrap().unwrap();
    assert_eq!(stored.email, email);
    assert_eq!(stored.sport_name, sport.name);
    assert_eq!(stored.healthcare_provider_name, Some(provider.name));
    assert_eq!(stored.weekly_total(), 4);
    assert_eq!(stored.week, 1);

    let term = Term::containing(Utc::now());
    assert_eq!(stored.semester, term.semester);
    assert_eq!(stored.academic_year, term.year);
}

#[tokio::test]
async fn test_weeks_follow_submission_order() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;
    let email = unique_email();
    let other = unique_email();

    let mut weeks = Vec::new();
    for _ in 0..3 {
        weeks.push(service.submit(&student(&email), submission(&email, sport.id, None)).await.unwrap().week);
    }
    // Another student's submissions don't advance this one's count
    let other_week = service
        .submit(&student(&other), submission(&other, sport.id, None))
        .await
        .unwrap()
        .week;

    assert_eq!(weeks, vec![1, 2, 3]);
    assert_eq!(other_week, 1);

    let term = Term::containing(Utc::now());
    let stored = db.list_reports_for_term(&email, term).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored
        .iter()
        .all(|r| matches!(r.semester, Semester::Spring | Semester::Fall)));
}

#[tokio::test]
async fn test_concurrent_submissions_get_distinct_weeks() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;
    let email = unique_email();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..5 {
        let service = service.clone();
        let user = student(&email);
        let report = submission(&email, sport.id, None);
        tasks.spawn(async move { service.submit(&user, report).await });
    }

    let mut weeks = Vec::new();
    while let Some(result) = tasks.join_next().await {
        weeks.push(result.unwrap().unwrap().week);
    }
    weeks.sort_unstable();

    assert_eq!(weeks, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_inactive_sport_rejected_without_write() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, false).await;
    let email = unique_email();

    let result = service.submit(&student(&email), submission(&email, sport.id, None)).await;
    assert!(matches!(result, Err(AppError::Validation(msg)) if msg == "Invalid sport selection"));

    let filter = StatsFilter {
        email: Some(email),
        ..Default::default()
    };
    assert!(db.list_reports(&filter).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_provider_rejected() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;

    let email = unique_email();
    let result = service
        .submit(&student(&email), submission(&email, sport.id, Some(unique_id())))
        .await;
    assert!(
        matches!(result, Err(AppError::Validation(msg)) if msg == "Invalid healthcare provider selection")
    );
}

#[tokio::test]
async fn test_stats_scoped_to_email() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;
    let provider = seed_reference(&db, ReferenceKind::HealthcareProvider, true).await;
    let email = unique_email();

    service
        .submit(&student(&email), submission(&email, sport.id, Some(provider.id)))
        .await
        .unwrap();
    service
        .submit(&student(&email), submission(&email, sport.id, None))
        .await
        .unwrap();

    let filter = StatsFilter {
        email: Some(email.clone()),
        ..Default::default()
    };
    let stats = service.stats(&filter).await.unwrap();

    assert_eq!(stats.grand_total_served, 8);
    assert_eq!(stats.average_patients_per_week, 4.0);
    assert_eq!(stats.total_interacted_hcps, 1);
    assert_eq!(stats.total_musculoskeletal_exam, 4);

    let heat_map = service.heat_map(&filter).await.unwrap();
    assert_eq!(heat_map.sports.len(), 1);
    assert_eq!(heat_map.sports[0].weeks[0], 4);
    assert_eq!(heat_map.sports[0].weeks[1], 4);
}

// ═══════════════════════════════════════════════════════════════════════════
// REFERENCE DATA
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_reference_admin_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let references = ReferenceService::new(db.clone());
    let name = format!("Lacrosse {}", unique_suffix());

    let created = references
        .create(ReferenceKind::Sport, &name)
        .await
        .unwrap();
    assert!(created.active);

    let duplicate = references
        .create(ReferenceKind::Sport, &name.to_uppercase())
        .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let options = references.options(ReferenceKind::Sport).await.unwrap();
    assert!(options.iter().any(|o| o.id == created.id));

    let updated = references
        .set_active(ReferenceKind::Sport, created.id, false)
        .await
        .unwrap();
    assert!(!updated.active);

    let options = references.options(ReferenceKind::Sport).await.unwrap();
    assert!(options.iter().all(|o| o.id != created.id));

    let missing = references
        .set_active(ReferenceKind::Sport, unique_id(), true)
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_concurrent_reference_creates_both_survive() {
    require_emulator!();

    let db = test_db().await;
    let references = ReferenceService::new(db.clone());
    let first = format!("Rugby {}", unique_suffix());
    let second = format!("Fencing {}", unique_suffix());

    let (a, b) = tokio::join!(
        references.create(ReferenceKind::Sport, &first),
        references.create(ReferenceKind::Sport, &second),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.id, b.id);

    let stored_a = db.get_reference(ReferenceKind::Sport, a.id).await.unwrap().unwrap();
    let stored_b = db.get_reference(ReferenceKind::Sport, b.id).await.unwrap().unwrap();
    assert_eq!(stored_a.name, first);
    assert_eq!(stored_b.name, second);
}

#[tokio::test]
async fn test_reference_insert_never_replaces() {
    require_emulator!();

    let db = test_db().await;
    let existing = seed_reference(&db, ReferenceKind::HealthcareProvider, true).await;
    let clash = ReferenceEntry {
        id: existing.id,
        name: format!("Replacement {}", unique_suffix()),
        active: true,
    };

    let result = db
        .insert_reference(ReferenceKind::HealthcareProvider, &clash)
        .await;
    assert!(matches!(result, Err(AppError::Database(_))));

    let stored = db
        .get_reference(ReferenceKind::HealthcareProvider, existing.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, existing.name);
}

#[tokio::test]
async fn test_submission_lock_released_after_write() {
    require_emulator!();

    let db = test_db().await;
    let service = ReportService::new(db.clone());
    let sport = seed_reference(&db, ReferenceKind::Sport, true).await;
    let email = unique_email();

    service
        .submit(&student(&email), submission(&email, sport.id, None))
        .await
        .unwrap();

    assert_eq!(service.pending_submitters(), 0);
}

#[tokio::test]
async fn test_ping() {
    require_emulator!();

    test_db().await.ping().await.unwrap();
}
