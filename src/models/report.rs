// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Weekly clinic report model for storage and API.

use crate::semester::Semester;
use crate::time_utils::parse_utc_rfc3339;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Patient-interaction categories counted on every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    ImmediateEmergencyCare,
    MusculoskeletalExam,
    NonMusculoskeletalExam,
    TapingBracing,
    RehabilitationReconditioning,
    Modalities,
    Pharmacology,
    InjuryIllnessPrevention,
    NonSportPatient,
}

impl Category {
    /// All categories in storage/response order.
    pub const ALL: [Category; 9] = [
        Category::ImmediateEmergencyCare,
        Category::MusculoskeletalExam,
        Category::NonMusculoskeletalExam,
        Category::TapingBracing,
        Category::RehabilitationReconditioning,
        Category::Modalities,
        Category::Pharmacology,
        Category::InjuryIllnessPrevention,
        Category::NonSportPatient,
    ];

    /// Field name used in payloads and storage.
    pub fn field(self) -> &'static str {
        match self {
            Category::ImmediateEmergencyCare => "immediate_emergency_care",
            Category::MusculoskeletalExam => "musculoskeletal_exam",
            Category::NonMusculoskeletalExam => "non_musculoskeletal_exam",
            Category::TapingBracing => "taping_bracing",
            Category::RehabilitationReconditioning => "rehabilitation_reconditioning",
            Category::Modalities => "modalities",
            Category::Pharmacology => "pharmacology",
            Category::InjuryIllnessPrevention => "injury_illness_prevention",
            Category::NonSportPatient => "non_sport_patient",
        }
    }

    /// Human-readable label (spreadsheet headers).
    pub fn label(self) -> &'static str {
        match self {
            Category::ImmediateEmergencyCare => "Immediate/Emergency Care",
            Category::MusculoskeletalExam => "Musculoskeletal Exam",
            Category::NonMusculoskeletalExam => "Non-Musculoskeletal Exam",
            Category::TapingBracing => "Taping/Bracing",
            Category::RehabilitationReconditioning => "Rehabilitation/Reconditioning",
            Category::Modalities => "Modalities",
            Category::Pharmacology => "Pharmacology",
            Category::InjuryIllnessPrevention => "Injury/Illness Prevention",
            Category::NonSportPatient => "Non-Sport Patient",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Per-category encounter counts, indexed by [`Category`].
pub type CategoryCounts = [u32; 9];

/// Stored report record in Firestore.
///
/// Counters default to zero when absent from a stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report ID (also used as document ID)
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    /// Submitter email (lowercased)
    pub email: String,
    pub sport_id: u64,
    /// Sport name at submission time
    pub sport_name: String,
    #[serde(default)]
    pub clinical_site: Option<String>,

    // ─── Patient Categories ──────────────────────────────────────
    #[serde(default)]
    pub immediate_emergency_care: u32,
    #[serde(default)]
    pub musculoskeletal_exam: u32,
    #[serde(default)]
    pub non_musculoskeletal_exam: u32,
    #[serde(default)]
    pub taping_bracing: u32,
    #[serde(default)]
    pub rehabilitation_reconditioning: u32,
    #[serde(default)]
    pub modalities: u32,
    #[serde(default)]
    pub pharmacology: u32,
    #[serde(default)]
    pub injury_illness_prevention: u32,
    #[serde(default)]
    pub non_sport_patient: u32,

    /// Did the student interact with other healthcare providers this week?
    #[serde(default)]
    pub interacted_hcps: bool,
    #[serde(default)]
    pub healthcare_provider_id: Option<u64>,
    #[serde(default)]
    pub healthcare_provider_name: Option<String>,

    // ─── Derived At Creation ─────────────────────────────────────
    pub semester: Semester,
    pub academic_year: i32,
    pub week: u32,
    /// Creation time (RFC3339, microseconds, `Z`)
    pub created_at: String,
}

impl Report {
    /// Counter for a single category.
    pub fn count(&self, category: Category) -> u32 {
        match category {
            Category::ImmediateEmergencyCare => self.immediate_emergency_care,
            Category::MusculoskeletalExam => self.musculoskeletal_exam,
            Category::NonMusculoskeletalExam => self.non_musculoskeletal_exam,
            Category::TapingBracing => self.taping_bracing,
            Category::RehabilitationReconditioning => self.rehabilitation_reconditioning,
            Category::Modalities => self.modalities,
            Category::Pharmacology => self.pharmacology,
            Category::InjuryIllnessPrevention => self.injury_illness_prevention,
            Category::NonSportPatient => self.non_sport_patient,
        }
    }

    /// All nine counters in [`Category::ALL`] order.
    pub fn counts(&self) -> CategoryCounts {
        let mut counts = [0; 9];
        for category in Category::ALL {
            counts[category.index()] = self.count(category);
        }
        counts
    }

    /// Overwrite all nine counters.
    pub fn set_counts(&mut self, counts: CategoryCounts) {
        self.immediate_emergency_care = counts[0];
        self.musculoskeletal_exam = counts[1];
        self.non_musculoskeletal_exam = counts[2];
        self.taping_bracing = counts[3];
        self.rehabilitation_reconditioning = counts[4];
        self.modalities = counts[5];
        self.pharmacology = counts[6];
        self.injury_illness_prevention = counts[7];
        self.non_sport_patient = counts[8];
    }

    /// Patients served on this report across all categories.
    pub fn weekly_total(&self) -> u64 {
        self.counts().iter().map(|&c| u64::from(c)).sum()
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_utc_rfc3339(&self.created_at)
    }
}

#[cfg(test)]
pub(crate) fn test_report(
    id: u64,
    email: &str,
    sport: &str,
    counts: CategoryCounts,
    interacted_hcps: bool,
) -> Report {
    let mut report = Report {
        id,
        first_name: "Test".to_string(),
        last_name: format!("Student {}", id),
        email: email.to_string(),
        sport_id: 1,
        sport_name: sport.to_string(),
        clinical_site: None,
        immediate_emergency_care: 0,
        musculoskeletal_exam: 0,
        non_musculoskeletal_exam: 0,
        taping_bracing: 0,
        rehabilitation_reconditioning: 0,
        modalities: 0,
        pharmacology: 0,
        injury_illness_prevention: 0,
        non_sport_patient: 0,
        interacted_hcps,
        healthcare_provider_id: interacted_hcps.then_some(1),
        healthcare_provider_name: interacted_hcps.then(|| "Physician".to_string()),
        semester: Semester::Spring,
        academic_year: 2026,
        week: 1,
        created_at: "2026-02-01T10:00:00.000000Z".to_string(),
    };
    report.set_counts(counts);
    report
}
