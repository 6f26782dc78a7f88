// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Dashboard statistics computed over a filtered set of reports.
//!
//! Filters are exact-match and ANDed. A filter that is absent or empty
//! passes every report through for that dimension.

use crate::middleware::auth::AuthUser;
use crate::models::{Category, Report};
use crate::semester::MAX_WEEK;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Equality filters over the report set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsFilter {
    /// Submitter email
    pub email: Option<String>,
    /// Sport name
    pub sport: Option<String>,
    pub clinical_site: Option<String>,
}

impl StatsFilter {
    /// Drop empty values and lowercase the email.
    pub fn normalized(self) -> Self {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        Self {
            email: present(self.email).map(|e| e.trim().to_lowercase()),
            sport: present(self.sport),
            clinical_site: present(self.clinical_site),
        }
    }

    /// Apply the role gate: non-staff callers only ever see their own reports.
    pub fn scoped_for(self, user: &AuthUser) -> Self {
        let mut filter = self.normalized();
        if !user.is_staff {
            filter.email = Some(user.email.clone());
        }
        filter
    }

    pub fn matches(&self, report: &Report) -> bool {
        let email_ok = self.email.as_deref().map_or(true, |e| report.email == e);
        let sport_ok = self.sport.as_deref().map_or(true, |s| report.sport_name == s);
        let site_ok = self
            .clinical_site
            .as_deref()
            .map_or(true, |c| report.clinical_site.as_deref() == Some(c));

        email_ok && sport_ok && site_ok
    }
}

/// Aggregated dashboard statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClinicStats {
    /// Sum of weekly totals across all matching reports
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub grand_total_served: u64,
    /// Mean weekly total per report (0.0 when nothing matches)
    pub average_patients_per_week: f64,

    // ─── Per-Category Totals ─────────────────────────────────────
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_immediate_emergency_care: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_musculoskeletal_exam: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_non_musculoskeletal_exam: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_taping_bracing: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_rehabilitation_reconditioning: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_modalities: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_pharmacology: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_injury_illness_prevention: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_non_sport_patient: u64,

    /// Number of reports where the student interacted with other providers
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub total_interacted_hcps: u64,
}

impl ClinicStats {
    /// Total for a single category.
    pub fn total(&self, category: Category) -> u64 {
        match category {
            Category::ImmediateEmergencyCare => self.total_immediate_emergency_care,
            Category::MusculoskeletalExam => self.total_musculoskeletal_exam,
            Category::NonMusculoskeletalExam => self.total_non_musculoskeletal_exam,
            Category::TapingBracing => self.total_taping_bracing,
            Category::RehabilitationReconditioning => self.total_rehabilitation_reconditioning,
            Category::Modalities => self.total_modalities,
            Category::Pharmacology => self.total_pharmacology,
            Category::InjuryIllnessPrevention => self.total_injury_illness_prevention,
            Category::NonSportPatient => self.total_non_sport_patient,
        }
    }
}

/// Aggregate the reports matching `filter`.
pub fn aggregate<'a, I>(reports: I, filter: &StatsFilter) -> ClinicStats
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut totals = [0u64; 9];
    let mut grand_total = 0u64;
    let mut matched = 0u64;
    let mut interacted = 0u64;

    for report in reports.into_iter().filter(|r| filter.matches(r)) {
        for (total, count) in totals.iter_mut().zip(report.counts()) {
            *total += u64::from(count);
        }
        grand_total += report.weekly_total();
        matched += 1;
        if report.interacted_hcps {
            interacted += 1;
        }
    }

    let average = if matched == 0 {
        0.0
    } else {
        grand_total as f64 / matched as f64
    };

    ClinicStats {
        grand_total_served: grand_total,
        average_patients_per_week: average,
        total_immediate_emergency_care: totals[0],
        total_musculoskeletal_exam: totals[1],
        total_non_musculoskeletal_exam: totals[2],
        total_taping_bracing: totals[3],
        total_rehabilitation_reconditioning: totals[4],
        total_modalities: totals[5],
        total_pharmacology: totals[6],
        total_injury_illness_prevention: totals[7],
        total_non_sport_patient: totals[8],
        total_interacted_hcps: interacted,
    }
}

/// Weekly patient totals for one sport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SportWeekRow {
    pub sport: String,
    /// Patients served in weeks 1..=16 (index 0 is week 1)
    #[cfg_attr(feature = "binding-generation", ts(type = "Array<number>"))]
    pub weeks: Vec<u64>,
}

/// Sport × week heat map of patients served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SportHeatMap {
    /// One row per sport, sorted by name
    pub sports: Vec<SportWeekRow>,
}

/// Build the per-sport heat map over the reports matching `filter`.
pub fn heat_map<'a, I>(reports: I, filter: &StatsFilter) -> SportHeatMap
where
    I: IntoIterator<Item = &'a Report>,
{
    let mut by_sport: BTreeMap<&str, Vec<u64>> = BTreeMap::new();

    for report in reports.into_iter().filter(|r| filter.matches(r)) {
        let weeks = by_sport
            .entry(report.sport_name.as_str())
            .or_insert_with(|| vec![0; MAX_WEEK as usize]);
        let slot = report.week.clamp(1, MAX_WEEK) as usize - 1;
        weeks[slot] += report.weekly_total();
    }

    SportHeatMap {
        sports: by_sport
            .into_iter()
            .map(|(sport, weeks)| SportWeekRow {
                sport: sport.to_string(),
                weeks,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::test_report;

    fn staff() -> AuthUser {
        AuthUser {
            email: "faculty@university.edu".to_string(),
            is_staff: true,
        }
    }

    fn student(email: &str) -> AuthUser {
        AuthUser {
            email: email.to_string(),
            is_staff: false,
        }
    }

    fn sample_reports() -> Vec<Report> {
        vec![
            test_report(1, "alice@university.edu", "Football", [1, 2, 0, 1, 0, 0, 0, 0, 0], true),
            test_report(2, "bob@university.edu", "Soccer", [0, 1, 1, 0, 1, 0, 0, 0, 0], false),
        ]
    }

    #[test]
    fn test_unfiltered_staff_aggregation() {
        let reports = sample_reports();
        let filter = StatsFilter::default().scoped_for(&staff());

        let stats = aggregate(&reports, &filter);

        assert_eq!(stats.grand_total_served, 7);
        assert_eq!(stats.average_patients_per_week, 3.5);
        assert_eq!(stats.total_interacted_hcps, 1);
        assert_eq!(stats.total_immediate_emergency_care, 1);
        assert_eq!(stats.total_musculoskeletal_exam, 3);
        assert_eq!(stats.total_non_musculoskeletal_exam, 1);
        assert_eq!(stats.total_taping_bracing, 1);
        assert_eq!(stats.total_rehabilitation_reconditioning, 1);
        assert_eq!(stats.total(Category::NonSportPatient), 0);
    }

    #[test]
    fn test_empty_match_yields_zeros() {
        let reports = sample_reports();
        let filter = StatsFilter {
            sport: Some("Lacrosse".to_string()),
            ..Default::default()
        };

        let stats = aggregate(&reports, &filter);
        assert_eq!(stats, ClinicStats::default());
        assert_eq!(stats.average_patients_per_week, 0.0);

        let none: Vec<Report> = Vec::new();
        assert_eq!(aggregate(&none, &StatsFilter::default()), ClinicStats::default());
    }

    #[test]
    fn test_student_is_scoped_to_own_email() {
        let reports = sample_reports();
        let requested = StatsFilter {
            email: Some("bob@university.edu".to_string()),
            ..Default::default()
        };

        let filter = requested.scoped_for(&student("alice@university.edu"));
        let stats = aggregate(&reports, &filter);

        assert_eq!(filter.email.as_deref(), Some("alice@university.edu"));
        assert_eq!(stats.grand_total_served, 4);
        assert_eq!(stats.total_interacted_hcps, 1);
    }

    #[test]
    fn test_staff_may_filter_by_email() {
        let reports = sample_reports();
        let filter = StatsFilter {
            email: Some("  BOB@university.edu ".to_string()),
            ..Default::default()
        }
        .scoped_for(&staff());

        let stats = aggregate(&reports, &filter);
        assert_eq!(stats.grand_total_served, 3);
    }

    #[test]
    fn test_empty_filter_values_are_ignored() {
        let reports = sample_reports();
        let filter = StatsFilter {
            email: Some(String::new()),
            sport: Some("".to_string()),
            clinical_site: Some("   ".to_string()),
        }
        .normalized();

        assert_eq!(filter, StatsFilter::default());
        assert_eq!(aggregate(&reports, &filter).grand_total_served, 7);
    }

    #[test]
    fn test_filter_order_does_not_matter() {
        let mut reports = sample_reports();
        reports[0].clinical_site = Some("Coleman Coliseum".to_string());
        reports[1].clinical_site = Some("Coleman Coliseum".to_string());
        reports.push({
            let mut r = test_report(3, "carol@university.edu", "Football", [5; 9], false);
            r.clinical_site = Some("Student Health".to_string());
            r
        });

        let by_sport = StatsFilter {
            sport: Some("Football".to_string()),
            ..Default::default()
        };
        let by_site = StatsFilter {
            clinical_site: Some("Coleman Coliseum".to_string()),
            ..Default::default()
        };

        let sport_then_site: Vec<Report> = reports
            .iter()
            .filter(|r| by_sport.matches(r))
            .filter(|r| by_site.matches(r))
            .cloned()
            .collect();
        let site_then_sport: Vec<Report> = reports
            .iter()
            .filter(|r| by_site.matches(r))
            .filter(|r| by_sport.matches(r))
            .cloned()
            .collect();

        let combined = StatsFilter {
            sport: Some("Football".to_string()),
            clinical_site: Some("Coleman Coliseum".to_string()),
            email: None,
        };

        let expected = aggregate(&reports, &combined);
        assert_eq!(aggregate(&sport_then_site, &StatsFilter::default()), expected);
        assert_eq!(aggregate(&site_then_sport, &StatsFilter::default()), expected);
        assert_eq!(expected.grand_total_served, 4);
    }

    #[test]
    fn test_heat_map_groups_by_sport_and_week() {
        let mut reports = sample_reports();
        let mut later = test_report(3, "alice@university.edu", "Football", [2; 9], false);
        later.week = 3;
        reports.push(later);

        let map = heat_map(&reports, &StatsFilter::default());

        assert_eq!(map.sports.len(), 2);
        assert_eq!(map.sports[0].sport, "Football");
        assert_eq!(map.sports[0].weeks.len(), MAX_WEEK as usize);
        assert_eq!(map.sports[0].weeks[0], 4);
        assert_eq!(map.sports[0].weeks[2], 18);
        assert_eq!(map.sports[1].sport, "Soccer");
        assert_eq!(map.sports[1].weeks[0], 3);
    }
}
