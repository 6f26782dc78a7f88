// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Academic semester and week assignment.
//!
//! Every report is bucketed into a term (Spring or Fall of a calendar year)
//! and numbered within that term per submitter:
//! - Spring runs from Jan 1 through May 31.
//! - Fall runs from Jun 1 through Dec 31.
//!
//! The week number is the count of the submitter's earlier reports in the
//! same term plus one, saturating at [`MAX_WEEK`].

use crate::models::Report;
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Highest week number a report can carry. Later submissions collapse onto it.
pub const MAX_WEEK: u32 = 16;

/// First month (1-based) of the Fall semester.
pub const FALL_START_MONTH: u32 = 6;

/// Academic semester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Semester {
    Spring,
    Fall,
}

impl Semester {
    /// Semester a calendar month (1-12) belongs to.
    pub fn for_month(month: u32) -> Self {
        if month < FALL_START_MONTH {
            Semester::Spring
        } else {
            Semester::Fall
        }
    }

    fn start_month(self) -> u32 {
        match self {
            Semester::Spring => 1,
            Semester::Fall => FALL_START_MONTH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Semester::Spring => "Spring",
            Semester::Fall => "Fall",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A semester of a specific year, e.g. Fall 2026.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Term {
    pub semester: Semester,
    pub year: i32,
}

impl Term {
    /// The term containing the given instant.
    pub fn containing(ts: DateTime<Utc>) -> Self {
        Self {
            semester: Semester::for_month(ts.month()),
            year: ts.year(),
        }
    }

    /// First instant of the term (inclusive).
    pub fn start(&self) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(self.year, self.semester.start_month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// First instant after the term (exclusive).
    pub fn end(&self) -> DateTime<Utc> {
        let next = match self.semester {
            Semester::Spring => Utc.with_ymd_and_hms(self.year, FALL_START_MONTH, 1, 0, 0, 0),
            Semester::Fall => Utc.with_ymd_and_hms(self.year + 1, 1, 1, 0, 0, 0),
        };
        next.single().unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start() && ts < self.end()
    }

    /// Count reports by `email` inside this term created strictly before `before`.
    ///
    /// Reports with unparseable timestamps are ignored.
    pub fn count_prior<'a, I>(&self, reports: I, email: &str, before: DateTime<Utc>) -> usize
    where
        I: IntoIterator<Item = &'a Report>,
    {
        reports
            .into_iter()
            .filter(|r| r.email == email)
            .filter_map(|r| r.created_at_utc())
            .filter(|ts| self.contains(*ts) && *ts < before)
            .count()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.semester, self.year)
    }
}

/// Week number for a report preceded by `prior` reports in the same term.
pub fn week_from_prior_count(prior: usize) -> u32 {
    let week = prior.saturating_add(1).min(MAX_WEEK as usize);
    week as u32
}

/// Result of assigning a report to a term and week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub term: Term,
    pub week: u32,
}

/// Assign a semester and week to a report created at `created_at` by `email`,
/// given the reports already stored for that submitter.
pub fn assign<'a, I>(created_at: DateTime<Utc>, email: &str, existing: I) -> Assignment
where
    I: IntoIterator<Item = &'a Report>,
{
    let term = Term::containing(created_at);
    let prior = term.count_prior(existing, email, created_at);
    Assignment {
        term,
        week: week_from_prior_count(prior),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::report::test_report;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_semester_boundaries() {
        assert_eq!(Term::containing(at("2026-01-01T00:00:00Z")).semester, Semester::Spring);
        assert_eq!(Term::containing(at("2026-05-31T23:59:59Z")).semester, Semester::Spring);
        assert_eq!(Term::containing(at("2026-06-01T00:00:00Z")).semester, Semester::Fall);
        assert_eq!(Term::containing(at("2026-12-31T23:59:59Z")).semester, Semester::Fall);
    }

    #[test]
    fn test_term_window_contains_its_own_instants() {
        for ts in ["2026-03-10T12:00:00Z", "2026-07-04T08:00:00Z", "2026-12-31T23:59:59Z"] {
            let ts = at(ts);
            assert!(Term::containing(ts).contains(ts));
        }

        let fall = Term {
            semester: Semester::Fall,
            year: 2026,
        };
        assert_eq!(fall.start(), at("2026-06-01T00:00:00Z"));
        assert_eq!(fall.end(), at("2027-01-01T00:00:00Z"));
        assert!(!fall.contains(at("2027-01-01T00:00:00Z")));
    }

    #[test]
    fn test_week_saturates_at_sixteen() {
        assert_eq!(week_from_prior_count(0), 1);
        assert_eq!(week_from_prior_count(15), 16);
        assert_eq!(week_from_prior_count(16), 16);
        assert_eq!(week_from_prior_count(usize::MAX), 16);
    }

    #[test]
    fn test_nth_submission_gets_week_n() {
        let email = "student@university.edu";
        let mut stored: Vec<Report> = Vec::new();

        for n in 1..=20u32 {
            let created_at = at(&format!("2026-02-01T10:{:02}:00Z", n));
            let assignment = assign(created_at, email, &stored);
            assert_eq!(assignment.term.semester, Semester::Spring);
            assert_eq!(assignment.week, n.min(MAX_WEEK));

            let mut report = test_report(u64::from(n), email, "Football", [1; 9], false);
            report.created_at = crate::time_utils::format_utc_rfc3339(created_at);
            stored.push(report);
        }
    }

    #[test]
    fn test_prior_count_ignores_other_terms_and_submitters() {
        let email = "student@university.edu";
        let mut last_fall = test_report(1, email, "Soccer", [0; 9], false);
        last_fall.created_at = "2025-11-01T10:00:00.000000Z".to_string();
        let mut other = test_report(2, "other@university.edu", "Soccer", [0; 9], false);
        other.created_at = "2026-02-01T10:00:00.000000Z".to_string();
        let mut earlier = test_report(3, email, "Soccer", [0; 9], false);
        earlier.created_at = "2026-01-15T10:00:00.000000Z".to_string();
        let mut later = test_report(4, email, "Soccer", [0; 9], false);
        later.created_at = "2026-03-01T10:00:00.000000Z".to_string();

        let stored = vec![last_fall, other, earlier, later];
        let assignment = assign(at("2026-02-01T10:00:00Z"), email, &stored);

        assert_eq!(assignment.week, 2);
        assert_eq!(
            assignment.term,
            Term {
                semester: Semester::Spring,
                year: 2026
            }
        );
    }

    #[test]
    fn test_assignment_is_idempotent() {
        let email = "student@university.edu";
        let mut first = test_report(1, email, "Soccer", [0; 9], false);
        first.created_at = "2026-09-01T10:00:00.000000Z".to_string();
        let stored = vec![first];

        let ts = at("2026-09-08T10:00:00Z");
        assert_eq!(assign(ts, email, &stored), assign(ts, email, &stored));
    }
}
