// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spreadsheet (CSV) export of reports for staff.

use crate::models::{Category, Report};

const LEADING_COLUMNS: [&str; 10] = [
    "ID",
    "Created At",
    "Semester",
    "Year",
    "Week",
    "First Name",
    "Last Name",
    "Email",
    "Sport",
    "Clinical Site",
];

const TRAILING_COLUMNS: [&str; 3] = [
    "Weekly Total",
    "Interacted With HCPs",
    "Healthcare Provider",
];

/// Header row: identity columns, one column per category, then totals.
pub fn header_row() -> Vec<&'static str> {
    LEADING_COLUMNS
        .into_iter()
        .chain(Category::ALL.iter().map(|c| c.label()))
        .chain(TRAILING_COLUMNS)
        .collect()
}

fn record(report: &Report) -> Vec<String> {
    let mut row = vec![
        report.id.to_string(),
        report.created_at.clone(),
        report.semester.to_string(),
        report.academic_year.to_string(),
        report.week.to_string(),
        report.first_name.clone(),
        report.last_name.clone(),
        report.email.clone(),
        report.sport_name.clone(),
        report.clinical_site.clone().unwrap_or_default(),
    ];
    row.extend(report.counts().iter().map(u32::to_string));
    row.push(report.weekly_total().to_string());
    row.push(if report.interacted_hcps { "Yes" } else { "No" }.to_string());
    row.push(report.healthcare_provider_name.clone().unwrap_or_default());
    row
}

/// Render reports as CSV, in the order given.
pub fn reports_csv(reports: &[Report]) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(header_row())?;
    for report in reports {
        writer.write_record(record(report))?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV flush failed: {}", e.error()))
}
