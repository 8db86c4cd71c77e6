use std::collections::BTreeMap;

use serde::Serialize;

use crate::approx::SqrtOptions;
use crate::change::{changes_from, student_changes, SubjectChange};
use crate::config::Population;
use crate::crosstab::{classify_and_tabulate, CrossTab, Demographic};
use crate::dispersion::compute_dispersion;
use crate::epoch::{aggregate, Epoch};
use crate::error::Result;
use crate::models::{PerformanceRecord, Student, Subject};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectSummary {
    #[serde(flatten)]
    pub change: SubjectChange,
    pub pre_std_dev: f64,
    pub post_std_dev: f64,
}

/// Whole-cohort change and spread for every subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallAnalysis {
    pub records: usize,
    pub subjects: BTreeMap<Subject, SubjectSummary>,
}

pub fn analyze_overall(
    records: &[PerformanceRecord],
    population: Population,
    options: SqrtOptions,
) -> Result<OverallAnalysis> {
    let accumulator = aggregate(records)?;
    let changes = changes_from(&accumulator, &Subject::ALL)?;

    let expected = population.size() as usize * 3;
    for epoch in [Epoch::Pre, Epoch::Post] {
        let seen = accumulator.count(epoch);
        if seen != expected {
            tracing::warn!(%epoch, seen, expected, "epoch record count differs from population");
        }
    }

    let pre_means = accumulator.means(Epoch::Pre, &Subject::ALL)?;
    let post_means = accumulator.means(Epoch::Post, &Subject::ALL)?;
    let mut pre_std = compute_dispersion(records, Epoch::Pre, &pre_means, options)?;
    let mut post_std = compute_dispersion(records, Epoch::Post, &post_means, options)?;

    let subjects = changes
        .into_iter()
        .map(|(subject, change)| {
            let summary = SubjectSummary {
                change,
                pre_std_dev: pre_std.remove(&subject).unwrap_or_default(),
                post_std_dev: post_std.remove(&subject).unwrap_or_default(),
            };
            (subject, summary)
        })
        .collect();

    Ok(OverallAnalysis {
        records: records.len(),
        subjects,
    })
}

/// Per-student change in `subject` cross-tabulated against `demographic`.
pub fn analyze_breakdown(
    records: &[PerformanceRecord],
    students: &[Student],
    subject: Subject,
    demographic: Demographic,
) -> Result<CrossTab> {
    let changes = student_changes(records, subject)?;
    let roster: BTreeMap<i32, Student> = students.iter().map(|s| (s.id, s.clone())).collect();
    classify_and_tabulate(&changes, &roster, demographic)
}
