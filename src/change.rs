use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::cohort::{classify, Bucket};
use crate::epoch::{aggregate, aggregate_by_student, Epoch, EpochAccumulator};
use crate::error::{AnalysisError, Result};
use crate::models::{PerformanceRecord, Subject};

/// Direction of a percent change. Positive changes are declines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "direction", content = "percent", rename_all = "snake_case")]
pub enum ChangeLabel {
    Increase,
    Decrease(f64),
}

impl ChangeLabel {
    pub fn for_change(percent_change: f64) -> Self {
        if percent_change <= 0.0 {
            ChangeLabel::Increase
        } else {
            ChangeLabel::Decrease(percent_change.abs())
        }
    }
}

impl fmt::Display for ChangeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeLabel::Increase => f.write_str("increase"),
            ChangeLabel::Decrease(percent) => write!(f, "decrease by {percent}%"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectChange {
    pub pre_mean: f64,
    pub post_mean: f64,
    pub percent_change: f64,
    pub label: ChangeLabel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRecord {
    pub student_id: i32,
    pub subject: Subject,
    pub percent_change: f64,
    pub label: ChangeLabel,
}

impl ChangeRecord {
    pub fn bucket(&self) -> Bucket {
        classify(self.percent_change)
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `((pre - post) / pre) * 100`, rounded to two places.
pub fn percent_change(pre_mean: f64, post_mean: f64) -> Result<f64> {
    if pre_mean == 0.0 {
        return Err(AnalysisError::DivisionByZero);
    }
    Ok(round2((pre_mean - post_mean) / pre_mean * 100.0))
}

fn subject_change(accumulator: &EpochAccumulator, subject: Subject) -> Result<SubjectChange> {
    let pre_mean = accumulator.mean(Epoch::Pre, subject)?;
    let post_mean = accumulator.mean(Epoch::Post, subject)?;
    let percent_change = percent_change(pre_mean, post_mean)?;
    Ok(SubjectChange {
        pre_mean,
        post_mean,
        percent_change,
        label: ChangeLabel::for_change(percent_change),
    })
}

pub fn changes_from(
    accumulator: &EpochAccumulator,
    subjects: &[Subject],
) -> Result<BTreeMap<Subject, SubjectChange>> {
    subjects
        .iter()
        .map(|&subject| Ok((subject, subject_change(accumulator, subject)?)))
        .collect()
}

/// Pre/post means and percent change for each requested subject.
pub fn compute_epoch_change<'a, I>(
    records: I,
    subjects: &[Subject],
) -> Result<BTreeMap<Subject, SubjectChange>>
where
    I: IntoIterator<Item = &'a PerformanceRecord>,
{
    changes_from(&aggregate(records)?, subjects)
}

pub fn student_changes<'a, I>(records: I, subject: Subject) -> Result<Vec<ChangeRecord>>
where
    I: IntoIterator<Item = &'a PerformanceRecord>,
{
    let by_student = aggregate_by_student(records)?;
    let mut changes = Vec::with_capacity(by_student.len());

    for (student_id, accumulator) in by_student {
        let change = subject_change(&accumulator, subject)?;
        changes.push(ChangeRecord {
            student_id,
            subject,
            percent_change: change.percent_change,
            label: change.label,
        });
    }

    tracing::debug!(%subject, students = changes.len(), "computed per-student changes");
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{record, student_records};

    #[test]
    fn decline_is_positive() {
        assert_eq!(percent_change(100.0, 80.0), Ok(20.0));
    }

    #[test]
    fn improvement_is_negative() {
        assert_eq!(percent_change(80.0, 100.0), Ok(-25.0));
    }

    #[test]
    fn zero_baseline_is_division_by_zero() {
        assert_eq!(percent_change(0.0, 42.0), Err(AnalysisError::DivisionByZero));
    }

    #[test]
    fn result_is_rounded_to_two_places() {
        assert_eq!(percent_change(3.0, 2.0), Ok(33.33));
        assert_eq!(percent_change(3.0, 4.0), Ok(-33.33));
    }

    #[test]
    fn labels_follow_sign_convention() {
        assert_eq!(ChangeLabel::for_change(-25.0), ChangeLabel::Increase);
        assert_eq!(ChangeLabel::for_change(0.0), ChangeLabel::Increase);
        assert_eq!(ChangeLabel::for_change(12.5), ChangeLabel::Decrease(12.5));
        assert_eq!(ChangeLabel::Increase.to_string(), "increase");
        assert_eq!(ChangeLabel::Decrease(12.5).to_string(), "decrease by 12.5%");
    }

    #[test]
    fn single_student_improvement_lands_in_increased_bucket() {
        let records = student_records(1, 50.0, 70.0);
        let changes = compute_epoch_change(&records, &[Subject::Reading]).unwrap();
        let reading = &changes[&Subject::Reading];
        assert_eq!(reading.pre_mean, 50.0);
        assert_eq!(reading.post_mean, 70.0);
        assert_eq!(reading.percent_change, -40.0);
        assert_eq!(reading.label, ChangeLabel::Increase);
        assert_eq!(classify(reading.percent_change), Bucket::Increased);
    }

    #[test]
    fn unchanged_scores_give_zero_change_everywhere() {
        let records = [
            student_records(1, 64.0, 64.0),
            student_records(2, 88.0, 88.0),
        ]
        .concat();
        let changes = compute_epoch_change(&records, &Subject::ALL).unwrap();
        assert_eq!(changes.len(), 6);
        for change in changes.values() {
            assert_eq!(change.percent_change, 0.0);
            assert_eq!(classify(change.percent_change), Bucket::Increased);
        }
    }

    #[test]
    fn only_requested_subjects_are_reported() {
        let records = student_records(1, 50.0, 40.0);
        let changes = compute_epoch_change(&records, &[Subject::Math, Subject::WritingSl]).unwrap();
        assert_eq!(
            changes.keys().copied().collect::<Vec<_>>(),
            vec![Subject::Math, Subject::WritingSl]
        );
        assert_eq!(changes[&Subject::Math].label, ChangeLabel::Decrease(20.0));
    }

    #[test]
    fn missing_post_epoch_is_empty_epoch() {
        let records = vec![record(1, 0, 50.0), record(1, 1, 50.0), record(1, 2, 50.0)];
        assert!(matches!(
            compute_epoch_change(&records, &[Subject::Reading]),
            Err(AnalysisError::EmptyEpoch { .. })
        ));
    }

    #[test]
    fn per_student_changes_are_ordered_by_student() {
        let records = [
            student_records(2, 100.0, 80.0),
            student_records(1, 50.0, 70.0),
        ]
        .concat();
        let changes = student_changes(&records, Subject::Math).unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].student_id, 1);
        assert_eq!(changes[0].percent_change, -40.0);
        assert_eq!(changes[0].bucket(), Bucket::Increased);
        assert_eq!(changes[1].student_id, 2);
        assert_eq!(changes[1].percent_change, 20.0);
        assert_eq!(changes[1].bucket(), Bucket::Decreased10To19);
    }

    #[test]
    fn zero_baseline_student_fails_the_whole_pass() {
        let records = [
            student_records(1, 50.0, 70.0),
            student_records(2, 0.0, 70.0),
        ]
        .concat();
        assert_eq!(
            student_changes(&records, Subject::Reading),
            Err(AnalysisError::DivisionByZero)
        );
    }
}
