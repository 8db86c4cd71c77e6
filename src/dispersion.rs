use std::collections::BTreeMap;

use crate::approx::{sqrt_approx, SqrtOptions};
use crate::epoch::{Epoch, SubjectMeans};
use crate::error::{AnalysisError, Result};
use crate::models::{PerformanceRecord, Subject};

/// Population standard deviation; divides by the records seen in `epoch`.
pub fn compute_dispersion<'a, I>(
    records: I,
    epoch: Epoch,
    means: &SubjectMeans,
    options: SqrtOptions,
) -> Result<BTreeMap<Subject, f64>>
where
    I: IntoIterator<Item = &'a PerformanceRecord>,
{
    let mut squared: BTreeMap<Subject, f64> = means.keys().map(|&s| (s, 0.0)).collect();
    let mut samples = 0usize;

    for record in records {
        if Epoch::of_period(record.time_period)? != epoch {
            continue;
        }
        for (subject, total) in squared.iter_mut() {
            let deviation = subject.score(record) - means[subject];
            *total += deviation * deviation;
        }
        samples += 1;
    }

    if samples == 0 {
        let subject = means
            .keys()
            .next()
            .map(ToString::to_string)
            .unwrap_or_default();
        return Err(AnalysisError::EmptyEpoch {
            epoch: epoch.to_string(),
            subject,
        });
    }

    tracing::debug!(%epoch, samples, "computed squared deviations");

    squared
        .into_iter()
        .map(|(subject, total)| {
            let variance = total / samples as f64;
            Ok((subject, sqrt_approx(variance, options)?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epoch::aggregate;
    use crate::models::fixtures::{record, student_records};

    fn within(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 0.01
    }

    #[test]
    fn constant_scores_have_zero_spread() {
        let records = student_records(1, 50.0, 70.0);
        let means = aggregate(&records)
            .unwrap()
            .means(Epoch::Pre, &Subject::ALL)
            .unwrap();
        let spread =
            compute_dispersion(&records, Epoch::Pre, &means, SqrtOptions::default()).unwrap();
        assert_eq!(spread.len(), 6);
        assert!(spread.values().all(|&sd| sd == 0.0));
    }

    #[test]
    fn matches_population_standard_deviation() {
        // Post scores 60, 70, 80 for one student: variance 200/3.
        let records = vec![
            record(1, 0, 10.0),
            record(1, 1, 10.0),
            record(1, 2, 10.0),
            record(1, 3, 60.0),
            record(1, 4, 70.0),
            record(1, 5, 80.0),
        ];
        let means = aggregate(&records)
            .unwrap()
            .means(Epoch::Post, &[Subject::Reading])
            .unwrap();
        let spread =
            compute_dispersion(&records, Epoch::Post, &means, SqrtOptions::default()).unwrap();
        assert!(within(spread[&Subject::Reading], (200.0f64 / 3.0).sqrt()));
    }

    #[test]
    fn period_three_belongs_to_post() {
        let records = vec![record(1, 3, 40.0), record(1, 4, 60.0)];
        let means: SubjectMeans = [(Subject::Math, 50.0)].into_iter().collect();
        let spread =
            compute_dispersion(&records, Epoch::Post, &means, SqrtOptions::default()).unwrap();
        assert!(within(spread[&Subject::Math], 10.0));
    }

    #[test]
    fn spread_across_students() {
        let records = [
            student_records(1, 40.0, 40.0),
            student_records(2, 60.0, 60.0),
        ]
        .concat();
        let means = aggregate(&records)
            .unwrap()
            .means(Epoch::Pre, &Subject::ALL)
            .unwrap();
        assert_eq!(means[&Subject::Writing], 50.0);
        let spread =
            compute_dispersion(&records, Epoch::Pre, &means, SqrtOptions::default()).unwrap();
        assert!(spread.values().all(|&sd| within(sd, 10.0)));
    }

    #[test]
    fn no_records_in_epoch_is_empty_epoch() {
        let records = vec![record(1, 0, 40.0)];
        let means: SubjectMeans = [(Subject::Math, 40.0)].into_iter().collect();
        assert!(matches!(
            compute_dispersion(&records, Epoch::Post, &means, SqrtOptions::default()),
            Err(AnalysisError::EmptyEpoch { .. })
        ));
    }

    #[test]
    fn invalid_tolerance_propagates() {
        let records = student_records(1, 40.0, 60.0);
        let means: SubjectMeans = [(Subject::Math, 40.0)].into_iter().collect();
        let options = SqrtOptions {
            tolerance: -1.0,
            ..SqrtOptions::default()
        };
        assert!(matches!(
            compute_dispersion(&records, Epoch::Pre, &means, options),
            Err(AnalysisError::InvalidInput(_))
        ));
    }
}
