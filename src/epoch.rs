use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::{AnalysisError, Result};
use crate::models::{PerformanceRecord, Subject, PERIODS_PER_STUDENT};

pub const PERIODS_PER_EPOCH: i32 = 3;

pub type SubjectMeans = BTreeMap<Subject, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Epoch {
    Pre,
    Post,
}

impl Epoch {
    pub fn of_period(time_period: i32) -> Result<Self> {
        if !(0..PERIODS_PER_STUDENT).contains(&time_period) {
            return Err(AnalysisError::OutOfRange {
                field: "time period",
                value: i64::from(time_period),
                min: 0,
                max: i64::from(PERIODS_PER_STUDENT - 1),
            });
        }
        if time_period < PERIODS_PER_EPOCH {
            Ok(Epoch::Pre)
        } else {
            Ok(Epoch::Post)
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Epoch::Pre => f.write_str("pre"),
            Epoch::Post => f.write_str("post"),
        }
    }
}

/// Per-subject sums and record counts for both epochs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EpochAccumulator {
    sums: [[f64; 6]; 2],
    counts: [usize; 2],
}

impl EpochAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: &PerformanceRecord) -> Result<Epoch> {
        let epoch = Epoch::of_period(record.time_period)?;
        let sums = &mut self.sums[epoch.index()];
        for subject in Subject::ALL {
            sums[subject.index()] += subject.score(record);
        }
        self.counts[epoch.index()] += 1;
        Ok(epoch)
    }

    pub fn sum(&self, epoch: Epoch, subject: Subject) -> f64 {
        self.sums[epoch.index()][subject.index()]
    }

    pub fn count(&self, epoch: Epoch) -> usize {
        self.counts[epoch.index()]
    }

    pub fn mean(&self, epoch: Epoch, subject: Subject) -> Result<f64> {
        let count = self.count(epoch);
        if count == 0 {
            return Err(AnalysisError::EmptyEpoch {
                epoch: epoch.to_string(),
                subject: subject.to_string(),
            });
        }
        Ok(self.sum(epoch, subject) / count as f64)
    }

    pub fn means(&self, epoch: Epoch, subjects: &[Subject]) -> Result<SubjectMeans> {
        subjects
            .iter()
            .map(|&subject| Ok((subject, self.mean(epoch, subject)?)))
            .collect()
    }
}

pub fn aggregate<'a, I>(records: I) -> Result<EpochAccumulator>
where
    I: IntoIterator<Item = &'a PerformanceRecord>,
{
    let mut accumulator = EpochAccumulator::new();
    for record in records {
        accumulator.add(record)?;
    }
    tracing::debug!(
        pre = accumulator.count(Epoch::Pre),
        post = accumulator.count(Epoch::Post),
        "aggregated performance records"
    );
    Ok(accumulator)
}

pub fn aggregate_by_student<'a, I>(records: I) -> Result<BTreeMap<i32, EpochAccumulator>>
where
    I: IntoIterator<Item = &'a PerformanceRecord>,
{
    let mut by_student: BTreeMap<i32, EpochAccumulator> = BTreeMap::new();
    for record in records {
        by_student.entry(record.student_id).or_default().add(record)?;
    }
    Ok(by_student)
}
