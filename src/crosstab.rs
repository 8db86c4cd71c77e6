use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::change::{round2, ChangeRecord};
use crate::cohort::{Bucket, IncomeBand};
use crate::config::Population;
use crate::error::{AnalysisError, Result};
use crate::models::{EducationLevel, Gender, SchoolTier, Student};

/// Student attribute a cohort can be broken down by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Demographic {
    FamilySize,
    HouseholdIncome,
    FreeLunch,
    FatherEducation,
    MotherEducation,
    NumComputers,
    School,
    Gender,
    GradeLevel,
    CovidPositive,
}

impl Demographic {
    pub fn value_of(self, student: &Student) -> i64 {
        match self {
            Demographic::FamilySize => i64::from(student.family_size),
            Demographic::HouseholdIncome => IncomeBand::of(student.household_income).index() as i64,
            Demographic::FreeLunch => i64::from(student.free_lunch),
            Demographic::FatherEducation => i64::from(student.father_education.code()),
            Demographic::MotherEducation => i64::from(student.mother_education.code()),
            Demographic::NumComputers => i64::from(student.num_computers),
            Demographic::School => i64::from(student.school.is_school_b()),
            Demographic::Gender => i64::from(student.gender.is_female()),
            Demographic::GradeLevel => i64::from(student.grade_level),
            Demographic::CovidPositive => i64::from(student.covid_positive),
        }
    }

    pub fn label(self, value: i64) -> String {
        match self {
            Demographic::HouseholdIncome => usize::try_from(value)
                .ok()
                .and_then(IncomeBand::from_index)
                .map(|band| band.label().to_string())
                .unwrap_or_else(|| value.to_string()),
            Demographic::FreeLunch => {
                if value != 0 {
                    "Free or Reduced Lunch: Yes".to_string()
                } else {
                    "Free or Reduced Lunch: No".to_string()
                }
            }
            Demographic::FatherEducation | Demographic::MotherEducation => {
                i32::try_from(value)
                    .ok()
                    .and_then(|code| EducationLevel::from_code(code).ok())
                    .map(|level| level.label().to_string())
                    .unwrap_or_else(|| value.to_string())
            }
            Demographic::School => SchoolTier::from_flag(value != 0).label().to_string(),
            Demographic::Gender => Gender::from_flag(value != 0).label().to_string(),
            Demographic::CovidPositive => {
                if value != 0 {
                    "Has had COVID".to_string()
                } else {
                    "Has never had COVID".to_string()
                }
            }
            Demographic::FamilySize | Demographic::NumComputers | Demographic::GradeLevel => {
                value.to_string()
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Demographic::FamilySize => "family size",
            Demographic::HouseholdIncome => "household income",
            Demographic::FreeLunch => "free or reduced lunch",
            Demographic::FatherEducation => "father's education",
            Demographic::MotherEducation => "mother's education",
            Demographic::NumComputers => "number of computers",
            Demographic::School => "school",
            Demographic::Gender => "gender",
            Demographic::GradeLevel => "grade level",
            Demographic::CovidPositive => "COVID status",
        }
    }
}

impl fmt::Display for Demographic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Demographic {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "family_size" => Ok(Demographic::FamilySize),
            "household_income" | "income" => Ok(Demographic::HouseholdIncome),
            "free_lunch" | "freelunch" => Ok(Demographic::FreeLunch),
            "father_education" | "father_educ" => Ok(Demographic::FatherEducation),
            "mother_education" | "mother_educ" => Ok(Demographic::MotherEducation),
            "num_computers" => Ok(Demographic::NumComputers),
            "school" => Ok(Demographic::School),
            "gender" => Ok(Demographic::Gender),
            "grade_level" | "gradelvl" => Ok(Demographic::GradeLevel),
            "covid_positive" | "covidpos" => Ok(Demographic::CovidPositive),
            _ => Err(AnalysisError::UnknownDemographic(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Cell {
    pub count: usize,
    /// Share of the bucket's population, in `0.0..=1.0`.
    pub proportion: f64,
}

/// `P(demographic = value | bucket)` for every observed bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub demographic: Demographic,
    pub totals: BTreeMap<Bucket, usize>,
    pub cells: BTreeMap<Bucket, BTreeMap<i64, Cell>>,
}

impl CrossTab {
    pub fn population(&self) -> usize {
        self.totals.values().sum()
    }

    pub fn bucket_share(&self, bucket: Bucket, population: Population) -> f64 {
        let count = self.totals.get(&bucket).copied().unwrap_or(0);
        round2(count as f64 / population.size() as f64 * 100.0)
    }
}

pub fn tabulate<I>(pairs: I) -> BTreeMap<Bucket, BTreeMap<i64, Cell>>
where
    I: IntoIterator<Item = (Bucket, i64)>,
{
    let mut counts: BTreeMap<Bucket, BTreeMap<i64, usize>> = BTreeMap::new();
    for (bucket, value) in pairs {
        *counts.entry(bucket).or_default().entry(value).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(bucket, values)| {
            let total: usize = values.values().sum();
            let cells = values
                .into_iter()
                .map(|(value, count)| {
                    let cell = Cell {
                        count,
                        proportion: count as f64 / total as f64,
                    };
                    (value, cell)
                })
                .collect();
            (bucket, cells)
        })
        .collect()
}

pub fn classify_and_tabulate(
    changes: &[ChangeRecord],
    students: &BTreeMap<i32, Student>,
    demographic: Demographic,
) -> Result<CrossTab> {
    let mut pairs = Vec::with_capacity(changes.len());
    let mut totals: BTreeMap<Bucket, usize> = BTreeMap::new();

    for change in changes {
        let student = students
            .get(&change.student_id)
            .ok_or(AnalysisError::OutOfRange {
                field: "student id",
                value: i64::from(change.student_id),
                min: 1,
                max: students.len() as i64,
            })?;
        let bucket = change.bucket();
        *totals.entry(bucket).or_insert(0) += 1;
        pairs.push((bucket, demographic.value_of(student)));
    }

    Ok(CrossTab {
        demographic,
        totals,
        cells: tabulate(pairs),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub value: i64,
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

pub fn distribution(
    students: &[Student],
    demographic: Demographic,
    population: Population,
) -> Vec<Share> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for student in students {
        *counts.entry(demographic.value_of(student)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(value, count)| Share {
            value,
            label: demographic.label(value),
            count,
            percent: round2(count as f64 / population.size() as f64 * 100.0),
        })
        .collect()
}
