use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnalysisError;

/// Number of time periods recorded per student (0..=5).
pub const PERIODS_PER_STUDENT: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchoolTier {
    /// School A
    Wealthy,
    /// School B
    Poor,
}

impl SchoolTier {
    pub fn from_flag(is_school_b: bool) -> Self {
        if is_school_b {
            SchoolTier::Poor
        } else {
            SchoolTier::Wealthy
        }
    }

    pub fn is_school_b(self) -> bool {
        matches!(self, SchoolTier::Poor)
    }

    pub fn label(self) -> &'static str {
        match self {
            SchoolTier::Wealthy => "School: A (Wealthy)",
            SchoolTier::Poor => "School: B (Poor)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn from_flag(is_female: bool) -> Self {
        if is_female {
            Gender::Female
        } else {
            Gender::Male
        }
    }

    pub fn is_female(self) -> bool {
        matches!(self, Gender::Female)
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Gender: Male",
            Gender::Female => "Gender: Female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EducationLevel {
    NoDiploma,
    HighSchool,
    Bachelors,
    Masters,
    Doctorate,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 5] = [
        EducationLevel::NoDiploma,
        EducationLevel::HighSchool,
        EducationLevel::Bachelors,
        EducationLevel::Masters,
        EducationLevel::Doctorate,
    ];

    pub fn from_code(code: i32) -> Result<Self, AnalysisError> {
        usize::try_from(code)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(AnalysisError::OutOfRange {
                field: "education level",
                value: i64::from(code),
                min: 0,
                max: 4,
            })
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn label(self) -> &'static str {
        match self {
            EducationLevel::NoDiploma => "No HS Diploma",
            EducationLevel::HighSchool => "HS Diploma",
            EducationLevel::Bachelors => "BS",
            EducationLevel::Masters => "MS",
            EducationLevel::Doctorate => "PhD",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i32,
    pub school: SchoolTier,
    pub gender: Gender,
    pub grade_level: i32,
    pub household_income: i64,
    pub free_lunch: bool,
    pub num_computers: i32,
    pub family_size: i32,
    pub father_education: EducationLevel,
    pub mother_education: EducationLevel,
    pub covid_positive: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: Uuid,
    pub student_id: i32,
    pub time_period: i32,
    pub reading: f64,
    pub writing: f64,
    pub math: f64,
    pub reading_sl: f64,
    pub writing_sl: f64,
    pub math_sl: f64,
}

/// One of the six measured academic dimensions. The `_sl` variants are the
/// state-level counterparts of the local scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Reading,
    Writing,
    Math,
    ReadingSl,
    WritingSl,
    MathSl,
}

impl Subject {
    pub const ALL: [Subject; 6] = [
        Subject::Reading,
        Subject::Writing,
        Subject::Math,
        Subject::ReadingSl,
        Subject::WritingSl,
        Subject::MathSl,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn score(self, record: &PerformanceRecord) -> f64 {
        match self {
            Subject::Reading => record.reading,
            Subject::Writing => record.writing,
            Subject::Math => record.math,
            Subject::ReadingSl => record.reading_sl,
            Subject::WritingSl => record.writing_sl,
            Subject::MathSl => record.math_sl,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Subject::Reading => "Reading",
            Subject::Writing => "Writing",
            Subject::Math => "Math",
            Subject::ReadingSl => "ReadingSL",
            Subject::WritingSl => "WritingSL",
            Subject::MathSl => "MathSL",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subject {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "reading" => Ok(Subject::Reading),
            "writing" => Ok(Subject::Writing),
            "math" => Ok(Subject::Math),
            "readingsl" => Ok(Subject::ReadingSl),
            "writingsl" => Ok(Subject::WritingSl),
            "mathsl" => Ok(Subject::MathSl),
            _ => Err(AnalysisError::UnknownSubject(s.to_string())),
        }
    }
}
