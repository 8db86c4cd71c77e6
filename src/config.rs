use clap::Args;

use crate::approx::SqrtOptions;
use crate::error::{AnalysisError, Result};

/// Tunables shared by every analysis command.
#[derive(Debug, Clone, Args)]
pub struct AnalysisConfig {
    /// Starting guess for the square-root approximation
    #[arg(long, env = "COHORT_SHIFT_SQRT_GUESS", default_value_t = 1.0, global = true)]
    pub sqrt_guess: f64,

    /// Stop iterating once |guess^2 - n| drops below this value
    #[arg(long, env = "COHORT_SHIFT_SQRT_TOLERANCE", default_value_t = 0.001, global = true)]
    pub sqrt_tolerance: f64,

    /// Give up on the square-root approximation after this many steps
    #[arg(long, env = "COHORT_SHIFT_MAX_ITERATIONS", default_value_t = 100, global = true)]
    pub max_iterations: u32,

    /// Population size; defaults to the number of stored students
    #[arg(long, env = "COHORT_SHIFT_POPULATION", global = true)]
    pub population: Option<i64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sqrt_guess: 1.0,
            sqrt_tolerance: 0.001,
            max_iterations: 100,
            population: None,
        }
    }
}

impl AnalysisConfig {
    pub fn sqrt_options(&self) -> SqrtOptions {
        SqrtOptions {
            guess: self.sqrt_guess,
            tolerance: self.sqrt_tolerance,
            max_iterations: self.max_iterations,
        }
    }
}

/// Size of the cohort; student identifiers are dense in `1..=size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Population {
    size: i64,
}

impl Population {
    pub fn new(size: i64) -> Result<Self> {
        if size < 1 {
            return Err(AnalysisError::InvalidInput(format!(
                "population size must be positive, got {size}"
            )));
        }
        Ok(Self { size })
    }

    pub fn size(self) -> i64 {
        self.size
    }

    pub fn check_id(self, id: i64) -> Result<i32> {
        if id < 1 || id > self.size {
            return Err(AnalysisError::OutOfRange {
                field: "student id",
                value: id,
                min: 1,
                max: self.size,
            });
        }
        i32::try_from(id).map_err(|_| AnalysisError::OutOfRange {
            field: "student id",
            value: id,
            min: 1,
            max: i64::from(i32::MAX),
        })
    }
}
