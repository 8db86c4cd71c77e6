use crate::error::{AnalysisError, Result};

/// Knobs for [`sqrt_approx`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SqrtOptions {
    pub guess: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SqrtOptions {
    fn default() -> Self {
        Self {
            guess: 1.0,
            tolerance: 0.001,
            max_iterations: 100,
        }
    }
}

/// Averages `guess` and `n / guess` until `|guess^2 - n| < tolerance`.
pub fn sqrt_approx(n: f64, options: SqrtOptions) -> Result<f64> {
    let SqrtOptions {
        guess,
        tolerance,
        max_iterations,
    } = options;

    if !n.is_finite() || n < 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "cannot take the square root of {n}"
        )));
    }
    if !guess.is_finite() || guess <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "square root guess must be positive, got {guess}"
        )));
    }
    if !tolerance.is_finite() || tolerance <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "square root tolerance must be positive, got {tolerance}"
        )));
    }
    if n == 0.0 {
        return Ok(0.0);
    }

    let mut current = guess;
    for iteration in 0..=max_iterations {
        if (current * current - n).abs() < tolerance {
            tracing::trace!(n, iteration, root = current, "square root converged");
            return Ok(current);
        }
        current = (current + n / current) / 2.0;
    }

    Err(AnalysisError::NoConvergence {
        radicand: n,
        iterations: max_iterations,
    })
}
