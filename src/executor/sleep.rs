use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::SqlToolkitError;

/// Digits kept when the precision is inferred from the bounds.
const MAX_INFERRED_PRECISION: u32 = 6;

#[derive(Debug, Clone, PartialEq)]
enum SleepRange {
    Between(f64, f64),
    Exactly(f64),
    Candidates(Vec<f64>),
}

/// How long a server-side sleep should last.
///
/// ```rust
/// use sql_toolkit::prelude::*;
///
/// let mut rng = rand::thread_rng();
/// let seconds = SleepSpec::between(0.5, 1.5).precision(1).sample(&mut rng)?;
/// assert!((0.5..=1.5).contains(&seconds));
/// assert_eq!(SleepSpec::up_to(3.0).precision(0).sample(&mut rng)?.fract(), 0.0);
/// # Ok::<(), SqlToolkitError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SleepSpec {
    range: SleepRange,
    precision: Option<u32>,
}

impl Default for SleepSpec {
    /// Between 0 and 10 seconds.
    fn default() -> Self {
        Self::between(0.0, 10.0)
    }
}

impl SleepSpec {
    /// Between 0 and `high` seconds.
    #[must_use]
    pub fn up_to(high: f64) -> Self {
        Self::between(0.0, high)
    }

    /// Between `low` and `high` seconds, both included.
    #[must_use]
    pub fn between(low: f64, high: f64) -> Self {
        Self {
            range: SleepRange::Between(low, high),
            precision: None,
        }
    }

    /// Exactly `seconds`; no sampling.
    #[must_use]
    pub fn exactly(seconds: f64) -> Self {
        Self {
            range: SleepRange::Exactly(seconds),
            precision: None,
        }
    }

    /// One of `candidates`, picked uniformly.
    #[must_use]
    pub fn candidates(candidates: impl IntoIterator<Item = f64>) -> Self {
        Self {
            range: SleepRange::Candidates(candidates.into_iter().collect()),
            precision: None,
        }
    }

    /// Decimal digits of the sampled value; `0` samples whole seconds. Without it the
    /// precision is the largest number of decimals among the inputs.
    #[must_use]
    pub fn precision(mut self, digits: u32) -> Self {
        self.precision = Some(digits);
        self
    }

    fn inputs(&self) -> Vec<f64> {
        match &self.range {
            SleepRange::Between(low, high) => vec![*low, *high],
            SleepRange::Exactly(seconds) => vec![*seconds],
            SleepRange::Candidates(candidates) => candidates.clone(),
        }
    }

    fn effective_precision(&self) -> u32 {
        self.precision.unwrap_or_else(|| {
            self.inputs()
                .iter()
                .map(|value| decimal_digits(*value))
                .max()
                .unwrap_or(0)
        })
    }

    /// Pick the number of seconds to sleep.
    ///
    /// # Errors
    /// Returns `SqlToolkitError::BuildError` for negative or non-finite inputs, a low bound
    /// above the high bound, or an empty candidate list.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Result<f64, SqlToolkitError> {
        let inputs = self.inputs();
        if let Some(bad) = inputs.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SqlToolkitError::BuildError(format!(
                "sleep seconds must be finite and non-negative, got {bad}"
            )));
        }
        let precision = self.effective_precision();
        let seconds = match &self.range {
            SleepRange::Exactly(seconds) => *seconds,
            SleepRange::Candidates(candidates) => *candidates.choose(rng).ok_or_else(|| {
                SqlToolkitError::BuildError("sleep needs at least one candidate".to_string())
            })?,
            SleepRange::Between(low, high) => {
                if low > high {
                    return Err(SqlToolkitError::BuildError(format!(
                        "sleep low bound {low} is above high bound {high}"
                    )));
                }
                if precision == 0 {
                    let (low, high) = (low.ceil(), high.floor());
                    if low > high {
                        return Err(SqlToolkitError::BuildError(format!(
                            "no whole second between {low} and {high}"
                        )));
                    }
                    #[allow(clippy::cast_possible_truncation)]
                    let whole = rng.gen_range((low as i64)..=(high as i64));
                    #[allow(clippy::cast_precision_loss)]
                    return Ok(whole as f64);
                }
                rng.gen_range(*low..=*high)
            }
        };
        Ok(round_to(seconds, precision))
    }
}

fn decimal_digits(value: f64) -> u32 {
    let text = value.to_string();
    let digits = text
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.trim_end_matches('0').len());
    u32::try_from(digits)
        .unwrap_or(MAX_INFERRED_PRECISION)
        .min(MAX_INFERRED_PRECISION)
}

fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10_f64.powi(i32::try_from(digits).unwrap_or(i32::MAX).min(15));
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_samples_whole_seconds_up_to_ten() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let seconds = SleepSpec::default().sample(&mut rng).unwrap();
            assert!((0.0..=10.0).contains(&seconds));
            assert!(seconds.fract().abs() < f64::EPSILON);
        }
    }

    #[test]
    fn precision_follows_the_inputs() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let seconds = SleepSpec::between(0.25, 0.5).sample(&mut rng).unwrap();
            assert!((0.25..=0.5).contains(&seconds));
            assert!((seconds * 100.0 - (seconds * 100.0).round()).abs() < 1e-9);
        }
    }

    #[test]
    fn candidates_and_exact_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = SleepSpec::candidates([0.1, 0.2, 0.3])
            .sample(&mut rng)
            .unwrap();
        assert!([0.1, 0.2, 0.3].contains(&picked));
        assert!((SleepSpec::exactly(1.5).sample(&mut rng).unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_bad_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(SleepSpec::between(3.0, 1.0).sample(&mut rng).is_err());
        assert!(SleepSpec::up_to(-1.0).sample(&mut rng).is_err());
        assert!(SleepSpec::candidates([]).sample(&mut rng).is_err());
        assert!(
            SleepSpec::between(0.2, 0.8)
                .precision(0)
                .sample(&mut rng)
                .is_err()
        );
    }
}
