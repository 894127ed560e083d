//! Validated value types for weights and completion fractions.
//!
//! The tree never stores an unchecked `f64`: weights go through [`Weight`]
//! and leaf completion values go through [`Fraction`], so the invariants
//! "weight > 0" and "fraction in [0, 1]" hold by construction.

use serde::Serialize;

/// Errors from weight validation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum WeightError {
    /// Weight was NaN or infinite
    #[error("weight must be a finite number, got {0}")]
    NotFinite(f64),

    /// Weight was zero or negative
    #[error("weight must be positive, got {0}")]
    NotPositive(f64),
}

/// Relative contribution of a child to its parent's weighted average.
///
/// Always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Weight(f64);

impl Weight {
    /// Validate a raw weight.
    pub fn new(value: f64) -> Result<Self, WeightError> {
        if !value.is_finite() {
            return Err(WeightError::NotFinite(value));
        }
        if value <= 0.0 {
            return Err(WeightError::NotPositive(value));
        }
        Ok(Self(value))
    }

    /// The raw value.
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Weight {
    /// The default weight is 1.
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f64> for Weight {
    type Error = WeightError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Errors from fraction validation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FractionError {
    /// Value was NaN
    #[error("fraction must be a number, got NaN")]
    NotANumber,
}

/// A completion fraction, always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Fraction(f64);

impl Fraction {
    /// Nothing loaded.
    pub const ZERO: Fraction = Fraction(0.0);

    /// Fully loaded.
    pub const COMPLETE: Fraction = Fraction(1.0);

    /// Clamp a raw value into [0, 1]. NaN is rejected rather than clamped.
    pub fn clamped(value: f64) -> Result<Self, FractionError> {
        if value.is_nan() {
            return Err(FractionError::NotANumber);
        }
        Ok(Self(value.clamp(0.0, 1.0)))
    }

    /// The raw value.
    pub fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Fraction {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_defaults_to_one() {
        assert_eq!(Weight::default().get(), 1.0);
    }

    #[test]
    fn weight_accepts_positive_values() {
        assert_eq!(Weight::new(5.0).unwrap().get(), 5.0);
        assert_eq!(Weight::new(0.25).unwrap().get(), 0.25);
    }

    #[test]
    fn weight_rejects_zero_and_negative() {
        assert_eq!(Weight::new(0.0), Err(WeightError::NotPositive(0.0)));
        assert_eq!(Weight::new(-3.0), Err(WeightError::NotPositive(-3.0)));
    }

    #[test]
    fn weight_rejects_non_finite() {
        assert!(matches!(Weight::new(f64::NAN), Err(WeightError::NotFinite(_))));
        assert!(matches!(
            Weight::new(f64::INFINITY),
            Err(WeightError::NotFinite(_))
        ));
    }

    #[test]
    fn fraction_keeps_in_range_values() {
        assert_eq!(Fraction::clamped(0.5).unwrap().get(), 0.5);
        assert_eq!(Fraction::clamped(0.55555).unwrap().get(), 0.55555);
    }

    #[test]
    fn fraction_clamps_out_of_range_values() {
        assert_eq!(Fraction::clamped(-1.0).unwrap(), Fraction::ZERO);
        assert_eq!(Fraction::clamped(2.0).unwrap(), Fraction::COMPLETE);
        assert_eq!(Fraction::clamped(f64::INFINITY).unwrap(), Fraction::COMPLETE);
        assert_eq!(Fraction::clamped(f64::NEG_INFINITY).unwrap(), Fraction::ZERO);
    }

    #[test]
    fn fraction_rejects_nan() {
        assert_eq!(Fraction::clamped(f64::NAN), Err(FractionError::NotANumber));
    }
}
