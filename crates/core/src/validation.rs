//! Shared range validation helpers.
//!
//! Provides reusable range-checking functions used by the configuration and
//! event validation modules.

use std::ops::RangeInclusive;

use crate::error::CoreError;

/// Validate that a value falls within `[0.0, 1.0]`.
///
/// Returns a `CoreError::Validation` naming the field if out of range.
pub fn validate_unit_range(value: f64, name: &str) -> Result<(), CoreError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between 0.0 and 1.0, got {value}"
        )));
    }
    Ok(())
}

/// Validate that a finite measurement lies within an inclusive range.
///
/// NaN and infinities are always rejected.
pub fn validate_measurement(
    value: f64,
    range: RangeInclusive<f64>,
    name: &str,
) -> Result<(), CoreError> {
    if !value.is_finite() {
        return Err(CoreError::Validation(format!(
            "{name} must be a finite number, got {value}"
        )));
    }
    if !range.contains(&value) {
        return Err(CoreError::Validation(format!(
            "{name} must be between {} and {}, got {value}",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

/// Validate that an integer setting lies within `min..=max`.
pub fn validate_count_range(
    value: usize,
    min: usize,
    max: usize,
    name: &str,
) -> Result<(), CoreError> {
    if value < min || value > max {
        return Err(CoreError::Validation(format!(
            "{name} must be between {min} and {max}, got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_boundary_values() {
        assert!(validate_unit_range(0.0, "test").is_ok());
        assert!(validate_unit_range(0.5, "test").is_ok());
        assert!(validate_unit_range(1.0, "test").is_ok());
    }

    #[test]
    fn rejects_below_zero() {
        assert!(validate_unit_range(-0.01, "test").is_err());
    }

    #[test]
    fn rejects_above_one() {
        assert!(validate_unit_range(1.01, "test").is_err());
    }

    #[test]
    fn measurement_rejects_nan_and_infinity() {
        assert!(validate_measurement(f64::NAN, 0.0..=10.0, "kg").is_err());
        assert!(validate_measurement(f64::INFINITY, 0.0..=10.0, "kg").is_err());
    }

    #[test]
    fn measurement_range_is_inclusive() {
        assert!(validate_measurement(0.0, 0.0..=10.0, "kg").is_ok());
        assert!(validate_measurement(10.0, 0.0..=10.0, "kg").is_ok());
        assert!(validate_measurement(10.5, 0.0..=10.0, "kg").is_err());
    }

    #[test]
    fn count_range_error_names_field() {
        let err = validate_count_range(0, 1, 52, "recent_weeks").unwrap_err();
        assert!(err.to_string().contains("recent_weeks"));
    }
}
