//! Parameter validation shared by the measure setters.

use crate::error::DistanceError;

/// Reject NaN and infinite values.
pub(crate) fn check_finite(name: &'static str, value: f64) -> Result<(), DistanceError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(DistanceError::InvalidParameter {
            name,
            value,
            reason: "must be finite",
        })
    }
}

/// Reject negative or non-finite values.
pub(crate) fn check_non_negative(name: &'static str, value: f64) -> Result<(), DistanceError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(DistanceError::InvalidParameter {
            name,
            value,
            reason: "must be finite and >= 0",
        })
    }
}

/// Reject zero, negative or non-finite values.
pub(crate) fn check_positive(name: &'static str, value: f64) -> Result<(), DistanceError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DistanceError::InvalidParameter {
            name,
            value,
            reason: "must be finite and > 0",
        })
    }
}

/// Reject values outside `[0, 100]`.
pub(crate) fn check_percent(name: &'static str, value: f64) -> Result<(), DistanceError> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(DistanceError::InvalidParameter {
            name,
            value,
            reason: "must be in [0, 100]",
        })
    }
}

/// Require two series of equal length.
pub(crate) fn check_same_length(a_len: usize, b_len: usize) -> Result<(), DistanceError> {
    if a_len == b_len {
        Ok(())
    } else {
        Err(DistanceError::IncomparableLength { a_len, b_len })
    }
}
