use interp::{interp_slice, InterpMode};

#[derive(Debug, thiserror::Error)]
pub enum InterpolationError {
    #[error("Input profiles were different lengths (coords.len() = {x_len}, values.len() = {y_len})")]
    InputLengthMismatch { x_len: usize, y_len: usize },
    #[error(
        "Input profiles were too short, needed at least {req_len} levels but got only {actual_len}"
    )]
    InputTooShort { req_len: usize, actual_len: usize },
    #[error("Coordinate profile must be strictly increasing, but decreases at level {index}")]
    NonMonotonicCoords { index: usize },
}

/// A 1-D vertical profile interpolation capability.
///
/// Implementations interpolate one profile at a time: `coords` is the input
/// vertical coordinate (must be strictly increasing), `values` the quantity
/// defined on those coordinates, and `targets` the output coordinates, in any
/// order. Targets falling outside the input coordinate range must be filled
/// with `missing`.
pub trait ProfileInterp {
    fn interp_profile(
        &self,
        coords: &[f64],
        values: &[f64],
        targets: &[f64],
        missing: f64,
    ) -> Result<Vec<f64>, InterpolationError>;

    fn check_profile_inputs(
        &self,
        coords: &[f64],
        values: &[f64],
        min_len: usize,
    ) -> Result<(), InterpolationError> {
        if coords.len() != values.len() {
            return Err(InterpolationError::InputLengthMismatch {
                x_len: coords.len(),
                y_len: values.len(),
            });
        }

        // Now we know both are the same length, so only need to test 1
        if coords.len() < min_len {
            return Err(InterpolationError::InputTooShort {
                req_len: min_len,
                actual_len: coords.len(),
            });
        }

        for (i, w) in coords.windows(2).enumerate() {
            if w[1] <= w[0] {
                return Err(InterpolationError::NonMonotonicCoords { index: i + 1 });
            }
        }

        Ok(())
    }
}

/// Linear interpolation onto the target coordinates.
///
/// Out-of-range targets are given the `missing` value rather than
/// extrapolated.
#[derive(Debug, Default)]
pub struct LinearProfileInterp;

impl LinearProfileInterp {
    pub fn new() -> Self {
        Self
    }
}

impl ProfileInterp for LinearProfileInterp {
    fn interp_profile(
        &self,
        coords: &[f64],
        values: &[f64],
        targets: &[f64],
        missing: f64,
    ) -> Result<Vec<f64>, InterpolationError> {
        self.check_profile_inputs(coords, values, 2)?;
        Ok(interp_slice(
            coords,
            values,
            targets,
            &InterpMode::Constant(missing),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_linear_error_checks() {
        let interpolator = LinearProfileInterp::new();

        let err = interpolator
            .interp_profile(&[1.0], &[1.0, 1.0], &[2.0], f64::NAN)
            .unwrap_err();
        match err {
            InterpolationError::InputLengthMismatch { x_len, y_len } => {
                assert_eq!(x_len, 1, "x_len in error is incorrect");
                assert_eq!(y_len, 2, "y_len in error is incorrect");
            }
            _ => assert!(false, "Expected InputLengthMismatch error, did not get that"),
        }

        let err = interpolator
            .interp_profile(&[1.0], &[1.0], &[2.0], f64::NAN)
            .unwrap_err();
        match err {
            InterpolationError::InputTooShort {
                req_len,
                actual_len,
            } => {
                assert_eq!(req_len, 2, "req_len in error is incorrect");
                assert_eq!(actual_len, 1, "actual_len in error is incorrect");
            }
            _ => assert!(false, "Expected InputTooShort error, did not get that"),
        }

        let err = interpolator
            .interp_profile(&[1.0, 3.0, 2.0], &[1.0, 2.0, 3.0], &[2.0], f64::NAN)
            .unwrap_err();
        match err {
            InterpolationError::NonMonotonicCoords { index } => {
                assert_eq!(index, 2, "index in error is incorrect");
            }
            _ => assert!(false, "Expected NonMonotonicCoords error, did not get that"),
        }
    }

    #[test]
    fn test_linear_at_knots() {
        let interpolator = LinearProfileInterp::new();
        let x = [100.0, 500.0, 1000.0];
        let y = [2.0, 4.0, 6.0];

        let out = interpolator
            .interp_profile(&x, &y, &[100.0, 500.0, 1000.0], f64::NAN)
            .unwrap();
        assert_abs_diff_eq!(out[0], 2.0);
        assert_abs_diff_eq!(out[1], 4.0);
        assert_abs_diff_eq!(out[2], 6.0);
    }

    #[test]
    fn test_linear_between_knots() {
        let interpolator = LinearProfileInterp::new();
        let x = [100.0, 500.0, 1000.0];
        let y = [2.0, 4.0, 6.0];

        let out = interpolator
            .interp_profile(&x, &y, &[300.0, 750.0], f64::NAN)
            .unwrap();
        assert_abs_diff_eq!(out[0], 3.0);
        assert_abs_diff_eq!(out[1], 5.0);
    }

    #[test]
    fn test_linear_out_of_range_is_missing() {
        let interpolator = LinearProfileInterp::new();
        let x = [100.0, 500.0, 1000.0];
        let y = [2.0, 4.0, 6.0];

        let out = interpolator
            .interp_profile(&x, &y, &[50.0, 500.0, 1100.0], -999.0)
            .unwrap();
        assert_abs_diff_eq!(out[0], -999.0);
        assert_abs_diff_eq!(out[1], 4.0);
        assert_abs_diff_eq!(out[2], -999.0);
    }
}
