use std::fmt::Display;

/// Dobson units contributed by 1 ppb of mixing ratio across 1 hPa of
/// pressure-layer thickness.
pub const DU_FACTOR: f64 = 1.0e-5 * 6.023e23 / 28.97 / 9.8 / 2.687e19;

pub const PA_PER_HPA: f64 = 100.0;

#[derive(Debug)]
pub struct UnknownUnitError {
    pub quantity: &'static str,
    pub unit: String,
}

impl UnknownUnitError {
    fn new<S: ToString>(quantity: &'static str, unit: S) -> Self {
        Self {
            quantity,
            unit: unit.to_string(),
        }
    }
}

impl Display for UnknownUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown {} unit '{}'", self.quantity, self.unit)
    }
}

impl std::error::Error for UnknownUnitError {}

/// Factor to multiply a mixing ratio in `old_unit` by to express it in `new_unit`.
pub fn vmr_conv_factor(old_unit: &str, new_unit: &str) -> Result<f64, UnknownUnitError> {
    let fac1 = parts_to(old_unit)?;
    let fac2 = parts_to(new_unit)?;
    Ok(fac2 / fac1)
}

fn parts_to(vmr_unit: &str) -> Result<f64, UnknownUnitError> {
    match vmr_unit {
        "parts" => Ok(1.0),
        "1" => Ok(1.0),
        "ppm" | "ppmv" => Ok(1e6),
        "ppb" | "ppbv" => Ok(1e9),
        "ppt" | "pptv" => Ok(1e12),
        _ => Err(UnknownUnitError::new("mixing ratio", vmr_unit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_du_factor_value() {
        // 6.023e18 / 28.97 / 9.8 / 2.687e19
        assert_abs_diff_eq!(DU_FACTOR, 7.8953e-4, epsilon = 1e-7);
    }

    #[test]
    fn test_vmr_conv_factor() {
        assert_abs_diff_eq!(vmr_conv_factor("ppm", "ppb").unwrap(), 1e3);
        assert_abs_diff_eq!(vmr_conv_factor("ppbv", "ppb").unwrap(), 1.0);
        assert_abs_diff_eq!(vmr_conv_factor("ppt", "ppb").unwrap(), 1e-3);
        assert_abs_diff_eq!(vmr_conv_factor("parts", "ppb").unwrap(), 1e9);
    }

    #[test]
    fn test_unknown_unit() {
        let err = vmr_conv_factor("furlongs", "ppb").unwrap_err();
        assert_eq!(err.unit, "furlongs");
    }
}
