//! Pairing run configuration.
//!
//! The control file handling that selects products and model runs lives
//! upstream; this module only defines the options the pairing engine
//! itself consumes, deserializable from the relevant TOML table of such a
//! control file.

use error_stack::ResultExt;
use serde::Deserialize;

use crate::pairing::SatProduct;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error parsing pairing configuration TOML")]
    Parse,
}

/// Names and units of the model variables the pairing products consume.
///
/// Defaults match the conventions of the model readers (ozone mixing
/// ratio in ppb, pressures in Pa).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelVarNames {
    /// Ozone mixing-ratio profile variable
    pub ozone: String,
    /// Unit of the ozone variable, converted to ppb before column math
    pub ozone_unit: String,
    /// Pressure-layer thickness profile variable (Pa)
    pub layer_thickness: String,
    /// Layer mid-point pressure profile variable (Pa)
    pub mid_pressure: String,
    /// Surface pressure variable (Pa)
    pub surface_pressure: String,
}

impl Default for ModelVarNames {
    fn default() -> Self {
        Self {
            ozone: "o3vmr".to_string(),
            ozone_unit: "ppb".to_string(),
            layer_thickness: "dp_pa".to_string(),
            mid_pressure: "pres_pa_mid".to_string(),
            surface_pressure: "surfpres_pa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    pub product: SatProduct,
    pub model_vars: ModelVarNames,
}

impl PairingConfig {
    pub fn from_toml_str(s: &str) -> error_stack::Result<Self, ConfigError> {
        toml::from_str(s).change_context(ConfigError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PairingConfig::default();
        assert_eq!(config.product, SatProduct::SwathColumn);
        assert_eq!(config.model_vars.ozone, "o3vmr");
        assert_eq!(config.model_vars.ozone_unit, "ppb");
        assert_eq!(config.model_vars.layer_thickness, "dp_pa");
        assert_eq!(config.model_vars.mid_pressure, "pres_pa_mid");
        assert_eq!(config.model_vars.surface_pressure, "surfpres_pa");
    }

    #[test]
    fn test_from_toml() {
        let toml_str = r#"
            product = "swath_column_with_kernel"

            [model_vars]
            ozone = "o3_ugm3"
            ozone_unit = "ppm"
        "#;
        let config = PairingConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.product, SatProduct::SwathColumnWithKernel);
        assert_eq!(config.model_vars.ozone, "o3_ugm3");
        assert_eq!(config.model_vars.ozone_unit, "ppm");
        // unspecified names keep their defaults
        assert_eq!(config.model_vars.surface_pressure, "surfpres_pa");
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        PairingConfig::from_toml_str("product = \"nadir_profile\"").unwrap_err();
    }
}
