//! Product-specific pairing of model output with satellite retrievals.
//!
//! The entry points mirror the supported products: daily L3 gridded
//! columns, nadir-mapper swath columns without kernel application, the
//! same with the averaging kernel applied, and the generic time/space
//! blending primitive the swath products are built on.

use chrono::NaiveDate;
use error_stack::ResultExt;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array3, Array4, Axis};
use serde::Deserialize;

use crate::column;
use crate::config::{ModelVarNames, PairingConfig};
use crate::fields::{
    ModelField, ObservationGrid, ObservationSwath, PairedDataset, PairedGrid, PairedSwath,
};
use crate::interpolation::{LinearProfileInterp, ProfileInterp};
use crate::regrid::{BilinearRegridder, SpatialRegrid};
use crate::units;

mod kernel;
mod time_blend;
mod vertical;

pub use time_blend::BlendedFields;

#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("The {0} capability is not available in this runtime")]
    MissingCapability(&'static str),
    #[error("Cannot derive a blend window from a model time axis with {0} step(s); set an explicit time step")]
    DegenerateTimeAxis(usize),
    #[error("Model time axis must be strictly increasing")]
    NonIncreasingModelTime,
    #[error("Model variable '{0}' is required for this product but was not loaded")]
    MissingModelVariable(String),
    #[error("Observation swath does not carry {0} profiles, required for kernel pairing")]
    MissingKernelData(&'static str),
    #[error("{product} pairing expects {expected} observations")]
    ObservationKindMismatch {
        product: SatProduct,
        expected: &'static str,
    },
    #[error("Cannot convert model ozone from unit '{0}'")]
    BadOzoneUnit(String),
    #[error("Spatial regridding failed at model step {step}")]
    Regrid { step: usize },
    #[error("Vertical interpolation failed for pixel (scan {scan}, cross-track {xtrack})")]
    VerticalInterp { scan: usize, xtrack: usize },
    #[error("Observation pressure axis needs at least 2 levels, got {0}")]
    TooFewObsLevels(usize),
    #[error("Model ozone and layer-thickness fields do not line up")]
    ColumnInputMismatch,
}

/// The satellite products this crate can pair model output against.
///
/// A closed set on purpose: adding a product means adding a variant and
/// handling it in [`PairingEngine::pair`], which the compiler checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SatProduct {
    /// Daily gridded (L3) total-column product on a regular grid
    L3DailyColumn,
    /// Nadir-mapper swath columns, paired without the averaging kernel
    #[default]
    SwathColumn,
    /// Nadir-mapper swath columns with apriori and averaging kernel applied
    SwathColumnWithKernel,
}

/// Observation datasets accepted by the [`PairingEngine::pair`] dispatch.
pub enum Observations<'a> {
    Grid(&'a ObservationGrid),
    Swath(&'a ObservationSwath),
}

/// Pairs model fields with satellite observations.
///
/// The spatial-regrid and profile-interpolation capabilities are injected
/// at construction; [`PairingEngine::new`] wires up the built-in
/// implementations, while [`PairingEngine::with_capabilities`] accepts
/// alternatives (or `None` to represent a runtime where the capability is
/// unavailable, which turns into a [`PairingError::MissingCapability`]
/// before any output is produced).
pub struct PairingEngine {
    regrid: Option<Box<dyn SpatialRegrid>>,
    profile_interp: Option<Box<dyn ProfileInterp>>,
    names: ModelVarNames,
}

impl PairingEngine {
    pub fn new(config: &PairingConfig) -> Self {
        Self::with_capabilities(
            config,
            Some(Box::new(BilinearRegridder)),
            Some(Box::new(LinearProfileInterp::new())),
        )
    }

    pub fn with_capabilities(
        config: &PairingConfig,
        regrid: Option<Box<dyn SpatialRegrid>>,
        profile_interp: Option<Box<dyn ProfileInterp>>,
    ) -> Self {
        Self {
            regrid,
            profile_interp,
            names: config.model_vars.clone(),
        }
    }

    /// Dispatch to the product-specific entry point, checking that the
    /// observation kind matches the product.
    pub fn pair(
        &self,
        product: SatProduct,
        model: &ModelField,
        observations: Observations,
    ) -> error_stack::Result<PairedDataset, PairingError> {
        match (product, observations) {
            (SatProduct::L3DailyColumn, Observations::Grid(grid)) => {
                self.pair_l3_daily(model, grid).map(PairedDataset::Grid)
            }
            (SatProduct::SwathColumn, Observations::Swath(swath)) => {
                self.pair_swath(model, swath).map(PairedDataset::Swath)
            }
            (SatProduct::SwathColumnWithKernel, Observations::Swath(swath)) => self
                .pair_swath_with_kernel(model, swath)
                .map(PairedDataset::Swath),
            (product, Observations::Grid(_)) => Err(PairingError::ObservationKindMismatch {
                product,
                expected: "swath",
            }
            .into()),
            (product, Observations::Swath(_)) => Err(PairingError::ObservationKindMismatch {
                product,
                expected: "gridded",
            }
            .into()),
        }
    }

    /// Daily L3 column pairing: integrate the model profile to a column,
    /// regrid the whole time series onto the product grid with a single
    /// operator, then aggregate to daily means by calendar date.
    pub fn pair_l3_daily(
        &self,
        model: &ModelField,
        grid: &ObservationGrid,
    ) -> error_stack::Result<PairedGrid, PairingError> {
        let regridder = self.regridder()?;
        let unit_factor = self.vmr_to_ppb_factor()?;
        log::info!(
            "pairing {} model steps onto the daily L3 column grid",
            model.times().len()
        );

        let ozone = self.profile_var(model, &self.names.ozone)?;
        let thickness = self.profile_var(model, &self.names.layer_thickness)?;
        let mut model_column = column::integrate_model_series(ozone, thickness)
            .change_context(PairingError::ColumnInputMismatch)?;
        if unit_factor != 1.0 {
            model_column.mapv_inplace(|v| v * unit_factor);
        }

        let (dest_lat, dest_lon) = grid.cell_centers();
        let op = regridder
            .build(model.latitude(), model.longitude(), &dest_lat, &dest_lon)
            .change_context(PairingError::Regrid { step: 0 })?;

        let ny = grid.latitude().len();
        let nx = grid.longitude().len();
        let nt = model.times().len();
        let mut regridded = Array3::zeros((nt, ny, nx));
        for (it, plane) in model_column.outer_iter().enumerate() {
            let values = op
                .regrid_plane(plane)
                .change_context(PairingError::Regrid { step: it })?;
            let plane_on_grid = values
                .into_shape((ny, nx))
                .expect("regridded plane length should match the destination grid size");
            regridded.index_axis_mut(Axis(0), it).assign(&plane_on_grid);
        }

        // aggregate time steps into daily means
        let mut day_steps: IndexMap<NaiveDate, Vec<usize>> = IndexMap::new();
        for (it, t) in model.times().iter().enumerate() {
            day_steps.entry(t.date_naive()).or_default().push(it);
        }

        let mut daily = Array3::zeros((day_steps.len(), ny, nx));
        for (iday, (_, steps)) in day_steps.iter().enumerate() {
            let mut mean = daily.index_axis_mut(Axis(0), iday);
            for &it in steps {
                mean += &regridded.index_axis(Axis(0), it);
            }
            let n = steps.len() as f64;
            mean.mapv_inplace(|v| v / n);
        }

        let mut variables = IndexMap::new();
        variables.insert(self.names.ozone.clone(), daily);
        Ok(PairedGrid {
            dates: day_steps.keys().copied().collect_vec(),
            latitude: grid.latitude().to_owned(),
            longitude: grid.longitude().to_owned(),
            variables,
        })
    }

    /// Swath pairing without kernel application: blend layer thickness and
    /// ozone onto the swath, then integrate the blended profile.
    pub fn pair_swath(
        &self,
        model: &ModelField,
        swath: &ObservationSwath,
    ) -> error_stack::Result<PairedSwath, PairingError> {
        let regridder = self.regridder()?;
        let unit_factor = self.vmr_to_ppb_factor()?;
        log::info!("pairing swath columns without averaging kernel application");

        let blended = time_blend::blend_to_swath(
            regridder,
            model,
            swath,
            &[
                self.names.layer_thickness.as_str(),
                self.names.ozone.as_str(),
            ],
            &[],
        )?;
        let thickness = &blended.profiles[self.names.layer_thickness.as_str()];
        let ozone = &blended.profiles[self.names.ozone.as_str()];
        let mut paired_column = column::integrate_blended(ozone, thickness);
        if unit_factor != 1.0 {
            paired_column.mapv_inplace(|v| v * unit_factor);
        }

        let mut variables = IndexMap::new();
        variables.insert(self.names.ozone.clone(), paired_column);
        variables.insert(swath.column_name().to_string(), swath.column().clone());
        Ok(PairedSwath {
            times: swath.times().to_vec(),
            latitude: swath.latitude().to_owned(),
            longitude: swath.longitude().to_owned(),
            variables,
            profiles: IndexMap::new(),
        })
    }

    /// Swath pairing with kernel application: blend ozone, mid-level
    /// pressure, and surface pressure onto the swath, resample the ozone
    /// profile onto the retrieval's pressure levels, then apply the
    /// apriori and layer efficiency.
    pub fn pair_swath_with_kernel(
        &self,
        model: &ModelField,
        swath: &ObservationSwath,
    ) -> error_stack::Result<PairedSwath, PairingError> {
        let regridder = self.regridder()?;
        let interp = self.interpolator()?;
        let unit_factor = self.vmr_to_ppb_factor()?;
        log::info!("pairing swath columns with averaging kernel application");

        let blended = time_blend::blend_to_swath(
            regridder,
            model,
            swath,
            &[self.names.ozone.as_str(), self.names.mid_pressure.as_str()],
            &[self.names.surface_pressure.as_str()],
        )?;
        let ozone = &blended.profiles[self.names.ozone.as_str()];
        let pressure = &blended.profiles[self.names.mid_pressure.as_str()];
        let surface = &blended.surfaces[self.names.surface_pressure.as_str()];

        let mut on_levels =
            vertical::resample_to_obs_levels(interp, ozone, pressure, swath.pressure())?;
        if unit_factor != 1.0 {
            on_levels.mapv_inplace(|v| v * unit_factor);
        }

        let paired_column = kernel::apply_averaging_kernel(swath, &on_levels, surface)?;

        let mut variables = IndexMap::new();
        variables.insert(self.names.ozone.clone(), paired_column);
        variables.insert(swath.column_name().to_string(), swath.column().clone());
        let mut profiles = IndexMap::new();
        profiles.insert(format!("{}_profile", self.names.ozone), on_levels);
        Ok(PairedSwath {
            times: swath.times().to_vec(),
            latitude: swath.latitude().to_owned(),
            longitude: swath.longitude().to_owned(),
            variables,
            profiles,
        })
    }

    /// The generic time/space blending primitive, for callers that want
    /// arbitrary variable sets on the swath's index without any
    /// column-specific post-processing.
    pub fn blend_space_time(
        &self,
        model: &ModelField,
        swath: &ObservationSwath,
        profile_vars: &[&str],
        surface_vars: &[&str],
    ) -> error_stack::Result<BlendedFields, PairingError> {
        let regridder = self.regridder()?;
        time_blend::blend_to_swath(regridder, model, swath, profile_vars, surface_vars)
    }

    fn regridder(&self) -> Result<&dyn SpatialRegrid, PairingError> {
        self.regrid
            .as_deref()
            .ok_or(PairingError::MissingCapability("spatial regridding"))
    }

    fn interpolator(&self) -> Result<&dyn ProfileInterp, PairingError> {
        self.profile_interp
            .as_deref()
            .ok_or(PairingError::MissingCapability("profile interpolation"))
    }

    fn profile_var<'m>(
        &self,
        model: &'m ModelField,
        name: &str,
    ) -> Result<&'m Array4<f64>, PairingError> {
        model
            .profile_var(name)
            .ok_or_else(|| PairingError::MissingModelVariable(name.to_string()))
    }

    fn vmr_to_ppb_factor(&self) -> error_stack::Result<f64, PairingError> {
        units::vmr_conv_factor(&self.names.ozone_unit, "ppb")
            .change_context_lazy(|| PairingError::BadOzoneUnit(self.names.ozone_unit.clone()))
    }
}
