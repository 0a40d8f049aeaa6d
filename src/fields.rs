//! Data model exchanged with the (out of scope) dataset readers and the
//! downstream statistics code.
//!
//! Model and observation structures are constructed once by the readers,
//! shape-checked here, and treated as read-only by the pairing code. Every
//! pairing call allocates a fresh paired output.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use indexmap::IndexMap;
use ndarray::{Array1, Array2, Array3, Array4, ArrayView1, ArrayView2};

use crate::error::DimensionError;

/// Gridded model output on a regular (time, level, lat, lon) grid.
///
/// Vertical index 0 is nearest the surface, and the time coordinate must
/// ascend with a near-uniform step. Variables are stored under the names
/// the pairing products look them up by (see
/// [`crate::config::ModelVarNames`]).
#[derive(Debug, Clone)]
pub struct ModelField {
    times: Vec<DateTime<Utc>>,
    latitude: Array1<f64>,
    longitude: Array1<f64>,
    time_step: Option<Duration>,
    profile_vars: IndexMap<String, Array4<f64>>,
    surface_vars: IndexMap<String, Array3<f64>>,
}

impl ModelField {
    pub fn new(times: Vec<DateTime<Utc>>, latitude: Array1<f64>, longitude: Array1<f64>) -> Self {
        Self {
            times,
            latitude,
            longitude,
            time_step: None,
            profile_vars: IndexMap::new(),
            surface_vars: IndexMap::new(),
        }
    }

    /// Override the blend window normally derived from the first two time
    /// steps. Required for single-step model fields, where no step can be
    /// derived from the axis.
    pub fn with_time_step(mut self, step: Duration) -> Self {
        self.time_step = Some(step);
        self
    }

    /// Add a (time, level, lat, lon) variable, e.g. a mixing ratio or
    /// layer-pressure profile.
    pub fn add_profile_var<S: ToString>(
        &mut self,
        name: S,
        data: Array4<f64>,
    ) -> Result<(), DimensionError> {
        let (nt, nlev, ny, nx) = data.dim();
        self.check_grid_dims("model profile variable", nt, ny, nx)?;

        if let Some((_, existing)) = self.profile_vars.first() {
            let expected = existing.dim().1;
            if nlev != expected {
                return Err(DimensionError::LengthMismatch {
                    name: "model profile variable levels",
                    other: "previously added profile variables",
                    expected,
                    found: nlev,
                });
            }
        }

        self.profile_vars.insert(name.to_string(), data);
        Ok(())
    }

    /// Add a (time, lat, lon) variable, e.g. surface pressure.
    pub fn add_surface_var<S: ToString>(
        &mut self,
        name: S,
        data: Array3<f64>,
    ) -> Result<(), DimensionError> {
        let (nt, ny, nx) = data.dim();
        self.check_grid_dims("model surface variable", nt, ny, nx)?;
        self.surface_vars.insert(name.to_string(), data);
        Ok(())
    }

    fn check_grid_dims(
        &self,
        name: &'static str,
        nt: usize,
        ny: usize,
        nx: usize,
    ) -> Result<(), DimensionError> {
        if nt != self.times.len() {
            return Err(DimensionError::LengthMismatch {
                name,
                other: "the model time axis",
                expected: self.times.len(),
                found: nt,
            });
        }
        if ny != self.latitude.len() || nx != self.longitude.len() {
            return Err(DimensionError::bad_shape(
                name,
                format!("(.., {}, {})", self.latitude.len(), self.longitude.len()),
                format!("(.., {ny}, {nx})"),
            ));
        }
        Ok(())
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn latitude(&self) -> ArrayView1<f64> {
        self.latitude.view()
    }

    pub fn longitude(&self) -> ArrayView1<f64> {
        self.longitude.view()
    }

    /// The blend window: the explicit override if one was set, otherwise
    /// the spacing of the first two time steps.
    pub fn time_step(&self) -> Option<Duration> {
        self.time_step.or_else(|| {
            if self.times.len() >= 2 {
                Some(self.times[1] - self.times[0])
            } else {
                None
            }
        })
    }

    pub fn profile_var(&self, name: &str) -> Option<&Array4<f64>> {
        self.profile_vars.get(name)
    }

    pub fn surface_var(&self, name: &str) -> Option<&Array3<f64>> {
        self.surface_vars.get(name)
    }

    pub fn n_levels(&self) -> Option<usize> {
        self.profile_vars.first().map(|(_, arr)| arr.dim().1)
    }
}

/// A satellite swath: per-scan times, 2-D pixel coordinates, one named
/// column quantity, and (for kernel products) the retrieval's apriori and
/// layer-efficiency profiles.
///
/// The pressure-level vector is shared by every pixel and ordered
/// surface-first (pressure decreasing with index), in hPa.
#[derive(Debug, Clone)]
pub struct ObservationSwath {
    times: Vec<DateTime<Utc>>,
    latitude: Array2<f64>,
    longitude: Array2<f64>,
    pressure: Array1<f64>,
    column_name: String,
    column: Array2<f64>,
    apriori: Option<Array3<f64>>,
    efficiency: Option<Array3<f64>>,
}

impl ObservationSwath {
    pub fn new<S: ToString>(
        times: Vec<DateTime<Utc>>,
        latitude: Array2<f64>,
        longitude: Array2<f64>,
        pressure: Array1<f64>,
        column_name: S,
        column: Array2<f64>,
    ) -> Result<Self, DimensionError> {
        let dim = latitude.dim();
        if longitude.dim() != dim {
            return Err(DimensionError::bad_shape(
                "swath longitude",
                format!("{dim:?}"),
                format!("{:?}", longitude.dim()),
            ));
        }
        if column.dim() != dim {
            return Err(DimensionError::bad_shape(
                "swath column",
                format!("{dim:?}"),
                format!("{:?}", column.dim()),
            ));
        }
        if times.len() != dim.0 {
            return Err(DimensionError::LengthMismatch {
                name: "swath times",
                other: "the along-track dimension",
                expected: dim.0,
                found: times.len(),
            });
        }

        Ok(Self {
            times,
            latitude,
            longitude,
            pressure,
            column_name: column_name.to_string(),
            column,
            apriori: None,
            efficiency: None,
        })
    }

    /// Attach the retrieval's apriori and layer-efficiency (averaging
    /// kernel) profiles, both shaped (scan, cross-track, level).
    pub fn with_kernel(
        mut self,
        apriori: Array3<f64>,
        efficiency: Array3<f64>,
    ) -> Result<Self, DimensionError> {
        let expected = (
            self.latitude.dim().0,
            self.latitude.dim().1,
            self.pressure.len(),
        );
        if apriori.dim() != expected {
            return Err(DimensionError::bad_shape(
                "swath apriori",
                format!("{expected:?}"),
                format!("{:?}", apriori.dim()),
            ));
        }
        if efficiency.dim() != expected {
            return Err(DimensionError::bad_shape(
                "swath layer efficiency",
                format!("{expected:?}"),
                format!("{:?}", efficiency.dim()),
            ));
        }

        self.apriori = Some(apriori);
        self.efficiency = Some(efficiency);
        Ok(self)
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn latitude(&self) -> ArrayView2<f64> {
        self.latitude.view()
    }

    pub fn longitude(&self) -> ArrayView2<f64> {
        self.longitude.view()
    }

    pub fn pressure(&self) -> ArrayView1<f64> {
        self.pressure.view()
    }

    pub fn column_name(&self) -> &str {
        &self.column_name
    }

    pub fn column(&self) -> &Array2<f64> {
        &self.column
    }

    pub fn apriori(&self) -> Option<&Array3<f64>> {
        self.apriori.as_ref()
    }

    pub fn efficiency(&self) -> Option<&Array3<f64>> {
        self.efficiency.as_ref()
    }

    pub fn n_scans(&self) -> usize {
        self.latitude.dim().0
    }

    pub fn n_xtrack(&self) -> usize {
        self.latitude.dim().1
    }
}

/// The destination grid of an L3 gridded product, defined by its 1-D cell
/// center axes.
#[derive(Debug, Clone)]
pub struct ObservationGrid {
    latitude: Array1<f64>,
    longitude: Array1<f64>,
}

impl ObservationGrid {
    pub fn new(latitude: Array1<f64>, longitude: Array1<f64>) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> ArrayView1<f64> {
        self.latitude.view()
    }

    pub fn longitude(&self) -> ArrayView1<f64> {
        self.longitude.view()
    }

    /// Flatten the grid into destination point lists, latitude-major, so a
    /// regridded vector reshapes back to (lat, lon) in row-major order.
    pub fn cell_centers(&self) -> (Vec<f64>, Vec<f64>) {
        let n = self.latitude.len() * self.longitude.len();
        let mut lats = Vec::with_capacity(n);
        let mut lons = Vec::with_capacity(n);
        for &lat in self.latitude.iter() {
            for &lon in self.longitude.iter() {
                lats.push(lat);
                lons.push(lon);
            }
        }
        (lats, lons)
    }
}

/// Model data paired onto a swath's own time/space index.
///
/// Pixels never covered by any model time window keep the accumulator's
/// neutral zero; consumers must treat untouched zeros as missing, not as a
/// physical zero column.
#[derive(Debug)]
pub struct PairedSwath {
    pub times: Vec<DateTime<Utc>>,
    pub latitude: Array2<f64>,
    pub longitude: Array2<f64>,
    /// Per-pixel quantities, keyed by the variable names the statistics
    /// code compares on (the model ozone variable and the swath's own
    /// column name).
    pub variables: IndexMap<String, Array2<f64>>,
    /// Per-pixel profile quantities on the observation's pressure levels,
    /// shaped (level, scan, cross-track).
    pub profiles: IndexMap<String, Array3<f64>>,
}

/// Daily-mean model columns on an L3 product's grid.
#[derive(Debug)]
pub struct PairedGrid {
    pub dates: Vec<NaiveDate>,
    pub latitude: Array1<f64>,
    pub longitude: Array1<f64>,
    /// (day, lat, lon) quantities keyed by model variable name.
    pub variables: IndexMap<String, Array3<f64>>,
}

/// The output of [`crate::pairing::PairingEngine::pair`], covering both
/// destination geometries.
#[derive(Debug)]
pub enum PairedDataset {
    Swath(PairedSwath),
    Grid(PairedGrid),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{hourly_times, utc};
    use ndarray::array;

    #[test]
    fn test_model_field_shape_checks() {
        let times = hourly_times(utc(2023, 7, 1, 0, 0), 2);
        let mut model = ModelField::new(times, array![0.0, 1.0], array![10.0, 11.0]);

        // wrong time length
        let err = model
            .add_profile_var("o3vmr", Array4::zeros((3, 5, 2, 2)))
            .unwrap_err();
        assert!(matches!(err, DimensionError::LengthMismatch { .. }));

        // wrong horizontal shape
        let err = model
            .add_profile_var("o3vmr", Array4::zeros((2, 5, 2, 3)))
            .unwrap_err();
        assert!(matches!(err, DimensionError::BadShape { .. }));

        model
            .add_profile_var("o3vmr", Array4::zeros((2, 5, 2, 2)))
            .unwrap();

        // level count must agree across profile variables
        let err = model
            .add_profile_var("dp_pa", Array4::zeros((2, 4, 2, 2)))
            .unwrap_err();
        assert!(matches!(err, DimensionError::LengthMismatch { .. }));

        model
            .add_surface_var("surfpres_pa", Array3::zeros((2, 2, 2)))
            .unwrap();
        assert_eq!(model.n_levels(), Some(5));
    }

    #[test]
    fn test_model_time_step() {
        let times = hourly_times(utc(2023, 7, 1, 0, 0), 3);
        let model = ModelField::new(times, array![0.0, 1.0], array![10.0, 11.0]);
        assert_eq!(model.time_step(), Some(Duration::hours(1)));

        let single = ModelField::new(
            vec![utc(2023, 7, 1, 0, 0)],
            array![0.0, 1.0],
            array![10.0, 11.0],
        );
        assert_eq!(single.time_step(), None);
        let single = single.with_time_step(Duration::minutes(30));
        assert_eq!(single.time_step(), Some(Duration::minutes(30)));
    }

    #[test]
    fn test_swath_shape_checks() {
        let times = hourly_times(utc(2023, 7, 1, 0, 0), 3);
        let err = ObservationSwath::new(
            times.clone(),
            Array2::zeros((3, 2)),
            Array2::zeros((3, 3)),
            array![1000.0, 500.0],
            "ozone_column",
            Array2::zeros((3, 2)),
        )
        .unwrap_err();
        assert!(matches!(err, DimensionError::BadShape { .. }));

        let swath = ObservationSwath::new(
            times,
            Array2::zeros((3, 2)),
            Array2::zeros((3, 2)),
            array![1000.0, 500.0],
            "ozone_column",
            Array2::zeros((3, 2)),
        )
        .unwrap();

        let err = swath
            .clone()
            .with_kernel(Array3::zeros((3, 2, 4)), Array3::zeros((3, 2, 4)))
            .unwrap_err();
        assert!(matches!(err, DimensionError::BadShape { .. }));

        let swath = swath
            .with_kernel(Array3::zeros((3, 2, 2)), Array3::zeros((3, 2, 2)))
            .unwrap();
        assert!(swath.apriori().is_some());
        assert_eq!(swath.n_scans(), 3);
        assert_eq!(swath.n_xtrack(), 2);
    }

    #[test]
    fn test_grid_cell_centers_are_lat_major() {
        let grid = ObservationGrid::new(array![0.0, 1.0], array![10.0, 11.0, 12.0]);
        let (lats, lons) = grid.cell_centers();
        assert_eq!(lats, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        assert_eq!(lons, vec![10.0, 11.0, 12.0, 10.0, 11.0, 12.0]);
    }
}
