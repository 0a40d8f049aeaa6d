//! Builders for the small synthetic datasets used across the unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ndarray::{array, Array2, Array4};

use crate::fields::{ModelField, ObservationSwath};

pub(crate) fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .unwrap()
}

pub(crate) fn hourly_times(start: DateTime<Utc>, n: usize) -> Vec<DateTime<Utc>> {
    (0..n).map(|i| start + Duration::hours(i as i64)).collect()
}

/// A model field on a 4x4 grid (lat 0..3, lon 10..13) with spatially and
/// temporally constant ozone (ppb) and layer thickness (Pa).
pub(crate) fn constant_model(
    times: Vec<DateTime<Utc>>,
    nlev: usize,
    vmr_ppb: f64,
    dp_pa: f64,
) -> ModelField {
    let nt = times.len();
    let mut model = ModelField::new(times, array![0.0, 1.0, 2.0, 3.0], array![10.0, 11.0, 12.0, 13.0]);
    model
        .add_profile_var("o3vmr", Array4::from_elem((nt, nlev, 4, 4), vmr_ppb))
        .unwrap();
    model
        .add_profile_var("dp_pa", Array4::from_elem((nt, nlev, 4, 4), dp_pa))
        .unwrap();
    model
}

/// Like [`constant_model`], but with a different (spatially constant)
/// ozone value at each time step so temporal blending is observable.
pub(crate) fn gradient_model(
    times: Vec<DateTime<Utc>>,
    nlev: usize,
    step_values: &[f64],
) -> ModelField {
    let nt = times.len();
    assert!(step_values.len() >= nt, "need one ozone value per time step");
    let mut model = ModelField::new(times, array![0.0, 1.0, 2.0, 3.0], array![10.0, 11.0, 12.0, 13.0]);
    let ozone = Array4::from_shape_fn((nt, nlev, 4, 4), |(it, _, _, _)| step_values[it]);
    model.add_profile_var("o3vmr", ozone).unwrap();
    model
        .add_profile_var("dp_pa", Array4::from_elem((nt, nlev, 4, 4), 1000.0))
        .unwrap();
    model
}

/// A 2-pixel-wide swath with one scan per entry of `times`, placed well
/// inside the [`constant_model`] grid.
pub(crate) fn swath_at_times(times: Vec<DateTime<Utc>>) -> ObservationSwath {
    let nscan = times.len();
    let latitude = Array2::from_shape_fn((nscan, 2), |(_, j)| 1.25 + 0.5 * j as f64);
    let longitude = Array2::from_shape_fn((nscan, 2), |(_, j)| 10.5 + 1.0 * j as f64);
    ObservationSwath::new(
        times,
        latitude,
        longitude,
        array![1000.0, 500.0, 100.0],
        "ozone_column",
        Array2::zeros((nscan, 2)),
    )
    .unwrap()
}
