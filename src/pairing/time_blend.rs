//! Time-bracketed blending of spatially regridded model fields onto a
//! swath's pixels.
//!
//! For each model time step, the observations within one model interval of
//! that step are selected, the model snapshot is regridded to just those
//! pixels, and the result is blended into shared output buffers with
//! weights that interpolate linearly between the two bracketing steps. An
//! interior step therefore contributes `1 - |dt|/step` and its neighbor
//! the complement; the first and last steps assign full weight to
//! observations that fall outside the model time range on their side.

use chrono::{DateTime, Utc};
use error_stack::ResultExt;
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{s, Array2, Array3, Array4, ArrayView1, ArrayView2, Axis, Zip};

use crate::fields::{ModelField, ObservationSwath};
use crate::regrid::SpatialRegrid;

use super::PairingError;

/// Time-blended, spatially regridded model fields on the swath's index.
///
/// Pixels never selected by any time bracket keep the neutral zero;
/// consumers treat untouched zeros as missing.
#[derive(Debug)]
pub struct BlendedFields {
    /// (level, scan, cross-track) buffers keyed by model variable name
    pub profiles: IndexMap<String, Array3<f64>>,
    /// (scan, cross-track) buffers keyed by model variable name
    pub surfaces: IndexMap<String, Array2<f64>>,
}

/// The shared accumulation buffers, owned by the blending routine and
/// returned to the caller once every model step has contributed.
struct BlendAccumulator {
    profiles: IndexMap<String, Array3<f64>>,
    surfaces: IndexMap<String, Array2<f64>>,
}

impl BlendAccumulator {
    fn new(
        profile_vars: &[&str],
        surface_vars: &[&str],
        nlev: usize,
        nscan: usize,
        nxtrack: usize,
    ) -> Self {
        let profiles = profile_vars
            .iter()
            .map(|&name| (name.to_string(), Array3::zeros((nlev, nscan, nxtrack))))
            .collect();
        let surfaces = surface_vars
            .iter()
            .map(|&name| (name.to_string(), Array2::zeros((nscan, nxtrack))))
            .collect();
        Self { profiles, surfaces }
    }

    fn blend_profile(
        &mut self,
        name: &str,
        iscan: usize,
        contrib: Contribution,
        vals: ArrayView2<f64>,
    ) {
        let buf = self
            .profiles
            .get_mut(name)
            .expect("profile buffers are created for every requested variable");
        let mut dest = buf.slice_mut(s![.., iscan, ..]);
        match contrib {
            Contribution::Assign => dest.assign(&vals),
            Contribution::Weighted(w) => {
                Zip::from(&mut dest).and(&vals).for_each(|b, &v| *b += w * v)
            }
        }
    }

    fn blend_surface(
        &mut self,
        name: &str,
        iscan: usize,
        contrib: Contribution,
        vals: ArrayView1<f64>,
    ) {
        let buf = self
            .surfaces
            .get_mut(name)
            .expect("surface buffers are created for every requested variable");
        let mut dest = buf.slice_mut(s![iscan, ..]);
        match contrib {
            Contribution::Assign => dest.assign(&vals),
            Contribution::Weighted(w) => {
                Zip::from(&mut dest).and(&vals).for_each(|b, &v| *b += w * v)
            }
        }
    }

    fn into_fields(self) -> BlendedFields {
        BlendedFields {
            profiles: self.profiles,
            surfaces: self.surfaces,
        }
    }
}

/// How one model step contributes to one scan's buffers: boundary steps
/// assign full-weight values outright, everything else accumulates a
/// weighted share.
#[derive(Debug, Clone, Copy)]
enum Contribution {
    Assign,
    Weighted(f64),
}

fn duration_secs(d: chrono::Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

pub(crate) fn blend_to_swath(
    regrid: &dyn SpatialRegrid,
    model: &ModelField,
    swath: &ObservationSwath,
    profile_vars: &[&str],
    surface_vars: &[&str],
) -> error_stack::Result<BlendedFields, PairingError> {
    let nsteps = model.times().len();
    let step = model
        .time_step()
        .ok_or(PairingError::DegenerateTimeAxis(nsteps))?;
    let step_secs = duration_secs(step);
    if step_secs <= 0.0 {
        return Err(PairingError::NonIncreasingModelTime.into());
    }

    // The blend weights assume a near-uniform time axis; warn if the axis
    // drifts from the window derived from its first two steps.
    for (i, (t1, t2)) in model.times().iter().tuple_windows().enumerate() {
        let this_step = duration_secs(*t2 - *t1);
        if this_step <= 0.0 {
            return Err(PairingError::NonIncreasingModelTime.into());
        }
        if approx::relative_ne!(this_step, step_secs, max_relative = 0.01) {
            log::warn!(
                "model steps {i} to {} are {this_step} s apart, but blend weights use {step_secs} s",
                i + 1
            );
        }
    }

    let mut profile_arrays: Vec<(&str, &Array4<f64>)> = Vec::with_capacity(profile_vars.len());
    for &name in profile_vars {
        let arr = model
            .profile_var(name)
            .ok_or_else(|| PairingError::MissingModelVariable(name.to_string()))?;
        profile_arrays.push((name, arr));
    }
    let mut surface_arrays = Vec::with_capacity(surface_vars.len());
    for &name in surface_vars {
        let arr = model
            .surface_var(name)
            .ok_or_else(|| PairingError::MissingModelVariable(name.to_string()))?;
        surface_arrays.push((name, arr));
    }

    let nlev = profile_arrays
        .first()
        .map(|(_, arr)| arr.dim().1)
        .unwrap_or(0);
    let nscan = swath.n_scans();
    let nxtrack = swath.n_xtrack();
    let mut acc = BlendAccumulator::new(profile_vars, surface_vars, nlev, nscan, nxtrack);

    for (f, tm) in model.times().iter().enumerate() {
        let selected = select_scans(swath.times(), *tm, step_secs);
        if selected.is_empty() {
            log::debug!("model step {f} has no observations within {step_secs} s, skipping");
            continue;
        }

        let (dest_lat, dest_lon) = dest_points(swath, &selected);
        let op = regrid
            .build(model.latitude(), model.longitude(), &dest_lat, &dest_lon)
            .change_context_lazy(|| PairingError::Regrid { step: f })?;

        let contribs: Vec<Contribution> = selected
            .iter()
            .map(|&(_, dt)| contribution(f, nsteps, dt, step_secs))
            .collect();

        for &(name, arr) in profile_arrays.iter() {
            let snapshot = arr.index_axis(Axis(0), f);
            let regridded = op
                .regrid_profiles(snapshot)
                .change_context_lazy(|| PairingError::Regrid { step: f })?;
            for (k, (&(iscan, _), &contrib)) in selected.iter().zip(contribs.iter()).enumerate() {
                let chunk = regridded.slice(s![.., k * nxtrack..(k + 1) * nxtrack]);
                acc.blend_profile(name, iscan, contrib, chunk);
            }
        }

        for &(name, arr) in surface_arrays.iter() {
            let snapshot = arr.index_axis(Axis(0), f);
            let regridded = op
                .regrid_plane(snapshot)
                .change_context_lazy(|| PairingError::Regrid { step: f })?;
            for (k, (&(iscan, _), &contrib)) in selected.iter().zip(contribs.iter()).enumerate() {
                let chunk = regridded.slice(s![k * nxtrack..(k + 1) * nxtrack]);
                acc.blend_surface(name, iscan, contrib, chunk);
            }
        }
    }

    Ok(acc.into_fields())
}

/// Scans within one blend window of the model step, with their signed
/// offset (observation minus model, seconds).
fn select_scans(
    obs_times: &[DateTime<Utc>],
    tm: DateTime<Utc>,
    step_secs: f64,
) -> Vec<(usize, f64)> {
    obs_times
        .iter()
        .enumerate()
        .filter_map(|(n, to)| {
            let dt = duration_secs(*to - tm);
            if dt.abs() <= step_secs {
                Some((n, dt))
            } else {
                None
            }
        })
        .collect_vec()
}

fn dest_points(swath: &ObservationSwath, selected: &[(usize, f64)]) -> (Vec<f64>, Vec<f64>) {
    let nxtrack = swath.n_xtrack();
    let mut lats = Vec::with_capacity(selected.len() * nxtrack);
    let mut lons = Vec::with_capacity(selected.len() * nxtrack);
    for &(iscan, _) in selected {
        lats.extend(swath.latitude().slice(s![iscan, ..]).iter().copied());
        lons.extend(swath.longitude().slice(s![iscan, ..]).iter().copied());
    }
    (lats, lons)
}

/// The boundary policy: interior steps always accumulate their weighted
/// share, while the first/last step assigns full weight to observations
/// on the open side (there is no opposite neighbor to blend with). A
/// single-step model is both boundaries at once, so every selected scan
/// gets full weight.
fn contribution(f: usize, nsteps: usize, dt: f64, step_secs: f64) -> Contribution {
    if nsteps == 1 {
        Contribution::Assign
    } else if f == nsteps - 1 && dt >= 0.0 {
        Contribution::Assign
    } else if f == 0 && dt <= 0.0 {
        Contribution::Assign
    } else {
        Contribution::Weighted(1.0 - dt.abs() / step_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regrid::BilinearRegridder;
    use crate::test_utils::{constant_model, gradient_model, hourly_times, swath_at_times, utc};
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    fn blend(
        model: &ModelField,
        swath: &ObservationSwath,
    ) -> error_stack::Result<BlendedFields, PairingError> {
        blend_to_swath(&BilinearRegridder, model, swath, &["o3vmr", "dp_pa"], &[])
    }

    #[test]
    fn test_midway_observation_blends_half_and_half() {
        // model values change from 4 to 8 between the two steps bracketing
        // the observation, so an exact 0.5/0.5 blend gives 6
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = gradient_model(hourly_times(t0, 3), 2, &[4.0, 8.0, 100.0]);
        let swath = swath_at_times(vec![t0 + Duration::minutes(30)]);

        let blended = blend(&model, &swath).unwrap();
        let oz = &blended.profiles["o3vmr"];
        for &v in oz.iter() {
            assert_abs_diff_eq!(v, 6.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_boundary_scenario_weights_sum_to_one() {
        // steps at t=0,1,2 h and an observation at 0.25 h: 0.75 from step 0
        // and 0.25 from step 1
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = gradient_model(hourly_times(t0, 3), 2, &[4.0, 8.0, 100.0]);
        let swath = swath_at_times(vec![t0 + Duration::minutes(15)]);

        let blended = blend(&model, &swath).unwrap();
        let oz = &blended.profiles["o3vmr"];
        for &v in oz.iter() {
            assert_abs_diff_eq!(v, 0.75 * 4.0 + 0.25 * 8.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_observation_before_first_step_gets_full_weight() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = gradient_model(hourly_times(t0, 3), 2, &[4.0, 8.0, 100.0]);
        let swath = swath_at_times(vec![t0 - Duration::minutes(30)]);

        let blended = blend(&model, &swath).unwrap();
        for &v in blended.profiles["o3vmr"].iter() {
            assert_abs_diff_eq!(v, 4.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_observation_after_last_step_gets_full_weight() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = gradient_model(hourly_times(t0, 3), 2, &[4.0, 8.0, 100.0]);
        let swath = swath_at_times(vec![t0 + Duration::minutes(150)]);

        let blended = blend(&model, &swath).unwrap();
        for &v in blended.profiles["o3vmr"].iter() {
            assert_abs_diff_eq!(v, 100.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_single_step_model_is_a_pure_regrid() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model =
            constant_model(vec![t0], 2, 5.0, 1000.0).with_time_step(Duration::hours(1));
        // one scan inside the window (full weight 1), one outside (untouched)
        let swath = swath_at_times(vec![
            t0 + Duration::minutes(45),
            t0 + Duration::minutes(90),
        ]);

        let blended = blend(&model, &swath).unwrap();
        let oz = &blended.profiles["o3vmr"];
        for &v in oz.slice(s![.., 0, ..]).iter() {
            assert_abs_diff_eq!(v, 5.0, epsilon = 1e-12);
        }
        for &v in oz.slice(s![.., 1, ..]).iter() {
            assert_abs_diff_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_single_step_without_window_is_an_error() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = constant_model(vec![t0], 2, 5.0, 1000.0);
        let swath = swath_at_times(vec![t0]);

        let err = blend(&model, &swath).unwrap_err();
        assert!(matches!(
            err.current_context(),
            PairingError::DegenerateTimeAxis(1)
        ));
    }

    #[test]
    fn test_empty_window_leaves_neutral_fill() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = constant_model(hourly_times(t0, 3), 2, 5.0, 1000.0);
        // days away from the model time range
        let swath = swath_at_times(vec![t0 + Duration::days(10)]);

        let blended = blend(&model, &swath).unwrap();
        for &v in blended.profiles["o3vmr"].iter() {
            assert_abs_diff_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let model = constant_model(hourly_times(t0, 3), 2, 5.0, 1000.0);
        let swath = swath_at_times(vec![t0]);

        let err = blend_to_swath(&BilinearRegridder, &model, &swath, &["no2vmr"], &[])
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            PairingError::MissingModelVariable(_)
        ));
    }

    #[test]
    fn test_surface_variable_blending() {
        let t0 = utc(2023, 7, 1, 0, 0);
        let mut model = gradient_model(hourly_times(t0, 3), 2, &[4.0, 8.0, 100.0]);
        let surf = ndarray::Array3::from_shape_fn((3, 4, 4), |(it, _, _)| match it {
            0 => 90000.0,
            1 => 98000.0,
            _ => 101000.0,
        });
        model.add_surface_var("surfpres_pa", surf).unwrap();

        let swath = swath_at_times(vec![t0 + Duration::minutes(30)]);
        let blended = blend_to_swath(
            &BilinearRegridder,
            &model,
            &swath,
            &[],
            &["surfpres_pa"],
        )
        .unwrap();
        for &v in blended.surfaces["surfpres_pa"].iter() {
            assert_abs_diff_eq!(v, 94000.0, epsilon = 1e-9);
        }
    }
}
