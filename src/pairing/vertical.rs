//! Resampling of blended model profiles onto the observation's own
//! pressure levels.

use error_stack::ResultExt;
use itertools::Itertools;
use ndarray::{Array3, ArrayView1};

use crate::interpolation::ProfileInterp;
use crate::units::PA_PER_HPA;

use super::PairingError;

/// Interpolate the blended model mixing-ratio profiles onto the
/// observation's fixed pressure levels (hPa), pixel by pixel.
///
/// The blended buffers are surface-first (level 0 nearest the surface), so
/// both profiles are reversed to make pressure strictly increase with
/// index before interpolation. Targets outside the model's pressure range
/// come back as the missing value and are zero-filled, matching the
/// neutral fill of the blending buffers. Pixels never covered by any time
/// bracket still hold all-zero pressures, which are not a usable
/// coordinate; those pixels short-circuit to zeros.
pub(crate) fn resample_to_obs_levels(
    interp: &dyn ProfileInterp,
    vmr: &Array3<f64>,
    pres_pa: &Array3<f64>,
    levels_hpa: ArrayView1<f64>,
) -> error_stack::Result<Array3<f64>, PairingError> {
    debug_assert_eq!(vmr.dim(), pres_pa.dim());
    let (nlev_m, nscan, nxtrack) = vmr.dim();
    let targets = levels_hpa.iter().copied().collect_vec();

    let mut out = Array3::zeros((targets.len(), nscan, nxtrack));
    let mut coords = vec![0.0; nlev_m];
    let mut values = vec![0.0; nlev_m];

    for iscan in 0..nscan {
        for ix in 0..nxtrack {
            for k in 0..nlev_m {
                coords[k] = pres_pa[(nlev_m - 1 - k, iscan, ix)] / PA_PER_HPA;
                values[k] = vmr[(nlev_m - 1 - k, iscan, ix)];
            }

            if coords.iter().all(|&p| p == 0.0) {
                log::trace!("pixel ({iscan}, {ix}) was never covered, leaving zeros");
                continue;
            }

            let profile = interp
                .interp_profile(&coords, &values, &targets, f64::NAN)
                .change_context_lazy(|| PairingError::VerticalInterp {
                    scan: iscan,
                    xtrack: ix,
                })?;
            for (ilev, v) in profile.into_iter().enumerate() {
                out[(ilev, iscan, ix)] = if v.is_nan() { 0.0 } else { v };
            }
        }
    }

    Ok(out)
}
