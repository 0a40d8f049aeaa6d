//! Averaging-kernel application: blend the retrieval's apriori column
//! with the model-informed column, weighted per layer by how strongly the
//! sensor actually constrains that layer.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, Axis, Zip};

use crate::fields::ObservationSwath;
use crate::units::{DU_FACTOR, PA_PER_HPA};

use super::PairingError;

/// Pressure-thickness band for each observation level (hPa).
///
/// Levels are surface-first with pressure decreasing by index. Interior
/// bands are centered half-widths; the surface band is the half-width
/// toward the next level up (the surface-pressure correction is applied
/// per pixel in [`apply_averaging_kernel`]); the topmost band extends to
/// 0 hPa. The retrieval defines the band vector exactly this way, so the
/// formula is preserved as-is.
pub(crate) fn pressure_bands(levels_hpa: ArrayView1<f64>) -> Result<Array1<f64>, PairingError> {
    let nlev = levels_hpa.len();
    if nlev < 2 {
        return Err(PairingError::TooFewObsLevels(nlev));
    }

    let p = levels_hpa;
    let mut band = Array1::zeros(nlev);
    for i in 1..nlev - 1 {
        band[i] = (p[i - 1] - p[i]) / 2.0 + (p[i] - p[i + 1]) / 2.0;
    }
    band[0] = (p[0] - p[1]) / 2.0;
    band[nlev - 1] = (p[nlev - 2] - p[nlev - 1]) / 2.0 + p[nlev - 1];
    Ok(band)
}

/// Combine the resampled model profile with the swath's apriori and layer
/// efficiency into the observation-equivalent column.
///
/// `model_on_levels` is (level, scan, cross-track) on the swath's pressure
/// levels (ppb); `surface_pres_pa` is the blended model surface pressure.
/// Pixels whose accumulated surface pressure is exactly zero were never
/// covered by a regrid; they are set NaN before the surface-layer
/// correction so their columns come out invalid rather than silently
/// wrong.
pub(crate) fn apply_averaging_kernel(
    swath: &ObservationSwath,
    model_on_levels: &Array3<f64>,
    surface_pres_pa: &Array2<f64>,
) -> error_stack::Result<Array2<f64>, PairingError> {
    let apriori = swath
        .apriori()
        .ok_or(PairingError::MissingKernelData("apriori"))?;
    let efficiency = swath
        .efficiency()
        .ok_or(PairingError::MissingKernelData("layer efficiency"))?;

    let p = swath.pressure();
    let band = pressure_bands(p.view())?;
    let nlev = p.len();
    debug_assert_eq!(
        model_on_levels.dim(),
        (nlev, swath.n_scans(), swath.n_xtrack())
    );

    let sfc_hpa = surface_pres_pa.mapv(|v| if v == 0.0 { f64::NAN } else { v / PA_PER_HPA });

    let mut column = Array2::zeros((swath.n_scans(), swath.n_xtrack()));
    for i in 0..nlev {
        let oz_i = model_on_levels.index_axis(Axis(0), i);
        let ap_i = apriori.slice(s![.., .., i]);
        let eff_i = efficiency.slice(s![.., .., i]);

        if i == 0 {
            // surface-adjacent level: the band grows by the distance from
            // the model surface pressure down to this level
            Zip::from(&mut column)
                .and(&sfc_hpa)
                .and(oz_i)
                .and(ap_i)
                .and(eff_i)
                .for_each(|c, &sfc, &oz, &ap, &eff| {
                    let dp = (sfc - p[0]).abs() + band[0];
                    *c += ap * (1.0 - eff) + eff * (DU_FACTOR * dp * oz);
                });
        } else {
            let dp = band[i];
            Zip::from(&mut column)
                .and(oz_i)
                .and(ap_i)
                .and(eff_i)
                .for_each(|c, &oz, &ap, &eff| {
                    *c += ap * (1.0 - eff) + eff * (DU_FACTOR * dp * oz);
                });
        }
    }

    Ok(column)
}
