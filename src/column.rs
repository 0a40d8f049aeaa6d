//! Column integration: mixing-ratio profiles plus pressure-layer
//! thicknesses summed into Dobson-unit columns.

use ndarray::{Array2, Array3, Array4, ArrayView1, Axis, Zip};

use crate::error::DimensionError;
use crate::units::{DU_FACTOR, PA_PER_HPA};

/// Integrate a single ppb mixing-ratio profile over its Pa layer
/// thicknesses. NaN layers contribute nothing, so partially-filled
/// profiles still yield the column of their valid layers.
pub fn integrate_profile(vmr_ppb: ArrayView1<f64>, dp_pa: ArrayView1<f64>) -> f64 {
    vmr_ppb
        .iter()
        .zip(dp_pa.iter())
        .map(|(&vmr, &dp)| DU_FACTOR * (dp / PA_PER_HPA) * vmr)
        .filter(|layer| !layer.is_nan())
        .sum()
}

/// Column for every pixel of time-blended (level, scan, cross-track)
/// buffers, as produced by the space/time blending step.
pub fn integrate_blended(vmr_ppb: &Array3<f64>, dp_pa: &Array3<f64>) -> Array2<f64> {
    let (nlev, nscan, nxtrack) = vmr_ppb.dim();
    debug_assert_eq!(vmr_ppb.dim(), dp_pa.dim());

    let mut col = Array2::zeros((nscan, nxtrack));
    for ilev in 0..nlev {
        Zip::from(&mut col)
            .and(vmr_ppb.index_axis(Axis(0), ilev))
            .and(dp_pa.index_axis(Axis(0), ilev))
            .for_each(|c, &vmr, &dp| {
                let layer = DU_FACTOR * (dp / PA_PER_HPA) * vmr;
                if !layer.is_nan() {
                    *c += layer;
                }
            });
    }
    col
}

/// Column at every model time step and grid cell, for pairing against
/// gridded (L3) products.
pub fn integrate_model_series(
    vmr_ppb: &Array4<f64>,
    dp_pa: &Array4<f64>,
) -> Result<Array3<f64>, DimensionError> {
    if vmr_ppb.dim() != dp_pa.dim() {
        return Err(DimensionError::bad_shape(
            "layer thickness",
            format!("{:?}", vmr_ppb.dim()),
            format!("{:?}", dp_pa.dim()),
        ));
    }

    let (nt, nlev, ny, nx) = vmr_ppb.dim();
    let mut col = Array3::zeros((nt, ny, nx));
    for it in 0..nt {
        let mut plane = col.index_axis_mut(Axis(0), it);
        for ilev in 0..nlev {
            Zip::from(&mut plane)
                .and(vmr_ppb.index_axis(Axis(0), it).index_axis(Axis(0), ilev))
                .and(dp_pa.index_axis(Axis(0), it).index_axis(Axis(0), ilev))
                .for_each(|c, &vmr, &dp| {
                    let layer = DU_FACTOR * (dp / PA_PER_HPA) * vmr;
                    if !layer.is_nan() {
                        *c += layer;
                    }
                });
        }
    }
    Ok(col)
}
