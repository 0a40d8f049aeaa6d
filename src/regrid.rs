//! Bilinear regridding from a rectilinear model grid onto arbitrary
//! destination points (swath pixels or a flattened coarser grid).

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayView3};

#[derive(Debug, thiserror::Error)]
pub enum RegridError {
    #[error("Source {axis} axis needs at least 2 points, got {len}")]
    SourceAxisTooShort { axis: &'static str, len: usize },
    #[error("Source {axis} axis is not strictly monotonic")]
    NonMonotonicAxis { axis: &'static str },
    #[error("Destination latitude and longitude have different lengths ({n_lat} vs {n_lon})")]
    DestinationLengthMismatch { n_lat: usize, n_lon: usize },
    #[error("Field has shape ({ny}, {nx}) but the operator was built for a ({op_ny}, {op_nx}) source grid")]
    FieldShapeMismatch {
        ny: usize,
        nx: usize,
        op_ny: usize,
        op_nx: usize,
    },
}

/// Capability to build a horizontal regridding operator from a rectilinear
/// source grid (1-D latitude and longitude axes) to a list of destination
/// points.
///
/// The operator is cheap to apply repeatedly, so the pairing code rebuilds
/// it once per model time step (the destination point set changes with each
/// time bracket) and applies it to every requested variable at that step.
pub trait SpatialRegrid {
    fn build(
        &self,
        src_lat: ArrayView1<f64>,
        src_lon: ArrayView1<f64>,
        dest_lat: &[f64],
        dest_lon: &[f64],
    ) -> Result<Box<dyn RegridOperator>, RegridError>;
}

/// A prepared interpolation operator for one (source grid, destination
/// points) pairing.
pub trait RegridOperator {
    fn n_dest(&self) -> usize;

    /// Regrid one horizontal snapshot, shaped (lat, lon), to a vector of
    /// destination-point values.
    fn regrid_plane(&self, field: ArrayView2<f64>) -> Result<Array1<f64>, RegridError>;

    /// Regrid a stack of levels, shaped (level, lat, lon), to a
    /// (level, destination point) array.
    fn regrid_profiles(&self, field: ArrayView3<f64>) -> Result<Array2<f64>, RegridError>;
}

/// The built-in bilinear implementation of [`SpatialRegrid`].
///
/// Each destination value is the weighted sum of the four surrounding
/// source nodes. Destination points outside the source domain clamp to the
/// boundary cell (nearest-edge extrapolation); callers that need a
/// different edge policy should inject their own [`SpatialRegrid`].
#[derive(Debug, Default)]
pub struct BilinearRegridder;

impl SpatialRegrid for BilinearRegridder {
    fn build(
        &self,
        src_lat: ArrayView1<f64>,
        src_lon: ArrayView1<f64>,
        dest_lat: &[f64],
        dest_lon: &[f64],
    ) -> Result<Box<dyn RegridOperator>, RegridError> {
        if dest_lat.len() != dest_lon.len() {
            return Err(RegridError::DestinationLengthMismatch {
                n_lat: dest_lat.len(),
                n_lon: dest_lon.len(),
            });
        }

        let lat_axis = AxisLocator::new("latitude", src_lat)?;
        let lon_axis = AxisLocator::new("longitude", src_lon)?;

        let points = dest_lat
            .iter()
            .zip(dest_lon.iter())
            .map(|(&lat, &lon)| {
                let (iy, fy) = lat_axis.locate(lat);
                let (ix, fx) = lon_axis.locate(lon);
                DestPoint { iy, ix, fy, fx }
            })
            .collect();

        Ok(Box::new(BilinearOperator {
            ny: src_lat.len(),
            nx: src_lon.len(),
            points,
        }))
    }
}

/// One destination point's position within the source grid: the index of
/// the lower-left node and the fractional offsets toward the next node.
struct DestPoint {
    iy: usize,
    ix: usize,
    fy: f64,
    fx: f64,
}

struct BilinearOperator {
    ny: usize,
    nx: usize,
    points: Vec<DestPoint>,
}

impl BilinearOperator {
    fn sample(&self, field: &ArrayView2<f64>, p: &DestPoint) -> f64 {
        let v11 = field[(p.iy, p.ix)];
        let v12 = field[(p.iy, p.ix + 1)];
        let v21 = field[(p.iy + 1, p.ix)];
        let v22 = field[(p.iy + 1, p.ix + 1)];

        let v1 = v11 * (1.0 - p.fx) + v12 * p.fx;
        let v2 = v21 * (1.0 - p.fx) + v22 * p.fx;
        v1 * (1.0 - p.fy) + v2 * p.fy
    }

    fn check_shape(&self, ny: usize, nx: usize) -> Result<(), RegridError> {
        if ny != self.ny || nx != self.nx {
            return Err(RegridError::FieldShapeMismatch {
                ny,
                nx,
                op_ny: self.ny,
                op_nx: self.nx,
            });
        }
        Ok(())
    }
}

impl RegridOperator for BilinearOperator {
    fn n_dest(&self) -> usize {
        self.points.len()
    }

    fn regrid_plane(&self, field: ArrayView2<f64>) -> Result<Array1<f64>, RegridError> {
        let (ny, nx) = field.dim();
        self.check_shape(ny, nx)?;

        let mut out = Array1::zeros(self.points.len());
        for (k, p) in self.points.iter().enumerate() {
            out[k] = self.sample(&field, p);
        }
        Ok(out)
    }

    fn regrid_profiles(&self, field: ArrayView3<f64>) -> Result<Array2<f64>, RegridError> {
        let (nlev, ny, nx) = field.dim();
        self.check_shape(ny, nx)?;

        let mut out = Array2::zeros((nlev, self.points.len()));
        for (ilev, plane) in field.outer_iter().enumerate() {
            for (k, p) in self.points.iter().enumerate() {
                out[(ilev, k)] = self.sample(&plane, p);
            }
        }
        Ok(out)
    }
}

/// Locates values along one monotonic source axis, returning the lower
/// segment index and the fractional position within that segment. Values
/// beyond either end clamp to the end segment.
struct AxisLocator {
    coords: Vec<f64>,
    descending: bool,
}

impl AxisLocator {
    fn new(axis: &'static str, values: ArrayView1<f64>) -> Result<Self, RegridError> {
        if values.len() < 2 {
            return Err(RegridError::SourceAxisTooShort {
                axis,
                len: values.len(),
            });
        }

        let mut coords: Vec<f64> = values.iter().copied().collect();
        let ascending = coords.windows(2).all(|w| w[1] > w[0]);
        let descending = coords.windows(2).all(|w| w[1] < w[0]);
        if !ascending && !descending {
            return Err(RegridError::NonMonotonicAxis { axis });
        }

        if descending {
            coords.reverse();
        }
        Ok(Self { coords, descending })
    }

    fn locate(&self, v: f64) -> (usize, f64) {
        let c = &self.coords;
        let n = c.len();

        let (i, frac) = if v <= c[0] {
            (0, 0.0)
        } else if v >= c[n - 1] {
            (n - 2, 1.0)
        } else {
            let i = (c.partition_point(|&x| x <= v) - 1).min(n - 2);
            (i, (v - c[i]) / (c[i + 1] - c[i]))
        };

        if self.descending {
            (n - 2 - i, 1.0 - frac)
        } else {
            (i, frac)
        }
    }
}
