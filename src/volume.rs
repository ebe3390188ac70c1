//! Radial profile to 3D volume
//!
//! The PSF is radially symmetric around the point source, each z-slice of the volume
//! is interpolated from the matching row of the radial profile.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut3, Zip};

use crate::{
    backend::Backend,
    psf::{try_array, PsfError},
};

/// Distance of each pixel of a `(ny, nx)` grid to the grid center shifted by `offset = (dy, dx)`
pub fn radius_map(shape: (usize, usize), offset: (f64, f64)) -> Array2<f64> {
    let (ny, nx) = shape;
    let (dy, dx) = offset;
    let yc = (ny as f64 - 1.) / 2. + dy;
    let xc = (nx as f64 - 1.) / 2. + dx;
    Array2::from_shape_fn(shape, |(i, j)| (i as f64 - yc).hypot(j as f64 - xc))
}

/// Linear interpolation of `row` at the fractional index `coord`
///
/// Coordinates beyond the last sample are clamped to the last sample value,
/// negative coordinates to the first one.
pub fn interp_linear(row: ArrayView1<'_, f64>, coord: f64) -> f64 {
    let n = row.len();
    match n {
        0 => f64::NAN,
        1 => row[0],
        _ => {
            let last = (n - 1) as f64;
            if coord <= 0. {
                row[0]
            } else if coord >= last {
                row[n - 1]
            } else {
                let i = coord.floor() as usize;
                let t = coord - i as f64;
                row[i] * (1. - t) + row[i + 1] * t
            }
        }
    }
}

/// Expands the `(nz, nr)` radial profile `rz` into a `(nz, ny, nx)` volume
///
/// The profile radius is sampled `sf` times finer than the volume pixels,
/// `offset = (dy, dx)` is the lateral point source offset in pixels.
pub fn rz_to_xyz<B: Backend>(
    rz: ArrayView2<'_, f64>,
    shape: (usize, usize),
    sf: usize,
    offset: (f64, f64),
    backend: &B,
) -> Result<Array3<f64>, PsfError> {
    let (ny, nx) = shape;
    let mut volume = try_array((rz.nrows(), ny, nx), 0f64)?;
    rz_to_xyz_into(rz, sf, offset, volume.view_mut(), backend);
    Ok(volume)
}

/// Same as [`rz_to_xyz`] writing into `out`, the xy shape is given by `out`
pub(crate) fn rz_to_xyz_into<B: Backend>(
    rz: ArrayView2<'_, f64>,
    sf: usize,
    offset: (f64, f64),
    out: ArrayViewMut3<'_, f64>,
    backend: &B,
) {
    let (nz, ny, nx) = out.dim();
    assert_eq!(nz, rz.nrows());
    let rmap = radius_map((ny, nx), offset) * sf as f64;
    backend.for_each_lane(out, |k, plane| {
        let row = rz.row(k);
        Zip::from(plane)
            .and(&rmap)
            .for_each(|v, &r| *v = interp_linear(row, r));
    });
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array1};

    use super::*;
    use crate::backend::{Rayon, Serial};

    #[test]
    fn radius_map_centered() {
        let rmap = radius_map((3, 3), (0., 0.));
        assert_eq!(rmap[[1, 1]], 0.);
        assert_eq!(rmap[[0, 1]], 1.);
        assert_eq!(rmap[[0, 0]], 2f64.sqrt());
        let rmap = radius_map((4, 4), (0., 0.));
        assert_eq!(rmap[[1, 1]], 0.5f64.hypot(0.5));
    }

    #[test]
    fn radius_map_offset() {
        let rmap = radius_map((5, 7), (1., -2.));
        // center at (3, 1)
        assert_eq!(rmap[[3, 1]], 0.);
        assert_eq!(rmap[[3, 4]], 3.);
    }

    #[test]
    fn interpolation() {
        let row = array![0., 1., 4., 9.];
        assert_eq!(interp_linear(row.view(), 0.), 0.);
        assert_eq!(interp_linear(row.view(), 1.5), 2.5);
        assert_eq!(interp_linear(row.view(), 2.25), 5.25);
        assert_eq!(interp_linear(row.view(), 3.), 9.);
    }

    #[test]
    fn interpolation_clamps_to_edge() {
        let row = array![3., 2., 1.];
        assert_eq!(interp_linear(row.view(), 2.5), 1.);
        assert_eq!(interp_linear(row.view(), 1e9), 1.);
        assert_eq!(interp_linear(row.view(), -0.5), 3.);
        assert_eq!(interp_linear(array![7.].view(), 4.2), 7.);
        assert!(interp_linear(Array1::zeros(0).view(), 0.).is_nan());
    }

    #[test]
    fn expand_profile() {
        // intensity equals the radius in supersampled units
        let rz = Array2::from_shape_fn((2, 20), |(k, i)| (k + 1) as f64 * i as f64);
        let volume = rz_to_xyz(rz.view(), (5, 5), 2, (0., 0.), &Serial).unwrap();
        assert_eq!(volume.dim(), (2, 5, 5));
        assert_eq!(volume[[0, 2, 2]], 0.);
        assert_eq!(volume[[0, 2, 4]], 4.);
        assert_eq!(volume[[1, 0, 2]], 8.);
        assert!((volume[[0, 0, 0]] - 2. * 8f64.sqrt()).abs() < 1e-12);
        assert_eq!(volume, rz_to_xyz(rz.view(), (5, 5), 2, (0., 0.), &Rayon).unwrap());
    }

    #[test]
    fn expand_beyond_profile() {
        let rz = Array2::from_shape_fn((1, 3), |(_, i)| 10. - i as f64);
        let volume = rz_to_xyz(rz.view(), (9, 9), 1, (0., 0.), &Serial).unwrap();
        assert_eq!(volume[[0, 4, 4]], 10.);
        assert_eq!(volume[[0, 0, 0]], 8.);
        assert_eq!(volume[[0, 4, 8]], 8.);
    }
}
