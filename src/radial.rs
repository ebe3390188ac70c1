//! Radial profile of the PSF
//!
//! Sets up the radial and angular sampling of the diffraction integral and evaluates it
//! for a vector of z positions.

use std::f64::consts::{PI, SQRT_2};

use ndarray::{Array2, ArrayViewMut2};

use crate::{
    backend::Backend,
    integrator::{Simpson, SimpsonTable},
    objective::Optics,
    psf::{try_array, try_collect, PsfError},
};

/// Minimum number of aperture angle samples
pub const MIN_ANGLE_SAMPLES: usize = 60;

/// Constant component of the optical path difference
///
/// Folds the z independent mismatch between design and actual working distance,
/// coverslip and refractive indices for a point source at depth `zp` [m].
pub fn constant_opd(optics: &Optics, zp: f64) -> f64 {
    let &Optics {
        ng,
        ng0,
        ni,
        ni0,
        ns,
        ti0,
        tg,
        tg0,
        ..
    } = optics;
    zp * (1. - ni / ns) + ni * (tg0 / ng0 + ti0 / ni0 - tg / ng)
}

/// Radial and angular sampling of the diffraction integral
#[derive(Debug, Clone)]
pub struct RadialSampling {
    /// number of radius samples
    pub rmax: usize,
    /// radius samples [m]
    pub radius: Vec<f64>,
    /// Bessel argument scale `k r ni`
    pub const_j: Vec<f64>,
    /// constant OPD [m]
    pub ci: f64,
    /// point source depth [m]
    pub zp: f64,
    /// wave number [1/m]
    pub wave_num: f64,
    /// supersampling factor
    pub sf: usize,
    /// aperture angle step [rd]
    pub step: f64,
    /// aperture angle samples in `(0, half_angle]` [rd]
    pub theta: Vec<f64>,
}
impl RadialSampling {
    /// Creates the sampling for a `nx` pixels wide field
    ///
    /// `position` is the point source location `[x, y, z]`,
    /// `position`, `pixel_size` and `wavelength` are all in meters.
    pub fn new(
        optics: &Optics,
        nx: usize,
        position: [f64; 3],
        pixel_size: f64,
        wavelength: f64,
        sf: usize,
    ) -> Result<Self, PsfError> {
        let [x, y, zp] = position;
        let wave_num = 2. * PI / wavelength;

        // source offset in supersampled pixels
        let x_px = x * sf as f64 / pixel_size;
        let y_px = y * sf as f64 / pixel_size;
        let xymax = (nx * sf).saturating_sub(1) / 2;
        // rn = 1 + floor(offset), +1 for interpolation
        let rmax = (SQRT_2 * xymax as f64).ceil() + x_px.hypot(y_px).floor() + 2.;
        if !(rmax < usize::MAX as f64) {
            return Err(PsfError::Sampling {
                name: "radius",
                value: rmax,
            });
        }
        let rmax = rmax as usize;

        let radius = try_collect((0..rmax).map(|i| i as f64 * pixel_size / sf as f64))?;
        let const_j = try_collect(radius.iter().map(|r| wave_num * r * optics.ni))?;
        let max_const_j = const_j.iter().cloned().fold(0f64, f64::max);

        let cycles = (optics.half_angle * max_const_j / PI).floor();
        if !(cycles < (usize::MAX / 4 - 1) as f64) {
            return Err(PsfError::Sampling {
                name: "aperture angle",
                value: 4. * (1. + cycles),
            });
        }
        let n_samples = (4 * (1 + cycles as usize)).max(MIN_ANGLE_SAMPLES);
        let step = optics.half_angle / n_samples as f64;
        let theta = try_collect((0..n_samples).map(|j| (j + 1) as f64 * step))?;

        let this = Self {
            rmax,
            radius,
            const_j,
            ci: constant_opd(optics, zp),
            zp,
            wave_num,
            sf,
            step,
            theta,
        };
        log::debug!(
            "radial sampling: {} radii, {} angles (step: {:.3e}rd)",
            this.rmax,
            this.n_samples(),
            this.step
        );
        Ok(this)
    }
    /// Number of aperture angle samples
    pub fn n_samples(&self) -> usize {
        self.theta.len()
    }
    /// Quadrature normalization factor
    pub fn scale(&self) -> f64 {
        8. * PI / 3. * (self.step / (3. * self.sf as f64)).powi(2)
    }
    /// Precomputes the z independent Simpson table
    ///
    /// The table is shared by all the z positions of a PSF,
    /// see [`RadialSampling::profile_with`].
    pub fn tabulate<B: Backend>(
        &self,
        optics: &Optics,
        backend: &B,
    ) -> Result<SimpsonTable, PsfError> {
        Simpson::new(optics, &self.theta, &self.const_j, self.wave_num)
            .phase_offset(self.ci, self.zp)
            .tabulate(backend)
    }
    /// Radial profile for the z positions `zv` [m], shape `(|zv|, rmax)`
    pub fn profile<B: Backend>(
        &self,
        optics: &Optics,
        zv: &[f64],
        backend: &B,
    ) -> Result<Array2<f64>, PsfError> {
        let table = self.tabulate(optics, backend)?;
        self.profile_with(&table, zv, backend)
    }
    /// Radial profile for the z positions `zv` [m] from a table built with
    /// [`RadialSampling::tabulate`]
    pub fn profile_with<B: Backend>(
        &self,
        table: &SimpsonTable,
        zv: &[f64],
        backend: &B,
    ) -> Result<Array2<f64>, PsfError> {
        let mut profile = try_array((zv.len(), self.rmax), 0f64)?;
        self.profile_into(table, zv, profile.view_mut(), backend);
        Ok(profile)
    }
    pub(crate) fn profile_into<B: Backend>(
        &self,
        table: &SimpsonTable,
        zv: &[f64],
        mut out: ArrayViewMut2<'_, f64>,
        backend: &B,
    ) {
        table.integrate_into(zv, out.view_mut(), backend);
        let scale = self.scale();
        out.mapv_inplace(|x| x * scale);
    }
}

/// Radial profile of the PSF
///
/// `zv`, `position`, `pixel_size` and `wavelength` are in meters,
/// the profile has shape `(|zv|, rmax)`.
#[allow(clippy::too_many_arguments)]
pub fn vectorial_rz<B: Backend>(
    optics: &Optics,
    zv: &[f64],
    nx: usize,
    position: [f64; 3],
    pixel_size: f64,
    wavelength: f64,
    sf: usize,
    backend: &B,
) -> Result<Array2<f64>, PsfError> {
    RadialSampling::new(optics, nx, position, pixel_size, wavelength, sf)?.profile(
        optics, zv, backend,
    )
}
