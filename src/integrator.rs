//! Radial field integrator
//!
//! Simpson quadrature of the vectorial diffraction integral over the objective aperture
//! for every (z, r) pair.

use itertools::izip;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};
use num_complex::Complex64;

use crate::{
    backend::Backend,
    bessel,
    objective::Optics,
    psf::{try_array, try_collect, PsfError},
};

/// Simpson weights 4, 2, 4, 2, ..., 1
///
/// The last weight is always 1 whatever the parity of `n`,
/// the 1/3 step factor is applied by the caller.
pub fn simpson_weights(n: usize) -> Vec<f64> {
    let mut weights: Vec<f64> = (0..n)
        .map(|j| if j % 2 == 0 { 4. } else { 2. })
        .collect();
    if let Some(last) = weights.last_mut() {
        *last = 1.;
    }
    weights
}

/// Principal square root of a possibly negative real number
///
/// Beyond the critical angle the radicand is negative and the root is imaginary (evanescent wave).
#[inline]
fn csqrt(x: f64) -> Complex64 {
    Complex64::new(x, 0.).sqrt()
}

/// z independent terms of the integrand at a given aperture angle
#[derive(Debug, Clone, Copy)]
struct Angle {
    sin: f64,
    cos: f64,
    /// OPD terms that depend only on the angle
    opd: Complex64,
    /// s and p transmission weighting of the 3 Bessel channels
    transmission: [Complex64; 3],
}
impl Angle {
    fn new(optics: &Optics, theta: f64, zp: f64) -> Self {
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
        let (sin, cos) = theta.sin_cos();
        let ni2sin2 = ni * ni * sin * sin;
        let nsroot = csqrt(ns * ns - ni2sin2);
        let ngroot = csqrt(ng * ng - ni2sin2);
        let opd = zp * nsroot + tg * ngroot
            - tg0 * csqrt(ng0 * ng0 - ni2sin2)
            - ti0 * csqrt(ni0 * ni0 - ni2sin2);

        let t = 4. * ni * cos * ngroot;
        let tp1tp2 = t / ((ng * cos + ni / ng * ngroot) * (ns / ng * ngroot + ng / ns * nsroot));
        let ts1ts2 = t / ((ni * cos + ngroot) * (ngroot + nsroot));
        let transmission = [
            ts1ts2 + tp1tp2 / ns * nsroot,
            tp1tp2 * ni / ns * sin,
            ts1ts2 - tp1tp2 / ns * nsroot,
        ];
        Self {
            sin,
            cos,
            opd,
            transmission,
        }
    }
}

/// Simpson quadrature of the diffraction integral
///
/// The aperture angles `theta` must lie in `(0, half_angle]`, `const_j` is the Bessel argument
/// scale `k r ni` for each radius and `ci` the constant OPD offset.
#[derive(Debug)]
pub struct Simpson<'a> {
    optics: &'a Optics,
    theta: &'a [f64],
    const_j: &'a [f64],
    wave_num: f64,
    ci: f64,
    zp: f64,
}
impl<'a> Simpson<'a> {
    pub fn new(optics: &'a Optics, theta: &'a [f64], const_j: &'a [f64], wave_num: f64) -> Self {
        Self {
            optics,
            theta,
            const_j,
            wave_num,
            ci: 0.,
            zp: 0.,
        }
    }
    /// Sets the constant OPD offset `ci` and the point source depth `zp` [m]
    pub fn phase_offset(self, ci: f64, zp: f64) -> Self {
        Self { ci, zp, ..self }
    }
    /// Precomputes the z independent part of the integrand
    ///
    /// The table holds the weighted and transmission scaled J0, J1 and J2 channels
    /// for every radius and aperture angle, it is reused for any number of z positions.
    pub fn tabulate<B: Backend>(&self, backend: &B) -> Result<SimpsonTable, PsfError> {
        #[cfg(test)]
        TABULATIONS.with(|n| n.set(n.get() + 1));
        let angles = try_collect(
            self.theta
                .iter()
                .map(|&theta| Angle::new(self.optics, theta, self.zp)),
        )?;
        let weights = simpson_weights(angles.len());
        let mut amplitudes = try_array(
            (self.const_j.len(), angles.len()),
            [Complex64::default(); 3],
        )?;
        log::debug!(
            "Simpson table: {} radii x {} angles",
            amplitudes.nrows(),
            amplitudes.ncols()
        );
        backend.for_each_lane(amplitudes.view_mut(), |i, mut row| {
            let const_j = self.const_j[i];
            for (a, angle, w) in izip!(row.iter_mut(), &angles, &weights) {
                let x = const_j * angle.sin;
                let scale = w * angle.sin * angle.cos.sqrt();
                let b0 = scale * bessel::j0(x);
                let b1 = scale * bessel::j1(x);
                // J2 = 2 J1(x)/x - J0(x) is 0/0 on the optical axis, its limit is 0
                let b2 = if const_j == 0. { 0. } else { 2. * b1 / x - b0 };
                let [t0, t1, t2] = angle.transmission;
                *a = [t0 * b0, t1 * b1, t2 * b2];
            }
        });
        Ok(SimpsonTable {
            ni: self.optics.ni,
            wave_num: self.wave_num,
            ci: self.ci,
            angles,
            amplitudes,
        })
    }
    /// Integrates for every z in `zv` [m] and returns the intensity with shape `(|zv|, |r|)`
    pub fn integrate<B: Backend>(
        &self,
        zv: &[f64],
        backend: &B,
    ) -> Result<Array2<f64>, PsfError> {
        self.tabulate(backend)?.integrate(zv, backend)
    }
}

#[cfg(test)]
thread_local! {
    /// Number of tables built on the current thread
    pub(crate) static TABULATIONS: std::cell::Cell<usize> = const { std::cell::Cell::new(0) };
}

/// z independent terms of the Simpson quadrature
#[derive(Debug, Clone)]
pub struct SimpsonTable {
    ni: f64,
    wave_num: f64,
    ci: f64,
    angles: Vec<Angle>,
    amplitudes: Array2<[Complex64; 3]>,
}
impl SimpsonTable {
    /// Weighted J0, J1 and J2 channels, shape `(|r|, |theta|)`
    pub fn amplitudes(&self) -> ArrayView2<'_, [Complex64; 3]> {
        self.amplitudes.view()
    }
    /// Integrates for every z in `zv` [m] and returns the intensity with shape `(|zv|, |r|)`
    pub fn integrate<B: Backend>(
        &self,
        zv: &[f64],
        backend: &B,
    ) -> Result<Array2<f64>, PsfError> {
        let mut intensity = try_array((zv.len(), self.amplitudes.nrows()), 0f64)?;
        self.integrate_into(zv, intensity.view_mut(), backend);
        Ok(intensity)
    }
    /// Same as [`SimpsonTable::integrate`] writing into `out`
    pub(crate) fn integrate_into<B: Backend>(
        &self,
        zv: &[f64],
        out: ArrayViewMut2<'_, f64>,
        backend: &B,
    ) {
        assert_eq!(out.dim(), (zv.len(), self.amplitudes.nrows()));
        let i_k = Complex64::new(0., self.wave_num);
        backend.for_each_lane(out, |k, mut row| {
            let z = zv[k];
            let exp_w: Vec<Complex64> = self
                .angles
                .iter()
                .map(|angle| (i_k * (self.ni * (self.ci - z) * angle.cos + angle.opd)).exp())
                .collect();
            for (value, channels) in row.iter_mut().zip(self.amplitudes.outer_iter()) {
                let [s0, s1, s2] = channels.iter().zip(&exp_w).fold(
                    [Complex64::default(); 3],
                    |[s0, s1, s2], ([a0, a1, a2], &w)| [s0 + w * a0, s1 + w * a1, s2 + w * a2],
                );
                *value = s0.norm_sqr() + 2. * s1.norm_sqr() + s2.norm_sqr();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;

    use super::*;
    use crate::{backend::Serial, objective::Objective, radial::constant_opd};

    fn setup(objective: Objective, n: usize) -> (Optics, Vec<f64>, Vec<f64>, f64) {
        let optics = objective.optics().unwrap();
        let wave_num = 2. * PI / 0.6e-6;
        let step = optics.half_angle / n as f64;
        let theta: Vec<f64> = (1..=n).map(|j| j as f64 * step).collect();
        let const_j: Vec<f64> = (0..40)
            .map(|i| wave_num * i as f64 * 0.05e-6 / 3. * optics.ni)
            .collect();
        (optics, theta, const_j, wave_num)
    }

    #[test]
    fn weights() {
        assert_eq!(simpson_weights(1), vec![1.]);
        assert_eq!(simpson_weights(4), vec![4., 2., 4., 1.]);
        assert_eq!(simpson_weights(5), vec![4., 2., 4., 2., 1.]);
        assert!(simpson_weights(0).is_empty());
    }

    #[test]
    fn j2_channel_vanishes_on_axis() {
        let (optics, theta, const_j, wave_num) = setup(Objective::default(), 60);
        let table = Simpson::new(&optics, &theta, &const_j, wave_num)
            .tabulate(&Serial)
            .unwrap();
        let amplitudes = table.amplitudes();
        assert!(amplitudes.row(0).iter().all(|a| a[2] == Complex64::default()));
        assert!(amplitudes.row(0).iter().all(|a| a[1] == Complex64::default()));
        assert!(amplitudes.row(1).iter().any(|a| a[2].norm() > 0.));
    }

    #[test]
    fn beyond_critical_angle() {
        // ns < NA: part of the aperture is evanescent in the specimen
        let objective = Objective::default().specimen_ri(1.33);
        let (optics, theta, const_j, wave_num) = setup(objective, 60);
        let critical = (1.33 / optics.ni).asin();
        assert!(theta.iter().any(|&t| t > critical));
        let zv: Vec<f64> = (-10..=10).map(|i| i as f64 * 0.2e-6).collect();
        let intensity = Simpson::new(&optics, &theta, &const_j, wave_num)
            .phase_offset(constant_opd(&optics, 1e-6), 1e-6)
            .integrate(&zv, &Serial)
            .unwrap();
        assert_eq!(intensity.dim(), (21, 40));
        assert!(intensity.iter().all(|x| x.is_finite() && *x >= 0.));
    }

    #[test]
    fn on_axis_intensity_peaks_at_focus() {
        let objective = Objective::default().specimen_ri(1.515);
        let (optics, theta, const_j, wave_num) = setup(objective, 60);
        let zv: Vec<f64> = (-20..=20).map(|i| i as f64 * 0.1e-6).collect();
        let intensity = Simpson::new(&optics, &theta, &const_j, wave_num)
            .phase_offset(constant_opd(&optics, 0.), 0.)
            .integrate(&zv, &Serial)
            .unwrap();
        let column = intensity.column(0);
        let (k_max, _) = column
            .iter()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |(k, m), (i, &x)| {
                if x > m {
                    (i, x)
                } else {
                    (k, m)
                }
            });
        assert_eq!(k_max, 20);
        // radially decreasing near the axis
        assert!(intensity[[20, 0]] > intensity[[20, 5]]);
    }

    #[test]
    fn table_is_z_independent() {
        let objective = Objective::default().specimen_ri(1.33);
        let (optics, theta, const_j, wave_num) = setup(objective, 60);
        let simpson = Simpson::new(&optics, &theta, &const_j, wave_num)
            .phase_offset(constant_opd(&optics, 2e-6), 2e-6);
        let zv: Vec<f64> = (-6..=6).map(|i| i as f64 * 0.25e-6).collect();
        let before = TABULATIONS.with(|n| n.get());
        let table = simpson.tabulate(&Serial).unwrap();
        let whole = table.integrate(&zv, &Serial).unwrap();
        for (chunk, rows) in zv.chunks(4).zip(whole.axis_chunks_iter(ndarray::Axis(0), 4)) {
            assert_eq!(table.integrate(chunk, &Serial).unwrap(), rows);
        }
        assert_eq!(TABULATIONS.with(|n| n.get()) - before, 1);
        assert_eq!(simpson.integrate(&zv, &Serial).unwrap(), whole);
    }

    // The weight pattern is only a Simpson rule when the samples start one step off zero
    // and the integrand vanishes at theta = 0: compare with a dense reference rule.
    #[test]
    fn simpson_matches_reference_quadrature() {
        let objective = Objective::default().specimen_ri(1.515);
        let optics = objective.optics().unwrap();
        let wave_num = 2. * PI / 0.6e-6;
        let const_j = [0., wave_num * 0.1e-6 * optics.ni];
        let zv = [0.];
        let integral = |n: usize| {
            let step = optics.half_angle / n as f64;
            let theta: Vec<f64> = (1..=n).map(|j| j as f64 * step).collect();
            Simpson::new(&optics, &theta, &const_j, wave_num)
                .phase_offset(constant_opd(&optics, 0.), 0.)
                .integrate(&zv, &Serial)
                .unwrap()
                * (step / 3.).powi(2)
        };
        let reference = integral(4000);
        for n in [60, 61, 64, 65] {
            let value = integral(n);
            for (v, r) in value.iter().zip(reference.iter()) {
                let e = (v - r).abs() / r;
                println!("n={n:3}: {v:.6e} vs {r:.6e} ({e:.1e})");
                assert!(e < 5e-2);
            }
        }
    }
}
