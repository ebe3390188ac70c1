//! Vectorial PSF
//!
//! [`VectorialPsf`] gathers the sampling of the PSF volume and the objective,
//! all lengths are given in micrometers.

use std::{collections::TryReserveError, time::Instant};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{s, Array, Array3, Axis, Dimension, IntoDimension, ShapeError};
use serde::{Deserialize, Serialize};

use crate::{
    backend::BackendKind,
    error::Result,
    objective::Objective,
    radial::RadialSampling,
    volume::rz_to_xyz_into,
};

#[derive(Debug, thiserror::Error)]
pub enum PsfError {
    #[error("{name} = {value} must be finite and positive")]
    Positive { name: &'static str, value: f64 },
    #[error("{0} must be greater than 0")]
    Size(&'static str),
    #[error("point source position {0:?} must be finite")]
    Position([f64; 3]),
    #[error("z positions vector is empty")]
    EmptyZ,
    #[error("z position #{0} is not finite")]
    NonFiniteZ(usize),
    #[error("{value} {name} samples are too many")]
    Sampling { name: &'static str, value: f64 },
    #[error("array of shape {0:?} is too large")]
    Overflow(Vec<usize>),
    #[error("failed to allocate an array of {elements} samples")]
    Allocation {
        elements: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("failed to shape the array")]
    Shape(#[from] ShapeError),
    #[error("cannot normalize the PSF, its maximum is {0}")]
    Normalize(f64),
    #[error("invalid progress bar template")]
    Progress(#[from] indicatif::style::TemplateError),
}

/// Vectorial PSF of a microscope objective
///
/// # Example
///
/// ```no_run
/// use vectorial_psf::{Objective, VectorialPsf};
///
/// let psf = VectorialPsf::new(Objective::default().specimen_ri(1.33))
///     .nx(64)
///     .pixel_size(0.1)
///     .wavelength(0.52)
///     .compute_centered(41, 0.2, 0.)?;
/// assert_eq!(psf.dim(), (41, 64, 64));
/// # Ok::<(), vectorial_psf::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorialPsf {
    objective: Objective,
    nx: usize,
    ny: Option<usize>,
    position: [f64; 3],
    pixel_size: f64,
    wavelength: f64,
    supersampling: usize,
    normalize: bool,
    z_chunk: Option<usize>,
    backend: BackendKind,
    #[serde(skip)]
    progress: bool,
}
impl Default for VectorialPsf {
    fn default() -> Self {
        Self {
            objective: Objective::default(),
            nx: 31,
            ny: None,
            position: [0.; 3],
            pixel_size: 0.05,
            wavelength: 0.6,
            supersampling: 3,
            normalize: true,
            z_chunk: None,
            backend: BackendKind::default(),
            progress: false,
        }
    }
}
impl VectorialPsf {
    pub fn new(objective: Objective) -> Self {
        Self {
            objective,
            ..Default::default()
        }
    }
    /// Number of pixels along x
    pub fn nx(self, nx: usize) -> Self {
        Self { nx, ..self }
    }
    /// Number of pixels along y, default to `nx`
    pub fn ny(self, ny: usize) -> Self {
        Self {
            ny: Some(ny),
            ..self
        }
    }
    /// Point source position `[x, y, z]` [um]
    pub fn position(self, position: [f64; 3]) -> Self {
        Self { position, ..self }
    }
    /// Lateral pixel size [um]
    pub fn pixel_size(self, pixel_size: f64) -> Self {
        Self { pixel_size, ..self }
    }
    /// Emission wavelength [um]
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self { wavelength, ..self }
    }
    /// Radial supersampling factor
    pub fn supersampling(self, supersampling: usize) -> Self {
        Self {
            supersampling,
            ..self
        }
    }
    /// Normalizes the PSF peak to 1
    pub fn normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }
    /// Computes the volume by chunks of `z_chunk` z-slices
    pub fn z_chunk(self, z_chunk: Option<usize>) -> Self {
        Self { z_chunk, ..self }
    }
    pub fn backend(self, backend: BackendKind) -> Self {
        Self { backend, ..self }
    }
    /// Displays a progress bar over the z chunks
    pub fn progress(self, progress: bool) -> Self {
        Self { progress, ..self }
    }
    pub fn objective(&self) -> &Objective {
        &self.objective
    }
    /// Volume xy shape `(ny, nx)`
    pub fn shape(&self) -> (usize, usize) {
        (self.ny.unwrap_or(self.nx), self.nx)
    }

    fn check(&self, zv: &[f64]) -> std::result::Result<(), PsfError> {
        let (ny, nx) = self.shape();
        if nx == 0 {
            return Err(PsfError::Size("nx"));
        }
        if ny == 0 {
            return Err(PsfError::Size("ny"));
        }
        if self.supersampling == 0 {
            return Err(PsfError::Size("supersampling"));
        }
        if self.z_chunk == Some(0) {
            return Err(PsfError::Size("z_chunk"));
        }
        for (name, value) in [
            ("pixel_size", self.pixel_size),
            ("wavelength", self.wavelength),
        ] {
            if !(value.is_finite() && value > 0.) {
                return Err(PsfError::Positive { name, value });
            }
        }
        if self.position.iter().any(|x| !x.is_finite()) {
            return Err(PsfError::Position(self.position));
        }
        if zv.is_empty() {
            return Err(PsfError::EmptyZ);
        }
        if let Some(i) = zv.iter().position(|z| !z.is_finite()) {
            return Err(PsfError::NonFiniteZ(i));
        }
        Ok(())
    }

    /// Computes the PSF volume for the z positions `zv` [um]
    ///
    /// The volume has shape `(zv.len(), ny, nx)`.
    pub fn compute(&self, zv: &[f64]) -> Result<Array3<f64>> {
        let now = Instant::now();
        let optics = self.objective.optics()?;
        self.check(zv)?;

        let (ny, nx) = self.shape();
        let sf = self.supersampling;
        let pixel_size = self.pixel_size * 1e-6;
        let wavelength = self.wavelength * 1e-6;
        let position = self.position.map(|x| x * 1e-6);
        let zv: Vec<f64> = zv.iter().map(|z| z * 1e-6).collect();
        let nz = zv.len();

        // the radial profile must cover the largest lateral dimension
        let sampling =
            RadialSampling::new(&optics, nx.max(ny), position, pixel_size, wavelength, sf)?;
        let offset = (position[1] / pixel_size, position[0] / pixel_size);

        let mut volume = try_array((nz, ny, nx), 0f64)?;
        let table = sampling.tabulate(&optics, &self.backend)?;
        let chunk = self.z_chunk.unwrap_or(nz).min(nz);
        let mut rz = try_array((chunk, sampling.rmax), 0f64)?;
        let n_chunk = nz.div_ceil(chunk);
        let pb = if self.progress {
            let pb = ProgressBar::new(n_chunk as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
                    .map_err(PsfError::from)?
                    .progress_chars("#>-"),
            );
            pb.set_message("Computing PSF");
            pb
        } else {
            ProgressBar::hidden()
        };
        log::debug!("computing {nz} z-slices in {n_chunk} chunk(s) with {} backend", self.backend);
        for (zv_chunk, out) in zv
            .chunks(chunk)
            .zip(volume.axis_chunks_iter_mut(Axis(0), chunk))
        {
            let mut rz_chunk = rz.slice_mut(s![..zv_chunk.len(), ..]);
            sampling.profile_into(&table, zv_chunk, rz_chunk.view_mut(), &self.backend);
            rz_to_xyz_into(rz_chunk.view(), sf, offset, out, &self.backend);
            pb.inc(1);
        }
        pb.finish_with_message("PSF computed");

        if self.normalize {
            normalize(&mut volume)?;
        }
        log::info!(
            "PSF ({nz}x{ny}x{nx}) computed in {:.3}s",
            now.elapsed().as_secs_f64()
        );
        Ok(volume)
    }

    /// Computes the PSF volume for `nz` z-slices `dz` [um] apart, centered on `pz` [um]
    ///
    /// With `pz = 0` and the point source at `z = 0`, the point source lies on the central
    /// z-plane of the volume.
    pub fn compute_centered(&self, nz: usize, dz: f64, pz: f64) -> Result<Array3<f64>> {
        if nz == 0 {
            return Err(PsfError::Size("nz").into());
        }
        if !(dz.is_finite() && dz > 0.) {
            return Err(PsfError::Positive {
                name: "dz",
                value: dz,
            }
            .into());
        }
        self.compute(&centered_zv(nz, dz, pz))
    }
}

/// `nz` z positions `dz` apart, symmetric around `pz`
pub fn centered_zv(nz: usize, dz: f64, pz: f64) -> Vec<f64> {
    let center = (nz as f64 - 1.) / 2.;
    (0..nz).map(|i| (i as f64 - center) * dz + pz).collect()
}

/// Array filled with `elem`, reporting allocation failure instead of aborting
pub(crate) fn try_array<A, Sh>(
    shape: Sh,
    elem: A,
) -> std::result::Result<Array<A, Sh::Dim>, PsfError>
where
    A: Clone,
    Sh: IntoDimension,
{
    let dim = shape.into_dimension();
    let elements = dim
        .size_checked()
        .ok_or_else(|| PsfError::Overflow(dim.slice().to_vec()))?;
    let mut data: Vec<A> = Vec::new();
    data.try_reserve_exact(elements)
        .map_err(|source| PsfError::Allocation { elements, source })?;
    data.resize(elements, elem);
    Ok(Array::from_shape_vec(dim, data)?)
}

/// Collects an exact size iterator, reporting allocation failure instead of aborting
pub(crate) fn try_collect<I>(iter: I) -> std::result::Result<Vec<I::Item>, PsfError>
where
    I: IntoIterator,
    I::IntoIter: ExactSizeIterator,
{
    let iter = iter.into_iter();
    let elements = iter.len();
    let mut data = Vec::new();
    data.try_reserve_exact(elements)
        .map_err(|source| PsfError::Allocation { elements, source })?;
    data.extend(iter);
    Ok(data)
}

/// Divides the volume by its maximum
fn normalize(volume: &mut Array3<f64>) -> std::result::Result<(), PsfError> {
    let max = volume.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !(max.is_finite() && max > 0.) {
        log::warn!("PSF maximum is {max}, skipping normalization");
        return Err(PsfError::Normalize(max));
    }
    volume.mapv_inplace(|x| x / max);
    Ok(())
}
