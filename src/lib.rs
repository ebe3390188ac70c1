/*!
# Vectorial PSF

Vectorial model of the point spread function (PSF) of a wide-field microscope objective.

The PSF accounts for the refractive index mismatches between the immersion medium,
the coverslip and the specimen, and for the finite aperture of the objective.
The diffraction integral is evaluated with Simpson's rule over the aperture angle
for a radial profile of the PSF that is then interpolated into a 3D volume.

## Key Components

- [`Objective`] - objective optical parameters and their validated form [`Optics`]
- [`VectorialPsf`] - PSF volume sampling and computation
- [`RadialSampling`] - radial and angular sampling of the diffraction integral
- [`Backend`] - serial or data parallel evaluation

## Usage

```rust,no_run
use vectorial_psf::{Objective, VectorialPsf};

let objective = Objective::default().specimen_ri(1.33);
let zv: Vec<f64> = (0..61).map(|i| -3. + 0.1 * i as f64).collect();
let psf = VectorialPsf::new(objective)
    .nx(31)
    .pixel_size(0.05)
    .wavelength(0.6)
    .compute(&zv)?;
assert_eq!(psf.dim(), (61, 31, 31));
# Ok::<(), vectorial_psf::Error>(())
```
*/

pub mod backend;
pub mod bessel;
mod error;
pub mod integrator;
pub mod objective;
pub mod psf;
pub mod radial;
pub mod volume;

pub use backend::{Backend, BackendKind, Rayon, Serial};
pub use error::{Error, Result};
pub use integrator::{Simpson, SimpsonTable};
pub use objective::{Objective, ObjectiveError, Optics};
pub use psf::{centered_zv, PsfError, VectorialPsf};
pub use radial::{vectorial_rz, RadialSampling};
pub use volume::{radius_map, rz_to_xyz};
