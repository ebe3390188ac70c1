use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
    time::Instant,
};

use itertools::{Itertools, MinMaxResult::MinMax};
use ndarray::Array3;
use npyz::WriterBuilder;
use structopt::StructOpt;
use vectorial_psf::{BackendKind, Objective, VectorialPsf};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "vectorial-psf",
    about = "Vectorial PSF of a wide-field microscope objective"
)]
struct Opt {
    /// Number of z-slices centered on the point source
    #[structopt(long, default_value = "61")]
    nz: usize,
    /// z-slices spacing [um]
    #[structopt(long, default_value = "0.1")]
    dz: f64,
    /// z-slices center [um]
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    pz: f64,
    /// Comma separated z positions [um], supersedes nz, dz and pz
    #[structopt(long, use_delimiter = true, allow_hyphen_values = true)]
    z: Vec<f64>,
    /// Number of pixels along x
    #[structopt(long, default_value = "31")]
    nx: usize,
    /// Number of pixels along y [default: nx]
    #[structopt(long)]
    ny: Option<usize>,
    /// Pixel size [um]
    #[structopt(long, default_value = "0.05")]
    pixel_size: f64,
    /// Emission wavelength [um]
    #[structopt(long, default_value = "0.6")]
    wavelength: f64,
    /// Point source x position [um]
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    xs: f64,
    /// Point source y position [um]
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    ys: f64,
    /// Point source depth in the specimen [um]
    #[structopt(long, default_value = "0", allow_hyphen_values = true)]
    zs: f64,
    /// Radial supersampling factor
    #[structopt(long, default_value = "3")]
    supersampling: usize,
    /// Skip the normalization of the PSF peak to 1
    #[structopt(long)]
    raw: bool,
    /// Number of z-slices computed at once
    #[structopt(long)]
    z_chunk: Option<usize>,
    /// Compute backend: serial or rayon
    #[structopt(long, default_value = "rayon")]
    backend: BackendKind,
    /// Objective parameters from a pickled dictionary
    #[structopt(long, parse(from_os_str))]
    objective: Option<PathBuf>,
    /// Numerical aperture
    #[structopt(long)]
    na: Option<f64>,
    /// Immersion medium refractive index
    #[structopt(long)]
    immersion_ri: Option<f64>,
    /// Specimen refractive index
    #[structopt(long)]
    specimen_ri: Option<f64>,
    /// Save the PSF to a numpy .npy file
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
    /// Display a progress bar
    #[structopt(short, long)]
    progress: bool,
}

fn load_objective(path: &Path) -> anyhow::Result<Objective> {
    log::info!("Loading {:?}...", path);
    let mut file = File::open(path)?;
    Ok(serde_pickle::from_reader(&mut file, Default::default())?)
}

fn save_npy(psf: &Array3<f64>, path: &Path) -> anyhow::Result<()> {
    let (nz, ny, nx) = psf.dim();
    let mut file = BufWriter::new(File::create(path)?);
    let mut writer = npyz::WriteOptions::<f64>::new()
        .default_dtype()
        .shape(&[nz as u64, ny as u64, nx as u64])
        .writer(&mut file)
        .begin_nd()?;
    writer.extend(psf.iter().cloned())?;
    writer.finish()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut objective = match &opt.objective {
        Some(path) => load_objective(path)?,
        None => Objective::default(),
    };
    if let Some(na) = opt.na {
        objective = objective.na(na);
    }
    if let Some(ni) = opt.immersion_ri {
        objective = objective.immersion_medium_ri(ni);
    }
    if let Some(ns) = opt.specimen_ri {
        objective = objective.specimen_ri(ns);
    }
    println!("{:#?}", objective);

    let mut builder = VectorialPsf::new(objective)
        .nx(opt.nx)
        .position([opt.xs, opt.ys, opt.zs])
        .pixel_size(opt.pixel_size)
        .wavelength(opt.wavelength)
        .supersampling(opt.supersampling)
        .normalize(!opt.raw)
        .z_chunk(opt.z_chunk)
        .backend(opt.backend)
        .progress(opt.progress);
    if let Some(ny) = opt.ny {
        builder = builder.ny(ny);
    }

    let now = Instant::now();
    let psf = if opt.z.is_empty() {
        builder.compute_centered(opt.nz, opt.dz, opt.pz)?
    } else {
        builder.compute(&opt.z)?
    };
    let elapsed = now.elapsed().as_secs_f64();

    println!("SUMMARY:");
    println!(" - shape: {:?}", psf.dim());
    if let MinMax(min, max) = psf.iter().minmax() {
        println!(" - range: [{:.6e}, {:.6e}]", min, max);
    }
    if let Some(((k, i, j), peak)) = psf.indexed_iter().max_by(|a, b| a.1.total_cmp(b.1)) {
        println!(" - peak: {:.6e} @ (z:{}, y:{}, x:{})", peak, k, i, j);
    }
    println!(" - computed in {:.3}s ({} backend)", elapsed, opt.backend);

    if let Some(path) = &opt.output {
        save_npy(&psf, path)?;
        println!("PSF saved to {:?}", path);
    }
    Ok(())
}
