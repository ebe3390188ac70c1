use crate::{objective::ObjectiveError, psf::PsfError};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid objective")]
    Objective(#[from] ObjectiveError),
    #[error("failed to compute the PSF")]
    Psf(#[from] PsfError),
}
pub type Result<T> = std::result::Result<T, Error>;
