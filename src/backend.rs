//! Array compute backends
//!
//! A [`Backend`] decides how the outer-axis lanes of an array are visited:
//! one after the other ([`Serial`]) or on the rayon thread pool ([`Rayon`]).
//! The kernel applied to each lane is the same whatever the backend, and every
//! reduction happens inside a lane, so the results do not depend on the backend.

use ndarray::{ArrayViewMut, Axis, Dimension, RemoveAxis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

pub trait Backend: Sync {
    /// Calls `kernel(i, lane)` for every lane `i` along the first axis of `array`
    fn for_each_lane<A, D, F>(&self, array: ArrayViewMut<'_, A, D>, kernel: F)
    where
        A: Send + Sync,
        D: Dimension + RemoveAxis,
        F: Fn(usize, ArrayViewMut<'_, A, D::Smaller>) + Send + Sync;
}

/// Sequential backend
#[derive(Debug, Default, Clone, Copy)]
pub struct Serial;
impl Backend for Serial {
    fn for_each_lane<A, D, F>(&self, mut array: ArrayViewMut<'_, A, D>, kernel: F)
    where
        A: Send + Sync,
        D: Dimension + RemoveAxis,
        F: Fn(usize, ArrayViewMut<'_, A, D::Smaller>) + Send + Sync,
    {
        array
            .axis_iter_mut(Axis(0))
            .enumerate()
            .for_each(|(i, lane)| kernel(i, lane));
    }
}

/// Data parallel backend on the rayon global thread pool
#[derive(Debug, Default, Clone, Copy)]
pub struct Rayon;
impl Backend for Rayon {
    fn for_each_lane<A, D, F>(&self, mut array: ArrayViewMut<'_, A, D>, kernel: F)
    where
        A: Send + Sync,
        D: Dimension + RemoveAxis,
        F: Fn(usize, ArrayViewMut<'_, A, D::Smaller>) + Send + Sync,
    {
        array
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, lane)| kernel(i, lane));
    }
}

/// Backend selection
///
/// ```
/// use vectorial_psf::BackendKind;
/// let backend: BackendKind = "serial".parse().unwrap();
/// assert_eq!(backend, BackendKind::Serial);
/// ```
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Serial,
    #[default]
    Rayon,
}
impl Backend for BackendKind {
    fn for_each_lane<A, D, F>(&self, array: ArrayViewMut<'_, A, D>, kernel: F)
    where
        A: Send + Sync,
        D: Dimension + RemoveAxis,
        F: Fn(usize, ArrayViewMut<'_, A, D::Smaller>) + Send + Sync,
    {
        match self {
            BackendKind::Serial => Serial.for_each_lane(array, kernel),
            BackendKind::Rayon => Rayon.for_each_lane(array, kernel),
        }
    }
}
