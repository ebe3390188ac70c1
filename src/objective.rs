//! Microscope objective
//!
//! [`Objective`] holds the nominal optical parameters of the objective, lengths in micrometers,
//! and [`Optics`] is its validated form in SI units, with the aperture half-angle derived.

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ObjectiveError {
    #[error("numerical aperture {na} must be smaller than the immersion medium refractive index {ni}")]
    Aperture { na: f64, ni: f64 },
    #[error("numerical aperture {0} must be positive")]
    NumericalAperture(f64),
    #[error("refractive index {name} = {value} must be finite and positive")]
    RefractiveIndex { name: &'static str, value: f64 },
    #[error("thickness {name} = {value}um must be finite and non-negative")]
    Thickness { name: &'static str, value: f64 },
}
type Result<T> = std::result::Result<T, ObjectiveError>;

/// Objective optical parameters
///
/// `*_spec` fields are the design values the objective is corrected for,
/// the others are the experimental values.
/// Lengths are in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Objective {
    /// numerical aperture
    pub na: f64,
    /// coverslip refractive index, experimental value (ng)
    pub coverslip_ri: f64,
    /// coverslip refractive index, design value (ng0)
    pub coverslip_ri_spec: f64,
    /// immersion medium refractive index, experimental value (ni)
    pub immersion_medium_ri: f64,
    /// immersion medium refractive index, design value (ni0)
    pub immersion_medium_ri_spec: f64,
    /// specimen refractive index (ns)
    pub specimen_ri: f64,
    /// working distance, design value (ti0) [um]
    pub working_distance: f64,
    /// coverslip thickness, experimental value (tg) [um]
    pub coverslip_thickness: f64,
    /// coverslip thickness, design value (tg0) [um]
    pub coverslip_thickness_spec: f64,
}
impl Default for Objective {
    fn default() -> Self {
        Self {
            na: 1.4,
            coverslip_ri: 1.515,
            coverslip_ri_spec: 1.515,
            immersion_medium_ri: 1.515,
            immersion_medium_ri_spec: 1.515,
            specimen_ri: 1.47,
            working_distance: 150.0,
            coverslip_thickness: 170.0,
            coverslip_thickness_spec: 170.0,
        }
    }
}
impl Objective {
    pub fn na(self, na: f64) -> Self {
        Self { na, ..self }
    }
    pub fn coverslip_ri(self, coverslip_ri: f64) -> Self {
        Self {
            coverslip_ri,
            ..self
        }
    }
    pub fn coverslip_ri_spec(self, coverslip_ri_spec: f64) -> Self {
        Self {
            coverslip_ri_spec,
            ..self
        }
    }
    pub fn immersion_medium_ri(self, immersion_medium_ri: f64) -> Self {
        Self {
            immersion_medium_ri,
            ..self
        }
    }
    pub fn immersion_medium_ri_spec(self, immersion_medium_ri_spec: f64) -> Self {
        Self {
            immersion_medium_ri_spec,
            ..self
        }
    }
    pub fn specimen_ri(self, specimen_ri: f64) -> Self {
        Self {
            specimen_ri,
            ..self
        }
    }
    pub fn working_distance(self, working_distance: f64) -> Self {
        Self {
            working_distance,
            ..self
        }
    }
    pub fn coverslip_thickness(self, coverslip_thickness: f64) -> Self {
        Self {
            coverslip_thickness,
            ..self
        }
    }
    pub fn coverslip_thickness_spec(self, coverslip_thickness_spec: f64) -> Self {
        Self {
            coverslip_thickness_spec,
            ..self
        }
    }
    /// Checks the parameters and returns the objective [`Optics`]
    pub fn optics(&self) -> Result<Optics> {
        Optics::try_from(self)
    }
    /// Aperture half-angle `asin(NA/ni)` [rd]
    pub fn half_angle(&self) -> Result<f64> {
        self.optics().map(|optics| optics.half_angle)
    }
}

/// Validated objective optics in SI units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Optics {
    pub na: f64,
    pub ng: f64,
    pub ng0: f64,
    pub ni: f64,
    pub ni0: f64,
    pub ns: f64,
    /// working distance [m]
    pub ti0: f64,
    /// coverslip thickness [m]
    pub tg: f64,
    /// coverslip design thickness [m]
    pub tg0: f64,
    /// aperture half-angle [rd]
    pub half_angle: f64,
}
impl TryFrom<&Objective> for Optics {
    type Error = ObjectiveError;

    fn try_from(objective: &Objective) -> Result<Self> {
        let &Objective {
            na,
            coverslip_ri,
            coverslip_ri_spec,
            immersion_medium_ri,
            immersion_medium_ri_spec,
            specimen_ri,
            working_distance,
            coverslip_thickness,
            coverslip_thickness_spec,
        } = objective;

        for (name, value) in [
            ("coverslip_ri", coverslip_ri),
            ("coverslip_ri_spec", coverslip_ri_spec),
            ("immersion_medium_ri", immersion_medium_ri),
            ("immersion_medium_ri_spec", immersion_medium_ri_spec),
            ("specimen_ri", specimen_ri),
        ] {
            if !(value.is_finite() && value > 0.) {
                return Err(ObjectiveError::RefractiveIndex { name, value });
            }
        }
        for (name, value) in [
            ("working_distance", working_distance),
            ("coverslip_thickness", coverslip_thickness),
            ("coverslip_thickness_spec", coverslip_thickness_spec),
        ] {
            if !(value.is_finite() && value >= 0.) {
                return Err(ObjectiveError::Thickness { name, value });
            }
        }
        if !(na.is_finite() && na > 0.) {
            return Err(ObjectiveError::NumericalAperture(na));
        }
        if na >= immersion_medium_ri {
            return Err(ObjectiveError::Aperture {
                na,
                ni: immersion_medium_ri,
            });
        }

        Ok(Self {
            na,
            ng: coverslip_ri,
            ng0: coverslip_ri_spec,
            ni: immersion_medium_ri,
            ni0: immersion_medium_ri_spec,
            ns: specimen_ri,
            ti0: working_distance * 1e-6,
            tg: coverslip_thickness * 1e-6,
            tg0: coverslip_thickness_spec * 1e-6,
            half_angle: (na / immersion_medium_ri).asin(),
        })
    }
}
