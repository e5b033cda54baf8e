use crate::math::T;

/// Elastic constants of an isotropic material, along with the derived Lamé parameters.
///
/// Only Young's modulus and Poisson's ratio are (de)serialized; `mu` and `lambda` are always
/// recomputed from them.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(from = "ElasticConstants", into = "ElasticConstants")]
pub struct IsotropicParameters {
    pub youngs_modulus: T,
    pub poissons_ratio: T,
    pub mu: T,
    pub lambda: T,
}

impl IsotropicParameters {
    pub fn new(youngs_modulus: T, poissons_ratio: T) -> Self {
        let mut base = Self {
            youngs_modulus,
            poissons_ratio,
            mu: 0.,
            lambda: 0.,
        };
        base.recalculate_lame_parameters();
        base
    }

    pub fn recalculate_lame_parameters(&mut self) {
        self.mu = self.youngs_modulus / (2. * (1. + self.poissons_ratio));
        self.lambda = self.youngs_modulus * self.poissons_ratio
            / ((1. + self.poissons_ratio) * (1. - 2. * self.poissons_ratio));
    }
}

impl Default for IsotropicParameters {
    fn default() -> Self {
        ElasticConstants::default().into()
    }
}

/// The serialized form of `IsotropicParameters`.
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ElasticConstants {
    youngs_modulus: T,
    poissons_ratio: T,
}

impl Default for ElasticConstants {
    fn default() -> Self {
        ElasticConstants {
            youngs_modulus: 1.4e5,
            poissons_ratio: 0.2,
        }
    }
}

impl From<ElasticConstants> for IsotropicParameters {
    fn from(c: ElasticConstants) -> Self {
        IsotropicParameters::new(c.youngs_modulus, c.poissons_ratio)
    }
}

impl From<IsotropicParameters> for ElasticConstants {
    fn from(p: IsotropicParameters) -> Self {
        ElasticConstants {
            youngs_modulus: p.youngs_modulus,
            poissons_ratio: p.poissons_ratio,
        }
    }
}

/// Yield limits of the elastic deformation and how strongly permanent compression hardens
/// the material.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SnowPlasticity {
    /// Smallest singular value the elastic deformation may have before it fractures.
    pub critical_compression: T,
    /// Largest singular value the elastic deformation may have before it fractures.
    pub critical_stretch: T,
    pub hardening: T,
}

impl SnowPlasticity {
    /// Clamps a singular value into the elastic region.
    pub fn clamp(&self, sigma: T) -> T {
        if sigma < self.critical_compression {
            self.critical_compression
        } else if sigma > self.critical_stretch {
            self.critical_stretch
        } else {
            sigma
        }
    }

    /// The factor `exp(hardening * (1 - Jp))` that scales the stress of a particle whose
    /// plastic deformation has determinant `plastic_det`.
    pub fn hardening_factor(&self, plastic_det: T) -> T {
        (self.hardening * (1. - plastic_det)).exp()
    }
}

impl Default for SnowPlasticity {
    fn default() -> Self {
        SnowPlasticity {
            critical_compression: 1. - 2.5e-2,
            critical_stretch: 1. + 7.5e-3,
            hardening: 10.,
        }
    }
}
