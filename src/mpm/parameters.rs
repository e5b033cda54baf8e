use super::models::{IsotropicParameters, SnowPlasticity};
use crate::error::{Result, SimulationError};
use crate::math::{RangeExt, T, TV, UV};
use std::ops::Range;

/// Every constant that drives a simulation. The value is handed to the `Simulator` when it
/// is created and never changes afterwards.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Diameter of each particle; smaller means more particles and a higher resolution
    pub particle_diameter: T,
    /// Density of the snow, in kg/m^3
    pub density: T,
    /// The size of the time step.
    pub delta_time: T,
    /// Upper limit on `delta_time`; explicit integration is unstable above it.
    pub max_delta_time: T,
    pub plasticity: SnowPlasticity,
    pub elasticity: IsotropicParameters,
    /// Scale applied to tangential velocity at the walls (lower is stickier)
    pub sticky: T,
    pub gravity: TV,
    /// The physical extent of the simulation, in meters.
    pub domain: Range<TV>,
    /// The number of grid cells along each axis.
    pub resolution: UV,
    /// Seed of the random number generator used to scatter particles.
    pub seed: u64,
    /// Entities with less volume than this are not sampled.
    pub volume_epsilon: T,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        SimulationParameters {
            particle_diameter: 0.005,
            density: 400.,
            delta_time: 5e-5,
            max_delta_time: 5e-4,
            plasticity: SnowPlasticity::default(),
            elasticity: IsotropicParameters::default(),
            sticky: 0.5,
            gravity: TV::new(0., -9.8, 0.),
            domain: TV::zeros()..TV::new(2., 1., 1.),
            resolution: UV::new(256, 128, 128),
            seed: 7,
            volume_epsilon: 1e-5,
        }
    }
}

impl SimulationParameters {
    /// The volume of a single particle, a cube of `particle_diameter`.
    pub fn particle_volume(&self) -> T {
        self.particle_diameter.powi(3)
    }

    pub fn particle_mass(&self) -> T {
        self.particle_volume() * self.density
    }

    /// The size of one grid cell along each axis.
    pub fn cell_size(&self) -> TV {
        self.domain.size().component_div(&self.resolution.cast::<T>())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(SimulationError::InvalidParameters(msg));

        if !(self.particle_diameter > 0.) {
            return invalid(format!(
                "particle diameter must be positive, got {}",
                self.particle_diameter
            ));
        }
        if !(self.density > 0.) {
            return invalid(format!("density must be positive, got {}", self.density));
        }
        if !(self.delta_time > 0.) || self.delta_time > self.max_delta_time {
            return invalid(format!(
                "time step {} must be in (0, {}]",
                self.delta_time, self.max_delta_time
            ));
        }
        if self.plasticity.critical_compression > 1. || self.plasticity.critical_stretch < 1. {
            return invalid(format!(
                "plasticity thresholds [{}, {}] must contain 1",
                self.plasticity.critical_compression, self.plasticity.critical_stretch
            ));
        }
        let elasticity = &self.elasticity;
        if !(elasticity.youngs_modulus > 0.)
            || !(elasticity.poissons_ratio > -1. && elasticity.poissons_ratio < 0.5)
        {
            return invalid(format!(
                "Young's modulus {} must be positive and Poisson's ratio {} in (-1, 0.5)",
                elasticity.youngs_modulus, elasticity.poissons_ratio
            ));
        }
        if self.resolution.iter().any(|&r| r == 0) {
            return invalid(format!("resolution {:?} has an empty axis", self.resolution));
        }
        if self.domain.size().iter().any(|&s| !(s > 0.)) {
            return invalid(format!("domain {:?} is empty", self.domain));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = SimulationParameters::default();
        assert!(params.validate().is_ok());
        assert!((params.particle_volume() - 1.25e-7).abs() < 1e-20);
        assert!((params.particle_mass() - 5e-5).abs() < 1e-18);
        assert_eq!(params.cell_size(), TV::from_element(1. / 128.));
    }

    #[test]
    fn test_validate() {
        let mut params = SimulationParameters::default();
        params.delta_time = 1e-3;
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameters(_))
        ));

        let mut params = SimulationParameters::default();
        params.resolution = UV::new(256, 0, 128);
        assert!(params.validate().is_err());

        let mut params = SimulationParameters::default();
        params.plasticity.critical_stretch = 0.9;
        assert!(params.validate().is_err());

        let mut params = SimulationParameters::default();
        params.particle_diameter = T::NAN;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_json_overrides() {
        let json = r#"{ "delta_time": 2e-5, "resolution": [64, 32, 32] }"#;
        let params: SimulationParameters = serde_json::from_str(json).unwrap();

        assert_eq!(params.delta_time, 2e-5);
        assert_eq!(params.resolution, UV::new(64, 32, 32));
        assert_eq!(params.density, 400.);
    }

    #[test]
    fn test_json_elasticity_override() {
        let json = r#"{ "elasticity": { "poissons_ratio": 0.3 } }"#;
        let params: SimulationParameters = serde_json::from_str(json).unwrap();

        let expected = IsotropicParameters::new(1.4e5, 0.3);
        assert_eq!(params.elasticity.mu, expected.mu);
        assert_eq!(params.elasticity.lambda, expected.lambda);
        assert!(params.validate().is_ok());

        let json = r#"{ "elasticity": { "poissons_ratio": 0.5 } }"#;
        let params: SimulationParameters = serde_json::from_str(json).unwrap();
        assert!(matches!(
            params.validate(),
            Err(SimulationError::InvalidParameters(_))
        ));
    }
}
