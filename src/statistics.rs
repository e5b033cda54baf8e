use crate::math::{T, TV};
use crate::mpm::Simulator;
use itertools::izip;

/// Conserved quantities of a running simulation, used to check it for drift.
pub trait SimulationStatistics {
    fn total_time(&self) -> T;
    fn total_mass(&self) -> T;
    fn total_linear_momentum(&self) -> TV;
    fn total_angular_momentum(&self) -> TV;
    /// Kinetic energy, `sum(m * |v|^2) / 2`.
    fn total_energy(&self) -> T;
    /// Deformed volume of the material, `sum(det(Fe * Fp) * V)`.
    fn total_volume(&self) -> T;
}

impl SimulationStatistics for Simulator {
    fn total_time(&self) -> T {
        self.time()
    }

    fn total_mass(&self) -> T {
        self.particles().particles.iter().map(|p| p.mass).sum()
    }

    fn total_linear_momentum(&self) -> TV {
        self.particles()
            .particles
            .iter()
            .map(|p| p.mass * p.velocity)
            .sum()
    }

    fn total_angular_momentum(&self) -> TV {
        self.particles()
            .particles
            .iter()
            .map(|p| p.mass * p.position.cross(&p.velocity))
            .sum()
    }

    fn total_energy(&self) -> T {
        self.particles()
            .particles
            .iter()
            .map(|p| 0.5 * p.mass * p.velocity.dot(&p.velocity))
            .sum()
    }

    fn total_volume(&self) -> T {
        let particles = &self.particles().particles;
        izip!(
            particles.iter().map(|p| &p.def_elastic),
            particles.iter().map(|p| &p.def_plastic),
            particles.iter().map(|p| p.volume)
        )
        .map(|(fe, fp, volume)| (fe * fp).determinant() * volume)
        .sum()
    }
}
