pub mod grid;
mod models;
mod parameters;
pub mod particle;
pub mod point_cloud;

pub use models::{IsotropicParameters, SnowPlasticity};
pub use parameters::SimulationParameters;

use crate::error::{Result, SimulationError};
use crate::math::T;
use crate::scene::Scene;

use grid::MpmGrid;
use point_cloud::PointCloud;

/// The lifecycle of a `Simulator`. Dropping it releases the grid and the particles together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    /// Particles are sampled and their volumes estimated, but no step has run yet.
    Constructed,
    Stepping,
    /// A step failed half way. The state can't be trusted and the simulator has to be rebuilt
    /// from its scene.
    Corrupted,
}

/// Contains all of the state for the Material Point Method Simulation
#[derive(Debug)]
pub struct Simulator {
    params: SimulationParameters,
    grid: MpmGrid,
    particles: PointCloud,
    state: SimulatorState,
    steps: usize,
    time: T,
}

/// A single particle as handed to a renderer.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ParticleVertex {
    pub position: [f32; 3],
    /// Brightness derived from the particle's density.
    pub shade: f32,
    pub volume: f32,
}

/// A copy of the particle attributes taken between two steps.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub step: usize,
    pub time: T,
    pub particles: Vec<ParticleVertex>,
}

impl Simulator {
    /// Fills the scene with particles and builds the grid around the domain. The particle
    /// volumes are estimated from the initial mass distribution, once.
    pub fn new(scene: &Scene, params: SimulationParameters) -> Result<Simulator> {
        params.validate()?;

        let mut particles = PointCloud::sample(scene.entities(), &params)?;
        let mut grid = MpmGrid::new(&params);

        grid.rasterize_mass(&mut particles)?;
        grid.estimate_volumes(&mut particles);

        tracing::info!(
            "Created \"{}\" with {} particles on a {}x{}x{} grid",
            scene.description(),
            particles.len(),
            grid.data.size.x,
            grid.data.size.y,
            grid.data.size.z
        );

        Ok(Simulator {
            params,
            grid,
            particles,
            state: SimulatorState::Constructed,
            steps: 0,
            time: 0.,
        })
    }

    /// Advances the simulation by one time step.
    ///
    /// If any phase fails the simulator is left `Corrupted`, and every later call returns
    /// `SimulationError::Corrupted`.
    pub fn step(&mut self) -> Result<()> {
        if self.state == SimulatorState::Corrupted {
            return Err(SimulationError::Corrupted);
        }

        if let Err(e) = self.advance() {
            tracing::error!(step = self.steps, "simulation step failed: {}", e);
            self.state = SimulatorState::Corrupted;
            return Err(e);
        }

        self.state = SimulatorState::Stepping;
        self.steps += 1;
        self.time += self.params.delta_time;

        tracing::debug!(
            step = self.steps,
            max_velocity = self.particles.max_velocity.sqrt(),
            "finished step"
        );

        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        let Simulator {
            params,
            grid,
            particles,
            ..
        } = self;

        grid.rasterize_mass(particles)?;
        grid.compute_inertia_tensors(particles);
        grid.transfer_velocities(particles);
        grid.integrate_forces(particles, params);
        grid.update_affine_state(particles);
        grid.transfer_to_particles(particles, params);

        particles.update(params.delta_time, &params.plasticity)
    }

    /// Copies out the position, shade and volume of every particle, in sampling order.
    pub fn snapshot(&self) -> Snapshot {
        let contrast = 0.5;
        let density = self.params.density;

        let particles = self
            .particles
            .particles
            .iter()
            .map(|p| ParticleVertex {
                position: [
                    p.position.x as f32,
                    p.position.y as f32,
                    p.position.z as f32,
                ],
                shade: (1. - contrast + contrast * p.density / density) as f32,
                volume: p.volume as f32,
            })
            .collect();

        Snapshot {
            step: self.steps,
            time: self.time,
            particles,
        }
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn grid(&self) -> &MpmGrid {
        &self.grid
    }

    pub fn particles(&self) -> &PointCloud {
        &self.particles
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    /// The number of steps completed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn time(&self) -> T {
        self.time
    }
}
