//! An elastoplastic Material Point Method simulator for snow.
//!
//! Particles sampled from a [`Scene`] are advected through a static background grid with
//! APIC transfers, a corotated elastic stress and an SVD plasticity clamp. The
//! [`Simulator`] owns the grid and the particles and hands out a [`Snapshot`] of the
//! particle attributes after every step.

extern crate nalgebra as na;

pub mod entity;
pub mod error;
pub mod math;
pub mod mpm;
pub mod scene;
pub mod statistics;

pub use entity::{Entity, Shape};
pub use error::{Result, SimulationError};
pub use mpm::{
    IsotropicParameters, ParticleVertex, SimulationParameters, Simulator, SimulatorState, Snapshot,
    SnowPlasticity,
};
pub use scene::Scene;
pub use statistics::SimulationStatistics;
