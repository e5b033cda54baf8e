use crate::math::TV;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("scene has no volume to fill with particles (total volume {total})")]
    NoVolume { total: f64 },

    #[error("unknown scene preset {0}, expected 0..{}", crate::scene::NUM_PRESETS)]
    UnknownPreset(usize),

    #[error("particle {particle} left the grid interior at grid position {grid_position:?}")]
    ParticleOutOfBounds { particle: usize, grid_position: TV },

    #[error("particle {particle} has a non-finite position or velocity")]
    NonFinite { particle: usize },

    #[error("invalid simulation parameters: {0}")]
    InvalidParameters(String),

    #[error("simulation state is corrupted and must be rebuilt from its scene")]
    Corrupted,
}

pub type Result<T> = std::result::Result<T, SimulationError>;
