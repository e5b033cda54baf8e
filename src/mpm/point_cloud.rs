use super::models::SnowPlasticity;
use super::parameters::SimulationParameters;
use super::particle::Particle;
use crate::entity::Entity;
use crate::error::{Result, SimulationError};
use crate::math::{is_finite, length_squared, T, TV};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use std::ops::Range;

/// Owns every particle of the simulation. The number of particles is fixed once the cloud
/// has been sampled.
#[derive(Debug)]
pub struct PointCloud {
    pub particles: Vec<Particle>,
    /// Largest squared particle speed seen by the last update.
    pub max_velocity: T,
}

impl PointCloud {
    /// Fills `entities` with particles of the configured diameter and density.
    ///
    /// Particles are shared out between the entities in proportion to their volume, and
    /// scattered inside each one by rejection sampling from its bounding box with a seeded
    /// generator, so the same entities always give the same cloud.
    pub fn sample(entities: &[Entity], params: &SimulationParameters) -> Result<PointCloud> {
        let eps = params.volume_epsilon;

        if let Some((index, entity)) = entities
            .iter()
            .enumerate()
            .find(|(_, e)| !e.is_well_formed())
        {
            return Err(SimulationError::InvalidParameters(format!(
                "entity {} has a negative or non-finite size: {:?}",
                index, entity.shape
            )));
        }

        let mut volume = 0.;
        let mut num_shapes = 0;
        for entity in entities {
            let v = entity.volume();
            if v > eps {
                num_shapes += 1;
                volume += v;
            } else {
                tracing::warn!(
                    centroid = ?entity.centroid(),
                    "ignoring entity with volume {}",
                    v
                );
            }
        }

        // A snow simulation cannot be done if there is no volume
        if volume < eps {
            return Err(SimulationError::NoVolume { total: volume });
        }

        let particle_volume = params.particle_volume();
        let particle_mass = params.particle_mass();
        let lambda = params.elasticity.lambda;
        let mu = params.elasticity.mu;

        let num_particles = (volume / particle_volume) as usize;
        let mut particles = Vec::with_capacity(num_particles);

        let mut max_velocity: T = 0.;
        let mut shape_num = 0;
        let mut total_points = 0;

        for entity in entities {
            max_velocity = max_velocity.max(length_squared(&entity.velocity));

            let v = entity.volume();
            if v <= eps {
                continue;
            }

            shape_num += 1;
            // Last shape gets the remainder, so we don't have round-off errors
            let points = if shape_num < num_shapes {
                (v * num_particles as T / volume) as usize
            } else {
                num_particles - total_points
            };
            total_points += points;

            let mut rng = StdRng::seed_from_u64(params.seed);
            let bounds = entity.bounds();

            let mut points_found = 0;
            while points_found != points {
                let candidate = random_point(&mut rng, &bounds);
                if entity.contains(&candidate) {
                    particles.push(Particle::new(
                        candidate,
                        entity.velocity,
                        particle_mass,
                        lambda,
                        mu,
                    ));
                    points_found += 1;
                }
            }
        }

        tracing::debug!(
            "sampled {} particles from {} entities ({} m^3)",
            particles.len(),
            num_shapes,
            volume
        );

        Ok(PointCloud {
            particles,
            max_velocity,
        })
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Advects every particle and updates its deformation, once the grid has handed back
    /// the new velocities.
    pub fn update(&mut self, delta_time: T, plasticity: &SnowPlasticity) -> Result<()> {
        self.particles.par_iter_mut().for_each(|p| {
            p.update_pos(delta_time);
            p.update_gradient(delta_time);
            p.apply_plasticity(plasticity);
        });

        if let Some(particle) = self
            .particles
            .iter()
            .position(|p| !is_finite(&p.position) || !is_finite(&p.velocity))
        {
            return Err(SimulationError::NonFinite { particle });
        }

        self.max_velocity = self
            .particles
            .iter()
            .map(|p| length_squared(&p.velocity))
            .fold(0., T::max);

        Ok(())
    }

    /// The axis-aligned bounding box of all particle positions.
    pub fn bounds(&self) -> Option<Range<TV>> {
        let first = self.particles.first()?.position;

        Some(self.particles.iter().fold(first..first, |b, p| {
            b.start.inf(&p.position)..b.end.sup(&p.position)
        }))
    }
}

fn random_point<R: Rng>(rng: &mut R, bounds: &Range<TV>) -> TV {
    let rand: TV = rng.gen::<[T; 3]>().into();
    bounds.start + rand.component_mul(&(bounds.end - bounds.start))
}
