pub mod collisions;
mod data;
mod particle_grid_weights;

pub use data::{GridData, StencilIter};
pub use particle_grid_weights::{
    kernel, kernel_derivative, StencilWeights, BSPLINE_EPSILON, BSPLINE_RADIUS, STENCIL_SIZE,
    STENCIL_WIDTH,
};

use super::parameters::SimulationParameters;
use super::point_cloud::PointCloud;
use crate::error::{Result, SimulationError};
use crate::math::{outer, Mat, T, TV};
use collisions::{collide_node, collide_particle};
use rayon::prelude::*;

/// An inertia-like tensor whose determinant is below this fraction of `|D|^3` is treated as
/// singular.
const SINGULAR_TOLERANCE: T = 1e-10;

/// State stored on each grid node. Cleared at the start of every step.
#[derive(Debug, Clone, Copy)]
pub struct GridNode {
    pub mass: T,
    /// Whether any particle has a non-zero weight on this node this step.
    pub active: bool,
    /// Velocity transferred from the particles.
    pub velocity: TV,
    /// Holds the internal force while forces are accumulated, then the velocity after
    /// integration.
    pub velocity_new: TV,
}

impl Default for GridNode {
    fn default() -> Self {
        GridNode {
            mass: 0.,
            active: false,
            velocity: TV::zeros(),
            velocity_new: TV::zeros(),
        }
    }
}

/// The static background grid of the simulation.
///
/// The grid never owns the particles; every phase borrows the `PointCloud` it works on.
/// Phases must run in the order the `Simulator` calls them, each one reads what the
/// previous one wrote.
#[derive(Debug)]
pub struct MpmGrid {
    pub nodes: Vec<GridNode>,
    /// APIC: world position of every node. Kept apart from `nodes` so that it survives
    /// clearing the grid.
    pub node_positions: Vec<TV>,
    pub data: GridData,
}

impl MpmGrid {
    pub fn new(params: &SimulationParameters) -> Self {
        let data = GridData::new(params.domain.clone(), params.resolution);

        tracing::info!(
            "Using Grid w/ Size: [{}, {}, {}] and {} nodes",
            data.size.x,
            data.size.y,
            data.size.z,
            data.num_nodes
        );

        let node_positions = (0..data.num_nodes)
            .map(|i| data.coord_to_pos(data.index_to_coord(i)))
            .collect();

        MpmGrid {
            nodes: vec![GridNode::default(); data.num_nodes],
            node_positions,
            data,
        }
    }

    /// Fills each node with zeros.
    pub fn clear_grid(&mut self) {
        self.nodes.fill(GridNode::default());
    }

    pub fn total_mass(&self) -> T {
        self.nodes.iter().map(|n| n.mass).sum()
    }

    /// Momentum carried by the transferred node velocities.
    pub fn total_momentum(&self) -> TV {
        self.nodes
            .iter()
            .filter(|n| n.active)
            .map(|n| n.mass * n.velocity)
            .sum()
    }

    /// Refreshes every particle's grid position and stencil weights, then splats particle
    /// mass onto the grid.
    pub fn rasterize_mass(&mut self, cloud: &mut PointCloud) -> Result<()> {
        self.clear_grid();

        let data = &self.data;
        cloud.particles.par_iter_mut().for_each(|p| {
            p.grid_position = data.grid_position(&p.position);
            if let Some(base) = data.stencil_base(&p.grid_position) {
                data.compute_weights(&p.grid_position, base, &mut p.stencil);
            }
        });

        if let Some(particle) = cloud
            .particles
            .iter()
            .position(|p| data.stencil_base(&p.grid_position).is_none())
        {
            return Err(SimulationError::ParticleOutOfBounds {
                particle,
                grid_position: cloud.particles[particle].grid_position,
            });
        }

        for p in &cloud.particles {
            for (n, &w) in data.stencil(p.stencil.base).zip(p.stencil.weights.iter()) {
                let node = &mut self.nodes[n];
                node.mass += w * p.mass;
                if w > 0. {
                    node.active = true;
                }
            }
        }

        Ok(())
    }

    /// APIC: computes the inertia-like tensor `D` of every particle and stores its inverse.
    /// A particle whose `D` cannot be inverted transfers no affine velocity this step.
    pub fn compute_inertia_tensors(&self, cloud: &mut PointCloud) {
        let data = &self.data;
        let positions = &self.node_positions;

        cloud.particles.par_iter_mut().for_each(|p| {
            let mut d = Mat::zeros();
            for (n, &w) in data.stencil(p.stencil.base).zip(p.stencil.weights.iter()) {
                if w > BSPLINE_EPSILON {
                    let offset = positions[n] - p.position;
                    d += w * outer(&offset, &offset);
                }
            }

            p.inertia_tensor_inverse = invert_inertia_tensor(&d);

            if p.inertia_tensor_inverse.is_none() {
                tracing::trace!(
                    position = ?p.position,
                    "singular inertia tensor, skipping affine transfer"
                );
            }
        });
    }

    /// Splats particle momentum onto the grid and converts it to node velocities.
    pub fn transfer_velocities(&mut self, cloud: &PointCloud) {
        let MpmGrid {
            nodes,
            node_positions,
            data,
        } = self;

        for p in &cloud.particles {
            // APIC: the velocity derivative C = B * D^-1
            let affine = p.inertia_tensor_inverse.map(|d_inv| p.affine_state * d_inv);

            for (n, &w) in data.stencil(p.stencil.base).zip(p.stencil.weights.iter()) {
                if w > BSPLINE_EPSILON {
                    let mut velocity = p.velocity;
                    if let Some(c) = &affine {
                        velocity += c * (node_positions[n] - p.position);
                    }
                    nodes[n].velocity += w * p.mass * velocity;
                }
            }
        }

        // Walls are handled once, on the integrated velocity
        nodes.par_iter_mut().for_each(|node| {
            if node.active {
                node.velocity /= node.mass;
            }
        });
    }

    /// Estimates each particle's density and volume from the rasterized mass. Only run once,
    /// right after the particles have been sampled.
    pub fn estimate_volumes(&self, cloud: &mut PointCloud) {
        cloud.particles.par_iter_mut().for_each(|p| {
            p.density = self.interpolate_density(p.stencil.base, &p.stencil.weights);
            p.volume = p.mass / p.density;
            p.affine_state = Mat::zeros();
        });
    }

    /// Applies the internal elastic forces and gravity to the node velocities with an
    /// explicit Euler step.
    pub fn integrate_forces(&mut self, cloud: &PointCloud, params: &SimulationParameters) {
        let energies: Vec<Mat> = cloud
            .particles
            .par_iter()
            .map(|p| p.energy_derivative(&params.plasticity))
            .collect();

        let MpmGrid { nodes, data, .. } = self;

        // The force is accumulated in velocity_new, which is free until the integration below
        for (p, energy) in cloud.particles.iter().zip(&energies) {
            let stencil = &p.stencil;
            for (i, n) in data.stencil(stencil.base).enumerate() {
                if stencil.weights[i] > BSPLINE_EPSILON {
                    nodes[n].velocity_new += energy * stencil.gradients[i];
                }
            }
        }

        let data = &*data;
        let delta_time = params.delta_time;
        let gravity = params.gravity;
        nodes.par_iter_mut().enumerate().for_each(|(i, node)| {
            if node.active {
                node.velocity_new =
                    node.velocity + delta_time * (gravity - node.velocity_new / node.mass);

                let coord = data.index_to_coord(i).cast::<T>();
                collide_node(
                    data,
                    &coord,
                    &mut node.velocity_new,
                    delta_time,
                    params.sticky,
                );
            }
        });
    }

    /// APIC: rebuilds each particle's affine matrix `B` from the new node velocities, for use
    /// by the next step's velocity transfer.
    pub fn update_affine_state(&self, cloud: &mut PointCloud) {
        let data = &self.data;
        let nodes = &self.nodes;
        let positions = &self.node_positions;

        cloud.particles.par_iter_mut().for_each(|p| {
            let mut affine = Mat::zeros();
            for (n, &w) in data.stencil(p.stencil.base).zip(p.stencil.weights.iter()) {
                if w > BSPLINE_EPSILON {
                    affine += w * outer(&nodes[n].velocity_new, &(positions[n] - p.position));
                }
            }
            p.affine_state = affine;
        });
    }

    /// Interpolates the new node velocities back onto the particles, along with the velocity
    /// gradient and the density, then bounces particles off the walls.
    pub fn transfer_to_particles(&self, cloud: &mut PointCloud, params: &SimulationParameters) {
        let data = &self.data;
        let nodes = &self.nodes;

        cloud.particles.par_iter_mut().for_each(|p| {
            let stencil = &p.stencil;
            let mut velocity = TV::zeros();
            let mut gradient = Mat::zeros();

            for (i, n) in data.stencil(stencil.base).enumerate() {
                let w = stencil.weights[i];
                if w > BSPLINE_EPSILON {
                    let node = &nodes[n];
                    velocity += w * node.velocity_new;
                    gradient += outer(&node.velocity_new, &stencil.gradients[i]);
                }
            }

            p.velocity = velocity;
            p.velocity_gradient = gradient;
            p.density = self.interpolate_density(stencil.base, &stencil.weights);

            collide_particle(
                data,
                &p.grid_position,
                &mut p.velocity,
                params.delta_time,
                params.sticky,
            );
        });
    }

    fn interpolate_density(&self, base: crate::math::UV, weights: &[T; STENCIL_SIZE]) -> T {
        let mass: T = self
            .data
            .stencil(base)
            .zip(weights.iter())
            .filter(|&(_, &w)| w > BSPLINE_EPSILON)
            .map(|(n, &w)| w * self.nodes[n].mass)
            .sum();

        mass / self.data.node_volume
    }
}

fn invert_inertia_tensor(d: &Mat) -> Option<Mat> {
    let scale = d.norm();
    if !(d.determinant().abs() > SINGULAR_TOLERANCE * scale * scale * scale) {
        return None;
    }

    d.try_inverse()
        .filter(|inv| inv.iter().all(|x| x.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;
    use crate::math::UV;
    use crate::mpm::particle::Particle;

    fn coarse_params() -> SimulationParameters {
        SimulationParameters {
            particle_diameter: 0.02,
            resolution: UV::new(64, 32, 32),
            ..SimulationParameters::default()
        }
    }

    fn setup(velocity: TV) -> (MpmGrid, PointCloud, SimulationParameters) {
        let params = coarse_params();
        let ball = Entity::sphere(TV::new(1., 0.5, 0.5), 0.1, velocity);
        let mut cloud = PointCloud::sample(std::slice::from_ref(&ball), &params).unwrap();
        let mut grid = MpmGrid::new(&params);

        grid.rasterize_mass(&mut cloud).unwrap();
        grid.estimate_volumes(&mut cloud);

        (grid, cloud, params)
    }

    #[test]
    fn test_node_positions() {
        let params = coarse_params();
        let grid = MpmGrid::new(&params);
        let idx = grid.data.coord_to_index(UV::new(3, 2, 1));
        assert!((grid.node_positions[idx] - TV::new(3., 2., 1.) / 32.).norm() < 1e-15);
        assert_eq!(grid.nodes.len(), 65 * 33 * 33);
    }

    #[test]
    fn test_mass_conservation() {
        let (grid, cloud, _) = setup(TV::zeros());

        // every particle hands over exactly its own stencil's share of its mass
        let splatted: T = cloud
            .particles
            .iter()
            .map(|p| p.mass * p.stencil.weights.iter().sum::<T>())
            .sum();
        assert!((grid.total_mass() - splatted).abs() < 1e-12 * splatted);

        // the clamped kernel tails only lose a sliver of it
        let particle_mass: T = cloud.particles.iter().map(|p| p.mass).sum();
        let deficit = (particle_mass - grid.total_mass()) / particle_mass;
        assert!(deficit >= -1e-12 && deficit < 3. * BSPLINE_EPSILON, "deficit {}", deficit);

        assert!(grid.nodes.iter().all(|n| !n.active || n.mass > 0.));
    }

    #[test]
    fn test_rasterize_rejects_escaped_particles() {
        let (mut grid, mut cloud, _) = setup(TV::zeros());
        cloud.particles[7].position = TV::new(1., 0.01, 0.5);

        match grid.rasterize_mass(&mut cloud) {
            Err(SimulationError::ParticleOutOfBounds { particle, .. }) => assert_eq!(particle, 7),
            other => panic!("expected out of bounds error, got {:?}", other),
        }
    }

    #[test]
    fn test_initial_volumes() {
        let (_, cloud, params) = setup(TV::zeros());
        for p in &cloud.particles {
            assert!(p.density > 0.);
            assert!(p.volume > 0. && p.volume.is_finite());
            assert_eq!(p.affine_state, Mat::zeros());
        }

        // deep inside the ball the estimate should be close to the material density
        let center = TV::new(1., 0.5, 0.5);
        let inner: Vec<_> = cloud
            .particles
            .iter()
            .filter(|p| (p.position - center).norm() < 0.03)
            .collect();
        assert!(!inner.is_empty());
        let mean = inner.iter().map(|p| p.density).sum::<T>() / inner.len() as T;
        assert!((mean - params.density).abs() < 0.2 * params.density, "mean density {}", mean);
    }

    #[test]
    fn test_inertia_tensor() {
        let (grid, mut cloud, params) = setup(TV::zeros());
        grid.compute_inertia_tensors(&mut cloud);

        // for the cubic B-spline D = h^2 / 3 * I, up to the clamped tails
        let h = params.cell_size().x;
        let expected = Mat::identity() * (3. / (h * h));
        for p in &cloud.particles {
            let d_inv = p.inertia_tensor_inverse.unwrap();
            assert!((d_inv - expected).norm() < 0.01 * expected.norm());
        }
    }

    #[test]
    fn test_uniform_velocity_transfer() {
        let velocity = TV::new(0.5, -10., 2.);
        let (mut grid, mut cloud, _) = setup(velocity);
        grid.rasterize_mass(&mut cloud).unwrap();
        grid.compute_inertia_tensors(&mut cloud);
        grid.transfer_velocities(&cloud);

        // a rigid translation is carried over, up to the weights too small to transfer
        let center = TV::new(1., 0.5, 0.5);
        let mut checked = 0;
        for (node, pos) in grid.nodes.iter().zip(&grid.node_positions) {
            if (pos - center).norm() < 0.05 {
                assert!(node.active);
                assert!((node.velocity - velocity).norm() < 1e-2 * velocity.norm());
                checked += 1;
            }
        }
        assert!(checked > 0);

        let momentum: TV = cloud.particles.iter().map(|p| p.mass * p.velocity).sum();
        let carried = grid.total_momentum();
        assert!((carried - momentum).norm() < 2e-3 * momentum.norm());
        assert!(carried.norm() <= momentum.norm());
    }

    #[test]
    fn test_singular_inertia_tensor_falls_back_to_pic() {
        let params = coarse_params();
        let mut grid = MpmGrid::new(&params);
        let velocity = TV::new(1., -2., 0.5);
        let mut cloud = PointCloud {
            particles: vec![Particle::new(
                TV::new(1.01, 0.507, 0.493),
                velocity,
                1e-3,
                params.elasticity.lambda,
                params.elasticity.mu,
            )],
            max_velocity: 0.,
        };
        grid.rasterize_mass(&mut cloud).unwrap();

        // support on a single node makes D rank one
        let kept = 21;
        let p = &mut cloud.particles[0];
        let w = p.stencil.weights[kept];
        assert!(w > BSPLINE_EPSILON);
        p.stencil.weights = [0.; STENCIL_SIZE];
        p.stencil.weights[kept] = w;
        p.affine_state = Mat::identity() * 3.;

        grid.compute_inertia_tensors(&mut cloud);
        assert!(cloud.particles[0].inertia_tensor_inverse.is_none());

        grid.transfer_velocities(&cloud);
        let n = grid.data.stencil(cloud.particles[0].stencil.base).nth(kept).unwrap();
        let node = &grid.nodes[n];
        assert!(node.velocity.iter().all(|x| x.is_finite()));
        assert!((node.velocity - velocity).norm() < 1e-12);
        assert!(grid.nodes.iter().all(|n| n.velocity.iter().all(|x| x.is_finite())));
    }

    #[test]
    fn test_inverting_inertia_tensors() {
        let d = Mat::identity() * 1e-4;
        assert!((invert_inertia_tensor(&d).unwrap() - Mat::identity() * 1e4).norm() < 1e-8);
        assert!(invert_inertia_tensor(&Mat::zeros()).is_none());

        let offset = TV::new(0.3, -0.7, 0.11);
        assert!(invert_inertia_tensor(&(0.2 * outer(&offset, &offset))).is_none());
    }

    #[test]
    fn test_wall_nodes_stick_once() {
        let velocity = TV::new(1., 0., 1.);
        let params = coarse_params();
        let ball = Entity::sphere(TV::new(1., 0.12, 0.5), 0.05, velocity);
        let mut cloud = PointCloud::sample(std::slice::from_ref(&ball), &params).unwrap();
        let mut grid = MpmGrid::new(&params);
        grid.rasterize_mass(&mut cloud).unwrap();
        grid.estimate_volumes(&mut cloud);

        grid.compute_inertia_tensors(&mut cloud);
        grid.transfer_velocities(&cloud);
        grid.integrate_forces(&cloud, &params);

        let mut checked = 0;
        for (i, node) in grid.nodes.iter().enumerate() {
            let coord = grid.data.index_to_coord(i);
            if node.active && coord.y == 1 && node.velocity.x > 0.1 {
                // the transfer leaves the wall alone, the integrated velocity sticks once
                assert!(node.velocity.y.abs() < 1e-12);
                assert_eq!(node.velocity_new.y, 0.);
                assert!((node.velocity_new.x - params.sticky * node.velocity.x).abs() < 1e-9);
                assert!((node.velocity_new.z - params.sticky * node.velocity.z).abs() < 1e-9);
                checked += 1;
            }
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_free_fall_step() {
        let (mut grid, mut cloud, params) = setup(TV::zeros());
        grid.rasterize_mass(&mut cloud).unwrap();
        grid.compute_inertia_tensors(&mut cloud);
        grid.transfer_velocities(&cloud);
        grid.integrate_forces(&cloud, &params);
        grid.update_affine_state(&mut cloud);
        grid.transfer_to_particles(&mut cloud, &params);

        let dv = params.delta_time * params.gravity.y;
        for p in &cloud.particles {
            assert!(p.velocity.y < 0.);
            assert!(p.velocity.y >= dv * (1. + 1e-9));
            assert!(p.velocity.x.abs() < 1e-12 && p.velocity.z.abs() < 1e-12);
            assert!(p.density > 0.);
        }
    }
}
