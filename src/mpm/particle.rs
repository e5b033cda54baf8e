use super::grid::StencilWeights;
use super::models::SnowPlasticity;
use crate::math::{diag_product, diag_product_inv, diag_sum, Mat, T, TV};

/// The state carried by a single material point.
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: TV,
    pub velocity: TV,
    pub mass: T,
    /// Recomputed from the grid every step; only used for shading.
    pub density: T,
    /// Estimated once, when the simulation is created.
    pub volume: T,
    pub velocity_gradient: Mat,

    /// Elastic and plastic parts of the deformation gradient, `F = Fe * Fp`.
    pub def_elastic: Mat,
    pub def_plastic: Mat,

    // SVD of `def_elastic` after the plasticity clamp, `Fe = U * diag(sigma) * V^T`
    pub svd_u: Mat,
    pub svd_v: Mat,
    pub svd_sigma: TV,

    /// APIC: the affine matrix `B`. The velocity derivative `C` equals `B * D^-1`.
    pub affine_state: Mat,
    /// APIC: `D^-1`, or `None` when the inertia-like tensor is singular this step.
    pub inertia_tensor_inverse: Option<Mat>,

    /// Lamé parameters
    pub lambda: T,
    pub mu: T,

    /// Position in grid space, refreshed at the start of each step.
    pub grid_position: TV,
    pub stencil: StencilWeights,
}

impl Particle {
    pub fn new(position: TV, velocity: TV, mass: T, lambda: T, mu: T) -> Self {
        Particle {
            position,
            velocity,
            mass,
            density: 0.,
            volume: 0.,
            velocity_gradient: Mat::zeros(),
            def_elastic: Mat::identity(),
            def_plastic: Mat::identity(),
            svd_u: Mat::identity(),
            svd_v: Mat::identity(),
            svd_sigma: TV::from_element(1.),
            affine_state: Mat::zeros(),
            inertia_tensor_inverse: None,
            lambda,
            mu,
            grid_position: TV::zeros(),
            stencil: StencilWeights::default(),
        }
    }

    /// Explicit Euler advection.
    pub fn update_pos(&mut self, delta_time: T) {
        self.position += delta_time * self.velocity;
    }

    /// Applies the step's velocity gradient to the elastic deformation. The whole update is
    /// elastic at first; `apply_plasticity` moves the excess into the plastic part.
    pub fn update_gradient(&mut self, delta_time: T) {
        self.velocity_gradient *= delta_time;
        diag_sum(&mut self.velocity_gradient, 1.);
        self.def_elastic = self.velocity_gradient * self.def_elastic;
    }

    /// Clamps the singular values of the elastic deformation into the elastic region and
    /// pushes the remainder into the plastic deformation.
    pub fn apply_plasticity(&mut self, plasticity: &SnowPlasticity) {
        let svd = self.def_elastic.svd(true, true);
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => unreachable!("SVD was asked for both U and V"),
        };

        let sigma = svd.singular_values.map(|s| plasticity.clamp(s));

        // Fp = V * sigma^-1 * U^T * Fe * Fp
        let mut sigma_inv_u_t = u.transpose();
        diag_product_inv(&mut sigma_inv_u_t, &sigma);
        self.def_plastic = v_t.transpose() * sigma_inv_u_t * self.def_elastic * self.def_plastic;

        // Fe = U * sigma * V^T
        let mut sigma_v_t = v_t;
        diag_product(&mut sigma_v_t, &sigma);
        self.def_elastic = u * sigma_v_t;

        self.svd_u = u;
        self.svd_v = v_t.transpose();
        self.svd_sigma = sigma;
    }

    /// The stress-like matrix that, multiplied by a weight gradient, gives the internal force
    /// this particle exerts on a node. Uses the SVD cached by the last `apply_plasticity`.
    pub fn energy_derivative(&self, plasticity: &SnowPlasticity) -> Mat {
        let rotation = self.svd_u * self.svd_v.transpose();
        let mut energy =
            2. * self.mu * (self.def_elastic - rotation) * self.def_elastic.transpose();

        // Je is the determinant of def_elastic
        let je = self.svd_sigma.iter().product::<T>();
        diag_sum(&mut energy, self.lambda * je * (je - 1.));

        let jp = self.def_plastic.determinant();
        energy * self.volume * plasticity.hardening_factor(jp)
    }
}
