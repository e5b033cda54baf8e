use super::data::GridData;
use crate::math::{division, T, TV, UV};

/// Radius of the cubic B-spline, in cells.
pub const BSPLINE_RADIUS: usize = 2;
/// Kernel values below this are treated as zero.
pub const BSPLINE_EPSILON: T = 1e-4;
/// Nodes per axis touched by a particle.
pub const STENCIL_WIDTH: usize = 2 * BSPLINE_RADIUS;
/// Nodes touched by a particle.
pub const STENCIL_SIZE: usize = STENCIL_WIDTH * STENCIL_WIDTH * STENCIL_WIDTH;

/// The cubic kernel function N(x) described in Eqn. (122), pg. 33
/// MPM SIGGRAPH Course Notes 2016
///
/// Values below `BSPLINE_EPSILON` are clamped to zero.
pub fn kernel(x: T) -> T {
    let x = x.abs();
    let w = if x < 1. {
        x * x * (x / 2. - 1.) + 2. / 3.
    } else if x < 2. {
        x * (x * (-x / 6. + 1.) - 2.) + 4. / 3.
    } else {
        return 0.;
    };

    if w < BSPLINE_EPSILON {
        0.
    } else {
        w
    }
}

/// The derivative of the cubic kernel function, N'(x).
///
/// N(x) = 1/2*|x|^3 - |x|^2 + 2/3    0 <= |x| < 1
///        1/6(2 - |x|)^3             1 <= |x| < 2
///        0                          2 <= |x|
///
/// N'(x) = 3/2 x|x| - 2x             0 <= |x| < 1
///         -x|x|/2 + 2x - 2x/|x|     1 <= |x| < 2
///         0                         2 <= |x|
///
/// The outer branch tests `|x|`, so N' is odd everywhere.
pub fn kernel_derivative(x: T) -> T {
    let abs_x = x.abs();

    if abs_x < 1. {
        1.5 * x * abs_x - 2. * x
    } else if abs_x < 2. {
        -x * abs_x / 2. + 2. * x - 2. * x / abs_x
    } else {
        0.
    }
}

/// Interpolation weights between one particle and the 4x4x4 block of nodes around it.
///
/// Entries are ordered y-outer, z-middle, x-inner, matching `GridData::stencil`.
#[derive(Debug, Clone)]
pub struct StencilWeights {
    /// Coordinate of the first node of the stencil.
    pub base: UV,
    pub weights: [T; STENCIL_SIZE],
    pub gradients: [TV; STENCIL_SIZE],
}

impl Default for StencilWeights {
    fn default() -> Self {
        StencilWeights {
            base: UV::zeros(),
            weights: [0.; STENCIL_SIZE],
            gradients: [TV::zeros(); STENCIL_SIZE],
        }
    }
}

impl GridData {
    /// Converts a world position into fractional grid coordinates.
    pub fn grid_position(&self, pos: &TV) -> TV {
        division(&(pos - self.origin), &self.cell_size)
    }

    /// The first node of the stencil around `grid_position`, if the whole stencil lies
    /// inside the grid.
    pub fn stencil_base(&self, grid_position: &TV) -> Option<UV> {
        let mut base = UV::zeros();
        for i in 0..3 {
            let g = grid_position[i];
            // also rejects NaN
            if !(g >= 1. && g < (self.size[i] - BSPLINE_RADIUS) as T) {
                return None;
            }
            base[i] = g.floor() as usize - 1;
        }
        Some(base)
    }

    /// Fills in the weights and weight gradients of the stencil starting at `base` for a
    /// particle at `grid_position`.
    pub fn compute_weights(&self, grid_position: &TV, base: UV, out: &mut StencilWeights) {
        out.base = base;

        let mut w = [[0.; STENCIL_WIDTH]; 3];
        let mut dw = [[0.; STENCIL_WIDTH]; 3];
        for axis in 0..3 {
            for k in 0..STENCIL_WIDTH {
                let x = grid_position[axis] - (base[axis] + k) as T;
                w[axis][k] = kernel(x);
                dw[axis][k] = kernel_derivative(x);
            }
        }

        let h = &self.cell_size;
        let mut idx = 0;
        for y in 0..STENCIL_WIDTH {
            for z in 0..STENCIL_WIDTH {
                for x in 0..STENCIL_WIDTH {
                    let (wx, wy, wz) = (w[0][x], w[1][y], w[2][z]);
                    out.weights[idx] = wx * wy * wz;
                    out.gradients[idx] = TV::new(
                        dw[0][x] * wy * wz / h.x,
                        wx * dw[1][y] * wz / h.y,
                        wx * wy * dw[2][z] / h.z,
                    );
                    idx += 1;
                }
            }
        }
    }
}
