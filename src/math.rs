//! Small linear algebra helpers shared by the grid and the particles.

use std::ops::Range;

pub const DIM: usize = 3;

pub type T = f64;
pub type TV = na::SVector<T, DIM>;
pub type UV = na::SVector<usize, DIM>;

pub type Mat = na::SMatrix<T, DIM, DIM>;

/// The outer product `a * b^T`.
pub fn outer(a: &TV, b: &TV) -> Mat {
    a * b.transpose()
}

/// Adds `c` to every diagonal entry of `m`.
pub fn diag_sum(m: &mut Mat, c: T) {
    for i in 0..DIM {
        m[(i, i)] += c;
    }
}

/// Scales row `i` of `m` by `v[i]`, i.e. computes `diag(v) * m` in place.
pub fn diag_product(m: &mut Mat, v: &TV) {
    for i in 0..DIM {
        for j in 0..DIM {
            m[(i, j)] *= v[i];
        }
    }
}

/// Divides row `i` of `m` by `v[i]`, i.e. computes `diag(v)^-1 * m` in place.
pub fn diag_product_inv(m: &mut Mat, v: &TV) {
    for i in 0..DIM {
        for j in 0..DIM {
            m[(i, j)] /= v[i];
        }
    }
}

/// Product of the components of `v`.
pub fn component_product(v: &TV) -> T {
    v.iter().product()
}

pub fn length_squared(v: &TV) -> T {
    v.dot(v)
}

/// Componentwise `a / b`.
pub fn division(a: &TV, b: &TV) -> TV {
    a.component_div(b)
}

pub fn add_const(v: &TV, c: T) -> TV {
    v.add_scalar(c)
}

pub fn is_finite(v: &TV) -> bool {
    v.iter().all(|x| x.is_finite())
}

/// `num` evenly spaced samples over `[start, end]`.
pub fn linspace(start: T, end: T, num: usize) -> impl Iterator<Item = T> {
    let step = if num > 1 {
        (end - start) / (num - 1) as T
    } else {
        0.
    };
    (0..num).map(move |i| start + i as T * step)
}

pub trait RangeExt {
    fn size(&self) -> TV;

    fn center(&self) -> TV;

    fn contains_point(&self, x: &TV) -> bool;
}

impl RangeExt for Range<TV> {
    fn size(&self) -> TV {
        self.end - self.start
    }

    fn center(&self) -> TV {
        0.5 * (self.start + self.end)
    }

    /// Note that this does _not_ treat the range as exclusive, and returns true at `self.end`.
    fn contains_point(&self, x: &TV) -> bool {
        (0..DIM).all(|i| self.start[i] <= x[i] && x[i] <= self.end[i])
    }
}
