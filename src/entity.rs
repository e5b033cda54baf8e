use crate::math::{is_finite, length_squared, RangeExt, T, TV};
use std::ops::Range;

/// The closed set of shapes a scene can be built from.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Shape {
    Sphere { center: TV, radius: T },
    Cube { center: TV, half_extents: TV },
}

/// A region of snow to be filled with particles, moving with an initial velocity.
///
/// Entities only exist while a scene is being sampled; the running simulation never sees
/// them.
#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Entity {
    pub shape: Shape,
    pub velocity: TV,
}

impl Entity {
    pub fn sphere(center: TV, radius: T, velocity: TV) -> Self {
        Entity {
            shape: Shape::Sphere { center, radius },
            velocity,
        }
    }

    /// A box with the given full edge lengths.
    pub fn cube(center: TV, edge_lengths: TV, velocity: TV) -> Self {
        Entity {
            shape: Shape::Cube {
                center,
                half_extents: 0.5 * edge_lengths,
            },
            velocity,
        }
    }

    /// A cube with the same edge length along every axis.
    pub fn cube_uniform(center: TV, edge_length: T, velocity: TV) -> Self {
        Self::cube(center, TV::from_element(edge_length), velocity)
    }

    /// Whether `point` is inside the shape. The boundary counts as inside.
    pub fn contains(&self, point: &TV) -> bool {
        match &self.shape {
            Shape::Sphere { center, radius } => length_squared(&(point - center)) <= radius * radius,
            Shape::Cube {
                center,
                half_extents,
            } => (point - center)
                .iter()
                .zip(half_extents.iter())
                .all(|(d, h)| d.abs() <= *h),
        }
    }

    pub fn volume(&self) -> T {
        match &self.shape {
            Shape::Sphere { radius, .. } => 4. / 3. * std::f64::consts::PI * radius.powi(3),
            Shape::Cube { half_extents, .. } => 8. * half_extents.iter().product::<T>(),
        }
    }

    /// The axis-aligned bounding box of the shape.
    pub fn bounds(&self) -> Range<TV> {
        let (center, half) = match &self.shape {
            Shape::Sphere { center, radius } => (center, TV::from_element(*radius)),
            Shape::Cube {
                center,
                half_extents,
            } => (center, *half_extents),
        };

        center - half..center + half
    }

    /// Whether the shape has a finite center and a finite, non-negative size. Rejection
    /// sampling never finishes for shapes that fail this.
    pub fn is_well_formed(&self) -> bool {
        match &self.shape {
            Shape::Sphere { center, radius } => {
                is_finite(center) && radius.is_finite() && *radius >= 0.
            }
            Shape::Cube {
                center,
                half_extents,
            } => {
                is_finite(center)
                    && is_finite(half_extents)
                    && half_extents.iter().all(|&h| h >= 0.)
            }
        }
    }

    /// Both shapes are symmetric, so this is the middle of the bounding box.
    pub fn centroid(&self) -> TV {
        self.bounds().center()
    }
}
