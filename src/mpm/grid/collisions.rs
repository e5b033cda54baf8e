//! Sticky collision response against the walls of the box domain.
//!
//! Both responses look one time step ahead: a node (or particle) whose predicted grid
//! position lands in the wall margin has its velocity corrected along that axis.

use super::data::GridData;
use super::particle_grid_weights::BSPLINE_RADIUS;
use crate::math::{add_const, division, T, TV};

/// Grid-side response. If the node at `coord` would move within `BSPLINE_RADIUS` cells of
/// a wall, the velocity component along that axis is zeroed and the other two are scaled
/// by `sticky`.
pub fn collide_node(data: &GridData, coord: &TV, velocity: &mut TV, delta_time: T, sticky: T) {
    let new_pos = coord + division(velocity, &data.cell_size) * delta_time;
    let margin = BSPLINE_RADIUS as T;
    let upper = add_const(&data.size.cast::<T>(), -margin - 1.);

    for axis in 0..3 {
        if new_pos[axis] < margin || new_pos[axis] > upper[axis] {
            for other in 0..3 {
                if other == axis {
                    velocity[other] = 0.;
                } else {
                    velocity[other] *= sticky;
                }
            }
        }
    }
}

/// Particle-side response. A particle at `grid_position` that would cross the wall margin
/// bounces back along that axis, losing `1 - sticky` of its speed.
pub fn collide_particle(
    data: &GridData,
    grid_position: &TV,
    velocity: &mut TV,
    delta_time: T,
    sticky: T,
) {
    let new_pos = grid_position + division(velocity, &data.cell_size) * delta_time;
    let lower = (BSPLINE_RADIUS - 1) as T;
    let upper = add_const(&data.size.cast::<T>(), -(BSPLINE_RADIUS as T));

    for axis in 0..3 {
        if new_pos[axis] < lower || new_pos[axis] > upper[axis] {
            velocity[axis] = -sticky * velocity[axis];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::UV;

    fn grid() -> GridData {
        // unit cells, 11 nodes per axis
        GridData::new(TV::zeros()..TV::from_element(10.), UV::new(10, 10, 10))
    }

    #[test]
    fn test_interior_node_is_untouched() {
        let grid = grid();
        let mut v = TV::new(1., -2., 3.);
        collide_node(&grid, &TV::new(5., 5., 5.), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::new(1., -2., 3.));
    }

    #[test]
    fn test_floor_node_sticks() {
        let grid = grid();
        let mut v = TV::new(1., -2., 3.);
        collide_node(&grid, &TV::new(5., 2.1, 5.), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::new(0.5, 0., 1.5));

        // moving away from the floor, but still inside the margin
        let mut v = TV::new(0., 0.5, 0.);
        collide_node(&grid, &TV::new(5., 1., 5.), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::zeros());
    }

    #[test]
    fn test_corner_node() {
        let grid = grid();
        let mut v = TV::new(4., 4., 4.);
        // upper bound on each axis is 11 - 2 - 1 = 8
        collide_node(&grid, &TV::new(8., 8., 5.), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::new(0., 0., 1.));
    }

    #[test]
    fn test_particle_bounce() {
        let grid = grid();
        let mut v = TV::new(-20., 0., 20.);
        collide_particle(&grid, &TV::new(2., 5., 8.5), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::new(10., 0., -10.));

        let mut v = TV::new(1., 1., 1.);
        collide_particle(&grid, &TV::new(5., 5., 5.), &mut v, 0.1, 0.5);
        assert_eq!(v, TV::new(1., 1., 1.));
    }
}
