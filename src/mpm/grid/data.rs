use super::particle_grid_weights::STENCIL_WIDTH;
use crate::math::{component_product, RangeExt, T, TV, UV};
use std::ops::Range;

/// Stores the static geometry of the background grid.
#[derive(Debug, Clone)]
pub struct GridData {
    /// The total number of nodes in the grid
    pub num_nodes: usize,
    /// The number of nodes in each direction, one more than the number of cells
    pub size: UV,
    /// The size of a cell along each axis
    pub cell_size: TV,
    /// The volume of a single cell
    pub node_volume: T,
    /// World position of node (0, 0, 0)
    pub origin: TV,
}

impl GridData {
    /// Creates a new `GridData` spanning `domain` with `resolution` cells along each axis.
    pub fn new(domain: Range<TV>, resolution: UV) -> GridData {
        let cell_size = domain.size().component_div(&resolution.cast::<T>());
        let size = resolution.add_scalar(1);
        let num_nodes = size.iter().product();

        GridData {
            num_nodes,
            size,
            cell_size,
            node_volume: component_product(&cell_size),
            origin: domain.start,
        }
    }

    pub fn coord_to_pos(&self, coord: UV) -> TV {
        coord.cast::<T>().component_mul(&self.cell_size) + self.origin
    }

    /// Nodes are stored y-major, then z, then x.
    pub fn coord_to_index(&self, i: UV) -> usize {
        debug_assert!(self.coord_in_grid(i), "{:?} is outside the grid", i);
        i.y * self.size.x * self.size.z + i.z * self.size.x + i.x
    }

    pub fn index_to_coord(&self, mut i: usize) -> UV {
        let y = i / (self.size.x * self.size.z);
        i -= y * self.size.x * self.size.z;
        let z = i / self.size.x;
        let x = i % self.size.x;
        UV::new(x, y, z)
    }

    pub fn coord_in_grid(&self, coord: UV) -> bool {
        (0..3).all(|i| coord[i] < self.size[i])
    }

    /// Node indices of the 4x4x4 stencil starting at `base`, in the same order as the
    /// particle's cached weights.
    pub fn stencil(&self, base: UV) -> StencilIter {
        StencilIter {
            first: self.coord_to_index(base),
            row: self.size.x,
            layer: self.size.x * self.size.z,
            current: 0,
        }
    }
}

/// Walks the node indices of a stencil, y-outer, z-middle and x-inner.
pub struct StencilIter {
    first: usize,
    row: usize,
    layer: usize,
    current: usize,
}

impl Iterator for StencilIter {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        const WIDTH: usize = STENCIL_WIDTH;

        if self.current == WIDTH * WIDTH * WIDTH {
            return None;
        }

        let x = self.current % WIDTH;
        let z = (self.current / WIDTH) % WIDTH;
        let y = self.current / (WIDTH * WIDTH);
        self.current += 1;

        Some(self.first + y * self.layer + z * self.row + x)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = STENCIL_WIDTH * STENCIL_WIDTH * STENCIL_WIDTH - self.current;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for StencilIter {}
