//! Uniform grid over instance locations.
//!
//! With the cell size equal to the distance threshold, two points within the
//! threshold of each other always land in the same or in adjacent cells, so a
//! 3x3 block around a point's cell holds every possible neighbor.

use ahash::AHashMap;

use crate::instance::SpatialInstance;

type Cell = (i64, i64);

pub(crate) struct UniformGrid {
    cell_size: f64,
    cells: AHashMap<Cell, Vec<u32>>,
}

impl UniformGrid {
    pub(crate) fn build(instances: &[SpatialInstance], cell_size: f64) -> Self {
        let mut grid = Self {
            cell_size,
            cells: AHashMap::new(),
        };
        for (slot, inst) in instances.iter().enumerate() {
            let cell = grid.cell_of(inst);
            grid.cells.entry(cell).or_default().push(slot as u32);
        }
        grid
    }

    fn cell_of(&self, inst: &SpatialInstance) -> Cell {
        (
            (inst.x / self.cell_size).floor() as i64,
            (inst.y / self.cell_size).floor() as i64,
        )
    }

    /// Slots in the 3x3 block of cells around `inst`, including `inst` itself.
    pub(crate) fn candidates<'a>(
        &'a self,
        inst: &SpatialInstance,
    ) -> impl Iterator<Item = u32> + 'a {
        let (cx, cy) = self.cell_of(inst);
        (-1i64..=1)
            .flat_map(move |dx| (-1i64..=1).map(move |dy| (cx.saturating_add(dx), cy.saturating_add(dy))))
            .filter_map(move |cell| self.cells.get(&cell))
            .flat_map(|slots| slots.iter().copied())
    }

    #[cfg(test)]
    fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_cover_adjacent_cells_only() {
        let instances = vec![
            SpatialInstance::new("A", 1, 0.5, 0.5, 0),
            SpatialInstance::new("A", 2, 1.5, 0.5, 0),
            SpatialInstance::new("A", 3, 5.5, 5.5, 0),
            SpatialInstance::new("A", 4, -0.5, -0.5, 0),
        ];
        let grid = UniformGrid::build(&instances, 1.0);
        assert_eq!(grid.occupied_cells(), 4);

        let mut near: Vec<u32> = grid.candidates(&instances[0]).collect();
        near.sort_unstable();
        assert_eq!(near, vec![0, 1, 3]);

        let far: Vec<u32> = grid.candidates(&instances[2]).collect();
        assert_eq!(far, vec![2]);
    }
}
