//! Bounded sparse grid layers
//!
//! Tiles, anchors and nodes each live in their own layer over the same
//! integer coordinate space. Lookups outside the bounds return `None`
//! instead of faulting, and writes outside the bounds are refused.

use glam::IVec2;

use crate::Direction;

/// Integer grid coordinate
pub type Cell = IVec2;

/// One layer of the level grid: at most one occupant per cell
#[derive(Debug, Clone)]
pub struct GridLayer<T> {
    width: i32,
    height: i32,
    cells: Vec<Option<T>>,
}

impl<T> GridLayer<T> {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        let mut cells = Vec::with_capacity(len);
        cells.resize_with(len, || None);
        Self {
            width: width as i32,
            height: height as i32,
            cells,
        }
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }

    #[inline]
    fn index(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| cell.y as usize * self.width as usize + cell.x as usize)
    }

    pub fn get(&self, cell: Cell) -> Option<&T> {
        self.index(cell).and_then(|i| self.cells[i].as_ref())
    }

    pub fn get_mut(&mut self, cell: Cell) -> Option<&mut T> {
        self.index(cell).and_then(|i| self.cells[i].as_mut())
    }

    pub fn is_occupied(&self, cell: Cell) -> bool {
        self.get(cell).is_some()
    }

    /// Store `value` at `cell`, replacing any previous occupant.
    /// Returns false (and drops the value) when the cell is out of bounds.
    pub fn insert(&mut self, cell: Cell, value: T) -> bool {
        match self.index(cell) {
            Some(i) => {
                self.cells[i] = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, cell: Cell) -> Option<T> {
        self.index(cell).and_then(|i| self.cells[i].take())
    }

    /// Occupied 4-neighbours of `cell`
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = (Cell, &T)> + '_ {
        Direction::ALL.into_iter().filter_map(move |dir| {
            let adjacent = cell + dir.offset();
            self.get(adjacent).map(|value| (adjacent, value))
        })
    }

    /// True when at least one 4-neighbour is occupied
    pub fn has_neighbor(&self, cell: Cell) -> bool {
        self.neighbors(cell).next().is_some()
    }

    /// All occupied cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Cell, &T)> + '_ {
        let width = self.width;
        self.cells.iter().enumerate().filter_map(move |(i, slot)| {
            let i = i as i32;
            slot.as_ref()
                .map(|value| (IVec2::new(i % width, i / width), value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_is_empty_not_fault() {
        let mut layer: GridLayer<u8> = GridLayer::new(3, 2);
        assert!(layer.get(IVec2::new(-1, 0)).is_none());
        assert!(layer.get(IVec2::new(3, 0)).is_none());
        assert!(layer.get(IVec2::new(0, 2)).is_none());
        assert!(!layer.insert(IVec2::new(5, 5), 1));
        assert!(layer.is_empty());
    }

    #[test]
    fn test_one_occupant_per_cell() {
        let mut layer = GridLayer::new(4, 4);
        assert!(layer.insert(IVec2::new(1, 1), 'a'));
        assert!(layer.insert(IVec2::new(1, 1), 'b'));
        assert_eq!(layer.get(IVec2::new(1, 1)), Some(&'b'));
        assert_eq!(layer.iter().count(), 1);
        assert_eq!(layer.remove(IVec2::new(1, 1)), Some('b'));
        assert!(layer.remove(IVec2::new(1, 1)).is_none());
    }

    #[test]
    fn test_neighbors_are_cardinal_only() {
        let mut layer = GridLayer::new(5, 5);
        layer.insert(IVec2::new(3, 3), ()); // diagonal
        assert!(!layer.has_neighbor(IVec2::new(2, 2)));

        layer.insert(IVec2::new(2, 3), ()); // above
        let found: Vec<Cell> = layer.neighbors(IVec2::new(2, 2)).map(|(c, _)| c).collect();
        assert_eq!(found, vec![IVec2::new(2, 3)]);
    }

    #[test]
    fn test_iter_reports_cells() {
        let mut layer = GridLayer::new(3, 3);
        layer.insert(IVec2::new(2, 0), 7);
        layer.insert(IVec2::new(0, 2), 9);
        let cells: Vec<(Cell, i32)> = layer.iter().map(|(c, v)| (c, *v)).collect();
        assert_eq!(cells, vec![(IVec2::new(2, 0), 7), (IVec2::new(0, 2), 9)]);
    }
}
