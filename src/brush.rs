//! Brush ingestion (spec §4.8): host-issued single-cell writes merged into
//! the live grid between frames, with a conditional-write rule so a brush
//! stroke doesn't stomp cells the simulation has since occupied.

use crate::cell::Cell;
use crate::element::Element;
use crate::grid::Grid;

/// Sentinel written into `aux` bit 31 (as the top bit of the word, since
/// the cell word has no bits above the aux byte to spare) to mark a brush
/// write as an eraser stroke: "force EMPTY regardless of what's there."
/// Ordinary brush strokes only overwrite an EMPTY destination cell.
pub const ERASER_SENTINEL: u32 = 1 << 31;

/// One pending brush write: a grid coordinate, the element to paint
/// (ignored for erasers), and whether it's an eraser stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrushWrite {
    pub x: u32,
    pub y: u32,
    pub element: Element,
    pub color: u8,
    pub eraser: bool,
}

impl BrushWrite {
    pub fn paint(x: u32, y: u32, element: Element, color: u8) -> BrushWrite {
        BrushWrite { x, y, element, color, eraser: false }
    }

    pub fn erase(x: u32, y: u32) -> BrushWrite {
        BrushWrite { x, y, element: Element::Empty, color: 0, eraser: true }
    }

    /// Packs into the `(x, y, word)` triple the GPU conditional-write
    /// shader and the CPU backend both consume, with the sentinel bit set
    /// for erasers.
    pub fn encode(self) -> (u32, u32, u32) {
        let mut word = Cell::make(self.element, self.color, 0).0;
        if self.eraser {
            word |= ERASER_SENTINEL;
        }
        (self.x, self.y, word)
    }
}

/// Applies a batch of pending brush writes onto `grid`. An eraser write
/// always wins; a paint write only lands if the destination cell is
/// currently EMPTY, so a brush stroke issued on one frame never
/// overwrites particles the simulation has already placed there by the
/// time the write is applied.
pub fn apply_pending(grid: &mut Grid, writes: &[(u32, u32, u32)]) {
    for &(x, y, word) in writes {
        if x >= grid.width() || y >= grid.height() {
            continue;
        }
        let eraser = word & ERASER_SENTINEL != 0;
        if eraser {
            grid.set(x, y, Cell::EMPTY);
            continue;
        }
        if !grid.get(x, y).is_occupied() {
            grid.set(x, y, Cell(word & !ERASER_SENTINEL));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_only_lands_on_empty_cells() {
        let mut grid = Grid::new(2, 2);
        grid.set(0, 0, Cell::from(Element::Stone));
        let writes = [
            BrushWrite::paint(0, 0, Element::Sand, 0).encode(),
            BrushWrite::paint(1, 0, Element::Sand, 0).encode(),
        ];
        apply_pending(&mut grid, &writes);
        assert!(grid.get(0, 0).is_element(Element::Stone));
        assert!(grid.get(1, 0).is_element(Element::Sand));
    }

    #[test]
    fn eraser_always_overwrites() {
        let mut grid = Grid::new(2, 2);
        grid.set(0, 0, Cell::from(Element::Stone));
        let writes = [BrushWrite::erase(0, 0).encode()];
        apply_pending(&mut grid, &writes);
        assert!(grid.get(0, 0).is_element(Element::Empty));
    }

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut grid = Grid::new(2, 2);
        let writes = [BrushWrite::paint(5, 5, Element::Sand, 0).encode()];
        apply_pending(&mut grid, &writes);
        assert_eq!(grid.particle_count(), 0);
    }
}
