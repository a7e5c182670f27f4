//! CPU reference backend: drives [`crate::kernel::update_block`] over
//! every block in a pass with `rayon`, mirroring the GPU backend's
//! no-atomics-needed concurrency model -- a Margolus tiling never lets two
//! blocks in the same pass touch the same cell, so parallel writes to
//! disjoint block slots need no synchronization on either backend.

use rayon::prelude::*;

use crate::block::Block;
use crate::brush;
use crate::cell::Cell;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::grid::Grid;
use crate::kernel;
use crate::scheduler::{self, PassPlan};
use crate::Backend;

pub struct Simulation {
    config: SimConfig,
    buffers: [Grid; 2],
    current: u8,
    frame_counter: u64,
    pending_writes: Vec<(u32, u32, u32)>,
    particle_count: u32,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Simulation, SimError> {
        config.validate()?;
        Ok(Simulation {
            buffers: [Grid::new(config.width, config.height), Grid::new(config.width, config.height)],
            current: 0,
            frame_counter: 0,
            pending_writes: Vec::new(),
            particle_count: 0,
            config,
        })
    }

    pub fn grid(&self) -> &Grid {
        &self.buffers[self.current as usize]
    }

    fn run_pass(&mut self, plan: PassPlan) {
        let src_index = if plan.reads_from_a { 0 } else { 1 };
        let dst_index = 1 - src_index;
        let (width, height) = (self.config.width, self.config.height);
        let (block_w, block_h) = scheduler::block_grid_dims(width, height, plan.offset);

        let src = &self.buffers[src_index as usize];
        let mut dst_cells = vec![Cell::EMPTY; (width * height) as usize];

        dst_cells
            .par_chunks_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let y = y as u32;
                for x in 0..width {
                    row[x as usize] = src.get(x, y);
                }
            });

        let updated: Vec<(u32, u32, Block)> = (0..block_h)
            .into_par_iter()
            .flat_map(|by| {
                (0..block_w).into_par_iter().map(move |bx| (bx, by))
            })
            .map(|(bi, bj)| {
                let base_x = plan.offset.0 + bi * 2;
                let base_y = plan.offset.1 + bj * 2;
                let block = Block::new(
                    src.get(base_x, base_y),
                    src.get(base_x + 1, base_y),
                    src.get(base_x, base_y + 1),
                    src.get(base_x + 1, base_y + 1),
                );
                let out = kernel::update_block(block, base_x, base_y, plan.frame_and_pass, plan.lateral_only);
                (base_x, base_y, out)
            })
            .collect();

        for (base_x, base_y, out) in updated {
            dst_cells[(base_y * width + base_x) as usize] = out.tl;
            dst_cells[(base_y * width + base_x + 1) as usize] = out.tr;
            dst_cells[((base_y + 1) * width + base_x) as usize] = out.bl;
            dst_cells[((base_y + 1) * width + base_x + 1) as usize] = out.br;
        }

        let dst = &mut self.buffers[dst_index as usize];
        dst.cells_mut().copy_from_slice(&dst_cells);
        self.current = dst_index;
    }
}

impl Backend for Simulation {
    fn step(&mut self) {
        if !self.pending_writes.is_empty() {
            let writes = std::mem::take(&mut self.pending_writes);
            let live = &mut self.buffers[self.current as usize];
            brush::apply_pending(live, &writes);
            let other = &mut self.buffers[1 - self.current as usize];
            brush::apply_pending(other, &writes);
        }

        let plans = scheduler::schedule(self.frame_counter, self.config.passes_per_frame);
        for plan in plans {
            self.run_pass(plan);
        }
        self.frame_counter += 1;
        tracing::trace!(frame = self.frame_counter, "completed simulation frame");
    }

    fn write_cells(&mut self, writes: &[(u32, u32, u32)]) {
        self.pending_writes.extend_from_slice(writes);
    }

    fn clear(&mut self) {
        self.buffers[0].clear();
        self.buffers[1].clear();
        self.pending_writes.clear();
        self.frame_counter = 0;
        self.particle_count = 0;
    }

    fn request_particle_count(&mut self) {
        self.particle_count = self.buffers[self.current as usize].particle_count();
    }

    fn particle_count(&self) -> u32 {
        self.particle_count
    }

    fn current_buffer_index(&self) -> u8 {
        self.current
    }

    fn frame_counter(&self) -> u64 {
        self.frame_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;

    fn sim(w: u32, h: u32) -> Simulation {
        Simulation::new(SimConfig::new(w, h, 4)).unwrap()
    }

    #[test]
    fn stepping_an_empty_grid_stays_empty() {
        let mut s = sim(8, 8);
        for _ in 0..10 {
            s.step();
        }
        s.request_particle_count();
        assert_eq!(s.particle_count(), 0);
    }

    /// S1-style scenario: a single SAND cell falls toward a STONE floor
    /// over enough frames, never passing through it, and the total
    /// particle count (floor + grain) is conserved.
    #[test]
    fn sand_falls_and_rests_on_stone_floor() {
        let mut s = sim(4, 6);
        let floor: Vec<_> = (0..4).map(|x| (x, 5, Cell::from(Element::Stone).0)).collect();
        s.write_cells(&floor);
        s.write_cells(&[(1, 0, Cell::from(Element::Sand).0)]);
        for _ in 0..200 {
            s.step();
        }
        let grid = s.grid();
        assert!((0..4).all(|x| grid.get(x, 5).is_element(Element::Stone)));
        assert_eq!(grid.particle_count(), 5);
    }

    /// P5: total non-empty particle mass under pure gravity (no reactions
    /// that destroy mass) never increases.
    #[test]
    fn particle_count_does_not_increase_without_reactive_elements() {
        let mut s = sim(6, 6);
        s.write_cells(&[
            (0, 0, Cell::from(Element::Sand).0),
            (1, 0, Cell::from(Element::Stone).0),
            (2, 0, Cell::from(Element::Water).0),
        ]);
        s.step();
        s.request_particle_count();
        let start = s.particle_count();
        for _ in 0..50 {
            s.step();
        }
        s.request_particle_count();
        assert!(s.particle_count() <= start);
    }

    #[test]
    fn clear_empties_both_buffers_and_resets_counters() {
        let mut s = sim(4, 4);
        s.write_cells(&[(0, 0, Cell::from(Element::Stone).0)]);
        s.step();
        s.clear();
        s.request_particle_count();
        assert_eq!(s.particle_count(), 0);
        assert_eq!(s.frame_counter(), 0);
    }
}
