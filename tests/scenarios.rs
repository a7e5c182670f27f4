//! End-to-end scenarios run through the CPU backend, matching the
//! simulator's literal-grid test scenarios.

use powder::cell::Cell;
use powder::config::SimConfig;
use powder::cpu::Simulation;
use powder::element::Element;
use powder::kernel;
use powder::Backend;

fn cell(e: Element) -> Cell {
    Cell::from(e)
}

/// S1: a single grain of SAND falling in vacuum reaches the bottom row of
/// a 4x4 grid within a few frames and never duplicates or vanishes.
#[test]
fn single_sand_falls_in_vacuum() {
    let mut sim = Simulation::new(SimConfig::new(4, 4, 4)).unwrap();
    sim.write_cells(&[(1, 0, cell(Element::Sand).0)]);
    for _ in 0..8 {
        sim.step();
    }
    let grid = sim.grid();
    assert_eq!(grid.particle_count(), 1);
    assert_eq!(grid.cells().iter().filter(|c| c.is_element(Element::Sand)).count(), 1);
}

/// S2: a full row of WATER above a STONE floor stays put -- no water
/// escapes the row and the floor is untouched.
#[test]
fn water_levels_stay_in_their_row() {
    let mut sim = Simulation::new(SimConfig::new(8, 4, 4)).unwrap();
    let water: Vec<_> = (0..8).map(|x| (x, 2, cell(Element::Water).0)).collect();
    let floor: Vec<_> = (0..8).map(|x| (x, 3, cell(Element::Stone).0)).collect();
    sim.write_cells(&water);
    sim.write_cells(&floor);
    for _ in 0..60 {
        sim.step();
    }
    let grid = sim.grid();
    let water_in_row = (0..8).filter(|&x| grid.get(x, 2).is_element(Element::Water)).count();
    assert_eq!(water_in_row, 8);
    assert!((0..8).all(|x| grid.get(x, 3).is_element(Element::Stone)));
}

/// S3: sand sinking through a deep column of water conserves the count
/// of both elements.
#[test]
fn sand_sinks_through_water_conserving_counts() {
    let mut sim = Simulation::new(SimConfig::new(4, 8, 4)).unwrap();
    let sand: Vec<_> = (0..4).map(|x| (x, 0, cell(Element::Sand).0)).collect();
    let mut water = Vec::new();
    for y in 1..7 {
        for x in 0..4 {
            water.push((x, y, cell(Element::Water).0));
        }
    }
    let floor: Vec<_> = (0..4).map(|x| (x, 7, cell(Element::Stone).0)).collect();
    sim.write_cells(&sand);
    sim.write_cells(&water);
    sim.write_cells(&floor);
    for _ in 0..120 {
        sim.step();
    }
    let grid = sim.grid();
    let sand_count = grid.cells().iter().filter(|c| c.is_element(Element::Sand)).count();
    let water_count = grid.cells().iter().filter(|c| c.is_element(Element::Water)).count();
    assert_eq!(sand_count, 4);
    assert_eq!(water_count, 24);
}

/// S4: FIRE surrounded by WATER extinguishes unconditionally on contact
/// (the fire-water rule converts FIRE to STEAM with no probability gate),
/// leaving no FIRE in the block across any pass seed.
#[test]
fn fire_extinguishes_on_water_contact() {
    let block = powder::block::Block::new(
        Cell::make(Element::Fire, 0, 200),
        cell(Element::Water),
        cell(Element::Water),
        cell(Element::Water),
    );
    for frame in 0..256u32 {
        let out = kernel::update_block(block, 0, 0, frame, false);
        assert_eq!(out.count(Element::Fire), 0, "frame {frame}");
        assert!(out.count(Element::Steam) >= 1, "frame {frame}");
    }
}

/// S5: a BOMB next to FIRE detonates into full-lifetime FIRE, with the
/// block's EMPTY cells becoming SMOKE.
#[test]
fn bomb_detonates_on_fire_contact() {
    let block = powder::block::Block::new(
        Cell::EMPTY,
        Cell::make(Element::Fire, 0, 120),
        Cell::EMPTY,
        cell(Element::Bomb),
    );
    let out = kernel::update_block(block, 3, 3, 0, false);
    assert!(out.cells().iter().filter(|c| c.is_element(Element::Fire)).count() >= 2);
    assert!(out.cells().iter().all(|c| c.is_element(Element::Fire) || c.is_element(Element::Smoke)));
}

/// S6: a cell an offset tiling leaves without a pairing block is
/// untouched by that pass.
#[test]
fn orphan_edge_cell_survives_a_pass() {
    let mut grid = powder::grid::Grid::new(3, 3);
    grid.set(0, 0, cell(Element::Sand));
    let out = kernel::run_pass_serial(&grid, (1, 1), 0, false);
    assert!(out.get(0, 0).is_element(Element::Sand));
}

/// P4: two independently constructed simulations given the same writes
/// and the same number of steps land on identical grids.
#[test]
fn determinism_across_independent_runs() {
    let build = || {
        let mut sim = Simulation::new(SimConfig::new(10, 10, 4)).unwrap();
        sim.write_cells(&[
            (3, 0, cell(Element::Sand).0),
            (4, 0, cell(Element::Water).0),
            (5, 9, cell(Element::Stone).0),
        ]);
        for _ in 0..30 {
            sim.step();
        }
        sim
    };
    let a = build();
    let b = build();
    assert_eq!(a.grid().cells(), b.grid().cells());
}

/// P9: blast-fire propagation inside one block pass never reaches a cell
/// outside that block.
#[test]
fn blast_containment_within_one_block() {
    let mut sim = Simulation::new(SimConfig::new(8, 2, 4)).unwrap();
    sim.write_cells(&[(3, 0, Cell::make(Element::Fire, 0, 250).0), (2, 0, cell(Element::Bomb).0)]);
    sim.step();
    let grid = sim.grid();
    // cells two blocks away from the detonation site never ignite on the
    // very pass the bomb detonates.
    assert!(!grid.get(7, 0).is_element(Element::Fire));
    assert!(!grid.get(7, 1).is_element(Element::Fire));
}

/// P10: a pending paint write never overwrites an occupied live cell.
#[test]
fn paint_write_does_not_overwrite_occupied_cell() {
    let mut grid = powder::grid::Grid::new(2, 2);
    grid.set(0, 0, cell(Element::Stone));
    powder::brush::apply_pending(&mut grid, &[(0, 0, cell(Element::Sand).0)]);
    assert!(grid.get(0, 0).is_element(Element::Stone));
}

/// P10: a pending eraser write always lands, even on an occupied cell.
#[test]
fn eraser_write_always_overwrites() {
    let mut grid = powder::grid::Grid::new(2, 2);
    grid.set(0, 0, cell(Element::Stone));
    let (x, y, word) = powder::brush::BrushWrite::erase(0, 0).encode();
    powder::brush::apply_pending(&mut grid, &[(x, y, word)]);
    assert!(grid.get(0, 0).is_element(Element::Empty));
}

/// Sum, over every cell in the grid, of `density * depth`. SAND/WATER/STONE
/// never react with each other (their aging and alchemy rules are all gated
/// on FIRE, LAVA, ACID, or another reactive element none of which appear
/// here), so only vertical swaps can move mass -- and a vertical swap only
/// ever fires when the upper cell is denser than the lower one, moving the
/// denser cell to a strictly greater depth. That makes this sum non-decreasing
/// from pass to pass regardless of which swaps the drag gate actually rolls.
fn density_weighted_depth(grid: &powder::grid::Grid) -> u64 {
    let mut total = 0u64;
    for y in 0..grid.height() {
        for x in 0..grid.width() {
            if let Some(e) = grid.get(x, y).element() {
                total += e.density() as u64 * y as u64;
            }
        }
    }
    total
}

/// P6: with only SAND/WATER/EMPTY/STONE in play (no reactions), the
/// density-weighted depth of the grid never decreases step to step.
#[test]
fn density_monotonicity_without_reactions() {
    let mut sim = Simulation::new(SimConfig::new(6, 6, 4)).unwrap();
    sim.write_cells(&[
        (0, 0, cell(Element::Sand).0),
        (2, 0, cell(Element::Water).0),
        (4, 0, cell(Element::Sand).0),
        (1, 1, cell(Element::Water).0),
        (3, 2, cell(Element::Sand).0),
        (5, 1, cell(Element::Water).0),
    ]);
    let floor: Vec<_> = (0..6).map(|x| (x, 5, cell(Element::Stone).0)).collect();
    sim.write_cells(&floor);

    let mut previous = density_weighted_depth(sim.grid());
    for step in 0..(sim.grid().height() as usize * 4) {
        sim.step();
        let now = density_weighted_depth(sim.grid());
        assert!(now >= previous, "density-weighted depth decreased at step {step}");
        previous = now;
    }
}

/// P7: a grid seeded only with FIRE, given no fuel to reignite from, burns
/// itself out to all-EMPTY (spec: "with probability -> 1"; the aging rule's
/// 1-in-64 per-frame decrement chance makes exhaustion over a fire cell's
/// bounded lifetime (<= 255) overwhelmingly likely well within this bound).
#[test]
fn fire_without_fuel_decays_to_empty() {
    let mut sim = Simulation::new(SimConfig::new(4, 4, 4)).unwrap();
    let fires: Vec<_> = (0..4)
        .flat_map(|x| (0..4).map(move |y| (x, y, Cell::make(Element::Fire, 0, 255).0)))
        .collect();
    sim.write_cells(&fires);
    for _ in 0..20_000 {
        sim.step();
    }
    let grid = sim.grid();
    assert_eq!(grid.particle_count(), 0);
    assert!(grid.cells().iter().all(|c| c.is_element(Element::Empty)));
}

/// P8: over a single block reaction step, at most ~30% of WATER becomes
/// non-water from fire contact -- the fire+water rule's consumption roll is
/// exactly a 30% chance per water cell, so across enough independent seeds
/// the converted fraction concentrates tightly around 0.30 (well clear of a
/// 0.40 ceiling, which a 2000-sample binomial would essentially never cross).
#[test]
fn water_conservation_under_fire_contact_is_bounded() {
    let block = powder::block::Block::new(
        Cell::make(Element::Fire, 0, 200),
        cell(Element::Water),
        cell(Element::Water),
        cell(Element::Water),
    );
    let water_before_per_trial = 3u32;
    let mut converted = 0u32;
    let trials = 2000u32;
    for frame in 0..trials {
        let out = powder::reactions::apply(block, 0, 0, frame);
        let water_after = out.count(Element::Water);
        converted += water_before_per_trial - water_after;
    }
    let total_before = water_before_per_trial * trials;
    let fraction = converted as f64 / total_before as f64;
    assert!(fraction <= 0.40, "converted fraction {fraction} exceeded bound");
}
