//! Pass scheduling (spec §4.7): how a frame's `passes_per_frame` Margolus
//! passes are split across the four block-offset phases, which half of
//! the frame runs gravity at all, and which ping-pong buffer each pass
//! reads from and writes to.

use crate::rng::hash;

/// The four ways a 2x2 tiling can sit over the grid, as a `(dx, dy)` pixel
/// offset added to every block's base coordinate before reading its four
/// cells. Order within a sweep is shuffled per-frame so no offset is
/// structurally favored.
pub const OFFSETS: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// One scheduled Margolus pass: which offset to tile with, whether this
/// pass's block update should skip the gravity phase, and the combined
/// frame/pass counter to hash into every per-block RNG stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    pub offset: (u32, u32),
    pub lateral_only: bool,
    pub frame_and_pass: u32,
    /// `true` when this pass reads buffer A and writes buffer B; `false`
    /// for the reverse. Alternates every pass so ping-pong direction never
    /// needs separate bookkeeping from the pass index.
    pub reads_from_a: bool,
}

/// Builds the ordered list of passes for one frame. `passes_per_frame`
/// must already be validated as a positive multiple of 4 (see
/// [`crate::config::SimConfig::validate`]); this function doesn't
/// re-validate it.
///
/// The first half of the frame's passes run the full gravity+lateral
/// update; the second half run lateral-only, settling lateral pools
/// without re-rolling vertical falls every single pass of a frame that
/// asked for many passes.
pub fn schedule(frame_counter: u64, passes_per_frame: u32) -> Vec<PassPlan> {
    let sweeps = passes_per_frame / 4;
    let half = passes_per_frame / 2;
    let mut plans = Vec::with_capacity(passes_per_frame as usize);
    let mut pass_index = 0u32;

    for sweep in 0..sweeps {
        let shuffle_seed = hash((frame_counter as u32).wrapping_mul(2).wrapping_add(sweep));
        let order = shuffled_offsets(shuffle_seed);
        for offset in order {
            let frame_and_pass = (frame_counter as u32).wrapping_mul(passes_per_frame).wrapping_add(pass_index);
            plans.push(PassPlan {
                offset,
                lateral_only: pass_index >= half,
                frame_and_pass,
                reads_from_a: pass_index % 2 == 0,
            });
            pass_index += 1;
        }
    }
    plans
}

/// Deterministic Fisher-Yates shuffle of the four offsets, seeded once per
/// sweep so the four tilings within a sweep always appear in some order
/// but never the same order twice in a row.
fn shuffled_offsets(seed: u32) -> [(u32, u32); 4] {
    let mut offsets = OFFSETS;
    let mut state = seed;
    for i in (1..offsets.len()).rev() {
        state = hash(state);
        let j = (state as usize) % (i + 1);
        offsets.swap(i, j);
    }
    offsets
}

/// Grid dispatch size for one offset-tiled pass: the number of 2x2 blocks
/// along each axis, accounting for the half-cell shift the `(1,1)` offset
/// introduces at the far edges (spec §4.7's "orphan edge" rule: cells a
/// shifted tiling can't pair up are copied through unchanged rather than
/// updated).
pub fn block_grid_dims(width: u32, height: u32, offset: (u32, u32)) -> (u32, u32) {
    let usable_w = width - offset.0;
    let usable_h = height - offset.1;
    (usable_w / 2, usable_h / 2)
}
