//! A GPU-accelerated falling-powder simulator built on a Margolus 2x2
//! block cellular automaton: gravity, liquid flow, gas buoyancy, and an
//! inter-element reaction table, run identically on a `rayon`-parallel
//! CPU backend or a `wgpu` compute backend behind the same [`Backend`]
//! trait.
//!
//! The pure modules -- [`cell`], [`element`], [`rng`], [`block`],
//! [`reactions`], [`movement`], [`kernel`], [`scheduler`], [`brush`] --
//! are the single source of truth for simulation semantics. [`cpu`]
//! drives them directly; [`gpu`]'s WGSL shaders re-express the same rules
//! for device execution.

pub mod block;
pub mod brush;
pub mod cell;
pub mod config;
pub mod element;
pub mod error;
pub mod grid;
pub mod kernel;
pub mod movement;
pub mod reactions;
pub mod rng;
pub mod scheduler;

pub mod cpu;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use block::Block;
pub use cell::Cell;
pub use config::SimConfig;
pub use element::Element;
pub use error::SimError;
pub use grid::Grid;

/// The operations every backend exposes, so a host application can swap
/// the CPU reference backend for the GPU backend (or back) without
/// touching call sites.
pub trait Backend {
    /// Advances the simulation by one frame: applies any pending brush
    /// writes, then runs the frame's full schedule of Margolus passes.
    fn step(&mut self);

    /// Queues brush writes to be merged into the live grid at the start
    /// of the next [`step`](Backend::step) call.
    fn write_cells(&mut self, writes: &[(u32, u32, u32)]);

    /// Resets both ping-pong buffers to all-EMPTY and zeroes the frame
    /// counter and cached particle count.
    fn clear(&mut self);

    /// Recomputes the cached particle count from the current live
    /// buffer. On the CPU backend this completes immediately. On the GPU
    /// backend it is non-blocking: it starts an async readback if none is
    /// already in flight (at most one at a time), or polls an in-flight one
    /// to completion without waiting; call
    /// [`particle_count`](Backend::particle_count) afterward, and call this
    /// again on a later frame if the result isn't ready yet.
    fn request_particle_count(&mut self);

    fn particle_count(&self) -> u32;

    /// Index (0 or 1) of the ping-pong buffer currently holding the live
    /// grid.
    fn current_buffer_index(&self) -> u8;

    fn frame_counter(&self) -> u64;
}
