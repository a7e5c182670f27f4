//! `wgpu` compute backend: uploads the grid into a pair of ping-pong
//! storage buffers and drives the same per-pass schedule as [`crate::cpu`]
//! through a compute pipeline instead of `rayon`. The WGSL shaders under
//! `shaders/` re-express [`crate::kernel::update_block`] and
//! [`crate::brush::apply_pending`] for device execution; they are not
//! exercised by this crate's test suite, which verifies simulation
//! semantics against the CPU backend instead (no GPU device is available
//! in this crate's own CI).

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use futures::channel::oneshot;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::scheduler::{self, PassPlan};
use crate::Backend;

const BLOCK_SHADER: &str = include_str!("shaders/block.wgsl");
const CONDITIONAL_WRITE_SHADER: &str = include_str!("shaders/conditional_write.wgsl");

/// Per-pass uniform record handed to `block.wgsl`; layout must match the
/// shader's `PassUniforms` struct exactly.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PassUniforms {
    width: u32,
    height: u32,
    offset_x: u32,
    offset_y: u32,
    frame_and_pass: u32,
    lateral_only: u32,
    _pad: [u32; 2],
}

impl PassUniforms {
    fn new(config: &SimConfig, plan: &PassPlan) -> PassUniforms {
        PassUniforms {
            width: config.width,
            height: config.height,
            offset_x: plan.offset.0,
            offset_y: plan.offset.1,
            frame_and_pass: plan.frame_and_pass,
            lateral_only: plan.lateral_only as u32,
            _pad: [0; 2],
        }
    }
}

const WORKGROUP_SIZE: u32 = 8;

pub struct Simulation {
    config: SimConfig,
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: [wgpu::Buffer; 2],
    staging: wgpu::Buffer,
    current: u8,
    frame_counter: u64,
    pending_writes: Vec<(u32, u32, u32)>,
    particle_count: u32,

    block_pipeline: wgpu::ComputePipeline,
    copy_pipeline: wgpu::ComputePipeline,
    block_bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,

    write_pipeline: wgpu::ComputePipeline,
    write_bind_group_layout: wgpu::BindGroupLayout,
    write_buffer: wgpu::Buffer,

    /// At most one async particle-count readback in flight at a time; see
    /// [`Backend::request_particle_count`].
    pending_readback: Option<oneshot::Receiver<Result<(), wgpu::BufferAsyncError>>>,
}

impl Simulation {
    /// Creates the device's buffers and pipelines for `config`. The
    /// caller supplies an already-initialized `device`/`queue` pair (see
    /// `demos/headless.rs` for how the demo binary requests one).
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, config: SimConfig) -> Result<Simulation, SimError> {
        config.validate()?;
        let cell_count = config.cell_count() as u64;
        let buffer_size = cell_count * 4;

        let make_storage = |label: &str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: buffer_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let buffers = [make_storage("powder grid buffer 0"), make_storage("powder grid buffer 1")];

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("powder readback staging buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("powder pass uniforms"),
            size: std::mem::size_of::<PassUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let write_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("powder pending brush writes"),
            size: ((MAX_PENDING_WRITES * 2 + 1) * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let uniform_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<PassUniforms>() as u64),
            },
            count: None,
        };

        let block_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("powder block pass bind group layout"),
            entries: &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        });
        let block_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("powder block shader"),
            source: wgpu::ShaderSource::Wgsl(BLOCK_SHADER.into()),
        });
        let block_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("powder block pipeline layout"),
            bind_group_layouts: &[&block_bind_group_layout],
            push_constant_ranges: &[],
        });
        let block_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("powder block pipeline"),
            layout: Some(&block_pipeline_layout),
            module: &block_shader,
            entry_point: "update_blocks",
            compilation_options: Default::default(),
            cache: None,
        });
        // Runs before `update_blocks` every pass: copies the whole grid
        // through untouched, so cells an offset's block tiling leaves
        // unpaired (edge rows/columns, odd trailing rows/columns) carry
        // forward instead of going stale in the other ping-pong buffer.
        // Mirrors the CPU backend's base-copy-then-overwrite in
        // `cpu::Simulation::run_pass`.
        let copy_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("powder copy-through pipeline"),
            layout: Some(&block_pipeline_layout),
            module: &block_shader,
            entry_point: "copy_through",
            compilation_options: Default::default(),
            cache: None,
        });

        let write_bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("powder conditional write bind group layout"),
            entries: &[storage_entry(0, true), storage_entry(1, false)],
        });
        let write_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("powder conditional write shader"),
            source: wgpu::ShaderSource::Wgsl(CONDITIONAL_WRITE_SHADER.into()),
        });
        let write_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("powder conditional write pipeline layout"),
            bind_group_layouts: &[&write_bind_group_layout],
            push_constant_ranges: &[],
        });
        let write_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("powder conditional write pipeline"),
            layout: Some(&write_pipeline_layout),
            module: &write_shader,
            entry_point: "apply_writes",
            compilation_options: Default::default(),
            cache: None,
        });

        Ok(Simulation {
            config,
            device,
            queue,
            buffers,
            staging,
            current: 0,
            frame_counter: 0,
            pending_writes: Vec::new(),
            particle_count: 0,
            block_pipeline,
            copy_pipeline,
            block_bind_group_layout,
            uniform_buffer,
            write_pipeline,
            write_bind_group_layout,
            write_buffer,
            pending_readback: None,
        })
    }

    fn block_bind_group(&self, src: u8, dst: u8) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("powder block pass bind group"),
            layout: &self.block_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: self.buffers[src as usize].as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: self.buffers[dst as usize].as_entire_binding() },
            ],
        })
    }

    fn run_pass(&mut self, plan: PassPlan) {
        let src = if plan.reads_from_a { 0u8 } else { 1u8 };
        let dst = 1 - src;
        let uniforms = PassUniforms::new(&self.config, &plan);
        self.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.block_bind_group(src, dst);
        let (block_w, block_h) = scheduler::block_grid_dims(self.config.width, self.config.height, plan.offset);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("powder block pass encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("powder copy-through pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.copy_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups_x = self.config.width.div_ceil(WORKGROUP_SIZE).max(1);
            let groups_y = self.config.height.div_ceil(WORKGROUP_SIZE).max(1);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("powder block pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.block_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let groups_x = block_w.div_ceil(WORKGROUP_SIZE).max(1);
            let groups_y = block_h.div_ceil(WORKGROUP_SIZE).max(1);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.current = dst;
    }

    fn apply_pending_writes(&mut self) {
        if self.pending_writes.is_empty() {
            return;
        }
        let count = self.pending_writes.len().min(MAX_PENDING_WRITES);
        let width = self.config.width;
        let mut payload = vec![0u32; count * 2 + 1];
        payload[0] = count as u32;
        for (i, &(x, y, word)) in self.pending_writes.iter().take(count).enumerate() {
            payload[1 + i * 2] = y * width + x;
            payload[1 + i * 2 + 1] = word;
        }
        self.queue.write_buffer(&self.write_buffer, 0, bytemuck::cast_slice(&payload));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("powder conditional write bind group"),
            layout: &self.write_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.write_buffer.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.buffers[self.current as usize].as_entire_binding(),
                },
            ],
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("powder conditional write encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("powder conditional write pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.write_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((count as u32).div_ceil(WORKGROUP_SIZE).max(1), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.pending_writes.clear();
    }

    /// Copies the live buffer into the staging buffer and maps it for a
    /// blocking read. Intended for tests and the demo binary; a real host
    /// integration should prefer the async readback path through
    /// [`Backend::request_particle_count`].
    pub fn read_grid_blocking(&self) -> Vec<u32> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("powder readback encoder"),
        });
        let size = self.staging.size();
        encoder.copy_buffer_to_buffer(&self.buffers[self.current as usize], 0, &self.staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let slice = self.staging.slice(..);
        let (tx, rx) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        futures::executor::block_on(rx).expect("map_async callback dropped").expect("buffer map failed");

        let data = slice.get_mapped_range();
        let words: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        self.staging.unmap();
        words
    }
}

const MAX_PENDING_WRITES: usize = 4096;

impl Backend for Simulation {
    fn step(&mut self) {
        self.apply_pending_writes();
        let plans = scheduler::schedule(self.frame_counter, self.config.passes_per_frame);
        for plan in plans {
            self.run_pass(plan);
        }
        self.frame_counter += 1;
    }

    fn write_cells(&mut self, writes: &[(u32, u32, u32)]) {
        self.pending_writes.extend_from_slice(writes);
    }

    fn clear(&mut self) {
        for buffer in &self.buffers {
            self.queue.write_buffer(buffer, 0, &vec![0u8; buffer.size() as usize]);
        }
        self.pending_writes.clear();
        self.frame_counter = 0;
        self.particle_count = 0;
    }

    /// Non-blocking: if a previous readback is still pending, polls the
    /// device without waiting and returns without starting another (at
    /// most one in flight, per spec §4.9). Otherwise copies the live
    /// buffer to staging and kicks off `map_async`, to be picked up by a
    /// later call once the device has actually completed it.
    fn request_particle_count(&mut self) {
        if let Some(mut rx) = self.pending_readback.take() {
            self.device.poll(wgpu::Maintain::Poll);
            match rx.try_recv() {
                Ok(Some(Ok(()))) => {
                    let data = self.staging.slice(..).get_mapped_range();
                    let words: &[u32] = bytemuck::cast_slice(&data);
                    self.particle_count = words.iter().filter(|&&w| (w & 0xff) != 0).count() as u32;
                    drop(data);
                    self.staging.unmap();
                }
                Ok(Some(Err(_))) => {
                    self.staging.unmap();
                }
                Ok(None) => {
                    // Still pending: keep it, don't start a new one.
                    self.pending_readback = Some(rx);
                    return;
                }
                Err(_) => {
                    // Callback's sender was dropped; treat as no readback
                    // and fall through to start a fresh one.
                }
            }
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("powder particle count readback encoder"),
        });
        let size = self.staging.size();
        encoder.copy_buffer_to_buffer(&self.buffers[self.current as usize], 0, &self.staging, 0, size);
        self.queue.submit(Some(encoder.finish()));

        let (tx, rx) = oneshot::channel();
        self.staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.pending_readback = Some(rx);
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
