//! Headless demo: requests a GPU device, drops a patch of sand and water
//! over a stone floor, and prints particle counts for a handful of
//! frames. Run with `cargo run --example headless`.

use anyhow::{Context, Result, anyhow};
use powder::{Backend, Cell, Element, SimConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn setup_logging() -> Result<()> {
    tracing::subscriber::set_global_default(
        fmt::Subscriber::builder()
            .with_env_filter(
                EnvFilter::builder()
                    .parse(std::env::var(EnvFilter::DEFAULT_ENV).as_deref().unwrap_or("info,wgpu_core=warn,wgpu_hal=warn"))?,
            )
            .finish(),
    )?;
    Ok(())
}

async fn request_device() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::default();
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await
        .ok_or_else(|| anyhow!("no compatible wgpu adapter found"))?;
    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor::default(), None)
        .await
        .context("failed to request a wgpu device")?;
    Ok((device, queue))
}

fn main() -> Result<()> {
    setup_logging()?;

    let config = SimConfig::new(128, 128, 4);
    let (device, queue) = pollster::block_on(request_device())?;
    let mut sim = powder::gpu::Simulation::new(device, queue, config)?;

    let floor: Vec<_> = (0..config.width).map(|x| (x, config.height - 1, Cell::from(Element::Stone).0)).collect();
    sim.write_cells(&floor);
    let sand: Vec<_> = (40..60).map(|x| (x, 5, Cell::from(Element::Sand).0)).collect();
    sim.write_cells(&sand);
    let water: Vec<_> = (60..90).map(|x| (x, 5, Cell::from(Element::Water).0)).collect();
    sim.write_cells(&water);

    for frame in 0..120 {
        sim.step();
        if frame % 30 == 0 {
            sim.request_particle_count();
            tracing::info!(frame, particles = sim.particle_count(), "simulated frame");
        }
    }

    sim.request_particle_count();
    println!("final particle count: {}", sim.particle_count());
    Ok(())
}
