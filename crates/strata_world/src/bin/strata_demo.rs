//! # STRATA Demo
//!
//! Streams a square of chunks around the origin through the pipeline, makes
//! an edit, then reloads the edited chunk from disk to show the overlay.
//!
//! Log level comes from `RUST_LOG` (default `info`).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use strata_procedural::{BlockSink, ChunkKey, Material, VoxelPos};
use strata_world::{ChunkPipeline, Edit, WorldConfig};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stdout)
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         STRATA CHUNK PIPELINE DEMO                               ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut seed: Option<u64> = None;
    let mut radius = 2i32;
    let mut reset = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--seed" | "-s" => {
                if i + 1 < args.len() {
                    seed = args[i + 1].parse().ok();
                    i += 1;
                }
            }
            "--radius" | "-r" => {
                if i + 1 < args.len() {
                    radius = args[i + 1].parse().unwrap_or(2);
                    i += 1;
                }
            }
            "--reset" => reset = true,
            "--help" | "-h" => {
                println!("Usage: strata_demo [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <PATH>    World config (TOML)");
                println!("  -s, --seed <SEED>      Override the world seed");
                println!("  -r, --radius <N>       Chunks around the origin (default: 2)");
                println!("      --reset            Delete saved chunks first");
                println!("  -h, --help             Show this help");
                return;
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(path) => match WorldConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::error!(%err, path = %path, "config rejected");
                std::process::exit(1);
            }
        },
        None => WorldConfig::default(),
    };
    if let Some(seed) = seed {
        config.world.seed = seed;
    }

    let mut pipeline = match ChunkPipeline::open(config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            tracing::error!(%err, "pipeline failed to start");
            std::process::exit(1);
        }
    };
    if reset {
        pipeline.reset_world();
    }

    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│  Seed:        {:<50}│", pipeline.config().world.seed);
    println!("│  Chunk size:  {:<50}│", pipeline.chunk_size());
    println!("│  Radius:      {:<50}│", radius);
    println!("│  Store:       {:<50}│", pipeline.store_root().display());
    println!("└─────────────────────────────────────────────────────────────────┘");
    println!();

    let voxel_total = Arc::new(Mutex::new(0usize));
    let started = Instant::now();
    for z in -radius..=radius {
        for x in -radius..=radius {
            let voxel_total = Arc::clone(&voxel_total);
            pipeline.request_chunk(ChunkKey::new(x, z), move |_, voxels| {
                *voxel_total.lock() += voxels.len();
            });
        }
    }
    if !pipeline.wait_idle(Duration::from_secs(120)) {
        tracing::error!("chunks did not resolve in time");
    }
    let elapsed = started.elapsed();

    // Dig out the surface voxel at the origin and plant a wooden post.
    let origin = ChunkKey::new(0, 0);
    let surface = Arc::new(Mutex::new(None));
    {
        let surface = Arc::clone(&surface);
        pipeline.request_chunk(origin, move |_, voxels| {
            *surface.lock() = voxels.ground_height(0, 0, 128, -64);
        });
    }
    let surface = *surface.lock();
    if let Some(y) = surface {
        pipeline.edit_block(VoxelPos::new(0, y, 0), Edit::Remove);
        pipeline.edit_block(
            VoxelPos::new(0, y + 1, 0),
            Edit::Place {
                material: Material::Wood,
                color: None,
            },
        );
        pipeline.clear_cache();

        let post = Arc::new(Mutex::new(None));
        {
            let post = Arc::clone(&post);
            pipeline.request_chunk(origin, move |_, voxels| {
                *post.lock() = voxels.get_block(0, y + 1, 0).and_then(|v| v.material());
            });
        }
        pipeline.wait_idle(Duration::from_secs(30));
        println!(
            "Edit at (0, {}, 0) after reload: {}",
            y + 1,
            post.lock().map_or("missing", Material::name)
        );
    }

    let stats = pipeline.stats();
    println!();
    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    println!("│  Voxels delivered:   {:<43}│", *voxel_total.lock());
    println!("│  Time to resolve:    {:<43}│", format!("{elapsed:.2?}"));
    println!("│  Generated:          {:<43}│", stats.generations);
    println!("│  Loaded from disk:   {:<43}│", stats.disk_hits);
    println!("│  Cache hits:         {:<43}│", stats.cache_hits);
    println!("│  Coalesced:          {:<43}│", stats.coalesced);
    println!("│  Evictions:          {:<43}│", stats.evictions);
    println!("│  Edits:              {:<43}│", stats.edits);
    println!("│  IO failures:        {:<43}│", stats.persistence_failures);
    println!("└─────────────────────────────────────────────────────────────────┘");

    pipeline.shutdown();
}
