//! DiMARCo CLI - inspect the noise schedule and routing, run the denoiser
//!
//! Examples:
//!   dimarco schedule --steps 20
//!   dimarco route --size 24
//!   dimarco run --size 30 --timestep 5 --seed 7

use anyhow::{Context, Result};
use candle_core::{Device, Tensor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dimarco::{DiffusionConfig, DiffusionGridDenoiser, GridTier, NoiseScheduler, Objective, VERSION};

/// DiMARCo - size-routed diffusion U-Net for ARC grids
#[derive(Parser, Debug)]
#[command(name = "dimarco")]
#[command(author, version, about = "Size-routed diffusion U-Net for ARC grids", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use CPU instead of GPU
    #[arg(long, global = true)]
    cpu: bool,

    /// Path to a YAML model config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the number of diffusion steps
    #[arg(long, global = true)]
    steps: Option<usize>,

    /// Override the objective (v-space or noise)
    #[arg(long, global = true)]
    objective: Option<Objective>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the beta schedule
    Schedule,

    /// Show the tier and layer path for a grid size
    Route {
        /// Grid side length
        #[arg(short, long)]
        size: usize,
    },

    /// Noise a blank grid and run the denoiser on it
    Run {
        /// Grid side length
        #[arg(short, long, default_value = "32")]
        size: usize,

        /// Batch size
        #[arg(short, long, default_value = "1")]
        batch: usize,

        /// Diffusion step to noise at (defaults to the last step)
        #[arg(short, long)]
        timestep: Option<usize>,

        /// Seed for a reproducible noise draw
        #[arg(long)]
        seed: Option<u64>,

        /// Safetensors weights (random initialisation when omitted)
        #[arg(short, long)]
        weights: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    info!("DiMARCo v{}", VERSION);

    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Schedule => print_schedule(&config),
        Commands::Route { size } => {
            print_route(*size);
            Ok(())
        }
        Commands::Run {
            size,
            batch,
            timestep,
            seed,
            weights,
        } => run_denoiser(&cli, config, *size, *batch, *timestep, *seed, weights),
    }
}

fn load_config(cli: &Cli) -> Result<DiffusionConfig> {
    let mut config = match &cli.config {
        Some(path) => DiffusionConfig::load(path)?,
        None => DiffusionConfig::default(),
    };
    if let Some(steps) = cli.steps {
        config = config.with_steps(steps);
    }
    if let Some(objective) = cli.objective {
        config = config.with_objective(objective);
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn print_schedule(config: &DiffusionConfig) -> Result<()> {
    let scheduler = NoiseScheduler::from_config(config)?;
    println!("objective: {}", config.objective);
    println!("{:>4}  {:>12}  {:>12}  {:>12}", "t", "beta", "signal", "noise");
    for t in 0..scheduler.len() {
        println!(
            "{:>4}  {:>12.6e}  {:>12.6}  {:>12.6}",
            t,
            scheduler.beta(t)?,
            scheduler.signal_scale(t)?,
            scheduler.noise_scale(t)?
        );
    }
    Ok(())
}

fn print_route(size: usize) {
    let tier = GridTier::from_size(size);
    println!("size {size} -> {tier} tier");
    println!("  {}", tier.stage_names().join(" -> "));
}

fn run_denoiser(
    cli: &Cli,
    config: DiffusionConfig,
    size: usize,
    batch: usize,
    timestep: Option<usize>,
    seed: Option<u64>,
    weights: &Option<PathBuf>,
) -> Result<()> {
    let device = if cli.cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available(0)?
    };
    info!("Device: {:?}", device);

    let model = match weights {
        Some(path) => DiffusionGridDenoiser::from_safetensors(config, &[path], &device)
            .with_context(|| format!("Failed to load weights from {:?}", path))?,
        None => DiffusionGridDenoiser::with_random_weights(config, &device)?.0,
    };

    let t = timestep.unwrap_or(model.scheduler().len() - 1);
    let grid = model.blank_grid(batch, size)?;
    let noisy = match seed {
        Some(seed) => {
            let noise = NoiseScheduler::seeded_noise(grid.dims(), seed, &device)?;
            model.scheduler().add_noise_with(&grid, t, &noise)?
        }
        None => model.add_noise(&grid, t)?,
    };

    let tier = model.route(&noisy)?;
    info!("Routing through {} tier: {}", tier, tier.stage_names().join(" -> "));

    let start = Instant::now();
    let prediction = model.forward(&noisy).context("Forward pass failed")?;
    let elapsed = start.elapsed();

    let estimate = model
        .scheduler()
        .predict_clean(&noisy, &prediction, t, model.objective())?;
    let (mean, std) = mean_std(&estimate)?;

    println!("input:      {:?}", noisy.dims());
    println!("output:     {:?} ({})", prediction.dims(), model.objective());
    println!("timestep:   {t}");
    println!("clean est.: mean={mean:.6} std={std:.6}");
    println!("forward:    {:.2}ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn mean_std(x: &Tensor) -> Result<(f32, f32)> {
    let mean = x.mean_all()?;
    let var = x.broadcast_sub(&mean)?.sqr()?.mean_all()?;
    Ok((mean.to_scalar()?, var.sqrt()?.to_scalar()?))
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}
