use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use softwalker_core::batch::{run_batch, step_population};
use softwalker_core::config::SimConfig;
use softwalker_core::creature::Creature;
use softwalker_core::evolution::seed_population;
use softwalker_core::metrics::RunSummary;
use softwalker_core::orchestrator::Orchestrator;
use softwalker_core::rng::create_rng;
use softwalker_core::topology::Topology;
use softwalker_core::worker::EvolutionWorker;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const BENCHMARK_TICKS: usize = 600;
const PARITY_TOLERANCE: f64 = 1e-9;

#[derive(Parser)]
#[command(name = "softwalker")]
#[command(about = "Evolve soft-body walkers headlessly")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evolve a population for a number of generations
    Run {
        /// Path to config file (JSON); defaults are used when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to topology file (JSON); the built-in biped when omitted
        #[arg(long)]
        topology: Option<PathBuf>,

        /// Number of generations to evolve
        #[arg(long, default_value_t = 20)]
        generations: usize,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare batched and per-creature stepping for throughput and parity
    Benchmark,
    /// Dump the default configuration to stdout
    DumpDefaultConfig,
    /// Dump the built-in biped topology to stdout
    DumpDefaultTopology,
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let file = File::open(path).with_context(|| format!("failed to open {what} file {path:?}"))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("failed to parse {what}"))
}

fn run_generations(
    config: SimConfig,
    topology: Topology,
    generations: usize,
) -> Result<RunSummary> {
    let use_worker = config.use_worker;
    let mut orchestrator =
        Orchestrator::new(config, Arc::new(topology)).context("failed to initialize run")?;
    if !use_worker {
        return orchestrator.run(generations).context("run failed");
    }
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async {
        let worker = EvolutionWorker::spawn().context("failed to spawn evolution worker")?;
        let summary = orchestrator.run_with_worker(generations, &worker).await;
        worker.shutdown().await;
        summary.context("run failed")
    })
}

fn population(topology: &Arc<Topology>, size: usize, seed: u64) -> Vec<Creature> {
    let muscle_ids: Vec<_> = topology.muscle_ids().collect();
    seed_population(size, &muscle_ids, &mut create_rng(seed))
        .into_iter()
        .enumerate()
        .map(|(slot, genome)| Creature::new(slot as u64, genome, Arc::clone(topology)))
        .collect()
}

fn max_relative_gap(a: &[Creature], b: &[Creature]) -> f64 {
    let mut worst = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        for (p, q) in x.particles.iter().zip(&y.particles) {
            for (u, v) in [(p.pos.x, q.pos.x), (p.pos.y, q.pos.y)] {
                let scale = u.abs().max(v.abs()).max(1.0);
                worst = worst.max((u - v).abs() / scale);
            }
        }
    }
    worst
}

fn run_benchmark(population_size: usize, config: &SimConfig) -> Result<()> {
    let topology = Arc::new(Topology::biped());
    let env = &config.environment;
    let start = population(&topology, population_size, config.seed);

    let mut fallback = start.clone();
    let t0 = Instant::now();
    step_population(&mut fallback, env, BENCHMARK_TICKS, 0.0, config.dt, &config.step);
    let fallback_us = t0.elapsed().as_micros() as f64;

    let mut serial = start.clone();
    let t1 = Instant::now();
    run_batch(&mut serial, env, BENCHMARK_TICKS, 0.0, config.dt, &config.step, false)?;
    let serial_us = t1.elapsed().as_micros() as f64;

    let mut parallel = start;
    let t2 = Instant::now();
    run_batch(&mut parallel, env, BENCHMARK_TICKS, 0.0, config.dt, &config.step, true)?;
    let parallel_us = t2.elapsed().as_micros() as f64;

    let creature_ticks = (population_size * BENCHMARK_TICKS) as f64;
    println!("--- {population_size} creatures x {BENCHMARK_TICKS} ticks ---");
    for (label, us) in [
        ("per-creature", fallback_us),
        ("batch", serial_us),
        ("batch+rayon", parallel_us),
    ] {
        println!(
            "  {label:<13} {:>10.0} us ({:.0} creature-ticks/sec)",
            us,
            creature_ticks * 1_000_000.0 / us.max(1.0)
        );
    }

    let gap = max_relative_gap(&serial, &fallback).max(max_relative_gap(&parallel, &fallback));
    let verdict = if gap <= PARITY_TOLERANCE { "OK" } else { "MISMATCH" };
    println!("  Parity:        {verdict} (max relative gap {gap:.2e})");
    println!();
    if gap > PARITY_TOLERANCE {
        bail!("batched stepping diverged from per-creature stepping ({gap:.2e})");
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig => {
            let config = SimConfig::default();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::DumpDefaultTopology => {
            println!("{}", serde_json::to_string_pretty(&Topology::biped())?);
        }
        Commands::Benchmark => {
            if cfg!(debug_assertions) {
                eprintln!("WARNING: running in debug mode. Results are not representative.");
                eprintln!("         Use: cargo run -p softwalker-cli --release -- benchmark");
                eprintln!();
            }
            println!("=== SoftWalker stepping benchmark ===");
            let config = SimConfig::default();
            for size in [16, 64, 256, 1024] {
                run_benchmark(size, &config)?;
            }
        }
        Commands::Run {
            config,
            topology,
            generations,
            out,
        } => {
            let sim_config: SimConfig = match &config {
                Some(path) => load_json(path, "config")?,
                None => SimConfig::default(),
            };
            sim_config.validate().context("Config validation error")?;
            let topology: Topology = match &topology {
                Some(path) => load_json(path, "topology")?,
                None => Topology::biped(),
            };

            info!(
                generations,
                population = sim_config.evolution.population_size,
                ticks = sim_config.generation_ticks,
                "starting run"
            );
            let summary = run_generations(sim_config, topology, generations)?;

            if let Some(out_dir) = out {
                std::fs::create_dir_all(&out_dir).context("failed to create output directory")?;
                let summary_path = out_dir.join("summary.json");
                let file = File::create(summary_path).context("failed to create summary file")?;
                serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
                println!("Run complete. Results saved to {:?}", out_dir);
            } else {
                println!(
                    "Run complete. Best fitness: {:.2} over {} generations",
                    summary.best_fitness,
                    summary.generations.len()
                );
            }
        }
    }
    Ok(())
}
