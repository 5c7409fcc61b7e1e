//! Fabric Simulation CLI
//!
//! Usage:
//!   fabric-sim schedule --trees 40 --output data/bibd_40.txt
//!   fabric-sim simulate --trees-dir data/arbs_k80 \
//!                       --schedule data/bibd_40.txt \
//!                       --paths data/sq1_k80.json \
//!                       --algorithms detcirc,prnb,sq1,bibd \
//!                       --rates 0,0.05,0.1 --traffic uniform
//!   fabric-sim simulate --trees-dir data/arbs_k80 \
//!                       --traffic all-to-one:acc7 --failure-model destination

use anyhow::Result;
use arbor_routing::{Algorithm, RelabelCache};
use clap::{Parser, Subcommand};
use clos_fabric::ClosTopology;
use fabric_sim::{
    inject, loader, simulate, BatchRecord, BatchSpec, FailureModel, OutputFormat, SimConfig,
    SimError, SimReport, TrafficMatrix,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    name = "fabric-sim",
    about = "Failure-injection load simulation for arborescence routing over Clos fabrics"
)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a BIBD switching schedule for a tree count and write it
    Schedule {
        /// Number of arborescences the schedule has to cover
        #[arg(short, long)]
        trees: usize,

        /// Seed for row duplication and column shuffles
        #[arg(long, default_value_t = 123)]
        seed: u64,

        /// Output table file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run failure scenarios over a traffic matrix
    Simulate(SimulateArgs),
}

#[derive(clap::Args, Debug)]
struct SimulateArgs {
    /// Directory of arb<i>.adj files, or a JSON tree file
    #[arg(long)]
    trees_dir: PathBuf,

    /// BIBD schedule table (needed for bibd)
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Square-one path table JSON (needed for sq1)
    #[arg(long)]
    paths: Option<PathBuf>,

    /// JSON config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Clos fan-out
    #[arg(short = 'k', long)]
    fan_out: Option<usize>,

    /// `uniform`, `all-to-one:<dest>`, or a matrix file
    #[arg(long)]
    traffic: Option<String>,

    /// Label for output records
    #[arg(long)]
    tag: Option<String>,

    #[arg(long, value_delimiter = ',')]
    algorithms: Option<Vec<Algorithm>>,

    /// Automorphism variants (1 = fixed core, 2 = rotated core)
    #[arg(long, value_delimiter = ',')]
    variants: Option<Vec<u8>>,

    /// Link failure rates
    #[arg(long, value_delimiter = ',')]
    rates: Option<Vec<f64>>,

    /// Fail links anywhere, or only at the all-to-one destination
    #[arg(long, value_enum)]
    failure_model: Option<FailureModel>,

    /// Scenarios per failure rate
    #[arg(long)]
    repeats: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Abort batches running longer than this
    #[arg(long)]
    deadline_secs: Option<f64>,

    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,
}

impl SimulateArgs {
    fn config(&self) -> Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::load(path)?,
            None => SimConfig::default(),
        };

        if let Some(k) = self.fan_out {
            config = config.fan_out(k);
        }
        if let Some(ref spec) = self.traffic {
            config = config.traffic(spec);
        }
        if let Some(ref tag) = self.tag {
            config = config.tag(tag);
        }
        if let Some(ref algorithms) = self.algorithms {
            config = config.algorithms(algorithms.clone());
        }
        if let Some(ref variants) = self.variants {
            config = config.variants(variants.clone());
        }
        if let Some(ref rates) = self.rates {
            config = config.failure_rates(rates.clone());
        }
        if let Some(model) = self.failure_model {
            config = config.failure_model(model);
        }
        if let Some(n) = self.repeats {
            config = config.repeats(n);
        }
        if let Some(s) = self.seed {
            config = config.seed(s);
        }
        if let Some(secs) = self.deadline_secs {
            config = config.deadline_secs(secs);
        }
        if let Some(format) = self.output {
            config = config.output(format);
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so records on stdout stay parseable
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match args.command {
        Command::Schedule { trees, seed, output } => run_schedule(trees, seed, output),
        Command::Simulate(sim) => run_simulate(sim),
    }
}

fn run_schedule(trees: usize, seed: u64, output: PathBuf) -> Result<()> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let schedule = design_schedule::schedule_for(trees, &mut rng)?;
    schedule.save(&output)?;
    info!(trees, rows = schedule.rows(), path = %output.display(), "Wrote schedule");
    Ok(())
}

fn run_simulate(args: SimulateArgs) -> Result<()> {
    let config = args.config()?;
    let variants = config.parsed_variants()?;

    let topology = Arc::new(ClosTopology::new(config.fan_out)?);
    info!(
        fan_out = config.fan_out,
        nodes = topology.node_count(),
        links = topology.edge_count(),
        "Built fabric"
    );

    // Everything below is checked before the first batch runs
    let engine = loader::load_engine(
        Arc::clone(&topology),
        &args.trees_dir,
        args.schedule.as_deref(),
        args.paths.as_deref(),
        config.seed,
    )?;
    for &algorithm in &config.algorithms {
        engine.check_ready(algorithm)?;
    }
    let traffic = TrafficMatrix::from_spec(&config.traffic, topology.access_count())?;
    if traffic.size() != topology.access_count() {
        return Err(SimError::DimensionMismatch {
            expected: topology.access_count(),
            found: traffic.size(),
        }
        .into());
    }

    let cache = RelabelCache::new(Arc::clone(&topology));
    for &variant in &variants {
        cache.warm(variant)?;
    }
    let tag = config.record_tag();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut report = SimReport::new(config.fan_out, engine.tree_count());
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for &rate in &config.failure_rates {
        for _ in 0..config.repeats {
            let failures = inject(config.failure_model, &topology, config.destination(), rate, &mut rng)?;
            for &algorithm in &config.algorithms {
                for &variant in &variants {
                    let spec = BatchSpec {
                        algorithm,
                        variant,
                        tag: tag.clone(),
                        rate,
                    };
                    let outcome = match simulate(&engine, &cache, &failures, &traffic, spec, config.deadline()) {
                        Ok(outcome) => outcome,
                        Err(SimError::DeadlineExceeded { limit_secs }) => {
                            warn!(%algorithm, variant = variant.number(), rate, limit_secs, "Batch skipped");
                            continue;
                        }
                        Err(e) => return Err(e.into()),
                    };

                    let record = BatchRecord::from_outcome(&outcome);
                    if config.output == OutputFormat::Text {
                        writeln!(out, "{}", record.to_line())?;
                        out.flush()?;
                    }
                    report.push(record);
                }
            }
        }
    }

    if config.output != OutputFormat::Text {
        writeln!(out, "{}", report.render(config.output)?)?;
    }
    info!(batches = report.records.len(), "Simulation finished");
    Ok(())
}
