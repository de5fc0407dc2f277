use clap::{Args, Parser, Subcommand};
use cr29_miner::{Job, Miner, MinerConfig, Share, Target};
use cuckaroo::{CpuBackend, Cuckaroo, Outcome, Proof, SipKeys, Solver};
use std::error::Error;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "cr29", version, about = "42-cycle cuckaroo solver and miner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Time solve attempts over a range of nonces
    Bench {
        #[command(flatten)]
        graph: GraphArgs,
        /// Number of nonces to attempt
        #[arg(long, default_value_t = 8)]
        count: u64,
    },
    /// Search one graph for a proof
    Solve {
        #[command(flatten)]
        graph: GraphArgs,
    },
    /// Check a proof against a header and nonce
    Verify {
        #[command(flatten)]
        graph: GraphArgs,
        /// Comma-separated proof nonces, ascending
        #[arg(long)]
        proof: String,
    },
    /// Mine a fixed job until interrupted
    Mine {
        #[command(flatten)]
        graph: GraphArgs,
        /// Share difficulty; every proof is a share when unset
        #[arg(long)]
        difficulty: Option<u64>,
        /// Seconds between statistics reports
        #[arg(long, default_value_t = 10)]
        report_secs: u64,
    },
}

#[derive(Args, Debug)]
struct GraphArgs {
    /// Header bytes, hex encoded
    #[arg(long, default_value = "")]
    header: String,
    /// First graph nonce
    #[arg(long, default_value_t = 0)]
    nonce: u64,
    /// JSON configuration file, replacing the flags below
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    miner: MinerConfig,
}

impl GraphArgs {
    fn header(&self) -> Result<Vec<u8>, Box<dyn Error>> {
        Ok(hex::decode(&self.header)?)
    }

    fn config(&self) -> Result<MinerConfig, Box<dyn Error>> {
        match &self.config {
            Some(path) => Ok(MinerConfig::from_json_file(path)?),
            None => Ok(self.miner.clone()),
        }
    }

    fn backend(config: &MinerConfig) -> Result<CpuBackend, Box<dyn Error>> {
        Ok(match config.threads {
            Some(threads) => CpuBackend::with_threads(0, threads)?,
            None => CpuBackend::new(),
        })
    }
}

fn bench(graph: &GraphArgs, count: u64) -> CliResult {
    let config = graph.config()?;
    let header = graph.header()?;
    let params = config.params();
    let mut solver = Solver::new(GraphArgs::backend(&config)?, params)?;
    let mut mem = solver.memory()?;
    info!(bytes = mem.bytes(), edge_bits = params.edge_bits, "solver memory allocated");

    let start = Instant::now();
    let mut cycles = 0;
    for nonce in graph.nonce..graph.nonce.saturating_add(count) {
        let attempt = Instant::now();
        let report = solver.solve(&SipKeys::from_header(&header, Some(nonce)), &mut mem, &())?;
        if report.proof().is_some() {
            cycles += 1;
        }
        println!(
            "nonce {}: {} rounds, {} residual edges, {} in {:.3}s",
            nonce,
            report.trim.rounds(),
            report.residual,
            if report.proof().is_some() { "cycle" } else { "no cycle" },
            attempt.elapsed().as_secs_f64()
        );
    }
    let secs = start.elapsed().as_secs_f64();
    println!(
        "{} graphs in {:.3}s, {:.3} graphs/s, {} cycles",
        count,
        secs,
        count as f64 / secs.max(f64::EPSILON),
        cycles
    );
    Ok(())
}

fn solve(graph: &GraphArgs) -> CliResult {
    let config = graph.config()?;
    let header = graph.header()?;
    let mut solver = Solver::new(GraphArgs::backend(&config)?, config.params())?;
    let mut mem = solver.memory()?;
    let report = solver.solve(&SipKeys::from_header(&header, Some(graph.nonce)), &mut mem, &())?;
    match report.outcome {
        Outcome::Found(proof) => {
            println!("{}", serde_json::to_string(&proof)?);
            println!("difficulty {}", proof.difficulty(config.edge_bits));
        }
        _ => println!("no cycle"),
    }
    Ok(())
}

fn verify(graph: &GraphArgs, proof: &str) -> CliResult {
    let config = graph.config()?;
    let nonces = proof
        .split(',')
        .map(|n| n.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()?;
    let proof = Proof::try_from(nonces)?;
    let instance = Cuckaroo::from_keys(
        SipKeys::from_header(&graph.header()?, Some(graph.nonce)),
        config.params(),
    )?;
    instance.verify(&proof)?;
    println!("valid, difficulty {}", proof.difficulty(config.edge_bits));
    Ok(())
}

async fn mine(graph: &GraphArgs, difficulty: Option<u64>, report_secs: u64) -> CliResult {
    let config = graph.config()?;
    let target = difficulty.map_or(Target::MAX, Target::from_difficulty);
    let (tx, rx) = mpsc::channel::<Share>();
    let printer = thread::spawn(move || {
        for share in rx {
            println!(
                "share job={} nonce={} difficulty={} proof={:?}",
                share.job_id,
                share.nonce,
                share.difficulty,
                share.edges()
            );
        }
    });

    let miner = Miner::new(config).start(tx)?;
    let job = Job::new("static", graph.header()?, target, true).with_first_nonce(graph.nonce);
    miner.board().publish(job);
    info!(%target, first_nonce = graph.nonce, "mining static job, ctrl-c to stop");

    let mut ticker = tokio::time::interval(Duration::from_secs(report_secs.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            _ = ticker.tick() => {
                info!(states = ?miner.states(), "{}", miner.stats().snapshot());
            }
        }
        if miner.is_finished() {
            break;
        }
    }

    let stats = miner.stats().clone();
    let stopped = tokio::task::spawn_blocking(move || miner.stop()).await?;
    let _ = printer.join();
    info!("{}", stats.snapshot());
    Ok(stopped?)
}

#[tokio::main]
async fn main() -> CliResult {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let cli = Cli::parse();
    match &cli.command {
        Command::Bench { graph, count } => bench(graph, *count),
        Command::Solve { graph } => solve(graph),
        Command::Verify { graph, proof } => verify(graph, proof),
        Command::Mine {
            graph,
            difficulty,
            report_secs,
        } => mine(graph, *difficulty, *report_secs).await,
    }
}
