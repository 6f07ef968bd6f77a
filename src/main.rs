//! # Main — CLI Entry Point
//!
//! Positional interface:
//!
//! ```text
//! cubehunt cores k pmin pmax dmax zmax [options] [pcnt=N ccnt=N dcnt=N rcnt=N]
//! ```
//!
//! - `cores`: worker count; 0 uses every logical processor.
//! - `k`: target, ≤ 1000 and ≡ 3 or 6 (mod 9).
//! - `pmin`/`pmax`: prime range; `p0xq`/`p0xr` selects subprime mode with
//!   the largest prime fixed to p0.
//! - `dmax`, `zmax`: search bounds (zmax parsed as a 128-bit integer).
//! - `options`: 1..6 restricts the run to an initial subset of phases
//!   (1 = precompute only, 6 = all phases).
//! - trailing `cnt=` pairs cross-check the final counters.
//!
//! Set `LOG_FORMAT=json` for machine-readable logs.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use cubehunt::params::RunParams;

#[derive(Parser)]
#[command(
    name = "cubehunt",
    about = "Search for candidate solutions of x^3 + y^3 + z^3 = k"
)]
struct Cli {
    /// Number of worker threads (0 = all logical processors)
    cores: u32,

    /// Target k (<= 1000, congruent to 3 or 6 mod 9)
    k: u64,

    /// Smallest prime to process, or "p0xq" for subprime mode
    pmin: String,

    /// Largest prime to process, or "p0xr" for subprime mode
    pmax: String,

    /// Largest divisor d = |x + y| to consider
    dmax: u64,

    /// Largest |z| to consider (128-bit)
    zmax: String,

    /// Optional phase restriction (1..6) and counter checks (pcnt=N ...)
    extras: Vec<String>,

    /// Path to the checkpoint file for resumable runs
    #[arg(long, default_value = "cubehunt.checkpoint")]
    checkpoint: PathBuf,

    /// Run without reading or writing a checkpoint
    #[arg(long)]
    no_checkpoint: bool,
}

fn main() -> Result<()> {
    // structured logging: LOG_FORMAT=json for machines, human-readable otherwise
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let cli = Cli::parse();
    let checkpoint = if cli.no_checkpoint {
        None
    } else {
        Some(cli.checkpoint.clone())
    };
    let params = RunParams::parse(
        cli.cores,
        cli.k,
        &cli.pmin,
        &cli.pmax,
        cli.dmax,
        &cli.zmax,
        &cli.extras,
        checkpoint,
    )?;

    let summary = cubehunt::run(&params)?;
    println!(
        "pcnt={} ccnt={} dcnt={} rcnt={} hits={}",
        summary.counts.pcnt,
        summary.counts.ccnt,
        summary.counts.dcnt,
        summary.counts.rcnt,
        summary.hits.len()
    );
    for hit in &summary.hits {
        println!("HIT d={} x={} y={} z={}", hit.d, hit.x, hit.y, hit.z);
    }
    Ok(())
}
