use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Percentage of read operations (root or leaf) in the generated
    /// workload; the rest are updates.
    ///
    /// Accepted values are in the range of 0 to 100
    #[arg(long = "read-percent", short = 'r', default_value_t = 0)]
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub read_percent: u8,

    /// Directory where the response-time and summary CSV files are written.
    #[arg(long = "csv-dir", default_value = ".")]
    pub csv_dir: PathBuf,

    /// Seed for the workload generator.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

/// Workload shape, read from stdin as four whitespace-separated integers:
/// depth, batch size, worker count, total operations.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    pub depth: usize,
    pub batch_size: usize,
    pub num_workers: usize,
    pub total_ops: usize,
}

pub fn read_params() -> Result<Params> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading stdin")?;
    let mut numbers = input.split_whitespace();
    let mut next = |name: &str| -> Result<i64> {
        numbers
            .next()
            .with_context(|| format!("missing {name}"))?
            .parse::<i64>()
            .with_context(|| format!("invalid {name}"))
    };

    let depth = next("depth")?;
    let batch_size = next("batch_size")?;
    let num_workers = next("num_workers")?;
    let total_ops = next("total_ops")?;

    if depth < 0 || depth as usize > csmt::MAX_DEPTH {
        bail!("depth must be in 0..={}, got {depth}", csmt::MAX_DEPTH);
    }
    if batch_size <= 0 {
        bail!("batch_size must be positive, got {batch_size}");
    }
    if num_workers <= 0 || num_workers as usize > csmt::MAX_WORKERS {
        bail!(
            "num_workers must be in 1..={}, got {num_workers}",
            csmt::MAX_WORKERS
        );
    }
    if total_ops <= 0 {
        bail!("total_ops must be positive, got {total_ops}");
    }

    Ok(Params {
        depth: depth as usize,
        batch_size: batch_size as usize,
        num_workers: num_workers as usize,
        total_ops: total_ops as usize,
    })
}
