mod bench;
mod cli;
mod logging;
mod timer;
mod workload;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    logging::init();
    let cli = cli::Cli::parse();
    let params = cli::read_params()?;
    bench::run(&cli, &params)
}
