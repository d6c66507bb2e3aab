mod cli;
mod config;
mod pipelines;
mod utils;

use std::env;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use env_logger::Builder;
use log::{debug, error, info, LevelFilter};
use tokio::sync::Semaphore;

use crate::cli::parse;
use crate::config::defs::RunConfig;
use crate::utils::system::compute_worker_slots;
use pipelines::amplicon_otu;

#[tokio::main]
async fn main() -> Result<()> {
    let run_start = Instant::now();

    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    println!("\n-------------\n NanOTU\n-------------\n");

    let cwd = env::current_dir()?;
    info!("The current directory is {:?}", cwd);

    let worker_slots = compute_worker_slots(args.threads);
    debug!("Using {} worker slot(s) for per-file stages", worker_slots);
    let maximal_semaphore = Arc::new(Semaphore::new(worker_slots));

    let run_config = Arc::new(RunConfig {
        cwd,
        args,
        worker_slots,
        maximal_semaphore,
    });

    if let Err(e) = amplicon_otu::run(run_config).await {
        error!("Pipeline failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
        std::process::exit(1);
    }

    println!("Run complete: {} milliseconds.", run_start.elapsed().as_millis());
    Ok(())
}
