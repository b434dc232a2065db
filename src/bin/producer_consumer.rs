use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::info;

use mring::driver::{self, DriverConfig};

/// Run producer and consumer threads against one bounded buffer.
#[derive(Parser, Debug)]
#[command(name = "producer-consumer", version)]
struct Args {
    /// Number of slots in the shared buffer
    #[arg(long, default_value_t = 3)]
    capacity: usize,

    /// Number of producer threads
    #[arg(long, default_value_t = 5)]
    producers: usize,

    /// Number of consumer threads
    #[arg(long, default_value_t = 5)]
    consumers: usize,

    /// Items inserted by each producer
    #[arg(long, default_value_t = 1)]
    items_per_producer: usize,

    /// Value of the first item; later items count up from it
    #[arg(long, default_value_t = 10)]
    first_item: u8,

    /// Simulated work per item, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

impl From<Args> for DriverConfig {
    fn from(args: Args) -> Self {
        DriverConfig {
            capacity: args.capacity,
            producers: args.producers,
            consumers: args.consumers,
            items_per_producer: args.items_per_producer,
            first_item: args.first_item,
            work_delay: Duration::from_millis(args.delay_ms),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DriverConfig::from(Args::parse());
    let report = driver::run(&config).context("invalid producer/consumer configuration")?;

    for (index, items) in report.consumed.iter().enumerate() {
        println!("consumer({index}) took {items:?}");
    }
    ensure!(
        report.all_delivered_once(),
        "items were lost or duplicated: produced {:?}, consumed {:?}",
        report.produced,
        report.consumed
    );
    info!("all {} items delivered exactly once", report.consumed_total());
    Ok(())
}
