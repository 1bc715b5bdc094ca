//! Example of using the peers crawler.

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use peers_crawler::{parse_seed, CrawlError, CrawlReport, CrawlerBuilder, PortPolicy, DEFAULT_SEED_URL};
use std::time::Duration;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Ports {
    /// Every peer listens on the seed's port.
    Seed,
    /// Use the ports peers advertise.
    Advertised,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the seed node, e.g. http://167.99.243.111:4003.
    #[arg(default_value = DEFAULT_SEED_URL)]
    seed: String,

    /// Peers visited per peer list.
    #[arg(short, long, default_value = "8")]
    sample_size: usize,

    /// Connect timeout in milliseconds.
    #[arg(long, default_value = "3000")]
    connect_timeout: u64,

    /// Request timeout in milliseconds.
    #[arg(long, default_value = "3000")]
    request_timeout: u64,

    /// Which port to use for discovered peers.
    #[arg(short, long, value_enum, default_value = "seed")]
    ports: Ports,

    /// Maximum number of peer requests in flight (optional).
    #[arg(short, long)]
    max_in_flight: Option<usize>,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_level = match args.log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    // Configure fern logger
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}] {} - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log_level)
        .chain(std::io::stderr())
        .apply()?;

    let seed = parse_seed(&args.seed)?;
    log::info!("CRAWLING THE NETWORK FROM {seed}");

    let mut builder = CrawlerBuilder::new()
        .with_sample_size(args.sample_size)?
        .with_connection_timeout(Duration::from_millis(args.connect_timeout))
        .with_request_timeout(Duration::from_millis(args.request_timeout))
        .with_port_policy(match args.ports {
            Ports::Seed => PortPolicy::Seed,
            Ports::Advertised => PortPolicy::Advertised,
        });
    if let Some(max) = args.max_in_flight {
        log::debug!("Capping in-flight requests at {max}");
        builder = builder.with_max_in_flight_requests(max);
    }
    let crawler = builder.build();

    let result = match crawler.crawl(seed).await {
        Ok(result) => result,
        Err(CrawlError::Incomplete { result, reason }) => {
            log::error!("Crawl did not complete: {reason}");
            *result
        }
    };

    println!("{}", CrawlReport::from_result(&result));

    Ok(())
}
