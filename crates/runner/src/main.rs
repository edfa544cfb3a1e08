use log::info;
use meridian_runner::{EngineConfig, FeedConfig, ReplaySession, SyntheticFeed, Trader};

fn print_help() {
    eprintln!(
        r#"Meridian - per-tick market-making and stat-arb engine

USAGE:
    meridian [OPTIONS]

OPTIONS:
    --config <PATH>     Load engine configuration from JSON file
    --ticks <N>         Number of synthetic ticks to replay (default: 1000)
    --seed <N>          Seed for the synthetic feed (default: 42)
    --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Log level filter

EXAMPLES:
    # Replay the built-in strategy set
    meridian

    # Replay a config file over 5000 ticks
    meridian --config engine.json --ticks 5000
"#
    );
}

/// Value following a flag, or exit with an error
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i) {
        Some(value) => value.as_str(),
        None => {
            eprintln!("Error: {} requires a value", flag);
            std::process::exit(1);
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;
    let mut ticks: usize = 1000;
    let mut seed: u64 = 42;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--config" | "-c" => {
                i += 1;
                config_path = Some(flag_value(&args, i, "--config").to_string());
            }
            "--ticks" => {
                i += 1;
                ticks = flag_value(&args, i, "--ticks").parse()?;
            }
            "--seed" => {
                i += 1;
                seed = flag_value(&args, i, "--seed").parse()?;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            EngineConfig::from_file(&path)?
        }
        None => {
            info!("Using built-in strategy set");
            EngineConfig::with_default_strategies()
        }
    };

    let feed_config = FeedConfig::default().covering(config.resolved_limits().into_keys());
    let trader = Trader::new(config)?;
    let mut feed = SyntheticFeed::with_seed(feed_config, seed);
    let mut session = ReplaySession::new(trader);

    info!("Replaying {} ticks with seed {}", ticks, seed);
    let summary = session.run(&mut feed, ticks);
    println!("{}", serde_json::to_string_pretty(summary)?);

    Ok(())
}
