use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use triangular_arbitrage::{
    config::TriangularConfig,
    connectors::{MarketSnapshot, PaperConnector},
    strategy::{CyclePlan, TriangularStrategy},
    trading::TickDriver,
    utils::logger,
    Result,
};

#[derive(Parser)]
#[command(name = "triarb")]
#[command(about = "Triangular arbitrage trading strategy")]
#[command(version)]
struct Cli {
    /// Configuration file path; environment variables are used when the
    /// file does not exist
    #[arg(short, long, default_value = "config/strategy.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file path
    #[arg(long, default_value = "logs/triarb.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the strategy against a paper market definition
    Run {
        /// Paper market definition (TOML)
        #[arg(short, long, default_value = "config/market.toml")]
        market: PathBuf,

        /// Evaluation tick interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many ticks
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Validate configuration and cycle derivation
    Validate,
    /// Print the derived trading cycles
    Cycles,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    logger::init(&cli.log_level, &cli.log_file)?;

    info!("Starting Triangular Arbitrage Strategy v{}", triangular_arbitrage::VERSION);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { market, interval_ms, ticks } => {
            run_paper(config, market, interval_ms, ticks).await
        }
        Commands::Validate => validate_config(config),
        Commands::Cycles => show_cycles(config),
    }
}

fn load_config(path: &PathBuf) -> Result<TriangularConfig> {
    if path.exists() {
        let config = TriangularConfig::from_file(path)?;
        info!("Configuration loaded from: {}", path.display());
        Ok(config)
    } else {
        let config = TriangularConfig::from_env()?;
        info!("Configuration loaded from environment");
        Ok(config)
    }
}

async fn run_paper(
    config: TriangularConfig,
    market: PathBuf,
    interval_ms: u64,
    ticks: Option<u64>,
) -> Result<()> {
    let snapshot = MarketSnapshot::from_file(&market)?;
    info!("Paper market loaded from: {}", market.display());

    let connector = PaperConnector::from_snapshot(config.connector_name.clone(), snapshot);
    let mut strategy = TriangularStrategy::new(config);

    let mut driver = TickDriver::new(Duration::from_millis(interval_ms));
    if let Some(ticks) = ticks {
        driver = driver.with_max_ticks(ticks);
    }
    driver.run(&mut strategy, &connector).await?;

    println!("{}", strategy.format_status());
    println!(
        "{}",
        serde_json::to_string_pretty(&strategy.status())?
    );
    Ok(())
}

fn validate_config(config: TriangularConfig) -> Result<()> {
    info!("Validating configuration...");

    match config.validate().and_then(|_| CyclePlan::build(&config)) {
        Ok(_) => {
            info!("Configuration is valid");
            println!("Configuration validation passed!");
            Ok(())
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            Err(e)
        }
    }
}

fn show_cycles(config: TriangularConfig) -> Result<()> {
    let plan = CyclePlan::build(&config)?;
    println!("{}", plan.forward);
    println!("{}", plan.reverse);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }
}
