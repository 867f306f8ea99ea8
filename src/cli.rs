use anyhow::Result;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use crate::analysis;
use crate::comfy_table as tables;
use crate::fetcher::MarketDataClient;
use crate::forecasting;
use crate::storage_utils::AsyncStorageManager;
use crate::suggestions::{self, GeminiClient};
use crate::tickers::{self, FORECAST_HORIZONS, Period};
use crate::tui::{self, Services};

const LOG_FILE: &str = "stock-dash.log";

#[derive(Parser)]
#[command(name = "stock-dash")]
#[command(about = "Real-time NSE stock dashboard with forecasts and AI suggestions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive dashboard (default)
    Dashboard,
    /// Print metrics and the most recent rows for one company
    Snapshot {
        /// Company name or ticker, e.g. "Wipro" or SBIN.NS
        #[arg(short, long)]
        company: String,
        /// 1d, 1wk, 1mo, 1y, 2y, 5y or max
        #[arg(short, long, default_value = "1mo")]
        period: Period,
    },
    /// Forecast the daily percentage change
    Forecast {
        #[arg(short, long)]
        company: String,
        /// Horizon in days: 3, 5 or 10
        #[arg(short, long, default_value_t = 5, value_parser = parse_horizon)]
        days: usize,
        /// History used for fitting
        #[arg(short, long, default_value = "1y")]
        period: Period,
        /// Also ask Gemini for a trading suggestion
        #[arg(long)]
        suggest: bool,
    },
    /// List the supported companies
    Tickers,
}

fn parse_horizon(s: &str) -> std::result::Result<usize, String> {
    let days: usize = s.parse().map_err(|_| format!("'{}' is not a number of days", s))?;
    if FORECAST_HORIZONS.contains(&days) {
        Ok(days)
    } else {
        Err(format!("horizon must be one of {:?}", FORECAST_HORIZONS))
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so its logs go to a file under storage.
fn init_tracing(command: &Commands, storage: &AsyncStorageManager) -> Result<()> {
    match command {
        Commands::Dashboard => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(storage.path_of(LOG_FILE))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
    }
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Dashboard);

    if let Commands::Tickers = command {
        println!("{}", tables::tickers_table());
        return Ok(());
    }

    let storage = AsyncStorageManager::new_relative("storage").await?;
    init_tracing(&command, &storage)?;
    let config = storage.load_or_init_config().await?;
    let tz = config.tz()?;
    tracing::debug!(dir = %storage.base_dir.display(), timezone = %tz, "configuration loaded");

    let market = MarketDataClient::new(
        &config.yahoo_base_url,
        config.live_cache_ttl(),
        config.daily_cache_ttl(),
    )?;
    let services = Services {
        market: Arc::new(market),
        config: Arc::new(config),
        tz,
    };

    match command {
        Commands::Dashboard => tui::run_tui(services).await,
        Commands::Snapshot { company, period } => snapshot(&services, &company, period).await,
        Commands::Forecast {
            company,
            days,
            period,
            suggest,
        } => forecast(&services, &company, days, period, suggest).await,
        Commands::Tickers => Ok(()),
    }
}

async fn snapshot(services: &Services, company: &str, period: Period) -> Result<()> {
    let (name, ticker) = tickers::resolve(company)?;
    let data = analysis::load_dashboard(&services.market, ticker, period, services.tz).await?;
    tables::print_snapshot(&data, name, &services.config.currency);
    Ok(())
}

async fn forecast(services: &Services, company: &str, days: usize, period: Period, suggest: bool) -> Result<()> {
    let (name, ticker) = tickers::resolve(company)?;
    let points = forecasting::forecast_pct_change(&services.market, ticker, days, period, services.tz).await?;
    tables::print_forecast(name, days, &points);

    if suggest {
        let gemini = GeminiClient::from_env(&services.config.gemini)?;
        let text = suggestions::get_suggestions(&services.market, &gemini, ticker, period, services.tz).await?;
        println!("\nA.I Suggestions\n{}", text);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_dashboard() {
        let cli = Cli::try_parse_from(["stock-dash"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn forecast_arguments_parse() {
        let cli = Cli::try_parse_from(["stock-dash", "forecast", "-c", "Wipro", "-d", "10", "-p", "2y", "--suggest"])
            .unwrap();
        match cli.command {
            Some(Commands::Forecast {
                company,
                days,
                period,
                suggest,
            }) => {
                assert_eq!(company, "Wipro");
                assert_eq!(days, 10);
                assert_eq!(period, Period::TwoYears);
                assert!(suggest);
            }
            _ => panic!("expected forecast"),
        }
    }

    #[test]
    fn snapshot_defaults_to_one_month() {
        let cli = Cli::try_parse_from(["stock-dash", "snapshot", "-c", "SBIN.NS"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Snapshot { period: Period::OneMonth, .. })
        ));
    }

    #[test]
    fn bad_period_is_rejected() {
        assert!(Cli::try_parse_from(["stock-dash", "snapshot", "-c", "SBIN.NS", "-p", "3w"]).is_err());
    }

    #[test]
    fn forecast_horizon_is_limited_to_offered_values() {
        for days in ["3", "5", "10"] {
            assert!(Cli::try_parse_from(["stock-dash", "forecast", "-c", "Wipro", "-d", days]).is_ok());
        }
        for days in ["0", "7", "ten"] {
            assert!(Cli::try_parse_from(["stock-dash", "forecast", "-c", "Wipro", "-d", days]).is_err());
        }
    }

    #[test]
    fn documented_companies_resolve() {
        assert_eq!(tickers::resolve("Wipro").unwrap().1, "WIPRO.NS");
        assert_eq!(tickers::resolve("SBIN.NS").unwrap().0, "State Bank of India");
    }
}
