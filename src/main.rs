mod analysis;
mod cache;
mod cli;
mod comfy_table;
mod error;
mod fetcher;
mod forecasting;
mod frame;
mod indicators;
mod metrics;
mod render;
mod storage_utils;
mod suggestions;
mod tickers;
mod tui;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // GEMINI_API_KEY may live in a local .env
    dotenvy::dotenv().ok();

    cli::run().await
}
