//! Fetch → normalize → indicators → metrics, for the dashboard chart and the
//! sidebar quotes.

use crate::error::{DashError, Result};
use crate::fetcher::{MarketDataClient, Span};
use crate::frame::{self, Frame, PriceBar};
use crate::indicators::{self, IndicatorWarning};
use crate::metrics::{self, Metrics, Quote};
use crate::tickers::{self, Interval, Period};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct DashboardData {
    pub ticker: String,
    pub period: Period,
    pub frame: Frame,
    pub bars: Option<Vec<PriceBar>>,
    pub metrics: Metrics,
    pub warning: Option<IndicatorWarning>,
}

pub async fn load_dashboard(client: &MarketDataClient, ticker: &str, period: Period, tz: Tz) -> Result<DashboardData> {
    let raw = client.fetch_stock_data(ticker, period, period.dashboard_interval()).await?;
    let data = frame::normalize(raw, tz);
    if data.is_empty() {
        return Err(DashError::EmptyData(ticker.to_string()));
    }

    let outcome = indicators::add_technical_indicators(data);
    let metrics = metrics::calculate_metrics(&outcome.frame);
    let bars = outcome.frame.bars(tz);

    Ok(DashboardData {
        ticker: ticker.to_string(),
        period,
        bars,
        metrics,
        warning: outcome.warning,
        frame: outcome.frame,
    })
}

#[derive(Debug, Clone)]
pub struct SidebarQuote {
    pub company: String,
    pub quote: std::result::Result<Quote, String>,
}

/// Live one-day quotes for the sidebar, fetched concurrently and uncached.
pub async fn load_sidebar_quotes(client: &MarketDataClient, companies: &[String], tz: Tz) -> Vec<SidebarQuote> {
    let tasks = companies.iter().map(|company| async move {
        let quote = match tickers::ticker_for(company) {
            Some(ticker) => sidebar_quote(client, ticker, tz).await,
            None => Err(DashError::UnknownCompany(company.clone())),
        };
        SidebarQuote {
            company: company.clone(),
            quote: quote.map_err(|e| {
                tracing::warn!(company = %company, error = %e, "sidebar quote unavailable");
                format!("Data for {} is not available.", company)
            }),
        }
    });
    futures::future::join_all(tasks).await
}

async fn sidebar_quote(client: &MarketDataClient, ticker: &str, tz: Tz) -> Result<Quote> {
    let raw = client
        .download(ticker, Span::Named(Period::OneDay), Interval::OneMinute)
        .await?;
    let data = frame::normalize(raw, tz);
    metrics::intraday_quote(&data).ok_or_else(|| DashError::EmptyData(ticker.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Asia::Kolkata;
    use std::time::Duration;

    fn offline_client() -> MarketDataClient {
        MarketDataClient::new("http://127.0.0.1:9", Duration::from_secs(60), Duration::from_secs(60)).unwrap()
    }

    #[tokio::test]
    async fn unknown_sidebar_company_reports_unavailable() {
        let quotes = load_sidebar_quotes(&offline_client(), &["Acme Widgets".to_string()], Kolkata).await;
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].company, "Acme Widgets");
        assert_eq!(quotes[0].quote, Err("Data for Acme Widgets is not available.".to_string()));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_network_error() {
        let err = load_dashboard(&offline_client(), "SBIN.NS", Period::OneMonth, Kolkata)
            .await
            .unwrap_err();
        assert!(matches!(err, DashError::Network(_)));
    }
}
