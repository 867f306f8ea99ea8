//! Yahoo Finance chart endpoint client. Responses are turned into raw
//! [`Frame`]s with two-level `(field, ticker)` headers; callers run them
//! through [`crate::frame::normalize`].

use crate::cache::TtlCache;
use crate::error::{DashError, Result};
use crate::frame::{Column, Frame, Header, Stamp};
use crate::tickers::{Interval, Period};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Deserialize, Debug)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize, Debug)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Deserialize, Debug, Default)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

/// How far back to ask for bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Span {
    Named(Period),
    /// Explicit `[start, end)` in unix seconds.
    Range(i64, i64),
}

impl Span {
    /// The one-week period is requested as an explicit seven-day range.
    pub fn for_period(period: Period, now: DateTime<Utc>) -> Self {
        match period {
            Period::OneWeek => {
                let start = now - ChronoDuration::days(7);
                Span::Range(start.timestamp(), now.timestamp())
            }
            other => Span::Named(other),
        }
    }

    fn query(self) -> Vec<(&'static str, String)> {
        match self {
            Span::Named(period) => vec![("range", period.as_str().to_string())],
            Span::Range(start, end) => vec![
                ("period1", start.to_string()),
                ("period2", end.to_string()),
            ],
        }
    }
}

pub fn parse_chart_response(ticker: &str, body: &[u8], interval: Interval) -> Result<Frame> {
    let envelope: ChartEnvelope = serde_json::from_slice(body)?;

    if let Some(err) = envelope.chart.error {
        return Err(DashError::Provider(format!("{}: {}", err.code, err.description)));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(Frame::empty());
    };

    let rows = result.timestamp.len();
    if rows == 0 {
        return Ok(Frame::empty());
    }

    let index = result
        .timestamp
        .iter()
        .map(|&ts| {
            DateTime::from_timestamp(ts, 0)
                .map(|dt| Stamp::Zoned(dt.with_timezone(&chrono_tz::UTC)))
                .ok_or_else(|| DashError::Provider(format!("invalid timestamp {}", ts)))
        })
        .collect::<Result<Vec<_>>>()?;

    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let fit = |mut values: Vec<Option<f64>>| {
        values.resize(rows, None);
        values
    };

    let columns = [
        ("Open", fit(quote.open)),
        ("High", fit(quote.high)),
        ("Low", fit(quote.low)),
        ("Close", fit(quote.close)),
        ("Volume", fit(quote.volume)),
    ]
    .into_iter()
    .map(|(field, values)| Column {
        header: Header::Nested(field.to_string(), ticker.to_string()),
        values,
    })
    .collect();

    Ok(Frame {
        index_name: if interval.is_intraday() { "Datetime" } else { "Date" }.to_string(),
        index,
        columns,
    })
}

type FetchKey = (String, Span, Interval);

pub struct MarketDataClient {
    client: Client,
    base_url: String,
    live_cache: TtlCache<FetchKey, Frame>,
    daily_cache: TtlCache<(String, Period), Frame>,
}

impl MarketDataClient {
    pub fn new(base_url: &str, live_ttl: Duration, daily_ttl: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .pool_max_idle_per_host(8)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            live_cache: TtlCache::new(live_ttl),
            daily_cache: TtlCache::new(daily_ttl),
        })
    }

    /// Raw bars for the dashboard, cached by `(ticker, span, interval)`.
    pub async fn fetch_stock_data(&self, ticker: &str, period: Period, interval: Interval) -> Result<Frame> {
        let span = Span::for_period(period, Utc::now());
        // A one-week range moves with the clock; key it on the period instead.
        let key_span = match span {
            Span::Range(..) => Span::Named(period),
            named => named,
        };
        self.live_cache
            .get_or_try_insert_with((ticker.to_string(), key_span, interval), || {
                self.download(ticker, span, interval)
            })
            .await
    }

    /// Daily bars for the forecaster, cached for longer.
    pub async fn fetch_daily(&self, ticker: &str, period: Period) -> Result<Frame> {
        self.daily_cache
            .get_or_try_insert_with((ticker.to_string(), period), || {
                self.download(ticker, Span::Named(period), Interval::OneDay)
            })
            .await
    }

    /// Uncached request, used for the sidebar's live quotes.
    pub async fn download(&self, ticker: &str, span: Span, interval: Interval) -> Result<Frame> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let mut query = span.query();
        query.push(("interval", interval.as_str().to_string()));

        tracing::debug!(ticker, interval = interval.as_str(), "requesting chart data");
        let response = self.client.get(&url).query(&query).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        // Yahoo reports unknown symbols as 404 with a JSON error body.
        if !status.is_success() && status.as_u16() != 404 {
            return Err(DashError::Provider(format!("HTTP {} for {}", status, ticker)));
        }

        let frame = parse_chart_response(ticker, &body, interval)?;
        tracing::info!(ticker, rows = frame.len(), "fetched bars");
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::CLOSE;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "SBIN.NS", "exchangeTimezoneName": "Asia/Kolkata"},
                "timestamp": [1709264700, 1709264760, 1709264820],
                "indicators": {"quote": [{
                    "open": [750.0, 751.5, null],
                    "high": [752.0, 753.0, 754.0],
                    "low": [749.0, 750.5, 751.0],
                    "close": [751.0, 752.5, null],
                    "volume": [1200, 800, 0]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_bars_with_nested_headers() {
        let frame = parse_chart_response("SBIN.NS", SAMPLE.as_bytes(), Interval::OneMinute).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.index_name, "Datetime");
        assert_eq!(
            frame.columns[3].header,
            Header::Nested("Close".to_string(), "SBIN.NS".to_string())
        );
        assert_eq!(frame.column(CLOSE).unwrap(), &[Some(751.0), Some(752.5), None]);
        assert_eq!(frame.column("Volume").unwrap()[0], Some(1200.0));
    }

    #[test]
    fn daily_interval_uses_date_index() {
        let frame = parse_chart_response("SBIN.NS", SAMPLE.as_bytes(), Interval::OneDay).unwrap();
        assert_eq!(frame.index_name, "Date");
    }

    #[test]
    fn provider_error_is_surfaced() {
        let body = br#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart_response("NOPE.NS", body, Interval::OneDay).unwrap_err();
        assert!(matches!(err, DashError::Provider(msg) if msg.contains("delisted")));
    }

    #[test]
    fn result_without_timestamps_is_empty() {
        let body = br#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{}]}}],"error":null}}"#;
        let frame = parse_chart_response("SBIN.NS", body, Interval::OneMinute).unwrap();
        assert!(frame.is_empty());
    }

    #[test]
    fn short_value_arrays_are_padded() {
        let body = br#"{"chart":{"result":[{"timestamp":[1,2],"indicators":{"quote":[{"close":[5.0]}]}}],"error":null}}"#;
        let frame = parse_chart_response("X.NS", body, Interval::OneDay).unwrap();
        assert_eq!(frame.column(CLOSE).unwrap(), &[Some(5.0), None]);
        assert_eq!(frame.column("Open").unwrap(), &[None, None]);
    }

    #[test]
    fn one_week_span_is_a_seven_day_range() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        assert_eq!(
            Span::for_period(Period::OneWeek, now),
            Span::Range(1_000_000 - 7 * 86_400, 1_000_000)
        );
        assert_eq!(Span::for_period(Period::OneMonth, now), Span::Named(Period::OneMonth));
        assert_eq!(
            Span::Named(Period::Max).query(),
            vec![("range", "max".to_string())]
        );
    }
}
