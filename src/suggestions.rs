//! AI trading suggestions: the daily percentage-change history is drawn as a
//! PNG line chart and sent with a fixed analyst prompt to Gemini.

use crate::error::{DashError, Result};
use crate::fetcher::MarketDataClient;
use crate::forecasting;
use crate::storage_utils::GeminiConfig;
use crate::tickers::Period;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::NaiveDate;
use chrono_tz::Tz;
use plotters::prelude::*;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CHART_SIZE: (u32, u32) = (1000, 500);

pub fn analyst_prompt(ticker: &str, period: Period) -> String {
    format!(
        "You are an experienced equity analyst covering the Indian stock market. \
         The attached chart plots the daily percentage change in the closing price of {ticker} \
         over the last {period}. Read the chart carefully: describe the recent trend, volatility \
         clusters and any notable spikes, then give a short-term trading suggestion (buy, hold \
         or sell) with two or three concise reasons and the key risk to watch. \
         Keep the answer under 200 words and remind the reader this is not financial advice."
    )
}

/// Draws the series as a PNG line chart at `path`.
pub fn render_pct_change_chart(series: &[(NaiveDate, f64)], title: &str, path: &Path) -> Result<()> {
    let (Some(first), Some(last)) = (series.first(), series.last()) else {
        return Err(DashError::InsufficientData { needed: 1, got: 0 });
    };
    let (lo, hi) = series
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), (_, v)| (lo.min(*v), hi.max(*v)));
    let pad = ((hi - lo) * 0.05).max(0.5);
    let end = if last.0 > first.0 { last.0 } else { first.0 + chrono::Duration::days(1) };

    let chart_err = |e: &dyn std::fmt::Display| DashError::Chart(e.to_string());

    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(|e| chart_err(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(first.0..end, (lo - pad)..(hi + pad))
        .map_err(|e| chart_err(&e))?;

    chart
        .configure_mesh()
        .x_labels(8)
        .x_desc("Date")
        .y_desc("Percentage Change (%)")
        .draw()
        .map_err(|e| chart_err(&e))?;

    chart
        .draw_series(LineSeries::new(series.iter().copied(), &BLUE))
        .map_err(|e| chart_err(&e))?;
    chart
        .draw_series(LineSeries::new([(first.0, 0.0), (end, 0.0)], BLACK.mix(0.3)))
        .map_err(|e| chart_err(&e))?;

    root.present().map_err(|e| chart_err(&e))?;
    Ok(())
}

#[derive(Serialize, Debug)]
pub struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Debug)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Image { inline_data: InlineData },
}

#[derive(Serialize, Debug)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

pub fn build_request(prompt: &str, png: &[u8]) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Text {
                    text: prompt.to_string(),
                },
                Part::Image {
                    inline_data: InlineData {
                        mime_type: "image/png",
                        data: STANDARD.encode(png),
                    },
                },
            ],
        }],
    }
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(body: &[u8]) -> Result<String> {
    let response: GenerateResponse = serde_json::from_slice(body)?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(DashError::Llm("model returned no text".to_string()));
    }
    Ok(text)
}

pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    /// Reads the API key from the environment variable named in config.
    pub fn from_env(config: &GeminiConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| DashError::MissingApiKey(config.api_key_env.clone()))?;
        Self::new(config, api_key)
    }

    pub fn new(config: &GeminiConfig, api_key: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(90)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    pub async fn generate(&self, prompt: &str, png: &[u8]) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&build_request(prompt, png))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            let detail = String::from_utf8_lossy(&body);
            return Err(DashError::Llm(format!("HTTP {}: {}", status, detail.trim())));
        }
        extract_text(&body)
    }
}

fn chart_path(ticker: &str, period: Period) -> PathBuf {
    std::env::temp_dir().join(format!(
        "stock-dash_{}_{}_{}.png",
        ticker.replace(['.', '&'], "_"),
        period.as_str(),
        chrono::Utc::now().timestamp_millis()
    ))
}

pub async fn get_suggestions(
    market: &MarketDataClient,
    gemini: &GeminiClient,
    ticker: &str,
    period: Period,
    tz: Tz,
) -> Result<String> {
    let series = forecasting::daily_pct_change(market, ticker, period, tz).await?;
    let path = chart_path(ticker, period);
    let title = format!("{} daily % change ({})", ticker, period);

    let render_path = path.clone();
    tokio::task::spawn_blocking(move || render_pct_change_chart(&series, &title, &render_path))
        .await
        .map_err(|e| DashError::Chart(e.to_string()))??;

    let png = tokio::fs::read(&path).await?;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::debug!(path = %path.display(), error = %e, "could not remove chart image");
    }

    tracing::info!(ticker, period = period.as_str(), bytes = png.len(), "requesting suggestion");
    gemini.generate(&analyst_prompt(ticker, period), &png).await
}
