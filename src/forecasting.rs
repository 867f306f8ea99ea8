//! Short-horizon forecast of daily percentage change.
//!
//! The model is additive: a linear trend, weekly Fourier terms and, once the
//! history covers two years, yearly Fourier terms. Coefficients come from a
//! ridge-regularized least-squares fit; the 80% band is taken from the
//! in-sample residual quantiles and widens with the forecast horizon.

use crate::error::{DashError, Result};
use crate::fetcher::MarketDataClient;
use crate::frame::{self, CLOSE, Frame};
use crate::tickers::Period;
use chrono::{Datelike, Days, NaiveDate};
use chrono_tz::Tz;
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

const WEEKLY_ORDER: usize = 3;
const YEARLY_ORDER: usize = 10;
const YEARLY_MIN_SPAN_DAYS: i64 = 730;
const RIDGE: f64 = 1.0;
const LOWER_QUANTILE: f64 = 0.1;
const UPPER_QUANTILE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_pct_change: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Day-over-day close change in percent, dated in `tz`. The first row and
/// rows following a zero close are dropped.
pub fn pct_change_series(data: &Frame, tz: Tz) -> Vec<(NaiveDate, f64)> {
    let Some(close) = data.column(CLOSE) else {
        return Vec::new();
    };
    let points: Vec<(NaiveDate, f64)> = data
        .index
        .iter()
        .zip(close)
        .filter_map(|(stamp, c)| c.map(|c| (stamp.in_zone(tz).date_naive(), c)))
        .collect();

    points
        .windows(2)
        .filter_map(|w| {
            let (_, prev) = w[0];
            let (date, cur) = w[1];
            let pct = (cur / prev - 1.0) * 100.0;
            (prev != 0.0 && pct.is_finite()).then_some((date, pct))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AdditiveModel {
    start: NaiveDate,
    last: NaiveDate,
    span_days: f64,
    yearly: bool,
    coefficients: DVector<f64>,
    residual_low: f64,
    residual_high: f64,
    samples: usize,
}

impl AdditiveModel {
    pub fn fit(history: &[(NaiveDate, f64)]) -> Result<Self> {
        let history: Vec<(NaiveDate, f64)> = history.iter().copied().filter(|(_, y)| y.is_finite()).collect();
        if history.len() < 2 {
            return Err(DashError::InsufficientData {
                needed: 2,
                got: history.len(),
            });
        }

        let start = history.iter().map(|(d, _)| *d).min().unwrap_or(history[0].0);
        let last = history.iter().map(|(d, _)| *d).max().unwrap_or(history[0].0);
        let span = (last - start).num_days();

        let mut model = Self {
            start,
            last,
            span_days: span.max(1) as f64,
            yearly: span >= YEARLY_MIN_SPAN_DAYS,
            coefficients: DVector::zeros(0),
            residual_low: 0.0,
            residual_high: 0.0,
            samples: history.len(),
        };

        let width = model.feature_count();
        let rows: Vec<f64> = history.iter().flat_map(|(d, _)| model.features(*d)).collect();
        let x = DMatrix::from_row_slice(history.len(), width, &rows);
        let y = DVector::from_iterator(history.len(), history.iter().map(|(_, y)| *y));

        let mut gram = x.transpose() * &x;
        // intercept stays unpenalized
        for j in 1..width {
            gram[(j, j)] += RIDGE;
        }
        let rhs = x.transpose() * &y;
        let cholesky = gram
            .cholesky()
            .ok_or_else(|| DashError::Forecast("normal equations are not positive definite".to_string()))?;
        model.coefficients = cholesky.solve(&rhs);

        let mut residuals: Vec<f64> = (&y - &x * &model.coefficients).iter().copied().collect();
        residuals.sort_by(|a, b| a.total_cmp(b));
        model.residual_low = quantile(&residuals, LOWER_QUANTILE).min(0.0);
        model.residual_high = quantile(&residuals, UPPER_QUANTILE).max(0.0);

        tracing::debug!(
            samples = model.samples,
            yearly = model.yearly,
            "fitted additive model"
        );
        Ok(model)
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last
    }

    fn feature_count(&self) -> usize {
        2 + 2 * WEEKLY_ORDER + if self.yearly { 2 * YEARLY_ORDER } else { 0 }
    }

    fn features(&self, date: NaiveDate) -> Vec<f64> {
        let t = (date - self.start).num_days() as f64 / self.span_days;
        let day = f64::from(date.num_days_from_ce());

        let mut row = Vec::with_capacity(self.feature_count());
        row.push(1.0);
        row.push(t);
        fourier(&mut row, day, 7.0, WEEKLY_ORDER);
        if self.yearly {
            fourier(&mut row, day, 365.25, YEARLY_ORDER);
        }
        row
    }

    pub fn predict(&self, date: NaiveDate) -> ForecastPoint {
        let features = DVector::from_vec(self.features(date));
        let yhat = features.dot(&self.coefficients);
        let ahead = (date - self.last).num_days().max(0) as f64;
        let widen = (1.0 + ahead / self.samples as f64).sqrt();
        ForecastPoint {
            date,
            predicted_pct_change: yhat,
            lower_bound: yhat + self.residual_low * widen,
            upper_bound: yhat + self.residual_high * widen,
        }
    }
}

fn fourier(row: &mut Vec<f64>, day: f64, period: f64, order: usize) {
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * day / period;
        row.push(angle.sin());
        row.push(angle.cos());
    }
}

/// Linear-interpolated quantile of an ascending slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// The `days` calendar days following `last`.
pub fn future_dates(last: NaiveDate, days: usize) -> Vec<NaiveDate> {
    (1..=days as u64)
        .filter_map(|d| last.checked_add_days(Days::new(d)))
        .collect()
}

pub fn forecast_from_history(history: &[(NaiveDate, f64)], days: usize) -> Result<Vec<ForecastPoint>> {
    if days == 0 {
        return Err(DashError::Forecast("forecast horizon must be at least one day".to_string()));
    }
    let model = AdditiveModel::fit(history)?;
    Ok(future_dates(model.last_date(), days)
        .into_iter()
        .map(|date| model.predict(date))
        .collect())
}

/// Daily percentage-change history for `ticker`, ready for the model or the chart.
pub async fn daily_pct_change(client: &MarketDataClient, ticker: &str, period: Period, tz: Tz) -> Result<Vec<(NaiveDate, f64)>> {
    let raw = client.fetch_daily(ticker, period).await?;
    let data = frame::normalize(raw, tz);
    if data.is_empty() {
        return Err(DashError::EmptyData(ticker.to_string()));
    }
    Ok(pct_change_series(&data, tz))
}

pub async fn forecast_pct_change(
    client: &MarketDataClient,
    ticker: &str,
    days: usize,
    period: Period,
    tz: Tz,
) -> Result<Vec<ForecastPoint>> {
    let history = daily_pct_change(client, ticker, period, tz).await?;
    tracing::info!(ticker, days, period = period.as_str(), points = history.len(), "running forecast");
    forecast_from_history(&history, days)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Header, Stamp};
    use approx::assert_relative_eq;
    use chrono::Weekday;

    fn weekday_history(days: i64, value: impl Fn(NaiveDate, i64) -> f64) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        (0..days)
            .filter_map(|i| {
                let d = start + chrono::Duration::days(i);
                (!matches!(d.weekday(), Weekday::Sat | Weekday::Sun)).then(|| (d, value(d, i)))
            })
            .collect()
    }

    #[test]
    fn pct_change_drops_first_row_and_zero_closes() {
        let stamps = (0..4)
            .map(|i| Stamp::Naive(NaiveDate::from_ymd_opt(2024, 1, 1 + i).unwrap().and_hms_opt(4, 0, 0).unwrap()))
            .collect();
        let frame = Frame {
            index_name: "Date".to_string(),
            index: stamps,
            columns: vec![Column {
                header: Header::Flat(CLOSE.to_string()),
                values: vec![Some(100.0), Some(110.0), Some(0.0), Some(5.0)],
            }],
        };
        let series = pct_change_series(&frame, chrono_tz::Asia::Kolkata);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_relative_eq!(series[0].1, 10.0, epsilon = 1e-9);
        assert_relative_eq!(series[1].1, -100.0, epsilon = 1e-9);
    }

    #[test]
    fn forecast_has_exactly_horizon_rows_with_ordered_bounds() {
        let history = weekday_history(400, |d, i| {
            let weekly = if d.weekday() == Weekday::Mon { 0.8 } else { -0.2 };
            weekly + ((i * 37 % 11) as f64 - 5.0) * 0.15
        });
        for days in [3, 5, 10] {
            let out = forecast_from_history(&history, days).unwrap();
            assert_eq!(out.len(), days);
            for p in &out {
                assert!(p.lower_bound <= p.predicted_pct_change);
                assert!(p.predicted_pct_change <= p.upper_bound);
            }
            let last = history.last().unwrap().0;
            assert_eq!(out[0].date, last + chrono::Duration::days(1));
            assert_eq!(out[days - 1].date, last + chrono::Duration::days(days as i64));
        }
    }

    #[test]
    fn constant_history_predicts_the_constant() {
        let history = weekday_history(60, |_, _| 0.5);
        let out = forecast_from_history(&history, 3).unwrap();
        for p in out {
            assert_relative_eq!(p.predicted_pct_change, 0.5, epsilon = 1e-6);
            assert!(p.lower_bound <= p.predicted_pct_change && p.predicted_pct_change <= p.upper_bound);
        }
    }

    #[test]
    fn band_widens_with_horizon() {
        let history = weekday_history(300, |_, i| ((i * 13 % 7) as f64 - 3.0) * 0.4);
        let out = forecast_from_history(&history, 10).unwrap();
        let width = |p: &ForecastPoint| p.upper_bound - p.lower_bound;
        assert!(width(&out[9]) >= width(&out[0]));
    }

    #[test]
    fn yearly_terms_need_two_years() {
        let short = AdditiveModel::fit(&weekday_history(400, |_, i| i as f64 * 0.001)).unwrap();
        assert!(!short.yearly);
        let long = AdditiveModel::fit(&weekday_history(800, |_, i| i as f64 * 0.001)).unwrap();
        assert!(long.yearly);
    }

    #[test]
    fn rejects_short_history_and_zero_horizon() {
        let one = weekday_history(1, |_, _| 1.0);
        assert!(matches!(
            forecast_from_history(&one, 3),
            Err(DashError::InsufficientData { needed: 2, got: 1 })
        ));
        let history = weekday_history(30, |_, _| 1.0);
        assert!(matches!(forecast_from_history(&history, 0), Err(DashError::Forecast(_))));
    }

    #[test]
    fn quantile_interpolates() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&v, 0.1), 0.4);
        assert_relative_eq!(quantile(&v, 0.9), 3.6);
        assert_eq!(quantile(&[], 0.5), 0.0);
    }
}
