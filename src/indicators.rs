use crate::frame::{CLOSE, Frame};
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use thiserror::Error as ThisError;

pub const WINDOW: usize = 20;
pub const SMA_20: &str = "SMA_20";
pub const EMA_20: &str = "EMA_20";

#[derive(ThisError, Debug, Clone, PartialEq)]
pub enum IndicatorWarning {
    #[error("Data is empty or missing 'Close' column for technical indicators.")]
    MissingClose,
    #[error("Not enough data to calculate SMA or EMA (need at least {needed} data points, got {got}).")]
    NotEnoughRows { needed: usize, got: usize },
}

#[derive(Debug, Clone)]
pub struct IndicatorOutcome {
    pub frame: Frame,
    pub warning: Option<IndicatorWarning>,
}

/// Appends `SMA_20` and `EMA_20`. Values for the first 19 rows are absent.
/// Frames with fewer than 20 closes come back unchanged with a warning.
pub fn add_technical_indicators(mut data: Frame) -> IndicatorOutcome {
    if data.is_empty() || !data.has_column(CLOSE) {
        tracing::warn!("{}", IndicatorWarning::MissingClose);
        return IndicatorOutcome {
            frame: data,
            warning: Some(IndicatorWarning::MissingClose),
        };
    }

    let present = data.column(CLOSE).map_or(0, |c| c.iter().flatten().count());
    if present < WINDOW {
        let warning = IndicatorWarning::NotEnoughRows {
            needed: WINDOW,
            got: present,
        };
        tracing::warn!("{}", warning);
        return IndicatorOutcome {
            frame: data,
            warning: Some(warning),
        };
    }

    data.drop_missing(CLOSE);
    let closes: Vec<f64> = data
        .column(CLOSE)
        .map(|c| c.iter().flatten().copied().collect())
        .unwrap_or_default();

    let (Ok(mut sma), Ok(mut ema)) = (
        SimpleMovingAverage::new(WINDOW),
        ExponentialMovingAverage::new(WINDOW),
    ) else {
        return IndicatorOutcome {
            frame: data,
            warning: None,
        };
    };

    let mut sma_values = Vec::with_capacity(closes.len());
    let mut ema_values = Vec::with_capacity(closes.len());
    for (i, price) in closes.into_iter().enumerate() {
        let s = sma.next(price);
        let e = ema.next(price);
        let warm = i + 1 >= WINDOW;
        sma_values.push(warm.then_some(s));
        ema_values.push(warm.then_some(e));
    }

    data.set_column(SMA_20, sma_values);
    data.set_column(EMA_20, ema_values);
    IndicatorOutcome {
        frame: data,
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Header, Stamp};
    use approx::assert_relative_eq;
    use chrono::DateTime;

    fn closes(values: &[f64]) -> Frame {
        Frame {
            index_name: "Datetime".to_string(),
            index: (0..values.len())
                .map(|i| Stamp::Naive(DateTime::from_timestamp(i as i64 * 86_400, 0).unwrap().naive_utc()))
                .collect(),
            columns: vec![Column {
                header: Header::Flat(CLOSE.to_string()),
                values: values.iter().copied().map(Some).collect(),
            }],
        }
    }

    #[test]
    fn nineteen_rows_are_returned_unchanged() {
        let input = closes(&[100.0; 19]);
        let out = add_technical_indicators(input.clone());
        assert_eq!(out.frame, input);
        assert_eq!(
            out.warning,
            Some(IndicatorWarning::NotEnoughRows { needed: 20, got: 19 })
        );
        assert!(!out.frame.has_column(SMA_20));
        assert!(!out.frame.has_column(EMA_20));
    }

    #[test]
    fn missing_close_warns() {
        let out = add_technical_indicators(Frame::empty());
        assert_eq!(out.warning, Some(IndicatorWarning::MissingClose));
    }

    #[test]
    fn averages_defined_from_twentieth_row() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64).collect();
        let out = add_technical_indicators(closes(&prices));
        assert!(out.warning.is_none());

        let sma = out.frame.column(SMA_20).unwrap();
        let ema = out.frame.column(EMA_20).unwrap();
        assert!(sma[..19].iter().all(Option::is_none));
        assert!(ema[..19].iter().all(Option::is_none));

        let last_sma = sma[29].unwrap();
        let expected: f64 = prices[10..30].iter().sum::<f64>() / 20.0;
        assert_relative_eq!(last_sma, expected, epsilon = 1e-9);

        let last_ema = ema[29].unwrap();
        let (lo, hi) = prices
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &p| (lo.min(p), hi.max(p)));
        assert!(last_ema >= lo && last_ema <= hi);
    }

    #[test]
    fn ema_follows_span_twenty_smoothing() {
        let prices: Vec<f64> = (1..=20).map(f64::from).collect();
        let out = add_technical_indicators(closes(&prices));
        let alpha = 2.0 / 21.0;
        let expected = prices[1..]
            .iter()
            .fold(prices[0], |acc, &p| alpha * p + (1.0 - alpha) * acc);
        assert_relative_eq!(out.frame.column(EMA_20).unwrap()[19].unwrap(), expected, epsilon = 1e-9);
    }
}
