use crate::frame::{CLOSE, Frame, HIGH, LOW, OPEN, VOLUME};

/// Summary figures for the metric header. All fields are `None` when the
/// frame is empty or has no close column.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub last_close: Option<f64>,
    pub change: Option<f64>,
    pub pct_change: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl Metrics {
    pub fn is_empty(&self) -> bool {
        self.last_close.is_none()
    }
}

pub fn calculate_metrics(data: &Frame) -> Metrics {
    let Some(close) = data.column(CLOSE) else {
        return Metrics::default();
    };
    let first = close.iter().flatten().next().copied();
    let last = close.iter().rev().flatten().next().copied();
    let (Some(first), Some(last)) = (first, last) else {
        return Metrics::default();
    };

    let change = last - first;
    let pct_change = if first != 0.0 { change / first * 100.0 } else { 0.0 };

    let present = |name: &str| data.column(name).map(|v| v.iter().flatten().copied().collect::<Vec<f64>>());
    let high = present(HIGH).and_then(|v| v.into_iter().reduce(f64::max));
    let low = present(LOW).and_then(|v| v.into_iter().reduce(f64::min));
    let volume = present(VOLUME).map(|v| v.into_iter().sum());

    Metrics {
        last_close: Some(last),
        change: Some(change),
        pct_change: Some(pct_change),
        high,
        low,
        volume,
    }
}

/// Intraday move for a sidebar ticker, measured against the session's first open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub last_price: f64,
    pub change: f64,
    pub pct_change: f64,
}

pub fn intraday_quote(data: &Frame) -> Option<Quote> {
    let open = data.column(OPEN)?;
    let last_price = data.column(CLOSE)?.iter().rev().flatten().next().copied()?;

    match open.first().copied().flatten() {
        Some(first_open) if first_open != 0.0 && !first_open.is_nan() => {
            let change = last_price - first_open;
            Some(Quote {
                last_price,
                change,
                pct_change: change / first_open * 100.0,
            })
        }
        _ => Some(Quote {
            last_price,
            change: 0.0,
            pct_change: 0.0,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Column, Header, Stamp};
    use approx::assert_relative_eq;
    use chrono::DateTime;

    fn frame(cols: &[(&str, Vec<Option<f64>>)]) -> Frame {
        let rows = cols.first().map_or(0, |(_, v)| v.len());
        Frame {
            index_name: "Datetime".to_string(),
            index: (0..rows)
                .map(|i| Stamp::Naive(DateTime::from_timestamp(i as i64 * 60, 0).unwrap().naive_utc()))
                .collect(),
            columns: cols
                .iter()
                .map(|(name, values)| Column {
                    header: Header::Flat(name.to_string()),
                    values: values.clone(),
                })
                .collect(),
        }
    }

    #[test]
    fn empty_frame_gives_all_nulls() {
        assert_eq!(calculate_metrics(&Frame::empty()), Metrics::default());
        let m = calculate_metrics(&frame(&[(CLOSE, vec![])]));
        assert!(m.is_empty());
        assert_eq!(m.high, None);
        assert_eq!(m.volume, None);
    }

    #[test]
    fn missing_close_gives_all_nulls() {
        let m = calculate_metrics(&frame(&[(HIGH, vec![Some(1.0)])]));
        assert_eq!(m, Metrics::default());
    }

    #[test]
    fn computes_change_and_extremes() {
        let m = calculate_metrics(&frame(&[
            (CLOSE, vec![Some(100.0), Some(90.0), Some(110.0)]),
            (HIGH, vec![Some(101.0), Some(95.0), Some(112.0)]),
            (LOW, vec![Some(99.0), Some(88.0), Some(105.0)]),
            (VOLUME, vec![Some(10.0), Some(20.0), Some(30.0)]),
        ]));
        assert_eq!(m.last_close, Some(110.0));
        assert_relative_eq!(m.change.unwrap(), 10.0);
        assert_relative_eq!(m.pct_change.unwrap(), 10.0);
        assert_eq!(m.high, Some(112.0));
        assert_eq!(m.low, Some(88.0));
        assert_eq!(m.volume, Some(60.0));
    }

    #[test]
    fn single_row_has_zero_change() {
        let m = calculate_metrics(&frame(&[(CLOSE, vec![Some(42.0)])]));
        assert_eq!(m.last_close, Some(42.0));
        assert_eq!(m.change, Some(0.0));
        assert_eq!(m.pct_change, Some(0.0));
        assert_eq!(m.high, None);
    }

    #[test]
    fn zero_first_close_gives_zero_pct() {
        let m = calculate_metrics(&frame(&[(CLOSE, vec![Some(0.0), Some(5.0)])]));
        assert_eq!(m.change, Some(5.0));
        assert_eq!(m.pct_change, Some(0.0));
    }

    #[test]
    fn quote_uses_first_open() {
        let q = intraday_quote(&frame(&[
            (OPEN, vec![Some(200.0), Some(205.0)]),
            (CLOSE, vec![Some(201.0), Some(210.0)]),
        ]))
        .unwrap();
        assert_eq!(q.last_price, 210.0);
        assert_relative_eq!(q.change, 10.0);
        assert_relative_eq!(q.pct_change, 5.0);
    }

    #[test]
    fn quote_guards_zero_or_missing_open() {
        for open in [Some(0.0), None] {
            let q = intraday_quote(&frame(&[
                (OPEN, vec![open, Some(1.0)]),
                (CLOSE, vec![Some(3.0), Some(4.0)]),
            ]))
            .unwrap();
            assert_eq!((q.last_price, q.change, q.pct_change), (4.0, 0.0, 0.0));
        }
        assert!(intraday_quote(&frame(&[(CLOSE, vec![Some(1.0)])])).is_none());
    }
}
