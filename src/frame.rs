//! Column-oriented price frame plus the normalizer that maps upstream response
//! shapes onto the canonical `Datetime, Open, High, Low, Close, Volume` schema.

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use regex::Regex;
use std::sync::LazyLock;

pub const DATETIME: &str = "Datetime";
pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

static BASE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^,]*?)\s*(?:,.*)?$").expect("static regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    Flat(String),
    /// Two-level header as returned for multi-ticker downloads: (field, ticker).
    Nested(String, String),
}

impl Header {
    pub fn name(&self) -> &str {
        match self {
            Header::Flat(name) | Header::Nested(name, _) => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stamp {
    Naive(NaiveDateTime),
    Zoned(DateTime<Tz>),
}

impl Stamp {
    /// Naive stamps are taken to be UTC.
    pub fn in_zone(self, tz: Tz) -> DateTime<Tz> {
        match self {
            Stamp::Naive(naive) => chrono::Utc.from_utc_datetime(&naive).with_timezone(&tz),
            Stamp::Zoned(dt) => dt.with_timezone(&tz),
        }
    }

    pub fn timestamp(self) -> i64 {
        match self {
            Stamp::Naive(naive) => naive.and_utc().timestamp(),
            Stamp::Zoned(dt) => dt.timestamp(),
        }
    }

    /// Formats the stamp in whatever zone it carries.
    pub fn label(&self, fmt: &str) -> String {
        match self {
            Stamp::Naive(naive) => naive.format(fmt).to_string(),
            Stamp::Zoned(dt) => dt.format(fmt).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub header: Header,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index_name: String,
    pub index: Vec<Stamp>,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBar {
    pub timestamp: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Frame {
    pub fn empty() -> Self {
        Self {
            index_name: DATETIME.to_string(),
            index: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.header.name() == name)
            .map(|c| c.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Adds or replaces a flat column. `values` must have one entry per row.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.len());
        match self.columns.iter_mut().find(|c| c.header.name() == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column {
                header: Header::Flat(name.to_string()),
                values,
            }),
        }
    }

    /// Keeps the rows whose position satisfies `keep`.
    pub fn retain_rows(&mut self, keep: impl Fn(usize) -> bool) {
        let mut i = 0;
        self.index.retain(|_| {
            let k = keep(i);
            i += 1;
            k
        });
        for col in &mut self.columns {
            let mut i = 0;
            col.values.retain(|_| {
                let k = keep(i);
                i += 1;
                k
            });
        }
    }

    /// Drops rows whose `name` value is missing. No-op if the column is absent.
    pub fn drop_missing(&mut self, name: &str) {
        let Some(values) = self.column(name) else {
            return;
        };
        let present: Vec<bool> = values.iter().map(Option::is_some).collect();
        self.retain_rows(|i| present[i]);
    }

    /// Typed bar view. `None` when any OHLC column is missing; rows with a
    /// missing OHLC value are skipped, a missing volume counts as zero.
    pub fn bars(&self, tz: Tz) -> Option<Vec<PriceBar>> {
        let open = self.column(OPEN)?;
        let high = self.column(HIGH)?;
        let low = self.column(LOW)?;
        let close = self.column(CLOSE)?;
        let volume = self.column(VOLUME);

        let bars = (0..self.len())
            .filter_map(|i| {
                Some(PriceBar {
                    timestamp: self.index[i].in_zone(tz),
                    open: open[i]?,
                    high: high[i]?,
                    low: low[i]?,
                    close: close[i]?,
                    volume: volume.and_then(|v| v[i]).unwrap_or(0.0),
                })
            })
            .collect();
        Some(bars)
    }
}

/// Canonical column name: provider suffix removed, words title-cased.
pub fn canonical_name(raw: &str) -> String {
    let base = BASE_NAME
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map_or(raw.trim(), |m| m.as_str());

    base.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Flattens headers, converts the index to `tz`, renames `Date` to
/// `Datetime`, orders rows by time (last duplicate wins) and drops rows
/// without a close. Applying it twice gives the same frame as applying it once.
pub fn normalize(mut frame: Frame, tz: Tz) -> Frame {
    if frame.is_empty() {
        tracing::warn!("No data fetched for the given ticker");
        return Frame::empty();
    }

    for col in &mut frame.columns {
        col.header = Header::Flat(canonical_name(col.header.name()));
    }

    frame.index = frame
        .index
        .iter()
        .map(|stamp| Stamp::Zoned(stamp.in_zone(tz)))
        .collect();

    if frame.index_name == "Date" || frame.index_name.is_empty() {
        frame.index_name = DATETIME.to_string();
    }

    let mut order: Vec<usize> = (0..frame.len()).collect();
    order.sort_by_key(|&i| frame.index[i].timestamp());
    let mut keep: Vec<usize> = Vec::with_capacity(order.len());
    for i in order {
        if let Some(last) = keep.last_mut() {
            if frame.index[*last].timestamp() == frame.index[i].timestamp() {
                *last = i;
                continue;
            }
        }
        keep.push(i);
    }
    if keep.len() != frame.len() || keep.windows(2).any(|w| w[0] > w[1]) {
        frame.index = keep.iter().map(|&i| frame.index[i]).collect();
        for col in &mut frame.columns {
            col.values = keep.iter().map(|&i| col.values[i]).collect();
        }
    }

    frame.drop_missing(CLOSE);
    // all closes missing: same shape as empty input
    if frame.is_empty() {
        return Frame::empty();
    }
    frame
}
