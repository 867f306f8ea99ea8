//! Static NSE company registry plus the period/interval vocabulary shared by
//! the dashboard and the forecaster.

use crate::error::{DashError, Result};
use std::fmt;

/// Display name to exchange ticker, in the order shown in the company picker.
pub const NIFTY_50: &[(&str, &str)] = &[
    ("Adani Ports and SEZ", "ADANIPORTS.NS"),
    ("Axis Bank", "AXISBANK.NS"),
    ("Asian Paints", "ASIANPAINT.NS"),
    ("Bajaj Auto", "BAJAJ-AUTO.NS"),
    ("Bajaj Finance", "BAJFINANCE.NS"),
    ("Bajaj Finserv", "BAJAJFINSV.NS"),
    ("Bandhan Bank", "BANDHANBNK.NS"),
    ("Bharti Airtel", "BHARTIARTL.NS"),
    ("BPCL", "BPCL.NS"),
    ("Cipla", "CIPLA.NS"),
    ("Divi's Laboratories", "DIVISLAB.NS"),
    ("Dr. Reddy's Laboratories", "DRREDDY.NS"),
    ("Eicher Motors", "EICHERMOT.NS"),
    ("Grasim Industries", "GRASIM.NS"),
    ("HCL Technologies", "HCLTECH.NS"),
    ("HDFC", "HDFC.NS"),
    ("HDFC Bank", "HDFCBANK.NS"),
    ("HDFC Life Insurance", "HDFCLIFE.NS"),
    ("Hero MotoCorp", "HEROMOTOCO.NS"),
    ("Hindustan Unilever", "HINDUNILVR.NS"),
    ("ICICI Bank", "ICICIBANK.NS"),
    ("Indian Oil Corporation", "IOC.NS"),
    ("IndusInd Bank", "INDUSINDBK.NS"),
    ("ITC", "ITC.NS"),
    ("Kotak Mahindra Bank", "KOTAKBANK.NS"),
    ("Larsen & Toubro", "LT.NS"),
    ("Lupin", "LUPIN.NS"),
    ("Maruti Suzuki", "MARUTI.NS"),
    ("M&M", "M&M.NS"),
    ("Muthoot Finance", "MUTHOOTFIN.NS"),
    ("Nestlé India", "NESTLEIND.NS"),
    ("NTPC", "NTPC.NS"),
    ("Power Grid Corporation", "POWERGRID.NS"),
    ("Reliance Industries", "RELIANCE.NS"),
    ("Shree Cement", "SHREECEM.NS"),
    ("SBI Life Insurance", "SBILIFE.NS"),
    ("State Bank of India", "SBIN.NS"),
    ("Sun Pharmaceutical", "SUNPHARMA.NS"),
    ("Tata Consumer Products", "TATACONSUM.NS"),
    ("Tata Motors", "TATAMOTORS.NS"),
    ("Tata Steel", "TATASTEEL.NS"),
    ("Tech Mahindra", "TECHM.NS"),
    ("Titan", "TITAN.NS"),
    ("UltraTech Cement", "ULTRACEMCO.NS"),
    ("Wipro", "WIPRO.NS"),
    ("Zee Entertainment", "ZEEL.NS"),
    ("Zydus Lifesciences", "ZYDUSLIFE.NS"),
];

pub fn ticker_for(name: &str) -> Option<&'static str> {
    NIFTY_50
        .iter()
        .find(|(company, _)| *company == name)
        .map(|(_, ticker)| *ticker)
}

/// Resolves a company by display name (case-insensitive) or by ticker symbol.
pub fn resolve(query: &str) -> Result<(&'static str, &'static str)> {
    let q = query.trim();
    NIFTY_50
        .iter()
        .find(|(company, ticker)| company.eq_ignore_ascii_case(q) || ticker.eq_ignore_ascii_case(q))
        .copied()
        .ok_or_else(|| DashError::UnknownCompany(query.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    TwoYears,
    FiveYears,
    Max,
}

/// Periods offered on the real-time dashboard.
pub const DASHBOARD_PERIODS: &[Period] = &[
    Period::OneDay,
    Period::OneWeek,
    Period::OneMonth,
    Period::OneYear,
    Period::Max,
];

/// History lengths offered to the forecaster.
pub const FORECAST_PERIODS: &[Period] = &[Period::OneYear, Period::TwoYears, Period::FiveYears];

pub const FORECAST_HORIZONS: &[usize] = &[3, 5, 10];

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::OneWeek => "1wk",
            Period::OneMonth => "1mo",
            Period::OneYear => "1y",
            Period::TwoYears => "2y",
            Period::FiveYears => "5y",
            Period::Max => "max",
        }
    }

    /// Bar granularity used when this period is charted on the dashboard.
    pub fn dashboard_interval(self) -> Interval {
        match self {
            Period::OneDay => Interval::OneMinute,
            Period::OneWeek => Interval::ThirtyMinutes,
            Period::OneMonth => Interval::OneDay,
            Period::OneYear | Period::TwoYears | Period::FiveYears | Period::Max => {
                Interval::OneWeek
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Period {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1d" => Ok(Period::OneDay),
            "1wk" => Ok(Period::OneWeek),
            "1mo" => Ok(Period::OneMonth),
            "1y" => Ok(Period::OneYear),
            "2y" => Ok(Period::TwoYears),
            "5y" => Ok(Period::FiveYears),
            "max" => Ok(Period::Max),
            other => Err(DashError::Config(format!("unknown period '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    OneMinute,
    ThirtyMinutes,
    OneDay,
    OneWeek,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneDay => "1d",
            Interval::OneWeek => "1wk",
        }
    }

    pub fn is_intraday(self) -> bool {
        matches!(self, Interval::OneMinute | Interval::ThirtyMinutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    Candlestick,
    Line,
}

pub const CHART_TYPES: &[ChartType] = &[ChartType::Candlestick, ChartType::Line];

impl ChartType {
    pub fn label(self) -> &'static str {
        match self {
            ChartType::Candlestick => "Candlestick",
            ChartType::Line => "Line",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_unique_tickers() {
        let mut tickers: Vec<_> = NIFTY_50.iter().map(|(_, t)| *t).collect();
        tickers.sort_unstable();
        tickers.dedup();
        assert_eq!(tickers.len(), NIFTY_50.len());
        assert!(tickers.iter().all(|t| t.ends_with(".NS")));
    }

    #[test]
    fn resolves_by_name_or_ticker() {
        assert_eq!(ticker_for("HDFC Bank"), Some("HDFCBANK.NS"));
        assert_eq!(resolve("state bank of india").unwrap().1, "SBIN.NS");
        assert_eq!(resolve("wipro.ns").unwrap().0, "Wipro");
        assert!(matches!(resolve("Acme"), Err(DashError::UnknownCompany(_))));
    }

    #[test]
    fn dashboard_interval_mapping() {
        let got: Vec<_> = DASHBOARD_PERIODS
            .iter()
            .map(|p| (p.as_str(), p.dashboard_interval().as_str()))
            .collect();
        assert_eq!(
            got,
            vec![("1d", "1m"), ("1wk", "30m"), ("1mo", "1d"), ("1y", "1wk"), ("max", "1wk")]
        );
    }

    #[test]
    fn period_parses_its_own_label() {
        for p in DASHBOARD_PERIODS.iter().chain(FORECAST_PERIODS) {
            assert_eq!(p.as_str().parse::<Period>().unwrap(), *p);
        }
        assert!("3mo".parse::<Period>().is_err());
    }
}
