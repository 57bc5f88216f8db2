//! Shared test helpers for integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use rankfolio::domain::error::RankfolioError;
use rankfolio::domain::ohlcv::OhlcvBar;
use rankfolio::domain::price_series::{PriceSeries, PriceTable};
use rankfolio::ports::price_port::PriceHistoryPort;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// In-memory price source with per-symbol bars and optional failure.
pub struct MockPricePort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub error: Option<String>,
    /// Every `(symbols, start)` request made through the port.
    pub requests: RefCell<Vec<(BTreeSet<String>, NaiveDate)>>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            error: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    /// Adds `closes` on consecutive calendar days from `start`.
    pub fn with_closes(self, symbol: &str, start: &str, closes: &[f64]) -> Self {
        self.with_bars(symbol, closes_from(start, closes))
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl PriceHistoryPort for MockPricePort {
    fn get_price_history(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
    ) -> Result<PriceTable, RankfolioError> {
        self.requests.borrow_mut().push((symbols.clone(), start));
        if let Some(reason) = &self.error {
            return Err(RankfolioError::Data {
                reason: reason.clone(),
            });
        }
        Ok(symbols
            .iter()
            .map(|symbol| {
                let bars = self
                    .data
                    .get(symbol)
                    .map(|bars| bars.iter().filter(|b| b.date >= start).cloned().collect())
                    .unwrap_or_default();
                PriceSeries::new(symbol.as_str(), bars)
            })
            .collect())
    }

    fn list_known_universe(&self) -> Result<BTreeSet<String>, RankfolioError> {
        if let Some(reason) = &self.error {
            return Err(RankfolioError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self.data.keys().cloned().collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date_str: &str, close: f64) -> OhlcvBar {
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap();
    OhlcvBar::from_close(date, close)
}

/// Bars on consecutive calendar days starting at `start`.
pub fn closes_from(start: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let first = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar::from_close(first + chrono::Duration::days(i as i64), close))
        .collect()
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Three instruments over five days: CCC climbs hardest, BBB barely moves.
pub fn three_instrument_port() -> MockPricePort {
    MockPricePort::new()
        .with_closes("AAA", "2024-01-01", &[100.0, 105.0, 110.0, 120.0, 130.0])
        .with_closes("BBB", "2024-01-01", &[100.0, 101.0, 102.0, 103.0, 104.0])
        .with_closes("CCC", "2024-01-01", &[50.0, 60.0, 80.0, 100.0, 120.0])
}

/// Writes a CSV price file per symbol into `dir` with `date,close,volume`.
pub fn write_price_csv(dir: &std::path::Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut body = String::from("date,close,volume\n");
    for bar in bars {
        body.push_str(&format!("{},{},1000\n", bar.date, bar.close));
    }
    std::fs::write(dir.join(format!("{symbol}.csv")), body).unwrap();
}
