//! Per-instrument price histories and the table that groups them.

use crate::domain::ohlcv::OhlcvBar;
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<OhlcvBar>,
    date_index: HashMap<NaiveDate, usize>,
}

impl PriceSeries {
    /// Builds a series, ordering bars by date and keeping the first bar seen
    /// for any repeated date.
    pub fn new(symbol: impl Into<String>, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol: symbol.into(),
            bars,
            date_index,
        }
    }

    pub fn bars(&self) -> &[OhlcvBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.get_bar(date).map(|b| b.close)
    }

    /// Bars dated on or before `as_of`.
    pub fn until(&self, as_of: NaiveDate) -> &[OhlcvBar] {
        let end = self.bars.partition_point(|b| b.date <= as_of);
        &self.bars[..end]
    }

    /// Bars dated on or after `start`.
    pub fn since(&self, start: NaiveDate) -> &[OhlcvBar] {
        let begin = self.bars.partition_point(|b| b.date < start);
        &self.bars[begin..]
    }

    /// Bars with `as_of - lookback_days <= date <= as_of`.
    pub fn window(&self, as_of: NaiveDate, lookback_days: u32) -> &[OhlcvBar] {
        let history = self.until(as_of);
        let from = as_of - Duration::days(i64::from(lookback_days));
        let begin = history.partition_point(|b| b.date < from);
        &history[begin..]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    series: BTreeMap<String, PriceSeries>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.symbol.clone(), series);
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceSeries> {
        self.series.get(symbol)
    }

    /// Symbols in ascending order, including those with an empty series.
    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.series.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceSeries> {
        self.series.values()
    }

    /// Number of series held, empty ones included.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// True when no series carries a single row.
    pub fn is_empty(&self) -> bool {
        self.series.values().all(PriceSeries::is_empty)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.series.values().filter_map(PriceSeries::last_date).max()
    }
}

impl FromIterator<PriceSeries> for PriceTable {
    fn from_iter<I: IntoIterator<Item = PriceSeries>>(iter: I) -> Self {
        let mut table = PriceTable::new();
        for series in iter {
            table.insert(series);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn make_series(symbol: &str, points: &[(&str, f64)]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            points
                .iter()
                .map(|&(d, close)| OhlcvBar::from_close(date(d), close))
                .collect(),
        )
    }

    #[test]
    fn new_sorts_and_indexes_dates() {
        let series = make_series(
            "BHP",
            &[
                ("2024-01-03", 102.0),
                ("2024-01-01", 100.0),
                ("2024-01-02", 101.0),
            ],
        );

        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), Some(date("2024-01-01")));
        assert_eq!(series.last_date(), Some(date("2024-01-03")));
        assert_eq!(series.close_on(date("2024-01-02")), Some(101.0));
        assert_eq!(series.close_on(date("2024-01-05")), None);
    }

    #[test]
    fn new_drops_repeated_dates() {
        let series = make_series("BHP", &[("2024-01-01", 100.0), ("2024-01-01", 999.0)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.close_on(date("2024-01-01")), Some(100.0));
    }

    #[test]
    fn until_and_since_slice_inclusively() {
        let series = make_series(
            "BHP",
            &[
                ("2024-01-01", 1.0),
                ("2024-01-02", 2.0),
                ("2024-01-04", 4.0),
            ],
        );

        assert_eq!(series.until(date("2024-01-02")).len(), 2);
        assert_eq!(series.until(date("2023-12-31")).len(), 0);
        assert_eq!(series.since(date("2024-01-02")).len(), 2);
        assert_eq!(series.since(date("2024-01-03")).len(), 1);
        assert!(series.since(date("2024-02-01")).is_empty());
    }

    #[test]
    fn window_covers_lookback_calendar_days() {
        let series = make_series(
            "BHP",
            &[
                ("2024-01-01", 1.0),
                ("2024-01-02", 2.0),
                ("2024-01-03", 3.0),
                ("2024-01-04", 4.0),
                ("2024-01-05", 5.0),
            ],
        );

        let window = series.window(date("2024-01-05"), 4);
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].close, 1.0);

        let window = series.window(date("2024-01-04"), 1);
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].close, 3.0);
        assert_eq!(window[1].close, 4.0);
    }

    #[test]
    fn table_is_empty_when_all_series_are_empty() {
        let table: PriceTable = vec![PriceSeries::new("XYZ", vec![])].into_iter().collect();
        assert_eq!(table.len(), 1);
        assert!(table.is_empty());
        assert!(PriceTable::new().is_empty());
    }

    #[test]
    fn last_date_spans_all_series() {
        let table: PriceTable = vec![
            make_series("BHP", &[("2024-01-02", 100.0), ("2024-01-05", 101.0)]),
            make_series("RIO", &[("2024-01-01", 50.0), ("2024-01-03", 51.0)]),
        ]
        .into_iter()
        .collect();

        assert_eq!(table.last_date(), Some(date("2024-01-05")));
        let symbols: Vec<&String> = table.symbols().collect();
        assert_eq!(symbols, vec!["BHP", "RIO"]);
    }
}
