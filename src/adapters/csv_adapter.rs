//! CSV directory price adapter.
//!
//! Each instrument lives in `<base>/<SYMBOL>.csv` with a header row. Columns
//! are located by name: `date` and `close` are required, `open`, `high` and
//! `low` fall back to the close, and `volume` is optional.
//!
//! Symbols are upper-case. File stems are matched case-insensitively, so
//! `pkn.csv` serves `PKN`.

use crate::domain::error::RankfolioError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::price_series::{PriceSeries, PriceTable};
use crate::ports::price_port::PriceHistoryPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord, path: &Path) -> Result<Self, RankfolioError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| {
            find(name).ok_or_else(|| RankfolioError::Data {
                reason: format!("{}: missing {} column", path.display(), name),
            })
        };
        Ok(Columns {
            date: required("date")?,
            open: find("open"),
            high: find("high"),
            low: find("low"),
            close: required("close")?,
            volume: find("volume"),
        })
    }
}

impl CsvPriceAdapter {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Price files in the base directory keyed by upper-cased stem. When two
    /// stems differ only in case, the upper-case file wins.
    fn price_files(&self) -> Result<BTreeMap<String, PathBuf>, RankfolioError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RankfolioError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut files = BTreeMap::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv || !path.is_file() {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let symbol = stem.to_uppercase();
            if stem == symbol || !files.contains_key(&symbol) {
                files.insert(symbol, path);
            }
        }
        Ok(files)
    }

    /// Reads one symbol's bars dated on or after `start`. A missing file is
    /// an empty series.
    pub fn read_series(&self, symbol: &str, start: NaiveDate) -> Result<PriceSeries, RankfolioError> {
        let files = self.price_files()?;
        self.read_file(symbol, files.get(&symbol.to_uppercase()), start)
    }

    fn read_file(
        &self,
        symbol: &str,
        path: Option<&PathBuf>,
        start: NaiveDate,
    ) -> Result<PriceSeries, RankfolioError> {
        let Some(path) = path else {
            debug!(%symbol, dir = %self.base_path.display(), "no price file, treating as empty history");
            return Ok(PriceSeries::new(symbol, Vec::new()));
        };

        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
        let columns = Columns::from_headers(rdr.headers()?, path)?;
        let mut bars = Vec::new();

        for (i, result) in rdr.records().enumerate() {
            let record = result?;
            // Header is line 1.
            let line = i + 2;

            let date = parse_date(&record, columns.date, path, line)?;
            if date < start {
                continue;
            }

            let close = parse_price(&record, columns.close, "close", path, line)?;
            let optional = |column: Option<usize>, name: &str| match column {
                Some(idx) if !field(&record, idx).is_empty() => {
                    parse_price(&record, idx, name, path, line)
                }
                _ => Ok(close),
            };

            bars.push(OhlcvBar {
                date,
                open: optional(columns.open, "open")?,
                high: optional(columns.high, "high")?,
                low: optional(columns.low, "low")?,
                close,
                volume: parse_volume(&record, columns.volume, path, line)?,
            });
        }

        Ok(PriceSeries::new(symbol, bars))
    }
}

fn field(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_date(
    record: &csv::StringRecord,
    idx: usize,
    path: &Path,
    line: usize,
) -> Result<NaiveDate, RankfolioError> {
    let raw = field(record, idx);
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| RankfolioError::Data {
        reason: format!("{}:{}: invalid date {:?}: {}", path.display(), line, raw, e),
    })
}

fn parse_price(
    record: &csv::StringRecord,
    idx: usize,
    name: &str,
    path: &Path,
    line: usize,
) -> Result<f64, RankfolioError> {
    let raw = field(record, idx);
    raw.parse::<f64>().map_err(|e| RankfolioError::Data {
        reason: format!("{}:{}: invalid {} value {:?}: {}", path.display(), line, name, raw, e),
    })
}

fn parse_volume(
    record: &csv::StringRecord,
    idx: Option<usize>,
    path: &Path,
    line: usize,
) -> Result<Option<f64>, RankfolioError> {
    let Some(idx) = idx else {
        return Ok(None);
    };
    let raw = field(record, idx);
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(volume) if volume.is_finite() && volume >= 0.0 => Ok(Some(volume)),
        _ => Err(RankfolioError::Data {
            reason: format!("{}:{}: invalid volume value {:?}", path.display(), line, raw),
        }),
    }
}

impl PriceHistoryPort for CsvPriceAdapter {
    fn get_price_history(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
    ) -> Result<PriceTable, RankfolioError> {
        let files = self.price_files()?;
        symbols
            .iter()
            .map(|symbol| self.read_file(symbol, files.get(&symbol.to_uppercase()), start))
            .collect()
    }

    fn list_known_universe(&self) -> Result<BTreeSet<String>, RankfolioError> {
        Ok(self.price_files()?.into_keys().collect())
    }
}
