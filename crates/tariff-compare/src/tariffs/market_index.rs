use crate::tariffs::domain::Band;
use crate::tariffs::normalizer::{normalize_header, parse_decimal};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const FALLBACK_F1: f64 = 0.12;
const FALLBACK_F2: f64 = 0.11;
const FALLBACK_F3: f64 = 0.10;

const DATE_FORMATS: &[&str] = &["%Y%m%d", "%Y-%m-%d", "%d/%m/%Y"];

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("failed to read market index series: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid market index series: {0}")]
    Csv(#[from] csv::Error),
    #[error("market index series has no {0} column")]
    MissingColumn(Band),
    #[error("market index series has no numeric {0} values")]
    NoValues(Band),
}

/// Where the averages came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexSource {
    Series {
        days: usize,
        first_day: Option<NaiveDate>,
        last_day: Option<NaiveDate>,
    },
    Fallback,
}

/// Per-band average of the wholesale reference price (EUR/kWh).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketIndexAverages {
    pub f1: f64,
    pub f2: f64,
    pub f3: f64,
    pub f23: f64,
    pub f0: f64,
    pub source: IndexSource,
}

impl MarketIndexAverages {
    /// Builds the table from the three metered-band averages, deriving F23 and F0.
    pub fn from_bands(f1: f64, f2: f64, f3: f64, source: IndexSource) -> Self {
        Self {
            f1,
            f2,
            f3,
            f23: (f2 + f3) / 2.0,
            f0: (f1 + f2 + f3) / 3.0,
            source,
        }
    }

    /// Conservative table used when no series is available.
    pub fn fallback() -> Self {
        Self::from_bands(FALLBACK_F1, FALLBACK_F2, FALLBACK_F3, IndexSource::Fallback)
    }

    pub fn get(&self, band: Band) -> f64 {
        match band {
            Band::F1 => self.f1,
            Band::F2 => self.f2,
            Band::F3 => self.f3,
            Band::F23 => self.f23,
            Band::F0 => self.f0,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, IndexSource::Fallback)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Averages a semicolon-delimited daily series with F1/F2/F3 columns.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, IndexError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|header| normalize_header(header).to_ascii_uppercase())
            .collect();

        let column = |band: Band| {
            headers
                .iter()
                .position(|header| header.contains(band.label()))
                .ok_or(IndexError::MissingColumn(band))
        };
        let columns = [column(Band::F1)?, column(Band::F2)?, column(Band::F3)?];
        let date_column = headers
            .iter()
            .position(|header| header.contains("DATA") || header.contains("DATE"));

        let mut sums = [0.0_f64; 3];
        let mut counts = [0usize; 3];
        let mut days = 0usize;
        let mut first_day: Option<NaiveDate> = None;
        let mut last_day: Option<NaiveDate> = None;

        for record in csv_reader.records() {
            let record = record?;
            days += 1;

            for (slot, idx) in columns.iter().enumerate() {
                if let Some(value) = record.get(*idx).and_then(parse_decimal) {
                    sums[slot] += value;
                    counts[slot] += 1;
                }
            }

            if let Some(day) = date_column
                .and_then(|idx| record.get(idx))
                .and_then(parse_day)
            {
                first_day = Some(first_day.map_or(day, |current| current.min(day)));
                last_day = Some(last_day.map_or(day, |current| current.max(day)));
            }
        }

        let mut averages = [0.0_f64; 3];
        for (slot, band) in Band::metered().into_iter().enumerate() {
            if counts[slot] == 0 {
                return Err(IndexError::NoValues(band));
            }
            averages[slot] = sums[slot] / counts[slot] as f64;
        }

        let [f1, f2, f3] = averages;
        debug!(days, f1, f2, f3, "averaged market index series");
        Ok(Self::from_bands(
            f1,
            f2,
            f3,
            IndexSource::Series {
                days,
                first_day,
                last_day,
            },
        ))
    }

    /// Loads the series, or returns [`MarketIndexAverages::fallback`] when it is missing or unreadable.
    pub fn load_or_fallback<P: AsRef<Path>>(path: Option<P>) -> Self {
        let Some(path) = path else {
            warn!("no market index series configured, using fallback averages");
            return Self::fallback();
        };

        match Self::from_path(path.as_ref()) {
            Ok(averages) => averages,
            Err(error) => {
                warn!(
                    path = %path.as_ref().display(),
                    %error,
                    "market index series unavailable, using fallback averages"
                );
                Self::fallback()
            }
        }
    }
}

fn parse_day(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}
