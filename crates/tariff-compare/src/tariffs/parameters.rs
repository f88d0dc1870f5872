use crate::tariffs::normalizer::{normalize_header, parse_decimal, sniff_headers};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Names of the regulatory parameters the calculator reads.
pub mod keys {
    pub const LAMBDA: &str = "lambda";
    pub const PPE: &str = "ppe";
    pub const PCV: &str = "pcv_c";
    pub const DISPATCH_DOMESTIC_RESIDENT: &str = "dispbt_d";
    pub const DISPATCH_OTHER: &str = "dispbt_nd";
    pub const DISPATCHING: &str = "cdispd";
    pub const SIGMA1: &str = "sigma1";
    pub const SIGMA2: &str = "sigma2";
    pub const SIGMA3: &str = "sigma3";
    pub const UC6_POWER: &str = "uc6s_d";
    pub const UC3: &str = "uc3";
    pub const UC6_ENERGY: &str = "uc6p_d";
    pub const ASOS_RESIDENT: &str = "asos_dr";
    pub const ARIM_RESIDENT: &str = "arim_dr";
    pub const ASOS_FIXED: &str = "asos_dnr_f";
    pub const ARIM_FIXED: &str = "arim_dnr_f";
    pub const ASOS_VARIABLE: &str = "asos_dnr_v";
    pub const ARIM_VARIABLE: &str = "arim_dnr_v";
    pub const EXCISE_RESIDENT_LOW_POWER: &str = "acc_c_r_l";
    pub const EXCISE_BUSINESS: &str = "acc_a_l_l";
    pub const EXCISE_DOMESTIC_OTHER: &str = "acc_c_nr";
}

const NAME_COLUMN: &str = "parametro";
const VALUE_COLUMN: &str = "valore";

#[derive(Debug, thiserror::Error)]
pub enum ParameterError {
    #[error("failed to read parameter table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid parameter table data: {0}")]
    Csv(#[from] csv::Error),
    #[error("parameter table needs a name and a value column (found headers: {0:?})")]
    MissingColumns(Vec<String>),
}

/// Name to value table of regulatory pricing parameters.
///
/// Lookups never fail: an absent or non-numeric parameter resolves to the
/// caller's default.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegulatoryParameters {
    values: HashMap<String, f64>,
}

impl RegulatoryParameters {
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let values = pairs
            .into_iter()
            .map(|(name, value)| (normalize_header(name.as_ref()), value))
            .collect();
        Self { values }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ParameterError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Comma is tried first; a table that yields fewer than two columns is re-read with `;`.
    fn from_bytes(bytes: &[u8]) -> Result<Self, ParameterError> {
        let (delimiter, headers) = sniff_headers(bytes)?;

        let (name_idx, value_idx) = locate_columns(&headers)
            .ok_or_else(|| ParameterError::MissingColumns(headers.clone()))?;

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes);

        let mut values = HashMap::new();
        for record in csv_reader.records() {
            let record = record?;
            let Some(name) = record.get(name_idx).map(normalize_header) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            match record.get(value_idx).and_then(parse_decimal) {
                Some(value) => {
                    values.insert(name, value);
                }
                None => debug!(parameter = %name, "ignoring non-numeric regulatory parameter"),
            }
        }

        debug!(parameters = values.len(), "loaded regulatory parameters");
        Ok(Self { values })
    }

    pub fn get_or(&self, name: &str, default: f64) -> f64 {
        self.values.get(name).copied().unwrap_or(default)
    }

    /// Missing parameters count as zero.
    pub fn get(&self, name: &str) -> f64 {
        self.get_or(name, 0.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn locate_columns(headers: &[String]) -> Option<(usize, usize)> {
    let named = (
        headers.iter().position(|header| header.contains(NAME_COLUMN)),
        headers.iter().position(|header| header.contains(VALUE_COLUMN)),
    );

    match named {
        (Some(name), Some(value)) => Some((name, value)),
        _ if headers.len() == 2 => Some((0, 1)),
        _ => None,
    }
}
