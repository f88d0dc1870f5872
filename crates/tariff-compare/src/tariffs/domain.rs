use crate::tariffs::normalizer::parse_decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Regulated time-of-use band ("fascia").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Band {
    F1,
    F2,
    F3,
    F23,
    F0,
}

impl Band {
    /// Bands a consumption profile is split across.
    pub const fn metered() -> [Self; 3] {
        [Self::F1, Self::F2, Self::F3]
    }

    /// Maps a feed band code to a band. Unknown or missing codes are undifferentiated.
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("01") => Self::F1,
            Some("02") => Self::F2,
            Some("03") => Self::F3,
            Some("91") => Self::F23,
            _ => Self::F0,
        }
    }

    /// Combined band that also covers this one, if any.
    pub const fn covering(self) -> Option<Self> {
        match self {
            Self::F2 | Self::F3 => Some(Self::F23),
            Self::F1 | Self::F23 | Self::F0 => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::F1 => "F1",
            Self::F2 => "F2",
            Self::F3 => "F3",
            Self::F23 => "F23",
            Self::F0 => "F0",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Per-band fee values keyed by band. Ordered so iteration is deterministic.
pub type BandPrices = BTreeMap<Band, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerSegment {
    Domestic,
    Business,
}

impl CustomerSegment {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim).unwrap_or("01") {
            "01" => Self::Domestic,
            _ => Self::Business,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Domestic => "Domestico",
            Self::Business => "Business",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    Fixed,
    Variable,
}

impl PriceType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fixed => "Fisso",
            Self::Variable => "Variabile",
        }
    }
}

/// A competing electricity offer, normalized from the catalog feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub name: String,
    pub code: String,
    pub url: Option<String>,
    pub segment: CustomerSegment,
    pub price_type: PriceType,
    /// Annual fixed commercial fee (EUR/year).
    pub fixed_commercial_fee: f64,
    /// The source published no fixed commercial fee at all.
    pub fixed_fee_missing: bool,
    /// Annual fixed renewable (FER) fee (EUR/year).
    pub fixed_renewable_fee: f64,
    /// Volumetric commercial fee (EUR/kWh).
    pub variable_commercial_fee: BandPrices,
    /// Absolute energy price (EUR/kWh), populated for fixed-price offers.
    pub energy_price: BandPrices,
    /// Spread over the market index (EUR/kWh), populated for variable-price offers.
    pub spread: BandPrices,
    /// Volumetric renewable (FER) fee (EUR/kWh).
    pub renewable_fee: BandPrices,
    /// Power-indexed energy fee (EUR/kW/year).
    pub power_fee: f64,
}

impl Offer {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        segment: CustomerSegment,
        price_type: PriceType,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            url: None,
            segment,
            price_type,
            fixed_commercial_fee: 0.0,
            fixed_fee_missing: false,
            fixed_renewable_fee: 0.0,
            variable_commercial_fee: BandPrices::new(),
            energy_price: BandPrices::new(),
            spread: BandPrices::new(),
            renewable_fee: BandPrices::new(),
            power_fee: 0.0,
        }
    }
}

const SPLIT_TOLERANCE: f64 = 1e-6;

/// Typical household consumption used when a bill reports none (kWh/year).
pub const TYPICAL_ANNUAL_KWH: f64 = 2700.0;
/// Typical household committed power (kW).
pub const TYPICAL_POWER_KW: f64 = 3.0;

/// Fractional split of annual consumption across F1/F2/F3.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandSplit {
    f1: f64,
    f2: f64,
    f3: f64,
}

impl BandSplit {
    pub fn new(f1: f64, f2: f64, f3: f64) -> Result<Self, ProfileError> {
        let shares = [f1, f2, f3];
        if shares.iter().any(|share| !share.is_finite() || *share < 0.0) {
            return Err(ProfileError::InvalidSplit { f1, f2, f3 });
        }
        if ((f1 + f2 + f3) - 1.0).abs() > SPLIT_TOLERANCE {
            return Err(ProfileError::InvalidSplit { f1, f2, f3 });
        }
        Ok(Self { f1, f2, f3 })
    }

    /// Parses `"0.33,0.33,0.34"`. With `;` as separator the shares may use a
    /// decimal comma (`"0,33;0,33;0,34"`); percentages summing to 100 are accepted.
    pub fn parse(raw: &str) -> Result<Self, ProfileError> {
        let separator = if raw.contains(';') { ';' } else { ',' };
        let parts: Vec<f64> = raw
            .split(separator)
            .map(|part| parse_decimal(part.trim().trim_end_matches('%')))
            .collect::<Option<_>>()
            .ok_or_else(|| ProfileError::UnparsableSplit(raw.to_string()))?;

        let [f1, f2, f3] = parts[..] else {
            return Err(ProfileError::UnparsableSplit(raw.to_string()));
        };

        if (f1 + f2 + f3 - 100.0).abs() <= SPLIT_TOLERANCE * 100.0 {
            return Self::new(f1 / 100.0, f2 / 100.0, f3 / 100.0);
        }
        Self::new(f1, f2, f3)
    }

    pub fn share(&self, band: Band) -> f64 {
        match band {
            Band::F1 => self.f1,
            Band::F2 => self.f2,
            Band::F3 => self.f3,
            Band::F23 => self.f2 + self.f3,
            Band::F0 => 1.0,
        }
    }
}

impl Default for BandSplit {
    /// Typical household split used when the bill does not report banded readings.
    fn default() -> Self {
        Self {
            f1: 0.33,
            f2: 0.33,
            f3: 0.34,
        }
    }
}

/// Annual consumption attributed to one metered band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandConsumption {
    pub band: Band,
    pub kwh: f64,
}

/// The consumer whose bill is being predicted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionProfile {
    annual_kwh: f64,
    committed_power_kw: f64,
    segment: CustomerSegment,
    resident: bool,
    split: BandSplit,
}

impl ConsumptionProfile {
    pub fn new(
        annual_kwh: f64,
        committed_power_kw: f64,
        segment: CustomerSegment,
        resident: bool,
        split: BandSplit,
    ) -> Result<Self, ProfileError> {
        if !annual_kwh.is_finite() || annual_kwh < 0.0 {
            return Err(ProfileError::InvalidConsumption(annual_kwh));
        }
        if !committed_power_kw.is_finite() || committed_power_kw <= 0.0 {
            return Err(ProfileError::InvalidPower(committed_power_kw));
        }

        // Business supply points are never billed under the resident regime.
        let resident = resident && segment == CustomerSegment::Domestic;

        Ok(Self {
            annual_kwh,
            committed_power_kw,
            segment,
            resident,
            split,
        })
    }

    pub fn annual_kwh(&self) -> f64 {
        self.annual_kwh
    }

    pub fn committed_power_kw(&self) -> f64 {
        self.committed_power_kw
    }

    pub fn segment(&self) -> CustomerSegment {
        self.segment
    }

    pub fn is_resident(&self) -> bool {
        self.resident
    }

    pub fn is_domestic_resident(&self) -> bool {
        self.segment == CustomerSegment::Domestic && self.resident
    }

    pub fn banded_consumption(&self) -> [BandConsumption; 3] {
        Band::metered().map(|band| BandConsumption {
            band,
            kwh: self.annual_kwh * self.split.share(band),
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("annual consumption must be a finite, non-negative kWh value (got {0})")]
    InvalidConsumption(f64),
    #[error("committed power must be a finite, positive kW value (got {0})")]
    InvalidPower(f64),
    #[error("band split F1={f1} F2={f2} F3={f3} must be non-negative and sum to 1")]
    InvalidSplit { f1: f64, f2: f64, f3: f64 },
    #[error("band split '{0}' must list three numbers for F1,F2,F3")]
    UnparsableSplit(String),
}
