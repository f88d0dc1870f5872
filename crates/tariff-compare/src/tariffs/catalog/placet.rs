//! Flat PLACET offer export (one CSV row per offer).
//!
//! The regulator also publishes the standardized PLACET offers as a CSV with
//! fixed columns for the annual fee and per-band prices. Rows are mapped onto
//! the same [`Offer`] shape the XML feed produces so both catalogs are priced
//! by the same calculator.

use super::{CatalogError, OfferCatalog};
use crate::tariffs::domain::{Band, BandPrices, CustomerSegment, Offer, PriceType};
use crate::tariffs::normalizer::{decode_document, parse_decimal, sniff_headers};
use csv::StringRecord;
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;
use tracing::debug;

const REQUIRED_COLUMNS: [&str; 2] = ["denominazione", "nome_offerta"];

#[derive(Debug, Deserialize)]
struct PlacetRow {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    denominazione: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    nome_offerta: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tipo_offerta: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    tipo_cliente: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    cod_offerta: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    url_offerta: Option<String>,
    #[serde(default, deserialize_with = "decimal")]
    p_fix_f: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_fix_v: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_f1: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_f2: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_f3: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_bf1: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_bf23: Option<f64>,
    #[serde(default, deserialize_with = "decimal")]
    p_vol_mono: Option<f64>,
}

impl PlacetRow {
    fn into_offer(self) -> Option<Offer> {
        let supplier = self.denominazione?;
        let name = self.nome_offerta?;

        let price_type = match self.tipo_offerta.as_deref() {
            Some(kind) if kind.to_lowercase().contains("fiss") => PriceType::Fixed,
            _ => PriceType::Variable,
        };
        let segment = CustomerSegment::from_code(self.tipo_cliente.as_deref());

        let mut offer = Offer::new(
            format!("{supplier} - {name}"),
            self.cod_offerta.unwrap_or_default(),
            segment,
            price_type,
        );
        offer.url = self.url_offerta;
        let fixed_fee = match price_type {
            PriceType::Fixed => self.p_fix_f.or(self.p_fix_v),
            PriceType::Variable => self.p_fix_v.or(self.p_fix_f),
        };
        offer.fixed_fee_missing = fixed_fee.is_none();
        offer.fixed_commercial_fee = fixed_fee.unwrap_or(0.0);

        let mut prices = BandPrices::new();
        for (band, value) in [
            (Band::F1, self.p_vol_f1),
            (Band::F2, self.p_vol_f2),
            (Band::F3, self.p_vol_f3),
        ] {
            if let Some(price) = value {
                prices.insert(band, price);
            }
        }
        if prices.is_empty() {
            if let Some(peak) = self.p_vol_bf1 {
                prices.insert(Band::F1, peak);
                prices.insert(Band::F23, self.p_vol_bf23.unwrap_or(peak));
            } else if let Some(flat) = self.p_vol_mono {
                prices.insert(Band::F0, flat);
            }
        }

        match price_type {
            PriceType::Fixed => offer.energy_price = prices,
            PriceType::Variable => offer.spread = prices,
        }

        Some(offer)
    }
}

impl OfferCatalog {
    pub fn from_placet_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_placet_reader(file)
    }

    /// Reads a PLACET CSV export, comma or semicolon delimited. Rows without a
    /// supplier or offer name are skipped; a file without those columns is rejected.
    pub fn from_placet_reader<R: Read>(mut reader: R) -> Result<Self, CatalogError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let text = decode_document(&bytes);

        let (delimiter, headers) = sniff_headers(text.as_bytes())?;
        if !REQUIRED_COLUMNS
            .iter()
            .all(|column| headers.iter().any(|header| header == column))
        {
            return Err(CatalogError::MissingColumns(headers));
        }
        let headers = StringRecord::from(headers);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut offers = Vec::new();
        let mut dropped = 0usize;
        for record in csv_reader.records() {
            match record?.deserialize::<PlacetRow>(Some(&headers))?.into_offer() {
                Some(offer) => offers.push(offer),
                None => dropped += 1,
            }
        }

        debug!(offers = offers.len(), dropped, "parsed PLACET catalog");
        Ok(Self::new(offers))
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty() && !value.eq_ignore_ascii_case("nan")))
}

fn decimal<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.as_deref().and_then(parse_decimal))
}
