use crate::tariffs::calculator::ExciseRegime;
use crate::tariffs::domain::{CustomerSegment, PriceType};
use crate::tariffs::market_index::IndexSource;
use crate::tariffs::ranking::SkippedOffer;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdownView {
    pub commodity: f64,
    pub renewable: f64,
    pub energy: f64,
    pub materia_energia: f64,
    pub commercialization: f64,
    pub dispatching: f64,
    pub network: f64,
    pub system_charges: f64,
    pub excise: f64,
    pub excise_regime: ExciseRegime,
    pub excise_regime_label: &'static str,
    pub taxable: f64,
    pub vat: f64,
    pub taxes: f64,
    pub payable_annual: f64,
    pub monthly: f64,
    pub fixed_commercial_fee: f64,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_gaps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferQuoteView {
    pub name: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub segment: CustomerSegment,
    pub segment_label: &'static str,
    pub price_type: PriceType,
    pub price_type_label: &'static str,
    pub breakdown: CostBreakdownView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOfferView {
    pub position: usize,
    #[serde(flatten)]
    pub quote: OfferQuoteView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub savings_pct: Option<f64>,
    pub score: f64,
    pub recommended: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RankingReport {
    Ranked {
        segment: CustomerSegment,
        segment_label: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        baseline_annual: Option<f64>,
        evaluated: usize,
        market_index: IndexSource,
        offers: Vec<RankedOfferView>,
        skipped: Vec<SkippedOffer>,
    },
    NoOffersForSegment {
        segment: CustomerSegment,
        segment_label: &'static str,
    },
}
