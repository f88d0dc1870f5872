pub mod calculator;
pub mod catalog;
mod dataset;
pub mod domain;
pub mod market_index;
mod normalizer;
pub mod parameters;
pub mod ranking;
pub mod report;

pub use calculator::{CalculationError, CostBreakdown, DataGap, TariffCostCalculator};
pub use catalog::{CatalogError, OfferCatalog};
pub use dataset::{DatasetError, QuoteError, TariffDataset};
pub use domain::{
    Band, BandSplit, ConsumptionProfile, CustomerSegment, Offer, PriceType, ProfileError,
};
pub use market_index::{IndexSource, MarketIndexAverages};
pub use parameters::RegulatoryParameters;
pub use ranking::{
    Baseline, CostEstimator, OfferRanker, RankingOptions, RankingOutcome, ResultLimit,
};
