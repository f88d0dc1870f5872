use crate::config::TariffDataConfig;
use crate::tariffs::calculator::{CalculationError, CostBreakdown, TariffCostCalculator};
use crate::tariffs::catalog::{CatalogError, OfferCatalog};
use crate::tariffs::domain::{BandSplit, ConsumptionProfile, Offer};
use crate::tariffs::market_index::MarketIndexAverages;
use crate::tariffs::parameters::{ParameterError, RegulatoryParameters};
use crate::tariffs::ranking::{OfferRanker, RankingOptions, RankingOutcome};
use std::path::Path;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("offer catalog {path}: {source}")]
    Catalog {
        path: String,
        #[source]
        source: CatalogError,
    },
    #[error("regulatory parameters {path}: {source}")]
    Parameters {
        path: String,
        #[source]
        source: ParameterError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("no offer with code '{0}' in the catalog")]
    UnknownOffer(String),
    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

/// Catalog, parameter table and index averages, loaded once and then read-only.
#[derive(Debug, Clone)]
pub struct TariffDataset {
    pub catalog: OfferCatalog,
    pub parameters: RegulatoryParameters,
    pub market_index: MarketIndexAverages,
    pub band_split: BandSplit,
}

impl TariffDataset {
    pub fn new(
        catalog: OfferCatalog,
        parameters: RegulatoryParameters,
        market_index: MarketIndexAverages,
    ) -> Self {
        Self {
            catalog,
            parameters,
            market_index,
            band_split: BandSplit::default(),
        }
    }

    pub fn load(config: &TariffDataConfig) -> Result<Self, DatasetError> {
        let catalog = load_catalog(&config.catalog_path).map_err(|source| DatasetError::Catalog {
            path: config.catalog_path.display().to_string(),
            source,
        })?;
        let parameters = RegulatoryParameters::from_path(&config.parameters_path).map_err(
            |source| DatasetError::Parameters {
                path: config.parameters_path.display().to_string(),
                source,
            },
        )?;
        let market_index =
            MarketIndexAverages::load_or_fallback(config.market_index_path.as_deref());

        info!(
            offers = catalog.len(),
            parameters = parameters.len(),
            index_fallback = market_index.is_fallback(),
            "tariff dataset loaded"
        );

        Ok(Self {
            catalog,
            parameters,
            market_index,
            band_split: config.band_split,
        })
    }

    pub fn calculator(&self) -> TariffCostCalculator<'_> {
        TariffCostCalculator::new(&self.parameters, &self.market_index)
    }

    pub fn ranker(&self) -> OfferRanker<TariffCostCalculator<'_>> {
        OfferRanker::new(self.calculator())
    }

    pub fn rank(&self, profile: &ConsumptionProfile, options: &RankingOptions) -> RankingOutcome<'_> {
        self.ranker().rank(&self.catalog, profile, options)
    }

    /// Prices one offer, looked up by code, for the profile.
    pub fn quote(
        &self,
        code: &str,
        profile: &ConsumptionProfile,
    ) -> Result<(&Offer, CostBreakdown), QuoteError> {
        let offer = self
            .catalog
            .find(code)
            .ok_or_else(|| QuoteError::UnknownOffer(code.to_string()))?;
        let breakdown = self.calculator().quote(offer, profile)?;
        Ok((offer, breakdown))
    }
}

fn load_catalog(path: &Path) -> Result<OfferCatalog, CatalogError> {
    let is_placet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_placet {
        OfferCatalog::from_placet_path(path)
    } else {
        OfferCatalog::from_path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_catalog_is_reported_with_path() {
        let config = TariffDataConfig {
            catalog_path: PathBuf::from("./missing/offerte.xml"),
            parameters_path: PathBuf::from("./missing/parametri.csv"),
            market_index_path: None,
            band_split: BandSplit::default(),
        };

        let error = TariffDataset::load(&config).expect_err("catalog is missing");
        assert!(matches!(error, DatasetError::Catalog { .. }));
        assert!(error.to_string().contains("offerte.xml"));
    }

    #[test]
    fn unknown_offer_code_is_an_error() {
        let dataset = TariffDataset::new(
            OfferCatalog::default(),
            RegulatoryParameters::default(),
            MarketIndexAverages::fallback(),
        );
        let profile = ConsumptionProfile::new(
            2700.0,
            3.0,
            crate::tariffs::domain::CustomerSegment::Domestic,
            true,
            BandSplit::default(),
        )
        .expect("valid profile");

        assert!(matches!(
            dataset.quote("NOPE", &profile),
            Err(QuoteError::UnknownOffer(code)) if code == "NOPE"
        ));
    }
}
