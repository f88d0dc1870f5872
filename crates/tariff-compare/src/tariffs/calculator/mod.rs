//! Annual bill prediction for a single offer.
//!
//! The bill is built in eight stages that mirror the regulated Italian bill
//! layout: commodity energy, renewable add-on, materia energia,
//! commercialization, dispatching, network, system charges and excise. VAT is
//! applied once on the taxable sum. Every amount stays unrounded here; rounding
//! happens in [`crate::tariffs::report`].

mod stages;

use crate::tariffs::domain::{Band, ConsumptionProfile, Offer};
use crate::tariffs::market_index::MarketIndexAverages;
use crate::tariffs::parameters::RegulatoryParameters;
use crate::tariffs::ranking::CostEstimator;
use serde::Serialize;

pub use stages::{EXCISE_ALLOWANCE_KWH, LOW_POWER_LIMIT_KW};

/// Multiplier turning the taxable amount into the VAT-inclusive amount.
pub const VAT_MULTIPLIER: f64 = 1.10;
pub const VAT_RATE: f64 = 0.10;
/// Energy price (EUR/kWh) assumed when a fixed-price offer publishes none.
pub const FALLBACK_ENERGY_PRICE: f64 = 0.15;
/// Annual fixed commercial fee (EUR) assumed when an offer publishes none.
pub const FALLBACK_FIXED_FEE: f64 = 80.0;

/// A place where the breakdown relies on a substituted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataGap {
    /// Fixed-price offer without any energy price.
    EnergyPriceFallback { price: f64 },
    /// Fixed-price offer whose price map could not resolve one band.
    BandPriceFallback { band: Band, price: f64 },
    /// Index-linked offer without any spread; the bare index was used.
    SpreadUnavailable,
    /// Offer without a fixed commercial fee.
    FixedFeeFallback { fee: f64 },
}

impl DataGap {
    pub fn describe(&self) -> String {
        match self {
            Self::EnergyPriceFallback { price } => {
                format!("no energy price published, priced at {price} EUR/kWh")
            }
            Self::BandPriceFallback { band, price } => {
                format!("no {band} energy price published, priced at {price} EUR/kWh")
            }
            Self::SpreadUnavailable => "no spread published, priced at the bare index".to_string(),
            Self::FixedFeeFallback { fee } => {
                format!("no fixed fee published, assumed {fee} EUR/year")
            }
        }
    }
}

/// Excise regime the consumer falls under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExciseRegime {
    /// Domestic resident at or below 3 kW, with the 1800 kWh allowance.
    ResidentLowPower,
    DomesticOther,
    Business,
}

impl ExciseRegime {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ResidentLowPower => "Domestico residente fino a 3 kW",
            Self::DomesticOther => "Domestico",
            Self::Business => "Altri usi",
        }
    }
}

/// Itemized annual bill for one offer and one consumer (EUR, unrounded).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    /// Stage 1: commodity energy.
    pub commodity: f64,
    /// Stage 2: volumetric renewable add-on.
    pub renewable: f64,
    pub materia_energia: f64,
    pub commercialization: f64,
    pub dispatching: f64,
    pub network: f64,
    pub system_charges: f64,
    pub excise: f64,
    pub excise_regime: ExciseRegime,
    pub taxable: f64,
    pub vat: f64,
    pub payable_annual: f64,
    pub monthly: f64,
    /// Annual fixed commercial fee used in stage 4, echoed for display.
    pub fixed_commercial_fee: f64,
    pub data_gaps: Vec<DataGap>,
}

impl CostBreakdown {
    /// Commodity plus renewable add-on.
    pub fn energy(&self) -> f64 {
        self.commodity + self.renewable
    }

    /// Excise plus VAT.
    pub fn taxes(&self) -> f64 {
        self.excise + self.vat
    }

    pub fn is_degraded(&self) -> bool {
        !self.data_gaps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CalculationError {
    #[error("offer {code} has a non-finite {field}")]
    InvalidOffer { code: String, field: &'static str },
    #[error("offer {code} produced a non-finite {component} amount")]
    NonFinite {
        code: String,
        component: &'static str,
    },
}

/// Stateless calculator over borrowed regulatory tables.
#[derive(Debug, Clone, Copy)]
pub struct TariffCostCalculator<'a> {
    parameters: &'a RegulatoryParameters,
    market_index: &'a MarketIndexAverages,
}

impl<'a> TariffCostCalculator<'a> {
    pub fn new(parameters: &'a RegulatoryParameters, market_index: &'a MarketIndexAverages) -> Self {
        Self {
            parameters,
            market_index,
        }
    }

    pub fn quote(
        &self,
        offer: &Offer,
        profile: &ConsumptionProfile,
    ) -> Result<CostBreakdown, CalculationError> {
        validate_offer(offer)?;

        let mut data_gaps = Vec::new();
        let commodity = stages::commodity(
            offer,
            profile,
            self.parameters,
            self.market_index,
            &mut data_gaps,
        );
        let renewable = stages::renewable(offer, profile);
        let materia_energia =
            stages::materia_energia(offer, profile, self.parameters, commodity + renewable);
        let fixed_fee = stages::fixed_commercial_fee(offer, &mut data_gaps);
        let commercialization =
            stages::commercialization(offer, fixed_fee, profile, self.parameters);
        let dispatching = stages::dispatching(profile, self.parameters);
        let network = stages::network(profile, self.parameters);
        let system_charges = stages::system_charges(profile, self.parameters);
        let excise_regime = stages::excise_regime(profile);
        let excise = stages::excise(excise_regime, profile, self.parameters);

        let taxable = materia_energia
            + commercialization
            + dispatching
            + network
            + system_charges
            + excise;
        let payable_annual = taxable * VAT_MULTIPLIER;

        let breakdown = CostBreakdown {
            commodity,
            renewable,
            materia_energia,
            commercialization,
            dispatching,
            network,
            system_charges,
            excise,
            excise_regime,
            taxable,
            vat: taxable * VAT_RATE,
            payable_annual,
            monthly: payable_annual / 12.0,
            fixed_commercial_fee: fixed_fee,
            data_gaps,
        };
        ensure_finite(&offer.code, &breakdown)?;
        Ok(breakdown)
    }
}

impl CostEstimator for TariffCostCalculator<'_> {
    fn estimate(
        &self,
        offer: &Offer,
        profile: &ConsumptionProfile,
    ) -> Result<CostBreakdown, CalculationError> {
        self.quote(offer, profile)
    }
}

fn validate_offer(offer: &Offer) -> Result<(), CalculationError> {
    let scalars = [
        ("fixed commercial fee", offer.fixed_commercial_fee),
        ("fixed renewable fee", offer.fixed_renewable_fee),
        ("power fee", offer.power_fee),
    ];
    let maps = [
        ("variable commercial fee", &offer.variable_commercial_fee),
        ("energy price", &offer.energy_price),
        ("spread", &offer.spread),
        ("renewable fee", &offer.renewable_fee),
    ];

    let invalid = scalars
        .iter()
        .find(|(_, value)| !value.is_finite())
        .map(|(field, _)| *field)
        .or_else(|| {
            maps.iter()
                .find(|(_, prices)| prices.values().any(|value| !value.is_finite()))
                .map(|(field, _)| *field)
        });

    match invalid {
        Some(field) => Err(CalculationError::InvalidOffer {
            code: offer.code.clone(),
            field,
        }),
        None => Ok(()),
    }
}

fn ensure_finite(code: &str, breakdown: &CostBreakdown) -> Result<(), CalculationError> {
    let components = [
        ("commodity", breakdown.commodity),
        ("renewable", breakdown.renewable),
        ("commercialization", breakdown.commercialization),
        ("dispatching", breakdown.dispatching),
        ("network", breakdown.network),
        ("system charges", breakdown.system_charges),
        ("excise", breakdown.excise),
        ("payable", breakdown.payable_annual),
    ];

    match components.iter().find(|(_, value)| !value.is_finite()) {
        Some((component, _)) => Err(CalculationError::NonFinite {
            code: code.to_string(),
            component: *component,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariffs::domain::{BandPrices, BandSplit, CustomerSegment, PriceType};
    use crate::tariffs::parameters::keys;

    fn domestic(kwh: f64, kw: f64) -> ConsumptionProfile {
        ConsumptionProfile::new(kwh, kw, CustomerSegment::Domestic, true, BandSplit::default())
            .expect("valid profile")
    }

    fn flat_offer(price: f64) -> Offer {
        let mut offer = Offer::new("Casa Flat", "FLAT", CustomerSegment::Domestic, PriceType::Fixed);
        offer.fixed_commercial_fee = 60.0;
        offer.energy_price = BandPrices::from([(Band::F0, price)]);
        offer
    }

    fn close(actual: f64, expected: f64) -> bool {
        (actual - expected).abs() < 1e-9
    }

    #[test]
    fn fixed_single_band_offer_with_empty_parameters() {
        let parameters = RegulatoryParameters::default();
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);

        let breakdown = calculator
            .quote(&flat_offer(0.15), &domestic(2000.0, 3.0))
            .expect("quote computes");

        assert!(close(breakdown.materia_energia, 300.0));
        assert!(close(breakdown.commercialization, 60.0));
        assert!(close(breakdown.taxable, 360.0));
        assert!(close(breakdown.payable_annual, 396.0));
        assert!(close(breakdown.monthly, 33.0));
        assert!(!breakdown.is_degraded());
    }

    #[test]
    fn payable_is_taxable_times_vat_multiplier() {
        let parameters = RegulatoryParameters::from_pairs([
            (keys::SIGMA1, 23.5),
            (keys::SIGMA3, 0.0091),
            (keys::EXCISE_RESIDENT_LOW_POWER, 0.0227),
        ]);
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);

        let breakdown = calculator
            .quote(&flat_offer(0.137), &domestic(3100.0, 3.0))
            .expect("quote computes");

        assert_eq!(breakdown.payable_annual, breakdown.taxable * VAT_MULTIPLIER);
        assert!(close(breakdown.taxes(), breakdown.excise + breakdown.taxable * 0.10));
    }

    #[test]
    fn variable_offer_prices_index_plus_spread_per_band() {
        let parameters = RegulatoryParameters::from_pairs([(keys::LAMBDA, 0.1)]);
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);

        let mut offer = Offer::new("Indicizzata", "VAR", CustomerSegment::Domestic, PriceType::Variable);
        offer.spread = BandPrices::from([(Band::F1, 0.02), (Band::F2, 0.01), (Band::F3, 0.0)]);

        let breakdown = calculator
            .quote(&offer, &domestic(2000.0, 3.0))
            .expect("quote computes");

        let expected = (0.12 * 1.1 + 0.02) * 660.0 + (0.11 * 1.1 + 0.01) * 660.0 + (0.10 * 1.1) * 680.0;
        assert!(close(breakdown.commodity, expected));
        assert!(close(breakdown.energy(), expected));
    }

    #[test]
    fn variable_offer_without_spread_is_degraded() {
        let parameters = RegulatoryParameters::default();
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let offer = Offer::new("Nuda", "NUDA", CustomerSegment::Domestic, PriceType::Variable);

        let breakdown = calculator
            .quote(&offer, &domestic(1000.0, 3.0))
            .expect("quote computes");

        assert_eq!(breakdown.data_gaps, vec![DataGap::SpreadUnavailable]);
        assert!(close(breakdown.commodity, 0.12 * 330.0 + 0.11 * 330.0 + 0.10 * 340.0));
    }

    #[test]
    fn fixed_offer_without_prices_uses_last_resort_price() {
        let parameters = RegulatoryParameters::default();
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let offer = Offer::new("Vuota", "EMPTY", CustomerSegment::Domestic, PriceType::Fixed);

        let breakdown = calculator
            .quote(&offer, &domestic(1000.0, 3.0))
            .expect("quote computes");

        assert!(close(breakdown.commodity, 150.0));
        assert_eq!(
            breakdown.data_gaps,
            vec![DataGap::EnergyPriceFallback {
                price: FALLBACK_ENERGY_PRICE
            }]
        );
    }

    #[test]
    fn resident_excise_allowance() {
        let parameters = RegulatoryParameters::from_pairs([(keys::EXCISE_RESIDENT_LOW_POWER, 0.0227)]);
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let offer = flat_offer(0.15);

        let below = calculator
            .quote(&offer, &domestic(1500.0, 3.0))
            .expect("quote computes");
        assert_eq!(below.excise, 0.0);
        assert_eq!(below.excise_regime, ExciseRegime::ResidentLowPower);

        let above = calculator
            .quote(&offer, &domestic(2000.0, 3.0))
            .expect("quote computes");
        assert!(close(above.excise, 0.0227 * 200.0));
    }

    #[test]
    fn business_excise_ignores_power() {
        let parameters = RegulatoryParameters::from_pairs([(keys::EXCISE_BUSINESS, 0.0125)]);
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let mut offer = flat_offer(0.15);
        offer.segment = CustomerSegment::Business;

        for kw in [3.0, 6.0, 15.0] {
            let profile = ConsumptionProfile::new(
                5000.0,
                kw,
                CustomerSegment::Business,
                false,
                BandSplit::default(),
            )
            .expect("valid profile");
            let breakdown = calculator.quote(&offer, &profile).expect("quote computes");
            assert!(close(breakdown.excise, 0.0125 * 5000.0));
            assert_eq!(breakdown.excise_regime, ExciseRegime::Business);
        }
    }

    #[test]
    fn non_finite_fee_is_rejected() {
        let parameters = RegulatoryParameters::default();
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let mut offer = flat_offer(0.15);
        offer.power_fee = f64::NAN;

        let error = calculator
            .quote(&offer, &domestic(2000.0, 3.0))
            .expect_err("nan fee is rejected");
        assert_eq!(
            error,
            CalculationError::InvalidOffer {
                code: "FLAT".to_string(),
                field: "power fee"
            }
        );
    }

    #[test]
    fn missing_fixed_fee_uses_fallback_and_is_degraded() {
        let parameters = RegulatoryParameters::default();
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let mut offer = flat_offer(0.15);
        offer.fixed_commercial_fee = 0.0;
        offer.fixed_fee_missing = true;

        let breakdown = calculator
            .quote(&offer, &domestic(2000.0, 3.0))
            .expect("quote computes");

        assert!(close(breakdown.commercialization, FALLBACK_FIXED_FEE));
        assert_eq!(breakdown.fixed_commercial_fee, FALLBACK_FIXED_FEE);
        assert!(close(breakdown.taxable, 300.0 + FALLBACK_FIXED_FEE));
        assert_eq!(
            breakdown.data_gaps,
            vec![DataGap::FixedFeeFallback {
                fee: FALLBACK_FIXED_FEE
            }]
        );
    }

    #[test]
    fn identical_inputs_give_identical_breakdowns() {
        let parameters = RegulatoryParameters::from_pairs([(keys::LAMBDA, 0.1), (keys::PPE, 0.002)]);
        let index = MarketIndexAverages::fallback();
        let calculator = TariffCostCalculator::new(&parameters, &index);
        let offer = flat_offer(0.14);
        let profile = domestic(2700.0, 3.0);

        assert_eq!(
            calculator.quote(&offer, &profile),
            calculator.quote(&offer, &profile)
        );
    }
}
