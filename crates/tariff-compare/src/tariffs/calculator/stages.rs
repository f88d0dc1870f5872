use super::{DataGap, ExciseRegime, FALLBACK_ENERGY_PRICE, FALLBACK_FIXED_FEE};
use crate::tariffs::domain::{Band, BandPrices, ConsumptionProfile, CustomerSegment, Offer, PriceType};
use crate::tariffs::market_index::MarketIndexAverages;
use crate::tariffs::parameters::{keys, RegulatoryParameters};

/// Residential allowance exempt from excise in the low-power resident regime.
pub const EXCISE_ALLOWANCE_KWH: f64 = 1800.0;
/// Committed power at or below which the resident excise allowance applies.
pub const LOW_POWER_LIMIT_KW: f64 = 3.0;

/// How far a per-band lookup may fall back when the exact band is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BandLookup {
    /// band, then its combined band, then F0
    Strict,
    /// as `Strict`, then the F1 price
    PeakFallback,
}

pub(crate) fn resolve_band(prices: &BandPrices, band: Band, lookup: BandLookup) -> Option<f64> {
    let found = prices
        .get(&band)
        .or_else(|| band.covering().and_then(|combined| prices.get(&combined)))
        .or_else(|| prices.get(&Band::F0));

    match (found, lookup) {
        (Some(price), _) => Some(*price),
        (None, BandLookup::PeakFallback) => prices.get(&Band::F1).copied(),
        (None, BandLookup::Strict) => None,
    }
}

/// Price applied to the whole consumption: the F0 entry, or the only entry.
fn flat_price(prices: &BandPrices) -> Option<f64> {
    if let Some(price) = prices.get(&Band::F0) {
        return Some(*price);
    }
    if prices.len() == 1 {
        return prices.values().next().copied();
    }
    None
}

/// Prices consumption against a per-band fee map.
///
/// A single-band (or F0) map applies to the total; otherwise each metered band
/// is priced on its share of consumption, with `missing` supplying the price for
/// bands the map cannot resolve.
pub(crate) fn banded_cost<F>(
    prices: &BandPrices,
    profile: &ConsumptionProfile,
    lookup: BandLookup,
    mut missing: F,
) -> f64
where
    F: FnMut(Band) -> f64,
{
    if let Some(price) = flat_price(prices) {
        return price * profile.annual_kwh();
    }

    profile
        .banded_consumption()
        .iter()
        .map(|slot| {
            let price =
                resolve_band(prices, slot.band, lookup).unwrap_or_else(|| missing(slot.band));
            price * slot.kwh
        })
        .sum()
}

/// Stage 1: commodity energy cost.
pub(crate) fn commodity(
    offer: &Offer,
    profile: &ConsumptionProfile,
    parameters: &RegulatoryParameters,
    index: &MarketIndexAverages,
    gaps: &mut Vec<DataGap>,
) -> f64 {
    match offer.price_type {
        PriceType::Fixed => {
            if offer.energy_price.is_empty() {
                gaps.push(DataGap::EnergyPriceFallback {
                    price: FALLBACK_ENERGY_PRICE,
                });
                return FALLBACK_ENERGY_PRICE * profile.annual_kwh();
            }

            banded_cost(
                &offer.energy_price,
                profile,
                BandLookup::PeakFallback,
                |band| {
                    gaps.push(DataGap::BandPriceFallback {
                        band,
                        price: FALLBACK_ENERGY_PRICE,
                    });
                    FALLBACK_ENERGY_PRICE
                },
            )
        }
        PriceType::Variable => {
            if offer.spread.is_empty() {
                gaps.push(DataGap::SpreadUnavailable);
            }

            let markup = 1.0 + parameters.get(keys::LAMBDA);
            profile
                .banded_consumption()
                .iter()
                .map(|slot| {
                    let spread = resolve_band(&offer.spread, slot.band, BandLookup::PeakFallback)
                        .unwrap_or(0.0);
                    let final_price = index.get(slot.band) * markup + spread;
                    final_price * slot.kwh
                })
                .sum()
        }
    }
}

/// Stage 2: volumetric renewable (FER) add-on.
pub(crate) fn renewable(offer: &Offer, profile: &ConsumptionProfile) -> f64 {
    banded_cost(&offer.renewable_fee, profile, BandLookup::Strict, |_| 0.0)
}

/// Stage 3: materia energia, the full commodity component of the bill.
pub(crate) fn materia_energia(
    offer: &Offer,
    profile: &ConsumptionProfile,
    parameters: &RegulatoryParameters,
    energy: f64,
) -> f64 {
    offer.fixed_renewable_fee
        + offer.power_fee * profile.committed_power_kw()
        + energy
        + parameters.get(keys::PPE) * profile.annual_kwh()
}

pub(crate) fn fixed_commercial_fee(offer: &Offer, gaps: &mut Vec<DataGap>) -> f64 {
    if offer.fixed_fee_missing {
        gaps.push(DataGap::FixedFeeFallback {
            fee: FALLBACK_FIXED_FEE,
        });
        return FALLBACK_FIXED_FEE;
    }
    offer.fixed_commercial_fee
}

/// Stage 4: commercialization (retail) cost.
pub(crate) fn commercialization(
    offer: &Offer,
    fixed_fee: f64,
    profile: &ConsumptionProfile,
    parameters: &RegulatoryParameters,
) -> f64 {
    let variable_fee = banded_cost(
        &offer.variable_commercial_fee,
        profile,
        BandLookup::Strict,
        |_| 0.0,
    );
    let dispatch_fee = if profile.is_domestic_resident() {
        parameters.get(keys::DISPATCH_DOMESTIC_RESIDENT)
    } else {
        parameters.get(keys::DISPATCH_OTHER)
    };

    fixed_fee + variable_fee + parameters.get(keys::PCV) + dispatch_fee
}

/// Stage 5: dispatching cost.
pub(crate) fn dispatching(profile: &ConsumptionProfile, parameters: &RegulatoryParameters) -> f64 {
    parameters.get(keys::DISPATCHING)
        * (1.0 + parameters.get(keys::LAMBDA))
        * profile.annual_kwh()
}

/// Stage 6: network (transport and metering) cost.
pub(crate) fn network(profile: &ConsumptionProfile, parameters: &RegulatoryParameters) -> f64 {
    let per_kw = parameters.get(keys::SIGMA2) + parameters.get(keys::UC6_POWER);
    let per_kwh = parameters.get(keys::SIGMA3)
        + parameters.get(keys::UC3)
        + parameters.get(keys::UC6_ENERGY);

    parameters.get(keys::SIGMA1)
        + per_kw * profile.committed_power_kw()
        + per_kwh * profile.annual_kwh()
}

/// Stage 7: general system charges.
pub(crate) fn system_charges(
    profile: &ConsumptionProfile,
    parameters: &RegulatoryParameters,
) -> f64 {
    if profile.is_domestic_resident() {
        (parameters.get(keys::ASOS_RESIDENT) + parameters.get(keys::ARIM_RESIDENT))
            * profile.annual_kwh()
    } else {
        let fixed = parameters.get(keys::ASOS_FIXED) + parameters.get(keys::ARIM_FIXED);
        let per_kwh = parameters.get(keys::ASOS_VARIABLE) + parameters.get(keys::ARIM_VARIABLE);
        fixed + per_kwh * profile.annual_kwh()
    }
}

pub(crate) fn excise_regime(profile: &ConsumptionProfile) -> ExciseRegime {
    match profile.segment() {
        CustomerSegment::Domestic
            if profile.is_resident() && profile.committed_power_kw() <= LOW_POWER_LIMIT_KW =>
        {
            ExciseRegime::ResidentLowPower
        }
        CustomerSegment::Domestic => ExciseRegime::DomesticOther,
        CustomerSegment::Business => ExciseRegime::Business,
    }
}

/// Stage 8: excise duty.
pub(crate) fn excise(
    regime: ExciseRegime,
    profile: &ConsumptionProfile,
    parameters: &RegulatoryParameters,
) -> f64 {
    let kwh = profile.annual_kwh();
    match regime {
        ExciseRegime::ResidentLowPower => {
            parameters.get(keys::EXCISE_RESIDENT_LOW_POWER)
                * (kwh - EXCISE_ALLOWANCE_KWH).max(0.0)
        }
        ExciseRegime::Business => parameters.get(keys::EXCISE_BUSINESS) * kwh,
        ExciseRegime::DomesticOther => parameters.get(keys::EXCISE_DOMESTIC_OTHER) * kwh,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tariffs::domain::BandSplit;

    fn profile(kwh: f64, kw: f64, segment: CustomerSegment, resident: bool) -> ConsumptionProfile {
        ConsumptionProfile::new(kwh, kw, segment, resident, BandSplit::default())
            .expect("valid profile")
    }

    fn prices(entries: &[(Band, f64)]) -> BandPrices {
        entries.iter().copied().collect()
    }

    #[test]
    fn combined_band_covers_f2_and_f3() {
        let map = prices(&[(Band::F1, 0.2), (Band::F23, 0.1)]);
        assert_eq!(resolve_band(&map, Band::F2, BandLookup::Strict), Some(0.1));
        assert_eq!(resolve_band(&map, Band::F3, BandLookup::Strict), Some(0.1));
        assert_eq!(resolve_band(&map, Band::F1, BandLookup::Strict), Some(0.2));
    }

    #[test]
    fn peak_fallback_only_when_requested() {
        let map = prices(&[(Band::F1, 0.2), (Band::F2, 0.1)]);
        assert_eq!(resolve_band(&map, Band::F3, BandLookup::Strict), None);
        assert_eq!(
            resolve_band(&map, Band::F3, BandLookup::PeakFallback),
            Some(0.2)
        );
    }

    #[test]
    fn f0_entry_prices_whole_consumption() {
        let consumer = profile(1000.0, 3.0, CustomerSegment::Domestic, true);
        let map = prices(&[(Band::F1, 0.5), (Band::F0, 0.1)]);
        let cost = banded_cost(&map, &consumer, BandLookup::Strict, |_| 0.0);
        assert!((cost - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_fee_map_costs_nothing() {
        let consumer = profile(1000.0, 3.0, CustomerSegment::Domestic, true);
        let cost = banded_cost(&BandPrices::new(), &consumer, BandLookup::Strict, |_| 0.0);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn fixed_offer_missing_band_uses_flagged_fallback() {
        let consumer = profile(1000.0, 3.0, CustomerSegment::Domestic, true);
        let mut offer = Offer::new("Parziale", "P1", CustomerSegment::Domestic, PriceType::Fixed);
        offer.energy_price = prices(&[(Band::F2, 0.1), (Band::F3, 0.1)]);

        let mut gaps = Vec::new();
        let cost = commodity(
            &offer,
            &consumer,
            &RegulatoryParameters::default(),
            &MarketIndexAverages::fallback(),
            &mut gaps,
        );

        let expected = 330.0 * FALLBACK_ENERGY_PRICE + 330.0 * 0.1 + 340.0 * 0.1;
        assert!((cost - expected).abs() < 1e-9);
        assert_eq!(
            gaps,
            vec![DataGap::BandPriceFallback {
                band: Band::F1,
                price: FALLBACK_ENERGY_PRICE
            }]
        );
    }

    #[test]
    fn excise_regimes_are_mutually_exclusive() {
        assert_eq!(
            excise_regime(&profile(2000.0, 3.0, CustomerSegment::Domestic, true)),
            ExciseRegime::ResidentLowPower
        );
        assert_eq!(
            excise_regime(&profile(2000.0, 4.5, CustomerSegment::Domestic, true)),
            ExciseRegime::DomesticOther
        );
        assert_eq!(
            excise_regime(&profile(2000.0, 3.0, CustomerSegment::Domestic, false)),
            ExciseRegime::DomesticOther
        );
        assert_eq!(
            excise_regime(&profile(2000.0, 3.0, CustomerSegment::Business, true)),
            ExciseRegime::Business
        );
    }

    #[test]
    fn network_and_system_charges_follow_parameters() {
        let parameters = RegulatoryParameters::from_pairs([
            (keys::SIGMA1, 20.0),
            (keys::SIGMA2, 20.0),
            (keys::UC6_POWER, 1.0),
            (keys::SIGMA3, 0.01),
            (keys::UC3, 0.001),
            (keys::UC6_ENERGY, 0.0001),
            (keys::ASOS_RESIDENT, 0.02),
            (keys::ARIM_RESIDENT, 0.003),
            (keys::ASOS_FIXED, 50.0),
            (keys::ARIM_FIXED, 5.0),
            (keys::ASOS_VARIABLE, 0.03),
            (keys::ARIM_VARIABLE, 0.004),
        ]);

        let resident = profile(1000.0, 3.0, CustomerSegment::Domestic, true);
        assert!((network(&resident, &parameters) - (20.0 + 21.0 * 3.0 + 0.0111 * 1000.0)).abs() < 1e-9);
        assert!((system_charges(&resident, &parameters) - 23.0).abs() < 1e-9);

        let second_home = profile(1000.0, 3.0, CustomerSegment::Domestic, false);
        assert!((system_charges(&second_home, &parameters) - (55.0 + 34.0)).abs() < 1e-9);
    }
}
