mod views;

pub use views::{CostBreakdownView, OfferQuoteView, RankedOfferView, RankingReport};

use crate::tariffs::calculator::CostBreakdown;
use crate::tariffs::domain::Offer;
use crate::tariffs::market_index::MarketIndexAverages;
use crate::tariffs::ranking::{RankingOptions, RankingOutcome};

/// Rounds a euro amount to cents. Only applied at the output boundary.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl From<&CostBreakdown> for CostBreakdownView {
    fn from(breakdown: &CostBreakdown) -> Self {
        Self {
            commodity: round_currency(breakdown.commodity),
            renewable: round_currency(breakdown.renewable),
            energy: round_currency(breakdown.energy()),
            materia_energia: round_currency(breakdown.materia_energia),
            commercialization: round_currency(breakdown.commercialization),
            dispatching: round_currency(breakdown.dispatching),
            network: round_currency(breakdown.network),
            system_charges: round_currency(breakdown.system_charges),
            excise: round_currency(breakdown.excise),
            excise_regime: breakdown.excise_regime,
            excise_regime_label: breakdown.excise_regime.label(),
            taxable: round_currency(breakdown.taxable),
            vat: round_currency(breakdown.vat),
            taxes: round_currency(breakdown.taxes()),
            payable_annual: round_currency(breakdown.payable_annual),
            monthly: round_currency(breakdown.monthly),
            fixed_commercial_fee: round_currency(breakdown.fixed_commercial_fee),
            degraded: breakdown.is_degraded(),
            data_gaps: breakdown.data_gaps.iter().map(|gap| gap.describe()).collect(),
        }
    }
}

pub fn quote_view(offer: &Offer, breakdown: &CostBreakdown) -> OfferQuoteView {
    OfferQuoteView {
        name: offer.name.clone(),
        code: offer.code.clone(),
        url: offer.url.clone(),
        segment: offer.segment,
        segment_label: offer.segment.label(),
        price_type: offer.price_type,
        price_type_label: offer.price_type.label(),
        breakdown: CostBreakdownView::from(breakdown),
    }
}

pub fn ranking_report(
    outcome: &RankingOutcome<'_>,
    options: &RankingOptions,
    market_index: &MarketIndexAverages,
) -> RankingReport {
    match outcome {
        RankingOutcome::NoOffersForSegment(segment) => RankingReport::NoOffersForSegment {
            segment: *segment,
            segment_label: segment.label(),
        },
        RankingOutcome::Ranked(ranked) => RankingReport::Ranked {
            segment: ranked.segment,
            segment_label: ranked.segment.label(),
            baseline_annual: options
                .baseline
                .map(|baseline| round_currency(baseline.annual())),
            evaluated: ranked.evaluated,
            market_index: market_index.source,
            offers: ranked
                .results
                .iter()
                .enumerate()
                .map(|(idx, result)| RankedOfferView {
                    position: idx + 1,
                    quote: quote_view(result.offer, &result.breakdown),
                    savings: result.savings.map(round_currency),
                    savings_pct: result.savings_pct.map(|pct| (pct * 10.0).round() / 10.0),
                    score: (result.score * 10.0).round() / 10.0,
                    recommended: result.recommended,
                })
                .collect(),
            skipped: ranked.skipped.clone(),
        },
    }
}
