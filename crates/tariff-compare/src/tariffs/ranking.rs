use crate::tariffs::calculator::{CalculationError, CostBreakdown};
use crate::tariffs::catalog::OfferCatalog;
use crate::tariffs::domain::{ConsumptionProfile, CustomerSegment, Offer};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use tracing::{info, warn};

/// Annual savings (EUR) above which an offer is flagged as recommended.
pub const RECOMMENDATION_THRESHOLD: f64 = 100.0;
const NEUTRAL_SCORE: f64 = 50.0;
const DEFAULT_TOP: usize = 10;

/// Anything able to price an offer for a consumer.
pub trait CostEstimator: Send + Sync {
    fn estimate(
        &self,
        offer: &Offer,
        profile: &ConsumptionProfile,
    ) -> Result<CostBreakdown, CalculationError>;
}

/// What the consumer pays today.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "period", content = "amount", rename_all = "snake_case")]
pub enum Baseline {
    Annual(f64),
    Monthly(f64),
}

impl Baseline {
    pub fn annual(self) -> f64 {
        match self {
            Self::Annual(amount) => amount,
            Self::Monthly(amount) => amount * 12.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultLimit {
    All,
    Top(usize),
}

impl Default for ResultLimit {
    fn default() -> Self {
        Self::Top(DEFAULT_TOP)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RankingOptions {
    pub baseline: Option<Baseline>,
    pub limit: ResultLimit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<'a> {
    pub offer: &'a Offer,
    pub breakdown: CostBreakdown,
    pub savings: Option<f64>,
    pub savings_pct: Option<f64>,
    pub score: f64,
    pub recommended: bool,
}

/// An offer left out of the ranking because it could not be priced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedOffer {
    pub code: String,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedOffers<'a> {
    pub segment: CustomerSegment,
    pub results: Vec<RankedResult<'a>>,
    /// Offers of the segment that were priced, before truncation.
    pub evaluated: usize,
    pub skipped: Vec<SkippedOffer>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RankingOutcome<'a> {
    NoOffersForSegment(CustomerSegment),
    Ranked(RankedOffers<'a>),
}

impl<'a> RankingOutcome<'a> {
    pub fn ranked(&self) -> Option<&RankedOffers<'a>> {
        match self {
            Self::Ranked(ranked) => Some(ranked),
            Self::NoOffersForSegment(_) => None,
        }
    }
}

/// Prices every offer of the consumer's segment and orders them by savings.
#[derive(Debug, Clone)]
pub struct OfferRanker<E> {
    estimator: E,
}

impl<E: CostEstimator> OfferRanker<E> {
    pub fn new(estimator: E) -> Self {
        Self { estimator }
    }

    pub fn rank<'a>(
        &self,
        catalog: &'a OfferCatalog,
        profile: &ConsumptionProfile,
        options: &RankingOptions,
    ) -> RankingOutcome<'a> {
        let segment = profile.segment();
        let candidates: Vec<&'a Offer> = catalog.for_segment(segment).collect();
        if candidates.is_empty() {
            info!(segment = segment.label(), "no offers available for segment");
            return RankingOutcome::NoOffersForSegment(segment);
        }

        let quotes: Vec<(&'a Offer, Result<CostBreakdown, CalculationError>)> = candidates
            .par_iter()
            .map(|offer| (*offer, self.estimator.estimate(offer, profile)))
            .collect();

        let baseline = options.baseline.map(Baseline::annual);
        let mut results = Vec::with_capacity(quotes.len());
        let mut skipped = Vec::new();

        for (offer, quote) in quotes {
            match quote {
                Ok(breakdown) => results.push(ranked_entry(offer, breakdown, baseline)),
                Err(error) => {
                    warn!(
                        offer_code = %offer.code,
                        offer_name = %offer.name,
                        %error,
                        "skipping offer that could not be priced"
                    );
                    skipped.push(SkippedOffer {
                        code: offer.code.clone(),
                        name: offer.name.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }

        results.sort_by(compare_results);
        let evaluated = results.len();
        if let ResultLimit::Top(limit) = options.limit {
            results.truncate(limit);
        }

        info!(
            segment = segment.label(),
            candidates = candidates.len(),
            evaluated,
            returned = results.len(),
            skipped = skipped.len(),
            "ranked offers"
        );

        RankingOutcome::Ranked(RankedOffers {
            segment,
            results,
            evaluated,
            skipped,
        })
    }
}

fn ranked_entry(offer: &Offer, breakdown: CostBreakdown, baseline: Option<f64>) -> RankedResult<'_> {
    let savings = baseline.map(|annual| annual - breakdown.payable_annual);
    let savings_pct = baseline.zip(savings).map(|(annual, saved)| {
        if annual > 0.0 {
            saved / annual * 100.0
        } else {
            0.0
        }
    });
    let score = savings
        .map(|saved| (NEUTRAL_SCORE + saved / 10.0).clamp(0.0, 100.0))
        .unwrap_or(NEUTRAL_SCORE);
    let recommended = savings.is_some_and(|saved| saved > RECOMMENDATION_THRESHOLD);

    RankedResult {
        offer,
        breakdown,
        savings,
        savings_pct,
        score,
        recommended,
    }
}

fn compare_results(a: &RankedResult<'_>, b: &RankedResult<'_>) -> Ordering {
    let by_savings = match (a.savings, b.savings) {
        (Some(left), Some(right)) => right.total_cmp(&left),
        _ => Ordering::Equal,
    };

    by_savings
        .then_with(|| {
            a.breakdown
                .payable_annual
                .total_cmp(&b.breakdown.payable_annual)
        })
        .then_with(|| a.offer.code.cmp(&b.offer.code))
        .then_with(|| a.offer.name.cmp(&b.offer.name))
}
