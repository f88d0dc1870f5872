use crate::infra::{build_profile, ranking_options};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use tariff_compare::config::{AppConfig, TariffDataConfig};
use tariff_compare::error::AppError;
use tariff_compare::tariffs::domain::{TYPICAL_ANNUAL_KWH, TYPICAL_POWER_KW};
use tariff_compare::tariffs::report::{
    quote_view, ranking_report, CostBreakdownView, OfferQuoteView, RankingReport,
};
use tariff_compare::tariffs::{ConsumptionProfile, CustomerSegment, IndexSource, TariffDataset};
use tariff_compare::telemetry;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub(crate) enum SegmentArg {
    #[default]
    Domestic,
    Business,
}

impl From<SegmentArg> for CustomerSegment {
    fn from(value: SegmentArg) -> Self {
        match value {
            SegmentArg::Domestic => CustomerSegment::Domestic,
            SegmentArg::Business => CustomerSegment::Business,
        }
    }
}

#[derive(Args, Debug)]
pub(crate) struct DataArgs {
    /// Offer catalog (XML feed, or PLACET export when it ends in .csv)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Regulatory parameter table (CSV)
    #[arg(long)]
    pub(crate) parameters: Option<PathBuf>,
    /// Daily market index series (semicolon CSV)
    #[arg(long)]
    pub(crate) market_index: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct ProfileArgs {
    /// Annual consumption in kWh
    #[arg(long, default_value_t = TYPICAL_ANNUAL_KWH)]
    pub(crate) consumption: f64,
    /// Committed power in kW
    #[arg(long, default_value_t = TYPICAL_POWER_KW)]
    pub(crate) power: f64,
    #[arg(long, value_enum, default_value_t = SegmentArg::Domestic)]
    pub(crate) segment: SegmentArg,
    /// The supply point is not the consumer's residence
    #[arg(long)]
    pub(crate) non_resident: bool,
    /// F1,F2,F3 consumption shares (defaults to TARIFF_BAND_SPLIT)
    #[arg(long)]
    pub(crate) split: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    #[command(flatten)]
    pub(crate) profile: ProfileArgs,
    #[command(flatten)]
    pub(crate) data: DataArgs,
    /// What the consumer pays today per year (EUR)
    #[arg(long, conflicts_with = "baseline_monthly")]
    pub(crate) baseline_annual: Option<f64>,
    /// What the consumer pays today per month (EUR)
    #[arg(long)]
    pub(crate) baseline_monthly: Option<f64>,
    /// Number of offers to print
    #[arg(long, conflicts_with = "all")]
    pub(crate) top: Option<usize>,
    /// Print every ranked offer
    #[arg(long)]
    pub(crate) all: bool,
    /// Emit JSON instead of a text listing
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Offer code (COD_OFFERTA)
    #[arg(long)]
    pub(crate) code: String,
    #[command(flatten)]
    pub(crate) profile: ProfileArgs,
    #[command(flatten)]
    pub(crate) data: DataArgs,
    /// Emit JSON instead of a text listing
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_rank(args: RankArgs) -> Result<(), AppError> {
    let RankArgs {
        profile,
        data,
        baseline_annual,
        baseline_monthly,
        top,
        all,
        json,
    } = args;

    let dataset = load_dataset(data)?;
    let profile = consumption_profile(&profile, &dataset)?;
    let options = ranking_options(baseline_annual, baseline_monthly, top, all);

    let outcome = dataset.rank(&profile, &options);
    let report = ranking_report(&outcome, &options, &dataset.market_index);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_ranking(&profile, &report);
    }
    Ok(())
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        code,
        profile,
        data,
        json,
    } = args;

    let dataset = load_dataset(data)?;
    let profile = consumption_profile(&profile, &dataset)?;
    let (offer, breakdown) = dataset.quote(&code, &profile)?;
    let view = quote_view(offer, &breakdown);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        render_quote(&view);
    }
    Ok(())
}

fn load_dataset(args: DataArgs) -> Result<TariffDataset, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let TariffDataConfig {
        catalog_path,
        parameters_path,
        market_index_path,
        band_split,
    } = config.data;

    let data = TariffDataConfig {
        catalog_path: args.catalog.unwrap_or(catalog_path),
        parameters_path: args.parameters.unwrap_or(parameters_path),
        market_index_path: args.market_index.or(market_index_path),
        band_split,
    };
    Ok(TariffDataset::load(&data)?)
}

fn consumption_profile(
    args: &ProfileArgs,
    dataset: &TariffDataset,
) -> Result<ConsumptionProfile, AppError> {
    Ok(build_profile(
        args.consumption,
        args.power,
        args.segment.into(),
        !args.non_resident,
        args.split.as_deref(),
        dataset.band_split,
    )?)
}

fn render_ranking(profile: &ConsumptionProfile, report: &RankingReport) {
    println!(
        "Offer ranking for {:.0} kWh/year at {:.1} kW ({}{})",
        profile.annual_kwh(),
        profile.committed_power_kw(),
        profile.segment().label(),
        if profile.is_resident() { ", resident" } else { "" }
    );

    match report {
        RankingReport::NoOffersForSegment { segment_label, .. } => {
            println!("No offers available for segment {}", segment_label);
        }
        RankingReport::Ranked {
            baseline_annual,
            evaluated,
            market_index,
            offers,
            skipped,
            ..
        } => {
            println!("- {} offers priced | market index: {}", evaluated, describe_index(market_index));
            if let Some(baseline) = baseline_annual {
                println!("- Current spend: {:.2} EUR/year", baseline);
            }

            for entry in offers {
                let quote = &entry.quote;
                println!(
                    "{:>3}. {} [{}] {} | {:.2} EUR/year ({:.2} EUR/month)",
                    entry.position,
                    quote.name,
                    quote.code,
                    quote.price_type_label,
                    quote.breakdown.payable_annual,
                    quote.breakdown.monthly
                );
                if let Some(savings) = entry.savings {
                    println!(
                        "     savings {:.2} EUR ({:.1}%) | score {:.1}{}",
                        savings,
                        entry.savings_pct.unwrap_or(0.0),
                        entry.score,
                        if entry.recommended { " | recommended" } else { "" }
                    );
                }
                for gap in &quote.breakdown.data_gaps {
                    println!("     note: {}", gap);
                }
            }

            if !skipped.is_empty() {
                println!("Skipped offers:");
                for offer in skipped {
                    println!("  - {} [{}]: {}", offer.name, offer.code, offer.reason);
                }
            }
        }
    }
}

fn render_quote(view: &OfferQuoteView) {
    println!("{} [{}] {} / {}", view.name, view.code, view.segment_label, view.price_type_label);
    if let Some(url) = &view.url {
        println!("{}", url);
    }
    render_breakdown(&view.breakdown);
}

fn render_breakdown(breakdown: &CostBreakdownView) {
    let lines = [
        ("Materia energia", breakdown.materia_energia),
        ("  of which energy", breakdown.energy),
        ("Commercialization", breakdown.commercialization),
        ("Dispatching", breakdown.dispatching),
        ("Network", breakdown.network),
        ("System charges", breakdown.system_charges),
        ("Excise", breakdown.excise),
        ("Taxable", breakdown.taxable),
        ("VAT", breakdown.vat),
        ("Annual total", breakdown.payable_annual),
        ("Monthly", breakdown.monthly),
    ];
    for (label, amount) in lines {
        println!("  {:<20} {:>10.2} EUR", label, amount);
    }
    println!("  Excise regime: {}", breakdown.excise_regime_label);
    for gap in &breakdown.data_gaps {
        println!("  note: {}", gap);
    }
}

fn describe_index(source: &IndexSource) -> String {
    match source {
        IndexSource::Series {
            days,
            first_day,
            last_day,
        } => match (first_day, last_day) {
            (Some(first), Some(last)) => format!("{} days ({} to {})", days, first, last),
            _ => format!("{} days", days),
        },
        IndexSource::Fallback => "fallback averages".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_description_covers_fallback_and_series() {
        assert_eq!(describe_index(&IndexSource::Fallback), "fallback averages");
        let series = IndexSource::Series {
            days: 31,
            first_day: None,
            last_day: None,
        };
        assert_eq!(describe_index(&series), "31 days");
    }

    #[test]
    fn segment_argument_maps_to_customer_segment() {
        assert_eq!(CustomerSegment::from(SegmentArg::Business), CustomerSegment::Business);
        assert_eq!(CustomerSegment::from(SegmentArg::default()), CustomerSegment::Domestic);
    }
}
