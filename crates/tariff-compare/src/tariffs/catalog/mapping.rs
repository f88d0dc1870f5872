use super::document::{FeeComponentNode, OfferNode, PriceIntervalNode};
use crate::tariffs::domain::{Band, CustomerSegment, Offer, PriceType};
use crate::tariffs::normalizer::decimal_or_zero;

const UNKNOWN_OFFER_NAME: &str = "Sconosciuto";

/// Raw fixed fees above this magnitude are taken to be annual already.
pub(crate) const ANNUAL_FEE_THRESHOLD: f64 = 20.0;

/// Fee component family, from the feed's `MACROAREA` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MacroArea {
    FixedCommercial,
    VariableCommercial,
    Energy,
    Renewable,
    Other,
}

impl MacroArea {
    fn from_code(code: &str) -> Self {
        match code.trim() {
            "01" => Self::FixedCommercial,
            "02" => Self::VariableCommercial,
            "04" => Self::Energy,
            "06" => Self::Renewable,
            _ => Self::Other,
        }
    }
}

/// Unit of measure attached to a price interval (`UNITA_MISURA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    PerUnit,
    PerKw,
    PerKwh,
    Other,
}

impl Unit {
    fn from_code(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            Some("01") => Self::PerUnit,
            Some("02") => Self::PerKw,
            Some("03") => Self::PerKwh,
            _ => Self::Other,
        }
    }
}

/// Converts a raw fixed fee to an annual amount.
///
/// The feed does not annotate monthly versus annual fixed fees consistently,
/// so the magnitude decides: values above [`ANNUAL_FEE_THRESHOLD`] are kept,
/// smaller ones are treated as monthly and multiplied by 12. An annual fee of
/// 20 EUR or less is therefore overstated twelvefold.
pub fn normalize_periodic_fee(raw: f64) -> f64 {
    if raw > ANNUAL_FEE_THRESHOLD {
        raw
    } else {
        raw * 12.0
    }
}

pub(crate) fn offer_from_node(node: OfferNode) -> Offer {
    let price_type = if node.is_index_linked() {
        PriceType::Variable
    } else {
        PriceType::Fixed
    };
    let segment = CustomerSegment::from_code(node.customer_type.as_deref());

    let mut offer = Offer::new(
        node.name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_OFFER_NAME.to_string()),
        node.code.unwrap_or_default(),
        segment,
        price_type,
    );
    offer.url = node.url.filter(|url| !url.is_empty());

    for component in &node.components {
        apply_component(&mut offer, component);
    }

    offer
}

fn apply_component(offer: &mut Offer, component: &FeeComponentNode) {
    let Some(code) = component.macro_area.as_deref().filter(|code| !code.is_empty()) else {
        return;
    };
    let area = MacroArea::from_code(code);

    for interval in &component.intervals {
        apply_interval(offer, area, interval);
    }
}

fn apply_interval(offer: &mut Offer, area: MacroArea, interval: &PriceIntervalNode) {
    let price = decimal_or_zero(interval.price.as_deref());
    let unit = Unit::from_code(interval.unit.as_deref());
    let band = Band::from_code(interval.band.as_deref());

    match (area, unit) {
        (MacroArea::FixedCommercial, _) => {
            offer.fixed_commercial_fee += normalize_periodic_fee(price);
        }
        (MacroArea::VariableCommercial, Unit::PerKwh) => {
            offer.variable_commercial_fee.insert(band, price);
        }
        (MacroArea::Energy, Unit::PerKwh) => match offer.price_type {
            PriceType::Variable => {
                offer.spread.insert(band, price);
            }
            PriceType::Fixed => {
                offer.energy_price.insert(band, price);
            }
        },
        (MacroArea::Energy, Unit::PerKw) => {
            offer.power_fee += price;
        }
        (MacroArea::Renewable, Unit::PerUnit) => {
            offer.fixed_renewable_fee += normalize_periodic_fee(price);
        }
        (MacroArea::Renewable, Unit::PerKwh) => {
            offer.renewable_fee.insert(band, price);
        }
        _ => {}
    }
}
