use std::path::PathBuf;
use tariff_compare::tariffs::{
    Band, CatalogError, CustomerSegment, OfferCatalog, PriceType,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn regulator_feed_maps_every_offer() {
    let data = include_bytes!("fixtures/offers.xml");
    let catalog = OfferCatalog::from_reader(&data[..]).expect("feed parses");

    assert_eq!(catalog.len(), 5);
    assert_eq!(catalog.for_segment(CustomerSegment::Domestic).count(), 4);
    assert_eq!(catalog.for_segment(CustomerSegment::Business).count(), 1);

    let tri = catalog.find("DOM-FIX-TRI").expect("three-band offer present");
    assert_eq!(tri.name, "Luce & Casa Tre Fasce");
    assert_eq!(
        tri.url.as_deref(),
        Some("https://offerte.example.it/luce-casa-tre-fasce")
    );
    assert_eq!(tri.price_type, PriceType::Fixed);
    assert_eq!(tri.fixed_commercial_fee, 8.5 * 12.0);
    assert_eq!(tri.fixed_renewable_fee, 12.0);
    assert_eq!(tri.energy_price[&Band::F1], 0.14);
    assert_eq!(tri.energy_price[&Band::F3], 0.10);
    assert_eq!(tri.renewable_fee[&Band::F0], 0.002);
    assert!(tri.spread.is_empty());
}

#[test]
fn fee_magnitudes_and_units_are_normalized() {
    let catalog = OfferCatalog::from_path(fixture("offers.xml")).expect("feed parses");

    let mono = catalog.find("DOM-FIX-MONO").expect("single-rate offer present");
    assert_eq!(mono.fixed_commercial_fee, 96.0);
    assert_eq!(mono.power_fee, 12.0);
    assert_eq!(mono.energy_price.len(), 1);
    assert_eq!(mono.energy_price[&Band::F0], 0.13);

    let business = catalog.find("BIZ-FIX").expect("business offer present");
    assert_eq!(business.segment, CustomerSegment::Business);
    assert_eq!(business.fixed_commercial_fee, 180.0);
}

#[test]
fn index_linked_offers_carry_spreads() {
    let catalog = OfferCatalog::from_path(fixture("offers.xml")).expect("feed parses");

    let variable = catalog.find("DOM-VAR").expect("variable offer present");
    assert_eq!(variable.price_type, PriceType::Variable);
    assert_eq!(variable.spread[&Band::F1], 0.015);
    assert_eq!(variable.spread[&Band::F23], 0.010);
    assert_eq!(variable.variable_commercial_fee[&Band::F0], 0.004);
    assert!(variable.energy_price.is_empty());

    let bare = catalog.find("DOM-VAR-NUDA").expect("offer without spread present");
    assert_eq!(bare.price_type, PriceType::Variable);
    assert!(bare.spread.is_empty());
}

#[test]
fn latin1_feed_is_decoded() {
    let mut bytes = b"<Offerte><offerta><NOME_OFFERTA>Citt".to_vec();
    bytes.push(0xE0);
    bytes.extend_from_slice(b" Luce</NOME_OFFERTA><COD_OFFERTA>L1</COD_OFFERTA></offerta></Offerte>");

    let catalog = OfferCatalog::from_reader(&bytes[..]).expect("latin-1 feed parses");
    assert_eq!(catalog.offers()[0].name, "Città Luce");
}

#[test]
fn malformed_feed_is_rejected_whole() {
    let xml = "<Offerte><offerta><COD_OFFERTA>A</COD_OFFERTA></offerta><offerta><COD_OFFERTA>B</Offerte>";
    let error = OfferCatalog::from_xml(xml).expect_err("mismatched tags are rejected");
    assert!(matches!(
        error,
        CatalogError::Xml { .. } | CatalogError::UnclosedElement(_)
    ));
}

#[test]
fn placet_export_loads_alongside_xml_feed() {
    let catalog = OfferCatalog::from_placet_path(fixture("placet.csv")).expect("export parses");

    assert_eq!(catalog.len(), 4);
    let fixed = catalog.find("PLF-01").expect("fixed PLACET offer");
    assert_eq!(fixed.name, "Fornitore Uno - Placet Fissa");
    assert_eq!(fixed.fixed_commercial_fee, 90.0);
    assert_eq!(fixed.energy_price[&Band::F2], 0.125);

    let variable = catalog.find("PLV-01").expect("variable PLACET offer");
    assert_eq!(variable.price_type, PriceType::Variable);
    assert_eq!(variable.fixed_commercial_fee, 84.0);
    assert_eq!(variable.spread[&Band::F23], 0.008);

    let business = catalog.find("PLB-02").expect("business PLACET offer");
    assert_eq!(business.segment, CustomerSegment::Business);
}
