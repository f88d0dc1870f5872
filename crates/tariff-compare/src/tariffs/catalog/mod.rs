mod document;
mod mapping;
pub mod placet;

use crate::tariffs::domain::{CustomerSegment, Offer};
use crate::tariffs::normalizer::decode_document;
use std::io::Read;
use std::path::Path;
use tracing::debug;

pub use mapping::normalize_periodic_fee;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read offer catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed offer catalog near byte {position}: {source}")]
    Xml {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
    #[error("offer catalog has no root element")]
    MissingRoot,
    #[error("offer catalog ends inside element <{0}>")]
    UnclosedElement(String),
    #[error("offer catalog contains an element name that is not valid UTF-8")]
    InvalidElementName,
    #[error("invalid PLACET CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("PLACET export lacks the supplier and offer name columns (found headers: {0:?})")]
    MissingColumns(Vec<String>),
}

/// Immutable set of offers loaded from one feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferCatalog {
    offers: Vec<Offer>,
}

impl OfferCatalog {
    pub fn new(offers: Vec<Offer>) -> Self {
        Self { offers }
    }

    /// Reads the regulator's XML offer feed. The whole document is rejected if malformed.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, CatalogError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_xml(&decode_document(&bytes))
    }

    pub fn from_xml(xml: &str) -> Result<Self, CatalogError> {
        let nodes = document::parse_document(xml)?;
        let offers: Vec<Offer> = nodes.into_iter().map(mapping::offer_from_node).collect();
        debug!(offers = offers.len(), "parsed offer catalog");
        Ok(Self { offers })
    }

    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn for_segment(&self, segment: CustomerSegment) -> impl Iterator<Item = &Offer> + '_ {
        self.offers
            .iter()
            .filter(move |offer| offer.segment == segment)
    }

    pub fn find(&self, code: &str) -> Option<&Offer> {
        self.offers.iter().find(|offer| offer.code == code)
    }
}
