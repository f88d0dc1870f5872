//! Schema-aware reader for the regulator's offer feed.
//!
//! The namespace prefix is resolved once from the root element; every other
//! element is matched by its local name under that prefix. The reader builds a
//! small typed tree (`OfferNode` → `FeeComponentNode` → `PriceIntervalNode`)
//! that the mapping layer turns into [`Offer`](crate::tariffs::Offer) values.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::CatalogError;

const OFFER: &str = "offerta";
const OFFER_NAME: &str = "NOME_OFFERTA";
const OFFER_CODE: &str = "COD_OFFERTA";
const OFFER_URL: &str = "URL_OFFERTA";
const OFFER_DETAIL: &str = "DettaglioOfferta";
const CUSTOMER_TYPE: &str = "TIPO_CLIENTE";
const PRICE_REFERENCES: &str = "RiferimentiPrezzoEnergia";
const PRICE_INDEX: &str = "IDX_PREZZO_ENERGIA";
const COMPONENT: &str = "ComponenteImpresa";
const MACRO_AREA: &str = "MACROAREA";
const INTERVAL: &str = "IntervalloPrezzi";
const PRICE: &str = "PREZZO";
const UNIT: &str = "UNITA_MISURA";
const BAND: &str = "FASCIA_COMPONENTE";

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct OfferNode {
    pub(crate) name: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) url: Option<String>,
    pub(crate) customer_type: Option<String>,
    pub(crate) price_index: Option<String>,
    pub(crate) components: Vec<FeeComponentNode>,
}

impl OfferNode {
    /// An offer is index-linked when it references a non-blank price index.
    pub(crate) fn is_index_linked(&self) -> bool {
        self.price_index
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct FeeComponentNode {
    pub(crate) macro_area: Option<String>,
    pub(crate) intervals: Vec<PriceIntervalNode>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct PriceIntervalNode {
    pub(crate) price: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) band: Option<String>,
}

/// Namespace prefix taken from the root element, e.g. `ns2` in `<ns2:Offerte>`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NamespacePrefix(Option<String>);

impl NamespacePrefix {
    fn from_root(qualified: &str) -> Self {
        match qualified.split_once(':') {
            Some((prefix, _)) => Self(Some(prefix.to_string())),
            None => Self(None),
        }
    }

    fn local<'a>(&self, qualified: &'a str) -> &'a str {
        match &self.0 {
            Some(prefix) => qualified
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
                .unwrap_or(qualified),
            None => qualified,
        }
    }
}

/// Tracks where the reader currently is inside an offer.
#[derive(Debug, Default)]
struct OfferCursor {
    offer: OfferNode,
    component: Option<FeeComponentNode>,
    interval: Option<PriceIntervalNode>,
    depth: usize,
}

pub(crate) fn parse_document(xml: &str) -> Result<Vec<OfferNode>, CatalogError> {
    let mut reader = Reader::from_str(xml.trim());
    reader.config_mut().trim_text(true);

    let mut prefix: Option<NamespacePrefix> = None;
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();
    let mut cursor: Option<OfferCursor> = None;
    let mut offers = Vec::new();

    loop {
        let position = reader.buffer_position();
        let event = reader
            .read_event()
            .map_err(|source| CatalogError::Xml {
                position: position as u64,
                source,
            })?;

        match event {
            Event::Start(start) => {
                let local = open_element(&start, &mut prefix)?;
                text.clear();
                enter(&local, &path, &mut cursor);
                path.push(local);
            }
            Event::Empty(start) => {
                let local = open_element(&start, &mut prefix)?;
                text.clear();
                enter(&local, &path, &mut cursor);
                path.push(local);
                close(&mut path, &text, &mut cursor, &mut offers);
            }
            Event::Text(content) => {
                let value = content.unescape().map_err(|source| CatalogError::Xml {
                    position: reader.buffer_position() as u64,
                    source,
                })?;
                text.push_str(&value);
            }
            Event::CData(content) => {
                text.push_str(&String::from_utf8_lossy(&content.into_inner()));
            }
            Event::End(_) => {
                close(&mut path, &text, &mut cursor, &mut offers);
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if prefix.is_none() {
        return Err(CatalogError::MissingRoot);
    }
    if let Some(open) = path.last() {
        return Err(CatalogError::UnclosedElement(open.clone()));
    }

    Ok(offers)
}

fn open_element(
    start: &BytesStart<'_>,
    prefix: &mut Option<NamespacePrefix>,
) -> Result<String, CatalogError> {
    let qualified = std::str::from_utf8(start.name().as_ref())
        .map_err(|_| CatalogError::InvalidElementName)?
        .to_string();

    let resolved = prefix.get_or_insert_with(|| NamespacePrefix::from_root(&qualified));
    Ok(resolved.local(&qualified).to_string())
}

fn enter(local: &str, path: &[String], cursor: &mut Option<OfferCursor>) {
    match cursor {
        None if local == OFFER => {
            *cursor = Some(OfferCursor {
                depth: path.len(),
                ..OfferCursor::default()
            });
        }
        Some(active) if local == COMPONENT && active.component.is_none() => {
            active.component = Some(FeeComponentNode::default());
        }
        Some(active) if local == INTERVAL && active.component.is_some() => {
            active.interval = Some(PriceIntervalNode::default());
        }
        _ => {}
    }
}

fn close(
    path: &mut Vec<String>,
    text: &str,
    cursor: &mut Option<OfferCursor>,
    offers: &mut Vec<OfferNode>,
) {
    let Some(local) = path.pop() else {
        return;
    };
    let parent = path.last().map(String::as_str);

    let Some(active) = cursor.as_mut() else {
        return;
    };

    if local == OFFER && path.len() == active.depth {
        if let Some(finished) = cursor.take() {
            offers.push(finished.offer);
        }
        return;
    }

    let value = Some(text.trim().to_string());

    if let Some(interval) = active.interval.as_mut() {
        match local.as_str() {
            PRICE => set_once(&mut interval.price, value),
            UNIT => set_once(&mut interval.unit, value),
            BAND => set_once(&mut interval.band, value),
            INTERVAL => {
                if let (Some(finished), Some(component)) =
                    (active.interval.take(), active.component.as_mut())
                {
                    component.intervals.push(finished);
                }
            }
            _ => {}
        }
        return;
    }

    if let Some(component) = active.component.as_mut() {
        match local.as_str() {
            MACRO_AREA => set_once(&mut component.macro_area, value),
            COMPONENT => {
                if let Some(finished) = active.component.take() {
                    active.offer.components.push(finished);
                }
            }
            _ => {}
        }
        return;
    }

    let offer = &mut active.offer;
    match (local.as_str(), parent) {
        (OFFER_NAME, _) => set_once(&mut offer.name, value),
        (OFFER_CODE, _) => set_once(&mut offer.code, value),
        (OFFER_URL, _) => set_once(&mut offer.url, value),
        (CUSTOMER_TYPE, Some(OFFER_DETAIL)) => set_once(&mut offer.customer_type, value),
        (PRICE_INDEX, Some(PRICE_REFERENCES)) => set_once(&mut offer.price_index, value),
        _ => {}
    }
}

/// The feed is read first-match-wins, like a descendant lookup.
fn set_once(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}
