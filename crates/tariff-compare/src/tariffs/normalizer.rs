use std::borrow::Cow;

/// Parses a feed decimal, accepting a comma separator and embedded spaces.
pub(crate) fn parse_decimal(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .trim_start_matches('\u{feff}')
        .chars()
        .filter(|ch| !ch.is_whitespace())
        .map(|ch| if ch == ',' { '.' } else { ch })
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|number| number.is_finite())
}

/// Fee values that fail to parse count as zero rather than rejecting the offer.
pub(crate) fn decimal_or_zero(value: Option<&str>) -> f64 {
    value.and_then(parse_decimal).unwrap_or(0.0)
}

/// Decodes feed bytes as UTF-8, falling back to Latin-1 for legacy exports.
pub(crate) fn decode_document(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&byte| char::from(byte)).collect()),
    }
}

/// Reads the header row with `,`, re-reading with `;` when that yields fewer
/// than two columns. Returns the delimiter and the normalized headers.
pub(crate) fn sniff_headers(bytes: &[u8]) -> Result<(u8, Vec<String>), csv::Error> {
    let headers = read_headers(bytes, b',')?;
    if headers.len() < 2 {
        return Ok((b';', read_headers(bytes, b';')?));
    }
    Ok((b',', headers))
}

fn read_headers(bytes: &[u8], delimiter: u8) -> Result<Vec<String>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);
    Ok(reader.headers()?.iter().map(normalize_header).collect())
}

pub(crate) fn normalize_header(value: &str) -> String {
    value
        .replace(['\u{feff}', '\u{200b}'], "")
        .trim()
        .to_ascii_lowercase()
}
