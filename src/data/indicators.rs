use crate::error::LoadFailure;
use crate::model::{CountryCodes, IndicatorDef};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct IndicatorRow {
    #[serde(rename = "IndicatorName")]
    name: String,
    #[serde(rename = "IndicatorCode")]
    code: String,
}

/// Load the selectable indicator list, in file order.
pub fn load_indicators(path: &Path) -> Result<Vec<IndicatorDef>, LoadFailure> {
    let file = std::fs::File::open(path).map_err(|e| LoadFailure::io(path, e))?;
    let indicators = read_indicators(file, path)?;
    info!(count = indicators.len(), path = %path.display(), "loaded indicators");
    Ok(indicators)
}

pub fn read_indicators<R: Read>(reader: R, path: &Path) -> Result<Vec<IndicatorDef>, LoadFailure> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut indicators = Vec::new();
    for row in rdr.deserialize::<IndicatorRow>() {
        let row = row.map_err(|source| LoadFailure::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        if row.code.is_empty() {
            continue;
        }
        indicators.push(IndicatorDef {
            code: row.code,
            name: row.name,
        });
    }

    if indicators.is_empty() {
        return Err(LoadFailure::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(indicators)
}

#[derive(Debug, Deserialize)]
struct CodeRow {
    #[serde(rename = "Alpha-2 code")]
    alpha2: String,
    #[serde(rename = "Alpha-3 code")]
    alpha3: String,
    #[serde(rename = "Numeric code", default)]
    numeric: Option<serde_json::Value>,
}

/// Load the alpha-3 / numeric to alpha-2 country code table.
pub fn load_country_codes(path: &Path) -> Result<CountryCodes, LoadFailure> {
    let bytes = std::fs::read(path).map_err(|e| LoadFailure::io(path, e))?;
    let codes = parse_country_codes(&bytes, path)?;
    info!(count = codes.len(), path = %path.display(), "loaded country codes");
    Ok(codes)
}

pub fn parse_country_codes(bytes: &[u8], path: &Path) -> Result<CountryCodes, LoadFailure> {
    let rows: Vec<CodeRow> = serde_json::from_slice(bytes).map_err(|e| LoadFailure::json(path, e))?;

    let mut codes = CountryCodes::default();
    for row in rows.iter().filter(|r| !r.alpha2.is_empty()) {
        if !row.alpha3.is_empty() {
            codes.insert(&row.alpha3, &row.alpha2);
        }
        match &row.numeric {
            Some(serde_json::Value::String(s)) if !s.is_empty() => codes.insert(s, &row.alpha2),
            Some(serde_json::Value::Number(n)) => codes.insert(&n.to_string(), &row.alpha2),
            _ => {}
        }
    }

    if codes.is_empty() {
        return Err(LoadFailure::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(codes)
}
