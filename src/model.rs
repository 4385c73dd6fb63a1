//! Records shared by the loaders, the renderer and the query layer.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

/// A closed ring of (lon, lat) points
pub type Ring = Vec<(f64, f64)>;

/// Exterior ring first, holes after
pub type Polygon = Vec<Ring>;

/// A weather station read from the metadata CSV.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    /// Planar position under the map's projection, fixed at load time
    pub planar: (f64, f64),
}

/// Aggregated light measurements for one station.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StationStat {
    pub sum: f64,
    #[serde(default)]
    pub hourly: BTreeMap<String, f64>,
}

/// Station id -> statistics. A missing id means "no data".
pub type StationStats = HashMap<String, StationStat>;

/// A shaded region: a US state or a country.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub id: String,
    pub name: Option<String>,
    pub polygons: Vec<Polygon>,
}

impl Region {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// One selectable statistical series.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndicatorDef {
    pub code: String,
    pub name: String,
}

/// A single country's value for the queried indicator and year.
#[derive(Clone, Debug, PartialEq)]
pub struct IndicatorValue {
    /// Two-letter country code
    pub country: String,
    pub value: Option<f64>,
}

/// Maps region ids (ISO alpha-3 or ISO numeric) to two-letter codes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CountryCodes {
    by_id: HashMap<String, String>,
}

impl CountryCodes {
    pub fn insert(&mut self, region_id: &str, iso2: &str) {
        self.by_id.insert(normalize_id(region_id), iso2.to_string());
    }

    pub fn iso2_for(&self, region_id: &str) -> Option<&str> {
        self.by_id.get(&normalize_id(region_id)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Numeric ids compare without leading zeros ("004" == "4"), others case-insensitively
fn normalize_id(id: &str) -> String {
    let id = id.trim();
    match id.parse::<u32>() {
        Ok(n) => n.to_string(),
        Err(_) => id.to_ascii_uppercase(),
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct Labelled {
    #[serde(default)]
    pub value: String,
}

/// Country metadata from the data provider, cached forever once fetched.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountryDetail {
    #[serde(rename = "iso2Code")]
    pub iso2: String,
    pub name: String,
    #[serde(default)]
    pub region: Labelled,
    #[serde(default)]
    pub capital_city: String,
    #[serde(default)]
    pub longitude: String,
    #[serde(default)]
    pub latitude: String,
    #[serde(default)]
    pub income_level: Labelled,
    #[serde(default)]
    pub lending_type: Labelled,
}
