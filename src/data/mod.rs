//! Static resource loading for both map variants.

mod indicators;
mod stations;
mod topology;

pub use indicators::{load_country_codes, load_indicators, parse_country_codes, read_indicators};
pub use stations::{load_stations, load_stats, read_stations};
pub use topology::{decode_regions, load_regions as load_topology_regions};

use crate::config::{UsConfig, WorldConfig};
use crate::error::LoadFailure;
use crate::map::Projection;
use crate::model::{CountryCodes, IndicatorDef, Polygon, Region, Station, StationStats};
use geojson::{feature::Id, GeoJson, Geometry, Value};
use std::path::Path;
use tracing::info;

/// Everything the US station map needs
pub struct UsData {
    pub regions: Vec<Region>,
    pub stations: Vec<Station>,
    pub stats: StationStats,
}

/// Everything the world indicator map needs
pub struct WorldData {
    pub regions: Vec<Region>,
    pub indicators: Vec<IndicatorDef>,
    pub codes: CountryCodes,
}

/// Load state boundaries, statistics and stations, in that order.
pub fn load_us(config: &UsConfig, data_dir: &Path) -> Result<UsData, LoadFailure> {
    let regions = topology::load_regions(&data_dir.join(&config.boundaries), &config.boundary_object)?;
    info!(count = regions.len(), "loaded state boundaries");

    let stats = load_stats(&data_dir.join(&config.stats))?;
    let stations = load_stations(&data_dir.join(&config.stations), Projection::AlbersUsa)?;

    Ok(UsData {
        regions,
        stations,
        stats,
    })
}

/// Load indicator definitions, country boundaries and the code table.
pub fn load_world(config: &WorldConfig, data_dir: &Path) -> Result<WorldData, LoadFailure> {
    let indicators = load_indicators(&data_dir.join(&config.indicators))?;
    let regions = load_geojson_regions(&data_dir.join(&config.boundaries))?;
    info!(count = regions.len(), "loaded country boundaries");
    let codes = load_country_codes(&data_dir.join(&config.country_codes))?;

    Ok(WorldData {
        regions,
        indicators,
        codes,
    })
}

/// Load polygonal features from a GeoJSON file
pub fn load_geojson_regions(path: &Path) -> Result<Vec<Region>, LoadFailure> {
    let content = std::fs::read_to_string(path).map_err(|e| LoadFailure::io(path, e))?;
    let geojson: GeoJson = content.parse().map_err(|e| LoadFailure::json(path, e))?;
    let regions = regions_from_geojson(&geojson);
    if regions.is_empty() {
        return Err(LoadFailure::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(regions)
}

/// Convert GeoJSON features with polygon geometry into regions.
/// Features without geometry or with non-areal geometry are skipped.
pub fn regions_from_geojson(geojson: &GeoJson) -> Vec<Region> {
    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.iter().collect::<Vec<_>>(),
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => Vec::new(),
    };

    features
        .into_iter()
        .enumerate()
        .filter_map(|(idx, feature)| {
            let polygons = feature.geometry.as_ref().map(polygons_of)?;
            if polygons.is_empty() {
                return None;
            }
            let id = match &feature.id {
                Some(Id::String(s)) => s.clone(),
                Some(Id::Number(n)) => n.to_string(),
                None => idx.to_string(),
            };
            let name = feature
                .property("name")
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Some(Region { id, name, polygons })
        })
        .collect()
}

fn polygons_of(geometry: &Geometry) -> Vec<Polygon> {
    let to_ring = |coords: &Vec<Vec<f64>>| -> Vec<(f64, f64)> {
        coords
            .iter()
            .filter(|c| c.len() >= 2)
            .map(|c| (c[0], c[1]))
            .collect()
    };

    match &geometry.value {
        Value::Polygon(rings) => vec![rings.iter().map(to_ring).collect()],
        Value::MultiPolygon(polygons) => polygons
            .iter()
            .map(|rings| rings.iter().map(to_ring).collect())
            .collect(),
        Value::GeometryCollection(geometries) => geometries.iter().flat_map(polygons_of).collect(),
        _ => Vec::new(),
    }
}
