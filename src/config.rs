use crate::scale::Rgb;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration, read from TOML. Every field has a default so a
/// missing file or a partial file both work.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub us: UsConfig,
    pub world: WorldConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UsConfig {
    pub stations: PathBuf,
    pub stats: PathBuf,
    pub boundaries: PathBuf,
    /// Object inside the topology file holding the state polygons
    pub boundary_object: String,
    pub zoom_scale: f64,
    pub radius_divisor: f64,
    pub default_radius: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorldConfig {
    pub indicators: PathBuf,
    pub boundaries: PathBuf,
    pub country_codes: PathBuf,
    pub first_year: u16,
    pub last_year: u16,
    pub color_min: Rgb,
    pub color_max: Rgb,
    pub no_data_color: Rgb,
    pub zoom_scale: f64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub per_page: u32,
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            us: UsConfig::default(),
            world: WorldConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for UsConfig {
    fn default() -> Self {
        Self {
            stations: PathBuf::from("NSRDB_StationsMeta.csv"),
            stats: PathBuf::from("reducedMonthStationHour2003_2004.json"),
            boundaries: PathBuf::from("us-named.json"),
            boundary_object: "states".to_string(),
            zoom_scale: 4.0,
            radius_divisor: 2000.0,
            default_radius: 2.0,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            indicators: PathBuf::from("worldBank_indicators.csv"),
            boundaries: PathBuf::from("world_data.json"),
            country_codes: PathBuf::from("wikipedia-iso-country-codes.json"),
            first_year: 1960,
            last_year: 2013,
            // colorbrewer Greens[3]
            color_min: Rgb::new(0xe5, 0xf5, 0xe0),
            color_max: Rgb::new(0x31, 0xa3, 0x54),
            // CSS lightgray
            no_data_color: Rgb::new(0xd3, 0xd3, 0xd3),
            zoom_scale: 4.0,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.worldbank.org/v2".to_string(),
            per_page: 500,
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Use the file when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.world.first_year <= self.world.last_year,
            "world.first_year ({}) is after world.last_year ({})",
            self.world.first_year,
            self.world.last_year
        );
        anyhow::ensure!(
            self.us.zoom_scale >= 1.0 && self.world.zoom_scale >= 1.0,
            "zoom_scale must be at least 1"
        );
        anyhow::ensure!(self.us.radius_divisor > 0.0, "us.radius_divisor must be positive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"data_dir = "/srv/maps"

[world]
first_year = 1990
color_max = "#006d2c"

[api]
timeout_secs = 3
"##
        )
        .unwrap();

        let config = AppConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/maps"));
        assert_eq!(config.world.first_year, 1990);
        assert_eq!(config.world.last_year, 2013);
        assert_eq!(config.world.color_max, Rgb::new(0x00, 0x6d, 0x2c));
        assert_eq!(config.api.timeout(), Duration::from_secs(3));
        assert_eq!(config.us, UsConfig::default());
    }

    #[test]
    fn test_bad_color_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[world]\ncolor_min = \"green\"").unwrap();
        assert!(AppConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_year_range_validated() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[world]\nfirst_year = 2020\nlast_year = 2000").unwrap();
        let err = AppConfig::load_from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("first_year"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_or_default(Path::new("/nonexistent/choropleth.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
