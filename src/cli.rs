use crate::app::MapKind;
use crate::config::AppConfig;
use clap::Parser;
use std::path::PathBuf;

/// Terminal choropleth maps: US weather stations and World Bank indicators
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Which map to show
    #[arg(value_enum)]
    pub map: MapKind,

    #[arg(short, long, value_name = "FILE", default_value = "choropleth.toml")]
    pub config: PathBuf,

    /// Directory holding the static data files (overrides the config)
    #[arg(short, long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Where to write the log; the terminal is owned by the UI
    #[arg(long, value_name = "FILE", default_value = "tui-choropleth.log")]
    pub log_file: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the file configuration
    pub fn apply(&self, mut config: AppConfig) -> AppConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        config
    }

    pub fn default_log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}
