//! Terminal choropleth maps: a US weather-station map with an hourly
//! detail chart and a world map shaded by World Bank indicators.

pub mod app;
pub mod braille;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod map;
pub mod model;
pub mod query;
pub mod scale;
pub mod ui;
pub mod view;
