use crate::config::{UsConfig, WorldConfig};
use crate::data::{UsData, WorldData};
use crate::error::{LoadFailure, QueryFailure};
use crate::map::{
    Bounds, MapLayers, MapRenderer, Marker, MarkerKind, ProjectedScene, Projection, Viewport,
};
use crate::model::{CountryDetail, IndicatorDef, Region, Station, StationStats};
use crate::query::{Lookup, QueryDispatcher, QueryUpdate, WorldBankApi};
use crate::scale::{format_thousands, ColorScale, LinearScale, RadiusScale, Rgb};
use crate::view::ViewState;
use ratatui::layout::{Constraint, Layout, Margin, Position, Rect};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Width of the detail panel right of the map
pub const PANEL_WIDTH: u16 = 36;

/// How long a transient notice stays in the status bar
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Projections the world map cycles through
const WORLD_PROJECTIONS: [Projection; 3] = [
    Projection::Mercator,
    Projection::Equirectangular,
    Projection::Stereographic,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum MapKind {
    /// US states with weather-station markers
    Us,
    /// Countries shaded by a World Bank indicator
    World,
}

impl MapKind {
    pub fn title(&self) -> &'static str {
        match self {
            MapKind::Us => " US Weather Stations ",
            MapKind::World => " World Bank Indicators ",
        }
    }
}

/// Screen areas, shared by input handling and drawing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenLayout {
    pub map: Rect,
    pub panel: Rect,
    pub status: Rect,
}

impl ScreenLayout {
    pub fn new(width: u16, height: u16) -> Self {
        let [main, status] = Layout::vertical([Constraint::Min(3), Constraint::Length(1)])
            .areas(Rect::new(0, 0, width, height));
        let [map, panel] = Layout::horizontal([Constraint::Min(10), Constraint::Length(PANEL_WIDTH)])
            .areas(main);
        Self { map, panel, status }
    }

    /// Map area inside its border
    pub fn map_inner(&self) -> Rect {
        self.map.inner(Margin::new(1, 1))
    }
}

/// Work for the query layer, produced by input handlers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    FetchIndicator { indicator: String, year: u16 },
    FetchCountry(String),
    CancelCountry(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct HourlyBar {
    pub hour: String,
    pub value: f64,
    /// Bar height as a fraction of the chart
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HourlyChart {
    pub title: String,
    pub y_max: f64,
    pub bars: Vec<HourlyBar>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DetailState {
    Empty,
    Loading { iso2: String, name: String },
    Ready(CountryDetail),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Legend {
    pub high: Rgb,
    pub low: Rgb,
    pub max_label: String,
    pub min_label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Hover {
    Station(usize),
    Region(usize),
}

pub struct UsMap {
    regions: Vec<Region>,
    stations: Vec<Station>,
    stats: StationStats,
    radius: RadiusScale,
    /// Sorted union of hour labels over all stations
    hours: Vec<String>,
    hour_scale: LinearScale,
}

pub struct WorldMap {
    regions: Vec<Region>,
    indicators: Vec<IndicatorDef>,
    /// Two-letter code of each region, by region index
    region_codes: Vec<Option<String>>,
    /// Two-letter code -> value of the applied indicator
    values: HashMap<String, Option<f64>>,
    /// (indicator, year) the values belong to
    applied: Option<(String, u16)>,
    /// Last (indicator, year) whose query failed
    failed: Option<(String, u16)>,
    color: Option<ColorScale>,
    config: WorldConfig,
    detail: DetailState,
}

pub enum Screen {
    Us(UsMap),
    World(WorldMap),
    Failed { kind: MapKind, error: String },
}

/// Application state
pub struct App {
    pub kind: MapKind,
    pub screen: Screen,
    pub view: ViewState,
    pub should_quit: bool,
    /// Current mouse position for the cursor marker
    pub mouse_pos: Option<(u16, u16)>,
    scene: Option<ProjectedScene>,
    fitted: Viewport,
    layout: ScreenLayout,
    zoom_scale: f64,
    region_index: HashMap<String, usize>,
    hover: Option<Hover>,
    notice: Option<(String, Instant)>,
}

impl App {
    pub fn us(data: UsData, config: &UsConfig, width: u16, height: u16) -> Self {
        let hours = hour_labels(&data.stats);
        let y_max = data
            .stats
            .values()
            .flat_map(|s| s.hourly.values().copied())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max);
        info!(stations = data.stations.len(), hours = hours.len(), y_max, "us map ready");

        let planar = data.stations.iter().map(|s| s.planar).collect();
        let scene = ProjectedScene::build(&data.regions, planar, Projection::AlbersUsa);
        let region_index = index_regions(&data.regions);

        let map = UsMap {
            regions: data.regions,
            stations: data.stations,
            stats: data.stats,
            radius: RadiusScale {
                divisor: config.radius_divisor,
                default_radius: config.default_radius,
            },
            hours,
            hour_scale: LinearScale::new((0.0, y_max), (0.0, 1.0)),
        };

        Self::with_screen(
            MapKind::Us,
            Screen::Us(map),
            Some(scene),
            region_index,
            config.zoom_scale,
            0,
            width,
            height,
        )
    }

    pub fn world(data: WorldData, config: &WorldConfig, width: u16, height: u16) -> Self {
        let region_codes: Vec<Option<String>> = data
            .regions
            .iter()
            .map(|r| data.codes.iso2_for(&r.id).map(str::to_string))
            .collect();
        let unmatched = region_codes.iter().filter(|c| c.is_none()).count();
        info!(
            regions = data.regions.len(),
            indicators = data.indicators.len(),
            unmatched,
            "world map ready"
        );

        let scene = ProjectedScene::build(&data.regions, Vec::new(), WORLD_PROJECTIONS[0]);
        let region_index = index_regions(&data.regions);

        let map = WorldMap {
            regions: data.regions,
            indicators: data.indicators,
            region_codes,
            values: HashMap::new(),
            applied: None,
            failed: None,
            color: None,
            config: config.clone(),
            detail: DetailState::Empty,
        };

        Self::with_screen(
            MapKind::World,
            Screen::World(map),
            Some(scene),
            region_index,
            config.zoom_scale,
            config.first_year,
            width,
            height,
        )
    }

    /// A map whose resources could not be loaded
    pub fn failed(kind: MapKind, error: &LoadFailure, width: u16, height: u16) -> Self {
        Self::with_screen(
            kind,
            Screen::Failed {
                kind,
                error: error.to_string(),
            },
            None,
            HashMap::new(),
            1.0,
            0,
            width,
            height,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn with_screen(
        kind: MapKind,
        screen: Screen,
        scene: Option<ProjectedScene>,
        region_index: HashMap<String, usize>,
        zoom_scale: f64,
        year: u16,
        width: u16,
        height: u16,
    ) -> Self {
        let layout = ScreenLayout::new(width, height);
        let mut app = Self {
            kind,
            screen,
            view: ViewState::new(year),
            should_quit: false,
            mouse_pos: None,
            scene,
            fitted: Viewport::fit(&Bounds::new(-1.0, -1.0, 1.0, 1.0), 2, 4),
            layout,
            zoom_scale,
            region_index,
            hover: None,
            notice: None,
        };
        app.refit();
        app
    }

    /// Queries to issue before the first frame
    pub fn startup_commands(&self) -> Vec<Command> {
        self.indicator_command().into_iter().collect()
    }

    fn indicator_command(&self) -> Option<Command> {
        let Screen::World(world) = &self.screen else {
            return None;
        };
        let indicator = world.indicators.get(self.view.indicator)?;
        Some(Command::FetchIndicator {
            indicator: indicator.code.clone(),
            year: self.view.year,
        })
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    /// Update the layout when the terminal resizes
    pub fn resize(&mut self, width: u16, height: u16) {
        self.layout = ScreenLayout::new(width, height);
        self.refit();
    }

    fn refit(&mut self) {
        // Braille gives 2x4 resolution per character
        let inner = self.layout.map_inner();
        let (pixel_width, pixel_height) = (inner.width as usize * 2, inner.height as usize * 4);
        if let Some(scene) = &self.scene {
            self.fitted = Viewport::fit(scene.bounds(), pixel_width.max(1), pixel_height.max(1));
        }
    }

    /// Viewport for the current zoom state
    pub fn viewport(&self) -> Viewport {
        self.view.viewport(&self.fitted, self.zoom_scale, |id| {
            let idx = *self.region_index.get(id)?;
            self.scene.as_ref()?.centroid(idx)
        })
    }

    pub fn projection(&self) -> Projection {
        match self.screen {
            Screen::World(_) => WORLD_PROJECTIONS[self.view.projection % WORLD_PROJECTIONS.len()],
            _ => Projection::AlbersUsa,
        }
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset_zoom(&mut self) {
        self.view = self.view.reset_zoom();
    }

    /// Next projection (world map); zoom follows the region
    pub fn cycle_projection(&mut self) {
        let Screen::World(world) = &self.screen else {
            return;
        };
        self.view = self.view.cycle_projection(WORLD_PROJECTIONS.len());
        let projection = self.projection();
        debug!(projection = projection.name(), "reprojecting");
        self.scene = Some(ProjectedScene::build(&world.regions, Vec::new(), projection));
        self.refit();
    }

    pub fn step_indicator(&mut self, delta: isize) -> Vec<Command> {
        let Screen::World(world) = &mut self.screen else {
            return Vec::new();
        };
        let mut commands = cancel_pending(&world.detail);
        world.detail = DetailState::Empty;
        world.failed = None;
        self.view = self.view.step_indicator(delta, world.indicators.len());
        commands.extend(self.indicator_command());
        commands
    }

    pub fn step_year(&mut self, delta: i32) -> Vec<Command> {
        let Screen::World(world) = &mut self.screen else {
            return Vec::new();
        };
        let next = self
            .view
            .step_year(delta, world.config.first_year, world.config.last_year);
        if next == self.view {
            return Vec::new();
        }
        world.failed = None;
        self.view = next;
        self.indicator_command().into_iter().collect()
    }

    /// Select the next (or previous) station that has statistics
    pub fn step_station(&mut self, delta: isize) {
        let Screen::Us(us) = &self.screen else {
            return;
        };
        let with_data: Vec<&Station> = us
            .stations
            .iter()
            .filter(|s| us.stats.contains_key(&s.id))
            .collect();
        if with_data.is_empty() {
            self.show_notice("no station has data");
            return;
        }

        let current = self
            .view
            .selected_station
            .as_ref()
            .and_then(|id| with_data.iter().position(|s| &s.id == id));
        let len = with_data.len() as isize;
        let next = match current {
            Some(pos) => (pos as isize + delta).rem_euclid(len),
            None if delta < 0 => len - 1,
            None => 0,
        };
        let id = with_data[next as usize].id.clone();
        self.view = self.view.select_station(Some(&id));
    }

    /// Braille pixel under a terminal cell, if it is on the map
    fn pixel_at(&self, col: u16, row: u16) -> Option<(i32, i32)> {
        let inner = self.layout.map_inner();
        if !inner.contains(Position::new(col, row)) {
            return None;
        }
        Some((
            (col - inner.x) as i32 * 2 + 1,
            (row - inner.y) as i32 * 4 + 2,
        ))
    }

    fn pick(&self, col: u16, row: u16) -> Option<Hover> {
        let (px, py) = self.pixel_at(col, row)?;
        let scene = self.scene.as_ref()?;
        let viewport = self.viewport();
        let renderer = MapRenderer::new(scene, &viewport);

        if let Screen::Us(us) = &self.screen {
            if let Some(idx) = renderer.station_at_pixel(px, py, us.radius.default_radius) {
                return Some(Hover::Station(idx));
            }
        }
        renderer.region_at_pixel(px, py).map(Hover::Region)
    }

    /// Left click: a station wins over the region under it
    pub fn click(&mut self, col: u16, row: u16) -> Vec<Command> {
        match self.pick(col, row) {
            Some(Hover::Station(idx)) => {
                if let Screen::Us(us) = &self.screen {
                    let id = us.stations[idx].id.clone();
                    self.view = self.view.select_station(Some(&id));
                }
                Vec::new()
            }
            Some(Hover::Region(idx)) => self.select_region(idx),
            None => Vec::new(),
        }
    }

    pub fn hover(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        self.hover = self.pick(col, row);
    }

    /// Zoom to (or out of) a region; on the world map also open its detail
    pub fn select_region(&mut self, idx: usize) -> Vec<Command> {
        let Some(id) = self.region_id(idx) else {
            return Vec::new();
        };
        self.view = self.view.click_region(&id);

        let Screen::World(world) = &mut self.screen else {
            return Vec::new();
        };
        let code = world.region_codes.get(idx).cloned().flatten();
        let mut commands = match (&world.detail, &code) {
            (DetailState::Loading { iso2, .. }, Some(next)) if iso2 == next => Vec::new(),
            (detail, _) => cancel_pending(detail),
        };

        match code {
            Some(iso2) => {
                let name = world.regions[idx].label().to_string();
                world.detail = DetailState::Loading {
                    iso2: iso2.clone(),
                    name,
                };
                self.view = self.view.select_region(Some(&id));
                commands.push(Command::FetchCountry(iso2));
            }
            None => {
                debug!(region = %id, "no country code for region");
                world.detail = DetailState::Empty;
                self.view = self.view.select_region(None);
            }
        }
        commands
    }

    fn region_id(&self, idx: usize) -> Option<String> {
        let regions = match &self.screen {
            Screen::Us(us) => &us.regions,
            Screen::World(world) => &world.regions,
            Screen::Failed { .. } => return None,
        };
        regions.get(idx).map(|r| r.id.clone())
    }

    /// Hand commands to the query layer. Cached details apply immediately.
    pub fn execute<A: WorldBankApi>(&mut self, queries: &mut QueryDispatcher<A>, commands: Vec<Command>) {
        for command in commands {
            match command {
                Command::FetchIndicator { indicator, year } => queries.request_indicator(&indicator, year),
                Command::FetchCountry(code) => {
                    if let Lookup::Hit(detail) = queries.request_country(&code) {
                        self.apply_update(QueryUpdate::Country { code, detail });
                    }
                }
                Command::CancelCountry(code) => queries.cancel_country(&code),
            }
        }
    }

    pub fn apply_update(&mut self, update: QueryUpdate) {
        let current = self.indicator_command();
        let Screen::World(world) = &mut self.screen else {
            return;
        };

        match update {
            QueryUpdate::Indicator {
                indicator,
                year,
                values,
            } => {
                let wanted = Some(Command::FetchIndicator {
                    indicator: indicator.clone(),
                    year,
                });
                if current != wanted {
                    debug!(%indicator, year, "ignoring indicator response for an old selection");
                    return;
                }
                world.values = values.into_iter().map(|v| (v.country, v.value)).collect();
                world.color = ColorScale::over(
                    world
                        .region_codes
                        .iter()
                        .map(|code| code.as_ref().and_then(|c| world.values.get(c).copied().flatten())),
                    world.config.color_min,
                    world.config.color_max,
                    world.config.no_data_color,
                );
                info!(%indicator, year, domain = ?world.color.map(|c| c.domain()), "indicator applied");
                world.applied = Some((indicator, year));
            }
            QueryUpdate::IndicatorFailed {
                indicator,
                year,
                error,
            } => {
                let wanted = Some(Command::FetchIndicator {
                    indicator: indicator.clone(),
                    year,
                });
                if current == wanted {
                    world.failed = Some((indicator, year));
                    self.show_notice(format!("indicator query failed: {error}"));
                }
            }
            QueryUpdate::Country { code, detail } => {
                if matches!(&world.detail, DetailState::Loading { iso2, .. } if *iso2 == code) {
                    world.detail = DetailState::Ready(detail);
                }
            }
            QueryUpdate::CountryFailed { code, error } => {
                if matches!(&world.detail, DetailState::Loading { iso2, .. } if *iso2 == code) {
                    world.detail = DetailState::Empty;
                    if !matches!(error, QueryFailure::NotFound(_)) {
                        self.show_notice(format!("country query failed: {error}"));
                    }
                }
            }
        }
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.notice = Some((text.into(), Instant::now() + NOTICE_TTL));
    }

    /// Expire the notice
    pub fn tick(&mut self, now: Instant) {
        if self.notice.as_ref().is_some_and(|(_, until)| now >= *until) {
            self.notice = None;
        }
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(text, _)| text.as_str())
    }

    /// Fill color of a region
    pub fn region_fill(&self, idx: usize) -> Option<Rgb> {
        let Screen::World(world) = &self.screen else {
            return None;
        };
        let value = world
            .region_codes
            .get(idx)?
            .as_ref()
            .and_then(|code| world.values.get(code).copied().flatten());
        Some(match &world.color {
            Some(scale) => scale.color(value),
            None => world.config.no_data_color,
        })
    }

    /// Draw the map into the current map area
    pub fn render_layers(&self) -> Option<MapLayers> {
        let scene = self.scene.as_ref()?;
        let inner = self.layout.map_inner();
        let viewport = self.viewport();
        let active = self
            .view
            .zoomed_region()
            .and_then(|id| self.region_index.get(id).copied());

        let markers: Vec<Marker> = match &self.screen {
            Screen::Us(us) => us
                .stations
                .iter()
                .enumerate()
                .map(|(idx, station)| {
                    let stat = us.stats.get(&station.id);
                    let kind = if self.view.selected_station.as_deref() == Some(station.id.as_str()) {
                        MarkerKind::Selected
                    } else if stat.is_some() {
                        MarkerKind::Data
                    } else {
                        MarkerKind::NoData
                    };
                    Marker {
                        station: idx,
                        radius: us.radius.radius(stat),
                        kind,
                    }
                })
                .collect(),
            _ => Vec::new(),
        };

        Some(MapRenderer::new(scene, &viewport).render(
            inner.width as usize,
            inner.height as usize,
            |idx| self.region_fill(idx),
            active,
            &markers,
        ))
    }

    /// Bar chart for the selected station
    pub fn hourly_chart(&self) -> Option<HourlyChart> {
        let Screen::Us(us) = &self.screen else {
            return None;
        };
        let id = self.view.selected_station.as_ref()?;
        let station = us.stations.iter().find(|s| &s.id == id)?;
        let hourly = us.stats.get(id).map(|s| &s.hourly);

        let bars = us
            .hours
            .iter()
            .map(|hour| {
                let value = hourly.and_then(|h| h.get(hour)).copied().unwrap_or(0.0);
                HourlyBar {
                    hour: hour.clone(),
                    value,
                    height: us.hour_scale.apply(value),
                }
            })
            .collect();

        Some(HourlyChart {
            title: station.name.clone(),
            y_max: us.hour_scale.domain().1,
            bars,
        })
    }

    pub fn legend(&self) -> Option<Legend> {
        let Screen::World(world) = &self.screen else {
            return None;
        };
        let scale = world.color.as_ref()?;
        let (min, max) = scale.domain();
        Some(Legend {
            high: scale.high(),
            low: scale.low(),
            max_label: format_thousands(max),
            min_label: format_thousands(min),
        })
    }

    pub fn detail(&self) -> Option<&DetailState> {
        match &self.screen {
            Screen::World(world) => Some(&world.detail),
            _ => None,
        }
    }

    /// Value of the applied indicator for a two-letter code
    pub fn country_value(&self, iso2: &str) -> Option<f64> {
        match &self.screen {
            Screen::World(world) => world.values.get(iso2).copied().flatten(),
            _ => None,
        }
    }

    /// Indicator name and year the map colors belong to, or the selection
    /// while nothing has been applied yet
    pub fn indicator_label(&self) -> Option<(String, u16)> {
        let Screen::World(world) = &self.screen else {
            return None;
        };
        let (indicator, year) = match &world.applied {
            Some((code, year)) => (world.indicators.iter().find(|i| &i.code == code), *year),
            None => (world.indicators.get(self.view.indicator), self.view.year),
        };
        let name = indicator.map(|i| i.name.clone()).unwrap_or_default();
        Some((name, year))
    }

    /// Whether a query for the current selection is still outstanding
    pub fn is_loading(&self) -> bool {
        match (&self.screen, self.indicator_command()) {
            (Screen::World(world), Some(Command::FetchIndicator { indicator, year })) => {
                let current = Some((indicator, year));
                world.applied != current && world.failed != current
            }
            _ => false,
        }
    }

    /// Status-line text for whatever is under the mouse
    pub fn hover_text(&self) -> Option<String> {
        match (self.hover?, &self.screen) {
            (Hover::Station(idx), Screen::Us(us)) => {
                let station = us.stations.get(idx)?;
                Some(match us.stats.get(&station.id) {
                    Some(stat) => format!("{}: {}", station.name, format_thousands(stat.sum)),
                    None => format!("{}: no data", station.name),
                })
            }
            (Hover::Region(idx), Screen::Us(us)) => us.regions.get(idx).map(|r| r.label().to_string()),
            (Hover::Region(idx), Screen::World(world)) => {
                let region = world.regions.get(idx)?;
                let value = world.region_codes[idx]
                    .as_ref()
                    .and_then(|c| world.values.get(c).copied().flatten());
                Some(match value {
                    Some(v) => format!("{}: {}", region.label(), format_thousands(v)),
                    None => format!("{}: no data", region.label()),
                })
            }
            _ => None,
        }
    }
}

fn index_regions(regions: &[Region]) -> HashMap<String, usize> {
    regions
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.id.clone(), idx))
        .collect()
}

fn cancel_pending(detail: &DetailState) -> Vec<Command> {
    match detail {
        DetailState::Loading { iso2, .. } => vec![Command::CancelCountry(iso2.clone())],
        _ => Vec::new(),
    }
}

/// Union of hour labels, numeric labels in numeric order
fn hour_labels(stats: &StationStats) -> Vec<String> {
    let mut hours: Vec<String> = stats
        .values()
        .flat_map(|s| s.hourly.keys().cloned())
        .collect();
    hours.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    hours.dedup();
    hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CountryCodes, IndicatorValue, Labelled, StationStat};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn square(id: &str, name: &str, lon0: f64, lat0: f64) -> Region {
        Region {
            id: id.into(),
            name: Some(name.into()),
            polygons: vec![vec![vec![
                (lon0, lat0),
                (lon0 + 10.0, lat0),
                (lon0 + 10.0, lat0 + 10.0),
                (lon0, lat0 + 10.0),
                (lon0, lat0),
            ]]],
        }
    }

    fn world_app() -> App {
        let mut codes = CountryCodes::default();
        codes.insert("840", "US");
        codes.insert("FRA", "FR");
        codes.insert("DEU", "DE");
        let data = WorldData {
            regions: vec![
                square("840", "United States", -100.0, 30.0),
                square("FRA", "France", 0.0, 40.0),
                square("DEU", "Germany", 10.0, 45.0),
                square("ATA", "Antarctica", 0.0, -80.0),
            ],
            indicators: vec![
                IndicatorDef {
                    code: "NY.GDP.MKTP.CD".into(),
                    name: "GDP (current US$)".into(),
                },
                IndicatorDef {
                    code: "SP.POP.TOTL".into(),
                    name: "Population, total".into(),
                },
            ],
            codes,
        };
        App::world(data, &WorldConfig::default(), 120, 40)
    }

    fn gdp(year: u16, values: &[(&str, Option<f64>)]) -> QueryUpdate {
        QueryUpdate::Indicator {
            indicator: "NY.GDP.MKTP.CD".into(),
            year,
            values: values
                .iter()
                .map(|(c, v)| IndicatorValue {
                    country: c.to_string(),
                    value: *v,
                })
                .collect(),
        }
    }

    fn detail(iso2: &str) -> CountryDetail {
        CountryDetail {
            iso2: iso2.into(),
            name: "France".into(),
            region: Labelled::default(),
            capital_city: "Paris".into(),
            longitude: String::new(),
            latitude: String::new(),
            income_level: Labelled::default(),
            lending_type: Labelled::default(),
        }
    }

    #[test]
    fn test_world_starts_with_first_indicator_and_year() {
        let app = world_app();
        assert_eq!(
            app.startup_commands(),
            vec![Command::FetchIndicator {
                indicator: "NY.GDP.MKTP.CD".into(),
                year: 1960
            }]
        );
        assert!(app.is_loading());
        assert_eq!(app.region_fill(0), Some(WorldConfig::default().no_data_color));
    }

    #[test]
    fn test_indicator_response_colors_regions() {
        let mut app = world_app();
        let config = WorldConfig::default();
        app.apply_update(gdp(1960, &[("US", Some(100.0)), ("FR", Some(50.0)), ("DE", None)]));

        assert_eq!(app.region_fill(0), Some(config.color_max));
        assert_eq!(app.region_fill(1), Some(config.color_min));
        assert_eq!(app.region_fill(2), Some(config.no_data_color));
        assert_eq!(app.region_fill(3), Some(config.no_data_color));
        assert!(!app.is_loading());

        let legend = app.legend().unwrap();
        assert_eq!(legend.max_label, "100");
        assert_eq!(legend.min_label, "50");
    }

    #[test]
    fn test_old_selection_response_is_ignored() {
        let mut app = world_app();
        let commands = app.step_year(1);
        assert_eq!(
            commands,
            vec![Command::FetchIndicator {
                indicator: "NY.GDP.MKTP.CD".into(),
                year: 1961
            }]
        );

        app.apply_update(gdp(1960, &[("US", Some(1.0))]));
        assert!(app.legend().is_none());
        assert!(app.is_loading());

        app.apply_update(QueryUpdate::IndicatorFailed {
            indicator: "NY.GDP.MKTP.CD".into(),
            year: 1960,
            error: QueryFailure::Status(500),
        });
        assert_eq!(app.notice(), None);
    }

    #[test]
    fn test_failed_query_keeps_colors_and_notice_expires() {
        let mut app = world_app();
        app.apply_update(gdp(1960, &[("US", Some(100.0)), ("FR", Some(50.0))]));
        app.apply_update(QueryUpdate::IndicatorFailed {
            indicator: "NY.GDP.MKTP.CD".into(),
            year: 1960,
            error: QueryFailure::Status(503),
        });

        assert!(app.notice().unwrap().contains("503"));
        assert_eq!(app.region_fill(0), Some(WorldConfig::default().color_max));

        app.tick(Instant::now() + Duration::from_secs(4));
        assert_eq!(app.notice(), None);
    }

    #[test]
    fn test_failed_startup_query_stops_loading() {
        let mut app = world_app();
        app.apply_update(QueryUpdate::IndicatorFailed {
            indicator: "NY.GDP.MKTP.CD".into(),
            year: 1960,
            error: QueryFailure::Timeout(Duration::from_secs(10)),
        });
        app.tick(Instant::now() + Duration::from_secs(4));

        assert_eq!(app.notice(), None);
        assert!(!app.is_loading());
        assert!(app.legend().is_none());

        // Asking again for the same year is a fresh request
        app.step_year(1);
        app.step_year(-1);
        assert!(app.is_loading());
    }

    #[test]
    fn test_failed_year_keeps_previous_legend() {
        let mut app = world_app();
        app.apply_update(gdp(1960, &[("US", Some(5.0))]));
        app.step_year(1);
        assert!(app.is_loading());

        app.apply_update(QueryUpdate::IndicatorFailed {
            indicator: "NY.GDP.MKTP.CD".into(),
            year: 1961,
            error: QueryFailure::Status(500),
        });

        assert!(!app.is_loading());
        assert_eq!(app.view.year, 1961);
        assert_eq!(
            app.indicator_label(),
            Some(("GDP (current US$)".to_string(), 1960))
        );
        assert_eq!(app.legend().map(|l| l.max_label), Some("5".to_string()));
        assert_eq!(app.country_value("US"), Some(5.0));
    }

    #[test]
    fn test_world_hover_shows_value_or_no_data() {
        let mut app = world_app();
        app.apply_update(gdp(1960, &[("US", Some(1234567.0)), ("FR", None)]));

        app.hover = Some(Hover::Region(0));
        assert_eq!(app.hover_text().as_deref(), Some("United States: 1,234,567"));
        app.hover = Some(Hover::Region(1));
        assert_eq!(app.hover_text().as_deref(), Some("France: no data"));
        app.hover = Some(Hover::Region(3));
        assert_eq!(app.hover_text().as_deref(), Some("Antarctica: no data"));
        app.hover = None;
        assert_eq!(app.hover_text(), None);
    }

    #[test]
    fn test_country_selection_fetches_and_cancels() {
        let mut app = world_app();
        assert_eq!(app.select_region(1), vec![Command::FetchCountry("FR".into())]);
        assert_eq!(app.view.zoomed_region(), Some("FRA"));

        // Moving to another country while France is loading aborts it
        assert_eq!(
            app.select_region(2),
            vec![
                Command::CancelCountry("FR".into()),
                Command::FetchCountry("DE".into())
            ]
        );

        // A late France response no longer fills the panel
        app.apply_update(QueryUpdate::Country {
            code: "FR".into(),
            detail: detail("FR"),
        });
        assert!(matches!(app.detail(), Some(DetailState::Loading { iso2, .. }) if iso2 == "DE"));
    }

    #[test]
    fn test_country_detail_fills_panel() {
        let mut app = world_app();
        app.select_region(1);
        app.apply_update(QueryUpdate::Country {
            code: "FR".into(),
            detail: detail("FR"),
        });
        assert_eq!(app.detail(), Some(&DetailState::Ready(detail("FR"))));

        // Indicator change clears the panel
        let commands = app.step_indicator(1);
        assert_eq!(app.detail(), Some(&DetailState::Empty));
        assert_eq!(
            commands,
            vec![Command::FetchIndicator {
                indicator: "SP.POP.TOTL".into(),
                year: 1960
            }]
        );
    }

    #[test]
    fn test_region_without_code_clears_panel() {
        let mut app = world_app();
        app.select_region(1);
        let commands = app.select_region(3);
        assert_eq!(commands, vec![Command::CancelCountry("FR".into())]);
        assert_eq!(app.detail(), Some(&DetailState::Empty));
        assert_eq!(app.view.selected_region, None);
    }

    #[test]
    fn test_zoom_survives_reprojection() {
        let mut app = world_app();
        let fitted = app.viewport();
        app.select_region(1);
        app.cycle_projection();
        assert_eq!(app.projection(), Projection::Equirectangular);

        let zoomed = app.viewport();
        assert_eq!(zoomed.zoom, 4.0);
        let (cx, cy) = zoomed.center;
        assert!((cx - 5f64.to_radians()).abs() < 1e-6);
        assert!((cy - 45f64.to_radians()).abs() < 1e-6);

        app.select_region(1);
        assert_eq!(app.viewport().zoom, 1.0);
        assert_ne!(app.viewport(), fitted);
    }

    fn us_app() -> App {
        let station = |id: &str, name: &str, lon: f64, lat: f64| Station {
            id: id.into(),
            name: name.into(),
            lon,
            lat,
            planar: Projection::AlbersUsa.project(lon, lat).unwrap(),
        };
        let hourly = |pairs: &[(&str, f64)]| -> BTreeMap<String, f64> {
            pairs.iter().map(|(h, v)| (h.to_string(), *v)).collect()
        };

        let mut stats = StationStats::new();
        stats.insert(
            "690150".into(),
            StationStat {
                sum: 8000.0,
                hourly: hourly(&[("6", 100.0), ("12", 400.0)]),
            },
        );
        stats.insert(
            "722020".into(),
            StationStat {
                sum: 900.0,
                hourly: hourly(&[("9", 200.0)]),
            },
        );

        let data = UsData {
            regions: vec![square("06", "California", -124.0, 33.0)],
            stations: vec![
                station("690150", "TWENTYNINE PALMS", -116.16, 34.3),
                station("700000", "NO STATS", -110.0, 40.0),
                station("722020", "MIAMI INTL AP", -80.3, 25.8),
            ],
            stats,
        };
        App::us(data, &UsConfig::default(), 120, 40)
    }

    #[test]
    fn test_hourly_chart_for_selected_station() {
        let mut app = us_app();
        assert!(app.hourly_chart().is_none());

        app.step_station(1);
        let chart = app.hourly_chart().unwrap();
        assert_eq!(chart.title, "TWENTYNINE PALMS");
        assert_eq!(chart.y_max, 400.0);
        let hours: Vec<&str> = chart.bars.iter().map(|b| b.hour.as_str()).collect();
        assert_eq!(hours, vec!["6", "9", "12"]);
        assert_eq!(chart.bars[1].value, 0.0);
        assert_eq!(chart.bars[2].height, 1.0);
        assert_eq!(chart.bars[0].height, 0.25);
    }

    #[test]
    fn test_station_stepping_skips_stations_without_data() {
        let mut app = us_app();
        app.step_station(1);
        app.step_station(1);
        assert_eq!(app.view.selected_station.as_deref(), Some("722020"));
        app.step_station(1);
        assert_eq!(app.view.selected_station.as_deref(), Some("690150"));
        app.step_station(-1);
        assert_eq!(app.view.selected_station.as_deref(), Some("722020"));
    }

    #[test]
    fn test_station_without_stats_gets_default_marker() {
        let app = us_app();
        let layers = app.render_layers().unwrap();
        assert!(!layers.markers.is_empty());
        assert!(!layers.data_markers.is_empty());
        assert!(layers.selected.is_empty());
        assert!(app.region_fill(0).is_none());
    }

    #[test]
    fn test_us_hover_shows_station_sum() {
        let mut app = us_app();
        app.hover = Some(Hover::Station(0));
        assert_eq!(app.hover_text().as_deref(), Some("TWENTYNINE PALMS: 8,000"));
        app.hover = Some(Hover::Station(1));
        assert_eq!(app.hover_text().as_deref(), Some("NO STATS: no data"));
        app.hover = Some(Hover::Region(0));
        assert_eq!(app.hover_text().as_deref(), Some("California"));
    }

    #[test]
    fn test_failed_screen_has_no_map() {
        let err = LoadFailure::Empty {
            path: "stations.csv".into(),
        };
        let app = App::failed(MapKind::Us, &err, 80, 24);
        assert!(app.render_layers().is_none());
        assert!(matches!(&app.screen, Screen::Failed { error, .. } if error.contains("stations.csv")));
    }

    #[test]
    fn test_layout_leaves_room_for_panel() {
        let layout = ScreenLayout::new(120, 40);
        assert_eq!(layout.panel.width, PANEL_WIDTH);
        assert_eq!(layout.status, Rect::new(0, 39, 120, 1));
        assert_eq!(layout.map_inner(), Rect::new(1, 1, 120 - PANEL_WIDTH - 2, 37));
    }
}
