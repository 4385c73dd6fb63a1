use crate::braille::BrailleCanvas;
use crate::map::geometry::{
    draw_circle, draw_line, draw_thick_line, point_in_polygon, polygons_centroid, Bounds,
};
use crate::map::projection::{Projection, Viewport};
use crate::map::spatial::{FeatureGrid, PointGrid};
use crate::model::{Polygon, Region};
use crate::scale::Rgb;
use rayon::prelude::*;

/// Marker radii are given in pixels of a map this many pixels wide
const REFERENCE_WIDTH: f64 = 960.0;

/// Smallest click target around a marker, in braille pixels
const MIN_HIT_RADIUS_PX: f64 = 2.0;

/// Grid cells per axis of the region spatial index
const GRID_DIVISIONS: f64 = 32.0;

/// A region already projected to planar coordinates.
pub struct ProjectedRegion {
    pub polygons: Vec<Polygon>,
    pub bounds: Bounds,
    pub centroid: Option<(f64, f64)>,
}

impl ProjectedRegion {
    fn contains(&self, x: f64, y: f64) -> bool {
        self.bounds.contains(x, y) && self.polygons.iter().any(|p| point_in_polygon(x, y, p))
    }
}

/// Regions and stations under one projection, with spatial indexes for
/// hit testing and fills. Rebuilt whenever the projection changes.
pub struct ProjectedScene {
    regions: Vec<ProjectedRegion>,
    region_grid: FeatureGrid,
    stations: Vec<(f64, f64)>,
    station_grid: PointGrid,
    bounds: Bounds,
}

impl ProjectedScene {
    /// Project region outlines. Station positions are already planar.
    pub fn build(regions: &[Region], stations: Vec<(f64, f64)>, projection: Projection) -> Self {
        let regions: Vec<ProjectedRegion> = regions
            .par_iter()
            .map(|region| project_region(region, projection))
            .collect();

        let bounds = regions
            .iter()
            .filter(|r| !r.polygons.is_empty())
            .map(|r| r.bounds)
            .chain(Bounds::of_points(&stations))
            .reduce(Bounds::union)
            .unwrap_or(Bounds::new(-1.0, -1.0, 1.0, 1.0));

        let cell = (bounds.width().max(bounds.height()) / GRID_DIVISIONS).max(1e-6);
        let region_grid = FeatureGrid::build(regions.iter().map(|r| &r.bounds), cell);
        let station_grid = PointGrid::build(stations.iter().copied(), cell / 4.0);

        Self {
            regions,
            region_grid,
            stations,
            station_grid,
            bounds,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn centroid(&self, region: usize) -> Option<(f64, f64)> {
        self.regions.get(region).and_then(|r| r.centroid)
    }

    pub fn station(&self, idx: usize) -> Option<(f64, f64)> {
        self.stations.get(idx).copied()
    }

    /// Region containing a planar point
    pub fn region_at(&self, x: f64, y: f64) -> Option<usize> {
        self.region_grid
            .query_point(x, y)
            .iter()
            .copied()
            .find(|&idx| self.regions[idx].contains(x, y))
    }

    /// Station closest to a planar point, within `radius` planar units
    pub fn station_near(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        self.station_grid.nearest(x, y, radius)
    }
}

fn project_region(region: &Region, projection: Projection) -> ProjectedRegion {
    let polygons: Vec<Polygon> = region
        .polygons
        .iter()
        .filter_map(|polygon| {
            let mut rings = polygon.iter().map(|ring| {
                ring.iter()
                    .filter_map(|&(lon, lat)| projection.project(lon, lat))
                    .collect::<Vec<_>>()
            });
            // A polygon whose exterior is clipped away is dropped whole
            let exterior = rings.next().filter(|ring| ring.len() >= 3)?;
            Some(
                std::iter::once(exterior)
                    .chain(rings.filter(|ring| ring.len() >= 3))
                    .collect::<Polygon>(),
            )
        })
        .collect();

    let bounds = Bounds::of_points(polygons.iter().flatten().flatten())
        .unwrap_or(Bounds::new(0.0, 0.0, 0.0, 0.0));
    let centroid = polygons_centroid(&polygons);

    ProjectedRegion {
        polygons,
        bounds,
        centroid,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkerKind {
    NoData,
    Data,
    Selected,
}

/// A station dot to draw
#[derive(Clone, Copy, Debug)]
pub struct Marker {
    pub station: usize,
    /// Radius in pixels of the reference-width map
    pub radius: f64,
    pub kind: MarkerKind,
}

/// Rendered map, one braille canvas per color layer plus the cell fills.
pub struct MapLayers {
    pub cols: usize,
    pub rows: usize,
    /// Background color of each character cell, row-major
    pub fills: Vec<Option<Rgb>>,
    pub borders: BrailleCanvas,
    pub active: BrailleCanvas,
    pub markers: BrailleCanvas,
    pub data_markers: BrailleCanvas,
    pub selected: BrailleCanvas,
}

impl MapLayers {
    fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            fills: vec![None; cols * rows],
            borders: BrailleCanvas::new(cols, rows),
            active: BrailleCanvas::new(cols, rows),
            markers: BrailleCanvas::new(cols, rows),
            data_markers: BrailleCanvas::new(cols, rows),
            selected: BrailleCanvas::new(cols, rows),
        }
    }

    pub fn fill(&self, col: usize, row: usize) -> Option<Rgb> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.fills[row * self.cols + col]
    }
}

/// Draws a [`ProjectedScene`] through a [`Viewport`].
pub struct MapRenderer<'a> {
    scene: &'a ProjectedScene,
    viewport: &'a Viewport,
}

impl<'a> MapRenderer<'a> {
    pub fn new(scene: &'a ProjectedScene, viewport: &'a Viewport) -> Self {
        Self { scene, viewport }
    }

    /// Render into a `cols` x `rows` cell grid. `fill` gives each region's
    /// color (`None` leaves the cell unpainted).
    pub fn render<F>(
        &self,
        cols: usize,
        rows: usize,
        fill: F,
        active: Option<usize>,
        markers: &[Marker],
    ) -> MapLayers
    where
        F: Fn(usize) -> Option<Rgb> + Sync,
    {
        let mut layers = MapLayers::new(cols, rows);
        let visible = self.viewport.visible_bounds();

        self.fill_cells(&mut layers, &fill);

        for (idx, region) in self.scene.regions.iter().enumerate() {
            if !region.bounds.intersects(&visible) {
                continue;
            }
            let canvas = if Some(idx) == active {
                &mut layers.active
            } else {
                &mut layers.borders
            };
            for ring in region.polygons.iter().flatten() {
                self.draw_ring(canvas, ring, Some(idx) == active);
            }
        }

        for marker in markers {
            let Some(planar) = self.scene.station(marker.station) else {
                continue;
            };
            let (px, py) = self.viewport.project(planar);
            if !self.viewport.is_visible(px, py) {
                continue;
            }
            let canvas = match marker.kind {
                MarkerKind::NoData => &mut layers.markers,
                MarkerKind::Data => &mut layers.data_markers,
                MarkerKind::Selected => &mut layers.selected,
            };
            draw_circle(canvas, px, py, self.marker_radius_px(marker.radius).round() as i32);
        }

        layers
    }

    /// Sample each cell's center and color it by the region underneath
    fn fill_cells<F>(&self, layers: &mut MapLayers, fill: &F)
    where
        F: Fn(usize) -> Option<Rgb> + Sync,
    {
        let cols = layers.cols;
        if cols == 0 {
            return;
        }
        let scene = self.scene;
        let viewport = self.viewport;

        layers
            .fills
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, cells)| {
                for (col, cell) in cells.iter_mut().enumerate() {
                    let (x, y) = viewport.unproject(col as i32 * 2 + 1, row as i32 * 4 + 2);
                    *cell = scene.region_at(x, y).and_then(fill);
                }
            });
    }

    /// Draw a closed ring with viewport culling
    fn draw_ring(&self, canvas: &mut BrailleCanvas, ring: &[(f64, f64)], thick: bool) {
        if ring.len() < 2 {
            return;
        }

        let mut prev: Option<(i32, i32)> = None;
        let closing = ring.first().filter(|first| Some(*first) != ring.last());

        for &point in ring.iter().chain(closing) {
            let (px, py) = self.viewport.project(point);

            if let Some((prev_x, prev_y)) = prev {
                // Long jumps are seams where the projection wrapped
                let dist = ((px - prev_x).abs() + (py - prev_y).abs()) as usize;
                if dist < self.viewport.width
                    && self.viewport.line_might_be_visible((prev_x, prev_y), (px, py))
                {
                    if thick {
                        draw_thick_line(canvas, prev_x, prev_y, px, py);
                    } else {
                        draw_line(canvas, prev_x, prev_y, px, py);
                    }
                }
            }

            prev = Some((px, py));
        }
    }

    /// Reference-map pixels to braille pixels at the current zoom, capped at
    /// the canvas diagonal
    fn marker_radius_px(&self, radius: f64) -> f64 {
        let diagonal = (self.viewport.width as f64).hypot(self.viewport.height as f64);
        (radius * self.viewport.zoom * self.viewport.width as f64 / REFERENCE_WIDTH).min(diagonal)
    }

    /// Region under a braille pixel
    pub fn region_at_pixel(&self, px: i32, py: i32) -> Option<usize> {
        let (x, y) = self.viewport.unproject(px, py);
        self.scene.region_at(x, y)
    }

    /// Station under a braille pixel. The click target is the larger of the
    /// drawn marker and a small minimum.
    pub fn station_at_pixel(&self, px: i32, py: i32, max_radius: f64) -> Option<usize> {
        let (x, y) = self.viewport.unproject(px, py);
        let radius_px = self.marker_radius_px(max_radius).max(MIN_HIT_RADIUS_PX);
        self.scene
            .station_near(x, y, radius_px / self.viewport.pixels_per_unit())
    }
}
