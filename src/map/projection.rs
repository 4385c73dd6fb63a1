use crate::map::geometry::Bounds;
use glam::DVec3;
use std::f64::consts::FRAC_PI_4;

/// Latitude limit for Mercator, where the projection runs off to infinity
const MERCATOR_MAX_LAT: f64 = 85.05113;

/// Points further than this from the stereographic center are dropped
const STEREO_CLIP_DEG: f64 = 142.0;

/// Geographic projection from (lon, lat) degrees to unitless planar
/// coordinates with y pointing north. Planar units are fitted to the
/// screen by [`Viewport::fit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    Mercator,
    Equirectangular,
    Stereographic,
    /// Conic equal-area for the lower 48 with Alaska and Hawaii insets
    AlbersUsa,
}

impl Projection {
    pub fn name(&self) -> &'static str {
        match self {
            Projection::Mercator => "mercator",
            Projection::Equirectangular => "equiRect",
            Projection::Stereographic => "stereo",
            Projection::AlbersUsa => "albersUsa",
        }
    }

    /// Project a point; `None` when it lies outside the projection's domain.
    pub fn project(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        match self {
            Projection::Mercator => {
                let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT).to_radians();
                Some((lon.to_radians(), (FRAC_PI_4 + lat / 2.0).tan().ln()))
            }
            Projection::Equirectangular => Some((lon.to_radians(), lat.to_radians())),
            Projection::Stereographic => AzimuthalFrame::new(0.0, 0.0).stereographic(lon, lat),
            Projection::AlbersUsa => albers_usa(lon, lat),
        }
    }
}

/// Orthonormal frame looking at a point on the unit sphere.
struct AzimuthalFrame {
    forward: DVec3,
    right: DVec3,
    up: DVec3,
}

impl AzimuthalFrame {
    fn new(center_lon: f64, center_lat: f64) -> Self {
        let lon_rad = center_lon.to_radians();
        let lat_rad = center_lat.to_radians();

        let forward = lonlat_to_vec3(center_lon, center_lat);

        // Derivative of forward w.r.t. latitude, i.e. north
        let raw_up = DVec3::new(
            -lat_rad.sin() * lon_rad.cos(),
            -lat_rad.sin() * lon_rad.sin(),
            lat_rad.cos(),
        );

        let right = raw_up.cross(forward).normalize();
        let up = forward.cross(right).normalize();

        Self { forward, right, up }
    }

    fn stereographic(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        let p = lonlat_to_vec3(lon, lat);
        let cos_c = p.dot(self.forward);
        if cos_c < STEREO_CLIP_DEG.to_radians().cos() {
            return None;
        }
        let k = 2.0 / (1.0 + cos_c);
        Some((k * p.dot(self.right), k * p.dot(self.up)))
    }
}

#[inline(always)]
fn lonlat_to_vec3(lon: f64, lat: f64) -> DVec3 {
    let lon_rad = lon.to_radians();
    let lat_rad = lat.to_radians();
    DVec3::new(
        lat_rad.cos() * lon_rad.cos(),
        lat_rad.cos() * lon_rad.sin(),
        lat_rad.sin(),
    )
}

/// Spherical Albers conic equal-area with standard parallels `phi1`, `phi2`.
struct Albers {
    n: f64,
    c: f64,
    rho0: f64,
    lon0: f64,
}

impl Albers {
    fn new(phi1: f64, phi2: f64, lat0: f64, lon0: f64) -> Self {
        let (s1, s2) = (phi1.to_radians().sin(), phi2.to_radians().sin());
        let n = (s1 + s2) / 2.0;
        let c = phi1.to_radians().cos().powi(2) + 2.0 * n * s1;
        let rho0 = (c - 2.0 * n * lat0.to_radians().sin()).sqrt() / n;
        Self { n, c, rho0, lon0 }
    }

    fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        let theta = self.n * (lon - self.lon0).to_radians();
        let rho = (self.c - 2.0 * self.n * lat.to_radians().sin()).max(0.0).sqrt() / self.n;
        (rho * theta.sin(), self.rho0 - rho * theta.cos())
    }
}

fn albers_usa(lon: f64, lat: f64) -> Option<(f64, f64)> {
    let in_alaska = lat >= 50.0 && (lon <= -129.0 || lon >= 170.0);
    let in_hawaii = (18.0..=23.0).contains(&lat) && (-161.0..=-154.0).contains(&lon);
    let in_lower48 = (23.0..=50.0).contains(&lat) && (-125.0..=-66.0).contains(&lon);

    if in_lower48 {
        Some(Albers::new(29.5, 45.5, 37.5, -96.0).project(lon, lat))
    } else if in_alaska {
        // Aleutians past the antimeridian continue westward
        let lon = if lon > 0.0 { lon - 360.0 } else { lon };
        let (x, y) = Albers::new(55.0, 65.0, 50.0, -154.0).project(lon, lat);
        Some((x * 0.35 - 0.307, y * 0.35 - 0.201))
    } else if in_hawaii {
        let (x, y) = Albers::new(8.0, 18.0, 20.0, -157.0).project(lon, lat);
        Some((x - 0.205, y - 0.212))
    } else {
        None
    }
}

/// Viewport mapping planar coordinates to braille pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Planar point shown at the canvas center
    pub center: (f64, f64),
    /// Multiplier on top of the fitted scale (1 = whole map)
    pub zoom: f64,
    /// Pixels per planar unit at zoom 1
    pub scale: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    /// Fit `bounds` into the canvas with a small margin
    pub fn fit(bounds: &Bounds, width: usize, height: usize) -> Self {
        let (bw, bh) = (bounds.width().max(1e-9), bounds.height().max(1e-9));
        let scale = (width as f64 / bw).min(height as f64 / bh) * 0.95;
        Self {
            center: bounds.center(),
            zoom: 1.0,
            scale,
            width,
            height,
        }
    }

    /// Same fit, looking at `center` with magnification `zoom`
    pub fn focused(&self, center: (f64, f64), zoom: f64) -> Self {
        Self {
            center,
            zoom,
            ..self.clone()
        }
    }

    /// Braille pixels per planar unit at the current zoom
    #[inline]
    pub fn pixels_per_unit(&self) -> f64 {
        self.scale * self.zoom
    }

    /// Project a planar point to pixel coordinates
    #[inline]
    pub fn project(&self, (x, y): (f64, f64)) -> (i32, i32) {
        let k = self.pixels_per_unit();
        let px = (x - self.center.0) * k + self.width as f64 / 2.0;
        let py = self.height as f64 / 2.0 - (y - self.center.1) * k;
        (px.round() as i32, py.round() as i32)
    }

    /// Pixel coordinates back to the planar point
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let k = self.pixels_per_unit();
        let x = (px as f64 - self.width as f64 / 2.0) / k + self.center.0;
        let y = (self.height as f64 / 2.0 - py as f64) / k + self.center.1;
        (x, y)
    }

    /// Planar bounds currently on screen
    pub fn visible_bounds(&self) -> Bounds {
        let (x0, y0) = self.unproject(0, self.height as i32);
        let (x1, y1) = self.unproject(self.width as i32, 0);
        Bounds::new(x0, y0, x1, y1)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= -10 && px < self.width as i32 + 10 && py >= -10 && py < self.height as i32 + 10
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_origin() {
        let (x, y) = Projection::Mercator.project(0.0, 0.0).unwrap();
        assert!(x.abs() < 1e-12 && y.abs() < 1e-12);
        let (_, north) = Projection::Mercator.project(0.0, 60.0).unwrap();
        assert!(north > 60f64.to_radians());
    }

    #[test]
    fn test_mercator_clamps_poles() {
        let (_, y) = Projection::Mercator.project(10.0, 90.0).unwrap();
        assert!(y.is_finite());
    }

    #[test]
    fn test_stereographic_east_is_positive_x() {
        let (x, y) = Projection::Stereographic.project(30.0, 0.0).unwrap();
        assert!(x > 0.0);
        assert!(y.abs() < 1e-9);
        let (_, y) = Projection::Stereographic.project(0.0, 30.0).unwrap();
        assert!(y > 0.0);
    }

    #[test]
    fn test_stereographic_clips_antipode() {
        assert!(Projection::Stereographic.project(180.0, 0.0).is_none());
    }

    #[test]
    fn test_albers_usa_domains() {
        let boston = Projection::AlbersUsa.project(-71.06, 42.36).unwrap();
        let seattle = Projection::AlbersUsa.project(-122.33, 47.6).unwrap();
        assert!(boston.0 > seattle.0);
        assert!(Projection::AlbersUsa.project(-149.9, 61.2).is_some()); // Anchorage
        assert!(Projection::AlbersUsa.project(-157.86, 21.31).is_some()); // Honolulu
        assert!(Projection::AlbersUsa.project(2.35, 48.86).is_none()); // Paris
    }

    #[test]
    fn test_viewport_round_trip() {
        let bounds = Bounds::new(-1.0, -0.5, 1.0, 0.5);
        let vp = Viewport::fit(&bounds, 200, 100);
        assert_eq!(vp.project((0.0, 0.0)), (100, 50));
        let (x, y) = vp.unproject(150, 25);
        let (px, py) = vp.project((x, y));
        assert_eq!((px, py), (150, 25));
    }

    #[test]
    fn test_focused_keeps_fit() {
        let vp = Viewport::fit(&Bounds::new(0.0, 0.0, 4.0, 2.0), 80, 40);
        let zoomed = vp.focused((1.0, 1.0), 4.0);
        assert_eq!(zoomed.scale, vp.scale);
        assert_eq!(zoomed.project((1.0, 1.0)), (40, 20));
    }
}
