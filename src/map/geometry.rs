use crate::braille::BrailleCanvas;

/// Axis-aligned planar rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            min_y: y0.min(y1),
            max_x: x0.max(x1),
            max_y: y0.max(y1),
        }
    }

    /// Bounds of a point set; `None` if empty
    pub fn of_points<'a>(points: impl IntoIterator<Item = &'a (f64, f64)>) -> Option<Self> {
        points.into_iter().fold(None, |acc, &(x, y)| {
            Some(match acc {
                None => Bounds::new(x, y, x, y),
                Some(b) => b.including(x, y),
            })
        })
    }

    pub fn including(self, x: f64, y: f64) -> Self {
        Self {
            min_x: self.min_x.min(x),
            min_y: self.min_y.min(y),
            max_x: self.max_x.max(x),
            max_y: self.max_y.max(y),
        }
    }

    pub fn union(self, other: Bounds) -> Self {
        self.including(other.min_x, other.min_y)
            .including(other.max_x, other.max_y)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }
}

/// Even-odd crossing test against a single ring
pub fn point_in_ring(x: f64, y: f64, ring: &[(f64, f64)]) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Inside the exterior ring and outside every hole
pub fn point_in_polygon(x: f64, y: f64, rings: &[Vec<(f64, f64)>]) -> bool {
    match rings.split_first() {
        Some((exterior, holes)) => {
            point_in_ring(x, y, exterior) && !holes.iter().any(|h| point_in_ring(x, y, h))
        }
        None => false,
    }
}

/// Area-weighted centroid over the exterior rings of several polygons.
/// Degenerate (zero-area) input falls back to the mean vertex.
pub fn polygons_centroid(polygons: &[Vec<Vec<(f64, f64)>>]) -> Option<(f64, f64)> {
    let mut area_sum = 0.0;
    let mut cx = 0.0;
    let mut cy = 0.0;

    for exterior in polygons.iter().filter_map(|p| p.first()) {
        let n = exterior.len();
        if n < 3 {
            continue;
        }
        let mut a = 0.0;
        let mut rx = 0.0;
        let mut ry = 0.0;
        for i in 0..n {
            let (x0, y0) = exterior[i];
            let (x1, y1) = exterior[(i + 1) % n];
            let cross = x0 * y1 - x1 * y0;
            a += cross;
            rx += (x0 + x1) * cross;
            ry += (y0 + y1) * cross;
        }
        // a is twice the signed area; the sign cancels in rx / (3a)
        if a.abs() > f64::EPSILON {
            let weight = a.abs() / 2.0;
            cx += rx / (3.0 * a) * weight;
            cy += ry / (3.0 * a) * weight;
            area_sum += weight;
        }
    }

    if area_sum > 0.0 {
        return Some((cx / area_sum, cy / area_sum));
    }

    let points: Vec<(f64, f64)> = polygons.iter().flatten().flatten().copied().collect();
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    Some((sx / n, sy / n))
}

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Two-pixel line for the active region outline
pub fn draw_thick_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    draw_line(canvas, x0, y0, x1, y1);
    draw_line(canvas, x0 + 1, y0, x1 + 1, y1);
}

/// Filled disc; radius 0 sets a single dot
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_signed(cx + dx, cy + dy);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, side: f64) -> Vec<(f64, f64)> {
        vec![
            (x0, y0),
            (x0 + side, y0),
            (x0 + side, y0 + side),
            (x0, y0 + side),
            (x0, y0),
        ]
    }

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.to_string(), "⡇\n⡇");
    }

    #[test]
    fn test_zero_radius_circle_is_one_dot() {
        let mut canvas = BrailleCanvas::new(2, 1);
        draw_circle(&mut canvas, 1, 1, 0);
        assert_eq!(canvas.to_string(), "⠐⠀");
    }

    #[test]
    fn test_point_in_polygon_with_hole() {
        let rings = vec![square(0.0, 0.0, 10.0), square(4.0, 4.0, 2.0)];
        assert!(point_in_polygon(1.0, 1.0, &rings));
        assert!(!point_in_polygon(5.0, 5.0, &rings));
        assert!(!point_in_polygon(11.0, 5.0, &rings));
    }

    #[test]
    fn test_centroid_weighs_by_area() {
        let polygons = vec![vec![square(0.0, 0.0, 2.0)], vec![square(10.0, 0.0, 2.0)]];
        let (cx, cy) = polygons_centroid(&polygons).unwrap();
        assert!((cx - 6.0).abs() < 1e-9);
        assert!((cy - 1.0).abs() < 1e-9);

        let mut reversed = square(0.0, 0.0, 2.0);
        reversed.reverse();
        let (cx, cy) = polygons_centroid(&[vec![reversed]]).unwrap();
        assert!((cx - 1.0).abs() < 1e-9 && (cy - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_of_degenerate_ring() {
        let line = vec![vec![vec![(0.0, 0.0), (2.0, 0.0), (4.0, 0.0)]]];
        assert_eq!(polygons_centroid(&line), Some((2.0, 0.0)));
        assert_eq!(polygons_centroid(&[]), None);
    }

    #[test]
    fn test_bounds_union_and_intersection() {
        let a = Bounds::new(0.0, 0.0, 1.0, 1.0);
        let b = Bounds::new(2.0, 2.0, 3.0, 3.0);
        assert!(!a.intersects(&b));
        let u = a.union(b);
        assert_eq!(u, Bounds::new(0.0, 0.0, 3.0, 3.0));
        assert!(u.intersects(&b));
        assert_eq!(u.center(), (1.5, 1.5));
    }
}
