use crate::map::geometry::Bounds;
use std::collections::HashMap;

/// Spatial hash of point items in planar coordinates.
/// Used to find the station nearest to a click.
pub struct PointGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    points: Vec<(f64, f64)>,
    cell_size: f64,
}

impl PointGrid {
    pub fn build(points: impl IntoIterator<Item = (f64, f64)>, cell_size: f64) -> Self {
        let mut grid = Self {
            cells: HashMap::new(),
            points: Vec::new(),
            cell_size: cell_size.max(f64::EPSILON),
        };
        for (idx, p) in points.into_iter().enumerate() {
            let cell = grid.to_cell(p.0, p.1);
            grid.cells.entry(cell).or_default().push(idx);
            grid.points.push(p);
        }
        grid
    }

    #[inline(always)]
    fn to_cell(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Index of the closest point within `radius`, if any
    pub fn nearest(&self, x: f64, y: f64, radius: f64) -> Option<usize> {
        let center = self.to_cell(x, y);
        let reach = (radius / self.cell_size).ceil() as i32;
        let mut best: Option<(usize, f64)> = None;

        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let Some(indices) = self.cells.get(&(center.0 + dx, center.1 + dy)) else {
                    continue;
                };
                for &idx in indices {
                    let (px, py) = self.points[idx];
                    let d2 = (px - x).powi(2) + (py - y).powi(2);
                    if d2 <= radius * radius && best.map_or(true, |(_, b)| d2 < b) {
                        best = Some((idx, d2));
                    }
                }
            }
        }

        best.map(|(idx, _)| idx)
    }
}

/// Spatial index for region outlines using conservative approximation.
/// Each feature's bounding box is indexed into every cell it overlaps,
/// guaranteeing no false negatives while allowing false positives
/// (eliminated by the exact point-in-polygon test downstream).
pub struct FeatureGrid {
    cells: HashMap<(i32, i32), Vec<usize>>,
    cell_size: f64,
}

impl FeatureGrid {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cells: HashMap::new(),
            cell_size: cell_size.max(f64::EPSILON),
        }
    }

    #[inline(always)]
    fn to_cell(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Build from feature bounding boxes
    pub fn build<'a>(bboxes: impl IntoIterator<Item = &'a Bounds>, cell_size: f64) -> Self {
        let mut grid = Self::new(cell_size);
        for (idx, b) in bboxes.into_iter().enumerate() {
            let min_cell = grid.to_cell(b.min_x, b.min_y);
            let max_cell = grid.to_cell(b.max_x, b.max_y);
            for y in min_cell.1..=max_cell.1 {
                for x in min_cell.0..=max_cell.0 {
                    grid.cells.entry((x, y)).or_default().push(idx);
                }
            }
        }
        grid
    }

    /// Candidate features whose bbox cell covers the point
    pub fn query_point(&self, x: f64, y: f64) -> &[usize] {
        self.cells
            .get(&self.to_cell(x, y))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nearest_point_within_radius() {
        let grid = PointGrid::build([(0.0, 0.0), (1.0, 1.0), (1.2, 1.0)], 0.5);
        assert_eq!(grid.nearest(1.15, 1.0, 0.3), Some(2));
        assert_eq!(grid.nearest(0.1, 0.0, 0.3), Some(0));
        assert_eq!(grid.nearest(5.0, 5.0, 0.3), None);
    }

    #[test]
    fn test_feature_grid_is_conservative() {
        let boxes = [Bounds::new(0.0, 0.0, 2.5, 1.0), Bounds::new(3.0, 3.0, 4.0, 4.0)];
        let grid = FeatureGrid::build(boxes.iter(), 1.0);
        assert_eq!(grid.query_point(2.2, 0.5), &[0]);
        assert!(grid.query_point(3.5, 0.5).is_empty());
        assert_eq!(grid.query_point(3.9, 3.9), &[1]);
    }
}
