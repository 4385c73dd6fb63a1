use crate::map::Viewport;

/// Zoom state of a map. Zoom is kept by region id so it survives
/// re-projection.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ZoomState {
    #[default]
    Unzoomed,
    Zoomed(String),
}

/// Everything the user has chosen. Handlers never mutate a `ViewState`;
/// they return the next one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub selected_station: Option<String>,
    /// Region whose detail panel is open (world map)
    pub selected_region: Option<String>,
    pub zoom: ZoomState,
    pub projection: usize,
    pub indicator: usize,
    pub year: u16,
}

impl ViewState {
    pub fn new(year: u16) -> Self {
        Self {
            selected_station: None,
            selected_region: None,
            zoom: ZoomState::Unzoomed,
            projection: 0,
            indicator: 0,
            year,
        }
    }

    /// Zoom to `region`, or back out when it is already the zoomed one.
    pub fn click_region(&self, region: &str) -> Self {
        let zoom = match &self.zoom {
            ZoomState::Zoomed(current) if current == region => ZoomState::Unzoomed,
            _ => ZoomState::Zoomed(region.to_string()),
        };
        Self {
            zoom,
            ..self.clone()
        }
    }

    pub fn reset_zoom(&self) -> Self {
        Self {
            zoom: ZoomState::Unzoomed,
            ..self.clone()
        }
    }

    pub fn select_station(&self, station: Option<&str>) -> Self {
        Self {
            selected_station: station.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn select_region(&self, region: Option<&str>) -> Self {
        Self {
            selected_region: region.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn cycle_projection(&self, count: usize) -> Self {
        Self {
            projection: (self.projection + 1) % count.max(1),
            ..self.clone()
        }
    }

    /// Step through indicators, wrapping at both ends. Changing the
    /// indicator closes the detail panel.
    pub fn step_indicator(&self, delta: isize, count: usize) -> Self {
        if count == 0 {
            return self.clone();
        }
        let next = (self.indicator as isize + delta).rem_euclid(count as isize) as usize;
        Self {
            indicator: next,
            selected_region: None,
            ..self.clone()
        }
    }

    /// Step the year, clamped to `first..=last`
    pub fn step_year(&self, delta: i32, first: u16, last: u16) -> Self {
        let year = (self.year as i32 + delta).clamp(first as i32, last as i32) as u16;
        Self {
            year,
            ..self.clone()
        }
    }

    pub fn zoomed_region(&self) -> Option<&str> {
        match &self.zoom {
            ZoomState::Zoomed(id) => Some(id),
            ZoomState::Unzoomed => None,
        }
    }

    /// Viewport for the current zoom. `centroid` resolves a region id to
    /// its planar centroid under the current projection; a region that no
    /// longer resolves leaves the map unzoomed.
    pub fn viewport<F>(&self, fitted: &Viewport, zoom_scale: f64, centroid: F) -> Viewport
    where
        F: FnOnce(&str) -> Option<(f64, f64)>,
    {
        match self.zoomed_region().and_then(centroid) {
            Some(center) => fitted.focused(center, zoom_scale),
            None => fitted.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Bounds;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clicking_zoomed_region_twice_restores_unzoomed() {
        let start = ViewState::new(2000);
        let zoomed = start.click_region("06");
        assert_eq!(zoomed.zoom, ZoomState::Zoomed("06".into()));
        let back = zoomed.click_region("06");
        assert_eq!(back, start);
    }

    #[test]
    fn test_clicking_other_region_moves_zoom() {
        let view = ViewState::new(2000).click_region("06").click_region("48");
        assert_eq!(view.zoomed_region(), Some("48"));
        assert_eq!(view.reset_zoom().zoom, ZoomState::Unzoomed);
    }

    #[test]
    fn test_unzoomed_viewport_is_the_fitted_one() {
        let fitted = Viewport::fit(&Bounds::new(-2.0, -1.0, 2.0, 1.0), 160, 80);
        let view = ViewState::new(2000).click_region("FRA").click_region("FRA");
        assert_eq!(view.viewport(&fitted, 4.0, |_| Some((1.0, 0.5))), fitted);
    }

    #[test]
    fn test_zoomed_viewport_centers_on_region() {
        let fitted = Viewport::fit(&Bounds::new(-2.0, -1.0, 2.0, 1.0), 160, 80);
        let view = ViewState::new(2000).click_region("FRA");
        let vp = view.viewport(&fitted, 4.0, |id| (id == "FRA").then_some((1.0, 0.5)));
        assert_eq!(vp.zoom, 4.0);
        assert_eq!(vp.project((1.0, 0.5)), (80, 40));

        let lost = view.viewport(&fitted, 4.0, |_| None);
        assert_eq!(lost, fitted);
    }

    #[test]
    fn test_indicator_wraps_and_clears_detail() {
        let view = ViewState::new(2000).select_region(Some("FRA"));
        let prev = view.step_indicator(-1, 3);
        assert_eq!(prev.indicator, 2);
        assert_eq!(prev.selected_region, None);
        assert_eq!(prev.step_indicator(1, 3).indicator, 0);
    }

    #[test]
    fn test_year_is_clamped() {
        let view = ViewState::new(2013);
        assert_eq!(view.step_year(1, 1960, 2013).year, 2013);
        assert_eq!(view.step_year(-60, 1960, 2013).year, 1960);
    }

    #[test]
    fn test_projection_cycles() {
        let view = ViewState::new(2000);
        let order: Vec<usize> = std::iter::successors(Some(view), |v| Some(v.cycle_projection(3)))
            .take(4)
            .map(|v| v.projection)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 0]);
    }
}
