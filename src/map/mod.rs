mod geometry;
mod projection;
mod renderer;
mod spatial;

pub use geometry::Bounds;
pub use projection::{Projection, Viewport};
pub use renderer::{MapLayers, MapRenderer, Marker, MarkerKind, ProjectedScene};
