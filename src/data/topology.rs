//! TopoJSON decoding: shared, quantized arcs stitched back into region rings.

use crate::error::LoadFailure;
use crate::model::{Polygon, Region, Ring};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct Topology {
    #[serde(default)]
    transform: Option<Transform>,
    arcs: Vec<Vec<Vec<f64>>>,
    objects: HashMap<String, TopoGeometry>,
}

#[derive(Debug, Deserialize)]
struct Transform {
    scale: [f64; 2],
    translate: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TopoGeometry {
    GeometryCollection {
        geometries: Vec<TopoGeometry>,
    },
    Polygon {
        arcs: Vec<Vec<i64>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Option<HashMap<String, serde_json::Value>>,
    },
    MultiPolygon {
        arcs: Vec<Vec<Vec<i64>>>,
        #[serde(default)]
        id: Option<serde_json::Value>,
        #[serde(default)]
        properties: Option<HashMap<String, serde_json::Value>>,
    },
    #[serde(other)]
    Other,
}

/// Decode every polygonal feature of `object` in a TopoJSON file.
pub fn load_regions(path: &Path, object: &str) -> Result<Vec<Region>, LoadFailure> {
    let bytes = std::fs::read(path).map_err(|e| LoadFailure::io(path, e))?;
    decode_regions(bytes, object, path)
}

pub fn decode_regions(
    mut bytes: Vec<u8>,
    object: &str,
    path: &Path,
) -> Result<Vec<Region>, LoadFailure> {
    let topology: Topology =
        simd_json::serde::from_slice(&mut bytes).map_err(|e| LoadFailure::json(path, e))?;

    let arcs = decode_arcs(&topology);
    let root = topology
        .objects
        .get(object)
        .ok_or_else(|| LoadFailure::topology(path, format!("no object named {object:?}")))?;

    let mut regions = Vec::new();
    collect_regions(root, &arcs, path, &mut regions)?;

    if regions.is_empty() {
        return Err(LoadFailure::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(regions)
}

/// Absolute (lon, lat) positions for every arc
fn decode_arcs(topology: &Topology) -> Vec<Vec<(f64, f64)>> {
    topology
        .arcs
        .iter()
        .map(|arc| match &topology.transform {
            Some(t) => {
                let (mut x, mut y) = (0.0, 0.0);
                arc.iter()
                    .filter(|p| p.len() >= 2)
                    .map(|p| {
                        x += p[0];
                        y += p[1];
                        (x * t.scale[0] + t.translate[0], y * t.scale[1] + t.translate[1])
                    })
                    .collect()
            }
            None => arc
                .iter()
                .filter(|p| p.len() >= 2)
                .map(|p| (p[0], p[1]))
                .collect(),
        })
        .collect()
}

fn collect_regions(
    geometry: &TopoGeometry,
    arcs: &[Vec<(f64, f64)>],
    path: &Path,
    out: &mut Vec<Region>,
) -> Result<(), LoadFailure> {
    match geometry {
        TopoGeometry::GeometryCollection { geometries } => {
            for g in geometries {
                collect_regions(g, arcs, path, out)?;
            }
        }
        TopoGeometry::Polygon {
            arcs: rings,
            id,
            properties,
        } => {
            let polygon = stitch_polygon(rings, arcs, path)?;
            out.push(region(out.len(), id, properties, vec![polygon]));
        }
        TopoGeometry::MultiPolygon {
            arcs: polygons,
            id,
            properties,
        } => {
            let polygons = polygons
                .iter()
                .map(|rings| stitch_polygon(rings, arcs, path))
                .collect::<Result<Vec<_>, _>>()?;
            out.push(region(out.len(), id, properties, polygons));
        }
        TopoGeometry::Other => {}
    }
    Ok(())
}

fn region(
    index: usize,
    id: &Option<serde_json::Value>,
    properties: &Option<HashMap<String, serde_json::Value>>,
    polygons: Vec<Polygon>,
) -> Region {
    let id = match id {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => index.to_string(),
    };
    let name = properties
        .as_ref()
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Region { id, name, polygons }
}

fn stitch_polygon(
    rings: &[Vec<i64>],
    arcs: &[Vec<(f64, f64)>],
    path: &Path,
) -> Result<Polygon, LoadFailure> {
    rings.iter().map(|r| stitch_ring(r, arcs, path)).collect()
}

/// Concatenate arcs into a ring. A negative index `i` means arc `!i` reversed;
/// the first point of each following arc repeats the previous arc's last point.
fn stitch_ring(indices: &[i64], arcs: &[Vec<(f64, f64)>], path: &Path) -> Result<Ring, LoadFailure> {
    let mut ring: Ring = Vec::new();
    for &index in indices {
        let (arc_idx, reversed) = if index < 0 { (!index, true) } else { (index, false) };
        let arc = usize::try_from(arc_idx)
            .ok()
            .and_then(|i| arcs.get(i))
            .ok_or_else(|| LoadFailure::topology(path, format!("arc index {index} out of range")))?;

        let skip = usize::from(!ring.is_empty());
        if reversed {
            ring.extend(arc.iter().rev().skip(skip));
        } else {
            ring.extend(arc.iter().skip(skip));
        }
    }
    Ok(ring)
}
