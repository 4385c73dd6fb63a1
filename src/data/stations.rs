use crate::error::LoadFailure;
use crate::map::Projection;
use crate::model::{Station, StationStats};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

const COL_ID: &str = "USAF";
const COL_NAME: &str = "STATION";
const COL_LON: &str = "NSRDB_LON(dd)";
const COL_LAT: &str = "NSRDB_LAT (dd)";

/// Load station metadata, keeping only stations the projection can place.
pub fn load_stations(path: &Path, projection: Projection) -> Result<Vec<Station>, LoadFailure> {
    let file = std::fs::File::open(path).map_err(|e| LoadFailure::io(path, e))?;
    let stations = read_stations(file, path, projection)?;
    info!(count = stations.len(), path = %path.display(), "loaded stations");
    Ok(stations)
}

pub fn read_stations<R: Read>(
    reader: R,
    path: &Path,
    projection: Projection,
) -> Result<Vec<Station>, LoadFailure> {
    let csv_err = |source| LoadFailure::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers().map_err(csv_err)?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| LoadFailure::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let (id_idx, name_idx, lon_idx, lat_idx) =
        (column(COL_ID)?, column(COL_NAME)?, column(COL_LON)?, column(COL_LAT)?);

    let mut stations = Vec::new();
    let mut dropped = 0usize;

    for result in rdr.records() {
        let record = result.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let invalid = |reason: String| LoadFailure::InvalidRow {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let id = field(&record, id_idx);
        if id.is_empty() {
            return Err(invalid("empty station id".into()));
        }
        let lon = parse_coord(&record, lon_idx).map_err(|r| invalid(format!("{COL_LON}: {r}")))?;
        let lat = parse_coord(&record, lat_idx).map_err(|r| invalid(format!("{COL_LAT}: {r}")))?;

        match projection.project(lon, lat) {
            Some(planar) => stations.push(Station {
                id: id.to_string(),
                name: field(&record, name_idx).to_string(),
                lon,
                lat,
                planar,
            }),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "stations outside the projection's domain");
    }
    if stations.is_empty() {
        return Err(LoadFailure::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(stations)
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_coord(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = field(record, idx);
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("not a coordinate: {raw:?}")),
    }
}

/// Load the per-station statistics mapping.
pub fn load_stats(path: &Path) -> Result<StationStats, LoadFailure> {
    let mut bytes = std::fs::read(path).map_err(|e| LoadFailure::io(path, e))?;
    let stats: StationStats =
        simd_json::serde::from_slice(&mut bytes).map_err(|e| LoadFailure::json(path, e))?;
    info!(count = stats.len(), path = %path.display(), "loaded station statistics");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CSV: &str = "\
USAF,STATION,NSRDB_LON(dd),NSRDB_LAT (dd)
690150,TWENTY NINE PALMS,-116.15,34.3
725090,BOSTON LOGAN INTL ARPT,-71.017,42.367
999999,OFFSHORE BUOY,-30.0,40.0
";

    #[test]
    fn test_reads_and_projects_stations() {
        let stations = read_stations(CSV.as_bytes(), Path::new("s.csv"), Projection::AlbersUsa).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[1].id, "725090");
        assert_eq!(stations[1].name, "BOSTON LOGAN INTL ARPT");
        assert_eq!(
            Some(stations[1].planar),
            Projection::AlbersUsa.project(-71.017, 42.367)
        );
    }

    #[test]
    fn test_rejects_bad_coordinate() {
        let csv = "USAF,STATION,NSRDB_LON(dd),NSRDB_LAT (dd)\n1,X,abc,40\n";
        let err = read_stations(csv.as_bytes(), Path::new("s.csv"), Projection::AlbersUsa).unwrap_err();
        match err {
            LoadFailure::InvalidRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn test_missing_column() {
        let csv = "USAF,STATION,LON,LAT\n1,X,-100,40\n";
        let err = read_stations(csv.as_bytes(), Path::new("s.csv"), Projection::AlbersUsa).unwrap_err();
        assert!(matches!(err, LoadFailure::MissingColumn { column, .. } if column == COL_LON));
    }

    #[test]
    fn test_load_stats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"725090": {{"sum": 8000, "hourly": {{"06:00:00 AM": 10, "07:00:00 AM": 25.5}}}}}}"#
        )
        .unwrap();
        let stats = load_stats(file.path()).unwrap();
        let boston = &stats["725090"];
        assert_eq!(boston.sum, 8000.0);
        assert_eq!(boston.hourly["07:00:00 AM"], 25.5);
    }

    #[test]
    fn test_load_stats_missing_file() {
        let err = load_stats(Path::new("/nonexistent/stats.json")).unwrap_err();
        assert!(matches!(err, LoadFailure::Io { .. }));
    }
}
