//! Boundary loading: ESRI shapefiles and GeoJSON feature collections.

use std::path::Path;

use geo::{BoundingRect, LineString, MultiPolygon, Polygon, Rect};
use geojson::{FeatureCollection, JsonValue};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};
use tracing::info;

use crate::error::{ReportError, Result};

/// One boundary area keyed by its code.
#[derive(Debug, Clone)]
pub struct AreaShape {
    pub code: String,
    pub polygons: MultiPolygon<f64>,
}

/// Load boundaries, picking the reader from the file extension.
///
/// `.shp` goes through the shapefile reader (the `.dbf` must sit beside it);
/// `.geojson` and `.json` are parsed as a feature collection.
pub fn load_boundaries(path: &Path, key: &str) -> Result<Vec<AreaShape>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let shapes = match ext.as_str() {
        "shp" => load_shapefile(path, key)?,
        "geojson" | "json" => load_geojson(path, key)?,
        _ => {
            return Err(ReportError::InvalidData(format!(
                "unsupported boundary format: {}",
                path.display()
            )))
        }
    };

    info!(path = %path.display(), areas = shapes.len(), "loaded boundaries");
    Ok(shapes)
}

pub fn load_shapefile(path: &Path, key: &str) -> Result<Vec<AreaShape>> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut shapes = Vec::new();

    for (i, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;
        let value = record
            .get(key)
            .ok_or_else(|| ReportError::MissingColumn(key.to_string()))?;
        let code = field_to_code(value)
            .ok_or_else(|| ReportError::InvalidData(format!("empty {key} at record {i}")))?;

        let polygons = match shape {
            Shape::Polygon(polygon) => rings_to_polygons(polygon.rings()),
            Shape::NullShape => MultiPolygon::new(vec![]),
            other => {
                return Err(ReportError::InvalidData(format!(
                    "record {i}: expected polygon, found {:?}",
                    other.shapetype()
                )))
            }
        };
        shapes.push(AreaShape { code, polygons });
    }
    Ok(shapes)
}

pub fn load_geojson(path: &Path, key: &str) -> Result<Vec<AreaShape>> {
    let collection: FeatureCollection = std::fs::read_to_string(path)?.parse()?;
    parse_features(collection, key)
}

fn parse_features(collection: FeatureCollection, key: &str) -> Result<Vec<AreaShape>> {
    let mut shapes = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.into_iter().enumerate() {
        let code = feature
            .property(key)
            .and_then(json_to_code)
            .ok_or_else(|| ReportError::InvalidData(format!("feature {i} has no {key}")))?;

        let polygons = match feature.geometry {
            None => MultiPolygon::new(vec![]),
            Some(geometry) => match geo::Geometry::<f64>::try_from(geometry.value)? {
                geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                geo::Geometry::MultiPolygon(mp) => mp,
                _ => {
                    return Err(ReportError::InvalidData(format!(
                        "feature {i}: expected polygon geometry"
                    )))
                }
            },
        };
        shapes.push(AreaShape { code, polygons });
    }
    Ok(shapes)
}

/// Outer rings start polygons; inner rings become holes of the preceding outer ring.
fn rings_to_polygons(rings: &[PolygonRing<shapefile::Point>]) -> MultiPolygon<f64> {
    let mut parts: Vec<(LineString<f64>, Vec<LineString<f64>>)> = Vec::new();
    for ring in rings {
        let line: LineString<f64> = ring
            .points()
            .iter()
            .map(|p| (p.x, p.y))
            .collect::<Vec<_>>()
            .into();
        match ring {
            PolygonRing::Outer(_) => parts.push((line, Vec::new())),
            PolygonRing::Inner(_) => match parts.last_mut() {
                Some((_, holes)) => holes.push(line),
                // hole with no shell: treat as its own shell
                None => parts.push((line, Vec::new())),
            },
        }
    }
    MultiPolygon::new(
        parts
            .into_iter()
            .map(|(exterior, holes)| Polygon::new(exterior, holes))
            .collect(),
    )
}

fn field_to_code(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        FieldValue::Numeric(Some(n)) => Some(number_to_code(*n)),
        FieldValue::Integer(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_to_code(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Some(i.to_string()),
            None => n.as_f64().map(number_to_code),
        },
        _ => None,
    }
}

/// Integral codes stored as floats render without a trailing `.0`.
fn number_to_code(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Bounding box over every area, `None` when nothing has coordinates.
pub fn extent<'a>(shapes: impl IntoIterator<Item = &'a AreaShape>) -> Option<Rect<f64>> {
    shapes
        .into_iter()
        .filter_map(|s| s.polygons.bounding_rect())
        .reduce(|a, b| {
            Rect::new(
                (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "ADAUID": "35200001" },
                "geometry": { "type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]] }
            },
            {
                "type": "Feature",
                "properties": { "ADAUID": 35200002 },
                "geometry": { "type": "MultiPolygon", "coordinates": [
                    [[[3,0],[4,0],[4,1],[3,1],[3,0]]],
                    [[[5,5],[6,5],[6,7],[5,7],[5,5]]]
                ] }
            },
            {
                "type": "Feature",
                "properties": { "ADAUID": "35200003" },
                "geometry": null
            }
        ]
    }"#;

    #[test]
    fn test_parse_features() {
        let collection: FeatureCollection = SAMPLE.parse().unwrap();
        let shapes = parse_features(collection, "ADAUID").unwrap();

        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].code, "35200001");
        assert_eq!(shapes[1].code, "35200002");
        assert_eq!(shapes[1].polygons.0.len(), 2);
        assert!(shapes[2].polygons.0.is_empty());

        let rect = extent(&shapes).unwrap();
        assert_eq!((rect.min().x, rect.min().y), (0.0, 0.0));
        assert_eq!((rect.max().x, rect.max().y), (6.0, 7.0));
    }

    #[test]
    fn test_missing_key_is_an_error() {
        let collection: FeatureCollection = SAMPLE.parse().unwrap();
        assert!(parse_features(collection, "DAUID").is_err());
    }

    #[test]
    fn test_load_geojson_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ada.geojson");
        std::fs::write(&path, SAMPLE).unwrap();

        let shapes = load_boundaries(&path, "ADAUID").unwrap();
        assert_eq!(shapes.len(), 3);
        assert!(load_boundaries(&dir.path().join("ada.kml"), "ADAUID").is_err());
    }

    #[test]
    fn test_number_to_code() {
        assert_eq!(number_to_code(35200001.0), "35200001");
        assert_eq!(number_to_code(1.5), "1.5");
    }

    #[test]
    fn test_rings_to_polygons_attaches_holes() {
        let square = |o: f64, s: f64| {
            vec![
                shapefile::Point::new(o, o),
                shapefile::Point::new(o, o + s),
                shapefile::Point::new(o + s, o + s),
                shapefile::Point::new(o + s, o),
                shapefile::Point::new(o, o),
            ]
        };
        let rings = vec![
            PolygonRing::Outer(square(0.0, 10.0)),
            PolygonRing::Inner(square(2.0, 2.0)),
            PolygonRing::Outer(square(20.0, 1.0)),
        ];
        let mp = rings_to_polygons(&rings);
        assert_eq!(mp.0.len(), 2);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!(mp.0[1].interiors().is_empty());
    }
}
