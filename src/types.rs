use crate::error::AreaError;
use geo::{Geometry, MultiPolygon};
use serde::Deserialize;
use std::fmt;

/// A record as read from a source layer, before any area is derived.
#[derive(Debug, Clone)]
pub struct SourceFeature {
    pub id: String,
    pub geometry: Option<Geometry<f64>>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Source feature plus its derived area.
///
/// `area_sqm` is `None` whenever `issue` is set.
#[derive(Debug, Clone)]
pub struct AreaRecord {
    pub feature: SourceFeature,
    pub kind: GeometryKind,
    pub area_sqm: Option<f64>,
    pub issue: Option<AreaError>,
    /// Degenerate multipolygon parts left out of `area_sqm`.
    pub dropped_parts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    GeometryCollection,
    Empty,
}

impl GeometryKind {
    pub fn of(geometry: Option<&Geometry<f64>>) -> Self {
        match geometry {
            None => GeometryKind::Empty,
            Some(Geometry::Point(_)) => GeometryKind::Point,
            Some(Geometry::MultiPoint(_)) => GeometryKind::MultiPoint,
            Some(Geometry::Line(_)) | Some(Geometry::LineString(_)) => GeometryKind::LineString,
            Some(Geometry::MultiLineString(_)) => GeometryKind::MultiLineString,
            // Rect and Triangle only come from in-memory construction; both are polygons.
            Some(Geometry::Polygon(_)) | Some(Geometry::Rect(_)) | Some(Geometry::Triangle(_)) => {
                GeometryKind::Polygon
            }
            Some(Geometry::MultiPolygon(_)) => GeometryKind::MultiPolygon,
            Some(Geometry::GeometryCollection(_)) => GeometryKind::GeometryCollection,
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryKind::Point => "POINT",
            GeometryKind::MultiPoint => "MULTIPOINT",
            GeometryKind::LineString => "LINESTRING",
            GeometryKind::MultiLineString => "MULTILINESTRING",
            GeometryKind::Polygon => "POLYGON",
            GeometryKind::MultiPolygon => "MULTIPOLYGON",
            GeometryKind::GeometryCollection => "GEOMETRYCOLLECTION",
            GeometryKind::Empty => "EMPTY",
        };
        f.write_str(name)
    }
}

/// Axis order the coordinates of a geographic layer are stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisOrder {
    /// x = longitude, y = latitude (GeoJSON, `geo`)
    #[default]
    LonLat,
    /// x = latitude, y = longitude (EPSG:4326 authority order)
    LatLon,
}

impl AxisOrder {
    pub fn swapped(self) -> AxisOrder {
        match self {
            AxisOrder::LonLat => AxisOrder::LatLon,
            AxisOrder::LatLon => AxisOrder::LonLat,
        }
    }
}

impl fmt::Display for AxisOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisOrder::LonLat => f.write_str("lon_lat"),
            AxisOrder::LatLon => f.write_str("lat_lon"),
        }
    }
}

/// Which area formula a layer is measured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMethod {
    /// Ellipsoidal area on WGS84 for geographic coordinates.
    Geodesic(AxisOrder),
    /// Euclidean area for projected coordinates in meters.
    Planar,
}

/// Polygonal part of a geometry, or `None` for anything without area.
pub fn polygonal(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}
