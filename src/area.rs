use crate::axis::{to_lon_lat, validate_lon_lat};
use crate::error::AreaError;
use crate::types::{polygonal, AreaMethod, AreaRecord, AxisOrder, GeometryKind, SourceFeature};
use geo::orient::{Direction, Orient};
use geo::{Area, CoordsIter, GeodesicArea, Geometry, MultiPolygon, Polygon};
use tracing::debug;

/// Area of one record plus how many of its parts were left out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub area_sqm: f64,
    pub dropped_parts: usize,
}

/// Ellipsoidal (WGS84) area in square meters of a geographic geometry.
///
/// Coordinates are first brought into lon/lat order according to
/// `declared`, then validated, so swapped axes come back as
/// [`AreaError::AxisOrderMismatch`] instead of a NaN or a bogus number.
pub fn geodesic_area(geometry: &Geometry<f64>, declared: AxisOrder) -> Result<f64, AreaError> {
    geodesic_measure(geometry, declared).map(|m| m.area_sqm)
}

pub fn geodesic_measure(
    geometry: &Geometry<f64>,
    declared: AxisOrder,
) -> Result<Measurement, AreaError> {
    let polygons = polygon_parts(geometry)?;
    let polygons = to_lon_lat(&polygons, declared);
    validate_lon_lat(&polygons, declared)?;

    // Signed area is negative for clockwise exteriors.
    sum_parts(&polygons, |p| p.orient(Direction::Default).geodesic_area_signed())
}

/// Euclidean area of a projected geometry, in squared coordinate units.
///
/// Holes are subtracted from their polygon, multipolygon parts are summed.
pub fn planar_area(geometry: &Geometry<f64>) -> Result<f64, AreaError> {
    planar_measure(geometry).map(|m| m.area_sqm)
}

pub fn planar_measure(geometry: &Geometry<f64>) -> Result<Measurement, AreaError> {
    let polygons = polygon_parts(geometry)?;
    if polygons
        .coords_iter()
        .any(|c| !c.x.is_finite() || !c.y.is_finite())
    {
        return Err(AreaError::NonFiniteCoordinate);
    }
    sum_parts(&polygons, |p| p.unsigned_area())
}

/// Dispatches to the formula that fits the layer's coordinate model.
pub fn measure(
    geometry: Option<&Geometry<f64>>,
    method: AreaMethod,
) -> Result<Measurement, AreaError> {
    let geometry =
        geometry.ok_or(AreaError::UnsupportedGeometry(GeometryKind::Empty))?;
    match method {
        AreaMethod::Geodesic(declared) => geodesic_measure(geometry, declared),
        AreaMethod::Planar => planar_measure(geometry),
    }
}

/// Builds the derived collection: every feature paired with its area, or
/// with the reason it has none.
pub fn annotate(features: Vec<SourceFeature>, method: AreaMethod) -> Vec<AreaRecord> {
    features
        .into_iter()
        .map(|feature| {
            let kind = GeometryKind::of(feature.geometry.as_ref());
            let (area_sqm, issue, dropped_parts) =
                match measure(feature.geometry.as_ref(), method) {
                    Ok(m) => {
                        if m.dropped_parts > 0 {
                            debug!(
                                "Record {}: skipped {} degenerate polygon parts",
                                feature.id, m.dropped_parts
                            );
                        }
                        (Some(m.area_sqm), None, m.dropped_parts)
                    }
                    Err(e) => {
                        debug!("No area for record {}: {}", feature.id, e);
                        (None, Some(e), 0)
                    }
                };
            AreaRecord {
                feature,
                kind,
                area_sqm,
                issue,
                dropped_parts,
            }
        })
        .collect()
}

/// Sum of all non-null areas.
pub fn sum_areas<I>(areas: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    areas.into_iter().flatten().sum()
}

pub fn total_area(records: &[AreaRecord]) -> f64 {
    sum_areas(records.iter().map(|r| r.area_sqm))
}

fn polygon_parts(geometry: &Geometry<f64>) -> Result<MultiPolygon<f64>, AreaError> {
    polygonal(geometry)
        .ok_or_else(|| AreaError::UnsupportedGeometry(GeometryKind::of(Some(geometry))))
}

/// Sums `part_area` over the parts of a multipolygon.
///
/// Parts with fewer than three distinct vertices or zero area are skipped
/// and counted; the record is degenerate only when no part is left.
fn sum_parts<F>(polygons: &MultiPolygon<f64>, part_area: F) -> Result<Measurement, AreaError>
where
    F: Fn(&Polygon<f64>) -> f64,
{
    if polygons.0.is_empty() {
        return Err(AreaError::DegenerateGeometry("no polygon parts".to_string()));
    }

    let mut area_sqm = 0.0;
    let mut dropped_parts = 0;
    for polygon in &polygons.0 {
        if distinct_exterior_vertices(polygon) < 3 {
            dropped_parts += 1;
            continue;
        }
        let area = part_area(polygon);
        if !area.is_finite() {
            return Err(AreaError::NonFiniteArea(area));
        }
        if area == 0.0 {
            dropped_parts += 1;
            continue;
        }
        area_sqm += area.abs();
    }

    if dropped_parts == polygons.0.len() {
        return Err(AreaError::DegenerateGeometry(format!(
            "none of {} polygon parts has a positive area",
            dropped_parts
        )));
    }
    Ok(Measurement {
        area_sqm,
        dropped_parts,
    })
}

fn distinct_exterior_vertices(polygon: &Polygon<f64>) -> usize {
    let ring = polygon.exterior();
    let n = ring.0.len();
    if n > 1 && ring.is_closed() {
        n - 1
    } else {
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::flip_coordinates;
    use crate::projection::UtmZone;
    use float_cmp::{ApproxEq, F64Margin};
    use geo::{line_string, point, polygon, LineString};

    fn margin() -> F64Margin {
        F64Margin {
            epsilon: 1e-9,
            ulps: 4,
        }
    }

    fn feature(id: &str, geometry: Option<Geometry<f64>>) -> SourceFeature {
        SourceFeature {
            id: id.to_string(),
            geometry,
            properties: Default::default(),
        }
    }

    #[test]
    fn planar_square_and_triangle() {
        let square: Geometry<f64> =
            polygon![(x: 0., y: 0.), (x: 100., y: 0.), (x: 100., y: 100.), (x: 0., y: 100.)].into();
        assert!(planar_area(&square).unwrap().approx_eq(10_000.0, margin()));

        let triangle: Geometry<f64> = polygon![(x: 0., y: 0.), (x: 4., y: 0.), (x: 0., y: 3.)].into();
        assert!(planar_area(&triangle).unwrap().approx_eq(6.0, margin()));
    }

    #[test]
    fn planar_winding_does_not_matter() {
        let cw: Geometry<f64> =
            polygon![(x: 0., y: 0.), (x: 0., y: 10.), (x: 10., y: 10.), (x: 10., y: 0.)].into();
        assert!(planar_area(&cw).unwrap().approx_eq(100.0, margin()));
    }

    #[test]
    fn planar_hole_is_subtracted() {
        let with_hole: Geometry<f64> = polygon!(
            exterior: [(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            interiors: [[(x: 2., y: 2.), (x: 4., y: 2.), (x: 4., y: 4.), (x: 2., y: 4.)]]
        )
        .into();
        assert!(planar_area(&with_hole).unwrap().approx_eq(96.0, margin()));
    }

    #[test]
    fn planar_multipolygon_sums_parts() {
        let mp = MultiPolygon::new(vec![
            polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            polygon![(x: 20., y: 0.), (x: 25., y: 0.), (x: 25., y: 5.), (x: 20., y: 5.)],
        ]);
        assert!(planar_area(&mp.into()).unwrap().approx_eq(125.0, margin()));
    }

    #[test]
    fn non_polygons_are_unsupported() {
        let line: Geometry<f64> = line_string![(x: 0., y: 0.), (x: 1., y: 1.)].into();
        let pt: Geometry<f64> = point!(x: 1., y: 1.).into();
        assert_eq!(
            planar_area(&line),
            Err(AreaError::UnsupportedGeometry(GeometryKind::LineString))
        );
        assert_eq!(
            geodesic_area(&pt, AxisOrder::LonLat),
            Err(AreaError::UnsupportedGeometry(GeometryKind::Point))
        );
        assert_eq!(
            measure(None, AreaMethod::Planar),
            Err(AreaError::UnsupportedGeometry(GeometryKind::Empty))
        );
    }

    #[test]
    fn degenerate_polygons_are_flagged() {
        let two_points: Geometry<f64> =
            Polygon::new(LineString::from(vec![(0., 0.), (1., 1.)]), vec![]).into();
        assert!(matches!(
            planar_area(&two_points),
            Err(AreaError::DegenerateGeometry(_))
        ));

        let collinear: Geometry<f64> = polygon![(x: 0., y: 0.), (x: 1., y: 1.), (x: 2., y: 2.)].into();
        assert!(matches!(
            planar_area(&collinear),
            Err(AreaError::DegenerateGeometry(_))
        ));

        let empty: Geometry<f64> = MultiPolygon::<f64>::new(vec![]).into();
        assert!(matches!(
            geodesic_area(&empty, AxisOrder::LonLat),
            Err(AreaError::DegenerateGeometry(_))
        ));
    }

    #[test]
    fn sliver_parts_are_skipped_not_the_whole_record() {
        let mp: Geometry<f64> = MultiPolygon::new(vec![
            polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)],
            polygon![(x: 20., y: 0.), (x: 21., y: 1.), (x: 22., y: 2.)],
            Polygon::new(LineString::from(vec![(30., 0.), (31., 1.)]), vec![]),
        ])
        .into();
        let m = planar_measure(&mp).unwrap();
        assert!(m.area_sqm.approx_eq(100.0, margin()));
        assert_eq!(m.dropped_parts, 2);

        let geographic: Geometry<f64> = MultiPolygon::new(vec![
            polygon![(x: 10., y: 60.), (x: 10.01, y: 60.), (x: 10.01, y: 60.01), (x: 10., y: 60.01)],
            Polygon::new(LineString::from(vec![(10.5, 60.), (10.6, 60.)]), vec![]),
        ])
        .into();
        let m = geodesic_measure(&geographic, AxisOrder::LonLat).unwrap();
        assert!(m.area_sqm > 0.0);
        assert_eq!(m.dropped_parts, 1);

        let records = annotate(
            vec![feature("mp", Some(mp))],
            AreaMethod::Planar,
        );
        assert_eq!(records[0].area_sqm, Some(100.0));
        assert_eq!(records[0].dropped_parts, 2);
        assert!(records[0].issue.is_none());
    }

    #[test]
    fn geodesic_one_degree_cell_at_equator() {
        let cell: Geometry<f64> =
            polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.), (x: 0., y: 1.)].into();
        let area = geodesic_area(&cell, AxisOrder::LonLat).unwrap();
        let expected = 12_308_778_361.0;
        assert!(((area - expected) / expected).abs() < 1e-3, "area {}", area);
    }

    #[test]
    fn geodesic_ignores_winding() {
        let ccw: Geometry<f64> =
            polygon![(x: 10., y: 60.), (x: 10.1, y: 60.), (x: 10.1, y: 60.1), (x: 10., y: 60.1)].into();
        let cw: Geometry<f64> =
            polygon![(x: 10., y: 60.), (x: 10., y: 60.1), (x: 10.1, y: 60.1), (x: 10.1, y: 60.)].into();
        let a = geodesic_area(&ccw, AxisOrder::LonLat).unwrap();
        let b = geodesic_area(&cw, AxisOrder::LonLat).unwrap();
        assert!(a.approx_eq(b, F64Margin { epsilon: 1e-3, ulps: 4 }));
        assert!(a > 0.0 && a < 1.0e8);
    }

    #[test]
    fn geodesic_matches_utm_planar_for_small_polygon() {
        let lon_lat =
            polygon![(x: 3.0, y: 0.0), (x: 3.01, y: 0.0), (x: 3.01, y: 0.01), (x: 3.0, y: 0.01)];
        let geodesic = geodesic_area(&lon_lat.clone().into(), AxisOrder::LonLat).unwrap();

        let utm = UtmZone::new(31, true).unwrap().transform().unwrap();
        let projected: Geometry<f64> = utm.project_geometry(&lon_lat).unwrap().into();
        let planar = planar_area(&projected).unwrap();

        let relative = (geodesic - planar).abs() / geodesic;
        assert!(relative < 0.005, "geodesic {} planar {}", geodesic, planar);
    }

    #[test]
    fn lat_lon_storage_is_corrected_before_measuring() {
        let lon_lat: Geometry<f64> =
            polygon![(x: 10., y: 60.), (x: 10.1, y: 60.), (x: 10.1, y: 60.1), (x: 10., y: 60.1)].into();
        let lat_lon = flip_coordinates(&lon_lat);

        let a = geodesic_area(&lon_lat, AxisOrder::LonLat).unwrap();
        let b = geodesic_area(&lat_lon, AxisOrder::LatLon).unwrap();
        assert!(a.approx_eq(b, F64Margin { epsilon: 1e-6, ulps: 4 }));
    }

    #[test]
    fn uncorrected_axis_order_is_surfaced() {
        // Stored lat/lon, measured as if lon/lat.
        let lat_lon: Geometry<f64> =
            polygon![(x: 10., y: 100.), (x: 10., y: 100.01), (x: 10.01, y: 100.01), (x: 10.01, y: 100.)].into();
        assert!(matches!(
            geodesic_area(&lat_lon, AxisOrder::LonLat),
            Err(AreaError::AxisOrderMismatch { .. })
        ));
    }

    #[test]
    fn annotate_keeps_features_and_nulls_bad_ones() {
        let features = vec![
            feature("a", Some(polygon![(x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.)].into())),
            feature("b", Some(point!(x: 1., y: 1.).into())),
            feature("c", None),
        ];
        let records = annotate(features, AreaMethod::Planar);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].feature.id, "a");
        assert_eq!(records[0].area_sqm, Some(100.0));
        assert_eq!(records[1].kind, GeometryKind::Point);
        assert_eq!(records[1].area_sqm, None);
        assert!(records[1].issue.is_some());
        assert_eq!(records[2].kind, GeometryKind::Empty);
        assert!(total_area(&records).approx_eq(100.0, margin()));
    }

    #[test]
    fn sum_skips_nulls() {
        assert_eq!(sum_areas(vec![Some(10.0), None, Some(5.0)]), 15.0);
        assert_eq!(sum_areas(Vec::<Option<f64>>::new()), 0.0);
    }
}
