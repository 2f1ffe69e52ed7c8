use crate::axis::to_lon_lat;
use crate::projection::UtmTransform;
use crate::types::{polygonal, AreaRecord, AxisOrder};
use geo::bounding_rect::BoundingRect;
use geo::intersects::Intersects;
use geo::{Area, MultiPolygon, Polygon, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde::Serialize;
use tracing::{info, warn};

/// Mapped area as a percentage of surveyed area.
///
/// `None` when the surveyed total is zero, negative or not a number, so an
/// empty coverage layer never turns into an infinite percentage.
pub fn coverage_ratio(mapped_total: f64, surveyed_total: f64) -> Option<f64> {
    if !mapped_total.is_finite() || !surveyed_total.is_finite() || surveyed_total <= 0.0 {
        return None;
    }
    Some(mapped_total / surveyed_total * 100.0)
}

pub struct CoveragePolygon(Polygon<f64>);

impl RTreeObject for CoveragePolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        // Only polygons with a measured area are indexed, so the ring is non-empty.
        let bbox = self
            .0
            .bounding_rect()
            .unwrap_or_else(|| Rect::new((0.0, 0.0), (0.0, 0.0)));
        aabb(&bbox)
    }
}

fn aabb(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Spatial index over the measured coverage polygons.
pub struct CoverageIndex {
    tree: RTree<CoveragePolygon>,
}

impl CoverageIndex {
    pub fn build(coverage: &[AreaRecord]) -> CoverageIndex {
        let polygons: Vec<CoveragePolygon> = coverage
            .iter()
            .filter(|r| r.area_sqm.is_some())
            .filter_map(|r| r.feature.geometry.as_ref().and_then(polygonal))
            .flat_map(|mp| mp.0.into_iter().map(CoveragePolygon))
            .collect();

        info!("Building spatial index for {} coverage polygons...", polygons.len());
        CoverageIndex {
            tree: RTree::bulk_load(polygons),
        }
    }

    pub fn intersects(&self, geometry: &MultiPolygon<f64>) -> bool {
        let Some(bbox) = geometry.bounding_rect() else {
            return false;
        };

        self.tree
            .locate_in_envelope_intersecting(&aabb(&bbox))
            .any(|candidate| geometry.intersects(&candidate.0))
    }
}

/// Mapped layer seen through the coverage layer's projection.
#[derive(Debug, Clone, Serialize)]
pub struct CrossProjection {
    pub zone: String,
    /// Planar area of the measured nature-type polygons after projection.
    pub mapped_planar_sqm: f64,
    /// Geodesic total of the same records.
    pub mapped_geodesic_sqm: f64,
    /// (planar - geodesic) / geodesic, as a percentage.
    pub difference_pct: Option<f64>,
    pub outside_count: usize,
    pub outside_area_sqm: f64,
    pub outside_ids: Vec<String>,
    /// Measured records that could not be projected into the zone; left
    /// out of both totals above.
    pub unprojected_ids: Vec<String>,
}

/// Projects every measured nature-type record into the coverage zone, sums
/// its planar area and finds records that touch no coverage polygon.
pub fn cross_check(
    nature_types: &[AreaRecord],
    declared: AxisOrder,
    coverage: &CoverageIndex,
    transform: &UtmTransform,
) -> CrossProjection {
    let mut mapped_planar_sqm = 0.0;
    let mut mapped_geodesic_sqm = 0.0;
    let mut outside_count = 0;
    let mut outside_area_sqm = 0.0;
    let mut outside_ids = Vec::new();
    let mut unprojected_ids = Vec::new();

    for record in nature_types {
        let (Some(area), Some(geometry)) = (record.area_sqm, record.feature.geometry.as_ref())
        else {
            continue;
        };
        let Some(polygons) = polygonal(geometry) else {
            continue;
        };

        let projected = match transform.project_geometry(&to_lon_lat(&polygons, declared)) {
            Ok(projected) => projected,
            Err(e) => {
                warn!("Record {}: {}", record.feature.id, e);
                unprojected_ids.push(record.feature.id.clone());
                continue;
            }
        };
        mapped_planar_sqm += projected.unsigned_area();
        mapped_geodesic_sqm += area;

        if !coverage.intersects(&projected) {
            outside_count += 1;
            outside_area_sqm += area;
            outside_ids.push(record.feature.id.clone());
        }
    }

    let difference_pct = (mapped_geodesic_sqm > 0.0)
        .then(|| (mapped_planar_sqm - mapped_geodesic_sqm) / mapped_geodesic_sqm * 100.0);

    CrossProjection {
        zone: transform.zone().to_string(),
        mapped_planar_sqm,
        mapped_geodesic_sqm,
        difference_pct,
        outside_count,
        outside_area_sqm,
        outside_ids,
        unprojected_ids,
    }
}

/// How a geographic layer's records line up with the coverage layer under
/// the declared axis order and under the swapped one.
#[derive(Debug, Default)]
pub struct AxisAgreement {
    /// Records that meet coverage as declared.
    pub declared_hits: usize,
    /// Indices of records that meet coverage only with axes swapped.
    pub swapped_only: Vec<usize>,
}

pub fn compare_axis_orders(
    records: &[AreaRecord],
    declared: AxisOrder,
    coverage: &CoverageIndex,
    transform: &UtmTransform,
) -> AxisAgreement {
    let hits = |polygons: &MultiPolygon<f64>, order: AxisOrder| {
        transform
            .project_geometry(&to_lon_lat(polygons, order))
            .map(|projected| coverage.intersects(&projected))
            .unwrap_or(false)
    };

    let mut agreement = AxisAgreement::default();
    for (index, record) in records.iter().enumerate() {
        let Some(polygons) = record.feature.geometry.as_ref().and_then(polygonal) else {
            continue;
        };
        if hits(&polygons, declared) {
            agreement.declared_hits += 1;
        } else if hits(&polygons, declared.swapped()) {
            agreement.swapped_only.push(index);
        }
    }
    agreement
}
