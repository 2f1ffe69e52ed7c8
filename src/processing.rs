use crate::area::{annotate, total_area};
use crate::axis::{detect_axis_order, looks_geographic, AxisCheck, AxisEvidence};
use crate::coverage::{
    compare_axis_orders, coverage_ratio, cross_check, CoverageIndex, CrossProjection,
};
use crate::data::{Layer, Session};
use crate::error::AreaError;
use crate::projection::{UtmTransform, UtmZone};
use crate::types::{AreaMethod, AreaRecord, AxisOrder, SourceFeature};
use anyhow::Result;
use tracing::{debug, info, warn};

pub struct LayerResult {
    pub layer: Layer,
    pub records: Vec<AreaRecord>,
    pub total_sqm: f64,
    pub axis_check: AxisCheck,
}

pub struct Reconciliation {
    pub nature_types: LayerResult,
    pub coverage: LayerResult,
    pub coverage_pct: Option<f64>,
    pub cross_projection: Option<CrossProjection>,
}

/// Load both layers through the session, then reconcile them.
pub fn process_layers(session: &Session) -> Result<Reconciliation> {
    let nature_types = session.load(Layer::NatureTypes)?;
    let coverage = session.load(Layer::Coverage)?;

    let zone = match &session.config().diagnostics {
        Some(diagnostics) => Some(diagnostics.zone()?),
        None => None,
    };

    reconcile(
        nature_types,
        session.area_method(Layer::NatureTypes),
        coverage,
        session.area_method(Layer::Coverage),
        zone,
    )
}

pub fn reconcile(
    nature_types: Vec<SourceFeature>,
    nature_method: AreaMethod,
    coverage: Vec<SourceFeature>,
    coverage_method: AreaMethod,
    zone: Option<UtmZone>,
) -> Result<Reconciliation> {
    info!(
        "Processing {} nature-type and {} coverage records...",
        nature_types.len(),
        coverage.len()
    );

    let mut nature_check = check_layer(Layer::NatureTypes, &nature_types, nature_method);
    let coverage_check = check_layer(Layer::Coverage, &coverage, coverage_method);

    let mut nature_records = annotate(nature_types, nature_method);
    let coverage_records = annotate(coverage, coverage_method);

    let diagnostics = match zone {
        Some(zone) => Some((zone.transform()?, CoverageIndex::build(&coverage_records))),
        None => None,
    };

    if let (AreaMethod::Geodesic(declared), Some((transform, index))) =
        (nature_method, &diagnostics)
    {
        nature_check = verify_against_coverage(
            &mut nature_records,
            declared,
            nature_check,
            index,
            transform,
        );
    }

    let nature_types = layer_result(Layer::NatureTypes, nature_records, nature_check);
    let coverage = layer_result(Layer::Coverage, coverage_records, coverage_check);

    let coverage_pct = coverage_ratio(nature_types.total_sqm, coverage.total_sqm);
    if coverage_pct.is_none() {
        warn!(
            "Surveyed total is {}; coverage percentage is not applicable",
            coverage.total_sqm
        );
    }

    let cross_projection = diagnostics.map(|(transform, index)| {
        let declared = match nature_method {
            AreaMethod::Geodesic(order) => order,
            AreaMethod::Planar => AxisOrder::LonLat,
        };
        let check = cross_check(&nature_types.records, declared, &index, &transform);
        info!(
            "{} nature-type records do not intersect surveyed coverage",
            check.outside_count
        );
        if !check.unprojected_ids.is_empty() {
            warn!(
                "{} nature-type records could not be projected into {}",
                check.unprojected_ids.len(),
                check.zone
            );
        }
        check
    });

    Ok(Reconciliation {
        nature_types,
        coverage,
        coverage_pct,
        cross_projection,
    })
}

fn layer_result(layer: Layer, records: Vec<AreaRecord>, axis_check: AxisCheck) -> LayerResult {
    let total_sqm = total_area(&records);

    let flagged = records.iter().filter(|r| r.issue.is_some()).count();
    if flagged > 0 {
        warn!(
            "{}: {} of {} records have no area",
            layer.table_name(),
            flagged,
            records.len()
        );
    }
    info!("{}: total area {:.2} m²", layer.table_name(), total_sqm);

    LayerResult {
        layer,
        records,
        total_sqm,
        axis_check,
    }
}

/// Uses the surveyed coverage as ground truth for axis order: a record that
/// only meets coverage with its axes swapped loses its area.
fn verify_against_coverage(
    records: &mut [AreaRecord],
    declared: AxisOrder,
    current: AxisCheck,
    coverage: &CoverageIndex,
    transform: &UtmTransform,
) -> AxisCheck {
    let agreement = compare_axis_orders(records, declared, coverage, transform);

    for &index in &agreement.swapped_only {
        let record = &mut records[index];
        debug!(
            "Record {} meets coverage only as {}",
            record.feature.id,
            declared.swapped()
        );
        record.area_sqm = None;
        record.dropped_parts = 0;
        record.issue = Some(AreaError::SwappedAgainstCoverage { declared });
    }

    if !agreement.swapped_only.is_empty() {
        warn!(
            "{}: {} records meet surveyed coverage only with axes swapped from declared {}; excluded from totals",
            Layer::NatureTypes.table_name(),
            agreement.swapped_only.len(),
            declared
        );
        AxisCheck::Contradicted
    } else if current == AxisCheck::Unverified && agreement.declared_hits > 0 {
        info!(
            "{}: axis order {} confirmed against surveyed coverage",
            Layer::NatureTypes.table_name(),
            declared
        );
        AxisCheck::Confirmed
    } else {
        current
    }
}

/// Layer-level sanity checks on the raw coordinates before measuring.
fn check_layer(layer: Layer, features: &[SourceFeature], method: AreaMethod) -> AxisCheck {
    let name = layer.table_name();
    match method {
        AreaMethod::Geodesic(declared) => {
            let evidence = detect_axis_order(features);
            match evidence {
                AxisEvidence::Detected(order) if order != declared => warn!(
                    "{}: declared axis order {} but coordinate ranges indicate {}",
                    name, declared, order
                ),
                AxisEvidence::Detected(order) => debug!("{}: axis order {} confirmed", name, order),
                AxisEvidence::Ambiguous => warn!(
                    "{}: coordinate ranges fit either axis order; declared {} is unverified until checked against coverage",
                    name, declared
                ),
                AxisEvidence::NotGeographic => warn!(
                    "{}: coordinate ranges do not fit lon/lat; layer is not in a geographic CRS",
                    name
                ),
            }
            AxisCheck::from_evidence(evidence, declared)
        }
        AreaMethod::Planar => {
            if looks_geographic(features) {
                warn!(
                    "{}: all coordinates fit lon/lat ranges; planar area would be in square degrees",
                    name
                );
            }
            AxisCheck::NotApplicable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, DiagnosticsConfig, InputConfig, LayerConfig, OutputConfig};
    use crate::test_utils::{geojson_file, squares_collection};
    use geo::{point, polygon, Coord, Geometry};

    fn feature(id: &str, geometry: Geometry<f64>) -> SourceFeature {
        SourceFeature {
            id: id.to_string(),
            geometry: Some(geometry),
            properties: Default::default(),
        }
    }

    #[test]
    fn nulls_and_mismatches_stay_out_of_totals() {
        let nature = vec![
            feature("ok", polygon![(x: 10., y: 60.), (x: 10.01, y: 60.), (x: 10.01, y: 60.01), (x: 10., y: 60.01)].into()),
            feature("swapped", polygon![(x: 60., y: 100.), (x: 60.01, y: 100.), (x: 60.01, y: 100.01), (x: 60., y: 100.01)].into()),
            feature("point", point!(x: 10., y: 60.).into()),
        ];
        let coverage = vec![feature(
            "c",
            polygon![(x: 0., y: 0.), (x: 2000., y: 0.), (x: 2000., y: 2000.), (x: 0., y: 2000.)].into(),
        )];

        let result = reconcile(
            nature,
            AreaMethod::Geodesic(AxisOrder::LonLat),
            coverage,
            AreaMethod::Planar,
            None,
        )
        .unwrap();

        let ok_area = result.nature_types.records[0].area_sqm.unwrap();
        assert!(result.nature_types.total_sqm.is_finite());
        assert_eq!(result.nature_types.total_sqm, ok_area);
        assert_eq!(result.coverage.total_sqm, 4_000_000.0);
        assert!(result.nature_types.records[1].issue.is_some());
        assert!(result.nature_types.records[2].issue.is_some());

        let pct = result.coverage_pct.unwrap();
        assert!((pct - ok_area / 4_000_000.0 * 100.0).abs() < 1e-9);
        assert!(result.cross_projection.is_none());
    }

    #[test]
    fn empty_coverage_gives_no_ratio() {
        let nature = vec![feature(
            "ok",
            polygon![(x: 10., y: 60.), (x: 10.01, y: 60.), (x: 10.01, y: 60.01)].into(),
        )];
        let result = reconcile(
            nature,
            AreaMethod::Geodesic(AxisOrder::LonLat),
            vec![],
            AreaMethod::Planar,
            None,
        )
        .unwrap();
        assert_eq!(result.coverage.total_sqm, 0.0);
        assert_eq!(result.coverage_pct, None);
    }

    #[test]
    fn session_pipeline_runs_from_files() {
        let nature = geojson_file(&squares_collection(&[("n1", 15.0, 60.0, 0.01)]));
        let utm = UtmZone::new(33, true).unwrap().transform().unwrap();
        let corner = utm.project(Coord { x: 14.99, y: 59.99 }).unwrap();
        let coverage = geojson_file(&squares_collection(&[("c1", corner.x, corner.y, 5000.0)]));

        let config = AppConfig {
            input: InputConfig {
                nature_types: LayerConfig {
                    path: nature.path().to_path_buf(),
                    id_column: Some("id".to_string()),
                    axis_order: AxisOrder::LonLat,
                },
                coverage: LayerConfig {
                    path: coverage.path().to_path_buf(),
                    id_column: Some("id".to_string()),
                    axis_order: AxisOrder::LonLat,
                },
            },
            diagnostics: Some(DiagnosticsConfig {
                utm_zone: 33,
                northern: true,
            }),
            output: OutputConfig::default(),
        };

        let session = Session::open(config).unwrap();
        let result = process_layers(&session).unwrap();

        assert!((result.coverage.total_sqm - 25_000_000.0).abs() < 1e-3);
        assert_eq!(result.nature_types.records[0].feature.id, "n1");
        let pct = result.coverage_pct.unwrap();
        assert!(pct > 0.0 && pct < 100.0);

        let cross = result.cross_projection.unwrap();
        assert_eq!(cross.outside_count, 0);
        assert_eq!(result.nature_types.axis_check, AxisCheck::Confirmed);
        assert_eq!(result.coverage.axis_check, AxisCheck::NotApplicable);
    }

    /// 0.01° cell at Oslo stored lat/lon, i.e. x = latitude.
    fn oslo_stored_lat_lon() -> Geometry<f64> {
        polygon![(x: 59.91, y: 10.75), (x: 59.91, y: 10.76), (x: 59.92, y: 10.76), (x: 59.92, y: 10.75)].into()
    }

    fn oslo_survey(utm: &UtmTransform) -> SourceFeature {
        let corner = utm.project(Coord { x: 10.70, y: 59.88 }).unwrap();
        feature(
            "survey",
            polygon![
                (x: corner.x, y: corner.y),
                (x: corner.x + 10_000., y: corner.y),
                (x: corner.x + 10_000., y: corner.y + 10_000.),
                (x: corner.x, y: corner.y + 10_000.)
            ]
            .into(),
        )
    }

    #[test]
    fn swapped_norwegian_layer_is_flagged_against_coverage() {
        let zone = UtmZone::new(33, true).unwrap();
        let utm = zone.transform().unwrap();

        let result = reconcile(
            vec![feature("oslo", oslo_stored_lat_lon())],
            AreaMethod::Geodesic(AxisOrder::LonLat),
            vec![oslo_survey(&utm)],
            AreaMethod::Planar,
            Some(zone),
        )
        .unwrap();

        let record = &result.nature_types.records[0];
        assert_eq!(record.area_sqm, None);
        assert_eq!(
            record.issue,
            Some(AreaError::SwappedAgainstCoverage {
                declared: AxisOrder::LonLat
            })
        );
        assert_eq!(result.nature_types.total_sqm, 0.0);
        assert_eq!(result.nature_types.axis_check, AxisCheck::Contradicted);
        assert_eq!(result.coverage_pct, Some(0.0));
        // Flagged records are not measured, so nothing is projected either.
        let cross = result.cross_projection.unwrap();
        assert_eq!(cross.mapped_geodesic_sqm, 0.0);
    }

    #[test]
    fn correctly_declared_lat_lon_layer_is_confirmed() {
        let zone = UtmZone::new(33, true).unwrap();
        let utm = zone.transform().unwrap();

        let result = reconcile(
            vec![feature("oslo", oslo_stored_lat_lon())],
            AreaMethod::Geodesic(AxisOrder::LatLon),
            vec![oslo_survey(&utm)],
            AreaMethod::Planar,
            Some(zone),
        )
        .unwrap();

        let area = result.nature_types.records[0].area_sqm.unwrap();
        // About 557 m x 1112 m at 59.9N.
        assert!(area > 600_000.0 && area < 640_000.0, "area {}", area);
        assert_eq!(result.nature_types.axis_check, AxisCheck::Confirmed);
        assert_eq!(result.cross_projection.unwrap().outside_count, 0);
    }

    #[test]
    fn without_diagnostics_ambiguous_layers_stay_unverified() {
        let result = reconcile(
            vec![feature("oslo", oslo_stored_lat_lon())],
            AreaMethod::Geodesic(AxisOrder::LonLat),
            vec![],
            AreaMethod::Planar,
            None,
        )
        .unwrap();

        assert!(result.nature_types.records[0].area_sqm.is_some());
        assert_eq!(result.nature_types.axis_check, AxisCheck::Unverified);
    }
}
