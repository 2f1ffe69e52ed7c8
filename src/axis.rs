use crate::error::AreaError;
use crate::types::{AxisOrder, SourceFeature};
use geo::{Coord, CoordsIter, MapCoords};
use serde::Serialize;
use std::fmt;

/// What a layer's coordinate envelope says about its axis order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEvidence {
    Detected(AxisOrder),
    /// Every value is within ±90, so either order is plausible.
    Ambiguous,
    /// Coordinate ranges fit neither lon/lat nor lat/lon.
    NotGeographic,
}

/// Verdict on a layer's declared axis order, carried into the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisCheck {
    /// Projected layer; measured without an axis order.
    NotApplicable,
    Confirmed,
    /// Either order fits the coordinates and nothing told them apart.
    Unverified,
    /// The data disagrees with the declared order somewhere in the layer.
    Contradicted,
}

impl AxisCheck {
    /// Verdict from the coordinate envelope alone.
    pub fn from_evidence(evidence: AxisEvidence, declared: AxisOrder) -> AxisCheck {
        match evidence {
            AxisEvidence::Detected(order) if order == declared => AxisCheck::Confirmed,
            AxisEvidence::Detected(_) | AxisEvidence::NotGeographic => AxisCheck::Contradicted,
            AxisEvidence::Ambiguous => AxisCheck::Unverified,
        }
    }
}

impl fmt::Display for AxisCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AxisCheck::NotApplicable => "not applicable",
            AxisCheck::Confirmed => "confirmed",
            AxisCheck::Unverified => "unverified",
            AxisCheck::Contradicted => "contradicted",
        };
        f.write_str(text)
    }
}

/// Swaps x and y of every coordinate.
pub fn flip_coordinates<G>(geometry: &G) -> G
where
    G: MapCoords<f64, f64, Output = G>,
{
    geometry.map_coords(|c| Coord { x: c.y, y: c.x })
}

/// Brings a geometry into `geo`'s convention, x = longitude and y = latitude.
pub fn to_lon_lat<G>(geometry: &G, declared: AxisOrder) -> G
where
    G: MapCoords<f64, f64, Output = G> + Clone,
{
    match declared {
        AxisOrder::LonLat => geometry.clone(),
        AxisOrder::LatLon => flip_coordinates(geometry),
    }
}

/// Checks that a lon/lat geometry holds real geographic coordinates.
///
/// A latitude beyond ±90 paired with a longitude that would itself be a
/// valid latitude is reported as swapped axes rather than as a generic
/// range error.
pub fn validate_lon_lat<G>(geometry: &G, declared: AxisOrder) -> Result<(), AreaError>
where
    G: CoordsIter<Scalar = f64>,
{
    for c in geometry.coords_iter() {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(AreaError::NonFiniteCoordinate);
        }
        if c.y.abs() > 90.0 {
            if c.x.abs() <= 90.0 {
                return Err(AreaError::AxisOrderMismatch {
                    declared,
                    latitude: c.y,
                });
            }
            return Err(AreaError::CoordinateOutOfRange { x: c.x, y: c.y });
        }
        if c.x.abs() > 180.0 {
            return Err(AreaError::CoordinateOutOfRange { x: c.x, y: c.y });
        }
    }
    Ok(())
}

/// Largest absolute x and y over all finite coordinates of a layer.
fn max_abs_xy(features: &[SourceFeature]) -> Option<(f64, f64)> {
    features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .flat_map(|g| g.coords_iter())
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .fold(None, |acc, c| match acc {
            None => Some((c.x.abs(), c.y.abs())),
            Some((mx, my)) => Some((mx.max(c.x.abs()), my.max(c.y.abs()))),
        })
}

/// Inspects the envelope of a layer as stored, before any flipping.
pub fn detect_axis_order(features: &[SourceFeature]) -> AxisEvidence {
    let Some((max_x, max_y)) = max_abs_xy(features) else {
        return AxisEvidence::Ambiguous;
    };

    match (max_x > 90.0, max_y > 90.0) {
        (false, false) => AxisEvidence::Ambiguous,
        (true, false) if max_x <= 180.0 => AxisEvidence::Detected(AxisOrder::LonLat),
        (false, true) if max_y <= 180.0 => AxisEvidence::Detected(AxisOrder::LatLon),
        _ => AxisEvidence::NotGeographic,
    }
}

/// True when every coordinate of a layer would fit a lon/lat range, which
/// for a layer expected in a metric projection means its planar area would
/// come out in square degrees.
pub fn looks_geographic(features: &[SourceFeature]) -> bool {
    match max_abs_xy(features) {
        Some((max_x, max_y)) => max_x <= 180.0 && max_y <= 90.0,
        None => false,
    }
}
