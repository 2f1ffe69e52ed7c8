use crate::types::{AxisOrder, GeometryKind};
use thiserror::Error;

/// Data-quality conditions found while measuring a single record.
///
/// None of these abort a run: the record keeps a null area and the
/// condition is counted in the report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AreaError {
    #[error("Unsupported geometry type: {0}")]
    UnsupportedGeometry(GeometryKind),

    #[error("Axis order mismatch: latitude {latitude} is out of range with declared axis order {declared}")]
    AxisOrderMismatch { declared: AxisOrder, latitude: f64 },

    #[error("Coordinate out of range: ({x}, {y})")]
    CoordinateOutOfRange { x: f64, y: f64 },

    #[error("Non-finite coordinate")]
    NonFiniteCoordinate,

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Area formula returned a non-finite value: {0}")]
    NonFiniteArea(f64),

    #[error("Axis order mismatch: record only meets surveyed coverage with axes swapped from declared {declared}")]
    SwappedAgainstCoverage { declared: AxisOrder },

    #[error("Projection failed: {0}")]
    ProjectionFailed(String),
}

impl AreaError {
    /// Short stable label used for report counters and CSV output.
    pub fn label(&self) -> &'static str {
        match self {
            AreaError::UnsupportedGeometry(_) => "unsupported_geometry",
            AreaError::AxisOrderMismatch { .. } => "axis_order_mismatch",
            AreaError::CoordinateOutOfRange { .. } => "coordinate_out_of_range",
            AreaError::NonFiniteCoordinate => "non_finite_coordinate",
            AreaError::DegenerateGeometry(_) => "degenerate_geometry",
            AreaError::NonFiniteArea(_) => "non_finite_area",
            AreaError::SwappedAgainstCoverage { .. } => "axis_order_mismatch",
            AreaError::ProjectionFailed(_) => "projection_failed",
        }
    }
}
