use crate::error::AreaError;
use anyhow::{anyhow, Result};
use geo::{Coord, MapCoords};
use proj4rs::proj::Proj;
use std::fmt;

const GEOGRAPHIC_WGS84: &str = "+proj=longlat +ellps=WGS84 +no_defs";

// Mainland Norway and Svalbard stay within about 16° of 15°E in UTM 33.
const MAX_MERIDIAN_OFFSET_DEG: f64 = 30.0;

#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
pub struct UtmZone {
    zone: u8,
    is_north: bool,
}

impl UtmZone {
    pub fn new(zone: u8, is_north: bool) -> Result<UtmZone> {
        if !(1..=60).contains(&zone) {
            return Err(anyhow!("UTM zone must be within 1..=60, got {}", zone));
        }
        Ok(UtmZone { zone, is_north })
    }

    pub fn central_meridian(&self) -> f64 {
        self.zone as f64 * 6.0 - 183.0
    }

    fn proj_string(&self) -> String {
        format!(
            "+proj=utm +zone={}{} +ellps=WGS84 +units=m +no_defs",
            self.zone,
            if self.is_north { "" } else { " +south" }
        )
    }

    /// Builds the lon/lat (WGS84) to UTM transformation for this zone.
    pub fn transform(&self) -> Result<UtmTransform> {
        let source = Proj::from_proj_string(GEOGRAPHIC_WGS84)
            .map_err(|e| anyhow!("Invalid geographic CRS definition: {:?}", e))?;
        let target = Proj::from_proj_string(&self.proj_string())
            .map_err(|e| anyhow!("Invalid CRS definition for {}: {:?}", self, e))?;
        Ok(UtmTransform {
            zone: *self,
            source,
            target,
        })
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UTM zone {}{}", self.zone, if self.is_north { "N" } else { "S" })
    }
}

pub struct UtmTransform {
    zone: UtmZone,
    source: Proj,
    target: Proj,
}

impl UtmTransform {
    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    /// Projects one coordinate, x = longitude and y = latitude in degrees,
    /// to easting/northing in meters.
    ///
    /// Coordinates outside lon/lat ranges or too far from the zone's
    /// central meridian are refused rather than projected to nonsense.
    pub fn project(&self, c: Coord<f64>) -> Result<Coord<f64>, AreaError> {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(AreaError::NonFiniteCoordinate);
        }
        if c.x.abs() > 180.0 || c.y.abs() > 90.0 {
            return Err(AreaError::CoordinateOutOfRange { x: c.x, y: c.y });
        }
        let offset = c.x - self.zone.central_meridian();
        if offset.abs() > MAX_MERIDIAN_OFFSET_DEG {
            return Err(AreaError::ProjectionFailed(format!(
                "longitude {} is {:.1}° from the central meridian of {}",
                c.x,
                offset.abs(),
                self.zone
            )));
        }

        let mut point = (c.x.to_radians(), c.y.to_radians(), 0.0);
        proj4rs::transform::transform(&self.source, &self.target, &mut point)
            .map_err(|e| AreaError::ProjectionFailed(format!("({}, {}): {:?}", c.x, c.y, e)))?;

        let (x, y, _) = point;
        if !x.is_finite() || !y.is_finite() {
            return Err(AreaError::ProjectionFailed(format!(
                "({}, {}) projected to ({}, {})",
                c.x, c.y, x, y
            )));
        }
        Ok(Coord { x, y })
    }

    pub fn project_geometry<G>(&self, geometry: &G) -> Result<G, AreaError>
    where
        G: MapCoords<f64, f64, Output = G>,
    {
        geometry.try_map_coords(|c| self.project(c))
    }
}
