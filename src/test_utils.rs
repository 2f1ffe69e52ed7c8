//! Fixtures shared by the unit tests.

use serde_json::{json, Value};
use std::io::Write;
use tempfile::NamedTempFile;

pub fn geojson_file(content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Axis-aligned square ring, closed, counter-clockwise.
fn square_ring(x: f64, y: f64, size: f64) -> Value {
    json!([
        [x, y],
        [x + size, y],
        [x + size, y + size],
        [x, y + size],
        [x, y]
    ])
}

/// FeatureCollection of square polygons, one per `(id, x, y, size)`.
pub fn squares_collection(squares: &[(&str, f64, f64, f64)]) -> String {
    let features: Vec<Value> = squares
        .iter()
        .map(|&(id, x, y, size)| {
            json!({
                "type": "Feature",
                "properties": { "id": id },
                "geometry": { "type": "Polygon", "coordinates": [square_ring(x, y, size)] }
            })
        })
        .collect();
    json!({ "type": "FeatureCollection", "features": features }).to_string()
}
