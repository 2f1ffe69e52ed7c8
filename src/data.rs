use crate::config::{AppConfig, LayerConfig, SourceFormat};
use crate::types::{AreaMethod, SourceFeature};
use anyhow::{anyhow, Context, Result};
use geojson::feature::Id;
use geojson::GeoJson;
use serde_json::{Map, Value};
use shapefile::dbase::FieldValue;
use shapefile::{Reader, Shape};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    NatureTypes,
    Coverage,
}

impl Layer {
    /// Table name used in logs, report and export file names.
    pub fn table_name(self) -> &'static str {
        match self {
            Layer::NatureTypes => "naturtyper",
            Layer::Coverage => "dekningskart",
        }
    }
}

/// Data-access context for one run.
///
/// Owns the configuration, knows where each layer lives and which area
/// formula fits it. Created at the start of a run and passed to the
/// processing steps; nothing else reads sources.
pub struct Session {
    config: AppConfig,
}

impl Session {
    pub fn open(config: AppConfig) -> Result<Session> {
        for layer in [Layer::NatureTypes, Layer::Coverage] {
            let path = &layer_config(&config, layer).path;
            if !path.exists() {
                return Err(anyhow!(
                    "Source for {} not found: {:?}",
                    layer.table_name(),
                    path
                ));
            }
        }
        info!(
            "Opened session: {} = {:?}, {} = {:?}",
            Layer::NatureTypes.table_name(),
            config.input.nature_types.path,
            Layer::Coverage.table_name(),
            config.input.coverage.path
        );
        Ok(Session { config })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn layer_config(&self, layer: Layer) -> &LayerConfig {
        layer_config(&self.config, layer)
    }

    pub fn area_method(&self, layer: Layer) -> AreaMethod {
        match layer {
            Layer::NatureTypes => AreaMethod::Geodesic(self.config.input.nature_types.axis_order),
            Layer::Coverage => AreaMethod::Planar,
        }
    }

    pub fn load(&self, layer: Layer) -> Result<Vec<SourceFeature>> {
        let layer_config = self.layer_config(layer);
        let features = load_layer(&layer_config.path, layer_config.id_column.as_deref())
            .with_context(|| format!("Failed to load {}", layer.table_name()))?;
        info!("Loaded {} records from {}", features.len(), layer.table_name());
        Ok(features)
    }
}

fn layer_config(config: &AppConfig, layer: Layer) -> &LayerConfig {
    match layer {
        Layer::NatureTypes => &config.input.nature_types,
        Layer::Coverage => &config.input.coverage,
    }
}

pub fn load_layer(path: &Path, id_column: Option<&str>) -> Result<Vec<SourceFeature>> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Shapefile => load_shapefile(path, id_column),
        SourceFormat::GeoJson => load_geojson(path, id_column),
    }
}

fn load_shapefile(path: &Path, id_column: Option<&str>) -> Result<Vec<SourceFeature>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut features = Vec::new();

    for (index, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) =
            result.with_context(|| format!("Failed to read record {} of {:?}", index, path))?;

        let geometry = shape_geometry(index, shape);

        let fields: HashMap<String, FieldValue> = record.into();
        let properties: Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name, field_to_json(value)))
            .collect();

        features.push(SourceFeature {
            id: resolve_id(&properties, id_column, None, index),
            geometry,
            properties,
        });
    }

    Ok(features)
}

/// Null shapes and shapes `geo` cannot represent become records without
/// geometry.
fn shape_geometry(index: usize, shape: Shape) -> Option<geo::Geometry<f64>> {
    match shape {
        Shape::NullShape => None,
        shape => match geo::Geometry::<f64>::try_from(shape) {
            Ok(g) => Some(g),
            Err(e) => {
                warn!("Record {}: cannot convert shape: {}", index, e);
                None
            }
        },
    }
}

fn load_geojson(path: &Path, id_column: Option<&str>) -> Result<Vec<SourceFeature>> {
    let file = File::open(path).with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let reader = BufReader::new(file);

    // Loads the whole file into memory.
    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.into_iter().enumerate() {
        let feature_id = feature.id.as_ref().map(|id| match id {
            Id::String(s) => s.clone(),
            Id::Number(n) => n.to_string(),
        });

        let geometry = match feature.geometry {
            Some(g) => match geo::Geometry::<f64>::try_from(g.value) {
                Ok(g) => Some(g),
                Err(e) => {
                    warn!("Feature {}: cannot convert geometry: {:?}", index, e);
                    None
                }
            },
            None => None,
        };

        let properties = feature.properties.unwrap_or_default();

        features.push(SourceFeature {
            id: resolve_id(&properties, id_column, feature_id, index),
            geometry,
            properties,
        });
    }

    Ok(features)
}

/// Identifier from the configured column, else the source's own feature id,
/// else the row number.
fn resolve_id(
    properties: &Map<String, Value>,
    id_column: Option<&str>,
    feature_id: Option<String>,
    index: usize,
) -> String {
    let from_column = id_column
        .and_then(|column| properties.get(column))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    from_column
        .or(feature_id)
        .unwrap_or_else(|| index.to_string())
}

fn field_to_json(value: FieldValue) -> Value {
    fn number(v: f64) -> Value {
        serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }

    match value {
        FieldValue::Character(Some(s)) => Value::String(s.trim().to_string()),
        FieldValue::Character(None) => Value::Null,
        FieldValue::Numeric(Some(v)) => number(v),
        FieldValue::Numeric(None) => Value::Null,
        FieldValue::Float(Some(v)) => number(v as f64),
        FieldValue::Float(None) => Value::Null,
        FieldValue::Integer(v) => Value::from(v),
        FieldValue::Double(v) => number(v),
        FieldValue::Logical(Some(b)) => Value::Bool(b),
        FieldValue::Logical(None) => Value::Null,
        FieldValue::Memo(s) => Value::String(s),
        other => Value::String(format!("{:?}", other)),
    }
}
