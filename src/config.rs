use crate::projection::UtmZone;
use crate::types::AxisOrder;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub diagnostics: Option<DiagnosticsConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Classified nature-type polygons in geographic coordinates.
    pub nature_types: LayerConfig,
    /// Survey coverage polygons in a metric projection.
    pub coverage: LayerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LayerConfig {
    pub path: PathBuf,
    /// Attribute holding the record identifier. Falls back to the GeoJSON
    /// feature id, then the row number.
    pub id_column: Option<String>,
    /// Only read for geographic layers.
    #[serde(default)]
    pub axis_order: AxisOrder,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    /// Zone the coverage layer is projected in (33 for ETRS89 / UTM 33N).
    pub utm_zone: u8,
    #[serde(default = "default_northern")]
    pub northern: bool,
}

fn default_northern() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutputConfig {
    pub json: Option<PathBuf>,
    pub records_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Shapefile,
    GeoJson,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<SourceFormat> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s: &str| s.to_lowercase())
            .ok_or_else(|| anyhow!("Input geometry file has no extension: {:?}", path))?;

        match extension.as_str() {
            "shp" => Ok(SourceFormat::Shapefile),
            "json" | "geojson" => Ok(SourceFormat::GeoJson),
            _ => Err(anyhow!("Unsupported geometry format: {}", extension)),
        }
    }
}

impl DiagnosticsConfig {
    pub fn zone(&self) -> Result<UtmZone> {
        UtmZone::new(self.utm_zone, self.northern)
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        SourceFormat::from_path(&self.input.nature_types.path)
            .context("Invalid [input.nature_types]")?;
        SourceFormat::from_path(&self.input.coverage.path).context("Invalid [input.coverage]")?;
        if let Some(diagnostics) = &self.diagnostics {
            diagnostics.zone().context("Invalid [diagnostics]")?;
        }
        Ok(())
    }
}
