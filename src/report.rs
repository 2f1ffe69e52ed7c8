use crate::axis::AxisCheck;
use crate::coverage::CrossProjection;
use crate::processing::{LayerResult, Reconciliation};
use anyhow::{Context, Result};
use format_num::NumberFormat;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

const SQM_PER_SQKM: f64 = 1_000_000.0;

#[derive(Debug, Clone, Serialize)]
pub struct LayerStats {
    pub table: String,
    pub records: usize,
    pub measured: usize,
    pub total_sqm: f64,
    /// Records without area, by reason.
    pub issues: BTreeMap<String, usize>,
    /// Degenerate parts skipped inside otherwise measured records.
    pub dropped_parts: usize,
    pub axis_order: AxisCheck,
}

impl LayerStats {
    pub fn from_result(result: &LayerResult) -> LayerStats {
        let mut issues = BTreeMap::new();
        for issue in result.records.iter().filter_map(|r| r.issue.as_ref()) {
            *issues.entry(issue.label().to_string()).or_insert(0) += 1;
        }

        LayerStats {
            table: result.layer.table_name().to_string(),
            records: result.records.len(),
            measured: result.records.iter().filter(|r| r.area_sqm.is_some()).count(),
            total_sqm: result.total_sqm,
            issues,
            dropped_parts: result.records.iter().map(|r| r.dropped_parts).sum(),
            axis_order: result.axis_check,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub mapped_sqm: f64,
    pub surveyed_sqm: f64,
    /// `None` (JSON `null`) when the surveyed total is zero.
    pub coverage_pct: Option<f64>,
    pub nature_types: LayerStats,
    pub coverage: LayerStats,
    pub cross_projection: Option<CrossProjection>,
}

impl Summary {
    pub fn from_reconciliation(reconciliation: &Reconciliation) -> Summary {
        Summary {
            mapped_sqm: reconciliation.nature_types.total_sqm,
            surveyed_sqm: reconciliation.coverage.total_sqm,
            coverage_pct: reconciliation.coverage_pct,
            nature_types: LayerStats::from_result(&reconciliation.nature_types),
            coverage: LayerStats::from_result(&reconciliation.coverage),
            cross_projection: reconciliation.cross_projection.clone(),
        }
    }
}

pub fn format_area(sqm: f64) -> String {
    let num = NumberFormat::new();
    format!(
        "{} m² ({} km²)",
        num.format(",.2f", sqm),
        num.format(",.2f", sqm / SQM_PER_SQKM)
    )
}

pub fn format_percentage(pct: Option<f64>) -> String {
    match pct {
        Some(p) => format!("{:.2}%", p),
        None => "not applicable".to_string(),
    }
}

impl fmt::Display for LayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} records, {} measured",
            self.table, self.records, self.measured
        )?;
        for (label, count) in &self.issues {
            write!(f, ", {} {}", count, label)?;
        }
        if self.dropped_parts > 0 {
            write!(f, ", {} degenerate parts skipped", self.dropped_parts)?;
        }
        if self.axis_order != AxisCheck::NotApplicable {
            write!(f, ", axis order {}", self.axis_order)?;
        }
        Ok(())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## Coverage Analysis")?;
        writeln!(
            f,
            "Total mapped area ({}):   {}",
            self.nature_types.table,
            format_area(self.mapped_sqm)
        )?;
        writeln!(
            f,
            "Total surveyed area ({}): {}",
            self.coverage.table,
            format_area(self.surveyed_sqm)
        )?;
        writeln!(f, "Coverage percentage:      {}", format_percentage(self.coverage_pct))?;

        if let Some(pct) = self.coverage_pct {
            writeln!(
                f,
                "\n{:.2}% of the total surveyed area has been classified with specific nature types.",
                pct
            )?;
        }

        writeln!(f, "\n## Data quality")?;
        writeln!(f, "{}", self.nature_types)?;
        writeln!(f, "{}", self.coverage)?;

        if let Some(cross) = &self.cross_projection {
            writeln!(f, "\n## Cross-projection check ({})", cross.zone)?;
            writeln!(f, "Mapped area, geodesic:  {}", format_area(cross.mapped_geodesic_sqm))?;
            writeln!(
                f,
                "Mapped area, planar:    {} (difference {})",
                format_area(cross.mapped_planar_sqm),
                format_percentage(cross.difference_pct)
            )?;
            writeln!(
                f,
                "Mapped outside survey:  {} records, {}",
                cross.outside_count,
                format_area(cross.outside_area_sqm)
            )?;
            if !cross.unprojected_ids.is_empty() {
                writeln!(
                    f,
                    "Not projectable:        {} records (left out above)",
                    cross.unprojected_ids.len()
                )?;
            }
        }

        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }
    Ok(())
}

pub fn write_json(summary: &Summary, path: &Path) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)
        .with_context(|| format!("Failed to write summary to {:?}", path))?;
    info!("Wrote summary to {:?}", path);
    Ok(())
}

#[derive(Serialize)]
struct RecordRow<'a> {
    id: &'a str,
    geometry_type: String,
    area_sqm: Option<f64>,
    issue: Option<String>,
    dropped_parts: usize,
}

/// Writes the derived collection of one layer to `<dir>/<table>_areas.csv`.
pub fn write_records_csv(result: &LayerResult, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {:?}", dir))?;
    let path = dir.join(format!("{}_areas.csv", result.layer.table_name()));

    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for record in &result.records {
        writer.serialize(RecordRow {
            id: &record.feature.id,
            geometry_type: record.kind.to_string(),
            area_sqm: record.area_sqm,
            issue: record.issue.as_ref().map(|e| e.to_string()),
            dropped_parts: record.dropped_parts,
        })?;
    }
    writer.flush()?;

    info!("Wrote {} records to {:?}", result.records.len(), path);
    Ok(path)
}
