//! # Eligibility Mask Summary
//!
//! Counts eligible cells in gridded eligibility masks. A cell is eligible
//! when its value is strictly greater than the threshold; NaN cells never
//! are, but still count towards the total. Cells equal to a variable's
//! `_FillValue` or `missing_value` are read as NaN.
//!
//! Coordinate variables, scalar variables and grid-mapping variables (any
//! variable named by a `grid_mapping` attribute) are not masks and are
//! skipped.

use crate::dataset::grid_mapping_names;
use crate::info::is_coordinate_variable;
use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct MaskVariableSummary {
    pub name: String,
    pub dimensions: Vec<String>,
    pub eligible_cells: usize,
    pub total_cells: usize,
}

impl MaskVariableSummary {
    pub fn eligible_percent(&self) -> f64 {
        if self.total_cells == 0 {
            0.0
        } else {
            100.0 * self.eligible_cells as f64 / self.total_cells as f64
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaskFileSummary {
    pub path: String,
    pub variables: Vec<MaskVariableSummary>,
    /// Set instead of `variables` when the file could not be read.
    pub error: Option<String>,
}

pub fn count_eligible(values: &[f64], threshold: f64) -> usize {
    values.iter().filter(|v| **v > threshold).count()
}

fn attribute_as_f64(value: netcdf::AttributeValue) -> Option<f64> {
    match value {
        netcdf::AttributeValue::Double(v) => Some(v),
        netcdf::AttributeValue::Float(v) => Some(v as f64),
        netcdf::AttributeValue::Int(v) => Some(v as f64),
        netcdf::AttributeValue::Short(v) => Some(v as f64),
        netcdf::AttributeValue::Schar(v) => Some(v as f64),
        netcdf::AttributeValue::Uchar(v) => Some(v as f64),
        netcdf::AttributeValue::Longlong(v) => Some(v as f64),
        _ => None,
    }
}

fn fill_values(var: &netcdf::Variable) -> Vec<f64> {
    ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| var.attribute(name))
        .filter_map(|attr| attr.value().ok())
        .filter_map(attribute_as_f64)
        .collect()
}

/// Replaces every cell equal to one of `fills` with NaN.
pub fn mask_fill_values(values: &mut [f64], fills: &[f64]) {
    for value in values.iter_mut() {
        if fills.contains(value) {
            *value = f64::NAN;
        }
    }
}

/// Summarises every data variable of one mask file.
pub fn summarize_mask_file<P: AsRef<Path>>(path: P, threshold: f64) -> Result<MaskFileSummary> {
    let path = path.as_ref();
    let file = netcdf::open(path)
        .with_context(|| format!("Failed to open mask file: {}", path.display()))?;

    let grid_mappings = grid_mapping_names(&file);
    let mut variables = Vec::new();
    for var in file.variables() {
        if is_coordinate_variable(&var)
            || var.dimensions().is_empty()
            || grid_mappings.contains(&var.name())
        {
            debug!("{}: skipping non-mask variable '{}'", path.display(), var.name());
            continue;
        }
        let mut values = var
            .get_values::<f64, _>(..)
            .with_context(|| format!("Failed to read variable '{}'", var.name()))?;
        mask_fill_values(&mut values, &fill_values(&var));
        debug!("{}: read {} cells from '{}'", path.display(), values.len(), var.name());
        variables.push(MaskVariableSummary {
            name: var.name().to_string(),
            dimensions: var.dimensions().iter().map(|d| d.name().to_string()).collect(),
            eligible_cells: count_eligible(&values, threshold),
            total_cells: values.len(),
        });
    }
    file.close().context("Failed to close mask file")?;

    Ok(MaskFileSummary {
        path: path.display().to_string(),
        variables,
        error: None,
    })
}

fn list_netcdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("nc"))
        .collect();
    files.sort();
    Ok(files)
}

/// Summarises every `*.nc` file in `dir`, in file-name order.
///
/// A file that fails to read is recorded with its error rather than
/// aborting the scan.
pub fn summarize_mask_dir<P: AsRef<Path>>(
    dir: P,
    threshold: f64,
    show_progress: bool,
) -> Result<Vec<MaskFileSummary>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        bail!("Eligibility directory not found: {}", dir.display());
    }
    let files = list_netcdf_files(dir)?;

    let progress = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        Some(pb)
    } else {
        None
    };

    let mut summaries = Vec::with_capacity(files.len());
    for path in &files {
        if let Some(pb) = &progress {
            let name = path.file_name().map(|n| n.to_string_lossy().to_string());
            pb.set_message(name.unwrap_or_default());
        }
        let summary = match summarize_mask_file(path, threshold) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                MaskFileSummary {
                    path: path.display().to_string(),
                    variables: Vec::new(),
                    error: Some(format!("{:#}", e)),
                }
            }
        };
        summaries.push(summary);
        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    Ok(summaries)
}

pub fn print_mask_summaries_human(summaries: &[MaskFileSummary]) {
    if summaries.is_empty() {
        println!("No mask files found");
        return;
    }
    for summary in summaries {
        println!("\nFile: {}", summary.path);
        if let Some(error) = &summary.error {
            println!("  [ERROR] {}", error);
            continue;
        }
        for var in &summary.variables {
            println!(
                "  {}: {}/{} cells ({:.1}%) [{}]",
                var.name,
                var.eligible_cells,
                var.total_cells,
                var.eligible_percent(),
                var.dimensions.join(", ")
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{add_grid_mapping, write_mask};
    use tempfile::tempdir;

    #[test]
    fn test_count_eligible_is_strict_and_ignores_nan() {
        let values = [0.0, 0.5, 0.51, 1.0, f64::NAN];
        assert_eq!(count_eligible(&values, 0.5), 2);
        assert_eq!(count_eligible(&[], 0.5), 0);
    }

    #[test]
    fn test_eligible_percent() {
        let summary = MaskVariableSummary {
            name: "wind_onshore".to_string(),
            dimensions: vec![],
            eligible_cells: 1,
            total_cells: 4,
        };
        assert_eq!(summary.eligible_percent(), 25.0);

        let empty = MaskVariableSummary {
            total_cells: 0,
            eligible_cells: 0,
            ..summary
        };
        assert_eq!(empty.eligible_percent(), 0.0);
    }

    #[test]
    fn test_summarize_mask_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wind_onshore.nc");
        write_mask(&path, "wind_onshore", &[0.0, 1.0, 0.75, f64::NAN, 0.5, 1.0]).unwrap();

        let summary = summarize_mask_file(&path, DEFAULT_THRESHOLD).unwrap();
        assert_eq!(summary.variables.len(), 1);
        let var = &summary.variables[0];
        assert_eq!(var.name, "wind_onshore");
        assert_eq!(var.eligible_cells, 3);
        assert_eq!(var.total_cells, 6);
    }

    #[test]
    fn test_mask_fill_values() {
        let mut values = vec![1.0, -9999.0, 0.0, 9.96921e36];
        mask_fill_values(&mut values, &[-9999.0, 9.96921e36]);
        assert_eq!(values[0], 1.0);
        assert!(values[1].is_nan());
        assert_eq!(values[2], 0.0);
        assert!(values[3].is_nan());
        assert_eq!(count_eligible(&values, DEFAULT_THRESHOLD), 1);
    }

    #[test]
    fn test_summarize_skips_grid_mapping_and_missing_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wind_onshore.nc");
        write_mask(&path, "wind_onshore", &[0.0, 1.0, 2.0, 2.0, 0.5, 1.0]).unwrap();
        add_grid_mapping(&path, "wind_onshore", "spatial_ref", "crs_wkt", "EPSG:4326").unwrap();
        {
            let mut file = netcdf::append(&path).unwrap();
            let mut var = file.variable_mut("wind_onshore").unwrap();
            var.put_attribute("missing_value", 2.0).unwrap();
        }

        let summary = summarize_mask_file(&path, DEFAULT_THRESHOLD).unwrap();
        let names: Vec<&str> = summary.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["wind_onshore"]);
        let var = &summary.variables[0];
        assert_eq!(var.eligible_cells, 2);
        assert_eq!(var.total_cells, 6);
    }

    #[test]
    fn test_summarize_mask_dir_sorted_and_tolerant() {
        let dir = tempdir().unwrap();
        let solar = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        write_mask(&dir.path().join("b_solar.nc"), "solar_pv", &solar).unwrap();
        write_mask(&dir.path().join("a_wind.nc"), "wind_onshore", &[1.0; 6]).unwrap();
        fs::write(dir.path().join("c_broken.nc"), b"not netcdf").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let summaries = summarize_mask_dir(dir.path(), DEFAULT_THRESHOLD, false).unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries[0].path.ends_with("a_wind.nc"));
        assert_eq!(summaries[0].variables[0].eligible_cells, 6);
        assert_eq!(summaries[1].variables[0].eligible_cells, 2);
        assert!(summaries[2].error.is_some());
    }

    #[test]
    fn test_summarize_missing_dir() {
        assert!(summarize_mask_dir("/nonexistent/eligibility", DEFAULT_THRESHOLD, false).is_err());
    }
}
