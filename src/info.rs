//! # NetCDF File Information Module
//!
//! This module extracts and displays the structure of NetCDF files such as
//! weather cutouts and eligibility masks: dimensions, variables, attributes,
//! and the value range of every coordinate variable.

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Information about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfDimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Information about a NetCDF variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfVariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub attributes: BTreeMap<String, String>,
    pub shape: Vec<usize>,
}

/// Value range of a coordinate variable (a 1-D variable named after its
/// own dimension)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinateRange {
    pub name: String,
    pub length: usize,
    pub min: f64,
    pub max: f64,
}

/// Complete information about a NetCDF file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfInfo {
    pub path: String,
    pub dimensions: Vec<NetCdfDimensionInfo>,
    pub variables: Vec<NetCdfVariableInfo>,
    pub coordinates: Vec<CoordinateRange>,
    pub global_attributes: BTreeMap<String, String>,
    pub file_size: Option<u64>,
    pub total_variables: usize,
    pub total_dimensions: usize,
}

/// True for a 1-D variable sharing its name with its dimension.
pub(crate) fn is_coordinate_variable(var: &netcdf::Variable) -> bool {
    let dims = var.dimensions();
    dims.len() == 1 && dims[0].name() == var.name()
}

fn coordinate_range(var: &netcdf::Variable) -> Option<CoordinateRange> {
    let values = match var.get_values::<f64, _>(..) {
        Ok(values) => values,
        Err(e) => {
            debug!("Skipping range of '{}': {}", var.name(), e);
            return None;
        }
    };
    let (min, max) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    Some(CoordinateRange {
        name: var.name().to_string(),
        length: values.len(),
        min,
        max,
    })
}

/// Extract comprehensive information from a NetCDF file
pub fn get_netcdf_info(
    file_path: &str,
    variable: Option<&str>,
    detailed: bool,
) -> Result<NetCdfInfo> {
    if !Path::new(file_path).exists() {
        bail!("NetCDF file not found: {}", file_path);
    }

    debug!("Opening NetCDF file: {}", file_path);
    let file = netcdf::open(file_path)
        .with_context(|| format!("Failed to open NetCDF file: {}", file_path))?;

    let file_size = std::fs::metadata(file_path).ok().map(|metadata| metadata.len());

    let mut dimensions = Vec::new();
    for dim in file.dimensions() {
        dimensions.push(NetCdfDimensionInfo {
            name: dim.name().to_string(),
            length: dim.len(),
            is_unlimited: dim.is_unlimited(),
        });
    }

    let mut variables = Vec::new();
    let mut coordinates = Vec::new();
    for var in file.variables() {
        if is_coordinate_variable(&var) {
            coordinates.extend(coordinate_range(&var));
        }

        // Skip if specific variable requested and this isn't it
        if let Some(var_name) = variable {
            if var.name() != var_name {
                continue;
            }
        }

        let mut attributes = BTreeMap::new();
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        variables.push(NetCdfVariableInfo {
            name: var.name().to_string(),
            data_type: format_variable_type(&var.vartype()),
            dimensions: var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect(),
            attributes,
            shape,
        });
    }

    if let Some(var_name) = variable {
        if variables.is_empty() {
            bail!("Variable '{}' not found in {}", var_name, file_path);
        }
    }

    let mut global_attributes = BTreeMap::new();
    if detailed {
        for attr in file.attributes() {
            if let Ok(value) = attr.value() {
                global_attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }
    }

    file.close().context("Failed to close NetCDF file")?;

    Ok(NetCdfInfo {
        path: file_path.to_string(),
        total_dimensions: dimensions.len(),
        total_variables: variables.len(),
        dimensions,
        variables,
        coordinates,
        global_attributes,
        file_size,
    })
}

/// Format netcdf attribute value for display
fn format_attribute_value(value: &netcdf::AttributeValue) -> String {
    match value {
        netcdf::AttributeValue::Str(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

/// Format netcdf variable type for display
fn format_variable_type(var_type: &netcdf::types::NcVariableType) -> String {
    format!("{:?}", var_type)
}

/// Print NetCDF info in human-readable format
pub fn print_file_info_human(info: &NetCdfInfo) {
    println!("NetCDF File Information:");
    println!("  Path: {}", info.path);
    if let Some(size) = info.file_size {
        println!("  File Size: {:.1} MB", size as f64 / 1_048_576.0);
    }
    println!("  Dimensions: {} total", info.total_dimensions);
    for dim in &info.dimensions {
        println!(
            "    {} ({}{})",
            dim.name,
            dim.length,
            if dim.is_unlimited { ", unlimited" } else { "" }
        );
    }
    if !info.coordinates.is_empty() {
        println!("  Coordinate ranges:");
        for coord in &info.coordinates {
            println!(
                "    {}: [{:.2}, {:.2}] ({} values)",
                coord.name, coord.min, coord.max, coord.length
            );
        }
    }
    println!("  Variables: {} total", info.total_variables);
    for var in &info.variables {
        println!(
            "    {} ({}) - dimensions: [{}]",
            var.name,
            var.data_type,
            var.dimensions.join(", ")
        );
        for (name, value) in &var.attributes {
            println!("      @{}: {}", name, value);
        }
    }
    if !info.global_attributes.is_empty() {
        println!("  Global Attributes:");
        for (name, value) in &info.global_attributes {
            println!("    @{}: {}", name, value);
        }
    }
}

/// Print NetCDF info in JSON format
pub fn print_file_info_json(info: &NetCdfInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

/// Print NetCDF info in YAML format
pub fn print_file_info_yaml(info: &NetCdfInfo) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize NetCDF info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print NetCDF info in CSV format (variables only)
pub fn print_file_info_csv(info: &NetCdfInfo) {
    println!("variable_name,data_type,dimensions,shape,attributes_count");
    for var in &info.variables {
        let shape: Vec<String> = var.shape.iter().map(|s| s.to_string()).collect();
        println!(
            "{},{},\"{}\",\"{}\",{}",
            var.name,
            var.data_type,
            var.dimensions.join(";"),
            shape.join(";"),
            var.attributes.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::BoundingBox;
    use crate::tests::write_cutout;
    use tempfile::tempdir;

    #[test]
    fn test_info_reports_coordinates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cutout.nc");
        write_cutout(&path, "x", "y", BoundingBox::new(-9.5, 37.0, -6.0, 42.0), 0.25).unwrap();

        let info = get_netcdf_info(path.to_str().unwrap(), None, true).unwrap();
        assert_eq!(info.total_dimensions, 3);
        let x = info.coordinates.iter().find(|c| c.name == "x").unwrap();
        assert_eq!(x.min, -9.5);
        assert_eq!(x.max, -6.0);
        assert_eq!(x.length, 15);
        assert!(info.variables.iter().any(|v| v.name == "wnd100m"));
        assert_eq!(info.global_attributes.get("module").map(String::as_str), Some("era5"));
    }

    #[test]
    fn test_info_single_variable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cutout.nc");
        write_cutout(&path, "x", "y", BoundingBox::new(-9.5, 37.0, -6.0, 42.0), 0.25).unwrap();

        let info = get_netcdf_info(path.to_str().unwrap(), Some("wnd100m"), false).unwrap();
        assert_eq!(info.total_variables, 1);
        assert_eq!(info.variables[0].dimensions, vec!["time", "y", "x"]);
        assert_eq!(info.variables[0].shape, vec![2, 21, 15]);
        assert!(info.global_attributes.is_empty());

        assert!(get_netcdf_info(path.to_str().unwrap(), Some("missing"), false).is_err());
    }

    #[test]
    fn test_info_missing_file() {
        let err = get_netcdf_info("/nonexistent/file.nc", None, false).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
