//! # Input Configuration Module
//!
//! This module provides configuration parsing and validation for
//! reconciliation jobs. A job names one *reference* extent, any number of
//! *candidate* extents to test against it, and optional probe points.
//!
//! ## Configuration Structure
//!
//! - **reference**: the extent every candidate must overlap and cover
//! - **candidates**: named datasets, each with an optional required margin
//! - **points**: named locations probed against every gridded candidate
//!
//! ## Source Types
//!
//! - **bbox**: literal `min_x, min_y, max_x, max_y`
//! - **netcdf**: gridded file with 1-D x/y coordinate variables
//! - **geojson**: vector layer, optionally excluding features by property
//!
//! ## Example Usage
//!
//! ```rust
//! use extentcheck::input::JobConfig;
//!
//! let json = r#"
//! {
//!   "reference": {
//!     "kind": "bbox",
//!     "params": {"min_x": -9.55, "min_y": 36.96, "max_x": -6.19, "max_y": 42.15}
//!   },
//!   "candidates": [
//!     {
//!       "name": "cutout",
//!       "margin": 0.25,
//!       "source": {
//!         "kind": "bbox",
//!         "params": {"min_x": -9.5, "min_y": 37.0, "max_x": -6.0, "max_y": 42.0}
//!       }
//!     }
//!   ]
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::bounds::{validate_box, BoundingBox, InvalidMarginError, Margin, MalformedBoundsError};
use crate::dataset::{ExtentSource, GeoJsonExtent, LiteralExtent, NetcdfExtent, PropertyFilter};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a job configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration must list at least one candidate")]
    NoCandidates,

    #[error("Candidate '{name}': {source}")]
    InvalidMargin {
        name: String,
        #[source]
        source: InvalidMarginError,
    },

    #[error("Source '{name}': {source}")]
    MalformedBox {
        name: String,
        #[source]
        source: MalformedBoundsError,
    },

    #[error("Point '{0}' has non-finite coordinates")]
    InvalidPoint(String),
}

/// Main configuration structure for reconciliation jobs.
///
/// # Examples
///
/// ```rust
/// use extentcheck::input::{BboxParams, CandidateConfig, JobConfig, SourceConfig};
///
/// let config = JobConfig {
///     reference: SourceConfig::Bbox {
///         params: BboxParams::new(0.0, 0.0, 1.0, 1.0),
///     },
///     candidates: vec![CandidateConfig {
///         name: "grid".to_string(),
///         source: SourceConfig::Bbox {
///             params: BboxParams::new(-1.0, -1.0, 2.0, 2.0),
///         },
///         margin: 0.5,
///     }],
///     points: vec![],
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct JobConfig {
    /// Extent every candidate is compared against
    pub reference: SourceConfig,
    /// Datasets to test
    pub candidates: Vec<CandidateConfig>,
    /// Locations probed against every gridded candidate
    #[serde(default)]
    pub points: Vec<PointConfig>,
}

/// Enumeration of all supported extent sources.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(tag = "kind")]
pub enum SourceConfig {
    /// Literal bounding box
    #[serde(rename = "bbox")]
    Bbox { params: BboxParams },
    /// Gridded NetCDF file
    #[serde(rename = "netcdf")]
    Netcdf { params: NetcdfParams },
    /// GeoJSON vector layer
    #[serde(rename = "geojson")]
    GeoJson { params: GeoJsonParams },
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct BboxParams {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    /// CRS identifier, e.g. `EPSG:4326`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<String>,
}

impl BboxParams {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BboxParams {
            min_x,
            min_y,
            max_x,
            max_y,
            crs: None,
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl From<BoundingBox> for BboxParams {
    fn from(b: BoundingBox) -> Self {
        BboxParams::new(b.min_x, b.min_y, b.max_x, b.max_y)
    }
}

/// Parameters for a NetCDF source. Coordinate names default to the first
/// of `x`/`lon`/`longitude` and `y`/`lat`/`latitude` present in the file.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct NetcdfParams {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_name: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GeoJsonParams {
    pub path: String,
    /// Features to drop before computing the extent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<PropertyFilter>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct CandidateConfig {
    pub name: String,
    pub source: SourceConfig,
    /// Required clearance beyond the reference on every edge
    #[serde(default)]
    pub margin: f64,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct PointConfig {
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl JobConfig {
    /// Loads a job configuration from a file, choosing YAML for `.yaml` /
    /// `.yml` extensions and JSON otherwise.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use extentcheck::input::JobConfig;
    ///
    /// let config = JobConfig::from_file("era5_bounds.yaml")?;
    /// println!("Checking {} candidates", config.candidates.len());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(json_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json_str)?)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    /// Checks everything that can be checked without opening a dataset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::NoCandidates);
        }
        self.reference.validate("reference")?;
        for candidate in &self.candidates {
            candidate.margin()?;
            candidate.source.validate(&candidate.name)?;
        }
        for point in &self.points {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(ConfigError::InvalidPoint(point.name.clone()));
            }
        }
        Ok(())
    }
}

impl CandidateConfig {
    pub fn margin(&self) -> Result<Margin, ConfigError> {
        Margin::new(self.margin).map_err(|source| ConfigError::InvalidMargin {
            name: self.name.clone(),
            source,
        })
    }
}

impl SourceConfig {
    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if let SourceConfig::Bbox { params } = self {
            validate_box(&params.bounds()).map_err(|source| ConfigError::MalformedBox {
                name: name.to_string(),
                source,
            })?;
        }
        Ok(())
    }

    /// Converts this configuration into a loadable extent source.
    pub fn to_source(&self, label: &str) -> Box<dyn ExtentSource> {
        match self {
            SourceConfig::Bbox { params } => Box::new(LiteralExtent::new(
                label,
                params.bounds(),
                params.crs.clone(),
            )),
            SourceConfig::Netcdf { params } => Box::new(
                NetcdfExtent::new(&params.path)
                    .with_coordinate_names(params.x_name.clone(), params.y_name.clone()),
            ),
            SourceConfig::GeoJson { params } => {
                Box::new(GeoJsonExtent::new(&params.path).with_exclude(params.exclude.clone()))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Bbox { .. } => "bbox",
            SourceConfig::Netcdf { .. } => "netcdf",
            SourceConfig::GeoJson { .. } => "geojson",
        }
    }

    /// File path for file-backed sources.
    pub fn path(&self) -> Option<&str> {
        match self {
            SourceConfig::Bbox { .. } => None,
            SourceConfig::Netcdf { params } => Some(&params.path),
            SourceConfig::GeoJson { params } => Some(&params.path),
        }
    }
}
