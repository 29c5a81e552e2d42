//! # Dataset Extents
//!
//! Loaders that open an external dataset and report its axis-aligned
//! extent, so the reconciliation functions in [`crate::bounds`] never touch
//! file formats directly.
//!
//! ## Sources
//!
//! - [`LiteralExtent`]: a box written into the job configuration
//! - [`NetcdfExtent`]: a gridded NetCDF file (weather cutout, eligibility mask)
//! - [`GeoJsonExtent`]: a vector boundary layer, optionally with some
//!   features excluded by property value
//!
//! Every loader validates the box it produces with
//! [`crate::bounds::validate_box`]; a malformed or empty extent is an error,
//! never silently repaired.

use crate::bounds::{validate_box, BoundingBox, MalformedBoundsError};
use crate::grid::GridAxes;
use geojson::{Feature, GeoJson, Geometry, Value};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Coordinate variable names tried, in order, when none is configured.
pub const DEFAULT_X_NAMES: [&str; 3] = ["x", "lon", "longitude"];
pub const DEFAULT_Y_NAMES: [&str; 3] = ["y", "lat", "latitude"];

/// RFC 7946 fixes GeoJSON coordinates to WGS 84.
pub const GEOJSON_CRS: &str = "EPSG:4326";

/// Errors that can occur while loading a dataset extent
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Required input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("No coordinate variable found in {path} (tried: {})", .tried.join(", "))]
    CoordinateNotFound { path: String, tried: Vec<String> },

    #[error("Dataset has no usable extent: {0}")]
    Empty(String),

    #[error(transparent)]
    Malformed(#[from] MalformedBoundsError),
}

/// Result type for extent loading
pub type DatasetResult<T> = Result<T, DatasetError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Bbox,
    Netcdf,
    Geojson,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::Bbox => "bbox",
            SourceKind::Netcdf => "netcdf",
            SourceKind::Geojson => "geojson",
        };
        f.write_str(s)
    }
}

/// What a loader reports about one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetExtent {
    pub label: String,
    pub kind: SourceKind,
    pub bounds: BoundingBox,
    pub crs: Option<String>,
    /// Mean cell spacing `[dx, dy]` for gridded sources.
    pub resolution: Option<[f64; 2]>,
    /// `[rows, cols]` for gridded sources.
    pub shape: Option<[usize; 2]>,
    pub feature_count: Option<usize>,
    #[serde(skip)]
    pub grid: Option<GridAxes>,
}

impl DatasetExtent {
    fn from_bounds(label: String, kind: SourceKind, bounds: BoundingBox) -> Self {
        DatasetExtent {
            label,
            kind,
            bounds,
            crs: None,
            resolution: None,
            shape: None,
            feature_count: None,
            grid: None,
        }
    }

    fn from_grid(label: String, grid: GridAxes) -> Self {
        let (rows, cols) = grid.shape();
        DatasetExtent {
            label,
            kind: SourceKind::Netcdf,
            bounds: grid.extent(),
            crs: None,
            resolution: grid.resolution().map(|(dx, dy)| [dx, dy]),
            shape: Some([rows, cols]),
            feature_count: None,
            grid: Some(grid),
        }
    }
}

/// A dataset whose spatial extent can be loaded.
pub trait ExtentSource {
    /// Human-readable name used in reports and log lines.
    fn label(&self) -> String;

    fn load_extent(&self) -> DatasetResult<DatasetExtent>;
}

fn require_file(path: &Path) -> DatasetResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(DatasetError::MissingInput(path.to_path_buf()))
    }
}

/// A box given verbatim in configuration.
#[derive(Debug, Clone)]
pub struct LiteralExtent {
    pub label: String,
    pub bounds: BoundingBox,
    pub crs: Option<String>,
}

impl LiteralExtent {
    pub fn new(label: &str, bounds: BoundingBox, crs: Option<String>) -> Self {
        LiteralExtent {
            label: label.to_string(),
            bounds,
            crs,
        }
    }
}

impl ExtentSource for LiteralExtent {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn load_extent(&self) -> DatasetResult<DatasetExtent> {
        validate_box(&self.bounds)?;
        let mut extent = DatasetExtent::from_bounds(self.label(), SourceKind::Bbox, self.bounds);
        extent.crs = self.crs.clone();
        Ok(extent)
    }
}

/// Gridded NetCDF dataset with 1-D x/y coordinate variables.
#[derive(Debug, Clone)]
pub struct NetcdfExtent {
    pub path: PathBuf,
    pub x_name: Option<String>,
    pub y_name: Option<String>,
}

impl NetcdfExtent {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        NetcdfExtent {
            path: path.as_ref().to_path_buf(),
            x_name: None,
            y_name: None,
        }
    }

    pub fn with_coordinate_names(mut self, x_name: Option<String>, y_name: Option<String>) -> Self {
        self.x_name = x_name;
        self.y_name = y_name;
        self
    }

    fn read_axis(
        &self,
        file: &netcdf::File,
        configured: Option<&str>,
        defaults: &[&str],
    ) -> DatasetResult<(String, Vec<f64>)> {
        let candidates: Vec<String> = match configured {
            Some(name) => vec![name.to_string()],
            None => defaults.iter().map(|s| s.to_string()).collect(),
        };
        for name in &candidates {
            if let Some(var) = file.variable(name) {
                if var.dimensions().len() != 1 {
                    debug!("Skipping '{}': not a 1-D coordinate variable", name);
                    continue;
                }
                let values = var.get_values::<f64, _>(..)?;
                return Ok((name.clone(), values));
            }
        }
        Err(DatasetError::CoordinateNotFound {
            path: self.path.display().to_string(),
            tried: candidates,
        })
    }
}

impl ExtentSource for NetcdfExtent {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn load_extent(&self) -> DatasetResult<DatasetExtent> {
        require_file(&self.path)?;
        debug!("Opening NetCDF file: {}", self.path.display());
        let file = netcdf::open(&self.path)?;

        let (x_name, x) = self.read_axis(&file, self.x_name.as_deref(), &DEFAULT_X_NAMES)?;
        let (y_name, y) = self.read_axis(&file, self.y_name.as_deref(), &DEFAULT_Y_NAMES)?;
        debug!(
            "Using coordinates '{}' ({} values) and '{}' ({} values)",
            x_name,
            x.len(),
            y_name,
            y.len()
        );
        let crs = read_crs(&file);
        file.close()?;

        let grid = GridAxes::new(x, y)?;
        let mut extent = DatasetExtent::from_grid(self.label(), grid);
        extent.crs = crs;
        info!("Loaded grid extent {} from {}", extent.bounds, extent.label);
        Ok(extent)
    }
}

fn attribute_to_string(value: netcdf::AttributeValue) -> Option<String> {
    match value {
        netcdf::AttributeValue::Str(s) => Some(s),
        netcdf::AttributeValue::Int(code) => Some(format!("EPSG:{}", code)),
        netcdf::AttributeValue::Short(code) => Some(format!("EPSG:{}", code)),
        netcdf::AttributeValue::Longlong(code) => Some(format!("EPSG:{}", code)),
        _ => None,
    }
}

/// Variables that may carry the grid mapping, in lookup order.
const CRS_VARIABLES: [&str; 2] = ["crs", "spatial_ref"];

/// Attributes of a grid-mapping variable holding a CRS, in lookup order.
const CRS_ATTRIBUTES: [&str; 3] = ["epsg_code", "crs_wkt", "spatial_ref"];

/// CRS identifier from a `crs` global attribute, or from a grid-mapping
/// variable (`crs`, `spatial_ref`, or any variable named by a
/// `grid_mapping` attribute). Recognised identifiers are normalised to
/// `EPSG:<code>`; anything else is kept verbatim.
fn read_crs(file: &netcdf::File) -> Option<String> {
    let global = file
        .attribute("crs")
        .and_then(|attr| attr.value().ok())
        .and_then(attribute_to_string);

    let raw = global.or_else(|| {
        let mut names: Vec<String> = CRS_VARIABLES.iter().map(|s| s.to_string()).collect();
        names.extend(grid_mapping_names(file));
        names.iter().find_map(|name| {
            let var = file.variable(name)?;
            CRS_ATTRIBUTES.iter().find_map(|attr| {
                var.attribute(attr)
                    .and_then(|a| a.value().ok())
                    .and_then(attribute_to_string)
            })
        })
    })?;

    match crate::crs::normalize_crs(&raw) {
        Some(id) => Some(id),
        None => {
            debug!("Unrecognised CRS identifier kept verbatim: {}", raw);
            Some(raw)
        }
    }
}

/// Names referenced by the `grid_mapping` attribute of any variable.
pub(crate) fn grid_mapping_names(file: &netcdf::File) -> Vec<String> {
    let mut names = Vec::new();
    for var in file.variables() {
        if let Some(netcdf::AttributeValue::Str(name)) = var
            .attribute("grid_mapping")
            .and_then(|attr| attr.value().ok())
        {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Drops features whose `property` equals one of `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub property: String,
    pub values: Vec<String>,
}

impl PropertyFilter {
    pub fn new(property: &str, values: Vec<String>) -> Self {
        PropertyFilter {
            property: property.to_string(),
            values,
        }
    }

    pub fn excludes(&self, feature: &Feature) -> bool {
        match feature.property(&self.property) {
            Some(serde_json::Value::String(s)) => self.values.iter().any(|v| v == s),
            Some(other) => {
                let rendered = other.to_string();
                self.values.iter().any(|v| *v == rendered)
            }
            None => false,
        }
    }
}

/// Extent of one feature of a vector layer.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureExtent {
    pub name: Option<String>,
    /// `None` for a feature without coordinates.
    pub bounds: Option<BoundingBox>,
}

/// Vector boundary layer stored as GeoJSON.
#[derive(Debug, Clone)]
pub struct GeoJsonExtent {
    pub path: PathBuf,
    pub exclude: Option<PropertyFilter>,
}

impl GeoJsonExtent {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        GeoJsonExtent {
            path: path.as_ref().to_path_buf(),
            exclude: None,
        }
    }

    pub fn with_exclude(mut self, exclude: Option<PropertyFilter>) -> Self {
        self.exclude = exclude;
        self
    }

    /// Features kept after applying the exclude filter.
    pub fn features(&self) -> DatasetResult<Vec<Feature>> {
        require_file(&self.path)?;
        let content = fs::read_to_string(&self.path)?;
        let geojson = content.parse::<GeoJson>()?;
        let features = match geojson {
            GeoJson::FeatureCollection(fc) => fc.features,
            GeoJson::Feature(f) => vec![f],
            GeoJson::Geometry(g) => vec![Feature {
                bbox: None,
                geometry: Some(g),
                id: None,
                properties: None,
                foreign_members: None,
            }],
        };
        let total = features.len();
        let kept: Vec<Feature> = match &self.exclude {
            Some(filter) => features.into_iter().filter(|f| !filter.excludes(f)).collect(),
            None => features,
        };
        if kept.len() != total {
            debug!(
                "Excluded {} of {} features from {}",
                total - kept.len(),
                total,
                self.path.display()
            );
        }
        Ok(kept)
    }

    /// Bounds of each kept feature, labelled by `name_property` when present.
    pub fn feature_extents(&self, name_property: &str) -> DatasetResult<Vec<FeatureExtent>> {
        let features = self.features()?;
        Ok(features
            .iter()
            .map(|f| FeatureExtent {
                name: f.property(name_property).map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                }),
                bounds: f
                    .geometry
                    .as_ref()
                    .and_then(|g| BoundingBox::from_points(geometry_points(g)).ok()),
            })
            .collect())
    }
}

impl ExtentSource for GeoJsonExtent {
    fn label(&self) -> String {
        self.path.display().to_string()
    }

    fn load_extent(&self) -> DatasetResult<DatasetExtent> {
        let features = self.features()?;
        if features.is_empty() {
            return Err(DatasetError::Empty(format!(
                "{} has no features left after filtering",
                self.label()
            )));
        }
        let points: Vec<(f64, f64)> = features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(geometry_points)
            .collect();
        let bounds = BoundingBox::from_points(points).map_err(|_| {
            DatasetError::Empty(format!("{} has no finite coordinates", self.label()))
        })?;
        validate_box(&bounds)?;

        let mut extent = DatasetExtent::from_bounds(self.label(), SourceKind::Geojson, bounds);
        extent.crs = Some(GEOJSON_CRS.to_string());
        extent.feature_count = Some(features.len());
        info!(
            "Loaded vector extent {} from {} ({} features)",
            extent.bounds,
            extent.label,
            features.len()
        );
        Ok(extent)
    }
}

fn position_xy(position: &[f64]) -> Option<(f64, f64)> {
    match position {
        [x, y, ..] => Some((*x, *y)),
        _ => None,
    }
}

/// Every `(x, y)` vertex of a geometry, recursing into collections.
fn geometry_points(geometry: &Geometry) -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    collect_points(&geometry.value, &mut points);
    points
}

fn collect_points(value: &Value, out: &mut Vec<(f64, f64)>) {
    match value {
        Value::Point(p) => out.extend(position_xy(p)),
        Value::MultiPoint(ps) | Value::LineString(ps) => {
            out.extend(ps.iter().filter_map(|p| position_xy(p)))
        }
        Value::MultiLineString(lines) | Value::Polygon(lines) => {
            for line in lines {
                out.extend(line.iter().filter_map(|p| position_xy(p)));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                for ring in rings {
                    out.extend(ring.iter().filter_map(|p| position_xy(p)));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_points(&g.value, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const REGIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME_1": "Lisboa"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [-9.5, 38.6], [-8.8, 38.6], [-8.8, 39.3], [-9.5, 39.3], [-9.5, 38.6]
                ]]}
            },
            {
                "type": "Feature",
                "properties": {"NAME_1": "Bragança"},
                "geometry": {"type": "MultiPolygon", "coordinates": [[[
                    [-7.4, 41.0], [-6.19, 41.0], [-6.19, 42.15], [-7.4, 42.15], [-7.4, 41.0]
                ]]]}
            },
            {
                "type": "Feature",
                "properties": {"NAME_1": "Azores"},
                "geometry": {"type": "Polygon", "coordinates": [[
                    [-31.3, 36.9], [-25.0, 36.9], [-25.0, 39.8], [-31.3, 39.8], [-31.3, 36.9]
                ]]}
            }
        ]
    }"#;

    fn write_regions(dir: &Path) -> PathBuf {
        let path = dir.join("regions.geojson");
        fs::write(&path, REGIONS).unwrap();
        path
    }

    #[test]
    fn test_literal_extent_validates() {
        let ok = LiteralExtent::new("region", BoundingBox::new(0.0, 0.0, 1.0, 1.0), None);
        assert_eq!(ok.load_extent().unwrap().kind, SourceKind::Bbox);

        let bad = LiteralExtent::new("region", BoundingBox::new(5.0, 0.0, 2.0, 1.0), None);
        assert!(matches!(
            bad.load_extent(),
            Err(DatasetError::Malformed(MalformedBoundsError::InvertedX { .. }))
        ));
    }

    #[test]
    fn test_geojson_union_of_all_features() {
        let dir = tempdir().unwrap();
        let path = write_regions(dir.path());

        let extent = GeoJsonExtent::new(&path).load_extent().unwrap();
        assert_eq!(extent.bounds, BoundingBox::new(-31.3, 36.9, -6.19, 42.15));
        assert_eq!(extent.feature_count, Some(3));
        assert_eq!(extent.crs.as_deref(), Some(GEOJSON_CRS));
    }

    #[test]
    fn test_geojson_exclude_filter() {
        let dir = tempdir().unwrap();
        let path = write_regions(dir.path());

        let excluded = vec!["Azores".to_string(), "Madeira".to_string()];
        let filter = PropertyFilter::new("NAME_1", excluded);
        let extent = GeoJsonExtent::new(&path)
            .with_exclude(Some(filter))
            .load_extent()
            .unwrap();
        assert_eq!(extent.bounds, BoundingBox::new(-9.5, 38.6, -6.19, 42.15));
        assert_eq!(extent.feature_count, Some(2));
    }

    #[test]
    fn test_geojson_everything_excluded() {
        let dir = tempdir().unwrap();
        let path = write_regions(dir.path());

        let filter = PropertyFilter::new(
            "NAME_1",
            vec!["Lisboa".to_string(), "Bragança".to_string(), "Azores".to_string()],
        );
        let result = GeoJsonExtent::new(&path).with_exclude(Some(filter)).load_extent();
        assert!(matches!(result, Err(DatasetError::Empty(_))));
    }

    #[test]
    fn test_geojson_feature_extents() {
        let dir = tempdir().unwrap();
        let path = write_regions(dir.path());

        let regions = GeoJsonExtent::new(&path).feature_extents("NAME_1").unwrap();
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].name.as_deref(), Some("Lisboa"));
        assert_eq!(
            regions[1].bounds,
            Some(BoundingBox::new(-7.4, 41.0, -6.19, 42.15))
        );
    }

    #[test]
    fn test_geojson_missing_file() {
        let dir = tempdir().unwrap();
        let result = GeoJsonExtent::new(dir.path().join("absent.geojson")).load_extent();
        assert!(matches!(result, Err(DatasetError::MissingInput(_))));
    }

    #[test]
    fn test_geojson_invalid_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.geojson");
        fs::write(&path, "{\"type\": \"Nonsense\"}").unwrap();
        assert!(matches!(
            GeoJsonExtent::new(&path).load_extent(),
            Err(DatasetError::GeoJson(_))
        ));
    }

    #[test]
    fn test_geometry_collection_points() {
        let geometry: Geometry = r#"{
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1.0, 2.0]},
                {"type": "LineString", "coordinates": [[3.0, 4.0], [5.0, -6.0, 100.0]]}
            ]
        }"#
        .parse::<GeoJson>()
        .ok()
        .and_then(|g| match g {
            GeoJson::Geometry(g) => Some(g),
            _ => None,
        })
        .unwrap();

        let points = geometry_points(&geometry);
        assert_eq!(points, vec![(1.0, 2.0), (3.0, 4.0), (5.0, -6.0)]);
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Netcdf.to_string(), "netcdf");
        assert_eq!(SourceKind::Geojson.to_string(), "geojson");
    }
}
