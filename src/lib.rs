//! # extentcheck
//!
//! A Rust library for reconciling the spatial extents of geospatial datasets
//! before they are combined in an energy-system or climate workflow.
//!
//! ## Features
//!
//! - **Bounds checks**: overlap per axis and margin containment per edge
//! - **Extent loaders**: literal boxes, NetCDF coordinate variables, GeoJSON features
//! - **Grid probes**: nearest grid cell of a point in a gridded dataset
//! - **Inspection helpers**: NetCDF structure, eligibility masks, notebooks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use extentcheck::{run_bounds_job, input::JobConfig};
//!
//! let config = JobConfig::from_file("job.yaml").expect("Failed to load config");
//! let report = run_bounds_job(&config).expect("Failed to load extents");
//! for candidate in &report.candidates {
//!     println!("{}: {}", candidate.name, candidate.passed());
//! }
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! reference:
//!   kind: geojson
//!   params:
//!     path: data/gadm41_PRT_1.json
//!     exclude:
//!       property: NAME_1
//!       values: [Azores, Madeira]
//! candidates:
//!   - name: era5
//!     margin: 0.25
//!     source:
//!       kind: netcdf
//!       params:
//!         path: cutouts/portugal-2024.nc
//! points:
//!   - name: Windfloat Atlantic
//!     x: -9.306
//!     y: 41.651
//! ```

pub mod bounds;
pub mod cli;
pub mod crs;
pub mod dataset;
pub mod grid;
pub mod info;
pub mod input;
pub mod job;
pub mod masks;
pub mod notebook;
pub mod report;



pub use bounds::{
    contains_with_margin, overlaps, validate_box, BoundingBox, ContainmentResult, Margin,
    MalformedBoundsError,
};
pub use crs::normalize_crs;
pub use job::{run_bounds_job, JobError, JobReport};
