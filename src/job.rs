//! # Reconciliation Job
//!
//! Loads the extents named by a [`JobConfig`] and runs every bounds check
//! against them, returning a structured [`JobReport`]. Nothing here prints;
//! formatting lives in [`crate::report`].

use crate::bounds::{contains_with_margin, overlap_axes, AxisOverlap, ContainmentResult};
use crate::crs::normalize_crs;
use crate::dataset::{DatasetError, DatasetExtent};
use crate::grid::GridCell;
use crate::input::{ConfigError, JobConfig, PointConfig};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load {label}: {source}")]
    Dataset {
        label: String,
        #[source]
        source: DatasetError,
    },
}

impl JobError {
    /// True when the job failed because a required input file is absent.
    pub fn is_missing_input(&self) -> bool {
        matches!(
            self,
            JobError::Dataset {
                source: DatasetError::MissingInput(_),
                ..
            }
        )
    }
}

/// Outcome of probing one configured point against a candidate.
#[derive(Debug, Clone, Serialize)]
pub struct PointProbe {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub in_domain: bool,
    /// Nearest grid cell; only for gridded candidates and in-domain points.
    pub nearest_cell: Option<GridCell>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateReport {
    pub name: String,
    pub extent: DatasetExtent,
    /// `None` unless both CRS identifiers are known.
    pub crs_match: Option<bool>,
    pub overlap: AxisOverlap,
    pub containment: ContainmentResult,
    pub points: Vec<PointProbe>,
}

impl CandidateReport {
    pub fn passed(&self) -> bool {
        self.overlap.overlaps() && self.containment.contained && self.crs_match != Some(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub generated_at: DateTime<Utc>,
    pub reference: DatasetExtent,
    pub candidates: Vec<CandidateReport>,
}

impl JobReport {
    pub fn all_passed(&self) -> bool {
        self.candidates.iter().all(CandidateReport::passed)
    }
}

/// Compares normalised CRS identifiers; `None` when either side is absent
/// or not recognised.
fn crs_match(reference: &DatasetExtent, candidate: &DatasetExtent) -> Option<bool> {
    let reference = reference.crs.as_deref().and_then(normalize_crs)?;
    let candidate = candidate.crs.as_deref().and_then(normalize_crs)?;
    Some(reference == candidate)
}

fn probe_point(extent: &DatasetExtent, point: &PointConfig) -> PointProbe {
    let in_domain = extent.bounds.contains_point(point.x, point.y);
    let nearest_cell = extent
        .grid
        .as_ref()
        .and_then(|grid| grid.nearest_cell(point.x, point.y));
    PointProbe {
        name: point.name.clone(),
        x: point.x,
        y: point.y,
        in_domain,
        nearest_cell,
    }
}

/// Runs every check described by `config`.
///
/// The configuration is validated first. Failing checks (no overlap, an
/// insufficient edge, a CRS mismatch) are recorded in the report; only
/// loader failures and malformed extents abort the job.
///
/// # Errors
///
/// Returns [`JobError::Config`] for an invalid configuration and
/// [`JobError::Dataset`] when the reference or a candidate cannot be loaded.
pub fn run_bounds_job(config: &JobConfig) -> Result<JobReport, JobError> {
    config.validate()?;

    let reference = config
        .reference
        .to_source("reference")
        .load_extent()
        .map_err(|source| JobError::Dataset {
            label: "reference".to_string(),
            source,
        })?;
    debug!("Reference extent: {}", reference.bounds);

    let mut candidates = Vec::with_capacity(config.candidates.len());
    for candidate in &config.candidates {
        let margin = candidate.margin()?;
        let extent = candidate
            .source
            .to_source(&candidate.name)
            .load_extent()
            .map_err(|source| JobError::Dataset {
                label: candidate.name.clone(),
                source,
            })?;

        let crs_match = crs_match(&reference, &extent);
        if crs_match == Some(false) {
            warn!(
                "CRS mismatch between reference ({}) and '{}' ({}); comparing raw coordinates",
                reference.crs.as_deref().unwrap_or("?"),
                candidate.name,
                extent.crs.as_deref().unwrap_or("?")
            );
        }

        let overlap = overlap_axes(&reference.bounds, &extent.bounds);
        let containment = contains_with_margin(&reference.bounds, &extent.bounds, margin);
        let points = config
            .points
            .iter()
            .map(|p| probe_point(&extent, p))
            .collect();

        debug!(
            "Candidate '{}': overlap={}, contained={}",
            candidate.name,
            overlap.overlaps(),
            containment.contained
        );
        candidates.push(CandidateReport {
            name: candidate.name.clone(),
            extent,
            crs_match,
            overlap,
            containment,
            points,
        });
    }

    Ok(JobReport {
        generated_at: Utc::now(),
        reference,
        candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Edge;
    use crate::input::{BboxParams, CandidateConfig, NetcdfParams, SourceConfig};

    fn bbox(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: Option<&str>) -> SourceConfig {
        let mut params = BboxParams::new(min_x, min_y, max_x, max_y);
        params.crs = crs.map(str::to_string);
        SourceConfig::Bbox { params }
    }

    #[test]
    fn test_literal_job_reports_every_failing_edge() {
        let config = JobConfig {
            reference: bbox(-9.55, 36.96, -6.19, 42.15, None),
            candidates: vec![CandidateConfig {
                name: "cutout".to_string(),
                source: bbox(-9.5, 37.0, -6.0, 42.0, None),
                margin: 0.25,
            }],
            points: vec![],
        };
        let report = run_bounds_job(&config).unwrap();
        let candidate = &report.candidates[0];
        assert!(candidate.overlap.overlaps());
        assert_eq!(candidate.containment.failing_edges(), Edge::ALL.to_vec());
        assert_eq!(candidate.crs_match, None);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_crs_mismatch_is_a_result() {
        let config = JobConfig {
            reference: bbox(0.0, 0.0, 1.0, 1.0, Some("EPSG:4326")),
            candidates: vec![CandidateConfig {
                name: "laea".to_string(),
                source: bbox(-1.0, -1.0, 2.0, 2.0, Some("EPSG:3035")),
                margin: 0.0,
            }],
            points: vec![],
        };
        let report = run_bounds_job(&config).unwrap();
        assert_eq!(report.candidates[0].crs_match, Some(false));
        assert!(report.candidates[0].containment.contained);
        assert!(!report.candidates[0].passed());
    }

    #[test]
    fn test_literal_candidate_probes_without_grid() {
        let config = JobConfig {
            reference: bbox(0.0, 0.0, 1.0, 1.0, Some("epsg:4326")),
            candidates: vec![CandidateConfig {
                name: "box".to_string(),
                source: bbox(-1.0, -1.0, 2.0, 2.0, Some("EPSG:4326")),
                margin: 0.5,
            }],
            points: vec![
                PointConfig {
                    name: "inside".to_string(),
                    x: 0.5,
                    y: 0.5,
                },
                PointConfig {
                    name: "outside".to_string(),
                    x: 5.0,
                    y: 0.5,
                },
            ],
        };
        let report = run_bounds_job(&config).unwrap();
        let candidate = &report.candidates[0];
        assert_eq!(candidate.crs_match, Some(true));
        assert!(candidate.passed());
        assert!(candidate.points[0].in_domain);
        assert!(candidate.points[0].nearest_cell.is_none());
        assert!(!candidate.points[1].in_domain);
    }

    fn single_candidate(reference: SourceConfig, candidate: SourceConfig) -> JobConfig {
        JobConfig {
            reference,
            candidates: vec![CandidateConfig {
                name: "candidate".to_string(),
                source: candidate,
                margin: 0.0,
            }],
            points: vec![],
        }
    }

    #[test]
    fn test_equivalent_crs_spellings_match() {
        let wkt = concat!(
            r#"GEOGCS["WGS 84",DATUM["WGS_1984",SPHEROID["WGS 84",6378137,298.257223563]],"#,
            r#"PRIMEM["Greenwich",0],UNIT["degree",0.0174532925199433],AUTHORITY["EPSG","4326"]]"#
        );
        for spelling in [wkt, "OGC:CRS84", "+proj=longlat +datum=WGS84 +no_defs"] {
            let config = single_candidate(
                bbox(0.0, 0.0, 1.0, 1.0, Some("EPSG:4326")),
                bbox(-1.0, -1.0, 2.0, 2.0, Some(spelling)),
            );
            let report = run_bounds_job(&config).unwrap();
            assert_eq!(report.candidates[0].crs_match, Some(true), "{}", spelling);
            assert!(report.candidates[0].passed());
        }
    }

    #[test]
    fn test_unrecognised_crs_is_unknown() {
        let config = single_candidate(
            bbox(0.0, 0.0, 1.0, 1.0, Some("EPSG:4326")),
            bbox(-1.0, -1.0, 2.0, 2.0, Some("local grid")),
        );
        let report = run_bounds_job(&config).unwrap();
        assert_eq!(report.candidates[0].crs_match, None);
        assert!(report.candidates[0].passed());
    }

    #[test]
    fn test_disjoint_candidate_reports_axis_overlap() {
        // shares the y range but lies entirely east of the reference
        let config = single_candidate(
            bbox(0.0, 0.0, 1.0, 1.0, None),
            bbox(2.0, 0.0, 3.0, 1.0, None),
        );
        let report = run_bounds_job(&config).unwrap();
        let candidate = &report.candidates[0];
        assert!(!candidate.overlap.x);
        assert!(candidate.overlap.y);
        assert!(!candidate.overlap.overlaps());
        assert!(!candidate.containment.contained);
        assert!(!candidate.passed());
        assert!(!report.all_passed());
    }

    #[test]
    fn test_missing_candidate_file() {
        let config = JobConfig {
            reference: bbox(0.0, 0.0, 1.0, 1.0, None),
            candidates: vec![CandidateConfig {
                name: "weather".to_string(),
                source: SourceConfig::Netcdf {
                    params: NetcdfParams {
                        path: "/nonexistent/portugal-2024.nc".to_string(),
                        x_name: None,
                        y_name: None,
                    },
                },
                margin: 0.0,
            }],
            points: vec![],
        };
        let err = run_bounds_job(&config).unwrap_err();
        assert!(err.is_missing_input());
        assert!(err.to_string().contains("weather"));
    }

    #[test]
    fn test_invalid_config_is_rejected_before_loading() {
        let config = JobConfig {
            reference: bbox(0.0, 0.0, 1.0, 1.0, None),
            candidates: vec![],
            points: vec![],
        };
        let err = run_bounds_job(&config).unwrap_err();
        assert!(matches!(err, JobError::Config(ConfigError::NoCandidates)));
        assert!(!err.is_missing_input());
    }
}
