//! # CLI Module
//!
//! This module provides the command-line interface for extentcheck, including:
//! - Argument parsing with clap
//! - Job assembly from a configuration file (JSON/YAML), flags, or both
//! - Environment variable support with the EXTENTCHECK_ prefix
//! - Subcommands for inspection helpers (NetCDF, GeoJSON, masks, notebooks)
//! - Parsers for the bbox, point and exclude mini-syntaxes

use crate::bounds::{validate_box, BoundingBox, Margin};
use crate::dataset::PropertyFilter;
use crate::input::{
    BboxParams, CandidateConfig, GeoJsonParams, JobConfig, NetcdfParams, PointConfig,
    SourceConfig,
};
use crate::masks::DEFAULT_THRESHOLD;
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Reconcile the spatial extents of geospatial datasets
#[derive(Parser, Debug)]
#[command(name = "extentcheck")]
#[command(about = "Check that datasets cover a region of interest, with a safety margin")]
#[command(version)]
#[command(long_about = "
extentcheck compares the bounding boxes of geospatial datasets: a reference
region (administrative boundaries, a literal box) against one or more
candidates (weather cutouts, model domains). For each candidate it reports
whether the extents overlap, which edges fall short of the reference plus a
margin, and the nearest grid cell of any probe points.

EXAMPLES:
  # Does the ERA5 cutout cover mainland Portugal with a 0.25 degree margin?
  extentcheck check --reference-file gadm41_PRT_1.json \\
    --exclude NAME_1:Azores,Madeira \\
    --candidate-file portugal-2024.nc --margin 0.25

  # Literal boxes
  extentcheck overlap --reference=-9.55,36.96,-6.19,42.15 --candidate=-9.5,37,-6,42

  # Using a job file
  extentcheck check --config job.yaml --output-format json

  # Inspection helpers
  extentcheck info portugal-2024.nc --detailed
  extentcheck regions gadm41_PRT_1.json
  extentcheck masks resources/eligibility
")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet mode - suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for structured data
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub output_format: OutputFormat,

    /// Job configuration file path (JSON or YAML)
    #[arg(short, long, global = true, env = "EXTENTCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check candidate extents against a reference
    #[command(long_about = "
Check one or more candidate extents against a reference extent.

The job is read from --config, assembled from flags, or both: flags add
candidates and points to a configured job, --reference replaces its
reference, and --margin overrides every candidate margin.

Files are recognised by extension: .nc is NetCDF, .geojson/.json is GeoJSON.

EXAMPLES:
  extentcheck check --reference=-9.55,36.96,-6.19,42.15 \\
    --candidate-file portugal-2024.nc --margin 0.25 \\
    --point 'Windfloat:-9.306,41.651'
")]
    Check(CheckArgs),

    /// Check overlap and containment of two literal boxes
    Overlap {
        /// Reference box: min_x,min_y,max_x,max_y
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        reference: BoundingBox,

        /// Candidate box: min_x,min_y,max_x,max_y
        #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
        candidate: BoundingBox,

        /// Margin the candidate must extend beyond the reference
        #[arg(short, long, default_value_t = 0.0)]
        margin: f64,
    },

    /// Show information about a NetCDF file
    #[command(long_about = "
Inspect a NetCDF file: dimensions, variables, attributes and the value
range of every coordinate variable.

EXAMPLES:
  extentcheck info portugal-2024.nc
  extentcheck info portugal-2024.nc --detailed -n wnd100m --format json
")]
    Info {
        /// NetCDF file path
        file: String,

        /// Include global attributes
        #[arg(long)]
        detailed: bool,

        /// Show only specific variable info
        #[arg(short = 'n', long)]
        variable: Option<String>,

        /// Output format for file information
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },

    /// Find the grid cell of a NetCDF file nearest to a point
    Nearest {
        /// NetCDF file path
        file: String,

        /// Point as x,y (give options before it)
        #[arg(value_parser = parse_xy, allow_hyphen_values = true)]
        point: (f64, f64),

        /// Name of the x coordinate variable
        #[arg(long)]
        x_name: Option<String>,

        /// Name of the y coordinate variable
        #[arg(long)]
        y_name: Option<String>,
    },

    /// List per-feature bounds of a GeoJSON file
    Regions {
        /// GeoJSON file path
        file: PathBuf,

        /// Feature property holding the region name
        #[arg(long, default_value = "NAME_1")]
        name_property: String,

        /// Exclude features: property:value1,value2
        #[arg(long, value_parser = parse_exclude)]
        exclude: Option<PropertyFilter>,
    },

    /// Summarise a directory of eligibility masks
    Masks {
        /// Directory containing *.nc mask files
        dir: PathBuf,

        /// Cells strictly above this value are eligible
        #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Disable the progress bar
        #[arg(long)]
        no_progress: bool,
    },

    /// Inspect and patch Jupyter notebooks
    Notebook {
        #[command(subcommand)]
        action: NotebookAction,
    },

    /// Print an example job configuration
    Template {
        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration format
        #[arg(long, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,
    },

    /// Generate shell completions
    #[command(long_about = "
Generate shell completion scripts for bash, zsh, fish and PowerShell.

EXAMPLES:
  extentcheck completions bash > ~/.bash_completion.d/extentcheck
  extentcheck completions zsh -o _extentcheck
")]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct CheckArgs {
    /// Reference box: min_x,min_y,max_x,max_y
    #[arg(
        long,
        value_parser = parse_bbox,
        allow_hyphen_values = true,
        conflicts_with = "reference_file"
    )]
    pub reference: Option<BoundingBox>,

    /// Reference file (.nc or .geojson)
    #[arg(long)]
    pub reference_file: Option<String>,

    /// CRS of a literal --reference box
    #[arg(long)]
    pub reference_crs: Option<String>,

    /// Exclude reference features: property:value1,value2
    #[arg(long, value_parser = parse_exclude)]
    pub exclude: Option<PropertyFilter>,

    /// Candidate file (.nc or .geojson), repeatable
    #[arg(long = "candidate-file")]
    pub candidate_files: Vec<String>,

    /// Candidate box: min_x,min_y,max_x,max_y, repeatable
    #[arg(long = "candidate-bbox", value_parser = parse_bbox, allow_hyphen_values = true)]
    pub candidate_bboxes: Vec<BoundingBox>,

    /// Margin each candidate must extend beyond the reference
    #[arg(short, long, env = "EXTENTCHECK_MARGIN")]
    pub margin: Option<f64>,

    /// Probe point: name:x,y, repeatable
    #[arg(long = "point", value_parser = parse_point, allow_hyphen_values = true)]
    pub points: Vec<PointConfig>,
}

#[derive(Subcommand, Debug)]
pub enum NotebookAction {
    /// List code cells containing every needle
    Find {
        notebook: PathBuf,

        /// Text the cell must contain, repeatable
        #[arg(required = true)]
        needles: Vec<String>,
    },

    /// Show the lines of a cell containing a needle
    Lines {
        notebook: PathBuf,

        /// Cell index
        cell: usize,

        needle: String,
    },

    /// Remove an exact source line from every code cell
    RemoveLine {
        notebook: PathBuf,

        /// Line to remove, without its trailing newline
        line: String,

        /// Write the patched notebook back (default: dry run)
        #[arg(long)]
        write: bool,
    },

    /// Report which items occur in the cell identified by the markers
    Checklist {
        notebook: PathBuf,

        /// Text identifying the section cell, repeatable
        #[arg(long = "marker", required = true)]
        markers: Vec<String>,

        /// Items expected in the section
        #[arg(required = true)]
        items: Vec<String>,
    },
}

#[derive(ValueEnum, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON structured output
    Json,
    /// YAML structured output
    Yaml,
    /// CSV output (where applicable)
    Csv,
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    /// JSON configuration format
    Json,
    /// YAML configuration format
    Yaml,
}

fn parse_floats(s: &str, expected: usize, what: &str) -> Result<Vec<f64>, String> {
    let values: Result<Vec<f64>, _> = s.split(',').map(|v| v.trim().parse::<f64>()).collect();
    let values = values.map_err(|_| format!("Invalid numeric value in {} '{}'", what, s))?;
    if values.len() != expected {
        return Err(format!(
            "{} must have {} comma-separated values, got {}",
            what,
            expected,
            values.len()
        ));
    }
    Ok(values)
}

/// Parse a bounding box from command line argument
/// Format: min_x,min_y,max_x,max_y
pub fn parse_bbox(s: &str) -> Result<BoundingBox, String> {
    let v = parse_floats(s, 4, "Bounding box")?;
    let bbox = BoundingBox::new(v[0], v[1], v[2], v[3]);
    validate_box(&bbox).map_err(|e| e.to_string())?;
    Ok(bbox)
}

/// Parse a coordinate pair
/// Format: x,y
pub fn parse_xy(s: &str) -> Result<(f64, f64), String> {
    let v = parse_floats(s, 2, "Point")?;
    if !v[0].is_finite() || !v[1].is_finite() {
        return Err("Point coordinates must be finite".to_string());
    }
    Ok((v[0], v[1]))
}

/// Parse a named probe point
/// Format: name:x,y
pub fn parse_point(s: &str) -> Result<PointConfig, String> {
    let (name, coords) = s
        .rsplit_once(':')
        .ok_or_else(|| "Point must be in format 'name:x,y'".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("Point name cannot be empty".to_string());
    }
    let (x, y) = parse_xy(coords)?;
    Ok(PointConfig {
        name: name.to_string(),
        x,
        y,
    })
}

/// Parse a feature exclusion
/// Format: property:value1,value2
pub fn parse_exclude(s: &str) -> Result<PropertyFilter, String> {
    let (property, values) = s
        .split_once(':')
        .ok_or_else(|| "Exclude must be in format 'property:value1,value2'".to_string())?;
    let property = property.trim();
    let values: Vec<String> = values
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if property.is_empty() || values.is_empty() {
        return Err("Exclude needs a property and at least one value".to_string());
    }
    Ok(PropertyFilter::new(property, values))
}

/// Picks a file-backed source from the file extension.
pub fn source_for_path(path: &str, exclude: Option<PropertyFilter>) -> Result<SourceConfig> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "nc" | "nc4" | "cdf" => Ok(SourceConfig::Netcdf {
            params: NetcdfParams {
                path: path.to_string(),
                x_name: None,
                y_name: None,
            },
        }),
        "geojson" | "json" => Ok(SourceConfig::GeoJson {
            params: GeoJsonParams {
                path: path.to_string(),
                exclude,
            },
        }),
        _ => bail!(
            "Unsupported file type for '{}' (expected .nc or .geojson)",
            path
        ),
    }
}

fn candidate_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

impl CheckArgs {
    fn reference(&self) -> Result<Option<SourceConfig>> {
        if let Some(bbox) = self.reference {
            let mut params = BboxParams::from(bbox);
            params.crs = self.reference_crs.clone();
            return Ok(Some(SourceConfig::Bbox { params }));
        }
        match &self.reference_file {
            Some(path) => Ok(Some(source_for_path(path, self.exclude.clone())?)),
            None => Ok(None),
        }
    }

    fn candidates(&self, margin: f64) -> Result<Vec<CandidateConfig>> {
        let mut candidates = Vec::new();
        for path in &self.candidate_files {
            candidates.push(CandidateConfig {
                name: candidate_name(path),
                source: source_for_path(path, None)?,
                margin,
            });
        }
        for (i, bbox) in self.candidate_bboxes.iter().enumerate() {
            candidates.push(CandidateConfig {
                name: format!("bbox-{}", i + 1),
                source: SourceConfig::Bbox {
                    params: BboxParams::from(*bbox),
                },
                margin,
            });
        }
        Ok(candidates)
    }

    /// Assembles a job from the flags alone.
    pub fn to_job_config(&self) -> Result<JobConfig> {
        let reference = self
            .reference()?
            .context("A reference is required: use --reference, --reference-file or --config")?;
        let candidates = self.candidates(self.margin.unwrap_or(0.0))?;
        if candidates.is_empty() {
            bail!("At least one candidate is required: use --candidate-file or --candidate-bbox");
        }
        Ok(JobConfig {
            reference,
            candidates,
            points: self.points.clone(),
        })
    }

    /// Layers the flags over a configured job.
    ///
    /// Priority: CLI arguments > environment variables > configuration file.
    pub fn merge_into(&self, mut config: JobConfig) -> Result<JobConfig> {
        if let Some(reference) = self.reference()? {
            config.reference = reference;
        } else if let (Some(exclude), SourceConfig::GeoJson { params }) =
            (&self.exclude, &mut config.reference)
        {
            params.exclude = Some(exclude.clone());
        }
        if let Some(margin) = self.margin {
            for candidate in &mut config.candidates {
                candidate.margin = margin;
            }
        }
        config
            .candidates
            .extend(self.candidates(self.margin.unwrap_or(0.0))?);
        config.points.extend(self.points.iter().cloned());
        Ok(config)
    }

    /// Builds the job to run, from `config_path` when given.
    pub fn build_job(&self, config_path: Option<&Path>) -> Result<JobConfig> {
        if let Some(margin) = self.margin {
            Margin::new(margin).context("Invalid --margin")?;
        }
        match config_path {
            Some(path) => {
                let config = JobConfig::from_file(path)
                    .with_context(|| format!("Failed to load job config: {}", path.display()))?;
                self.merge_into(config)
            }
            None => self.to_job_config(),
        }
    }
}

/// Example job: mainland Portugal against an ERA5 cutout and a model domain.
pub fn template_config() -> JobConfig {
    JobConfig {
        reference: SourceConfig::GeoJson {
            params: GeoJsonParams {
                path: "data/gadm41_PRT_1.json".to_string(),
                exclude: Some(PropertyFilter::new(
                    "NAME_1",
                    vec!["Azores".to_string(), "Madeira".to_string()],
                )),
            },
        },
        candidates: vec![
            CandidateConfig {
                name: "era5".to_string(),
                source: SourceConfig::Netcdf {
                    params: NetcdfParams {
                        path: "cutouts/portugal-2024.nc".to_string(),
                        x_name: None,
                        y_name: None,
                    },
                },
                margin: 0.25,
            },
            CandidateConfig {
                name: "model-domain".to_string(),
                source: SourceConfig::Bbox {
                    params: BboxParams {
                        crs: Some("EPSG:4326".to_string()),
                        ..BboxParams::new(-10.0, 36.5, -5.5, 42.5)
                    },
                },
                margin: 0.25,
            },
        ],
        points: vec![PointConfig {
            name: "Windfloat Atlantic".to_string(),
            x: -9.306,
            y: 41.651,
        }],
    }
}

pub fn render_template(format: &ConfigFormat) -> Result<String> {
    let config = template_config();
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(&config).context("Failed to serialize template to JSON")
        }
        ConfigFormat::Yaml => {
            serde_yaml::to_string(&config).context("Failed to serialize template to YAML")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = parse_bbox("-9.5,37.0,-6.0,42.0").unwrap();
        assert_eq!(bbox, BoundingBox::new(-9.5, 37.0, -6.0, 42.0));

        let spaced = parse_bbox(" -9.5, 37 , -6, 42").unwrap();
        assert_eq!(spaced, bbox);

        // Test invalid formats
        assert!(parse_bbox("-9.5,37.0,-6.0").is_err());
        assert!(parse_bbox("-9.5,37.0,-6.0,42.0,1").is_err());
        assert!(parse_bbox("west,37.0,-6.0,42.0").is_err());
        assert!(parse_bbox("-6.0,37.0,-9.5,42.0").is_err()); // inverted x
        assert!(parse_bbox("-9.5,42.0,-6.0,37.0").is_err()); // inverted y
        assert!(parse_bbox("NaN,37.0,-6.0,42.0").is_err());
    }

    #[test]
    fn test_parse_point() {
        let point = parse_point("Windfloat Atlantic:-9.306,41.651").unwrap();
        assert_eq!(point.name, "Windfloat Atlantic");
        assert_eq!(point.x, -9.306);
        assert_eq!(point.y, 41.651);

        // names may contain colons, the last one separates the coordinates
        let point = parse_point("site:a:1,2").unwrap();
        assert_eq!(point.name, "site:a");

        assert!(parse_point("-9.306,41.651").is_err());
        assert!(parse_point(":1,2").is_err());
        assert!(parse_point("p:1").is_err());
        assert!(parse_point("p:inf,2").is_err());
    }

    #[test]
    fn test_parse_exclude() {
        let filter = parse_exclude("NAME_1:Azores, Madeira").unwrap();
        assert_eq!(filter.property, "NAME_1");
        assert_eq!(filter.values, vec!["Azores", "Madeira"]);

        assert!(parse_exclude("NAME_1").is_err());
        assert!(parse_exclude("NAME_1:").is_err());
        assert!(parse_exclude(":Azores").is_err());
    }

    #[test]
    fn test_source_for_path() {
        assert_eq!(source_for_path("cutouts/pt.nc", None).unwrap().kind(), "netcdf");
        assert_eq!(source_for_path("PRT.GeoJSON", None).unwrap().kind(), "geojson");
        assert_eq!(source_for_path("gadm41_PRT_1.json", None).unwrap().kind(), "geojson");
        assert!(source_for_path("portugal.tif", None).is_err());
        assert!(source_for_path("no_extension", None).is_err());
    }

    #[test]
    fn test_check_args_to_job_config() {
        let args = CheckArgs {
            reference: Some(BoundingBox::new(-9.55, 36.96, -6.19, 42.15)),
            candidate_files: vec!["cutouts/portugal-2024.nc".to_string()],
            candidate_bboxes: vec![BoundingBox::new(-10.0, 36.5, -5.5, 42.5)],
            margin: Some(0.25),
            ..Default::default()
        };
        let config = args.to_job_config().unwrap();
        assert_eq!(config.reference.kind(), "bbox");
        assert_eq!(config.candidates.len(), 2);
        assert_eq!(config.candidates[0].name, "portugal-2024");
        assert_eq!(config.candidates[1].name, "bbox-1");
        assert!(config.candidates.iter().all(|c| c.margin == 0.25));
        config.validate().unwrap();
    }

    #[test]
    fn test_check_args_require_reference_and_candidate() {
        let no_reference = CheckArgs {
            candidate_bboxes: vec![BoundingBox::new(0.0, 0.0, 1.0, 1.0)],
            ..Default::default()
        };
        assert!(no_reference.to_job_config().is_err());

        let no_candidate = CheckArgs {
            reference: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            ..Default::default()
        };
        assert!(no_candidate.to_job_config().is_err());
    }

    #[test]
    fn test_merge_into_config() {
        let args = CheckArgs {
            exclude: parse_exclude("NAME_1:Azores").ok(),
            candidate_bboxes: vec![BoundingBox::new(-10.0, 36.0, -5.0, 43.0)],
            margin: Some(0.5),
            points: vec![parse_point("Lisboa:-9.14,38.72").unwrap()],
            ..Default::default()
        };
        let merged = args.merge_into(template_config()).unwrap();

        assert_eq!(merged.candidates.len(), 3);
        assert!(merged.candidates.iter().all(|c| c.margin == 0.5));
        assert_eq!(merged.points.len(), 2);
        match &merged.reference {
            SourceConfig::GeoJson { params } => {
                assert_eq!(params.exclude.as_ref().unwrap().values, vec!["Azores"]);
            }
            other => panic!("Expected GeoJSON reference, got {}", other.kind()),
        }
    }

    #[test]
    fn test_build_job_rejects_negative_margin() {
        let args = CheckArgs {
            reference: Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)),
            candidate_bboxes: vec![BoundingBox::new(0.0, 0.0, 1.0, 1.0)],
            margin: Some(-0.1),
            ..Default::default()
        };
        assert!(args.build_job(None).is_err());
    }

    #[test]
    fn test_template_round_trips() {
        let yaml = render_template(&ConfigFormat::Yaml).unwrap();
        let config = JobConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config.candidates.len(), 2);
        config.validate().unwrap();

        let json = render_template(&ConfigFormat::Json).unwrap();
        assert!(json.contains("\"kind\": \"netcdf\""));
        assert_eq!(JobConfig::from_json(&json).unwrap().points.len(), 1);
    }
}
