//! # Report Presentation
//!
//! Formats a [`JobReport`] for the console. The human layout mirrors the
//! diagnostic scripts this tool replaces: one `[OK]` / `[ISSUE]` line per
//! edge, the overlap verdict, and a closing `RESULT:` line.
//!
//! [`OverlapReport`] is the same check for two literal boxes, without any
//! dataset loading.

use crate::bounds::{
    contains_with_margin, overlap_axes, AxisOverlap, BoundingBox, ContainmentResult, Margin,
};
use crate::dataset::DatasetExtent;
use crate::job::{CandidateReport, JobReport};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write;

const RULE_WIDTH: usize = 70;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

fn write_extent(out: &mut String, indent: &str, extent: &DatasetExtent) {
    let _ = writeln!(out, "{}Source: {} ({})", indent, extent.label, extent.kind);
    let _ = writeln!(out, "{}CRS: {}", indent, extent.crs.as_deref().unwrap_or("unknown"));
    let _ = writeln!(out, "{}Bounds: {}", indent, extent.bounds);
    if let Some([rows, cols]) = extent.shape {
        let cells = rows * cols;
        let _ = writeln!(out, "{}Grid: {} rows x {} cols = {} cells", indent, rows, cols, cells);
    }
    if let Some([dx, dy]) = extent.resolution {
        let _ = writeln!(out, "{}Resolution: {:.4} x {:.4}", indent, dx, dy);
    }
    if let Some(count) = extent.feature_count {
        let _ = writeln!(out, "{}Features: {}", indent, count);
    }
}

fn write_overlap(out: &mut String, overlap: &AxisOverlap) {
    if overlap.overlaps() {
        let _ = writeln!(out, "  [OK] Spatial overlap confirmed");
    } else {
        let _ = writeln!(
            out,
            "  [ISSUE] No spatial overlap (X overlap: {}, Y overlap: {})",
            overlap.x, overlap.y
        );
    }
}

fn write_containment(out: &mut String, containment: &ContainmentResult) {
    let _ = writeln!(
        out,
        "  Required with {} margin: {}",
        containment.margin.value(),
        containment.required
    );
    for check in containment.edge_checks() {
        let mut edge = check.edge.to_string();
        if let Some(first) = edge.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        if check.ok {
            let _ = writeln!(out, "  [OK] {} boundary ok", edge);
        } else {
            let _ = writeln!(
                out,
                "  [ISSUE] {}: need {:.2}, have {}",
                edge, check.required, check.actual
            );
        }
    }
}

fn write_candidate(out: &mut String, candidate: &CandidateReport) {
    let _ = writeln!(out, "\nCandidate: {}", candidate.name);
    write_extent(out, "  ", &candidate.extent);
    match candidate.crs_match {
        Some(true) => {
            let _ = writeln!(out, "  [OK] CRS match");
        }
        Some(false) => {
            let _ = writeln!(out, "  [ISSUE] CRS mismatch: comparison uses raw coordinates");
        }
        None => {}
    }
    write_overlap(out, &candidate.overlap);
    write_containment(out, &candidate.containment);

    for probe in &candidate.points {
        let _ = write!(
            out,
            "  Point '{}' ({}, {}): {}",
            probe.name,
            probe.x,
            probe.y,
            if probe.in_domain { "in domain" } else { "outside domain" }
        );
        match &probe.nearest_cell {
            Some(cell) => {
                let _ = writeln!(
                    out,
                    ", nearest cell [{}, {}] at ({}, {})",
                    cell.row, cell.col, cell.x, cell.y
                );
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }

    write_result(out, &candidate.overlap, &candidate.containment);
}

fn write_result(out: &mut String, overlap: &AxisOverlap, containment: &ContainmentResult) {
    let failing = containment.failing_edges();
    if !overlap.overlaps() {
        let _ = writeln!(out, "  RESULT: No overlap with reference");
    } else if failing.is_empty() {
        let _ = writeln!(out, "  RESULT: All bounds are sufficient");
    } else {
        let names: Vec<&str> = failing.iter().map(|e| e.as_str()).collect();
        let _ = writeln!(
            out,
            "  RESULT: Bounds need adjustment ({} boundary/ies)",
            names.join(", ")
        );
    }
}

/// Renders a report in the human-readable layout.
pub fn render_report_human(report: &JobReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "GEOGRAPHIC BOUNDS VERIFICATION");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(out, "\nReference:");
    write_extent(&mut out, "  ", &report.reference);
    for candidate in &report.candidates {
        write_candidate(&mut out, candidate);
    }
    let _ = writeln!(out, "\n{}", rule());
    let passed = report.candidates.iter().filter(|c| c.passed()).count();
    let _ = writeln!(
        out,
        "SUMMARY: {}/{} candidates passed",
        passed,
        report.candidates.len()
    );
    let _ = writeln!(out, "{}", rule());
    out
}

pub fn print_report_human(report: &JobReport) {
    print!("{}", render_report_human(report));
}

pub fn print_report_json(report: &JobReport) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;
    println!("{}", json);
    Ok(())
}

pub fn print_report_yaml(report: &JobReport) -> Result<()> {
    let yaml = serde_yaml::to_string(report).context("Failed to serialize report to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Overlap and margin containment of two literal boxes.
#[derive(Debug, Clone, Serialize)]
pub struct OverlapReport {
    pub reference: BoundingBox,
    pub candidate: BoundingBox,
    pub overlap: AxisOverlap,
    pub containment: ContainmentResult,
}

impl OverlapReport {
    pub fn new(reference: BoundingBox, candidate: BoundingBox, margin: Margin) -> Self {
        OverlapReport {
            reference,
            candidate,
            overlap: overlap_axes(&reference, &candidate),
            containment: contains_with_margin(&reference, &candidate, margin),
        }
    }

    pub fn passed(&self) -> bool {
        self.overlap.overlaps() && self.containment.contained
    }
}

pub fn render_overlap_human(report: &OverlapReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Reference: {}", report.reference);
    let _ = writeln!(out, "Candidate: {}", report.candidate);
    write_overlap(&mut out, &report.overlap);
    write_containment(&mut out, &report.containment);
    write_result(&mut out, &report.overlap, &report.containment);
    out
}

pub fn print_overlap_human(report: &OverlapReport) {
    print!("{}", render_overlap_human(report));
}

pub fn print_overlap_json(report: &OverlapReport) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize overlap to JSON")?;
    println!("{}", json);
    Ok(())
}

pub fn print_overlap_yaml(report: &OverlapReport) -> Result<()> {
    let yaml = serde_yaml::to_string(report).context("Failed to serialize overlap to YAML")?;
    println!("{}", yaml);
    Ok(())
}
