//! # Notebook Inspection
//!
//! Reads a Jupyter notebook (`.ipynb`) as JSON, searches code cells for
//! text, and applies line-level patches. Fields this module does not model
//! are carried through unchanged, in their original order, when the
//! notebook is written back.
//!
//! ## Example
//!
//! ```rust
//! use extentcheck::notebook::Notebook;
//!
//! let nb = Notebook::from_json(r##"{
//!   "cells": [
//!     {"cell_type": "markdown", "metadata": {}, "source": ["# Section 3.2"]},
//!     {"cell_type": "code", "metadata": {}, "outputs": [], "execution_count": null,
//!      "source": ["# Section 3.2\n", "cf = cutout.wind(turbine=t)\n"]}
//!   ],
//!   "metadata": {}, "nbformat": 4, "nbformat_minor": 5
//! }"##)?;
//! assert_eq!(nb.find_code_cells(&["Section 3.2", "cutout.wind"]), vec![1]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotebookError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid notebook JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cell {index} out of range (notebook has {len} cells)")]
    CellOutOfRange { index: usize, len: usize },
}

pub type NotebookResult<T> = Result<T, NotebookError>;

/// Cell source, stored either as a list of lines or a single string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellSource {
    Lines(Vec<String>),
    Text(String),
}

impl CellSource {
    pub fn text(&self) -> String {
        match self {
            CellSource::Lines(lines) => lines.concat(),
            CellSource::Text(text) => text.clone(),
        }
    }

    /// Source lines, each keeping its trailing newline.
    pub fn lines(&self) -> Vec<String> {
        match self {
            CellSource::Lines(lines) => lines.clone(),
            CellSource::Text(text) => split_keep_newlines(text),
        }
    }
}

fn split_keep_newlines(text: &str) -> Vec<String> {
    text.split_inclusive('\n').map(str::to_string).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub source: CellSource,
}

impl Cell {
    pub fn is_code(&self) -> bool {
        self.cell_type == "code"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which expected items occur in a located section cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionChecklist {
    pub cell: usize,
    pub items: Vec<(String, bool)>,
}

impl SectionChecklist {
    pub fn missing(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|(_, present)| !present)
            .map(|(item, _)| item.as_str())
            .collect()
    }
}

impl Notebook {
    pub fn from_file<P: AsRef<Path>>(path: P) -> NotebookResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json_str: &str) -> NotebookResult<Self> {
        Ok(serde_json::from_str(json_str)?)
    }

    fn cell(&self, index: usize) -> NotebookResult<&Cell> {
        self.cells.get(index).ok_or(NotebookError::CellOutOfRange {
            index,
            len: self.cells.len(),
        })
    }

    /// Indices of code cells whose source contains every needle.
    pub fn find_code_cells(&self, needles: &[&str]) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_code())
            .filter(|(_, cell)| {
                let text = cell.source.text();
                needles.iter().all(|n| text.contains(n))
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    /// `(line_index, trimmed_line)` for each line of a cell containing `needle`.
    pub fn find_lines(&self, cell: usize, needle: &str) -> NotebookResult<Vec<(usize, String)>> {
        Ok(self
            .cell(cell)?
            .source
            .lines()
            .iter()
            .enumerate()
            .filter(|(_, line)| line.contains(needle))
            .map(|(idx, line)| (idx, line.trim().to_string()))
            .collect())
    }

    /// Removes every code-cell source line equal to `line` (ignoring its
    /// trailing newline). Returns the indices of modified cells; cells
    /// without a match are left byte-for-byte untouched.
    pub fn remove_line(&mut self, line: &str) -> Vec<usize> {
        let target = line.trim_end_matches(['\n', '\r']);
        let mut modified = Vec::new();
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            if !cell.is_code() {
                continue;
            }
            let lines = cell.source.lines();
            let kept: Vec<String> = lines
                .iter()
                .filter(|l| l.trim_end_matches(['\n', '\r']) != target)
                .cloned()
                .collect();
            if kept.len() != lines.len() {
                cell.source = CellSource::Lines(kept);
                modified.push(idx);
            }
        }
        modified
    }

    /// Finds the first code cell containing every marker and reports which
    /// of `items` occur in it.
    pub fn section_checklist(&self, markers: &[&str], items: &[&str]) -> Option<SectionChecklist> {
        let cell = *self.find_code_cells(markers).first()?;
        let text = self.cells[cell].source.text();
        Some(SectionChecklist {
            cell,
            items: items
                .iter()
                .map(|item| (item.to_string(), text.contains(item)))
                .collect(),
        })
    }

    /// Serialises with one-space indentation and non-ASCII characters kept
    /// verbatim.
    pub fn to_json_string(&self) -> NotebookResult<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b" ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> NotebookResult<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const NOTEBOOK: &str = r###"{
 "cells": [
  {
   "cell_type": "markdown",
   "metadata": {},
   "source": ["## COMPARISON 1: Baseline vs Zero Emissions\n"]
  },
  {
   "cell_type": "code",
   "execution_count": 3,
   "id": "a1",
   "metadata": {"tags": []},
   "outputs": [],
   "source": [
    "# COMPARISON 1: Baseline vs Zero Emissions\n",
    "for r in results:\n",
    "    if r['status'] == 'ok':\n",
    "        print('Zona: ação')\n"
   ]
  },
  {
   "cell_type": "code",
   "execution_count": null,
   "metadata": {},
   "outputs": [],
   "source": "scenario_results[name] = {\n    'network': n_scenario,\n    'cost': cost,\n}\n"
  }
 ],
 "metadata": {"kernelspec": {"name": "python3"}},
 "nbformat": 4,
 "nbformat_minor": 5
}"###;

    #[test]
    fn test_find_code_cells_skips_markdown() {
        let nb = Notebook::from_json(NOTEBOOK).unwrap();
        assert_eq!(nb.find_code_cells(&["COMPARISON 1: Baseline vs Zero Emissions"]), vec![1]);
        assert_eq!(nb.find_code_cells(&["if r", "status"]), vec![1]);
        assert!(nb.find_code_cells(&["wind_offshore"]).is_empty());
    }

    #[test]
    fn test_find_lines() {
        let nb = Notebook::from_json(NOTEBOOK).unwrap();
        let lines = nb.find_lines(1, "if r['status']").unwrap();
        assert_eq!(lines, vec![(2, "if r['status'] == 'ok':".to_string())]);

        let text_cell = nb.find_lines(2, "'network'").unwrap();
        assert_eq!(text_cell[0].0, 1);

        assert!(matches!(
            nb.find_lines(9, "x"),
            Err(NotebookError::CellOutOfRange { index: 9, len: 3 })
        ));
    }

    #[test]
    fn test_remove_line_only_touches_matching_cells() {
        let mut nb = Notebook::from_json(NOTEBOOK).unwrap();
        let before = nb.cells[1].source.clone();

        let modified = nb.remove_line("    'network': n_scenario,");
        assert_eq!(modified, vec![2]);
        assert_eq!(nb.cells[1].source, before);
        assert_eq!(
            nb.cells[2].source.text(),
            "scenario_results[name] = {\n    'cost': cost,\n}\n"
        );

        // second pass is a no-op
        assert!(nb.remove_line("    'network': n_scenario,").is_empty());
    }

    #[test]
    fn test_section_checklist() {
        let json = r##"{"cells": [{"cell_type": "code", "metadata": {}, "source": [
            "# Section 3.2\n", "techs = ['wind_onshore', 'solar_pv']\n"
        ]}], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"##;
        let nb = Notebook::from_json(json).unwrap();
        let checklist = nb
            .section_checklist(
                &["wind_onshore", "Section 3.2"],
                &["wind_onshore", "wind_offshore", "solar_pv", "solar_csp"],
            )
            .unwrap();
        assert_eq!(checklist.cell, 0);
        assert_eq!(checklist.missing(), vec!["wind_offshore", "solar_csp"]);
        assert!(nb.section_checklist(&["Section 9"], &["x"]).is_none());
    }

    #[test]
    fn test_patched_notebook_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("assignment.ipynb");

        let mut nb = Notebook::from_json(NOTEBOOK).unwrap();
        nb.remove_line("    'network': n_scenario,");
        nb.write_to(&path).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("ação"));
        assert!(written.starts_with("{\n \"cells\": [\n  {\n   \"cell_type\""));

        let reloaded = Notebook::from_file(&path).unwrap();
        assert_eq!(reloaded.cells.len(), 3);
        assert_eq!(reloaded.cells[1].extra["id"], "a1");
        assert_eq!(reloaded.extra["nbformat"], 4);
        assert!(!reloaded.cells[2].source.text().contains("'network'"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Notebook::from_json("{"), Err(NotebookError::Json(_))));
        assert!(matches!(Notebook::from_json("{\"metadata\": {}}"), Err(NotebookError::Json(_))));
    }
}
