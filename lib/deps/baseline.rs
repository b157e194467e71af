//! Extension list check against the committed baseline.

use super::diff::reviewer_list;
use crate::config::Extension;
use crate::error::{BuildError, BuildResult};
use std::fmt::Write as _;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A major version bump of an already-shipped extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MajorVersionChange {
    /// Extension package id.
    pub id: String,
    /// Major version in the baseline.
    pub baseline: u64,
    /// Major version in the current list.
    pub current: u64,
}

/// Outcome of comparing `extensions.json` with the baseline list.
#[derive(Debug, Clone, Default)]
pub struct ExtensionBaselineReport {
    /// Extensions whose major version differs from the baseline.
    pub major_changes: Vec<MajorVersionChange>,
    /// Extensions the baseline does not know about.
    pub unlisted: Vec<String>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ExtensionBaselineReport {
    /// True when the current list matches the baseline.
    pub fn is_acceptable(&self) -> bool {
        self.major_changes.is_empty() && self.unlisted.is_empty()
    }

    /// Render a report for reviewers.
    pub fn render_report(&self, reviewers: &[String]) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Extension list differs from the baseline. APPROVAL REQUIRED from {}.",
            reviewer_list(reviewers)
        );

        if !self.major_changes.is_empty() {
            let _ = writeln!(
                out,
                "\nMajor version changes (breaking for existing apps):"
            );
            for c in &self.major_changes {
                let _ = writeln!(out, "  {}: {} -> {}", c.id, c.baseline, c.current);
            }
        }

        if !self.unlisted.is_empty() {
            let _ = writeln!(out, "\nNew extensions (add them to the baseline list):");
            for id in &self.unlisted {
                let _ = writeln!(out, "  {}", id);
            }
        }

        out
    }

    /// Fail with [`BuildError::DriftDetected`] when not acceptable.
    pub fn into_gate(self, label: &str, reviewers: &[String]) -> BuildResult<()> {
        if self.is_acceptable() {
            return Ok(());
        }
        Err(BuildError::DriftDetected {
            label: label.to_string(),
            report: self.render_report(reviewers),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Compare extension lists by package id (case-insensitive).
pub fn compare_extension_baseline(
    current: &[Extension],
    baseline: &[Extension],
) -> ExtensionBaselineReport {
    let mut report = ExtensionBaselineReport::default();

    for ext in current {
        match baseline.iter().find(|b| b.id.eq_ignore_ascii_case(&ext.id)) {
            Some(known) if known.major_version != ext.major_version => {
                report.major_changes.push(MajorVersionChange {
                    id: ext.id.clone(),
                    baseline: known.major_version,
                    current: ext.major_version,
                });
            }
            Some(_) => {}
            None => report.unlisted.push(ext.id.clone()),
        }
    }

    report.major_changes.sort_by(|a, b| a.id.cmp(&b.id));
    report.unlisted.sort();
    report
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
