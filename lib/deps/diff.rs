//! Runtime file comparison and the dependency approval gate.
//!
//! Two manifests are compared as sets of runtime files keyed by file name
//! plus version information. How much of the version takes part in the key
//! depends on [`DiffMode`]:
//!
//! - [`DiffMode::Exact`] keys on the file name and both version fields, so
//!   any drift against a committed baseline shows up.
//! - [`DiffMode::Major`] keys on the file name and the major component of
//!   the assembly version, tolerating minor and patch bumps. Entries whose
//!   assembly version does not parse fall back to the exact key: identical
//!   text still matches, anything else never does.
//!
//! Files present on both sides under the same name but with different keys
//! are reported as changed rather than as a removal plus an addition.

use super::reader::sort_by_file_name;
use super::types::RuntimeFile;
use crate::error::{BuildError, BuildResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Write as _};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Equality policy for runtime files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffMode {
    /// File name, assembly version and file version must all match.
    #[default]
    Exact,
    /// File name and assembly major version must match.
    Major,
}

/// Options for a manifest comparison.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Equality policy.
    pub mode: DiffMode,

    /// File names that may appear or disappear when they carry no assembly version.
    pub unversioned_shims: Vec<String>,
}

/// A file whose version moved between the two manifests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// Entry in the old manifest.
    pub before: RuntimeFile,
    /// Entry in the new manifest.
    pub after: RuntimeFile,
}

/// Classified differences between two runtime file lists.
#[derive(Debug, Clone, Default)]
pub struct ManifestDiff {
    /// Equality policy used.
    pub mode: DiffMode,
    /// Files only in the old manifest.
    pub removed: Vec<RuntimeFile>,
    /// Files only in the new manifest.
    pub added: Vec<RuntimeFile>,
    /// Same-named files whose versions differ under the active policy.
    pub changed: Vec<ChangedFile>,
}

/// Comparison key. Hashing and equality both go through this, so the
/// "unparseable version" case never degenerates into a shared bucket.
#[derive(Debug, PartialEq, Eq, Hash)]
enum DiffKey<'a> {
    Exact {
        name: &'a str,
        assembly: Option<&'a str>,
        file: Option<&'a str>,
    },
    Major {
        name: &'a str,
        major: u64,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl DiffOptions {
    /// Options for `mode` with the default shim exclusions.
    pub fn new(mode: DiffMode) -> Self {
        Self {
            mode,
            unversioned_shims: crate::constants::UNVERSIONED_SHIMS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    fn is_ignored(&self, file: &RuntimeFile) -> bool {
        file.assembly_version.is_none()
            && self
                .unversioned_shims
                .iter()
                .any(|name| name.eq_ignore_ascii_case(file.file_name()))
    }
}

impl ManifestDiff {
    /// True when nothing was removed, added or changed.
    pub fn is_acceptable(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty() && self.changed.is_empty()
    }

    /// Render the human-readable change report.
    pub fn render_report(&self, label: &str, reviewers: &[String]) -> String {
        let mut out = String::new();
        let reviewers = reviewer_list(reviewers);

        let _ = writeln!(
            out,
            "Dependency changes detected in {} ({} comparison).",
            label, self.mode
        );
        let _ = writeln!(
            out,
            "APPROVAL REQUIRED: these changes must be reviewed by {} before the baseline is updated.",
            reviewers
        );

        if !self.changed.is_empty() {
            let mut changed: Vec<&ChangedFile> = self.changed.iter().collect();
            changed.sort_by(|a, b| a.before.file_name().cmp(b.before.file_name()));
            let _ = writeln!(out, "\nChanged:");
            for c in changed {
                let _ = writeln!(
                    out,
                    "  {}: {} (file {}) -> {} (file {})",
                    c.before.file_name(),
                    c.before.assembly_version_display(),
                    c.before.file_version_display(),
                    c.after.assembly_version_display(),
                    c.after.file_version_display(),
                );
            }
        }

        for (title, files) in [("Removed", &self.removed), ("Added", &self.added)] {
            if files.is_empty() {
                continue;
            }
            let mut files = files.clone();
            sort_by_file_name(&mut files);
            let _ = writeln!(out, "\n{}:", title);
            for f in &files {
                let _ = writeln!(out, "  {}", f);
            }
        }

        out
    }

    /// Turn an unacceptable diff into [`BuildError::DriftDetected`].
    pub fn into_gate(self, label: &str, reviewers: &[String]) -> BuildResult<()> {
        if self.is_acceptable() {
            return Ok(());
        }
        Err(BuildError::DriftDetected {
            label: label.to_string(),
            report: self.render_report(label, reviewers),
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for DiffMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffMode::Exact => write!(f, "exact"),
            DiffMode::Major => write!(f, "major-version"),
        }
    }
}

impl std::str::FromStr for DiffMode {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(DiffMode::Exact),
            "major" => Ok(DiffMode::Major),
            other => Err(BuildError::ConfigParseError(format!(
                "unknown dependency policy '{}', expected 'exact' or 'major'",
                other
            ))),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Compare two runtime file lists.
pub fn diff_runtime_files(
    before: &[RuntimeFile],
    after: &[RuntimeFile],
    options: &DiffOptions,
) -> ManifestDiff {
    let mode = options.mode;

    let mut removed = difference(before, after, mode);
    let mut added = difference(after, before, mode);
    removed.retain(|f| !options.is_ignored(f));
    added.retain(|f| !options.is_ignored(f));

    // Pair same-named entries across the two sides. Each added entry pairs at most once.
    let mut changed = Vec::new();
    let mut paired_added = vec![false; added.len()];
    let mut paired_removed = vec![false; removed.len()];
    for (ri, old) in removed.iter().enumerate() {
        let hit = (0..added.len()).find(|&ai| {
            let new = &added[ai];
            !paired_added[ai] && old.file_name() == new.file_name() && version_changed(old, new, mode)
        });
        if let Some(ai) = hit {
            paired_added[ai] = true;
            paired_removed[ri] = true;
            changed.push(ChangedFile {
                before: old.clone(),
                after: added[ai].clone(),
            });
        }
    }

    let removed = keep_unpaired(removed, &paired_removed);
    let added = keep_unpaired(added, &paired_added);

    ManifestDiff {
        mode,
        removed,
        added,
        changed,
    }
}

/// Entries of `left` whose key is absent from `right`, first occurrence per key.
fn difference(left: &[RuntimeFile], right: &[RuntimeFile], mode: DiffMode) -> Vec<RuntimeFile> {
    let right_keys: HashSet<DiffKey<'_>> = right.iter().map(|f| diff_key(f, mode)).collect();
    let mut seen = HashSet::new();
    left.iter()
        .filter(|f| {
            let key = diff_key(*f, mode);
            !right_keys.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

fn diff_key(file: &RuntimeFile, mode: DiffMode) -> DiffKey<'_> {
    let exact = DiffKey::Exact {
        name: file.file_name(),
        assembly: file.assembly_version.as_deref(),
        file: file.file_version.as_deref(),
    };
    match mode {
        DiffMode::Exact => exact,
        DiffMode::Major => match file.assembly_major() {
            Some(major) => DiffKey::Major {
                name: file.file_name(),
                major,
            },
            None => exact,
        },
    }
}

/// Version-change predicate for two same-named files.
fn version_changed(old: &RuntimeFile, new: &RuntimeFile, mode: DiffMode) -> bool {
    match mode {
        DiffMode::Exact => {
            old.assembly_version != new.assembly_version || old.file_version != new.file_version
        }
        DiffMode::Major => match (old.assembly_major(), new.assembly_major()) {
            (Some(a), Some(b)) => a != b,
            _ => diff_key(old, mode) != diff_key(new, mode),
        },
    }
}

fn keep_unpaired(files: Vec<RuntimeFile>, paired: &[bool]) -> Vec<RuntimeFile> {
    files
        .into_iter()
        .zip(paired.iter())
        .filter(|(_, p)| !**p)
        .map(|(f, _)| f)
        .collect()
}

/// Reviewer mentions for a report header.
pub(super) fn reviewer_list(reviewers: &[String]) -> String {
    if reviewers.is_empty() {
        "a repository owner".to_string()
    } else {
        reviewers.join(", ")
    }
}

