#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Roster loading and reconciliation of roster identities with submission
//! directory names.
//!
//! Directory names are matched against identities by substring, longest
//! identity first, so `ann` never claims `hw1-joanna` while `joanna` is on
//! the roster.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::{
    constants::{MIN_PATTERN_LEN, UNSAFE_DIR_CHARS},
    error::{GradeError, GradeResult},
};

/// Column holding the identity in a classroom roster export.
const IDENTITY_COLUMN: &str = "github_username";

/// Column holding the display name in a classroom roster export.
const NAME_COLUMN: &str = "identifier";

/// One row of a roster CSV.
#[derive(Deserialize, Debug)]
struct RosterRow {
    /// Display name.
    #[serde(rename = "identifier", default)]
    name:     String,
    /// Login.
    #[serde(rename = "github_username", default)]
    identity: String,
}

/// Instructor-supplied identity to display name table. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Roster {
    /// Identity to display name.
    entries: BTreeMap<String, String>,
}

/// How identities are consumed while labeling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchMode {
    /// Each identity labels at most one directory, the first in sorted
    /// order. Used when renaming.
    Consume,
    /// Identities may label several directories; the identity maps to the
    /// last one.
    Lookup,
}

/// Result of matching a roster against directory names.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Labeling {
    /// Identity to display name, for every roster entry.
    pub names:        BTreeMap<String, String>,
    /// Directory name to the identity found in it.
    pub dir_identity: BTreeMap<String, String>,
    /// Identity to the directory it labeled.
    pub identity_dir: BTreeMap<String, String>,
    /// Identities no directory contained, in roster order.
    pub unmatched:    Vec<String>,
}

impl Labeling {
    /// Display name for a directory, if it was labeled.
    pub fn display_name(&self, dir_name: &str) -> Option<&str> {
        self.dir_identity
            .get(dir_name)
            .and_then(|identity| self.names.get(identity))
            .map(String::as_str)
    }
}

impl Roster {
    /// Builds a roster from `(identity, display name)` pairs. Empty
    /// identities and identities shorter than the minimum length are dropped.
    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut roster = Roster::default();
        for (identity, name) in entries {
            let identity = identity.into().trim().to_string();
            let name = name.into();
            if identity.is_empty() {
                continue;
            }
            if identity.chars().count() < MIN_PATTERN_LEN {
                tracing::info!("Skipping roster entry {identity} -> {name}: identity too short");
                continue;
            }
            roster.entries.insert(identity, name);
        }
        roster
    }

    /// Reads a classroom roster export with `identifier` and
    /// `github_username` columns. Rows without a username are skipped.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Could not open roster {}", path.display()))?;

        let headers = reader
            .headers()
            .with_context(|| format!("Could not read the header of {}", path.display()))?;
        for column in [IDENTITY_COLUMN, NAME_COLUMN] {
            if !headers.iter().any(|h| h.trim() == column) {
                bail!("{} has no `{column}` column", path.display());
            }
        }

        let mut entries = Vec::new();
        for row in reader.deserialize::<RosterRow>() {
            let row = row.with_context(|| format!("Malformed row in {}", path.display()))?;
            entries.push((row.identity, row.name));
        }
        let roster = Roster::from_entries(entries);
        tracing::debug!("Loaded {} roster entries from {}", roster.len(), path.display());
        Ok(roster)
    }

    /// Number of identities.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the roster has no identities.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display name for `identity`.
    pub fn name(&self, identity: &str) -> Option<&str> {
        self.entries.get(identity).map(String::as_str)
    }

    /// Identities, longest first, ties in lexicographic order.
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        patterns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        patterns
    }

    /// Matches identities against `dir_names`, visited in sorted order. The
    /// first (longest) identity contained in a name labels it.
    pub fn label_dirs<S: AsRef<str>>(
        &self,
        dir_names: &[S],
        mode: MatchMode,
        ignore_case: bool,
    ) -> Labeling {
        let mut sorted: Vec<&str> = dir_names.iter().map(AsRef::as_ref).collect();
        sorted.sort_unstable();

        let patterns = self.patterns();
        let mut labeling = Labeling {
            names: self.entries.clone(),
            ..Labeling::default()
        };

        for dir_name in sorted {
            let found = patterns.iter().find(|pattern| {
                let consumed = mode == MatchMode::Consume
                    && labeling.identity_dir.contains_key(**pattern);
                !consumed && find_identity(dir_name, pattern, ignore_case).is_some()
            });
            if let Some(identity) = found {
                tracing::debug!("{dir_name} belongs to {identity}");
                labeling
                    .dir_identity
                    .insert(dir_name.to_string(), identity.to_string());
                labeling
                    .identity_dir
                    .insert(identity.to_string(), dir_name.to_string());
            }
        }

        labeling.unmatched = self
            .entries
            .keys()
            .filter(|identity| !labeling.identity_dir.contains_key(*identity))
            .cloned()
            .collect();
        labeling
    }
}

/// Byte offset of `identity` inside `dir_name`. Case folding is ASCII only,
/// so offsets stay valid in the original name.
fn find_identity(dir_name: &str, identity: &str, ignore_case: bool) -> Option<usize> {
    if ignore_case {
        dir_name
            .to_ascii_lowercase()
            .find(&identity.to_ascii_lowercase())
    } else {
        dir_name.find(identity)
    }
}

/// Immediate subdirectory names of `root`, sorted.
pub fn subdir_names(root: &Path) -> GradeResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| GradeError::io(root, e))? {
        let entry = entry.map_err(|e| GradeError::io(root, e))?;
        if entry.path().is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// A display name made safe for a directory: unsafe characters and
/// whitespace runs become `_`, and `__` collapses to `_`.
pub fn safe_name(name: &str) -> String {
    let mut safe = UNSAFE_DIR_CHARS.replace_all(name.trim(), "_").into_owned();
    while safe.contains("__") {
        safe = safe.replace("__", "_");
    }
    safe
}

/// Longest prefix shared by every name, cut back to its last `-`.
fn common_dash_prefix<S: AsRef<str>>(names: &[S]) -> Option<String> {
    let first = names.first()?.as_ref();
    let mut len = first.len();
    for name in &names[1..] {
        len = first
            .bytes()
            .zip(name.as_ref().bytes())
            .take(len)
            .take_while(|(a, b)| a == b)
            .count();
    }
    let shared = first.get(..len)?;
    shared.rfind('-').map(|dash| shared[..=dash].to_string())
}

/// One planned directory rename.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    /// Current directory name.
    pub from: String,
    /// New directory name.
    pub to:   String,
}

/// Plans renames so each matched directory carries the student's name:
/// `hw1-ada` becomes `hw1-Ada_Lovelace@ada`. Directories that already carry
/// the name are left alone. With `remove_prefix`, the dash-terminated
/// prefix shared by all matched directories is dropped.
pub fn plan_renames<S: AsRef<str>>(
    roster: &Roster,
    dir_names: &[S],
    remove_prefix: bool,
    ignore_case: bool,
) -> Vec<Rename> {
    let labeling = roster.label_dirs(dir_names, MatchMode::Consume, ignore_case);
    let matched: Vec<&String> = labeling.dir_identity.keys().collect();
    let prefix = if remove_prefix { common_dash_prefix(&matched) } else { None };

    let mut plans = Vec::new();
    for (dir_name, identity) in &labeling.dir_identity {
        let Some(name) = roster.name(identity) else {
            continue;
        };
        let safe = safe_name(name);

        let mut target = if safe.is_empty() || dir_name.contains(&safe) {
            dir_name.clone()
        } else {
            match find_identity(dir_name, identity, ignore_case) {
                Some(start) => {
                    let end = start + identity.len();
                    let found = &dir_name[start..end];
                    format!("{}{safe}@{found}{}", &dir_name[..start], &dir_name[end..])
                }
                None => dir_name.clone(),
            }
        };
        if let Some(prefix) = &prefix
            && let Some(rest) = target.strip_prefix(prefix.as_str())
            && !rest.is_empty()
        {
            target = rest.to_string();
        }

        if &target != dir_name {
            plans.push(Rename {
                from: dir_name.clone(),
                to:   target,
            });
        }
    }
    plans
}

/// Carries out `plans` inside `root`. With `preview` nothing is touched.
/// Renames whose target already exists are logged and skipped. Returns the
/// renames performed (or previewed).
pub fn apply_renames(root: &Path, plans: &[Rename], preview: bool) -> Vec<Rename> {
    let mut done = Vec::new();
    for plan in plans {
        let from: PathBuf = root.join(&plan.from);
        let to: PathBuf = root.join(&plan.to);
        if preview {
            tracing::info!("Would rename {} -> {}", plan.from, plan.to);
            done.push(plan.clone());
            continue;
        }
        if to.exists() {
            tracing::error!("Cannot rename {}: {} already exists", plan.from, plan.to);
            continue;
        }
        match fs::rename(&from, &to) {
            Ok(()) => {
                tracing::info!("Renamed {} -> {}", plan.from, plan.to);
                done.push(plan.clone());
            }
            Err(e) => tracing::error!("Cannot rename {}: {e}", plan.from),
        }
    }
    done
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_names_collapse_separators() {
        assert_eq!(safe_name("Ada Lovelace"), "Ada_Lovelace");
        assert_eq!(safe_name("Lovelace, Ada"), "Lovelace_Ada");
        assert_eq!(safe_name("O'Brien  /  Pat"), "O'Brien_Pat");
        assert_eq!(safe_name("a__b"), "a_b");
    }

    #[test]
    fn dash_prefix_stops_at_the_last_dash() {
        let names = ["hw1-ada", "hw1-alan", "hw1-bob"];
        assert_eq!(common_dash_prefix(&names).as_deref(), Some("hw1-"));
        let close = ["hw1-ada", "hw1-alan"];
        assert_eq!(common_dash_prefix(&close).as_deref(), Some("hw1-"));
        assert_eq!(common_dash_prefix(&["ada", "bob"]), None);
        assert_eq!(common_dash_prefix::<&str>(&[]), None);
    }

    #[test]
    fn patterns_are_longest_first() {
        let roster = Roster::from_entries([("ann", "Ann"), ("joanna", "Joanna"), ("bob", "Bob")]);
        assert_eq!(roster.patterns(), vec!["joanna", "ann", "bob"]);
    }
}
