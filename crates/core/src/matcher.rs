//! Folder and file matching heuristics.
//!
//! There is no manifest: a folder belongs to a series kind when its lowercased name
//! *contains* the lowercased kind, and files inside it are picked by a [`MatchMode`].
//! Exception words are applied after candidate selection in every mode.
//!
//! The name-level rules ([`select_file_names`], [`apply_exceptions`]) are pure; the
//! [`FileMatcher`] wraps them with directory listing and diagnostics.
//!
//! Directory entries are always visited in ascending name order so a given directory
//! state produces the same result on every call and platform.

use crate::config::{MatchConfig, MatchMode};
use crate::diagnostics::DiagnosticSink;
use crate::{CatalogError, CatalogResult};
use imaging_types::SeriesKind;
use std::path::{Path, PathBuf};

/// A file name dropped because it contains an exception word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub file_name: String,
    pub exception: String,
}

/// Result of applying a [`MatchConfig`] to a list of file names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub selected: Vec<String>,
    pub excluded: Vec<Exclusion>,
}

impl Selection {
    fn merge_exclusions(&mut self, more: Vec<Exclusion>) {
        for exclusion in more {
            if !self.excluded.contains(&exclusion) {
                self.excluded.push(exclusion);
            }
        }
    }
}

/// `lowercase(kind) + extension`, the only name a full match accepts.
pub fn full_match_name(kind: &SeriesKind, extension: &str) -> String {
    format!("{}{}", kind.lowercase(), extension)
}

/// Drops every name containing one of `exceptions` (case-sensitive substring).
///
/// The first exception word found, in list order, is reported as the trigger.
pub fn apply_exceptions<S: AsRef<str>>(names: &[S], exceptions: &[String]) -> Selection {
    let mut selection = Selection::default();
    for name in names {
        let name = name.as_ref();
        match exceptions.iter().find(|word| name.contains(word.as_str())) {
            Some(word) => selection.excluded.push(Exclusion {
                file_name: name.to_owned(),
                exception: word.clone(),
            }),
            None => selection.selected.push(name.to_owned()),
        }
    }
    selection
}

/// Picks the file names that represent `kind` under `config`.
pub fn select_file_names<S: AsRef<str>>(
    names: &[S],
    kind: &SeriesKind,
    config: &MatchConfig,
) -> Selection {
    let exact = full_match_name(kind, &config.extension);
    let full_pass = || {
        let candidates: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| n.to_lowercase() == exact)
            .collect();
        apply_exceptions(&candidates, &config.exceptions)
    };
    let substring_pass = || {
        let candidates: Vec<&str> = names
            .iter()
            .map(AsRef::as_ref)
            .filter(|n| n.contains(config.extension.as_str()))
            .collect();
        apply_exceptions(&candidates, &config.exceptions)
    };

    match config.mode {
        MatchMode::FullMatch => full_pass(),
        MatchMode::Substring => substring_pass(),
        MatchMode::TryFullMatch => {
            let first = full_pass();
            if !first.selected.is_empty() {
                return first;
            }
            let fallback = substring_pass();
            let mut merged = Selection {
                selected: fallback.selected,
                excluded: first.excluded,
            };
            merged.merge_exclusions(fallback.excluded);
            merged
        }
    }
}

/// True when a folder named `folder_name` qualifies for `needle` (case-insensitive
/// substring).
pub fn folder_matches(folder_name: &str, needle: &str) -> bool {
    folder_name.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone)]
pub(crate) struct ListedEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Lists `dir`, sorted by name, keeping only entries accepted by `keep`.
pub(crate) fn list_sorted(
    dir: &Path,
    keep: impl Fn(&Path) -> bool,
) -> CatalogResult<Vec<ListedEntry>> {
    let read_err = |source| CatalogError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !keep(&path) {
            continue;
        }
        entries.push(ListedEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Filesystem-facing matcher bound to one patient's diagnostics.
pub struct FileMatcher<'a> {
    patient_id: &'a str,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> FileMatcher<'a> {
    pub fn new(patient_id: &'a str, sink: &'a dyn DiagnosticSink) -> Self {
        Self { patient_id, sink }
    }

    /// Subdirectories of `root` whose name contains `needle`, case-insensitively.
    pub fn matching_folders(&self, root: &Path, needle: &str) -> CatalogResult<Vec<PathBuf>> {
        let folders: Vec<PathBuf> = list_sorted(root, Path::is_dir)?
            .into_iter()
            .filter(|e| folder_matches(&e.name, needle))
            .map(|e| e.path)
            .collect();

        self.sink.trace(
            self.patient_id,
            &format!("folders found for {needle}: {folders:?}"),
        );
        Ok(folders)
    }

    /// Full paths of the files in `folder` that represent `kind`.
    ///
    /// Each excluded file is reported once, naming the exception word that caught it.
    pub fn select_files(
        &self,
        folder: &Path,
        kind: &SeriesKind,
        config: &MatchConfig,
    ) -> CatalogResult<Vec<PathBuf>> {
        let files = list_sorted(folder, Path::is_file)?;
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();

        self.sink.trace(
            self.patient_id,
            &format!(
                "files found in {}: {names:?}; selecting {kind} with mode {:?}, extension {}, exceptions {:?}",
                folder.display(),
                config.mode,
                config.extension,
                config.exceptions
            ),
        );

        let selection = select_file_names(&names, kind, config);
        for exclusion in &selection.excluded {
            self.sink.trace(
                self.patient_id,
                &format!(
                    "file excluded {} by exception: {}",
                    exclusion.file_name, exclusion.exception
                ),
            );
        }

        // Selected names keep listing order, so walking the listing once pairs each name
        // with its on-disk path. Names decoded lossily still resolve to the real file.
        let mut listed = files.into_iter();
        Ok(selection
            .selected
            .iter()
            .filter_map(|name| listed.by_ref().find(|f| &f.name == name))
            .map(|f| f.path)
            .collect())
    }
}
