//! Aggregate queries over a discovered [`PatientCatalog`].
//!
//! Queries never trigger discovery. A query reading an index that has not been populated
//! fails with [`CatalogError::NotDiscovered`].

use crate::constants::UNASSIGNED_DOCTOR_KEY;
use crate::diagnostics::DiagnosticSink;
use crate::entry::{MaskEntry, SeriesEntry};
use crate::patient::PatientCatalog;
use crate::{CatalogError, CatalogResult};
use imaging_types::{DoctorId, SeriesKind};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// Count per key (series kind or doctor).
pub type Counts = BTreeMap<String, usize>;

/// What mask counts are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountDimension {
    SeriesType,
    Doctor,
}

impl FromStr for CountDimension {
    type Err = CatalogError;

    /// Accepts `series_type` or `doctor`, in any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "series_type" => Ok(CountDimension::SeriesType),
            "doctor" => Ok(CountDimension::Doctor),
            _ => Err(CatalogError::InvalidDimension(s.to_owned())),
        }
    }
}

impl std::fmt::Display for CountDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CountDimension::SeriesType => f.write_str("series_type"),
            CountDimension::Doctor => f.write_str("doctor"),
        }
    }
}

/// Lookup handed to selection rules.
///
/// Keys absent for a given patient read as zero, so a rule can name a doctor or kind the
/// patient has never seen without failing.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct MaskCounts(Counts);

impl MaskCounts {
    pub fn get(&self, key: &str) -> usize {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn as_map(&self) -> &Counts {
        &self.0
    }

    pub fn into_inner(self) -> Counts {
        self.0
    }
}

impl From<Counts> for MaskCounts {
    fn from(counts: Counts) -> Self {
        Self(counts)
    }
}

fn doctor_key(doctor: Option<&DoctorId>) -> String {
    doctor
        .map(|d| d.as_str().to_owned())
        .unwrap_or_else(|| UNASSIGNED_DOCTOR_KEY.to_owned())
}

impl PatientCatalog {
    /// Number of series entries per discovered kind. Kinds without files count 0.
    pub fn series_counts(&self) -> CatalogResult<Counts> {
        let index = self.series_index()?;
        Ok(index
            .iter()
            .map(|(kind, entries)| (kind.to_string(), entries.len()))
            .collect())
    }

    /// Mask counts grouped by `dimension`.
    ///
    /// Every known kind (or every doctor seen under any kind) starts at zero, then each
    /// mask entry adds one to its bucket. An empty mask index gives an empty mapping.
    pub fn mask_counts(&self, dimension: CountDimension) -> CatalogResult<Counts> {
        let index = self.mask_index()?;
        let mut counts = Counts::new();

        match dimension {
            CountDimension::SeriesType => {
                for (kind, by_doctor) in index {
                    let total: usize = by_doctor.values().map(Vec::len).sum();
                    counts.insert(kind.to_string(), total);
                }
            }
            CountDimension::Doctor => {
                // Doctors are the union over all kinds, not just the first kind's set.
                for by_doctor in index.values() {
                    for (doctor, masks) in by_doctor {
                        *counts.entry(doctor_key(doctor.as_ref())).or_insert(0) += masks.len();
                    }
                }
            }
        }
        Ok(counts)
    }

    /// Per-kind and per-doctor counts in one mapping.
    ///
    /// A doctor named like a series kind overwrites that kind's count.
    pub fn mask_counts_overall(&self) -> CatalogResult<Counts> {
        let mut counts = self.mask_counts(CountDimension::SeriesType)?;
        counts.extend(self.mask_counts(CountDimension::Doctor)?);
        Ok(counts)
    }

    /// Kinds with at least one series entry.
    ///
    /// Records a warning for every kind that resolved to more than one entry.
    pub fn series_types_present(&self) -> CatalogResult<BTreeSet<SeriesKind>> {
        let index = self.series_index()?;
        let mut present = BTreeSet::new();
        for (kind, entries) in index {
            if entries.len() > 1 {
                self.sink.warning(
                    self.id().as_str(),
                    &format!("patient has multiple series for type: {kind}"),
                );
            }
            if !entries.is_empty() {
                present.insert(kind.clone());
            }
        }
        Ok(present)
    }

    /// Series entries discovered for `kind`.
    pub fn series_by_kind(&self, kind: &SeriesKind) -> CatalogResult<&[SeriesEntry]> {
        self.series_index()?
            .get(kind)
            .map(Vec::as_slice)
            .ok_or_else(|| CatalogError::UnknownSeriesKind {
                patient_id: self.id().to_string(),
                kind: kind.to_string(),
            })
    }

    /// Every mask entry, by kind then doctor.
    pub fn all_masks(&self) -> CatalogResult<Vec<&MaskEntry>> {
        Ok(self
            .mask_index()?
            .values()
            .flat_map(|by_doctor| by_doctor.values())
            .flatten()
            .collect())
    }
}
