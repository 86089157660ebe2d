//! Dataset-wide catalog.
//!
//! A [`DatasetCatalog`] owns one [`PatientCatalog`] per patient directory under a dataset
//! root. Building it does not touch patient contents; [`DatasetCatalog::discover`] runs
//! discovery for every patient with the configuration supplied at build time.

use crate::aggregate::{CountDimension, Counts, MaskCounts};
use crate::config::{DiscoveryConfig, MatchConfig, MissingMasksPolicy};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::entry::ImagingResource;
use crate::matcher::list_sorted;
use crate::patient::PatientCatalog;
use crate::{CatalogError, CatalogResult};
use imaging_types::{PatientId, SeriesKind};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Outcome of [`DatasetCatalog::discover`].
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct DiscoveryReport {
    pub discovered: usize,
    /// Patients without a masks folder, given an empty mask index.
    pub missing_masks: Vec<PatientId>,
}

pub struct DatasetCatalog {
    root: PathBuf,
    patients: BTreeMap<PatientId, PatientCatalog>,
    config: DiscoveryConfig,
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for DatasetCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetCatalog")
            .field("root", &self.root)
            .field("patients", &self.patients.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DatasetCatalog {
    /// Creates an empty catalog over `root`, logging through `tracing`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidDatasetRoot`] if `root` does not exist or is not a directory.
    pub fn new(root: &Path) -> CatalogResult<Self> {
        Self::with_sink(root, Arc::new(TracingSink))
    }

    /// Creates an empty catalog over `root`, reporting diagnostics to `sink`.
    ///
    /// # Arguments
    ///
    /// * `root` - Dataset directory holding one subdirectory per patient
    /// * `sink` - Shared by every patient catalog built from this dataset
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidDatasetRoot`] if `root` does not exist or is not a directory.
    pub fn with_sink(root: &Path, sink: Arc<dyn DiagnosticSink>) -> CatalogResult<Self> {
        if !root.exists() {
            return Err(CatalogError::InvalidDatasetRoot(format!(
                "Directory does not exist: {}",
                root.display()
            )));
        }
        if !root.is_dir() {
            return Err(CatalogError::InvalidDatasetRoot(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            patients: BTreeMap::new(),
            config: DiscoveryConfig::default(),
            sink,
        })
    }

    /// Returns the dataset root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the discovery configuration recorded by the last [`Self::build`].
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Every subdirectory name under the root, in name order.
    pub fn patient_ids_on_disk(&self) -> CatalogResult<Vec<PatientId>> {
        Ok(list_sorted(&self.root, Path::is_dir)?
            .into_iter()
            .filter_map(|entry| PatientId::new(&entry.name).ok())
            .collect())
    }

    /// Replaces the patient map with one empty catalog per id that has a directory.
    ///
    /// Ids that are not a single plain path component (separators, `.` or `..`) are
    /// skipped with a warning, so no patient can resolve outside the root. Ids without a
    /// directory under the root are skipped. `None` configs fall back to
    /// [`MatchConfig::mask_default`] and [`MatchConfig::series_default`]. Nothing is
    /// discovered yet.
    pub fn build<I>(
        &mut self,
        patient_ids: I,
        kinds: Vec<SeriesKind>,
        mask_config: Option<MatchConfig>,
        series_config: Option<MatchConfig>,
    ) -> &BTreeMap<PatientId, PatientCatalog>
    where
        I: IntoIterator<Item = PatientId>,
    {
        self.config = DiscoveryConfig {
            kinds,
            series: series_config.unwrap_or_else(MatchConfig::series_default),
            masks: mask_config.unwrap_or_else(MatchConfig::mask_default),
        };

        let mut patients = BTreeMap::new();
        for id in patient_ids {
            if !is_plain_component(id.as_str()) {
                self.sink.warning(
                    id.as_str(),
                    "patient id is not a plain folder name, skipping",
                );
                continue;
            }
            let path = self.root.join(id.as_str());
            if !path.is_dir() {
                tracing::debug!("skipping patient {}: no directory at {}", id, path.display());
                continue;
            }
            let patient = PatientCatalog::new(id.clone(), path, self.sink.clone());
            patients.insert(id, patient);
        }
        self.patients = patients;
        &self.patients
    }

    /// Runs discovery for every patient.
    ///
    /// With [`MissingMasksPolicy::Abort`] the first patient lacking a masks folder stops
    /// the run. With [`MissingMasksPolicy::TreatAsEmpty`] that patient keeps its series,
    /// gets an empty mask index and is listed in the report.
    pub fn discover(&mut self, policy: MissingMasksPolicy) -> CatalogResult<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        for (id, patient) in &mut self.patients {
            patient.discover_series(&self.config.kinds, &self.config.series)?;
            match patient.discover_masks(&self.config.kinds, &self.config.masks) {
                Ok(_) => {}
                Err(CatalogError::MissingMasksFolder { .. })
                    if policy == MissingMasksPolicy::TreatAsEmpty =>
                {
                    self.sink
                        .warning(id.as_str(), "no masks folder found; treating as mask-less");
                    patient.mark_masks_empty(&self.config.kinds);
                    report.missing_masks.push(id.clone());
                }
                Err(e) => return Err(e),
            }
            report.discovered += 1;
        }
        tracing::info!(
            "discovered {} patient(s), {} without masks folder",
            report.discovered,
            report.missing_masks.len()
        );
        Ok(report)
    }

    pub fn patients(&self) -> &BTreeMap<PatientId, PatientCatalog> {
        &self.patients
    }

    pub fn patient(&self, id: &PatientId) -> Option<&PatientCatalog> {
        self.patients.get(id)
    }

    pub fn patient_mut(&mut self, id: &PatientId) -> Option<&mut PatientCatalog> {
        self.patients.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    /// Patients whose mask counts along `dimension` satisfy `rule`.
    pub fn select_by_mask_count<F>(
        &self,
        dimension: CountDimension,
        rule: F,
    ) -> CatalogResult<Vec<&PatientCatalog>>
    where
        F: Fn(&MaskCounts) -> bool,
    {
        let mut selected = Vec::new();
        for patient in self.patients.values() {
            let counts = MaskCounts::from(patient.mask_counts(dimension)?);
            if rule(&counts) {
                selected.push(patient);
            }
        }
        Ok(selected)
    }

    /// Mask counts along `dimension`, per patient.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotDiscovered`] if any patient has not been discovered.
    pub fn mask_counts_by(
        &self,
        dimension: CountDimension,
    ) -> CatalogResult<BTreeMap<PatientId, Counts>> {
        self.per_patient(|patient| patient.mask_counts(dimension))
    }

    /// Series-type and doctor counts merged into one map, per patient.
    ///
    /// Doctor counts are merged last, so a doctor named like a series kind wins.
    pub fn overall_mask_counts(&self) -> CatalogResult<BTreeMap<PatientId, Counts>> {
        self.per_patient(PatientCatalog::mask_counts_overall)
    }

    /// Series entries per kind, per patient.
    pub fn series_type_counts(&self) -> CatalogResult<BTreeMap<PatientId, Counts>> {
        self.per_patient(PatientCatalog::series_counts)
    }

    /// Paths of every `kind` series entry, per patient.
    pub fn series_paths_by_type(
        &self,
        kind: &SeriesKind,
    ) -> CatalogResult<BTreeMap<PatientId, Vec<PathBuf>>> {
        self.per_patient(|patient| {
            Ok(patient
                .series_by_kind(kind)?
                .iter()
                .flat_map(|entry| entry.paths().iter().cloned())
                .collect())
        })
    }

    fn per_patient<T>(
        &self,
        query: impl Fn(&PatientCatalog) -> CatalogResult<T>,
    ) -> CatalogResult<BTreeMap<PatientId, T>> {
        self.patients
            .iter()
            .map(|(id, patient)| Ok((id.clone(), query(patient)?)))
            .collect()
    }
}

fn is_plain_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
