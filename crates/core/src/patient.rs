//! Per-patient discovery.
//!
//! A [`PatientCatalog`] starts empty. [`PatientCatalog::discover_series`] and
//! [`PatientCatalog::discover_masks`] walk the patient's directory and fill the two
//! indices; the query methods in [`crate::aggregate`] only read them.
//!
//! Expected layout:
//!
//! ```text
//! <patient_id>/
//! ├── ADC/                  # any folder whose name contains the kind
//! │   └── adc.nii.gz
//! ├── DWI_b800/
//! │   └── dwi.nii.gz
//! └── MASKS/                # exactly one folder whose name contains "masks"
//!     ├── doctorA/          # one subfolder per annotating doctor
//!     │   └── adc.nii.gz
//!     └── doctorB/
//!         └── adc.nii.gz
//! ```

use crate::config::{DiscoveryConfig, MatchConfig};
use crate::constants::MASKS_FOLDER_NAME;
use crate::diagnostics::DiagnosticSink;
use crate::entry::{MaskEntry, SeriesEntry};
use crate::matcher::{list_sorted, FileMatcher};
use crate::{CatalogError, CatalogResult};
use imaging_types::{DoctorId, PatientId, SeriesKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Series kind to one entry per discovered file.
pub type SeriesIndex = BTreeMap<SeriesKind, Vec<SeriesEntry>>;

/// Doctor (or `None` for unassigned) to that doctor's masks.
pub type DoctorMasks = BTreeMap<Option<DoctorId>, Vec<MaskEntry>>;

/// Series kind to per-doctor masks.
pub type MaskIndex = BTreeMap<SeriesKind, DoctorMasks>;

pub struct PatientCatalog {
    id: PatientId,
    root: PathBuf,
    series: Option<SeriesIndex>,
    masks: Option<MaskIndex>,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for PatientCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatientCatalog")
            .field("id", &self.id)
            .field("root", &self.root)
            .field("series", &self.series)
            .field("masks", &self.masks)
            .finish_non_exhaustive()
    }
}

impl PatientCatalog {
    /// Creates an empty catalog. No filesystem access happens until discovery.
    pub fn new(id: PatientId, root: PathBuf, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            id,
            root,
            series: None,
            masks: None,
            sink,
        }
    }

    /// Returns the patient identifier.
    pub fn id(&self) -> &PatientId {
        &self.id
    }

    /// Returns the patient directory this catalog reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// True once both the series and mask indices have been populated.
    pub fn is_discovered(&self) -> bool {
        self.series.is_some() && self.masks.is_some()
    }

    /// Returns the series index built by [`Self::discover_series`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotDiscovered`] if series discovery has not run.
    pub fn series_index(&self) -> CatalogResult<&SeriesIndex> {
        self.series.as_ref().ok_or_else(|| CatalogError::NotDiscovered {
            patient_id: self.id.to_string(),
            index: "series",
        })
    }

    /// Returns the mask index built by [`Self::discover_masks`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotDiscovered`] if mask discovery has not run.
    pub fn mask_index(&self) -> CatalogResult<&MaskIndex> {
        self.masks.as_ref().ok_or_else(|| CatalogError::NotDiscovered {
            patient_id: self.id.to_string(),
            index: "masks",
        })
    }

    /// Runs series discovery, then mask discovery.
    ///
    /// A missing masks folder still leaves the series index populated.
    pub fn discover(&mut self, config: &DiscoveryConfig) -> CatalogResult<()> {
        self.discover_series(&config.kinds, &config.series)?;
        self.discover_masks(&config.kinds, &config.masks)?;
        Ok(())
    }

    /// Resolves every kind in `kinds` to series entries, one entry per file.
    ///
    /// All folders under the patient root whose name contains the kind are scanned and
    /// their files concatenated. A kind with no files keeps an empty entry list. Entries
    /// for the requested kinds replace any earlier result; other kinds are left alone.
    pub fn discover_series(
        &mut self,
        kinds: &[SeriesKind],
        config: &MatchConfig,
    ) -> CatalogResult<&SeriesIndex> {
        self.ensure_root()?;
        let id = self.id.to_string();
        let matcher = FileMatcher::new(&id, self.sink.as_ref());

        let mut resolved = Vec::with_capacity(kinds.len());
        for kind in kinds {
            self.sink.trace(
                &id,
                &format!(
                    "discovering series {kind}: extension {} mode {:?} exceptions {:?}",
                    config.extension, config.mode, config.exceptions
                ),
            );

            let folders = matcher.matching_folders(&self.root, kind.as_str())?;
            if folders.len() > 1 {
                self.sink.warning(
                    &id,
                    &format!(
                        "more than one series folder found for {kind}: {}",
                        display_paths(&folders)
                    ),
                );
            }

            let mut files = Vec::new();
            for folder in &folders {
                files.extend(matcher.select_files(folder, kind, config)?);
            }
            self.sink.trace(
                &id,
                &format!("files selected for series {kind}: {}", display_paths(&files)),
            );

            let entries: Vec<SeriesEntry> = files
                .into_iter()
                .map(|path| SeriesEntry::single(kind.clone(), path))
                .collect();
            resolved.push((kind.clone(), entries));
        }

        let index = self.series.get_or_insert_with(SeriesIndex::new);
        index.extend(resolved);
        Ok(&*index)
    }

    /// Resolves every kind in `kinds` to masks, grouped by doctor.
    ///
    /// Doctors are the immediate subfolders of the masks folder. Files placed directly in
    /// the masks folder are not attributed to anyone and are not catalogued.
    ///
    /// # Errors
    ///
    /// [`CatalogError::MissingMasksFolder`] if no folder name under the patient root
    /// contains `masks`. If several do, the first in name order is used and a critical
    /// diagnostic is recorded.
    pub fn discover_masks(
        &mut self,
        kinds: &[SeriesKind],
        config: &MatchConfig,
    ) -> CatalogResult<&MaskIndex> {
        self.ensure_root()?;
        let id = self.id.to_string();
        let matcher = FileMatcher::new(&id, self.sink.as_ref());

        let masks_folders = matcher.matching_folders(&self.root, MASKS_FOLDER_NAME)?;
        let masks_folder = match masks_folders.as_slice() {
            [] => {
                return Err(CatalogError::MissingMasksFolder {
                    patient_id: id.clone(),
                    root: self.root.clone(),
                })
            }
            [only] => only,
            [first, ..] => {
                self.sink.critical(
                    &id,
                    &format!(
                        "{} masks folders found when only one is expected: {}",
                        masks_folders.len(),
                        display_paths(&masks_folders)
                    ),
                );
                self.sink
                    .trace(&id, &format!("taking only {}", first.display()));
                first
            }
        };

        let doctors = self.doctor_folders(masks_folder)?;

        let stray = list_sorted(masks_folder, Path::is_file)?;
        if !stray.is_empty() {
            self.sink.warning(
                &id,
                &format!(
                    "{} file(s) directly under {} have no doctor folder and are not catalogued",
                    stray.len(),
                    masks_folder.display()
                ),
            );
        }

        let mut resolved = Vec::with_capacity(kinds.len());
        for kind in kinds {
            self.sink.trace(
                &id,
                &format!(
                    "discovering masks {kind}: extension {} mode {:?} exceptions {:?}",
                    config.extension, config.mode, config.exceptions
                ),
            );

            let mut by_doctor = DoctorMasks::new();
            for (doctor, folder) in &doctors {
                let entries: Vec<MaskEntry> = matcher
                    .select_files(folder, kind, config)?
                    .into_iter()
                    .map(|path| MaskEntry::single(kind.clone(), path, Some(doctor.clone())))
                    .collect();
                self.sink.trace(
                    &id,
                    &format!("{} mask(s) of {kind} selected for {doctor}", entries.len()),
                );
                by_doctor.insert(Some(doctor.clone()), entries);
            }
            resolved.push((kind.clone(), by_doctor));
        }

        let index = self.masks.get_or_insert_with(MaskIndex::new);
        index.extend(resolved);
        Ok(&*index)
    }

    /// Gives every kind in `kinds` an empty doctor map, for patients treated as mask-less.
    pub(crate) fn mark_masks_empty(&mut self, kinds: &[SeriesKind]) {
        let index = self.masks.get_or_insert_with(MaskIndex::new);
        for kind in kinds {
            index.insert(kind.clone(), DoctorMasks::new());
        }
    }

    fn doctor_folders(&self, masks_folder: &Path) -> CatalogResult<Vec<(DoctorId, PathBuf)>> {
        let mut doctors = Vec::new();
        for entry in list_sorted(masks_folder, Path::is_dir)? {
            match DoctorId::new(&entry.name) {
                Ok(doctor) => doctors.push((doctor, entry.path)),
                Err(_) => self.sink.warning(
                    self.id.as_str(),
                    &format!("skipping doctor folder with blank name: {}", entry.path.display()),
                ),
            }
        }
        Ok(doctors)
    }

    fn ensure_root(&self) -> CatalogResult<()> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(CatalogError::PatientDirectory {
                patient_id: self.id.to_string(),
                path: self.root.clone(),
            })
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    let shown: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", shown.join(", "))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::MatchMode;
    use crate::diagnostics::{RecordingSink, Severity};
    use crate::entry::ImagingResource;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    pub(crate) fn kinds(names: &[&str]) -> Vec<SeriesKind> {
        names.iter().map(|n| SeriesKind::new(n).unwrap()).collect()
    }

    fn catalog(root: &Path, sink: Arc<RecordingSink>) -> PatientCatalog {
        PatientCatalog::new(PatientId::new("P001").unwrap(), root.to_path_buf(), sink)
    }

    /// `ADC/adc.nii.gz`, `ADC/adc_extra.nii.gz`, `MASKS/doctorA/adc.nii.gz`.
    fn basic_patient() -> TempDir {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("ADC/adc.nii.gz"));
        touch(&temp.path().join("ADC/adc_extra.nii.gz"));
        touch(&temp.path().join("MASKS/doctorA/adc.nii.gz"));
        temp
    }

    #[test]
    fn try_full_match_yields_exact_series_only() {
        let temp = basic_patient();
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));

        let index = patient
            .discover_series(&kinds(&["adc"]), &MatchConfig::series_default())
            .unwrap();
        let entries = &index[&SeriesKind::new("adc").unwrap()];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].paths(), &[temp.path().join("ADC/adc.nii.gz")]);
    }

    #[test]
    fn substring_match_yields_one_entry_per_file() {
        let temp = basic_patient();
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));

        let index = patient
            .discover_series(&kinds(&["adc"]), &MatchConfig::default())
            .unwrap();
        let entries = &index[&SeriesKind::new("adc").unwrap()];
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.paths().len() == 1));
    }

    #[test]
    fn full_match_mask_is_attributed_to_doctor() {
        let temp = basic_patient();
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));

        let index = patient
            .discover_masks(&kinds(&["adc"]), &MatchConfig::mask_default())
            .unwrap();
        let by_doctor = &index[&SeriesKind::new("adc").unwrap()];
        assert_eq!(by_doctor.len(), 1);

        let doctor = DoctorId::new("doctorA").unwrap();
        let masks = &by_doctor[&Some(doctor.clone())];
        assert_eq!(masks.len(), 1);
        assert_eq!(masks[0].doctor(), Some(&doctor));
        assert_eq!(
            masks[0].primary_path(),
            temp.path().join("MASKS/doctorA/adc.nii.gz")
        );
    }

    #[test]
    fn missing_kind_keeps_empty_entry_list() {
        let temp = basic_patient();
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));

        let index = patient
            .discover_series(&kinds(&["adc", "dwi"]), &MatchConfig::series_default())
            .unwrap();
        let dwi = index.get(&SeriesKind::new("dwi").unwrap()).unwrap();
        assert!(dwi.is_empty());
    }

    #[test]
    fn multiple_series_folders_are_concatenated_with_one_warning() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("ADC_pre/adc_1.nii.gz"));
        touch(&temp.path().join("ADC_post/adc_2.nii.gz"));
        let sink = Arc::new(RecordingSink::new());
        let mut patient = catalog(temp.path(), sink.clone());

        let index = patient
            .discover_series(&kinds(&["adc"]), &MatchConfig::series_default())
            .unwrap();
        let paths: Vec<&Path> = index[&SeriesKind::new("adc").unwrap()]
            .iter()
            .map(|e| e.primary_path())
            .collect();
        assert_eq!(
            paths,
            vec![
                temp.path().join("ADC_post/adc_2.nii.gz").as_path(),
                temp.path().join("ADC_pre/adc_1.nii.gz").as_path(),
            ]
        );

        let warnings = sink.matching("more than one series folder");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].severity, Severity::Warning);
    }

    #[test]
    fn missing_masks_folder_fails_mask_discovery_only() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("ADC/adc.nii.gz"));
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));

        let err = patient
            .discover_masks(&kinds(&["adc"]), &MatchConfig::mask_default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::MissingMasksFolder { .. }));

        let err = patient.discover(&DiscoveryConfig::default()).unwrap_err();
        assert!(matches!(err, CatalogError::MissingMasksFolder { .. }));

        // Series were still discovered.
        let series = patient.series_index().unwrap();
        assert_eq!(series[&SeriesKind::new("adc").unwrap()].len(), 1);
        assert!(patient.mask_index().is_err());
    }

    #[test]
    fn multiple_masks_folders_use_first_and_raise_critical() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("MASKS/doctorA/adc.nii.gz"));
        touch(&temp.path().join("old_masks/doctorB/adc.nii.gz"));
        let sink = Arc::new(RecordingSink::new());
        let mut patient = catalog(temp.path(), sink.clone());

        let index = patient
            .discover_masks(&kinds(&["adc"]), &MatchConfig::mask_default())
            .unwrap();
        let doctors: Vec<_> = index[&SeriesKind::new("adc").unwrap()].keys().cloned().collect();
        assert_eq!(doctors, vec![Some(DoctorId::new("doctorA").unwrap())]);
        assert_eq!(sink.with_severity(Severity::Critical).len(), 1);
    }

    #[test]
    fn files_directly_under_masks_are_not_catalogued() {
        let temp = TempDir::new().unwrap();
        touch(&temp.path().join("MASKS/adc.nii.gz"));
        fs::create_dir_all(temp.path().join("MASKS/doctorA")).unwrap();
        let sink = Arc::new(RecordingSink::new());
        let mut patient = catalog(temp.path(), sink.clone());

        let index = patient
            .discover_masks(&kinds(&["adc"]), &MatchConfig::mask_default())
            .unwrap();
        let by_doctor = &index[&SeriesKind::new("adc").unwrap()];
        assert!(!by_doctor.contains_key(&None));
        assert!(by_doctor[&Some(DoctorId::new("doctorA").unwrap())].is_empty());
        assert_eq!(sink.matching("have no doctor folder").len(), 1);
    }

    #[test]
    fn rediscovery_replaces_previous_result() {
        let temp = basic_patient();
        let mut patient = catalog(temp.path(), Arc::new(RecordingSink::new()));
        let adc = kinds(&["adc"]);

        patient.discover_series(&adc, &MatchConfig::default()).unwrap();
        patient.discover_series(&adc, &MatchConfig::default()).unwrap();
        assert_eq!(patient.series_index().unwrap()[&adc[0]].len(), 2);

        patient
            .discover_series(&adc, &MatchConfig::new(".nii.gz", MatchMode::FullMatch))
            .unwrap();
        assert_eq!(patient.series_index().unwrap()[&adc[0]].len(), 1);
    }

    #[test]
    fn catalogs_do_not_share_indices() {
        let first = basic_patient();
        let second = TempDir::new().unwrap();
        fs::create_dir_all(second.path().join("MASKS")).unwrap();
        let sink = Arc::new(RecordingSink::new());

        let mut a = catalog(first.path(), sink.clone());
        let mut b = catalog(second.path(), sink);
        a.discover(&DiscoveryConfig::default()).unwrap();
        b.discover(&DiscoveryConfig::default()).unwrap();

        let adc = SeriesKind::new("adc").unwrap();
        assert_eq!(a.series_index().unwrap()[&adc].len(), 1);
        assert!(b.series_index().unwrap()[&adc].is_empty());
    }

    #[test]
    fn discovery_requires_existing_root() {
        let temp = TempDir::new().unwrap();
        let mut patient = catalog(&temp.path().join("gone"), Arc::new(RecordingSink::new()));

        let err = patient
            .discover_series(&kinds(&["adc"]), &MatchConfig::series_default())
            .unwrap_err();
        assert!(matches!(err, CatalogError::PatientDirectory { .. }));
    }
}
