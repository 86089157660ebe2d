//! Catalog entries.
//!
//! A [`SeriesEntry`] names one discovered resource: its series kind and the file paths
//! backing it. A [`MaskEntry`] is the same plus the annotating doctor. Both are immutable
//! once built and both expose the shared [`ImagingResource`] capability.

use crate::loader::VolumeLoader;
use imaging_types::{DoctorId, SeriesKind};
use std::path::{Path, PathBuf};

/// Shared capability of series and mask entries.
pub trait ImagingResource {
    fn kind(&self) -> &SeriesKind;

    /// Never empty.
    fn paths(&self) -> &[PathBuf];

    fn primary_path(&self) -> &Path {
        // Entries are only constructed with at least one path.
        &self.paths()[0]
    }

    /// Loads the first path only. Secondary files of a multi-path entry are not reachable
    /// here; use [`ImagingResource::get_all_data`] for those.
    fn get_data<L: VolumeLoader>(&self, loader: &L) -> Result<L::Volume, L::Error>
    where
        Self: Sized,
    {
        loader.load(self.primary_path())
    }

    /// Loads every path, in order.
    fn get_all_data<L: VolumeLoader>(&self, loader: &L) -> Result<Vec<L::Volume>, L::Error>
    where
        Self: Sized,
    {
        self.paths().iter().map(|p| loader.load(p)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SeriesEntry {
    kind: SeriesKind,
    paths: Vec<PathBuf>,
}

impl SeriesEntry {
    /// Returns `None` when `paths` is empty.
    pub fn new(kind: SeriesKind, paths: Vec<PathBuf>) -> Option<Self> {
        if paths.is_empty() {
            return None;
        }
        Some(Self { kind, paths })
    }

    pub fn single(kind: SeriesKind, path: PathBuf) -> Self {
        Self {
            kind,
            paths: vec![path],
        }
    }
}

impl ImagingResource for SeriesEntry {
    fn kind(&self) -> &SeriesKind {
        &self.kind
    }

    fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MaskEntry {
    #[serde(flatten)]
    series: SeriesEntry,
    /// `None` means unassigned: the file sits directly under the masks folder.
    doctor: Option<DoctorId>,
}

impl MaskEntry {
    /// Returns `None` when `paths` is empty.
    pub fn new(kind: SeriesKind, paths: Vec<PathBuf>, doctor: Option<DoctorId>) -> Option<Self> {
        SeriesEntry::new(kind, paths).map(|series| Self { series, doctor })
    }

    pub fn single(kind: SeriesKind, path: PathBuf, doctor: Option<DoctorId>) -> Self {
        Self {
            series: SeriesEntry::single(kind, path),
            doctor,
        }
    }

    pub fn doctor(&self) -> Option<&DoctorId> {
        self.doctor.as_ref()
    }
}

impl ImagingResource for MaskEntry {
    fn kind(&self) -> &SeriesKind {
        self.series.kind()
    }

    fn paths(&self) -> &[PathBuf] {
        self.series.paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Loader that records which paths it was asked for.
    #[derive(Default)]
    struct PathEcho {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl VolumeLoader for PathEcho {
        type Volume = String;
        type Error = std::convert::Infallible;

        fn load(&self, path: &Path) -> Result<String, Self::Error> {
            self.calls.borrow_mut().push(path.to_path_buf());
            Ok(path.display().to_string())
        }
    }

    fn adc() -> SeriesKind {
        SeriesKind::new("adc").unwrap()
    }

    #[test]
    fn empty_paths_yield_no_entry() {
        assert!(SeriesEntry::new(adc(), vec![]).is_none());
        assert!(MaskEntry::new(adc(), vec![], None).is_none());
    }

    #[test]
    fn get_data_uses_first_path_only() {
        let entry =
            SeriesEntry::new(adc(), vec![PathBuf::from("/a.nii.gz"), PathBuf::from("/b.nii.gz")])
                .unwrap();
        let loader = PathEcho::default();

        let volume = entry.get_data(&loader).unwrap();
        assert_eq!(volume, "/a.nii.gz");
        assert_eq!(loader.calls.borrow().len(), 1);
    }

    #[test]
    fn get_all_data_loads_every_path() {
        let entry = MaskEntry::new(
            adc(),
            vec![PathBuf::from("/a.nii.gz"), PathBuf::from("/b.nii.gz")],
            Some(DoctorId::new("doctorA").unwrap()),
        )
        .unwrap();
        let loader = PathEcho::default();

        let volumes = entry.get_all_data(&loader).unwrap();
        assert_eq!(volumes, vec!["/a.nii.gz".to_string(), "/b.nii.gz".to_string()]);
        assert_eq!(entry.doctor().map(|d| d.as_str()), Some("doctorA"));
    }

    #[test]
    fn mask_entry_serializes_flat() {
        let entry = MaskEntry::single(
            adc(),
            PathBuf::from("/p/MASKS/doctorA/adc.nii.gz"),
            Some(DoctorId::new("doctorA").unwrap()),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["kind"], "adc");
        assert_eq!(json["doctor"], "doctorA");
        assert_eq!(json["paths"][0], "/p/MASKS/doctorA/adc.nii.gz");
    }
}
