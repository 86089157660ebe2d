//! # Imaging Core
//!
//! Discovery and matching engine for per-patient medical imaging datasets.
//!
//! A dataset is a directory with one subdirectory per patient. Inside each patient
//! directory, series files (ADC, DWI, ...) live in folders whose names contain the series
//! kind, and masks live under a single `masks` folder with one subfolder per annotating
//! doctor. There is no manifest; everything is resolved from folder and file names.
//!
//! - [`matcher`]: folder matching, file selection modes and exception words
//! - [`PatientCatalog`]: per-patient discovery into series and mask indices
//! - [`aggregate`]: counts and listings over a discovered patient
//! - [`DatasetCatalog`]: patient map, dataset-wide discovery and rule-based selection
//!
//! Discovery is explicit. Build the catalog, call `discover`, then query:
//!
//! ```no_run
//! use imaging_core::{CountDimension, DatasetCatalog, MissingMasksPolicy};
//! use imaging_types::SeriesKind;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dataset = DatasetCatalog::new(Path::new("/data/prostate"))?;
//! let ids = dataset.patient_ids_on_disk()?;
//! let kinds = vec![SeriesKind::new("adc")?, SeriesKind::new("dwi")?];
//! dataset.build(ids, kinds, None, None);
//! dataset.discover(MissingMasksPolicy::TreatAsEmpty)?;
//!
//! let two_readers = dataset.select_by_mask_count(CountDimension::Doctor, |counts| {
//!     counts.keys().filter(|doctor| counts.get(doctor) > 0).count() >= 2
//! })?;
//! println!("{} patient(s) read by two doctors", two_readers.len());
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod diagnostics;
pub mod entry;
pub mod error;
pub mod loader;
pub mod matcher;
pub mod patient;

pub use aggregate::{CountDimension, Counts, MaskCounts};
pub use config::{CatalogConfig, DiscoveryConfig, MatchConfig, MatchMode, MissingMasksPolicy};
pub use dataset::{DatasetCatalog, DiscoveryReport};
pub use diagnostics::{Diagnostic, DiagnosticSink, FileSink, RecordingSink, Severity, TracingSink};
pub use entry::{ImagingResource, MaskEntry, SeriesEntry};
pub use error::{CatalogError, CatalogResult};
pub use loader::VolumeLoader;
pub use matcher::FileMatcher;
pub use patient::{DoctorMasks, MaskIndex, PatientCatalog, SeriesIndex};

#[cfg(feature = "nifti")]
pub use loader::NiftiLoader;
