use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid dataset root: {0}")]
    InvalidDatasetRoot(String),
    #[error("patient {patient_id} directory is missing or not a directory: {path}", path = path.display())]
    PatientDirectory { patient_id: String, path: PathBuf },
    #[error("no masks folder found for patient {patient_id} under {root}", root = root.display())]
    MissingMasksFolder { patient_id: String, root: PathBuf },
    #[error("invalid count dimension: {0} (expected 'series_type' or 'doctor')")]
    InvalidDimension(String),
    #[error("{index} not yet discovered for patient {patient_id}")]
    NotDiscovered {
        patient_id: String,
        index: &'static str,
    },
    #[error("series kind {kind} was not discovered for patient {patient_id}")]
    UnknownSeriesKind { patient_id: String, kind: String },
    #[error("failed to read directory {path}: {source}", path = path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open diagnostic log {path}: {source}", path = path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read config file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse config file: {0}")]
    ConfigParse(serde_yaml::Error),
    #[error("invalid identifier: {0}")]
    Text(#[from] imaging_types::TextError),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
