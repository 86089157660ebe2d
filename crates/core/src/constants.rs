//! Constants used throughout the imaging core crate.
//!
//! Folder names, default file extension and default log destinations live here so the
//! discovery code and the configuration layer agree on them.

/// File extension matched when none is configured.
pub const DEFAULT_EXTENSION: &str = ".nii.gz";

/// Substring identifying the masks folder under a patient directory (case-insensitive).
pub const MASKS_FOLDER_NAME: &str = "masks";

/// Series kinds discovered when no explicit list is configured.
pub const DEFAULT_SERIES_KINDS: [&str; 2] = ["adc", "dwi"];

/// Count key used for masks that carry no doctor attribution.
pub const UNASSIGNED_DOCTOR_KEY: &str = "unassigned";

/// Default trace log filename for [`crate::FileSink`].
pub const DEFAULT_LOGS_FILENAME: &str = "logs.txt";

/// Default warnings log filename for [`crate::FileSink`].
pub const DEFAULT_WARNINGS_FILENAME: &str = "warnings.txt";
