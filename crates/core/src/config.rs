//! Discovery configuration.
//!
//! Configuration is resolved once (from defaults, a YAML file, or the CLI) and then passed
//! into discovery explicitly. Nothing here is global or mutated behind the caller's back.

use crate::constants::{DEFAULT_EXTENSION, DEFAULT_SERIES_KINDS};
use crate::{CatalogError, CatalogResult};
use imaging_types::SeriesKind;
use std::path::{Path, PathBuf};

/// File-selection rule applied inside a candidate folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Lowercased file name must equal `lowercase(kind) + extension`. No fallback.
    FullMatch,
    /// Full match first; if nothing survives, fall back to [`MatchMode::Substring`].
    TryFullMatch,
    /// Any file whose name contains the extension.
    #[default]
    Substring,
}

impl MatchMode {
    /// Maps the legacy `full_match` / `try_full_match` flag pair onto a mode.
    ///
    /// `full_match` takes precedence; `try_full_match` is ignored when it is set.
    pub fn from_flags(full_match: bool, try_full_match: bool) -> Self {
        if full_match {
            MatchMode::FullMatch
        } else if try_full_match {
            MatchMode::TryFullMatch
        } else {
            MatchMode::Substring
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub extension: String,
    /// Case-sensitive substrings that exclude a file name.
    pub exceptions: Vec<String>,
    pub mode: MatchMode,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            extension: DEFAULT_EXTENSION.to_owned(),
            exceptions: Vec::new(),
            mode: MatchMode::Substring,
        }
    }
}

impl MatchConfig {
    pub fn new(extension: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            extension: extension.into(),
            exceptions: Vec::new(),
            mode,
        }
    }

    /// Default configuration for series: try full match on `.nii.gz`.
    pub fn series_default() -> Self {
        Self::new(DEFAULT_EXTENSION, MatchMode::TryFullMatch)
    }

    /// Default configuration for masks: strict full match on `.nii.gz`.
    pub fn mask_default() -> Self {
        Self::new(DEFAULT_EXTENSION, MatchMode::FullMatch)
    }

    pub fn with_exceptions<I, S>(mut self, exceptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exceptions = exceptions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }
}

/// What to do when a patient has no masks folder during dataset-wide discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingMasksPolicy {
    /// Stop and return the error.
    #[default]
    Abort,
    /// Record the patient in the report and give it an empty mask index.
    TreatAsEmpty,
}

/// Everything a discovery pass needs.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DiscoveryConfig {
    pub kinds: Vec<SeriesKind>,
    #[serde(default = "MatchConfig::series_default")]
    pub series: MatchConfig,
    #[serde(default = "MatchConfig::mask_default")]
    pub masks: MatchConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            kinds: default_kinds(),
            series: MatchConfig::series_default(),
            masks: MatchConfig::mask_default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn new(kinds: Vec<SeriesKind>) -> Self {
        Self {
            kinds,
            ..Self::default()
        }
    }

    /// Overrides the extension used for both series and masks.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.series.extension = extension.to_owned();
        self.masks.extension = extension.to_owned();
        self
    }
}

pub fn default_kinds() -> Vec<SeriesKind> {
    DEFAULT_SERIES_KINDS
        .iter()
        .filter_map(|k| SeriesKind::new(k).ok())
        .collect()
}

/// Top-level configuration for a catalog run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CatalogConfig {
    pub dataset_root: PathBuf,
    #[serde(default)]
    pub logs_file: Option<PathBuf>,
    #[serde(default)]
    pub warnings_file: Option<PathBuf>,
    #[serde(default)]
    pub missing_masks: MissingMasksPolicy,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl CatalogConfig {
    pub fn new(dataset_root: PathBuf) -> Self {
        Self {
            dataset_root,
            logs_file: None,
            warnings_file: None,
            missing_masks: MissingMasksPolicy::default(),
            discovery: DiscoveryConfig::default(),
        }
    }

    pub fn from_yaml_str(contents: &str) -> CatalogResult<Self> {
        let config: Self = serde_yaml::from_str(contents).map_err(CatalogError::ConfigParse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> CatalogResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(CatalogError::ConfigRead)?;
        Self::from_yaml_str(&contents)
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.discovery.kinds.is_empty() {
            return Err(CatalogError::InvalidInput(
                "discovery.kinds cannot be empty".into(),
            ));
        }
        for cfg in [&self.discovery.series, &self.discovery.masks] {
            if cfg.extension.is_empty() {
                return Err(CatalogError::InvalidInput(
                    "file extension cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_respect_precedence() {
        assert_eq!(MatchMode::from_flags(true, true), MatchMode::FullMatch);
        assert_eq!(MatchMode::from_flags(true, false), MatchMode::FullMatch);
        assert_eq!(MatchMode::from_flags(false, true), MatchMode::TryFullMatch);
        assert_eq!(MatchMode::from_flags(false, false), MatchMode::Substring);
    }

    #[test]
    fn discovery_defaults() {
        let config = DiscoveryConfig::default();
        let kinds: Vec<&str> = config.kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(kinds, vec!["adc", "dwi"]);
        assert_eq!(config.series.mode, MatchMode::TryFullMatch);
        assert_eq!(config.masks.mode, MatchMode::FullMatch);
        assert_eq!(config.series.extension, ".nii.gz");
    }

    #[test]
    fn yaml_config_fills_defaults() {
        let config = CatalogConfig::from_yaml_str(
            r#"
dataset_root: /data/prostate
discovery:
  kinds: [adc, dwi, t2]
  series:
    extension: .nii
    exceptions: [bad]
"#,
        )
        .unwrap();

        assert_eq!(config.dataset_root, PathBuf::from("/data/prostate"));
        assert_eq!(config.missing_masks, MissingMasksPolicy::Abort);
        assert_eq!(config.discovery.kinds.len(), 3);
        assert_eq!(config.discovery.series.extension, ".nii");
        assert_eq!(config.discovery.series.exceptions, vec!["bad".to_string()]);
        // Missing fields inside a MatchConfig fall back to MatchConfig::default.
        assert_eq!(config.discovery.series.mode, MatchMode::Substring);
        assert_eq!(config.discovery.masks, MatchConfig::mask_default());
    }

    #[test]
    fn yaml_config_rejects_empty_kinds() {
        let err = CatalogConfig::from_yaml_str(
            "dataset_root: /data\ndiscovery:\n  kinds: []\n",
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidInput(_)));
    }

    #[test]
    fn yaml_config_rejects_blank_kind() {
        let err = CatalogConfig::from_yaml_str(
            "dataset_root: /data\ndiscovery:\n  kinds: ['  ']\n",
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::ConfigParse(_)));
    }

    #[test]
    fn missing_masks_policy_parses_snake_case() {
        let config = CatalogConfig::from_yaml_str(
            "dataset_root: /data\nmissing_masks: treat_as_empty\n",
        )
        .unwrap();
        assert_eq!(config.missing_masks, MissingMasksPolicy::TreatAsEmpty);
    }
}
