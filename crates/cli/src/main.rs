use anyhow::Context;
use clap::{Parser, Subcommand};
use imaging_core::constants::{DEFAULT_LOGS_FILENAME, DEFAULT_WARNINGS_FILENAME};
use imaging_core::{
    CatalogConfig, CountDimension, DatasetCatalog, DiagnosticSink, FileSink, MissingMasksPolicy,
    TracingSink,
};
use imaging_types::{PatientId, SeriesKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "imgcat")]
#[command(about = "Catalog per-patient imaging series and masks")]
struct Cli {
    /// Dataset root containing one folder per patient
    #[arg(long, env = "IMAGING_DATA_DIR", global = true)]
    root: Option<PathBuf>,
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Patient ids, comma-separated (default: every folder under the root)
    #[arg(long, value_delimiter = ',', global = true)]
    patients: Vec<String>,
    /// Series kinds, comma-separated (default: adc,dwi)
    #[arg(long, value_delimiter = ',', global = true)]
    kinds: Vec<String>,
    /// File extension for series and masks
    #[arg(long, global = true)]
    extension: Option<String>,
    /// Treat patients without a masks folder as mask-less instead of failing
    #[arg(long, global = true)]
    skip_missing_masks: bool,
    /// Append trace diagnostics to this file
    #[arg(long, env = "IMAGING_LOGS_FILE", global = true)]
    logs_file: Option<PathBuf>,
    /// Append warnings to this file
    #[arg(long, env = "IMAGING_WARNINGS_FILE", global = true)]
    warnings_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Series entries per kind, per patient
    SeriesCounts,
    /// Mask counts per patient, by series type or doctor
    MaskCounts {
        /// series_type or doctor
        #[arg(long)]
        by: CountDimension,
    },
    /// Mask counts by series type and doctor merged, per patient
    MaskOverall,
    /// Paths of one series kind, per patient
    SeriesPaths {
        kind: SeriesKind,
    },
    /// Patients whose mask counts meet every threshold
    Select {
        /// series_type or doctor
        #[arg(long)]
        by: CountDimension,
        /// KEY=N, repeatable; keys a patient lacks count as 0
        #[arg(long = "at-least", value_parser = parse_threshold)]
        at_least: Vec<(String, usize)>,
    },
}

fn parse_threshold(raw: &str) -> Result<(String, usize), String> {
    let (key, count) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=N, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{raw}'"));
    }
    let count = count
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid count in '{raw}': {e}"))?;
    Ok((key.to_owned(), count))
}

/// Config file first, then command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<CatalogConfig> {
    let mut config = match (&cli.config, &cli.root) {
        (Some(path), _) => CatalogConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(root)) => CatalogConfig::new(root.clone()),
        (None, None) => anyhow::bail!("no dataset root: pass --root, --config or set IMAGING_DATA_DIR"),
    };

    if let Some(root) = &cli.root {
        config.dataset_root = root.clone();
    }
    if !cli.kinds.is_empty() {
        config.discovery.kinds = cli
            .kinds
            .iter()
            .map(SeriesKind::new)
            .collect::<Result<_, _>>()
            .context("invalid series kind")?;
    }
    if let Some(extension) = &cli.extension {
        config.discovery = config.discovery.with_extension(extension);
    }
    if cli.skip_missing_masks {
        config.missing_masks = MissingMasksPolicy::TreatAsEmpty;
    }
    if cli.logs_file.is_some() {
        config.logs_file = cli.logs_file.clone();
    }
    if cli.warnings_file.is_some() {
        config.warnings_file = cli.warnings_file.clone();
    }
    Ok(config)
}

fn build_sink(config: &CatalogConfig) -> anyhow::Result<Arc<dyn DiagnosticSink>> {
    if config.logs_file.is_none() && config.warnings_file.is_none() {
        return Ok(Arc::new(TracingSink));
    }
    let logs = config
        .logs_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_FILENAME));
    let warnings = config
        .warnings_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_WARNINGS_FILENAME));
    Ok(Arc::new(FileSink::open(&logs, &warnings)?))
}

fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let config = resolve_config(&cli)?;
    let sink = build_sink(&config)?;
    let mut dataset = DatasetCatalog::with_sink(&config.dataset_root, sink)?;

    let ids = if cli.patients.is_empty() {
        dataset.patient_ids_on_disk()?
    } else {
        cli.patients
            .iter()
            .map(PatientId::new)
            .collect::<Result<_, _>>()
            .context("invalid patient id")?
    };

    dataset.build(
        ids,
        config.discovery.kinds.clone(),
        Some(config.discovery.masks.clone()),
        Some(config.discovery.series.clone()),
    );
    let report = dataset.discover(config.missing_masks)?;
    for id in &report.missing_masks {
        tracing::warn!("patient {} has no masks folder", id);
    }

    let output = match cli.command {
        Commands::SeriesCounts => serde_json::to_value(dataset.series_type_counts()?)?,
        Commands::MaskCounts { by } => serde_json::to_value(dataset.mask_counts_by(by)?)?,
        Commands::MaskOverall => serde_json::to_value(dataset.overall_mask_counts()?)?,
        Commands::SeriesPaths { kind } => {
            serde_json::to_value(dataset.series_paths_by_type(&kind)?)?
        }
        Commands::Select { by, at_least } => {
            let selected = dataset.select_by_mask_count(by, |counts| {
                at_least.iter().all(|(key, min)| counts.get(key) >= *min)
            })?;
            let ids: Vec<&str> = selected.iter().map(|p| p.id().as_str()).collect();
            serde_json::to_value(ids)?
        }
    };
    Ok(output)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("imaging_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = run(cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &std::path::Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn dataset() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        touch(&root.join("P1/ADC/adc.nii.gz"));
        touch(&root.join("P1/MASKS/doctorA/adc.nii.gz"));
        touch(&root.join("P1/MASKS/doctorB/adc.nii.gz"));
        touch(&root.join("P2/ADC/adc.nii.gz"));
        touch(&root.join("P2/MASKS/doctorA/adc.nii.gz"));
        temp
    }

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["imgcat"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn threshold_parsing() {
        assert_eq!(parse_threshold("doctorA=2"), Ok(("doctorA".to_string(), 2)));
        assert_eq!(parse_threshold(" adc = 1 "), Ok(("adc".to_string(), 1)));
        assert!(parse_threshold("doctorA").is_err());
        assert!(parse_threshold("=3").is_err());
        assert!(parse_threshold("adc=-1").is_err());
    }

    #[test]
    fn cli_overrides_config_defaults() {
        let parsed = cli(&[
            "--root",
            "/data",
            "--kinds",
            "adc,t2",
            "--extension",
            ".nii",
            "--skip-missing-masks",
            "series-counts",
        ]);
        let config = resolve_config(&parsed).unwrap();

        assert_eq!(config.dataset_root, PathBuf::from("/data"));
        let kinds: Vec<&str> = config.discovery.kinds.iter().map(|k| k.as_str()).collect();
        assert_eq!(kinds, vec!["adc", "t2"]);
        assert_eq!(config.discovery.series.extension, ".nii");
        assert_eq!(config.discovery.masks.extension, ".nii");
        assert_eq!(config.missing_masks, MissingMasksPolicy::TreatAsEmpty);
    }

    #[test]
    fn config_file_is_loaded() {
        let temp = dataset();
        let config_path = temp.path().join("catalog.yaml");
        fs::write(
            &config_path,
            format!(
                "dataset_root: {}\ndiscovery:\n  kinds: [adc]\n",
                temp.path().display()
            ),
        )
        .unwrap();

        let parsed = cli(&["--config", config_path.to_str().unwrap(), "mask-overall"]);
        let config = resolve_config(&parsed).unwrap();
        assert_eq!(config.dataset_root, temp.path());
        assert_eq!(config.discovery.kinds.len(), 1);
    }

    #[test]
    fn select_command_filters_patients() {
        let temp = dataset();
        let root = temp.path().to_str().unwrap();
        let parsed = cli(&[
            "--root",
            root,
            "--kinds",
            "adc",
            "select",
            "--by",
            "doctor",
            "--at-least",
            "doctorB=1",
        ]);

        let output = run(parsed).unwrap();
        assert_eq!(output, serde_json::json!(["P1"]));
    }

    #[test]
    fn bad_dimension_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["imgcat", "--root", "/data", "mask-counts", "--by", "nurse"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(
            Cli::try_parse_from(["imgcat", "select", "--by", "nurse", "--at-least", "a=1"]).is_err()
        );

        let parsed = cli(&["mask-counts", "--by", "Doctor"]);
        assert!(matches!(
            parsed.command,
            Commands::MaskCounts { by: CountDimension::Doctor }
        ));
    }

    #[test]
    fn series_counts_for_listed_patients() {
        let temp = dataset();
        let root = temp.path().to_str().unwrap();
        let parsed = cli(&["--root", root, "--patients", "P2,P9", "series-counts"]);

        let output = run(parsed).unwrap();
        assert_eq!(output, serde_json::json!({"P2": {"adc": 1, "dwi": 0}}));
    }
}
