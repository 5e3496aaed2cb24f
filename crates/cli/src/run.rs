//! `confdiff run` / `confdiff validate`: descriptor-driven comparisons.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use confdiff_compare::{
    run_comparisons, CollectingSink, CompareConfig, CompareError, Comparison, ComparisonKind, Warning,
};
use confdiff_io::ConfigSources;

use crate::exit_codes::EXIT_DIFFS;
use crate::render::{render_human, Labels};
use crate::CliError;

/// JSON document written by `run --json` / `--output`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub meta: RunMeta,
    pub has_differences: bool,
    pub comparisons: &'a [Comparison],
    pub warnings: &'a [Warning],
}

#[derive(Debug, Serialize)]
pub struct RunMeta {
    pub engine_version: String,
    pub run_at: String,
    pub area: String,
    pub area_name: String,
    pub config_type: String,
    pub data_set: String,
}

impl RunMeta {
    fn for_config(config: &CompareConfig) -> Self {
        let descriptor = config.descriptor();
        Self {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            area: descriptor.area.ident,
            area_name: descriptor.area.name,
            config_type: descriptor.config_type.to_string(),
            data_set: descriptor.data_set,
        }
    }
}

fn load(path: &Path) -> Result<CompareConfig, CliError> {
    CompareConfig::from_path(path).map_err(|e| match e {
        CompareError::Io(msg) => CliError::usage(msg).with_hint("check the descriptor path"),
        other => CliError::descriptor(other.to_string()),
    })
}

pub fn cmd_run(
    descriptor_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    quiet: bool,
) -> Result<(), CliError> {
    let config = load(&descriptor_path)?;
    tracing::debug!("loaded descriptor {}", descriptor_path.display());

    let sink = CollectingSink::new();
    let comparisons = run_comparisons(&config, &ConfigSources::new(&config), &sink);
    let warnings = sink.take();
    if !quiet {
        for warning in &warnings {
            eprintln!("warning: {warning}");
        }
    }

    let has_differences = comparisons.iter().any(|c| !c.diff.is_empty());

    if json_output || output_file.is_some() {
        let report = RunReport {
            meta: RunMeta::for_config(&config),
            has_differences,
            comparisons: &comparisons,
            warnings: &warnings,
        };
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::runtime(format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = output_file {
            std::fs::write(path, &json_str)
                .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
            if !quiet {
                eprintln!("wrote {}", path.display());
            }
        }

        if json_output {
            println!("{json_str}");
        }
    }

    if !json_output {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        render_human(&mut handle, &config.descriptor(), &comparisons, &Labels::new(&config.labels))
            .map_err(|e| CliError::runtime(format!("cannot write output: {e}")))?;
    }

    if has_differences {
        return Err(CliError::silent(EXIT_DIFFS));
    }
    Ok(())
}

pub fn cmd_validate(descriptor_path: PathBuf) -> Result<(), CliError> {
    let config = load(&descriptor_path)?;
    let descriptor = config.descriptor();
    let kinds = ComparisonKind::for_type(&descriptor.config_type);

    // Missing inputs are legal but make every field one-sided.
    for kind in kinds {
        if descriptor.files.get(kind.file_role()).is_none() {
            eprintln!("note: no {} file configured; {kind} will see no candidate records", kind.file_role());
        }
    }
    if config.store.path.is_none() {
        eprintln!("note: no store path configured; every comparison will see no current records");
    }

    let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
    println!(
        "ok: area {} ({}), comparisons: {}",
        descriptor.area.ident,
        descriptor.config_type,
        names.join(", ")
    );
    Ok(())
}
