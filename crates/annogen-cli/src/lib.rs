//! Run pipeline behind the `annogen` binary: configuration, environment
//! probe, scan, parallel dispatch, finalize, write.

use annogen_core::{AggregateError, AnnogenConfig, ConfigManager, Environment, Node};
use annogen_parser::{collect_go_files, scan_files, ModuleResolver, PackageNameSniffer};
use annogen_processors::builtin_registry;
use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub project_root: PathBuf,
    pub config: Option<PathBuf>,
    pub dry_run: bool,
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub bytes: usize,
    /// False when the file already had identical content or in dry-run mode.
    pub written: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub project_root: PathBuf,
    pub files_scanned: usize,
    pub declarations: usize,
    pub dry_run: bool,
    pub artifacts: Vec<ArtifactSummary>,
    pub elapsed_ms: u128,
}

/// Loads the layered configuration and applies command-line overrides.
pub fn load_config(options: &RunOptions) -> Result<AnnogenConfig> {
    let mut config = ConfigManager::load(&options.project_root, options.config.as_deref())
        .context("Failed to load configuration")?
        .into_config();
    if options.dry_run {
        config.output.dry_run = true;
    }
    if let Some(threads) = options.threads {
        config.performance.num_threads = threads;
    }
    Ok(config)
}

/// Probes the Go toolchain for `project_root` and runs the pipeline.
pub fn run(project_root: &Path, config: &AnnogenConfig) -> Result<RunReport> {
    let env = Environment::probe(project_root).context("Failed to probe Go environment")?;
    generate(project_root, config, env)
}

/// Runs the pipeline against an already-probed environment.
///
/// Nothing is written unless every node dispatches and every unit
/// finalizes without error.
pub fn generate(project_root: &Path, config: &AnnogenConfig, env: Environment) -> Result<RunReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.performance.num_threads)
        .build()
        .context("Failed to build worker pool")?;
    pool.install(|| generate_in_pool(project_root, config, env))
}

fn generate_in_pool(
    project_root: &Path,
    config: &AnnogenConfig,
    env: Environment,
) -> Result<RunReport> {
    let started = Instant::now();
    let resolver = Arc::new(ModuleResolver::new(Arc::new(env)));
    let sniffer = Arc::new(PackageNameSniffer::new(resolver.clone()));
    let registry = builtin_registry(sniffer, &config.output);

    let paths = collect_go_files(project_root, &config.scan)?;
    let scanned = scan_files(&paths, &resolver)?;
    let nodes: Vec<&Node> = scanned.iter().flat_map(|f| f.nodes.iter()).collect();
    info!(
        "Dispatching {} declarations on {} worker(s)",
        nodes.len(),
        rayon::current_num_threads()
    );

    // Every node is dispatched before any processor finalizes.
    let errors: AggregateError = nodes
        .par_iter()
        .map(|node| registry.dispatch(node))
        .collect::<Vec<_>>()
        .into_iter()
        .filter_map(|r| r.err())
        .collect();
    errors.into_result()?;

    let outputs = registry.output()?;

    let dry_run = config.output.dry_run;
    let mut artifacts = Vec::with_capacity(outputs.len());
    for (path, data) in outputs {
        let written = !dry_run && write_if_changed(&path, &data)?;
        artifacts.push(ArtifactSummary {
            path,
            bytes: data.len(),
            written,
        });
    }

    let report = RunReport {
        project_root: project_root.to_path_buf(),
        files_scanned: paths.len(),
        declarations: nodes.len(),
        dry_run,
        artifacts,
        elapsed_ms: started.elapsed().as_millis(),
    };
    info!(
        "Generated {} artifact(s) from {} files in {}ms",
        report.artifacts.len(),
        report.files_scanned,
        report.elapsed_ms
    );
    Ok(report)
}

fn write_if_changed(path: &Path, data: &[u8]) -> Result<bool> {
    if let Ok(existing) = std::fs::read(path) {
        if existing == data {
            debug!("{} is up to date", path.display());
            return Ok(false);
        }
    }
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}
