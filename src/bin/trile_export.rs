use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use trile_export::cli::Cli;
use trile_export::{discover_assets, BatchRunner, ExportConfig, FsAssetSource, ObjWriter};

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .without_time()
        .compact()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();
    run(&cli)
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut config = match &cli.config {
        Some(path) => ExportConfig::load(path)?,
        None => ExportConfig::default(),
    };
    let overrides = cli.config_overrides();
    if !overrides.is_empty() {
        debug!(fields = ?overrides.applied_fields(), "applying command line overrides");
    }
    config.apply_overrides(&overrides);

    let paths = discover_assets(&cli.inputs)?;
    if paths.is_empty() {
        warn!("no XML files found in the given inputs");
        return Ok(ExitCode::SUCCESS);
    }
    info!(
        kind = cli.kind.label(),
        files = paths.len(),
        workers = config.batch.worker_count(),
        side_convention = config.geometry.side_convention.label(),
        level_failure = config.batch.level_failure.label(),
        out = %config.output.directory.display(),
        "exporting"
    );

    let source = Arc::new(FsAssetSource::new(config.folders.clone()));
    let writer = Arc::new(ObjWriter::new(&config.output.directory, config.output.copy_textures));
    let report = BatchRunner::new(&config, source, writer).run(cli.kind, paths);

    if report.stopped {
        error!(not_attempted = report.not_attempted.len(), "level batch stopped after a failure");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
