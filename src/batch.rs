//! Batch driver: discovers top-level assets and exports them on a pool of worker threads.
//!
//! Each asset is decoded and written by a single worker. Workers share one [`AssetCache`], so
//! trile sets, art objects and textures referenced by several levels are decoded once.

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

use crate::art_object::decode_art_object;
use crate::cache::AssetCache;
use crate::config::{ExportConfig, FailurePolicy};
use crate::export::InterchangeWriter;
use crate::level_decoder::{DecodeOptions, LevelDecoder};
use crate::source::{cache_key, AssetSource};
use crate::trile_set::decode_trile_set;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum BatchKind {
    ArtObjects,
    TrileSets,
    Levels,
}

impl BatchKind {
    pub fn label(self) -> &'static str {
        match self {
            BatchKind::ArtObjects => "art objects",
            BatchKind::TrileSets => "trile sets",
            BatchKind::Levels => "levels",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAsset {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Inputs that were decoded and written.
    pub exported: Vec<PathBuf>,
    /// Files produced by the writer.
    pub outputs: Vec<PathBuf>,
    pub failed: Vec<FailedAsset>,
    /// Inputs skipped because the batch stopped early.
    pub not_attempted: Vec<PathBuf>,
    pub stopped: bool,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.not_attempted.is_empty()
    }

    fn sort(&mut self) {
        self.exported.sort();
        self.outputs.sort();
        self.failed.sort_by(|a, b| a.path.cmp(&b.path));
        self.not_attempted.sort();
    }
}

/// Lists the `.xml` files named by `inputs`. Directories are scanned one level deep.
pub fn discover_assets<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for input in inputs {
        let path = input.as_ref();
        if path.is_file() {
            add_target(path.to_path_buf(), &mut seen, &mut files);
        } else if path.is_dir() {
            let entries =
                fs::read_dir(path).with_context(|| format!("failed to enumerate directory '{}'", path.display()))?;
            for entry in entries {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_xml(&entry_path) {
                    add_target(entry_path, &mut seen, &mut files);
                }
            }
        } else {
            return Err(anyhow!("path '{}' does not exist", path.display()));
        }
    }
    files.sort();
    Ok(files)
}

fn is_xml(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()).is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
}

fn add_target(path: PathBuf, seen: &mut HashSet<PathBuf>, files: &mut Vec<PathBuf>) {
    if seen.insert(path.clone()) {
        files.push(path);
    }
}

enum Outcome {
    Exported { path: PathBuf, outputs: Vec<PathBuf> },
    Failed { path: PathBuf, error: String },
    NotAttempted(PathBuf),
}

pub struct BatchRunner {
    source: Arc<dyn AssetSource>,
    cache: Arc<AssetCache>,
    writer: Arc<dyn InterchangeWriter>,
    options: DecodeOptions,
    workers: usize,
    level_failure: FailurePolicy,
}

impl BatchRunner {
    pub fn new(config: &ExportConfig, source: Arc<dyn AssetSource>, writer: Arc<dyn InterchangeWriter>) -> Self {
        Self {
            source,
            cache: Arc::new(AssetCache::new()),
            writer,
            options: config.decode_options(),
            workers: config.batch.worker_count(),
            level_failure: config.batch.level_failure,
        }
    }

    /// Shares an existing cache, e.g. across several batches of one run.
    pub fn with_cache(mut self, cache: Arc<AssetCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    pub fn run(&self, kind: BatchKind, paths: Vec<PathBuf>) -> BatchReport {
        let worker_count = self.workers.clamp(1, paths.len().max(1));
        let (job_tx, job_rx) = unbounded::<PathBuf>();
        let (result_tx, result_rx) = unbounded::<Outcome>();
        for path in paths {
            // The receiver is alive until the end of this function.
            let _ = job_tx.send(path);
        }
        drop(job_tx);

        let stop = AtomicBool::new(false);
        thread::scope(|scope| {
            let mut spawned = 0;
            for index in 0..worker_count {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let stop = &stop;
                let spawn = thread::Builder::new()
                    .name(format!("export-{index}"))
                    .spawn_scoped(scope, move || self.work(kind, &job_rx, &result_tx, stop));
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(err) => warn!("failed to spawn export worker: {err}"),
                }
            }
            if spawned == 0 {
                self.work(kind, &job_rx, &result_tx, &stop);
            }
        });
        drop(result_tx);

        let mut report = BatchReport { stopped: stop.load(Ordering::SeqCst), ..BatchReport::default() };
        for outcome in result_rx.iter() {
            match outcome {
                Outcome::Exported { path, outputs } => {
                    report.exported.push(path);
                    report.outputs.extend(outputs);
                }
                Outcome::Failed { path, error } => report.failed.push(FailedAsset { path, error }),
                Outcome::NotAttempted(path) => report.not_attempted.push(path),
            }
        }
        report.sort();
        info!(
            kind = kind.label(),
            exported = report.exported.len(),
            failed = report.failed.len(),
            not_attempted = report.not_attempted.len(),
            "batch finished"
        );
        report
    }

    fn work(&self, kind: BatchKind, jobs: &Receiver<PathBuf>, results: &Sender<Outcome>, stop: &AtomicBool) {
        while let Ok(path) = jobs.recv() {
            let outcome = if stop.load(Ordering::SeqCst) {
                Outcome::NotAttempted(path)
            } else {
                match self.export(kind, &path) {
                    Ok(outputs) => Outcome::Exported { path, outputs },
                    Err(err) => {
                        warn!(path = %path.display(), "skipping {}: {err:#}", kind.label());
                        if kind == BatchKind::Levels && self.level_failure == FailurePolicy::Stop {
                            stop.store(true, Ordering::SeqCst);
                        }
                        Outcome::Failed { path, error: format!("{err:#}") }
                    }
                }
            };
            if results.send(outcome).is_err() {
                break;
            }
        }
    }

    fn export(&self, kind: BatchKind, path: &Path) -> Result<Vec<PathBuf>> {
        let source = self.source.as_ref();
        let convention = self.options.side_convention;
        let manifests = match kind {
            BatchKind::ArtObjects => {
                let geometry = self
                    .cache
                    .art_objects()
                    .try_get_or_insert(cache_key(path), || decode_art_object(source, path, convention))?;
                vec![self.writer.write_geometry(&geometry)?]
            }
            BatchKind::TrileSets => {
                let set = self
                    .cache
                    .trile_sets()
                    .try_get_or_insert(cache_key(path), || decode_trile_set(source, path, convention))?;
                self.writer.write_trile_set(&set)?
            }
            BatchKind::Levels => {
                let level = LevelDecoder::new(source, &self.cache, self.options).decode(path)?;
                vec![self.writer.write_level(&level)?]
            }
        };
        Ok(manifests.into_iter().map(|manifest| manifest.mesh_path).collect())
    }
}
