use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use crate::billboard::BillboardStyle;
use crate::level_decoder::DecodeOptions;
use crate::primitives::SideConvention;
use crate::source::FolderLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub struct GeometryConfig {
    #[serde(default)]
    pub side_convention: SideConvention,
}

/// What a level batch does after one level fails to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    Skip,
    Stop,
}

impl FailurePolicy {
    pub fn label(self) -> &'static str {
        match self {
            FailurePolicy::Skip => "skip",
            FailurePolicy::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct BatchConfig {
    /// Worker threads; unset picks from available parallelism.
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub level_failure: FailurePolicy,
}

impl BatchConfig {
    pub fn worker_count(&self) -> usize {
        match self.workers {
            Some(count) => count.max(1),
            None => thread::available_parallelism().map(|n| n.get().clamp(2, 8)).unwrap_or(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_directory")]
    pub directory: PathBuf,
    #[serde(default = "OutputConfig::default_copy_textures")]
    pub copy_textures: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { directory: Self::default_directory(), copy_textures: Self::default_copy_textures() }
    }
}

impl OutputConfig {
    fn default_directory() -> PathBuf {
        PathBuf::from("exported")
    }

    const fn default_copy_textures() -> bool {
        true
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ExportConfig {
    #[serde(default)]
    pub folders: FolderLayout,
    #[serde(default)]
    pub geometry: GeometryConfig,
    #[serde(default)]
    pub billboard: BillboardStyle,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportOverrides {
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub side_convention: Option<SideConvention>,
    pub level_failure: Option<FailurePolicy>,
    pub copy_textures: Option<bool>,
}

impl ExportConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn apply_overrides(&mut self, overrides: &ExportOverrides) {
        if let Some(dir) = &overrides.output_dir {
            self.output.directory = dir.clone();
        }
        if let Some(workers) = overrides.workers {
            self.batch.workers = Some(workers);
        }
        if let Some(convention) = overrides.side_convention {
            self.geometry.side_convention = convention;
        }
        if let Some(policy) = overrides.level_failure {
            self.batch.level_failure = policy;
        }
        if let Some(copy) = overrides.copy_textures {
            self.output.copy_textures = copy;
        }
    }

    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions { side_convention: self.geometry.side_convention, billboard: self.billboard }
    }
}

impl ExportOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.output_dir.is_some() {
            fields.push("output_dir");
        }
        if self.workers.is_some() {
            fields.push("workers");
        }
        if self.side_convention.is_some() {
            fields.push("side_convention");
        }
        if self.level_failure.is_some() {
            fields.push("level_failure");
        }
        if self.copy_textures.is_some() {
            fields.push("copy_textures");
        }
        fields
    }
}
