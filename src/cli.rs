use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use crate::batch::BatchKind;
use crate::config::{ExportOverrides, FailurePolicy};
use crate::primitives::SideConvention;

#[derive(Debug, Clone, Parser)]
#[command(name = "trile_export")]
#[command(about = "Convert art object, trile set and level XML into OBJ/MTL files")]
pub struct Cli {
    /// Kind of asset the inputs contain
    #[arg(value_enum)]
    pub kind: BatchKind,

    /// XML files or folders holding them
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output folder
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long)]
    pub workers: Option<usize>,

    /// Mapping from vertex side index to normal direction
    #[arg(long, value_enum)]
    pub side_convention: Option<SideConvention>,

    /// Stop dispatching levels after the first one fails
    #[arg(long)]
    pub stop_on_level_failure: bool,

    /// Do not copy referenced textures next to the output
    #[arg(long)]
    pub no_textures: bool,

    /// More log output (repeat for trace)
    #[arg(long, short, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(long, short)]
    pub quiet: bool,
}

impl Cli {
    pub fn config_overrides(&self) -> ExportOverrides {
        ExportOverrides {
            output_dir: self.out.clone(),
            workers: self.workers,
            side_convention: self.side_convention,
            level_failure: self.stop_on_level_failure.then_some(FailurePolicy::Stop),
            copy_textures: self.no_textures.then_some(false),
        }
    }

    pub fn log_level(&self) -> Level {
        if self.quiet {
            return Level::WARN;
        }
        match self.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_kind_inputs_and_overrides() {
        let cli = Cli::try_parse_from([
            "trile_export",
            "levels",
            "content/levels",
            "--out",
            "exported",
            "--workers",
            "3",
            "--side-convention",
            "negative_first",
            "--stop-on-level-failure",
            "--no-textures",
        ])
        .expect("parse cli");
        assert_eq!(cli.kind, BatchKind::Levels);
        assert_eq!(cli.inputs, vec![PathBuf::from("content/levels")]);
        let overrides = cli.config_overrides();
        assert_eq!(overrides.output_dir, Some(PathBuf::from("exported")));
        assert_eq!(overrides.workers, Some(3));
        assert_eq!(overrides.side_convention, Some(SideConvention::NegativeFirst));
        assert_eq!(overrides.level_failure, Some(FailurePolicy::Stop));
        assert_eq!(overrides.copy_textures, Some(false));
    }

    #[test]
    fn flags_left_out_do_not_override() {
        let cli = Cli::try_parse_from(["trile_export", "art-objects", "a.xml", "b.xml"]).expect("parse cli");
        assert_eq!(cli.kind, BatchKind::ArtObjects);
        assert!(cli.config_overrides().is_empty());
        assert_eq!(cli.log_level(), Level::INFO);
    }

    #[test]
    fn verbosity_flags() {
        let cli = Cli::try_parse_from(["trile_export", "trile-sets", "sets", "-vv"]).expect("parse cli");
        assert_eq!(cli.log_level(), Level::TRACE);
        let cli = Cli::try_parse_from(["trile_export", "trile-sets", "sets", "-q"]).expect("parse cli");
        assert_eq!(cli.log_level(), Level::WARN);
    }

    #[test]
    fn rejects_unknown_kind_and_missing_inputs() {
        assert!(Cli::try_parse_from(["trile_export", "textures", "dir"]).is_err());
        assert!(Cli::try_parse_from(["trile_export", "levels"]).is_err());
    }
}
