use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;

use partgrow_api::{error::GrowError, GrowSize};

use crate::{engine::ExtendOptions, PARTGROW_VERSION};

#[derive(Parser, Debug)]
#[clap(
    version = PARTGROW_VERSION,
    about = "Grow the largest partition of a block device, and its filesystem, into unallocated space"
)]
pub struct Cli {
    /// Block device holding the partition to grow, e.g. /dev/sdb
    pub device: PathBuf,

    /// How much unallocated space to use: a percentage (50%), an absolute size (10G, 500M) or
    /// "all". Sizes without a unit are MiB
    #[arg(short, long, value_name = "SIZE")]
    pub size: Option<String>,

    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes")]
    pub assume_yes: bool,

    /// Show the output of the underlying tools instead of a spinner
    #[arg(short, long)]
    pub verbose: bool,

    /// Allow growing a mounted root or boot partition, or a partition with an unrecognized
    /// filesystem
    #[arg(short, long)]
    pub force: bool,

    /// Inspect the device and print the plan without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Path to save a YAML report of the run
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]. Defaults to INFO, or DEBUG with
    /// --verbose
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<LevelFilter>,
}

impl Cli {
    pub fn log_level(&self) -> LevelFilter {
        match self.log_level {
            Some(level) => level,
            None if self.verbose => LevelFilter::Debug,
            None => LevelFilter::Info,
        }
    }

    /// Options for the grow, with the size specification parsed.
    pub fn options(&self) -> Result<ExtendOptions, GrowError> {
        let size = match &self.size {
            Some(spec) => spec.parse()?,
            None => GrowSize::All,
        };

        Ok(ExtendOptions {
            size,
            assume_yes: self.assume_yes,
            verbose: self.verbose,
            force: self.force,
            dry_run: self.dry_run,
        })
    }
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PartgrowExitCode {
    /// Grown, nothing to do, cancelled or dry run.
    Success = 0,

    /// Anything else, including a grown partition whose filesystem could not be grown.
    Failure = 1,
}

impl From<PartgrowExitCode> for std::process::ExitCode {
    fn from(code: PartgrowExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
