use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::{Dependency, OutputLine};

/// Grows the mounted XFS filesystem to fill its block device.
pub fn run(mount_point: &Path, on_output: impl FnMut(OutputLine)) -> Result<(), Error> {
    Dependency::XfsGrowfs
        .cmd()
        .arg(mount_point)
        .stream(on_output)?
        .check()
        .with_context(|| {
            format!(
                "Failed to execute xfs_growfs on '{}'",
                mount_point.display()
            )
        })
}
