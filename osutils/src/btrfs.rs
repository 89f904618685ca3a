use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::{Dependency, OutputLine};

/// Grows the mounted btrfs filesystem to fill its block device.
pub fn resize_max(mount_point: &Path, on_output: impl FnMut(OutputLine)) -> Result<(), Error> {
    Dependency::Btrfs
        .cmd()
        .args(["filesystem", "resize", "max"])
        .arg(mount_point)
        .stream(on_output)?
        .check()
        .with_context(|| {
            format!(
                "Failed to execute btrfs filesystem resize on '{}'",
                mount_point.display()
            )
        })
}
