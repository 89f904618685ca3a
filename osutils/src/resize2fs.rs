use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::{Dependency, OutputLine};

/// Resize ext* filesystem on the specified block device to fill the entire device.
///
/// Progress output (`-p`) is only supported by resize2fs for offline resizes.
pub fn run(
    block_device_path: &Path,
    online: bool,
    on_output: impl FnMut(OutputLine),
) -> Result<(), Error> {
    let mut cmd = Dependency::Resize2fs.cmd();
    if !online {
        cmd.arg("-p");
    }

    cmd.arg(block_device_path)
        .stream(on_output)?
        .check()
        .context("Failed to execute resize2fs")
}
