use std::path::Path;

use anyhow::{Context, Error};

use partgrow_api::constants::E2FSCK_EXIT_ERRORS_CORRECTED;

use crate::dependencies::{Dependency, OutputLine};

/// Runs e2fsck on the file system on the block device to fix errors, reporting progress
/// through `on_output`.
pub fn fix(block_device_path: &Path, on_output: impl FnMut(OutputLine)) -> Result<(), Error> {
    let output = Dependency::E2fsck
        .cmd()
        .arg("-f")
        .arg("-y")
        .args(["-C", "0"])
        .arg(block_device_path)
        .stream(on_output)?;

    // Output code 1 indicates that the file system had errors but they were corrected.
    if output.code() == Some(E2FSCK_EXIT_ERRORS_CORRECTED) {
        return Ok(());
    }

    output.check().context("Failed to execute e2fsck")
}
