use std::path::Path;

use anyhow::{Context, Error};

use crate::dependencies::Dependency;

/// Exit code blkid uses when the requested tag could not be found on the device.
const BLKID_EXIT_NOT_FOUND: i32 = 2;

fn run(device_path: impl AsRef<Path>, tag: &str) -> Result<Option<String>, Error> {
    let output = Dependency::Blkid
        .cmd()
        .arg("-o") // output format
        .arg("value") // single value
        .arg("-s") // tag
        .arg(tag)
        .arg(device_path.as_ref())
        .output()?;

    if output.code() == Some(BLKID_EXIT_NOT_FOUND) {
        return Ok(None);
    }

    let value = output.check_output().context("Failed to execute blkid")?;
    Ok(Some(value.trim().to_owned()).filter(|v| !v.is_empty()))
}

/// Gets the filesystem type of the device, or `None` if blkid does not recognize one.
pub fn get_filesystem_type(device_path: impl AsRef<Path>) -> Result<Option<String>, Error> {
    run(device_path, "TYPE")
}
