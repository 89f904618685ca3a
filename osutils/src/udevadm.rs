use anyhow::{Context, Error};

use crate::dependencies::Dependency;

/// Waits until udev has processed all queued events, e.g. after a partition table change.
pub fn settle() -> Result<(), Error> {
    Dependency::Udevadm
        .cmd()
        .arg("settle")
        .run_and_check()
        .context("Failed settle udev setup")
}
