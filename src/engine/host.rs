use std::{io::ErrorKind, os::unix::fs::FileTypeExt, path::Path};

use anyhow::{Context, Error};
use dialoguer::Confirm;

use osutils::{
    blkid, btrfs,
    dependencies::{Dependency, OutputLine},
    e2fsck,
    lsblk::{self, BlockDevice},
    parted::{self, PartedDisk, PartitionEnd},
    resize2fs,
    swap::{self, SwapSpace},
    udevadm, xfs_growfs,
};

/// What lives at a device path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceNode {
    Missing,
    /// Exists, but is not a block special file.
    Other,
    BlockDevice,
}

/// Everything the engine needs from the machine it runs on. Queries never change the device;
/// every other method does.
pub trait Host {
    fn is_root(&self) -> bool;

    fn has_dependency(&self, dependency: Dependency) -> bool;

    fn device_node(&self, path: &Path) -> DeviceNode;

    fn block_device(&self, device: &Path) -> Result<BlockDevice, Error>;

    fn filesystem_type(&self, partition: &Path) -> Result<Option<String>, Error>;

    fn partition_table(&self, device: &Path) -> Result<PartedDisk, Error>;

    fn active_swaps(&self) -> Result<Vec<SwapSpace>, Error>;

    /// Asks the operator a yes/no question. Anything but an explicit yes is a no.
    fn confirm(&self, prompt: &str) -> Result<bool, Error>;

    fn swapoff(&self, partition: &Path) -> Result<(), Error>;

    fn resize_partition(
        &self,
        device: &Path,
        number: u32,
        end: PartitionEnd,
        in_use: bool,
    ) -> Result<(), Error>;

    /// Waits for udev to pick up the new partition geometry.
    fn settle(&self) -> Result<(), Error>;

    fn check_ext(
        &self,
        partition: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error>;

    fn resize_ext(
        &self,
        partition: &Path,
        online: bool,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error>;

    fn grow_xfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error>;

    fn grow_btrfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error>;
}

/// The machine partgrow is running on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiveHost;

impl Host for LiveHost {
    fn is_root(&self) -> bool {
        nix::unistd::Uid::effective().is_root()
    }

    fn has_dependency(&self, dependency: Dependency) -> bool {
        dependency.exists()
    }

    fn device_node(&self, path: &Path) -> DeviceNode {
        match std::fs::metadata(path) {
            Ok(metadata) if metadata.file_type().is_block_device() => DeviceNode::BlockDevice,
            Ok(_) => DeviceNode::Other,
            Err(e) if e.kind() == ErrorKind::NotFound => DeviceNode::Missing,
            // Unreadable paths cannot be used either
            Err(_) => DeviceNode::Other,
        }
    }

    fn block_device(&self, device: &Path) -> Result<BlockDevice, Error> {
        lsblk::get(device)
    }

    fn filesystem_type(&self, partition: &Path) -> Result<Option<String>, Error> {
        blkid::get_filesystem_type(partition)
    }

    fn partition_table(&self, device: &Path) -> Result<PartedDisk, Error> {
        PartedDisk::read(device)
    }

    fn active_swaps(&self) -> Result<Vec<SwapSpace>, Error> {
        SwapSpace::read()
    }

    fn confirm(&self, prompt: &str) -> Result<bool, Error> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read confirmation from the terminal")
    }

    fn swapoff(&self, partition: &Path) -> Result<(), Error> {
        swap::swapoff(partition)
    }

    fn resize_partition(
        &self,
        device: &Path,
        number: u32,
        end: PartitionEnd,
        in_use: bool,
    ) -> Result<(), Error> {
        parted::resize_partition(device, number, end, in_use)
    }

    fn settle(&self) -> Result<(), Error> {
        udevadm::settle()
    }

    fn check_ext(
        &self,
        partition: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        e2fsck::fix(partition, on_output)
    }

    fn resize_ext(
        &self,
        partition: &Path,
        online: bool,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        resize2fs::run(partition, online, on_output)
    }

    fn grow_xfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        xfs_growfs::run(mount_point, on_output)
    }

    fn grow_btrfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        btrfs::resize_max(mount_point, on_output)
    }
}

