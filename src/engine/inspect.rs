//! Read-only inspection of the target device.

use std::path::Path;

use log::{debug, warn};

use osutils::{filesystems::FileSystemKind, lsblk::BlockDevice, parted::PartedDisk};
use partgrow_api::error::{GrowError, ReportError, StateConflictError, ToolError};

use super::host::Host;

/// Returns the largest partition of the device. When several partitions share the largest
/// size, the first one listed wins.
pub fn detect_main_partition<'a>(
    device: &Path,
    block_device: &'a BlockDevice,
) -> Result<&'a BlockDevice, GrowError> {
    let mut largest: Option<&BlockDevice> = None;
    for partition in block_device.partitions() {
        debug!(
            "Found partition '{}' of {} bytes",
            partition.name.display(),
            partition.size
        );
        if largest.map_or(true, |current| partition.size > current.size) {
            largest = Some(partition);
        }
    }

    largest.structured(StateConflictError::NoPartitions {
        device: device.display().to_string(),
    })
}

/// Determines the filesystem on a partition. lsblk's answer is used when it has one; otherwise
/// blkid is asked. When neither knows, the filesystem is unknown.
pub fn detect_filesystem(host: &impl Host, partition: &BlockDevice) -> FileSystemKind {
    if let Some(fstype) = partition.fstype.as_deref().filter(|f| !f.trim().is_empty()) {
        return FileSystemKind::from_name(Some(fstype));
    }

    match host.filesystem_type(&partition.name) {
        Ok(fstype) => FileSystemKind::from_name(fstype.as_deref()),
        Err(e) => {
            warn!(
                "Failed to probe filesystem on '{}': {e:?}",
                partition.name.display()
            );
            FileSystemKind::Unknown(None)
        }
    }
}

/// Unallocated space on the device in MiB. Free regions smaller than 1 MiB are not counted.
pub fn get_unallocated_space(layout: &PartedDisk) -> u64 {
    layout.unallocated_mib()
}

/// Partition number encoded at the end of a partition path, e.g. 2 for `/dev/nvme0n1p2`.
pub fn partition_number(partition: &Path) -> Result<u32, GrowError> {
    let query_error = || ToolError::QueryDevice {
        device: partition.display().to_string(),
    };

    let name = partition
        .file_name()
        .and_then(|name| name.to_str())
        .structured(query_error())?;
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();

    name[name.len() - digits..]
        .parse::<u32>()
        .structured(query_error())
}
