//! Checks that run before anything on the device is modified.

use std::path::Path;

use log::debug;

use osutils::{dependencies::Dependency, filesystems::FileSystemKind};
use partgrow_api::error::{ExecutionEnvironmentError, GrowError, StateConflictError};

use super::{
    host::{DeviceNode, Host},
    Target,
};

/// Tools needed regardless of the filesystem.
pub const BASE_DEPENDENCIES: &[Dependency] = &[
    Dependency::Lsblk,
    Dependency::Parted,
    Dependency::Blkid,
    Dependency::Swapon,
    Dependency::Swapoff,
];

/// Verifies that partgrow runs as root, that the base tools are installed and that `device` is
/// an existing block device.
pub fn validate_environment(host: &impl Host, device: &Path) -> Result<(), GrowError> {
    if !host.is_root() {
        return Err(GrowError::new(
            ExecutionEnvironmentError::MissingRequiredPermissions,
        ));
    }

    check_dependencies(host, BASE_DEPENDENCIES)?;

    match host.device_node(device) {
        DeviceNode::BlockDevice => Ok(()),
        DeviceNode::Missing => Err(GrowError::new(ExecutionEnvironmentError::DeviceNotFound {
            path: device.display().to_string(),
        })),
        DeviceNode::Other => Err(GrowError::new(
            ExecutionEnvironmentError::NotABlockDevice {
                path: device.display().to_string(),
            },
        )),
    }
}

pub fn check_dependencies(host: &impl Host, dependencies: &[Dependency]) -> Result<(), GrowError> {
    for dependency in dependencies {
        if !host.has_dependency(*dependency) {
            return Err(GrowError::new(ExecutionEnvironmentError::MissingBinary {
                binary: dependency.name(),
            }));
        }
        debug!("Found required binary '{dependency}'");
    }
    Ok(())
}

/// Decides whether the partition may be grown given where it is mounted and what it holds.
///
/// On success, returns the root or boot mount point that `force` overrode, if any.
pub fn check_mount_policy(target: &Target, force: bool) -> Result<Option<&Path>, GrowError> {
    let partition = target.partition.display().to_string();
    let filesystem = target.kind.to_string();

    let system_mount_point = target.system_mount_point();
    if let Some(mount_point) = system_mount_point {
        if !force {
            return Err(GrowError::new(
                StateConflictError::MountedSystemPartition {
                    partition,
                    mount_point: mount_point.display().to_string(),
                },
            ));
        }
    }

    if target.is_mounted() {
        if !target.kind.supports_online_resize() {
            return Err(GrowError::new(StateConflictError::RequiresUnmount {
                partition,
                filesystem,
            }));
        }
    } else if target.kind.requires_mount() {
        return Err(GrowError::new(StateConflictError::RequiresMount {
            partition,
            filesystem,
        }));
    } else if matches!(target.kind, FileSystemKind::Unknown(_)) && !force {
        return Err(GrowError::new(StateConflictError::UnknownFilesystem {
            partition,
            filesystem,
        }));
    }

    Ok(system_mount_point)
}
