use log::{info, warn};

use osutils::filesystems::{ExtRevision, FileSystemKind};
use partgrow_api::error::{GrowError, GrowResultExt, ReportError, StateConflictError, ToolError};

use super::{host::Host, progress, Target};

/// Grows the filesystem on the target partition to fill the partition.
///
/// ext filesystems are checked first unless they are being grown online. xfs and btrfs are grown
/// through their mount point. Unknown filesystems are left alone and reported as an error, since
/// the partition underneath them has already been grown by then.
pub fn extend_filesystem(host: &impl Host, target: &Target, verbose: bool) -> Result<(), GrowError> {
    let partition = &target.partition;
    let resize_error = || ToolError::FilesystemResize {
        partition: partition.display().to_string(),
        filesystem: target.kind.to_string(),
    };

    match &target.kind {
        FileSystemKind::Ext(revision) => {
            let online = target.is_mounted();
            if online && *revision != ExtRevision::Ext4 {
                return Err(GrowError::new(StateConflictError::RequiresUnmount {
                    partition: partition.display().to_string(),
                    filesystem: target.kind.to_string(),
                }));
            }

            if online {
                warn!(
                    "'{}' is mounted, skipping the filesystem check and growing it online",
                    partition.display()
                );
            } else {
                progress::run_step(verbose, "Checking filesystem", |on_output| {
                    host.check_ext(partition, on_output)
                })
                .structured(ToolError::FilesystemCheck {
                    partition: partition.display().to_string(),
                })?;
            }

            progress::run_step(verbose, "Growing filesystem", |on_output| {
                host.resize_ext(partition, online, on_output)
            })
            .structured(resize_error())?;
        }
        FileSystemKind::Xfs | FileSystemKind::Btrfs => {
            let Some(mount_point) = target.mount_point() else {
                return Err(GrowError::new(StateConflictError::RequiresMount {
                    partition: partition.display().to_string(),
                    filesystem: target.kind.to_string(),
                }));
            };

            progress::run_step(verbose, "Growing filesystem", |on_output| {
                if target.kind == FileSystemKind::Xfs {
                    host.grow_xfs(mount_point, on_output)
                } else {
                    host.grow_btrfs(mount_point, on_output)
                }
            })
            .structured(resize_error())?;
        }
        FileSystemKind::Unknown(_) => {
            return Err(GrowError::new(StateConflictError::UnknownFilesystem {
                partition: partition.display().to_string(),
                filesystem: target.kind.to_string(),
            }))
            .message("The partition was grown but its filesystem was not");
        }
    }

    info!(
        "Grew {} filesystem on '{}'",
        target.kind,
        partition.display()
    );
    Ok(())
}
