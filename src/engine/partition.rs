use log::{info, warn};

use partgrow_api::error::{GrowError, GrowResultExt, ReportError, ToolError};

use super::{host::Host, preflight, GrowPlan, Target};

/// Moves the end of the target partition as planned.
///
/// The mount policy is enforced again here, so a mounted root or boot partition is only touched
/// with `force`. Active swap on the partition is disabled first.
pub fn extend_partition(
    host: &impl Host,
    target: &Target,
    plan: &GrowPlan,
    force: bool,
) -> Result<(), GrowError> {
    if let Some(mount_point) = preflight::check_mount_policy(target, force)? {
        warn!(
            "Resizing '{}' while it is mounted at '{}' because --force was given",
            target.partition.display(),
            mount_point.display()
        );
    }

    disable_swap(host, target)?;

    info!(
        "Resizing partition {} of '{}' to end at {}",
        target.number,
        target.device.display(),
        plan.end
    );
    host.resize_partition(&target.device, target.number, plan.end, target.is_mounted())
        .structured(ToolError::PartitionResize {
            partition: target.partition.display().to_string(),
        })?;

    if let Err(e) = host.settle() {
        warn!(
            "Failed to wait for udev after resizing '{}': {e:?}",
            target.partition.display()
        );
    }

    Ok(())
}

fn disable_swap(host: &impl Host, target: &Target) -> Result<(), GrowError> {
    let swap_error = || ToolError::Swapoff {
        partition: target.partition.display().to_string(),
    };

    let swaps = host
        .active_swaps()
        .structured(swap_error())
        .message("Failed to list active swap spaces")?;

    for swap in swaps.iter().filter(|swap| swap.name == target.partition) {
        warn!("Disabling active swap on '{}'", swap.name.display());
        host.swapoff(&swap.name).structured(swap_error())?;
    }

    Ok(())
}
