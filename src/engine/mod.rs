use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use strum_macros::IntoStaticStr;

use osutils::{
    filesystems::FileSystemKind,
    parted::{PartedDisk, PartedPartition, PartitionEnd},
};
use partgrow_api::{
    constants::{BOOT_MOUNT_POINT_PATH, MIB, ROOT_MOUNT_POINT_PATH},
    error::{GrowError, GrowResultExt, InternalError, ReportError, StateConflictError, ToolError},
    GrowSize,
};

use crate::report::Report;

// Pipeline stages
pub mod estimate;
pub mod filesystem;
pub mod inspect;
pub mod partition;
pub mod preflight;

// Helper modules
pub mod host;
#[cfg(test)]
pub(crate) mod mock;
pub mod progress;

pub use estimate::estimate_resize_time;
pub use filesystem::extend_filesystem;
pub use host::{Host, LiveHost};
pub use inspect::{detect_filesystem, detect_main_partition, get_unallocated_space};
pub use partition::extend_partition;

/// How a grow should be carried out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendOptions {
    /// How much of the unallocated space to use.
    pub size: GrowSize,

    /// Skip the confirmation prompt.
    pub assume_yes: bool,

    /// Pass tool output through instead of showing a spinner.
    pub verbose: bool,

    /// Allow growing a mounted root or boot partition, or a partition whose filesystem is not
    /// recognized.
    pub force: bool,

    /// Stop after planning.
    pub dry_run: bool,
}

/// How a run that did not fail ended.
#[derive(Debug, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Outcome {
    /// Partition and filesystem were grown.
    Extended,

    /// There was no unallocated space to grow into.
    NothingToDo,

    /// The operator declined the confirmation prompt.
    Cancelled,

    /// The plan was printed and nothing was changed.
    DryRun,

    /// The partition was grown but its filesystem was not.
    PartiallyExtended(GrowError),
}

impl Outcome {
    /// Whether the run should exit successfully.
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::PartiallyExtended(_))
    }
}

/// The partition being grown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Whole device holding the partition table.
    pub device: PathBuf,

    pub partition: PathBuf,

    /// Partition number in the partition table.
    pub number: u32,

    pub kind: FileSystemKind,

    pub mountpoints: Vec<PathBuf>,
}

impl Target {
    pub fn is_mounted(&self) -> bool {
        !self.mountpoints.is_empty()
    }

    /// Mount point used to grow filesystems that are grown through one.
    pub fn mount_point(&self) -> Option<&Path> {
        self.mountpoints.first().map(PathBuf::as_path)
    }

    /// Root or boot mount point of the partition, if it has one.
    pub fn system_mount_point(&self) -> Option<&Path> {
        self.mountpoints
            .iter()
            .map(PathBuf::as_path)
            .find(|mount_point| {
                *mount_point == Path::new(ROOT_MOUNT_POINT_PATH)
                    || mount_point.starts_with(BOOT_MOUNT_POINT_PATH)
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowPlan {
    /// Amount the partition grows by, in MiB.
    pub grow_mib: u64,

    /// New end of the partition.
    pub end: PartitionEnd,
}

/// Turns the requested size into a concrete new partition end.
///
/// Returns `None` when the request resolves to zero MiB. Requests larger than the unallocated
/// space, or than the free region directly after the partition, are rejected.
pub fn plan_growth(
    size: GrowSize,
    layout: &PartedDisk,
    partition: &PartedPartition,
    partition_path: &Path,
) -> Result<Option<GrowPlan>, GrowError> {
    let unallocated_mib = get_unallocated_space(layout);
    let trailing = layout.free_region_after(partition);
    let trailing_mib = trailing.map_or(0, |region| region.size / MIB);
    let no_trailing_space = |requested_mib| {
        GrowError::new(StateConflictError::NoTrailingSpace {
            partition: partition_path.display().to_string(),
            requested_mib,
            trailing_mib,
        })
    };

    if size.is_all() {
        let Some(region) = trailing.filter(|_| trailing_mib > 0) else {
            return Err(no_trailing_space(unallocated_mib));
        };
        if trailing_mib < unallocated_mib {
            warn!(
                "Only {trailing_mib} of the {unallocated_mib} MiB of unallocated space directly \
                follows '{}'",
                partition_path.display()
            );
        }

        let end = if layout.is_trailing(region) {
            PartitionEnd::EndOfDevice
        } else {
            PartitionEnd::Byte(region.end)
        };
        return Ok(Some(GrowPlan {
            grow_mib: trailing_mib,
            end,
        }));
    }

    let requested_mib = size.resolve(unallocated_mib);
    if requested_mib > unallocated_mib {
        return Err(GrowError::new(StateConflictError::ExceedsUnallocated {
            requested_mib,
            available_mib: unallocated_mib,
        }));
    }
    if requested_mib == 0 {
        return Ok(None);
    }
    if requested_mib > trailing_mib {
        return Err(no_trailing_space(requested_mib));
    }

    Ok(Some(GrowPlan {
        grow_mib: requested_mib,
        end: PartitionEnd::grown_by(partition, requested_mib),
    }))
}

/// Runs the grow pipeline against one device and records what it finds in a report.
pub struct Extender<'a, H: Host> {
    host: &'a H,
    options: &'a ExtendOptions,
    report: Report,
}

impl<'a, H: Host> Extender<'a, H> {
    pub fn new(host: &'a H, options: &'a ExtendOptions) -> Self {
        Extender {
            host,
            options,
            report: Report::default(),
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    /// Grows the largest partition of `device`, then its filesystem.
    ///
    /// Every check that can reject the request runs before the first change to the device. Once
    /// the partition has been grown, a filesystem failure is reported as
    /// [`Outcome::PartiallyExtended`] rather than as an error.
    pub fn run(&mut self, device: &Path) -> Result<Outcome, GrowError> {
        debug!("Options: {:?}", self.options);
        self.report.device = Some(device.to_path_buf());

        preflight::validate_environment(self.host, device)?;

        let query_error = || ToolError::QueryDevice {
            device: device.display().to_string(),
        };

        let tree = self
            .host
            .block_device(device)
            .structured(query_error())
            .message("Failed to list partitions")?;
        let partition = detect_main_partition(device, &tree)?;
        let target = Target {
            device: device.to_path_buf(),
            partition: partition.name.clone(),
            number: inspect::partition_number(&partition.name)?,
            kind: detect_filesystem(self.host, partition),
            mountpoints: partition.mountpoints.clone(),
        };
        self.report.partition = Some(target.partition.clone());
        self.report.filesystem = Some(target.kind.to_string());
        self.report.mount_points = target.mountpoints.clone();
        info!(
            "Largest partition on '{}' is '{}' ({} MiB, {})",
            device.display(),
            target.partition.display(),
            partition.size / MIB,
            target.kind
        );

        let layout = self
            .host
            .partition_table(device)
            .structured(query_error())
            .message("Failed to read partition table")?;
        let unallocated_mib = get_unallocated_space(&layout);
        self.report.unallocated_mib = Some(unallocated_mib);
        if unallocated_mib == 0 {
            info!(
                "No unallocated space on '{}', nothing to do",
                device.display()
            );
            return Ok(Outcome::NothingToDo);
        }
        info!("Unallocated space on '{}': {unallocated_mib} MiB", device.display());

        let parted_partition = layout
            .partition(target.number)
            .structured(query_error())
            .message(format!(
                "Partition {} is missing from the partition table",
                target.number
            ))?;

        let Some(plan) = plan_growth(
            self.options.size,
            &layout,
            parted_partition,
            &target.partition,
        )?
        else {
            info!(
                "{} of {unallocated_mib} MiB is less than 1 MiB, nothing to do",
                self.options.size
            );
            return Ok(Outcome::NothingToDo);
        };
        self.report.requested_mib = Some(plan.grow_mib);

        preflight::check_mount_policy(&target, self.options.force)?;
        preflight::check_dependencies(self.host, target.kind.required_dependencies())?;

        let estimate = estimate_resize_time(&target.kind, plan.grow_mib);
        info!(
            "Plan: grow '{}' by {} MiB to end at {}, then grow its {} filesystem \
            (estimated time: {estimate})",
            target.partition.display(),
            plan.grow_mib,
            plan.end,
            target.kind
        );
        self.report.estimated_duration = Some(estimate);

        if self.options.dry_run {
            info!("Dry run, no changes were made");
            return Ok(Outcome::DryRun);
        }

        if !self.options.assume_yes {
            let prompt = format!(
                "Grow partition '{}' by {} MiB and resize its {} filesystem?",
                target.partition.display(),
                plan.grow_mib,
                target.kind
            );
            if !self
                .host
                .confirm(&prompt)
                .structured(InternalError::Confirmation)?
            {
                info!("Cancelled, no changes were made");
                return Ok(Outcome::Cancelled);
            }
        }

        extend_partition(self.host, &target, &plan, self.options.force)?;

        match extend_filesystem(self.host, &target, self.options.verbose) {
            Ok(()) => {
                info!(
                    "Grew '{}' and its filesystem by {} MiB",
                    target.partition.display(),
                    plan.grow_mib
                );
                Ok(Outcome::Extended)
            }
            Err(e) => Ok(Outcome::PartiallyExtended(e)),
        }
    }
}
