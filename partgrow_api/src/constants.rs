use const_format::formatcp;

/// Number of bytes in one MiB. All sizes exchanged between stages are MiB.
pub const MIB: u64 = 1024 * 1024;

/// Number of MiB in one GiB.
pub const MIB_PER_GIB: u64 = 1024;

/// Root mount point.
pub const ROOT_MOUNT_POINT_PATH: &str = "/";

/// Boot directory name.
pub const BOOT_DIRECTORY: &str = "boot";

/// Boot mount point. Anything mounted at or below it counts as a boot mount.
pub const BOOT_MOUNT_POINT_PATH: &str = formatcp!("{ROOT_MOUNT_POINT_PATH}{BOOT_DIRECTORY}");

/// Value passed to `parted resizepart` to grow a partition to the end of the device.
pub const PARTED_END_OF_DEVICE: &str = "100%";

/// Exit code used by e2fsck when errors were found and corrected.
pub const E2FSCK_EXIT_ERRORS_CORRECTED: i32 = 1;
