pub mod blkid;
pub mod btrfs;
pub mod dependencies;
pub mod e2fsck;
pub mod filesystems;
pub mod lsblk;
pub mod parted;
pub mod resize2fs;
pub mod swap;
pub mod udevadm;
pub mod xfs_growfs;
