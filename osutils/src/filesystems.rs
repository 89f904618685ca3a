use std::fmt;

use crate::dependencies::Dependency;

/// Revision of the ext filesystem family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtRevision {
    Ext2,
    Ext3,
    Ext4,
}

/// Filesystem found on a partition, as far as growing it is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSystemKind {
    Ext(ExtRevision),
    Xfs,
    Btrfs,
    /// Anything else, including no filesystem at all. Holds the detected name, if there was one.
    Unknown(Option<String>),
}

impl FileSystemKind {
    /// Maps a filesystem type name as reported by lsblk or blkid.
    pub fn from_name(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return FileSystemKind::Unknown(None);
        };

        match name.to_ascii_lowercase().as_str() {
            "ext2" => FileSystemKind::Ext(ExtRevision::Ext2),
            "ext3" => FileSystemKind::Ext(ExtRevision::Ext3),
            "ext4" => FileSystemKind::Ext(ExtRevision::Ext4),
            "xfs" => FileSystemKind::Xfs,
            "btrfs" => FileSystemKind::Btrfs,
            _ => FileSystemKind::Unknown(Some(name.to_string())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FileSystemKind::Ext(ExtRevision::Ext2) => "ext2",
            FileSystemKind::Ext(ExtRevision::Ext3) => "ext3",
            FileSystemKind::Ext(ExtRevision::Ext4) => "ext4",
            FileSystemKind::Xfs => "xfs",
            FileSystemKind::Btrfs => "btrfs",
            FileSystemKind::Unknown(Some(name)) => name,
            FileSystemKind::Unknown(None) => "unknown",
        }
    }

    /// Whether the filesystem can be grown while mounted.
    pub fn supports_online_resize(&self) -> bool {
        match self {
            FileSystemKind::Ext(ExtRevision::Ext4) | FileSystemKind::Xfs | FileSystemKind::Btrfs => {
                true
            }
            FileSystemKind::Ext(ExtRevision::Ext2 | ExtRevision::Ext3)
            | FileSystemKind::Unknown(_) => false,
        }
    }

    /// Whether the grow tool works on a mount point rather than on the block device, so the
    /// filesystem must be mounted to be grown.
    pub fn requires_mount(&self) -> bool {
        match self {
            FileSystemKind::Xfs | FileSystemKind::Btrfs => true,
            FileSystemKind::Ext(_) | FileSystemKind::Unknown(_) => false,
        }
    }

    /// Tools needed to check and grow this filesystem.
    pub fn required_dependencies(&self) -> &'static [Dependency] {
        match self {
            FileSystemKind::Ext(_) => &[Dependency::E2fsck, Dependency::Resize2fs],
            FileSystemKind::Xfs => &[Dependency::XfsGrowfs],
            FileSystemKind::Btrfs => &[Dependency::Btrfs],
            FileSystemKind::Unknown(_) => &[],
        }
    }
}

impl fmt::Display for FileSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(
            FileSystemKind::from_name(Some("ext4")),
            FileSystemKind::Ext(ExtRevision::Ext4)
        );
        assert_eq!(
            FileSystemKind::from_name(Some("EXT3")),
            FileSystemKind::Ext(ExtRevision::Ext3)
        );
        assert_eq!(
            FileSystemKind::from_name(Some("ext2\n")),
            FileSystemKind::Ext(ExtRevision::Ext2)
        );
        assert_eq!(FileSystemKind::from_name(Some("xfs")), FileSystemKind::Xfs);
        assert_eq!(FileSystemKind::from_name(Some("btrfs")), FileSystemKind::Btrfs);
        assert_eq!(
            FileSystemKind::from_name(Some("vfat")),
            FileSystemKind::Unknown(Some("vfat".into()))
        );
        assert_eq!(FileSystemKind::from_name(Some("  ")), FileSystemKind::Unknown(None));
        assert_eq!(FileSystemKind::from_name(None), FileSystemKind::Unknown(None));
    }

    #[test]
    fn test_capabilities() {
        let ext4 = FileSystemKind::Ext(ExtRevision::Ext4);
        let ext3 = FileSystemKind::Ext(ExtRevision::Ext3);
        let ext2 = FileSystemKind::Ext(ExtRevision::Ext2);
        let unknown = FileSystemKind::Unknown(Some("ntfs".into()));

        assert!(ext4.supports_online_resize());
        assert!(FileSystemKind::Xfs.supports_online_resize());
        assert!(FileSystemKind::Btrfs.supports_online_resize());
        assert!(!ext3.supports_online_resize());
        assert!(!ext2.supports_online_resize());
        assert!(!unknown.supports_online_resize());

        assert!(FileSystemKind::Xfs.requires_mount());
        assert!(FileSystemKind::Btrfs.requires_mount());
        assert!(!ext4.requires_mount());
        assert!(!unknown.requires_mount());

        assert_eq!(unknown.to_string(), "ntfs");
        assert_eq!(FileSystemKind::Unknown(None).to_string(), "unknown");
        assert_eq!(ext4.to_string(), "ext4");
        assert_eq!(
            ext3.required_dependencies(),
            &[Dependency::E2fsck, Dependency::Resize2fs]
        );
        assert!(unknown.required_dependencies().is_empty());
    }
}
