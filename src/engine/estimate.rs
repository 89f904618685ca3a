use osutils::filesystems::FileSystemKind;

use partgrow_api::constants::MIB_PER_GIB;

/// Minutes an ext resize takes per 100 GiB of growth, roughly.
const EXT_MINUTES_PER_100_GIB: u64 = 2;

/// Human readable estimate of how long growing a filesystem of the given kind by `size_mib`
/// takes.
pub fn estimate_resize_time(kind: &FileSystemKind, size_mib: u64) -> String {
    match kind {
        FileSystemKind::Ext(_) => {
            let minutes = size_mib.saturating_mul(EXT_MINUTES_PER_100_GIB) / (100 * MIB_PER_GIB);
            match minutes {
                0 => "less than a minute".into(),
                1 => "about 1 minute".into(),
                n => format!("about {n} minutes"),
            }
        }
        FileSystemKind::Xfs | FileSystemKind::Btrfs => "a few seconds to a few minutes".into(),
        FileSystemKind::Unknown(_) => "unknown".into(),
    }
}
