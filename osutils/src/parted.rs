//! Module for interacting with `parted`.
//!
//! Device layout is read from the machine-parseable output of `parted -m unit B print free`,
//! which for a disk with one partition and trailing free space looks like:
//!
//! ```text
//! BYT;
//! /dev/sdb:21474836480B:scsi:512:512:gpt:VMware Virtual disk:;
//! 1:17408B:1048575B:1031168B:free;
//! 1:1048576B:10486808575B:10485760000B:ext4::;
//! 1:10486808576B:21474819583B:10988011008B:free;
//! ```
//!
//! The first line names the unit, the second describes the disk and every following line is
//! either a partition (`number:start:end:size:filesystem:name:flags;`) or a free region
//! (`number:start:end:size:free;`). Offsets are inclusive.

use std::{fmt, path::Path};

use anyhow::{bail, ensure, Context, Error};

use partgrow_api::constants::{MIB, PARTED_END_OF_DEVICE};

use crate::dependencies::Dependency;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartedDisk {
    pub partitions: Vec<PartedPartition>,

    pub free: Vec<FreeRegion>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartedPartition {
    pub number: u32,

    /// First byte of the partition
    pub start: u64,

    /// Last byte of the partition
    pub end: u64,

    /// Size in bytes
    pub size: u64,

    pub filesystem: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeRegion {
    pub start: u64,
    pub end: u64,
    pub size: u64,
}

impl PartedDisk {
    /// Reads the partition table and the free regions of the device.
    pub fn read(device_path: impl AsRef<Path>) -> Result<Self, Error> {
        let output = Dependency::Parted
            .cmd()
            .arg("--machine")
            .arg("--script")
            .arg(device_path.as_ref())
            .args(["unit", "B", "print", "free"])
            .output_and_check()
            .with_context(|| {
                format!(
                    "Failed to read partition table of '{}'",
                    device_path.as_ref().display()
                )
            })?;

        Self::parse(&output).with_context(|| {
            format!(
                "Failed to parse partition table of '{}'",
                device_path.as_ref().display()
            )
        })
    }

    /// Parses the output of `parted -m unit B print free`.
    pub fn parse(output: &str) -> Result<Self, Error> {
        let mut lines = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| line.strip_suffix(';').unwrap_or(line));

        let unit = lines.next().context("Missing unit line")?;
        ensure!(unit == "BYT", "Unexpected unit line '{unit}', expected 'BYT'");

        let disk_line = lines.next().context("Missing disk line")?;
        let disk_fields = disk_line.split(':').collect::<Vec<_>>();
        ensure!(
            disk_fields.len() >= 6,
            "Unexpected disk line '{disk_line}'"
        );

        parse_bytes(disk_fields[1])?;

        let mut disk = PartedDisk::default();

        for line in lines {
            let fields = line.split(':').collect::<Vec<_>>();
            ensure!(fields.len() >= 5, "Unexpected partition line '{line}'");

            let start = parse_bytes(fields[1])?;
            let end = parse_bytes(fields[2])?;
            let size = parse_bytes(fields[3])?;

            if fields.len() == 5 && fields[4] == "free" {
                disk.free.push(FreeRegion { start, end, size });
                continue;
            }

            disk.partitions.push(PartedPartition {
                number: fields[0]
                    .parse()
                    .with_context(|| format!("Invalid partition number '{}'", fields[0]))?,
                start,
                end,
                size,
                filesystem: Some(fields[4].to_string()).filter(|fs| !fs.is_empty()),
            });
        }

        Ok(disk)
    }

    pub fn partition(&self, number: u32) -> Option<&PartedPartition> {
        self.partitions.iter().find(|p| p.number == number)
    }

    /// Unallocated space in whole MiB. Each free region is rounded down on its own, so the
    /// sub-MiB alignment gaps parted reports around partitions do not add up to usable space.
    pub fn unallocated_mib(&self) -> u64 {
        self.free.iter().map(|region| region.size / MIB).sum()
    }

    /// Free region that starts directly after the given partition, if any.
    pub fn free_region_after(&self, partition: &PartedPartition) -> Option<&FreeRegion> {
        self.free
            .iter()
            .find(|region| region.start == partition.end + 1)
    }

    /// Whether no partition starts after the given free region.
    pub fn is_trailing(&self, region: &FreeRegion) -> bool {
        self.partitions.iter().all(|p| p.start < region.start)
    }
}

fn parse_bytes(field: &str) -> Result<u64, Error> {
    let Some(number) = field.strip_suffix('B') else {
        bail!("Expected a byte value, got '{field}'");
    };
    number
        .parse()
        .with_context(|| format!("Invalid byte value '{field}'"))
}

/// New end of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionEnd {
    /// Up to the end of the device.
    EndOfDevice,

    /// An absolute, inclusive byte offset.
    Byte(u64),
}

impl PartitionEnd {
    /// End offset of a partition grown by the given amount of MiB.
    pub fn grown_by(partition: &PartedPartition, mib: u64) -> Self {
        PartitionEnd::Byte(partition.end + mib * MIB)
    }
}

impl fmt::Display for PartitionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionEnd::EndOfDevice => f.write_str(PARTED_END_OF_DEVICE),
            PartitionEnd::Byte(byte) => write!(f, "{byte}B"),
        }
    }
}

/// Moves the end of a partition. When the partition is in use, parted asks for confirmation
/// even in script mode, so the question is answered through a pretended terminal instead.
pub fn resize_partition(
    device_path: impl AsRef<Path>,
    number: u32,
    end: PartitionEnd,
    in_use: bool,
) -> Result<(), Error> {
    let mut cmd = Dependency::Parted.cmd();
    if in_use {
        // Three dashes: parted's hidden option for reading answers from stdin.
        cmd.arg("---pretend-input-tty").input("Yes\n");
    } else {
        cmd.arg("--script");
    }

    cmd.arg(device_path.as_ref())
        .args(["unit", "B", "resizepart"])
        .arg(number.to_string())
        .arg(end.to_string())
        .run_and_check()
        .with_context(|| {
            format!(
                "Failed to resize partition {number} of '{}' to end at {end}",
                device_path.as_ref().display()
            )
        })
}
