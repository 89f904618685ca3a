//! A scripted stand-in for the machine, used to exercise the engine without touching devices.
//!
//! The default scenario is `/dev/sdb` with a single unmounted ext4 partition of 10000 MiB,
//! followed by 20000 MiB of unallocated space.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
};

use anyhow::{bail, Error};

use osutils::{
    dependencies::{Dependency, OutputLine, OutputStream},
    lsblk::{BlockDevice, BlockDeviceType},
    parted::{FreeRegion, PartedDisk, PartedPartition, PartitionEnd},
    swap::SwapSpace,
};
use partgrow_api::constants::MIB;

use super::host::{DeviceNode, Host};

pub const DEVICE: &str = "/dev/sdb";
pub const PARTITION: &str = "/dev/sdb1";
pub const PARTITION_MIB: u64 = 10000;
pub const UNALLOCATED_MIB: u64 = 20000;

/// Space parted reports as free in front of the first partition on a GPT disk.
const LEADING_GAP: u64 = MIB - 17408;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FilesystemType(PathBuf),
    Confirm(String),
    Swapoff(PathBuf),
    ResizePartition {
        device: PathBuf,
        number: u32,
        end: PartitionEnd,
        in_use: bool,
    },
    Settle,
    CheckExt(PathBuf),
    ResizeExt {
        partition: PathBuf,
        online: bool,
    },
    GrowXfs(PathBuf),
    GrowBtrfs(PathBuf),
}

impl Call {
    /// Whether the call changes the device.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::FilesystemType(_) | Call::Confirm(_))
    }
}

#[derive(Debug)]
pub struct MockHost {
    root: bool,
    missing: Vec<Dependency>,
    node: DeviceNode,
    block_device: BlockDevice,
    blkid: Result<Option<String>, &'static str>,
    layout: PartedDisk,
    swaps: Vec<SwapSpace>,
    answer: bool,
    failing: Vec<Dependency>,
    calls: RefCell<Vec<Call>>,
}

impl MockHost {
    pub fn new() -> Self {
        let partition_end = MIB + PARTITION_MIB * MIB - 1;
        let trailing_start = partition_end + 1;
        let trailing_end = trailing_start + UNALLOCATED_MIB * MIB - 1;

        MockHost {
            root: true,
            missing: Vec::new(),
            node: DeviceNode::BlockDevice,
            block_device: BlockDevice {
                name: DEVICE.into(),
                blkdev_type: BlockDeviceType::Disk,
                size: trailing_end + 1 + MIB,
                children: vec![BlockDevice {
                    name: PARTITION.into(),
                    blkdev_type: BlockDeviceType::Part,
                    size: PARTITION_MIB * MIB,
                    fstype: Some("ext4".into()),
                    parent_kernel_name: Some(DEVICE.into()),
                    ..Default::default()
                }],
                ..Default::default()
            },
            blkid: Ok(None),
            layout: PartedDisk {
                partitions: vec![PartedPartition {
                    number: 1,
                    start: MIB,
                    end: partition_end,
                    size: PARTITION_MIB * MIB,
                    filesystem: Some("ext4".into()),
                }],
                free: vec![
                    FreeRegion {
                        start: 17408,
                        end: MIB - 1,
                        size: LEADING_GAP,
                    },
                    FreeRegion {
                        start: trailing_start,
                        end: trailing_end,
                        size: UNALLOCATED_MIB * MIB,
                    },
                ],
            },
            swaps: Vec::new(),
            answer: true,
            failing: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn not_root(mut self) -> Self {
        self.root = false;
        self
    }

    pub fn missing(mut self, dependency: Dependency) -> Self {
        self.missing.push(dependency);
        self
    }

    pub fn with_device_node(mut self, node: DeviceNode) -> Self {
        self.node = node;
        self
    }

    pub fn with_filesystem(mut self, fstype: Option<&str>) -> Self {
        self.main_partition().fstype = fstype.map(Into::into);
        self
    }

    pub fn with_mountpoints(mut self, mountpoints: &[&str]) -> Self {
        self.main_partition().mountpoints = mountpoints.iter().map(PathBuf::from).collect();
        self
    }

    pub fn with_blkid(mut self, result: Result<Option<String>, &'static str>) -> Self {
        self.blkid = result;
        self
    }

    pub fn without_partitions(mut self) -> Self {
        self.block_device.children.clear();
        self.layout.partitions.clear();
        self
    }

    /// Replaces the free region after the partition. Zero removes all free space.
    pub fn with_unallocated_mib(mut self, mib: u64) -> Self {
        let trailing_start = self.layout.partitions[0].end + 1;
        self.layout.free = if mib == 0 {
            Vec::new()
        } else {
            vec![FreeRegion {
                start: trailing_start,
                end: trailing_start + mib * MIB - 1,
                size: mib * MIB,
            }]
        };
        self
    }

    /// Replaces the free region after the partition with one of `bytes` bytes, which need not be
    /// a whole number of MiB. The sub-MiB gap in front of the partition is kept.
    pub fn with_trailing_free_bytes(mut self, bytes: u64) -> Self {
        let trailing_start = self.layout.partitions[0].end + 1;
        self.layout.free.retain(|region| region.start < trailing_start);
        if bytes > 0 {
            self.layout.free.push(FreeRegion {
                start: trailing_start,
                end: trailing_start + bytes - 1,
                size: bytes,
            });
        }
        self
    }

    /// Uses a partition table captured from `parted -m unit B print free`.
    pub fn with_parted_output(mut self, output: &str) -> Self {
        self.layout = PartedDisk::parse(output).unwrap();
        self
    }

    /// Adds a partition behind the free region so it no longer runs to the end of the device.
    pub fn with_partition_after_free_space(mut self) -> Self {
        let start = self.next_byte();
        self.layout.partitions.push(PartedPartition {
            number: 2,
            start,
            end: start + MIB - 1,
            size: MIB,
            filesystem: None,
        });
        self
    }

    /// Appends a free region after the last partition.
    pub fn with_free_space_at_end(mut self, mib: u64) -> Self {
        let start = self.next_byte();
        self.layout.free.push(FreeRegion {
            start,
            end: start + mib * MIB - 1,
            size: mib * MIB,
        });
        self
    }

    pub fn with_swap(mut self, name: &str) -> Self {
        self.swaps.push(SwapSpace {
            name: name.into(),
            swap_type: "partition".into(),
            size: PARTITION_MIB * MIB,
            priority: -2,
        });
        self
    }

    pub fn answering(mut self, answer: bool) -> Self {
        self.answer = answer;
        self
    }

    /// Makes every invocation of the tool fail.
    pub fn failing(mut self, dependency: Dependency) -> Self {
        self.failing.push(dependency);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// First byte after everything laid out so far.
    fn next_byte(&self) -> u64 {
        self.layout
            .partitions
            .iter()
            .map(|partition| partition.end)
            .chain(self.layout.free.iter().map(|region| region.end))
            .max()
            .map_or(MIB, |end| end + 1)
    }

    fn main_partition(&mut self) -> &mut BlockDevice {
        &mut self.block_device.children[0]
    }

    fn record(&self, call: Call, dependency: Dependency) -> Result<(), Error> {
        self.calls.borrow_mut().push(call);
        if self.failing.contains(&dependency) {
            bail!("Mock {dependency} failed");
        }
        Ok(())
    }

    fn emit(on_output: &mut dyn FnMut(OutputLine), text: &str) {
        on_output(OutputLine {
            stream: OutputStream::Stdout,
            text: text.into(),
        });
    }
}

impl Host for MockHost {
    fn is_root(&self) -> bool {
        self.root
    }

    fn has_dependency(&self, dependency: Dependency) -> bool {
        !self.missing.contains(&dependency)
    }

    fn device_node(&self, _path: &Path) -> DeviceNode {
        self.node
    }

    fn block_device(&self, _device: &Path) -> Result<BlockDevice, Error> {
        if self.failing.contains(&Dependency::Lsblk) {
            bail!("Mock lsblk failed");
        }
        Ok(self.block_device.clone())
    }

    fn filesystem_type(&self, partition: &Path) -> Result<Option<String>, Error> {
        self.calls
            .borrow_mut()
            .push(Call::FilesystemType(partition.to_path_buf()));
        self.blkid.clone().map_err(Error::msg)
    }

    fn partition_table(&self, _device: &Path) -> Result<PartedDisk, Error> {
        Ok(self.layout.clone())
    }

    fn active_swaps(&self) -> Result<Vec<SwapSpace>, Error> {
        Ok(self.swaps.clone())
    }

    fn confirm(&self, prompt: &str) -> Result<bool, Error> {
        self.calls.borrow_mut().push(Call::Confirm(prompt.into()));
        Ok(self.answer)
    }

    fn swapoff(&self, partition: &Path) -> Result<(), Error> {
        self.record(Call::Swapoff(partition.to_path_buf()), Dependency::Swapoff)
    }

    fn resize_partition(
        &self,
        device: &Path,
        number: u32,
        end: PartitionEnd,
        in_use: bool,
    ) -> Result<(), Error> {
        self.record(
            Call::ResizePartition {
                device: device.to_path_buf(),
                number,
                end,
                in_use,
            },
            Dependency::Parted,
        )
    }

    fn settle(&self) -> Result<(), Error> {
        self.record(Call::Settle, Dependency::Udevadm)
    }

    fn check_ext(
        &self,
        partition: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        Self::emit(on_output, "Pass 1: Checking inodes, blocks, and sizes");
        self.record(Call::CheckExt(partition.to_path_buf()), Dependency::E2fsck)
    }

    fn resize_ext(
        &self,
        partition: &Path,
        online: bool,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        Self::emit(on_output, "Begin pass 1 (max = 80)");
        self.record(
            Call::ResizeExt {
                partition: partition.to_path_buf(),
                online,
            },
            Dependency::Resize2fs,
        )
    }

    fn grow_xfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        Self::emit(on_output, "data blocks changed from 2560000 to 7680000");
        self.record(
            Call::GrowXfs(mount_point.to_path_buf()),
            Dependency::XfsGrowfs,
        )
    }

    fn grow_btrfs(
        &self,
        mount_point: &Path,
        on_output: &mut dyn FnMut(OutputLine),
    ) -> Result<(), Error> {
        Self::emit(on_output, "Resize device id 1 (/dev/sdb1) from 9.77GiB to max");
        self.record(
            Call::GrowBtrfs(mount_point.to_path_buf()),
            Dependency::Btrfs,
        )
    }
}
