use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Error};
use log::warn;
use serde::{Deserialize, Deserializer};

use crate::dependencies::Dependency;

/// Columns requested from lsblk; each one maps to a field of `BlockDevice`.
pub const LSBLK_COLUMNS: &str = "NAME,TYPE,SIZE,FSTYPE,MOUNTPOINTS,PKNAME";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct LsBlkOutput {
    pub blockdevices: Vec<BlockDevice>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockDeviceType {
    Disk,
    Part,
    Loop,
    Lvm,
    Crypt,
    Rom,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
pub struct BlockDevice {
    pub name: PathBuf,

    #[serde(rename = "type")]
    pub blkdev_type: BlockDeviceType,

    /// Size in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub size: u64,

    pub fstype: Option<String>,

    #[serde(default, deserialize_with = "deserialize_mountpoints")]
    pub mountpoints: Vec<PathBuf>,

    #[serde(rename = "pkname")]
    pub parent_kernel_name: Option<PathBuf>,

    #[serde(default)]
    pub children: Vec<BlockDevice>,
}

impl BlockDevice {
    /// Iterates over the direct children that are partitions.
    pub fn partitions(&self) -> impl Iterator<Item = &BlockDevice> {
        self.children
            .iter()
            .filter(|child| child.blkdev_type == BlockDeviceType::Part)
    }
}

/// Older lsblk releases print sizes as strings even with `--bytes`.
fn deserialize_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
    }

    match Size::deserialize(deserializer)? {
        Size::Number(size) => Ok(size),
        Size::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// lsblk reports unmounted devices as `[null]`.
fn deserialize_mountpoints<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    let mountpoints: Option<Vec<Option<PathBuf>>> = Option::deserialize(deserializer)?;
    Ok(mountpoints.into_iter().flatten().flatten().collect())
}

/// Runs lsblk on the device and returns the device with its children.
pub fn get(device_path: impl AsRef<Path>) -> Result<BlockDevice, Error> {
    let mut devices = run(device_path.as_ref())?;
    ensure!(
        devices.len() == 1,
        "Expected exactly one block device for '{}', lsblk returned {}",
        device_path.as_ref().display(),
        devices.len()
    );
    Ok(devices.remove(0))
}

pub fn run(device_path: impl AsRef<Path>) -> Result<Vec<BlockDevice>, Error> {
    let result = Dependency::Lsblk
        .cmd()
        .arg("--json")
        .arg("--path")
        .arg("--bytes")
        .arg("--output")
        .arg(LSBLK_COLUMNS)
        .arg(device_path.as_ref())
        .output_and_check()
        .with_context(|| {
            format!(
                "Failed to execute lsblk on '{}'",
                device_path.as_ref().display()
            )
        })?;

    let parsed = parse_lsblk_output(result.as_str());
    if parsed.is_err() {
        warn!("lsblk output: {}", result);
    }

    parsed
}

fn parse_lsblk_output(output: &str) -> Result<Vec<BlockDevice>, Error> {
    let parsed: LsBlkOutput =
        serde_json::from_str(output).context("Failed to parse lsblk output")?;

    Ok(parsed.blockdevices)
}
