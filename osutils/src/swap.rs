use std::path::{Path, PathBuf};

use anyhow::{Context, Error};

use crate::dependencies::Dependency;

/// Runs swapoff on the specified device path.
pub fn swapoff(device_path: impl AsRef<Path>) -> Result<(), Error> {
    Dependency::Swapoff
        .cmd()
        .arg("--verbose")
        .arg(device_path.as_ref())
        .run_and_check()
        .with_context(|| {
            format!(
                "Failed to execute swapoff on '{}'",
                device_path.as_ref().display()
            )
        })
}

/// Represents an active swap space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapSpace {
    pub name: PathBuf,
    pub swap_type: String,
    pub size: u64,
    pub priority: i32,
}

impl SwapSpace {
    pub fn read() -> Result<Vec<SwapSpace>, Error> {
        let output = Dependency::Swapon
            .cmd()
            .arg("--show=NAME,TYPE,SIZE,PRIO")
            .arg("--raw")
            .arg("--bytes")
            .arg("--noheadings")
            .output_and_check()
            .context("Failed to execute swapon")?;

        Self::parse(&output)
    }

    fn parse(output: &str) -> Result<Vec<SwapSpace>, Error> {
        output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                SwapSpace::from_str(line)
                    .with_context(|| format!("Failed to parse swap space line: {line}"))
            })
            .collect()
    }

    fn from_str(line: &str) -> Result<SwapSpace, Error> {
        let mut parts = line.split_whitespace();
        let name: PathBuf = parts
            .next()
            .context("Failed to parse swap space name")?
            .into();

        let swap_type = parts
            .next()
            .context("Failed to parse swap space type")?
            .to_string();

        let size = parts
            .next()
            .context("Failed to parse swap space size")?
            .parse::<u64>()
            .context("Failed to parse swap space size as integer")?;

        let priority = parts
            .next()
            .context("Failed to parse swap space priority")?
            .parse::<i32>()
            .context("Failed to parse swap space priority as integer")?;

        Ok(SwapSpace {
            name,
            swap_type,
            size,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_space_parsing() {
        let swap_space = SwapSpace::from_str("/dev/sdb partition 1048576 -2").unwrap();
        assert_eq!(swap_space.name, PathBuf::from("/dev/sdb"));
        assert_eq!(swap_space.swap_type, "partition");
        assert_eq!(swap_space.size, 1048576);
        assert_eq!(swap_space.priority, -2);

        let swap_space = SwapSpace::from_str("/somefile file 1048576 500").unwrap();
        assert_eq!(swap_space.name, PathBuf::from("/somefile"));
        assert_eq!(swap_space.swap_type, "file");
        assert_eq!(swap_space.size, 1048576);
        assert_eq!(swap_space.priority, 500);

        assert!(SwapSpace::from_str("/dev/sdb partition").is_err());
        assert!(SwapSpace::from_str("/dev/sdb partition big -2").is_err());
    }

    #[test]
    fn test_swap_list_parsing() {
        let spaces = SwapSpace::parse("/dev/sda3 partition 2147483648 -2\n/swapfile file 1073741824 -3\n\n").unwrap();
        assert_eq!(spaces.len(), 2);
        assert_eq!(spaces[1].name, PathBuf::from("/swapfile"));

        assert!(SwapSpace::parse("").unwrap().is_empty());
        assert!(SwapSpace::parse("/dev/sda3 partition").is_err());
    }
}
