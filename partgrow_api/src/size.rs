use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    constants::MIB_PER_GIB,
    error::{InvalidInputError, GrowError},
};

/// Amount of unallocated space a partition should grow into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowSize {
    /// Consume all unallocated space.
    #[default]
    All,

    /// Grow by a fixed amount, in MiB.
    Absolute(u64),

    /// Grow by a percentage (1..=100) of the unallocated space.
    Percent(u8),
}

impl GrowSize {
    /// Resolves the size to an absolute amount of MiB given the measured unallocated space.
    ///
    /// Percentages are floored. Absolute sizes are returned unchanged, even when they exceed
    /// `unallocated_mib`; rejecting oversized requests is up to the caller.
    pub fn resolve(self, unallocated_mib: u64) -> u64 {
        match self {
            GrowSize::All => unallocated_mib,
            GrowSize::Absolute(mib) => mib,
            GrowSize::Percent(percent) => {
                (u128::from(unallocated_mib) * u128::from(percent) / 100) as u64
            }
        }
    }

    /// Whether the request should be handed to parted as "up to the end of the device".
    pub fn is_all(self) -> bool {
        matches!(self, GrowSize::All)
    }
}

impl FromStr for GrowSize {
    type Err = GrowError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            GrowError::new(InvalidInputError::InvalidSizeFormat {
                spec: spec.to_string(),
            })
        };

        let trimmed = spec.trim();
        if trimmed.eq_ignore_ascii_case("all") || trimmed.eq_ignore_ascii_case("max") {
            return Ok(GrowSize::All);
        }

        if let Some(number) = trimmed.strip_suffix('%') {
            let percent = parse_digits(number).ok_or_else(invalid)?;
            if percent == 0 || percent > 100 {
                return Err(invalid());
            }
            return Ok(GrowSize::Percent(percent as u8));
        }

        // Accept an optional "B" or "iB" after the unit letter, e.g. "10G", "10GB", "10GiB".
        let without_bytes = trimmed
            .strip_suffix("iB")
            .or_else(|| trimmed.strip_suffix('B'))
            .unwrap_or(trimmed);

        let (number, unit) = match without_bytes.char_indices().last() {
            Some((index, c)) if c.is_ascii_alphabetic() => {
                (&without_bytes[..index], c.to_ascii_uppercase())
            }
            _ => (without_bytes, 'M'),
        };

        let value = parse_digits(number).ok_or_else(invalid)?;
        if value == 0 {
            return Err(invalid());
        }

        let mib = match unit {
            // KiB are rounded up so that a non-zero request never resolves to zero.
            'K' => Some(value.div_ceil(1024)),
            'M' => Some(value),
            'G' => value.checked_mul(MIB_PER_GIB),
            'T' => value.checked_mul(MIB_PER_GIB * MIB_PER_GIB),
            _ => None,
        }
        .ok_or_else(invalid)?;

        Ok(GrowSize::Absolute(mib))
    }
}

impl fmt::Display for GrowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrowSize::All => f.write_str("all available space"),
            GrowSize::Absolute(mib) => write!(f, "{mib} MiB"),
            GrowSize::Percent(percent) => write!(f, "{percent}% of available space"),
        }
    }
}

fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parses a size specification and resolves it against the unallocated space, in MiB.
pub fn parse_size(spec: &str, unallocated_mib: u64) -> Result<u64, GrowError> {
    Ok(spec.parse::<GrowSize>()?.resolve(unallocated_mib))
}
