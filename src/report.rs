use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Error};
use serde::Serialize;

use partgrow_api::error::GrowError;

use crate::engine::Outcome;

/// Outcome recorded for runs that ended with an error.
pub const FAILED_OUTCOME: &str = "failed";

/// Machine readable summary of a run.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub device: Option<PathBuf>,

    pub partition: Option<PathBuf>,

    pub filesystem: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mount_points: Vec<PathBuf>,

    pub unallocated_mib: Option<u64>,

    /// Amount the partition was, or would have been, grown by.
    pub requested_mib: Option<u64>,

    pub estimated_duration: Option<String>,

    pub outcome: Option<&'static str>,

    pub error: Option<GrowError>,
}

impl Report {
    /// Records how the run ended.
    pub fn finish(&mut self, result: Result<Outcome, GrowError>) {
        match result {
            Ok(Outcome::PartiallyExtended(e)) => {
                self.outcome = Some("partially-extended");
                self.error = Some(e);
            }
            Ok(outcome) => self.outcome = Some(outcome.into()),
            Err(e) => {
                self.outcome = Some(FAILED_OUTCOME);
                self.error = Some(e);
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_some() && self.error.is_none()
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        serde_yaml::to_string(self).context("Failed to serialize report")
    }

    pub fn write(&self, path: &Path) -> Result<(), Error> {
        fs::write(path, self.to_yaml()?)
            .with_context(|| format!("Failed to write report to '{}'", path.display()))
    }
}
