use std::fmt::{Debug, Write};
use std::{borrow::Cow, panic::Location};

use serde::{ser::SerializeStruct, Deserialize, Serialize};
use strum_macros::IntoStaticStr;

/// The execution environment cannot support the operation. These are reported before anything
/// on the device is touched.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExecutionEnvironmentError {
    #[error("Operation cannot be performed due to missing permissions, root privileges required")]
    MissingRequiredPermissions,
    #[error("Required binary '{binary}' could not be found")]
    MissingBinary { binary: &'static str },
    #[error("Device '{path}' does not exist")]
    DeviceNotFound { path: String },
    #[error("'{path}' is not a block device")]
    NotABlockDevice { path: String },
}

/// User provided input was invalid.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InvalidInputError {
    #[error(
        "Invalid size specification '{spec}', expected a percentage like '50%' or an absolute size like '10G', '500M'"
    )]
    InvalidSizeFormat { spec: String },
}

/// The device is in a state that does not allow the requested change.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StateConflictError {
    #[error("No partitions found on device '{device}'")]
    NoPartitions { device: String },
    #[error("Requested growth of {requested_mib} MiB exceeds the {available_mib} MiB of unallocated space")]
    ExceedsUnallocated { requested_mib: u64, available_mib: u64 },
    #[error(
        "Partition '{partition}' is not followed by enough unallocated space: {requested_mib} MiB requested, {trailing_mib} MiB available directly after it"
    )]
    NoTrailingSpace {
        partition: String,
        requested_mib: u64,
        trailing_mib: u64,
    },
    #[error(
        "Partition '{partition}' is mounted at '{mount_point}'; refusing to resize a mounted root or boot partition without --force"
    )]
    MountedSystemPartition {
        partition: String,
        mount_point: String,
    },
    #[error("Partition '{partition}' holds {filesystem}, which cannot be resized while mounted; unmount it first")]
    RequiresUnmount {
        partition: String,
        filesystem: String,
    },
    #[error("Partition '{partition}' holds {filesystem}, which can only be grown while mounted; mount it and retry")]
    RequiresMount {
        partition: String,
        filesystem: String,
    },
    #[error(
        "Partition '{partition}' holds an unrecognized filesystem ({filesystem}); its filesystem cannot be grown, use --force to grow only the partition"
    )]
    UnknownFilesystem {
        partition: String,
        filesystem: String,
    },
}

/// An external tool failed while querying or changing the device.
#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ToolError {
    #[error("Failed to query device '{device}'")]
    QueryDevice { device: String },
    #[error("Failed to disable swap on '{partition}'")]
    Swapoff { partition: String },
    #[error("Failed to resize partition '{partition}'")]
    PartitionResize { partition: String },
    #[error("Filesystem check failed on '{partition}'")]
    FilesystemCheck { partition: String },
    #[error("Failed to grow {filesystem} filesystem on '{partition}'")]
    FilesystemResize {
        partition: String,
        filesystem: String,
    },
}

#[derive(Debug, Eq, thiserror::Error, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InternalError {
    #[error("Failed to read operator confirmation")]
    Confirmation,
}

/// Each variant of `ErrorKind` corresponds to a different category of error. The categories
/// decide whether anything on the device may have been modified when the error surfaced.
#[derive(Debug, Eq, thiserror::Error, IntoStaticStr, PartialEq)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorKind {
    /// The tool cannot run in this environment.
    #[error(transparent)]
    ExecutionEnvironment(#[from] ExecutionEnvironmentError),

    /// The operator provided invalid input.
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),

    /// The device or partition does not allow the requested change. Nothing was modified.
    #[error(transparent)]
    StateConflict(#[from] StateConflictError),

    /// An external tool failed. Depending on the stage, the device may have been modified.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A bug was encountered.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

#[derive(Debug)]
struct GrowErrorInner {
    kind: ErrorKind,
    location: &'static Location<'static>,
    source: Option<anyhow::Error>,
    context: Vec<(Cow<'static, str>, &'static Location<'static>)>,
}

pub struct GrowError(Box<GrowErrorInner>);
impl GrowError {
    #[track_caller]
    pub fn new(kind: impl Into<ErrorKind>) -> Self {
        GrowError(Box::new(GrowErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: None,
            context: Vec::new(),
        }))
    }

    #[track_caller]
    pub fn with_source(kind: impl Into<ErrorKind>, source: anyhow::Error) -> Self {
        GrowError(Box::new(GrowErrorInner {
            kind: kind.into(),
            location: Location::caller(),
            source: Some(source),
            context: Vec::new(),
        }))
    }

    /// Returns a reference to the inner ErrorKind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }
}

pub trait ReportError<T, K> {
    /// Convert this error into a structured GrowError.
    fn structured(self, kind: K) -> Result<T, GrowError>;
}

impl<T, K> ReportError<T, K> for Option<T>
where
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, GrowError> {
        match self {
            Some(t) => Ok(t),
            None => Err(GrowError(Box::new(GrowErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: None,
                context: Vec::new(),
            }))),
        }
    }
}

impl<T, E, K> ReportError<T, K> for Result<T, E>
where
    E: Into<anyhow::Error>,
    K: Into<ErrorKind>,
{
    #[track_caller]
    fn structured(self, kind: K) -> Result<T, GrowError> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(GrowError(Box::new(GrowErrorInner {
                kind: kind.into(),
                location: Location::caller(),
                source: Some(e.into()),
                context: Vec::new(),
            }))),
        }
    }
}

pub trait GrowResultExt<T> {
    /// Attach a context message to the error.
    fn message(self, context: impl Into<Cow<'static, str>>) -> Result<T, GrowError>;
}
impl<T> GrowResultExt<T> for Result<T, GrowError> {
    #[track_caller]
    fn message(mut self, context: impl Into<Cow<'static, str>>) -> Result<T, GrowError> {
        if let Err(ref mut e) = self {
            e.0.context.push((context.into(), Location::caller()));
        }
        self
    }
}

impl Serialize for GrowError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("partgrow-error", 5)?;
        state.serialize_field("message", &self.0.kind.to_string())?;
        match self.0.kind {
            ErrorKind::ExecutionEnvironment(ref e) => state.serialize_field("error", e)?,
            ErrorKind::InvalidInput(ref e) => state.serialize_field("error", e)?,
            ErrorKind::StateConflict(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Tool(ref e) => state.serialize_field("error", e)?,
            ErrorKind::Internal(ref e) => state.serialize_field("error", e)?,
        }
        state.serialize_field("category", <&str>::from(&self.0.kind))?;
        state.serialize_field(
            "location",
            &format!("{}:{}", self.0.location.file(), self.0.location.line()),
        )?;
        match self.0.source {
            Some(ref e) => state.serialize_field("cause", &Some(format!("{:?}", e)))?,
            None => state.serialize_field("cause", &None::<String>)?,
        }
        state.end()
    }
}

impl Debug for GrowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.0.kind,
            self.0.location.file(),
            self.0.location.line()
        )?;

        if !self.0.context.is_empty() {
            writeln!(f, "\n\nContext:")?;
            for (i, (context, location)) in self.0.context.iter().enumerate() {
                for (j, line) in context.split('\n').enumerate() {
                    if j == 0 {
                        write!(f, "{: >5}: ", i)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                writeln!(f, " at {}:{}", location.file(), location.line())?;
            }
        }

        if let Some(ref source) = self.0.source {
            writeln!(f, "\n\nCaused by:")?;
            let mut index = 0;
            let mut source: Option<&dyn std::error::Error> = Some(source.as_ref());
            while let Some(e) = source {
                for (i, line) in e.to_string().split('\n').enumerate() {
                    if i == 0 {
                        write!(f, "{: >5}: ", index)?;
                    } else {
                        f.write_str("\n       ")?;
                    }
                    f.write_str(line)?;
                }
                f.write_char('\n')?;
                source = e.source();
                index += 1;
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for GrowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.kind)
    }
}
