//! Status codes and error types for the host layer.

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Raw OpenCL status code, including the synthetic configuration-error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClStatus(pub i32);

impl ClStatus {
    pub const SUCCESS: Self = Self(0);
    pub const DEVICE_NOT_FOUND: Self = Self(-1);
    pub const OUT_OF_HOST_MEMORY: Self = Self(-6);
    pub const PROFILING_INFO_NOT_AVAILABLE: Self = Self(-7);
    pub const BUILD_PROGRAM_FAILURE: Self = Self(-11);
    pub const INVALID_VALUE: Self = Self(-30);
    pub const INVALID_PLATFORM: Self = Self(-32);
    pub const INVALID_DEVICE: Self = Self(-33);
    pub const INVALID_CONTEXT: Self = Self(-34);
    pub const INVALID_BINARY: Self = Self(-42);
    pub const INVALID_PROGRAM: Self = Self(-44);
    pub const INVALID_EVENT: Self = Self(-58);
    /// Returned by the ICD loader when no vendor platform is installed.
    pub const PLATFORM_NOT_FOUND_KHR: Self = Self(-1001);
    /// Synthetic code for failures caused by the caller's inputs rather than
    /// the driver (missing binary, rejected device binary).
    pub const CONFIGURATION_ERROR: Self = Self(-8888);

    /// Symbolic name of a known code.
    pub fn name(self) -> Option<&'static str> {
        let name = match self.0 {
            0 => "CL_SUCCESS",
            -1 => "CL_DEVICE_NOT_FOUND",
            -2 => "CL_DEVICE_NOT_AVAILABLE",
            -3 => "CL_COMPILER_NOT_AVAILABLE",
            -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
            -5 => "CL_OUT_OF_RESOURCES",
            -6 => "CL_OUT_OF_HOST_MEMORY",
            -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
            -8 => "CL_MEM_COPY_OVERLAP",
            -9 => "CL_IMAGE_FORMAT_MISMATCH",
            -10 => "CL_IMAGE_FORMAT_NOT_SUPPORTED",
            -11 => "CL_BUILD_PROGRAM_FAILURE",
            -12 => "CL_MAP_FAILURE",
            -13 => "CL_MISALIGNED_SUB_BUFFER_OFFSET",
            -14 => "CL_EXEC_STATUS_ERROR_FOR_EVENTS_IN_WAIT_LIST",
            -30 => "CL_INVALID_VALUE",
            -31 => "CL_INVALID_DEVICE_TYPE",
            -32 => "CL_INVALID_PLATFORM",
            -33 => "CL_INVALID_DEVICE",
            -34 => "CL_INVALID_CONTEXT",
            -35 => "CL_INVALID_QUEUE_PROPERTIES",
            -36 => "CL_INVALID_COMMAND_QUEUE",
            -37 => "CL_INVALID_HOST_PTR",
            -38 => "CL_INVALID_MEM_OBJECT",
            -39 => "CL_INVALID_IMAGE_FORMAT_DESCRIPTOR",
            -40 => "CL_INVALID_IMAGE_SIZE",
            -41 => "CL_INVALID_SAMPLER",
            -42 => "CL_INVALID_BINARY",
            -43 => "CL_INVALID_BUILD_OPTIONS",
            -44 => "CL_INVALID_PROGRAM",
            -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
            -46 => "CL_INVALID_KERNEL_NAME",
            -47 => "CL_INVALID_KERNEL_DEFINITION",
            -48 => "CL_INVALID_KERNEL",
            -49 => "CL_INVALID_ARG_INDEX",
            -50 => "CL_INVALID_ARG_VALUE",
            -51 => "CL_INVALID_ARG_SIZE",
            -52 => "CL_INVALID_KERNEL_ARGS",
            -53 => "CL_INVALID_WORK_DIMENSION",
            -54 => "CL_INVALID_WORK_GROUP_SIZE",
            -55 => "CL_INVALID_WORK_ITEM_SIZE",
            -56 => "CL_INVALID_GLOBAL_OFFSET",
            -57 => "CL_INVALID_EVENT_WAIT_LIST",
            -58 => "CL_INVALID_EVENT",
            -59 => "CL_INVALID_OPERATION",
            -60 => "CL_INVALID_GL_OBJECT",
            -61 => "CL_INVALID_BUFFER_SIZE",
            -62 => "CL_INVALID_MIP_LEVEL",
            -63 => "CL_INVALID_GLOBAL_WORK_SIZE",
            -1001 => "CL_PLATFORM_NOT_FOUND_KHR",
            -8888 => "CL_CONFIGURATION_ERROR",
            _ => return None,
        };
        Some(name)
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Exit code used by the fatal path. The raw status is passed through and
    /// the OS truncates it to its exit-code width.
    pub fn exit_code(self) -> i32 {
        self.0
    }
}

impl From<i32> for ClStatus {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for ClStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&translate_error(self.0))
    }
}

/// Translate any status code into a human-readable name.
///
/// Total over `i32`: unknown codes render as `UNRECOGNIZED ERROR CODE (<n>)`.
pub fn translate_error(code: i32) -> Cow<'static, str> {
    match ClStatus(code).name() {
        Some(name) => Cow::Borrowed(name),
        None => Cow::Owned(format!("UNRECOGNIZED ERROR CODE ({code})")),
    }
}

/// Errors produced by the host layer.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("{context}: {status} ({code})", code = .status.0)]
    Driver { status: ClStatus, context: String },

    #[error("binary file {} does not exist", .path.display())]
    BinaryNotFound { path: PathBuf },

    #[error("failed to read binary file {}: {source}", .path.display())]
    BinaryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read on {}: expected {expected} bytes, got {actual}", .path.display())]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("binary file {} is empty", .path.display())]
    EmptyBinary { path: PathBuf },

    #[error("no devices to build the program for")]
    NoDevices,

    #[error("failed to create program with binary: {status}")]
    ProgramCreation { status: ClStatus },

    #[error("failed to load binary for device {index}: {status}")]
    DeviceBinary { index: usize, status: ClStatus },

    #[error("driver reported {actual} binary statuses for {expected} devices")]
    BinaryStatusMismatch { expected: usize, actual: usize },

    #[error("host allocation failed: size={size} bytes")]
    Allocation { size: usize },
}

impl HostError {
    pub fn driver(status: impl Into<ClStatus>, context: impl Into<String>) -> Self {
        Self::Driver {
            status: status.into(),
            context: context.into(),
        }
    }

    /// True for failures caused by the caller's inputs rather than the driver.
    pub fn is_configuration_error(&self) -> bool {
        !matches!(self, Self::Driver { .. } | Self::Allocation { .. })
    }

    /// Status code reported on the fatal path.
    pub fn status(&self) -> ClStatus {
        match self {
            Self::Driver { status, .. } => *status,
            Self::Allocation { .. } => ClStatus::OUT_OF_HOST_MEMORY,
            _ => ClStatus::CONFIGURATION_ERROR,
        }
    }
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, HostError>;

/// Check a driver status code and return an error if it is not `CL_SUCCESS`.
pub fn check(status: impl Into<ClStatus>, context: &str) -> Result<()> {
    let status = status.into();
    if status.is_success() {
        Ok(())
    } else {
        Err(HostError::driver(status, context))
    }
}
