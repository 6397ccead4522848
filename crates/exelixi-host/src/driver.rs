//! The driver boundary.
//!
//! [`ClDriver`] exposes the raw OpenCL calls this layer is built on, in their
//! two-phase shape: a count or size query followed by a fetch into a
//! caller-sized buffer. The protocol itself lives in [`crate::discovery`] and
//! [`crate::diagnostics`], so every backend only has to forward single calls.
//!
//! Backends:
//! - [`opencl::OpenClDriver`] (feature `opencl`): the system ICD loader.
//! - [`crate::sim::SimDriver`]: an in-memory platform set for tests and for
//!   machines without an OpenCL runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClStatus;

#[cfg(feature = "opencl")]
pub mod opencl;

/// Result of a single driver call. The error is the raw status the driver
/// returned.
pub type DriverResult<T> = std::result::Result<T, ClStatus>;

/// Device class filter used when enumerating devices (`cl_device_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Default,
    Cpu,
    Gpu,
    Accelerator,
    Custom,
    All,
}

impl DeviceClass {
    pub fn bits(self) -> u64 {
        match self {
            Self::Default => 1 << 0,
            Self::Cpu => 1 << 1,
            Self::Gpu => 1 << 2,
            Self::Accelerator => 1 << 3,
            Self::Custom => 1 << 4,
            Self::All => 0xFFFF_FFFF,
        }
    }

    /// Decode a `CL_DEVICE_TYPE` bitfield reported for a single device.
    pub fn from_bits(bits: u64) -> Option<Self> {
        [Self::Accelerator, Self::Gpu, Self::Cpu, Self::Custom, Self::Default]
            .into_iter()
            .find(|class| bits & class.bits() != 0)
    }

    /// Whether a device of class `device` passes this filter.
    pub fn includes(self, device: DeviceClass) -> bool {
        self.bits() & device.bits() != 0
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Cpu => write!(f, "cpu"),
            Self::Gpu => write!(f, "gpu"),
            Self::Accelerator => write!(f, "accelerator"),
            Self::Custom => write!(f, "custom"),
            Self::All => write!(f, "all"),
        }
    }
}

impl FromStr for DeviceClass {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "cpu" => Ok(Self::Cpu),
            "gpu" => Ok(Self::Gpu),
            "accelerator" | "fpga" => Ok(Self::Accelerator),
            "custom" => Ok(Self::Custom),
            "all" => Ok(Self::All),
            other => Err(format!("unknown device class: {other}")),
        }
    }
}

/// Platform string attributes (`cl_platform_info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformParam {
    Profile,
    Version,
    Name,
    Vendor,
    Extensions,
}

impl PlatformParam {
    pub fn code(self) -> u32 {
        match self {
            Self::Profile => 0x0900,
            Self::Version => 0x0901,
            Self::Name => 0x0902,
            Self::Vendor => 0x0903,
            Self::Extensions => 0x0904,
        }
    }

    /// OpenCL constant name, used as the label in platform reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Profile => "CL_PLATFORM_PROFILE",
            Self::Version => "CL_PLATFORM_VERSION",
            Self::Name => "CL_PLATFORM_NAME",
            Self::Vendor => "CL_PLATFORM_VENDOR",
            Self::Extensions => "CL_PLATFORM_EXTENSIONS",
        }
    }
}

/// How the bytes of a device attribute are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    /// NUL-terminated string.
    String,
    /// `cl_uint`.
    Uint,
    /// `cl_ulong`.
    Ulong,
    /// `cl_bool`, four bytes.
    Bool,
    /// `cl_bitfield`, eight bytes.
    Bitfield,
}

impl InfoKind {
    /// Fixed byte width, `None` for strings.
    pub fn width(self) -> Option<usize> {
        match self {
            Self::String => None,
            Self::Uint | Self::Bool => Some(4),
            Self::Ulong | Self::Bitfield => Some(8),
        }
    }
}

/// Device attributes (`cl_device_info`) used by this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceParam {
    Type,
    VendorId,
    MaxComputeUnits,
    MaxWorkItemDimensions,
    PreferredVectorWidthChar,
    PreferredVectorWidthShort,
    PreferredVectorWidthInt,
    PreferredVectorWidthLong,
    PreferredVectorWidthFloat,
    PreferredVectorWidthDouble,
    MaxClockFrequency,
    AddressBits,
    ImageSupport,
    MemBaseAddrAlign,
    MinDataTypeAlignSize,
    GlobalMemCachelineSize,
    GlobalMemCacheSize,
    GlobalMemSize,
    MaxConstantBufferSize,
    MaxConstantArgs,
    LocalMemSize,
    EndianLittle,
    Available,
    QueueProperties,
    Name,
    Vendor,
    DriverVersion,
    Version,
}

impl DeviceParam {
    pub fn code(self) -> u32 {
        match self {
            Self::Type => 0x1000,
            Self::VendorId => 0x1001,
            Self::MaxComputeUnits => 0x1002,
            Self::MaxWorkItemDimensions => 0x1003,
            Self::PreferredVectorWidthChar => 0x1006,
            Self::PreferredVectorWidthShort => 0x1007,
            Self::PreferredVectorWidthInt => 0x1008,
            Self::PreferredVectorWidthLong => 0x1009,
            Self::PreferredVectorWidthFloat => 0x100A,
            Self::PreferredVectorWidthDouble => 0x100B,
            Self::MaxClockFrequency => 0x100C,
            Self::AddressBits => 0x100D,
            Self::ImageSupport => 0x1016,
            Self::MemBaseAddrAlign => 0x1019,
            Self::MinDataTypeAlignSize => 0x101A,
            Self::GlobalMemCachelineSize => 0x101D,
            Self::GlobalMemCacheSize => 0x101E,
            Self::GlobalMemSize => 0x101F,
            Self::MaxConstantBufferSize => 0x1020,
            Self::MaxConstantArgs => 0x1021,
            Self::LocalMemSize => 0x1023,
            Self::EndianLittle => 0x1026,
            Self::Available => 0x1027,
            Self::QueueProperties => 0x102A,
            Self::Name => 0x102B,
            Self::Vendor => 0x102C,
            Self::DriverVersion => 0x102D,
            Self::Version => 0x102F,
        }
    }

    pub fn kind(self) -> InfoKind {
        match self {
            Self::Name | Self::Vendor | Self::DriverVersion | Self::Version => InfoKind::String,
            Self::ImageSupport | Self::EndianLittle | Self::Available => InfoKind::Bool,
            Self::Type | Self::QueueProperties => InfoKind::Bitfield,
            Self::GlobalMemCacheSize
            | Self::GlobalMemSize
            | Self::MaxConstantBufferSize
            | Self::LocalMemSize => InfoKind::Ulong,
            _ => InfoKind::Uint,
        }
    }

    /// OpenCL constant name, used as the label in device reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Type => "CL_DEVICE_TYPE",
            Self::VendorId => "CL_DEVICE_VENDOR_ID",
            Self::MaxComputeUnits => "CL_DEVICE_MAX_COMPUTE_UNITS",
            Self::MaxWorkItemDimensions => "CL_DEVICE_MAX_WORK_ITEM_DIMENSIONS",
            Self::PreferredVectorWidthChar => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_CHAR",
            Self::PreferredVectorWidthShort => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_SHORT",
            Self::PreferredVectorWidthInt => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_INT",
            Self::PreferredVectorWidthLong => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_LONG",
            Self::PreferredVectorWidthFloat => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_FLOAT",
            Self::PreferredVectorWidthDouble => "CL_DEVICE_PREFERRED_VECTOR_WIDTH_DOUBLE",
            Self::MaxClockFrequency => "CL_DEVICE_MAX_CLOCK_FREQUENCY",
            Self::AddressBits => "CL_DEVICE_ADDRESS_BITS",
            Self::ImageSupport => "CL_DEVICE_IMAGE_SUPPORT",
            Self::MemBaseAddrAlign => "CL_DEVICE_MEM_BASE_ADDR_ALIGN",
            Self::MinDataTypeAlignSize => "CL_DEVICE_MIN_DATA_TYPE_ALIGN_SIZE",
            Self::GlobalMemCachelineSize => "CL_DEVICE_GLOBAL_MEM_CACHELINE_SIZE",
            Self::GlobalMemCacheSize => "CL_DEVICE_GLOBAL_MEM_CACHE_SIZE",
            Self::GlobalMemSize => "CL_DEVICE_GLOBAL_MEM_SIZE",
            Self::MaxConstantBufferSize => "CL_DEVICE_MAX_CONSTANT_BUFFER_SIZE",
            Self::MaxConstantArgs => "CL_DEVICE_MAX_CONSTANT_ARGS",
            Self::LocalMemSize => "CL_DEVICE_LOCAL_MEM_SIZE",
            Self::EndianLittle => "CL_DEVICE_ENDIAN_LITTLE",
            Self::Available => "CL_DEVICE_AVAILABLE",
            Self::QueueProperties => "CL_DEVICE_QUEUE_PROPERTIES",
            Self::Name => "CL_DEVICE_NAME",
            Self::Vendor => "CL_DEVICE_VENDOR",
            Self::DriverVersion => "CL_DRIVER_VERSION",
            Self::Version => "CL_DEVICE_VERSION",
        }
    }
}

/// Event profiling counters (`cl_profiling_info`), in device nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfilingParam {
    Queued,
    Submit,
    Start,
    End,
}

impl ProfilingParam {
    pub fn code(self) -> u32 {
        match self {
            Self::Queued => 0x1280,
            Self::Submit => 0x1281,
            Self::Start => 0x1282,
            Self::End => 0x1283,
        }
    }
}

/// `CL_QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE`
pub const QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE: u64 = 1 << 0;
/// `CL_QUEUE_PROFILING_ENABLE`
pub const QUEUE_PROFILING_ENABLE: u64 = 1 << 1;

/// Everything `clCreateProgramWithBinary` reports back.
#[derive(Debug)]
pub struct ProgramCreation<P> {
    /// The program handle, if the driver produced one.
    pub program: Option<P>,
    /// Aggregate status (`errcode_ret`).
    pub status: ClStatus,
    /// One status per submitted device, in submission order.
    pub binary_status: Vec<ClStatus>,
}

/// Raw driver calls used by the host layer.
///
/// Handles are cheap copies of opaque driver identifiers. Contexts and
/// programs are owned values that release their driver objects on drop.
pub trait ClDriver {
    type Platform: Copy + Eq + fmt::Debug;
    type Device: Copy + Eq + fmt::Debug;
    type Context;
    type Program;
    type Event;

    /// Number of installed platforms.
    fn platform_count(&self) -> DriverResult<u32>;

    /// Up to `count` platform handles.
    fn fetch_platforms(&self, count: u32) -> DriverResult<Vec<Self::Platform>>;

    /// Number of devices of `class` on `platform`.
    fn device_count(&self, platform: Self::Platform, class: DeviceClass) -> DriverResult<u32>;

    /// Up to `count` device handles of `class` on `platform`.
    fn fetch_devices(
        &self,
        platform: Self::Platform,
        class: DeviceClass,
        count: u32,
    ) -> DriverResult<Vec<Self::Device>>;

    /// Byte size of a platform attribute, including the NUL terminator.
    fn platform_info_size(&self, platform: Self::Platform, param: PlatformParam)
    -> DriverResult<usize>;

    /// Raw bytes of a platform attribute, read into a buffer of `size` bytes.
    fn fetch_platform_info(
        &self,
        platform: Self::Platform,
        param: PlatformParam,
        size: usize,
    ) -> DriverResult<Vec<u8>>;

    /// Byte size of a device attribute.
    fn device_info_size(&self, device: Self::Device, param: DeviceParam) -> DriverResult<usize>;

    /// Raw bytes of a device attribute, read into a buffer of `size` bytes.
    fn fetch_device_info(
        &self,
        device: Self::Device,
        param: DeviceParam,
        size: usize,
    ) -> DriverResult<Vec<u8>>;

    fn create_context(&self, devices: &[Self::Device]) -> DriverResult<Self::Context>;

    /// Submit one binary per device in a single call.
    fn create_program_with_binary(
        &self,
        context: &Self::Context,
        devices: &[Self::Device],
        binaries: &[&[u8]],
    ) -> ProgramCreation<Self::Program>;

    fn event_profiling_info(&self, event: &Self::Event, param: ProfilingParam)
    -> DriverResult<u64>;
}
