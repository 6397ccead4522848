//! Human-readable reports about platforms, devices and status codes.

use std::fmt;

use tracing::debug;

use crate::discovery::{
    device_info_bool, device_info_string, device_info_u32, device_info_u64, device_name,
    list_devices, list_platforms, platform_info,
};
use crate::driver::{
    ClDriver, DeviceClass, DeviceParam, InfoKind, PlatformParam,
    QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE, QUEUE_PROFILING_ENABLE,
};
use crate::error::{Result, translate_error};

/// Attributes listed by [`describe_device`], in report order.
pub const REPORTED_ATTRIBUTES: [DeviceParam; 26] = [
    DeviceParam::Name,
    DeviceParam::Vendor,
    DeviceParam::VendorId,
    DeviceParam::Version,
    DeviceParam::DriverVersion,
    DeviceParam::AddressBits,
    DeviceParam::Available,
    DeviceParam::EndianLittle,
    DeviceParam::GlobalMemCacheSize,
    DeviceParam::GlobalMemCachelineSize,
    DeviceParam::GlobalMemSize,
    DeviceParam::ImageSupport,
    DeviceParam::LocalMemSize,
    DeviceParam::MaxClockFrequency,
    DeviceParam::MaxComputeUnits,
    DeviceParam::MaxConstantArgs,
    DeviceParam::MaxConstantBufferSize,
    DeviceParam::MaxWorkItemDimensions,
    DeviceParam::MemBaseAddrAlign,
    DeviceParam::MinDataTypeAlignSize,
    DeviceParam::PreferredVectorWidthChar,
    DeviceParam::PreferredVectorWidthShort,
    DeviceParam::PreferredVectorWidthInt,
    DeviceParam::PreferredVectorWidthLong,
    DeviceParam::PreferredVectorWidthFloat,
    DeviceParam::PreferredVectorWidthDouble,
];

const QUEUE_OUT_OF_ORDER_LABEL: &str = "Command queue out of order?";
const QUEUE_PROFILING_LABEL: &str = "Command queue profiling enabled?";

/// One `label = value` line of a device report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    pub label: &'static str,
    /// `None` when the attribute could not be queried.
    pub value: Option<String>,
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<40} = {}", self.label, self.value.as_deref().unwrap_or("n/a"))
    }
}

/// Attribute report for a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceReport {
    pub entries: Vec<ReportEntry>,
}

impl DeviceReport {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .and_then(|entry| entry.value.as_deref())
    }
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

fn attribute_value<D: ClDriver>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<String> {
    match param.kind() {
        InfoKind::String => device_info_string(driver, device, param),
        InfoKind::Uint => device_info_u32(driver, device, param).map(|v| v.to_string()),
        InfoKind::Ulong | InfoKind::Bitfield => {
            device_info_u64(driver, device, param).map(|v| v.to_string())
        }
        InfoKind::Bool => device_info_bool(driver, device, param).map(|v| v.to_string()),
    }
}

/// Query the fixed attribute list of a device. Attributes that fail to
/// query are kept in the report with no value.
pub fn describe_device<D: ClDriver>(driver: &D, device: D::Device) -> DeviceReport {
    let mut entries: Vec<ReportEntry> = REPORTED_ATTRIBUTES
        .iter()
        .map(|&param| ReportEntry {
            label: param.label(),
            value: attribute_value(driver, device, param),
        })
        .collect();

    let queue = device_info_u64(driver, device, DeviceParam::QueueProperties);
    let flag = |bit: u64| queue.map(|props| (props & bit != 0).to_string());
    entries.push(ReportEntry {
        label: QUEUE_OUT_OF_ORDER_LABEL,
        value: flag(QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE),
    });
    entries.push(ReportEntry {
        label: QUEUE_PROFILING_LABEL,
        value: flag(QUEUE_PROFILING_ENABLE),
    });

    let missing = entries.iter().filter(|entry| entry.value.is_none()).count();
    if missing > 0 {
        debug!(?device, missing, "some device attributes could not be queried");
    }
    DeviceReport { entries }
}

/// Print [`describe_device`] to stdout.
pub fn print_device_info<D: ClDriver>(driver: &D, device: D::Device) {
    print!("{}", describe_device(driver, device));
}

/// A device entry in a [`SystemReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub name: Option<String>,
    pub report: DeviceReport,
}

/// Platform attributes listed under each platform banner, in report order.
pub const REPORTED_PLATFORM_ATTRIBUTES: [PlatformParam; 4] = [
    PlatformParam::Vendor,
    PlatformParam::Version,
    PlatformParam::Profile,
    PlatformParam::Extensions,
];

/// A platform entry in a [`SystemReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformSummary {
    pub name: Option<String>,
    /// [`REPORTED_PLATFORM_ATTRIBUTES`], one entry each.
    pub attributes: Vec<ReportEntry>,
    pub devices: Vec<DeviceSummary>,
}

impl PlatformSummary {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|entry| entry.label == label)
            .and_then(|entry| entry.value.as_deref())
    }
}

/// Every platform and every device on the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemReport {
    pub platforms: Vec<PlatformSummary>,
}

const PLATFORM_RULE: &str = "=============================================================";
const DEVICE_RULE: &str = "-------------------------------------------------------------";

impl fmt::Display for SystemReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} platform(s) found:", self.platforms.len())?;
        writeln!(f, "{PLATFORM_RULE}")?;
        for (i, platform) in self.platforms.iter().enumerate() {
            writeln!(f, "[{}] {}", i + 1, platform.name.as_deref().unwrap_or("n/a"))?;
            for entry in &platform.attributes {
                writeln!(f, "{entry}")?;
            }
            writeln!(f, "{} device(s) found:", platform.devices.len())?;
            for (j, device) in platform.devices.iter().enumerate() {
                writeln!(f, "{DEVICE_RULE}")?;
                writeln!(f, "[{}.{}] {}", i + 1, j + 1, device.name.as_deref().unwrap_or("n/a"))?;
                write!(f, "{}", device.report)?;
            }
            writeln!(f, "{PLATFORM_RULE}")?;
        }
        Ok(())
    }
}

/// Collect a [`SystemReport`]. Enumeration failures are errors; attribute
/// failures only blank the affected values.
pub fn system_report<D: ClDriver>(driver: &D) -> Result<SystemReport> {
    let mut platforms = Vec::new();
    for platform in list_platforms(driver)? {
        let devices = list_devices(driver, platform, DeviceClass::All)?
            .iter()
            .map(|device| DeviceSummary {
                name: device_name(driver, device),
                report: describe_device(driver, device),
            })
            .collect();
        let attributes = REPORTED_PLATFORM_ATTRIBUTES
            .iter()
            .map(|&param| ReportEntry {
                label: param.label(),
                value: platform_info(driver, platform, param),
            })
            .collect();
        platforms.push(PlatformSummary {
            name: platform_info(driver, platform, PlatformParam::Name),
            attributes,
            devices,
        });
    }
    Ok(SystemReport { platforms })
}

/// Print [`system_report`] to stdout.
pub fn print_clinfo<D: ClDriver>(driver: &D) -> Result<()> {
    print!("{}", system_report(driver)?);
    Ok(())
}

/// `"<message> <CODE_NAME>"`, the line written by [`print_error`].
pub fn error_line(status: i32, message: &str) -> String {
    format!("{message} {}", translate_error(status))
}

/// Print a message followed by the symbolic name of `status` to stdout.
pub fn print_error(status: i32, message: &str) {
    println!("{}", error_line(status, message));
}
