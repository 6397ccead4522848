//! Platform and device discovery.
//!
//! Every query follows the OpenCL two-phase protocol: ask the driver for a
//! count (or byte size), then fetch into a buffer of exactly that size. The
//! results are owned by the caller; nothing is cached, so each call reflects
//! the driver's current state.

use std::fmt;

use tracing::{debug, info, warn};

use crate::driver::{ClDriver, DeviceClass, DeviceParam, InfoKind, PlatformParam};
use crate::error::{ClStatus, HostError, Result};

/// Enumerate every installed platform.
///
/// A machine without any platform yields an empty list. The ICD loader's
/// `CL_PLATFORM_NOT_FOUND_KHR` in the count phase counts as "no platforms".
pub fn list_platforms<D: ClDriver>(driver: &D) -> Result<Vec<D::Platform>> {
    let count = match driver.platform_count() {
        Ok(count) => count,
        Err(ClStatus::PLATFORM_NOT_FOUND_KHR) => 0,
        Err(status) => {
            warn!(%status, "failed to count platforms");
            return Err(HostError::driver(status, "query for number of platforms failed"));
        }
    };
    debug!(count, "platform count");
    if count == 0 {
        return Ok(Vec::new());
    }

    let platforms = driver.fetch_platforms(count).map_err(|status| {
        warn!(%status, "failed to fetch platform ids");
        HostError::driver(status, "query for platform ids failed")
    })?;
    Ok(platforms)
}

/// First platform whose name contains `search`, ignoring case.
///
/// Platforms whose name cannot be read are skipped. `Ok(None)` means
/// enumeration worked but nothing matched.
pub fn find_platform<D: ClDriver>(driver: &D, search: &str) -> Result<Option<D::Platform>> {
    let needle = search.to_lowercase();
    for platform in list_platforms(driver)? {
        let Some(name) = platform_name(driver, platform) else {
            debug!(?platform, "skipping platform without a readable name");
            continue;
        };
        if name.to_lowercase().contains(&needle) {
            info!(platform = %name, search, "selected platform");
            return Ok(Some(platform));
        }
    }
    debug!(search, "no platform matched");
    Ok(None)
}

/// Devices of one class on one platform, as returned by [`list_devices`].
///
/// The list remembers where it came from so devices from different
/// enumeration calls are not mixed by accident.
#[derive(Clone, PartialEq, Eq)]
pub struct DeviceList<P, D> {
    platform: P,
    class: DeviceClass,
    devices: Vec<D>,
}

impl<P: Copy, D: Copy> DeviceList<P, D> {
    pub fn new(platform: P, class: DeviceClass, devices: Vec<D>) -> Self {
        Self {
            platform,
            class,
            devices,
        }
    }

    pub fn platform(&self) -> P {
        self.platform
    }

    pub fn class(&self) -> DeviceClass {
        self.class
    }

    pub fn devices(&self) -> &[D] {
        &self.devices
    }

    pub fn first(&self) -> Option<D> {
        self.devices.first().copied()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = D> + '_ {
        self.devices.iter().copied()
    }

    /// Keep only the first device, the usual choice for a single-board host.
    pub fn truncate_to_first(mut self) -> Self {
        self.devices.truncate(1);
        self
    }

    pub fn into_devices(self) -> Vec<D> {
        self.devices
    }
}

impl<P: fmt::Debug, D: fmt::Debug> fmt::Debug for DeviceList<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceList")
            .field("platform", &self.platform)
            .field("class", &self.class)
            .field("count", &self.devices.len())
            .field("devices", &self.devices)
            .finish()
    }
}

/// Enumerate devices of `class` on `platform`.
///
/// `CL_DEVICE_NOT_FOUND` from the count phase is an empty list rather than
/// an error.
pub fn list_devices<D: ClDriver>(
    driver: &D,
    platform: D::Platform,
    class: DeviceClass,
) -> Result<DeviceList<D::Platform, D::Device>> {
    let count = match driver.device_count(platform, class) {
        Ok(count) => count,
        Err(ClStatus::DEVICE_NOT_FOUND) => 0,
        Err(status) => {
            warn!(?platform, %class, %status, "failed to count devices");
            return Err(HostError::driver(status, "query for number of devices failed"));
        }
    };
    debug!(?platform, %class, count, "device count");
    if count == 0 {
        return Ok(DeviceList::new(platform, class, Vec::new()));
    }

    let devices = driver.fetch_devices(platform, class, count).map_err(|status| {
        warn!(?platform, %class, %status, "failed to fetch device ids");
        HostError::driver(status, "query for device ids failed")
    })?;
    Ok(DeviceList::new(platform, class, devices))
}

/// Decode a NUL-terminated info string. Bytes after the first NUL are ignored.
fn decode_info_string(mut bytes: Vec<u8>) -> String {
    if let Some(end) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(end);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A platform string attribute, or `None` if either query phase fails.
pub fn platform_info<D: ClDriver>(
    driver: &D,
    platform: D::Platform,
    param: PlatformParam,
) -> Option<String> {
    let size = driver.platform_info_size(platform, param).ok()?;
    let bytes = driver.fetch_platform_info(platform, param, size).ok()?;
    Some(decode_info_string(bytes))
}

pub fn platform_name<D: ClDriver>(driver: &D, platform: D::Platform) -> Option<String> {
    platform_info(driver, platform, PlatformParam::Name)
}

/// A device string attribute, or `None` if either query phase fails.
pub fn device_info_string<D: ClDriver>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<String> {
    let size = driver.device_info_size(device, param).ok()?;
    let bytes = driver.fetch_device_info(device, param, size).ok()?;
    Some(decode_info_string(bytes))
}

pub fn device_name<D: ClDriver>(driver: &D, device: D::Device) -> Option<String> {
    device_info_string(driver, device, DeviceParam::Name)
}

fn fixed_info<D: ClDriver, const N: usize>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<[u8; N]> {
    debug_assert_eq!(param.kind().width(), Some(N));
    let bytes = driver.fetch_device_info(device, param, N).ok()?;
    bytes.get(..N)?.try_into().ok()
}

/// A `cl_uint` device attribute.
pub fn device_info_u32<D: ClDriver>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<u32> {
    fixed_info::<D, 4>(driver, device, param).map(u32::from_ne_bytes)
}

/// A `cl_ulong` or bitfield device attribute.
pub fn device_info_u64<D: ClDriver>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<u64> {
    fixed_info::<D, 8>(driver, device, param).map(u64::from_ne_bytes)
}

/// A `cl_bool` device attribute.
pub fn device_info_bool<D: ClDriver>(
    driver: &D,
    device: D::Device,
    param: DeviceParam,
) -> Option<bool> {
    debug_assert_eq!(param.kind(), InfoKind::Bool);
    device_info_u32(driver, device, param).map(|v| v != 0)
}

/// The class a device reports for itself.
pub fn device_class<D: ClDriver>(driver: &D, device: D::Device) -> Option<DeviceClass> {
    device_info_u64(driver, device, DeviceParam::Type).and_then(DeviceClass::from_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimDevice, SimDriver, SimFaults, SimPlatform, SimPlatformId};

    #[test]
    fn test_decode_strips_terminator_and_padding() {
        assert_eq!(decode_info_string(b"pocl\0\0\0".to_vec()), "pocl");
        assert_eq!(decode_info_string(b"\0".to_vec()), "");
        assert_eq!(decode_info_string(b"no-nul".to_vec()), "no-nul");
    }

    #[test]
    fn test_empty_machine_has_no_platforms() {
        assert!(list_platforms(&SimDriver::empty()).unwrap().is_empty());
    }

    #[test]
    fn test_icd_without_vendors_is_empty() {
        let driver = SimDriver::reference().with_faults(SimFaults {
            platform_count: Some(ClStatus::PLATFORM_NOT_FOUND_KHR),
            ..Default::default()
        });
        assert!(list_platforms(&driver).unwrap().is_empty());
    }

    #[test]
    fn test_fetch_phase_failure_is_an_error() {
        let driver = SimDriver::reference().with_faults(SimFaults {
            platform_fetch: Some(ClStatus::OUT_OF_HOST_MEMORY),
            ..Default::default()
        });
        let err = list_platforms(&driver).unwrap_err();
        assert_eq!(err.status(), ClStatus::OUT_OF_HOST_MEMORY);
    }

    #[test]
    fn test_find_skips_unnamed_platforms() {
        let mut unnamed = SimPlatform::new("", "Ghost");
        unnamed.name = None;
        let driver = SimDriver::new(vec![
            unnamed,
            SimPlatform::new(
                "Intel(R) FPGA Emulation Platform for OpenCL(TM)",
                "Intel(R) Corporation",
            ),
        ]);
        assert_eq!(find_platform(&driver, "fpga").unwrap(), Some(SimPlatformId(1)));
    }

    #[test]
    fn test_empty_search_matches_first_platform() {
        let driver = SimDriver::reference();
        assert_eq!(find_platform(&driver, "").unwrap(), Some(SimPlatformId(0)));
    }

    #[test]
    fn test_missing_class_is_empty_list() {
        let driver = SimDriver::reference();
        let list = list_devices(&driver, SimPlatformId(1), DeviceClass::Accelerator).unwrap();
        assert!(list.is_empty());
        assert_eq!(list.platform(), SimPlatformId(1));
        assert_eq!(list.class(), DeviceClass::Accelerator);
    }

    #[test]
    fn test_device_count_failure_is_an_error() {
        let driver = SimDriver::reference().with_faults(SimFaults {
            device_count: Some(ClStatus::INVALID_PLATFORM),
            ..Default::default()
        });
        let err = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap_err();
        assert_eq!(err.status(), ClStatus::INVALID_PLATFORM);
    }

    #[test]
    fn test_numeric_attributes() {
        let driver = SimDriver::new(vec![SimPlatform::new("p", "v").with_device(
            SimDevice::new("board", DeviceClass::Accelerator).with_compute(2, 250),
        )]);
        let device = list_devices(&driver, SimPlatformId(0), DeviceClass::All)
            .unwrap()
            .first()
            .unwrap();
        assert_eq!(device_info_u32(&driver, device, DeviceParam::MaxComputeUnits), Some(2));
        assert_eq!(device_info_u32(&driver, device, DeviceParam::MaxClockFrequency), Some(250));
        assert_eq!(device_info_bool(&driver, device, DeviceParam::Available), Some(true));
        assert_eq!(device_class(&driver, device), Some(DeviceClass::Accelerator));
        assert_eq!(device_name(&driver, device).as_deref(), Some("board"));
    }

    #[test]
    fn test_unsupported_attribute_is_none() {
        let driver = SimDriver::new(vec![SimPlatform::new("p", "v").with_device(
            SimDevice::new("board", DeviceClass::Accelerator).without(DeviceParam::DriverVersion),
        )]);
        let device = list_devices(&driver, SimPlatformId(0), DeviceClass::All)
            .unwrap()
            .first()
            .unwrap();
        assert_eq!(device_info_string(&driver, device, DeviceParam::DriverVersion), None);
    }
}
