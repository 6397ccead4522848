//! Building a program from a precompiled binary.
//!
//! FPGA boards cannot compile kernels at run time, so a program is created
//! from the offline-compiled image. The same image is submitted once per
//! device and the program is only returned if every device accepted it.

use std::path::Path;

use tracing::{debug, error, info};

use crate::binary::{BinaryImage, load_binary_file};
use crate::discovery::DeviceList;
use crate::driver::ClDriver;
use crate::error::{HostError, Result};

/// Create a program from `image` for every device in `devices`.
///
/// Any failure (no handle, a non-success aggregate status, a per-device
/// status vector of the wrong length, or any device rejecting its binary) is
/// a configuration error. A handle produced alongside a failure is dropped,
/// which releases it.
pub fn build_program<D: ClDriver>(
    driver: &D,
    context: &D::Context,
    image: &BinaryImage,
    devices: &DeviceList<D::Platform, D::Device>,
) -> Result<D::Program> {
    if devices.is_empty() {
        error!(binary = %image.path().display(), "no devices to load the binary onto");
        return Err(HostError::NoDevices);
    }

    let binaries = vec![image.bytes(); devices.len()];
    debug!(
        binary = %image.path().display(),
        bytes = image.len(),
        devices = devices.len(),
        "creating program with binary"
    );
    let created = driver.create_program_with_binary(context, devices.devices(), &binaries);

    let program = match created.program {
        Some(program) if created.status.is_success() => program,
        _ => {
            error!(status = %created.status, "failed to create program with binary");
            return Err(HostError::ProgramCreation {
                status: created.status,
            });
        }
    };

    if created.binary_status.len() != devices.len() {
        error!(
            expected = devices.len(),
            actual = created.binary_status.len(),
            "driver returned an unexpected number of binary statuses"
        );
        return Err(HostError::BinaryStatusMismatch {
            expected: devices.len(),
            actual: created.binary_status.len(),
        });
    }

    if let Some((index, &status)) = created
        .binary_status
        .iter()
        .enumerate()
        .find(|(_, status)| !status.is_success())
    {
        error!(device = index, %status, "failed to load binary for device");
        drop(program);
        return Err(HostError::DeviceBinary { index, status });
    }

    info!(
        binary = %image.path().display(),
        devices = devices.len(),
        "program created from binary"
    );
    Ok(program)
}

/// Load the binary at `path` and build it for every device in `devices`.
pub fn create_program_from_binary<D: ClDriver>(
    driver: &D,
    context: &D::Context,
    path: impl AsRef<Path>,
    devices: &DeviceList<D::Platform, D::Device>,
) -> Result<D::Program> {
    let image = load_binary_file(path)?;
    build_program(driver, context, &image, devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::list_devices;
    use crate::driver::DeviceClass;
    use crate::error::ClStatus;
    use crate::sim::{SimDevice, SimDriver, SimFaults, SimPlatform, SimPlatformId};

    fn three_boards(second: ClStatus) -> SimDriver {
        SimDriver::new(vec![
            SimPlatform::new("Intel(R) FPGA SDK for OpenCL(TM)", "Intel(R) Corporation")
                .with_device(SimDevice::new("board0", DeviceClass::Accelerator))
                .with_device(
                    SimDevice::new("board1", DeviceClass::Accelerator).with_binary_status(second),
                )
                .with_device(SimDevice::new("board2", DeviceClass::Accelerator)),
        ])
    }

    fn image() -> BinaryImage {
        BinaryImage::from_bytes("device.aocx", b"AOCX\x00\x01".to_vec())
    }

    #[test]
    fn test_build_succeeds_on_every_device() {
        let driver = three_boards(ClStatus::SUCCESS);
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(devices.devices()).unwrap();
        let program = build_program(&driver, &ctx, &image(), &devices).unwrap();
        assert_eq!(program.devices.len(), 3);
        assert_eq!(program.binary_len, 6);
    }

    #[test]
    fn test_one_rejected_device_fails_the_build() {
        let driver = three_boards(ClStatus::INVALID_BINARY);
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(devices.devices()).unwrap();
        let err = build_program(&driver, &ctx, &image(), &devices).unwrap_err();
        assert_eq!(err.status(), ClStatus::CONFIGURATION_ERROR);
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn test_partial_handle_is_released() {
        let driver = three_boards(ClStatus::INVALID_BINARY).with_faults(SimFaults {
            program_status: Some(ClStatus::SUCCESS),
            program_despite_failures: true,
            ..Default::default()
        });
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(devices.devices()).unwrap();
        let err = build_program(&driver, &ctx, &image(), &devices).unwrap_err();
        match err {
            HostError::DeviceBinary { index, status } => {
                assert_eq!(index, 1);
                assert_eq!(status, ClStatus::INVALID_BINARY);
            }
            other => panic!("expected DeviceBinary, got: {other}"),
        }
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn test_short_status_vector_fails() {
        let driver = three_boards(ClStatus::SUCCESS).with_faults(SimFaults {
            binary_status_len: Some(2),
            ..Default::default()
        });
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(devices.devices()).unwrap();
        let err = build_program(&driver, &ctx, &image(), &devices).unwrap_err();
        assert!(matches!(err, HostError::BinaryStatusMismatch { expected: 3, actual: 2 }));
        assert_eq!(driver.live_programs(), 0);
    }

    #[test]
    fn test_empty_device_list_is_rejected() {
        let driver = three_boards(ClStatus::SUCCESS);
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::Gpu).unwrap();
        let all = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(all.devices()).unwrap();
        let err = build_program(&driver, &ctx, &image(), &devices).unwrap_err();
        assert!(matches!(err, HostError::NoDevices));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_missing_binary_never_reaches_driver() {
        let driver = three_boards(ClStatus::SUCCESS);
        let devices = list_devices(&driver, SimPlatformId(0), DeviceClass::All).unwrap();
        let ctx = driver.create_context(devices.devices()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err =
            create_program_from_binary(&driver, &ctx, dir.path().join("device.aocx"), &devices)
                .unwrap_err();
        assert!(matches!(err, HostError::BinaryNotFound { .. }));
        assert_eq!(err.status(), ClStatus::CONFIGURATION_ERROR);
    }
}
