//! End-to-end tests for the acquisition sequence: find a platform, list its
//! devices, create a context and build a program from a binary on disk.
//!
//! All tests use [`SimDriver`] so they run without an OpenCL runtime.

use exelixi_host::driver::ClDriver;
use exelixi_host::sim::{SimDevice, SimDriver, SimFaults, SimPlatform, SimPlatformId};
use exelixi_host::{
    ClStatus, DeviceClass, HostError, OrFatal, create_program_from_binary, find_platform,
    list_devices, list_platforms, platform_name,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_binary(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn fpga_rack(boards: usize, failing: Option<usize>) -> SimDriver {
    let mut platform = SimPlatform::new("Intel(R) FPGA SDK for OpenCL(TM)", "Intel(R) Corporation");
    for i in 0..boards {
        let mut device = SimDevice::new(&format!("acl{i}"), DeviceClass::Accelerator);
        if failing == Some(i) {
            device = device.with_binary_status(ClStatus::INVALID_BINARY);
        }
        platform = platform.with_device(device);
    }
    SimDriver::new(vec![SimPlatform::new("NVIDIA CUDA", "NVIDIA Corporation"), platform])
}

// ── Enumeration ──────────────────────────────────────────────────────────────

#[test]
fn enumeration_is_deterministic() {
    let driver = SimDriver::reference();
    let first = list_platforms(&driver).unwrap();
    let second = list_platforms(&driver).unwrap();
    assert_eq!(first, second);

    let names: Vec<_> = first.iter().map(|&p| platform_name(&driver, p).unwrap()).collect();
    let again: Vec<_> = second.iter().map(|&p| platform_name(&driver, p).unwrap()).collect();
    assert_eq!(names, again);
}

#[test]
fn find_platform_is_case_insensitive_substring() {
    let driver = SimDriver::reference();
    let found = find_platform(&driver, "NVID").unwrap().unwrap();
    assert_eq!(platform_name(&driver, found).unwrap(), "NVIDIA CUDA");
    assert_eq!(find_platform(&driver, "nvidia").unwrap(), Some(found));
    assert_eq!(find_platform(&driver, "intel(r) fpga").unwrap(), Some(SimPlatformId(0)));
}

#[test]
fn find_platform_without_match_is_none() {
    let driver = SimDriver::reference();
    assert_eq!(find_platform(&driver, "Xilinx").unwrap(), None);
}

#[test]
fn find_platform_first_match_wins() {
    let driver = SimDriver::new(vec![
        SimPlatform::new("Intel(R) OpenCL Graphics", "Intel(R) Corporation"),
        SimPlatform::new("Intel(R) FPGA Emulation Platform", "Intel(R) Corporation"),
    ]);
    assert_eq!(find_platform(&driver, "intel").unwrap(), Some(SimPlatformId(0)));
}

#[test]
fn enumeration_failure_is_reported_with_status() {
    let driver = SimDriver::reference().with_faults(SimFaults {
        platform_count: Some(ClStatus::OUT_OF_HOST_MEMORY),
        ..Default::default()
    });
    let err = find_platform(&driver, "fpga").unwrap_err();
    assert_eq!(err.status(), ClStatus::OUT_OF_HOST_MEMORY);
}

#[test]
fn device_lists_remember_their_platform() {
    let driver = SimDriver::reference();
    for platform in list_platforms(&driver).unwrap() {
        let devices = list_devices(&driver, platform, DeviceClass::All).unwrap();
        assert_eq!(devices.platform(), platform);
        assert_eq!(devices.len(), 1);
    }
}

// ── Program creation ─────────────────────────────────────────────────────────

#[test]
fn full_sequence_builds_program() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_binary(&dir, "device.aocx", &[0xA0; 4096]);
    let driver = fpga_rack(3, None);

    let platform = find_platform(&driver, "Intel(R) FPGA").unwrap().unwrap();
    let devices = list_devices(&driver, platform, DeviceClass::Accelerator).unwrap();
    let context = driver.create_context(devices.devices()).unwrap();
    let program = create_program_from_binary(&driver, &context, &binary, &devices).unwrap();

    assert_eq!(program.devices, devices.devices());
    assert_eq!(program.binary_len, 4096);
    assert_eq!(driver.live_programs(), 1);
    drop(program);
    assert_eq!(driver.live_programs(), 0);
}

#[test]
fn failing_second_device_fails_whole_build() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_binary(&dir, "device.aocx", b"not really an aocx");
    let driver = fpga_rack(3, Some(1));

    let platform = find_platform(&driver, "fpga").unwrap().unwrap();
    let devices = list_devices(&driver, platform, DeviceClass::All).unwrap();
    let context = driver.create_context(devices.devices()).unwrap();
    let err = create_program_from_binary(&driver, &context, &binary, &devices).unwrap_err();

    assert!(err.is_configuration_error());
    assert_eq!(err.status(), ClStatus::CONFIGURATION_ERROR);
    assert_eq!(driver.live_programs(), 0);
}

#[test]
fn first_device_only_like_a_single_board_host() {
    let dir = tempfile::tempdir().unwrap();
    let binary = write_binary(&dir, "device.aocx", b"aocx");
    let driver = fpga_rack(3, Some(2));

    let platform = find_platform(&driver, "fpga").unwrap().unwrap();
    let devices = list_devices(&driver, platform, DeviceClass::All)
        .unwrap()
        .truncate_to_first();
    let context = driver.create_context(devices.devices()).unwrap();
    let program = create_program_from_binary(&driver, &context, &binary, &devices).unwrap();
    assert_eq!(program.devices.len(), 1);
}

#[test]
fn missing_binary_becomes_fatal_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let driver = fpga_rack(1, None);
    let platform = find_platform(&driver, "fpga").unwrap().unwrap();
    let devices = list_devices(&driver, platform, DeviceClass::All).unwrap();
    let context = driver.create_context(devices.devices()).unwrap();

    let missing = dir.path().join("device.aocx");
    let fatal = create_program_from_binary(&driver, &context, missing, &devices)
        .or_fatal("Failed to create program with binary")
        .unwrap_err();
    assert_eq!(fatal.exit_code(), -8888);
    assert!(matches!(fatal.source, Some(HostError::BinaryNotFound { .. })));
}

#[test]
fn context_failure_surfaces_driver_status() {
    let driver = fpga_rack(1, None).with_faults(SimFaults {
        context: Some(ClStatus::INVALID_DEVICE),
        ..Default::default()
    });
    let platform = find_platform(&driver, "fpga").unwrap().unwrap();
    let devices = list_devices(&driver, platform, DeviceClass::All).unwrap();
    let status = driver.create_context(devices.devices()).unwrap_err();
    assert_eq!(status, ClStatus::INVALID_DEVICE);
}
