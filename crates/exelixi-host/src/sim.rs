//! Simulated OpenCL driver.
//!
//! [`SimDriver`] answers the same two-phase calls as a real ICD loader from an
//! in-memory platform list. It follows the OpenCL return conventions
//! (`CL_DEVICE_NOT_FOUND` for an empty device query, `CL_INVALID_VALUE` for a
//! buffer that is too small) and can inject a failure into any phase.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use crate::driver::{
    ClDriver, DeviceClass, DeviceParam, DriverResult, InfoKind, PlatformParam, ProfilingParam,
    ProgramCreation, QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE, QUEUE_PROFILING_ENABLE,
};
use crate::error::ClStatus;

/// A simulated platform.
#[derive(Debug, Clone)]
pub struct SimPlatform {
    /// `None` makes every name query fail.
    pub name: Option<String>,
    pub vendor: String,
    pub version: String,
    pub profile: String,
    pub extensions: String,
    pub devices: Vec<SimDevice>,
}

impl SimPlatform {
    pub fn new(name: &str, vendor: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            vendor: vendor.to_string(),
            version: "OpenCL 1.2".to_string(),
            profile: "FULL_PROFILE".to_string(),
            extensions: "cl_khr_icd".to_string(),
            devices: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.devices.push(device);
        self
    }

    fn info(&self, param: PlatformParam) -> Option<&str> {
        match param {
            PlatformParam::Name => self.name.as_deref(),
            PlatformParam::Vendor => Some(&self.vendor),
            PlatformParam::Version => Some(&self.version),
            PlatformParam::Profile => Some(&self.profile),
            PlatformParam::Extensions => Some(&self.extensions),
        }
    }
}

/// A simulated device.
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub name: String,
    pub vendor: String,
    pub vendor_id: u32,
    pub version: String,
    pub driver_version: String,
    pub class: DeviceClass,
    pub compute_units: u32,
    pub clock_mhz: u32,
    pub global_mem_size: u64,
    pub local_mem_size: u64,
    pub queue_properties: u64,
    /// Status reported for this device by `create_program_with_binary`.
    pub binary_status: ClStatus,
    /// Attributes whose queries fail with `CL_INVALID_VALUE`.
    pub unsupported: Vec<DeviceParam>,
}

impl SimDevice {
    pub fn new(name: &str, class: DeviceClass) -> Self {
        Self {
            name: name.to_string(),
            vendor: "Simulated".to_string(),
            vendor_id: 0,
            version: "OpenCL 1.2".to_string(),
            driver_version: "1.0".to_string(),
            class,
            compute_units: 1,
            clock_mhz: 300,
            global_mem_size: 8 << 30,
            local_mem_size: 16 << 10,
            queue_properties: QUEUE_OUT_OF_ORDER_EXEC_MODE_ENABLE | QUEUE_PROFILING_ENABLE,
            binary_status: ClStatus::SUCCESS,
            unsupported: Vec::new(),
        }
    }

    pub fn with_vendor(mut self, vendor: &str, vendor_id: u32) -> Self {
        self.vendor = vendor.to_string();
        self.vendor_id = vendor_id;
        self
    }

    pub fn with_compute(mut self, compute_units: u32, clock_mhz: u32) -> Self {
        self.compute_units = compute_units;
        self.clock_mhz = clock_mhz;
        self
    }

    pub fn with_binary_status(mut self, status: ClStatus) -> Self {
        self.binary_status = status;
        self
    }

    pub fn without(mut self, param: DeviceParam) -> Self {
        self.unsupported.push(param);
        self
    }

    fn info(&self, param: DeviceParam) -> Option<Vec<u8>> {
        if self.unsupported.contains(&param) {
            return None;
        }
        let uint = |v: u32| v.to_ne_bytes().to_vec();
        let ulong = |v: u64| v.to_ne_bytes().to_vec();
        let bytes = match param {
            DeviceParam::Type => ulong(self.class.bits()),
            DeviceParam::VendorId => uint(self.vendor_id),
            DeviceParam::MaxComputeUnits => uint(self.compute_units),
            DeviceParam::MaxWorkItemDimensions => uint(3),
            DeviceParam::PreferredVectorWidthChar => uint(16),
            DeviceParam::PreferredVectorWidthShort => uint(8),
            DeviceParam::PreferredVectorWidthInt => uint(4),
            DeviceParam::PreferredVectorWidthLong => uint(2),
            DeviceParam::PreferredVectorWidthFloat => uint(4),
            DeviceParam::PreferredVectorWidthDouble => uint(0),
            DeviceParam::MaxClockFrequency => uint(self.clock_mhz),
            DeviceParam::AddressBits => uint(64),
            DeviceParam::ImageSupport => uint(0),
            DeviceParam::MemBaseAddrAlign => uint(1024),
            DeviceParam::MinDataTypeAlignSize => uint(128),
            DeviceParam::GlobalMemCachelineSize => uint(64),
            DeviceParam::GlobalMemCacheSize => ulong(32 << 10),
            DeviceParam::GlobalMemSize => ulong(self.global_mem_size),
            DeviceParam::MaxConstantBufferSize => ulong(64 << 10),
            DeviceParam::MaxConstantArgs => uint(8),
            DeviceParam::LocalMemSize => ulong(self.local_mem_size),
            DeviceParam::EndianLittle => uint(u32::from(cfg!(target_endian = "little"))),
            DeviceParam::Available => uint(1),
            DeviceParam::QueueProperties => ulong(self.queue_properties),
            DeviceParam::Name => nul_terminated(&self.name),
            DeviceParam::Vendor => nul_terminated(&self.vendor),
            DeviceParam::DriverVersion => nul_terminated(&self.driver_version),
            DeviceParam::Version => nul_terminated(&self.version),
        };
        debug_assert!(
            param.kind() == InfoKind::String || param.kind().width() == Some(bytes.len())
        );
        Some(bytes)
    }
}

/// Failures to inject into specific driver calls.
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    pub platform_count: Option<ClStatus>,
    pub platform_fetch: Option<ClStatus>,
    pub device_count: Option<ClStatus>,
    pub device_fetch: Option<ClStatus>,
    pub info_size: Option<ClStatus>,
    pub info_fetch: Option<ClStatus>,
    pub context: Option<ClStatus>,
    /// Overrides the aggregate status of program creation.
    pub program_status: Option<ClStatus>,
    /// Return a program handle even when some device rejected its binary.
    pub program_despite_failures: bool,
    /// Truncate the per-device status vector to this length.
    pub binary_status_len: Option<usize>,
}

/// Handle of a simulated platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimPlatformId(pub usize);

/// Handle of a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimDeviceId {
    pub platform: usize,
    pub index: usize,
}

#[derive(Debug)]
pub struct SimContext {
    pub devices: Vec<SimDeviceId>,
}

/// A program built by the simulated driver. Dropping it releases it.
#[derive(Debug)]
pub struct SimProgram {
    pub devices: Vec<SimDeviceId>,
    pub binary_len: usize,
    live: Arc<AtomicUsize>,
}

impl Drop for SimProgram {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A completed command with profiling counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    /// `(start, end)` in nanoseconds, `None` when the queue had profiling off.
    pub profile: Option<(u64, u64)>,
}

impl SimEvent {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            profile: Some((start, end)),
        }
    }

    pub fn unprofiled() -> Self {
        Self { profile: None }
    }
}

/// Deterministic in-memory driver.
#[derive(Debug, Clone, Default)]
pub struct SimDriver {
    platforms: Vec<SimPlatform>,
    faults: SimFaults,
    live_programs: Arc<AtomicUsize>,
}

impl SimDriver {
    pub fn new(platforms: Vec<SimPlatform>) -> Self {
        Self {
            platforms,
            faults: SimFaults::default(),
            live_programs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A machine with no OpenCL platforms.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// An FPGA board next to a GPU and a CPU runtime.
    pub fn reference() -> Self {
        Self::new(vec![
            SimPlatform::new("Intel(R) FPGA SDK for OpenCL(TM)", "Intel(R) Corporation")
                .with_version("OpenCL 1.0 Intel(R) FPGA SDK for OpenCL(TM), Version 20.3")
                .with_profile("EMBEDDED_PROFILE")
                .with_device(
                    SimDevice::new(
                        "pac_a10 : Intel PAC Platform (pac_ee00000)",
                        DeviceClass::Accelerator,
                    )
                    .with_vendor("Intel Corp", 0x1172)
                    .with_compute(1, 240),
                ),
            SimPlatform::new("NVIDIA CUDA", "NVIDIA Corporation")
                .with_version("OpenCL 3.0 CUDA 12.2.148")
                .with_device(
                    SimDevice::new("NVIDIA GeForce RTX 3080", DeviceClass::Gpu)
                        .with_vendor("NVIDIA Corporation", 0x10de)
                        .with_compute(68, 1710),
                ),
            SimPlatform::new("Portable Computing Language", "The pocl project")
                .with_version("OpenCL 3.0 PoCL 5.0")
                .with_device(
                    SimDevice::new("cpu-haswell-Intel(R) Core(TM) i7-4770", DeviceClass::Cpu)
                        .with_vendor("GenuineIntel", 0x8086)
                        .with_compute(8, 3400),
                ),
        ])
    }

    pub fn with_faults(mut self, faults: SimFaults) -> Self {
        self.faults = faults;
        self
    }

    pub fn platforms(&self) -> &[SimPlatform] {
        &self.platforms
    }

    /// Programs created by this driver that have not been dropped yet.
    pub fn live_programs(&self) -> usize {
        self.live_programs.load(Ordering::SeqCst)
    }

    fn platform(&self, id: SimPlatformId) -> DriverResult<&SimPlatform> {
        self.platforms.get(id.0).ok_or(ClStatus::INVALID_PLATFORM)
    }

    fn device(&self, id: SimDeviceId) -> DriverResult<&SimDevice> {
        self.platforms
            .get(id.platform)
            .and_then(|p| p.devices.get(id.index))
            .ok_or(ClStatus::INVALID_DEVICE)
    }

    fn matching(
        &self,
        platform: SimPlatformId,
        class: DeviceClass,
    ) -> DriverResult<Vec<SimDeviceId>> {
        let p = self.platform(platform)?;
        let ids = p
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| class.includes(d.class))
            .map(|(index, _)| SimDeviceId {
                platform: platform.0,
                index,
            });
        // The platform's default device is its first one.
        let ids: Vec<_> = if class == DeviceClass::Default {
            (0..p.devices.len().min(1))
                .map(|index| SimDeviceId {
                    platform: platform.0,
                    index,
                })
                .collect()
        } else {
            ids.collect()
        };
        Ok(ids)
    }
}

fn fail(fault: Option<ClStatus>) -> DriverResult<()> {
    match fault {
        Some(status) => Err(status),
        None => Ok(()),
    }
}

fn sized(bytes: &[u8], size: usize) -> DriverResult<Vec<u8>> {
    if size < bytes.len() {
        return Err(ClStatus::INVALID_VALUE);
    }
    let mut buf = vec![0u8; size];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

fn nul_terminated(s: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s.as_bytes());
    bytes.push(0);
    bytes
}

fn to_count(len: usize) -> DriverResult<u32> {
    u32::try_from(len).map_err(|_| ClStatus::INVALID_VALUE)
}

impl ClDriver for SimDriver {
    type Platform = SimPlatformId;
    type Device = SimDeviceId;
    type Context = SimContext;
    type Program = SimProgram;
    type Event = SimEvent;

    fn platform_count(&self) -> DriverResult<u32> {
        fail(self.faults.platform_count)?;
        to_count(self.platforms.len())
    }

    fn fetch_platforms(&self, count: u32) -> DriverResult<Vec<SimPlatformId>> {
        fail(self.faults.platform_fetch)?;
        if count == 0 {
            return Err(ClStatus::INVALID_VALUE);
        }
        Ok((0..self.platforms.len().min(count as usize)).map(SimPlatformId).collect())
    }

    fn device_count(&self, platform: SimPlatformId, class: DeviceClass) -> DriverResult<u32> {
        fail(self.faults.device_count)?;
        let ids = self.matching(platform, class)?;
        if ids.is_empty() {
            return Err(ClStatus::DEVICE_NOT_FOUND);
        }
        to_count(ids.len())
    }

    fn fetch_devices(
        &self,
        platform: SimPlatformId,
        class: DeviceClass,
        count: u32,
    ) -> DriverResult<Vec<SimDeviceId>> {
        fail(self.faults.device_fetch)?;
        if count == 0 {
            return Err(ClStatus::INVALID_VALUE);
        }
        let mut ids = self.matching(platform, class)?;
        if ids.is_empty() {
            return Err(ClStatus::DEVICE_NOT_FOUND);
        }
        ids.truncate(count as usize);
        Ok(ids)
    }

    fn platform_info_size(
        &self,
        platform: SimPlatformId,
        param: PlatformParam,
    ) -> DriverResult<usize> {
        fail(self.faults.info_size)?;
        let value = self.platform(platform)?.info(param).ok_or(ClStatus::INVALID_VALUE)?;
        Ok(value.len() + 1)
    }

    fn fetch_platform_info(
        &self,
        platform: SimPlatformId,
        param: PlatformParam,
        size: usize,
    ) -> DriverResult<Vec<u8>> {
        fail(self.faults.info_fetch)?;
        let value = self.platform(platform)?.info(param).ok_or(ClStatus::INVALID_VALUE)?;
        sized(&nul_terminated(value), size)
    }

    fn device_info_size(&self, device: SimDeviceId, param: DeviceParam) -> DriverResult<usize> {
        fail(self.faults.info_size)?;
        let bytes = self.device(device)?.info(param).ok_or(ClStatus::INVALID_VALUE)?;
        Ok(bytes.len())
    }

    fn fetch_device_info(
        &self,
        device: SimDeviceId,
        param: DeviceParam,
        size: usize,
    ) -> DriverResult<Vec<u8>> {
        fail(self.faults.info_fetch)?;
        let bytes = self.device(device)?.info(param).ok_or(ClStatus::INVALID_VALUE)?;
        sized(&bytes, size)
    }

    fn create_context(&self, devices: &[SimDeviceId]) -> DriverResult<SimContext> {
        fail(self.faults.context)?;
        if devices.is_empty() {
            return Err(ClStatus::INVALID_VALUE);
        }
        for &id in devices {
            self.device(id)?;
        }
        Ok(SimContext {
            devices: devices.to_vec(),
        })
    }

    fn create_program_with_binary(
        &self,
        context: &SimContext,
        devices: &[SimDeviceId],
        binaries: &[&[u8]],
    ) -> ProgramCreation<SimProgram> {
        let rejected = |status| ProgramCreation {
            program: None,
            status,
            binary_status: Vec::new(),
        };
        if devices.is_empty() || devices.len() != binaries.len() {
            return rejected(ClStatus::INVALID_VALUE);
        }
        if devices.iter().any(|d| !context.devices.contains(d)) {
            return rejected(ClStatus::INVALID_DEVICE);
        }

        let mut binary_status = Vec::with_capacity(devices.len());
        for (&id, binary) in devices.iter().zip(binaries) {
            let status = match self.device(id) {
                Ok(_) if binary.is_empty() => ClStatus::INVALID_VALUE,
                Ok(device) => device.binary_status,
                Err(status) => status,
            };
            trace!(?id, bytes = binary.len(), %status, "simulated binary load");
            binary_status.push(status);
        }

        let all_loaded = binary_status.iter().all(|s| s.is_success());
        let status = self.faults.program_status.unwrap_or(if all_loaded {
            ClStatus::SUCCESS
        } else {
            ClStatus::INVALID_BINARY
        });
        if let Some(len) = self.faults.binary_status_len {
            binary_status.truncate(len);
        }

        let program = (all_loaded || self.faults.program_despite_failures).then(|| {
            self.live_programs.fetch_add(1, Ordering::SeqCst);
            SimProgram {
                devices: devices.to_vec(),
                binary_len: binaries[0].len(),
                live: Arc::clone(&self.live_programs),
            }
        });

        ProgramCreation {
            program,
            status,
            binary_status,
        }
    }

    fn event_profiling_info(&self, event: &SimEvent, param: ProfilingParam) -> DriverResult<u64> {
        let (start, end) = event.profile.ok_or(ClStatus::PROFILING_INFO_NOT_AVAILABLE)?;
        Ok(match param {
            ProfilingParam::Queued | ProfilingParam::Submit | ProfilingParam::Start => start,
            ProfilingParam::End => end,
        })
    }
}
