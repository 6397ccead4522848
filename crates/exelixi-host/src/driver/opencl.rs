//! [`ClDriver`] backed by the system OpenCL ICD loader.
//!
//! The two-phase queries and `clCreateProgramWithBinary` go through the raw
//! `opencl-sys` entry points because the safe `opencl3` wrappers hide the
//! count phase and the per-device binary status. Context and event ownership
//! use `opencl3`.

use std::ptr;

use opencl_sys::{
    cl_device_id, cl_int, cl_platform_id, cl_program, cl_uint, clCreateProgramWithBinary,
    clGetDeviceIDs, clGetDeviceInfo, clGetPlatformIDs, clGetPlatformInfo, clReleaseProgram,
    CL_SUCCESS,
};
use opencl3::context::Context;
use opencl3::event::Event;
use tracing::{debug, trace};

use super::{
    ClDriver, DeviceClass, DeviceParam, DriverResult, PlatformParam, ProfilingParam,
    ProgramCreation,
};
use crate::error::ClStatus;

fn status_result(status: cl_int) -> DriverResult<()> {
    if status == CL_SUCCESS {
        Ok(())
    } else {
        Err(ClStatus(status))
    }
}

fn to_cl_uint(len: usize) -> DriverResult<cl_uint> {
    cl_uint::try_from(len).map_err(|_| ClStatus::INVALID_VALUE)
}

/// Raw `cl_platform_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformId(cl_platform_id);

/// Raw `cl_device_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(cl_device_id);

/// Owned `cl_program`, released on drop.
#[derive(Debug)]
pub struct ClProgram(cl_program);

impl ClProgram {
    pub fn get(&self) -> cl_program {
        self.0
    }
}

impl Drop for ClProgram {
    fn drop(&mut self) {
        // SAFETY: the handle was returned non-null by clCreateProgramWithBinary
        // and this is its only owner.
        let status = unsafe { clReleaseProgram(self.0) };
        if status != CL_SUCCESS {
            debug!(status, "clReleaseProgram failed");
        }
    }
}

// SAFETY: OpenCL program objects are reference counted by the driver and may
// be released from any thread.
unsafe impl Send for ClProgram {}

/// Driver for the OpenCL runtime installed on this machine.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClDriver;

impl OpenClDriver {
    pub fn new() -> Self {
        Self
    }
}

impl ClDriver for OpenClDriver {
    type Platform = PlatformId;
    type Device = DeviceId;
    type Context = Context;
    type Program = ClProgram;
    type Event = Event;

    fn platform_count(&self) -> DriverResult<u32> {
        let mut count: cl_uint = 0;
        // SAFETY: count-only query, no output buffer.
        status_result(unsafe { clGetPlatformIDs(0, ptr::null_mut(), &mut count) })?;
        Ok(count)
    }

    fn fetch_platforms(&self, count: u32) -> DriverResult<Vec<PlatformId>> {
        let mut ids: Vec<cl_platform_id> = vec![ptr::null_mut(); count as usize];
        let mut returned: cl_uint = 0;
        // SAFETY: `ids` holds exactly `count` slots.
        status_result(unsafe { clGetPlatformIDs(count, ids.as_mut_ptr(), &mut returned) })?;
        ids.truncate(returned.min(count) as usize);
        Ok(ids.into_iter().map(PlatformId).collect())
    }

    fn device_count(&self, platform: PlatformId, class: DeviceClass) -> DriverResult<u32> {
        let mut count: cl_uint = 0;
        // SAFETY: count-only query, no output buffer.
        status_result(unsafe {
            clGetDeviceIDs(platform.0, class.bits(), 0, ptr::null_mut(), &mut count)
        })?;
        Ok(count)
    }

    fn fetch_devices(
        &self,
        platform: PlatformId,
        class: DeviceClass,
        count: u32,
    ) -> DriverResult<Vec<DeviceId>> {
        let mut ids: Vec<cl_device_id> = vec![ptr::null_mut(); count as usize];
        let mut returned: cl_uint = 0;
        // SAFETY: `ids` holds exactly `count` slots.
        status_result(unsafe {
            clGetDeviceIDs(platform.0, class.bits(), count, ids.as_mut_ptr(), &mut returned)
        })?;
        ids.truncate(returned.min(count) as usize);
        Ok(ids.into_iter().map(DeviceId).collect())
    }

    fn platform_info_size(
        &self,
        platform: PlatformId,
        param: PlatformParam,
    ) -> DriverResult<usize> {
        let mut size = 0usize;
        // SAFETY: size-only query, no output buffer.
        status_result(unsafe {
            clGetPlatformInfo(platform.0, param.code(), 0, ptr::null_mut(), &mut size)
        })?;
        Ok(size)
    }

    fn fetch_platform_info(
        &self,
        platform: PlatformId,
        param: PlatformParam,
        size: usize,
    ) -> DriverResult<Vec<u8>> {
        let mut buf = vec![0u8; size];
        // SAFETY: `buf` is `size` bytes long.
        status_result(unsafe {
            clGetPlatformInfo(
                platform.0,
                param.code(),
                size,
                buf.as_mut_ptr().cast(),
                ptr::null_mut(),
            )
        })?;
        Ok(buf)
    }

    fn device_info_size(&self, device: DeviceId, param: DeviceParam) -> DriverResult<usize> {
        let mut size = 0usize;
        // SAFETY: size-only query, no output buffer.
        status_result(unsafe {
            clGetDeviceInfo(device.0, param.code(), 0, ptr::null_mut(), &mut size)
        })?;
        Ok(size)
    }

    fn fetch_device_info(
        &self,
        device: DeviceId,
        param: DeviceParam,
        size: usize,
    ) -> DriverResult<Vec<u8>> {
        let mut buf = vec![0u8; size];
        // SAFETY: `buf` is `size` bytes long.
        status_result(unsafe {
            clGetDeviceInfo(device.0, param.code(), size, buf.as_mut_ptr().cast(), ptr::null_mut())
        })?;
        Ok(buf)
    }

    fn create_context(&self, devices: &[DeviceId]) -> DriverResult<Context> {
        let ids: Vec<opencl3::types::cl_device_id> =
            devices.iter().map(|device| device.0.cast()).collect();
        debug!(devices = ids.len(), "creating OpenCL context");
        Context::from_devices(&ids, &[], None, ptr::null_mut()).map_err(|e| ClStatus(e.0))
    }

    fn create_program_with_binary(
        &self,
        context: &Context,
        devices: &[DeviceId],
        binaries: &[&[u8]],
    ) -> ProgramCreation<ClProgram> {
        let rejected = |status: ClStatus| ProgramCreation {
            program: None,
            status,
            binary_status: Vec::new(),
        };
        if devices.len() != binaries.len() {
            return rejected(ClStatus::INVALID_VALUE);
        }
        let num_devices = match to_cl_uint(devices.len()) {
            Ok(n) => n,
            Err(status) => return rejected(status),
        };

        let ids: Vec<cl_device_id> = devices.iter().map(|device| device.0).collect();
        let lengths: Vec<usize> = binaries.iter().map(|binary| binary.len()).collect();
        let mut pointers: Vec<*const u8> = binaries.iter().map(|binary| binary.as_ptr()).collect();
        let mut binary_status: Vec<cl_int> = vec![CL_SUCCESS; devices.len()];
        let mut status: cl_int = CL_SUCCESS;

        trace!(num_devices, bytes = ?lengths, "clCreateProgramWithBinary");
        // SAFETY: every array holds `num_devices` entries and each binary
        // pointer is valid for its length for the duration of the call.
        let program = unsafe {
            clCreateProgramWithBinary(
                context.get().cast(),
                num_devices,
                ids.as_ptr(),
                lengths.as_ptr(),
                pointers.as_mut_ptr(),
                binary_status.as_mut_ptr(),
                &mut status,
            )
        };

        ProgramCreation {
            program: (!program.is_null()).then(|| ClProgram(program)),
            status: ClStatus(status),
            binary_status: binary_status.into_iter().map(ClStatus).collect(),
        }
    }

    fn event_profiling_info(&self, event: &Event, param: ProfilingParam) -> DriverResult<u64> {
        let value = match param {
            ProfilingParam::Queued => event.profiling_command_queued(),
            ProfilingParam::Submit => event.profiling_command_submit(),
            ProfilingParam::Start => event.profiling_command_start(),
            ProfilingParam::End => event.profiling_command_end(),
        };
        value.map_err(|e| ClStatus(e.0))
    }
}
