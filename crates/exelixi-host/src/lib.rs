//! Host-side support for launching precompiled kernels on OpenCL
//! accelerators, FPGA boards in particular.
//!
//! The usual acquisition sequence is:
//!
//! 1. [`find_platform`] by a case-insensitive substring of its name,
//! 2. [`list_devices`] of the wanted class on that platform,
//! 3. create a context with [`ClDriver::create_context`],
//! 4. [`create_program_from_binary`] with the offline-compiled `.aocx` image.
//!
//! Everything is generic over a [`ClDriver`]. Enable the `opencl` feature
//! for [`driver::opencl::OpenClDriver`]; [`sim::SimDriver`] is always
//! available for tests and machines without an OpenCL runtime.

pub mod aligned;
pub mod binary;
pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod fatal;
pub mod paths;
pub mod program;
pub mod sim;
pub mod timing;
pub mod values;

pub use aligned::{AlignedBuffer, DMA_ALIGNMENT};
pub use binary::{BinaryImage, load_binary_file};
pub use config::{ConfigError, HostConfig};
pub use diagnostics::{
    DeviceReport, SystemReport, describe_device, print_clinfo, print_device_info, print_error,
    system_report,
};
pub use discovery::{
    DeviceList, device_name, find_platform, list_devices, list_platforms, platform_info,
    platform_name,
};
pub use driver::{ClDriver, DeviceClass};
pub use error::{ClStatus, HostError, Result, check, translate_error};
pub use fatal::{CleanupGuard, FatalError, OrFatal, check_or_abort};
pub use paths::{file_exists, set_cwd_to_exec_dir};
pub use program::{build_program, create_program_from_binary};
pub use timing::{elapsed, elapsed_span, now, wait_ms};
