//! Subcommand implementations, generic over the driver.

use std::path::PathBuf;

use clap::Args;
use exelixi_host::driver::ClDriver;
use exelixi_host::values::parse_int;
use exelixi_host::{
    ClStatus, DeviceClass, FatalError, HostConfig, OrFatal, create_program_from_binary,
    describe_device, device_name, find_platform, list_devices, now, platform_name, print_clinfo,
    translate_error,
};
use tracing::{debug, info};

use crate::exit::{EXIT_NOT_FOUND, EXIT_SUCCESS};

/// Arguments of the `load` subcommand.
#[derive(Args, Debug)]
pub struct LoadCommand {
    /// Kernel binary to load
    #[arg(short, long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Substring of the platform name (case-insensitive)
    #[arg(short, long, value_name = "NAME")]
    pub platform: Option<String>,

    /// Device class to enumerate (default, cpu, gpu, accelerator, custom, all)
    #[arg(long, value_name = "CLASS")]
    pub device_class: Option<DeviceClass>,

    /// Build for every device instead of only the first one
    #[arg(long)]
    pub all_devices: bool,

    /// Print the attribute report of each selected device
    #[arg(long)]
    pub describe: bool,
}

impl LoadCommand {
    /// Find the platform, pick devices, create a context and build the
    /// program. Every handle is dropped before this returns.
    pub fn execute<D: ClDriver>(&self, driver: &D, config: &HostConfig) -> Result<i32, FatalError> {
        let search = self.platform.as_deref().unwrap_or(&config.platform_name);
        let binary = self.binary.as_ref().unwrap_or(&config.binary_path);
        let class = self.device_class.unwrap_or(config.device_class);
        let started = now();

        let platform = find_platform(driver, search)
            .or_fatal("ERROR: Unable to find the OpenCL platform.")?
            .ok_or_else(|| {
                FatalError::new(
                    ClStatus::CONFIGURATION_ERROR,
                    format!("ERROR: Unable to find the OpenCL platform matching {search:?}."),
                )
            })?;
        let name = platform_name(driver, platform).unwrap_or_default();
        println!("Platform: {name}");

        let mut devices = list_devices(driver, platform, class)
            .or_fatal("ERROR: Unable to find any device.")?;
        if devices.is_empty() {
            return Err(FatalError::new(
                ClStatus::DEVICE_NOT_FOUND,
                "ERROR: Unable to find any device.",
            ));
        }
        if !self.all_devices {
            devices = devices.truncate_to_first();
        }
        for (i, device) in devices.iter().enumerate() {
            println!("Device {i}: {}", device_name(driver, device).unwrap_or_default());
            if self.describe {
                print!("{}", describe_device(driver, device));
            }
        }

        let context = driver
            .create_context(devices.devices())
            .map_err(|status| FatalError::new(status, "ERROR: Failed to open the context."))?;
        let program = create_program_from_binary(driver, &context, binary, &devices)
            .or_fatal("ERROR: Failed to create the program.")?;

        let elapsed_ms = (now() - started) * 1e3;
        info!(platform = %name, devices = devices.len(), elapsed_ms, "program ready");
        println!(
            "Program created from {} for {} device(s) in {elapsed_ms:.3} ms",
            binary.display(),
            devices.len()
        );
        drop(program);
        drop(context);
        Ok(EXIT_SUCCESS)
    }
}

pub fn info<D: ClDriver>(driver: &D) -> Result<i32, FatalError> {
    print_clinfo(driver).or_fatal("ERROR: Unable to query the OpenCL platforms.")?;
    Ok(EXIT_SUCCESS)
}

pub fn find<D: ClDriver>(driver: &D, search: &str) -> Result<i32, FatalError> {
    let found = find_platform(driver, search)
        .or_fatal("ERROR: Unable to query the OpenCL platforms.")?;
    match found {
        Some(platform) => {
            println!("{}", platform_name(driver, platform).unwrap_or_default());
            Ok(EXIT_SUCCESS)
        }
        None => {
            eprintln!("no platform matching {search:?}");
            Ok(EXIT_NOT_FOUND)
        }
    }
}

pub fn translate(code: &str) -> Result<i32, FatalError> {
    let code = parse_int(code).map_err(|e| {
        FatalError::new(ClStatus::INVALID_VALUE, format!("ERROR: invalid status code: {e}"))
    })?;
    debug!(code, "translating status code");
    println!("{}", translate_error(code));
    Ok(EXIT_SUCCESS)
}
