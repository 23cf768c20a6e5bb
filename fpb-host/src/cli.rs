//! Command-line surface (`clap` derive), per §4.8's host workflow.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Host-side controller for FPBInject devices.
#[derive(Debug, Parser)]
#[command(name = "fpb", version, about = "Runtime function hot-patching for ARM Cortex-M over FPB")]
pub struct Cli {
    /// Serial device, e.g. /dev/ttyACM0 or COM3. Overrides the config file.
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    /// Baud rate. Overrides the config file.
    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    /// Path to a JSON config file.
    #[arg(long, global = true, default_value = "fpb-host.json")]
    pub config: PathBuf,

    /// Increase log verbosity (repeatable).
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Checks that the device responds.
    Ping,
    /// Prints the device's `info` response.
    Info,
    /// Compiles `source`, uploads it, and redirects `function` to it.
    Inject {
        /// ELF image currently running on the device.
        elf: PathBuf,
        /// C source file implementing the replacement function.
        source: PathBuf,
        /// Name of the Flash function being replaced.
        function: String,
        /// Comparator slot to install the redirect into.
        #[arg(long, default_value_t = 0)]
        slot: u8,
        /// Redirection back-end.
        #[arg(long, value_enum, default_value_t = BackendArg::Trampoline)]
        backend: BackendArg,
    },
    /// Clears a slot (or all slots) and frees its allocation.
    Unpatch {
        /// Slot to clear; omit with `--all` to clear every slot.
        #[arg(long)]
        slot: Option<u8>,
        /// Clear every active slot.
        #[arg(long)]
        all: bool,
    },
    /// Sends a raw command line and prints the response body.
    Raw {
        /// Full command line, e.g. `--cmd echo --data 48656c6c6f`.
        line: String,
    },
    /// Reads one interactive command line at a time from stdin.
    Shell,
}

/// `clap`-friendly mirror of [`crate::inject::Backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendArg {
    /// Direct FPB REMAP.
    Patch,
    /// Flash trampoline indirect jump.
    Trampoline,
    /// FPB breakpoint + DebugMonitor PC rewrite.
    Dpatch,
}

impl From<BackendArg> for crate::inject::Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Patch => crate::inject::Backend::Direct,
            BackendArg::Trampoline => crate::inject::Backend::Trampoline,
            BackendArg::Dpatch => crate::inject::Backend::DebugMonitor,
        }
    }
}
