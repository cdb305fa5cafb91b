//! AMD P-state and C6 idle-state control over the Linux msr device interface.
//!
//! The core of the crate is the [`pstate`] field codec (raw 64-bit register
//! images to and from FID/DID/VID/enable fields) and the [`msr`] transport
//! (positioned 8-byte reads and writes against `/dev/cpu/<N>/msr`, with
//! best-effort fan-out across all logical CPUs). Everything else is plumbing
//! around those two pieces.

// Public modules
pub mod cli;
pub mod commands;
pub mod config;
pub mod cpu;
pub mod logger;
pub mod msr;
pub mod pstate;

// Crate constants
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "zenctl";
