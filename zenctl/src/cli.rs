//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// AMD P-state and C6 idle-state control over the Linux msr interface.
#[derive(Debug, Parser)]
#[command(name = crate::NAME, version, about)]
pub struct Cli {
    /// Raise log verbosity to debug.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Alternate configuration file.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the eight P-states and the C6 idle-state enablement.
    List,

    /// Read one P-state, apply field changes as a combined update, and
    /// write it back to all CPUs if anything changed.
    Pstate {
        /// P-state slot, 0 through 7.
        #[arg(value_parser = clap::value_parser!(u8).range(0..8))]
        slot: u8,

        /// Set the enable bit.
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Clear the enable bit.
        #[arg(long)]
        disable: bool,

        /// New frequency identifier, hex.
        #[arg(long, value_parser = parse_hex)]
        fid: Option<u64>,

        /// New divisor identifier, hex.
        #[arg(long, value_parser = parse_hex)]
        did: Option<u64>,

        /// New voltage identifier, hex.
        #[arg(long, value_parser = parse_hex)]
        vid: Option<u64>,
    },

    /// Toggle the package and core C6 idle states together.
    C6 {
        #[arg(value_enum)]
        action: C6Action,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum C6Action {
    Enable,
    Disable,
}

/// Parses a hex field value, with or without a 0x prefix. Malformed input
/// aborts the operation before any register is touched.
fn parse_hex(raw: &str) -> Result<u64, String> {
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).map_err(|err| format!("invalid hex value {raw:?}: {err}"))
}
