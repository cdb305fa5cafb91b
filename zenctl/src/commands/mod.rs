//! The operations behind the command surface: list, select-and-modify, and
//! the C6 toggle.
//!
//! Current register values are sampled on CPU 0; writes fan out to every
//! logical CPU through the transport's best-effort loop.

use std::fmt;

use crate::config::ZenctlConfig;
use crate::cpu;
use crate::msr::{CpuTarget, FanOutReport, MsrError, MsrTransport};
use crate::pstate::{self, PState};

/// CPU current values are sampled from before a modify.
const SAMPLE_CPU: usize = 0;

#[derive(Debug)]
pub enum CommandError {
    Msr(MsrError),
    /// Write refused because the processor is not an AMD part.
    UnsupportedCpu,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Msr(err) => write!(f, "{err}"),
            CommandError::UnsupportedCpu => write!(
                f,
                "processor does not identify as {}; set require_amd = false in the configuration to override",
                cpu::AMD_VENDOR
            ),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Msr(err) => Some(err),
            CommandError::UnsupportedCpu => None,
        }
    }
}

impl From<MsrError> for CommandError {
    fn from(err: MsrError) -> Self {
        CommandError::Msr(err)
    }
}

/// Field changes requested for one P-state slot.
#[derive(Debug, Default, Clone, Copy)]
pub struct PStateUpdate {
    pub enable: bool,
    pub disable: bool,
    pub fid: Option<u64>,
    pub did: Option<u64>,
    pub vid: Option<u64>,
}

impl PStateUpdate {
    /// Applies the requested changes to a raw register image as one
    /// combined update. Untouched fields and all reserved bits pass through
    /// unchanged.
    pub fn apply(&self, value: u64) -> u64 {
        let mut out = value;
        if self.enable {
            out = pstate::set_enabled(out, true);
        }
        if self.disable {
            out = pstate::set_enabled(out, false);
        }
        if let Some(fid) = self.fid {
            out = pstate::set_fid(out, fid);
        }
        if let Some(did) = self.did {
            out = pstate::set_did(out, did);
        }
        if let Some(vid) = self.vid {
            out = pstate::set_vid(out, vid);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        !self.enable
            && !self.disable
            && self.fid.is_none()
            && self.did.is_none()
            && self.vid.is_none()
    }
}

fn ensure_amd(config: &ZenctlConfig) -> Result<(), CommandError> {
    if config.require_amd && !cpu::is_amd() {
        return Err(CommandError::UnsupportedCpu);
    }
    Ok(())
}

fn report_fan_out(report: &FanOutReport) {
    if report.all_failed() {
        log::error!("write did not land on any CPU");
    } else if !report.failures.is_empty() {
        log::warn!(
            "write landed on {} CPUs, failed on {}",
            report.written.len(),
            report.failures.len()
        );
    }
}

fn enabled_str(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Lists all eight P-states and the C6 enablement. A read failure on one
/// slot is reported and the listing continues.
pub fn list(transport: &MsrTransport) -> Result<(), CommandError> {
    for (slot, &msr) in pstate::PSTATE_MSRS.iter().enumerate() {
        match transport.read(msr, SAMPLE_CPU) {
            Ok(value) => {
                let state = PState::decode(value);
                if state.enabled && pstate::vcore(state.vid) < 0.0 {
                    log::warn!("P{slot}: VID {:#04X} maps below zero volts", state.vid);
                }
                println!("P{slot} - {state}");
            }
            Err(err) => log::error!("P{slot}: {err}"),
        }
    }

    match transport.read(pstate::MSR_C6_PACKAGE, SAMPLE_CPU) {
        Ok(value) => {
            println!(
                "C6 State - Package - {}",
                enabled_str(pstate::c6_package_enabled(value))
            );
            match transport.read(pstate::MSR_C6_CORE, SAMPLE_CPU) {
                Ok(value) => println!(
                    "C6 State - Core - {}",
                    enabled_str(pstate::c6_core_enabled(value))
                ),
                Err(err) => log::error!("C6 core state: {err}"),
            }
        }
        Err(err) => log::error!("C6 package state: {err}"),
    }
    Ok(())
}

/// Reads the slot's current value, applies the requested field changes as
/// one combined update, and writes the result back to all CPUs only when it
/// differs from the value read.
pub fn modify_pstate(
    transport: &MsrTransport,
    config: &ZenctlConfig,
    slot: usize,
    update: PStateUpdate,
) -> Result<(), CommandError> {
    ensure_amd(config)?;

    let msr = pstate::PSTATE_MSRS[slot];
    let old = transport.read(msr, SAMPLE_CPU)?;
    println!("Current P{slot}: {}", PState::decode(old));

    if update.is_empty() {
        log::info!("no changes requested");
        return Ok(());
    }
    if update.enable {
        log::info!("enabling state");
    }
    if update.disable {
        log::info!("disabling state");
    }
    if let Some(fid) = update.fid {
        log::info!("setting FID to {fid:X}");
    }
    if let Some(did) = update.did {
        log::info!("setting DID to {did:X}");
    }
    if let Some(vid) = update.vid {
        log::info!("setting VID to {vid:X}");
    }

    let new = update.apply(old);
    if new == old {
        log::info!("P{slot} already matches the requested fields");
        return Ok(());
    }

    let report = transport.write_target(msr, new, CpuTarget::All)?;
    report_fan_out(&report);
    println!("New P{slot}: {}", PState::decode(new));
    Ok(())
}

/// Enables or disables the package and core C6 idle states together as one
/// logical action spanning the two control registers.
pub fn set_c6(
    transport: &MsrTransport,
    config: &ZenctlConfig,
    enable: bool,
) -> Result<(), CommandError> {
    ensure_amd(config)?;

    let package = transport.read(pstate::MSR_C6_PACKAGE, SAMPLE_CPU)?;
    let report = transport.write_target(
        pstate::MSR_C6_PACKAGE,
        pstate::set_c6_package(package, enable),
        CpuTarget::All,
    )?;
    report_fan_out(&report);

    let core = transport.read(pstate::MSR_C6_CORE, SAMPLE_CPU)?;
    let report = transport.write_target(
        pstate::MSR_C6_CORE,
        pstate::set_c6_core(core, enable),
        CpuTarget::All,
    )?;
    report_fan_out(&report);

    println!("{} C6 state", enabled_str(enable));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_update_touches_only_requested_fields() {
        let update = PStateUpdate {
            enable: true,
            fid: Some(0x66),
            vid: Some(0x20),
            ..Default::default()
        };
        let before = 0x0000_0001_0011_2233u64; // reserved bit 32 set
        let after = update.apply(before);

        assert_eq!(after & (1 << 32), 1 << 32);
        let state = PState::decode(after);
        assert!(state.enabled);
        assert_eq!(state.fid, 0x66);
        assert_eq!(state.vid, 0x20);
        assert_eq!(state.did, PState::decode(before).did);
    }

    #[test]
    fn empty_update_is_identity() {
        let update = PStateUpdate::default();
        assert!(update.is_empty());
        assert_eq!(update.apply(0x8000_0000_0011_2233), 0x8000_0000_0011_2233);
    }

    #[test]
    fn oversized_field_request_truncates_like_hardware() {
        let update = PStateUpdate {
            did: Some(0x7C5),
            ..Default::default()
        };
        let state = PState::decode(update.apply(0));
        assert_eq!(state.did, (0x7C5 % (1 << 6)) as u8);
    }

    #[test]
    fn vendor_gate_can_be_disabled() {
        let config = ZenctlConfig {
            require_amd: false,
            ..Default::default()
        };
        assert!(ensure_amd(&config).is_ok());
    }
}
