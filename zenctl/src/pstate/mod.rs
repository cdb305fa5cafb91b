//! P-state and C6 control register layout and field codec.
//!
//! Everything here is a pure transform on a raw 64-bit register image;
//! nothing in this module touches hardware. Decoding never fails: any 64-bit
//! input is a legal (if physically meaningless) image. Encoding never fails
//! either: a field value wider than its span is silently truncated to the
//! span width, matching the truncation the register itself applies to
//! oversized writes.

use core::ops::Range;
use std::fmt;

use bit_field::BitField;

/// P-state control registers, slot 0 through slot 7.
pub const PSTATE_MSRS: [u32; 8] = [
    0xC001_0064,
    0xC001_0065,
    0xC001_0066,
    0xC001_0067,
    0xC001_0068,
    0xC001_0069,
    0xC001_006A,
    0xC001_006B,
];

/// Package-level C6 control register.
pub const MSR_C6_PACKAGE: u32 = 0xC001_0292;

/// Core-level C6 control register.
pub const MSR_C6_CORE: u32 = 0xC001_0296;

/// Frequency identifier span.
pub const FID_BITS: Range<usize> = 0..8;

/// Divisor identifier span.
pub const DID_BITS: Range<usize> = 8..14;

/// Voltage identifier span.
pub const VID_BITS: Range<usize> = 14..22;

/// P-state enable bit.
pub const PSTATE_EN_BIT: usize = 63;

/// Package C6 enable bit.
pub const C6_PACKAGE_EN_BIT: usize = 32;

/// Core C6 enable bits, one per core cluster slot. All three are set and
/// cleared together; a partial set decodes as disabled.
pub const C6_CORE_EN_BITS: [usize; 3] = [6, 14, 22];

/// Replaces the targeted bit span of `value` with `field` and leaves every
/// other bit untouched. `field` is masked to the span width first, so an
/// oversized input loses its high bits silently rather than erroring.
pub fn set_field(value: u64, bits: Range<usize>, field: u64) -> u64 {
    let width = bits.end - bits.start;
    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let mut out = value;
    out.set_bits(bits, field & mask);
    out
}

/// Replaces the frequency identifier, bits [0, 8).
pub fn set_fid(value: u64, fid: u64) -> u64 {
    set_field(value, FID_BITS, fid)
}

/// Replaces the divisor identifier, bits [8, 14).
pub fn set_did(value: u64, did: u64) -> u64 {
    set_field(value, DID_BITS, did)
}

/// Replaces the voltage identifier, bits [14, 22).
pub fn set_vid(value: u64, vid: u64) -> u64 {
    set_field(value, VID_BITS, vid)
}

/// Sets or clears the P-state enable bit.
pub fn set_enabled(value: u64, enabled: bool) -> u64 {
    let mut out = value;
    out.set_bit(PSTATE_EN_BIT, enabled);
    out
}

/// Whether the package-level C6 idle state is enabled.
pub fn c6_package_enabled(value: u64) -> bool {
    value.get_bit(C6_PACKAGE_EN_BIT)
}

/// Whether the core-level C6 idle state is enabled. All three enable bits
/// must be set; a mixed state is reported as disabled.
pub fn c6_core_enabled(value: u64) -> bool {
    C6_CORE_EN_BITS.iter().all(|&bit| value.get_bit(bit))
}

/// Sets or clears the package C6 enable bit.
pub fn set_c6_package(value: u64, enabled: bool) -> u64 {
    let mut out = value;
    out.set_bit(C6_PACKAGE_EN_BIT, enabled);
    out
}

/// Sets or clears all three core C6 enable bits as one value transform; a
/// partial application is never produced.
pub fn set_c6_core(value: u64, enabled: bool) -> u64 {
    let mut out = value;
    for &bit in &C6_CORE_EN_BITS {
        out.set_bit(bit, enabled);
    }
    out
}

/// Clock ratio derived from the frequency and divisor identifiers. A zero
/// divisor has no defined ratio and yields `None`.
pub fn ratio(fid: u8, did: u8) -> Option<f64> {
    if did == 0 {
        return None;
    }
    Some(25.0 * f64::from(fid) / (12.5 * f64::from(did)))
}

/// Core voltage in volts for a raw VID code: `1.55 - 0.00625 * vid`. The
/// constants are specific to the Zen family parts this tool targets, not a
/// universal mapping. High VID codes produce values below zero; the codec
/// preserves them so observed register values round-trip, and the display
/// layer flags them instead.
pub fn vcore(vid: u8) -> f64 {
    1.55 - 0.00625 * f64::from(vid)
}

/// Decoded view of a P-state control register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PState {
    pub enabled: bool,
    pub fid: u8,
    pub did: u8,
    pub vid: u8,
}

impl PState {
    /// Decodes a raw register image. When the enable bit is clear the field
    /// values are still extracted numerically but carry no meaning and are
    /// not rendered.
    pub fn decode(value: u64) -> Self {
        Self {
            enabled: value.get_bit(PSTATE_EN_BIT),
            fid: value.get_bits(FID_BITS) as u8,
            did: value.get_bits(DID_BITS) as u8,
            vid: value.get_bits(VID_BITS) as u8,
        }
    }
}

impl fmt::Display for PState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "Disabled");
        }
        write!(
            f,
            "Enabled - FID = {:X} - DID = {:X} - VID = {:X}",
            self.fid, self.did, self.vid
        )?;
        match ratio(self.fid, self.did) {
            Some(r) => write!(f, " - Ratio = {r:.2}")?,
            None => write!(f, " - Ratio = n/a")?,
        }
        let volts = vcore(self.vid);
        if volts < 0.0 {
            write!(f, " - vCore = {volts:.5} (out of range)")
        } else {
            write!(f, " - vCore = {volts:.5}")
        }
    }
}
