//! CPU identification.
//!
//! The register layout encoded in [`crate::pstate`] is AMD family specific,
//! so write paths are gated on the CPUID vendor string unless the
//! configuration disables the gate.

use raw_cpuid::CpuId;

/// Vendor string AMD processors report through CPUID leaf 0.
pub const AMD_VENDOR: &str = "AuthenticAMD";

/// Whether the processor identifies as an AMD part.
pub fn is_amd() -> bool {
    CpuId::new()
        .get_vendor_info()
        .map_or(false, |vendor| vendor.as_str() == AMD_VENDOR)
}

/// Number of logical CPUs the OS reports. Used as a cross-check against the
/// msr device tree enumeration; a mismatch usually means offline CPUs or a
/// partially loaded msr module.
pub fn logical_count() -> usize {
    num_cpus::get()
}
