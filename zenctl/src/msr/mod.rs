//! Register transport over the Linux per-CPU msr device nodes.
//!
//! Each read or write opens `<root>/<cpu>/msr`, performs a single positioned
//! 8-byte little-endian access at the register address, and drops the handle
//! again. No handle outlives one operation, there is no retry, and there is
//! no cross-call state. Fan-out across CPUs is a sequential loop in
//! ascending index order, so its ordering is deterministic and reproducible.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

/// Default root of the per-CPU device tree exposed by the msr kernel module.
pub const DEFAULT_DEVICE_ROOT: &str = "/dev/cpu";

/// Target of a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuTarget {
    /// One logical CPU by index.
    Single(usize),
    /// Every available logical CPU, best effort.
    All,
}

/// Transport errors. Each variant carries the underlying I/O cause so the
/// caller can tell a missing device from a permission denial from a register
/// the silicon does not implement.
#[derive(Debug)]
pub enum MsrError {
    /// The per-CPU device node could not be opened (absent or offline CPU,
    /// missing msr module, insufficient privilege).
    Open { cpu: usize, source: io::Error },
    /// The positioned read failed after a successful open.
    Read { msr: u32, cpu: usize, source: io::Error },
    /// The positioned write failed after a successful open.
    Write { msr: u32, cpu: usize, source: io::Error },
    /// The device root could not be scanned for CPUs.
    Enumerate { root: PathBuf, source: io::Error },
}

impl fmt::Display for MsrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MsrError::Open { cpu, source } => {
                write!(f, "cannot open msr device for cpu{cpu}: {source}")
            }
            MsrError::Read { msr, cpu, source } => {
                write!(f, "read of register {msr:#010X} on cpu{cpu} failed: {source}")
            }
            MsrError::Write { msr, cpu, source } => {
                write!(f, "write of register {msr:#010X} on cpu{cpu} failed: {source}")
            }
            MsrError::Enumerate { root, source } => {
                write!(f, "cannot enumerate cpus under {}: {source}", root.display())
            }
        }
    }
}

impl std::error::Error for MsrError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MsrError::Open { source, .. }
            | MsrError::Read { source, .. }
            | MsrError::Write { source, .. }
            | MsrError::Enumerate { source, .. } => Some(source),
        }
    }
}

/// Outcome of a fan-out write. Partial failure is reported here instead of
/// being hidden behind a bare success return.
#[derive(Debug, Default)]
pub struct FanOutReport {
    /// CPUs the write landed on, in attempt order.
    pub written: Vec<usize>,
    /// CPUs the write failed on, with the cause.
    pub failures: Vec<(usize, MsrError)>,
}

impl FanOutReport {
    /// True when the write landed on no CPU at all.
    pub fn all_failed(&self) -> bool {
        self.written.is_empty() && !self.failures.is_empty()
    }
}

/// Handle-less transport: only the device root is held, device nodes are
/// opened immediately before each access and released on every exit path.
#[derive(Debug, Clone)]
pub struct MsrTransport {
    device_root: PathBuf,
}

impl Default for MsrTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MsrTransport {
    /// Transport over the standard `/dev/cpu` tree.
    pub fn new() -> Self {
        Self::with_root(DEFAULT_DEVICE_ROOT)
    }

    /// Transport rooted at an alternate device tree, for configuration
    /// overrides and tests.
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            device_root: root.into(),
        }
    }

    fn device_path(&self, cpu: usize) -> PathBuf {
        self.device_root.join(cpu.to_string()).join("msr")
    }

    /// All available logical CPU indices, ascending. Non-numeric entries
    /// under the device root (such as `microcode`) are ignored.
    pub fn cpus(&self) -> Result<Vec<usize>, MsrError> {
        let entries = std::fs::read_dir(&self.device_root).map_err(|source| MsrError::Enumerate {
            root: self.device_root.clone(),
            source,
        })?;
        let mut cpus = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MsrError::Enumerate {
                root: self.device_root.clone(),
                source,
            })?;
            if let Ok(cpu) = entry.file_name().to_string_lossy().parse::<usize>() {
                cpus.push(cpu);
            }
        }
        cpus.sort_unstable();
        Ok(cpus)
    }

    /// Reads one register on one CPU: a single positioned 8-byte
    /// little-endian read at byte offset `msr`.
    pub fn read(&self, msr: u32, cpu: usize) -> Result<u64, MsrError> {
        let device = File::open(self.device_path(cpu))
            .map_err(|source| MsrError::Open { cpu, source })?;
        let mut buf = [0u8; 8];
        device
            .read_exact_at(&mut buf, u64::from(msr))
            .map_err(|source| MsrError::Read { msr, cpu, source })?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Writes one register on one CPU: a single positioned 8-byte
    /// little-endian write at byte offset `msr`.
    pub fn write(&self, msr: u32, value: u64, cpu: usize) -> Result<(), MsrError> {
        let device = OpenOptions::new()
            .write(true)
            .open(self.device_path(cpu))
            .map_err(|source| MsrError::Open { cpu, source })?;
        device
            .write_all_at(&value.to_le_bytes(), u64::from(msr))
            .map_err(|source| MsrError::Write { msr, cpu, source })?;
        Ok(())
    }

    /// Fans a write out to every available CPU in ascending order. A failure
    /// on one CPU is logged and recorded in the report but does not abort
    /// the remaining attempts and does not fail the operation: partial
    /// success across a heterogeneous or partially-offline CPU set beats
    /// aborting. Only a failure to enumerate CPUs is a hard error.
    pub fn write_all(&self, msr: u32, value: u64) -> Result<FanOutReport, MsrError> {
        let mut report = FanOutReport::default();
        for cpu in self.cpus()? {
            match self.write(msr, value, cpu) {
                Ok(()) => report.written.push(cpu),
                Err(err) => {
                    log::warn!("cpu{cpu}: {err}");
                    report.failures.push((cpu, err));
                }
            }
        }
        Ok(report)
    }

    /// Dispatches a write on the target: one CPU, or best-effort fan-out.
    pub fn write_target(
        &self,
        msr: u32,
        value: u64,
        target: CpuTarget,
    ) -> Result<FanOutReport, MsrError> {
        match target {
            CpuTarget::Single(cpu) => {
                self.write(msr, value, cpu)?;
                Ok(FanOutReport {
                    written: vec![cpu],
                    failures: Vec::new(),
                })
            }
            CpuTarget::All => self.write_all(msr, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    // Small fake register address so the fake nodes stay small; the
    // transport treats every address the same way.
    const TEST_MSR: u32 = 0x40;

    fn fake_device_tree(name: &str, cpus: &[usize]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("zenctl-msr-{name}-{}", std::process::id()));
        let _ = fs::remove_dir_all(&root);
        for &cpu in cpus {
            let dir = root.join(cpu.to_string());
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("msr"), [0u8; 256]).unwrap();
        }
        root
    }

    fn cleanup(root: &Path) {
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn read_decodes_little_endian() {
        let root = fake_device_tree("le", &[0]);
        let node = OpenOptions::new()
            .write(true)
            .open(root.join("0").join("msr"))
            .unwrap();
        node.write_all_at(&[0x33, 0x22, 0x11, 0, 0, 0, 0, 0x80], u64::from(TEST_MSR))
            .unwrap();

        let transport = MsrTransport::with_root(&root);
        assert_eq!(transport.read(TEST_MSR, 0).unwrap(), 0x8000_0000_0011_2233);
        cleanup(&root);
    }

    #[test]
    fn write_then_read_round_trips() {
        let root = fake_device_tree("rw", &[0]);
        let transport = MsrTransport::with_root(&root);
        transport.write(TEST_MSR, 0x8000_0000_0011_2233, 0).unwrap();
        assert_eq!(transport.read(TEST_MSR, 0).unwrap(), 0x8000_0000_0011_2233);
        cleanup(&root);
    }

    #[test]
    fn enumeration_is_ascending_and_numeric_only() {
        let root = fake_device_tree("enum", &[3, 0, 1]);
        fs::create_dir_all(root.join("microcode")).unwrap();

        let transport = MsrTransport::with_root(&root);
        assert_eq!(transport.cpus().unwrap(), vec![0, 1, 3]);
        cleanup(&root);
    }

    #[test]
    fn fan_out_survives_a_failing_cpu() {
        let root = fake_device_tree("fanout", &[0, 1, 3]);
        // cpu2 is enumerated but its msr node cannot be opened
        fs::create_dir_all(root.join("2")).unwrap();

        let transport = MsrTransport::with_root(&root);
        let report = transport
            .write_target(TEST_MSR, 0xABCD_EF01_2345_6789, CpuTarget::All)
            .unwrap();

        assert_eq!(report.written, vec![0, 1, 3]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, 2);
        assert!(matches!(report.failures[0].1, MsrError::Open { cpu: 2, .. }));
        assert!(!report.all_failed());

        for cpu in [0usize, 1, 3] {
            assert_eq!(transport.read(TEST_MSR, cpu).unwrap(), 0xABCD_EF01_2345_6789);
        }
        cleanup(&root);
    }

    #[test]
    fn single_target_write_reports_one_cpu() {
        let root = fake_device_tree("single", &[0, 1]);
        let transport = MsrTransport::with_root(&root);
        let report = transport
            .write_target(TEST_MSR, 0x55, CpuTarget::Single(1))
            .unwrap();
        assert_eq!(report.written, vec![1]);
        assert!(report.failures.is_empty());
        // cpu0 untouched
        assert_eq!(transport.read(TEST_MSR, 0).unwrap(), 0);
        cleanup(&root);
    }

    #[test]
    fn read_of_missing_cpu_reports_open_failure() {
        let root = fake_device_tree("missing", &[0]);
        let transport = MsrTransport::with_root(&root);
        match transport.read(TEST_MSR, 7) {
            Err(MsrError::Open { cpu: 7, .. }) => {}
            other => panic!("expected open failure, got {other:?}"),
        }
        cleanup(&root);
    }
}
