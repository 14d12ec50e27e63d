//! VM-entry legality checks
//!
//! A catalogue of named rules mirroring the processor's own entry checks
//! (SDM Vol. 3, 26.2 and 26.3), grouped into three aggregates over control,
//! host and guest state. Every rule reads already-programmed VMCS fields and
//! capability MSRs through the intrinsics handle and either passes or
//! reports a reason. An aggregate runs its whole catalogue, logs each
//! failure to the sink and returns the full violation list, so one bad field
//! never masks another.
//!
//! The hardware remains the authority on entry legality. These rules exist
//! to turn a bare VMfail into named causes, and to vet a VMCS before an
//! entry is attempted.

mod control;
mod guest;
mod host;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use crate::controls::{
    split_capability, EntryControls, ExitControls, PinBasedControls, PrimaryProcControls,
    SecondaryProcControls,
};
use crate::diag::{vmlog, DiagnosticSink};
use crate::fields;
use crate::intrinsics::VmxIntrinsics;

/// One failed rule: the catalogue name plus the formatted reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: &'static str,
    pub reason: String,
}

pub(crate) const CR0_PE: u64 = 1 << 0;
pub(crate) const CR0_PG: u64 = 1 << 31;
pub(crate) const CR4_PAE: u64 = 1 << 5;
pub(crate) const CR4_PCIDE: u64 = 1 << 17;

/// cpuid leaf reporting the physical-address width in bits 7:0 of eax.
const ADDRESS_WIDTH_LEAF: u32 = 0x8000_0008;

/// Read-side view of one VMCS shared by every rule.
pub(crate) struct CheckCtx<'a> {
    intrinsics: &'a dyn VmxIntrinsics,
}

impl CheckCtx<'_> {
    pub(crate) fn read(&self, field: u64) -> Result<u64, String> {
        self.intrinsics
            .vmread(field)
            .ok_or_else(|| format!("vmread of field 0x{:04x} failed", field))
    }

    pub(crate) fn msr(&self, id: u32) -> u64 {
        self.intrinsics.read_msr(id)
    }

    /// True when `addr` sets bits above the processor's physical width.
    pub(crate) fn beyond_physical_width(&self, addr: u64) -> bool {
        let bits = self.intrinsics.cpuid_eax(ADDRESS_WIDTH_LEAF) & 0xFF;
        if bits >= 64 {
            return false;
        }
        addr >= 1u64 << bits
    }

    pub(crate) fn pin_ctl(&self, flag: PinBasedControls) -> Result<bool, String> {
        let ctls = self.read(fields::PIN_BASED_VM_EXECUTION_CONTROLS)? as u32;
        Ok(PinBasedControls::from_bits_truncate(ctls).contains(flag))
    }

    pub(crate) fn proc_ctl(&self, flag: PrimaryProcControls) -> Result<bool, String> {
        let ctls = self.read(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)? as u32;
        Ok(PrimaryProcControls::from_bits_truncate(ctls).contains(flag))
    }

    /// Secondary controls only take effect under activate-secondary-controls.
    pub(crate) fn proc2_ctl(&self, flag: SecondaryProcControls) -> Result<bool, String> {
        if !self.proc_ctl(PrimaryProcControls::ACTIVATE_SECONDARY_CONTROLS)? {
            return Ok(false);
        }
        let ctls = self.read(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)? as u32;
        Ok(SecondaryProcControls::from_bits_truncate(ctls).contains(flag))
    }

    pub(crate) fn exit_ctl(&self, flag: ExitControls) -> Result<bool, String> {
        let ctls = self.read(fields::VM_EXIT_CONTROLS)? as u32;
        Ok(ExitControls::from_bits_truncate(ctls).contains(flag))
    }

    pub(crate) fn entry_ctl(&self, flag: EntryControls) -> Result<bool, String> {
        let ctls = self.read(fields::VM_ENTRY_CONTROLS)? as u32;
        Ok(EntryControls::from_bits_truncate(ctls).contains(flag))
    }
}

/// Bits 63:48 must replicate bit 47.
pub(crate) fn is_canonical(addr: u64) -> bool {
    (((addr << 16) as i64) >> 16) as u64 == addr
}

/// Every PAT entry must name a defined memory type.
pub(crate) fn pat_is_valid(pat: u64) -> bool {
    (0..8).all(|i| matches!((pat >> (i * 8)) & 0xFF, 0 | 1 | 4 | 5 | 6 | 7))
}

/// Reserved-bit envelope rule shared by the five control classes.
pub(crate) fn reserved_properly_set(
    ctx: &CheckCtx<'_>,
    capability_msr: u32,
    field: u64,
    what: &str,
) -> Result<(), String> {
    let (allowed0, allowed1) = split_capability(ctx.msr(capability_msr));
    let ctls = ctx.read(field)? as u32;
    if (ctls & allowed0) != allowed0 {
        return Err(format!(
            "{} 0x{:08x} clears must-be-1 bits 0x{:08x}",
            what,
            ctls,
            allowed0 & !ctls
        ));
    }
    if (ctls & !allowed1) != 0 {
        return Err(format!(
            "{} 0x{:08x} sets unsupported bits 0x{:08x}",
            what,
            ctls,
            ctls & !allowed1
        ));
    }
    Ok(())
}

pub(crate) type CheckFn = fn(&CheckCtx<'_>) -> Result<(), String>;

/// One catalogue entry.
pub(crate) struct Check {
    pub(crate) name: &'static str,
    pub(crate) run: CheckFn,
}

fn run_catalogue(
    catalogue: &[Check],
    intrinsics: &dyn VmxIntrinsics,
    sink: &dyn DiagnosticSink,
) -> Vec<Violation> {
    let ctx = CheckCtx { intrinsics };
    let mut violations = Vec::new();
    for check in catalogue {
        if let Err(reason) = (check.run)(&ctx) {
            vmlog!(sink, Error, "checks", "{}: {}", check.name, reason);
            violations.push(Violation {
                rule: check.name,
                reason,
            });
        }
    }
    violations
}

/// Run every VM-execution, VM-exit and VM-entry control rule.
pub fn check_vmcs_control_state(
    intrinsics: &dyn VmxIntrinsics,
    sink: &dyn DiagnosticSink,
) -> Vec<Violation> {
    run_catalogue(control::CHECKS, intrinsics, sink)
}

/// Run every guest-state rule.
pub fn check_vmcs_guest_state(
    intrinsics: &dyn VmxIntrinsics,
    sink: &dyn DiagnosticSink,
) -> Vec<Violation> {
    run_catalogue(guest::CHECKS, intrinsics, sink)
}

/// Run every host-state rule.
pub fn check_vmcs_host_state(
    intrinsics: &dyn VmxIntrinsics,
    sink: &dyn DiagnosticSink,
) -> Vec<Violation> {
    run_catalogue(host::CHECKS, intrinsics, sink)
}

/// Asserts that `mock` trips exactly one rule across all three aggregates.
/// The rule-independence tests in the submodules lean on this to prove a
/// fabricated field value cannot cascade into unrelated rules.
#[cfg(test)]
pub(crate) fn assert_single_violation(mock: &crate::testing::MockIntrinsics, rule: &'static str) {
    let sink = crate::testing::RecordingSink::new();
    let mut violations = check_vmcs_control_state(mock, &sink);
    violations.extend(check_vmcs_guest_state(mock, &sink));
    violations.extend(check_vmcs_host_state(mock, &sink));
    assert_eq!(
        violations.len(),
        1,
        "expected exactly one violation ({}), got {:?}",
        rule,
        violations
    );
    assert_eq!(violations[0].rule, rule);
    assert!(sink.contains(rule));
}
