//! Test doubles for the driver's collaborators
//!
//! Shipped as a public module so embedders can test their own VMCS wiring
//! without hardware. [`MockIntrinsics`] replays MSR and VMCS field state
//! from maps and records every hardware call; [`MockTranslator`] covers the
//! zero-translation failure path; [`RecordingSink`] captures diagnostics for
//! assertion. The `legal_*` builders produce a state that satisfies every
//! entry-check rule, which is the baseline the rule-independence tests
//! fabricate single violations against.
//!
//! All interior mutability is `spin::Mutex` so the doubles stay usable
//! behind the `&self` trait methods.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use spin::Mutex;

use crate::diag::{DiagnosticSink, LogLevel};
use crate::intrinsics::{StateSaveArea, VmxIntrinsics};
use crate::mm::{MemoryTranslator, PhysicalAddress, VirtualAddress};
use crate::state::VmStateSnapshot;
use crate::{fields, msr};

/// Scripted [`VmxIntrinsics`] implementation.
///
/// MSRs, cpuid leaves and VMCS fields live in maps; `vmwrite` stores into
/// the field map (so later `vmread`s observe it) and appends to a write log.
/// Every operation succeeds until a `fail_*` toggle flips it.
pub struct MockIntrinsics {
    msrs: Mutex<BTreeMap<u32, u64>>,
    cpuid: Mutex<BTreeMap<u32, u32>>,
    vmcs_fields: Mutex<BTreeMap<u64, u64>>,
    write_log: Mutex<Vec<(u64, u64)>>,

    vmread_failures: Mutex<BTreeSet<u64>>,
    vmwrite_failures: Mutex<BTreeSet<u64>>,
    vmclear_ok: Mutex<bool>,
    vmptrld_ok: Mutex<bool>,
    vmlaunch_ok: Mutex<bool>,
    vmresume_ok: Mutex<bool>,
    vmpromote_ok: Mutex<bool>,

    launch_attempts: Mutex<usize>,
    resume_attempts: Mutex<usize>,
    promote_attempts: Mutex<usize>,
    last_cleared: Mutex<Option<u64>>,
    last_loaded: Mutex<Option<u64>>,
    last_resume_save: Mutex<Option<StateSaveArea>>,
    last_promote_arg: Mutex<Option<u64>>,
}

impl MockIntrinsics {
    pub fn new() -> Self {
        Self {
            msrs: Mutex::new(BTreeMap::new()),
            cpuid: Mutex::new(BTreeMap::new()),
            vmcs_fields: Mutex::new(BTreeMap::new()),
            write_log: Mutex::new(Vec::new()),
            vmread_failures: Mutex::new(BTreeSet::new()),
            vmwrite_failures: Mutex::new(BTreeSet::new()),
            vmclear_ok: Mutex::new(true),
            vmptrld_ok: Mutex::new(true),
            vmlaunch_ok: Mutex::new(true),
            vmresume_ok: Mutex::new(true),
            vmpromote_ok: Mutex::new(true),
            launch_attempts: Mutex::new(0),
            resume_attempts: Mutex::new(0),
            promote_attempts: Mutex::new(0),
            last_cleared: Mutex::new(None),
            last_loaded: Mutex::new(None),
            last_resume_save: Mutex::new(None),
            last_promote_arg: Mutex::new(None),
        }
    }

    pub fn set_msr(&self, id: u32, value: u64) {
        self.msrs.lock().insert(id, value);
    }

    pub fn set_cpuid_eax(&self, leaf: u32, eax: u32) {
        self.cpuid.lock().insert(leaf, eax);
    }

    /// Fabricate a VMCS field value without going through `vmwrite`.
    pub fn set_field(&self, field: u64, value: u64) {
        self.vmcs_fields.lock().insert(field, value);
    }

    /// Current value of a field (zero if never written).
    pub fn field(&self, field: u64) -> u64 {
        *self.vmcs_fields.lock().get(&field).unwrap_or(&0)
    }

    /// Every successful `vmwrite`, in order.
    pub fn recorded_writes(&self) -> Vec<(u64, u64)> {
        self.write_log.lock().clone()
    }

    pub fn fail_vmread_on(&self, field: u64) {
        self.vmread_failures.lock().insert(field);
    }

    pub fn fail_vmwrite_on(&self, field: u64) {
        self.vmwrite_failures.lock().insert(field);
    }

    pub fn fail_vmclear(&self) {
        *self.vmclear_ok.lock() = false;
    }

    pub fn fail_vmptrld(&self) {
        *self.vmptrld_ok.lock() = false;
    }

    pub fn fail_vmlaunch(&self) {
        *self.vmlaunch_ok.lock() = false;
    }

    pub fn fail_vmresume(&self) {
        *self.vmresume_ok.lock() = false;
    }

    pub fn fail_vmpromote(&self) {
        *self.vmpromote_ok.lock() = false;
    }

    pub fn launch_attempts(&self) -> usize {
        *self.launch_attempts.lock()
    }

    pub fn resume_attempts(&self) -> usize {
        *self.resume_attempts.lock()
    }

    pub fn promote_attempts(&self) -> usize {
        *self.promote_attempts.lock()
    }

    /// Physical address handed to the last `vmclear`.
    pub fn last_cleared(&self) -> Option<u64> {
        *self.last_cleared.lock()
    }

    /// Physical address handed to the last `vmptrld`.
    pub fn last_loaded(&self) -> Option<u64> {
        *self.last_loaded.lock()
    }

    pub fn last_resume_save(&self) -> Option<StateSaveArea> {
        *self.last_resume_save.lock()
    }

    pub fn last_promote_arg(&self) -> Option<u64> {
        *self.last_promote_arg.lock()
    }
}

impl Default for MockIntrinsics {
    fn default() -> Self {
        Self::new()
    }
}

impl VmxIntrinsics for MockIntrinsics {
    fn read_msr(&self, id: u32) -> u64 {
        *self.msrs.lock().get(&id).unwrap_or(&0)
    }

    fn cpuid_eax(&self, leaf: u32) -> u32 {
        *self.cpuid.lock().get(&leaf).unwrap_or(&0)
    }

    fn vmread(&self, field: u64) -> Option<u64> {
        if self.vmread_failures.lock().contains(&field) {
            return None;
        }
        Some(self.field(field))
    }

    fn vmwrite(&self, field: u64, value: u64) -> bool {
        if self.vmwrite_failures.lock().contains(&field) {
            return false;
        }
        self.vmcs_fields.lock().insert(field, value);
        self.write_log.lock().push((field, value));
        true
    }

    fn vmptrld(&self, phys_addr: &u64) -> bool {
        *self.last_loaded.lock() = Some(*phys_addr);
        *self.vmptrld_ok.lock()
    }

    fn vmclear(&self, phys_addr: &u64) -> bool {
        *self.last_cleared.lock() = Some(*phys_addr);
        *self.vmclear_ok.lock()
    }

    fn vmlaunch(&self) -> bool {
        *self.launch_attempts.lock() += 1;
        *self.vmlaunch_ok.lock()
    }

    fn vmresume(&self, state_save: &StateSaveArea) -> bool {
        *self.resume_attempts.lock() += 1;
        *self.last_resume_save.lock() = Some(*state_save);
        *self.vmresume_ok.lock()
    }

    fn vmpromote(&self, host_gs_base: u64) -> bool {
        *self.promote_attempts.lock() += 1;
        *self.last_promote_arg.lock() = Some(host_gs_base);
        *self.vmpromote_ok.lock()
    }
}

/// Translator double. Identity mapping until `set_return_null(true)`, which
/// makes every translation report the zero failure sentinel.
pub struct MockTranslator {
    return_null: Mutex<bool>,
}

impl MockTranslator {
    pub fn new() -> Self {
        Self {
            return_null: Mutex::new(false),
        }
    }

    pub fn set_return_null(&self, yes: bool) {
        *self.return_null.lock() = yes;
    }
}

impl Default for MockTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTranslator for MockTranslator {
    fn virt_to_phys(&self, virt: VirtualAddress) -> PhysicalAddress {
        if *self.return_null.lock() {
            PhysicalAddress::new(0)
        } else {
            PhysicalAddress::new(virt.as_u64())
        }
    }
}

/// Sink that keeps every message for later inspection.
pub struct RecordingSink {
    lines: Mutex<Vec<(LogLevel, &'static str, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, _, m)| m.contains(needle))
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|(_, _, m)| m.contains(needle))
            .count()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lines.lock().iter().map(|(_, _, m)| m.clone()).collect()
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticSink for RecordingSink {
    fn log(&self, level: LogLevel, subsystem: &'static str, message: fmt::Arguments<'_>) {
        self.lines.lock().push((level, subsystem, format!("{}", message)));
    }
}

/// PAT programming every entry check accepts: WB/WT/UC-/UC mirrored.
pub const LEGAL_PAT: u64 = 0x0007_0406_0007_0406;

/// EFER with SCE, LME and LMA set, as a 64-bit host runs with.
pub const LEGAL_EFER: u64 = 0xD01;

/// Mock preloaded with consistent VMX capability MSRs.
///
/// Capability envelopes are fully permissive (no must-be-1 bits, every bit
/// may be 1), CR0/CR4 fixed MSRs demand PE+NE+PG and VMXE, the physical
/// address width is 40 bits and the live EFER reports IA-32e mode. Enough
/// for negotiation and region creation; see [`legal_vmcs_intrinsics`] for a
/// field map the checks accept too.
pub fn vmx_capable_intrinsics() -> MockIntrinsics {
    let mock = MockIntrinsics::new();
    mock.set_msr(msr::IA32_VMX_BASIC, 0x0000_0001);
    mock.set_msr(msr::IA32_VMX_TRUE_PINBASED_CTLS, 0xFFFF_FFFF_0000_0000);
    mock.set_msr(msr::IA32_VMX_TRUE_PROCBASED_CTLS, 0xFFFF_FFFF_0000_0000);
    mock.set_msr(msr::IA32_VMX_PROCBASED_CTLS2, 0xFFFF_FFFF_0000_0000);
    mock.set_msr(msr::IA32_VMX_TRUE_EXIT_CTLS, 0xFFFF_FFFF_0000_0000);
    mock.set_msr(msr::IA32_VMX_TRUE_ENTRY_CTLS, 0xFFFF_FFFF_0000_0000);
    mock.set_msr(msr::IA32_VMX_CR0_FIXED0, 0x8000_0021);
    mock.set_msr(msr::IA32_VMX_CR0_FIXED1, 0xFFFF_FFFF);
    mock.set_msr(msr::IA32_VMX_CR4_FIXED0, 0x2000);
    mock.set_msr(msr::IA32_VMX_CR4_FIXED1, 0xFFFF_FFFF);
    mock.set_msr(msr::IA32_VMX_EPT_VPID_CAP, 1 << 21);
    mock.set_msr(msr::IA32_EFER, LEGAL_EFER);
    mock.set_cpuid_eax(0x8000_0008, 0x3028);
    mock
}

/// Mock whose VMCS field map passes all three check aggregates.
///
/// The values mirror what a launch with [`legal_host_snapshot`] and
/// [`legal_guest_snapshot`] programs on a permissive processor. Tests
/// fabricate a single violation on top with [`MockIntrinsics::set_field`].
pub fn legal_vmcs_intrinsics() -> MockIntrinsics {
    let mock = vmx_capable_intrinsics();

    mock.set_field(fields::PIN_BASED_VM_EXECUTION_CONTROLS, 0);
    mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, 1 << 31);
    mock.set_field(
        fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS,
        0x0010_1008,
    );
    mock.set_field(fields::VM_EXIT_CONTROLS, 0x003C_9204);
    mock.set_field(fields::VM_ENTRY_CONTROLS, 0xE204);
    mock.set_field(fields::CR3_TARGET_COUNT, 0);
    mock.set_field(fields::VM_EXIT_MSR_STORE_COUNT, 0);
    mock.set_field(fields::VM_EXIT_MSR_LOAD_COUNT, 0);
    mock.set_field(fields::VM_ENTRY_MSR_LOAD_COUNT, 0);
    mock.set_field(fields::VM_ENTRY_INTERRUPTION_INFO, 0);

    mock.set_field(fields::HOST_ES_SELECTOR, 0x10);
    mock.set_field(fields::HOST_CS_SELECTOR, 0x08);
    mock.set_field(fields::HOST_SS_SELECTOR, 0x10);
    mock.set_field(fields::HOST_DS_SELECTOR, 0x10);
    mock.set_field(fields::HOST_FS_SELECTOR, 0x10);
    mock.set_field(fields::HOST_GS_SELECTOR, 0x10);
    mock.set_field(fields::HOST_TR_SELECTOR, 0x18);
    mock.set_field(fields::HOST_CR0, 0x8005_0033);
    mock.set_field(fields::HOST_CR3, 0x1000);
    mock.set_field(fields::HOST_CR4, 0x2020);
    mock.set_field(fields::HOST_FS_BASE, 0);
    mock.set_field(fields::HOST_GS_BASE, 0);
    mock.set_field(fields::HOST_TR_BASE, 0);
    mock.set_field(fields::HOST_GDTR_BASE, 0);
    mock.set_field(fields::HOST_IDTR_BASE, 0);
    mock.set_field(fields::HOST_IA32_SYSENTER_ESP, 0);
    mock.set_field(fields::HOST_IA32_SYSENTER_EIP, 0);
    mock.set_field(fields::HOST_RIP, 0xFFFF_FFFF_8000_1000);
    mock.set_field(fields::HOST_IA32_PAT, LEGAL_PAT);
    mock.set_field(fields::HOST_IA32_EFER, LEGAL_EFER);
    mock.set_field(fields::HOST_IA32_PERF_GLOBAL_CTRL, 0);

    mock.set_field(fields::GUEST_CR0, 0x8005_0033);
    mock.set_field(fields::GUEST_CR3, 0x1000);
    mock.set_field(fields::GUEST_CR4, 0x2020);
    mock.set_field(fields::GUEST_IA32_DEBUGCTL, 0);
    mock.set_field(fields::GUEST_DR7, 0x400);
    mock.set_field(fields::GUEST_FS_BASE, 0);
    mock.set_field(fields::GUEST_GS_BASE, 0);
    mock.set_field(fields::GUEST_LDTR_BASE, 0);
    mock.set_field(fields::GUEST_LDTR_ACCESS_RIGHTS, 1 << 16);
    mock.set_field(fields::GUEST_TR_BASE, 0);
    mock.set_field(fields::GUEST_GDTR_BASE, 0);
    mock.set_field(fields::GUEST_IDTR_BASE, 0);
    mock.set_field(fields::GUEST_RFLAGS, 0x2);
    mock.set_field(fields::GUEST_IA32_SYSENTER_ESP, 0);
    mock.set_field(fields::GUEST_IA32_SYSENTER_EIP, 0);
    mock.set_field(fields::GUEST_IA32_PAT, LEGAL_PAT);
    mock.set_field(fields::GUEST_IA32_EFER, LEGAL_EFER);
    mock.set_field(fields::GUEST_IA32_PERF_GLOBAL_CTRL, 0);
    mock.set_field(fields::VMCS_LINK_POINTER, 0xFFFF_FFFF_FFFF_FFFF);

    mock
}

/// Host context that passes every host-state entry check.
pub fn legal_host_snapshot() -> VmStateSnapshot {
    VmStateSnapshot {
        es: 0x10,
        cs: 0x08,
        ss: 0x10,
        ds: 0x10,
        fs: 0x10,
        gs: 0x10,
        ldtr: 0,
        tr: 0x18,
        es_limit: 0xFFFF_FFFF,
        cs_limit: 0xFFFF_FFFF,
        ss_limit: 0xFFFF_FFFF,
        ds_limit: 0xFFFF_FFFF,
        fs_limit: 0xFFFF_FFFF,
        gs_limit: 0xFFFF_FFFF,
        ldtr_limit: 0,
        tr_limit: 0x67,
        es_access_rights: 0xC093,
        cs_access_rights: 0xA09B,
        ss_access_rights: 0xC093,
        ds_access_rights: 0xC093,
        fs_access_rights: 0xC093,
        gs_access_rights: 0xC093,
        ldtr_access_rights: 1 << 16,
        tr_access_rights: 0x008B,
        cr0: 0x8005_0033,
        cr3: 0x1000,
        cr4: 0x2020,
        dr7: 0x400,
        rflags: 0x2,
        gdt_limit: 0x7F,
        idt_limit: 0xFFF,
        ia32_pat: LEGAL_PAT,
        ia32_efer: LEGAL_EFER,
        ..Default::default()
    }
}

/// Guest context that passes every guest-state entry check under the
/// negotiated IA-32e entry controls. Identical to the host context: the
/// first guest a hypervisor launches is the host itself.
pub fn legal_guest_snapshot() -> VmStateSnapshot {
    legal_host_snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_vmwrite_feeds_vmread() {
        let mock = MockIntrinsics::new();
        assert!(mock.vmwrite(fields::GUEST_CS_SELECTOR, 0x08));
        assert_eq!(mock.vmread(fields::GUEST_CS_SELECTOR), Some(0x08));
        assert_eq!(mock.recorded_writes(), [(fields::GUEST_CS_SELECTOR, 0x08)]);
    }

    #[test]
    fn test_mock_failure_toggles() {
        let mock = MockIntrinsics::new();
        mock.fail_vmwrite_on(fields::GUEST_CR3);
        assert!(!mock.vmwrite(fields::GUEST_CR3, 0x1000));
        assert!(mock.recorded_writes().is_empty());

        mock.fail_vmread_on(fields::GUEST_CR3);
        assert_eq!(mock.vmread(fields::GUEST_CR3), None);

        mock.fail_vmlaunch();
        assert!(!mock.vmlaunch());
        assert_eq!(mock.launch_attempts(), 1);
    }

    #[test]
    fn test_mock_records_region_pointers() {
        let mock = MockIntrinsics::new();
        let phys = 0x5000u64;
        assert!(mock.vmclear(&phys));
        assert!(mock.vmptrld(&phys));
        assert_eq!(mock.last_cleared(), Some(0x5000));
        assert_eq!(mock.last_loaded(), Some(0x5000));
    }

    #[test]
    fn test_translator_null_toggle() {
        let translator = MockTranslator::new();
        let virt = VirtualAddress::new(0x2000);
        assert_eq!(translator.virt_to_phys(virt).as_u64(), 0x2000);
        translator.set_return_null(true);
        assert!(translator.virt_to_phys(virt).is_null());
    }

    #[test]
    fn test_recording_sink_counts() {
        let sink = RecordingSink::new();
        sink.log(LogLevel::Info, "vmcs", format_args!("first {}", 1));
        sink.log(LogLevel::Error, "vmcs", format_args!("second {}", 2));
        assert_eq!(sink.len(), 2);
        assert!(sink.contains("first 1"));
        assert_eq!(sink.count_containing("second"), 1);
    }

    #[test]
    fn test_legal_pat_entries_are_defined_types() {
        for i in 0..8 {
            let entry = (LEGAL_PAT >> (i * 8)) & 0xFF;
            assert!(matches!(entry, 0 | 1 | 4 | 5 | 6 | 7));
        }
    }
}
