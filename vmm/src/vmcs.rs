//! VMCS lifecycle driver
//!
//! One [`Vmcs`] instance owns one logical CPU's control structure and walks
//! it through `clear → load → field programming → control negotiation →
//! entry`. Every collaborator is injected at construction; nothing here
//! reaches for a global. Failure anywhere during [`Vmcs::launch`] releases
//! the resources acquired so far, in reverse acquisition order, before the
//! error reaches the caller, and a rejected entry produces one full
//! diagnostic dump plus the three entry-check aggregates so the VMfail can
//! be root-caused offline.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::checks::{self, Violation};
use crate::controls::{constrain, split_capability, CONTROL_CLASSES};
use crate::diag::{vmlog, DiagnosticSink};
use crate::error::{VmcsError, VmcsResult};
use crate::fields;
use crate::intrinsics::{StateSaveArea, VmxIntrinsics};
use crate::mm::MemoryTranslator;
use crate::msr;
use crate::region::{ExitHandlerStack, VmcsRegion};
use crate::state::VmState;

/// Progress of a VMCS through its lifecycle.
///
/// `Launched`, `Resumed` and `Promoted` are nominal end states; on real
/// hardware they are never observed from the host side because a successful
/// entry does not return. `Failed` is terminal and reachable from every
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    RegionCreated,
    StackCreated,
    Cleared,
    Loaded,
    Launched,
    Resumed,
    Promoted,
    Failed,
}

/// Driver for one per-logical-CPU VMCS.
pub struct Vmcs {
    intrinsics: Arc<dyn VmxIntrinsics>,
    translator: Arc<dyn MemoryTranslator>,
    sink: Arc<dyn DiagnosticSink>,
    /// Address of the exit-handler entry routine, programmed as `HOST_RIP`.
    exit_entry: u64,
    region: Option<VmcsRegion>,
    stack: Option<ExitHandlerStack>,
    state: LifecycleState,
}

impl Vmcs {
    /// Wire up a driver. All collaborators are required; callers that want
    /// default behavior construct the defaults themselves.
    pub fn new(
        intrinsics: Arc<dyn VmxIntrinsics>,
        translator: Arc<dyn MemoryTranslator>,
        sink: Arc<dyn DiagnosticSink>,
        exit_entry: u64,
    ) -> VmcsResult<Self> {
        if exit_entry == 0 {
            return Err(VmcsError::Configuration {
                what: "exit entry address",
            });
        }
        Ok(Self {
            intrinsics,
            translator,
            sink,
            exit_entry,
            region: None,
            stack: None,
            state: LifecycleState::Uninitialized,
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Physical address of the VMCS region, if one is currently held.
    pub fn region_phys(&self) -> Option<u64> {
        self.region.as_ref().map(|region| region.phys())
    }

    /// Allocate and stamp the VMCS region with the revision identifier from
    /// `IA32_VMX_BASIC`.
    pub fn create_vmcs_region(&mut self) -> VmcsResult<()> {
        let revision =
            (self.intrinsics.read_msr(msr::IA32_VMX_BASIC) & msr::VMX_BASIC_REVISION_MASK) as u32;
        self.region = Some(VmcsRegion::create(self.translator.as_ref(), revision)?);
        self.state = LifecycleState::RegionCreated;
        Ok(())
    }

    /// Idempotent: releasing without a region is a no-op.
    pub fn release_vmcs_region(&mut self) {
        if let Some(region) = self.region.as_mut() {
            region.release();
        }
        self.region = None;
    }

    pub fn create_exit_handler_stack(&mut self) -> VmcsResult<()> {
        self.stack = Some(ExitHandlerStack::create()?);
        self.state = LifecycleState::StackCreated;
        Ok(())
    }

    pub fn release_exit_handler_stack(&mut self) {
        if let Some(stack) = self.stack.as_mut() {
            stack.release();
        }
        self.stack = None;
    }

    /// Put the VMCS into the clear state.
    pub fn clear(&mut self) -> VmcsResult<()> {
        let region = self.region.as_ref().ok_or(VmcsError::Configuration {
            what: "vmcs region",
        })?;
        if !self.intrinsics.vmclear(region.phys_ref()) {
            let phys = region.phys();
            self.state = LifecycleState::Failed;
            return Err(VmcsError::ClearFailed { phys });
        }
        self.state = LifecycleState::Cleared;
        Ok(())
    }

    /// Make this VMCS current and active.
    pub fn load(&mut self) -> VmcsResult<()> {
        let region = self.region.as_ref().ok_or(VmcsError::Configuration {
            what: "vmcs region",
        })?;
        if !self.intrinsics.vmptrld(region.phys_ref()) {
            let phys = region.phys();
            self.state = LifecycleState::Failed;
            return Err(VmcsError::LoadFailed { phys });
        }
        self.state = LifecycleState::Loaded;
        Ok(())
    }

    /// The error code the processor left behind after the last VMfail.
    pub fn vm_instruction_error(&self) -> VmcsResult<u64> {
        self.vmread(fields::VM_INSTRUCTION_ERROR)
    }

    pub fn vmread(&self, field: u64) -> VmcsResult<u64> {
        self.intrinsics
            .vmread(field)
            .ok_or(VmcsError::VmreadFailed { field })
    }

    pub fn vmwrite(&self, field: u64, value: u64) -> VmcsResult<()> {
        if !self.intrinsics.vmwrite(field, value) {
            return Err(VmcsError::VmwriteFailed { field, value });
        }
        Ok(())
    }

    /// First entry into this VMCS.
    ///
    /// On hardware, success transfers control to the guest and this call
    /// never returns through its success path. On failure every acquired
    /// resource is released, the full diagnostic dump runs once and the
    /// error carries the VM-instruction-error code.
    pub fn launch(&mut self, host: &dyn VmState, guest: &dyn VmState) -> VmcsResult<()> {
        match self.try_launch(host, guest) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.rollback();
                self.state = LifecycleState::Failed;
                Err(err)
            }
        }
    }

    fn try_launch(&mut self, host: &dyn VmState, guest: &dyn VmState) -> VmcsResult<()> {
        self.create_vmcs_region()?;
        self.create_exit_handler_stack()?;
        self.clear()?;
        self.load()?;

        self.write_16bit_guest_state(guest)?;
        self.write_64bit_guest_state(guest)?;
        self.write_32bit_guest_state(guest)?;
        self.write_natural_guest_state(guest)?;

        self.write_16bit_host_state(host)?;
        self.write_64bit_host_state(host)?;
        self.write_32bit_host_state(host)?;
        self.write_natural_host_state(host)?;

        self.write_16bit_control_state()?;
        self.write_64bit_control_state()?;
        self.write_32bit_control_state()?;
        self.write_natural_control_state()?;

        self.negotiate_controls()?;

        if !self.intrinsics.vmlaunch() {
            let code = self
                .intrinsics
                .vmread(fields::VM_INSTRUCTION_ERROR)
                .unwrap_or(0);
            self.report_entry_failure(code, host, guest);
            return Err(VmcsError::LaunchFailed {
                instruction_error: code,
            });
        }
        self.state = LifecycleState::Launched;
        Ok(())
    }

    /// Re-enter a previously launched VMCS after restoring the saved guest
    /// register file. On success control passes to the guest; reaching the
    /// statement after the entry primitive is itself the failure signal.
    pub fn resume(&mut self, state_save: &StateSaveArea) -> VmcsResult<()> {
        let vmfail = !self.intrinsics.vmresume(state_save);
        self.state = LifecycleState::Failed;
        if vmfail {
            let code = self
                .intrinsics
                .vmread(fields::VM_INSTRUCTION_ERROR)
                .unwrap_or(0);
            vmlog!(
                self.sink,
                Error,
                "vmcs",
                "vmresume failed: vm-instruction error {} ({})",
                code,
                instruction_error_description(code)
            );
        } else {
            vmlog!(self.sink, Error, "vmcs", "vmresume returned to host");
        }
        Err(VmcsError::ResumeFailed)
    }

    /// Leave guest execution permanently, restoring the register file whose
    /// location is read out of `HOST_GS_BASE` in the live VMCS. Same
    /// any-return-is-failure contract as [`Self::resume`].
    pub fn promote(&mut self) -> VmcsResult<()> {
        let gs_base = self.vmread(fields::HOST_GS_BASE)?;
        self.intrinsics.vmpromote(gs_base);
        self.state = LifecycleState::Failed;
        vmlog!(self.sink, Error, "vmcs", "promotion returned to host");
        Err(VmcsError::PromoteFailed)
    }

    /// Run all three entry-check aggregates against the live VMCS. Useful
    /// as a pre-flight vet before an entry is attempted; also runs on the
    /// launch failure path.
    pub fn verify(&self) -> Vec<Violation> {
        let intrinsics = self.intrinsics.as_ref();
        let sink = self.sink.as_ref();
        let mut violations = checks::check_vmcs_control_state(intrinsics, sink);
        violations.extend(checks::check_vmcs_guest_state(intrinsics, sink));
        violations.extend(checks::check_vmcs_host_state(intrinsics, sink));
        violations
    }

    /// Write every named field plus the decoded control vectors to the sink.
    pub fn dump(&self) {
        vmlog!(self.sink, Error, "vmcs", "vmcs dump:");
        for (name, field) in fields::FIELD_NAMES {
            match self.intrinsics.vmread(*field) {
                Some(value) => {
                    vmlog!(self.sink, Error, "vmcs", "{}: 0x{:016x}", name, value)
                }
                None => vmlog!(self.sink, Error, "vmcs", "{}: <vmread failed>", name),
            }
        }
        for class in &CONTROL_CLASSES {
            if let Some(value) = self.intrinsics.vmread(class.field) {
                (class.decode)(class.name, value as u32, self.sink.as_ref());
            }
        }
    }

    fn report_entry_failure(&self, code: u64, host: &dyn VmState, guest: &dyn VmState) {
        vmlog!(
            self.sink,
            Error,
            "vmcs",
            "vm entry failed: vm-instruction error {} ({})",
            code,
            instruction_error_description(code)
        );
        self.dump();
        host.dump("host", self.sink.as_ref());
        guest.dump("guest", self.sink.as_ref());
        let violations = self.verify();
        vmlog!(
            self.sink,
            Error,
            "vmcs",
            "entry checks reported {} violation(s)",
            violations.len()
        );
    }

    /// Reverse acquisition order: the stack came after the region.
    fn rollback(&mut self) {
        self.release_exit_handler_stack();
        self.release_vmcs_region();
    }

    fn write_16bit_guest_state(&self, guest: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::GUEST_ES_SELECTOR, guest.es() as u64)?;
        self.vmwrite(fields::GUEST_CS_SELECTOR, guest.cs() as u64)?;
        self.vmwrite(fields::GUEST_SS_SELECTOR, guest.ss() as u64)?;
        self.vmwrite(fields::GUEST_DS_SELECTOR, guest.ds() as u64)?;
        self.vmwrite(fields::GUEST_FS_SELECTOR, guest.fs() as u64)?;
        self.vmwrite(fields::GUEST_GS_SELECTOR, guest.gs() as u64)?;
        self.vmwrite(fields::GUEST_LDTR_SELECTOR, guest.ldtr() as u64)?;
        self.vmwrite(fields::GUEST_TR_SELECTOR, guest.tr() as u64)
    }

    fn write_64bit_guest_state(&self, guest: &dyn VmState) -> VmcsResult<()> {
        // No shadow VMCS: the link pointer stays at the all-ones sentinel.
        self.vmwrite(fields::VMCS_LINK_POINTER, u64::MAX)?;
        self.vmwrite(fields::GUEST_IA32_DEBUGCTL, guest.ia32_debugctl())?;
        self.vmwrite(fields::GUEST_IA32_PAT, guest.ia32_pat())?;
        self.vmwrite(fields::GUEST_IA32_EFER, guest.ia32_efer())?;
        self.vmwrite(
            fields::GUEST_IA32_PERF_GLOBAL_CTRL,
            guest.ia32_perf_global_ctrl(),
        )
        // Unpopulated: GUEST_PDPTE0..GUEST_PDPTE3 (PAE paging without EPT is
        // not a supported guest configuration here).
    }

    fn write_32bit_guest_state(&self, guest: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::GUEST_ES_LIMIT, guest.es_limit() as u64)?;
        self.vmwrite(fields::GUEST_CS_LIMIT, guest.cs_limit() as u64)?;
        self.vmwrite(fields::GUEST_SS_LIMIT, guest.ss_limit() as u64)?;
        self.vmwrite(fields::GUEST_DS_LIMIT, guest.ds_limit() as u64)?;
        self.vmwrite(fields::GUEST_FS_LIMIT, guest.fs_limit() as u64)?;
        self.vmwrite(fields::GUEST_GS_LIMIT, guest.gs_limit() as u64)?;
        self.vmwrite(fields::GUEST_LDTR_LIMIT, guest.ldtr_limit() as u64)?;
        self.vmwrite(fields::GUEST_TR_LIMIT, guest.tr_limit() as u64)?;
        self.vmwrite(fields::GUEST_GDTR_LIMIT, guest.gdt_limit() as u64)?;
        self.vmwrite(fields::GUEST_IDTR_LIMIT, guest.idt_limit() as u64)?;
        self.vmwrite(
            fields::GUEST_ES_ACCESS_RIGHTS,
            guest.es_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_CS_ACCESS_RIGHTS,
            guest.cs_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_SS_ACCESS_RIGHTS,
            guest.ss_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_DS_ACCESS_RIGHTS,
            guest.ds_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_FS_ACCESS_RIGHTS,
            guest.fs_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_GS_ACCESS_RIGHTS,
            guest.gs_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_LDTR_ACCESS_RIGHTS,
            guest.ldtr_access_rights() as u64,
        )?;
        self.vmwrite(
            fields::GUEST_TR_ACCESS_RIGHTS,
            guest.tr_access_rights() as u64,
        )?;
        self.vmwrite(fields::GUEST_IA32_SYSENTER_CS, guest.ia32_sysenter_cs())
        // Unpopulated: GUEST_INTERRUPTIBILITY_STATE, GUEST_ACTIVITY_STATE,
        // GUEST_SMBASE, VMX_PREEMPTION_TIMER_VALUE all stay at their
        // cleared-state zeros, which is the active, uninhibited encoding.
    }

    /// RSP and RIP are deliberately absent: the entry trampoline supplies
    /// them. Pending-debug-exception state is not modeled.
    fn write_natural_guest_state(&self, guest: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::GUEST_CR0, guest.cr0())?;
        self.vmwrite(fields::GUEST_CR3, guest.cr3())?;
        self.vmwrite(fields::GUEST_CR4, guest.cr4())?;
        self.vmwrite(fields::GUEST_ES_BASE, guest.es_base())?;
        self.vmwrite(fields::GUEST_CS_BASE, guest.cs_base())?;
        self.vmwrite(fields::GUEST_SS_BASE, guest.ss_base())?;
        self.vmwrite(fields::GUEST_DS_BASE, guest.ds_base())?;
        self.vmwrite(fields::GUEST_FS_BASE, guest.ia32_fs_base())?;
        self.vmwrite(fields::GUEST_GS_BASE, guest.ia32_gs_base())?;
        self.vmwrite(fields::GUEST_LDTR_BASE, guest.ldtr_base())?;
        self.vmwrite(fields::GUEST_TR_BASE, guest.tr_base())?;
        self.vmwrite(fields::GUEST_GDTR_BASE, guest.gdt_base())?;
        self.vmwrite(fields::GUEST_IDTR_BASE, guest.idt_base())?;
        self.vmwrite(fields::GUEST_DR7, guest.dr7())?;
        self.vmwrite(fields::GUEST_RFLAGS, guest.rflags())?;
        self.vmwrite(fields::GUEST_IA32_SYSENTER_ESP, guest.ia32_sysenter_esp())?;
        self.vmwrite(fields::GUEST_IA32_SYSENTER_EIP, guest.ia32_sysenter_eip())
    }

    fn write_16bit_host_state(&self, host: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::HOST_ES_SELECTOR, host.es() as u64)?;
        self.vmwrite(fields::HOST_CS_SELECTOR, host.cs() as u64)?;
        self.vmwrite(fields::HOST_SS_SELECTOR, host.ss() as u64)?;
        self.vmwrite(fields::HOST_DS_SELECTOR, host.ds() as u64)?;
        self.vmwrite(fields::HOST_FS_SELECTOR, host.fs() as u64)?;
        self.vmwrite(fields::HOST_GS_SELECTOR, host.gs() as u64)?;
        self.vmwrite(fields::HOST_TR_SELECTOR, host.tr() as u64)
    }

    fn write_64bit_host_state(&self, host: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::HOST_IA32_PAT, host.ia32_pat())?;
        self.vmwrite(fields::HOST_IA32_EFER, host.ia32_efer())?;
        self.vmwrite(
            fields::HOST_IA32_PERF_GLOBAL_CTRL,
            host.ia32_perf_global_ctrl(),
        )
    }

    fn write_32bit_host_state(&self, host: &dyn VmState) -> VmcsResult<()> {
        self.vmwrite(fields::HOST_IA32_SYSENTER_CS, host.ia32_sysenter_cs())
    }

    /// Programs where the processor lands on VM exit: `HOST_RSP` is the
    /// exit-handler stack top, `HOST_RIP` the exit entry routine.
    fn write_natural_host_state(&self, host: &dyn VmState) -> VmcsResult<()> {
        let stack_top = match &self.stack {
            Some(stack) => stack.top(),
            None => {
                return Err(VmcsError::Configuration {
                    what: "exit-handler stack",
                })
            }
        };
        self.vmwrite(fields::HOST_CR0, host.cr0())?;
        self.vmwrite(fields::HOST_CR3, host.cr3())?;
        self.vmwrite(fields::HOST_CR4, host.cr4())?;
        self.vmwrite(fields::HOST_FS_BASE, host.ia32_fs_base())?;
        self.vmwrite(fields::HOST_GS_BASE, host.ia32_gs_base())?;
        self.vmwrite(fields::HOST_TR_BASE, host.tr_base())?;
        self.vmwrite(fields::HOST_GDTR_BASE, host.gdt_base())?;
        self.vmwrite(fields::HOST_IDTR_BASE, host.idt_base())?;
        self.vmwrite(fields::HOST_IA32_SYSENTER_ESP, host.ia32_sysenter_esp())?;
        self.vmwrite(fields::HOST_IA32_SYSENTER_EIP, host.ia32_sysenter_eip())?;
        self.vmwrite(fields::HOST_RSP, stack_top)?;
        self.vmwrite(fields::HOST_RIP, self.exit_entry)
    }

    /// Extension point. Unpopulated: VIRTUAL_PROCESSOR_ID,
    /// POSTED_INTERRUPT_NOTIFICATION_VECTOR, EPTP_INDEX.
    fn write_16bit_control_state(&self) -> VmcsResult<()> {
        Ok(())
    }

    /// Extension point. Unpopulated: IO_BITMAP_A_ADDR, IO_BITMAP_B_ADDR,
    /// MSR_BITMAPS_ADDR, VM_EXIT_MSR_STORE_ADDR, VM_EXIT_MSR_LOAD_ADDR,
    /// VM_ENTRY_MSR_LOAD_ADDR, TSC_OFFSET, VIRTUAL_APIC_ADDR,
    /// APIC_ACCESS_ADDR, POSTED_INTERRUPT_DESCRIPTOR_ADDR,
    /// VM_FUNCTION_CONTROLS, EPT_POINTER, EOI_EXIT_BITMAP_0..3,
    /// EPTP_LIST_ADDR, VMREAD_BITMAP_ADDR, VMWRITE_BITMAP_ADDR,
    /// VIRTUALIZATION_EXCEPTION_INFO_ADDR, XSS_EXITING_BITMAP.
    fn write_64bit_control_state(&self) -> VmcsResult<()> {
        Ok(())
    }

    /// Seeds the primary control vectors with the minimal legal value
    /// `allowed0 & allowed1` of their TRUE capability MSRs so negotiation
    /// starts from a defined point; the secondary vector has no TRUE MSR and
    /// keeps its cleared-state zero. Unpopulated: EXCEPTION_BITMAP,
    /// PAGE_FAULT_ERROR_CODE_MASK, PAGE_FAULT_ERROR_CODE_MATCH,
    /// CR3_TARGET_COUNT, the three MSR-area counts,
    /// VM_ENTRY_INTERRUPTION_INFO, VM_ENTRY_EXCEPTION_ERROR_CODE,
    /// VM_ENTRY_INSTRUCTION_LENGTH, TPR_THRESHOLD, PLE_GAP, PLE_WINDOW.
    fn write_32bit_control_state(&self) -> VmcsResult<()> {
        for class in CONTROL_CLASSES.iter().filter(|class| class.seed) {
            let (allowed0, allowed1) = split_capability(self.intrinsics.read_msr(class.msr));
            self.vmwrite(class.field, (allowed0 & allowed1) as u64)?;
        }
        Ok(())
    }

    /// Extension point. Unpopulated: CR0_GUEST_HOST_MASK,
    /// CR4_GUEST_HOST_MASK, CR0_READ_SHADOW, CR4_READ_SHADOW,
    /// CR3_TARGET_VALUE_0..3.
    fn write_natural_control_state(&self) -> VmcsResult<()> {
        Ok(())
    }

    /// Fold each control vector into its capability envelope: read the
    /// current value, request the class baseline on top, force must-be-1
    /// bits on and strip unsupported bits (reporting both corrections), and
    /// write the legal vector back.
    fn negotiate_controls(&self) -> VmcsResult<()> {
        for class in &CONTROL_CLASSES {
            let desired = self.vmread(class.field)? as u32 | class.baseline;
            let (allowed0, allowed1) = split_capability(self.intrinsics.read_msr(class.msr));
            let outcome = constrain(desired, allowed0, allowed1);
            if outcome.forced_on != 0 {
                vmlog!(
                    self.sink,
                    Warn,
                    "controls",
                    "{}: forcing required bits 0x{:08x}",
                    class.name,
                    outcome.forced_on
                );
            }
            if outcome.filtered_off != 0 {
                vmlog!(
                    self.sink,
                    Warn,
                    "controls",
                    "{}: dropping unsupported bits 0x{:08x}",
                    class.name,
                    outcome.filtered_off
                );
            }
            self.vmwrite(class.field, outcome.value as u64)?;
        }
        Ok(())
    }
}

impl Drop for Vmcs {
    fn drop(&mut self) {
        self.rollback();
    }
}

// The collaborators are trait objects, so the derive is unavailable; report
// the driver-owned state instead.
impl fmt::Debug for Vmcs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vmcs")
            .field("state", &self.state)
            .field("exit_entry", &self.exit_entry)
            .field("region", &self.region)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}

/// Decoded VM-instruction-error values (SDM Vol. 3, 30.4).
fn instruction_error_description(code: u64) -> &'static str {
    match code {
        1 => "vmcall executed in vmx root operation",
        2 => "vmclear with invalid physical address",
        3 => "vmclear with vmxon pointer",
        4 => "vmlaunch with non-clear vmcs",
        5 => "vmresume with non-launched vmcs",
        6 => "vmresume after vmxoff",
        7 => "vm entry with invalid control fields",
        8 => "vm entry with invalid host-state fields",
        9 => "vmptrld with invalid physical address",
        10 => "vmptrld with vmxon pointer",
        11 => "vmptrld with incorrect vmcs revision identifier",
        12 => "vmread/vmwrite from/to unsupported vmcs component",
        13 => "vmwrite to read-only vmcs component",
        15 => "vmxon executed in vmx root operation",
        16 => "vm entry with invalid executive-vmcs pointer",
        17 => "vm entry with non-launched executive vmcs",
        18 => "vm entry with executive-vmcs pointer not vmxon pointer",
        26 => "vm entry with events blocked by mov ss",
        _ => "unrecognized vm-instruction error",
    }
}
