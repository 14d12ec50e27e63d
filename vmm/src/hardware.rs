//! Real x86_64 instruction backing for [`VmxIntrinsics`]
//!
//! Every operation executes the actual privileged instruction and reports
//! VMfail through the flags register (`setna` is set when either CF or ZF
//! came back set). The entry trampolines restore the guest register file by
//! fixed offset into [`StateSaveArea`], which is why that struct is
//! `repr(C)` with a pinned layout.
//!
//! Nothing here is reachable from tests; the driver's test coverage runs
//! against [`crate::testing::MockIntrinsics`] instead.

use x86_64::instructions::tables::{sgdt, sidt};
use x86_64::registers::segmentation::{Segment, CS, DS, ES, FS, GS, SS};
use x86_64::registers::control::{Cr0, Cr3, Cr4};
use x86_64::registers::model_specific::Msr;
use x86_64::registers::rflags;

use crate::intrinsics::{StateSaveArea, VmxIntrinsics};
use crate::msr;
use crate::state::VmStateSnapshot;

/// The one [`VmxIntrinsics`] implementation that touches hardware. Stateless;
/// a single shared handle serves every per-core driver.
pub struct HardwareIntrinsics;

impl HardwareIntrinsics {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for HardwareIntrinsics {
    fn default() -> Self {
        Self::new()
    }
}

impl VmxIntrinsics for HardwareIntrinsics {
    fn read_msr(&self, msr: u32) -> u64 {
        // SAFETY: callers pass well-known architectural MSR addresses and
        // the read has no side effects beyond returning the value.
        unsafe { Msr::new(msr).read() }
    }

    fn cpuid_eax(&self, leaf: u32) -> u32 {
        // SAFETY: CPUID is available on every processor VMX can run on.
        unsafe { core::arch::x86_64::__cpuid(leaf).eax }
    }

    fn vmread(&self, field: u64) -> Option<u64> {
        let value: u64;
        let fail: u8;
        // SAFETY: VMREAD from the current VMCS; VMfail surfaces in the
        // flags and is captured by setna.
        unsafe {
            core::arch::asm!(
                "vmread {value}, {field}", "setna {fail}",
                field = in(reg) field, value = out(reg) value,
                fail = out(reg_byte) fail, options(nostack, nomem),
            );
        }
        if fail != 0 {
            return None;
        }
        Some(value)
    }

    fn vmwrite(&self, field: u64, value: u64) -> bool {
        let fail: u8;
        // SAFETY: VMWRITE on the current VMCS.
        unsafe {
            core::arch::asm!(
                "vmwrite {field}, {value}", "setna {fail}",
                field = in(reg) field, value = in(reg) value,
                fail = out(reg_byte) fail, options(nostack, nomem),
            );
        }
        fail == 0
    }

    fn vmptrld(&self, phys_addr: &u64) -> bool {
        let fail: u8;
        // SAFETY: VMPTRLD takes the physical address through a memory
        // operand; the reference keeps that slot alive across the call.
        unsafe {
            core::arch::asm!(
                "vmptrld [{addr}]", "setna {fail}",
                addr = in(reg) phys_addr as *const u64,
                fail = out(reg_byte) fail, options(nostack),
            );
        }
        fail == 0
    }

    fn vmclear(&self, phys_addr: &u64) -> bool {
        let fail: u8;
        // SAFETY: VMCLEAR through a memory operand, as for vmptrld.
        unsafe {
            core::arch::asm!(
                "vmclear [{addr}]", "setna {fail}",
                addr = in(reg) phys_addr as *const u64,
                fail = out(reg_byte) fail, options(nostack),
            );
        }
        fail == 0
    }

    fn vmlaunch(&self) -> bool {
        let fail: u8;
        // SAFETY: VMLAUNCH on the current VMCS. A successful entry does not
        // come back here; the fall-through only runs on failure.
        unsafe {
            core::arch::asm!(
                "vmlaunch", "setna {fail}",
                fail = out(reg_byte) fail, options(nostack),
            );
        }
        fail == 0
    }

    fn vmresume(&self, state_save: &StateSaveArea) -> bool {
        // SAFETY: the save area is a live register file laid out at the
        // offsets the trampoline expects; the trampoline preserves the
        // callee-saved registers it clobbers on the fall-through path.
        let fail = unsafe { vmresume_trampoline(state_save) };
        fail == 0
    }

    fn vmpromote(&self, host_gs_base: u64) -> bool {
        // SAFETY: callers pass the HOST_GS_BASE value out of the live VMCS,
        // which points at the register file captured on the last VM exit.
        unsafe { vmpromote_trampoline(host_gs_base) }
    }
}

/// Restore the guest register file and re-enter via VMRESUME.
///
/// Guest RIP and RSP come out of the VMCS on entry, so only the sixteen
/// general-purpose registers are loaded here. Reaching the instructions
/// after `vmresume` at all means the entry failed; the callee-saved
/// registers are rebuilt from the stack so the Rust caller survives it.
#[unsafe(naked)]
unsafe extern "C" fn vmresume_trampoline(_state_save: *const StateSaveArea) -> u8 {
    core::arch::naked_asm!(
        "push rbp",
        "push rbx",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "mov rax, [rdi + 0x00]",
        "mov rbx, [rdi + 0x08]",
        "mov rcx, [rdi + 0x10]",
        "mov rdx, [rdi + 0x18]",
        "mov rbp, [rdi + 0x20]",
        "mov rsi, [rdi + 0x28]",
        "mov r8,  [rdi + 0x38]",
        "mov r9,  [rdi + 0x40]",
        "mov r10, [rdi + 0x48]",
        "mov r11, [rdi + 0x50]",
        "mov r12, [rdi + 0x58]",
        "mov r13, [rdi + 0x60]",
        "mov r14, [rdi + 0x68]",
        "mov r15, [rdi + 0x70]",
        "mov rdi, [rdi + 0x30]",
        "vmresume",
        "setna al",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rbx",
        "pop rbp",
        "movzx eax, al",
        "ret",
    )
}

/// Leave guest execution for good: rebuild the register file saved at the
/// last VM exit and continue as host at its saved RIP/RSP. The final `ret`
/// consumes the pushed RIP, so this never returns to the caller.
#[unsafe(naked)]
unsafe extern "C" fn vmpromote_trampoline(_host_gs_base: u64) -> ! {
    core::arch::naked_asm!(
        "mov rax, [rdi + 0x00]",
        "mov rbx, [rdi + 0x08]",
        "mov rcx, [rdi + 0x10]",
        "mov rdx, [rdi + 0x18]",
        "mov rbp, [rdi + 0x20]",
        "mov rsi, [rdi + 0x28]",
        "mov r8,  [rdi + 0x38]",
        "mov r9,  [rdi + 0x40]",
        "mov r10, [rdi + 0x48]",
        "mov r11, [rdi + 0x50]",
        "mov r12, [rdi + 0x58]",
        "mov r13, [rdi + 0x60]",
        "mov r14, [rdi + 0x68]",
        "mov r15, [rdi + 0x70]",
        "mov rsp, [rdi + 0x80]",
        "push qword ptr [rdi + 0x78]",
        "mov rdi, [rdi + 0x30]",
        "ret",
    )
}

/// Snapshot the running host context for the host-state VMCS area.
///
/// Segment limits and access rights stay zero; the host-state area has no
/// fields for them. FS and GS bases come from their MSRs rather than the
/// descriptor table, as the processor does on a 64-bit host.
pub fn capture_host(intrinsics: &dyn VmxIntrinsics) -> VmStateSnapshot {
    let (dr7, tr, ldtr): (u64, u16, u16);
    // SAFETY: reads of DR7 and the task/LDT selectors, none of which the
    // x86_64 crate exposes.
    unsafe {
        core::arch::asm!("mov {}, dr7", out(reg) dr7, options(nostack, nomem));
        core::arch::asm!("str {:x}", out(reg) tr, options(nostack, nomem));
        core::arch::asm!("sldt {:x}", out(reg) ldtr, options(nostack, nomem));
    }
    let (cr3_frame, cr3_flags) = Cr3::read_raw();
    let gdtr = sgdt();
    let idtr = sidt();

    VmStateSnapshot {
        es: ES::get_reg().0,
        cs: CS::get_reg().0,
        ss: SS::get_reg().0,
        ds: DS::get_reg().0,
        fs: FS::get_reg().0,
        gs: GS::get_reg().0,
        ldtr,
        tr,
        cr0: Cr0::read_raw(),
        cr3: cr3_frame.start_address().as_u64() | cr3_flags as u64,
        cr4: Cr4::read_raw(),
        dr7,
        rflags: rflags::read_raw(),
        gdt_base: gdtr.base.as_u64(),
        gdt_limit: gdtr.limit,
        idt_base: idtr.base.as_u64(),
        idt_limit: idtr.limit,
        ia32_debugctl: intrinsics.read_msr(msr::IA32_DEBUGCTL),
        ia32_pat: intrinsics.read_msr(msr::IA32_PAT),
        ia32_efer: intrinsics.read_msr(msr::IA32_EFER),
        ia32_perf_global_ctrl: intrinsics.read_msr(msr::IA32_PERF_GLOBAL_CTRL),
        ia32_sysenter_cs: intrinsics.read_msr(msr::IA32_SYSENTER_CS),
        ia32_sysenter_esp: intrinsics.read_msr(msr::IA32_SYSENTER_ESP),
        ia32_sysenter_eip: intrinsics.read_msr(msr::IA32_SYSENTER_EIP),
        ia32_fs_base: intrinsics.read_msr(msr::IA32_FS_BASE),
        ia32_gs_base: intrinsics.read_msr(msr::IA32_GS_BASE),
        ..VmStateSnapshot::default()
    }
}
