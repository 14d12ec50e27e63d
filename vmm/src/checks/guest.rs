//! Rules over the guest-state area (SDM Vol. 3, 26.3.1).
//!
//! The guest catalogue is the one the processor spends the most silicon on;
//! the subset here covers the register-state families. Segment access-rights
//! consistency beyond LDTR usability is left to the hardware check, which
//! reports it through the entry failure the control and register rules
//! cannot explain.

use alloc::format;
use alloc::string::String;

use super::{is_canonical, pat_is_valid, Check, CheckCtx, CR0_PE, CR0_PG, CR4_PAE, CR4_PCIDE};
use crate::controls::{EntryControls, SecondaryProcControls};
use crate::{fields, msr};

pub(super) const CHECKS: &[Check] = &[
    Check {
        name: "guest_cr0_for_unsupported_bits",
        run: cr0_for_unsupported_bits,
    },
    Check {
        name: "guest_cr0_verify_paging_enabled",
        run: cr0_verify_paging_enabled,
    },
    Check {
        name: "guest_cr4_for_unsupported_bits",
        run: cr4_for_unsupported_bits,
    },
    Check {
        name: "guest_cr3_for_unsupported_bits",
        run: cr3_for_unsupported_bits,
    },
    Check {
        name: "guest_load_debugctl_verify_reserved",
        run: load_debugctl_verify_reserved,
    },
    Check {
        name: "guest_verify_ia_32e_mode_enabled",
        run: verify_ia_32e_mode_enabled,
    },
    Check {
        name: "guest_verify_ia_32e_mode_disabled",
        run: verify_ia_32e_mode_disabled,
    },
    Check {
        name: "guest_load_debugctl_verify_dr7",
        run: load_debugctl_verify_dr7,
    },
    Check {
        name: "guest_ia32_sysenter_esp_canonical_address",
        run: ia32_sysenter_esp_canonical_address,
    },
    Check {
        name: "guest_ia32_sysenter_eip_canonical_address",
        run: ia32_sysenter_eip_canonical_address,
    },
    Check {
        name: "guest_verify_load_ia32_perf_global_ctrl",
        run: verify_load_ia32_perf_global_ctrl,
    },
    Check {
        name: "guest_verify_load_ia32_pat",
        run: verify_load_ia32_pat,
    },
    Check {
        name: "guest_verify_load_ia32_efer",
        run: verify_load_ia32_efer,
    },
    Check {
        name: "guest_tr_base_canonical",
        run: tr_base_canonical,
    },
    Check {
        name: "guest_fs_base_canonical",
        run: fs_base_canonical,
    },
    Check {
        name: "guest_gs_base_canonical",
        run: gs_base_canonical,
    },
    Check {
        name: "guest_ldtr_base_canonical",
        run: ldtr_base_canonical,
    },
    Check {
        name: "guest_gdtr_base_canonical",
        run: gdtr_base_canonical,
    },
    Check {
        name: "guest_idtr_base_canonical",
        run: idtr_base_canonical,
    },
    Check {
        name: "guest_rflags_reserved_bits",
        run: rflags_reserved_bits,
    },
    Check {
        name: "guest_rflags_vm_flag",
        run: rflags_vm_flag,
    },
    Check {
        name: "guest_rflag_interrupt_enable",
        run: rflag_interrupt_enable,
    },
    Check {
        name: "guest_valid_vmcs_link_pointer",
        run: valid_vmcs_link_pointer,
    },
];

// RFLAGS layout constants used below.
const RFLAGS_ALWAYS_ONE: u64 = 1 << 1;
const RFLAGS_IF: u64 = 1 << 9;
const RFLAGS_VM: u64 = 1 << 17;
const RFLAGS_RESERVED_MASK: u64 = 0xFFFF_FFFF_FFC0_802A & !RFLAGS_ALWAYS_ONE;

fn cr0_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr0 = ctx.read(fields::GUEST_CR0)?;
    let mut fixed0 = ctx.msr(msr::IA32_VMX_CR0_FIXED0);
    let fixed1 = ctx.msr(msr::IA32_VMX_CR0_FIXED1);
    // Unrestricted guests may run unpaged in real mode.
    if ctx.proc2_ctl(SecondaryProcControls::UNRESTRICTED_GUEST)? {
        fixed0 &= !(CR0_PE | CR0_PG);
    }
    if cr0 & fixed0 != fixed0 {
        return Err(format!(
            "guest cr0 0x{:016x} clears fixed-1 bits 0x{:016x}",
            cr0,
            fixed0 & !cr0
        ));
    }
    if cr0 & !fixed1 != 0 {
        return Err(format!(
            "guest cr0 0x{:016x} sets fixed-0 bits 0x{:016x}",
            cr0,
            cr0 & !fixed1
        ));
    }
    Ok(())
}

fn cr0_verify_paging_enabled(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr0 = ctx.read(fields::GUEST_CR0)?;
    if cr0 & CR0_PG != 0 && cr0 & CR0_PE == 0 {
        return Err("guest cr0 enables paging without protection".into());
    }
    Ok(())
}

fn cr4_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr4 = ctx.read(fields::GUEST_CR4)?;
    let fixed0 = ctx.msr(msr::IA32_VMX_CR4_FIXED0);
    let fixed1 = ctx.msr(msr::IA32_VMX_CR4_FIXED1);
    if cr4 & fixed0 != fixed0 {
        return Err(format!(
            "guest cr4 0x{:016x} clears fixed-1 bits 0x{:016x}",
            cr4,
            fixed0 & !cr4
        ));
    }
    if cr4 & !fixed1 != 0 {
        return Err(format!(
            "guest cr4 0x{:016x} sets fixed-0 bits 0x{:016x}",
            cr4,
            cr4 & !fixed1
        ));
    }
    Ok(())
}

fn cr3_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr3 = ctx.read(fields::GUEST_CR3)?;
    if ctx.beyond_physical_width(cr3) {
        return Err(format!(
            "guest cr3 0x{:016x} exceeds the physical address width",
            cr3
        ));
    }
    Ok(())
}

fn load_debugctl_verify_reserved(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::LOAD_DEBUG_CONTROLS)? {
        return Ok(());
    }
    let debugctl = ctx.read(fields::GUEST_IA32_DEBUGCTL)?;
    if debugctl & msr::DEBUGCTL_RESERVED_MASK != 0 {
        return Err(format!(
            "guest debugctl 0x{:016x} sets reserved bits",
            debugctl
        ));
    }
    Ok(())
}

fn verify_ia_32e_mode_enabled(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)? {
        return Ok(());
    }
    let cr0 = ctx.read(fields::GUEST_CR0)?;
    if cr0 & CR0_PG == 0 {
        return Err("ia-32e guest requires cr0.pg".into());
    }
    let cr4 = ctx.read(fields::GUEST_CR4)?;
    if cr4 & CR4_PAE == 0 {
        return Err("ia-32e guest requires cr4.pae".into());
    }
    Ok(())
}

fn verify_ia_32e_mode_disabled(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)? {
        return Ok(());
    }
    let cr4 = ctx.read(fields::GUEST_CR4)?;
    if cr4 & CR4_PCIDE != 0 {
        return Err("guest outside ia-32e mode cannot keep cr4.pcide".into());
    }
    Ok(())
}

fn load_debugctl_verify_dr7(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::LOAD_DEBUG_CONTROLS)? {
        return Ok(());
    }
    let dr7 = ctx.read(fields::GUEST_DR7)?;
    if dr7 >> 32 != 0 {
        return Err(format!("guest dr7 0x{:016x} sets bits 63:32", dr7));
    }
    Ok(())
}

fn ia32_sysenter_esp_canonical_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let esp = ctx.read(fields::GUEST_IA32_SYSENTER_ESP)?;
    if !is_canonical(esp) {
        return Err(format!("guest sysenter esp 0x{:016x} is not canonical", esp));
    }
    Ok(())
}

fn ia32_sysenter_eip_canonical_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let eip = ctx.read(fields::GUEST_IA32_SYSENTER_EIP)?;
    if !is_canonical(eip) {
        return Err(format!("guest sysenter eip 0x{:016x} is not canonical", eip));
    }
    Ok(())
}

fn verify_load_ia32_perf_global_ctrl(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::LOAD_IA32_PERF_GLOBAL_CTRL)? {
        return Ok(());
    }
    let perf = ctx.read(fields::GUEST_IA32_PERF_GLOBAL_CTRL)?;
    if perf & msr::PERF_GLOBAL_CTRL_RESERVED_MASK != 0 {
        return Err(format!(
            "guest perf global ctrl 0x{:016x} sets reserved bits",
            perf
        ));
    }
    Ok(())
}

fn verify_load_ia32_pat(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::LOAD_IA32_PAT)? {
        return Ok(());
    }
    let pat = ctx.read(fields::GUEST_IA32_PAT)?;
    if !pat_is_valid(pat) {
        return Err(format!(
            "guest pat 0x{:016x} names an undefined memory type",
            pat
        ));
    }
    Ok(())
}

fn verify_load_ia32_efer(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.entry_ctl(EntryControls::LOAD_IA32_EFER)? {
        return Ok(());
    }
    let efer = ctx.read(fields::GUEST_IA32_EFER)?;
    if efer & msr::EFER_RESERVED_MASK != 0 {
        return Err(format!("guest efer 0x{:016x} sets reserved bits", efer));
    }
    let ia32e = ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)?;
    if (efer & msr::EFER_LMA != 0) != ia32e {
        return Err(format!(
            "guest efer.lma {} disagrees with ia-32e-mode-guest {}",
            (efer & msr::EFER_LMA != 0) as u8,
            ia32e as u8
        ));
    }
    let cr0 = ctx.read(fields::GUEST_CR0)?;
    if cr0 & CR0_PG != 0 && (efer & msr::EFER_LME != 0) != (efer & msr::EFER_LMA != 0) {
        return Err("guest efer.lme disagrees with efer.lma under paging".into());
    }
    Ok(())
}

fn canonical_base(ctx: &CheckCtx<'_>, field: u64, name: &str) -> Result<(), String> {
    let base = ctx.read(field)?;
    if !is_canonical(base) {
        return Err(format!(
            "guest {} base 0x{:016x} is not canonical",
            name, base
        ));
    }
    Ok(())
}

fn tr_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::GUEST_TR_BASE, "tr")
}

fn fs_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::GUEST_FS_BASE, "fs")
}

fn gs_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::GUEST_GS_BASE, "gs")
}

/// Only a usable LDTR constrains its base; bit 16 of the access rights marks
/// the segment unusable.
fn ldtr_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let rights = ctx.read(fields::GUEST_LDTR_ACCESS_RIGHTS)?;
    if rights & (1 << 16) != 0 {
        return Ok(());
    }
    canonical_base(ctx, fields::GUEST_LDTR_BASE, "ldtr")
}

fn gdtr_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::GUEST_GDTR_BASE, "gdtr")
}

fn idtr_base_canonical(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::GUEST_IDTR_BASE, "idtr")
}

fn rflags_reserved_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let rflags = ctx.read(fields::GUEST_RFLAGS)?;
    if rflags & RFLAGS_RESERVED_MASK != 0 {
        return Err(format!(
            "guest rflags 0x{:016x} sets reserved bits 0x{:016x}",
            rflags,
            rflags & RFLAGS_RESERVED_MASK
        ));
    }
    if rflags & RFLAGS_ALWAYS_ONE == 0 {
        return Err(format!("guest rflags 0x{:016x} clears bit 1", rflags));
    }
    Ok(())
}

fn rflags_vm_flag(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let rflags = ctx.read(fields::GUEST_RFLAGS)?;
    if rflags & RFLAGS_VM == 0 {
        return Ok(());
    }
    if ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)? {
        return Err("rflags.vm cannot be set for an ia-32e guest".into());
    }
    if ctx.read(fields::GUEST_CR0)? & CR0_PE == 0 {
        return Err("rflags.vm cannot be set without cr0.pe".into());
    }
    Ok(())
}

/// Injecting an external interrupt into a guest with interrupts masked would
/// be swallowed; the processor refuses the entry instead.
fn rflag_interrupt_enable(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & (1 << 31) == 0 || (info >> 8) & 0x7 != 0 {
        return Ok(());
    }
    if ctx.read(fields::GUEST_RFLAGS)? & RFLAGS_IF == 0 {
        return Err("external-interrupt injection requires rflags.if".into());
    }
    Ok(())
}

fn valid_vmcs_link_pointer(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let pointer = ctx.read(fields::VMCS_LINK_POINTER)?;
    if pointer == u64::MAX {
        return Ok(());
    }
    if pointer & 0xFFF != 0 {
        return Err(format!(
            "vmcs link pointer 0x{:016x} is not 4K aligned",
            pointer
        ));
    }
    if ctx.beyond_physical_width(pointer) {
        return Err(format!(
            "vmcs link pointer 0x{:016x} exceeds the physical address width",
            pointer
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::assert_single_violation;
    use crate::testing::{legal_vmcs_intrinsics, LEGAL_EFER};
    use crate::fields;

    #[test]
    fn test_cr0_fixed_bit_cleared() {
        let mock = legal_vmcs_intrinsics();
        // NE clear while IA32_VMX_CR0_FIXED0 demands it; PE and PG stay set.
        mock.set_field(fields::GUEST_CR0, 0x8005_0013);
        assert_single_violation(&mock, "guest_cr0_for_unsupported_bits");
    }

    #[test]
    fn test_cr0_paging_without_protection() {
        let mock = legal_vmcs_intrinsics();
        // PG without PE also violates the fixed-bit envelope, so loosen it.
        mock.set_msr(crate::msr::IA32_VMX_CR0_FIXED0, 0);
        mock.set_field(fields::GUEST_CR0, 0x8005_0032);
        assert_single_violation(&mock, "guest_cr0_verify_paging_enabled");
    }

    #[test]
    fn test_cr4_fixed_bit_cleared() {
        let mock = legal_vmcs_intrinsics();
        // VMXE clear while IA32_VMX_CR4_FIXED0 demands it; PAE stays set so
        // the ia-32e coupling rule is untouched.
        mock.set_field(fields::GUEST_CR4, 0x0020);
        assert_single_violation(&mock, "guest_cr4_for_unsupported_bits");
    }

    #[test]
    fn test_cr3_beyond_physical_width() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_CR3, 0x100_0000_0000);
        assert_single_violation(&mock, "guest_cr3_for_unsupported_bits");
    }

    #[test]
    fn test_ia32e_guest_needs_pae() {
        let mock = legal_vmcs_intrinsics();
        // VMXE alone satisfies the fixed-bit envelope but not ia-32e mode.
        mock.set_field(fields::GUEST_CR4, 0x2000);
        assert_single_violation(&mock, "guest_verify_ia_32e_mode_enabled");
    }

    #[test]
    fn test_legacy_guest_rejects_pcide() {
        let mock = legal_vmcs_intrinsics();
        // Leave ia-32e mode; the efer load coupling goes with it.
        let entry = mock.field(fields::VM_ENTRY_CONTROLS) & !((1 << 9) | (1 << 15));
        mock.set_field(fields::VM_ENTRY_CONTROLS, entry);
        mock.set_field(fields::GUEST_CR4, 0x2020 | (1 << 17));
        assert_single_violation(&mock, "guest_verify_ia_32e_mode_disabled");
    }

    #[test]
    fn test_debugctl_reserved_bits() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IA32_DEBUGCTL, 1 << 2);
        assert_single_violation(&mock, "guest_load_debugctl_verify_reserved");
    }

    #[test]
    fn test_dr7_upper_bits() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_DR7, 0x1_0000_0400);
        assert_single_violation(&mock, "guest_load_debugctl_verify_dr7");
    }

    #[test]
    fn test_sysenter_esp_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IA32_SYSENTER_ESP, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_ia32_sysenter_esp_canonical_address");
    }

    #[test]
    fn test_sysenter_eip_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IA32_SYSENTER_EIP, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_ia32_sysenter_eip_canonical_address");
    }

    #[test]
    fn test_perf_global_ctrl_reserved_bits() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IA32_PERF_GLOBAL_CTRL, 1 << 8);
        assert_single_violation(&mock, "guest_verify_load_ia32_perf_global_ctrl");
    }

    #[test]
    fn test_pat_undefined_memory_type() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IA32_PAT, 0x0000_0000_0000_0002);
        assert_single_violation(&mock, "guest_verify_load_ia32_pat");
    }

    #[test]
    fn test_efer_lma_against_entry_control() {
        let mock = legal_vmcs_intrinsics();
        // LMA and LME cleared while ia-32e-mode-guest stays on.
        mock.set_field(fields::GUEST_IA32_EFER, LEGAL_EFER & !0x500);
        assert_single_violation(&mock, "guest_verify_load_ia32_efer");
    }

    #[test]
    fn test_tr_base_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_TR_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_tr_base_canonical");
    }

    #[test]
    fn test_unusable_ldtr_skips_base_rule() {
        let mock = legal_vmcs_intrinsics();
        // Non-canonical base behind an unusable LDTR is fine.
        mock.set_field(fields::GUEST_LDTR_BASE, 0x0000_8000_0000_0000);
        let sink = crate::testing::RecordingSink::new();
        assert!(super::super::check_vmcs_guest_state(&mock, &sink).is_empty());

        // Marking it usable brings the rule back.
        mock.set_field(fields::GUEST_LDTR_ACCESS_RIGHTS, 0x0082);
        assert_single_violation(&mock, "guest_ldtr_base_canonical");
    }

    #[test]
    fn test_fs_base_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_FS_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_fs_base_canonical");
    }

    #[test]
    fn test_gs_base_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_GS_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_gs_base_canonical");
    }

    #[test]
    fn test_gdtr_base_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_GDTR_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_gdtr_base_canonical");
    }

    #[test]
    fn test_idtr_base_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_IDTR_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "guest_idtr_base_canonical");
    }

    #[test]
    fn test_rflags_reserved_bit() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::GUEST_RFLAGS, 0x2 | (1 << 15));
        assert_single_violation(&mock, "guest_rflags_reserved_bits");
    }

    #[test]
    fn test_rflags_vm_in_ia32e_mode() {
        let mock = legal_vmcs_intrinsics();
        // Bit 17 is outside the reserved mask, so only the vm-flag rule sees it.
        mock.set_field(fields::GUEST_RFLAGS, 0x2 | (1 << 17));
        assert_single_violation(&mock, "guest_rflags_vm_flag");
    }

    #[test]
    fn test_external_interrupt_needs_if() {
        let mock = legal_vmcs_intrinsics();
        // Valid injection, type 0 (external interrupt), vector 0x20, with
        // guest interrupts masked.
        mock.set_field(fields::VM_ENTRY_INTERRUPTION_INFO, (1 << 31) | 0x20);
        assert_single_violation(&mock, "guest_rflag_interrupt_enable");
    }

    #[test]
    fn test_link_pointer_alignment() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::VMCS_LINK_POINTER, 0x1800);
        assert_single_violation(&mock, "guest_valid_vmcs_link_pointer");
    }
}
