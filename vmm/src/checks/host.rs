//! Rules over the host-state area (SDM Vol. 3, 26.2.2 through 26.2.4).
//!
//! These decide whether the context the processor restores on VM exit is
//! loadable. A bad host state is the worst failure mode VT-x has: the entry
//! succeeds and the machine dies on the first exit instead.

use alloc::format;
use alloc::string::String;

use super::{is_canonical, pat_is_valid, Check, CheckCtx};
use crate::controls::{EntryControls, ExitControls};
use crate::{fields, msr};

pub(super) const CHECKS: &[Check] = &[
    Check {
        name: "host_cr0_for_unsupported_bits",
        run: cr0_for_unsupported_bits,
    },
    Check {
        name: "host_cr4_for_unsupported_bits",
        run: cr4_for_unsupported_bits,
    },
    Check {
        name: "host_cr3_for_unsupported_bits",
        run: cr3_for_unsupported_bits,
    },
    Check {
        name: "host_ia32_sysenter_esp_canonical_address",
        run: ia32_sysenter_esp_canonical_address,
    },
    Check {
        name: "host_ia32_sysenter_eip_canonical_address",
        run: ia32_sysenter_eip_canonical_address,
    },
    Check {
        name: "host_verify_load_ia32_perf_global_ctrl",
        run: verify_load_ia32_perf_global_ctrl,
    },
    Check {
        name: "host_verify_load_ia32_pat",
        run: verify_load_ia32_pat,
    },
    Check {
        name: "host_verify_load_ia32_efer",
        run: verify_load_ia32_efer,
    },
    Check {
        name: "host_es_selector_rpl_ti_equal_zero",
        run: es_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_cs_selector_rpl_ti_equal_zero",
        run: cs_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_ss_selector_rpl_ti_equal_zero",
        run: ss_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_ds_selector_rpl_ti_equal_zero",
        run: ds_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_fs_selector_rpl_ti_equal_zero",
        run: fs_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_gs_selector_rpl_ti_equal_zero",
        run: gs_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_tr_selector_rpl_ti_equal_zero",
        run: tr_selector_rpl_ti_equal_zero,
    },
    Check {
        name: "host_cs_not_equal_zero",
        run: cs_not_equal_zero,
    },
    Check {
        name: "host_tr_not_equal_zero",
        run: tr_not_equal_zero,
    },
    Check {
        name: "host_ss_not_equal_zero",
        run: ss_not_equal_zero,
    },
    Check {
        name: "host_fs_canonical_base_address",
        run: fs_canonical_base_address,
    },
    Check {
        name: "host_gs_canonical_base_address",
        run: gs_canonical_base_address,
    },
    Check {
        name: "host_gdtr_canonical_base_address",
        run: gdtr_canonical_base_address,
    },
    Check {
        name: "host_idtr_canonical_base_address",
        run: idtr_canonical_base_address,
    },
    Check {
        name: "host_tr_canonical_base_address",
        run: tr_canonical_base_address,
    },
    Check {
        name: "host_if_outside_ia32e_mode",
        run: if_outside_ia32e_mode,
    },
    Check {
        name: "host_address_space_size_exit_ctl_is_set",
        run: address_space_size_exit_ctl_is_set,
    },
    Check {
        name: "host_address_space_disabled",
        run: address_space_disabled,
    },
    Check {
        name: "host_address_space_enabled",
        run: address_space_enabled,
    },
];

/// CR0/CR4 fixed-bit envelope: every FIXED0 bit must be set, every bit
/// outside FIXED1 must be clear.
fn fixed_bits_ok(value: u64, fixed0: u64, fixed1: u64, what: &str) -> Result<(), String> {
    if value & fixed0 != fixed0 {
        return Err(format!(
            "{} 0x{:016x} clears fixed-1 bits 0x{:016x}",
            what,
            value,
            fixed0 & !value
        ));
    }
    if value & !fixed1 != 0 {
        return Err(format!(
            "{} 0x{:016x} sets fixed-0 bits 0x{:016x}",
            what,
            value,
            value & !fixed1
        ));
    }
    Ok(())
}

fn cr0_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr0 = ctx.read(fields::HOST_CR0)?;
    fixed_bits_ok(
        cr0,
        ctx.msr(msr::IA32_VMX_CR0_FIXED0),
        ctx.msr(msr::IA32_VMX_CR0_FIXED1),
        "host cr0",
    )
}

fn cr4_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr4 = ctx.read(fields::HOST_CR4)?;
    fixed_bits_ok(
        cr4,
        ctx.msr(msr::IA32_VMX_CR4_FIXED0),
        ctx.msr(msr::IA32_VMX_CR4_FIXED1),
        "host cr4",
    )
}

fn cr3_for_unsupported_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let cr3 = ctx.read(fields::HOST_CR3)?;
    if ctx.beyond_physical_width(cr3) {
        return Err(format!(
            "host cr3 0x{:016x} exceeds the physical address width",
            cr3
        ));
    }
    Ok(())
}

fn ia32_sysenter_esp_canonical_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let esp = ctx.read(fields::HOST_IA32_SYSENTER_ESP)?;
    if !is_canonical(esp) {
        return Err(format!("host sysenter esp 0x{:016x} is not canonical", esp));
    }
    Ok(())
}

fn ia32_sysenter_eip_canonical_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let eip = ctx.read(fields::HOST_IA32_SYSENTER_EIP)?;
    if !is_canonical(eip) {
        return Err(format!("host sysenter eip 0x{:016x} is not canonical", eip));
    }
    Ok(())
}

fn verify_load_ia32_perf_global_ctrl(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.exit_ctl(ExitControls::LOAD_IA32_PERF_GLOBAL_CTRL)? {
        return Ok(());
    }
    let perf = ctx.read(fields::HOST_IA32_PERF_GLOBAL_CTRL)?;
    if perf & msr::PERF_GLOBAL_CTRL_RESERVED_MASK != 0 {
        return Err(format!(
            "host perf global ctrl 0x{:016x} sets reserved bits",
            perf
        ));
    }
    Ok(())
}

fn verify_load_ia32_pat(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.exit_ctl(ExitControls::LOAD_IA32_PAT)? {
        return Ok(());
    }
    let pat = ctx.read(fields::HOST_IA32_PAT)?;
    if !pat_is_valid(pat) {
        return Err(format!(
            "host pat 0x{:016x} names an undefined memory type",
            pat
        ));
    }
    Ok(())
}

fn verify_load_ia32_efer(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.exit_ctl(ExitControls::LOAD_IA32_EFER)? {
        return Ok(());
    }
    let efer = ctx.read(fields::HOST_IA32_EFER)?;
    if efer & msr::EFER_RESERVED_MASK != 0 {
        return Err(format!("host efer 0x{:016x} sets reserved bits", efer));
    }
    let host_64 = ctx.exit_ctl(ExitControls::HOST_ADDRESS_SPACE_SIZE)?;
    if (efer & msr::EFER_LMA != 0) != host_64 {
        return Err(format!(
            "host efer.lma {} disagrees with host-address-space-size {}",
            (efer & msr::EFER_LMA != 0) as u8,
            host_64 as u8
        ));
    }
    if (efer & msr::EFER_LME != 0) != host_64 {
        return Err(format!(
            "host efer.lme {} disagrees with host-address-space-size {}",
            (efer & msr::EFER_LME != 0) as u8,
            host_64 as u8
        ));
    }
    Ok(())
}

fn selector_rpl_ti_zero(ctx: &CheckCtx<'_>, field: u64, name: &str) -> Result<(), String> {
    let selector = ctx.read(field)?;
    if selector & 0x7 != 0 {
        return Err(format!(
            "host {} selector 0x{:04x} sets rpl or ti bits",
            name, selector
        ));
    }
    Ok(())
}

fn es_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_ES_SELECTOR, "es")
}

fn cs_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_CS_SELECTOR, "cs")
}

fn ss_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_SS_SELECTOR, "ss")
}

fn ds_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_DS_SELECTOR, "ds")
}

fn fs_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_FS_SELECTOR, "fs")
}

fn gs_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_GS_SELECTOR, "gs")
}

fn tr_selector_rpl_ti_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    selector_rpl_ti_zero(ctx, fields::HOST_TR_SELECTOR, "tr")
}

fn cs_not_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.read(fields::HOST_CS_SELECTOR)? == 0 {
        return Err("host cs selector is the null selector".into());
    }
    Ok(())
}

fn tr_not_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.read(fields::HOST_TR_SELECTOR)? == 0 {
        return Err("host tr selector is the null selector".into());
    }
    Ok(())
}

fn ss_not_equal_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.read(fields::HOST_SS_SELECTOR)? == 0 {
        return Err("host ss selector is the null selector".into());
    }
    Ok(())
}

fn canonical_base(ctx: &CheckCtx<'_>, field: u64, name: &str) -> Result<(), String> {
    let base = ctx.read(field)?;
    if !is_canonical(base) {
        return Err(format!(
            "host {} base 0x{:016x} is not canonical",
            name, base
        ));
    }
    Ok(())
}

fn fs_canonical_base_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::HOST_FS_BASE, "fs")
}

fn gs_canonical_base_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::HOST_GS_BASE, "gs")
}

fn gdtr_canonical_base_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::HOST_GDTR_BASE, "gdtr")
}

fn idtr_canonical_base_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::HOST_IDTR_BASE, "idtr")
}

fn tr_canonical_base_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    canonical_base(ctx, fields::HOST_TR_BASE, "tr")
}

/// Outside IA-32e mode the entry must stay 32-bit on both sides.
fn if_outside_ia32e_mode(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.msr(msr::IA32_EFER) & msr::EFER_LMA != 0 {
        return Ok(());
    }
    if ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)? {
        return Err("ia-32e guest mode requested outside ia-32e operation".into());
    }
    if ctx.exit_ctl(ExitControls::HOST_ADDRESS_SPACE_SIZE)? {
        return Err("64-bit host requested outside ia-32e operation".into());
    }
    Ok(())
}

fn address_space_size_exit_ctl_is_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.msr(msr::IA32_EFER) & msr::EFER_LMA == 0 {
        return Ok(());
    }
    if !ctx.exit_ctl(ExitControls::HOST_ADDRESS_SPACE_SIZE)? {
        return Err("ia-32e operation requires host-address-space-size".into());
    }
    Ok(())
}

fn address_space_disabled(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.exit_ctl(ExitControls::HOST_ADDRESS_SPACE_SIZE)? {
        return Ok(());
    }
    if ctx.entry_ctl(EntryControls::IA32E_MODE_GUEST)? {
        return Err("32-bit host cannot enter an ia-32e guest".into());
    }
    let cr4 = ctx.read(fields::HOST_CR4)?;
    if cr4 & super::CR4_PCIDE != 0 {
        return Err("32-bit host cannot keep cr4.pcide set".into());
    }
    let rip = ctx.read(fields::HOST_RIP)?;
    if rip >> 32 != 0 {
        return Err(format!(
            "32-bit host rip 0x{:016x} sets bits 63:32",
            rip
        ));
    }
    Ok(())
}

fn address_space_enabled(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.exit_ctl(ExitControls::HOST_ADDRESS_SPACE_SIZE)? {
        return Ok(());
    }
    let cr4 = ctx.read(fields::HOST_CR4)?;
    if cr4 & super::CR4_PAE == 0 {
        return Err("64-bit host requires cr4.pae".into());
    }
    let rip = ctx.read(fields::HOST_RIP)?;
    if !is_canonical(rip) {
        return Err(format!("host rip 0x{:016x} is not canonical", rip));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::assert_single_violation;
    use crate::testing::legal_vmcs_intrinsics;
    use crate::{fields, msr};

    #[test]
    fn test_cr0_fixed_bit_cleared() {
        let mock = legal_vmcs_intrinsics();
        // Clear NE, which IA32_VMX_CR0_FIXED0 demands.
        mock.set_field(fields::HOST_CR0, 0x8005_0013);
        assert_single_violation(&mock, "host_cr0_for_unsupported_bits");
    }

    #[test]
    fn test_cr4_fixed_bit_cleared() {
        let mock = legal_vmcs_intrinsics();
        // VMXE clear while IA32_VMX_CR4_FIXED0 demands it; PAE stays set so
        // the 64-bit host rule is untouched.
        mock.set_field(fields::HOST_CR4, 0x0020);
        assert_single_violation(&mock, "host_cr4_for_unsupported_bits");
    }

    #[test]
    fn test_cr3_beyond_physical_width() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_CR3, 0x100_0000_0000);
        assert_single_violation(&mock, "host_cr3_for_unsupported_bits");
    }

    #[test]
    fn test_sysenter_esp_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IA32_SYSENTER_ESP, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_ia32_sysenter_esp_canonical_address");
    }

    #[test]
    fn test_sysenter_eip_noncanonical() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IA32_SYSENTER_EIP, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_ia32_sysenter_eip_canonical_address");
    }

    #[test]
    fn test_perf_global_ctrl_reserved_bits() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IA32_PERF_GLOBAL_CTRL, 1 << 8);
        assert_single_violation(&mock, "host_verify_load_ia32_perf_global_ctrl");
    }

    #[test]
    fn test_pat_undefined_memory_type() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IA32_PAT, 0x0000_0000_0000_0002);
        assert_single_violation(&mock, "host_verify_load_ia32_pat");
    }

    #[test]
    fn test_efer_reserved_bits() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IA32_EFER, crate::testing::LEGAL_EFER | (1 << 1));
        assert_single_violation(&mock, "host_verify_load_ia32_efer");
    }

    #[test]
    fn test_ds_selector_with_rpl() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_DS_SELECTOR, 0x13);
        assert_single_violation(&mock, "host_ds_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_es_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_ES_SELECTOR, 0x14);
        assert_single_violation(&mock, "host_es_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_cs_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_CS_SELECTOR, 0x0C);
        assert_single_violation(&mock, "host_cs_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_ss_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_SS_SELECTOR, 0x14);
        assert_single_violation(&mock, "host_ss_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_fs_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_FS_SELECTOR, 0x14);
        assert_single_violation(&mock, "host_fs_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_gs_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_GS_SELECTOR, 0x14);
        assert_single_violation(&mock, "host_gs_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_tr_selector_with_ti() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_TR_SELECTOR, 0x1C);
        assert_single_violation(&mock, "host_tr_selector_rpl_ti_equal_zero");
    }

    #[test]
    fn test_cs_null_selector() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_CS_SELECTOR, 0);
        assert_single_violation(&mock, "host_cs_not_equal_zero");
    }

    #[test]
    fn test_tr_null_selector() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_TR_SELECTOR, 0);
        assert_single_violation(&mock, "host_tr_not_equal_zero");
    }

    #[test]
    fn test_ss_null_selector() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_SS_SELECTOR, 0);
        assert_single_violation(&mock, "host_ss_not_equal_zero");
    }

    #[test]
    fn test_gdtr_noncanonical_base() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_GDTR_BASE, 0xFFFF_7FFF_FFFF_FFFF);
        assert_single_violation(&mock, "host_gdtr_canonical_base_address");
    }

    #[test]
    fn test_fs_noncanonical_base() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_FS_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_fs_canonical_base_address");
    }

    #[test]
    fn test_gs_noncanonical_base() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_GS_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_gs_canonical_base_address");
    }

    #[test]
    fn test_idtr_noncanonical_base() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_IDTR_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_idtr_canonical_base_address");
    }

    #[test]
    fn test_tr_noncanonical_base() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_TR_BASE, 0x0000_8000_0000_0000);
        assert_single_violation(&mock, "host_tr_canonical_base_address");
    }

    #[test]
    fn test_ia32e_operation_demands_64bit_host() {
        let mock = legal_vmcs_intrinsics();
        // Drop host-address-space-size. The efer couplings on both sides and
        // the 32-bit-host rip rule are silenced so only the live-mode rule
        // can trip.
        let exit = mock.field(fields::VM_EXIT_CONTROLS) & !((1 << 9) | (1 << 21));
        mock.set_field(fields::VM_EXIT_CONTROLS, exit);
        let entry = mock.field(fields::VM_ENTRY_CONTROLS) & !((1 << 9) | (1 << 15));
        mock.set_field(fields::VM_ENTRY_CONTROLS, entry);
        mock.set_field(fields::HOST_RIP, 0x8000_1000);
        assert_single_violation(&mock, "host_address_space_size_exit_ctl_is_set");
    }

    #[test]
    fn test_32bit_host_rejects_wide_rip() {
        let mock = legal_vmcs_intrinsics();
        // A processor outside ia-32e operation entering a 32-bit guest; the
        // host rip keeps its 64-bit value.
        mock.set_msr(msr::IA32_EFER, 0);
        let exit = mock.field(fields::VM_EXIT_CONTROLS) & !((1 << 9) | (1 << 21));
        mock.set_field(fields::VM_EXIT_CONTROLS, exit);
        let entry = mock.field(fields::VM_ENTRY_CONTROLS) & !((1 << 9) | (1 << 15));
        mock.set_field(fields::VM_ENTRY_CONTROLS, entry);
        assert_single_violation(&mock, "host_address_space_disabled");
    }

    #[test]
    fn test_64bit_host_needs_canonical_rip() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::HOST_RIP, 0x0001_0000_0000_0000);
        assert_single_violation(&mock, "host_address_space_enabled");
    }

    #[test]
    fn test_live_efer_without_lma_forbids_64bit_entry() {
        let mock = legal_vmcs_intrinsics();
        mock.set_msr(msr::IA32_EFER, 0);
        // The host EFER coupling rule stays quiet because the VMCS field
        // keeps LMA set; only the live-mode rule trips.
        let sink = crate::testing::RecordingSink::new();
        let violations = super::super::check_vmcs_host_state(&mock, &sink);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, "host_if_outside_ia32e_mode");
    }
}
