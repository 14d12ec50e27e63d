//! Rules over the VM-execution, VM-exit and VM-entry control fields
//! (SDM Vol. 3, 26.2.1).

use alloc::format;
use alloc::string::String;

use super::{reserved_properly_set, Check, CheckCtx, CR0_PE};
use crate::controls::{
    split_capability, ExitControls, PinBasedControls, PrimaryProcControls, SecondaryProcControls,
};
use crate::{fields, msr};

pub(super) const CHECKS: &[Check] = &[
    Check {
        name: "control_pin_based_ctls_reserved_properly_set",
        run: pin_based_ctls_reserved_properly_set,
    },
    Check {
        name: "control_proc_based_ctls_reserved_properly_set",
        run: proc_based_ctls_reserved_properly_set,
    },
    Check {
        name: "control_proc_based_ctls2_reserved_properly_set",
        run: proc_based_ctls2_reserved_properly_set,
    },
    Check {
        name: "control_vm_exit_ctls_reserved_properly_set",
        run: vm_exit_ctls_reserved_properly_set,
    },
    Check {
        name: "control_vm_entry_ctls_reserved_properly_set",
        run: vm_entry_ctls_reserved_properly_set,
    },
    Check {
        name: "control_cr3_target_count_within_limit",
        run: cr3_target_count_within_limit,
    },
    Check {
        name: "control_io_bitmap_addresses_valid",
        run: io_bitmap_addresses_valid,
    },
    Check {
        name: "control_msr_bitmap_address_valid",
        run: msr_bitmap_address_valid,
    },
    Check {
        name: "control_tpr_shadow_and_virtual_apic",
        run: tpr_shadow_and_virtual_apic,
    },
    Check {
        name: "control_nmi_exiting_and_virtual_nmi",
        run: nmi_exiting_and_virtual_nmi,
    },
    Check {
        name: "control_virtual_nmi_and_nmi_window",
        run: virtual_nmi_and_nmi_window,
    },
    Check {
        name: "control_x2apic_mode_and_virtual_apic_access",
        run: x2apic_mode_and_virtual_apic_access,
    },
    Check {
        name: "control_apic_access_address_valid",
        run: apic_access_address_valid,
    },
    Check {
        name: "control_virtual_interrupt_delivery",
        run: virtual_interrupt_delivery,
    },
    Check {
        name: "control_process_posted_interrupts",
        run: process_posted_interrupts,
    },
    Check {
        name: "control_vpid_not_zero",
        run: vpid_not_zero,
    },
    Check {
        name: "control_ept_pointer_well_formed",
        run: ept_pointer_well_formed,
    },
    Check {
        name: "control_enable_pml",
        run: enable_pml,
    },
    Check {
        name: "control_unrestricted_guests",
        run: unrestricted_guests,
    },
    Check {
        name: "control_enable_vm_functions",
        run: enable_vm_functions,
    },
    Check {
        name: "control_enable_vmcs_shadowing",
        run: enable_vmcs_shadowing,
    },
    Check {
        name: "control_enable_ept_violation_ve",
        run: enable_ept_violation_ve,
    },
    Check {
        name: "control_activate_and_save_preemption_timer",
        run: activate_and_save_preemption_timer,
    },
    Check {
        name: "control_exit_msr_store_address",
        run: exit_msr_store_address,
    },
    Check {
        name: "control_exit_msr_load_address",
        run: exit_msr_load_address,
    },
    Check {
        name: "control_entry_msr_load_address",
        run: entry_msr_load_address,
    },
    Check {
        name: "control_event_injection_type_vector",
        run: event_injection_type_vector,
    },
    Check {
        name: "control_event_injection_delivery_ec",
        run: event_injection_delivery_ec,
    },
    Check {
        name: "control_event_injection_reserved_bits",
        run: event_injection_reserved_bits,
    },
    Check {
        name: "control_event_injection_ec",
        run: event_injection_ec,
    },
    Check {
        name: "control_event_injection_instruction_length",
        run: event_injection_instruction_length,
    },
];

// VM-entry interruption-information layout: vector 7:0, type 10:8,
// deliver-error-code 11, reserved 30:12, valid 31.
const INJECTION_VALID: u64 = 1 << 31;
const INJECTION_DELIVER_EC: u64 = 1 << 11;
const INJECTION_RESERVED_MASK: u64 = 0x7FFF_F000;

const TYPE_RESERVED: u64 = 1;
const TYPE_NMI: u64 = 2;
const TYPE_HARDWARE_EXCEPTION: u64 = 3;
const TYPE_SOFTWARE_INTERRUPT: u64 = 4;
const TYPE_PRIVILEGED_SOFTWARE_EXCEPTION: u64 = 5;
const TYPE_SOFTWARE_EXCEPTION: u64 = 6;
const TYPE_OTHER_EVENT: u64 = 7;

fn injection_vector(info: u64) -> u64 {
    info & 0xFF
}

fn injection_type(info: u64) -> u64 {
    (info >> 8) & 0x7
}

/// Exception vectors that push an error code in protected mode.
fn vector_pushes_error_code(vector: u64) -> bool {
    matches!(vector, 8 | 10..=14 | 17)
}

/// 4 KiB aligned and within the processor's physical width.
fn valid_page_address(ctx: &CheckCtx<'_>, addr: u64, what: &str) -> Result<(), String> {
    if addr & 0xFFF != 0 {
        return Err(format!("{} 0x{:016x} is not 4K aligned", what, addr));
    }
    if ctx.beyond_physical_width(addr) {
        return Err(format!(
            "{} 0x{:016x} exceeds the physical address width",
            what, addr
        ));
    }
    Ok(())
}

fn pin_based_ctls_reserved_properly_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    reserved_properly_set(
        ctx,
        msr::IA32_VMX_TRUE_PINBASED_CTLS,
        fields::PIN_BASED_VM_EXECUTION_CONTROLS,
        "pin-based controls",
    )
}

fn proc_based_ctls_reserved_properly_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    reserved_properly_set(
        ctx,
        msr::IA32_VMX_TRUE_PROCBASED_CTLS,
        fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS,
        "primary processor-based controls",
    )
}

fn proc_based_ctls2_reserved_properly_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc_ctl(PrimaryProcControls::ACTIVATE_SECONDARY_CONTROLS)? {
        return Ok(());
    }
    reserved_properly_set(
        ctx,
        msr::IA32_VMX_PROCBASED_CTLS2,
        fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS,
        "secondary processor-based controls",
    )
}

fn vm_exit_ctls_reserved_properly_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    reserved_properly_set(
        ctx,
        msr::IA32_VMX_TRUE_EXIT_CTLS,
        fields::VM_EXIT_CONTROLS,
        "vm-exit controls",
    )
}

fn vm_entry_ctls_reserved_properly_set(ctx: &CheckCtx<'_>) -> Result<(), String> {
    reserved_properly_set(
        ctx,
        msr::IA32_VMX_TRUE_ENTRY_CTLS,
        fields::VM_ENTRY_CONTROLS,
        "vm-entry controls",
    )
}

fn cr3_target_count_within_limit(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let count = ctx.read(fields::CR3_TARGET_COUNT)?;
    if count > 4 {
        return Err(format!("cr3 target count {} exceeds 4", count));
    }
    Ok(())
}

fn io_bitmap_addresses_valid(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc_ctl(PrimaryProcControls::USE_IO_BITMAPS)? {
        return Ok(());
    }
    valid_page_address(ctx, ctx.read(fields::IO_BITMAP_A_ADDR)?, "io bitmap a")?;
    valid_page_address(ctx, ctx.read(fields::IO_BITMAP_B_ADDR)?, "io bitmap b")
}

fn msr_bitmap_address_valid(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc_ctl(PrimaryProcControls::USE_MSR_BITMAPS)? {
        return Ok(());
    }
    valid_page_address(ctx, ctx.read(fields::MSR_BITMAPS_ADDR)?, "msr bitmap")
}

/// With a TPR shadow the virtual-APIC page must exist and, without virtual
/// interrupt delivery, the threshold must fit in its low nibble. Without a
/// TPR shadow none of the APIC virtualization modes may be on. The
/// threshold-versus-virtual-TPR comparison needs a physical read of the
/// virtual-APIC page and is left to the hardware check.
fn tpr_shadow_and_virtual_apic(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.proc_ctl(PrimaryProcControls::USE_TPR_SHADOW)? {
        let vapic = ctx.read(fields::VIRTUAL_APIC_ADDR)?;
        if vapic == 0 {
            return Err("tpr shadow enabled with a null virtual-apic page".into());
        }
        valid_page_address(ctx, vapic, "virtual-apic page")?;
        if !ctx.proc2_ctl(SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY)? {
            let threshold = ctx.read(fields::TPR_THRESHOLD)?;
            if threshold & !0xF != 0 {
                return Err(format!("tpr threshold 0x{:x} sets bits 31:4", threshold));
            }
        }
        return Ok(());
    }
    for (flag, name) in [
        (SecondaryProcControls::VIRTUALIZE_X2APIC_MODE, "virtualize x2apic mode"),
        (SecondaryProcControls::APIC_REGISTER_VIRTUALIZATION, "apic-register virtualization"),
        (SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY, "virtual-interrupt delivery"),
    ] {
        if ctx.proc2_ctl(flag)? {
            return Err(format!("{} enabled without a tpr shadow", name));
        }
    }
    Ok(())
}

fn nmi_exiting_and_virtual_nmi(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.pin_ctl(PinBasedControls::NMI_EXITING)?
        && ctx.pin_ctl(PinBasedControls::VIRTUAL_NMIS)?
    {
        return Err("virtual nmis enabled without nmi exiting".into());
    }
    Ok(())
}

fn virtual_nmi_and_nmi_window(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.pin_ctl(PinBasedControls::VIRTUAL_NMIS)?
        && ctx.proc_ctl(PrimaryProcControls::NMI_WINDOW_EXITING)?
    {
        return Err("nmi-window exiting enabled without virtual nmis".into());
    }
    Ok(())
}

fn x2apic_mode_and_virtual_apic_access(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.proc2_ctl(SecondaryProcControls::VIRTUALIZE_X2APIC_MODE)?
        && ctx.proc2_ctl(SecondaryProcControls::VIRTUALIZE_APIC_ACCESSES)?
    {
        return Err("virtualize x2apic mode and apic accesses are mutually exclusive".into());
    }
    Ok(())
}

fn apic_access_address_valid(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::VIRTUALIZE_APIC_ACCESSES)? {
        return Ok(());
    }
    valid_page_address(ctx, ctx.read(fields::APIC_ACCESS_ADDR)?, "apic-access page")
}

fn virtual_interrupt_delivery(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.proc2_ctl(SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY)?
        && !ctx.pin_ctl(PinBasedControls::EXTERNAL_INTERRUPT_EXITING)?
    {
        return Err("virtual-interrupt delivery requires external-interrupt exiting".into());
    }
    Ok(())
}

fn process_posted_interrupts(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.pin_ctl(PinBasedControls::PROCESS_POSTED_INTERRUPTS)? {
        return Ok(());
    }
    if !ctx.proc2_ctl(SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY)? {
        return Err("posted interrupts require virtual-interrupt delivery".into());
    }
    if !ctx.exit_ctl(ExitControls::ACKNOWLEDGE_INTERRUPT_ON_EXIT)? {
        return Err("posted interrupts require acknowledge-interrupt-on-exit".into());
    }
    let vector = ctx.read(fields::POSTED_INTERRUPT_NOTIFICATION_VECTOR)?;
    if vector & !0xFF != 0 {
        return Err(format!("notification vector 0x{:x} sets bits 15:8", vector));
    }
    let descriptor = ctx.read(fields::POSTED_INTERRUPT_DESCRIPTOR_ADDR)?;
    if descriptor & 0x3F != 0 {
        return Err(format!(
            "posted-interrupt descriptor 0x{:016x} is not 64-byte aligned",
            descriptor
        ));
    }
    if ctx.beyond_physical_width(descriptor) {
        return Err(format!(
            "posted-interrupt descriptor 0x{:016x} exceeds the physical address width",
            descriptor
        ));
    }
    Ok(())
}

fn vpid_not_zero(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.proc2_ctl(SecondaryProcControls::ENABLE_VPID)?
        && ctx.read(fields::VIRTUAL_PROCESSOR_ID)? == 0
    {
        return Err("vpid enabled with identifier zero".into());
    }
    Ok(())
}

// EPT pointer layout: memory type 2:0, walk length minus one 5:3,
// accessed/dirty enable 6, reserved 11:7, table address 'width':12.
fn ept_pointer_well_formed(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::ENABLE_EPT)? {
        return Ok(());
    }
    let eptp = ctx.read(fields::EPT_POINTER)?;
    let cap = ctx.msr(msr::IA32_VMX_EPT_VPID_CAP);
    match eptp & 0x7 {
        0 if cap & (1 << 8) != 0 => {}
        6 if cap & (1 << 14) != 0 => {}
        memtype => {
            return Err(format!("ept memory type {} is unsupported", memtype));
        }
    }
    if (eptp >> 3) & 0x7 != 3 {
        return Err(format!(
            "ept walk length field {} does not encode 4 levels",
            (eptp >> 3) & 0x7
        ));
    }
    if eptp & (1 << 6) != 0 && cap & (1 << 21) == 0 {
        return Err("ept accessed/dirty flags are unsupported".into());
    }
    if eptp & 0xF80 != 0 {
        return Err(format!("ept pointer 0x{:016x} sets reserved bits 11:7", eptp));
    }
    if ctx.beyond_physical_width(eptp & !0xFFF) {
        return Err(format!(
            "ept table address 0x{:016x} exceeds the physical address width",
            eptp & !0xFFF
        ));
    }
    Ok(())
}

fn enable_pml(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::ENABLE_PML)? {
        return Ok(());
    }
    if !ctx.proc2_ctl(SecondaryProcControls::ENABLE_EPT)? {
        return Err("pml requires ept".into());
    }
    valid_page_address(ctx, ctx.read(fields::PML_ADDRESS)?, "pml log")
}

fn unrestricted_guests(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if ctx.proc2_ctl(SecondaryProcControls::UNRESTRICTED_GUEST)?
        && !ctx.proc2_ctl(SecondaryProcControls::ENABLE_EPT)?
    {
        return Err("unrestricted guest requires ept".into());
    }
    Ok(())
}

fn enable_vm_functions(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::ENABLE_VM_FUNCTIONS)? {
        return Ok(());
    }
    let controls = ctx.read(fields::VM_FUNCTION_CONTROLS)?;
    let allowed = ctx.msr(msr::IA32_VMX_VMFUNC);
    if controls & !allowed != 0 {
        return Err(format!(
            "vm-function controls set unsupported bits 0x{:016x}",
            controls & !allowed
        ));
    }
    // Bit 0 is EPTP switching.
    if controls & 1 != 0 {
        if !ctx.proc2_ctl(SecondaryProcControls::ENABLE_EPT)? {
            return Err("eptp switching requires ept".into());
        }
        valid_page_address(ctx, ctx.read(fields::EPTP_LIST_ADDR)?, "eptp list")?;
    }
    Ok(())
}

fn enable_vmcs_shadowing(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::VMCS_SHADOWING)? {
        return Ok(());
    }
    valid_page_address(ctx, ctx.read(fields::VMREAD_BITMAP_ADDR)?, "vmread bitmap")?;
    valid_page_address(ctx, ctx.read(fields::VMWRITE_BITMAP_ADDR)?, "vmwrite bitmap")
}

fn enable_ept_violation_ve(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.proc2_ctl(SecondaryProcControls::EPT_VIOLATION_VE)? {
        return Ok(());
    }
    valid_page_address(
        ctx,
        ctx.read(fields::VIRTUALIZATION_EXCEPTION_INFO_ADDR)?,
        "virtualization-exception information area",
    )
}

fn activate_and_save_preemption_timer(ctx: &CheckCtx<'_>) -> Result<(), String> {
    if !ctx.pin_ctl(PinBasedControls::ACTIVATE_PREEMPTION_TIMER)?
        && ctx.exit_ctl(ExitControls::SAVE_PREEMPTION_TIMER_VALUE)?
    {
        return Err("saving the preemption timer requires activating it".into());
    }
    Ok(())
}

/// Store/load areas are arrays of 16-byte entries; both ends must sit below
/// the physical width and the base must be 16-byte aligned.
fn msr_area_valid(ctx: &CheckCtx<'_>, count_field: u64, addr_field: u64, what: &str) -> Result<(), String> {
    let count = ctx.read(count_field)?;
    if count == 0 {
        return Ok(());
    }
    let addr = ctx.read(addr_field)?;
    if addr & 0xF != 0 {
        return Err(format!("{} area 0x{:016x} is not 16-byte aligned", what, addr));
    }
    if ctx.beyond_physical_width(addr) {
        return Err(format!(
            "{} area 0x{:016x} exceeds the physical address width",
            what, addr
        ));
    }
    let last = addr
        .saturating_add(count.saturating_mul(16))
        .saturating_sub(1);
    if ctx.beyond_physical_width(last) {
        return Err(format!(
            "{} area end 0x{:016x} exceeds the physical address width",
            what, last
        ));
    }
    Ok(())
}

fn exit_msr_store_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    msr_area_valid(
        ctx,
        fields::VM_EXIT_MSR_STORE_COUNT,
        fields::VM_EXIT_MSR_STORE_ADDR,
        "exit msr store",
    )
}

fn exit_msr_load_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    msr_area_valid(
        ctx,
        fields::VM_EXIT_MSR_LOAD_COUNT,
        fields::VM_EXIT_MSR_LOAD_ADDR,
        "exit msr load",
    )
}

fn entry_msr_load_address(ctx: &CheckCtx<'_>) -> Result<(), String> {
    msr_area_valid(
        ctx,
        fields::VM_ENTRY_MSR_LOAD_COUNT,
        fields::VM_ENTRY_MSR_LOAD_ADDR,
        "entry msr load",
    )
}

fn event_injection_type_vector(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & INJECTION_VALID == 0 {
        return Ok(());
    }
    let vector = injection_vector(info);
    match injection_type(info) {
        TYPE_RESERVED => Err("interruption type 1 is reserved".into()),
        TYPE_NMI if vector != 2 => {
            Err(format!("nmi injection requires vector 2, got {}", vector))
        }
        TYPE_HARDWARE_EXCEPTION if vector > 31 => Err(format!(
            "hardware-exception injection requires vector 31 or below, got {}",
            vector
        )),
        TYPE_OTHER_EVENT => {
            if vector != 0 {
                return Err(format!("other-event injection requires vector 0, got {}", vector));
            }
            let (_, allowed1) = split_capability(ctx.msr(msr::IA32_VMX_TRUE_PROCBASED_CTLS));
            if allowed1 & PrimaryProcControls::MONITOR_TRAP_FLAG.bits() == 0 {
                return Err("other-event injection requires monitor-trap-flag support".into());
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn event_injection_delivery_ec(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & INJECTION_VALID == 0 {
        return Ok(());
    }
    let deliver = info & INJECTION_DELIVER_EC != 0;
    let protected_mode = if ctx.proc2_ctl(SecondaryProcControls::UNRESTRICTED_GUEST)? {
        ctx.read(fields::GUEST_CR0)? & CR0_PE != 0
    } else {
        true
    };
    let faulting_exception = injection_type(info) == TYPE_HARDWARE_EXCEPTION
        && vector_pushes_error_code(injection_vector(info));
    if deliver && !(faulting_exception && protected_mode) {
        return Err("deliver-error-code set for an event that pushes none".into());
    }
    if !deliver && faulting_exception && protected_mode {
        return Err("deliver-error-code clear for an exception that pushes one".into());
    }
    Ok(())
}

fn event_injection_reserved_bits(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & INJECTION_VALID != 0 && info & INJECTION_RESERVED_MASK != 0 {
        return Err(format!(
            "interruption information 0x{:08x} sets reserved bits 30:12",
            info
        ));
    }
    Ok(())
}

fn event_injection_ec(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & INJECTION_VALID == 0 || info & INJECTION_DELIVER_EC == 0 {
        return Ok(());
    }
    let error_code = ctx.read(fields::VM_ENTRY_EXCEPTION_ERROR_CODE)?;
    if error_code & 0xFFFF_8000 != 0 {
        return Err(format!("exception error code 0x{:x} sets bits 31:15", error_code));
    }
    Ok(())
}

fn event_injection_instruction_length(ctx: &CheckCtx<'_>) -> Result<(), String> {
    let info = ctx.read(fields::VM_ENTRY_INTERRUPTION_INFO)?;
    if info & INJECTION_VALID == 0 {
        return Ok(());
    }
    match injection_type(info) {
        TYPE_SOFTWARE_INTERRUPT | TYPE_PRIVILEGED_SOFTWARE_EXCEPTION | TYPE_SOFTWARE_EXCEPTION => {
            let length = ctx.read(fields::VM_ENTRY_INSTRUCTION_LENGTH)?;
            if !(1..=15).contains(&length) {
                return Err(format!(
                    "software-event instruction length {} is outside 1..=15",
                    length
                ));
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::assert_single_violation;
    use crate::controls::{PinBasedControls, PrimaryProcControls, SecondaryProcControls};
    use crate::testing::legal_vmcs_intrinsics;
    use crate::{fields, msr};

    #[test]
    fn test_pin_envelope_rejects_cleared_required_bit() {
        let mock = legal_vmcs_intrinsics();
        mock.set_msr(msr::IA32_VMX_TRUE_PINBASED_CTLS, 0xFFFF_FFFF_0000_0001);
        assert_single_violation(&mock, "control_pin_based_ctls_reserved_properly_set");
    }

    #[test]
    fn test_exit_envelope_rejects_unsupported_bit() {
        let mock = legal_vmcs_intrinsics();
        // Withdraw may-be-1 for a bit the legal vector sets.
        mock.set_msr(
            msr::IA32_VMX_TRUE_EXIT_CTLS,
            (0xFFFF_FFFFu64 & !(1 << 15)) << 32,
        );
        assert_single_violation(&mock, "control_vm_exit_ctls_reserved_properly_set");
    }

    #[test]
    fn test_primary_envelope_rejects_cleared_required_bit() {
        let mock = legal_vmcs_intrinsics();
        // Demand interrupt-window exiting, which the legal vector clears.
        mock.set_msr(msr::IA32_VMX_TRUE_PROCBASED_CTLS, 0xFFFF_FFFF_0000_0004);
        assert_single_violation(&mock, "control_proc_based_ctls_reserved_properly_set");
    }

    #[test]
    fn test_secondary_envelope_rejects_unsupported_bit() {
        let mock = legal_vmcs_intrinsics();
        // Withdraw may-be-1 for enable-rdtscp, which the legal vector sets.
        mock.set_msr(
            msr::IA32_VMX_PROCBASED_CTLS2,
            (0xFFFF_FFFFu64 & !(1 << 3)) << 32,
        );
        assert_single_violation(&mock, "control_proc_based_ctls2_reserved_properly_set");
    }

    #[test]
    fn test_entry_envelope_rejects_unsupported_bit() {
        let mock = legal_vmcs_intrinsics();
        // Withdraw may-be-1 for load-pat, which the legal vector sets.
        mock.set_msr(
            msr::IA32_VMX_TRUE_ENTRY_CTLS,
            (0xFFFF_FFFFu64 & !(1 << 14)) << 32,
        );
        assert_single_violation(&mock, "control_vm_entry_ctls_reserved_properly_set");
    }

    #[test]
    fn test_cr3_target_count_limit() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::CR3_TARGET_COUNT, 8);
        assert_single_violation(&mock, "control_cr3_target_count_within_limit");
    }

    #[test]
    fn test_io_bitmap_alignment() {
        let mock = legal_vmcs_intrinsics();
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_IO_BITMAPS.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        mock.set_field(fields::IO_BITMAP_A_ADDR, 0x1001);
        mock.set_field(fields::IO_BITMAP_B_ADDR, 0x2000);
        assert_single_violation(&mock, "control_io_bitmap_addresses_valid");
    }

    #[test]
    fn test_msr_bitmap_alignment() {
        let mock = legal_vmcs_intrinsics();
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_MSR_BITMAPS.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        mock.set_field(fields::MSR_BITMAPS_ADDR, 0x1200);
        assert_single_violation(&mock, "control_msr_bitmap_address_valid");
    }

    #[test]
    fn test_tpr_shadow_needs_virtual_apic_page() {
        let mock = legal_vmcs_intrinsics();
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_TPR_SHADOW.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        assert_single_violation(&mock, "control_tpr_shadow_and_virtual_apic");
    }

    #[test]
    fn test_virtual_nmis_need_nmi_exiting() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(
            fields::PIN_BASED_VM_EXECUTION_CONTROLS,
            PinBasedControls::VIRTUAL_NMIS.bits() as u64,
        );
        assert_single_violation(&mock, "control_nmi_exiting_and_virtual_nmi");
    }

    #[test]
    fn test_nmi_window_needs_virtual_nmis() {
        let mock = legal_vmcs_intrinsics();
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::NMI_WINDOW_EXITING.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        assert_single_violation(&mock, "control_virtual_nmi_and_nmi_window");
    }

    #[test]
    fn test_x2apic_mode_excludes_apic_accesses() {
        let mock = legal_vmcs_intrinsics();
        // Satisfy the tpr-shadow and access-page rules so only the mutual
        // exclusion trips.
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_TPR_SHADOW.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        mock.set_field(fields::VIRTUAL_APIC_ADDR, 0x3000);
        mock.set_field(fields::TPR_THRESHOLD, 0);
        mock.set_field(fields::APIC_ACCESS_ADDR, 0x4000);
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | (SecondaryProcControls::VIRTUALIZE_X2APIC_MODE
                | SecondaryProcControls::VIRTUALIZE_APIC_ACCESSES)
                .bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        assert_single_violation(&mock, "control_x2apic_mode_and_virtual_apic_access");
    }

    #[test]
    fn test_apic_access_page_alignment() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::VIRTUALIZE_APIC_ACCESSES.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        mock.set_field(fields::APIC_ACCESS_ADDR, 0x4010);
        assert_single_violation(&mock, "control_apic_access_address_valid");
    }

    #[test]
    fn test_virtual_interrupt_delivery_needs_interrupt_exiting() {
        let mock = legal_vmcs_intrinsics();
        // A satisfied tpr shadow leaves the pin-based coupling as the only
        // missing piece.
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_TPR_SHADOW.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        mock.set_field(fields::VIRTUAL_APIC_ADDR, 0x3000);
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        assert_single_violation(&mock, "control_virtual_interrupt_delivery");
    }

    #[test]
    fn test_posted_interrupt_descriptor_alignment() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(
            fields::PIN_BASED_VM_EXECUTION_CONTROLS,
            (PinBasedControls::EXTERNAL_INTERRUPT_EXITING
                | PinBasedControls::PROCESS_POSTED_INTERRUPTS)
                .bits() as u64,
        );
        let primary = mock.field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | PrimaryProcControls::USE_TPR_SHADOW.bits() as u64;
        mock.set_field(fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, primary);
        mock.set_field(fields::VIRTUAL_APIC_ADDR, 0x3000);
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::VIRTUAL_INTERRUPT_DELIVERY.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        mock.set_field(fields::POSTED_INTERRUPT_NOTIFICATION_VECTOR, 0x20);
        // Acknowledge-interrupt-on-exit is already negotiated; the descriptor
        // misses its 64-byte alignment.
        mock.set_field(fields::POSTED_INTERRUPT_DESCRIPTOR_ADDR, 0x1010);
        assert_single_violation(&mock, "control_process_posted_interrupts");
    }

    #[test]
    fn test_vpid_zero_rejected() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::ENABLE_VPID.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        assert_single_violation(&mock, "control_vpid_not_zero");
    }

    #[test]
    fn test_ept_pointer_walk_length() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::ENABLE_EPT.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        // Supported write-back memory type, but a 1-level walk encoding.
        mock.set_msr(msr::IA32_VMX_EPT_VPID_CAP, (1 << 14) | (1 << 21));
        mock.set_field(fields::EPT_POINTER, 0x1_0006);
        assert_single_violation(&mock, "control_ept_pointer_well_formed");
    }

    #[test]
    fn test_pml_needs_ept() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::ENABLE_PML.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        assert_single_violation(&mock, "control_enable_pml");
    }

    #[test]
    fn test_vm_function_controls_unsupported_bits() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::ENABLE_VM_FUNCTIONS.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        // IA32_VMX_VMFUNC reads back zero, so eptp switching is unsupported.
        mock.set_field(fields::VM_FUNCTION_CONTROLS, 1);
        assert_single_violation(&mock, "control_enable_vm_functions");
    }

    #[test]
    fn test_vmcs_shadowing_bitmap_alignment() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::VMCS_SHADOWING.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        mock.set_field(fields::VMREAD_BITMAP_ADDR, 0x5010);
        mock.set_field(fields::VMWRITE_BITMAP_ADDR, 0x6000);
        assert_single_violation(&mock, "control_enable_vmcs_shadowing");
    }

    #[test]
    fn test_ept_violation_ve_info_alignment() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::EPT_VIOLATION_VE.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        mock.set_field(fields::VIRTUALIZATION_EXCEPTION_INFO_ADDR, 0x7008);
        assert_single_violation(&mock, "control_enable_ept_violation_ve");
    }

    #[test]
    fn test_unrestricted_guest_needs_ept() {
        let mock = legal_vmcs_intrinsics();
        let secondary = mock.field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS)
            | SecondaryProcControls::UNRESTRICTED_GUEST.bits() as u64;
        mock.set_field(fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS, secondary);
        assert_single_violation(&mock, "control_unrestricted_guests");
    }

    #[test]
    fn test_preemption_timer_save_coupling() {
        let mock = legal_vmcs_intrinsics();
        let exit = mock.field(fields::VM_EXIT_CONTROLS) | (1 << 22);
        mock.set_field(fields::VM_EXIT_CONTROLS, exit);
        assert_single_violation(&mock, "control_activate_and_save_preemption_timer");
    }

    #[test]
    fn test_entry_msr_load_area_alignment() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::VM_ENTRY_MSR_LOAD_COUNT, 2);
        mock.set_field(fields::VM_ENTRY_MSR_LOAD_ADDR, 0x1008);
        assert_single_violation(&mock, "control_entry_msr_load_address");
    }

    #[test]
    fn test_exit_msr_store_area_must_fit_width() {
        let mock = legal_vmcs_intrinsics();
        // Base is in range for 40 bits; the last entry byte is not.
        mock.set_field(fields::VM_EXIT_MSR_STORE_COUNT, 2);
        mock.set_field(fields::VM_EXIT_MSR_STORE_ADDR, 0xFF_FFFF_FFF0);
        assert_single_violation(&mock, "control_exit_msr_store_address");
    }

    #[test]
    fn test_exit_msr_load_area_alignment() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::VM_EXIT_MSR_LOAD_COUNT, 2);
        mock.set_field(fields::VM_EXIT_MSR_LOAD_ADDR, 0x2008);
        assert_single_violation(&mock, "control_exit_msr_load_address");
    }

    #[test]
    fn test_injection_reserved_type_rejected() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::VM_ENTRY_INTERRUPTION_INFO, (1 << 31) | (1 << 8));
        assert_single_violation(&mock, "control_event_injection_type_vector");
    }

    #[test]
    fn test_injection_page_fault_needs_error_code() {
        let mock = legal_vmcs_intrinsics();
        // Hardware exception, vector 14, deliver-error-code clear.
        mock.set_field(fields::VM_ENTRY_INTERRUPTION_INFO, (1 << 31) | (3 << 8) | 14);
        assert_single_violation(&mock, "control_event_injection_delivery_ec");
    }

    #[test]
    fn test_injection_reserved_bits_rejected() {
        let mock = legal_vmcs_intrinsics();
        // An otherwise-legal nmi injection with a bit in 30:12.
        mock.set_field(
            fields::VM_ENTRY_INTERRUPTION_INFO,
            (1 << 31) | (1 << 13) | (2 << 8) | 2,
        );
        assert_single_violation(&mock, "control_event_injection_reserved_bits");
    }

    #[test]
    fn test_injection_error_code_upper_bits() {
        let mock = legal_vmcs_intrinsics();
        // #GP with deliver-error-code, but the code sets bits 31:15.
        mock.set_field(
            fields::VM_ENTRY_INTERRUPTION_INFO,
            (1 << 31) | (1 << 11) | (3 << 8) | 13,
        );
        mock.set_field(fields::VM_ENTRY_EXCEPTION_ERROR_CODE, 1 << 20);
        assert_single_violation(&mock, "control_event_injection_ec");
    }

    #[test]
    fn test_injection_software_interrupt_needs_length() {
        let mock = legal_vmcs_intrinsics();
        mock.set_field(fields::VM_ENTRY_INTERRUPTION_INFO, (1 << 31) | (4 << 8) | 3);
        mock.set_field(fields::VM_ENTRY_INSTRUCTION_LENGTH, 0);
        assert_single_violation(&mock, "control_event_injection_instruction_length");
    }
}
