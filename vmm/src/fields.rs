//! VMCS field encodings
//!
//! Field identifiers as defined by Intel SDM Volume 3, Appendix B. Encodings
//! pack (access type, index, type, width) into bits 0, 1..9, 10..11 and
//! 13..14; every constant below is the FULL-access encoding. 64-bit fields
//! also have a HIGH-access encoding at `field + 1`, unused here because the
//! crate only targets 64-bit hosts.

// 16-bit control fields
pub const VIRTUAL_PROCESSOR_ID: u64 = 0x0000;
pub const POSTED_INTERRUPT_NOTIFICATION_VECTOR: u64 = 0x0002;
pub const EPTP_INDEX: u64 = 0x0004;

// 16-bit guest-state fields
pub const GUEST_ES_SELECTOR: u64 = 0x0800;
pub const GUEST_CS_SELECTOR: u64 = 0x0802;
pub const GUEST_SS_SELECTOR: u64 = 0x0804;
pub const GUEST_DS_SELECTOR: u64 = 0x0806;
pub const GUEST_FS_SELECTOR: u64 = 0x0808;
pub const GUEST_GS_SELECTOR: u64 = 0x080A;
pub const GUEST_LDTR_SELECTOR: u64 = 0x080C;
pub const GUEST_TR_SELECTOR: u64 = 0x080E;
pub const GUEST_INTERRUPT_STATUS: u64 = 0x0810;
pub const PML_INDEX: u64 = 0x0812;

// 16-bit host-state fields
pub const HOST_ES_SELECTOR: u64 = 0x0C00;
pub const HOST_CS_SELECTOR: u64 = 0x0C02;
pub const HOST_SS_SELECTOR: u64 = 0x0C04;
pub const HOST_DS_SELECTOR: u64 = 0x0C06;
pub const HOST_FS_SELECTOR: u64 = 0x0C08;
pub const HOST_GS_SELECTOR: u64 = 0x0C0A;
pub const HOST_TR_SELECTOR: u64 = 0x0C0C;

// 64-bit control fields
pub const IO_BITMAP_A_ADDR: u64 = 0x2000;
pub const IO_BITMAP_B_ADDR: u64 = 0x2002;
pub const MSR_BITMAPS_ADDR: u64 = 0x2004;
pub const VM_EXIT_MSR_STORE_ADDR: u64 = 0x2006;
pub const VM_EXIT_MSR_LOAD_ADDR: u64 = 0x2008;
pub const VM_ENTRY_MSR_LOAD_ADDR: u64 = 0x200A;
pub const EXECUTIVE_VMCS_POINTER: u64 = 0x200C;
pub const PML_ADDRESS: u64 = 0x200E;
pub const TSC_OFFSET: u64 = 0x2010;
pub const VIRTUAL_APIC_ADDR: u64 = 0x2012;
pub const APIC_ACCESS_ADDR: u64 = 0x2014;
pub const POSTED_INTERRUPT_DESCRIPTOR_ADDR: u64 = 0x2016;
pub const VM_FUNCTION_CONTROLS: u64 = 0x2018;
pub const EPT_POINTER: u64 = 0x201A;
pub const EOI_EXIT_BITMAP_0: u64 = 0x201C;
pub const EOI_EXIT_BITMAP_1: u64 = 0x201E;
pub const EOI_EXIT_BITMAP_2: u64 = 0x2020;
pub const EOI_EXIT_BITMAP_3: u64 = 0x2022;
pub const EPTP_LIST_ADDR: u64 = 0x2024;
pub const VMREAD_BITMAP_ADDR: u64 = 0x2026;
pub const VMWRITE_BITMAP_ADDR: u64 = 0x2028;
pub const VIRTUALIZATION_EXCEPTION_INFO_ADDR: u64 = 0x202A;
pub const XSS_EXITING_BITMAP: u64 = 0x202C;

// 64-bit read-only data fields
pub const GUEST_PHYSICAL_ADDR: u64 = 0x2400;

// 64-bit guest-state fields
pub const VMCS_LINK_POINTER: u64 = 0x2800;
pub const GUEST_IA32_DEBUGCTL: u64 = 0x2802;
pub const GUEST_IA32_PAT: u64 = 0x2804;
pub const GUEST_IA32_EFER: u64 = 0x2806;
pub const GUEST_IA32_PERF_GLOBAL_CTRL: u64 = 0x2808;
pub const GUEST_PDPTE0: u64 = 0x280A;
pub const GUEST_PDPTE1: u64 = 0x280C;
pub const GUEST_PDPTE2: u64 = 0x280E;
pub const GUEST_PDPTE3: u64 = 0x2810;

// 64-bit host-state fields
pub const HOST_IA32_PAT: u64 = 0x2C00;
pub const HOST_IA32_EFER: u64 = 0x2C02;
pub const HOST_IA32_PERF_GLOBAL_CTRL: u64 = 0x2C04;

// 32-bit control fields
pub const PIN_BASED_VM_EXECUTION_CONTROLS: u64 = 0x4000;
pub const PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS: u64 = 0x4002;
pub const EXCEPTION_BITMAP: u64 = 0x4004;
pub const PAGE_FAULT_ERROR_CODE_MASK: u64 = 0x4006;
pub const PAGE_FAULT_ERROR_CODE_MATCH: u64 = 0x4008;
pub const CR3_TARGET_COUNT: u64 = 0x400A;
pub const VM_EXIT_CONTROLS: u64 = 0x400C;
pub const VM_EXIT_MSR_STORE_COUNT: u64 = 0x400E;
pub const VM_EXIT_MSR_LOAD_COUNT: u64 = 0x4010;
pub const VM_ENTRY_CONTROLS: u64 = 0x4012;
pub const VM_ENTRY_MSR_LOAD_COUNT: u64 = 0x4014;
pub const VM_ENTRY_INTERRUPTION_INFO: u64 = 0x4016;
pub const VM_ENTRY_EXCEPTION_ERROR_CODE: u64 = 0x4018;
pub const VM_ENTRY_INSTRUCTION_LENGTH: u64 = 0x401A;
pub const TPR_THRESHOLD: u64 = 0x401C;
pub const SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS: u64 = 0x401E;
pub const PLE_GAP: u64 = 0x4020;
pub const PLE_WINDOW: u64 = 0x4022;

// 32-bit read-only data fields
pub const VM_INSTRUCTION_ERROR: u64 = 0x4400;
pub const EXIT_REASON: u64 = 0x4402;
pub const VM_EXIT_INTERRUPTION_INFO: u64 = 0x4404;
pub const VM_EXIT_INTERRUPTION_ERROR_CODE: u64 = 0x4406;
pub const IDT_VECTORING_INFO: u64 = 0x4408;
pub const IDT_VECTORING_ERROR_CODE: u64 = 0x440A;
pub const VM_EXIT_INSTRUCTION_LENGTH: u64 = 0x440C;
pub const VM_EXIT_INSTRUCTION_INFO: u64 = 0x440E;

// 32-bit guest-state fields
pub const GUEST_ES_LIMIT: u64 = 0x4800;
pub const GUEST_CS_LIMIT: u64 = 0x4802;
pub const GUEST_SS_LIMIT: u64 = 0x4804;
pub const GUEST_DS_LIMIT: u64 = 0x4806;
pub const GUEST_FS_LIMIT: u64 = 0x4808;
pub const GUEST_GS_LIMIT: u64 = 0x480A;
pub const GUEST_LDTR_LIMIT: u64 = 0x480C;
pub const GUEST_TR_LIMIT: u64 = 0x480E;
pub const GUEST_GDTR_LIMIT: u64 = 0x4810;
pub const GUEST_IDTR_LIMIT: u64 = 0x4812;
pub const GUEST_ES_ACCESS_RIGHTS: u64 = 0x4814;
pub const GUEST_CS_ACCESS_RIGHTS: u64 = 0x4816;
pub const GUEST_SS_ACCESS_RIGHTS: u64 = 0x4818;
pub const GUEST_DS_ACCESS_RIGHTS: u64 = 0x481A;
pub const GUEST_FS_ACCESS_RIGHTS: u64 = 0x481C;
pub const GUEST_GS_ACCESS_RIGHTS: u64 = 0x481E;
pub const GUEST_LDTR_ACCESS_RIGHTS: u64 = 0x4820;
pub const GUEST_TR_ACCESS_RIGHTS: u64 = 0x4822;
pub const GUEST_INTERRUPTIBILITY_STATE: u64 = 0x4824;
pub const GUEST_ACTIVITY_STATE: u64 = 0x4826;
pub const GUEST_SMBASE: u64 = 0x4828;
pub const GUEST_IA32_SYSENTER_CS: u64 = 0x482A;
pub const VMX_PREEMPTION_TIMER_VALUE: u64 = 0x482E;

// 32-bit host-state fields
pub const HOST_IA32_SYSENTER_CS: u64 = 0x4C00;

// Natural-width control fields
pub const CR0_GUEST_HOST_MASK: u64 = 0x6000;
pub const CR4_GUEST_HOST_MASK: u64 = 0x6002;
pub const CR0_READ_SHADOW: u64 = 0x6004;
pub const CR4_READ_SHADOW: u64 = 0x6006;
pub const CR3_TARGET_VALUE_0: u64 = 0x6008;
pub const CR3_TARGET_VALUE_1: u64 = 0x600A;
pub const CR3_TARGET_VALUE_2: u64 = 0x600C;
pub const CR3_TARGET_VALUE_3: u64 = 0x600E;

// Natural-width read-only data fields
pub const EXIT_QUALIFICATION: u64 = 0x6400;
pub const IO_RCX: u64 = 0x6402;
pub const IO_RSI: u64 = 0x6404;
pub const IO_RDI: u64 = 0x6406;
pub const IO_RIP: u64 = 0x6408;
pub const GUEST_LINEAR_ADDR: u64 = 0x640A;

// Natural-width guest-state fields
pub const GUEST_CR0: u64 = 0x6800;
pub const GUEST_CR3: u64 = 0x6802;
pub const GUEST_CR4: u64 = 0x6804;
pub const GUEST_ES_BASE: u64 = 0x6806;
pub const GUEST_CS_BASE: u64 = 0x6808;
pub const GUEST_SS_BASE: u64 = 0x680A;
pub const GUEST_DS_BASE: u64 = 0x680C;
pub const GUEST_FS_BASE: u64 = 0x680E;
pub const GUEST_GS_BASE: u64 = 0x6810;
pub const GUEST_LDTR_BASE: u64 = 0x6812;
pub const GUEST_TR_BASE: u64 = 0x6814;
pub const GUEST_GDTR_BASE: u64 = 0x6816;
pub const GUEST_IDTR_BASE: u64 = 0x6818;
pub const GUEST_DR7: u64 = 0x681A;
pub const GUEST_RSP: u64 = 0x681C;
pub const GUEST_RIP: u64 = 0x681E;
pub const GUEST_RFLAGS: u64 = 0x6820;
pub const GUEST_PENDING_DEBUG_EXCEPTIONS: u64 = 0x6822;
pub const GUEST_IA32_SYSENTER_ESP: u64 = 0x6824;
pub const GUEST_IA32_SYSENTER_EIP: u64 = 0x6826;

// Natural-width host-state fields
pub const HOST_CR0: u64 = 0x6C00;
pub const HOST_CR3: u64 = 0x6C02;
pub const HOST_CR4: u64 = 0x6C04;
pub const HOST_FS_BASE: u64 = 0x6C06;
pub const HOST_GS_BASE: u64 = 0x6C08;
pub const HOST_TR_BASE: u64 = 0x6C0A;
pub const HOST_GDTR_BASE: u64 = 0x6C0C;
pub const HOST_IDTR_BASE: u64 = 0x6C0E;
pub const HOST_IA32_SYSENTER_ESP: u64 = 0x6C10;
pub const HOST_IA32_SYSENTER_EIP: u64 = 0x6C12;
pub const HOST_RSP: u64 = 0x6C14;
pub const HOST_RIP: u64 = 0x6C16;

/// Every field the failure dump walks, in encoding order.
///
/// Read-only data fields are included: after a rejected entry they still
/// hold the values from the previous exit, which is often the fastest clue.
pub(crate) const FIELD_NAMES: &[(&str, u64)] = &[
    ("VIRTUAL_PROCESSOR_ID", VIRTUAL_PROCESSOR_ID),
    ("POSTED_INTERRUPT_NOTIFICATION_VECTOR", POSTED_INTERRUPT_NOTIFICATION_VECTOR),
    ("EPTP_INDEX", EPTP_INDEX),
    ("GUEST_ES_SELECTOR", GUEST_ES_SELECTOR),
    ("GUEST_CS_SELECTOR", GUEST_CS_SELECTOR),
    ("GUEST_SS_SELECTOR", GUEST_SS_SELECTOR),
    ("GUEST_DS_SELECTOR", GUEST_DS_SELECTOR),
    ("GUEST_FS_SELECTOR", GUEST_FS_SELECTOR),
    ("GUEST_GS_SELECTOR", GUEST_GS_SELECTOR),
    ("GUEST_LDTR_SELECTOR", GUEST_LDTR_SELECTOR),
    ("GUEST_TR_SELECTOR", GUEST_TR_SELECTOR),
    ("HOST_ES_SELECTOR", HOST_ES_SELECTOR),
    ("HOST_CS_SELECTOR", HOST_CS_SELECTOR),
    ("HOST_SS_SELECTOR", HOST_SS_SELECTOR),
    ("HOST_DS_SELECTOR", HOST_DS_SELECTOR),
    ("HOST_FS_SELECTOR", HOST_FS_SELECTOR),
    ("HOST_GS_SELECTOR", HOST_GS_SELECTOR),
    ("HOST_TR_SELECTOR", HOST_TR_SELECTOR),
    ("IO_BITMAP_A_ADDR", IO_BITMAP_A_ADDR),
    ("IO_BITMAP_B_ADDR", IO_BITMAP_B_ADDR),
    ("MSR_BITMAPS_ADDR", MSR_BITMAPS_ADDR),
    ("VM_EXIT_MSR_STORE_ADDR", VM_EXIT_MSR_STORE_ADDR),
    ("VM_EXIT_MSR_LOAD_ADDR", VM_EXIT_MSR_LOAD_ADDR),
    ("VM_ENTRY_MSR_LOAD_ADDR", VM_ENTRY_MSR_LOAD_ADDR),
    ("TSC_OFFSET", TSC_OFFSET),
    ("VIRTUAL_APIC_ADDR", VIRTUAL_APIC_ADDR),
    ("APIC_ACCESS_ADDR", APIC_ACCESS_ADDR),
    ("POSTED_INTERRUPT_DESCRIPTOR_ADDR", POSTED_INTERRUPT_DESCRIPTOR_ADDR),
    ("VM_FUNCTION_CONTROLS", VM_FUNCTION_CONTROLS),
    ("EPT_POINTER", EPT_POINTER),
    ("EPTP_LIST_ADDR", EPTP_LIST_ADDR),
    ("VMREAD_BITMAP_ADDR", VMREAD_BITMAP_ADDR),
    ("VMWRITE_BITMAP_ADDR", VMWRITE_BITMAP_ADDR),
    ("VIRTUALIZATION_EXCEPTION_INFO_ADDR", VIRTUALIZATION_EXCEPTION_INFO_ADDR),
    ("XSS_EXITING_BITMAP", XSS_EXITING_BITMAP),
    ("VMCS_LINK_POINTER", VMCS_LINK_POINTER),
    ("GUEST_IA32_DEBUGCTL", GUEST_IA32_DEBUGCTL),
    ("GUEST_IA32_PAT", GUEST_IA32_PAT),
    ("GUEST_IA32_EFER", GUEST_IA32_EFER),
    ("GUEST_IA32_PERF_GLOBAL_CTRL", GUEST_IA32_PERF_GLOBAL_CTRL),
    ("HOST_IA32_PAT", HOST_IA32_PAT),
    ("HOST_IA32_EFER", HOST_IA32_EFER),
    ("HOST_IA32_PERF_GLOBAL_CTRL", HOST_IA32_PERF_GLOBAL_CTRL),
    ("PIN_BASED_VM_EXECUTION_CONTROLS", PIN_BASED_VM_EXECUTION_CONTROLS),
    ("PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS", PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS),
    ("EXCEPTION_BITMAP", EXCEPTION_BITMAP),
    ("PAGE_FAULT_ERROR_CODE_MASK", PAGE_FAULT_ERROR_CODE_MASK),
    ("PAGE_FAULT_ERROR_CODE_MATCH", PAGE_FAULT_ERROR_CODE_MATCH),
    ("CR3_TARGET_COUNT", CR3_TARGET_COUNT),
    ("VM_EXIT_CONTROLS", VM_EXIT_CONTROLS),
    ("VM_EXIT_MSR_STORE_COUNT", VM_EXIT_MSR_STORE_COUNT),
    ("VM_EXIT_MSR_LOAD_COUNT", VM_EXIT_MSR_LOAD_COUNT),
    ("VM_ENTRY_CONTROLS", VM_ENTRY_CONTROLS),
    ("VM_ENTRY_MSR_LOAD_COUNT", VM_ENTRY_MSR_LOAD_COUNT),
    ("VM_ENTRY_INTERRUPTION_INFO", VM_ENTRY_INTERRUPTION_INFO),
    ("VM_ENTRY_EXCEPTION_ERROR_CODE", VM_ENTRY_EXCEPTION_ERROR_CODE),
    ("VM_ENTRY_INSTRUCTION_LENGTH", VM_ENTRY_INSTRUCTION_LENGTH),
    ("TPR_THRESHOLD", TPR_THRESHOLD),
    ("SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS", SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS),
    ("VM_INSTRUCTION_ERROR", VM_INSTRUCTION_ERROR),
    ("EXIT_REASON", EXIT_REASON),
    ("VM_EXIT_INTERRUPTION_INFO", VM_EXIT_INTERRUPTION_INFO),
    ("VM_EXIT_INTERRUPTION_ERROR_CODE", VM_EXIT_INTERRUPTION_ERROR_CODE),
    ("IDT_VECTORING_INFO", IDT_VECTORING_INFO),
    ("IDT_VECTORING_ERROR_CODE", IDT_VECTORING_ERROR_CODE),
    ("VM_EXIT_INSTRUCTION_LENGTH", VM_EXIT_INSTRUCTION_LENGTH),
    ("GUEST_ES_LIMIT", GUEST_ES_LIMIT),
    ("GUEST_CS_LIMIT", GUEST_CS_LIMIT),
    ("GUEST_SS_LIMIT", GUEST_SS_LIMIT),
    ("GUEST_DS_LIMIT", GUEST_DS_LIMIT),
    ("GUEST_FS_LIMIT", GUEST_FS_LIMIT),
    ("GUEST_GS_LIMIT", GUEST_GS_LIMIT),
    ("GUEST_LDTR_LIMIT", GUEST_LDTR_LIMIT),
    ("GUEST_TR_LIMIT", GUEST_TR_LIMIT),
    ("GUEST_GDTR_LIMIT", GUEST_GDTR_LIMIT),
    ("GUEST_IDTR_LIMIT", GUEST_IDTR_LIMIT),
    ("GUEST_ES_ACCESS_RIGHTS", GUEST_ES_ACCESS_RIGHTS),
    ("GUEST_CS_ACCESS_RIGHTS", GUEST_CS_ACCESS_RIGHTS),
    ("GUEST_SS_ACCESS_RIGHTS", GUEST_SS_ACCESS_RIGHTS),
    ("GUEST_DS_ACCESS_RIGHTS", GUEST_DS_ACCESS_RIGHTS),
    ("GUEST_FS_ACCESS_RIGHTS", GUEST_FS_ACCESS_RIGHTS),
    ("GUEST_GS_ACCESS_RIGHTS", GUEST_GS_ACCESS_RIGHTS),
    ("GUEST_LDTR_ACCESS_RIGHTS", GUEST_LDTR_ACCESS_RIGHTS),
    ("GUEST_TR_ACCESS_RIGHTS", GUEST_TR_ACCESS_RIGHTS),
    ("GUEST_INTERRUPTIBILITY_STATE", GUEST_INTERRUPTIBILITY_STATE),
    ("GUEST_ACTIVITY_STATE", GUEST_ACTIVITY_STATE),
    ("GUEST_IA32_SYSENTER_CS", GUEST_IA32_SYSENTER_CS),
    ("HOST_IA32_SYSENTER_CS", HOST_IA32_SYSENTER_CS),
    ("CR0_GUEST_HOST_MASK", CR0_GUEST_HOST_MASK),
    ("CR4_GUEST_HOST_MASK", CR4_GUEST_HOST_MASK),
    ("CR0_READ_SHADOW", CR0_READ_SHADOW),
    ("CR4_READ_SHADOW", CR4_READ_SHADOW),
    ("CR3_TARGET_VALUE_0", CR3_TARGET_VALUE_0),
    ("CR3_TARGET_VALUE_1", CR3_TARGET_VALUE_1),
    ("CR3_TARGET_VALUE_2", CR3_TARGET_VALUE_2),
    ("CR3_TARGET_VALUE_3", CR3_TARGET_VALUE_3),
    ("EXIT_QUALIFICATION", EXIT_QUALIFICATION),
    ("GUEST_LINEAR_ADDR", GUEST_LINEAR_ADDR),
    ("GUEST_CR0", GUEST_CR0),
    ("GUEST_CR3", GUEST_CR3),
    ("GUEST_CR4", GUEST_CR4),
    ("GUEST_ES_BASE", GUEST_ES_BASE),
    ("GUEST_CS_BASE", GUEST_CS_BASE),
    ("GUEST_SS_BASE", GUEST_SS_BASE),
    ("GUEST_DS_BASE", GUEST_DS_BASE),
    ("GUEST_FS_BASE", GUEST_FS_BASE),
    ("GUEST_GS_BASE", GUEST_GS_BASE),
    ("GUEST_LDTR_BASE", GUEST_LDTR_BASE),
    ("GUEST_TR_BASE", GUEST_TR_BASE),
    ("GUEST_GDTR_BASE", GUEST_GDTR_BASE),
    ("GUEST_IDTR_BASE", GUEST_IDTR_BASE),
    ("GUEST_DR7", GUEST_DR7),
    ("GUEST_RSP", GUEST_RSP),
    ("GUEST_RIP", GUEST_RIP),
    ("GUEST_RFLAGS", GUEST_RFLAGS),
    ("GUEST_PENDING_DEBUG_EXCEPTIONS", GUEST_PENDING_DEBUG_EXCEPTIONS),
    ("GUEST_IA32_SYSENTER_ESP", GUEST_IA32_SYSENTER_ESP),
    ("GUEST_IA32_SYSENTER_EIP", GUEST_IA32_SYSENTER_EIP),
    ("HOST_CR0", HOST_CR0),
    ("HOST_CR3", HOST_CR3),
    ("HOST_CR4", HOST_CR4),
    ("HOST_FS_BASE", HOST_FS_BASE),
    ("HOST_GS_BASE", HOST_GS_BASE),
    ("HOST_TR_BASE", HOST_TR_BASE),
    ("HOST_GDTR_BASE", HOST_GDTR_BASE),
    ("HOST_IDTR_BASE", HOST_IDTR_BASE),
    ("HOST_IA32_SYSENTER_ESP", HOST_IA32_SYSENTER_ESP),
    ("HOST_IA32_SYSENTER_EIP", HOST_IA32_SYSENTER_EIP),
    ("HOST_RSP", HOST_RSP),
    ("HOST_RIP", HOST_RIP),
];
