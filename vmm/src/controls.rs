//! Execution-control classes and capability negotiation
//!
//! Five control vectors govern what the guest may do: pin-based, primary and
//! secondary processor-based, VM-exit and VM-entry. For each class the
//! processor reports a capability MSR whose low half lists must-be-1 bits
//! and whose high half lists may-be-1 bits. [`constrain`] folds a desired
//! vector into that envelope; [`CONTROL_CLASSES`] is the per-class table
//! (VMCS field, capability MSR, baseline bits) the driver walks, so adding a
//! baseline requirement never touches the algorithm.

use bitflags::{bitflags, Flags};

use crate::diag::{vmlog, DiagnosticSink};
use crate::fields;
use crate::msr;

bitflags! {
    /// Pin-based VM-execution controls (SDM 24.6.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PinBasedControls: u32 {
        const EXTERNAL_INTERRUPT_EXITING = 1 << 0;
        const NMI_EXITING = 1 << 3;
        const VIRTUAL_NMIS = 1 << 5;
        const ACTIVATE_PREEMPTION_TIMER = 1 << 6;
        const PROCESS_POSTED_INTERRUPTS = 1 << 7;
    }
}

bitflags! {
    /// Primary processor-based VM-execution controls (SDM 24.6.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrimaryProcControls: u32 {
        const INTERRUPT_WINDOW_EXITING = 1 << 2;
        const USE_TSC_OFFSETTING = 1 << 3;
        const HLT_EXITING = 1 << 7;
        const INVLPG_EXITING = 1 << 9;
        const MWAIT_EXITING = 1 << 10;
        const RDPMC_EXITING = 1 << 11;
        const RDTSC_EXITING = 1 << 12;
        const CR3_LOAD_EXITING = 1 << 15;
        const CR3_STORE_EXITING = 1 << 16;
        const CR8_LOAD_EXITING = 1 << 19;
        const CR8_STORE_EXITING = 1 << 20;
        const USE_TPR_SHADOW = 1 << 21;
        const NMI_WINDOW_EXITING = 1 << 22;
        const MOV_DR_EXITING = 1 << 23;
        const UNCONDITIONAL_IO_EXITING = 1 << 24;
        const USE_IO_BITMAPS = 1 << 25;
        const MONITOR_TRAP_FLAG = 1 << 27;
        const USE_MSR_BITMAPS = 1 << 28;
        const MONITOR_EXITING = 1 << 29;
        const PAUSE_EXITING = 1 << 30;
        const ACTIVATE_SECONDARY_CONTROLS = 1 << 31;
    }
}

bitflags! {
    /// Secondary processor-based VM-execution controls (SDM 24.6.2).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SecondaryProcControls: u32 {
        const VIRTUALIZE_APIC_ACCESSES = 1 << 0;
        const ENABLE_EPT = 1 << 1;
        const DESCRIPTOR_TABLE_EXITING = 1 << 2;
        const ENABLE_RDTSCP = 1 << 3;
        const VIRTUALIZE_X2APIC_MODE = 1 << 4;
        const ENABLE_VPID = 1 << 5;
        const WBINVD_EXITING = 1 << 6;
        const UNRESTRICTED_GUEST = 1 << 7;
        const APIC_REGISTER_VIRTUALIZATION = 1 << 8;
        const VIRTUAL_INTERRUPT_DELIVERY = 1 << 9;
        const PAUSE_LOOP_EXITING = 1 << 10;
        const RDRAND_EXITING = 1 << 11;
        const ENABLE_INVPCID = 1 << 12;
        const ENABLE_VM_FUNCTIONS = 1 << 13;
        const VMCS_SHADOWING = 1 << 14;
        const RDSEED_EXITING = 1 << 16;
        const ENABLE_PML = 1 << 17;
        const EPT_VIOLATION_VE = 1 << 18;
        const ENABLE_XSAVES_XRSTORS = 1 << 20;
    }
}

bitflags! {
    /// VM-exit controls (SDM 24.7.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExitControls: u32 {
        const SAVE_DEBUG_CONTROLS = 1 << 2;
        const HOST_ADDRESS_SPACE_SIZE = 1 << 9;
        const LOAD_IA32_PERF_GLOBAL_CTRL = 1 << 12;
        const ACKNOWLEDGE_INTERRUPT_ON_EXIT = 1 << 15;
        const SAVE_IA32_PAT = 1 << 18;
        const LOAD_IA32_PAT = 1 << 19;
        const SAVE_IA32_EFER = 1 << 20;
        const LOAD_IA32_EFER = 1 << 21;
        const SAVE_PREEMPTION_TIMER_VALUE = 1 << 22;
    }
}

bitflags! {
    /// VM-entry controls (SDM 24.8.1).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryControls: u32 {
        const LOAD_DEBUG_CONTROLS = 1 << 2;
        const IA32E_MODE_GUEST = 1 << 9;
        const ENTRY_TO_SMM = 1 << 10;
        const DEACTIVATE_DUAL_MONITOR = 1 << 11;
        const LOAD_IA32_PERF_GLOBAL_CTRL = 1 << 13;
        const LOAD_IA32_PAT = 1 << 14;
        const LOAD_IA32_EFER = 1 << 15;
    }
}

const PIN_BASELINE: u32 = 0;

const PRIMARY_BASELINE: u32 = PrimaryProcControls::ACTIVATE_SECONDARY_CONTROLS.bits();

const SECONDARY_BASELINE: u32 = SecondaryProcControls::ENABLE_RDTSCP.bits()
    | SecondaryProcControls::ENABLE_INVPCID.bits()
    | SecondaryProcControls::ENABLE_XSAVES_XRSTORS.bits();

const EXIT_BASELINE: u32 = ExitControls::SAVE_DEBUG_CONTROLS.bits()
    | ExitControls::HOST_ADDRESS_SPACE_SIZE.bits()
    | ExitControls::LOAD_IA32_PERF_GLOBAL_CTRL.bits()
    | ExitControls::ACKNOWLEDGE_INTERRUPT_ON_EXIT.bits()
    | ExitControls::SAVE_IA32_PAT.bits()
    | ExitControls::LOAD_IA32_PAT.bits()
    | ExitControls::SAVE_IA32_EFER.bits()
    | ExitControls::LOAD_IA32_EFER.bits();

const ENTRY_BASELINE: u32 = EntryControls::LOAD_DEBUG_CONTROLS.bits()
    | EntryControls::IA32E_MODE_GUEST.bits()
    | EntryControls::LOAD_IA32_PERF_GLOBAL_CTRL.bits()
    | EntryControls::LOAD_IA32_PAT.bits()
    | EntryControls::LOAD_IA32_EFER.bits();

/// One negotiable control class.
pub struct ControlClass {
    /// Human-readable name used in correction diagnostics.
    pub name: &'static str,
    /// VMCS field holding the control vector.
    pub field: u64,
    /// Capability MSR reporting the allowed0/allowed1 envelope.
    pub msr: u32,
    /// Bits requested for every VMCS regardless of caller input.
    pub baseline: u32,
    /// Whether the 32-bit control writer seeds this field with the minimal
    /// legal value before negotiation. The secondary vector has no TRUE MSR
    /// variant and starts from the cleared-state zero instead.
    pub seed: bool,
    pub(crate) decode: fn(&'static str, u32, &dyn DiagnosticSink),
}

/// All five classes in the order the driver negotiates them.
pub const CONTROL_CLASSES: [ControlClass; 5] = [
    ControlClass {
        name: "pin-based",
        field: fields::PIN_BASED_VM_EXECUTION_CONTROLS,
        msr: msr::IA32_VMX_TRUE_PINBASED_CTLS,
        baseline: PIN_BASELINE,
        seed: true,
        decode: decode_flags::<PinBasedControls>,
    },
    ControlClass {
        name: "primary processor-based",
        field: fields::PRIMARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS,
        msr: msr::IA32_VMX_TRUE_PROCBASED_CTLS,
        baseline: PRIMARY_BASELINE,
        seed: true,
        decode: decode_flags::<PrimaryProcControls>,
    },
    ControlClass {
        name: "secondary processor-based",
        field: fields::SECONDARY_PROCESSOR_BASED_VM_EXECUTION_CONTROLS,
        msr: msr::IA32_VMX_PROCBASED_CTLS2,
        baseline: SECONDARY_BASELINE,
        seed: false,
        decode: decode_flags::<SecondaryProcControls>,
    },
    ControlClass {
        name: "vm-exit",
        field: fields::VM_EXIT_CONTROLS,
        msr: msr::IA32_VMX_TRUE_EXIT_CTLS,
        baseline: EXIT_BASELINE,
        seed: true,
        decode: decode_flags::<ExitControls>,
    },
    ControlClass {
        name: "vm-entry",
        field: fields::VM_ENTRY_CONTROLS,
        msr: msr::IA32_VMX_TRUE_ENTRY_CTLS,
        baseline: ENTRY_BASELINE,
        seed: true,
        decode: decode_flags::<EntryControls>,
    },
];

/// Split a capability MSR into (allowed0, allowed1).
pub fn split_capability(msr_value: u64) -> (u32, u32) {
    ((msr_value & 0xFFFF_FFFF) as u32, (msr_value >> 32) as u32)
}

/// Outcome of folding a desired vector into the capability envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constrained {
    /// The legal vector to program.
    pub value: u32,
    /// Must-be-1 bits the caller had not requested.
    pub forced_on: u32,
    /// Requested bits the processor does not permit.
    pub filtered_off: u32,
}

/// Force on every allowed0 bit and strip every bit outside allowed1.
///
/// On real hardware allowed0 is a subset of allowed1. If a synthetic pair
/// contradicts itself, must-be-1 wins: a bit the processor insists on is
/// never stripped.
pub fn constrain(desired: u32, allowed0: u32, allowed1: u32) -> Constrained {
    let forced_on = allowed0 & !desired;
    let merged = desired | allowed0;
    let filtered_off = merged & !allowed1 & !allowed0;
    Constrained {
        value: merged & (allowed1 | allowed0),
        forced_on,
        filtered_off,
    }
}

fn decode_flags<F: Flags<Bits = u32>>(class: &'static str, value: u32, sink: &dyn DiagnosticSink) {
    let known = F::from_bits_truncate(value);
    for flag in known.iter_names() {
        vmlog!(sink, Debug, "controls", "{}: {} set", class, flag.0);
    }
    let unnamed = value & !F::all().bits();
    if unnamed != 0 {
        vmlog!(sink, Debug, "controls", "{}: unnamed bits 0x{:08x} set", class, unnamed);
    }
}
