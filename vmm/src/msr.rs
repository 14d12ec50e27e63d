//! Model-specific register identifiers
//!
//! The VMX capability group (0x480..0x491) reports which control bits the
//! processor supports; the rest are the architectural MSRs mirrored into
//! guest and host VMCS fields.

pub const IA32_SYSENTER_CS: u32 = 0x174;
pub const IA32_SYSENTER_ESP: u32 = 0x175;
pub const IA32_SYSENTER_EIP: u32 = 0x176;
pub const IA32_DEBUGCTL: u32 = 0x1D9;
pub const IA32_PAT: u32 = 0x277;
pub const IA32_PERF_GLOBAL_CTRL: u32 = 0x38F;

// VMX capability reporting
pub const IA32_VMX_BASIC: u32 = 0x480;
pub const IA32_VMX_PINBASED_CTLS: u32 = 0x481;
pub const IA32_VMX_PROCBASED_CTLS: u32 = 0x482;
pub const IA32_VMX_EXIT_CTLS: u32 = 0x483;
pub const IA32_VMX_ENTRY_CTLS: u32 = 0x484;
pub const IA32_VMX_MISC: u32 = 0x485;
pub const IA32_VMX_CR0_FIXED0: u32 = 0x486;
pub const IA32_VMX_CR0_FIXED1: u32 = 0x487;
pub const IA32_VMX_CR4_FIXED0: u32 = 0x488;
pub const IA32_VMX_CR4_FIXED1: u32 = 0x489;
pub const IA32_VMX_VMCS_ENUM: u32 = 0x48A;
pub const IA32_VMX_PROCBASED_CTLS2: u32 = 0x48B;
pub const IA32_VMX_EPT_VPID_CAP: u32 = 0x48C;
pub const IA32_VMX_TRUE_PINBASED_CTLS: u32 = 0x48D;
pub const IA32_VMX_TRUE_PROCBASED_CTLS: u32 = 0x48E;
pub const IA32_VMX_TRUE_EXIT_CTLS: u32 = 0x48F;
pub const IA32_VMX_TRUE_ENTRY_CTLS: u32 = 0x490;
pub const IA32_VMX_VMFUNC: u32 = 0x491;

pub const IA32_EFER: u32 = 0xC000_0080;
pub const IA32_FS_BASE: u32 = 0xC000_0100;
pub const IA32_GS_BASE: u32 = 0xC000_0101;

/// Revision identifier lives in the low 31 bits of `IA32_VMX_BASIC`.
pub const VMX_BASIC_REVISION_MASK: u64 = 0x7FFF_FFFF;

// IA32_EFER bits
pub const EFER_SCE: u64 = 1 << 0;
pub const EFER_LME: u64 = 1 << 8;
pub const EFER_LMA: u64 = 1 << 10;
pub const EFER_NXE: u64 = 1 << 11;
/// Everything outside SCE/LME/LMA/NXE must read back as zero.
pub const EFER_RESERVED_MASK: u64 = !(EFER_SCE | EFER_LME | EFER_LMA | EFER_NXE);

/// IA32_DEBUGCTL bits 5:2 and 63:16 are reserved.
pub const DEBUGCTL_RESERVED_MASK: u64 = 0xFFFF_FFFF_FFFF_003C;

/// IA32_PERF_GLOBAL_CTRL defines counter-enable bits 0..7 and 32..34 on the
/// parts this crate targets; the rest must be zero when loaded by entry/exit.
pub const PERF_GLOBAL_CTRL_RESERVED_MASK: u64 = 0xFFFF_FFF8_FFFF_FF00;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_group_is_contiguous() {
        assert_eq!(IA32_VMX_BASIC, 0x480);
        assert_eq!(IA32_VMX_TRUE_PINBASED_CTLS, IA32_VMX_BASIC + 0xD);
        assert_eq!(IA32_VMX_TRUE_ENTRY_CTLS, IA32_VMX_BASIC + 0x10);
    }

    #[test]
    fn test_efer_reserved_mask_excludes_defined_bits() {
        assert_eq!(EFER_RESERVED_MASK & EFER_LME, 0);
        assert_eq!(EFER_RESERVED_MASK & EFER_LMA, 0);
        assert_ne!(EFER_RESERVED_MASK & (1 << 1), 0);
    }

    #[test]
    fn test_debugctl_reserved_mask() {
        // LBR (bit 0) and BTF (bit 1) are defined, bits 5:2 are not.
        assert_eq!(DEBUGCTL_RESERVED_MASK & 0x3, 0);
        assert_eq!(DEBUGCTL_RESERVED_MASK & 0x3C, 0x3C);
        assert_eq!(DEBUGCTL_RESERVED_MASK >> 16, 0xFFFF_FFFF_FFFF);
    }
}
