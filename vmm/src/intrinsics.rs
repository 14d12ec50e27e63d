//! Raw VMX instruction capability
//!
//! The driver never executes privileged instructions directly; it goes
//! through a [`VmxIntrinsics`] handle supplied at construction. The handle is
//! shared (one per machine, referenced by every per-core driver) and every
//! operation reports success as a plain flag at this boundary. Turning flags
//! into errors is the driver's job.

/// Saved guest general-purpose register file.
///
/// Laid out for the re-entry stubs, which restore registers by fixed offset:
/// rax at +0x00 through r15 at +0x70, then rip at +0x78 and rsp at +0x80.
/// The exit handler fills one of these on every VM exit and hands it back to
/// [`VmxIntrinsics::vmresume`] to re-enter the guest.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct StateSaveArea {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rsp: u64,
}

impl StateSaveArea {
    pub const fn new() -> Self {
        Self {
            rax: 0,
            rbx: 0,
            rcx: 0,
            rdx: 0,
            rbp: 0,
            rsi: 0,
            rdi: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            r13: 0,
            r14: 0,
            r15: 0,
            rip: 0,
            rsp: 0,
        }
    }
}

/// Privileged instruction access used by the VMCS driver.
///
/// Implementations: [`crate::hardware::HardwareIntrinsics`] executes the real
/// instructions on x86_64; [`crate::testing::MockIntrinsics`] records and
/// replays them for tests.
pub trait VmxIntrinsics: Send + Sync {
    /// Read a model-specific register.
    fn read_msr(&self, msr: u32) -> u64;

    /// `cpuid` with the given leaf in eax, returning eax. Leaf 0x8000_0008
    /// reports the physical-address width consumed by the entry checks.
    fn cpuid_eax(&self, leaf: u32) -> u32;

    /// Read a VMCS field from the current VMCS. `None` on VMfail.
    fn vmread(&self, field: u64) -> Option<u64>;

    /// Write a VMCS field on the current VMCS.
    fn vmwrite(&self, field: u64, value: u64) -> bool;

    /// Make the VMCS at the referenced physical address current and active.
    fn vmptrld(&self, phys_addr: &u64) -> bool;

    /// Put the VMCS at the referenced physical address into the clear state.
    fn vmclear(&self, phys_addr: &u64) -> bool;

    /// First entry into the current VMCS. A `true` return is only ever
    /// observed by tests; on hardware, success transfers control to the
    /// guest and this call does not return.
    fn vmlaunch(&self) -> bool;

    /// Re-enter the current VMCS after restoring the saved register file.
    /// Any return at all means the entry failed; the flag only
    /// distinguishes VMfail from a fall-through.
    fn vmresume(&self, state_save: &StateSaveArea) -> bool;

    /// Leave guest execution permanently: restore the register file located
    /// at `host_gs_base` and continue as host. Same non-return contract as
    /// [`Self::vmresume`].
    fn vmpromote(&self, host_gs_base: u64) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_save_layout() {
        // The re-entry stubs address fields by offset; a reordering of the
        // struct must fail loudly here.
        assert_eq!(core::mem::size_of::<StateSaveArea>(), 0x88);
        let area = StateSaveArea::new();
        let base = &area as *const StateSaveArea as usize;
        assert_eq!(&area.rax as *const u64 as usize - base, 0x00);
        assert_eq!(&area.rdi as *const u64 as usize - base, 0x30);
        assert_eq!(&area.r15 as *const u64 as usize - base, 0x70);
        assert_eq!(&area.rip as *const u64 as usize - base, 0x78);
        assert_eq!(&area.rsp as *const u64 as usize - base, 0x80);
    }
}
