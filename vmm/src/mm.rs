//! Memory addressing for VMCS resources
//!
//! The hardware consumes physical addresses while this crate allocates
//! through the embedder's heap, so every page-backed resource goes through a
//! [`MemoryTranslator`] before it is handed to a VMX instruction.

/// Physical memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhysicalAddress(pub u64);

impl PhysicalAddress {
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Zero is the translator's failure sentinel, never a valid VMCS home.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Virtual memory address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct VirtualAddress(pub u64);

impl VirtualAddress {
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as u64)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Virtual-to-physical translation capability.
///
/// Supplied by the embedding environment; the VMCS region and every
/// hardware-visible buffer address pass through here. A zero result signals
/// that the address has no physical backing.
pub trait MemoryTranslator {
    fn virt_to_phys(&self, virt: VirtualAddress) -> PhysicalAddress;
}

/// Translator for environments where the heap is identity mapped.
///
/// Early-boot hypervisor stages and UEFI loaders commonly run with physical
/// memory mapped one-to-one, which makes translation the identity function.
pub struct IdentityTranslator;

impl MemoryTranslator for IdentityTranslator {
    fn virt_to_phys(&self, virt: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(virt.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_translation() {
        let t = IdentityTranslator;
        let phys = t.virt_to_phys(VirtualAddress::new(0x1000));
        assert_eq!(phys.as_u64(), 0x1000);
        assert!(!phys.is_null());
    }

    #[test]
    fn test_null_sentinel() {
        assert!(PhysicalAddress::new(0).is_null());
        assert!(!PhysicalAddress::new(0x5000).is_null());
    }

    #[test]
    fn test_from_ptr_round_trip() {
        let word: u32 = 0;
        let virt = VirtualAddress::from_ptr(&word);
        assert_eq!(virt.as_u64(), &word as *const u32 as u64);
    }
}
