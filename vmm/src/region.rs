//! Physical resources backing one VMCS instance
//!
//! Two page-backed buffers, both exclusively owned by one lifecycle driver:
//! the 4 KiB VMCS region the hardware reads and writes, and the scratch
//! stack the exit handler runs on. Both allocate through the embedder's
//! global allocator with an explicit layout so the architectural alignment
//! requirement holds, and both release idempotently: the driver's failure
//! branches call [`VmcsRegion::release`] directly, `Drop` covers every
//! remaining exit path.

use alloc::alloc::{alloc_zeroed, dealloc};
use core::alloc::Layout;

use crate::error::{VmcsError, VmcsResult};
use crate::mm::{MemoryTranslator, VirtualAddress};

/// A VMCS region is 1024 32-bit words.
pub const VMCS_REGION_WORDS: usize = 1024;
const VMCS_REGION_SIZE: usize = VMCS_REGION_WORDS * 4;
const VMCS_REGION_ALIGN: usize = 4096;

/// Scratch stack the hardware switches to on VM exit.
pub const EXIT_HANDLER_STACK_SIZE: usize = 0x8000;
const STACK_ALIGN: usize = 16;

/// The return stack pointer must be 16-byte aligned at entry.
const STACK_POINTER_MASK: u64 = 0xFFFF_FFFF_FFFF_FFF0;

// Both layouts use constant power-of-two alignments and sizes well below
// isize::MAX, so construction cannot fail.
fn vmcs_layout() -> Layout {
    match Layout::from_size_align(VMCS_REGION_SIZE, VMCS_REGION_ALIGN) {
        Ok(layout) => layout,
        Err(_) => unreachable!(),
    }
}

fn stack_layout() -> Layout {
    match Layout::from_size_align(EXIT_HANDLER_STACK_SIZE, STACK_ALIGN) {
        Ok(layout) => layout,
        Err(_) => unreachable!(),
    }
}

/// The 4 KiB hardware-owned control structure.
///
/// Word 0 carries the VMCS revision identifier; the rest belongs to the
/// processor once the region has been loaded. The physical address is cached
/// at creation because `vmptrld`/`vmclear` take a pointer to it, and it must
/// never change while the region is loaded.
#[derive(Debug)]
pub struct VmcsRegion {
    base: *mut u8,
    phys: u64,
}

impl VmcsRegion {
    /// Allocate a zeroed, page-aligned region, translate it and stamp the
    /// revision identifier into word 0.
    ///
    /// A zero translation means the buffer has no physical backing; the
    /// buffer is freed before the error propagates so no partial allocation
    /// survives.
    pub fn create(translator: &dyn MemoryTranslator, revision: u32) -> VmcsResult<Self> {
        // SAFETY: vmcs_layout() has non-zero size.
        let base = unsafe { alloc_zeroed(vmcs_layout()) };
        if base.is_null() {
            return Err(VmcsError::Allocation {
                resource: "vmcs region",
            });
        }
        let mut region = Self { base, phys: 0 };
        let phys = translator.virt_to_phys(VirtualAddress::from_ptr(base));
        if phys.is_null() {
            region.release();
            return Err(VmcsError::Allocation {
                resource: "vmcs region",
            });
        }
        region.phys = phys.as_u64();
        // SAFETY: base is a live allocation of at least 4 bytes, 4K aligned,
        // so the u32 store at offset 0 is in bounds and aligned.
        unsafe {
            (base as *mut u32).write_volatile(revision);
        }
        Ok(region)
    }

    /// Cached physical address; zero only after release.
    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Borrow of the cached physical address for `vmptrld`/`vmclear`.
    pub fn phys_ref(&self) -> &u64 {
        &self.phys
    }

    /// Revision word as currently stored.
    pub fn revision(&self) -> u32 {
        if self.base.is_null() {
            return 0;
        }
        // SAFETY: base is live and aligned while non-null.
        unsafe { (self.base as *const u32).read_volatile() }
    }

    pub fn is_released(&self) -> bool {
        self.base.is_null()
    }

    /// Free the backing buffer and forget the physical address. Calling this
    /// on an already-released region is a no-op.
    pub fn release(&mut self) {
        if self.base.is_null() {
            return;
        }
        // SAFETY: base came from alloc_zeroed with the same layout and has
        // not been freed, as witnessed by the null check above.
        unsafe {
            dealloc(self.base, vmcs_layout());
        }
        self.base = core::ptr::null_mut();
        self.phys = 0;
    }
}

impl Drop for VmcsRegion {
    fn drop(&mut self) {
        self.release();
    }
}

/// Scratch stack for the exit handler, programmed as `HOST_RSP`.
#[derive(Debug)]
pub struct ExitHandlerStack {
    base: *mut u8,
}

impl ExitHandlerStack {
    pub fn create() -> VmcsResult<Self> {
        // SAFETY: stack_layout() has non-zero size.
        let base = unsafe { alloc_zeroed(stack_layout()) };
        if base.is_null() {
            return Err(VmcsError::Allocation {
                resource: "exit-handler stack",
            });
        }
        Ok(Self { base })
    }

    /// Address the hardware return stack pointer is set to: one past the
    /// end of the buffer, rounded down to 16 bytes.
    pub fn top(&self) -> u64 {
        if self.base.is_null() {
            return 0;
        }
        (self.base as u64 + EXIT_HANDLER_STACK_SIZE as u64) & STACK_POINTER_MASK
    }

    pub fn is_released(&self) -> bool {
        self.base.is_null()
    }

    /// Idempotent release, same contract as [`VmcsRegion::release`].
    pub fn release(&mut self) {
        if self.base.is_null() {
            return;
        }
        // SAFETY: base came from alloc_zeroed with the same layout and has
        // not been freed.
        unsafe {
            dealloc(self.base, stack_layout());
        }
        self.base = core::ptr::null_mut();
    }
}

impl Drop for ExitHandlerStack {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mm::IdentityTranslator;
    use crate::testing::MockTranslator;

    #[test]
    fn test_create_writes_revision_word() {
        let region = VmcsRegion::create(&IdentityTranslator, 0x12).unwrap();
        assert_eq!(region.revision(), 0x12);
        assert_ne!(region.phys(), 0);
        assert_eq!(region.phys() & 0xFFF, 0, "region must be page aligned");
    }

    #[test]
    fn test_null_translation_rolls_back() {
        let translator = MockTranslator::new();
        translator.set_return_null(true);
        let err = VmcsRegion::create(&translator, 0x12).unwrap_err();
        assert_eq!(
            err,
            VmcsError::Allocation {
                resource: "vmcs region"
            }
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut region = VmcsRegion::create(&IdentityTranslator, 1).unwrap();
        region.release();
        assert!(region.is_released());
        assert_eq!(region.phys(), 0);
        assert_eq!(region.revision(), 0);
        region.release();
        assert!(region.is_released());
        assert_eq!(region.phys(), 0);
    }

    #[test]
    fn test_stack_top_alignment() {
        let stack = ExitHandlerStack::create().unwrap();
        let top = stack.top();
        assert_eq!(top & 0xF, 0);
        assert!(top > EXIT_HANDLER_STACK_SIZE as u64);
    }

    #[test]
    fn test_stack_release_is_idempotent() {
        let mut stack = ExitHandlerStack::create().unwrap();
        stack.release();
        assert!(stack.is_released());
        assert_eq!(stack.top(), 0);
        stack.release();
        assert!(stack.is_released());
    }
}
