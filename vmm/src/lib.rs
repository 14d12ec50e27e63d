//! Intel VT-x VMCS management
//!
//! This crate owns the virtual-machine control structure for one logical
//! CPU at a time: region allocation, field programming, negotiation of the
//! execution/exit/entry control vectors against the capability MSRs, and
//! the clear/load/launch/resume/promote lifecycle. A catalogue of VM-entry
//! checks modeled on SDM Vol. 3 chapter 26 explains VMfails that would
//! otherwise surface as a bare error code.
//!
//! Everything privileged goes through the [`VmxIntrinsics`] trait, so the
//! whole driver runs unmodified against [`testing::MockIntrinsics`] on any
//! host. [`hardware::HardwareIntrinsics`] is the real backing on x86_64.
//!
//! ```no_run
//! # #[cfg(target_arch = "x86_64")]
//! # fn demo() -> obsidian_vmm::VmcsResult<()> {
//! use std::sync::Arc;
//! use obsidian_vmm::{hardware, IdentityTranslator, LogSink, Vmcs};
//!
//! extern "C" fn vm_exit_entry() {}
//!
//! let intrinsics = Arc::new(hardware::HardwareIntrinsics::new());
//! let host = hardware::capture_host(intrinsics.as_ref());
//! let guest = host; // identity guest for illustration
//! let mut vmcs = Vmcs::new(
//!     intrinsics,
//!     Arc::new(IdentityTranslator),
//!     Arc::new(LogSink),
//!     vm_exit_entry as *const () as u64,
//! )?;
//! vmcs.launch(&host, &guest)
//! # }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod checks;
pub mod controls;
pub mod diag;
pub mod error;
pub mod fields;
#[cfg(target_arch = "x86_64")]
pub mod hardware;
pub mod intrinsics;
pub mod mm;
pub mod msr;
pub mod region;
pub mod state;
pub mod testing;
pub mod vmcs;

pub use diag::{DiagnosticSink, LogLevel, LogSink, NullSink};
pub use error::{ErrorKind, VmcsError, VmcsResult};
pub use intrinsics::{StateSaveArea, VmxIntrinsics};
pub use mm::{IdentityTranslator, MemoryTranslator, PhysicalAddress, VirtualAddress};
pub use region::{ExitHandlerStack, VmcsRegion, EXIT_HANDLER_STACK_SIZE};
pub use state::{VmState, VmStateSnapshot};
pub use vmcs::{LifecycleState, Vmcs};
