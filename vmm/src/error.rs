//! Error types for the VMCS subsystem
//!
//! Every fallible operation in this crate returns [`VmcsResult`]. Hardware
//! rejection is an expected outcome, not a panic: VMX instruction failures
//! are surfaced as structured values carrying enough context (field
//! identifier, attempted value, VM-instruction-error code) to diagnose a
//! failed entry without re-running it.

use core::fmt;

/// Coarse classification of a [`VmcsError`].
///
/// The fine-grained variants below group into four kinds: wiring problems
/// caught at construction, resource acquisition failures, rejected hardware
/// operations, and entry-check rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Allocation,
    HardwareOperation,
    Compliance,
}

/// Main VMCS error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmcsError {
    /// Collaborator wiring rejected at construction
    Configuration {
        what: &'static str,
    },

    /// Region or stack acquisition failed
    Allocation {
        resource: &'static str,
    },

    /// Hardware operation failures
    VmreadFailed {
        field: u64,
    },
    VmwriteFailed {
        field: u64,
        value: u64,
    },
    ClearFailed {
        phys: u64,
    },
    LoadFailed {
        phys: u64,
    },
    LaunchFailed {
        instruction_error: u64,
    },
    ResumeFailed,
    PromoteFailed,

    /// A named entry-check rule failed (diagnostic; the hardware's own
    /// rejection is the cause, the rule explains it)
    Compliance {
        rule: &'static str,
    },
}

/// Result type alias for VMCS operations
pub type VmcsResult<T> = Result<T, VmcsError>;

impl VmcsError {
    /// Map a fine-grained variant onto its taxonomy kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::Allocation { .. } => ErrorKind::Allocation,
            Self::VmreadFailed { .. }
            | Self::VmwriteFailed { .. }
            | Self::ClearFailed { .. }
            | Self::LoadFailed { .. }
            | Self::LaunchFailed { .. }
            | Self::ResumeFailed
            | Self::PromoteFailed => ErrorKind::HardwareOperation,
            Self::Compliance { .. } => ErrorKind::Compliance,
        }
    }
}

impl fmt::Display for VmcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { what } => {
                write!(f, "Invalid configuration: {}", what)
            }
            Self::Allocation { resource } => {
                write!(f, "Failed to allocate {}", resource)
            }
            Self::VmreadFailed { field } => {
                write!(f, "vmread failed: field 0x{:x}", field)
            }
            Self::VmwriteFailed { field, value } => {
                write!(f, "vmwrite failed: field 0x{:x}, value 0x{:x}", field, value)
            }
            Self::ClearFailed { phys } => {
                write!(f, "vmclear failed: region at 0x{:x}", phys)
            }
            Self::LoadFailed { phys } => {
                write!(f, "vmptrld failed: region at 0x{:x}", phys)
            }
            Self::LaunchFailed { instruction_error } => {
                write!(f, "vmlaunch failed: VM-instruction error {}", instruction_error)
            }
            Self::ResumeFailed => write!(f, "vmresume returned to host"),
            Self::PromoteFailed => write!(f, "promotion returned to host"),
            Self::Compliance { rule } => {
                write!(f, "Entry check failed: {}", rule)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            VmcsError::Configuration { what: "exit entry" }.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            VmcsError::Allocation { resource: "vmcs region" }.kind(),
            ErrorKind::Allocation
        );
        assert_eq!(
            VmcsError::VmreadFailed { field: 0x4400 }.kind(),
            ErrorKind::HardwareOperation
        );
        assert_eq!(
            VmcsError::VmwriteFailed { field: 0x800, value: 0x10 }.kind(),
            ErrorKind::HardwareOperation
        );
        assert_eq!(
            VmcsError::LaunchFailed { instruction_error: 7 }.kind(),
            ErrorKind::HardwareOperation
        );
        assert_eq!(VmcsError::ResumeFailed.kind(), ErrorKind::HardwareOperation);
        assert_eq!(
            VmcsError::Compliance { rule: "host_cs_not_equal_zero" }.kind(),
            ErrorKind::Compliance
        );
    }

    #[test]
    fn test_error_display() {
        use alloc::format;

        let err = VmcsError::VmwriteFailed {
            field: 0x0800,
            value: 0x10,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0x800"));
        assert!(msg.contains("0x10"));

        let err = VmcsError::LaunchFailed { instruction_error: 7 };
        assert!(format!("{}", err).contains("7"));
    }
}
