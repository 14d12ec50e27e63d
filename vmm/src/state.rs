//! CPU execution-context snapshots
//!
//! `launch` takes two of these: one describing the context the guest starts
//! in, one describing the context the host returns to on exit. The driver
//! only reads; ownership stays with the caller and the borrow pins the
//! snapshot for the duration of the call.
//!
//! [`VmState`] is a capability, not a base class. [`VmStateSnapshot`] is the
//! plain-value implementation used for guests and for tests; on x86_64,
//! [`crate::hardware::capture_host`] fills one from the live CPU.

use crate::diag::{vmlog, DiagnosticSink};

/// Read-only view of a complete CPU execution context.
pub trait VmState {
    // Segment selectors
    fn es(&self) -> u16;
    fn cs(&self) -> u16;
    fn ss(&self) -> u16;
    fn ds(&self) -> u16;
    fn fs(&self) -> u16;
    fn gs(&self) -> u16;
    fn ldtr(&self) -> u16;
    fn tr(&self) -> u16;

    // Segment limits
    fn es_limit(&self) -> u32;
    fn cs_limit(&self) -> u32;
    fn ss_limit(&self) -> u32;
    fn ds_limit(&self) -> u32;
    fn fs_limit(&self) -> u32;
    fn gs_limit(&self) -> u32;
    fn ldtr_limit(&self) -> u32;
    fn tr_limit(&self) -> u32;

    // Segment access rights, VMCS format (type/s/dpl/p/avl/l/db/g plus the
    // unusable bit at bit 16)
    fn es_access_rights(&self) -> u32;
    fn cs_access_rights(&self) -> u32;
    fn ss_access_rights(&self) -> u32;
    fn ds_access_rights(&self) -> u32;
    fn fs_access_rights(&self) -> u32;
    fn gs_access_rights(&self) -> u32;
    fn ldtr_access_rights(&self) -> u32;
    fn tr_access_rights(&self) -> u32;

    // Segment bases. FS and GS bases live in their MSRs in 64-bit mode and
    // are exposed through the MSR getters below instead.
    fn es_base(&self) -> u64;
    fn cs_base(&self) -> u64;
    fn ss_base(&self) -> u64;
    fn ds_base(&self) -> u64;
    fn ldtr_base(&self) -> u64;
    fn tr_base(&self) -> u64;

    // Control and debug registers
    fn cr0(&self) -> u64;
    fn cr3(&self) -> u64;
    fn cr4(&self) -> u64;
    fn dr7(&self) -> u64;
    fn rflags(&self) -> u64;

    // Descriptor tables
    fn gdt_base(&self) -> u64;
    fn gdt_limit(&self) -> u16;
    fn idt_base(&self) -> u64;
    fn idt_limit(&self) -> u16;

    // MSRs mirrored into VMCS fields
    fn ia32_debugctl(&self) -> u64;
    fn ia32_pat(&self) -> u64;
    fn ia32_efer(&self) -> u64;
    fn ia32_perf_global_ctrl(&self) -> u64;
    fn ia32_sysenter_cs(&self) -> u64;
    fn ia32_sysenter_esp(&self) -> u64;
    fn ia32_sysenter_eip(&self) -> u64;
    fn ia32_fs_base(&self) -> u64;
    fn ia32_gs_base(&self) -> u64;

    /// Write the whole context to the sink, one line per register group.
    /// Used by the launch failure path for both snapshots.
    fn dump(&self, label: &'static str, sink: &dyn DiagnosticSink) {
        vmlog!(sink, Debug, "state", "{} context:", label);
        let segments: [(&str, u16, u64, u32, u32); 8] = [
            ("es", self.es(), self.es_base(), self.es_limit(), self.es_access_rights()),
            ("cs", self.cs(), self.cs_base(), self.cs_limit(), self.cs_access_rights()),
            ("ss", self.ss(), self.ss_base(), self.ss_limit(), self.ss_access_rights()),
            ("ds", self.ds(), self.ds_base(), self.ds_limit(), self.ds_access_rights()),
            ("fs", self.fs(), self.ia32_fs_base(), self.fs_limit(), self.fs_access_rights()),
            ("gs", self.gs(), self.ia32_gs_base(), self.gs_limit(), self.gs_access_rights()),
            ("ldtr", self.ldtr(), self.ldtr_base(), self.ldtr_limit(), self.ldtr_access_rights()),
            ("tr", self.tr(), self.tr_base(), self.tr_limit(), self.tr_access_rights()),
        ];
        for (name, selector, base, limit, rights) in segments {
            vmlog!(
                sink,
                Debug,
                "state",
                "{}: sel=0x{:04x} base=0x{:016x} limit=0x{:08x} rights=0x{:05x}",
                name,
                selector,
                base,
                limit,
                rights
            );
        }
        vmlog!(
            sink,
            Debug,
            "state",
            "cr0=0x{:016x} cr3=0x{:016x} cr4=0x{:016x}",
            self.cr0(),
            self.cr3(),
            self.cr4()
        );
        vmlog!(
            sink,
            Debug,
            "state",
            "dr7=0x{:016x} rflags=0x{:016x}",
            self.dr7(),
            self.rflags()
        );
        vmlog!(
            sink,
            Debug,
            "state",
            "gdt=0x{:016x}/0x{:04x} idt=0x{:016x}/0x{:04x}",
            self.gdt_base(),
            self.gdt_limit(),
            self.idt_base(),
            self.idt_limit()
        );
        vmlog!(
            sink,
            Debug,
            "state",
            "debugctl=0x{:x} pat=0x{:x} efer=0x{:x} perf_global_ctrl=0x{:x}",
            self.ia32_debugctl(),
            self.ia32_pat(),
            self.ia32_efer(),
            self.ia32_perf_global_ctrl()
        );
        vmlog!(
            sink,
            Debug,
            "state",
            "sysenter cs=0x{:x} esp=0x{:x} eip=0x{:x}",
            self.ia32_sysenter_cs(),
            self.ia32_sysenter_esp(),
            self.ia32_sysenter_eip()
        );
    }
}

/// Plain-value [`VmState`] implementation.
///
/// Field names match the getter set one to one. `Default` yields the
/// all-zero context; callers fill in what their guest or host needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct VmStateSnapshot {
    pub es: u16,
    pub cs: u16,
    pub ss: u16,
    pub ds: u16,
    pub fs: u16,
    pub gs: u16,
    pub ldtr: u16,
    pub tr: u16,

    pub es_limit: u32,
    pub cs_limit: u32,
    pub ss_limit: u32,
    pub ds_limit: u32,
    pub fs_limit: u32,
    pub gs_limit: u32,
    pub ldtr_limit: u32,
    pub tr_limit: u32,

    pub es_access_rights: u32,
    pub cs_access_rights: u32,
    pub ss_access_rights: u32,
    pub ds_access_rights: u32,
    pub fs_access_rights: u32,
    pub gs_access_rights: u32,
    pub ldtr_access_rights: u32,
    pub tr_access_rights: u32,

    pub es_base: u64,
    pub cs_base: u64,
    pub ss_base: u64,
    pub ds_base: u64,
    pub ldtr_base: u64,
    pub tr_base: u64,

    pub cr0: u64,
    pub cr3: u64,
    pub cr4: u64,
    pub dr7: u64,
    pub rflags: u64,

    pub gdt_base: u64,
    pub gdt_limit: u16,
    pub idt_base: u64,
    pub idt_limit: u16,

    pub ia32_debugctl: u64,
    pub ia32_pat: u64,
    pub ia32_efer: u64,
    pub ia32_perf_global_ctrl: u64,
    pub ia32_sysenter_cs: u64,
    pub ia32_sysenter_esp: u64,
    pub ia32_sysenter_eip: u64,
    pub ia32_fs_base: u64,
    pub ia32_gs_base: u64,
}

impl VmState for VmStateSnapshot {
    fn es(&self) -> u16 {
        self.es
    }
    fn cs(&self) -> u16 {
        self.cs
    }
    fn ss(&self) -> u16 {
        self.ss
    }
    fn ds(&self) -> u16 {
        self.ds
    }
    fn fs(&self) -> u16 {
        self.fs
    }
    fn gs(&self) -> u16 {
        self.gs
    }
    fn ldtr(&self) -> u16 {
        self.ldtr
    }
    fn tr(&self) -> u16 {
        self.tr
    }

    fn es_limit(&self) -> u32 {
        self.es_limit
    }
    fn cs_limit(&self) -> u32 {
        self.cs_limit
    }
    fn ss_limit(&self) -> u32 {
        self.ss_limit
    }
    fn ds_limit(&self) -> u32 {
        self.ds_limit
    }
    fn fs_limit(&self) -> u32 {
        self.fs_limit
    }
    fn gs_limit(&self) -> u32 {
        self.gs_limit
    }
    fn ldtr_limit(&self) -> u32 {
        self.ldtr_limit
    }
    fn tr_limit(&self) -> u32 {
        self.tr_limit
    }

    fn es_access_rights(&self) -> u32 {
        self.es_access_rights
    }
    fn cs_access_rights(&self) -> u32 {
        self.cs_access_rights
    }
    fn ss_access_rights(&self) -> u32 {
        self.ss_access_rights
    }
    fn ds_access_rights(&self) -> u32 {
        self.ds_access_rights
    }
    fn fs_access_rights(&self) -> u32 {
        self.fs_access_rights
    }
    fn gs_access_rights(&self) -> u32 {
        self.gs_access_rights
    }
    fn ldtr_access_rights(&self) -> u32 {
        self.ldtr_access_rights
    }
    fn tr_access_rights(&self) -> u32 {
        self.tr_access_rights
    }

    fn es_base(&self) -> u64 {
        self.es_base
    }
    fn cs_base(&self) -> u64 {
        self.cs_base
    }
    fn ss_base(&self) -> u64 {
        self.ss_base
    }
    fn ds_base(&self) -> u64 {
        self.ds_base
    }
    fn ldtr_base(&self) -> u64 {
        self.ldtr_base
    }
    fn tr_base(&self) -> u64 {
        self.tr_base
    }

    fn cr0(&self) -> u64 {
        self.cr0
    }
    fn cr3(&self) -> u64 {
        self.cr3
    }
    fn cr4(&self) -> u64 {
        self.cr4
    }
    fn dr7(&self) -> u64 {
        self.dr7
    }
    fn rflags(&self) -> u64 {
        self.rflags
    }

    fn gdt_base(&self) -> u64 {
        self.gdt_base
    }
    fn gdt_limit(&self) -> u16 {
        self.gdt_limit
    }
    fn idt_base(&self) -> u64 {
        self.idt_base
    }
    fn idt_limit(&self) -> u16 {
        self.idt_limit
    }

    fn ia32_debugctl(&self) -> u64 {
        self.ia32_debugctl
    }
    fn ia32_pat(&self) -> u64 {
        self.ia32_pat
    }
    fn ia32_efer(&self) -> u64 {
        self.ia32_efer
    }
    fn ia32_perf_global_ctrl(&self) -> u64 {
        self.ia32_perf_global_ctrl
    }
    fn ia32_sysenter_cs(&self) -> u64 {
        self.ia32_sysenter_cs
    }
    fn ia32_sysenter_esp(&self) -> u64 {
        self.ia32_sysenter_esp
    }
    fn ia32_sysenter_eip(&self) -> u64 {
        self.ia32_sysenter_eip
    }
    fn ia32_fs_base(&self) -> u64 {
        self.ia32_fs_base
    }
    fn ia32_gs_base(&self) -> u64 {
        self.ia32_gs_base
    }
}
