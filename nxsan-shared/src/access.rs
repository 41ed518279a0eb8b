use core::fmt;

/// Indicates whether an instrumented access reads or writes memory.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum AccessMode {
    Load,
    Store,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Load => write!(f, "load"),
            AccessMode::Store => write!(f, "store"),
        }
    }
}

/// The scalar widths the instrumentation pass reports on.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum AccessWidth {
    W8,
    W16,
    W32,
    W64,
}

impl AccessWidth {
    pub const ALL: [AccessWidth; 4] =
        [AccessWidth::W8, AccessWidth::W16, AccessWidth::W32, AccessWidth::W64];

    /// Width of the access in bits.
    pub fn bits(self) -> u32 {
        match self {
            AccessWidth::W8 => 8,
            AccessWidth::W16 => 16,
            AccessWidth::W32 => 32,
            AccessWidth::W64 => 64,
        }
    }

    /// Width of the access in bytes.
    pub fn bytes(self) -> usize {
        (self.bits() / 8) as usize
    }

    /// The width matching a type's store size in bits, if it is one the
    /// runtime has a hook for.
    pub fn from_store_bits(bits: u64) -> Option<AccessWidth> {
        match bits {
            8 => Some(AccessWidth::W8),
            16 => Some(AccessWidth::W16),
            32 => Some(AccessWidth::W32),
            64 => Some(AccessWidth::W64),
            _ => None,
        }
    }

    /// The ABI symbol of the report hook for this mode and width. These names
    /// are the contract between the instrumentation pass and the runtime and
    /// must match the `extern "C"` exports of `nxsan-rt`.
    pub fn hook_symbol(self, mode: AccessMode) -> &'static str {
        match (mode, self) {
            (AccessMode::Load, AccessWidth::W8) => "__nxsan_report_load8",
            (AccessMode::Load, AccessWidth::W16) => "__nxsan_report_load16",
            (AccessMode::Load, AccessWidth::W32) => "__nxsan_report_load32",
            (AccessMode::Load, AccessWidth::W64) => "__nxsan_report_load64",
            (AccessMode::Store, AccessWidth::W8) => "__nxsan_report_store8",
            (AccessMode::Store, AccessWidth::W16) => "__nxsan_report_store16",
            (AccessMode::Store, AccessWidth::W32) => "__nxsan_report_store32",
            (AccessMode::Store, AccessWidth::W64) => "__nxsan_report_store64",
        }
    }
}
