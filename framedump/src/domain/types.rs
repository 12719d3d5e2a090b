//! Domain types providing compile-time safety and self-documentation

use std::fmt;

/// Number of hex digits needed to print a pointer on this target
pub const POINTER_HEX_DIGITS: usize = 2 * std::mem::size_of::<usize>();

/// Captured instruction address
///
/// Frames are recorded as return addresses, so for every frame but the
/// innermost the address points just past the call instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FrameAddress(pub usize);

impl FrameAddress {
    pub const NULL: FrameAddress = FrameAddress(0);

    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn as_ptr(self) -> *const std::ffi::c_void {
        self.0 as *const std::ffi::c_void
    }
}

impl From<usize> for FrameAddress {
    fn from(addr: usize) -> Self {
        FrameAddress(addr)
    }
}

impl From<FrameAddress> for usize {
    fn from(addr: FrameAddress) -> Self {
        addr.0
    }
}

impl fmt::Display for FrameAddress {
    /// Zero-padded to the platform pointer width, e.g. `0x00005566deadbeef`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0width$x}", self.0, width = POINTER_HEX_DIGITS)
    }
}

impl fmt::LowerHex for FrameAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Raw symbol name as reported by a backend, plus its demangled form
///
/// Produced per address while formatting and dropped right after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemangleEntry {
    pub mangled: String,
    pub demangled: Option<String>,
}

impl DemangleEntry {
    /// Pair a raw linkage name with whatever the demangler makes of it
    #[must_use]
    pub fn new(mangled: &str) -> Self {
        Self { mangled: mangled.to_string(), demangled: crate::demangle::demangle(mangled) }
    }

    /// Entry for a name that is already readable (no demangling attempted)
    #[must_use]
    pub fn plain(name: &str) -> Self {
        Self { mangled: name.to_string(), demangled: None }
    }

    /// The demangled form when there is one, else the raw name
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.demangled.as_deref().unwrap_or(&self.mangled)
    }
}
