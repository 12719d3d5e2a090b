//! # Symbol Resolution
//!
//! Turns captured instruction addresses into function names. Exactly one
//! backend is compiled for each target and it is chosen by `cfg`, never at
//! runtime:
//!
//! | Target                              | Backend                    | Mechanism                          |
//! |-------------------------------------|----------------------------|------------------------------------|
//! | Linux with the `debuginfo` feature  | [`DebugInfoSymbolizer`]    | DWARF of the running executable    |
//! | other Unix                          | [`DynamicLoaderSymbolizer`]| `dladdr` + demangler               |
//! | Windows                             | [`DebugHelpSymbolizer`]    | DbgHelp `SymFromAddr`              |
//! | anything else                       | [`Unavailable`]            | resolves nothing                   |
//!
//! ## Failure is normal
//!
//! Stripped binaries, JIT code and opaque system modules have no names to
//! find. Every backend answers `None` for those, and the formatter prints a
//! placeholder. A backend that cannot initialize at all (no debug sections,
//! DbgHelp refusing to load) logs the reason once and behaves like
//! [`Unavailable`] for the rest of the process.
//!
//! ## Lifetime
//!
//! The active backend is built on first use by [`backend()`] and lives until
//! the process exits. It is never torn down; nothing owns it at shutdown.
//!
//! ## Example
//!
//! ```rust,ignore
//! let backend = framedump::symbolization::backend();
//! let name = backend.resolve(FrameAddress(main as usize));
//! // name == Some("my_app::main")
//! ```

use std::sync::OnceLock;

use log::{debug, warn};

use crate::domain::{DemangleEntry, FrameAddress};

#[cfg(all(target_os = "linux", feature = "debuginfo"))]
pub mod memory_maps;
#[cfg(all(target_os = "linux", feature = "debuginfo"))]
pub mod symbolizer;

#[cfg(all(unix, not(all(target_os = "linux", feature = "debuginfo"))))]
pub mod dladdr;

#[cfg(windows)]
pub mod dbghelp;

#[cfg(all(target_os = "linux", feature = "debuginfo"))]
pub use memory_maps::{parse_memory_maps, MappedImage, MemoryRange};
#[cfg(all(target_os = "linux", feature = "debuginfo"))]
pub use symbolizer::DebugInfoSymbolizer;
#[cfg(all(target_os = "linux", feature = "debuginfo"))]
use symbolizer as active;

#[cfg(all(unix, not(all(target_os = "linux", feature = "debuginfo"))))]
pub use dladdr::DynamicLoaderSymbolizer;
#[cfg(all(unix, not(all(target_os = "linux", feature = "debuginfo"))))]
use dladdr as active;

#[cfg(windows)]
pub use dbghelp::DebugHelpSymbolizer;
#[cfg(windows)]
use dbghelp as active;

#[cfg(not(any(unix, windows)))]
mod active {
    use super::Unavailable;
    use crate::domain::SymbolizationError;

    pub(crate) type Backend = Unavailable;

    #[allow(clippy::unnecessary_wraps)]
    pub(crate) fn initialize() -> Result<Backend, SymbolizationError> {
        Ok(Unavailable)
    }
}

/// Typical length of a demangled name, used to size bulk buffers
const AVERAGE_NAME_LEN: usize = 64;

/// Address to name resolution, implemented once per platform
pub trait SymbolBackend: Send + Sync {
    /// Short identifier of the strategy, for diagnostics
    fn name(&self) -> &'static str;

    /// Raw name of the symbol containing `address`, with its demangled form
    fn lookup(&self, address: FrameAddress) -> Option<DemangleEntry>;

    /// Append the display name for `address` to `out`
    ///
    /// Returns false, leaving `out` as it was, when nothing is known.
    fn resolve_into(&self, address: FrameAddress, out: &mut String) -> bool {
        match self.lookup(address) {
            Some(entry) => {
                out.push_str(entry.display_name());
                true
            }
            None => false,
        }
    }

    /// Display name for `address`: demangled when possible, raw otherwise
    fn resolve(&self, address: FrameAddress) -> Option<String> {
        let mut out = String::new();
        self.resolve_into(address, &mut out).then_some(out)
    }

    /// Resolve a whole trace into one shared buffer
    fn resolve_all(&self, addresses: &[FrameAddress]) -> ResolvedNames {
        let mut names = ResolvedNames::with_capacity(addresses.len());
        for &address in addresses {
            names.record(|out| self.resolve_into(address, out));
        }
        names
    }
}

/// Backend that knows no symbols
///
/// Stands in for a backend that failed to initialize, and is the only
/// backend on targets without any symbol facility.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl SymbolBackend for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn lookup(&self, _address: FrameAddress) -> Option<DemangleEntry> {
        None
    }

    fn resolve_into(&self, _address: FrameAddress, _out: &mut String) -> bool {
        false
    }

    fn resolve_all(&self, addresses: &[FrameAddress]) -> ResolvedNames {
        ResolvedNames { text: String::new(), spans: vec![None; addresses.len()] }
    }
}

/// Names for a batch of addresses, stored in a single text buffer
///
/// Index `i` corresponds to the `i`th address passed to
/// [`SymbolBackend::resolve_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedNames {
    text: String,
    spans: Vec<Option<(usize, usize)>>,
}

impl ResolvedNames {
    #[must_use]
    pub fn with_capacity(count: usize) -> Self {
        Self {
            text: String::with_capacity(count * AVERAGE_NAME_LEN),
            spans: Vec::with_capacity(count),
        }
    }

    /// Append the next entry; `resolve` writes the name and reports success
    pub fn record(&mut self, resolve: impl FnOnce(&mut String) -> bool) {
        let start = self.text.len();
        if resolve(&mut self.text) && self.text.len() > start {
            self.spans.push(Some((start, self.text.len())));
        } else {
            self.text.truncate(start);
            self.spans.push(None);
        }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        let (start, end) = (*self.spans.get(index)?)?;
        self.text.get(start..end)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> + '_ {
        (0..self.spans.len()).map(move |i| self.get(i))
    }
}

static BACKEND: OnceLock<Option<active::Backend>> = OnceLock::new();
static UNAVAILABLE: Unavailable = Unavailable;

/// The process-wide backend, initialized on first call
///
/// Returns [`Unavailable`] when initialization failed; that outcome is
/// permanent for the process.
pub fn backend() -> &'static dyn SymbolBackend {
    let state = BACKEND.get_or_init(|| match active::initialize() {
        Ok(backend) => {
            debug!("Symbol backend ready: {}", backend.name());
            Some(backend)
        }
        Err(e) => {
            warn!("Symbol resolution disabled for this process: {e}");
            None
        }
    });

    match state {
        Some(backend) => backend,
        None => &UNAVAILABLE,
    }
}

/// Name of the strategy compiled for this target
#[must_use]
pub fn backend_name() -> &'static str {
    backend().name()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl SymbolBackend for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn lookup(&self, address: FrameAddress) -> Option<DemangleEntry> {
            match address.0 {
                0x1000 => Some(DemangleEntry::new("_ZN4core3fmt5write17h0123456789abcdefE")),
                0x2000 => Some(DemangleEntry::plain("plain_c_function")),
                0x3000 => Some(DemangleEntry::plain("")),
                _ => None,
            }
        }
    }

    #[test]
    fn test_resolve_prefers_demangled_name() {
        assert_eq!(Fixed.resolve(FrameAddress(0x1000)).as_deref(), Some("core::fmt::write"));
        assert_eq!(Fixed.resolve(FrameAddress(0x2000)).as_deref(), Some("plain_c_function"));
        assert_eq!(Fixed.resolve(FrameAddress(0x9999)), None);
    }

    #[test]
    fn test_resolve_all_shares_one_buffer() {
        let addrs = [FrameAddress(0x1000), FrameAddress(0x9999), FrameAddress(0x2000)];
        let names = Fixed.resolve_all(&addrs);

        assert_eq!(names.len(), 3);
        assert_eq!(names.get(0), Some("core::fmt::write"));
        assert_eq!(names.get(1), None);
        assert_eq!(names.get(2), Some("plain_c_function"));
        assert_eq!(names.get(3), None);
        assert_eq!(names.text, "core::fmt::writeplain_c_function");
    }

    #[test]
    fn test_empty_names_count_as_unresolved() {
        let names = Fixed.resolve_all(&[FrameAddress(0x3000)]);
        assert_eq!(names.get(0), None);
    }

    #[test]
    fn test_unavailable_resolves_nothing() {
        let addrs = [FrameAddress(0x1000), FrameAddress(0x2000)];
        let names = Unavailable.resolve_all(&addrs);
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.is_none()));
        assert_eq!(Unavailable.resolve(FrameAddress(0x1000)), None);
    }

    #[test]
    fn test_backend_is_a_singleton() {
        let first = backend() as *const dyn SymbolBackend as *const ();
        let second = backend() as *const dyn SymbolBackend as *const ();
        assert_eq!(first, second);
        assert!(!backend_name().is_empty());
    }
}
