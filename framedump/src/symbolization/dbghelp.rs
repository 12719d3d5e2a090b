//! Symbol resolution through the Windows debug helper library
//!
//! DbgHelp keeps its own per-process symbol database and undecorates names
//! itself (`SYMOPT_UNDNAME`), so the demangler is not consulted here. The
//! library is single-threaded; every call goes through one lock.

#![allow(unsafe_code)] // DbgHelp is a C API

use log::debug;
use std::mem::offset_of;
use std::sync::{Mutex, PoisonError};

use windows::core::PCSTR;
use windows::Win32::System::Diagnostics::Debug::{
    SymFromAddr, SymGetOptions, SymInitialize, SymSetOptions, MAX_SYM_NAME, SYMBOL_INFO,
    SYMOPT_DEFERRED_LOADS, SYMOPT_UNDNAME,
};
use windows::Win32::System::Threading::GetCurrentProcess;

use super::SymbolBackend;
use crate::domain::{DemangleEntry, FrameAddress, SymbolizationError};

pub(crate) type Backend = DebugHelpSymbolizer;

pub(crate) fn initialize() -> Result<Backend, SymbolizationError> {
    DebugHelpSymbolizer::new()
}

/// `SYMBOL_INFO` followed by room for the longest name DbgHelp returns
#[repr(C)]
struct SymbolBuffer {
    info: SYMBOL_INFO,
    _name: [u8; MAX_SYM_NAME as usize],
}

/// DbgHelp backend for the current process
pub struct DebugHelpSymbolizer {
    lock: Mutex<()>,
}

impl DebugHelpSymbolizer {
    /// Load the symbol database for this process
    ///
    /// # Errors
    /// Returns an error if `SymInitialize` fails
    pub fn new() -> Result<Self, SymbolizationError> {
        unsafe {
            SymSetOptions(SymGetOptions() | SYMOPT_UNDNAME | SYMOPT_DEFERRED_LOADS);
            SymInitialize(GetCurrentProcess(), PCSTR::null(), true)
                .map_err(|e| SymbolizationError::DebugHelperUnavailable(e.to_string()))?;
        }
        debug!("DbgHelp symbol database initialized");
        Ok(Self { lock: Mutex::new(()) })
    }

    /// Run `f` on the undecorated name DbgHelp has for `address`
    fn with_symbol_name<T>(&self, address: FrameAddress, f: impl FnOnce(&str) -> T) -> Option<T> {
        if address.is_null() {
            return None;
        }

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Lives on the stack so resolution works without the heap
        let mut buffer: SymbolBuffer = unsafe { std::mem::zeroed() };
        buffer.info.SizeOfStruct = u32::try_from(std::mem::size_of::<SYMBOL_INFO>()).ok()?;
        buffer.info.MaxNameLen = MAX_SYM_NAME;

        let found = unsafe {
            SymFromAddr(GetCurrentProcess(), address.0 as u64, None, (&raw mut buffer).cast::<SYMBOL_INFO>())
        };
        if found.is_err() {
            return None;
        }

        let len = buffer.info.NameLen.min(MAX_SYM_NAME) as usize;
        let bytes = unsafe {
            let base = (&raw const buffer).cast::<u8>();
            std::slice::from_raw_parts(base.add(offset_of!(SYMBOL_INFO, Name)), len)
        };
        let name = String::from_utf8_lossy(bytes);
        if name.is_empty() {
            return None;
        }
        Some(f(&name))
    }
}

impl SymbolBackend for DebugHelpSymbolizer {
    fn name(&self) -> &'static str {
        "dbghelp"
    }

    fn lookup(&self, address: FrameAddress) -> Option<DemangleEntry> {
        self.with_symbol_name(address, DemangleEntry::plain)
    }

    fn resolve_into(&self, address: FrameAddress, out: &mut String) -> bool {
        self.with_symbol_name(address, |name| out.push_str(name)).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn marker_function_for_lookup() -> usize {
        std::hint::black_box(7)
    }

    // SymInitialize may only run once per process, so share the singleton
    fn symbolizer() -> &'static dyn SymbolBackend {
        let backend = crate::symbolization::backend();
        assert_eq!(backend.name(), "dbghelp");
        backend
    }

    #[test]
    fn test_resolves_own_function() {
        let name = symbolizer()
            .resolve(FrameAddress(marker_function_for_lookup as usize))
            .expect("Failed to resolve marker function");
        assert!(name.contains("marker_function_for_lookup"), "resolved to {name}");
    }

    #[test]
    fn test_unmapped_address_is_unresolved() {
        assert_eq!(symbolizer().resolve(FrameAddress(0x10)), None);
    }
}
