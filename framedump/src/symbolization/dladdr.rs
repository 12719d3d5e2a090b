//! Symbol resolution through the dynamic loader
//!
//! `dladdr` reports the nearest exported symbol at or below an address,
//! along with the module that contains it. Only symbols visible to the
//! loader are found, so static functions of a stripped executable show up as
//! unresolved.

#![allow(unsafe_code)] // dladdr() requires unsafe

use log::trace;
use std::ffi::CStr;
use std::mem::MaybeUninit;

use super::SymbolBackend;
use crate::demangle::demangle_into;
use crate::domain::{DemangleEntry, FrameAddress, SymbolizationError};

pub(crate) type Backend = DynamicLoaderSymbolizer;

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn initialize() -> Result<Backend, SymbolizationError> {
    Ok(DynamicLoaderSymbolizer)
}

/// Stateless `dladdr` backend; the loader keeps all the state
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicLoaderSymbolizer;

impl DynamicLoaderSymbolizer {
    /// Run `f` on the raw symbol name for `address`, if the loader has one
    ///
    /// The name is borrowed from the loader and only valid while the module
    /// stays loaded, so it never escapes `f`.
    fn with_symbol_name<T>(address: FrameAddress, f: impl FnOnce(&str) -> T) -> Option<T> {
        if address.is_null() {
            return None;
        }

        let mut info = MaybeUninit::<libc::Dl_info>::zeroed();
        let ok = unsafe { libc::dladdr(address.as_ptr(), info.as_mut_ptr()) };
        if ok == 0 {
            return None;
        }

        let info = unsafe { info.assume_init() };
        if info.dli_sname.is_null() {
            return None;
        }

        if log::log_enabled!(log::Level::Trace) && !info.dli_fname.is_null() {
            let module = unsafe { CStr::from_ptr(info.dli_fname) };
            trace!("0x{:x} is in {}", address.0, module.to_string_lossy());
        }

        let name = unsafe { CStr::from_ptr(info.dli_sname) }.to_string_lossy();
        if name.is_empty() {
            return None;
        }
        Some(f(&name))
    }
}

impl SymbolBackend for DynamicLoaderSymbolizer {
    fn name(&self) -> &'static str {
        "dladdr"
    }

    fn lookup(&self, address: FrameAddress) -> Option<DemangleEntry> {
        Self::with_symbol_name(address, DemangleEntry::new)
    }

    fn resolve_into(&self, address: FrameAddress, out: &mut String) -> bool {
        Self::with_symbol_name(address, |name| {
            if !demangle_into(name, out) {
                out.push_str(name);
            }
        })
        .is_some()
    }
}
