//! Best-effort translation of linkage names into readable names
//!
//! Recognizes Rust symbols (legacy `_ZN...17h<hash>E` and v0 `_R...`) and
//! Itanium C++ symbols. Anything else is not an encoded name and yields
//! `None`; callers then display the raw text unchanged.

use std::fmt::Write as _;

/// Demangle `name`, or `None` when it is not a recognizable linkage name
#[must_use]
pub fn demangle(name: &str) -> Option<String> {
    let mut out = String::new();
    if demangle_into(name, &mut out) {
        Some(out)
    } else {
        None
    }
}

/// Append the demangled form of `name` to `out`
///
/// Returns false, leaving `out` untouched, when `name` is not an encoded
/// linkage name.
pub fn demangle_into(name: &str, out: &mut String) -> bool {
    if let Ok(symbol) = rustc_demangle::try_demangle(name) {
        // {:#} drops the trailing hash
        let start = out.len();
        if write!(out, "{symbol:#}").is_ok() {
            return true;
        }
        out.truncate(start);
    }

    if name.starts_with("_Z") || name.starts_with("__Z") {
        let options = cpp_demangle::DemangleOptions::default().no_return_type();
        if let Ok(symbol) = cpp_demangle::Symbol::new(name) {
            if let Ok(demangled) = symbol.demangle_with_options(&options) {
                out.push_str(&demangled);
                return true;
            }
        }
    }

    false
}
