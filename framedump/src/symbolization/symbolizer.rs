//! Symbol resolution from the running executable's own debug info
//!
//! Reads the executable once, parses it with `object`, loads its DWARF
//! sections with `gimli` and builds an `addr2line` context. Each address is
//! looked up precisely in DWARF first, then in the ELF symbol table.
//!
//! Runtime addresses are translated to link-time addresses through the load
//! bias: the start of the file-offset-0 mapping minus the address of the
//! segment at file offset 0.
//!
//! ```text
//! runtime 0x55f3a2b4c780 - bias 0x55f3a2b4c000 = file address 0x780
//! ```

// Pointer-sized addresses are u64 on every Linux target this compiles for
#![allow(clippy::cast_possible_truncation)]

use addr2line::Context;
use gimli::{EndianSlice, RunTimeEndian};
use log::debug;
use object::{Object, ObjectSection, ObjectSegment, SymbolMap, SymbolMapName};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, TryLockError};

use super::memory_maps::{current_process_image, MappedImage};
use super::{ResolvedNames, SymbolBackend};
use crate::demangle::demangle_into;
use crate::domain::{DemangleEntry, FrameAddress, SymbolizationError};

const SELF_EXE: &str = "/proc/self/exe";

type Reader = EndianSlice<'static, RunTimeEndian>;

pub(crate) type Backend = DebugInfoSymbolizer;

pub(crate) fn initialize() -> Result<Backend, SymbolizationError> {
    DebugInfoSymbolizer::for_current_exe()
}

/// DWARF-backed symbolizer for the executable of this process
///
/// The executable image and everything parsed from it live for the rest of
/// the process. The DWARF context parses lazily, so lookups through it take
/// a lock; when that lock is busy (another thread dumping, or a fault
/// handler interrupting a dump) the symbol table answers instead.
pub struct DebugInfoSymbolizer {
    ctx: Mutex<Context<Reader>>,
    symbols: SymbolMap<SymbolMapName<'static>>,
    image: MappedImage,
    bias: u64,
}

impl DebugInfoSymbolizer {
    /// Load debug info for `std::env::current_exe()`
    ///
    /// # Errors
    /// Returns an error if the executable cannot be found, read, parsed or
    /// located in this process's memory map
    pub fn for_current_exe() -> Result<Self, SymbolizationError> {
        let exe = std::env::current_exe().map_err(SymbolizationError::ExecutableNotFound)?;
        let path = exe.to_string_lossy().into_owned();
        let image = current_process_image(&path)?;
        // Still readable after the file on disk is replaced or removed
        Self::new(SELF_EXE, image)
    }

    /// Load debug info from `binary_path`, loaded in this process as `image`
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed, or if
    /// its DWARF sections are malformed
    pub fn new<P: AsRef<Path>>(binary_path: P, image: MappedImage) -> Result<Self, SymbolizationError> {
        let path = binary_path.as_ref().display().to_string();
        let binary_data = fs::read(binary_path.as_ref())
            .map_err(|source| SymbolizationError::ReadFailed { path: path.clone(), source })?;

        // Lives as long as the process, like the backend itself
        let binary_data: &'static [u8] = Box::leak(binary_data.into_boxed_slice());

        let obj_file = object::File::parse(binary_data).map_err(|e| {
            SymbolizationError::ParseFailed { path: path.clone(), reason: e.to_string() }
        })?;

        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section = |id: gimli::SectionId| -> Result<Reader, gimli::Error> {
            let data: &'static [u8] = match obj_file
                .section_by_name(id.name())
                .and_then(|section| section.uncompressed_data().ok())
            {
                Some(Cow::Borrowed(data)) => data,
                Some(Cow::Owned(data)) => Box::leak(data.into_boxed_slice()),
                None => &[],
            };
            Ok(EndianSlice::new(data, endian))
        };

        let dwarf = gimli::Dwarf::load(&load_section)
            .map_err(|e| SymbolizationError::DwarfLoadFailed(e.to_string()))?;
        let ctx =
            Context::from_dwarf(dwarf).map_err(|e| SymbolizationError::DwarfLoadFailed(e.to_string()))?;

        let symbols = obj_file.symbol_map();
        let bias = load_bias(&obj_file, image.base);

        debug!(
            "Loaded debug info for {path}: {} symbols, load bias 0x{bias:x}",
            symbols.symbols().len()
        );

        Ok(Self { ctx: Mutex::new(ctx), symbols, image, bias })
    }

    /// Translate a runtime address into the binary's link-time address space
    fn file_address(&self, address: FrameAddress) -> Option<u64> {
        let runtime = address.0 as u64;
        if !self.image.range.contains(runtime) {
            return None;
        }
        runtime.checked_sub(self.bias)
    }

    /// Try the DWARF context without blocking
    fn try_context(&self) -> Option<MutexGuard<'_, Context<Reader>>> {
        match self.ctx.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    /// Linkage name of the outermost function at `probe`, from DWARF
    fn precise_name(ctx: &Context<Reader>, probe: u64) -> Option<Cow<'static, str>> {
        let mut name: Option<Reader> = None;

        if let Ok(mut frame_iter) = ctx.find_frames(probe).skip_all_loads() {
            // Frames come innermost-inline first; the last one is the
            // function the instruction physically belongs to.
            while let Ok(Some(frame)) = frame_iter.next() {
                if let Some(function) = frame.function {
                    name = Some(function.name);
                }
            }
        }

        name.map(|n| n.to_string_lossy()).filter(|n| !n.is_empty())
    }

    /// Nearest preceding ELF symbol; coarser, but needs no DWARF
    fn table_name(&self, probe: u64) -> Option<&'static str> {
        self.symbols.get(probe).map(SymbolMapName::name).filter(|n| !n.is_empty())
    }

    fn raw_name(&self, ctx: Option<&Context<Reader>>, address: FrameAddress) -> Option<Cow<'static, str>> {
        let probe = self.file_address(address)?;
        ctx.and_then(|ctx| Self::precise_name(ctx, probe))
            .or_else(|| self.table_name(probe).map(Cow::Borrowed))
    }

    fn write_name(&self, ctx: Option<&Context<Reader>>, address: FrameAddress, out: &mut String) -> bool {
        let Some(raw) = self.raw_name(ctx, address) else {
            return false;
        };
        if !demangle_into(&raw, out) {
            out.push_str(&raw);
        }
        true
    }
}

impl SymbolBackend for DebugInfoSymbolizer {
    fn name(&self) -> &'static str {
        "debuginfo"
    }

    fn lookup(&self, address: FrameAddress) -> Option<DemangleEntry> {
        let ctx = self.try_context();
        self.raw_name(ctx.as_deref(), address).map(|raw| DemangleEntry::new(&raw))
    }

    fn resolve_into(&self, address: FrameAddress, out: &mut String) -> bool {
        let ctx = self.try_context();
        self.write_name(ctx.as_deref(), address, out)
    }

    fn resolve_all(&self, addresses: &[FrameAddress]) -> ResolvedNames {
        let ctx = self.try_context();
        let mut names = ResolvedNames::with_capacity(addresses.len());
        for &address in addresses {
            names.record(|out| self.write_name(ctx.as_deref(), address, out));
        }
        names
    }
}

/// Difference between runtime and link-time addresses
///
/// `mapped_base` is where file offset 0 landed; the segment containing file
/// offset 0 says where it was linked. Non-PIE executables get a bias of 0.
fn load_bias(obj_file: &object::File<'_>, mapped_base: u64) -> u64 {
    const PAGE_MASK: u64 = !0xfff;

    let linked_base = obj_file
        .segments()
        .find(|segment| segment.file_range().0 == 0)
        .map(|segment| segment.address())
        .or_else(|| obj_file.segments().map(|segment| segment.address()).min())
        .unwrap_or(0);

    mapped_base.saturating_sub(linked_base & PAGE_MASK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::memory_maps::MemoryRange;
    use std::io::Write;

    #[inline(never)]
    fn marker_function_for_lookup() -> usize {
        std::hint::black_box(42)
    }

    fn symbolizer() -> &'static DebugInfoSymbolizer {
        static SYMBOLIZER: std::sync::OnceLock<DebugInfoSymbolizer> = std::sync::OnceLock::new();
        SYMBOLIZER
            .get_or_init(|| DebugInfoSymbolizer::for_current_exe().expect("Failed to create symbolizer"))
    }

    #[test]
    fn test_symbolizer_creation() {
        let symbolizer = symbolizer();
        assert!(symbolizer.image.range.start < symbolizer.image.range.end);
        assert_eq!(symbolizer.name(), "debuginfo");
    }

    #[test]
    fn test_resolves_function_address() {
        let symbolizer = symbolizer();
        std::hint::black_box(marker_function_for_lookup());

        let addr = FrameAddress(marker_function_for_lookup as usize);
        let name = symbolizer.resolve(addr).expect("Failed to resolve marker function");
        assert!(name.contains("marker_function_for_lookup"), "resolved to {name}");
    }

    #[test]
    fn test_lookup_keeps_raw_linkage_name() {
        let symbolizer = symbolizer();
        let addr = FrameAddress(marker_function_for_lookup as usize);
        let entry = symbolizer.lookup(addr).expect("Failed to look up marker function");

        assert!(entry.display_name().contains("marker_function_for_lookup"));
        assert!(entry.mangled.contains("marker_function_for_lookup"));
    }

    #[test]
    fn test_symbol_table_fallback_without_context() {
        let symbolizer = symbolizer();
        let addr = FrameAddress(marker_function_for_lookup as usize);

        let mut out = String::new();
        assert!(symbolizer.write_name(None, addr, &mut out));
        assert!(out.contains("marker_function_for_lookup"), "resolved to {out}");
    }

    fn empty_image() -> MappedImage {
        MappedImage { range: MemoryRange { start: 0, end: 0 }, base: 0 }
    }

    #[test]
    fn test_missing_binary_fails_to_read() {
        let result = DebugInfoSymbolizer::new("/nonexistent/framedump-binary", empty_image());
        match result {
            Err(SymbolizationError::ReadFailed { path, source }) => {
                assert_eq!(path, "/nonexistent/framedump-binary");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("missing binary should not load"),
        }
    }

    #[test]
    fn test_non_object_file_fails_to_parse() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(b"this is not an object file").expect("Failed to write temp file");

        match DebugInfoSymbolizer::new(file.path(), empty_image()) {
            Err(SymbolizationError::ParseFailed { path, reason }) => {
                assert_eq!(path, file.path().display().to_string());
                assert!(!reason.is_empty());
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("text file should not parse"),
        }
    }

    #[test]
    fn test_address_outside_executable() {
        let symbolizer = symbolizer();
        assert_eq!(symbolizer.resolve(FrameAddress(0x10)), None);
        assert_eq!(symbolizer.lookup(FrameAddress(usize::MAX)), None);
    }

    #[test]
    fn test_resolve_all_matches_single_lookups() {
        let symbolizer = symbolizer();
        let addrs = [
            FrameAddress(marker_function_for_lookup as usize),
            FrameAddress(0x10),
            FrameAddress(test_resolve_all_matches_single_lookups as usize),
        ];

        let names = symbolizer.resolve_all(&addrs);
        assert_eq!(names.len(), 3);
        for (i, addr) in addrs.iter().enumerate() {
            assert_eq!(names.get(i).map(str::to_string), symbolizer.resolve(*addr));
        }
        assert_eq!(names.get(1), None);
    }
}
