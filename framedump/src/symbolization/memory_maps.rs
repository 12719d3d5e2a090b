//! Memory mapping utilities for the current process
//!
//! Parses `/proc/self/maps` to find where the running executable is loaded,
//! which is needed to translate runtime addresses of a position-independent
//! executable (PIE) back to the addresses recorded in its debug info.

use log::debug;
use std::fs;

use crate::domain::SymbolizationError;

/// Half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }
}

/// Where a binary is mapped in this process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedImage {
    /// Span from the lowest mapping start to the highest mapping end
    pub range: MemoryRange,
    /// Start of the mapping that begins at file offset 0
    pub base: u64,
}

/// Find all mappings of `binary_path` in a maps listing
///
/// Lines look like `start-end perms offset dev inode pathname`. Mappings of
/// a replaced executable carry a ` (deleted)` suffix, which is ignored.
#[must_use]
pub fn parse_memory_maps(maps: &str, binary_path: &str) -> Option<MappedImage> {
    let binary_path = strip_deleted(binary_path);
    let mut range: Option<MemoryRange> = None;
    let mut base = None;

    for line in maps.lines() {
        let mut fields = line.splitn(6, ' ');
        let (Some(span), Some(_perms), Some(offset), Some(_dev), Some(_inode), Some(path)) = (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) else {
            continue;
        };

        if strip_deleted(path.trim()) != binary_path {
            continue;
        }

        let Some((start, end)) = span.split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end), Ok(offset)) = (
            u64::from_str_radix(start, 16),
            u64::from_str_radix(end, 16),
            u64::from_str_radix(offset, 16),
        ) else {
            continue;
        };

        // Track the minimum start and maximum end
        range = Some(match range {
            Some(r) => MemoryRange { start: r.start.min(start), end: r.end.max(end) },
            None => MemoryRange { start, end },
        });
        if offset == 0 {
            base = Some(base.map_or(start, |b: u64| b.min(start)));
        }
    }

    let range = range?;
    Some(MappedImage { range, base: base.unwrap_or(range.start) })
}

/// Path of a mapped file without the marker left by replacing it on disk
fn strip_deleted(path: &str) -> &str {
    path.strip_suffix(" (deleted)").unwrap_or(path)
}

/// Locate `binary_path` in this process's `/proc/self/maps`
///
/// # Errors
/// Returns an error if the maps file cannot be read or the binary is not mapped
pub fn current_process_image(binary_path: &str) -> Result<MappedImage, SymbolizationError> {
    let maps =
        fs::read_to_string("/proc/self/maps").map_err(SymbolizationError::MemoryMapsUnavailable)?;

    let image = parse_memory_maps(&maps, binary_path)
        .ok_or_else(|| SymbolizationError::ExecutableNotMapped(binary_path.to_string()))?;

    debug!(
        "Executable memory range: 0x{:x} - 0x{:x} (size: {} KB), base 0x{:x}",
        image.range.start,
        image.range.end,
        (image.range.end - image.range.start) / 1024,
        image.base
    );
    Ok(image)
}
