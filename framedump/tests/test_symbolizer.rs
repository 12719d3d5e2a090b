use framedump::demangle::demangle;
use framedump::symbolization::{backend, backend_name};
use framedump::FrameAddress;

#[inline(never)]
fn symbolized_marker() -> u64 {
    std::hint::black_box(3)
}

#[test]
fn test_backend_matches_target() {
    let name = backend_name();
    println!("Active symbol backend: {name}");

    if cfg!(all(target_os = "linux", feature = "debuginfo")) {
        assert_eq!(name, "debuginfo");
    } else if cfg!(unix) {
        assert_eq!(name, "dladdr");
    } else if cfg!(windows) {
        assert_eq!(name, "dbghelp");
    }
}

#[test]
#[cfg(all(target_os = "linux", feature = "debuginfo"))]
fn test_symbolizer_resolves_function_names() {
    std::hint::black_box(symbolized_marker());
    let addr = FrameAddress(symbolized_marker as usize);

    let name = backend().resolve(addr).expect("marker should resolve with debug info");
    println!("0x{addr:x} -> {name}");
    assert!(name.contains("symbolized_marker"));

    let entry = backend().lookup(addr).expect("marker should have a raw name");
    assert_eq!(entry.display_name(), name);
}

#[test]
fn test_unmapped_addresses_do_not_resolve() {
    for addr in [0x10, 0x1000, usize::MAX - 0x10] {
        assert_eq!(backend().resolve(FrameAddress(addr)), None, "0x{addr:x} resolved");
    }
}

#[test]
fn test_resolve_all_keeps_positions() {
    let addrs = [FrameAddress(0x10), FrameAddress(symbolized_marker as usize), FrameAddress(0x20)];
    let names = backend().resolve_all(&addrs);

    assert_eq!(names.len(), addrs.len());
    assert_eq!(names.get(0), None);
    assert_eq!(names.get(2), None);
}

#[test]
fn test_demangled_names_contain_identifier() {
    let rust = demangle("_ZN9framedump7capture7capture17h0123456789abcdefE")
        .expect("Rust symbol should demangle");
    assert_eq!(rust, "framedump::capture::capture");

    let cpp = demangle("_ZN3WTF10StackTrace17captureStackTraceEii").expect("C++ symbol should demangle");
    assert!(cpp.contains("captureStackTrace"), "got {cpp}");
}

#[test]
fn test_plain_text_is_not_demangled() {
    assert_eq!(demangle("captureStackTrace"), None);
    assert_eq!(demangle("???"), None);
}
