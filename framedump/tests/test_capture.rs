use framedump::{capture, CapturedTrace};
use std::hint::black_box;

/// Recurse `depth` times, then run `leaf` from the innermost frame
#[inline(never)]
fn nested<T>(depth: usize, leaf: &dyn Fn() -> T) -> T {
    let result = if depth == 0 { leaf() } else { nested(depth - 1, leaf) };
    black_box(&result);
    result
}

#[inline(never)]
fn capture_at_depth_leaf() -> CapturedTrace {
    let trace = capture(10, 0);
    black_box(&trace);
    trace
}

#[test]
fn test_size_never_exceeds_max_frames() {
    for max_frames in [1, 3, 10, 100] {
        for skip in [0, 1, 5, 50] {
            let trace = nested(6, &|| capture(max_frames, skip));
            assert!(
                trace.len() <= max_frames,
                "capture({max_frames}, {skip}) returned {} frames",
                trace.len()
            );
            assert_eq!(trace.capacity(), max_frames);
        }
    }
}

#[test]
fn test_zero_max_frames_is_coerced_to_one() {
    let trace = nested(3, &|| capture(0, 0));
    assert_eq!(trace.capacity(), 1);
    assert_eq!(trace.len(), 1);
}

#[test]
fn test_deep_stack_fills_trace() {
    let trace = nested(12, &capture_at_depth_leaf);
    assert_eq!(trace.len(), 10);
    assert!(trace.iter().all(|frame| !frame.is_null()));
}

#[test]
fn test_skip_beyond_depth_is_empty() {
    let trace = nested(5, &|| capture(1, 1000));
    assert_eq!(trace.len(), 0);
    assert!(trace.is_empty());
    assert_eq!(trace.capacity(), 1);
}

#[test]
fn test_skip_shifts_frames_toward_callers() {
    #[inline(never)]
    fn leaf() -> (CapturedTrace, CapturedTrace) {
        let unskipped = capture(5, 0);
        black_box(&unskipped);
        let skipped = capture(5, 1);
        black_box(&skipped);
        (unskipped, skipped)
    }

    let (unskipped, skipped) = nested(8, &leaf);
    assert_eq!(unskipped.len(), 5);
    assert_eq!(skipped.len(), 5);
    // Frame 0 differs (two call sites in `leaf`), everything above is shared
    assert_eq!(&unskipped.frames()[1..], &skipped.frames()[..4]);
}

#[test]
#[cfg(all(target_os = "linux", feature = "debuginfo"))]
fn test_frame_zero_is_immediate_caller() {
    let trace = nested(12, &capture_at_depth_leaf);
    let name = framedump::backend()
        .resolve(trace.frames()[0])
        .expect("frame 0 should resolve with debug info");
    assert!(name.contains("capture_at_depth_leaf"), "frame 0 resolved to {name}");

    // A call shim may sit between the leaf and `nested`
    let callers: Vec<String> =
        trace.frames()[1..4].iter().filter_map(|&frame| framedump::backend().resolve(frame)).collect();
    assert!(callers.iter().any(|name| name.contains("nested")), "callers were {callers:?}");
}

#[test]
fn test_capture_from_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| std::thread::spawn(move || nested(4 + i, &|| capture(8, 0)).len()))
        .collect();

    for handle in handles {
        let len = handle.join().expect("capture thread panicked");
        assert!((1..=8).contains(&len));
    }
}
