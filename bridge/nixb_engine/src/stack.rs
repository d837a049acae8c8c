//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested expressions (long `++` chains, long lists of nested
//! attribute sets, deep recursion through `foldl'`) would otherwise overflow
//! the native stack. On wasm the closure simply runs.

/// Grow when less than this remains.
#[cfg(not(target_arch = "wasm32"))]
const RED_ZONE: usize = 100 * 1024;

/// Size of each new stack segment.
#[cfg(not(target_arch = "wasm32"))]
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[cfg(not(target_arch = "wasm32"))]
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(target_arch = "wasm32")]
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
