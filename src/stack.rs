//! Native stack headroom for recursive evaluation.
//!
//! Every Lox call nests several Rust frames, so a script recursing up to the
//! configured call depth can exhaust a default 2 MiB thread stack long before
//! the depth limit is reached.  Growing the stack on demand keeps the limit
//! the only thing that stops deep recursion.

/// Space that must remain before `f` runs without growing the stack.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if less than
/// [`RED_ZONE`] bytes remain.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
