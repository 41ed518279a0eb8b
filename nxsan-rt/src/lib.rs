//! The nxsan runtime: HWASAN-style heap sanitisation over a contiguous
//! tracked region.
//!
//! The allocator places a random tag in the top bits of every pointer it
//! returns and mirrors it in a byte-per-granule shadow table; the report
//! hooks, called from instrumented code before every scalar load and store,
//! classify the access against that table and abort the process on a
//! violation.
//!
//! The runtime is single-threaded and non-reentrant: the embedder must call
//! `__nxsan_init` before any other entry point, must not call the runtime
//! from another thread, and must not re-enter it from a hook.

#![cfg_attr(not(test), no_std)]

mod alloc;
mod diagnostics;
mod errors;
mod global;
mod hooks;
mod shadow;
mod tag;
mod verify;

#[cfg(test)]
mod test_utils;

use core::ffi::c_void;

use nxsan_shared::{AccessMode, AccessWidth};

pub use crate::errors::{AccessError, AllocError, FreeError, InitError, NoInitError};
pub use crate::global::{Runtime, init_runtime, terminate_runtime, try_runtime};
pub use crate::hooks::{
    Abort, AlignedAlloc, DEFAULT_HOOKS, Free, MMap, MUnmap, NxsanAllocHooks, NxsanHooks,
};
pub use crate::shadow::ShadowStore;
pub use crate::tag::{SMALL_TAG_THRESHOLD, TagGenerator};
pub use crate::verify::AccessOutcome;

/// Initialises the runtime over the tracked heap `[base, base + size)` using
/// the libc-backed default hooks. Returns `true` on success and `false` when
/// already initialised; aborts on an invalid heap shape.
#[unsafe(no_mangle)]
pub extern "C" fn __nxsan_init(base: *mut c_void, size: usize) -> bool {
    unsafe { init_runtime(DEFAULT_HOOKS, base.addr(), size) }
}

/// Tears the runtime down, releasing the shadow table. Returns `true` on
/// success and `false` when not initialised.
#[unsafe(no_mangle)]
pub extern "C" fn __nxsan_terminate() -> bool {
    unsafe { terminate_runtime() }
}

/// Allocates `size` bytes of tracked storage, granule-aligned, and returns
/// the tagged pointer. Aborts on misuse or allocation failure.
#[unsafe(no_mangle)]
pub extern "C" fn __nxsan_malloc(size: usize) -> *mut c_void {
    let Some(runtime) = (unsafe { try_runtime() }) else {
        diagnostics::abort_with_err(
            hooks::DEFAULT_HOOKS.abort,
            format_args!("{}", NoInitError::Alloc),
        );
    };
    match runtime.malloc(size) {
        Ok(tagged) => tagged as *mut c_void,
        Err(err) => diagnostics::abort_with_err(runtime.hooks().abort, format_args!("{err}")),
    }
}

/// Releases storage previously returned by `__nxsan_malloc`. Aborts on
/// misuse.
#[unsafe(no_mangle)]
pub extern "C" fn __nxsan_free(ptr: *mut c_void) {
    let Some(runtime) = (unsafe { try_runtime() }) else {
        diagnostics::abort_with_access_err(
            hooks::DEFAULT_HOOKS.abort,
            ptr.addr(),
            format_args!("{}", NoInitError::Free),
        );
    };
    if let Err(err) = runtime.free(ptr.addr()) {
        diagnostics::abort_with_access_err(
            runtime.hooks().abort,
            ptr.addr(),
            format_args!("{err}"),
        );
    }
}

#[inline(always)]
fn report_access(ptr: *mut c_void, mode: AccessMode, width: AccessWidth) {
    // Pre-init accesses are unobservable.
    let Some(runtime) = (unsafe { try_runtime() }) else { return };
    let bytes = width.bytes();
    let err = match runtime.verify(ptr.addr(), bytes) {
        AccessOutcome::Ok | AccessOutcome::NoTag => return,
        AccessOutcome::BadTag => AccessError::TagMismatch { mode, bytes },
        AccessOutcome::Freed => AccessError::UseAfterFree { mode, bytes },
        AccessOutcome::OutOfHeap => AccessError::NotInHeap { mode, bytes },
        AccessOutcome::Overrun => AccessError::Overrun { mode, bytes },
        AccessOutcome::NullPage => AccessError::NullPage { mode, bytes },
    };
    diagnostics::abort_with_access_err(runtime.hooks().abort, ptr.addr(), format_args!("{err}"));
}

// Instrumented code calls the eight report hooks by symbol name; they must
// stay flat `extern "C"` exports with no indirection in front of them.
macro_rules! report_hook {
    ($symbol:ident, $mode:ident, $width:ident) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn $symbol(ptr: *mut c_void) {
            report_access(ptr, AccessMode::$mode, AccessWidth::$width);
        }
    };
}

report_hook!(__nxsan_report_load8, Load, W8);
report_hook!(__nxsan_report_load16, Load, W16);
report_hook!(__nxsan_report_load32, Load, W32);
report_hook!(__nxsan_report_load64, Load, W64);
report_hook!(__nxsan_report_store8, Store, W8);
report_hook!(__nxsan_report_store16, Store, W16);
report_hook!(__nxsan_report_store32, Store, W32);
report_hook!(__nxsan_report_store64, Store, W64);

#[cfg(not(test))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo<'_>) -> ! {
    // A panic in the runtime is an internal bug; die the same way a report
    // does so a debugger can catch it.
    unsafe { libc::abort() }
}
