//! Framed error reports and best-effort backtraces.
//!
//! Reports go straight to the diagnostic stream; the runtime carries no
//! allocator, so nothing here builds a string.

use core::fmt;

#[cfg(not(test))]
use libc_print::std_name::*;
use nxsan_shared::strip_tag;

use crate::hooks::Abort;

const ERR_HEADER: &str = "=================================================";
const ERR_FOOTER: &str = "=== ABORTING ===";
const BT_MAX_DEPTH: usize = 64;
const BT_UNAVAILABLE: &str = "NOTE: NxSanitizer cannot provide additional information.";

/// Prints a framed report for a bad access through `tagged` and aborts. The
/// tag is stripped for display.
pub fn abort_with_access_err(abort: Abort, tagged: usize, msg: fmt::Arguments<'_>) -> ! {
    eprintln!();
    eprintln!("{ERR_HEADER}");
    eprintln!("ERROR: NxSanitizer({:#x}): {}", strip_tag(tagged), msg);
    emit_backtrace();
    eprintln!("{ERR_FOOTER}");
    unsafe { (abort)() }
}

/// Prints a framed report for a generic runtime error and aborts.
pub fn abort_with_err(abort: Abort, msg: fmt::Arguments<'_>) -> ! {
    eprintln!();
    eprintln!("{ERR_HEADER}");
    eprintln!("ERROR: NxSanitizer: {}", msg);
    emit_backtrace();
    eprintln!("{ERR_FOOTER}");
    unsafe { (abort)() }
}

cfg_if::cfg_if! {
    if #[cfg(all(target_os = "linux", target_env = "gnu"))] {
        /// Writes a numbered backtrace of the current stack via the execinfo
        /// family. Best effort: any failure degrades to a note.
        fn emit_backtrace() {
            use core::ffi::{CStr, c_int, c_void};

            let mut frames = [core::ptr::null_mut::<c_void>(); BT_MAX_DEPTH];
            let depth = unsafe { libc::backtrace(frames.as_mut_ptr(), BT_MAX_DEPTH as c_int) };
            if depth <= 0 {
                eprintln!("{BT_UNAVAILABLE}");
                return;
            }
            let symbols = unsafe { libc::backtrace_symbols(frames.as_ptr(), depth) };
            if symbols.is_null() {
                eprintln!("{BT_UNAVAILABLE}");
                return;
            }
            for i in 0..depth as usize {
                let symbol = unsafe { *symbols.add(i) };
                if symbol.is_null() {
                    eprintln!("   #{i} (missing symbol)");
                    continue;
                }
                match unsafe { CStr::from_ptr(symbol) }.to_str() {
                    Ok(name) => eprintln!("   #{i} {name}"),
                    Err(_) => eprintln!("   #{i} (missing symbol)"),
                }
            }
            unsafe { libc::free(symbols.cast::<c_void>()) };
        }
    } else {
        fn emit_backtrace() {
            eprintln!("{BT_UNAVAILABLE}");
        }
    }
}
