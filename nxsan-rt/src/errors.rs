//! The runtime's failure taxonomy. Every variant carries its diagnostic text
//! (ending in the stable `(nxsan-…)` code) as its `Display` form; the ABI
//! layer converts these into framed abort reports.

use nxsan_shared::AccessMode;
use thiserror_no_std::Error;

/// Failures while bringing the runtime up. `DoubleInit` is not represented
/// here: a second `init` is rejected with a `false` return, not an abort.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    #[error("Tracked heap size cannot be zero (nxsan-bad-heap-size).")]
    BadHeapSize,
    #[error("Tracked heap cannot extend into the tag region (nxsan-heap-in-tag-region).")]
    HeapInTagRegion,
    #[error("Failed to map nxsan shadow memory of size {0} (nxsan-shadow-alloc-failed).")]
    ShadowAllocFailed(usize),
}

/// Fatal `__nxsan_malloc` failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    #[error("Attempted to allocate size 0 (nxsan-alloc-zero).")]
    ZeroSize,
    #[error(
        "Failed to allocate memory of size {size} (real allocate size {aligned_size}) \
         (nxsan-alloc-fail)."
    )]
    BackingFailed { size: usize, aligned_size: usize },
    #[error(
        "Allocation fell outside of tracked heap bounds: [{base:#x}, {tail:#x}) outside of \
         range [{heap_base:#x}, {heap_tail:#x}) (nxsan-alloc-oob)."
    )]
    OutOfHeap { base: usize, tail: usize, heap_base: usize, heap_tail: usize },
}

/// Fatal `__nxsan_free` failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeError {
    #[error(
        "Attempted to free pointer outside of heap bounds [{heap_base:#x}, {heap_tail:#x}) \
         (nxsan-oob-free)."
    )]
    OutOfHeap { heap_base: usize, heap_tail: usize },
    #[error("Attempted to free unaligned pointer (nxsan-unaligned-free).")]
    Unaligned,
    #[error("Attempted to free the tracked heap base or nxsan shadow memory (nxsan-shadow-free).")]
    ShadowRegion,
    #[error("Attempted to free memory with no tag (nxsan-notag-free).")]
    NoTag,
    #[error("Attempted to free memory with bad tag (nxsan-badtag-free).")]
    BadTag,
    #[error("Attempted to free unallocated memory (nxsan-double-free).")]
    DoubleFree,
    #[error("Attempted to free from the null page (nxsan-nullpage-free).")]
    NullPage,
    // The bounds and alignment ladder runs before the one-byte verify, so an
    // out-of-heap or overrun classification here means a broken invariant.
    #[error("Unreachable pointer classification during free (nxsan-unreachable-free).")]
    Unreachable,
}

/// Fatal access classifications, as reported by the hooks.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    #[error("Attempted {mode} of {bytes} bytes with a mismatched pointer tag (nxsan-tag-mismatch).")]
    TagMismatch { mode: AccessMode, bytes: usize },
    #[error("Attempted {mode} of {bytes} bytes on freed memory (nxsan-use-after-free).")]
    UseAfterFree { mode: AccessMode, bytes: usize },
    #[error("Attempted {mode} of {bytes} bytes outside of the tracked heap (nxsan-not-in-heap).")]
    NotInHeap { mode: AccessMode, bytes: usize },
    #[error(
        "Attempted {mode} of {bytes} bytes past the end of the allocation \
         (nxsan-heap-buffer-overflow)."
    )]
    Overrun { mode: AccessMode, bytes: usize },
    #[error(
        "Attempted {mode} of {bytes} bytes within the null page (nxsan-heap-buffer-overflow)."
    )]
    NullPage { mode: AccessMode, bytes: usize },
}

/// Operations rejected because the runtime has not been initialised.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoInitError {
    #[error("nxsan is not initialised, cannot allocate memory (nxsan-noinit-alloc).")]
    Alloc,
    #[error("nxsan is not initialised, but attempted to free memory (nxsan-noinit-free).")]
    Free,
}
