use core::cell::UnsafeCell;

use crate::errors::InitError;
use crate::hooks::NxsanHooks;
use crate::shadow::ShadowStore;
use crate::tag::TagGenerator;

/// Process-wide sanitizer state: the platform hooks, the shadow table over
/// the tracked heap, and the tag stream. There are no per-allocation
/// descriptors; everything the allocator and verifier need is reconstructed
/// from `(pointer, shadow)`.
#[derive(Debug)]
pub struct Runtime {
    pub(crate) hooks: NxsanHooks,
    pub(crate) shadow: ShadowStore,
    pub(crate) tags: TagGenerator,
}

impl Runtime {
    /// Maps the shadow table for `[heap_base, heap_base + heap_size)` and
    /// seeds the tag generator.
    pub fn new(hooks: NxsanHooks, heap_base: usize, heap_size: usize) -> Result<Self, InitError> {
        let shadow = ShadowStore::new(&hooks, heap_base, heap_size)?;
        Ok(Runtime { hooks, shadow, tags: TagGenerator::new() })
    }

    pub fn shadow(&self) -> &ShadowStore {
        &self.shadow
    }

    pub fn hooks(&self) -> &NxsanHooks {
        &self.hooks
    }
}

/// The one process-wide `Runtime` slot. The ABI hooks dispatch through this
/// cell; no caller holds a handle across calls.
struct RuntimeCell(UnsafeCell<Option<Runtime>>);

// SAFETY: the runtime assumes a single-threaded embedder (see crate docs);
// nothing here synchronises.
unsafe impl Sync for RuntimeCell {}

static RUNTIME: RuntimeCell = RuntimeCell(UnsafeCell::new(None));

/// Installs the global runtime. Returns `false` when one is already live;
/// aborts through the error reporter when the heap shape is invalid or the
/// shadow table cannot be mapped.
///
/// # Safety
///
/// The caller must uphold the single-threaded contract, and `hooks` must be a
/// valid set of platform entry points whose allocator places allocations
/// inside the tracked heap.
pub unsafe fn init_runtime(hooks: NxsanHooks, heap_base: usize, heap_size: usize) -> bool {
    let slot = unsafe { &mut *RUNTIME.0.get() };
    if slot.is_some() {
        return false;
    }
    match Runtime::new(hooks, heap_base, heap_size) {
        Ok(runtime) => {
            *slot = Some(runtime);
            true
        }
        Err(err) => crate::diagnostics::abort_with_err(hooks.abort, format_args!("{err}")),
    }
}

/// Tears down the global runtime, unmapping the shadow table. Returns `false`
/// when not initialised. A later `init_runtime` restarts the lifecycle.
///
/// # Safety
///
/// Single-threaded contract; no reference from `try_runtime` may be live.
pub unsafe fn terminate_runtime() -> bool {
    let slot = unsafe { &mut *RUNTIME.0.get() };
    slot.take().is_some()
}

/// The live runtime, if the embedder has initialised one.
///
/// # Safety
///
/// Single-threaded contract; the returned reference must not outlive a call
/// to `terminate_runtime`, and at most one may be in use at a time.
pub unsafe fn try_runtime<'a>() -> Option<&'a mut Runtime> {
    unsafe { (*RUNTIME.0.get()).as_mut() }
}
