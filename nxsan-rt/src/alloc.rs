//! Tagged allocation and free over the backing aligned allocator.

use core::ffi::c_void;

use nxsan_shared::{GRANULE_BYTES, emplace_tag, extract_tag, strip_tag};

use crate::errors::{AllocError, FreeError};
use crate::global::Runtime;
use crate::verify::AccessOutcome;

impl Runtime {
    /// Allocates `size` bytes of tracked storage and returns the tagged
    /// address. The backing request is rounded up to whole granules so that a
    /// partial final granule always has a last byte to stash the tag in.
    pub fn malloc(&mut self, size: usize) -> Result<usize, AllocError> {
        if size == 0 {
            return Err(AllocError::ZeroSize);
        }
        let aligned_size = match size % GRANULE_BYTES {
            0 => size,
            rem => size
                .checked_add(GRANULE_BYTES - rem)
                .ok_or(AllocError::BackingFailed { size, aligned_size: size })?,
        };

        let raw = unsafe { (self.hooks.alloc.aligned_alloc)(GRANULE_BYTES, aligned_size) };
        if raw.is_null() {
            return Err(AllocError::BackingFailed { size, aligned_size });
        }

        let addr = raw.addr();
        if !self.shadow.alloc_in_heap(addr, size) {
            return Err(AllocError::OutOfHeap {
                base: addr,
                tail: addr.wrapping_add(size),
                heap_base: self.shadow.heap_base(),
                heap_tail: self.shadow.heap_tail(),
            });
        }

        let tag = self.tags.generate(&self.shadow, addr, size, aligned_size);
        let tagged = emplace_tag(addr, tag);
        self.set_shadow_tag(tagged, size, aligned_size);
        Ok(tagged)
    }

    /// Releases the allocation behind the tagged address `tagged`, validating
    /// the pointer against the shadow first. Every failure is fatal to the
    /// caller.
    pub fn free(&mut self, tagged: usize) -> Result<(), FreeError> {
        let raw = strip_tag(tagged);
        if !self.shadow.ptr_in_heap(raw) {
            return Err(FreeError::OutOfHeap {
                heap_base: self.shadow.heap_base(),
                heap_tail: self.shadow.heap_tail(),
            });
        }
        if raw % GRANULE_BYTES != 0 {
            return Err(FreeError::Unaligned);
        }
        if raw == self.shadow.heap_base() || raw == self.shadow.table_base() {
            return Err(FreeError::ShadowRegion);
        }

        match self.verify(tagged, 1) {
            AccessOutcome::Ok => {}
            AccessOutcome::NoTag => return Err(FreeError::NoTag),
            AccessOutcome::BadTag => return Err(FreeError::BadTag),
            AccessOutcome::Freed => return Err(FreeError::DoubleFree),
            AccessOutcome::NullPage => return Err(FreeError::NullPage),
            // Bounds and alignment were checked above.
            AccessOutcome::OutOfHeap | AccessOutcome::Overrun => return Err(FreeError::Unreachable),
        }

        unsafe { (self.hooks.alloc.free)(raw as *mut c_void) };
        self.clear_shadow_tag(raw, extract_tag(tagged));
        Ok(())
    }

    /// Writes shadow for the allocation at `tagged`: the tag into every fully
    /// covered granule, and for a partial final granule the covered byte
    /// count into the shadow with the tag stashed in the granule's last heap
    /// byte.
    fn set_shadow_tag(&mut self, tagged: usize, size: usize, allocated: usize) {
        let index = self.shadow.index_of(tagged);
        let tag = extract_tag(tagged);
        let granules = (allocated / GRANULE_BYTES).max(1);

        for offset in 0..granules - 1 {
            self.shadow.set(index + offset, tag);
        }

        let last = index + granules - 1;
        let partial = size % GRANULE_BYTES;
        if partial > 0 {
            self.shadow.set(last, partial as u8);
            let final_byte = (strip_tag(tagged) + allocated - 1) as *mut u8;
            unsafe { *final_byte = tag };
        } else {
            self.shadow.set(last, tag);
        }
    }

    /// Clears shadow for the freed allocation at `raw`. Without a size record
    /// the clear must infer the extent from the shadow itself:
    ///  * a short-granule first byte means the allocation fit one granule,
    ///    so clearing it finishes the job;
    ///  * a tag below `GRANULE_BYTES` cannot be told apart from a following
    ///    short granule, so the walk stops after the first granule;
    ///  * otherwise consecutive bytes equal to the tag belong to this
    ///    allocation (neighbours are guaranteed distinct) and are zeroed up to
    ///    the first differing byte.
    fn clear_shadow_tag(&mut self, raw: usize, tag: u8) {
        let index = self.shadow.index_of(raw);
        let original = self.shadow.get(index);
        self.shadow.set(index, 0);

        if original != tag {
            return;
        }
        if (tag as usize) < GRANULE_BYTES {
            return;
        }

        let mut cursor = index + 1;
        while cursor < self.shadow.len() && self.shadow.get(cursor) == tag {
            self.shadow.set(cursor, 0);
            cursor += 1;
        }
    }
}
