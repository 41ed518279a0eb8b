//! Classification of tagged accesses against the shadow store.

use nxsan_shared::{GRANULE_BYTES, PAGE_SIZE_BYTES, extract_tag, strip_tag};

use crate::global::Runtime;

/// Outcome of classifying one access. `NoTag` is benign: pointers the
/// allocator never tagged (globals, stack) pass through unverified.
/// Everything except `Ok` and `NoTag` is fatal to the reporting caller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessOutcome {
    Ok,
    NoTag,
    BadTag,
    OutOfHeap,
    Overrun,
    NullPage,
    Freed,
}

impl Runtime {
    /// Classifies an access of `len` bytes through the tagged address
    /// `tagged`.
    ///
    /// Accesses are assumed aligned to their natural size, so an access never
    /// straddles a granule boundary. A multi-granule tail overrun is only
    /// caught when it lands on a granule whose shadow differs; a straddle
    /// into free space classifies as `Freed`.
    pub fn verify(&self, tagged: usize, len: usize) -> AccessOutcome {
        let tag = extract_tag(tagged);
        let raw = strip_tag(tagged);

        // Null and near-null accesses are invalid regardless of tag state.
        if raw < PAGE_SIZE_BYTES {
            return AccessOutcome::NullPage;
        }
        if tag == 0 {
            return AccessOutcome::NoTag;
        }
        if !self.shadow.ptr_in_heap(raw) {
            return AccessOutcome::OutOfHeap;
        }

        let shadow_byte = self.shadow.get(self.shadow.index_of(raw));
        if shadow_byte == tag {
            return AccessOutcome::Ok;
        }
        if shadow_byte == 0 {
            return AccessOutcome::Freed;
        }
        if shadow_byte as usize >= GRANULE_BYTES {
            return AccessOutcome::BadTag;
        }

        // Short granule: the shadow holds the covered byte count and the real
        // tag lives in the granule's last heap byte. The granule is live, so
        // reading that byte is sound.
        let granule_base = raw & !(GRANULE_BYTES - 1);
        let short_tag = unsafe { *((granule_base + GRANULE_BYTES - 1) as *const u8) };
        if short_tag != tag {
            return AccessOutcome::BadTag;
        }
        if len <= 1 {
            return AccessOutcome::Ok;
        }
        let in_granule_off = raw % GRANULE_BYTES;
        if in_granule_off + len <= shadow_byte as usize {
            AccessOutcome::Ok
        } else {
            AccessOutcome::Overrun
        }
    }
}

#[cfg(test)]
mod tests {
    use nxsan_shared::emplace_tag;

    use super::*;
    use crate::test_utils::{arena_runtime, null_based_runtime};

    #[test]
    fn full_granule_access_is_ok() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(64).unwrap();
        for len in [1, 2, 4, 8] {
            assert_eq!(rt.verify(tagged, len), AccessOutcome::Ok);
        }
        // Natural alignment keeps an eight-byte access inside its granule.
        assert_eq!(rt.verify(tagged + 8, 8), AccessOutcome::Ok);
        assert_eq!(rt.verify(tagged + 48, 8), AccessOutcome::Ok);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn short_granule_access_within_bounds_is_ok() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(6).unwrap();
        assert_eq!(rt.verify(tagged, 1), AccessOutcome::Ok);
        assert_eq!(rt.verify(tagged, 4), AccessOutcome::Ok);
        assert_eq!(rt.verify(tagged + 4, 2), AccessOutcome::Ok);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn short_granule_overrun_is_detected() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(6).unwrap();
        assert_eq!(rt.verify(tagged, 8), AccessOutcome::Overrun);
        assert_eq!(rt.verify(tagged + 4, 4), AccessOutcome::Overrun);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn single_byte_accesses_skip_the_short_granule_bounds_test() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(6).unwrap();
        // One-byte accesses only validate the tag; offset 10 is past the six
        // covered bytes but still classifies Ok.
        assert_eq!(rt.verify(tagged + 10, 1), AccessOutcome::Ok);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn mismatched_tag_is_detected() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(64).unwrap();
        let tag = extract_tag(tagged);
        let flipped = if tag == 1 { 2 } else { tag ^ 1 };
        let forged = emplace_tag(strip_tag(tagged), flipped);
        assert_eq!(rt.verify(forged, 4), AccessOutcome::BadTag);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn mismatched_short_granule_tag_is_detected() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(6).unwrap();
        let tag = extract_tag(tagged);
        let flipped = if tag == 1 { 2 } else { tag ^ 1 };
        let forged = emplace_tag(strip_tag(tagged), flipped);
        assert_eq!(rt.verify(forged, 1), AccessOutcome::BadTag);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn freed_memory_is_detected() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(64).unwrap();
        rt.free(tagged).unwrap();
        assert_eq!(rt.verify(tagged, 8), AccessOutcome::Freed);
    }

    #[test]
    fn untagged_pointers_pass_through() {
        let mut rt = arena_runtime();
        let tagged = rt.malloc(16).unwrap();
        assert_eq!(rt.verify(strip_tag(tagged), 8), AccessOutcome::NoTag);
        rt.free(tagged).unwrap();
    }

    #[test]
    fn out_of_heap_accesses_are_detected() {
        let rt = arena_runtime();
        let outside = rt.shadow().heap_tail() + GRANULE_BYTES;
        assert_eq!(rt.verify(emplace_tag(outside, 7), 4), AccessOutcome::OutOfHeap);
    }

    #[test]
    fn null_page_wins_over_every_other_classification() {
        let rt = null_based_runtime();
        // Tagged, untagged, aligned or not: below the page boundary the
        // outcome is always NullPage.
        assert_eq!(rt.verify(emplace_tag(0, 5), 8), AccessOutcome::NullPage);
        assert_eq!(rt.verify(16, 1), AccessOutcome::NullPage);
        assert_eq!(rt.verify(PAGE_SIZE_BYTES - 1, 1), AccessOutcome::NullPage);
    }

    #[test]
    fn first_non_null_page_address_is_classified_normally() {
        let rt = null_based_runtime();
        // At the page boundary the ladder falls through to the tag checks.
        assert_eq!(rt.verify(PAGE_SIZE_BYTES, 1), AccessOutcome::NoTag);
    }
}
