// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use bitvec::prelude::*;

/// Granularity (in slots) at which frame bitmaps grow in adaptive mode.
pub const FRAME_SIZE_BLOCK: usize = 64;

/// Deepest supported matching window; `SlotMask` packs one bit per slot.
pub const MAX_WINDOW: usize = 64;

/// Availability over the slots of a matching window. Bit `b` set means
/// slot `b` is still free. The slot order is the numeric order; all
/// tie-breaks on slots resolve to the smallest index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotMask {
    bits: u64,
    width: usize,
}

impl SlotMask {
    pub fn all_free(width: usize) -> Self {
        assert!(width >= 1 && width <= MAX_WINDOW);
        let bits = if width == MAX_WINDOW {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        Self { bits, width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Index of the least-significant set bit, if any.
    pub fn first_set(&self) -> Option<usize> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros() as usize)
        }
    }

    /// Earliest slot free in both masks.
    pub fn first_fit(a: SlotMask, b: SlotMask) -> Option<usize> {
        debug_assert_eq!(a.width, b.width);
        let mutual = SlotMask {
            bits: a.bits & b.bits,
            width: a.width,
        };
        mutual.first_set()
    }

    pub fn is_free(&self, slot: usize) -> bool {
        debug_assert!(slot < self.width);
        self.bits & (1u64 << slot) != 0
    }

    /// Claim a slot (clear its bit).
    pub fn mark(&mut self, slot: usize) {
        debug_assert!(slot < self.width);
        self.bits &= !(1u64 << slot);
    }

    /// Release a slot (set its bit).
    pub fn free(&mut self, slot: usize) {
        debug_assert!(slot < self.width);
        self.bits |= 1u64 << slot;
    }

    pub fn count_free(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Slide the window forward one slot: slot 1 becomes slot 0 and the
    /// fresh junior slot enters free.
    pub fn shift_window(&mut self) {
        self.bits >>= 1;
        self.bits |= 1u64 << (self.width - 1);
    }
}

/// Match flags over the slots of a batch frame, one bit per slot. Unlike
/// `SlotMask` the sense is inverted: a set bit means the slot is taken.
/// Grows in `FRAME_SIZE_BLOCK` increments when the adaptive matcher runs
/// out of frame.
#[derive(Clone, Debug, Default)]
pub struct FrameBitmap {
    bits: BitVec,
}

impl FrameBitmap {
    pub fn with_len(slots: usize) -> Self {
        Self {
            bits: bitvec![0; slots],
        }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_set(&self, slot: usize) -> bool {
        self.bits[slot]
    }

    pub fn set(&mut self, slot: usize) {
        self.bits.set(slot, true);
    }

    /// Clear all flags and re-size to `slots` (frame boundary).
    pub fn reset(&mut self, slots: usize) {
        self.bits.clear();
        self.bits.resize(slots, false);
    }

    /// Extend to the next block boundary at or above `slots`.
    pub fn grow_to(&mut self, slots: usize) {
        let blocks = (slots + FRAME_SIZE_BLOCK - 1) / FRAME_SIZE_BLOCK;
        let target = blocks * FRAME_SIZE_BLOCK;
        if target > self.bits.len() {
            self.bits.resize(target, false);
        }
    }

    /// Earliest slot in `[start, limit)` free in both bitmaps. `limit` is
    /// clamped to the shorter of the two.
    pub fn first_free_pair(&self, other: &FrameBitmap, start: usize, limit: usize) -> Option<usize> {
        let limit = limit.min(self.len()).min(other.len());
        (start..limit).find(|&slot| !self.bits[slot] && !other.bits[slot])
    }

    /// Latest slot strictly below `below` free in both bitmaps.
    pub fn last_free_pair(&self, other: &FrameBitmap, below: usize) -> Option<usize> {
        let below = below.min(self.len()).min(other.len());
        (0..below).rev().find(|&slot| !self.bits[slot] && !other.bits[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_mask_first_fit() {
        let mut a = SlotMask::all_free(16);
        let mut b = SlotMask::all_free(16);
        assert_eq!(SlotMask::first_fit(a, b), Some(0));
        a.mark(0);
        assert_eq!(SlotMask::first_fit(a, b), Some(1));
        b.mark(1);
        b.mark(2);
        assert_eq!(SlotMask::first_fit(a, b), Some(3));
        a.free(0);
        assert_eq!(SlotMask::first_fit(a, b), Some(0));
    }

    #[test]
    fn test_slot_mask_exhaustion() {
        let mut mask = SlotMask::all_free(4);
        for slot in 0..4 {
            mask.mark(slot);
        }
        assert_eq!(mask.first_set(), None);
        assert_eq!(mask.count_free(), 0);
        let other = SlotMask::all_free(4);
        assert_eq!(SlotMask::first_fit(mask, other), None);
    }

    #[test]
    fn test_slot_mask_shift_window() {
        let mut mask = SlotMask::all_free(8);
        mask.mark(0);
        mask.mark(3);
        mask.shift_window();
        // slot 3 moved to slot 2, the graduated slot 0 fell off, and the
        // fresh junior slot 7 is free.
        assert!(mask.is_free(0));
        assert!(!mask.is_free(2));
        assert!(mask.is_free(7));
        assert_eq!(mask.count_free(), 7);
    }

    #[test]
    fn test_slot_mask_full_width() {
        let mut mask = SlotMask::all_free(MAX_WINDOW);
        assert_eq!(mask.count_free(), MAX_WINDOW);
        mask.mark(63);
        mask.shift_window();
        assert!(mask.is_free(63));
        assert_eq!(mask.count_free(), MAX_WINDOW);
    }

    #[test]
    fn test_frame_bitmap_pairs() {
        let mut taken_in = FrameBitmap::with_len(16);
        let mut taken_out = FrameBitmap::with_len(16);
        assert_eq!(taken_in.first_free_pair(&taken_out, 0, 16), Some(0));
        taken_in.set(0);
        taken_out.set(1);
        assert_eq!(taken_in.first_free_pair(&taken_out, 0, 16), Some(2));
        assert_eq!(taken_in.first_free_pair(&taken_out, 5, 16), Some(5));
        assert_eq!(taken_in.last_free_pair(&taken_out, 16), Some(15));
        assert_eq!(taken_in.last_free_pair(&taken_out, 2), None);
        assert_eq!(taken_in.first_free_pair(&taken_out, 0, 0), None);
    }

    #[test]
    fn test_frame_bitmap_growth() {
        let mut bm = FrameBitmap::with_len(16);
        bm.set(7);
        bm.grow_to(17);
        assert_eq!(bm.len(), FRAME_SIZE_BLOCK);
        assert!(bm.is_set(7));
        assert!(!bm.is_set(16));
        bm.grow_to(FRAME_SIZE_BLOCK + 1);
        assert_eq!(bm.len(), 2 * FRAME_SIZE_BLOCK);
        bm.reset(16);
        assert_eq!(bm.len(), 16);
        assert!(!bm.is_set(7));
    }
}
