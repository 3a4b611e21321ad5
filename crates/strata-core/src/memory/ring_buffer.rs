// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A monotonic-cursor ring allocator for per-frame ("ephemeral") GPU data.
//!
//! The allocator only hands out offsets; the backing GPU buffer belongs to the
//! backend. The cursor never wraps: it grows forever and the physical offset is
//! `cursor % capacity`, so "empty" and "full" are never ambiguous.
//!
//! ```text
//!            retired            live (in flight)         free
//!   lap N  |xxxxxxxxxxxxxxxxxx|=====================|.............|
//!          ^                  ^ tail                ^ cursor      ^ capacity
//! ```
//!
//! An allocation never straddles the physical end. When it would, the cursor
//! jumps to the start of the next lap and the skipped tail is wasted.
//!
//! The `tail` only moves when a frame slot is reclaimed, i.e. after its fence
//! was observed signaled. An allocation that would reach bytes below the tail
//! of the next lap would overwrite data the GPU may still read, which is a
//! configuration error: the ring is too small for the frames in flight.

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Circular byte arena addressed by a monotonic cursor.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    capacity: u64,
    cursor: u64,
    tail: u64,
    frame_start: u64,
}

impl RingBuffer {
    /// Creates an empty ring of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: u64) -> Self {
        Self::with_cursor(capacity, 0)
    }

    /// Creates a ring whose cursor (and retired tail) start at `cursor`.
    pub fn with_cursor(capacity: u64, cursor: u64) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        Self {
            capacity,
            cursor,
            tail: cursor,
            frame_start: cursor,
        }
    }

    /// Size of the arena in bytes.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The monotonic allocation cursor.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Everything below this cursor value has been retired by the GPU.
    pub fn retired(&self) -> u64 {
        self.tail
    }

    /// Bytes consumed (including alignment and wrap padding) since the last
    /// [`RingBuffer::begin_frame`].
    pub fn frame_usage(&self) -> u64 {
        self.cursor - self.frame_start
    }

    /// Marks the start of a new frame's allocations.
    pub fn begin_frame(&mut self) {
        self.frame_start = self.cursor;
    }

    /// Declares every allocation below `cursor` as no longer in use by the GPU.
    ///
    /// Retiring is monotonic; an older value is ignored.
    pub fn retire(&mut self, cursor: u64) {
        debug_assert!(cursor <= self.cursor, "cannot retire past the cursor");
        self.tail = self.tail.max(cursor);
    }

    /// Allocates `size` bytes at `alignment` and returns the physical offset.
    ///
    /// # Panics
    ///
    /// * `size` is zero, or larger than the capacity.
    /// * `alignment` is not a power of two, or does not divide the capacity.
    /// * The allocation would overwrite memory that has not been retired yet
    ///   (ring buffer overrun).
    pub fn allocate(&mut self, size: u64, alignment: u64) -> u64 {
        assert!(size > 0, "ring buffer allocation of zero bytes");
        assert!(
            alignment.is_power_of_two(),
            "ring buffer alignment {alignment} is not a power of two"
        );
        assert!(
            self.capacity % alignment == 0,
            "ring buffer capacity {} is not a multiple of alignment {alignment}",
            self.capacity
        );
        assert!(
            size <= self.capacity,
            "ring buffer allocation of {size} bytes does not fit a {} byte ring",
            self.capacity
        );

        let mut offset = align_up(self.cursor, alignment);
        // A lap-aligned offset cannot straddle, even for a full-ring allocation.
        if offset % self.capacity != 0 && offset % self.capacity + size >= self.capacity {
            offset = (offset / self.capacity + 1) * self.capacity;
        }

        let end = offset + size;
        let in_flight = self.tail < self.cursor;
        assert!(
            !in_flight || end - self.tail <= self.capacity,
            "ring buffer overrun: {} bytes in flight exceed the {} byte capacity",
            end - self.tail,
            self.capacity
        );

        self.cursor = end;
        offset % self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_power_of_two() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(1000, 256), 1024);
    }

    #[test]
    fn allocations_respect_alignment() {
        let mut ring = RingBuffer::new(4096);
        assert_eq!(ring.allocate(3, 1), 0);
        assert_eq!(ring.allocate(8, 16), 16);
        assert_eq!(ring.allocate(4, 256), 256);
        assert_eq!(ring.cursor(), 260);
    }

    #[test]
    fn allocation_crossing_the_end_jumps_to_next_lap() {
        let mut ring = RingBuffer::with_cursor(1024, 1000);
        let offset = ring.allocate(100, 16);
        assert_eq!(offset, 0);
        assert_eq!(ring.cursor(), 1124);
    }

    #[test]
    fn allocation_ending_exactly_at_the_end_also_wraps() {
        let mut ring = RingBuffer::with_cursor(1024, 1000);
        assert_eq!(ring.allocate(24, 8), 0);
        assert_eq!(ring.cursor(), 1024 + 24);
    }

    #[test]
    fn allocations_in_one_frame_never_overlap_or_straddle() {
        let capacity = 1024;
        let mut ring = RingBuffer::with_cursor(capacity, 777);
        ring.begin_frame();

        let requests = [(10, 4), (64, 16), (1, 1), (200, 256), (33, 8), (97, 32)];
        let mut ranges: Vec<(u64, u64)> = Vec::new();
        for (size, alignment) in requests {
            let offset = ring.allocate(size, alignment);
            assert_eq!(offset % alignment, 0);
            assert!(offset + size <= capacity, "allocation straddles the end");
            for &(start, end) in &ranges {
                assert!(offset + size <= start || offset >= end, "ranges overlap");
            }
            ranges.push((offset, offset + size));
        }
        assert!(ring.frame_usage() <= capacity);
    }

    #[test]
    fn retiring_frames_lets_the_cursor_keep_growing() {
        let mut ring = RingBuffer::new(256);
        for _ in 0..100 {
            ring.begin_frame();
            ring.allocate(64, 16);
            ring.allocate(64, 16);
            let end = ring.cursor();
            ring.retire(end);
        }
        assert!(ring.cursor() > 256 * 40);
        assert_eq!(ring.retired(), ring.cursor());
    }

    #[test]
    fn retire_is_monotonic() {
        let mut ring = RingBuffer::new(256);
        ring.allocate(100, 4);
        ring.retire(100);
        ring.retire(40);
        assert_eq!(ring.retired(), 100);
    }

    #[test]
    #[should_panic(expected = "ring buffer overrun")]
    fn unretired_data_is_never_overwritten() {
        let mut ring = RingBuffer::new(256);
        ring.allocate(200, 4);
        ring.allocate(100, 4);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn rejects_non_power_of_two_alignment() {
        RingBuffer::new(256).allocate(4, 3);
    }

    #[test]
    #[should_panic(expected = "not a multiple of alignment")]
    fn rejects_alignment_that_does_not_divide_the_capacity() {
        RingBuffer::new(1000).allocate(4, 16);
    }

    #[test]
    #[should_panic(expected = "zero bytes")]
    fn rejects_zero_sized_allocation() {
        RingBuffer::new(256).allocate(0, 4);
    }

    #[test]
    fn allocation_as_large_as_the_ring_takes_the_whole_ring() {
        let mut ring = RingBuffer::new(1024);
        assert_eq!(ring.allocate(1024, 16), 0);
        assert_eq!(ring.cursor(), 1024);
    }

    #[test]
    fn full_ring_allocation_mid_lap_starts_the_next_lap_once_retired() {
        let mut ring = RingBuffer::new(1024);
        ring.allocate(100, 4);
        ring.retire(100);

        assert_eq!(ring.allocate(1024, 16), 0);
        assert_eq!(ring.cursor(), 2048);
    }

    #[test]
    #[should_panic(expected = "ring buffer overrun")]
    fn full_ring_allocation_with_data_in_flight_overruns() {
        let mut ring = RingBuffer::new(1024);
        ring.allocate(100, 4);
        ring.allocate(1024, 16);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn rejects_allocation_larger_than_the_ring() {
        RingBuffer::new(256).allocate(257, 1);
    }
}
