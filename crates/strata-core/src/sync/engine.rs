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

//! The per-frame synchronization engine shared by every backend.

use super::deletion::{DeferredResource, DeletionQueue};
use super::frame_ring::FrameRing;
use crate::memory::RingBuffer;
use crate::renderer::api::{BufferHandle, FrameStats};
use crate::renderer::{NativeBackend, RenderError};
use std::fmt;
use std::time::Duration;

/// Couples a native backend with its frame ring, deletion queue and
/// ephemeral ring buffer.
///
/// Every backend device owns one engine and routes its frame boundaries,
/// deletions and ephemeral allocations through it, so the synchronization
/// rules live in one place:
///
/// * staged deletions move into the active slot at `begin_frame` and again at
///   `present_frame`, and are released only once that slot was reclaimed;
/// * ephemeral ring space is retired up to a frame's end cursor only once the
///   frame's fence was observed signaled.
pub struct FrameEngine<B: NativeBackend> {
    native: B,
    frames: FrameRing<B>,
    deletions: DeletionQueue<B>,
    ring: RingBuffer,
    shut_down: bool,
}

impl<B: NativeBackend> FrameEngine<B> {
    /// Creates the engine and `depth` frame slots.
    ///
    /// ## Arguments
    /// * `native` - The backend the engine drives.
    /// * `depth` - Number of frames that may be in flight.
    /// * `ring_capacity` - Size of the ephemeral ring buffer in bytes.
    /// * `fence_timeout` - Upper bound of a single fence wait.
    /// ## Errors
    /// * `RenderError` - If the backend fails to create the frame objects.
    pub fn new(
        mut native: B,
        depth: usize,
        ring_capacity: u64,
        fence_timeout: Duration,
    ) -> Result<Self, RenderError> {
        let frames = FrameRing::new(&mut native, depth, fence_timeout)?;
        log::debug!(
            "Frame engine ready: {depth} frames in flight, {ring_capacity} byte ring, {fence_timeout:?} fence timeout"
        );
        Ok(Self {
            native,
            frames,
            deletions: DeletionQueue::new(),
            ring: RingBuffer::new(ring_capacity),
            shut_down: false,
        })
    }

    /// The native backend.
    pub fn native(&self) -> &B {
        &self.native
    }

    /// The native backend, mutably.
    pub fn native_mut(&mut self) -> &mut B {
        &mut self.native
    }

    /// The frame ring.
    pub fn frames(&self) -> &FrameRing<B> {
        &self.frames
    }

    /// The ephemeral ring allocator.
    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    /// The deletion staging queue.
    pub fn deletions(&self) -> &DeletionQueue<B> {
        &self.deletions
    }

    /// Returns `true` while a frame is being recorded.
    pub fn is_recording(&self) -> bool {
        self.frames.active_slot().is_some()
    }

    /// Returns `true` once the device stopped making progress.
    pub fn is_device_lost(&self) -> bool {
        self.frames.is_device_lost()
    }

    /// Returns `true` after [`FrameEngine::shutdown`].
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Both halves needed to record a command: the backend and the active
    /// slot's command context. `None` outside a frame.
    pub fn recording_parts(&mut self) -> Option<(&mut B, &mut B::CommandContext)> {
        let commands = self.frames.active_commands_mut()?;
        Some((&mut self.native, commands))
    }

    /// Starts the next frame and returns its slot.
    ///
    /// Blocks if the slot's previous submission is still executing. The
    /// reclaimed slot's ephemeral buffers are handed to `release_ephemeral`.
    ///
    /// ## Errors
    /// * `RenderError::DeviceLost` - If the fence wait timed out.
    pub fn begin_frame(
        &mut self,
        release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<usize, RenderError> {
        assert!(!self.shut_down, "begin_frame called after shutdown");
        let (slot, reclaimed) = self
            .frames
            .begin_frame(&mut self.native, None, release_ephemeral)?;
        if let Some(reclaimed) = reclaimed {
            self.ring.retire(reclaimed.ring_end);
            if reclaimed.released > 0 {
                log::trace!(
                    "Slot {slot}: released {} resources of frame #{}",
                    reclaimed.released,
                    reclaimed.frame_number
                );
            }
        }
        self.ring.begin_frame();
        self.assign_staged();
        Ok(slot)
    }

    /// Submits the recording frame and returns its frame number.
    ///
    /// ## Errors
    /// * `RenderError` - If the backend fails to submit; the device is then
    ///   considered lost.
    pub fn present_frame(&mut self) -> Result<u64, RenderError> {
        self.assign_staged();
        self.frames.present(&mut self.native, self.ring.cursor())
    }

    fn assign_staged(&mut self) {
        if self.deletions.staged_len() > 0 {
            self.frames.push_deletions(self.deletions.drain());
        }
    }

    /// Stages a resource whose handle was just deleted.
    pub fn defer_release(&mut self, resource: DeferredResource<B>) {
        self.deletions.defer(resource);
    }

    /// Reserves `size` bytes of ring space for the recording frame and
    /// returns the physical offset.
    ///
    /// # Panics
    ///
    /// Panics outside a frame, or on a ring buffer overrun.
    pub fn allocate_ephemeral(&mut self, size: u64, alignment: u64) -> u64 {
        assert!(
            self.is_recording(),
            "ephemeral buffers can only be created inside a frame"
        );
        self.ring.allocate(size, alignment)
    }

    /// Attributes an ephemeral buffer handle to the recording frame.
    pub fn track_ephemeral(&mut self, handle: BufferHandle) {
        self.frames.track_ephemeral(handle);
    }

    /// Waits for every submitted frame and retires it.
    ///
    /// A frame being recorded is left untouched.
    pub fn wait_idle(
        &mut self,
        release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(), RenderError> {
        let reclaimed = self.frames.reclaim_all(&mut self.native, release_ephemeral)?;
        if let Some(end) = reclaimed.iter().map(|r| r.ring_end).max() {
            self.ring.retire(end);
        }
        Ok(())
    }

    /// Rebuilds the frame ring with a new depth once all work has retired.
    ///
    /// # Panics
    ///
    /// Panics while a frame is being recorded.
    pub fn resize(
        &mut self,
        depth: usize,
        release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(), RenderError> {
        self.frames.resize(&mut self.native, depth, release_ephemeral)?;
        self.ring.retire(self.ring.cursor());
        Ok(())
    }

    /// Retires every frame, releases every staged and pending resource, and
    /// destroys the frame objects. Later calls do nothing.
    pub fn shutdown(
        &mut self,
        release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(), RenderError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        let result = self.frames.shutdown(&mut self.native, release_ephemeral);
        let leftover = self.deletions.release_all(&mut self.native);
        if leftover > 0 {
            log::debug!("Released {leftover} resources that were deleted after the last frame");
        }
        result
    }

    /// A snapshot of the engine's counters. `draw_calls` is left at zero for
    /// the device to fill in.
    pub fn stats(&self) -> FrameStats {
        FrameStats {
            frame_number: self.frames.frame_number(),
            last_synced_frame: self.frames.last_synced_frame(),
            outstanding_frames: self.frames.outstanding_count(),
            staged_deletions: self.deletions.staged_len(),
            pending_deletions: self.frames.pending_deletions(),
            released_resources: self.frames.released_resources(),
            ring_cursor: self.ring.cursor(),
            ring_frame_usage: self.ring.frame_usage(),
            draw_calls: 0,
        }
    }
}

impl<B: NativeBackend> fmt::Debug for FrameEngine<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameEngine")
            .field("frames", &self.frames)
            .field("deletions", &self.deletions)
            .field("ring", &self.ring)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}
