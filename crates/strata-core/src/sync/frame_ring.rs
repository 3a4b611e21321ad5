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

//! The ring of in-flight frame slots and their fences.
//!
//! ```text
//!              begin_frame            present_frame
//!    +------+ ------------> +-----------+ -----------> +-------------+
//!    | Idle |               | Recording |              | Outstanding |
//!    +------+ <------------------------------------------ +-------------+
//!                 reclaim: wait fence, flush deletions,
//!                 drop ephemeral buffers, advance last_synced_frame
//! ```
//!
//! At most one slot is `Recording`. A slot is reused only after it was
//! reclaimed, and reclaiming always observes the slot's fence signaled first,
//! so nothing the slot's submission may read is released early.

use super::deletion::DeferredResource;
use crate::renderer::api::BufferHandle;
use crate::renderer::{FenceStatus, NativeBackend, RenderError};
use std::fmt;
use std::time::Duration;

/// Lifecycle state of a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// No unretired GPU work.
    Idle,
    /// Between `begin_frame` and `present_frame`.
    Recording,
    /// Submitted; the fence has not been observed signaled yet.
    Outstanding,
}

/// One slot of the frame ring.
pub struct Frame<B: NativeBackend> {
    state: SlotState,
    fence: B::Fence,
    commands: B::CommandContext,
    ephemeral_buffers: Vec<BufferHandle>,
    last_frame_number: u64,
    pending_deletions: Vec<DeferredResource<B>>,
    ring_end: u64,
}

impl<B: NativeBackend> Frame<B> {
    fn new(native: &mut B, slot: usize) -> Result<Self, RenderError> {
        let (fence, commands) = native.create_frame_context(slot)?;
        Ok(Self {
            state: SlotState::Idle,
            fence,
            commands,
            ephemeral_buffers: Vec::new(),
            last_frame_number: 0,
            pending_deletions: Vec::new(),
            ring_end: 0,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SlotState {
        self.state
    }

    /// The frame number of this slot's latest submission (0 if never submitted).
    pub fn last_frame_number(&self) -> u64 {
        self.last_frame_number
    }

    /// Number of resources waiting on this slot's fence.
    pub fn pending_deletions(&self) -> usize {
        self.pending_deletions.len()
    }

    /// Ephemeral buffers allocated while this slot was recording.
    pub fn ephemeral_buffers(&self) -> &[BufferHandle] {
        &self.ephemeral_buffers
    }

    /// Releases everything the slot holds without waiting on its fence.
    fn retire_unchecked(
        &mut self,
        native: &mut B,
        release_ephemeral: &mut impl FnMut(BufferHandle),
    ) -> usize {
        let released = self.pending_deletions.len();
        for resource in self.pending_deletions.drain(..) {
            native.release(resource);
        }
        for handle in self.ephemeral_buffers.drain(..) {
            release_ephemeral(handle);
        }
        self.state = SlotState::Idle;
        released
    }
}

/// What a reclamation freed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimed {
    /// The reclaimed slot.
    pub slot: usize,
    /// Frame number of the retired submission.
    pub frame_number: u64,
    /// Deferred resources released.
    pub released: usize,
    /// Ring-buffer cursor at the end of the retired frame.
    pub ring_end: u64,
}

/// A fixed-depth rotation of frame slots.
pub struct FrameRing<B: NativeBackend> {
    frames: Vec<Frame<B>>,
    next_slot: usize,
    active: Option<usize>,
    frame_number: u64,
    last_synced_frame: u64,
    released_resources: u64,
    fence_timeout: Duration,
    device_lost: bool,
}

impl<B: NativeBackend> FrameRing<B> {
    /// Creates `depth` idle slots.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero.
    pub fn new(native: &mut B, depth: usize, fence_timeout: Duration) -> Result<Self, RenderError> {
        Ok(Self {
            frames: Self::create_frames(native, depth)?,
            next_slot: 0,
            active: None,
            frame_number: 0,
            last_synced_frame: 0,
            released_resources: 0,
            fence_timeout,
            device_lost: false,
        })
    }

    fn create_frames(native: &mut B, depth: usize) -> Result<Vec<Frame<B>>, RenderError> {
        assert!(depth > 0, "frame ring depth must be at least 1");
        (0..depth).map(|slot| Frame::new(native, slot)).collect()
    }

    /// Number of slots.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// The slot being recorded, if any.
    pub fn active_slot(&self) -> Option<usize> {
        self.active
    }

    /// Frames submitted so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Highest frame number whose completion was observed. Never decreases.
    pub fn last_synced_frame(&self) -> u64 {
        self.last_synced_frame
    }

    /// Deferred resources released so far.
    pub fn released_resources(&self) -> u64 {
        self.released_resources
    }

    /// `true` once a fence wait timed out or a submission failed.
    pub fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    /// Read access to a slot.
    pub fn frame(&self, slot: usize) -> &Frame<B> {
        &self.frames[slot]
    }

    /// Number of `Outstanding` slots.
    pub fn outstanding_count(&self) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.state == SlotState::Outstanding)
            .count()
    }

    /// Resources waiting on fences across all slots.
    pub fn pending_deletions(&self) -> usize {
        self.frames.iter().map(Frame::pending_deletions).sum()
    }

    /// The command context of the recording slot.
    pub fn active_commands_mut(&mut self) -> Option<&mut B::CommandContext> {
        let slot = self.active?;
        Some(&mut self.frames[slot].commands)
    }

    /// Starts recording into `slot`, or the next slot in rotation.
    ///
    /// If the slot is still outstanding it is reclaimed first, which may block
    /// on its fence.
    ///
    /// # Panics
    ///
    /// Panics if a slot is already recording or `slot` is out of range.
    ///
    /// # Errors
    ///
    /// [`RenderError::DeviceLost`] if the fence wait times out, or if the
    /// device was lost earlier.
    pub fn begin_frame(
        &mut self,
        native: &mut B,
        slot: Option<usize>,
        mut release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(usize, Option<Reclaimed>), RenderError> {
        if self.device_lost {
            return Err(RenderError::DeviceLost);
        }
        if let Some(active) = self.active {
            panic!("begin_frame called while frame slot {active} is still recording");
        }
        let slot = slot.unwrap_or(self.next_slot);
        assert!(slot < self.frames.len(), "frame slot {slot} is out of range");

        let reclaimed = self.reclaim(native, slot, &mut release_ephemeral)?;

        let frame = &mut self.frames[slot];
        native.reset_fence(&mut frame.fence);
        native.begin_commands(&mut frame.commands)?;
        frame.state = SlotState::Recording;
        self.active = Some(slot);
        self.next_slot = (slot + 1) % self.frames.len();
        log::trace!("Frame slot {slot} recording frame #{}", self.frame_number + 1);
        Ok((slot, reclaimed))
    }

    /// Adds resources to the recording slot's pending-deletion set.
    ///
    /// # Panics
    ///
    /// Panics if no slot is recording.
    pub fn push_deletions(&mut self, resources: Vec<DeferredResource<B>>) {
        let Some(slot) = self.active else {
            panic!("deferred deletions can only be assigned to a recording frame");
        };
        self.frames[slot].pending_deletions.extend(resources);
    }

    /// Attributes an ephemeral buffer to the recording slot.
    ///
    /// # Panics
    ///
    /// Panics if no slot is recording.
    pub fn track_ephemeral(&mut self, handle: BufferHandle) {
        let Some(slot) = self.active else {
            panic!("ephemeral buffers can only be created inside a frame");
        };
        self.frames[slot].ephemeral_buffers.push(handle);
    }

    /// Submits the recording slot and marks it outstanding.
    ///
    /// `ring_end` is the ring-buffer cursor after the frame's last ephemeral
    /// allocation; it is handed back in [`Reclaimed`] once the slot retires.
    /// Returns the frame number of the submission.
    ///
    /// # Panics
    ///
    /// Panics if no slot is recording.
    pub fn present(&mut self, native: &mut B, ring_end: u64) -> Result<u64, RenderError> {
        let Some(slot) = self.active.take() else {
            panic!("present_frame called without a frame being recorded");
        };
        let frame = &mut self.frames[slot];
        let submitted = native.submit(&mut frame.commands, &mut frame.fence);

        self.frame_number += 1;
        frame.last_frame_number = self.frame_number;
        frame.ring_end = ring_end;
        frame.state = SlotState::Outstanding;

        if let Err(err) = submitted {
            log::error!("Submission of frame #{} failed: {err}", self.frame_number);
            self.device_lost = true;
            return Err(err);
        }
        log::trace!(
            "Frame #{} submitted from slot {slot} ({} deletions pending)",
            self.frame_number,
            frame.pending_deletions.len()
        );
        Ok(self.frame_number)
    }

    /// Retires `slot` if it is outstanding: waits on its fence, releases its
    /// pending deletions and ephemeral buffers, and advances
    /// `last_synced_frame`. Reclaiming an idle slot does nothing.
    ///
    /// # Panics
    ///
    /// Panics if `slot` is recording.
    pub fn reclaim(
        &mut self,
        native: &mut B,
        slot: usize,
        release_ephemeral: &mut impl FnMut(BufferHandle),
    ) -> Result<Option<Reclaimed>, RenderError> {
        let frame = &mut self.frames[slot];
        match frame.state {
            SlotState::Idle => return Ok(None),
            SlotState::Recording => panic!("cannot reclaim frame slot {slot} while it is recording"),
            SlotState::Outstanding => {}
        }

        match native.wait_fence(&frame.fence, self.fence_timeout) {
            Ok(FenceStatus::Signaled) => {}
            Ok(FenceStatus::TimedOut) => {
                log::error!(
                    "Fence of frame #{} (slot {slot}) did not signal within {:?}, device lost",
                    frame.last_frame_number,
                    self.fence_timeout
                );
                self.device_lost = true;
                return Err(RenderError::DeviceLost);
            }
            Err(err) => {
                log::error!("Waiting on the fence of slot {slot} failed: {err}");
                self.device_lost = true;
                return Err(err);
            }
        }

        let released = frame.retire_unchecked(native, release_ephemeral);
        self.released_resources += released as u64;
        self.last_synced_frame = self.last_synced_frame.max(frame.last_frame_number);
        Ok(Some(Reclaimed {
            slot,
            frame_number: frame.last_frame_number,
            released,
            ring_end: frame.ring_end,
        }))
    }

    /// Reclaims every outstanding slot, oldest submission first.
    pub fn reclaim_all(
        &mut self,
        native: &mut B,
        mut release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<Vec<Reclaimed>, RenderError> {
        let mut slots: Vec<usize> = (0..self.frames.len())
            .filter(|slot| self.frames[*slot].state == SlotState::Outstanding)
            .collect();
        slots.sort_by_key(|slot| self.frames[*slot].last_frame_number);

        let mut reclaimed = Vec::with_capacity(slots.len());
        for slot in slots {
            reclaimed.extend(self.reclaim(native, slot, &mut release_ephemeral)?);
        }
        Ok(reclaimed)
    }

    /// Rebuilds the ring with `depth` slots after retiring all work.
    ///
    /// # Panics
    ///
    /// Panics if a frame is being recorded.
    pub fn resize(
        &mut self,
        native: &mut B,
        depth: usize,
        release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(), RenderError> {
        assert!(
            self.active.is_none(),
            "the frame ring cannot be resized while a frame is being recorded"
        );
        self.reclaim_all(native, release_ephemeral)?;
        for frame in self.frames.drain(..) {
            native.destroy_frame_context(frame.fence, frame.commands);
        }
        self.frames = Self::create_frames(native, depth)?;
        self.next_slot = 0;
        log::debug!("Frame ring resized to {depth} slots");
        Ok(())
    }

    /// Retires every slot and destroys the frame objects.
    ///
    /// Outstanding slots are reclaimed normally. A slot still recording never
    /// submitted its work, so it is retired afterwards without a wait. If the
    /// device is lost, no fence will ever signal again and every slot is
    /// retired without waiting.
    pub fn shutdown(
        &mut self,
        native: &mut B,
        mut release_ephemeral: impl FnMut(BufferHandle),
    ) -> Result<(), RenderError> {
        let recording = self.active.take();
        let mut result = Ok(());

        if !self.device_lost {
            if let Err(err) = self.reclaim_all(native, &mut release_ephemeral) {
                result = Err(err);
            }
        }
        if self.device_lost {
            log::warn!("Device lost: retiring frame slots without waiting on their fences");
        }

        let order: Vec<usize> = (0..self.frames.len())
            .filter(|slot| Some(*slot) != recording)
            .chain(recording)
            .collect();
        for slot in order {
            let frame = &mut self.frames[slot];
            if frame.state != SlotState::Idle {
                let released = frame.retire_unchecked(native, &mut release_ephemeral);
                self.released_resources += released as u64;
            }
        }

        for frame in self.frames.drain(..) {
            native.destroy_frame_context(frame.fence, frame.commands);
        }
        log::debug!(
            "Frame ring shut down after {} frames ({} resources released)",
            self.frame_number,
            self.released_resources
        );
        result
    }
}

impl<B: NativeBackend> fmt::Debug for FrameRing<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let states: Vec<_> = self.frames.iter().map(|frame| frame.state).collect();
        f.debug_struct("FrameRing")
            .field("slots", &states)
            .field("active", &self.active)
            .field("frame_number", &self.frame_number)
            .field("last_synced_frame", &self.last_synced_frame)
            .field("device_lost", &self.device_lost)
            .finish()
    }
}
