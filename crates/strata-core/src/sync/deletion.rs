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

//! Deferred destruction of GPU-visible resources.
//!
//! Deleting a resource removes its container entry immediately, so its handle
//! goes stale at once, but the native object is parked here until the GPU can
//! no longer reach it. Parked resources are first *staged*; the frame engine
//! moves the staging list into the active frame slot's pending set at
//! `begin_frame` and at `present_frame`, and the slot flushes that set only
//! after its fence was observed signaled.

use crate::renderer::NativeBackend;
use std::fmt;

/// The kind of a [`DeferredResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// A buffer.
    Buffer,
    /// A sampler.
    Sampler,
    /// A sampled texture.
    Texture,
    /// A render target.
    RenderTarget,
    /// A framebuffer.
    Framebuffer,
    /// A render pass.
    RenderPass,
}

/// A native resource awaiting release, tagged by kind.
pub enum DeferredResource<B: NativeBackend> {
    /// A buffer.
    Buffer(B::Buffer),
    /// A sampler.
    Sampler(B::Sampler),
    /// A sampled texture.
    Texture(B::Texture),
    /// A render target.
    RenderTarget(B::RenderTarget),
    /// A framebuffer.
    Framebuffer(B::Framebuffer),
    /// A render pass.
    RenderPass(B::RenderPass),
}

impl<B: NativeBackend> DeferredResource<B> {
    /// The kind of resource held.
    pub fn kind(&self) -> ResourceKind {
        match self {
            DeferredResource::Buffer(_) => ResourceKind::Buffer,
            DeferredResource::Sampler(_) => ResourceKind::Sampler,
            DeferredResource::Texture(_) => ResourceKind::Texture,
            DeferredResource::RenderTarget(_) => ResourceKind::RenderTarget,
            DeferredResource::Framebuffer(_) => ResourceKind::Framebuffer,
            DeferredResource::RenderPass(_) => ResourceKind::RenderPass,
        }
    }
}

impl<B: NativeBackend> fmt::Debug for DeferredResource<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeferredResource::{:?}", self.kind())
    }
}

/// The staging list of deleted resources not yet assigned to a frame slot.
pub struct DeletionQueue<B: NativeBackend> {
    staged: Vec<DeferredResource<B>>,
    total_deferred: u64,
}

impl<B: NativeBackend> Default for DeletionQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: NativeBackend> DeletionQueue<B> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            staged: Vec::new(),
            total_deferred: 0,
        }
    }

    /// Parks `resource` until the next frame boundary assigns it to a slot.
    ///
    /// The caller must already have removed the resource's container entry.
    pub fn defer(&mut self, resource: DeferredResource<B>) {
        log::trace!("Deferring release of {resource:?}");
        self.total_deferred += 1;
        self.staged.push(resource);
    }

    /// Resources waiting for a frame slot.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Resources ever deferred through this queue.
    pub fn total_deferred(&self) -> u64 {
        self.total_deferred
    }

    /// Takes the staging list, leaving it empty.
    pub fn drain(&mut self) -> Vec<DeferredResource<B>> {
        std::mem::take(&mut self.staged)
    }

    /// Releases every staged resource immediately.
    ///
    /// Only valid once no GPU work can reference them, i.e. after every frame
    /// slot was reclaimed at shutdown.
    pub fn release_all(&mut self, native: &mut B) -> usize {
        let staged = self.drain();
        let count = staged.len();
        for resource in staged {
            native.release(resource);
        }
        count
    }
}

impl<B: NativeBackend> fmt::Debug for DeletionQueue<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("staged", &self.staged.len())
            .field("total_deferred", &self.total_deferred)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mock::MockNative;

    #[test]
    fn drain_hands_over_staged_resources_in_order() {
        let mut queue = DeletionQueue::<MockNative>::new();
        queue.defer(DeferredResource::Buffer(1));
        queue.defer(DeferredResource::Texture(2));
        assert_eq!(queue.staged_len(), 2);

        let drained: Vec<ResourceKind> = queue.drain().iter().map(|r| r.kind()).collect();

        assert_eq!(drained, vec![ResourceKind::Buffer, ResourceKind::Texture]);
        assert_eq!(queue.staged_len(), 0);
        assert_eq!(queue.total_deferred(), 2);
    }

    #[test]
    fn release_all_empties_the_staging_list() {
        let mut native = MockNative::new();
        let mut queue = DeletionQueue::new();
        queue.defer(DeferredResource::Sampler(7));
        queue.defer(DeferredResource::RenderPass(8));

        assert_eq!(queue.release_all(&mut native), 2);
        assert_eq!(native.released_ids(), vec![7, 8]);
        assert_eq!(queue.release_all(&mut native), 0);
    }

    #[test]
    fn debug_output_names_the_kind() {
        let resource = DeferredResource::<MockNative>::Framebuffer(3);
        assert_eq!(format!("{resource:?}"), "DeferredResource::Framebuffer");
    }
}
