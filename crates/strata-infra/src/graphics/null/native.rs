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

use std::collections::BTreeMap;
use std::time::Duration;
use strata_core::renderer::api::{
    BufferUsage, FramebufferDescriptor, RenderPassDescriptor, RenderTargetDescriptor,
    SamplerDescriptor, TextureDescriptor,
};
use strata_core::renderer::{FenceStatus, NativeBackend, RenderError};
use strata_core::sync::{DeferredResource, ResourceKind};

/// A buffer as the null backend sees it: its description and a CPU copy of
/// whatever was uploaded.
#[derive(Debug, Clone)]
pub struct NullBuffer {
    /// Size in bytes.
    pub size: u64,
    /// Declared usage.
    pub usage: BufferUsage,
    /// Uploaded bytes.
    pub contents: Vec<u8>,
    /// Ring-buffer offset for ephemeral buffers.
    pub ring_offset: Option<u64>,
}

impl NullBuffer {
    /// Returns `true` for per-frame ring allocations.
    pub fn is_ephemeral(&self) -> bool {
        self.ring_offset.is_some()
    }
}

/// A framebuffer and its resolved extent.
#[derive(Debug, Clone)]
pub struct NullFramebuffer {
    /// The description it was created from.
    pub descriptor: FramebufferDescriptor,
    /// Width and height shared by every target.
    pub extent: (u32, u32),
}

/// Fence of the null backend. Work completes at submission.
#[derive(Debug, Default)]
pub struct NullFence {
    submission: Option<u64>,
}

/// Command context of the null backend.
#[derive(Debug, Default)]
pub struct NullCommands {
    /// Times this context started recording.
    pub uses: u64,
}

/// The null "driver": counts submissions and releases.
#[derive(Debug, Default)]
pub struct NullNative {
    submissions: u64,
    released: BTreeMap<ResourceKind, u64>,
}

impl NullNative {
    /// Frames submitted so far.
    pub fn submissions(&self) -> u64 {
        self.submissions
    }

    /// Resources of `kind` released so far.
    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.released.get(&kind).copied().unwrap_or(0)
    }
}

impl NativeBackend for NullNative {
    type Fence = NullFence;
    type CommandContext = NullCommands;
    type Buffer = NullBuffer;
    type Sampler = SamplerDescriptor;
    type Texture = TextureDescriptor;
    type RenderTarget = RenderTargetDescriptor;
    type Framebuffer = NullFramebuffer;
    type RenderPass = RenderPassDescriptor;

    fn create_frame_context(
        &mut self,
        slot: usize,
    ) -> Result<(Self::Fence, Self::CommandContext), RenderError> {
        log::trace!("NullNative: frame context {slot} created");
        Ok((NullFence::default(), NullCommands::default()))
    }

    fn wait_fence(
        &mut self,
        fence: &Self::Fence,
        _timeout: Duration,
    ) -> Result<FenceStatus, RenderError> {
        if let Some(submission) = fence.submission {
            log::trace!("NullNative: submission {submission} already complete");
        }
        Ok(FenceStatus::Signaled)
    }

    fn reset_fence(&mut self, fence: &mut Self::Fence) {
        fence.submission = None;
    }

    fn begin_commands(&mut self, context: &mut Self::CommandContext) -> Result<(), RenderError> {
        context.uses += 1;
        Ok(())
    }

    fn submit(
        &mut self,
        _context: &mut Self::CommandContext,
        fence: &mut Self::Fence,
    ) -> Result<(), RenderError> {
        self.submissions += 1;
        fence.submission = Some(self.submissions);
        Ok(())
    }

    fn release(&mut self, resource: DeferredResource<Self>) {
        let kind = resource.kind();
        log::debug!("NullNative: released {kind:?}");
        *self.released.entry(kind).or_default() += 1;
    }

    fn destroy_frame_context(&mut self, _fence: Self::Fence, _context: Self::CommandContext) {}
}
