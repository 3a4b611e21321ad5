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

//! The boundary between the synchronization engine and a native graphics API.

use crate::renderer::error::RenderError;
use crate::sync::DeferredResource;
use std::time::Duration;

/// The outcome of a bounded fence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceStatus {
    /// The GPU finished the work the fence guards.
    Signaled,
    /// The timeout elapsed first.
    TimedOut,
}

/// The native primitives the frame engine drives.
///
/// A backend names its own fence, command-recording context, and the native
/// payloads of every deferrable resource kind. The engine owns the frame
/// objects and calls back into the backend at well-defined points of the
/// frame lifecycle; the backend never has to track frame slots itself.
pub trait NativeBackend: Sized {
    /// A GPU-to-CPU completion signal.
    type Fence;
    /// A command-recording context, including any per-frame descriptor pool.
    type CommandContext;
    /// Native payload of a buffer.
    type Buffer;
    /// Native payload of a sampler.
    type Sampler;
    /// Native payload of a texture.
    type Texture;
    /// Native payload of a render target.
    type RenderTarget;
    /// Native payload of a framebuffer.
    type Framebuffer;
    /// Native payload of a render pass.
    type RenderPass;

    /// Creates the fence and command context for frame slot `slot`.
    ///
    /// A freshly created fence must report [`FenceStatus::Signaled`].
    fn create_frame_context(
        &mut self,
        slot: usize,
    ) -> Result<(Self::Fence, Self::CommandContext), RenderError>;

    /// Blocks until `fence` signals or `timeout` elapses.
    fn wait_fence(&mut self, fence: &Self::Fence, timeout: Duration)
        -> Result<FenceStatus, RenderError>;

    /// Returns `fence` to the unsignaled state before it is reused.
    fn reset_fence(&mut self, fence: &mut Self::Fence);

    /// Prepares `context` for recording a new frame, discarding last use's state.
    fn begin_commands(&mut self, context: &mut Self::CommandContext) -> Result<(), RenderError>;

    /// Submits everything recorded in `context`; `fence` signals on completion.
    fn submit(
        &mut self,
        context: &mut Self::CommandContext,
        fence: &mut Self::Fence,
    ) -> Result<(), RenderError>;

    /// Releases a resource whose last use is known to be retired.
    fn release(&mut self, resource: DeferredResource<Self>);

    /// Destroys a frame slot's objects. Its fence is known to be signaled.
    fn destroy_frame_context(&mut self, fence: Self::Fence, context: Self::CommandContext);
}
