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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_core::renderer::api::{
    BufferUsage, FramebufferDescriptor, RenderPassDescriptor, RenderTargetDescriptor,
    TextureDescriptor,
};
use strata_core::renderer::{FenceStatus, NativeBackend, RenderError};
use strata_core::sync::DeferredResource;

/// A long-lived GPU buffer.
#[derive(Debug)]
pub struct WgpuBuffer {
    /// The native buffer.
    pub buffer: wgpu::Buffer,
    /// Usage as the caller requested it, before `COPY_DST` was added for uploads.
    pub usage: BufferUsage,
}

/// A sampled texture and its default view.
#[derive(Debug)]
pub struct WgpuTexture {
    /// The native texture.
    pub texture: wgpu::Texture,
    /// View over every mip level.
    pub view: wgpu::TextureView,
    /// The description it was created from.
    pub descriptor: TextureDescriptor,
}

/// A render target and its attachment view.
#[derive(Debug)]
pub struct WgpuRenderTarget {
    /// The native texture.
    pub texture: wgpu::Texture,
    /// View bound as a pass attachment, and as a texture when sampled.
    pub view: wgpu::TextureView,
    /// The description it was created from.
    pub descriptor: RenderTargetDescriptor,
}

/// The views a framebuffer attaches, resolved at creation.
#[derive(Debug)]
pub struct WgpuFramebuffer {
    /// The description it was created from.
    pub descriptor: FramebufferDescriptor,
    /// One view per color attachment, in pass order.
    pub color_views: Vec<wgpu::TextureView>,
    /// The depth attachment view, if the pass has one.
    pub depth_view: Option<wgpu::TextureView>,
    /// Width and height shared by every attachment.
    pub extent: (u32, u32),
}

/// Per-slot recording state: the encoder, the open pass, and every bind
/// group created for the frame.
///
/// Bind groups play the role of a per-frame descriptor pool: they are
/// dropped when the slot is recorded again, i.e. after its fence signaled.
#[derive(Debug, Default)]
pub struct WgpuCommands {
    /// Encoder of the frame being recorded; `None` between frames.
    pub encoder: Option<wgpu::CommandEncoder>,
    /// The open render pass, detached from the encoder's lifetime.
    pub pass: Option<wgpu::RenderPass<'static>>,
    /// Bind groups created while recording this slot.
    pub bind_groups: Vec<wgpu::BindGroup>,
}

impl WgpuCommands {
    /// The open render pass.
    ///
    /// # Panics
    ///
    /// Panics if no pass is open.
    pub fn pass_mut(&mut self) -> &mut wgpu::RenderPass<'static> {
        match self.pass.as_mut() {
            Some(pass) => pass,
            None => panic!("no render pass is open"),
        }
    }

    /// The frame's command encoder.
    ///
    /// # Panics
    ///
    /// Panics if the slot is not recording, or a pass is still open.
    pub fn encoder_mut(&mut self) -> &mut wgpu::CommandEncoder {
        assert!(self.pass.is_none(), "the command encoder is locked by an open render pass");
        match self.encoder.as_mut() {
            Some(encoder) => encoder,
            None => panic!("the frame slot is not recording"),
        }
    }
}

/// The wgpu side of the frame engine.
///
/// A fence is the submission index of the slot's last frame; `None` means
/// nothing is outstanding. The ephemeral ring buffer lives here since every
/// ephemeral allocation aliases it.
#[derive(Debug)]
pub struct WgpuNative {
    device: wgpu::Device,
    queue: wgpu::Queue,
    ring: wgpu::Buffer,
    lost: Arc<AtomicBool>,
    released: u64,
}

impl WgpuNative {
    /// Creates the native side and allocates the ring buffer.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        ring_capacity: u64,
        lost: Arc<AtomicBool>,
    ) -> Self {
        let ring = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Strata Ephemeral Ring"),
            size: ring_capacity,
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::INDEX
                | wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            device,
            queue,
            ring,
            lost,
            released: 0,
        }
    }

    /// The buffer every ephemeral allocation lives in.
    pub fn ring(&self) -> &wgpu::Buffer {
        &self.ring
    }

    /// The logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// The submission queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Resources released so far.
    pub fn released(&self) -> u64 {
        self.released
    }

    fn check_lost(&self) -> Result<(), RenderError> {
        if self.lost.load(Ordering::Acquire) {
            Err(RenderError::DeviceLost)
        } else {
            Ok(())
        }
    }
}

impl NativeBackend for WgpuNative {
    type Fence = Option<wgpu::SubmissionIndex>;
    type CommandContext = WgpuCommands;
    type Buffer = WgpuBuffer;
    type Sampler = wgpu::Sampler;
    type Texture = WgpuTexture;
    type RenderTarget = WgpuRenderTarget;
    type Framebuffer = WgpuFramebuffer;
    type RenderPass = RenderPassDescriptor;

    fn create_frame_context(
        &mut self,
        slot: usize,
    ) -> Result<(Self::Fence, Self::CommandContext), RenderError> {
        log::trace!("WgpuNative: frame context {slot} created");
        Ok((None, WgpuCommands::default()))
    }

    fn wait_fence(
        &mut self,
        fence: &Self::Fence,
        timeout: Duration,
    ) -> Result<FenceStatus, RenderError> {
        self.check_lost()?;
        let Some(submission) = fence else {
            return Ok(FenceStatus::Signaled);
        };
        match self.device.poll(wgpu::PollType::Wait {
            submission_index: Some(submission.clone()),
            timeout: Some(timeout),
        }) {
            Ok(_) => Ok(FenceStatus::Signaled),
            Err(wgpu::PollError::Timeout) => Ok(FenceStatus::TimedOut),
            Err(e) => Err(RenderError::Internal(format!("device poll failed: {e}"))),
        }
    }

    fn reset_fence(&mut self, fence: &mut Self::Fence) {
        *fence = None;
    }

    fn begin_commands(&mut self, context: &mut Self::CommandContext) -> Result<(), RenderError> {
        self.check_lost()?;
        context.pass = None;
        context.bind_groups.clear();
        context.encoder = Some(
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Strata Frame Encoder"),
                }),
        );
        Ok(())
    }

    fn submit(
        &mut self,
        context: &mut Self::CommandContext,
        fence: &mut Self::Fence,
    ) -> Result<(), RenderError> {
        self.check_lost()?;
        context.pass = None;
        let encoder = match context.encoder.take() {
            Some(encoder) => encoder,
            None => self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor::default()),
        };
        *fence = Some(self.queue.submit(std::iter::once(encoder.finish())));
        Ok(())
    }

    fn release(&mut self, resource: DeferredResource<Self>) {
        log::trace!("WgpuNative: releasing {resource:?}");
        match resource {
            DeferredResource::Buffer(buffer) => buffer.buffer.destroy(),
            DeferredResource::Texture(texture) => texture.texture.destroy(),
            DeferredResource::RenderTarget(target) => target.texture.destroy(),
            DeferredResource::Sampler(_)
            | DeferredResource::Framebuffer(_)
            | DeferredResource::RenderPass(_) => {}
        }
        self.released += 1;
    }

    fn destroy_frame_context(&mut self, _fence: Self::Fence, context: Self::CommandContext) {
        drop(context);
    }
}
