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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use std::fmt::Debug;

/// The backend-selectable device facade.
///
/// A device owns every GPU resource it creates and hands out typed handles.
/// Frames are recorded between [`GraphicsDevice::begin_frame`] and
/// [`GraphicsDevice::present_frame`]; resources are deleted through handles
/// and released only once no in-flight frame can still use them.
///
/// Misuse of the recording contract (drawing outside a render pass, beginning
/// a frame twice, using a deleted handle, ...) panics. Failures that depend on
/// the driver or on input data are reported as errors.
pub trait GraphicsDevice: Debug {
    /// Gets the graphics API this device runs on.
    fn backend_type(&self) -> GraphicsBackendType;

    /// Gets the adapter information of the device.
    fn adapter_info(&self) -> AdapterInfo;

    /// Gets the alignment and size limits of the device.
    fn caps(&self) -> &DeviceCaps;

    /// Gets the settings the device was created with, including the current
    /// swapchain parameters.
    fn settings(&self) -> &DeviceSettings;

    /// Reconfigures presentation.
    /// ## Arguments
    /// * `swapchain` - The new presentation parameters.
    /// ## Errors
    /// * `RenderError` - If the surface cannot be reconfigured or the frame
    ///   ring cannot be rebuilt.
    /// ## Panics
    /// Panics if called while a frame is being recorded.
    fn recreate_swapchain(&mut self, swapchain: SwapchainSettings) -> Result<(), RenderError>;

    /// Creates a GPU buffer, optionally initialized with `contents`.
    /// ## Arguments
    /// * `descriptor` - Size and usage of the buffer.
    /// * `contents` - Initial data, at most `descriptor.size` bytes.
    /// ## Returns
    /// A handle to the new buffer.
    /// ## Errors
    /// * `ResourceError` - If the descriptor is invalid or the backend fails.
    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError>;

    /// Creates a buffer that lives only for the current frame.
    ///
    /// The data is placed in the device's ring buffer and the handle goes
    /// stale once the frame's slot is reclaimed. Ephemeral buffers cannot be
    /// deleted explicitly.
    /// ## Arguments
    /// * `usage` - How the data will be bound.
    /// * `contents` - The data; must not be empty.
    /// ## Errors
    /// * `ResourceError` - If `contents` is empty.
    /// ## Panics
    /// Panics outside a frame, or if the ring buffer would overwrite data of
    /// a frame still in flight.
    fn create_ephemeral_buffer(
        &mut self,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<BufferHandle, ResourceError>;

    /// Creates a per-frame uniform buffer holding `value`.
    fn create_ephemeral_uniform<T: bytemuck::Pod>(
        &mut self,
        value: &T,
    ) -> Result<BufferHandle, ResourceError>
    where
        Self: Sized,
    {
        self.create_ephemeral_buffer(BufferUsage::UNIFORM, bytemuck::bytes_of(value))
    }

    /// Creates a sampler.
    fn create_sampler(&mut self, descriptor: &SamplerDescriptor)
        -> Result<SamplerHandle, ResourceError>;

    /// Creates a sampled texture, optionally initialized with tightly packed
    /// texel data for mip level 0.
    /// ## Errors
    /// * `ResourceError` - If the descriptor or the data size is invalid.
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<TextureHandle, ResourceError>;

    /// Creates a render target: an attachment that can optionally be sampled
    /// and presented.
    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetHandle, ResourceError>;

    /// Creates a render pass from its attachment formats and load/store
    /// operations.
    fn create_render_pass(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, ResourceError>;

    /// Creates a framebuffer binding render targets to a render pass.
    /// ## Errors
    /// * `ResourceError` - If the targets do not match the pass formats.
    /// ## Panics
    /// Panics if a handle in the descriptor is stale.
    fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferHandle, ResourceError>;

    /// Creates a descriptor set layout. Layouts live until shutdown.
    fn create_descriptor_set_layout(
        &mut self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<DescriptorSetLayoutHandle, ResourceError>;

    /// Creates a graphics pipeline.
    ///
    /// Loads and compiles both shader stages through the device's shader
    /// library, then checks the bindings the shaders declare against the
    /// descriptor set layouts. Mismatches are logged as warnings. Pipelines
    /// live until shutdown.
    /// ## Errors
    /// * `ResourceError::Shader` - If a stage cannot be loaded or compiled.
    /// * `ResourceError::Pipeline` - If the backend rejects the pipeline.
    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, ResourceError>;

    /// Deletes a buffer. The handle is stale immediately; the native buffer
    /// is released once no in-flight frame can use it.
    /// ## Panics
    /// Panics if the handle is stale or names an ephemeral buffer.
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Deletes a sampler. See [`GraphicsDevice::delete_buffer`].
    fn delete_sampler(&mut self, sampler: SamplerHandle);

    /// Deletes a texture. See [`GraphicsDevice::delete_buffer`].
    fn delete_texture(&mut self, texture: TextureHandle);

    /// Deletes a render target. See [`GraphicsDevice::delete_buffer`].
    fn delete_render_target(&mut self, target: RenderTargetHandle);

    /// Deletes a framebuffer. See [`GraphicsDevice::delete_buffer`].
    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle);

    /// Deletes a render pass. See [`GraphicsDevice::delete_buffer`].
    fn delete_render_pass(&mut self, pass: RenderPassHandle);

    /// Starts recording a frame.
    ///
    /// Blocks while the next frame slot's previous submission is executing.
    /// ## Errors
    /// * `RenderError::DeviceLost` - If that wait timed out, or the device
    ///   was lost before.
    /// ## Panics
    /// Panics if a frame is already being recorded.
    fn begin_frame(&mut self) -> Result<(), RenderError>;

    /// Submits the recorded frame and presents it.
    /// ## Arguments
    /// * `image` - The render target to show. `None` submits without
    ///   presenting (headless rendering).
    /// ## Errors
    /// * `RenderError` - If submission or presentation fails.
    /// ## Panics
    /// Panics if no frame is being recorded or a render pass is still open.
    fn present_frame(&mut self, image: Option<RenderTargetHandle>) -> Result<(), RenderError>;

    /// Blocks until every submitted frame has finished executing, and
    /// releases everything those frames were holding on to.
    fn wait_idle(&mut self) -> Result<(), RenderError>;

    /// Waits for the GPU, releases every resource and destroys the frame
    /// objects. Later calls do nothing; dropping the device calls it too.
    fn shutdown(&mut self) -> Result<(), RenderError>;

    /// Begins a render pass on `framebuffer`.
    /// ## Panics
    /// Panics outside a frame, inside another pass, or on a stale handle.
    fn begin_render_pass(&mut self, pass: RenderPassHandle, framebuffer: FramebufferHandle);

    /// Ends the open render pass.
    fn end_render_pass(&mut self);

    /// Binds a pipeline for the following draws.
    fn bind_pipeline(&mut self, pipeline: PipelineHandle);

    /// Binds an index buffer.
    fn bind_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat);

    /// Binds a vertex buffer to vertex input slot `slot`.
    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle);

    /// Binds resources to descriptor set `index`.
    /// ## Arguments
    /// * `index` - The set index in the bound pipeline's layout.
    /// * `layout` - The layout the descriptors follow.
    /// * `descriptors` - One descriptor per layout entry, in order.
    /// ## Panics
    /// Panics if the descriptors do not match the layout.
    fn bind_descriptor_set(
        &mut self,
        index: u32,
        layout: DescriptorSetLayoutHandle,
        descriptors: &[Descriptor],
    );

    /// Sets the viewport transform.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Sets the scissor rectangle.
    fn set_scissor_rect(&mut self, rect: ScissorRect);

    /// Draws `vertex_count` vertices starting at `first_vertex`.
    fn draw(&mut self, first_vertex: u32, vertex_count: u32);

    /// Draws `index_count` indices from the bound index buffer,
    /// `instance_count` times.
    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32);

    /// Gets a snapshot of the frame and resource counters.
    fn stats(&self) -> FrameStats;
}
