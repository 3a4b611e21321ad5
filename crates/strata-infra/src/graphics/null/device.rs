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

use super::native::{NullBuffer, NullFramebuffer, NullNative};
use std::borrow::Cow;
use strata_core::memory::align_up;
use strata_core::renderer::api::*;
use strata_core::renderer::shader::{ShaderDialect, ShaderLibrary};
use strata_core::renderer::{
    GraphicsDevice, NativeBackend, RecordingState, RenderError, ResourceError,
};
use strata_core::sync::{DeferredResource, FrameEngine, ResourceKind};
use strata_core::ResourceContainer;

/// A compiled pipeline as the null backend records it.
#[derive(Debug, Clone)]
pub struct NullPipeline {
    /// The description it was created from.
    pub descriptor: PipelineDescriptor,
    /// Shader bindings that do not match the descriptor set layouts.
    pub mismatches: Vec<BindingMismatch>,
}

/// A device that validates every call and performs no GPU work.
///
/// It shares the frame engine with the GPU backends, so fence, deletion and
/// ring-buffer behavior is identical; only the native calls are no-ops. This
/// makes it the backend for tests and headless tooling.
#[derive(Debug)]
pub struct NullDevice {
    settings: DeviceSettings,
    caps: DeviceCaps,
    engine: FrameEngine<NullNative>,
    shaders: ShaderLibrary,
    recording: RecordingState,
    bound_pipeline: Option<PipelineHandle>,
    buffers: ResourceContainer<NullBuffer, marker::Buffer>,
    samplers: ResourceContainer<SamplerDescriptor, marker::Sampler>,
    textures: ResourceContainer<TextureDescriptor, marker::Texture>,
    render_targets: ResourceContainer<RenderTargetDescriptor, marker::RenderTarget>,
    render_passes: ResourceContainer<RenderPassDescriptor, marker::RenderPass>,
    framebuffers: ResourceContainer<NullFramebuffer, marker::Framebuffer>,
    layouts: ResourceContainer<DescriptorSetLayoutDescriptor, marker::DescriptorSetLayout>,
    pipelines: ResourceContainer<NullPipeline, marker::Pipeline>,
}

impl NullDevice {
    /// Creates a null device.
    ///
    /// ## Arguments
    /// * `settings` - Validated before anything is created.
    /// * `shaders` - The library pipelines load their stages from.
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If the settings are invalid.
    pub fn new(settings: DeviceSettings, shaders: ShaderLibrary) -> Result<Self, RenderError> {
        settings
            .validate()
            .map_err(|e| RenderError::InitializationFailed(format!("{e:#}")))?;
        let engine = FrameEngine::new(
            NullNative::default(),
            settings.swapchain.frames_in_flight,
            settings.ephemeral_ring_buffer_size,
            settings.fence_timeout(),
        )?;
        log::info!(
            "Null device created ({} frames in flight)",
            settings.swapchain.frames_in_flight
        );
        Ok(Self {
            settings,
            caps: DeviceCaps::default(),
            engine,
            shaders,
            recording: RecordingState::default(),
            bound_pipeline: None,
            buffers: ResourceContainer::new(),
            samplers: ResourceContainer::new(),
            textures: ResourceContainer::new(),
            render_targets: ResourceContainer::new(),
            render_passes: ResourceContainer::new(),
            framebuffers: ResourceContainer::new(),
            layouts: ResourceContainer::new(),
            pipelines: ResourceContainer::new(),
        })
    }

    /// The bytes last uploaded to `buffer`.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> &[u8] {
        &self.buffers.get(buffer).contents
    }

    /// Returns `true` while `buffer` refers to a live buffer.
    pub fn is_buffer_alive(&self, buffer: BufferHandle) -> bool {
        self.buffers.contains(buffer)
    }

    /// Binding mismatches found when `pipeline` was created.
    pub fn pipeline_mismatches(&self, pipeline: PipelineHandle) -> &[BindingMismatch] {
        &self.pipelines.get(pipeline).mismatches
    }

    /// Resources of `kind` handed back to the null driver so far.
    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.engine.native().released(kind)
    }

    /// Frames submitted to the null driver.
    pub fn submissions(&self) -> u64 {
        self.engine.native().submissions()
    }

    /// The shader library, e.g. to invalidate it after sources changed.
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    fn release_ephemeral(
        buffers: &mut ResourceContainer<NullBuffer, marker::Buffer>,
    ) -> impl FnMut(BufferHandle) + '_ {
        move |handle| {
            buffers.remove(handle);
        }
    }

    fn to_render_error(err: anyhow::Error) -> RenderError {
        RenderError::Internal(format!("{err:#}"))
    }
}

impl GraphicsDevice for NullDevice {
    fn backend_type(&self) -> GraphicsBackendType {
        GraphicsBackendType::Null
    }

    fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: Cow::Borrowed("Null Device"),
            backend_type: GraphicsBackendType::Null,
            device_type: RendererDeviceType::Cpu,
        }
    }

    fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    fn recreate_swapchain(&mut self, swapchain: SwapchainSettings) -> Result<(), RenderError> {
        assert!(
            !self.recording.in_frame(),
            "recreate_swapchain called while a frame is being recorded"
        );
        swapchain.validate().map_err(Self::to_render_error)?;
        if swapchain.frames_in_flight != self.engine.frames().depth() {
            self.engine.resize(
                swapchain.frames_in_flight,
                Self::release_ephemeral(&mut self.buffers),
            )?;
        }
        log::info!(
            "Null swapchain recreated at {}x{}",
            swapchain.width,
            swapchain.height
        );
        self.settings.swapchain = swapchain;
        Ok(())
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError> {
        descriptor.validate(contents)?;
        let handle = self.buffers.insert(NullBuffer {
            size: descriptor.size,
            usage: descriptor.usage,
            contents: contents.map(<[u8]>::to_vec).unwrap_or_default(),
            ring_offset: None,
        });
        log::debug!("NullDevice: created buffer {handle:?} ({} bytes)", descriptor.size);
        Ok(handle)
    }

    fn create_ephemeral_buffer(
        &mut self,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<BufferHandle, ResourceError> {
        if contents.is_empty() {
            return Err(ResourceError::InvalidDescriptor(
                "ephemeral buffer contents are empty".to_owned(),
            ));
        }
        let size = align_up(contents.len() as u64, BUFFER_COPY_ALIGNMENT);
        let offset = self
            .engine
            .allocate_ephemeral(size, self.caps.ephemeral_alignment(usage));
        let handle = self.buffers.insert(NullBuffer {
            size,
            usage,
            contents: contents.to_vec(),
            ring_offset: Some(offset),
        });
        self.engine.track_ephemeral(handle);
        Ok(handle)
    }

    fn create_sampler(
        &mut self,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, ResourceError> {
        Ok(self.samplers.insert(descriptor.clone()))
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<TextureHandle, ResourceError> {
        descriptor.validate(contents, self.caps.max_texture_dimension_2d)?;
        Ok(self.textures.insert(descriptor.clone()))
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetHandle, ResourceError> {
        descriptor.validate(self.caps.max_texture_dimension_2d)?;
        Ok(self.render_targets.insert(descriptor.clone()))
    }

    fn create_render_pass(
        &mut self,
        descriptor: &RenderPassDescriptor,
    ) -> Result<RenderPassHandle, ResourceError> {
        descriptor.validate(self.caps.max_color_attachments)?;
        Ok(self.render_passes.insert(descriptor.clone()))
    }

    fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferHandle, ResourceError> {
        let pass = self.render_passes.get(descriptor.render_pass);
        let targets = &self.render_targets;
        let extent = descriptor.validate(pass, |handle| {
            let target = targets.get(handle);
            (target.format, target.width, target.height)
        })?;
        Ok(self.framebuffers.insert(NullFramebuffer {
            descriptor: descriptor.clone(),
            extent,
        }))
    }

    fn create_descriptor_set_layout(
        &mut self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<DescriptorSetLayoutHandle, ResourceError> {
        Ok(self.layouts.insert(descriptor.clone()))
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, ResourceError> {
        let pass = self.render_passes.get(descriptor.render_pass);
        descriptor.validate(pass, self.caps.max_descriptor_sets)?;
        let layouts: Vec<&DescriptorSetLayoutDescriptor> = descriptor
            .descriptor_set_layouts
            .iter()
            .map(|handle| self.layouts.get(*handle))
            .collect();

        let shaders = self.shaders.load_pipeline(descriptor, ShaderDialect::Wgsl)?;
        let mismatches = shaders.check_bindings(descriptor.label(), &layouts, BindingModel::PerSet);

        let handle = self.pipelines.insert(NullPipeline {
            descriptor: descriptor.clone(),
            mismatches,
        });
        log::debug!("NullDevice: created pipeline '{}'", descriptor.label());
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        assert!(
            !self.buffers.get(buffer).is_ephemeral(),
            "ephemeral buffers cannot be deleted explicitly"
        );
        let native = self.buffers.remove(buffer);
        self.engine.defer_release(DeferredResource::Buffer(native));
    }

    fn delete_sampler(&mut self, sampler: SamplerHandle) {
        let native = self.samplers.remove(sampler);
        self.engine.defer_release(DeferredResource::Sampler(native));
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        let native = self.textures.remove(texture);
        self.engine.defer_release(DeferredResource::Texture(native));
    }

    fn delete_render_target(&mut self, target: RenderTargetHandle) {
        let native = self.render_targets.remove(target);
        self.engine.defer_release(DeferredResource::RenderTarget(native));
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferHandle) {
        let native = self.framebuffers.remove(framebuffer);
        self.engine.defer_release(DeferredResource::Framebuffer(native));
    }

    fn delete_render_pass(&mut self, pass: RenderPassHandle) {
        let native = self.render_passes.remove(pass);
        self.engine.defer_release(DeferredResource::RenderPass(native));
    }

    fn begin_frame(&mut self) -> Result<(), RenderError> {
        self.engine
            .begin_frame(Self::release_ephemeral(&mut self.buffers))?;
        self.recording.begin_frame();
        self.bound_pipeline = None;
        Ok(())
    }

    fn present_frame(&mut self, image: Option<RenderTargetHandle>) -> Result<(), RenderError> {
        self.recording.end_frame();
        if let Some(image) = image {
            let target = self.render_targets.get(image);
            log::trace!("NullDevice: presenting {}x{} target", target.width, target.height);
        }
        self.engine.present_frame()?;
        Ok(())
    }

    fn wait_idle(&mut self) -> Result<(), RenderError> {
        self.engine
            .wait_idle(Self::release_ephemeral(&mut self.buffers))
    }

    fn shutdown(&mut self) -> Result<(), RenderError> {
        if self.engine.is_shut_down() {
            return Ok(());
        }
        self.recording.abandon();
        let result = self
            .engine
            .shutdown(Self::release_ephemeral(&mut self.buffers));

        let native = self.engine.native_mut();
        let mut live = 0usize;
        self.buffers.clear_with(|_, buffer| {
            live += 1;
            native.release(DeferredResource::Buffer(buffer));
        });
        self.samplers.clear_with(|_, sampler| {
            live += 1;
            native.release(DeferredResource::Sampler(sampler));
        });
        self.textures.clear_with(|_, texture| {
            live += 1;
            native.release(DeferredResource::Texture(texture));
        });
        self.framebuffers.clear_with(|_, framebuffer| {
            live += 1;
            native.release(DeferredResource::Framebuffer(framebuffer));
        });
        self.render_targets.clear_with(|_, target| {
            live += 1;
            native.release(DeferredResource::RenderTarget(target));
        });
        self.render_passes.clear_with(|_, pass| {
            live += 1;
            native.release(DeferredResource::RenderPass(pass));
        });
        self.pipelines.clear_with(|_, _| {});
        self.layouts.clear_with(|_, _| {});

        log::info!("Null device shut down, {live} live resources released");
        result
    }

    fn begin_render_pass(&mut self, pass: RenderPassHandle, framebuffer: FramebufferHandle) {
        let framebuffer = self.framebuffers.get(framebuffer);
        assert!(
            framebuffer.descriptor.render_pass == pass,
            "framebuffer was created for a different render pass"
        );
        self.render_passes.get(pass);
        self.recording.begin_render_pass(pass);
        self.bound_pipeline = None;
    }

    fn end_render_pass(&mut self) {
        self.recording.end_render_pass();
        self.bound_pipeline = None;
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        let render_pass = self.pipelines.get(pipeline).descriptor.render_pass;
        assert!(
            self.recording.render_pass() == Some(render_pass),
            "pipeline was created for a different render pass"
        );
        self.recording.bind_pipeline(pipeline);
        self.bound_pipeline = Some(pipeline);
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, _format: IndexFormat) {
        assert!(
            self.buffers.get(buffer).usage.contains(BufferUsage::INDEX),
            "bind_index_buffer called with a buffer lacking INDEX usage"
        );
        self.recording.bind_index_buffer();
    }

    fn bind_vertex_buffer(&mut self, _slot: u32, buffer: BufferHandle) {
        self.recording.assert_in_pass("bind_vertex_buffer");
        assert!(
            self.buffers.get(buffer).usage.contains(BufferUsage::VERTEX),
            "bind_vertex_buffer called with a buffer lacking VERTEX usage"
        );
    }

    fn bind_descriptor_set(
        &mut self,
        index: u32,
        layout: DescriptorSetLayoutHandle,
        descriptors: &[Descriptor],
    ) {
        self.recording.assert_in_pass("bind_descriptor_set");
        let Some(pipeline) = self.bound_pipeline else {
            panic!("bind_descriptor_set called without a bound pipeline");
        };
        let pipeline_layouts = &self.pipelines.get(pipeline).descriptor.descriptor_set_layouts;
        assert!(
            pipeline_layouts.get(index as usize) == Some(&layout),
            "descriptor set {index} does not use the bound pipeline's layout"
        );
        assert_descriptors_match(self.layouts.get(layout).entries(), descriptors);
        for descriptor in descriptors {
            match *descriptor {
                Descriptor::UniformBuffer { buffer, .. } | Descriptor::StorageBuffer { buffer, .. } => {
                    self.buffers.get(buffer);
                }
                Descriptor::Sampler(sampler) => {
                    self.samplers.get(sampler);
                }
                Descriptor::Texture(texture) => {
                    self.textures.get(texture);
                }
                Descriptor::RenderTarget(target) => {
                    assert!(
                        self.render_targets.get(target).sampled,
                        "render target bound as a texture was not created as sampled"
                    );
                }
                Descriptor::CombinedSampler { texture, sampler } => {
                    self.textures.get(texture);
                    self.samplers.get(sampler);
                }
            }
        }
    }

    fn set_viewport(&mut self, _viewport: Viewport) {
        self.recording.assert_in_pass("set_viewport");
    }

    fn set_scissor_rect(&mut self, _rect: ScissorRect) {
        self.recording.assert_in_pass("set_scissor_rect");
    }

    fn draw(&mut self, _first_vertex: u32, _vertex_count: u32) {
        self.recording.draw();
    }

    fn draw_indexed_instanced(&mut self, _index_count: u32, _instance_count: u32) {
        self.recording.draw_indexed();
    }

    fn stats(&self) -> FrameStats {
        FrameStats {
            draw_calls: self.recording.draw_calls(),
            ..self.engine.stats()
        }
    }
}

impl Drop for NullDevice {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Null device shutdown failed: {e}");
        }
    }
}
