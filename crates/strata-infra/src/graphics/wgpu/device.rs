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
use super::context::WgpuGraphicsContext;
use super::conversions::{attachment_ops, clear_color, IntoWgpu};
use super::native::{
    WgpuBuffer, WgpuCommands, WgpuFramebuffer, WgpuNative, WgpuRenderTarget, WgpuTexture,
};
use std::borrow::Cow;
use std::num::NonZeroU64;
use strata_core::memory::align_up;
use strata_core::renderer::api::*;
use strata_core::renderer::shader::{CompiledShader, ShaderDialect, ShaderLibrary};
use strata_core::renderer::{
    GraphicsDevice, NativeBackend, PipelineError, RecordingState, RenderError, ResourceError,
    ShaderError,
};
use strata_core::sync::{DeferredResource, FrameEngine};
use strata_core::ResourceContainer;

/// A buffer entry: a native buffer, or a range of the ephemeral ring.
#[derive(Debug)]
enum BufferEntry {
    Static(WgpuBuffer),
    Ephemeral {
        offset: u64,
        size: u64,
        usage: BufferUsage,
    },
}

impl BufferEntry {
    fn usage(&self) -> BufferUsage {
        match self {
            BufferEntry::Static(buffer) => buffer.usage,
            BufferEntry::Ephemeral { usage, .. } => *usage,
        }
    }

    fn slice<'a>(&'a self, ring: &'a wgpu::Buffer) -> wgpu::BufferSlice<'a> {
        match self {
            BufferEntry::Static(buffer) => buffer.buffer.slice(..),
            BufferEntry::Ephemeral { offset, size, .. } => ring.slice(*offset..*offset + *size),
        }
    }

    fn binding<'a>(
        &'a self,
        ring: &'a wgpu::Buffer,
        offset: u64,
        size: Option<u64>,
    ) -> wgpu::BufferBinding<'a> {
        match self {
            BufferEntry::Static(buffer) => wgpu::BufferBinding {
                buffer: &buffer.buffer,
                offset,
                size: size.and_then(NonZeroU64::new),
            },
            BufferEntry::Ephemeral {
                offset: base,
                size: len,
                ..
            } => {
                assert!(offset < *len, "descriptor offset {offset} is past the end of the buffer");
                wgpu::BufferBinding {
                    buffer: ring,
                    offset: base + offset,
                    size: NonZeroU64::new(size.unwrap_or(len - offset)),
                }
            }
        }
    }
}

/// A descriptor set layout and its native bind group layout.
#[derive(Debug)]
struct WgpuDescriptorSetLayout {
    descriptor: DescriptorSetLayoutDescriptor,
    layout: wgpu::BindGroupLayout,
}

/// A compiled pipeline with the state needed to validate binds.
#[derive(Debug)]
struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    render_pass: RenderPassHandle,
    descriptor_set_layouts: Vec<DescriptorSetLayoutHandle>,
    mismatches: Vec<BindingMismatch>,
}

/// A [`GraphicsDevice`] on top of wgpu.
///
/// Frames are recorded into one command encoder per frame slot. Rendering
/// always targets render targets; presenting copies the chosen target into
/// the surface texture. Descriptor sets map to bind groups, one group per
/// set with combined samplers split into a texture and a sampler binding.
#[derive(Debug)]
pub struct WgpuDevice {
    settings: DeviceSettings,
    caps: DeviceCaps,
    context: WgpuGraphicsContext,
    engine: FrameEngine<WgpuNative>,
    shaders: ShaderLibrary,
    recording: RecordingState,
    bound_pipeline: Option<PipelineHandle>,
    buffers: ResourceContainer<BufferEntry, marker::Buffer>,
    samplers: ResourceContainer<wgpu::Sampler, marker::Sampler>,
    textures: ResourceContainer<WgpuTexture, marker::Texture>,
    render_targets: ResourceContainer<WgpuRenderTarget, marker::RenderTarget>,
    render_passes: ResourceContainer<RenderPassDescriptor, marker::RenderPass>,
    framebuffers: ResourceContainer<WgpuFramebuffer, marker::Framebuffer>,
    layouts: ResourceContainer<WgpuDescriptorSetLayout, marker::DescriptorSetLayout>,
    pipelines: ResourceContainer<WgpuPipeline, marker::Pipeline>,
}

impl WgpuDevice {
    /// Creates an offscreen device. `present_frame` submits but shows nothing.
    ///
    /// ## Errors
    /// * `RenderError::InitializationFailed` - If the settings are invalid or
    ///   no adapter or device could be created.
    pub fn new(settings: DeviceSettings, shaders: ShaderLibrary) -> Result<Self, RenderError> {
        Self::create(settings, shaders, None)
    }

    /// Creates a device presenting to a window.
    ///
    /// ## Arguments
    /// * `settings` - Device settings; the swapchain part configures the surface.
    /// * `shaders` - The library pipelines load their stages from.
    /// * `target` - Any window wgpu can create a surface for.
    pub fn with_surface(
        settings: DeviceSettings,
        shaders: ShaderLibrary,
        target: impl Into<wgpu::SurfaceTarget<'static>>,
    ) -> Result<Self, RenderError> {
        Self::create(settings, shaders, Some(target.into()))
    }

    fn create(
        settings: DeviceSettings,
        shaders: ShaderLibrary,
        target: Option<wgpu::SurfaceTarget<'static>>,
    ) -> Result<Self, RenderError> {
        settings.validate().map_err(Self::init_error)?;
        let context = pollster::block_on(WgpuGraphicsContext::new(&settings, target))
            .map_err(Self::init_error)?;
        let caps = context.caps();

        let ring_alignment = caps
            .uniform_buffer_alignment
            .max(caps.storage_buffer_alignment);
        if settings.ephemeral_ring_buffer_size % ring_alignment != 0 {
            return Err(RenderError::InitializationFailed(format!(
                "ephemeral_ring_buffer_size {} is not a multiple of the device's binding alignment {ring_alignment}",
                settings.ephemeral_ring_buffer_size
            )));
        }

        let native = WgpuNative::new(
            context.device.clone(),
            context.queue.clone(),
            settings.ephemeral_ring_buffer_size,
            context.lost_flag(),
        );
        let engine = FrameEngine::new(
            native,
            settings.swapchain.frames_in_flight,
            settings.ephemeral_ring_buffer_size,
            settings.fence_timeout(),
        )?;
        log::info!(
            "wgpu device created on \"{}\" ({} frames in flight, {})",
            context.adapter_info.name,
            settings.swapchain.frames_in_flight,
            if context.surface.is_some() {
                "presenting"
            } else {
                "offscreen"
            }
        );

        Ok(Self {
            settings,
            caps,
            context,
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

    /// Binding mismatches found when `pipeline` was created.
    pub fn pipeline_mismatches(&self, pipeline: PipelineHandle) -> &[BindingMismatch] {
        &self.pipelines.get(pipeline).mismatches
    }

    /// The shader library, e.g. to invalidate it after sources changed.
    pub fn shaders_mut(&mut self) -> &mut ShaderLibrary {
        &mut self.shaders
    }

    /// The wgpu device, for interop with code that talks to wgpu directly.
    pub fn wgpu_device(&self) -> &wgpu::Device {
        &self.context.device
    }

    fn init_error(err: anyhow::Error) -> RenderError {
        RenderError::InitializationFailed(format!("{err:#}"))
    }

    fn release_ephemeral(
        buffers: &mut ResourceContainer<BufferEntry, marker::Buffer>,
    ) -> impl FnMut(BufferHandle) + '_ {
        move |handle| {
            buffers.remove(handle);
        }
    }

    fn recording_parts(
        engine: &mut FrameEngine<WgpuNative>,
    ) -> (&mut WgpuNative, &mut WgpuCommands) {
        match engine.recording_parts() {
            Some(parts) => parts,
            None => panic!("no frame is being recorded"),
        }
    }

    fn shader_module(
        device: &wgpu::Device,
        shader: &CompiledShader,
    ) -> Result<wgpu::ShaderModule, ShaderError> {
        let text = shader.text().ok_or_else(|| ShaderError::UnsupportedDialect {
            dialect: shader.dialect.to_string(),
        })?;
        Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(shader.name.as_str()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(text)),
        }))
    }

    fn layout_entry(binding: &NativeBinding) -> wgpu::BindGroupLayoutEntry {
        let ty = match binding.ty {
            DescriptorType::UniformBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            DescriptorType::StorageBuffer => wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            DescriptorType::Sampler => {
                wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering)
            }
            DescriptorType::Texture | DescriptorType::CombinedSampler | DescriptorType::End => {
                wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                }
            }
        };
        wgpu::BindGroupLayoutEntry {
            binding: binding.binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty,
            count: None,
        }
    }

    /// Runs a native allocation inside out-of-memory and validation error
    /// scopes. A captured error becomes `ResourceError::BackendError`.
    fn scoped<T>(
        device: &wgpu::Device,
        what: &str,
        create: impl FnOnce() -> T,
    ) -> Result<T, ResourceError> {
        let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        // Scopes pop innermost first.
        let validation_error = pollster::block_on(validation.pop());
        let memory_error = pollster::block_on(out_of_memory.pop());
        match validation_error.or(memory_error) {
            Some(error) => {
                log::error!("WgpuDevice: failed to create {what}: {error}");
                Err(ResourceError::BackendError(format!("{what}: {error}")))
            }
            None => Ok(value),
        }
    }

    fn create_texture_2d(
        &self,
        label: Option<&str>,
        width: u32,
        height: u32,
        mip_levels: u32,
        format: TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Result<(wgpu::Texture, wgpu::TextureView), ResourceError> {
        let device = &self.context.device;
        Self::scoped(device, "texture", || {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label,
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: mip_levels,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: format.into_wgpu(),
                usage,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            (texture, view)
        })
    }

    /// Records a copy of `target` into the surface texture. Returns `false`
    /// if the two cannot be copied.
    fn copy_to_surface(
        engine: &mut FrameEngine<WgpuNative>,
        target: &WgpuRenderTarget,
        frame: &wgpu::SurfaceTexture,
    ) -> bool {
        let source_format: wgpu::TextureFormat = target.descriptor.format.into_wgpu();
        if source_format.remove_srgb_suffix() != frame.texture.format().remove_srgb_suffix() {
            log::warn!(
                "Cannot present a {:?} render target to a {:?} surface",
                source_format,
                frame.texture.format()
            );
            return false;
        }
        let extent = wgpu::Extent3d {
            width: target.descriptor.width.min(frame.texture.width()),
            height: target.descriptor.height.min(frame.texture.height()),
            depth_or_array_layers: 1,
        };
        let (_, commands) = Self::recording_parts(engine);
        commands.encoder_mut().copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &frame.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            extent,
        );
        true
    }
}

impl GraphicsDevice for WgpuDevice {
    fn backend_type(&self) -> GraphicsBackendType {
        self.context.adapter_info.backend.into_wgpu()
    }

    fn adapter_info(&self) -> AdapterInfo {
        self.context.adapter_info()
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
        swapchain
            .validate()
            .map_err(|e| RenderError::Internal(format!("{e:#}")))?;
        if swapchain.frames_in_flight != self.engine.frames().depth() {
            self.engine.resize(
                swapchain.frames_in_flight,
                Self::release_ephemeral(&mut self.buffers),
            )?;
        }
        self.context
            .configure_surface(&swapchain)
            .map_err(|e| RenderError::SurfaceAcquisitionFailed(format!("{e:#}")))?;
        self.settings.swapchain = swapchain;
        Ok(())
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<BufferHandle, ResourceError> {
        descriptor.validate(contents)?;
        let mut usage: wgpu::BufferUsages = descriptor.usage.into_wgpu();
        if contents.is_some() {
            usage |= wgpu::BufferUsages::COPY_DST;
        }
        let device = &self.context.device;
        let buffer = Self::scoped(device, "buffer", || {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size: align_up(descriptor.size, wgpu::COPY_BUFFER_ALIGNMENT),
                usage,
                mapped_at_creation: false,
            })
        })?;
        if let Some(data) = contents.filter(|data| !data.is_empty()) {
            let mut padded = data.to_vec();
            padded.resize(align_up(data.len() as u64, BUFFER_COPY_ALIGNMENT) as usize, 0);
            self.context.queue.write_buffer(&buffer, 0, &padded);
        }
        let handle = self.buffers.insert(BufferEntry::Static(WgpuBuffer {
            buffer,
            usage: descriptor.usage,
        }));
        log::debug!("WgpuDevice: created buffer {handle:?} ({} bytes)", descriptor.size);
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

        let mut padded = contents.to_vec();
        padded.resize(size as usize, 0);
        let native = self.engine.native();
        native.queue().write_buffer(native.ring(), offset, &padded);

        let handle = self
            .buffers
            .insert(BufferEntry::Ephemeral { offset, size, usage });
        self.engine.track_ephemeral(handle);
        Ok(handle)
    }

    fn create_sampler(
        &mut self,
        descriptor: &SamplerDescriptor,
    ) -> Result<SamplerHandle, ResourceError> {
        let device = &self.context.device;
        let sampler = Self::scoped(device, "sampler", || {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: descriptor.label.as_deref(),
                address_mode_u: descriptor.address_mode_u.into_wgpu(),
                address_mode_v: descriptor.address_mode_v.into_wgpu(),
                address_mode_w: descriptor.address_mode_w.into_wgpu(),
                mag_filter: descriptor.mag_filter.into_wgpu(),
                min_filter: descriptor.min_filter.into_wgpu(),
                mipmap_filter: descriptor.mip_filter.into_wgpu(),
                compare: descriptor.compare.map(IntoWgpu::into_wgpu),
                ..Default::default()
            })
        })?;
        Ok(self.samplers.insert(sampler))
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        contents: Option<&[u8]>,
    ) -> Result<TextureHandle, ResourceError> {
        descriptor.validate(contents, self.caps.max_texture_dimension_2d)?;
        let mut usage: wgpu::TextureUsages = descriptor.usage.into_wgpu();
        if contents.is_some() {
            usage |= wgpu::TextureUsages::COPY_DST;
        }
        let (texture, view) = self.create_texture_2d(
            descriptor.label.as_deref(),
            descriptor.width,
            descriptor.height,
            descriptor.mip_levels,
            descriptor.format,
            usage,
        )?;
        if let Some(data) = contents {
            self.context.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(descriptor.bytes_per_row()),
                    rows_per_image: Some(descriptor.height),
                },
                wgpu::Extent3d {
                    width: descriptor.width,
                    height: descriptor.height,
                    depth_or_array_layers: 1,
                },
            );
        }
        Ok(self.textures.insert(WgpuTexture {
            texture,
            view,
            descriptor: descriptor.clone(),
        }))
    }

    fn create_render_target(
        &mut self,
        descriptor: &RenderTargetDescriptor,
    ) -> Result<RenderTargetHandle, ResourceError> {
        descriptor.validate(self.caps.max_texture_dimension_2d)?;
        if descriptor.sampled && descriptor.format.is_depth() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render target '{}': sampled depth targets are not supported",
                descriptor.label.as_deref().unwrap_or("unnamed")
            )));
        }
        let (texture, view) = self.create_texture_2d(
            descriptor.label.as_deref(),
            descriptor.width,
            descriptor.height,
            1,
            descriptor.format,
            descriptor.into_wgpu(),
        )?;
        Ok(self.render_targets.insert(WgpuRenderTarget {
            texture,
            view,
            descriptor: descriptor.clone(),
        }))
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
            let target = &targets.get(handle).descriptor;
            (target.format, target.width, target.height)
        })?;
        let color_views = descriptor
            .color_targets
            .iter()
            .map(|handle| targets.get(*handle).view.clone())
            .collect();
        let depth_view = descriptor
            .depth_target
            .map(|handle| targets.get(handle).view.clone());
        Ok(self.framebuffers.insert(WgpuFramebuffer {
            descriptor: descriptor.clone(),
            color_views,
            depth_view,
            extent,
        }))
    }

    fn create_descriptor_set_layout(
        &mut self,
        descriptor: &DescriptorSetLayoutDescriptor,
    ) -> Result<DescriptorSetLayoutHandle, ResourceError> {
        let entries: Vec<wgpu::BindGroupLayoutEntry> =
            expand_layouts(&[descriptor.entries()], BindingModel::PerSet)
                .iter()
                .map(Self::layout_entry)
                .collect();
        let layout = self
            .context
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: descriptor.label.as_deref(),
                entries: &entries,
            });
        Ok(self.layouts.insert(WgpuDescriptorSetLayout {
            descriptor: descriptor.clone(),
            layout,
        }))
    }

    fn create_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
    ) -> Result<PipelineHandle, ResourceError> {
        let pass = self.render_passes.get(descriptor.render_pass);
        descriptor.validate(pass, self.caps.max_descriptor_sets)?;
        let layouts: Vec<&WgpuDescriptorSetLayout> = descriptor
            .descriptor_set_layouts
            .iter()
            .map(|handle| self.layouts.get(*handle))
            .collect();

        let shaders = self.shaders.load_pipeline(descriptor, ShaderDialect::Wgsl)?;
        let layout_descriptors: Vec<&DescriptorSetLayoutDescriptor> =
            layouts.iter().map(|layout| &layout.descriptor).collect();
        let mismatches =
            shaders.check_bindings(descriptor.label(), &layout_descriptors, BindingModel::PerSet);

        let device = &self.context.device;
        let label = descriptor.label.as_deref();
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex_module = Self::shader_module(device, &shaders.vertex)?;
        let fragment_module = shaders
            .fragment
            .as_ref()
            .map(|fragment| Self::shader_module(device, fragment))
            .transpose()?;

        let bind_group_layouts: Vec<Option<&wgpu::BindGroupLayout>> =
            layouts.iter().map(|layout| Some(&layout.layout)).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label,
            bind_group_layouts: &bind_group_layouts,
            immediate_size: 0,
        });

        let attributes: Vec<Vec<wgpu::VertexAttribute>> = descriptor
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: attribute.format.into_wgpu(),
                        offset: attribute.offset,
                        shader_location: attribute.location,
                    })
                    .collect()
            })
            .collect();
        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = descriptor
            .vertex_layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let blend = descriptor.blend.into_wgpu();
        let targets: Vec<Option<wgpu::ColorTargetState>> = pass
            .color_attachments
            .iter()
            .map(|attachment| {
                Some(wgpu::ColorTargetState {
                    format: attachment.format.into_wgpu(),
                    blend,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();
        let depth_stencil = pass.depth_attachment.map(|attachment| {
            let depth = descriptor.depth.unwrap_or(DepthState {
                write: false,
                compare: CompareFunction::Always,
            });
            wgpu::DepthStencilState {
                format: attachment.format.into_wgpu(),
                depth_write_enabled: Some(depth.write),
                depth_compare: Some(depth.compare.into_wgpu()),
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }
        });
        let fragment = match (&fragment_module, &descriptor.fragment) {
            (Some(module), Some(stage)) => Some(wgpu::FragmentState {
                module,
                entry_point: Some(&*stage.entry_point),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            _ => None,
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label,
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some(&*descriptor.vertex.entry_point),
                compilation_options: Default::default(),
                buffers: &vertex_buffers,
            },
            primitive: wgpu::PrimitiveState {
                topology: descriptor.topology.into_wgpu(),
                cull_mode: descriptor.cull_mode.into_wgpu(),
                ..Default::default()
            },
            depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            fragment,
            multiview_mask: None,
            cache: None,
        });

        if let Some(error) = pollster::block_on(scope.pop()) {
            return Err(PipelineError::CompilationFailed {
                label: descriptor.label.as_ref().map(|l| l.to_string()),
                details: error.to_string(),
            }
            .into());
        }

        let handle = self.pipelines.insert(WgpuPipeline {
            pipeline,
            render_pass: descriptor.render_pass,
            descriptor_set_layouts: descriptor.descriptor_set_layouts.clone(),
            mismatches,
        });
        log::debug!("WgpuDevice: created pipeline '{}'", descriptor.label());
        Ok(handle)
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let BufferEntry::Ephemeral { .. } = self.buffers.get(buffer) {
            panic!("ephemeral buffers cannot be deleted explicitly");
        }
        if let BufferEntry::Static(native) = self.buffers.remove(buffer) {
            self.engine.defer_release(DeferredResource::Buffer(native));
        }
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

        let mut surface_texture = None;
        let mut acquire_error = None;
        if let Some(image) = image {
            let target = self.render_targets.get(image);
            match self.context.acquire_surface_texture() {
                Ok(Some(frame)) => {
                    if Self::copy_to_surface(&mut self.engine, target, &frame) {
                        surface_texture = Some(frame);
                    }
                }
                Ok(None) => {}
                Err(e) => acquire_error = Some(e),
            }
        }

        // The frame is submitted even when there is nothing to present, so
        // its slot and deletions retire normally.
        self.engine.present_frame()?;
        if let Some(frame) = surface_texture {
            frame.present();
        }
        match acquire_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
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
        self.buffers.clear_with(|_, entry| {
            if let BufferEntry::Static(buffer) = entry {
                live += 1;
                native.release(DeferredResource::Buffer(buffer));
            }
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

        log::info!(
            "wgpu device shut down, {live} live resources released ({} in total)",
            native.released()
        );
        result
    }

    fn begin_render_pass(&mut self, pass: RenderPassHandle, framebuffer: FramebufferHandle) {
        let framebuffer = self.framebuffers.get(framebuffer);
        assert!(
            framebuffer.descriptor.render_pass == pass,
            "framebuffer was created for a different render pass"
        );
        let descriptor = self.render_passes.get(pass);
        self.recording.begin_render_pass(pass);
        self.bound_pipeline = None;

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = descriptor
            .color_attachments
            .iter()
            .zip(&framebuffer.color_views)
            .map(|(attachment, view)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: attachment_ops(
                        attachment.load,
                        attachment.store,
                        clear_color(attachment.clear_color),
                    ),
                })
            })
            .collect();
        let depth_stencil_attachment = descriptor
            .depth_attachment
            .as_ref()
            .zip(framebuffer.depth_view.as_ref())
            .map(|(attachment, view)| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(attachment_ops(
                    attachment.load,
                    attachment.store,
                    attachment.clear_depth,
                )),
                stencil_ops: (attachment.format == TextureFormat::Depth24PlusStencil8).then_some(
                    wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Discard,
                    },
                ),
            });

        let (_, commands) = Self::recording_parts(&mut self.engine);
        let render_pass = commands
            .encoder_mut()
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: descriptor.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            })
            .forget_lifetime();
        commands.pass = Some(render_pass);
    }

    fn end_render_pass(&mut self) {
        self.recording.end_render_pass();
        self.bound_pipeline = None;
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands.pass = None;
    }

    fn bind_pipeline(&mut self, pipeline: PipelineHandle) {
        let entry = self.pipelines.get(pipeline);
        assert!(
            self.recording.render_pass() == Some(entry.render_pass),
            "pipeline was created for a different render pass"
        );
        self.recording.bind_pipeline(pipeline);
        self.bound_pipeline = Some(pipeline);
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands.pass_mut().set_pipeline(&entry.pipeline);
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat) {
        self.recording.bind_index_buffer();
        let entry = self.buffers.get(buffer);
        assert!(
            entry.usage().contains(BufferUsage::INDEX),
            "bind_index_buffer called with a buffer lacking INDEX usage"
        );
        let (native, commands) = Self::recording_parts(&mut self.engine);
        commands
            .pass_mut()
            .set_index_buffer(entry.slice(native.ring()), format.into_wgpu());
    }

    fn bind_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle) {
        self.recording.assert_in_pass("bind_vertex_buffer");
        let entry = self.buffers.get(buffer);
        assert!(
            entry.usage().contains(BufferUsage::VERTEX),
            "bind_vertex_buffer called with a buffer lacking VERTEX usage"
        );
        let (native, commands) = Self::recording_parts(&mut self.engine);
        commands
            .pass_mut()
            .set_vertex_buffer(slot, entry.slice(native.ring()));
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
        let pipeline_layouts = &self.pipelines.get(pipeline).descriptor_set_layouts;
        assert!(
            pipeline_layouts.get(index as usize) == Some(&layout),
            "descriptor set {index} does not use the bound pipeline's layout"
        );
        let set_layout = self.layouts.get(layout);
        let layout_entries = set_layout.descriptor.entries();
        assert_descriptors_match(layout_entries, descriptors);

        let (native, commands) = Self::recording_parts(&mut self.engine);
        let ring = native.ring();
        let mut entries = Vec::with_capacity(descriptors.len());
        for (slot, descriptor) in descriptors.iter().enumerate() {
            let binding = native_binding_index(&[layout_entries], 0, slot, BindingModel::PerSet);
            match *descriptor {
                Descriptor::UniformBuffer {
                    buffer,
                    offset,
                    size,
                }
                | Descriptor::StorageBuffer {
                    buffer,
                    offset,
                    size,
                } => entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Buffer(
                        self.buffers.get(buffer).binding(ring, offset, size),
                    ),
                }),
                Descriptor::Sampler(sampler) => entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::Sampler(self.samplers.get(sampler)),
                }),
                Descriptor::Texture(texture) => entries.push(wgpu::BindGroupEntry {
                    binding,
                    resource: wgpu::BindingResource::TextureView(&self.textures.get(texture).view),
                }),
                Descriptor::RenderTarget(target) => {
                    let target = self.render_targets.get(target);
                    assert!(
                        target.descriptor.sampled,
                        "render target bound as a texture was not created as sampled"
                    );
                    entries.push(wgpu::BindGroupEntry {
                        binding,
                        resource: wgpu::BindingResource::TextureView(&target.view),
                    });
                }
                Descriptor::CombinedSampler { texture, sampler } => {
                    entries.push(wgpu::BindGroupEntry {
                        binding,
                        resource: wgpu::BindingResource::TextureView(
                            &self.textures.get(texture).view,
                        ),
                    });
                    entries.push(wgpu::BindGroupEntry {
                        binding: binding + 1,
                        resource: wgpu::BindingResource::Sampler(self.samplers.get(sampler)),
                    });
                }
            }
        }

        let bind_group = native
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: set_layout.descriptor.label.as_deref(),
                layout: &set_layout.layout,
                entries: &entries,
            });
        commands.pass_mut().set_bind_group(index, &bind_group, &[]);
        commands.bind_groups.push(bind_group);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.recording.assert_in_pass("set_viewport");
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands.pass_mut().set_viewport(
            viewport.x,
            viewport.y,
            viewport.width,
            viewport.height,
            viewport.min_depth,
            viewport.max_depth,
        );
    }

    fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.recording.assert_in_pass("set_scissor_rect");
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands
            .pass_mut()
            .set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32) {
        self.recording.draw();
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands
            .pass_mut()
            .draw(first_vertex..first_vertex + vertex_count, 0..1);
    }

    fn draw_indexed_instanced(&mut self, index_count: u32, instance_count: u32) {
        self.recording.draw_indexed();
        let (_, commands) = Self::recording_parts(&mut self.engine);
        commands
            .pass_mut()
            .draw_indexed(0..index_count, 0, 0..instance_count);
    }

    fn stats(&self) -> FrameStats {
        FrameStats {
            draw_calls: self.recording.draw_calls(),
            ..self.engine.stats()
        }
    }
}

impl Drop for WgpuDevice {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("wgpu device shutdown failed: {e}");
        }
    }
}
