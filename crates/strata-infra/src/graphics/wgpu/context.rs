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
use super::conversions::IntoWgpu;
use anyhow::{anyhow, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_core::renderer::api::{AdapterInfo, DeviceCaps, DeviceSettings, SwapchainSettings};
use strata_core::renderer::diagnostics::{report_diagnostic, DiagnosticSeverity};
use strata_core::renderer::RenderError;

/// Holds the core wgpu state objects a device renders with.
///
/// The surface is optional: without one the device renders offscreen and
/// `present_frame` only submits.
#[derive(Debug)]
pub struct WgpuGraphicsContext {
    /// The presentation surface, absent for offscreen devices.
    pub surface: Option<wgpu::Surface<'static>>,
    /// The surface's current configuration, once configured.
    pub surface_config: Option<wgpu::SurfaceConfiguration>,
    /// The adapter the device was requested from.
    pub adapter: wgpu::Adapter,
    /// The logical device.
    pub device: wgpu::Device,
    /// The device's submission queue.
    pub queue: wgpu::Queue,

    /// Cached adapter description.
    pub adapter_info: wgpu::AdapterInfo,
    /// Limits the device was created with.
    pub device_limits: wgpu::Limits,
    lost: Arc<AtomicBool>,
}

impl WgpuGraphicsContext {
    /// Asynchronously creates the instance, adapter, device and queue, and
    /// configures the surface if a target is given.
    ///
    /// ## Arguments
    /// * `settings` - Validation flags and the initial swapchain parameters.
    /// * `target` - The window to present to, or `None` for offscreen rendering.
    ///
    /// ## Returns
    /// * `Result<Self>` - The initialized context or the step that failed.
    pub async fn new(
        settings: &DeviceSettings,
        target: Option<wgpu::SurfaceTarget<'static>>,
    ) -> Result<Self> {
        log::info!("Initializing wgpu graphics context...");

        // --- 1. Create Instance and Surface ---
        let mut instance_desc = wgpu::InstanceDescriptor::new_without_display_handle();
        instance_desc.flags = if settings.debug_validation {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::empty()
        };
        let instance = wgpu::Instance::new(instance_desc);

        let surface = match target {
            Some(target) => Some(
                instance
                    .create_surface(target)
                    .context("Failed to create surface")?,
            ),
            None => None,
        };

        // --- 2. Select Adapter ---
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: surface.as_ref(),
            })
            .await
            .map_err(|e| anyhow!("No suitable graphics adapter: {e}"))?;
        let adapter_info = adapter.get_info();
        log::info!(
            "Using graphics adapter: \"{}\" (Backend: {:?})",
            adapter_info.name,
            adapter_info.backend
        );

        // --- 3. Create Logical Device and Command Queue ---
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Strata Logical Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow!("Failed to create logical device: {e}"))?;
        log::info!("Logical device and command queue created.");

        let strict = settings.strict_validation;
        device.on_uncaptured_error(Arc::new(move |e: wgpu::Error| {
            let severity = match e {
                wgpu::Error::OutOfMemory { .. } | wgpu::Error::Validation { .. } => {
                    DiagnosticSeverity::Error
                }
                wgpu::Error::Internal { .. } => DiagnosticSeverity::Warning,
            };
            report_diagnostic(severity, &e.to_string(), strict);
        }));

        let lost = Arc::new(AtomicBool::new(false));
        let lost_flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::error!("wgpu device lost ({reason:?}): {message}");
            lost_flag.store(true, Ordering::Release);
        });

        let device_limits = device.limits();
        log::debug!("Device limits: {device_limits:?}");

        let mut context = WgpuGraphicsContext {
            surface,
            surface_config: None,
            adapter,
            device,
            queue,
            adapter_info,
            device_limits,
            lost,
        };

        // --- 4. Configure Surface ---
        if context.surface.is_some() {
            context.configure_surface(&settings.swapchain)?;
        }
        Ok(context)
    }

    /// Configures (or reconfigures) the surface for `swapchain`.
    ///
    /// The surface texture must accept copies, since frames are rendered to
    /// render targets and copied in at presentation.
    pub fn configure_surface(&mut self, swapchain: &SwapchainSettings) -> Result<()> {
        let Some(surface) = &self.surface else {
            return Ok(());
        };
        let surface_caps = surface.get_capabilities(&self.adapter);
        if !surface_caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            return Err(anyhow!("The surface does not accept copies into its textures"));
        }
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("The surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_DST,
            format,
            width: swapchain.width.max(1),
            height: swapchain.height.max(1),
            present_mode: if swapchain.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            desired_maximum_frame_latency: swapchain.frames_in_flight.clamp(1, 3) as u32,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&self.device, &config);
        log::info!(
            "Surface configured: {}x{} {:?} ({:?})",
            config.width,
            config.height,
            config.format,
            config.present_mode
        );
        self.surface_config = Some(config);
        Ok(())
    }

    /// Returns the next surface texture, or `None` when there is nothing to
    /// present to this frame (no surface, occluded window, timeout).
    ///
    /// An outdated or lost surface is reconfigured and skipped for one frame.
    pub fn acquire_surface_texture(&mut self) -> Result<Option<wgpu::SurfaceTexture>, RenderError> {
        let Some(surface) = &self.surface else {
            return Ok(None);
        };
        match surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(texture) => Ok(Some(texture)),
            wgpu::CurrentSurfaceTexture::Suboptimal(texture) => {
                log::debug!("Surface texture is suboptimal");
                Ok(Some(texture))
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                log::debug!("No surface texture available this frame");
                Ok(None)
            }
            wgpu::CurrentSurfaceTexture::Outdated | wgpu::CurrentSurfaceTexture::Lost => {
                log::warn!("Surface outdated or lost, reconfiguring");
                if let Some(config) = &self.surface_config {
                    surface.configure(&self.device, config);
                }
                Ok(None)
            }
            wgpu::CurrentSurfaceTexture::Validation => Err(RenderError::SurfaceAcquisitionFailed(
                "validation error while acquiring the surface texture".to_owned(),
            )),
        }
    }

    /// Returns `true` once the driver reported the device as lost.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// A shared view of the lost flag for the native backend.
    pub fn lost_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.lost)
    }

    /// Adapter information in API terms.
    pub fn adapter_info(&self) -> AdapterInfo {
        AdapterInfo {
            name: self.adapter_info.name.clone().into(),
            backend_type: self.adapter_info.backend.into_wgpu(),
            device_type: self.adapter_info.device_type.into_wgpu(),
        }
    }

    /// The limits the device layer needs, read from the device.
    pub fn caps(&self) -> DeviceCaps {
        let limits = &self.device_limits;
        DeviceCaps {
            uniform_buffer_alignment: limits.min_uniform_buffer_offset_alignment as u64,
            storage_buffer_alignment: limits.min_storage_buffer_offset_alignment as u64,
            max_texture_dimension_2d: limits.max_texture_dimension_2d,
            max_descriptor_sets: limits.max_bind_groups,
            max_color_attachments: limits.max_color_attachments,
        }
    }
}
