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

//! Renders a spinning triangle offscreen for a fixed number of frames and
//! logs the frame statistics.
//!
//! Settings are read from `sandbox.ron` in the working directory when it
//! exists. Build with `--features null` to run without a GPU.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use std::path::Path;
use strata_core::renderer::api::*;
use strata_core::renderer::shader::ShaderMacros;
use strata_core::renderer::GraphicsDevice;
use strata_infra::shader::FsShaderSource;

const FRAMES: u32 = 240;
const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct Vertex {
    position: [f32; 2],
    color: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FrameUniform {
    rotation: [f32; 4],
    tint: [f32; 4],
}

const TRIANGLE: [Vertex; 3] = [
    Vertex {
        position: [0.0, 0.6],
        color: [1.0, 0.2, 0.2],
    },
    Vertex {
        position: [-0.6, -0.4],
        color: [0.2, 1.0, 0.2],
    },
    Vertex {
        position: [0.6, -0.4],
        color: [0.2, 0.2, 1.0],
    },
];

fn load_settings() -> Result<DeviceSettings> {
    let path = Path::new("sandbox.ron");
    let mut settings = if path.exists() {
        DeviceSettings::load(path)?
    } else {
        DeviceSettings::default()
    };
    settings.swapchain.width = WIDTH;
    settings.swapchain.height = HEIGHT;
    Ok(settings)
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .init();

    let shaders = FsShaderSource::new(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders"));
    let mut device = strata_infra::create_device(load_settings()?, shaders)?;
    let info = device.adapter_info();
    log::info!(
        "Running on {} ({:?}, {:?})",
        info.name,
        info.backend_type,
        info.device_type
    );

    // --- Static resources ---
    let target = device.create_render_target(&RenderTargetDescriptor {
        label: Some("Sandbox Color".into()),
        width: WIDTH,
        height: HEIGHT,
        format: TextureFormat::Rgba8UnormSrgb,
        sampled: false,
    })?;
    let pass = device.create_render_pass(&RenderPassDescriptor {
        label: Some("Sandbox Pass".into()),
        color_attachments: vec![ColorAttachment::cleared(
            TextureFormat::Rgba8UnormSrgb,
            [0.05, 0.05, 0.08, 1.0],
        )],
        depth_attachment: None,
    })?;
    let framebuffer = device.create_framebuffer(&FramebufferDescriptor {
        label: Some("Sandbox Framebuffer".into()),
        render_pass: pass,
        color_targets: vec![target],
        depth_target: None,
    })?;
    let layout = device.create_descriptor_set_layout(
        &DescriptorSetLayoutDescriptor::new(&[DescriptorType::UniformBuffer])
            .with_label("Frame Uniforms"),
    )?;

    let mut macros = ShaderMacros::new();
    macros.insert("TINTED".to_owned(), String::new());
    let pipeline = device.create_pipeline(&PipelineDescriptor {
        label: Some("Triangle".into()),
        vertex: ShaderStageSource::new("triangle", "vs_main"),
        fragment: Some(ShaderStageSource::new("triangle", "fs_main")),
        macros,
        vertex_layouts: vec![VertexBufferLayout::packed(
            0,
            &[VertexFormat::Float32x2, VertexFormat::Float32x3],
        )],
        descriptor_set_layouts: vec![layout],
        render_pass: pass,
        topology: PrimitiveTopology::TriangleList,
        cull_mode: CullMode::None,
        blend: BlendMode::Opaque,
        depth: None,
    })?;

    let vertices = bytemuck::cast_slice(&TRIANGLE);
    let mut vertex_buffer = device.create_buffer(
        &BufferDescriptor::new(vertices.len() as u64, BufferUsage::VERTEX)
            .with_label("Triangle Vertices"),
        Some(vertices),
    )?;

    // --- Frame loop ---
    for frame in 0..FRAMES {
        // The replaced buffer is released once the frames using it retire.
        if frame > 0 && frame % 60 == 0 {
            device.delete_buffer(vertex_buffer);
            vertex_buffer = device.create_buffer(
                &BufferDescriptor::new(vertices.len() as u64, BufferUsage::VERTEX),
                Some(vertices),
            )?;
        }

        device.begin_frame()?;
        let angle = frame as f32 * 0.03;
        let uniform = device.create_ephemeral_uniform(&FrameUniform {
            rotation: [angle.cos(), angle.sin(), 0.0, 0.0],
            tint: [1.0, 1.0, 1.0, 1.0],
        })?;

        device.begin_render_pass(pass, framebuffer);
        device.bind_pipeline(pipeline);
        device.set_viewport(Viewport::full(WIDTH, HEIGHT));
        device.bind_vertex_buffer(0, vertex_buffer);
        device.bind_descriptor_set(0, layout, &[Descriptor::uniform(uniform)]);
        device.draw(0, TRIANGLE.len() as u32);
        device.end_render_pass();
        device.present_frame(Some(target))?;

        if (frame + 1) % 60 == 0 {
            let stats = device.stats();
            log::info!(
                "frame #{}: synced #{}, {} in flight, {} deletions pending, {} released, {} ring bytes",
                stats.frame_number,
                stats.last_synced_frame,
                stats.outstanding_frames,
                stats.pending_deletions,
                stats.released_resources,
                stats.ring_frame_usage
            );
        }
    }

    device.wait_idle()?;
    device.shutdown()?;
    Ok(())
}
