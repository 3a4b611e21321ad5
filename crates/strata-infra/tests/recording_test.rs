//! Command recording through the null device: render passes, pipelines and
//! descriptor sets.

use strata_core::renderer::api::*;
use strata_core::renderer::shader::{
    MemoryShaderSource, PassthroughCompiler, ShaderLibrary, ShaderMacros,
};
use strata_core::renderer::{GraphicsDevice, ResourceError, ShaderError};
use strata_core::sync::ResourceKind;
use strata_infra::graphics::null::NullDevice;

const TRIANGLE: &str = "fn vs_main() {}\nfn fs_main() {}\n";

/// Everything needed to draw into one color target.
struct Scene {
    device: NullDevice,
    target: RenderTargetHandle,
    pass: RenderPassHandle,
    framebuffer: FramebufferHandle,
    layout: DescriptorSetLayoutHandle,
    pipeline: PipelineHandle,
}

fn pipeline_descriptor(
    pass: RenderPassHandle,
    layouts: Vec<DescriptorSetLayoutHandle>,
) -> PipelineDescriptor {
    PipelineDescriptor {
        label: Some("triangle".into()),
        vertex: ShaderStageSource::new("triangle", "vs_main"),
        fragment: Some(ShaderStageSource::new("triangle", "fs_main")),
        macros: ShaderMacros::new(),
        vertex_layouts: vec![VertexBufferLayout::packed(
            0,
            &[VertexFormat::Float32x3, VertexFormat::Float32x2],
        )],
        descriptor_set_layouts: layouts,
        render_pass: pass,
        topology: PrimitiveTopology::TriangleList,
        cull_mode: CullMode::Back,
        blend: BlendMode::Opaque,
        depth: None,
    }
}

fn scene() -> Scene {
    let shaders = ShaderLibrary::new(
        MemoryShaderSource::new().with("triangle", TRIANGLE),
        PassthroughCompiler,
    );
    let mut device = NullDevice::new(DeviceSettings::default(), shaders).unwrap();

    let target = device
        .create_render_target(&RenderTargetDescriptor {
            label: Some("color".into()),
            width: 320,
            height: 240,
            format: TextureFormat::Rgba8Unorm,
            sampled: false,
        })
        .unwrap();
    let pass = device
        .create_render_pass(&RenderPassDescriptor {
            label: Some("main".into()),
            color_attachments: vec![ColorAttachment::cleared(
                TextureFormat::Rgba8Unorm,
                [0.1, 0.2, 0.3, 1.0],
            )],
            depth_attachment: None,
        })
        .unwrap();
    let framebuffer = device
        .create_framebuffer(&FramebufferDescriptor {
            label: None,
            render_pass: pass,
            color_targets: vec![target],
            depth_target: None,
        })
        .unwrap();
    let layout = device
        .create_descriptor_set_layout(&DescriptorSetLayoutDescriptor::new(&[
            DescriptorType::UniformBuffer,
            DescriptorType::CombinedSampler,
        ]))
        .unwrap();
    let pipeline = device
        .create_pipeline(&pipeline_descriptor(pass, vec![layout]))
        .unwrap();

    Scene {
        device,
        target,
        pass,
        framebuffer,
        layout,
        pipeline,
    }
}

fn vertices(device: &mut NullDevice) -> BufferHandle {
    let data = [0.0f32; 15];
    device
        .create_buffer(
            &BufferDescriptor::new(60, BufferUsage::VERTEX),
            Some(bytemuck::cast_slice(&data)),
        )
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Recording
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_draws_are_counted_per_frame() {
    // ARRANGE
    let mut s = scene();
    let vbo = vertices(&mut s.device);

    // ACT
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_pipeline(s.pipeline);
    s.device.set_viewport(Viewport::full(320, 240));
    s.device.set_scissor_rect(ScissorRect {
        x: 0,
        y: 0,
        width: 320,
        height: 240,
    });
    s.device.bind_vertex_buffer(0, vbo);
    s.device.draw(0, 3);
    s.device.draw(3, 2);
    s.device.end_render_pass();
    s.device.present_frame(Some(s.target)).unwrap();

    // ASSERT
    let stats = s.device.stats();
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.frame_number, 1);
}

#[test]
fn test_indexed_draw_with_ephemeral_geometry() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    let indices = s
        .device
        .create_ephemeral_buffer(BufferUsage::INDEX, bytemuck::cast_slice(&[0u16, 1, 2]))
        .unwrap();
    let vbo = s
        .device
        .create_ephemeral_buffer(BufferUsage::VERTEX, &[0u8; 60])
        .unwrap();

    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_pipeline(s.pipeline);
    s.device.bind_vertex_buffer(0, vbo);
    s.device.bind_index_buffer(indices, IndexFormat::Uint16);
    s.device.draw_indexed_instanced(3, 4);
    s.device.end_render_pass();
    s.device.present_frame(None).unwrap();

    assert_eq!(s.device.stats().draw_calls, 1);
    assert_eq!(s.device.buffer_contents(indices).len(), 6);
}

#[test]
#[should_panic(expected = "outside of a render pass")]
fn test_draw_outside_a_render_pass_panics() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    s.device.draw(0, 3);
}

#[test]
#[should_panic(expected = "without a bound pipeline")]
fn test_draw_without_a_pipeline_panics() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.draw(0, 3);
}

#[test]
#[should_panic(expected = "without a bound index buffer")]
fn test_indexed_draw_without_indices_panics() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_pipeline(s.pipeline);
    s.device.draw_indexed_instanced(3, 1);
}

#[test]
#[should_panic(expected = "render pass is still open")]
fn test_present_with_an_open_pass_panics() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    let _ = s.device.present_frame(None);
}

#[test]
#[should_panic(expected = "lacking INDEX usage")]
fn test_vertex_buffer_cannot_be_bound_as_indices() {
    let mut s = scene();
    let vbo = vertices(&mut s.device);
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_index_buffer(vbo, IndexFormat::Uint32);
}

// ─────────────────────────────────────────────────────────────────────────────
// Descriptor sets
// ─────────────────────────────────────────────────────────────────────────────

fn texture_and_sampler(device: &mut NullDevice) -> (TextureHandle, SamplerHandle) {
    let texture = device
        .create_texture(
            &TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8Unorm),
            Some(&[255u8; 16]),
        )
        .unwrap();
    let sampler = device.create_sampler(&SamplerDescriptor::default()).unwrap();
    (texture, sampler)
}

#[test]
fn test_descriptor_set_matching_the_layout_binds() {
    let mut s = scene();
    let (texture, sampler) = texture_and_sampler(&mut s.device);

    s.device.begin_frame().unwrap();
    let globals = s.device.create_ephemeral_uniform(&[1.0f32; 16]).unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_pipeline(s.pipeline);
    s.device.bind_descriptor_set(
        0,
        s.layout,
        &[
            Descriptor::uniform(globals),
            Descriptor::CombinedSampler { texture, sampler },
        ],
    );
    s.device.end_render_pass();

    assert!(s.device.present_frame(None).is_ok());
}

#[test]
#[should_panic(expected = "does not match its layout entry")]
fn test_descriptor_set_with_wrong_types_panics() {
    let mut s = scene();
    let (texture, sampler) = texture_and_sampler(&mut s.device);

    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_pipeline(s.pipeline);
    s.device.bind_descriptor_set(
        0,
        s.layout,
        &[
            Descriptor::CombinedSampler { texture, sampler },
            Descriptor::Sampler(sampler),
        ],
    );
}

#[test]
#[should_panic(expected = "without a bound pipeline")]
fn test_descriptor_set_needs_a_pipeline() {
    let mut s = scene();
    s.device.begin_frame().unwrap();
    s.device.begin_render_pass(s.pass, s.framebuffer);
    s.device.bind_descriptor_set(0, s.layout, &[]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Resource creation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_pipeline_with_unknown_shader_fails() {
    let mut s = scene();
    let mut descriptor = pipeline_descriptor(s.pass, vec![s.layout]);
    descriptor.vertex = ShaderStageSource::new("missing", "vs_main");

    let err = s.device.create_pipeline(&descriptor).unwrap_err();

    assert!(matches!(
        err,
        ResourceError::Shader(ShaderError::NotFound { ref name }) if name == "missing"
    ));
}

#[test]
fn test_framebuffer_must_match_its_pass() {
    let mut s = scene();
    let depth = s
        .device
        .create_render_target(&RenderTargetDescriptor {
            label: Some("depth".into()),
            width: 320,
            height: 240,
            format: TextureFormat::Depth32Float,
            sampled: false,
        })
        .unwrap();

    let result = s.device.create_framebuffer(&FramebufferDescriptor {
        label: Some("broken".into()),
        render_pass: s.pass,
        color_targets: vec![depth],
        depth_target: None,
    });

    assert!(matches!(result, Err(ResourceError::InvalidDescriptor(_))));
}

#[test]
fn test_texture_contents_must_cover_the_image() {
    let mut s = scene();

    let result = s.device.create_texture(
        &TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm),
        Some(&[0u8; 8]),
    );

    assert!(result.is_err());
}

#[test]
fn test_deleting_attachments_releases_them_by_kind() {
    let mut s = scene();

    s.device.delete_framebuffer(s.framebuffer);
    s.device.delete_render_target(s.target);
    s.device.delete_render_pass(s.pass);
    s.device.wait_idle().unwrap();
    s.device.shutdown().unwrap();

    assert_eq!(s.device.released(ResourceKind::Framebuffer), 1);
    assert_eq!(s.device.released(ResourceKind::RenderTarget), 1);
    assert_eq!(s.device.released(ResourceKind::RenderPass), 1);
}
