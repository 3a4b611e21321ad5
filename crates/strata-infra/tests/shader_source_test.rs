//! Shader sources on disk and binding validation at pipeline creation.

use std::fs;
use strata_core::renderer::shader::{
    PassthroughCompiler, ShaderDialect, ShaderLibrary, ShaderMacros, ShaderSourceProvider,
};
use strata_core::renderer::ShaderError;
use strata_infra::shader::FsShaderSource;

#[test]
fn test_fs_source_resolves_names_under_its_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("post")).unwrap();
    fs::write(dir.path().join("post/blur.wgsl"), "// blur").unwrap();
    let source = FsShaderSource::new(dir.path());

    assert_eq!(source.load("post/blur").unwrap(), "// blur");
}

#[test]
fn test_fs_source_reports_missing_files_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let source = FsShaderSource::new(dir.path());

    let err = source.load("nope").unwrap_err();

    assert!(matches!(err, ShaderError::NotFound { name } if name == "nope"));
}

#[test]
fn test_fs_source_refuses_to_leave_its_root() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("shaders");
    fs::create_dir(&root).unwrap();
    fs::write(dir.path().join("secret.wgsl"), "// outside").unwrap();
    let source = FsShaderSource::new(&root);

    assert!(matches!(
        source.load("../secret"),
        Err(ShaderError::NotFound { .. })
    ));
}

#[test]
fn test_library_reloads_after_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tint.wgsl");
    fs::write(&path, "// v1").unwrap();
    let mut library = ShaderLibrary::new(FsShaderSource::new(dir.path()), PassthroughCompiler);
    let macros = ShaderMacros::new();

    let first = library.load("tint", &macros, ShaderDialect::Wgsl).unwrap();
    fs::write(&path, "// v2").unwrap();
    let cached = library.load("tint", &macros, ShaderDialect::Wgsl).unwrap();
    library.invalidate();
    let reloaded = library.load("tint", &macros, ShaderDialect::Wgsl).unwrap();

    assert_eq!(first.text(), cached.text());
    assert!(reloaded.text().unwrap().contains("v2"));
}

#[cfg(feature = "wgpu")]
mod reflected {
    use strata_core::renderer::api::*;
    use strata_core::renderer::shader::{MemoryShaderSource, ShaderLibrary, ShaderMacros};
    use strata_core::renderer::GraphicsDevice;
    use strata_infra::graphics::null::NullDevice;
    use strata_infra::shader::WgslCompiler;

    const LIT: &str = r#"
struct Globals { tint: vec4<f32> };
@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

@vertex
fn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {
    return vec4<f32>(f32(i), 0.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) p: vec4<f32>) -> @location(0) vec4<f32> {
    return globals.tint * textureSample(albedo, albedo_sampler, p.xy);
}
"#;

    fn create(layout: &[DescriptorType]) -> (NullDevice, PipelineHandle) {
        let shaders = ShaderLibrary::new(MemoryShaderSource::new().with("lit", LIT), WgslCompiler);
        let mut device = NullDevice::new(DeviceSettings::default(), shaders).unwrap();
        let pass = device
            .create_render_pass(&RenderPassDescriptor {
                color_attachments: vec![ColorAttachment::cleared(
                    TextureFormat::Bgra8UnormSrgb,
                    [0.0; 4],
                )],
                ..Default::default()
            })
            .unwrap();
        let layout = device
            .create_descriptor_set_layout(&DescriptorSetLayoutDescriptor::new(layout))
            .unwrap();
        let pipeline = device
            .create_pipeline(&PipelineDescriptor {
                label: Some("lit".into()),
                vertex: ShaderStageSource::new("lit", "vs_main"),
                fragment: Some(ShaderStageSource::new("lit", "fs_main")),
                macros: ShaderMacros::new(),
                vertex_layouts: Vec::new(),
                descriptor_set_layouts: vec![layout],
                render_pass: pass,
                topology: PrimitiveTopology::TriangleList,
                cull_mode: CullMode::None,
                blend: BlendMode::AlphaBlend,
                depth: None,
            })
            .unwrap();
        (device, pipeline)
    }

    #[test]
    fn test_matching_layout_reports_no_mismatch() {
        let (device, pipeline) =
            create(&[DescriptorType::UniformBuffer, DescriptorType::CombinedSampler]);

        assert!(device.pipeline_mismatches(pipeline).is_empty());
    }

    #[test]
    fn test_mismatches_are_reported_but_not_fatal() {
        let (device, pipeline) = create(&[DescriptorType::StorageBuffer]);

        let mismatches = device.pipeline_mismatches(pipeline);

        assert!(mismatches.iter().any(|m| m.binding == 0
            && m.kind
                == MismatchKind::TypeMismatch {
                    declared: DescriptorType::UniformBuffer,
                    expected: DescriptorType::StorageBuffer,
                }));
        assert!(mismatches
            .iter()
            .any(|m| m.binding == 1 && m.kind == MismatchKind::MissingBinding));
    }
}
