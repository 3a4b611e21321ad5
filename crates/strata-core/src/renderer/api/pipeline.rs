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

//! Graphics pipeline descriptors.

use super::handles::{DescriptorSetLayoutHandle, RenderPassHandle};
use super::pass::RenderPassDescriptor;
use super::texture::CompareFunction;
use crate::renderer::error::PipelineError;
use crate::renderer::shader::ShaderMacros;
use std::borrow::Cow;

/// The format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// One `f32`.
    Float32,
    /// Two `f32`s.
    Float32x2,
    /// Three `f32`s.
    Float32x3,
    /// Four `f32`s.
    Float32x4,
    /// One `u32`.
    Uint32,
    /// Four normalized `u8`s.
    Unorm8x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32 | VertexFormat::Uint32 | VertexFormat::Unorm8x4 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One attribute inside a vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    /// Attribute format.
    pub format: VertexFormat,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    /// Shader input location.
    pub location: u32,
}

/// The layout of one bound vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferLayout {
    /// Bytes between consecutive vertices.
    pub stride: u64,
    /// Attributes read from each vertex.
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// Packs `formats` tightly, assigning locations from `first_location`.
    pub fn packed(first_location: u32, formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .enumerate()
            .map(|(i, format)| {
                let attribute = VertexAttribute {
                    format: *format,
                    offset,
                    location: first_location + i as u32,
                };
                offset += format.size();
                attribute
            })
            .collect();
        Self {
            stride: offset,
            attributes,
        }
    }
}

/// Primitive assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent points.
    PointList,
    /// Independent lines.
    LineList,
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
}

/// Face culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// Draw both faces.
    #[default]
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Color blending applied to every color target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite the destination.
    #[default]
    Opaque,
    /// Classic `src * a + dst * (1 - a)`.
    AlphaBlend,
    /// `src + dst`.
    Additive,
}

/// Depth testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// Whether depth is written.
    pub write: bool,
    /// The depth test.
    pub compare: CompareFunction,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            write: true,
            compare: CompareFunction::Less,
        }
    }
}

/// A shader stage: the logical source name and the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStageSource {
    /// Name resolved by the shader source provider.
    pub name: Cow<'static, str>,
    /// Entry point inside the compiled module.
    pub entry_point: Cow<'static, str>,
}

impl ShaderStageSource {
    /// Creates a stage from a source name and an entry point.
    pub fn new(name: impl Into<Cow<'static, str>>, entry_point: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// Describes a graphics pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Vertex stage.
    pub vertex: ShaderStageSource,
    /// Fragment stage. Depth-only pipelines have none.
    pub fragment: Option<ShaderStageSource>,
    /// Macros passed to the shader preprocessor for both stages.
    pub macros: ShaderMacros,
    /// Vertex buffers, by slot.
    pub vertex_layouts: Vec<VertexBufferLayout>,
    /// Descriptor set layouts, by set index.
    pub descriptor_set_layouts: Vec<DescriptorSetLayoutHandle>,
    /// Render pass whose attachments the pipeline writes.
    pub render_pass: RenderPassHandle,
    /// Primitive assembly.
    pub topology: PrimitiveTopology,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Blending for every color target.
    pub blend: BlendMode,
    /// Depth test, used when the render pass has a depth attachment.
    pub depth: Option<DepthState>,
}

impl PipelineDescriptor {
    /// The label used in logs and errors.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("unnamed")
    }

    /// Checks the pipeline against the render pass it targets and the
    /// device's descriptor set limit.
    pub fn validate(
        &self,
        pass: &RenderPassDescriptor,
        max_descriptor_sets: u32,
    ) -> Result<(), PipelineError> {
        let label = self.label();
        if self.descriptor_set_layouts.len() > max_descriptor_sets as usize {
            return Err(PipelineError::LayoutCreationFailed(format!(
                "pipeline '{label}' uses {} descriptor sets, the limit is {max_descriptor_sets}",
                self.descriptor_set_layouts.len()
            )));
        }
        if self.fragment.is_none() && !pass.color_attachments.is_empty() {
            return Err(PipelineError::IncompatibleColorTarget(format!(
                "pipeline '{label}' has no fragment stage but its render pass has color attachments"
            )));
        }
        if self.depth.is_some() && pass.depth_attachment.is_none() {
            return Err(PipelineError::IncompatibleDepthStencilFormat(format!(
                "pipeline '{label}' tests depth but its render pass has no depth attachment"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_layout_assigns_offsets_and_locations() {
        let layout = VertexBufferLayout::packed(
            2,
            &[VertexFormat::Float32x3, VertexFormat::Float32x2, VertexFormat::Unorm8x4],
        );
        assert_eq!(layout.stride, 24);
        let offsets: Vec<_> = layout.attributes.iter().map(|a| (a.offset, a.location)).collect();
        assert_eq!(offsets, vec![(0, 2), (12, 3), (20, 4)]);
    }

    #[test]
    fn pipeline_must_fit_its_render_pass() {
        use crate::renderer::api::{ColorAttachment, TextureFormat};

        let pass = RenderPassDescriptor {
            color_attachments: vec![ColorAttachment::cleared(
                TextureFormat::Rgba8Unorm,
                [0.0; 4],
            )],
            ..Default::default()
        };
        let mut pipeline = PipelineDescriptor {
            label: Some("triangle".into()),
            vertex: ShaderStageSource::new("triangle", "vs_main"),
            fragment: Some(ShaderStageSource::new("triangle", "fs_main")),
            macros: ShaderMacros::new(),
            vertex_layouts: Vec::new(),
            descriptor_set_layouts: Vec::new(),
            render_pass: RenderPassHandle::NULL,
            topology: PrimitiveTopology::default(),
            cull_mode: CullMode::default(),
            blend: BlendMode::default(),
            depth: None,
        };
        assert!(pipeline.validate(&pass, 4).is_ok());

        pipeline.depth = Some(DepthState::default());
        assert!(matches!(
            pipeline.validate(&pass, 4),
            Err(PipelineError::IncompatibleDepthStencilFormat(_))
        ));

        pipeline.depth = None;
        pipeline.fragment = None;
        assert!(matches!(
            pipeline.validate(&pass, 4),
            Err(PipelineError::IncompatibleColorTarget(_))
        ));
    }
}
