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

//! Render passes, framebuffers, and the dynamic state set while recording.

use super::handles::{RenderPassHandle, RenderTargetHandle};
use super::texture::TextureFormat;
use crate::renderer::error::ResourceError;
use std::borrow::Cow;

/// What happens to an attachment at the start of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Keep the previous contents.
    Load,
    /// Clear to the attachment's clear value.
    #[default]
    Clear,
    /// Contents are undefined; the pass overwrites everything.
    DontCare,
}

/// What happens to an attachment at the end of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write results back to memory.
    #[default]
    Store,
    /// Results may be discarded.
    Discard,
}

/// A color attachment slot of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// Format the bound render target must have.
    pub format: TextureFormat,
    /// Load behavior.
    pub load: LoadOp,
    /// Store behavior.
    pub store: StoreOp,
    /// RGBA clear value used with [`LoadOp::Clear`].
    pub clear_color: [f64; 4],
}

impl ColorAttachment {
    /// A cleared, stored attachment of `format`.
    pub fn cleared(format: TextureFormat, clear_color: [f64; 4]) -> Self {
        Self {
            format,
            load: LoadOp::Clear,
            store: StoreOp::Store,
            clear_color,
        }
    }
}

/// The depth attachment slot of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// A depth format.
    pub format: TextureFormat,
    /// Load behavior.
    pub load: LoadOp,
    /// Store behavior.
    pub store: StoreOp,
    /// Depth clear value used with [`LoadOp::Clear`].
    pub clear_depth: f32,
}

/// Describes the attachment layout of a render pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Color attachments, in shader output order.
    pub color_attachments: Vec<ColorAttachment>,
    /// Optional depth attachment.
    pub depth_attachment: Option<DepthAttachment>,
}

impl RenderPassDescriptor {
    /// Checks the pass against the device's attachment limit.
    pub fn validate(&self, max_color_attachments: u32) -> Result<(), ResourceError> {
        let label = self.label.as_deref().unwrap_or("unnamed");
        if self.color_attachments.is_empty() && self.depth_attachment.is_none() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render pass '{label}' has no attachments"
            )));
        }
        if self.color_attachments.len() > max_color_attachments as usize {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render pass '{label}' has {} color attachments, the limit is {max_color_attachments}",
                self.color_attachments.len()
            )));
        }
        if let Some(color) = self.color_attachments.iter().find(|c| c.format.is_depth()) {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render pass '{label}' uses depth format {:?} as a color attachment",
                color.format
            )));
        }
        if let Some(depth) = &self.depth_attachment {
            if !depth.format.is_depth() {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "render pass '{label}' uses color format {:?} as its depth attachment",
                    depth.format
                )));
            }
        }
        Ok(())
    }
}

/// Binds concrete render targets to the slots of a render pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FramebufferDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// The pass whose attachment layout this framebuffer satisfies.
    pub render_pass: RenderPassHandle,
    /// One target per color attachment.
    pub color_targets: Vec<RenderTargetHandle>,
    /// Target for the depth attachment, if the pass has one.
    pub depth_target: Option<RenderTargetHandle>,
}

impl FramebufferDescriptor {
    /// Checks the targets against `pass` and returns the framebuffer extent.
    ///
    /// `target` maps each render target to its format and extent.
    pub fn validate(
        &self,
        pass: &RenderPassDescriptor,
        mut target: impl FnMut(RenderTargetHandle) -> (TextureFormat, u32, u32),
    ) -> Result<(u32, u32), ResourceError> {
        let label = self.label.as_deref().unwrap_or("unnamed");
        if self.color_targets.len() != pass.color_attachments.len() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "framebuffer '{label}' has {} color targets, its render pass expects {}",
                self.color_targets.len(),
                pass.color_attachments.len()
            )));
        }
        if self.depth_target.is_some() != pass.depth_attachment.is_some() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "framebuffer '{label}' depth target does not match its render pass"
            )));
        }

        let expected = pass
            .color_attachments
            .iter()
            .map(|attachment| attachment.format)
            .chain(pass.depth_attachment.map(|depth| depth.format));
        let targets = self.color_targets.iter().chain(self.depth_target.iter());

        let mut extent = None;
        for (handle, format) in targets.zip(expected) {
            let (actual, width, height) = target(*handle);
            if actual != format {
                return Err(ResourceError::InvalidDescriptor(format!(
                    "framebuffer '{label}' binds a {actual:?} target to a {format:?} attachment"
                )));
            }
            match extent {
                None => extent = Some((width, height)),
                Some(size) if size != (width, height) => {
                    return Err(ResourceError::InvalidDescriptor(format!(
                        "framebuffer '{label}' mixes target sizes {size:?} and {:?}",
                        (width, height)
                    )));
                }
                Some(_) => {}
            }
        }
        extent.ok_or_else(|| {
            ResourceError::InvalidDescriptor(format!("framebuffer '{label}' has no targets"))
        })
    }
}

/// A viewport rectangle with its depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// Covers `width` x `height` with the full depth range.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// A scissor rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(format: TextureFormat) -> ColorAttachment {
        ColorAttachment::cleared(format, [0.0, 0.0, 0.0, 1.0])
    }

    #[test]
    fn empty_pass_is_rejected() {
        assert!(RenderPassDescriptor::default().validate(8).is_err());
    }

    #[test]
    fn attachment_formats_must_match_their_slot() {
        let pass = RenderPassDescriptor {
            color_attachments: vec![color(TextureFormat::Depth32Float)],
            ..Default::default()
        };
        assert!(pass.validate(8).is_err());

        let pass = RenderPassDescriptor {
            color_attachments: vec![color(TextureFormat::Rgba8Unorm)],
            depth_attachment: Some(DepthAttachment {
                format: TextureFormat::Depth32Float,
                load: LoadOp::Clear,
                store: StoreOp::Discard,
                clear_depth: 1.0,
            }),
            ..Default::default()
        };
        assert!(pass.validate(8).is_ok());
    }

    #[test]
    fn too_many_color_attachments_are_rejected() {
        let pass = RenderPassDescriptor {
            color_attachments: vec![color(TextureFormat::Rgba8Unorm); 3],
            ..Default::default()
        };
        assert!(pass.validate(2).is_err());
    }

    #[test]
    fn framebuffer_targets_must_match_pass_formats_and_size() {
        let pass = RenderPassDescriptor {
            color_attachments: vec![color(TextureFormat::Rgba8Unorm)],
            ..Default::default()
        };
        let framebuffer = FramebufferDescriptor {
            label: None,
            render_pass: RenderPassHandle::NULL,
            color_targets: vec![RenderTargetHandle::from_raw(1)],
            depth_target: None,
        };

        let extent = framebuffer.validate(&pass, |_| (TextureFormat::Rgba8Unorm, 64, 32));
        assert_eq!(extent.unwrap(), (64, 32));
        assert!(framebuffer
            .validate(&pass, |_| (TextureFormat::Bgra8Unorm, 64, 32))
            .is_err());

        let with_depth = FramebufferDescriptor {
            depth_target: Some(RenderTargetHandle::from_raw(2)),
            ..framebuffer
        };
        assert!(with_depth
            .validate(&pass, |_| (TextureFormat::Rgba8Unorm, 64, 32))
            .is_err());
    }
}
