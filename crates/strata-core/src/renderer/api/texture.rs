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

//! Textures, render targets, and samplers.

use crate::renderer::error::ResourceError;
use std::borrow::Cow;

/// Pixel formats understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// Single 8-bit normalized channel.
    R8Unorm,
    /// 8-bit RGBA, linear.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, linear.
    Bgra8Unorm,
    /// 8-bit BGRA, sRGB encoded.
    Bgra8UnormSrgb,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
    /// 24-bit depth plus 8-bit stencil.
    Depth24PlusStencil8,
}

impl TextureFormat {
    /// Returns `true` for depth (and depth/stencil) formats.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    /// Size of one texel in bytes.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags::bitflags! {
    /// How a texture may be used by the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        /// Sampled from shaders.
        const SAMPLED = 1 << 0;
        /// Written by shaders as a storage image.
        const STORAGE = 1 << 1;
        /// Source of a copy.
        const COPY_SRC = 1 << 2;
        /// Destination of a copy or upload.
        const COPY_DST = 1 << 3;
    }
}

/// Describes a sampled 2D texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Number of mip levels (at least 1).
    pub mip_levels: u32,
    /// Texel format.
    pub format: TextureFormat,
    /// Allowed usages.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// A single-mip sampled texture that accepts uploads.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: None,
            width,
            height,
            mip_levels: 1,
            format,
            usage: TextureUsage::SAMPLED | TextureUsage::COPY_DST,
        }
    }

    /// Bytes in one row of the base mip level.
    pub fn bytes_per_row(&self) -> u32 {
        self.width * self.format.bytes_per_texel()
    }

    /// Checks dimensions and optional base-level contents.
    pub fn validate(&self, contents: Option<&[u8]>, max_dimension: u32) -> Result<(), ResourceError> {
        let label = self.label.as_deref().unwrap_or("unnamed");
        if self.width == 0 || self.height == 0 || self.mip_levels == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture '{label}' has a zero dimension or no mip levels"
            )));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(ResourceError::InvalidDescriptor(format!(
                "texture '{label}' is {}x{}, the device limit is {max_dimension}",
                self.width, self.height
            )));
        }
        if let Some(data) = contents {
            let expected = self.bytes_per_row() as u64 * self.height as u64;
            if data.len() as u64 != expected {
                return Err(ResourceError::OutOfBounds {
                    capacity: expected,
                    requested: data.len() as u64,
                });
            }
        }
        Ok(())
    }
}

/// Describes an attachment that render passes draw into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Attachment format. Depth formats make a depth target.
    pub format: TextureFormat,
    /// Whether shaders may also sample this target.
    pub sampled: bool,
}

impl RenderTargetDescriptor {
    /// Checks the dimensions against the device limit.
    pub fn validate(&self, max_dimension: u32) -> Result<(), ResourceError> {
        let label = self.label.as_deref().unwrap_or("unnamed");
        if self.width == 0 || self.height == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render target '{label}' has a zero dimension"
            )));
        }
        if self.width > max_dimension || self.height > max_dimension {
            return Err(ResourceError::InvalidDescriptor(format!(
                "render target '{label}' exceeds the device limit of {max_dimension}"
            )));
        }
        Ok(())
    }
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    /// Nearest texel.
    #[default]
    Nearest,
    /// Linear interpolation.
    Linear,
}

/// Behavior for coordinates outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    /// Clamp to the edge texel.
    #[default]
    ClampToEdge,
    /// Tile the texture.
    Repeat,
    /// Tile with every other repetition mirrored.
    MirrorRepeat,
}

/// Comparison used by depth tests and comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// Never passes.
    Never,
    /// Passes if the new value is less.
    #[default]
    Less,
    /// Passes if the values are equal.
    Equal,
    /// Passes if the new value is less or equal.
    LessEqual,
    /// Passes if the new value is greater.
    Greater,
    /// Passes if the values differ.
    NotEqual,
    /// Passes if the new value is greater or equal.
    GreaterEqual,
    /// Always passes.
    Always,
}

/// Describes a sampler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Minification filter.
    pub min_filter: FilterMode,
    /// Magnification filter.
    pub mag_filter: FilterMode,
    /// Filter between mip levels.
    pub mip_filter: FilterMode,
    /// Addressing along U.
    pub address_mode_u: AddressMode,
    /// Addressing along V.
    pub address_mode_v: AddressMode,
    /// Addressing along W.
    pub address_mode_w: AddressMode,
    /// Makes this a comparison sampler.
    pub compare: Option<CompareFunction>,
}
