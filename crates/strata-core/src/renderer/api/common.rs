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

//! Backend-agnostic enums and small data structures shared by the device API.

use super::buffer::BufferUsage;
use std::borrow::Cow;

/// Specifies the data type of indices in an index buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// Indices are 16-bit unsigned integers.
    Uint16,
    /// Indices are 32-bit unsigned integers.
    #[default]
    Uint32,
}

impl IndexFormat {
    /// Size of one index in bytes.
    pub const fn size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// The native backend a device was built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphicsBackendType {
    /// Vulkan, reached through wgpu.
    Vulkan,
    /// Apple's Metal API, reached through wgpu.
    Metal,
    /// Microsoft's DirectX 12 API, reached through wgpu.
    Dx12,
    /// OpenGL / GLES, reached through wgpu.
    OpenGL,
    /// WebGPU (browser builds).
    WebGpu,
    /// The no-op testing backend.
    Null,
    /// An unknown or unsupported backend.
    #[default]
    Unknown,
}

/// The physical type of a graphics device (GPU).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RendererDeviceType {
    /// A GPU integrated into the CPU.
    IntegratedGpu,
    /// A discrete, dedicated GPU.
    DiscreteGpu,
    /// A virtualized or software-based GPU.
    VirtualGpu,
    /// A software renderer running on the CPU.
    Cpu,
    /// An unknown or unsupported device type.
    #[default]
    Unknown,
}

/// Information about the adapter a device runs on.
#[derive(Debug, Clone, Default)]
pub struct AdapterInfo {
    /// Human readable adapter name.
    pub name: Cow<'static, str>,
    /// The native API in use.
    pub backend_type: GraphicsBackendType,
    /// The adapter category.
    pub device_type: RendererDeviceType,
}

/// Limits the device layer needs to place data correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    /// Required offset alignment for uniform buffer bindings.
    pub uniform_buffer_alignment: u64,
    /// Required offset alignment for storage buffer bindings.
    pub storage_buffer_alignment: u64,
    /// Largest supported 2D texture dimension.
    pub max_texture_dimension_2d: u32,
    /// Maximum number of descriptor sets a pipeline may use.
    pub max_descriptor_sets: u32,
    /// Maximum number of color attachments in a render pass.
    pub max_color_attachments: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            uniform_buffer_alignment: 256,
            storage_buffer_alignment: 256,
            max_texture_dimension_2d: 8192,
            max_descriptor_sets: 4,
            max_color_attachments: 8,
        }
    }
}

/// Copy granularity of buffer uploads.
pub const BUFFER_COPY_ALIGNMENT: u64 = 4;

impl DeviceCaps {
    /// Ring-buffer alignment for an ephemeral buffer of `usage`, so its offset
    /// can be bound directly.
    pub fn ephemeral_alignment(&self, usage: BufferUsage) -> u64 {
        let mut alignment = BUFFER_COPY_ALIGNMENT;
        if usage.contains(BufferUsage::UNIFORM) {
            alignment = alignment.max(self.uniform_buffer_alignment);
        }
        if usage.contains(BufferUsage::STORAGE) {
            alignment = alignment.max(self.storage_buffer_alignment);
        }
        alignment
    }
}

/// A snapshot of the synchronization engine and recording counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Number of frames submitted so far.
    pub frame_number: u64,
    /// Highest frame number whose GPU work was observed complete.
    pub last_synced_frame: u64,
    /// Frame slots with submitted, unretired work.
    pub outstanding_frames: usize,
    /// Resources deleted but not yet assigned to a frame slot.
    pub staged_deletions: usize,
    /// Resources waiting in frame slots for their fence.
    pub pending_deletions: usize,
    /// Resources released to the native API since startup.
    pub released_resources: u64,
    /// The ring-buffer allocation cursor.
    pub ring_cursor: u64,
    /// Ring-buffer bytes consumed by the current (or last) frame.
    pub ring_frame_usage: u64,
    /// Draw calls recorded in the current (or last) frame.
    pub draw_calls: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_alignment_follows_binding_usage() {
        let caps = DeviceCaps {
            storage_buffer_alignment: 64,
            ..DeviceCaps::default()
        };
        assert_eq!(caps.ephemeral_alignment(BufferUsage::VERTEX), 4);
        assert_eq!(caps.ephemeral_alignment(BufferUsage::STORAGE), 64);
        assert_eq!(
            caps.ephemeral_alignment(BufferUsage::UNIFORM | BufferUsage::STORAGE),
            256
        );
    }
}
