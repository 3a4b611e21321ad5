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

//! Typed handle aliases for every resource kind the device manages.

use crate::handle::Handle;

/// Uninhabited marker types used to tag [`Handle`]s by resource kind.
pub mod marker {
    /// Marks a GPU buffer.
    #[derive(Debug)]
    pub enum Buffer {}
    /// Marks a texture sampler.
    #[derive(Debug)]
    pub enum Sampler {}
    /// Marks a sampled texture.
    #[derive(Debug)]
    pub enum Texture {}
    /// Marks a render-target attachment.
    #[derive(Debug)]
    pub enum RenderTarget {}
    /// Marks a render pass description.
    #[derive(Debug)]
    pub enum RenderPass {}
    /// Marks a set of attachments bound to a render pass.
    #[derive(Debug)]
    pub enum Framebuffer {}
    /// Marks a descriptor set layout.
    #[derive(Debug)]
    pub enum DescriptorSetLayout {}
    /// Marks a graphics pipeline.
    #[derive(Debug)]
    pub enum Pipeline {}
}

/// Handle to a buffer (static or ephemeral).
pub type BufferHandle = Handle<marker::Buffer>;
/// Handle to a sampler.
pub type SamplerHandle = Handle<marker::Sampler>;
/// Handle to a sampled texture.
pub type TextureHandle = Handle<marker::Texture>;
/// Handle to a render target.
pub type RenderTargetHandle = Handle<marker::RenderTarget>;
/// Handle to a render pass.
pub type RenderPassHandle = Handle<marker::RenderPass>;
/// Handle to a framebuffer.
pub type FramebufferHandle = Handle<marker::Framebuffer>;
/// Handle to a descriptor set layout.
pub type DescriptorSetLayoutHandle = Handle<marker::DescriptorSetLayout>;
/// Handle to a graphics pipeline.
pub type PipelineHandle = Handle<marker::Pipeline>;
