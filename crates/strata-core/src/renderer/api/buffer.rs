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

//! Buffer usage flags and creation descriptors.

use crate::renderer::error::ResourceError;
use std::borrow::Cow;

bitflags::bitflags! {
    /// How a buffer may be used by the GPU.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Bound as a vertex buffer.
        const VERTEX = 1 << 0;
        /// Bound as an index buffer.
        const INDEX = 1 << 1;
        /// Bound as a uniform buffer.
        const UNIFORM = 1 << 2;
        /// Bound as a storage buffer.
        const STORAGE = 1 << 3;
        /// Source of a copy operation.
        const COPY_SRC = 1 << 4;
        /// Destination of a copy or upload.
        const COPY_DST = 1 << 5;
    }
}

/// Describes a long-lived buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    /// Size in bytes. Must be non-zero.
    pub size: u64,
    /// Allowed usages.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// A buffer of `size` bytes with the given usage and no label.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Checks the descriptor against optional initial contents.
    pub fn validate(&self, contents: Option<&[u8]>) -> Result<(), ResourceError> {
        if self.size == 0 {
            return Err(ResourceError::InvalidDescriptor(format!(
                "buffer '{}' has zero size",
                self.label.as_deref().unwrap_or("unnamed")
            )));
        }
        if self.usage.is_empty() {
            return Err(ResourceError::InvalidDescriptor(format!(
                "buffer '{}' has no usage flags",
                self.label.as_deref().unwrap_or("unnamed")
            )));
        }
        match contents {
            Some(data) if data.len() as u64 > self.size => Err(ResourceError::OutOfBounds {
                capacity: self.size,
                requested: data.len() as u64,
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_oversized_contents() {
        let desc = BufferDescriptor::new(16, BufferUsage::VERTEX);
        let err = desc.validate(Some(&[0u8; 32])).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::OutOfBounds {
                capacity: 16,
                requested: 32
            }
        ));
    }

    #[test]
    fn validate_rejects_empty_buffers() {
        let desc = BufferDescriptor::new(0, BufferUsage::UNIFORM).with_label("globals");
        assert!(matches!(
            desc.validate(None),
            Err(ResourceError::InvalidDescriptor(msg)) if msg.contains("globals")
        ));
        assert!(BufferDescriptor::new(4, BufferUsage::empty())
            .validate(None)
            .is_err());
    }

    #[test]
    fn validate_accepts_partial_contents() {
        let desc = BufferDescriptor::new(64, BufferUsage::VERTEX | BufferUsage::COPY_DST);
        assert!(desc.validate(Some(&[1u8; 12])).is_ok());
    }
}
