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

//! Defines the hierarchy of error types for the device layer.
//!
//! Resource creation returns [`ResourceError`]; frame operations return
//! [`RenderError`]. Contract violations (stale handles, drawing outside a
//! render pass, ...) are not represented here: they panic.

use std::fmt;

/// An error related to loading, preprocessing, or compiling a shader.
#[derive(Debug)]
pub enum ShaderError {
    /// The source provider has no shader with this name.
    NotFound {
        /// The logical shader name that was requested.
        name: String,
    },
    /// The source exists but could not be read.
    LoadError {
        /// The logical shader name.
        name: String,
        /// The underlying I/O or source error.
        source_error: String,
    },
    /// Preprocessing or compilation failed.
    CompilationError {
        /// A descriptive label for the shader.
        label: String,
        /// Diagnostics emitted by the preprocessor or compiler.
        details: String,
    },
    /// The compiler cannot produce code for the requested dialect.
    UnsupportedDialect {
        /// The requested dialect, as text.
        dialect: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::NotFound { name } => write!(f, "Shader '{name}' not found"),
            ShaderError::LoadError { name, source_error } => {
                write!(f, "Failed to load shader source '{name}': {source_error}")
            }
            ShaderError::CompilationError { label, details } => {
                write!(f, "Shader compilation failed for '{label}': {details}")
            }
            ShaderError::UnsupportedDialect { dialect } => {
                write!(f, "Shader dialect {dialect} is not supported by this compiler")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation of a graphics pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The pipeline layout could not be built from the descriptor set layouts.
    LayoutCreationFailed(String),
    /// The backend failed to build the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// The color targets of the pipeline do not match the render pass.
    IncompatibleColorTarget(String),
    /// The depth/stencil format is not compatible with the render pass.
    IncompatibleDepthStencilFormat(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::LayoutCreationFailed(msg) => {
                write!(f, "Pipeline layout creation failed: {msg}")
            }
            PipelineError::CompilationFailed { label, details } => {
                write!(
                    f,
                    "Pipeline compilation failed for '{}': {}",
                    label.as_deref().unwrap_or("Unknown"),
                    details
                )
            }
            PipelineError::IncompatibleColorTarget(msg) => {
                write!(f, "Incompatible color target format: {msg}")
            }
            PipelineError::IncompatibleDepthStencilFormat(msg) => {
                write!(f, "Incompatible depth/stencil format: {msg}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation of a GPU resource.
#[derive(Debug)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// The descriptor passed to a `create_*` call is inconsistent.
    InvalidDescriptor(String),
    /// Initial contents do not fit the resource being created.
    OutOfBounds {
        /// Size of the resource in bytes.
        capacity: u64,
        /// Size of the supplied contents in bytes.
        requested: u64,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::InvalidDescriptor(msg) => {
                write!(f, "Invalid resource descriptor: {msg}")
            }
            ResourceError::OutOfBounds {
                capacity,
                requested,
            } => write!(
                f,
                "Resource contents out of bounds: {requested} bytes for a {capacity} byte resource"
            ),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A device-level error raised by the frame lifecycle.
#[derive(Debug)]
pub enum RenderError {
    /// A failure occurred during the initialization of the graphics backend.
    InitializationFailed(String),
    /// Failed to acquire the next image from the swapchain/surface.
    SurfaceAcquisitionFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// A fence wait timed out or the driver reported the device as lost.
    /// The device refuses every further frame.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize graphics backend: {msg}")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::DeviceLost => write!(f, "The graphics device was lost."),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::LoadError {
            name: "shaders/mesh.wgsl".to_string(),
            source_error: "permission denied".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Failed to load shader source 'shaders/mesh.wgsl': permission denied"
        );

        let err_comp = ShaderError::CompilationError {
            label: "mesh".to_string(),
            details: "unexpected token at line 5".to_string(),
        };
        assert_eq!(
            format!("{err_comp}"),
            "Shader compilation failed for 'mesh': unexpected token at line 5"
        );
    }

    #[test]
    fn resource_error_display_wrapping_shader_error() {
        let res_err: ResourceError = ShaderError::NotFound {
            name: "sky".to_string(),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Shader 'sky' not found"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err: ResourceError = ShaderError::NotFound {
            name: "sky".to_string(),
        }
        .into();
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Shader resource error: Shader 'sky' not found"
        );
        assert!(render_err.source().is_some());
        assert!(render_err.source().unwrap().source().is_some());
    }

    #[test]
    fn out_of_bounds_reports_both_sizes() {
        let err = ResourceError::OutOfBounds {
            capacity: 16,
            requested: 64,
        };
        assert_eq!(
            err.to_string(),
            "Resource contents out of bounds: 64 bytes for a 16 byte resource"
        );
    }
}
