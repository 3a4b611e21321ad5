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

//! Backend-agnostic rendering contracts.
//!
//! This module is the common language of every backend: the
//! [`GraphicsDevice`] trait applications program against, the
//! [`NativeBackend`] trait the frame engine drives, resource descriptors and
//! handles, shader loading, and the error hierarchy. Concrete backends live in
//! the `strata-infra` crate.

pub mod api;
pub mod diagnostics;
pub mod error;
pub mod shader;
pub mod state;
pub mod traits;

pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError, ShaderError};
pub use self::state::RecordingState;
pub use self::traits::{FenceStatus, GraphicsDevice, NativeBackend};
