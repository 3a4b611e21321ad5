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

//! Backend-agnostic rendering API.
//!
//! - **[`handles`]**: typed handles for every resource kind.
//! - **[`buffer`]**, **[`texture`]**: resource descriptors.
//! - **[`pass`]**, **[`pipeline`]**: render pass and pipeline state.
//! - **[`descriptor`]**: descriptor set layouts and binding-index mapping.
//! - **[`settings`]**: device configuration.
//! - **[`common`]**: small shared enums and query results.

pub mod buffer;
pub mod common;
pub mod descriptor;
pub mod handles;
pub mod pass;
pub mod pipeline;
pub mod settings;
pub mod texture;

pub use self::buffer::*;
pub use self::common::*;
pub use self::descriptor::*;
pub use self::handles::*;
pub use self::pass::*;
pub use self::pipeline::*;
pub use self::settings::*;
pub use self::texture::*;
