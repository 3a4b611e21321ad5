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

//! # Strata Infra
//!
//! Concrete implementations of the strata device contracts: the wgpu and
//! null graphics backends, and shader sources and compilers.
//!
//! The backend is picked at build time. Enabling the `null` feature selects
//! [`NullDevice`](graphics::null::NullDevice) even when `wgpu` is enabled too.

#![warn(missing_docs)]

pub mod graphics;
pub mod shader;

use strata_core::renderer::api::DeviceSettings;
use strata_core::renderer::shader::{ShaderLibrary, ShaderSourceProvider};

/// The device type selected by the enabled cargo features.
#[cfg(any(feature = "null", not(feature = "wgpu")))]
pub type ActiveDevice = graphics::null::NullDevice;

/// The device type selected by the enabled cargo features.
#[cfg(all(feature = "wgpu", not(feature = "null")))]
pub type ActiveDevice = graphics::wgpu::WgpuDevice;

/// Creates the active backend's device, loading shaders from `source`.
///
/// The device is offscreen. Windowed applications construct a
/// [`WgpuDevice`](graphics::wgpu::WgpuDevice) with a surface directly.
///
/// ## Errors
/// Fails if the settings are invalid or the backend cannot be initialized.
pub fn create_device(
    settings: DeviceSettings,
    source: impl ShaderSourceProvider + 'static,
) -> anyhow::Result<ActiveDevice> {
    #[cfg(any(feature = "null", not(feature = "wgpu")))]
    let device = {
        let shaders =
            ShaderLibrary::new(source, strata_core::renderer::shader::PassthroughCompiler);
        graphics::null::NullDevice::new(settings, shaders)?
    };

    #[cfg(all(feature = "wgpu", not(feature = "null")))]
    let device = {
        let shaders = ShaderLibrary::new(source, shader::WgslCompiler);
        graphics::wgpu::WgpuDevice::new(settings, shaders)?
    };

    Ok(device)
}
