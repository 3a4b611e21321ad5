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

//! Device creation settings.
//!
//! Settings are supplied once when the device is created. Only the
//! [`SwapchainSettings`] can change afterwards, through
//! `GraphicsDevice::recreate_swapchain`.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Presentation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapchainSettings {
    /// Width of the presentable images in pixels.
    pub width: u32,
    /// Height of the presentable images in pixels.
    pub height: u32,
    /// Wait for vertical blank when presenting.
    pub vsync: bool,
    /// Request exclusive fullscreen where the platform supports it.
    pub fullscreen: bool,
    /// Depth of the frame ring (frames the CPU may record ahead of the GPU).
    pub frames_in_flight: usize,
}

impl Default for SwapchainSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            vsync: true,
            fullscreen: false,
            frames_in_flight: 3,
        }
    }
}

/// Everything a backend needs to create a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Presentation parameters.
    pub swapchain: SwapchainSettings,
    /// Enable the native API's validation layers.
    pub debug_validation: bool,
    /// Abort the process on validation errors instead of logging them.
    pub strict_validation: bool,
    /// Capacity of the ephemeral ring buffer in bytes.
    pub ephemeral_ring_buffer_size: u64,
    /// How long `begin_frame` waits on a fence before declaring the device lost.
    pub fence_timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            swapchain: SwapchainSettings::default(),
            debug_validation: cfg!(debug_assertions),
            strict_validation: false,
            ephemeral_ring_buffer_size: 4 * 1024 * 1024,
            fence_timeout_ms: 10_000,
        }
    }
}

/// Every ring allocation alignment must divide the ring capacity.
pub const RING_BUFFER_GRANULARITY: u64 = 256;

impl DeviceSettings {
    /// Parses settings from RON text. Missing fields keep their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let settings: Self = ron::from_str(text).context("Failed to parse device settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read device settings from {}", path.display()))?;
        Self::from_ron_str(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// The fence timeout as a [`std::time::Duration`].
    pub fn fence_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.fence_timeout_ms)
    }

    /// Rejects settings the device cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.swapchain.validate()?;
        if self.ephemeral_ring_buffer_size == 0
            || self.ephemeral_ring_buffer_size % RING_BUFFER_GRANULARITY != 0
        {
            bail!(
                "ephemeral_ring_buffer_size must be a non-zero multiple of {RING_BUFFER_GRANULARITY}, got {}",
                self.ephemeral_ring_buffer_size
            );
        }
        if self.fence_timeout_ms == 0 {
            bail!("fence_timeout_ms must be non-zero");
        }
        Ok(())
    }
}

impl SwapchainSettings {
    /// Rejects presentation parameters the device cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("swapchain size must be non-zero, got {}x{}", self.width, self.height);
        }
        if !(1..=8).contains(&self.frames_in_flight) {
            bail!(
                "frames_in_flight must be between 1 and 8, got {}",
                self.frames_in_flight
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(DeviceSettings::default().validate().is_ok());
    }

    #[test]
    fn partial_ron_keeps_defaults() {
        let settings = DeviceSettings::from_ron_str(
            "(swapchain: (width: 640, height: 480), fence_timeout_ms: 250)",
        )
        .unwrap();
        assert_eq!(settings.swapchain.width, 640);
        assert_eq!(settings.swapchain.height, 480);
        assert!(settings.swapchain.vsync);
        assert_eq!(settings.fence_timeout_ms, 250);
        assert_eq!(settings.ephemeral_ring_buffer_size, 4 * 1024 * 1024);
    }

    #[test]
    fn ring_size_must_be_a_multiple_of_the_granularity() {
        let err = DeviceSettings::from_ron_str("(ephemeral_ring_buffer_size: 1000)").unwrap_err();
        assert!(format!("{err:#}").contains("ephemeral_ring_buffer_size"));
    }

    #[test]
    fn zero_sized_swapchain_is_rejected() {
        let settings = SwapchainSettings {
            width: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn load_reads_a_settings_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(strict_validation: true, swapchain: (frames_in_flight: 2))").unwrap();

        let settings = DeviceSettings::load(file.path()).unwrap();
        assert!(settings.strict_validation);
        assert_eq!(settings.swapchain.frames_in_flight, 2);
    }

    #[test]
    fn load_reports_missing_files_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = DeviceSettings::load(dir.path().join("missing.ron")).unwrap_err();
        assert!(err.to_string().contains("Failed to read device settings"));
    }

    #[test]
    fn settings_serialize_to_json_for_tooling() {
        let json = serde_json::to_string(&DeviceSettings::default()).unwrap();
        let back: DeviceSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, DeviceSettings::default());
    }
}
