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

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use strata_core::renderer::shader::ShaderSourceProvider;
use strata_core::renderer::ShaderError;

/// Loads shader sources from files under a root directory.
///
/// A logical name maps to `<root>/<name>.<extension>`. Names may contain `/`
/// to reach subdirectories but cannot leave the root.
#[derive(Debug, Clone)]
pub struct FsShaderSource {
    root: PathBuf,
    extension: String,
}

impl FsShaderSource {
    /// Serves `<root>/<name>.wgsl`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extension(root, "wgsl")
    }

    /// Serves `<root>/<name>.<extension>`.
    pub fn with_extension(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    /// The directory shaders are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative).with_extension(&self.extension))
    }
}

impl ShaderSourceProvider for FsShaderSource {
    fn load(&self, name: &str) -> Result<String, ShaderError> {
        let not_found = || ShaderError::NotFound {
            name: name.to_owned(),
        };
        let path = self.resolve(name).ok_or_else(not_found)?;
        match std::fs::read_to_string(&path) {
            Ok(source) => {
                log::debug!("Loaded shader '{name}' from {}", path.display());
                Ok(source)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(ShaderError::LoadError {
                name: name.to_owned(),
                source_error: format!("{}: {e}", path.display()),
            }),
        }
    }
}
