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

//! Shader loading and compilation contracts.
//!
//! The device layer never reads files or runs a compiler itself. It asks a
//! [`ShaderLibrary`] for a [`CompiledShader`]; the library pairs a
//! [`ShaderSourceProvider`] (name to source text) with a [`ShaderCompiler`]
//! (source to backend code plus reflected bindings) and memoizes the results.

mod preprocess;

pub use preprocess::preprocess;

use crate::renderer::api::{
    validate_bindings, BindingMismatch, BindingModel, DescriptorType, PipelineDescriptor,
    ReflectedBinding,
};
use crate::renderer::error::ShaderError;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Preprocessor macros, name to value. Keys are unique; an empty value only
/// marks the macro as defined.
pub type ShaderMacros = BTreeMap<String, String>;

/// The code flavor a backend consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// WebGPU Shading Language.
    Wgsl,
    /// SPIR-V binary.
    SpirV,
    /// GLSL text.
    Glsl,
}

impl fmt::Display for ShaderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderDialect::Wgsl => "WGSL",
            ShaderDialect::SpirV => "SPIR-V",
            ShaderDialect::Glsl => "GLSL",
        };
        f.write_str(name)
    }
}

/// Backend-ready shader code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderCode {
    /// Text dialects (WGSL, GLSL).
    Text(String),
    /// SPIR-V words.
    SpirV(Vec<u32>),
}

/// The output of a [`ShaderCompiler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledShader {
    /// The logical name the shader was loaded under.
    pub name: String,
    /// Dialect of `code`.
    pub dialect: ShaderDialect,
    /// The compiled code.
    pub code: ShaderCode,
    /// Resource bindings declared by the shader. Empty when the compiler does
    /// not reflect.
    pub bindings: Vec<ReflectedBinding>,
    /// Entry points found in the module. Empty when the compiler does not reflect.
    pub entry_points: Vec<String>,
}

impl CompiledShader {
    /// Checks that `entry_point` exists, when entry points were reflected.
    pub fn check_entry_point(&self, entry_point: &str) -> Result<(), ShaderError> {
        if self.entry_points.is_empty() || self.entry_points.iter().any(|e| e == entry_point) {
            Ok(())
        } else {
            Err(ShaderError::CompilationError {
                label: self.name.clone(),
                details: format!(
                    "entry point '{entry_point}' not found (available: {})",
                    self.entry_points.join(", ")
                ),
            })
        }
    }

    /// The code as text, if the dialect is textual.
    pub fn text(&self) -> Option<&str> {
        match &self.code {
            ShaderCode::Text(text) => Some(text),
            ShaderCode::SpirV(_) => None,
        }
    }
}

/// Resolves logical shader names to source text.
pub trait ShaderSourceProvider {
    /// Returns the source for `name`, or [`ShaderError::NotFound`].
    fn load(&self, name: &str) -> Result<String, ShaderError>;
}

/// Turns source text into backend code.
pub trait ShaderCompiler {
    /// Compiles `source` with `macros` predefined, for `dialect`.
    ///
    /// ## Errors
    ///
    /// [`ShaderError::CompilationError`] carries the compiler diagnostic;
    /// [`ShaderError::UnsupportedDialect`] if this compiler cannot target `dialect`.
    fn compile(
        &self,
        name: &str,
        source: &str,
        macros: &ShaderMacros,
        dialect: ShaderDialect,
    ) -> Result<CompiledShader, ShaderError>;
}

/// In-memory shader sources, mainly for tests and embedded shaders.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderSource {
    sources: HashMap<String, String>,
}

impl MemoryShaderSource {
    /// Creates an empty source set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a shader and returns `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(name, source);
        self
    }

    /// Adds (or replaces) a shader.
    pub fn insert(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(name.into(), source.into());
    }
}

impl ShaderSourceProvider for MemoryShaderSource {
    fn load(&self, name: &str) -> Result<String, ShaderError> {
        self.sources
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderError::NotFound {
                name: name.to_owned(),
            })
    }
}

/// Preprocesses text shaders without compiling or reflecting them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughCompiler;

impl ShaderCompiler for PassthroughCompiler {
    fn compile(
        &self,
        name: &str,
        source: &str,
        macros: &ShaderMacros,
        dialect: ShaderDialect,
    ) -> Result<CompiledShader, ShaderError> {
        if dialect == ShaderDialect::SpirV {
            return Err(ShaderError::UnsupportedDialect {
                dialect: dialect.to_string(),
            });
        }
        Ok(CompiledShader {
            name: name.to_owned(),
            dialect,
            code: ShaderCode::Text(preprocess(name, source, macros)?),
            bindings: Vec::new(),
            entry_points: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ShaderKey {
    name: String,
    macros: ShaderMacros,
    dialect: ShaderDialect,
}

/// Loads, compiles, and memoizes shaders for a device.
pub struct ShaderLibrary {
    source: Box<dyn ShaderSourceProvider>,
    compiler: Box<dyn ShaderCompiler>,
    cache: HashMap<ShaderKey, CompiledShader>,
}

impl ShaderLibrary {
    /// Pairs a source provider with a compiler.
    pub fn new(
        source: impl ShaderSourceProvider + 'static,
        compiler: impl ShaderCompiler + 'static,
    ) -> Self {
        Self {
            source: Box::new(source),
            compiler: Box::new(compiler),
            cache: HashMap::new(),
        }
    }

    /// Returns the compiled shader for `name` with `macros`, compiling it on
    /// first use.
    pub fn load(
        &mut self,
        name: &str,
        macros: &ShaderMacros,
        dialect: ShaderDialect,
    ) -> Result<CompiledShader, ShaderError> {
        let key = ShaderKey {
            name: name.to_owned(),
            macros: macros.clone(),
            dialect,
        };
        if let Some(compiled) = self.cache.get(&key) {
            log::trace!("Shader cache hit for '{name}'");
            return Ok(compiled.clone());
        }

        let source = self.source.load(name)?;
        let compiled = self.compiler.compile(name, &source, macros, dialect)?;
        log::debug!(
            "Compiled shader '{name}' to {dialect} ({} bindings reflected)",
            compiled.bindings.len()
        );
        self.cache.insert(key, compiled.clone());
        Ok(compiled)
    }

    /// Drops every memoized result, e.g. after shader sources changed on disk.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }

    /// Number of memoized shader variants.
    pub fn cached_variants(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for ShaderLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderLibrary")
            .field("cached_variants", &self.cache.len())
            .finish_non_exhaustive()
    }
}

/// The compiled stages of one pipeline.
#[derive(Debug, Clone)]
pub struct PipelineShaders {
    /// The vertex stage.
    pub vertex: CompiledShader,
    /// The fragment stage, if the pipeline has one.
    pub fragment: Option<CompiledShader>,
}

impl PipelineShaders {
    /// Bindings declared by either stage, deduplicated by `(set, binding)`.
    pub fn bindings(&self) -> Vec<ReflectedBinding> {
        let mut bindings: Vec<ReflectedBinding> = Vec::new();
        for binding in self
            .fragment
            .iter()
            .chain(std::iter::once(&self.vertex))
            .flat_map(|shader| shader.bindings.iter())
        {
            if !bindings
                .iter()
                .any(|b| b.set == binding.set && b.binding == binding.binding)
            {
                bindings.push(binding.clone());
            }
        }
        bindings.sort_by_key(|b| (b.set, b.binding));
        bindings
    }

    /// Checks the declared bindings against the pipeline's descriptor set
    /// layouts and logs every mismatch as a warning.
    pub fn check_bindings<L: AsRef<[DescriptorType]>>(
        &self,
        label: &str,
        layouts: &[L],
        model: BindingModel,
    ) -> Vec<BindingMismatch> {
        let mismatches = validate_bindings(layouts, &self.bindings(), model);
        for mismatch in &mismatches {
            log::warn!("Pipeline '{label}': {mismatch}");
        }
        mismatches
    }
}

impl ShaderLibrary {
    /// Loads both stages of `descriptor` with its macros and checks that the
    /// entry points exist.
    pub fn load_pipeline(
        &mut self,
        descriptor: &PipelineDescriptor,
        dialect: ShaderDialect,
    ) -> Result<PipelineShaders, ShaderError> {
        let vertex = self.load(&descriptor.vertex.name, &descriptor.macros, dialect)?;
        vertex.check_entry_point(&descriptor.vertex.entry_point)?;
        let fragment = match &descriptor.fragment {
            Some(stage) => {
                let fragment = self.load(&stage.name, &descriptor.macros, dialect)?;
                fragment.check_entry_point(&stage.entry_point)?;
                Some(fragment)
            }
            None => None,
        };
        Ok(PipelineShaders { vertex, fragment })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingCompiler {
        calls: Rc<Cell<usize>>,
    }

    impl ShaderCompiler for CountingCompiler {
        fn compile(
            &self,
            name: &str,
            source: &str,
            macros: &ShaderMacros,
            dialect: ShaderDialect,
        ) -> Result<CompiledShader, ShaderError> {
            self.calls.set(self.calls.get() + 1);
            PassthroughCompiler.compile(name, source, macros, dialect)
        }
    }

    #[test]
    fn missing_shader_reports_not_found() {
        let mut library = ShaderLibrary::new(MemoryShaderSource::new(), PassthroughCompiler);
        let err = library
            .load("missing", &ShaderMacros::new(), ShaderDialect::Wgsl)
            .unwrap_err();
        assert!(matches!(err, ShaderError::NotFound { name } if name == "missing"));
    }

    #[test]
    fn variants_are_memoized_per_macro_set() {
        let calls = Rc::new(Cell::new(0));
        let source = MemoryShaderSource::new().with("lit", "#ifdef FOG\nfog\n#endif\nbase\n");
        let mut library = ShaderLibrary::new(
            source,
            CountingCompiler {
                calls: calls.clone(),
            },
        );

        let plain = ShaderMacros::new();
        let fog: ShaderMacros = [("FOG".to_string(), String::new())].into_iter().collect();

        let a = library.load("lit", &plain, ShaderDialect::Wgsl).unwrap();
        let b = library.load("lit", &plain, ShaderDialect::Wgsl).unwrap();
        let c = library.load("lit", &fog, ShaderDialect::Wgsl).unwrap();

        assert_eq!(a, b);
        assert!(!a.text().unwrap().contains("fog"));
        assert!(c.text().unwrap().contains("fog"));
        assert_eq!(calls.get(), 2);
        assert_eq!(library.cached_variants(), 2);

        library.invalidate();
        library.load("lit", &plain, ShaderDialect::Wgsl).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn passthrough_cannot_produce_spirv() {
        let err = PassthroughCompiler
            .compile("s", "", &ShaderMacros::new(), ShaderDialect::SpirV)
            .unwrap_err();
        assert!(matches!(err, ShaderError::UnsupportedDialect { .. }));
    }

    #[test]
    fn entry_points_are_checked_only_when_reflected() {
        let mut shader = PassthroughCompiler
            .compile("s", "", &ShaderMacros::new(), ShaderDialect::Wgsl)
            .unwrap();
        assert!(shader.check_entry_point("vs_main").is_ok());

        shader.entry_points = vec!["vs_main".into()];
        assert!(shader.check_entry_point("vs_main").is_ok());
        assert!(shader.check_entry_point("fs_main").is_err());
    }

    #[test]
    fn stage_bindings_merge_before_validation() {
        let binding = |binding, ty| ReflectedBinding {
            set: 0,
            binding,
            ty,
            name: None,
        };
        let mut vertex = PassthroughCompiler
            .compile("v", "", &ShaderMacros::new(), ShaderDialect::Wgsl)
            .unwrap();
        vertex.bindings = vec![binding(0, DescriptorType::UniformBuffer)];
        let mut fragment = vertex.clone();
        fragment.bindings = vec![
            binding(1, DescriptorType::Texture),
            binding(0, DescriptorType::UniformBuffer),
        ];
        let shaders = PipelineShaders {
            vertex,
            fragment: Some(fragment),
        };

        assert_eq!(shaders.bindings().len(), 2);
        let layouts = [vec![DescriptorType::UniformBuffer]];
        let mismatches = shaders.check_bindings("test", &layouts, BindingModel::PerSet);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].binding, 1);
    }
}
