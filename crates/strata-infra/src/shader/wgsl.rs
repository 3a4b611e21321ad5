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

use strata_core::renderer::api::{DescriptorType, ReflectedBinding};
use strata_core::renderer::shader::{
    preprocess, CompiledShader, ShaderCode, ShaderCompiler, ShaderDialect, ShaderMacros,
};
use strata_core::renderer::ShaderError;
use wgpu::naga;

/// Preprocesses, parses and validates WGSL with naga, and reflects the
/// module's resource bindings and entry points.
///
/// The output is the preprocessed WGSL text; wgpu compiles it again when the
/// pipeline is created, but every diagnostic surfaces here first.
#[derive(Debug, Clone, Copy, Default)]
pub struct WgslCompiler;

impl WgslCompiler {
    fn reflect(module: &naga::Module) -> Vec<ReflectedBinding> {
        let mut bindings: Vec<ReflectedBinding> = module
            .global_variables
            .iter()
            .filter_map(|(_, global)| {
                let binding = global.binding.as_ref()?;
                let ty = match global.space {
                    naga::AddressSpace::Uniform => DescriptorType::UniformBuffer,
                    naga::AddressSpace::Storage { .. } => DescriptorType::StorageBuffer,
                    naga::AddressSpace::Handle => Self::handle_type(module, global.ty)?,
                    _ => return None,
                };
                Some(ReflectedBinding {
                    set: binding.group,
                    binding: binding.binding,
                    ty,
                    name: global.name.clone(),
                })
            })
            .collect();
        bindings.sort_by_key(|b| (b.set, b.binding));
        bindings
    }

    fn handle_type(module: &naga::Module, ty: naga::Handle<naga::Type>) -> Option<DescriptorType> {
        match &module.types[ty].inner {
            naga::TypeInner::Image { .. } => Some(DescriptorType::Texture),
            naga::TypeInner::Sampler { .. } => Some(DescriptorType::Sampler),
            naga::TypeInner::BindingArray { base, .. } => Self::handle_type(module, *base),
            _ => None,
        }
    }
}

impl ShaderCompiler for WgslCompiler {
    fn compile(
        &self,
        name: &str,
        source: &str,
        macros: &ShaderMacros,
        dialect: ShaderDialect,
    ) -> Result<CompiledShader, ShaderError> {
        if dialect != ShaderDialect::Wgsl {
            return Err(ShaderError::UnsupportedDialect {
                dialect: dialect.to_string(),
            });
        }
        let text = preprocess(name, source, macros)?;

        let module = naga::front::wgsl::parse_str(&text).map_err(|e| {
            ShaderError::CompilationError {
                label: name.to_owned(),
                details: e.emit_to_string(&text),
            }
        })?;
        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::CompilationError {
            label: name.to_owned(),
            details: e.emit_to_string(&text),
        })?;

        Ok(CompiledShader {
            name: name.to_owned(),
            dialect,
            bindings: Self::reflect(&module),
            entry_points: module.entry_points.iter().map(|e| e.name.clone()).collect(),
            code: ShaderCode::Text(text),
        })
    }
}
