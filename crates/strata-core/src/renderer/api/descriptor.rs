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

//! Descriptor set layouts, bound descriptors, and shader binding validation.
//!
//! A descriptor set layout is an ordered list of [`DescriptorType`]s. A
//! trailing [`DescriptorType::End`] sentinel is accepted and terminates the
//! list, so layouts can be written as fixed tables.
//!
//! How a `(set, entry)` pair maps onto the native binding namespace depends on
//! the backend, see [`BindingModel`] and [`native_binding_index`].

use super::handles::{BufferHandle, RenderTargetHandle, SamplerHandle, TextureHandle};
use std::borrow::Cow;
use std::fmt;

/// The kind of resource a descriptor slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    /// A uniform buffer range.
    UniformBuffer,
    /// A read/write storage buffer range.
    StorageBuffer,
    /// A standalone sampler.
    Sampler,
    /// A sampled texture.
    Texture,
    /// A texture paired with a sampler.
    CombinedSampler,
    /// Terminates a layout table. Entries after it are ignored.
    End,
}

/// Returns the entries of `raw` up to (not including) the first
/// [`DescriptorType::End`].
pub fn layout_entries(raw: &[DescriptorType]) -> &[DescriptorType] {
    let end = raw
        .iter()
        .position(|ty| *ty == DescriptorType::End)
        .unwrap_or(raw.len());
    &raw[..end]
}

/// Describes one descriptor set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DescriptorSetLayoutDescriptor {
    /// Debug label.
    pub label: Option<Cow<'static, str>>,
    entries: Vec<DescriptorType>,
}

impl DescriptorSetLayoutDescriptor {
    /// Builds a layout from a table, stopping at the `End` sentinel if present.
    pub fn new(entries: &[DescriptorType]) -> Self {
        Self {
            label: None,
            entries: layout_entries(entries).to_vec(),
        }
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The layout's entries in binding order.
    pub fn entries(&self) -> &[DescriptorType] {
        &self.entries
    }
}

impl AsRef<[DescriptorType]> for DescriptorSetLayoutDescriptor {
    fn as_ref(&self) -> &[DescriptorType] {
        &self.entries
    }
}

/// A concrete resource bound into a descriptor set slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Descriptor {
    /// A uniform range of a buffer. `size: None` binds to the end of the buffer.
    UniformBuffer {
        /// The buffer.
        buffer: BufferHandle,
        /// Byte offset of the range.
        offset: u64,
        /// Byte size of the range.
        size: Option<u64>,
    },
    /// A storage range of a buffer.
    StorageBuffer {
        /// The buffer.
        buffer: BufferHandle,
        /// Byte offset of the range.
        offset: u64,
        /// Byte size of the range.
        size: Option<u64>,
    },
    /// A sampler.
    Sampler(SamplerHandle),
    /// A sampled texture.
    Texture(TextureHandle),
    /// A render target read as a sampled texture.
    RenderTarget(RenderTargetHandle),
    /// A texture and the sampler used to read it.
    CombinedSampler {
        /// The texture.
        texture: TextureHandle,
        /// The sampler.
        sampler: SamplerHandle,
    },
}

impl Descriptor {
    /// A whole-buffer uniform binding.
    pub fn uniform(buffer: BufferHandle) -> Self {
        Descriptor::UniformBuffer {
            buffer,
            offset: 0,
            size: None,
        }
    }

    /// The slot type this descriptor fills.
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            Descriptor::UniformBuffer { .. } => DescriptorType::UniformBuffer,
            Descriptor::StorageBuffer { .. } => DescriptorType::StorageBuffer,
            Descriptor::Sampler(_) => DescriptorType::Sampler,
            Descriptor::Texture(_) | Descriptor::RenderTarget(_) => DescriptorType::Texture,
            Descriptor::CombinedSampler { .. } => DescriptorType::CombinedSampler,
        }
    }
}

/// Asserts that `descriptors` fill `layout` slot by slot.
///
/// # Panics
///
/// Panics on a count or type mismatch; binding a set that does not match its
/// layout is a programmer error.
pub fn assert_descriptors_match(layout: &[DescriptorType], descriptors: &[Descriptor]) {
    let layout = layout_entries(layout);
    assert_eq!(
        layout.len(),
        descriptors.len(),
        "descriptor set layout has {} entries but {} descriptors were bound",
        layout.len(),
        descriptors.len()
    );
    for (index, (expected, descriptor)) in layout.iter().zip(descriptors).enumerate() {
        assert_eq!(
            *expected,
            descriptor.descriptor_type(),
            "descriptor {index} does not match its layout entry"
        );
    }
}

/// How descriptor set entries map to native binding indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingModel {
    /// Each set has its own namespace starting at zero. A combined sampler
    /// occupies two consecutive bindings: the texture, then the sampler.
    #[default]
    PerSet,
    /// One namespace shared by every set: set `n` starts after all bindings of
    /// sets `0..n`. A combined sampler occupies a single binding.
    Flat,
}

impl BindingModel {
    /// Number of native bindings one entry of type `ty` occupies.
    pub const fn slots(self, ty: DescriptorType) -> u32 {
        match (self, ty) {
            (_, DescriptorType::End) => 0,
            (BindingModel::PerSet, DescriptorType::CombinedSampler) => 2,
            _ => 1,
        }
    }
}

/// Computes the first native binding index of `entry` in descriptor set `set`.
///
/// # Panics
///
/// Panics if `set` or `entry` is out of range.
pub fn native_binding_index<L: AsRef<[DescriptorType]>>(
    layouts: &[L],
    set: usize,
    entry: usize,
    model: BindingModel,
) -> u32 {
    assert!(set < layouts.len(), "descriptor set {set} is out of range");
    let entries = layout_entries(layouts[set].as_ref());
    assert!(
        entry < entries.len(),
        "entry {entry} is out of range for descriptor set {set}"
    );

    let count = |entries: &[DescriptorType]| -> u32 {
        entries.iter().map(|ty| model.slots(*ty)).sum()
    };
    let base = match model {
        BindingModel::PerSet => 0,
        BindingModel::Flat => layouts[..set]
            .iter()
            .map(|layout| count(layout_entries(layout.as_ref())))
            .sum(),
    };
    base + count(&entries[..entry])
}

/// One native binding produced by expanding a layout under a binding model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBinding {
    /// Native set index (always 0 under [`BindingModel::Flat`]).
    pub set: u32,
    /// Native binding index.
    pub binding: u32,
    /// The resource type the shader must declare at this binding.
    pub ty: DescriptorType,
}

/// Expands `layouts` into the native bindings a shader is expected to declare.
pub fn expand_layouts<L: AsRef<[DescriptorType]>>(
    layouts: &[L],
    model: BindingModel,
) -> Vec<NativeBinding> {
    let mut bindings = Vec::new();
    let mut flat_base = 0;
    for (set, layout) in layouts.iter().enumerate() {
        let native_set = match model {
            BindingModel::PerSet => set as u32,
            BindingModel::Flat => 0,
        };
        let mut binding = match model {
            BindingModel::PerSet => 0,
            BindingModel::Flat => flat_base,
        };
        for ty in layout_entries(layout.as_ref()) {
            match (model, ty) {
                (BindingModel::PerSet, DescriptorType::CombinedSampler) => {
                    bindings.push(NativeBinding {
                        set: native_set,
                        binding,
                        ty: DescriptorType::Texture,
                    });
                    bindings.push(NativeBinding {
                        set: native_set,
                        binding: binding + 1,
                        ty: DescriptorType::Sampler,
                    });
                }
                _ => bindings.push(NativeBinding {
                    set: native_set,
                    binding,
                    ty: *ty,
                }),
            }
            binding += model.slots(*ty);
        }
        flat_base = binding;
    }
    bindings
}

/// A resource binding declared by a compiled shader.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReflectedBinding {
    /// Native set (group) index.
    pub set: u32,
    /// Native binding index.
    pub binding: u32,
    /// The declared resource type.
    pub ty: DescriptorType,
    /// The variable name, when the shader keeps one.
    pub name: Option<String>,
}

/// Why a shader binding does not fit the pipeline's layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// The shader uses a set the pipeline has no layout for.
    MissingSet,
    /// The set exists but has no entry at this binding.
    MissingBinding,
    /// The layout declares a different resource type.
    TypeMismatch {
        /// Type declared by the shader.
        declared: DescriptorType,
        /// Type the layout provides.
        expected: DescriptorType,
    },
}

/// A shader binding that does not match the pipeline's descriptor layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingMismatch {
    /// Native set of the offending binding.
    pub set: u32,
    /// Native binding index.
    pub binding: u32,
    /// Variable name, if known.
    pub name: Option<String>,
    /// The problem.
    pub kind: MismatchKind,
}

impl fmt::Display for BindingMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match self.kind {
            MismatchKind::MissingSet => write!(
                f,
                "shader binding '{name}' uses set {} which has no layout",
                self.set
            ),
            MismatchKind::MissingBinding => write!(
                f,
                "shader binding '{name}' (set {}, binding {}) is not in the layout",
                self.set, self.binding
            ),
            MismatchKind::TypeMismatch { declared, expected } => write!(
                f,
                "shader binding '{name}' (set {}, binding {}) is {declared:?} but the layout has {expected:?}",
                self.set, self.binding
            ),
        }
    }
}

/// Compares shader-declared bindings against descriptor set layouts.
///
/// Returns every mismatch found. Callers log them; a mismatch does not fail
/// pipeline creation.
pub fn validate_bindings<L: AsRef<[DescriptorType]>>(
    layouts: &[L],
    reflected: &[ReflectedBinding],
    model: BindingModel,
) -> Vec<BindingMismatch> {
    let expected = expand_layouts(layouts, model);
    reflected
        .iter()
        .filter_map(|declared| {
            let set = match model {
                BindingModel::PerSet => declared.set,
                BindingModel::Flat => 0,
            };
            let kind = if model == BindingModel::PerSet && set as usize >= layouts.len() {
                Some(MismatchKind::MissingSet)
            } else {
                match expected
                    .iter()
                    .find(|native| native.set == set && native.binding == declared.binding)
                {
                    None => Some(MismatchKind::MissingBinding),
                    Some(native) if native.ty != declared.ty => Some(MismatchKind::TypeMismatch {
                        declared: declared.ty,
                        expected: native.ty,
                    }),
                    Some(_) => None,
                }
            };
            kind.map(|kind| BindingMismatch {
                set: declared.set,
                binding: declared.binding,
                name: declared.name.clone(),
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use DescriptorType::*;

    fn reflected(set: u32, binding: u32, ty: DescriptorType) -> ReflectedBinding {
        ReflectedBinding {
            set,
            binding,
            ty,
            name: None,
        }
    }

    #[test]
    fn end_sentinel_terminates_the_table() {
        let layout = DescriptorSetLayoutDescriptor::new(&[UniformBuffer, Texture, End, Sampler]);
        assert_eq!(layout.entries(), &[UniformBuffer, Texture]);
        assert_eq!(layout_entries(&[End]), &[] as &[DescriptorType]);
    }

    #[test]
    fn per_set_indices_restart_at_zero_for_every_set() {
        let layouts = [vec![UniformBuffer, CombinedSampler, StorageBuffer], vec![Texture, Sampler]];
        let model = BindingModel::PerSet;
        assert_eq!(native_binding_index(&layouts, 0, 0, model), 0);
        assert_eq!(native_binding_index(&layouts, 0, 1, model), 1);
        // The combined sampler takes bindings 1 and 2.
        assert_eq!(native_binding_index(&layouts, 0, 2, model), 3);
        assert_eq!(native_binding_index(&layouts, 1, 0, model), 0);
        assert_eq!(native_binding_index(&layouts, 1, 1, model), 1);
    }

    #[test]
    fn flat_indices_continue_across_sets() {
        let layouts = [vec![UniformBuffer, CombinedSampler], vec![StorageBuffer, End], vec![Texture]];
        let model = BindingModel::Flat;
        assert_eq!(native_binding_index(&layouts, 0, 1, model), 1);
        assert_eq!(native_binding_index(&layouts, 1, 0, model), 2);
        assert_eq!(native_binding_index(&layouts, 2, 0, model), 3);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn binding_index_rejects_entries_past_the_sentinel() {
        let layouts = [vec![UniformBuffer, End, Texture]];
        native_binding_index(&layouts, 0, 1, BindingModel::PerSet);
    }

    #[test]
    fn matching_shader_has_no_mismatches() {
        let layouts = [vec![UniformBuffer], vec![CombinedSampler]];
        let shader = [
            reflected(0, 0, UniformBuffer),
            reflected(1, 0, Texture),
            reflected(1, 1, Sampler),
        ];
        assert!(validate_bindings(&layouts, &shader, BindingModel::PerSet).is_empty());
    }

    #[test]
    fn mismatches_are_reported_not_fatal() {
        let layouts = [vec![UniformBuffer, Texture]];
        let shader = [
            reflected(0, 0, StorageBuffer),
            reflected(0, 5, Texture),
            reflected(2, 0, Sampler),
        ];
        let mismatches = validate_bindings(&layouts, &shader, BindingModel::PerSet);
        let kinds: Vec<_> = mismatches.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MismatchKind::TypeMismatch {
                    declared: StorageBuffer,
                    expected: UniformBuffer
                },
                MismatchKind::MissingBinding,
                MismatchKind::MissingSet,
            ]
        );
        assert!(mismatches[0].to_string().contains("StorageBuffer"));
    }

    #[test]
    fn flat_model_matches_combined_samplers_as_one_binding() {
        let layouts = [vec![UniformBuffer], vec![CombinedSampler]];
        let shader = [reflected(0, 0, UniformBuffer), reflected(0, 1, CombinedSampler)];
        assert!(validate_bindings(&layouts, &shader, BindingModel::Flat).is_empty());
    }

    #[test]
    #[should_panic(expected = "does not match its layout entry")]
    fn bound_descriptors_must_match_the_layout() {
        let buffer = BufferHandle::from_raw(1);
        assert_descriptors_match(&[Texture], &[Descriptor::uniform(buffer)]);
    }

    #[test]
    fn render_targets_fill_texture_slots() {
        let target = RenderTargetHandle::from_raw(3);
        assert_descriptors_match(&[Texture, End], &[Descriptor::RenderTarget(target)]);
    }
}
