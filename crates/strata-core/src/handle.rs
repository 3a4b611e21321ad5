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

//! Typed opaque handles and the container that issues them.
//!
//! Every GPU resource kind lives in a [`ResourceContainer`] owned by the
//! device. Callers only ever see a [`Handle`], a copyable `u64` tag whose zero
//! value is reserved as the null handle.
//!
//! A handle packs a slot index and a generation:
//!
//! ```text
//!  63            32 31             0
//! +----------------+----------------+
//! |   generation   |   index + 1    |
//! +----------------+----------------+
//! ```
//!
//! Slots are recycled after removal, and every reuse bumps the slot's
//! generation, so a stale handle never aliases the value that replaced it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// An opaque, copyable reference to a value owned by a [`ResourceContainer`].
///
/// The type parameter only tags the resource kind; a `Handle<Buffer>` cannot be
/// passed where a `Handle<Texture>` is expected. A handle does not keep its
/// resource alive.
pub struct Handle<T> {
    raw: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// The reserved null handle. It never refers to a live value.
    pub const NULL: Self = Self::from_raw(0);

    /// Rebuilds a handle from its raw representation.
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    fn from_parts(index: u32, generation: u32) -> Self {
        Self::from_raw(((generation as u64) << 32) | (index as u64 + 1))
    }

    /// Returns the raw `u64` representation. Zero means null.
    pub const fn raw(self) -> u64 {
        self.raw
    }

    /// Returns `true` if this is not the null handle.
    ///
    /// A valid handle may still be stale; only the issuing container can tell.
    pub const fn is_valid(self) -> bool {
        self.raw != 0
    }

    /// The slot index inside the issuing container, or `None` for the null handle.
    pub fn index(self) -> Option<u32> {
        let low = (self.raw & u32::MAX as u64) as u32;
        low.checked_sub(1)
    }

    /// The slot generation this handle was issued for.
    pub const fn generation(self) -> u32 {
        (self.raw >> 32) as u32
    }
}

// Manual impls: derives would needlessly require `T: Clone`, `T: Eq`, ...

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index() {
            Some(index) => write!(f, "Handle({index}v{})", self.generation()),
            None => write!(f, "Handle(null)"),
        }
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owns values of type `T` and hands out [`Handle<K>`]s to them.
///
/// `K` defaults to `T`; backends store their native representation as `T` and
/// issue handles tagged with a backend-agnostic marker type `K`.
///
/// Lookups with a handle that was never issued, or whose value has been
/// removed, panic: they are programmer errors, not recoverable conditions.
/// Use [`ResourceContainer::try_get`] to probe without panicking.
///
/// The container is intentionally not `Clone`: handles are only meaningful
/// against the instance that issued them.
pub struct ResourceContainer<T, K = T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    _marker: PhantomData<fn() -> K>,
}

impl<T, K> Default for ResourceContainer<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> ResourceContainer<T, K> {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            _marker: PhantomData,
        }
    }

    /// Default-constructs a new value and returns it together with its handle.
    pub fn add(&mut self) -> (&mut T, Handle<K>)
    where
        T: Default,
    {
        let handle = self.insert(T::default());
        (self.get_mut(handle), handle)
    }

    /// Stores `value` and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if the container has exhausted its 32-bit slot space.
    pub fn insert(&mut self, value: T) -> Handle<K> {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle::from_parts(index, slot.generation);
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|index| *index < u32::MAX)
            .unwrap_or_else(|| panic!("resource container exhausted its handle space"));
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle::from_parts(index, 0)
    }

    /// Returns `true` if `handle` refers to a live value in this container.
    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.try_get(handle).is_some()
    }

    /// Returns the value for `handle`, or `None` if it is null, stale, or unknown.
    pub fn try_get(&self, handle: Handle<K>) -> Option<&T> {
        let slot = self.slots.get(handle.index()? as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    /// Mutable counterpart of [`ResourceContainer::try_get`].
    pub fn try_get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index()? as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    /// Returns the value for `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` is null, stale, or was issued by another container.
    pub fn get(&self, handle: Handle<K>) -> &T {
        match self.try_get(handle) {
            Some(value) => value,
            None => panic!("lookup of invalid or stale {handle:?}"),
        }
    }

    /// Mutable counterpart of [`ResourceContainer::get`].
    ///
    /// # Panics
    ///
    /// Panics if `handle` is null, stale, or was issued by another container.
    pub fn get_mut(&mut self, handle: Handle<K>) -> &mut T {
        match self.try_get_mut(handle) {
            Some(value) => value,
            None => panic!("lookup of invalid or stale {handle:?}"),
        }
    }

    /// Removes the value for `handle` and returns it. The handle becomes stale.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live value.
    pub fn remove(&mut self, handle: Handle<K>) -> T {
        let index = handle.index();
        let slot = index
            .and_then(|index| self.slots.get_mut(index as usize))
            .filter(|slot| slot.generation == handle.generation() && slot.value.is_some());
        let Some(slot) = slot else {
            panic!("removal of invalid or stale {handle:?}");
        };

        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.len -= 1;
        if let Some(index) = index {
            self.free.push(index);
        }
        match value {
            Some(value) => value,
            None => unreachable!("slot was checked to be occupied"),
        }
    }

    /// Removes the value for `handle` and hands it to `finalizer`.
    ///
    /// This is the hook used to release or defer native objects as their
    /// container entry disappears.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live value.
    pub fn remove_with<R>(&mut self, handle: Handle<K>, finalizer: impl FnOnce(T) -> R) -> R {
        finalizer(self.remove(handle))
    }

    /// Drains every value through `finalizer`, in unspecified order.
    ///
    /// All previously issued handles become stale.
    pub fn clear_with(&mut self, mut finalizer: impl FnMut(Handle<K>, T)) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                let handle = Handle::from_parts(index as u32, slot.generation);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                finalizer(handle, value);
            }
        }
        self.len = 0;
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the container holds no live values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over live values and their handles.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::from_parts(index as u32, slot.generation), value))
        })
    }
}

impl<T: fmt::Debug, K> fmt::Debug for ResourceContainer<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
