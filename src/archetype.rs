// Copyright 2024 Saptak Santra
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

//! Archetype membership and type-erased component columns

use std::any::{Any, TypeId};

use slotmap::SecondaryMap;
use smallvec::SmallVec;

use crate::component::Component;
use crate::entity::EntityId;

/// Component signature, kept sorted so equal sets compare equal
pub type ArchetypeSignature = SmallVec<[TypeId; 8]>;

/// Build a sorted, duplicate-free signature
pub fn signature_of(types: impl IntoIterator<Item = TypeId>) -> ArchetypeSignature {
    let mut signature: ArchetypeSignature = types.into_iter().collect();
    signature.sort_unstable();
    signature.dedup();
    signature
}

/// Archetype: the set of entities sharing one exact component signature
pub struct Archetype {
    signature: ArchetypeSignature,
    entities: Vec<EntityId>,
}

impl Archetype {
    /// Create new archetype
    pub fn new(signature: ArchetypeSignature) -> Self {
        Self {
            signature,
            entities: Vec::new(),
        }
    }

    /// Get signature
    pub fn signature(&self) -> &ArchetypeSignature {
        &self.signature
    }

    /// Check whether the signature carries `type_id`
    pub fn has_type(&self, type_id: TypeId) -> bool {
        self.signature.binary_search(&type_id).is_ok()
    }

    /// Allocate row for entity
    pub fn allocate_row(&mut self, entity: EntityId) -> usize {
        let row = self.entities.len();
        self.entities.push(entity);
        row
    }

    /// Remove row and return entity that was swapped in
    pub fn remove_row(&mut self, row: usize) -> Option<EntityId> {
        if row >= self.entities.len() {
            return None;
        }

        self.entities.swap_remove(row);

        // If we swapped someone in, return their entity so we can update their location
        self.entities.get(row).copied()
    }

    /// Get all entities
    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Check if archetype is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Type-erased component column
pub trait ErasedColumn: Send + Sync {
    /// Drop the value stored for `entity`, returns whether one existed
    fn remove(&mut self, entity: EntityId) -> bool;

    fn contains(&self, entity: EntityId) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Column of `T` values keyed by entity
pub struct ComponentColumn<T: Component> {
    values: SecondaryMap<EntityId, T>,
}

impl<T: Component> ComponentColumn<T> {
    pub fn new() -> Self {
        Self {
            values: SecondaryMap::new(),
        }
    }

    pub fn get(&self, entity: EntityId) -> Option<&T> {
        self.values.get(entity)
    }

    pub fn get_mut(&mut self, entity: EntityId) -> Option<&mut T> {
        self.values.get_mut(entity)
    }

    /// Store a value, returning the previous one
    pub fn insert(&mut self, entity: EntityId, value: T) -> Option<T> {
        self.values.insert(entity, value)
    }

    pub fn take(&mut self, entity: EntityId) -> Option<T> {
        self.values.remove(entity)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<T: Component> Default for ComponentColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> ErasedColumn for ComponentColumn<T> {
    fn remove(&mut self, entity: EntityId) -> bool {
        self.values.remove(entity).is_some()
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.values.contains_key(entity)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
