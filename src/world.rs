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

//! World: central entity and archetype storage
//!
//! This is the live runtime the snapshot pipeline reads from and writes
//! into. It only offers what save/load needs: spawning, attaching and
//! detaching components, listing an entity's component types and
//! iterating entities.

use std::any::TypeId;

use ahash::AHashMap;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::archetype::{signature_of, Archetype, ArchetypeSignature, ComponentColumn, ErasedColumn};
use crate::component::{Bundle, Component};
use crate::entity::{EntityId, EntityLocation};
use crate::error::{Result, SnapshotError};

/// Central ECS world
pub struct World {
    /// Entity locations keyed by SlotMap IDs
    entity_locations: SlotMap<EntityId, EntityLocation>,

    /// All archetypes in the world
    archetypes: Vec<Archetype>,

    /// Maps component type signatures to archetype indices
    archetype_index: AHashMap<ArchetypeSignature, usize>,

    /// Cache for archetype transitions when adding/removing components
    transitions: FxHashMap<(usize, TypeId, bool), usize>,

    /// One column per component type
    columns: AHashMap<TypeId, Box<dyn ErasedColumn>>,

    /// Rust type names for diagnostics
    type_names: AHashMap<TypeId, &'static str>,
}

impl World {
    /// Create a new, empty world.
    pub fn new() -> Self {
        let mut world = Self {
            entity_locations: SlotMap::with_key(),
            archetypes: Vec::with_capacity(16),
            archetype_index: AHashMap::with_capacity(16),
            transitions: FxHashMap::default(),
            columns: AHashMap::new(),
            type_names: AHashMap::new(),
        };

        // Bootstrap the empty archetype (entities with no components)
        // This is always at index 0 and simplifies logic elsewhere
        world.get_or_create_archetype(ArchetypeSignature::new());
        world
    }

    /// Spawn an entity with no components
    pub fn spawn_empty(&mut self) -> EntityId {
        let id = self.entity_locations.insert(EntityLocation {
            archetype_id: 0,
            archetype_row: 0,
        });
        let row = self.archetypes[0].allocate_row(id);
        if let Some(loc) = self.entity_locations.get_mut(id) {
            loc.archetype_row = row;
        }
        id
    }

    /// Spawn a new entity with the given bundle of components.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<EntityId> {
        let id = self.spawn_empty();
        bundle.insert_into(self, id)?;
        Ok(id)
    }

    /// Check if an entity is alive
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.entity_locations.contains_key(entity)
    }

    /// Despawn entity immediately
    ///
    /// Removes the entity and all its components from the world.
    pub fn despawn(&mut self, entity: EntityId) -> Result<()> {
        let location = self
            .entity_locations
            .remove(entity)
            .ok_or(SnapshotError::EntityNotFound(entity))?;

        let archetype = &mut self.archetypes[location.archetype_id];
        for type_id in archetype.signature().iter() {
            if let Some(column) = self.columns.get_mut(type_id) {
                column.remove(entity);
            }
        }

        if let Some(swapped) = archetype.remove_row(location.archetype_row) {
            if let Some(swapped_loc) = self.entity_locations.get_mut(swapped) {
                swapped_loc.archetype_row = location.archetype_row;
            }
        }
        Ok(())
    }

    /// Get entity location
    pub fn get_entity_location(&self, entity: EntityId) -> Option<EntityLocation> {
        self.entity_locations.get(entity).copied()
    }

    /// Iterate over all live entities in slot order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entity_locations.keys()
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entity_locations.len()
    }

    /// Number of archetypes, including the empty one
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    /// Sorted component types attached to `entity`
    pub fn component_types(&self, entity: EntityId) -> Option<&[TypeId]> {
        let location = self.entity_locations.get(entity)?;
        Some(self.archetypes[location.archetype_id].signature().as_slice())
    }

    /// Rust type name of a component type this world has stored
    pub fn type_name(&self, type_id: TypeId) -> Option<&'static str> {
        self.type_names.get(&type_id).copied()
    }

    /// Get immutable reference to a component on an entity
    pub fn get<T: Component>(&self, entity: EntityId) -> Option<&T> {
        self.column::<T>()?.get(entity)
    }

    /// Get mutable reference to a component on an entity
    pub fn get_mut<T: Component>(&mut self, entity: EntityId) -> Option<&mut T> {
        self.columns
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<ComponentColumn<T>>()?
            .get_mut(entity)
    }

    /// Check if entity has a specific component
    pub fn has<T: Component>(&self, entity: EntityId) -> bool {
        self.has_type(entity, TypeId::of::<T>())
    }

    /// Type-erased variant of [`World::has`]
    pub fn has_type(&self, entity: EntityId, type_id: TypeId) -> bool {
        self.entity_locations
            .get(entity)
            .is_some_and(|loc| self.archetypes[loc.archetype_id].has_type(type_id))
    }

    /// Add a component to an entity, overwriting any existing value of the same type
    pub fn insert<T: Component>(&mut self, entity: EntityId, component: T) -> Result<()> {
        let location = *self
            .entity_locations
            .get(entity)
            .ok_or(SnapshotError::EntityNotFound(entity))?;
        let type_id = TypeId::of::<T>();

        self.type_names
            .entry(type_id)
            .or_insert_with(std::any::type_name::<T>);
        let column = self
            .columns
            .entry(type_id)
            .or_insert_with(|| Box::new(ComponentColumn::<T>::new()));

        column
            .as_any_mut()
            .downcast_mut::<ComponentColumn<T>>()
            .ok_or(SnapshotError::ColumnTypeMismatch(std::any::type_name::<T>()))?
            .insert(entity, component);

        if !self.archetypes[location.archetype_id].has_type(type_id) {
            let target = self.transition(location.archetype_id, type_id, true);
            self.move_entity(entity, location, target);
        }
        Ok(())
    }

    /// Remove a component from an entity and return it
    pub fn remove<T: Component>(&mut self, entity: EntityId) -> Result<Option<T>> {
        let location = *self
            .entity_locations
            .get(entity)
            .ok_or(SnapshotError::EntityNotFound(entity))?;
        let type_id = TypeId::of::<T>();
        if !self.archetypes[location.archetype_id].has_type(type_id) {
            return Ok(None);
        }

        let value = self
            .columns
            .get_mut(&type_id)
            .and_then(|c| c.as_any_mut().downcast_mut::<ComponentColumn<T>>())
            .and_then(|c| c.take(entity));

        let target = self.transition(location.archetype_id, type_id, false);
        self.move_entity(entity, location, target);
        Ok(value)
    }

    /// Type-erased component removal, returns whether the entity carried the type
    pub fn remove_by_id(&mut self, entity: EntityId, type_id: TypeId) -> Result<bool> {
        let location = *self
            .entity_locations
            .get(entity)
            .ok_or(SnapshotError::EntityNotFound(entity))?;
        if !self.archetypes[location.archetype_id].has_type(type_id) {
            return Ok(false);
        }

        if let Some(column) = self.columns.get_mut(&type_id) {
            column.remove(entity);
        }

        let target = self.transition(location.archetype_id, type_id, false);
        self.move_entity(entity, location, target);
        Ok(true)
    }

    fn column<T: Component>(&self) -> Option<&ComponentColumn<T>> {
        self.columns
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<ComponentColumn<T>>()
    }

    /// Resolve (and cache) the archetype reached by adding or removing one type
    fn transition(&mut self, from: usize, type_id: TypeId, add: bool) -> usize {
        if let Some(&target) = self.transitions.get(&(from, type_id, add)) {
            return target;
        }

        let current = self.archetypes[from].signature().iter().copied();
        let signature = if add {
            signature_of(current.chain(std::iter::once(type_id)))
        } else {
            signature_of(current.filter(|t| *t != type_id))
        };

        let target = self.get_or_create_archetype(signature);
        self.transitions.insert((from, type_id, add), target);
        target
    }

    fn get_or_create_archetype(&mut self, signature: ArchetypeSignature) -> usize {
        if let Some(&index) = self.archetype_index.get(&signature) {
            return index;
        }

        let index = self.archetypes.len();
        self.archetypes.push(Archetype::new(signature.clone()));
        self.archetype_index.insert(signature, index);
        index
    }

    fn move_entity(&mut self, entity: EntityId, from: EntityLocation, target: usize) {
        if let Some(swapped) = self.archetypes[from.archetype_id].remove_row(from.archetype_row) {
            if let Some(loc) = self.entity_locations.get_mut(swapped) {
                loc.archetype_row = from.archetype_row;
            }
        }

        let row = self.archetypes[target].allocate_row(entity);
        if let Some(loc) = self.entity_locations.get_mut(entity) {
            *loc = EntityLocation {
                archetype_id: target,
                archetype_row: row,
            };
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
