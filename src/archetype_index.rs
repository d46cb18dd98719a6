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

//! Document archetypes and transmuters
//!
//! An archetype here is the exact set of component tags an entity carries
//! inside one document. Ids are positions in the document's archetype table
//! and mean nothing outside it. A [`TransmuterEntry`] is the add/remove delta
//! that moves an entity from one set to another.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::entity::EntityId;
use crate::error::{Result, SnapshotError};
use crate::reflection::ComponentTypes;
use crate::registry::{ComponentTypeId, TypeRegistry};
use crate::world::World;

/// Index into a document's archetype table
pub type ArchetypeId = usize;

/// Sorted, duplicate-free set of tags
pub type ArchetypeSet = SmallVec<[ComponentTypeId; 8]>;

/// Add/remove delta between two archetypes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmuterEntry {
    pub add: Vec<ComponentTypeId>,
    pub remove: Vec<ComponentTypeId>,
}

impl TransmuterEntry {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }

    /// Tags listed on both sides of the delta
    fn conflicts(&self) -> Vec<&ComponentTypeId> {
        self.add.iter().filter(|t| self.remove.contains(*t)).collect()
    }
}

/// Groups entities by exact component set
#[derive(Debug, Default)]
pub struct ArchetypeIndex {
    archetypes: Vec<ArchetypeSet>,
    lookup: AHashMap<ArchetypeSet, ArchetypeId>,
    entity_archetypes: AHashMap<EntityId, ArchetypeId>,
}

impl ArchetypeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the index from a document's archetype table
    ///
    /// Positions are kept as-is, so two entries may describe the same set
    /// (for example after unknown tags were dropped).
    pub fn from_sets(sets: Vec<Vec<ComponentTypeId>>) -> Result<Self> {
        let mut index = Self::new();
        for (position, types) in sets.into_iter().enumerate() {
            let set = normalize(types).map_err(|tag| {
                SnapshotError::MalformedArchetype(format!(
                    "archetype {position} lists `{tag}` more than once"
                ))
            })?;
            index.lookup.entry(set.clone()).or_insert(position);
            index.archetypes.push(set);
        }
        Ok(index)
    }

    /// Archetype id for a set, assigned in first-seen order
    pub fn insert_set(&mut self, types: impl IntoIterator<Item = ComponentTypeId>) -> ArchetypeId {
        let mut set: ArchetypeSet = types.into_iter().collect();
        set.sort_unstable();
        set.dedup();

        if let Some(&id) = self.lookup.get(&set) {
            return id;
        }
        let id = self.archetypes.len();
        self.archetypes.push(set.clone());
        self.lookup.insert(set, id);
        id
    }

    /// Record the archetype of `entity`
    pub fn assign(
        &mut self,
        entity: EntityId,
        types: impl IntoIterator<Item = ComponentTypeId>,
    ) -> ArchetypeId {
        let id = self.insert_set(types);
        self.entity_archetypes.insert(entity, id);
        id
    }

    /// Group every entity of a selection by its registered component types
    pub fn build(
        world: &World,
        entities: &[EntityId],
        types: &ComponentTypes,
        registry: &TypeRegistry,
    ) -> Result<Self> {
        let mut index = Self::new();
        for &entity in entities {
            let component_types = world
                .component_types(entity)
                .ok_or(SnapshotError::EntityNotFound(entity))?;
            let tags: Vec<ComponentTypeId> = component_types
                .iter()
                .filter_map(|type_id| types.get(*type_id))
                .filter_map(|reg| registry.tag_of(reg.type_name).cloned())
                .collect();
            index.assign(entity, tags);
        }
        Ok(index)
    }

    pub fn archetype_of(&self, entity: EntityId) -> Option<ArchetypeId> {
        self.entity_archetypes.get(&entity).copied()
    }

    pub fn types(&self, id: ArchetypeId) -> Option<&[ComponentTypeId]> {
        self.archetypes.get(id).map(|s| s.as_slice())
    }

    pub fn id_of(&self, types: &[ComponentTypeId]) -> Option<ArchetypeId> {
        let mut set: ArchetypeSet = types.iter().cloned().collect();
        set.sort_unstable();
        set.dedup();
        self.lookup.get(&set).copied()
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    /// Archetype table in id order
    pub fn sets(&self) -> impl Iterator<Item = &[ComponentTypeId]> {
        self.archetypes.iter().map(|s| s.as_slice())
    }

    /// Delta that turns `from` into `to`
    pub fn build_transmuter(from: &[ComponentTypeId], to: &[ComponentTypeId]) -> TransmuterEntry {
        TransmuterEntry {
            add: to.iter().filter(|t| !from.contains(*t)).cloned().collect(),
            remove: from.iter().filter(|t| !to.contains(*t)).cloned().collect(),
        }
    }

    /// Delta from the empty set to archetype `id`
    pub fn transmuter(&self, id: ArchetypeId) -> Result<TransmuterEntry> {
        let types = self.types(id).ok_or_else(|| {
            SnapshotError::MalformedArchetype(format!(
                "archetype {id} out of range ({} archetypes)",
                self.archetypes.len()
            ))
        })?;
        Ok(Self::build_transmuter(&[], types))
    }
}

fn normalize(types: Vec<ComponentTypeId>) -> std::result::Result<ArchetypeSet, ComponentTypeId> {
    let mut set: ArchetypeSet = types.into_iter().collect();
    set.sort_unstable();
    for pair in set.windows(2) {
        if pair[0] == pair[1] {
            return Err(pair[0].clone());
        }
    }
    Ok(set)
}

/// Applies transmuter entries to live entities
pub struct Transmuter<'a> {
    registry: &'a TypeRegistry,
    types: &'a ComponentTypes,
}

impl<'a> Transmuter<'a> {
    pub fn new(registry: &'a TypeRegistry, types: &'a ComponentTypes) -> Self {
        Self { registry, types }
    }

    /// Attach `entry.add` (as defaults) and detach `entry.remove`.
    ///
    /// Re-applying an entry, or applying an empty one, leaves the entity unchanged.
    pub fn apply(&self, world: &mut World, entity: EntityId, entry: &TransmuterEntry) -> Result<()> {
        let conflicts = entry.conflicts();
        if !conflicts.is_empty() {
            return Err(SnapshotError::MalformedArchetype(format!(
                "transmuter both adds and removes {conflicts:?}"
            )));
        }
        if entry.is_empty() {
            return Ok(());
        }
        if !world.is_alive(entity) {
            return Err(SnapshotError::EntityNotFound(entity));
        }

        // Resolve everything up front so an unknown tag leaves the entity untouched
        let add = entry
            .add
            .iter()
            .map(|tag| self.registry.resolve(tag, self.types))
            .collect::<Result<Vec<_>>>()?;
        let remove = entry
            .remove
            .iter()
            .map(|tag| self.registry.resolve(tag, self.types))
            .collect::<Result<Vec<_>>>()?;

        for registration in remove {
            registration.detach(world, entity)?;
        }
        for registration in add {
            registration.attach_default(world, entity)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::SaveComponent;
    use std::any::TypeId;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
    }

    impl SaveComponent for Position {
        const TYPE_NAME: &'static str = "Position";
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Velocity {
        x: f32,
    }

    impl SaveComponent for Velocity {
        const TYPE_NAME: &'static str = "Velocity";
    }

    fn tags(names: &[&str]) -> Vec<ComponentTypeId> {
        names.iter().map(|n| ComponentTypeId::from(*n)).collect()
    }

    fn setup() -> (ComponentTypes, TypeRegistry) {
        let mut types = ComponentTypes::new();
        types.register::<Position>().unwrap();
        types.register::<Velocity>().unwrap();
        let mut registry = TypeRegistry::new();
        for reg in types.iter() {
            registry.register(reg);
        }
        (types, registry)
    }

    #[test]
    fn test_grouping_by_exact_set() {
        let mut index = ArchetypeIndex::new();
        let mut world = World::new();
        let (a, b, c) = (world.spawn_empty(), world.spawn_empty(), world.spawn_empty());

        let pv = index.assign(a, tags(&["Position", "Velocity"]));
        let vp = index.assign(b, tags(&["Velocity", "Position"]));
        let p = index.assign(c, tags(&["Position"]));

        assert_eq!(pv, 0);
        assert_eq!(pv, vp);
        assert_ne!(pv, p);
        assert_eq!(index.archetype_of(c), Some(1));
        assert_eq!(index.id_of(&tags(&["Velocity", "Position"])), Some(0));
    }

    #[test]
    fn test_build_transmuter_is_symmetric_difference() {
        let entry = ArchetypeIndex::build_transmuter(
            &tags(&["Position", "Velocity"]),
            &tags(&["Position", "Owner"]),
        );
        assert_eq!(entry.add, tags(&["Owner"]));
        assert_eq!(entry.remove, tags(&["Velocity"]));
        assert!(ArchetypeIndex::build_transmuter(&tags(&["A"]), &tags(&["A"])).is_empty());
    }

    #[test]
    fn test_duplicate_tag_in_archetype_rejected() {
        let result = ArchetypeIndex::from_sets(vec![tags(&["Position", "Position"])]);
        assert!(matches!(result, Err(SnapshotError::MalformedArchetype(_))));
    }

    #[test]
    fn test_apply_transmuter() -> Result<()> {
        let (types, registry) = setup();
        let transmuter = Transmuter::new(&registry, &types);
        let mut world = World::new();
        let e = world.spawn((Velocity { x: 3.0 },))?;

        let entry = TransmuterEntry {
            add: tags(&["Position"]),
            remove: tags(&["Velocity"]),
        };
        transmuter.apply(&mut world, e, &entry)?;
        assert_eq!(world.component_types(e), Some(&[TypeId::of::<Position>()][..]));

        world.get_mut::<Position>(e).unwrap().x = 7.0;
        transmuter.apply(&mut world, e, &entry)?;
        transmuter.apply(&mut world, e, &TransmuterEntry::default())?;
        assert_eq!(world.get::<Position>(e), Some(&Position { x: 7.0 }));
        Ok(())
    }

    #[test]
    fn test_ambiguous_delta_rejected() {
        let (types, registry) = setup();
        let mut world = World::new();
        let e = world.spawn_empty();

        let entry = TransmuterEntry {
            add: tags(&["Position"]),
            remove: tags(&["Position"]),
        };
        let result = Transmuter::new(&registry, &types).apply(&mut world, e, &entry);
        assert!(matches!(result, Err(SnapshotError::MalformedArchetype(_))));
        assert_eq!(world.component_types(e).map(|t| t.len()), Some(0));
    }
}
