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

//! Per-entity records
//!
//! Loading walks each entity through
//! `Pending -> IdAllocated -> ComponentsAttached -> FieldsPopulated -> ReferencesResolved`.
//! Reference translation is only allowed once every entity is `FieldsPopulated`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::archetype_index::{ArchetypeIndex, Transmuter};
use crate::de::DecodedRecord;
use crate::document::EntityRecord;
use crate::entity::EntityId;
use crate::entity_ids::IdTranslationTable;
use crate::error::{Result, SnapshotError};
use crate::key::{KeyTracker, SerializationTag};
use crate::reference::ReferenceTracker;
use crate::reflection::ComponentTypes;
use crate::registry::TypeRegistry;
use crate::world::World;

/// Load progress of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityState {
    Pending,
    IdAllocated,
    ComponentsAttached,
    FieldsPopulated,
    ReferencesResolved,
}

/// States of every entity of one load, in document order
#[derive(Debug, Clone, Default)]
pub struct EntityStates {
    states: Vec<EntityState>,
}

impl EntityStates {
    pub fn new(len: usize) -> Self {
        Self {
            states: vec![EntityState::Pending; len],
        }
    }

    pub fn get(&self, index: usize) -> Option<EntityState> {
        self.states.get(index).copied()
    }

    /// Move one entity to the next state; skipping a state is an error
    pub fn advance(&mut self, index: usize, to: EntityState) -> Result<()> {
        let state = self
            .states
            .get_mut(index)
            .ok_or_else(|| SnapshotError::PhaseViolation(format!("no entity at position {index}")))?;
        if next_state(*state) != Some(to) {
            return Err(SnapshotError::PhaseViolation(format!(
                "entity {index} cannot go from {state:?} to {to:?}"
            )));
        }
        *state = to;
        Ok(())
    }

    pub fn advance_all(&mut self, to: EntityState) -> Result<()> {
        for index in 0..self.states.len() {
            self.advance(index, to)?;
        }
        Ok(())
    }

    /// Fail unless every entity is exactly in `state`
    pub fn require(&self, state: EntityState) -> Result<()> {
        match self.states.iter().position(|s| *s != state) {
            Some(index) => Err(SnapshotError::PhaseViolation(format!(
                "entity {index} is {:?}, expected {state:?}",
                self.states[index]
            ))),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

fn next_state(state: EntityState) -> Option<EntityState> {
    match state {
        EntityState::Pending => Some(EntityState::IdAllocated),
        EntityState::IdAllocated => Some(EntityState::ComponentsAttached),
        EntityState::ComponentsAttached => Some(EntityState::FieldsPopulated),
        EntityState::FieldsPopulated => Some(EntityState::ReferencesResolved),
        EntityState::ReferencesResolved => None,
    }
}

/// Writes and reads `entityData` records
pub struct EntitySerializer<'a> {
    registry: &'a TypeRegistry,
    types: &'a ComponentTypes,
}

impl<'a> EntitySerializer<'a> {
    pub fn new(registry: &'a TypeRegistry, types: &'a ComponentTypes) -> Self {
        Self { registry, types }
    }

    /// Record of one entity: its archetype id and every payload of that archetype
    pub fn save_record(&self, world: &World, entity: EntityId, index: &ArchetypeIndex) -> Result<EntityRecord> {
        let archetype = index.archetype_of(entity).ok_or_else(|| {
            SnapshotError::MalformedArchetype(format!("{entity:?} was not grouped into an archetype"))
        })?;
        let tags = index.types(archetype).unwrap_or_default();

        let mut components = BTreeMap::new();
        for tag in tags {
            let registration = self.registry.resolve(tag, self.types)?;
            components.insert(tag.clone(), registration.encode_value(world, entity)?);
        }

        Ok(EntityRecord {
            archetype,
            components,
            key: world.get::<SerializationTag>(entity).map(|t| t.tag.clone()),
        })
    }

    /// Records for `entities`, in the given order
    pub fn save_records(&self, world: &World, entities: &[EntityId], index: &ArchetypeIndex) -> Result<Vec<EntityRecord>> {
        entities
            .iter()
            .map(|&entity| self.save_record(world, entity, index))
            .collect()
    }

    /// Attach and populate every record onto the ids allocated in `table`.
    ///
    /// Leaves every entity `FieldsPopulated`; reference translation is the
    /// caller's next step.
    pub fn load_records(
        &self,
        world: &mut World,
        table: &IdTranslationTable,
        index: &ArchetypeIndex,
        records: Vec<DecodedRecord>,
        tracker: &mut ReferenceTracker,
        keys: &mut KeyTracker,
    ) -> Result<EntityStates> {
        if records.len() != table.len() {
            return Err(SnapshotError::MalformedDocument(format!(
                "{} entities but {} entity records",
                table.len(),
                records.len()
            )));
        }

        let mut states = EntityStates::new(table.len());
        states.advance_all(EntityState::IdAllocated)?;

        let transmuter = Transmuter::new(self.registry, self.types);
        for (position, ((old, new), record)) in table.iter().zip(records).enumerate() {
            let entry = index.transmuter(record.archetype)?;
            transmuter.apply(world, new, &entry)?;
            states.advance(position, EntityState::ComponentsAttached)?;

            let archetype_types = index.types(record.archetype).unwrap_or_default();
            for (tag, payload) in record.components {
                if !archetype_types.contains(&tag) {
                    return Err(SnapshotError::MalformedArchetype(format!(
                        "payload `{tag}` of {old:?} is not part of archetype {}",
                        record.archetype
                    )));
                }
                self.registry.resolve(&tag, self.types)?.populate(world, new, payload)?;
            }

            for tag in archetype_types {
                let registration = self.registry.resolve(tag, self.types)?;
                tracker.track(new, registration.type_id);
            }
            if let Some(key) = record.key.as_deref() {
                keys.register(key, new);
            }
            states.advance(position, EntityState::FieldsPopulated)?;
        }

        debug!(
            entities = states.len(),
            pending_references = tracker.pending(),
            keys = keys.len(),
            "entity records loaded"
        );
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_ids::EntityIdEncoder;
    use crate::reflection::SaveComponent;
    use crate::registry::ComponentTypeId;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Position {
        x: f32,
    }

    impl SaveComponent for Position {
        const TYPE_NAME: &'static str = "Position";
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Velocity {
        dx: f32,
    }

    impl SaveComponent for Velocity {
        const TYPE_NAME: &'static str = "Velocity";
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

    fn record(archetype: usize, components: Vec<(&str, serde_json::Value)>) -> DecodedRecord {
        DecodedRecord {
            archetype,
            components: components
                .into_iter()
                .map(|(t, v)| (ComponentTypeId::from(t), v))
                .collect(),
            key: None,
            skipped: 0,
        }
    }

    #[test]
    fn test_state_machine_order() {
        let mut states = EntityStates::new(2);
        assert!(states.advance(0, EntityState::ComponentsAttached).is_err());
        states.advance_all(EntityState::IdAllocated).unwrap();
        states.advance(0, EntityState::ComponentsAttached).unwrap();
        assert!(matches!(
            states.require(EntityState::IdAllocated),
            Err(SnapshotError::PhaseViolation(_))
        ));
        assert_eq!(states.get(1), Some(EntityState::IdAllocated));
    }

    #[test]
    fn test_save_record_lists_archetype_payloads() -> Result<()> {
        let (types, registry) = setup();
        let mut world = World::new();
        let e = world.spawn((Position { x: 4.0 }, SerializationTag::new("hero")))?;

        let mut index = ArchetypeIndex::new();
        index.assign(e, [ComponentTypeId::from("Position")]);
        let record = EntitySerializer::new(&registry, &types).save_record(&world, e, &index)?;

        assert_eq!(record.archetype, 0);
        assert_eq!(record.components.len(), 1);
        assert_eq!(record.components[&ComponentTypeId::from("Position")]["x"], 4.0);
        assert_eq!(record.key.as_deref(), Some("hero"));
        Ok(())
    }

    #[test]
    fn test_missing_payload_keeps_default() -> Result<()> {
        let (types, registry) = setup();
        let index = ArchetypeIndex::from_sets(vec![vec!["Position".into(), "Velocity".into()]])?;

        let mut source = World::new();
        let old = source.spawn_empty();
        let mut world = World::new();
        let table = EntityIdEncoder::decode(&[old], &mut world)?;

        let states = EntitySerializer::new(&registry, &types).load_records(
            &mut world,
            &table,
            &index,
            vec![record(0, vec![("Position", serde_json::json!({"x": 9.0}))])],
            &mut ReferenceTracker::new(),
            &mut KeyTracker::new(),
        )?;

        let new = table.translate(old);
        states.require(EntityState::FieldsPopulated)?;
        assert_eq!(world.get::<Position>(new), Some(&Position { x: 9.0 }));
        assert_eq!(world.get::<Velocity>(new), Some(&Velocity::default()));
        Ok(())
    }

    #[test]
    fn test_payload_outside_archetype_rejected() -> Result<()> {
        let (types, registry) = setup();
        let index = ArchetypeIndex::from_sets(vec![vec!["Position".into()]])?;

        let mut source = World::new();
        let old = source.spawn_empty();
        let mut world = World::new();
        let table = EntityIdEncoder::decode(&[old], &mut world)?;

        let result = EntitySerializer::new(&registry, &types).load_records(
            &mut world,
            &table,
            &index,
            vec![record(0, vec![("Velocity", serde_json::json!({"dx": 1.0}))])],
            &mut ReferenceTracker::new(),
            &mut KeyTracker::new(),
        );
        assert!(matches!(result, Err(SnapshotError::MalformedArchetype(_))));
        Ok(())
    }

    #[test]
    fn test_record_count_must_match_ids() -> Result<()> {
        let (types, registry) = setup();
        let index = ArchetypeIndex::from_sets(vec![vec![]])?;
        let mut world = World::new();
        let table = IdTranslationTable::new();

        let result = EntitySerializer::new(&registry, &types).load_records(
            &mut world,
            &table,
            &index,
            vec![record(0, vec![])],
            &mut ReferenceTracker::new(),
            &mut KeyTracker::new(),
        );
        assert!(matches!(result, Err(SnapshotError::MalformedDocument(_))));
        Ok(())
    }
}
