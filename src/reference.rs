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

//! Entity reference tracking
//!
//! Which fields hold entity ids is structural, so it is worked out once per
//! type in [`ReferenceTracker::inspect_types`]. Instance values are then
//! handled once: recorded raw on save, rewritten in a single pass on load
//! after every entity of the snapshot exists.

use std::any::TypeId;

use ahash::{AHashMap, AHashSet};
use slotmap::Key;
use tracing::debug;

use crate::entity::{no_entity, EntityId};
use crate::entity_ids::IdTranslationTable;
use crate::error::{Result, SnapshotError};
use crate::reflection::{ComponentRegistration, ComponentTypes, ReferenceFieldInfo};
use crate::world::World;

/// Cached reference metadata of one component type
#[derive(Debug, Clone)]
pub struct TrackedType {
    pub type_name: &'static str,
    pub fields: Vec<ReferenceFieldInfo>,
}

/// Raw reference values of one component instance at save time
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedReferences {
    pub entity: EntityId,
    pub type_id: TypeId,
    pub targets: Vec<EntityId>,
}

/// Outcome of the translation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranslationStats {
    /// Component instances visited
    pub instances: usize,
    /// Ids rewritten to their new value
    pub translated: usize,
    /// Ids with no mapping, replaced by the "no entity" sentinel
    pub dangling: usize,
}

/// Records where entity references live and rewrites them after load
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    inspected: AHashSet<TypeId>,
    tracked: AHashMap<TypeId, TrackedType>,
    recorded: Vec<RecordedReferences>,
    pending: Vec<(EntityId, TypeId)>,
}

impl ReferenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect each type once, caching its declared reference fields.
    ///
    /// Returns how many types were inspected for the first time.
    pub fn inspect_types<'a>(
        &mut self,
        registrations: impl IntoIterator<Item = &'a ComponentRegistration>,
    ) -> usize {
        let mut inspected = 0;
        for registration in registrations {
            if !self.inspected.insert(registration.type_id) {
                continue;
            }
            inspected += 1;
            if registration.has_references() {
                self.tracked.insert(
                    registration.type_id,
                    TrackedType {
                        type_name: registration.type_name,
                        fields: registration.reference_fields().to_vec(),
                    },
                );
            }
        }
        inspected
    }

    pub fn is_tracked(&self, type_id: TypeId) -> bool {
        self.tracked.contains_key(&type_id)
    }

    pub fn tracked_type(&self, type_id: TypeId) -> Option<&TrackedType> {
        self.tracked.get(&type_id)
    }

    /// Snapshot the raw ids held by tracked components of `entities`.
    ///
    /// Nothing is translated here; a document must stay valid for any future
    /// translation table. The recorded ids only feed save diagnostics such as
    /// [`ReferenceTracker::outside_references`]; the payloads themselves are
    /// encoded from the world. Returns the number of instances recorded.
    pub fn pre_write(&mut self, world: &World, entities: &[EntityId], types: &ComponentTypes) -> usize {
        let before = self.recorded.len();
        for &entity in entities {
            let Some(component_types) = world.component_types(entity) else {
                continue;
            };
            for &type_id in component_types {
                if !self.tracked.contains_key(&type_id) {
                    continue;
                }
                let Some(registration) = types.get(type_id) else {
                    continue;
                };
                let mut targets = Vec::new();
                registration.visit_references(world, entity, &mut |id| targets.push(*id));
                self.recorded.push(RecordedReferences {
                    entity,
                    type_id,
                    targets,
                });
            }
        }
        self.recorded.len() - before
    }

    pub fn recorded(&self) -> &[RecordedReferences] {
        &self.recorded
    }

    /// Recorded targets that are neither null nor part of `selection`
    pub fn outside_references(&self, selection: &AHashSet<EntityId>) -> usize {
        self.recorded
            .iter()
            .flat_map(|r| r.targets.iter())
            .filter(|id| !id.is_null() && !selection.contains(*id))
            .count()
    }

    /// Queue a freshly populated instance for the translation pass
    pub fn track(&mut self, entity: EntityId, type_id: TypeId) -> bool {
        if !self.tracked.contains_key(&type_id) {
            return false;
        }
        self.pending.push((entity, type_id));
        true
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Rewrite every queued reference through `table`.
    ///
    /// Must only run once every entity of the snapshot exists. Unmapped ids
    /// become the "no entity" sentinel; null ids stay null.
    pub fn translate(
        &mut self,
        world: &mut World,
        table: &IdTranslationTable,
        types: &ComponentTypes,
    ) -> Result<TranslationStats> {
        let mut stats = TranslationStats::default();

        for (entity, type_id) in std::mem::take(&mut self.pending) {
            let Some(registration) = types.get(type_id) else {
                return Err(SnapshotError::PhaseViolation(format!(
                    "tracked type of {entity:?} is not in the catalog"
                )));
            };
            if !world.has_type(entity, type_id) {
                return Err(SnapshotError::ComponentNotFound {
                    entity,
                    type_name: registration.type_name,
                });
            }

            stats.instances += 1;
            registration.map_references(world, entity, &mut |id| {
                if id.is_null() {
                    return;
                }
                match table.get(*id) {
                    Some(new) => {
                        *id = new;
                        stats.translated += 1;
                    }
                    None => {
                        *id = no_entity();
                        stats.dangling += 1;
                    }
                }
            });
        }

        debug!(
            instances = stats.instances,
            translated = stats.translated,
            dangling = stats.dangling,
            "entity references translated"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::{EntityField, SaveComponent};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Owner {
        target: EntityId,
    }

    impl SaveComponent for Owner {
        const TYPE_NAME: &'static str = "Owner";

        fn entity_fields() -> Vec<EntityField<Self>> {
            vec![EntityField::single(
                "target",
                |o: &Self| &o.target,
                |o: &mut Self| &mut o.target,
            )]
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Position {
        x: f32,
    }

    impl SaveComponent for Position {
        const TYPE_NAME: &'static str = "Position";
    }

    fn types() -> ComponentTypes {
        let mut types = ComponentTypes::new();
        types.register::<Owner>().unwrap();
        types.register::<Position>().unwrap();
        types
    }

    #[test]
    fn test_inspects_each_type_once() {
        let types = types();
        let mut tracker = ReferenceTracker::new();

        assert_eq!(tracker.inspect_types(types.iter()), 2);
        assert_eq!(tracker.inspect_types(types.iter()), 0);
        assert!(tracker.is_tracked(TypeId::of::<Owner>()));
        assert!(!tracker.is_tracked(TypeId::of::<Position>()));
        assert_eq!(
            tracker.tracked_type(TypeId::of::<Owner>()).map(|t| t.fields.len()),
            Some(1)
        );
    }

    #[test]
    fn test_pre_write_records_raw_ids() -> Result<()> {
        let types = types();
        let mut world = World::new();
        let target = world.spawn((Position::default(),))?;
        let holder = world.spawn((Owner { target }, Position::default()))?;

        let mut tracker = ReferenceTracker::new();
        tracker.inspect_types(types.iter());
        assert_eq!(tracker.pre_write(&world, &[target, holder], &types), 1);
        assert_eq!(
            tracker.recorded(),
            &[RecordedReferences {
                entity: holder,
                type_id: TypeId::of::<Owner>(),
                targets: vec![target],
            }]
        );

        let only_holder: AHashSet<EntityId> = [holder].into_iter().collect();
        assert_eq!(tracker.outside_references(&only_holder), 1);
        Ok(())
    }

    #[test]
    fn test_translate_maps_and_nulls() -> Result<()> {
        let types = types();

        let mut source = World::new();
        let old_target = source.spawn_empty();
        let old_missing = source.spawn_empty();

        let mut world = World::new();
        let new_target = world.spawn_empty();
        let a = world.spawn((Owner { target: old_target },))?;
        let b = world.spawn((Owner {
            target: old_missing,
        },))?;
        let c = world.spawn((Owner {
            target: no_entity(),
        },))?;

        let mut table = IdTranslationTable::new();
        table.insert(old_target, new_target)?;

        let mut tracker = ReferenceTracker::new();
        tracker.inspect_types(types.iter());
        for e in [a, b, c] {
            assert!(tracker.track(e, TypeId::of::<Owner>()));
        }
        assert!(!tracker.track(a, TypeId::of::<Position>()));

        let stats = tracker.translate(&mut world, &table, &types)?;
        assert_eq!(
            stats,
            TranslationStats {
                instances: 3,
                translated: 1,
                dangling: 1,
            }
        );
        assert_eq!(world.get::<Owner>(a).map(|o| o.target), Some(new_target));
        assert!(world.get::<Owner>(b).is_some_and(|o| o.target.is_null()));
        assert!(world.get::<Owner>(c).is_some_and(|o| o.target.is_null()));
        assert_eq!(tracker.pending(), 0);
        Ok(())
    }
}
