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

//! Entity id list encoding and the old -> new translation table

use ahash::{AHashMap, AHashSet};
use slotmap::Key;

use crate::entity::{no_entity, EntityId};
use crate::error::{Result, SnapshotError};
use crate::world::World;

/// Old saved id -> id allocated during load
#[derive(Debug, Clone, Default)]
pub struct IdTranslationTable {
    map: AHashMap<EntityId, EntityId>,
    pairs: Vec<(EntityId, EntityId)>,
}

impl IdTranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair, rejecting an old id seen before
    pub fn insert(&mut self, old: EntityId, new: EntityId) -> Result<()> {
        if self.map.insert(old, new).is_some() {
            return Err(SnapshotError::DuplicateEntityId(old));
        }
        self.pairs.push((old, new));
        Ok(())
    }

    /// New id for `old`, `None` when `old` was not part of the snapshot
    pub fn get(&self, old: EntityId) -> Option<EntityId> {
        self.map.get(&old).copied()
    }

    /// New id for `old`, or the "no entity" sentinel if it is dangling
    pub fn translate(&self, old: EntityId) -> EntityId {
        if old.is_null() {
            return no_entity();
        }
        self.get(old).unwrap_or_else(no_entity)
    }

    /// Pairs in document order
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.pairs.iter().copied()
    }

    /// New ids in document order
    pub fn new_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.pairs.iter().map(|&(_, new)| new)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Encodes the ordered id list on save, allocates fresh ids on load
pub struct EntityIdEncoder;

impl EntityIdEncoder {
    /// Ordered list of live ids for the snapshot; repeats keep their first position
    pub fn encode(world: &World, selection: &[EntityId]) -> Result<Vec<EntityId>> {
        let mut seen = AHashSet::with_capacity(selection.len());
        let mut ids = Vec::with_capacity(selection.len());
        for &entity in selection {
            if !world.is_alive(entity) {
                return Err(SnapshotError::EntityNotFound(entity));
            }
            if seen.insert(entity) {
                ids.push(entity);
            }
        }
        Ok(ids)
    }

    /// Allocate one new entity per saved id, in order.
    ///
    /// The whole list is checked for repeats before the first allocation.
    pub fn decode(ids: &[EntityId], world: &mut World) -> Result<IdTranslationTable> {
        let mut seen = AHashSet::with_capacity(ids.len());
        if let Some(&duplicate) = ids.iter().find(|id| !seen.insert(**id)) {
            return Err(SnapshotError::DuplicateEntityId(duplicate));
        }

        let mut table = IdTranslationTable::new();
        for &old in ids {
            let new = world.spawn_empty();
            table.insert(old, new)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_preserves_order_and_drops_repeats() {
        let mut world = World::new();
        let (a, b, c) = (world.spawn_empty(), world.spawn_empty(), world.spawn_empty());

        let ids = EntityIdEncoder::encode(&world, &[c, a, c, b]).unwrap();
        assert_eq!(ids, vec![c, a, b]);
    }

    #[test]
    fn test_decode_allocates_in_order() {
        let mut source = World::new();
        let old: Vec<_> = (0..3).map(|_| source.spawn_empty()).collect();

        let mut target = World::new();
        let table = EntityIdEncoder::decode(&old, &mut target).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(target.entity_count(), 3);
        for (i, (before, after)) in table.iter().enumerate() {
            assert_eq!(before, old[i]);
            assert!(target.is_alive(after));
            assert_eq!(table.get(before), Some(after));
        }
    }

    #[test]
    fn test_duplicate_id_allocates_nothing() {
        let mut source = World::new();
        let a = source.spawn_empty();
        let b = source.spawn_empty();

        let mut target = World::new();
        let result = EntityIdEncoder::decode(&[a, b, a], &mut target);
        assert_eq!(result.err(), Some(SnapshotError::DuplicateEntityId(a)));
        assert_eq!(target.entity_count(), 0);
    }

    #[test]
    fn test_translate_dangling_is_sentinel() {
        let mut world = World::new();
        let a = world.spawn_empty();
        let missing = world.spawn_empty();

        let mut table = IdTranslationTable::new();
        table.insert(a, a).unwrap();
        assert_eq!(table.translate(a), a);
        assert!(table.translate(missing).is_null());
        assert!(table.translate(no_entity()).is_null());
    }
}
