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

//! Named entities that can be found again after a load

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::EntityId;
use crate::reflection::SaveComponent;

/// Stable key for an entity, written as the record's `key`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializationTag {
    pub tag: String,
}

impl SerializationTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl SaveComponent for SerializationTag {
    const TYPE_NAME: &'static str = "archetype_snapshot::SerializationTag";
}

/// Key -> entity lookup filled while loading
#[derive(Debug, Clone, Default)]
pub struct KeyTracker {
    keys: AHashMap<String, EntityId>,
}

impl KeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: &str, entity: EntityId) {
        if let Some(previous) = self.keys.insert(key.to_owned(), entity) {
            warn!(key, ?previous, ?entity, "duplicate entity key, keeping the later entity");
        }
    }

    pub fn get(&self, key: &str) -> Option<EntityId> {
        self.keys.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.keys.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::World;

    #[test]
    fn test_later_key_wins() {
        let mut world = World::new();
        let a = world.spawn_empty();
        let b = world.spawn_empty();

        let mut keys = KeyTracker::new();
        keys.register("boss", a);
        keys.register("boss", b);
        assert_eq!(keys.get("boss"), Some(b));
        assert_eq!(keys.len(), 1);
        assert_eq!(keys.get("missing"), None);
    }
}
