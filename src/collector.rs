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

//! Component type discovery for a save selection

use std::collections::BTreeSet;

use ahash::AHashSet;
use tracing::debug;

use crate::entity::EntityId;
use crate::error::{Result, SnapshotError};
use crate::reflection::{ComponentRegistration, ComponentTypes};
use crate::registry::{ComponentTypeId, TypeRegistry};
use crate::world::World;

/// Finds every distinct saveable component type carried by a selection
pub struct ComponentCollector<'a> {
    types: &'a ComponentTypes,
}

impl<'a> ComponentCollector<'a> {
    pub fn new(types: &'a ComponentTypes) -> Self {
        Self { types }
    }

    /// Single full pass over `entities`, registering each distinct type.
    ///
    /// Each type is registered under its catalog tag, in declared-name order.
    /// Component types missing from the catalog are not saveable and are
    /// left out.
    pub fn collect(
        &self,
        world: &World,
        entities: &[EntityId],
        registry: &mut TypeRegistry,
    ) -> Result<BTreeSet<ComponentTypeId>> {
        let mut seen = AHashSet::new();
        let mut found: Vec<&ComponentRegistration> = Vec::new();

        for &entity in entities {
            let component_types = world
                .component_types(entity)
                .ok_or(SnapshotError::EntityNotFound(entity))?;

            for type_id in component_types {
                if !seen.insert(*type_id) {
                    continue;
                }
                match self.types.get(*type_id) {
                    Some(registration) => found.push(registration),
                    None => debug!(
                        type_name = world.type_name(*type_id).unwrap_or("<unknown>"),
                        "skipping unregistered component type"
                    ),
                }
            }
        }

        found.sort_by_key(|r| r.type_name);
        Ok(found.into_iter().map(|r| registry.register(r)).collect())
    }
}
