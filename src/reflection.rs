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

//! Known component types and their declared entity reference fields
//!
//! Every component that takes part in save/load is registered up front in a
//! [`ComponentTypes`] catalog. Registration captures a stable declared name,
//! monomorphized encode/decode functions and the fields that hold entity
//! ids, so nothing has to be discovered from live values later.

use std::any::TypeId;
use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{Result, SnapshotError};
use crate::world::World;

/// A component that can be written to and read from a snapshot.
///
/// `TYPE_NAME` is the declared, schema-stable name of the type. It is what a
/// document records, so renaming or moving the Rust type does not break old
/// saves as long as the declared name is kept.
pub trait SaveComponent: Component + Serialize + DeserializeOwned + Default {
    /// Stable declared name, e.g. `"game::Position"`
    const TYPE_NAME: &'static str;

    /// Fields holding entity ids, rewritten after load
    fn entity_fields() -> Vec<EntityField<Self>>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Shape of an entity reference field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A single `EntityId`
    Single,
    /// An ordered `Vec<EntityId>`
    List,
    /// An unordered `HashSet<EntityId>`
    Set,
}

enum FieldAccess<T> {
    Single(fn(&T) -> &EntityId, fn(&mut T) -> &mut EntityId),
    List(fn(&T) -> &Vec<EntityId>, fn(&mut T) -> &mut Vec<EntityId>),
    Set(
        fn(&T) -> &HashSet<EntityId>,
        fn(&mut T) -> &mut HashSet<EntityId>,
    ),
}

/// Declared entity reference field of component `T`
pub struct EntityField<T> {
    name: &'static str,
    access: FieldAccess<T>,
}

impl<T> EntityField<T> {
    /// Field holding one entity id
    pub fn single(
        name: &'static str,
        get: fn(&T) -> &EntityId,
        get_mut: fn(&mut T) -> &mut EntityId,
    ) -> Self {
        Self {
            name,
            access: FieldAccess::Single(get, get_mut),
        }
    }

    /// Field holding an ordered list of entity ids
    pub fn list(
        name: &'static str,
        get: fn(&T) -> &Vec<EntityId>,
        get_mut: fn(&mut T) -> &mut Vec<EntityId>,
    ) -> Self {
        Self {
            name,
            access: FieldAccess::List(get, get_mut),
        }
    }

    /// Field holding an unordered set of entity ids
    pub fn set(
        name: &'static str,
        get: fn(&T) -> &HashSet<EntityId>,
        get_mut: fn(&mut T) -> &mut HashSet<EntityId>,
    ) -> Self {
        Self {
            name,
            access: FieldAccess::Set(get, get_mut),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ReferenceKind {
        match self.access {
            FieldAccess::Single(..) => ReferenceKind::Single,
            FieldAccess::List(..) => ReferenceKind::List,
            FieldAccess::Set(..) => ReferenceKind::Set,
        }
    }

    /// Call `visit` for every id currently stored in the field
    pub fn visit(&self, component: &T, visit: &mut dyn FnMut(&EntityId)) {
        match &self.access {
            FieldAccess::Single(get, _) => visit(get(component)),
            FieldAccess::List(get, _) => get(component).iter().for_each(visit),
            FieldAccess::Set(get, _) => get(component).iter().for_each(visit),
        }
    }

    /// Rewrite every id stored in the field, returns how many ids were visited
    pub fn map(&self, component: &mut T, map: &mut dyn FnMut(&mut EntityId)) -> usize {
        match &self.access {
            FieldAccess::Single(_, get_mut) => {
                map(get_mut(component));
                1
            }
            FieldAccess::List(_, get_mut) => {
                let list = get_mut(component);
                list.iter_mut().for_each(|id| map(id));
                list.len()
            }
            FieldAccess::Set(_, get_mut) => {
                let set = get_mut(component);
                let count = set.len();
                *set = std::mem::take(set)
                    .into_iter()
                    .map(|mut id| {
                        map(&mut id);
                        id
                    })
                    .collect();
                count
            }
        }
    }
}

/// Name and shape of a declared reference field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFieldInfo {
    pub name: &'static str,
    pub kind: ReferenceKind,
}

type VisitRefsFn = Box<dyn Fn(&World, EntityId, &mut dyn FnMut(&EntityId)) + Send + Sync>;
type MapRefsFn = Box<dyn Fn(&mut World, EntityId, &mut dyn FnMut(&mut EntityId)) -> usize + Send + Sync>;

/// Type registration data
pub struct ComponentRegistration {
    pub type_name: &'static str,
    pub type_id: TypeId,
    tag: &'static str,
    reference_fields: Vec<ReferenceFieldInfo>,
    insert_default: fn(&mut World, EntityId) -> Result<()>,
    encode: fn(&World, EntityId) -> Option<&dyn erased_serde::Serialize>,
    decode: fn(&mut World, EntityId, serde_json::Value) -> Result<()>,
    visit_refs: VisitRefsFn,
    map_refs: MapRefsFn,
}

impl ComponentRegistration {
    pub fn new<T: SaveComponent>() -> Result<Self> {
        let fields: Arc<[EntityField<T>]> = T::entity_fields().into();

        let mut seen = HashSet::with_capacity(fields.len());
        for field in fields.iter() {
            if field.name.is_empty() || !seen.insert(field.name) {
                return Err(SnapshotError::InvalidReferenceField {
                    type_name: T::TYPE_NAME,
                    field: field.name,
                });
            }
        }

        let reference_fields = fields
            .iter()
            .map(|f| ReferenceFieldInfo {
                name: f.name,
                kind: f.kind(),
            })
            .collect();

        let visit_fields = Arc::clone(&fields);
        let map_fields = fields;

        Ok(Self {
            type_name: T::TYPE_NAME,
            type_id: TypeId::of::<T>(),
            tag: short_name(T::TYPE_NAME),
            reference_fields,
            insert_default: insert_default::<T>,
            encode: encode::<T>,
            decode: decode::<T>,
            visit_refs: Box::new(move |world, entity, visit| {
                if let Some(component) = world.get::<T>(entity) {
                    for field in visit_fields.iter() {
                        field.visit(component, visit);
                    }
                }
            }),
            map_refs: Box::new(move |world, entity, map| match world.get_mut::<T>(entity) {
                Some(component) => map_fields.iter().map(|f| f.map(component, map)).sum(),
                None => 0,
            }),
        })
    }

    /// Last path segment of the declared name
    pub fn short_name(&self) -> &'static str {
        short_name(self.type_name)
    }

    /// Document tag: the short name, or the full declared name when another
    /// type in the catalog shares the short name
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn reference_fields(&self) -> &[ReferenceFieldInfo] {
        &self.reference_fields
    }

    pub fn has_references(&self) -> bool {
        !self.reference_fields.is_empty()
    }

    /// Attach a `Default` value unless the entity already carries the type
    pub fn attach_default(&self, world: &mut World, entity: EntityId) -> Result<()> {
        if world.has_type(entity, self.type_id) {
            return Ok(());
        }
        (self.insert_default)(world, entity)
    }

    pub fn detach(&self, world: &mut World, entity: EntityId) -> Result<bool> {
        world.remove_by_id(entity, self.type_id)
    }

    /// Borrow the component as an erased serializable value
    pub fn encode<'w>(
        &self,
        world: &'w World,
        entity: EntityId,
    ) -> Option<&'w dyn erased_serde::Serialize> {
        (self.encode)(world, entity)
    }

    /// Encode the component into an owned structural payload
    pub fn encode_value(&self, world: &World, entity: EntityId) -> Result<serde_json::Value> {
        let component = self
            .encode(world, entity)
            .ok_or(SnapshotError::ComponentNotFound {
                entity,
                type_name: self.type_name,
            })?;
        serde_json::to_value(component)
            .map_err(|e| SnapshotError::SerializationError(format!("{}: {e}", self.type_name)))
    }

    /// Overwrite the attached component's fields from a payload
    pub fn populate(&self, world: &mut World, entity: EntityId, payload: serde_json::Value) -> Result<()> {
        (self.decode)(world, entity, payload)
    }

    pub fn visit_references(&self, world: &World, entity: EntityId, visit: &mut dyn FnMut(&EntityId)) {
        (self.visit_refs)(world, entity, visit)
    }

    pub fn map_references(
        &self,
        world: &mut World,
        entity: EntityId,
        map: &mut dyn FnMut(&mut EntityId),
    ) -> usize {
        (self.map_refs)(world, entity, map)
    }
}

fn short_name(type_name: &'static str) -> &'static str {
    type_name.rsplit("::").next().unwrap_or(type_name)
}

fn insert_default<T: SaveComponent>(world: &mut World, entity: EntityId) -> Result<()> {
    world.insert(entity, T::default())
}

fn encode<T: SaveComponent>(world: &World, entity: EntityId) -> Option<&dyn erased_serde::Serialize> {
    world
        .get::<T>(entity)
        .map(|c| c as &dyn erased_serde::Serialize)
}

fn decode<T: SaveComponent>(world: &mut World, entity: EntityId, payload: serde_json::Value) -> Result<()> {
    let value = serde_json::from_value::<T>(payload)
        .map_err(|e| SnapshotError::DeserializationError(format!("{}: {e}", T::TYPE_NAME)))?;
    match world.get_mut::<T>(entity) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(SnapshotError::ComponentNotFound {
            entity,
            type_name: T::TYPE_NAME,
        }),
    }
}

/// Catalog of component types known to this program
#[derive(Default)]
pub struct ComponentTypes {
    registrations: Vec<ComponentRegistration>,
    by_type: AHashMap<TypeId, usize>,
    by_name: AHashMap<&'static str, usize>,
}

impl ComponentTypes {
    /// Create new registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type; registering the same type again is a no-op
    pub fn register<T: SaveComponent>(&mut self) -> Result<&mut Self> {
        let type_id = TypeId::of::<T>();
        if self.by_type.contains_key(&type_id) {
            return Ok(self);
        }
        if self.by_name.contains_key(T::TYPE_NAME) {
            return Err(SnapshotError::DuplicateTypeName(T::TYPE_NAME));
        }

        let mut registration = ComponentRegistration::new::<T>()?;
        let short = registration.short_name();
        let mut shared = false;
        for other in self.registrations.iter_mut().filter(|r| r.short_name() == short) {
            other.tag = other.type_name;
            shared = true;
        }
        if shared {
            registration.tag = registration.type_name;
        }

        let index = self.registrations.len();
        self.by_type.insert(type_id, index);
        self.by_name.insert(T::TYPE_NAME, index);
        self.registrations.push(registration);
        Ok(self)
    }

    /// Get registration by TypeId
    pub fn get(&self, type_id: TypeId) -> Option<&ComponentRegistration> {
        self.by_type.get(&type_id).map(|&i| &self.registrations[i])
    }

    /// Get registration by declared type name
    pub fn get_by_name(&self, type_name: &str) -> Option<&ComponentRegistration> {
        self.by_name.get(type_name).map(|&i| &self.registrations[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentRegistration> {
        self.registrations.iter()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Squad {
        leader: EntityId,
        members: Vec<EntityId>,
        rivals: HashSet<EntityId>,
    }

    impl SaveComponent for Squad {
        const TYPE_NAME: &'static str = "game::ai::Squad";

        fn entity_fields() -> Vec<EntityField<Self>> {
            vec![
                EntityField::single("leader", |s: &Self| &s.leader, |s: &mut Self| &mut s.leader),
                EntityField::list("members", |s: &Self| &s.members, |s: &mut Self| {
                    &mut s.members
                }),
                EntityField::set("rivals", |s: &Self| &s.rivals, |s: &mut Self| &mut s.rivals),
            ]
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Twice {
        a: EntityId,
    }

    impl SaveComponent for Twice {
        const TYPE_NAME: &'static str = "Twice";

        fn entity_fields() -> Vec<EntityField<Self>> {
            vec![
                EntityField::single("a", |s: &Self| &s.a, |s: &mut Self| &mut s.a),
                EntityField::single("a", |s: &Self| &s.a, |s: &mut Self| &mut s.a),
            ]
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct SameName;

    impl SaveComponent for SameName {
        const TYPE_NAME: &'static str = "game::ai::Squad";
    }

    #[test]
    fn test_registration_metadata() {
        let mut types = ComponentTypes::new();
        types.register::<Squad>().unwrap();
        types.register::<Squad>().unwrap();
        assert_eq!(types.len(), 1);

        let reg = types.get(TypeId::of::<Squad>()).unwrap();
        assert_eq!(reg.short_name(), "Squad");
        assert_eq!(
            reg.reference_fields().iter().map(|f| f.kind).collect::<Vec<_>>(),
            vec![ReferenceKind::Single, ReferenceKind::List, ReferenceKind::Set]
        );
        assert!(types.get_by_name("game::ai::Squad").is_some());
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct OtherSquad;

    impl SaveComponent for OtherSquad {
        const TYPE_NAME: &'static str = "game::net::Squad";
    }

    #[test]
    fn test_shared_short_name_tags_use_full_names() {
        let mut types = ComponentTypes::new();
        types.register::<Squad>().unwrap();
        assert_eq!(types.get(TypeId::of::<Squad>()).map(|r| r.tag()), Some("Squad"));

        types.register::<OtherSquad>().unwrap();
        assert_eq!(
            types.get(TypeId::of::<Squad>()).map(|r| r.tag()),
            Some("game::ai::Squad")
        );
        assert_eq!(
            types.get(TypeId::of::<OtherSquad>()).map(|r| r.tag()),
            Some("game::net::Squad")
        );
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut types = ComponentTypes::new();
        assert_eq!(
            types.register::<Twice>().err(),
            Some(SnapshotError::InvalidReferenceField {
                type_name: "Twice",
                field: "a",
            })
        );
    }

    #[test]
    fn test_duplicate_type_name_rejected() {
        let mut types = ComponentTypes::new();
        types.register::<Squad>().unwrap();
        assert_eq!(
            types.register::<SameName>().err(),
            Some(SnapshotError::DuplicateTypeName("game::ai::Squad"))
        );
    }

    #[test]
    fn test_map_references_visits_every_container() {
        let mut world = World::new();
        let a = world.spawn_empty();
        let b = world.spawn_empty();
        let holder = world
            .spawn((Squad {
                leader: a,
                members: vec![a, b],
                rivals: [b].into_iter().collect(),
            },))
            .unwrap();

        let mut types = ComponentTypes::new();
        types.register::<Squad>().unwrap();
        let reg = types.get(TypeId::of::<Squad>()).unwrap();

        let mut seen = Vec::new();
        reg.visit_references(&world, holder, &mut |id| seen.push(*id));
        assert_eq!(seen, vec![a, a, b, b]);

        let visited = reg.map_references(&mut world, holder, &mut |id| {
            if *id == a {
                *id = b;
            }
        });
        assert_eq!(visited, 4);
        let squad = world.get::<Squad>(holder).unwrap();
        assert_eq!(squad.leader, b);
        assert_eq!(squad.members, vec![b, b]);
    }

    #[test]
    fn test_encode_and_populate() {
        let mut types = ComponentTypes::new();
        types.register::<Squad>().unwrap();
        let reg = types.get(TypeId::of::<Squad>()).unwrap();

        let mut world = World::new();
        let target = world.spawn_empty();
        let e = world
            .spawn((Squad {
                leader: target,
                ..Default::default()
            },))
            .unwrap();
        let payload = reg.encode_value(&world, e).unwrap();

        let fresh = world.spawn_empty();
        reg.attach_default(&mut world, fresh).unwrap();
        assert_eq!(world.get::<Squad>(fresh), Some(&Squad::default()));
        reg.populate(&mut world, fresh, payload).unwrap();
        assert_eq!(world.get::<Squad>(fresh).map(|s| s.leader), Some(target));
    }
}
