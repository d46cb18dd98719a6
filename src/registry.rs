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

//! Document-level type registry: component tags <-> declared type names
//!
//! Tags are taken from the [`ComponentTypes`] catalog, never from `TypeId` or
//! registration position, so two saves of the same schema agree on every tag.

use std::collections::BTreeMap;
use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapshotError};
use crate::reflection::{ComponentRegistration, ComponentTypes};

/// Textual component tag used inside one document
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentTypeId(String);

impl ComponentTypeId {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ComponentTypeId {
    fn from(tag: &str) -> Self {
        Self(tag.to_owned())
    }
}

/// Bijection between tags and declared type names for one document
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    by_tag: BTreeMap<ComponentTypeId, String>,
    by_name: AHashMap<String, ComponentTypeId>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a document's `componentIdentifiers`
    pub fn from_identifiers(identifiers: BTreeMap<String, String>) -> Result<Self> {
        let mut registry = Self::new();
        for (tag, type_name) in identifiers {
            if registry.by_name.contains_key(&type_name) {
                return Err(SnapshotError::MalformedDocument(format!(
                    "type `{type_name}` is listed under more than one tag"
                )));
            }
            let tag = ComponentTypeId(tag);
            registry.by_name.insert(type_name.clone(), tag.clone());
            registry.by_tag.insert(tag, type_name);
        }
        Ok(registry)
    }

    /// Record the catalog tag of a registered component type
    ///
    /// The tag comes from the catalog alone, so it does not depend on which
    /// other types a document carries. Mixing registrations from different
    /// catalogs can still collide; those get a `_2`, `_3`, ... suffix.
    pub fn register(&mut self, registration: &ComponentRegistration) -> ComponentTypeId {
        if let Some(tag) = self.by_name.get(registration.type_name) {
            return tag.clone();
        }

        let preferred = registration.tag();
        let mut tag = ComponentTypeId::new(preferred);
        let mut suffix = 2;
        while self.by_tag.contains_key(&tag) {
            tag = ComponentTypeId(format!("{preferred}_{suffix}"));
            suffix += 1;
        }

        self.by_name
            .insert(registration.type_name.to_owned(), tag.clone());
        self.by_tag
            .insert(tag.clone(), registration.type_name.to_owned());
        tag
    }

    /// Tag already assigned to a declared type name
    pub fn tag_of(&self, type_name: &str) -> Option<&ComponentTypeId> {
        self.by_name.get(type_name)
    }

    /// Declared type name listed for a tag
    pub fn type_name(&self, tag: &ComponentTypeId) -> Option<&str> {
        self.by_tag.get(tag).map(String::as_str)
    }

    pub fn contains(&self, tag: &ComponentTypeId) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// Resolve a tag to the locally known concrete type
    pub fn resolve<'c>(
        &self,
        tag: &ComponentTypeId,
        types: &'c ComponentTypes,
    ) -> Result<&'c ComponentRegistration> {
        let type_name = self
            .by_tag
            .get(tag)
            .ok_or_else(|| SnapshotError::UnknownComponentType {
                tag: tag.0.clone(),
                type_name: None,
            })?;

        types
            .get_by_name(type_name)
            .ok_or_else(|| SnapshotError::UnknownComponentType {
                tag: tag.0.clone(),
                type_name: Some(type_name.clone()),
            })
    }

    /// Tags in sorted order
    pub fn tags(&self) -> impl Iterator<Item = &ComponentTypeId> {
        self.by_tag.keys()
    }

    /// The `componentIdentifiers` section of a document
    pub fn identifiers(&self) -> BTreeMap<String, String> {
        self.by_tag
            .iter()
            .map(|(tag, name)| (tag.0.clone(), name.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.by_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflection::SaveComponent;
    use std::any::TypeId;

    #[derive(Default, Serialize, Deserialize)]
    struct PlayerPosition;

    impl SaveComponent for PlayerPosition {
        const TYPE_NAME: &'static str = "player::Position";
    }

    #[derive(Default, Serialize, Deserialize)]
    struct CameraPosition;

    impl SaveComponent for CameraPosition {
        const TYPE_NAME: &'static str = "camera::Position";
    }

    fn types() -> ComponentTypes {
        let mut types = ComponentTypes::new();
        types.register::<PlayerPosition>().unwrap();
        types.register::<CameraPosition>().unwrap();
        types
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Velocity;

    impl SaveComponent for Velocity {
        const TYPE_NAME: &'static str = "player::Velocity";
    }

    #[test]
    fn test_register_is_stable() {
        let mut types = types();
        types.register::<Velocity>().unwrap();
        let reg = types.get(TypeId::of::<Velocity>()).unwrap();

        let mut first = TypeRegistry::new();
        let mut second = TypeRegistry::new();
        assert_eq!(first.register(reg), ComponentTypeId::from("Velocity"));
        assert_eq!(first.register(reg), ComponentTypeId::from("Velocity"));
        assert_eq!(second.register(reg), first.register(reg));
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_short_name_collision_is_independent_of_document() {
        let types = types();
        let player = types.get(TypeId::of::<PlayerPosition>()).unwrap();
        let camera = types.get(TypeId::of::<CameraPosition>()).unwrap();

        let mut alone = TypeRegistry::new();
        let mut both = TypeRegistry::new();
        both.register(camera);

        assert_eq!(alone.register(player), both.register(player));
        assert_eq!(alone.type_name(&"player::Position".into()), Some("player::Position"));
        assert_eq!(both.tag_of("camera::Position").map(|t| t.as_str()), Some("camera::Position"));
    }

    #[test]
    fn test_resolve_unknown() {
        let types = types();
        let registry = TypeRegistry::from_identifiers(
            [("Foo".to_string(), "LegacyFoo".to_string())].into_iter().collect(),
        )
        .unwrap();

        assert_eq!(
            registry.resolve(&"Foo".into(), &types).err(),
            Some(SnapshotError::UnknownComponentType {
                tag: "Foo".into(),
                type_name: Some("LegacyFoo".into()),
            })
        );
        assert!(matches!(
            registry.resolve(&"Bar".into(), &types),
            Err(SnapshotError::UnknownComponentType { type_name: None, .. })
        ));
    }

    #[test]
    fn test_identifiers_must_be_bijective() {
        let identifiers = [
            ("A".to_string(), "game::Same".to_string()),
            ("B".to_string(), "game::Same".to_string()),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            TypeRegistry::from_identifiers(identifiers),
            Err(SnapshotError::MalformedDocument(_))
        ));
    }
}
