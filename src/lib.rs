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

//! Archetype Snapshot - save and load archetype ECS worlds
//!
//! Snapshots a selection of entities into a self-describing JSON document and
//! rebuilds it in any world, rewriting entity references to the new ids.

pub mod archetype;
pub mod archetype_index;
pub mod collector;
pub mod component;
pub mod config;
pub mod de;
pub mod document;
pub mod entity;
pub mod entity_ids;
pub mod entity_serializer;
pub mod error;
pub mod key;
pub mod prelude;
#[cfg(feature = "profiling")]
pub mod profiling;
pub mod reference;
pub mod reflection;
pub mod registry;
pub mod serialization;
pub mod world;


pub use archetype::*;
pub use archetype_index::*;
pub use collector::*;
pub use component::*;
pub use config::*;
pub use document::*;
pub use entity::*;
pub use entity_ids::*;
pub use entity_serializer::*;
pub use error::*;
pub use key::*;
pub use reference::*;
pub use reflection::*;
pub use registry::*;
pub use serialization::*;
pub use world::*;
