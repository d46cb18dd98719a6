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

//! Entity identifiers and location metadata.

use slotmap::{new_key_type, Key};

new_key_type! {
    /// Unique entity identifier backed by slotmap's generational keys.
    ///
    /// Only meaningful inside the world that allocated it. A loaded snapshot
    /// always receives fresh ids.
    pub struct EntityId;
}

/// The "no entity" sentinel written into reference fields whose target was
/// not part of the loaded snapshot.
#[inline]
pub fn no_entity() -> EntityId {
    EntityId::null()
}

/// Entity location in archetype (archetype_id, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype_id: usize,
    pub archetype_row: usize,
}
