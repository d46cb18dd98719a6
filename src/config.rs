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

//! Save/load configuration

use serde::{Deserialize, Serialize};

/// What a load does with a tag whose type is not known locally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownComponentPolicy {
    /// Fail with `UnknownComponentType` before any entity is created
    #[default]
    Abort,
    /// Drop the tag from every archetype and ignore its payloads
    Skip,
}

/// Options shared by save and load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub unknown_components: UnknownComponentPolicy,
    /// Indented JSON output
    pub pretty_print: bool,
}

impl SnapshotConfig {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            unknown_components: UnknownComponentPolicy::Skip,
            ..Self::default()
        }
    }

    pub fn with_unknown_components(mut self, policy: UnknownComponentPolicy) -> Self {
        self.unknown_components = policy;
        self
    }

    pub fn with_pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    pub fn skips_unknown(&self) -> bool {
        self.unknown_components == UnknownComponentPolicy::Skip
    }
}
