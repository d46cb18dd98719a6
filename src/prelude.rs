//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use archetype_snapshot::prelude::*;
//! ```

pub use crate::component::Component;
pub use crate::config::{SnapshotConfig, UnknownComponentPolicy};
pub use crate::document::SaveSnapshot;
pub use crate::entity::{no_entity, EntityId};
pub use crate::error::{Result, SnapshotError};
pub use crate::key::SerializationTag;
pub use crate::reflection::{ComponentTypes, EntityField, SaveComponent};
pub use crate::serialization::{LoadResult, WorldSerializer};
pub use crate::world::World;
