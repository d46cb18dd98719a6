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

//! # Profiling
//!
//! With the `profiling` feature enabled, `save` and `load` open
//! `snapshot.save` / `snapshot.load` spans, and phase counts are emitted as
//! `debug!` events in every build.
//!
//! ```toml
//! [dependencies]
//! archetype_snapshot = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! let _guard = archetype_snapshot::profiling::init_json_subscriber("trace.json", tracing::Level::DEBUG)?;
//! let snapshot = serializer.save_all(&world)?;
//! // keep `_guard` alive until the trace has been written
//! ```

use std::fs::File;
use std::path::Path;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;

use crate::error::{Result, SnapshotError};

/// Write JSON trace events to `path` through a non-blocking writer.
///
/// Fails if a global subscriber is already installed.
pub fn init_json_subscriber(path: impl AsRef<Path>, level: Level) -> Result<WorkerGuard> {
    let file = File::create(path)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .json()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_max_level(level)
        .try_init()
        .map_err(|e| SnapshotError::IoError(e.to_string()))?;
    Ok(guard)
}
