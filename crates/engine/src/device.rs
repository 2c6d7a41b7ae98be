// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device identity: a persistent UUID plus a 4-letter word-based short id.
//!
//! Both are cached under `.tmp/` so word-pool changes never re-identify an
//! existing device. The short id is what `@name:DEVICE` suffixes refer to.

use crate::error::EngineError;
use hcom_core::hash_to_name;
use std::path::Path;

const DEVICE_ID_FILE: &str = "device_id";
const SHORT_ID_FILE: &str = "device_short_id";

/// Get or create the persistent device UUID.
pub fn device_uuid(root: &Path) -> Result<String, EngineError> {
    let path = root.join(".tmp").join(DEVICE_ID_FILE);
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    write_atomic(&path, &id)?;
    Ok(id)
}

/// Get the 4-letter device short id (e.g. `BOXE`), derived from the UUID
/// on first use and cached thereafter.
pub fn device_short_id(root: &Path) -> Result<String, EngineError> {
    let path = root.join(".tmp").join(SHORT_ID_FILE);
    if let Ok(existing) = std::fs::read_to_string(&path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return Ok(existing.to_string());
        }
    }

    let short = hash_to_name(&device_uuid(root)?).to_ascii_uppercase();
    write_atomic(&path, &short)?;
    Ok(short)
}

/// Append the `:DEVICE` suffix to a name unless it already carries one.
pub fn add_device_suffix(name: &str, short_id: &str) -> String {
    if name.contains(':') {
        name.to_string()
    } else {
        format!("{name}:{short_id}")
    }
}

fn write_atomic(path: &Path, content: &str) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
