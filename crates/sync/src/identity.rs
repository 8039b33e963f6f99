// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Device and queue item identifiers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tandem_core::DeviceType;
use tracing::info;

use crate::storage::{Storage, StorageResult, SyncStore};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// 16 hex chars from SHA256(wall time, pid, process-local counter).
fn unique_hex() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let input = format!("{}:{}:{}", nanos, std::process::id(), count);
    let hash = Sha256::digest(input.as_bytes());
    hex::encode(&hash[..8])
}

/// Generate a fresh device id.
/// Format: {type}-{hash} where hash is 16 hex chars.
pub fn generate_device_id(device_type: DeviceType) -> String {
    format!("{}-{}", device_type.as_str(), unique_hex())
}

/// Generate an id for an offline queue item.
pub fn generate_item_id() -> String {
    format!("q-{}", unique_hex())
}

/// Returns this install's device id, creating and persisting one on first use.
pub fn load_or_create_device_id<S: Storage>(
    store: &SyncStore<S>,
    device_type: DeviceType,
) -> StorageResult<String> {
    if let Some(id) = store.load_device_id()? {
        return Ok(id);
    }
    let id = generate_device_id(device_type);
    store.save_device_id(&id)?;
    info!(device_id = %id, "generated device id");
    Ok(id)
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod tests;
