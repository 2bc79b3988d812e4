//! Process-local identifier allocation for new URL records.

use serde_json::json;
use std::sync::{Mutex, PoisonError};

use crate::error::AppError;

/// Hands out strictly increasing URL ids.
///
/// Seeded with the largest id already persisted, so the first call returns
/// `seed + 1`. Every read-increment-write happens under one mutex, which keeps
/// concurrent shorten requests from ever receiving the same id.
///
/// Only one writer process may allocate against a given store. Running several
/// writer replicas requires a store-backed sequence instead.
#[derive(Debug)]
pub struct IdAllocator {
    last_id: Mutex<u64>,
}

impl IdAllocator {
    /// Creates an allocator whose next id is `seed + 1`.
    pub fn new(seed: u64) -> Self {
        Self {
            last_id: Mutex::new(seed),
        }
    }

    /// Allocates the next id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] once the id space is exhausted.
    pub fn next(&self) -> Result<u64, AppError> {
        // The guarded value is a plain integer, so a poisoned lock still holds a valid id.
        let mut last_id = self.last_id.lock().unwrap_or_else(PoisonError::into_inner);

        let id = last_id.checked_add(1).ok_or_else(|| {
            AppError::internal("Identifier space exhausted", json!({ "last_id": *last_id }))
        })?;
        *last_id = id;

        Ok(id)
    }

    /// Returns the most recently issued id (the seed if none was issued yet).
    pub fn last_issued(&self) -> u64 {
        *self.last_id.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
