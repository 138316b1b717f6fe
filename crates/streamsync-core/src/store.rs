// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Holder of the current [`Snapshot`].
//!
//! Replacement swaps one `Arc` under a short write lock, so readers always get
//! a complete snapshot, either the old one or the new one.

use std::sync::{Arc, PoisonError, RwLock};

use crate::snapshot::Snapshot;

#[derive(Debug)]
pub struct StateStore {
    inner: RwLock<Versioned>,
}

#[derive(Debug)]
struct Versioned {
    snapshot: Arc<Snapshot>,
    generation: u64,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    /// Creates a store holding an all-empty snapshot (generation 0).
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Versioned {
                snapshot: Arc::new(Snapshot::default()),
                generation: 0,
            }),
        }
    }

    /// Swaps in `snapshot` and returns the shared handle now being served.
    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.snapshot = Arc::clone(&snapshot);
        guard.generation += 1;
        snapshot
    }

    pub fn current(&self) -> Arc<Snapshot> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.snapshot)
    }

    /// Number of replacements so far; 0 until the first successful poll.
    pub fn generation(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Returns the current snapshot together with its generation, read
    /// atomically.
    pub fn current_with_generation(&self) -> (Arc<Snapshot>, u64) {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&guard.snapshot), guard.generation)
    }
}
