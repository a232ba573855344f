// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared rendering/processing context.
//!
//! A single context exists per preview. Exactly one frame converter may hold
//! it at a time; the lease is released when the converter closes. The context
//! also remembers the last timestamp handed downstream, so a converter created
//! after a suspend continues the timeline of the one before it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::core::{PreviewError, Result};

struct ContextInner {
    label: String,
    leased: AtomicBool,
    generation: AtomicU64,
    last_timestamp_us: Mutex<Option<i64>>,
}

#[derive(Clone)]
pub struct RenderContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("label", &self.inner.label)
            .field("leased", &self.is_leased())
            .field("generation", &self.generation())
            .finish()
    }
}

impl RenderContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                label: label.into(),
                leased: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                last_timestamp_us: Mutex::new(None),
            }),
        }
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Take exclusive ownership of the context.
    pub fn acquire(&self) -> Result<ContextLease> {
        if self
            .inner
            .leased
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PreviewError::ContextBusy(self.inner.label.clone()));
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!("Render context '{}' leased (generation {})", self.inner.label, generation);
        Ok(ContextLease {
            inner: Arc::clone(&self.inner),
            generation,
        })
    }

    pub fn is_leased(&self) -> bool {
        self.inner.leased.load(Ordering::Acquire)
    }

    /// Number of leases handed out so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    /// Timestamp of the last frame any converter forwarded on this context.
    pub fn last_timestamp_us(&self) -> Option<i64> {
        *self.inner.last_timestamp_us.lock()
    }

    pub(crate) fn record_timestamp_us(&self, timestamp_us: i64) {
        *self.inner.last_timestamp_us.lock() = Some(timestamp_us);
    }
}

/// Exclusive hold on a [`RenderContext`]; released on drop.
pub struct ContextLease {
    inner: Arc<ContextInner>,
    generation: u64,
}

impl ContextLease {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl std::fmt::Debug for ContextLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextLease")
            .field("label", &self.inner.label)
            .field("generation", &self.generation)
            .finish()
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.inner.leased.store(false, Ordering::Release);
        tracing::debug!(
            "Render context '{}' released (generation {})",
            self.inner.label,
            self.generation
        );
    }
}
