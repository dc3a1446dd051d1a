//! Process-local admission control for testcase callbacks.
//!
//! The execution pool retries callbacks aggressively, so several requests
//! for the same testcase result can land on one instance at once. Only one
//! of them is let through to the aggregation transaction; the rest get a 429
//! and retry later.
//!
//! This is load shedding, not a correctness mechanism. The in-flight set
//! lives in one process, starts empty on restart, and knows nothing about
//! other replicas. Exactly-once folding of a testcase result is enforced by
//! the row locks and the `evaluated_at` marker in [`crate::aggregation`].
//! A multi-replica deployment that also wants cross-instance shedding needs
//! a shared lease store behind [`AdmissionControl`].

use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use uuid::Uuid;

/// Capability to mark a testcase result as "in flight".
pub trait AdmissionControl: Send + Sync {
    /// Marks `id` as in flight. Returns false if it already was.
    fn try_acquire(&self, id: Uuid) -> bool;

    /// Clears the in-flight mark for `id`. Releasing an id that is not
    /// marked is a no-op.
    fn release(&self, id: Uuid);
}

/// In-memory [`AdmissionControl`] backed by a concurrent set.
#[derive(Debug, Default)]
pub struct InFlightSet {
    in_flight: DashSet<Uuid>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.in_flight.contains(id)
    }
}

impl AdmissionControl for InFlightSet {
    fn try_acquire(&self, id: Uuid) -> bool {
        // Insert-if-absent under the shard lock.
        self.in_flight.insert(id)
    }

    fn release(&self, id: Uuid) {
        self.in_flight.remove(&id);
    }
}

/// Scoped in-flight mark. Released when dropped, which also covers early
/// returns, panics and cancelled request futures.
#[must_use = "the in-flight mark is released as soon as the permit is dropped"]
pub struct AdmissionPermit {
    control: Arc<dyn AdmissionControl>,
    id: Uuid,
}

impl AdmissionPermit {
    /// Returns `None` when another holder already has `id` in flight.
    pub fn try_acquire(control: Arc<dyn AdmissionControl>, id: Uuid) -> Option<Self> {
        if control.try_acquire(id) {
            Some(Self { control, id })
        } else {
            None
        }
    }
}

impl fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionPermit").field("id", &self.id).finish()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.control.release(self.id);
    }
}
