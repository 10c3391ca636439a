// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Instance identifiers.
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique identifier of an [`InstanceWorld`](crate::InstanceWorld).
///
/// Ids are handed out by [`allocate_instance_id`] in increasing order starting
/// at 1 and are never reused while the process lives. They are not persisted;
/// a restarted process starts counting again.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InstanceId(u64);

impl InstanceId {
    /// Wraps a raw id.
    ///
    /// Intended for tests and tooling that need a specific id; runtime code
    /// should go through [`allocate_instance_id`].
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a fresh, process-unique instance id.
///
/// Monotonic: every call returns a larger id than the previous one.
pub fn allocate_instance_id() -> InstanceId {
    InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
}
