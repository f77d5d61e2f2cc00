// SPDX-License-Identifier: MIT OR Apache-2.0
//! Handle registry for server-owned objects.
//!
//! Handlers mint opaque `<TypeTag>#<ordinal>` references for objects they
//! create; every later call resolves its receiver and reference-typed
//! arguments against the registry. Components, windows, and observers carry
//! an ownership edge back to the driver that produced them so callbacks can
//! locate it. Destruction is driven by the client: host-side handles that
//! became unreachable are deferred into the [`GcQueue`] and dropped in one
//! batched cleaner call.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, warn};
use utk_error::{ApiError, ErrCode};

/// An object storable in the registry.
pub trait BackendObject: Any + Send {
    /// Type tag used as the reference prefix, e.g. `"Driver"`.
    fn type_tag(&self) -> &'static str;

    /// Upcast for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

fn bad_object_ref() -> ApiError {
    ApiError::with_message(ErrCode::Internal, "Bad object ref")
}

/// Reference-to-object mapping with per-type ordinal counters and
/// driver-ownership edges.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: HashMap<String, Box<dyn BackendObject>>,
    counters: HashMap<&'static str, u32>,
    owners: HashMap<String, String>,
}

impl ObjectRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object`, minting `<TypeTag>#<n>` with the type's next
    /// ordinal. An `owner` records the driver-ownership edge.
    pub fn store(&mut self, object: Box<dyn BackendObject>, owner: Option<&str>) -> String {
        let tag = object.type_tag();
        let counter = self.counters.entry(tag).or_insert(0);
        let reference = format!("{tag}#{counter}");
        *counter += 1;
        self.objects.insert(reference.clone(), object);
        if let Some(owner) = owner {
            debug_assert!(self.objects.contains_key(owner), "owner must be live");
            self.owners.insert(reference.clone(), owner.to_string());
        }
        reference
    }

    /// `true` when `reference` names a live entry.
    #[must_use]
    pub fn contains(&self, reference: &str) -> bool {
        self.objects.contains_key(reference)
    }

    /// Resolve and downcast a reference.
    pub fn resolve<T: BackendObject>(&self, reference: &str) -> Result<&T, ApiError> {
        self.objects
            .get(reference)
            .and_then(|object| object.as_any().downcast_ref::<T>())
            .ok_or_else(bad_object_ref)
    }

    /// Resolve and downcast a reference mutably.
    pub fn resolve_mut<T: BackendObject>(&mut self, reference: &str) -> Result<&mut T, ApiError> {
        self.objects
            .get_mut(reference)
            .and_then(|object| object.as_any_mut().downcast_mut::<T>())
            .ok_or_else(bad_object_ref)
    }

    /// The owner reference recorded for `reference`, if any.
    #[must_use]
    pub fn owner_ref(&self, reference: &str) -> Option<&str> {
        self.owners.get(reference).map(String::as_str)
    }

    /// Follow the ownership edge and resolve the owning object.
    pub fn resolve_owner<T: BackendObject>(&self, reference: &str) -> Result<&T, ApiError> {
        let owner = self.owners.get(reference).ok_or_else(bad_object_ref)?;
        self.resolve::<T>(owner)
    }

    /// Remove the listed references. Missing ones are ignored; ownership
    /// edges are dropped alongside.
    pub fn drop_refs<'a>(&mut self, references: impl IntoIterator<Item = &'a str>) {
        let mut dropped = Vec::new();
        for reference in references {
            self.owners.remove(reference);
            if self.objects.remove(reference).is_some() {
                dropped.push(reference);
            } else {
                warn!(reference, "no such object living");
            }
        }
        debug!(?dropped, "deleted objects");
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// `true` when no entries are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Client-side backlog of references whose host handles became unreachable.
///
/// Once the backlog reaches the batch threshold, the whole batch is drained
/// into a single cleaner call, trading memory for round-trips.
pub struct GcQueue {
    pending: Mutex<Vec<String>>,
    threshold: usize,
}

impl GcQueue {
    /// A queue flushing at `threshold` deferred references.
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
            threshold,
        }
    }

    /// Defer a reference for batched destruction.
    pub fn defer(&self, reference: impl Into<String>) {
        self.pending.lock().expect("gc lock").push(reference.into());
    }

    /// Take the whole batch if the backlog reached the threshold.
    #[must_use]
    pub fn drain_if_due(&self) -> Option<Vec<String>> {
        let mut pending = self.pending.lock().expect("gc lock");
        if pending.len() >= self.threshold {
            Some(std::mem::take(&mut *pending))
        } else {
            None
        }
    }

    /// Take whatever is pending, due or not. Used at teardown.
    #[must_use]
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending.lock().expect("gc lock"))
    }

    /// Number of deferred references.
    #[must_use]
    pub fn backlog(&self) -> usize {
        self.pending.lock().expect("gc lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fake(&'static str, u32);

    impl BackendObject for Fake {
        fn type_tag(&self) -> &'static str {
            self.0
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn references_are_monotonic_per_type() {
        let mut registry = ObjectRegistry::new();
        assert_eq!(registry.store(Box::new(Fake("Driver", 0)), None), "Driver#0");
        assert_eq!(registry.store(Box::new(Fake("On", 1)), None), "On#0");
        assert_eq!(registry.store(Box::new(Fake("On", 2)), None), "On#1");
        assert_eq!(registry.store(Box::new(Fake("Driver", 3)), None), "Driver#1");
    }

    #[test]
    fn resolve_checks_liveness_and_type() {
        let mut registry = ObjectRegistry::new();
        let reference = registry.store(Box::new(Fake("On", 7)), None);
        assert_eq!(registry.resolve::<Fake>(&reference).unwrap().1, 7);
        let miss = registry.resolve::<Fake>("On#99").unwrap_err();
        assert_eq!(miss.code, ErrCode::Internal);
        assert_eq!(miss.message, "Bad object ref");
    }

    #[test]
    fn owner_edges_resolve_the_driver() {
        let mut registry = ObjectRegistry::new();
        let driver = registry.store(Box::new(Fake("Driver", 1)), None);
        let component = registry.store(Box::new(Fake("Component", 2)), Some(&driver));
        assert_eq!(registry.owner_ref(&component), Some(driver.as_str()));
        assert_eq!(registry.resolve_owner::<Fake>(&component).unwrap().1, 1);
    }

    #[test]
    fn dropped_refs_stop_resolving() {
        let mut registry = ObjectRegistry::new();
        let driver = registry.store(Box::new(Fake("Driver", 1)), None);
        let component = registry.store(Box::new(Fake("Component", 2)), Some(&driver));
        registry.drop_refs([component.as_str(), "Window#5"]);
        assert!(registry.resolve::<Fake>(&component).is_err());
        assert!(registry.owner_ref(&component).is_none());
        // The driver itself survives.
        assert!(registry.contains(&driver));
    }

    #[test]
    fn gc_queue_batches_at_threshold() {
        let queue = GcQueue::new(3);
        queue.defer("Component#0");
        queue.defer("Component#1");
        assert!(queue.drain_if_due().is_none());
        queue.defer("On#0");
        let batch = queue.drain_if_due().unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.backlog(), 0);
    }
}
