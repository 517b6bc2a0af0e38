//! Target suppliers and composite memoization
//!
//! A compiled accessor never holds a child object directly; it holds a
//! [`Supplier`] that produces the object on each access. The root target is
//! pinned at compile time. Composite children go through their parent's
//! getter, optionally memoized in an explicit cache cell: value plus
//! fetched-at instant, recomputed lazily once stale. Concurrent readers may
//! race to populate the cell; the result converges to a single cached value
//! and the double computation is tolerated (getters are assumed idempotent).

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::TargetFault;
use crate::meta::CachePolicy;
use crate::types::Invoker;
use crate::value::{ObjectHandle, Value};

/// Supplies the object a compiled accessor runs against.
#[derive(Clone)]
pub enum Supplier {
    /// The root target, pinned at compile time.
    Root(ObjectHandle),
    /// A composite child fetched through its parent's getter.
    Composite(Arc<CompositeSupplier>),
}

impl Supplier {
    /// Build a composite supplier over a parent and a getter invoker.
    pub fn composite(parent: Supplier, getter: Invoker, cache: CachePolicy) -> Supplier {
        Supplier::Composite(Arc::new(CompositeSupplier {
            parent,
            getter,
            cache,
            cell: Mutex::new(None),
        }))
    }

    /// Fetch the current object, honoring the cache policy.
    ///
    /// `Ok(None)` means the getter returned null. Compile-time callers treat
    /// that as an empty composite; dispatch-time callers as a target fault.
    pub fn fetch(&self) -> Result<Option<ObjectHandle>, TargetFault> {
        match self {
            Supplier::Root(handle) => Ok(Some(handle.clone())),
            Supplier::Composite(composite) => composite.fetch(),
        }
    }

    /// Fetch from the live target, bypassing any memoized value. Used by the
    /// compiler to discover a child's runtime type.
    pub fn fetch_fresh(&self) -> Result<Option<ObjectHandle>, TargetFault> {
        match self {
            Supplier::Root(handle) => Ok(Some(handle.clone())),
            Supplier::Composite(composite) => composite.fetch_fresh(),
        }
    }
}

struct CacheEntry {
    handle: Option<ObjectHandle>,
    fetched_at: Instant,
}

/// Parent supplier + getter + cache cell.
pub struct CompositeSupplier {
    parent: Supplier,
    getter: Invoker,
    cache: CachePolicy,
    cell: Mutex<Option<CacheEntry>>,
}

impl CompositeSupplier {
    fn fetch(&self) -> Result<Option<ObjectHandle>, TargetFault> {
        match self.cache {
            CachePolicy::Refetch => self.fetch_fresh(),
            CachePolicy::Ttl(window) => {
                {
                    let cell = self.cell.lock();
                    if let Some(entry) = cell.as_ref() {
                        if entry.fetched_at.elapsed() < window {
                            return Ok(entry.handle.clone());
                        }
                    }
                }
                // Compute outside the lock; last writer wins.
                let handle = self.fetch_fresh()?;
                *self.cell.lock() = Some(CacheEntry {
                    handle: handle.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(handle)
            }
            CachePolicy::Pinned => {
                {
                    let cell = self.cell.lock();
                    if let Some(entry) = cell.as_ref() {
                        return Ok(entry.handle.clone());
                    }
                }
                let handle = self.fetch_fresh()?;
                let mut cell = self.cell.lock();
                match cell.as_ref() {
                    // A racing reader populated first; converge on its value.
                    Some(entry) => Ok(entry.handle.clone()),
                    None => {
                        *cell = Some(CacheEntry {
                            handle: handle.clone(),
                            fetched_at: Instant::now(),
                        });
                        Ok(handle)
                    }
                }
            }
        }
    }

    fn fetch_fresh(&self) -> Result<Option<ObjectHandle>, TargetFault> {
        let Some(parent) = self.parent.fetch()? else {
            return Ok(None);
        };
        match (self.getter)(parent.as_any(), &[])? {
            Value::Object(handle) => Ok(Some(handle)),
            Value::Null => Ok(None),
            other => Err(TargetFault::fatal(format!(
                "composite getter returned a {} instead of an object",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::time::Duration;

    struct Source {
        fetches: AtomicI64,
    }

    fn counting_supplier(cache: CachePolicy) -> (Supplier, Arc<Source>) {
        let source = Arc::new(Source {
            fetches: AtomicI64::new(0),
        });
        let root = Supplier::Root(ObjectHandle::from_shared("Source", source.clone()));
        let getter: Invoker = Arc::new(|target, _| {
            let source = crate::types::downcast::<Source>(target)?;
            let id = source.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Object(ObjectHandle::new("Snapshot", id)))
        });
        (Supplier::composite(root, getter, cache), source)
    }

    fn snapshot_id(handle: &ObjectHandle) -> i64 {
        *handle.downcast_ref::<i64>().unwrap()
    }

    #[test]
    fn test_refetch_fetches_every_access() {
        let (supplier, source) = counting_supplier(CachePolicy::Refetch);
        let a = supplier.fetch().unwrap().unwrap();
        let b = supplier.fetch().unwrap().unwrap();
        assert_ne!(snapshot_id(&a), snapshot_id(&b));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ttl_serves_one_snapshot_within_window() {
        let (supplier, source) = counting_supplier(CachePolicy::Ttl(Duration::from_secs(60)));
        let a = supplier.fetch().unwrap().unwrap();
        let b = supplier.fetch().unwrap().unwrap();
        assert_eq!(snapshot_id(&a), snapshot_id(&b));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ttl_refreshes_after_window() {
        let (supplier, _) = counting_supplier(CachePolicy::Ttl(Duration::from_millis(30)));
        let a = supplier.fetch().unwrap().unwrap();
        std::thread::sleep(Duration::from_millis(80));
        let b = supplier.fetch().unwrap().unwrap();
        assert_ne!(snapshot_id(&a), snapshot_id(&b));
    }

    #[test]
    fn test_pinned_fetches_once() {
        let (supplier, source) = counting_supplier(CachePolicy::Pinned);
        let a = supplier.fetch().unwrap().unwrap();
        let b = supplier.fetch().unwrap().unwrap();
        assert_eq!(snapshot_id(&a), snapshot_id(&b));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fetch_fresh_bypasses_cache() {
        let (supplier, source) = counting_supplier(CachePolicy::Pinned);
        supplier.fetch().unwrap();
        supplier.fetch_fresh().unwrap();
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_null_getter_result_is_none() {
        let root = Supplier::Root(ObjectHandle::new("Source", ()));
        let getter: Invoker = Arc::new(|_, _| Ok(Value::Null));
        let supplier = Supplier::composite(root, getter, CachePolicy::Refetch);
        assert!(supplier.fetch().unwrap().is_none());
    }

    #[test]
    fn test_non_object_getter_result_is_fatal() {
        let root = Supplier::Root(ObjectHandle::new("Source", ()));
        let getter: Invoker = Arc::new(|_, _| Ok(Value::I32(1)));
        let supplier = Supplier::composite(root, getter, CachePolicy::Refetch);
        let fault = supplier.fetch().unwrap_err();
        assert_eq!(fault.kind, crate::error::FaultKind::Fatal);
    }
}
