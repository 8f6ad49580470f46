//! Copy-on-write listener registry.

use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

/// Ordered set of shared listeners, compared by identity.
///
/// Registration swaps in a new list, so a snapshot taken for iteration is
/// never affected by listeners added or removed while it is walked.
pub struct ListenerList<T: ?Sized> {
    entries: ArcSwap<Vec<Arc<T>>>,
}

impl<T: ?Sized> Default for ListenerList<T> {
    fn default() -> Self { Self::new() }
}

impl<T: ?Sized> fmt::Debug for ListenerList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerList").field("len", &self.len()).finish()
    }
}

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool { std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)) }

impl<T: ?Sized> ListenerList<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append `listener`. Returns `false` if it is already present.
    pub fn add(&self, listener: Arc<T>) -> bool {
        let mut added = false;
        self.entries.rcu(|current| {
            added = !current.iter().any(|entry| same(entry, &listener));
            if added {
                let mut next = Vec::with_capacity(current.len() + 1);
                next.extend(current.iter().cloned());
                next.push(Arc::clone(&listener));
                Arc::new(next)
            } else {
                Arc::clone(current)
            }
        });
        added
    }

    /// Remove `listener`. Returns `false` if it was not present.
    pub fn remove(&self, listener: &Arc<T>) -> bool {
        let mut removed = false;
        self.entries.rcu(|current| {
            removed = current.iter().any(|entry| same(entry, listener));
            if removed {
                Arc::new(
                    current
                        .iter()
                        .filter(|entry| !same(entry, listener))
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            } else {
                Arc::clone(current)
            }
        });
        removed
    }

    #[must_use]
    pub fn contains(&self, listener: &Arc<T>) -> bool {
        self.entries.load().iter().any(|entry| same(entry, listener))
    }

    /// Listeners in registration order at the time of the call.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Vec<Arc<T>>> { self.entries.load_full() }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.load().len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.load().is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    struct Fixed(&'static str);

    impl Named for Fixed {
        fn name(&self) -> &str { self.0 }
    }

    #[test]
    fn duplicates_are_rejected_by_identity() {
        let list: ListenerList<dyn Named> = ListenerList::new();
        let a: Arc<dyn Named> = Arc::new(Fixed("a"));
        let twin: Arc<dyn Named> = Arc::new(Fixed("a"));
        assert!(list.add(Arc::clone(&a)));
        assert!(!list.add(Arc::clone(&a)));
        assert!(list.add(twin));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn snapshot_is_stable_across_removal() {
        let list: ListenerList<dyn Named> = ListenerList::new();
        let a: Arc<dyn Named> = Arc::new(Fixed("a"));
        let b: Arc<dyn Named> = Arc::new(Fixed("b"));
        list.add(Arc::clone(&a));
        list.add(Arc::clone(&b));

        let snapshot = list.snapshot();
        assert!(list.remove(&a));
        assert!(!list.remove(&a));

        let names: Vec<_> = snapshot.iter().map(|entry| entry.name()).collect();
        assert_eq!(names, ["a", "b"]);
        assert!(!list.contains(&a));
        assert!(list.contains(&b));
    }
}
