// ── Reactive snapshot collection ──
//
// The tracker always sends whole lists, so a collection is a single
// `watch` channel holding the current snapshot. Every mutation publishes
// a new `Arc` so readers never block writers.

use std::sync::Arc;

use tokio::sync::watch;

pub(crate) type Snapshot<T> = Arc<Vec<Arc<T>>>;

/// A reactive list of one resource type.
pub(crate) struct EntityCollection<T: Send + Sync + 'static> {
    snapshot: watch::Sender<Snapshot<T>>,
}

impl<T: Send + Sync + 'static> EntityCollection<T> {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self { snapshot }
    }

    /// Replace the whole list.
    pub(crate) fn replace(&self, items: Vec<T>) {
        let values: Vec<Arc<T>> = items.into_iter().map(Arc::new).collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    /// Rewrite the first entity matching `pred`. Returns `false` (and
    /// notifies nobody) when nothing matched.
    pub(crate) fn update_first<P, F>(&self, pred: P, apply: F) -> bool
    where
        T: Clone,
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T),
    {
        self.snapshot.send_if_modified(|snap| {
            let Some(pos) = snap.iter().position(|item| pred(item)) else {
                return false;
            };
            let mut values: Vec<Arc<T>> = snap.iter().cloned().collect();
            let mut item = T::clone(&values[pos]);
            apply(&mut item);
            values[pos] = Arc::new(item);
            *snap = Arc::new(values);
            true
        })
    }

    /// Remove everything. Subscribers are only woken if the list was
    /// non-empty.
    pub(crate) fn clear(&self) {
        self.snapshot.send_if_modified(|snap| {
            if snap.is_empty() {
                return false;
            }
            *snap = Arc::new(Vec::new());
            true
        });
    }

    pub(crate) fn snapshot(&self) -> Snapshot<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot.borrow().len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn replace_publishes_new_snapshot() {
        let col: EntityCollection<String> = EntityCollection::new();
        let mut rx = col.subscribe();
        assert!(col.snapshot().is_empty());

        col.replace(vec!["a".into(), "b".into()]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn update_first_touches_only_the_match() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.replace(vec!["a".into(), "b".into(), "b".into()]);

        assert!(col.update_first(|s| s == "b", |s| s.push('!')));
        let snap = col.snapshot();
        assert_eq!(*snap[1], "b!");
        assert_eq!(*snap[2], "b");
    }

    #[test]
    fn update_without_match_is_silent() {
        let col: EntityCollection<String> = EntityCollection::new();
        col.replace(vec!["a".into()]);
        let rx = col.subscribe();

        assert!(!col.update_first(|s| s == "z", |s| s.clear()));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn clear_on_empty_does_not_notify() {
        let col: EntityCollection<u32> = EntityCollection::new();
        let rx = col.subscribe();
        col.clear();
        assert!(!rx.has_changed().unwrap());

        col.replace(vec![1]);
        col.clear();
        assert!(rx.has_changed().unwrap());
        assert_eq!(col.len(), 0);
    }
}
