//! Listener sets with explicit dispose handles (§9 design note), replacing
//! the source's global-mutable callback registries: each emitter owns a
//! `Subscribers<T>`; `subscribe` returns an owning `Subscription` whose drop
//! unsubscribes. A kind-lifecycle uses a scoped group (`SubscriptionGroup`)
//! tied to the live kind so replacing the kind tears down its listeners.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

type Listener<T> = Box<dyn FnMut(&T) + Send>;

struct Inner<T> {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(u64, Listener<T>)>>,
}

/// A single-executor listener set. Registration and firing are serialised
/// because only one task ever touches core state at a time (§5).
pub struct Subscribers<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Subscribers { inner: Arc::new(Inner { next_id: AtomicU64::new(0), listeners: Mutex::new(Vec::new()) }) }
    }

    #[must_use = "dropping the Subscription immediately unsubscribes it"]
    pub fn subscribe(&self, f: impl FnMut(&T) + Send + 'static) -> Subscription<T> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().unwrap().push((id, Box::new(f)));
        Subscription { inner: Arc::downgrade(&self.inner), id }
    }

    pub fn fire(&self, value: &T) {
        for (_, listener) in self.inner.listeners.lock().unwrap().iter_mut() {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.listeners.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Owning handle: dropping it removes the listener. Never implements
/// `Clone` — ownership of "is this still subscribed" must be unambiguous.
#[must_use = "dropping the Subscription immediately unsubscribes it"]
pub struct Subscription<T> {
    inner: std::sync::Weak<Inner<T>>,
    id: u64,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

/// A scoped group of subscriptions tied to one kind's lifetime. Dropping (or
/// clearing) the group tears down every subscription in it at once — used
/// when a `Proc`'s live kind is replaced or torn down.
#[derive(Default)]
pub struct SubscriptionGroup {
    handles: Vec<Box<dyn std::any::Any + Send>>,
}

impl SubscriptionGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<T: 'static>(&mut self, sub: Subscription<T>) {
        self.handles.push(Box::new(sub));
    }

    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fire_invokes_all_live_subscriptions() {
        let subs: Subscribers<i32> = Subscribers::new();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c1 = count.clone();
        let sub = subs.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        subs.fire(&1);
        subs.fire(&2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(sub);
        subs.fire(&3);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn group_clear_drops_all_subscriptions_at_once() {
        let subs: Subscribers<()> = Subscribers::new();
        let mut group = SubscriptionGroup::new();
        let fired = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for _ in 0..3 {
            let f = fired.clone();
            group.add(subs.subscribe(move |_| {
                f.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(subs.len(), 3);
        group.clear();
        assert_eq!(subs.len(), 0);
        subs.fire(&());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
