use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

pub(crate) type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

pub(crate) struct Listeners<A: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Callback<A>)>,
}

/// Callbacks registered against one kind of update.
pub(crate) type Registry<A> = Arc<Mutex<Listeners<A>>>;

pub(crate) fn registry<A: ?Sized>() -> Registry<A> {
    Arc::new(Mutex::new(Listeners {
        next_id: 0,
        entries: Vec::new(),
    }))
}

fn lock<A: ?Sized>(registry: &Mutex<Listeners<A>>) -> MutexGuard<'_, Listeners<A>> {
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn register<A: ?Sized + 'static>(
    registry: &Registry<A>,
    callback: Callback<A>,
) -> Subscription {
    let id = {
        let mut listeners = lock(registry);
        listeners.next_id += 1;
        let id = listeners.next_id;
        listeners.entries.push((id, callback));
        id
    };

    let registry = Arc::downgrade(registry);
    Subscription {
        cancel: Some(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                lock(&registry).entries.retain(|(entry, _)| *entry != id);
            }
        })),
    }
}

/// Invoke every registered callback. The registry lock is released first so
/// callbacks may subscribe or unsubscribe.
pub(crate) fn notify<A: ?Sized>(registry: &Registry<A>, value: &A) {
    let callbacks: Vec<Callback<A>> = lock(registry)
        .entries
        .iter()
        .map(|(_, callback)| callback.clone())
        .collect();

    for callback in callbacks {
        callback(value);
    }
}

pub(crate) fn count<A: ?Sized>(registry: &Registry<A>) -> usize {
    lock(registry).entries.len()
}

/// Live registration of a store callback. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
