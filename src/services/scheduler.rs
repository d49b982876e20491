//! Single-threaded scheduling primitives.
//!
//! Everything here runs on a current-thread tokio runtime inside a
//! [`tokio::task::LocalSet`]: timers are the only suspension points, callbacks
//! never run in parallel, and shared state lives in `Rc`/`RefCell`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// === Debouncer ===

/// Runs the most recently scheduled action once `delay` has passed without a newer one.
///
/// Scheduling aborts the previous pending task, so at most one action is pending
/// per debouncer (last call wins). Must be used from within a `LocalSet`.
pub struct Debouncer {
    delay: Duration,
    pending: RefCell<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: RefCell::new(None),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action`, replacing any pending one.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + 'static,
    {
        self.cancel();
        let delay = self.delay;
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        *self.pending.borrow_mut() = Some(handle);
    }

    /// Drops the pending action, if any.
    pub fn cancel(&self) {
        if let Some(handle) = self.pending.borrow_mut().take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .borrow()
            .as_ref()
            .map_or(false, |h| !h.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

// === Poller ===

/// Calls `tick` every `period` until it returns `false`.
///
/// Used where the host offers no change notification and state must be sampled.
/// The first tick fires immediately. Must be spawned from within a `LocalSet`.
pub fn spawn_poller<F>(period: Duration, mut tick: F) -> JoinHandle<()>
where
    F: FnMut() -> bool + 'static,
{
    tokio::task::spawn_local(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if !tick() {
                break;
            }
        }
    })
}

// === Subscribers ===

type Callback<T> = Rc<dyn Fn(&T)>;

struct Registry<T: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
}

/// A list of change callbacks.
///
/// Notification iterates over a copy of the list, so callbacks may subscribe or
/// unsubscribe while being notified.
pub struct Subscribers<T: ?Sized> {
    registry: Rc<RefCell<Registry<T>>>,
}

impl<T: ?Sized + 'static> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `callback`; the returned handle removes it again.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        let id = {
            let mut reg = self.registry.borrow_mut();
            let id = reg.next_id;
            reg.next_id += 1;
            let callback: Callback<T> = Rc::new(callback);
            reg.entries.push((id, callback));
            id
        };
        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.registry);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(reg) = weak.upgrade() {
                    reg.borrow_mut().entries.retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    /// Invokes every registered callback with `value`.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .registry
            .borrow()
            .entries
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(value);
        }
    }

    pub fn len(&self) -> usize {
        self.registry.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every callback.
    pub fn clear(&self) {
        self.registry.borrow_mut().entries.clear();
    }
}

impl<T: ?Sized + 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer returned by [`Subscribers::subscribe`].
///
/// Dropping it keeps the callback registered; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
