use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Fan-out point for host resize events.
///
/// Hosts own one notifier and call [`ResizeNotifier::notify`] whenever their
/// size or pixel ratio changes. Subscribers hold a [`ResizeSubscription`];
/// the notifier keeps only weak references, so dropping a subscription
/// revokes it.
#[derive(Debug, Default)]
pub struct ResizeNotifier {
    subscribers: Mutex<Vec<Weak<AtomicBool>>>,
}

impl ResizeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new subscription. It starts with no pending notification.
    pub fn subscribe(&self) -> ResizeSubscription {
        let flag = Arc::new(AtomicBool::new(false));
        self.subscribers.lock().push(Arc::downgrade(&flag));
        ResizeSubscription { flag }
    }

    /// Marks every live subscription pending and prunes revoked ones.
    pub fn notify(&self) {
        self.subscribers.lock().retain(|weak| match weak.upgrade() {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        });
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subs = self.subscribers.lock();
        subs.retain(|weak| weak.strong_count() > 0);
        subs.len()
    }
}

/// Revocable handle to a [`ResizeNotifier`] registration.
///
/// Dropping the handle (or calling [`ResizeSubscription::revoke`]) stops
/// delivery; nothing else keeps the registration alive.
#[derive(Debug)]
pub struct ResizeSubscription {
    flag: Arc<AtomicBool>,
}

impl ResizeSubscription {
    /// Returns and clears the pending flag.
    pub fn take_pending(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    pub fn revoke(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_marks_pending_once() {
        let notifier = ResizeNotifier::new();
        let sub = notifier.subscribe();
        assert!(!sub.is_pending());

        notifier.notify();
        assert!(sub.take_pending());
        assert!(!sub.take_pending());
    }

    #[test]
    fn dropping_revokes() {
        let notifier = ResizeNotifier::new();
        let a = notifier.subscribe();
        let b = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        drop(a);
        b.revoke();
        assert_eq!(notifier.subscriber_count(), 0);

        // Notifying with no subscribers is harmless.
        notifier.notify();
    }
}
