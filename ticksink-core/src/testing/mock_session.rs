//! Programmable stream session for tests
//!
//! Subscribe outcomes are scripted with [`MockSession::fail_next`]; feed
//! events are injected with [`MockSession::deliver`] and
//! [`MockSession::drop_subscription`]. Callbacks run on the caller's thread
//! with no internal lock held, so a listener may resubscribe re-entrantly
//! exactly as it would from a real session's callback thread.

use crate::core::SubscriptionError;
use crate::feed::{ItemUpdate, StreamSession, Subscription};
use parking_lot::Mutex;
use std::time::Instant;

#[derive(Default)]
struct MockState {
    active: Option<Subscription>,
    failures_remaining: u32,
    subscribe_calls: Vec<Instant>,
    unsubscribe_calls: usize,
    disconnected: bool,
}

#[derive(Default)]
pub struct MockSession {
    state: Mutex<MockState>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `count` subscribe calls
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failures_remaining = count;
    }

    /// Hand `update` to the active subscription's listener.
    /// Returns false when nothing is subscribed.
    pub fn deliver(&self, update: &ItemUpdate) -> bool {
        let active = self.state.lock().active.clone();
        match active {
            Some(subscription) => {
                subscription.listener().on_item_update(update);
                true
            }
            None => false,
        }
    }

    /// Tear down the active subscription as the feed would on a server-side
    /// drop. Blocks for as long as the listener's callback does.
    pub fn drop_subscription(&self) -> bool {
        let previous = self.state.lock().active.take();
        match previous {
            Some(subscription) => {
                subscription.listener().on_unsubscription();
                true
            }
            None => false,
        }
    }

    pub fn active(&self) -> Option<Subscription> {
        self.state.lock().active.clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.lock().subscribe_calls.len()
    }

    /// When each subscribe call arrived
    pub fn subscribe_times(&self) -> Vec<Instant> {
        self.state.lock().subscribe_calls.clone()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.state.lock().unsubscribe_calls
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }
}

impl StreamSession for MockSession {
    fn subscribe(&self, subscription: Subscription) -> Result<(), SubscriptionError> {
        {
            let mut state = self.state.lock();
            state.subscribe_calls.push(Instant::now());

            if state.disconnected {
                return Err(SubscriptionError::NotConnected);
            }
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(SubscriptionError::Rejected {
                    code: 21,
                    message: "Mock rejection".to_string(),
                });
            }
            if state.active.is_some() {
                return Err(SubscriptionError::AlreadySubscribed);
            }
            state.active = Some(subscription.clone());
        }

        subscription.listener().on_subscription();
        Ok(())
    }

    fn unsubscribe(&self) -> Result<(), SubscriptionError> {
        let previous = {
            let mut state = self.state.lock();
            state.unsubscribe_calls += 1;
            state.active.take()
        };

        match previous {
            Some(subscription) => {
                subscription.listener().on_unsubscription();
                Ok(())
            }
            None => Err(SubscriptionError::NotSubscribed),
        }
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        state.disconnected = true;
        state.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Instrument;
    use crate::feed::{SubscriptionDescriptor, SubscriptionListener};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counter {
        updates: AtomicUsize,
    }

    impl SubscriptionListener for Counter {
        fn on_item_update(&self, _update: &ItemUpdate) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn subscription(listener: Arc<Counter>) -> Subscription {
        Subscription::new(
            SubscriptionDescriptor::for_instruments(&[Instrument::new("X")]),
            listener,
            1,
        )
    }

    #[test]
    fn test_scripted_failures() {
        let session = MockSession::new();
        session.fail_next(2);
        let counter = Arc::new(Counter::default());

        assert!(session.subscribe(subscription(counter.clone())).is_err());
        assert!(session.subscribe(subscription(counter.clone())).is_err());
        assert!(session.subscribe(subscription(counter)).is_ok());
        assert_eq!(session.subscribe_count(), 3);
    }

    #[test]
    fn test_deliver_requires_subscription() {
        let session = MockSession::new();
        let counter = Arc::new(Counter::default());
        assert!(!session.deliver(&ItemUpdate::new("CHART:X:TICK")));

        session.subscribe(subscription(counter.clone())).unwrap();
        assert!(session.deliver(&ItemUpdate::new("CHART:X:TICK")));
        assert_eq!(counter.updates.load(Ordering::SeqCst), 1);

        session.disconnect();
        assert!(!session.deliver(&ItemUpdate::new("CHART:X:TICK")));
        assert!(session.is_disconnected());
    }
}
