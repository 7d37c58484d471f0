//! Subscription lifecycle controller
//!
//! Owns the one live subscription and keeps it alive. When the feed ends a
//! subscription unexpectedly the controller resubscribes with bounded
//! exponential backoff, building a fresh descriptor and a fresh
//! dispatcher-backed listener for every attempt.
//!
//! The reconnection protocol runs on the thread that delivered
//! `on_unsubscription` (the session's callback thread) and blocks it while
//! waiting. Every wait goes through the [`ShutdownSignal`], so `shutdown()`
//! from another thread interrupts a pending backoff immediately.
//!
//! Locking: the state mutex is never held across a wait or a session call.
//! Lock order is state, then session.
//!
//! Each subscription carries a generation number. Only the newest
//! generation is live; its listener alone feeds the dispatcher, and
//! callbacks from any older listener are dropped.
//!
//! A session may end a subscription before its `subscribe` call has
//! returned. Such a loss is recorded as pending and acted on as soon as the
//! subscription is recorded: by `attach()` (which then runs the protocol on
//! the caller's thread) or by the attempt that made it.

use super::backoff::{BackoffConfig, ResubscribeState};
use super::fsm::{AttemptResult, LifecyclePhase, LifecycleState};
use super::shutdown::ShutdownSignal;
use crate::core::LifecycleError;
use crate::feed::{ItemUpdate, StreamSession, Subscription, SubscriptionListener};
use crate::ingest::UpdateDispatcher;
use crate::monitoring::MetricsRegistry;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// No subscription is live
const NO_GENERATION: u64 = 0;

pub struct SubscriptionController {
    dispatcher: Arc<UpdateDispatcher>,
    metrics: MetricsRegistry,
    shutdown: ShutdownSignal,
    state: Mutex<LifecycleState>,
    session: Mutex<Option<Arc<dyn StreamSession>>>,
    active: Mutex<Option<Subscription>>,
    live_generation: Arc<AtomicU64>,
    next_generation: AtomicU64,
    /// Live subscription lost while being established. Guarded by `state`.
    pending_loss: AtomicBool,
    self_ref: Weak<SubscriptionController>,
}

impl SubscriptionController {
    pub fn new(
        dispatcher: Arc<UpdateDispatcher>,
        config: BackoffConfig,
        shutdown: ShutdownSignal,
        metrics: MetricsRegistry,
    ) -> Arc<Self> {
        metrics.lifecycle().state.set(LifecyclePhase::Init.code());

        Arc::new_cyclic(|self_ref| Self {
            dispatcher,
            metrics,
            shutdown,
            state: Mutex::new(LifecycleState::new(config)),
            session: Mutex::new(None),
            active: Mutex::new(None),
            live_generation: Arc::new(AtomicU64::new(NO_GENERATION)),
            next_generation: AtomicU64::new(NO_GENERATION),
            pending_loss: AtomicBool::new(false),
            self_ref: self_ref.clone(),
        })
    }

    /// Build the next subscription and make it the live generation
    pub fn new_subscription(&self) -> Subscription {
        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.live_generation.store(generation, Ordering::Release);

        let listener = Arc::new(FeedListener {
            generation,
            live_generation: Arc::clone(&self.live_generation),
            dispatcher: Arc::clone(&self.dispatcher),
            controller: self.self_ref.clone(),
            metrics: self.metrics.clone(),
        });

        Subscription::new(self.dispatcher.registry().descriptor(), listener, generation)
    }

    /// Subscribe for the first time and attach
    pub fn start(&self, session: Arc<dyn StreamSession>) -> Result<(), LifecycleError> {
        {
            let state = self.state.lock();
            if !matches!(*state, LifecycleState::Init(_)) {
                return Err(LifecycleError::AlreadyAttached(state.phase().as_str()));
            }
            self.pending_loss.store(false, Ordering::Release);
        }
        if self.shutdown.is_triggered() {
            return Err(LifecycleError::ShuttingDown);
        }

        let subscription = self.new_subscription();
        info!(
            generation = subscription.generation(),
            items = subscription.descriptor().items().len(),
            mode = %subscription.descriptor().mode(),
            "Subscribing"
        );

        if let Err(e) = session.subscribe(subscription.clone()) {
            let _state = self.state.lock();
            self.live_generation.store(NO_GENERATION, Ordering::Release);
            self.pending_loss.store(false, Ordering::Release);
            return Err(e.into());
        }
        self.attach(session, subscription)
    }

    /// Record the session and the subscription it accepted. `Init → Subscribed`.
    ///
    /// If the subscription was already lost while `subscribe` was running,
    /// resubscribes right away and blocks like `on_unsubscribed`.
    pub fn attach(&self, session: Arc<dyn StreamSession>, subscription: Subscription) -> Result<(), LifecycleError> {
        {
            let mut state = self.state.lock();
            let LifecycleState::Init(init) = state.clone() else {
                return Err(LifecycleError::AlreadyAttached(state.phase().as_str()));
            };
            if self.shutdown.is_triggered() {
                return Err(LifecycleError::ShuttingDown);
            }

            let generation = subscription.generation();
            *self.session.lock() = Some(session);
            let subscribed = init.attach();
            info!(generation, "Subscription attached");

            if !self.pending_loss.swap(false, Ordering::AcqRel) {
                *self.active.lock() = Some(subscription);
                self.live_generation.store(generation, Ordering::Release);
                self.set_state(&mut state, subscribed.into());
                return Ok(());
            }

            warn!(generation, "Subscription lost before it was attached, resubscribing");
            self.live_generation.store(NO_GENERATION, Ordering::Release);
            self.set_state(&mut state, subscribed.unsubscribed().into());
        }

        self.run_reconnection();
        Ok(())
    }

    /// The feed confirmed a subscription
    pub fn on_subscribed(&self, generation: u64) {
        info!(generation, state = %self.phase(), "Subscription confirmed by feed");
    }

    /// The live subscription ended. Resubscribes unless shutting down.
    ///
    /// Blocks the calling thread until resubscribed, exhausted or stopped.
    pub fn on_unsubscribed(&self) {
        if self.shutdown.is_triggered() {
            info!("Subscription ended during shutdown, not resubscribing");
            return;
        }

        {
            let mut state = self.state.lock();
            match state.clone() {
                LifecycleState::Subscribed(subscribed) => {
                    let reconnecting = subscribed.unsubscribed();
                    warn!(
                        losses = reconnecting.data().unsubscribe_count,
                        "Subscription lost, resubscribing"
                    );
                    self.set_state(&mut state, reconnecting.into());
                }
                LifecycleState::Init(_) | LifecycleState::Reconnecting(_)
                    if self.live_generation.load(Ordering::Acquire) != NO_GENERATION =>
                {
                    // Lost before `subscribe` returned; honoured once recorded
                    info!(state = %state.phase(), "Subscription lost while being established");
                    self.pending_loss.store(true, Ordering::Release);
                    return;
                }
                LifecycleState::Reconnecting(_) => {
                    debug!("Resubscription already in progress");
                    return;
                }
                other => {
                    debug!(state = %other.phase(), "Unsubscription ignored");
                    return;
                }
            }
        }

        self.live_generation.store(NO_GENERATION, Ordering::Release);
        self.active.lock().take();
        self.run_reconnection();
    }

    /// Leave `Exhausted` with a fresh budget and resubscribe. Blocks like
    /// `on_unsubscribed`.
    pub fn reset(&self) -> Result<(), LifecycleError> {
        if self.shutdown.is_triggered() {
            return Err(LifecycleError::ShuttingDown);
        }

        {
            let mut state = self.state.lock();
            let LifecycleState::Exhausted(exhausted) = state.clone() else {
                return Err(LifecycleError::NotExhausted(state.phase().as_str()));
            };
            info!("Manual reset, resuming resubscription");
            self.set_state(&mut state, exhausted.manual_retry().into());
        }

        self.run_reconnection();
        Ok(())
    }

    /// Stop resubscribing, interrupt any backoff wait, unsubscribe if
    /// subscribed. `→ Stopped`. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.trigger("subscription controller shutdown");

        let previous = {
            let mut state = self.state.lock();
            let previous = state.phase();
            if previous == LifecyclePhase::Stopped {
                return;
            }
            let stopped = state.clone().stop();
            self.set_state(&mut state, stopped.into());
            previous
        };

        if previous == LifecyclePhase::Subscribed {
            let session = self.session.lock().clone();
            if let Some(session) = session {
                // The listener is still live, so its final callback is not stale
                match session.unsubscribe() {
                    Ok(()) => info!("Unsubscribed"),
                    Err(e) => warn!(error = %e, "Unsubscribe during shutdown failed"),
                }
            }
        }

        self.live_generation.store(NO_GENERATION, Ordering::Release);
        self.active.lock().take();

        info!(previous = %previous, "Subscription controller stopped");
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.state.lock().phase()
    }

    pub fn state(&self) -> LifecycleState {
        self.state.lock().clone()
    }

    pub fn resubscribe_state(&self) -> ResubscribeState {
        self.state.lock().data().resubscribe
    }

    /// Generation of the subscription currently accepted by the session
    pub fn active_generation(&self) -> Option<u64> {
        self.active.lock().as_ref().map(Subscription::generation)
    }

    fn set_state(&self, slot: &mut LifecycleState, next: LifecycleState) {
        self.metrics.lifecycle().state.set(next.phase().code());
        *slot = next;
    }

    fn run_reconnection(&self) {
        loop {
            let (attempt, max_attempts, delay) = {
                let mut state = self.state.lock();
                let LifecycleState::Reconnecting(reconnecting) = state.clone() else {
                    return;
                };
                match reconnecting.begin_attempt() {
                    AttemptResult::Ready(ready) => {
                        self.pending_loss.store(false, Ordering::Release);
                        let attempt = ready.attempt_count() + 1;
                        let max_attempts = ready.data().resubscribe.config().max_attempts;
                        let delay = ready.delay();
                        self.set_state(&mut state, ready.into());
                        (attempt, max_attempts, delay)
                    }
                    AttemptResult::Exhausted(exhausted) => {
                        error!(
                            severity = "fatal",
                            attempts = exhausted.data().resubscribe.attempt_count(),
                            "Resubscription attempts exhausted, manual intervention required"
                        );
                        self.metrics.lifecycle().exhaustions.inc();
                        self.set_state(&mut state, exhausted.into());
                        return;
                    }
                }
            };

            info!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Waiting before resubscribe"
            );
            if self.shutdown.wait_timeout(delay) {
                info!("Shutdown during backoff, resubscription abandoned");
                return;
            }

            let session = self.session.lock().clone();
            let Some(session) = session else {
                error!("No session attached, cannot resubscribe");
                return;
            };

            let subscription = self.new_subscription();
            let generation = subscription.generation();
            self.metrics.lifecycle().subscribe_attempts.inc();
            let result = session.subscribe(subscription.clone());

            let mut state = self.state.lock();
            let LifecycleState::Reconnecting(reconnecting) = state.clone() else {
                // Stopped while the attempt was in flight
                drop(state);
                if result.is_ok() {
                    if let Err(e) = session.unsubscribe() {
                        warn!(error = %e, "Failed to withdraw subscription after shutdown");
                    }
                }
                self.live_generation.store(NO_GENERATION, Ordering::Release);
                return;
            };

            match result {
                Ok(()) => {
                    let subscribed = reconnecting.attempt_succeeded();
                    info!(attempt, generation, "Resubscribed");

                    if self.pending_loss.swap(false, Ordering::AcqRel) {
                        warn!(generation, "Subscription lost while being established, resubscribing");
                        self.live_generation.store(NO_GENERATION, Ordering::Release);
                        self.set_state(&mut state, subscribed.unsubscribed().into());
                        continue;
                    }

                    *self.active.lock() = Some(subscription);
                    self.set_state(&mut state, subscribed.into());
                    return;
                }
                Err(e) => {
                    self.pending_loss.store(false, Ordering::Release);
                    self.metrics.lifecycle().subscribe_failures.inc();
                    let reconnecting = reconnecting.attempt_failed();
                    warn!(
                        attempt,
                        max_attempts,
                        error = %e,
                        next_delay_ms = reconnecting.data().resubscribe.current_delay().as_millis() as u64,
                        "Resubscribe attempt failed"
                    );
                    self.set_state(&mut state, reconnecting.into());
                }
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionController")
            .field("phase", &self.phase())
            .field("live_generation", &self.live_generation.load(Ordering::Relaxed))
            .finish()
    }
}

/// Listener attached to one subscription generation
struct FeedListener {
    generation: u64,
    live_generation: Arc<AtomicU64>,
    dispatcher: Arc<UpdateDispatcher>,
    controller: Weak<SubscriptionController>,
    metrics: MetricsRegistry,
}

impl FeedListener {
    #[inline]
    fn is_live(&self) -> bool {
        self.live_generation.load(Ordering::Acquire) == self.generation
    }

    fn stale(&self, callback: &'static str) {
        self.metrics.lifecycle().stale_callbacks.inc();
        debug!(generation = self.generation, callback, "Callback from superseded subscription ignored");
    }
}

impl SubscriptionListener for FeedListener {
    fn on_item_update(&self, update: &ItemUpdate) {
        if !self.is_live() {
            self.stale("item_update");
            return;
        }
        self.dispatcher.on_update(update);
    }

    fn on_subscription(&self) {
        if let Some(controller) = self.controller.upgrade() {
            controller.on_subscribed(self.generation);
        }
    }

    fn on_unsubscription(&self) {
        if !self.is_live() {
            self.stale("unsubscription");
            return;
        }
        if let Some(controller) = self.controller.upgrade() {
            controller.on_unsubscribed();
        }
    }

    fn on_subscription_error(&self, code: i32, message: &str) {
        warn!(generation = self.generation, code, message, "Subscription error");
    }

    fn on_unsubscription_error(&self, code: i32, message: &str) {
        warn!(generation = self.generation, code, message, "Unsubscription error");
    }
}
