//! The streaming session capability
//!
//! Connection, authentication and the wire protocol live behind
//! [`StreamSession`]. The ingestion core only ever subscribes, unsubscribes
//! and disconnects.

use super::descriptor::SubscriptionDescriptor;
use super::listener::SubscriptionListener;
use crate::core::SubscriptionError;
use std::fmt;
use std::sync::Arc;

/// A descriptor paired with the listener that receives its callbacks
///
/// `generation` increases with every subscription the controller builds,
/// which lets listeners recognise callbacks from a superseded subscription.
#[derive(Clone)]
pub struct Subscription {
    descriptor: SubscriptionDescriptor,
    listener: Arc<dyn SubscriptionListener>,
    generation: u64,
}

impl Subscription {
    pub fn new(
        descriptor: SubscriptionDescriptor,
        listener: Arc<dyn SubscriptionListener>,
        generation: u64,
    ) -> Self {
        Self {
            descriptor,
            listener,
            generation,
        }
    }

    pub fn descriptor(&self) -> &SubscriptionDescriptor {
        &self.descriptor
    }

    pub fn listener(&self) -> &Arc<dyn SubscriptionListener> {
        &self.listener
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("generation", &self.generation)
            .field("mode", &self.descriptor.mode())
            .field("items", &self.descriptor.items().len())
            .finish()
    }
}

/// An established streaming session
///
/// Implementations must not hold internal locks while invoking listener
/// callbacks: the controller subscribes again from inside
/// `on_unsubscription`.
pub trait StreamSession: Send + Sync {
    /// Register `subscription`; its listener starts receiving callbacks
    fn subscribe(&self, subscription: Subscription) -> Result<(), SubscriptionError>;

    /// Tear down the active subscription
    fn unsubscribe(&self) -> Result<(), SubscriptionError>;

    /// Close the session. Idempotent.
    fn disconnect(&self);
}
