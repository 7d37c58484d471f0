//! Subscription lifecycle: typestate machine, backoff, controller and the
//! shutdown latch every blocking wait listens to.

pub mod backoff;
pub mod controller;
pub mod fsm;
pub mod shutdown;

pub use backoff::{BackoffConfig, ResubscribeState};
pub use controller::SubscriptionController;
pub use fsm::{LifecyclePhase, LifecycleState};
pub use shutdown::ShutdownSignal;
