//! Feed boundary: what the ingestion core consumes from the streaming session

pub mod descriptor;
pub mod listener;
pub mod replay;
pub mod session;
pub mod update;

pub use descriptor::{SubscriptionDescriptor, SubscriptionMode, TICK_FIELDS};
pub use listener::SubscriptionListener;
pub use replay::{ReplayRecord, ReplaySession};
pub use session::{StreamSession, Subscription};
pub use update::{FieldValue, ItemUpdate};
