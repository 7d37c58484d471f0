//! Subscription callbacks
//!
//! Sessions invoke these serially from their delivery thread. Everything
//! except item updates defaults to a diagnostic log line, so listeners only
//! override what they act on.

use super::update::ItemUpdate;
use tracing::{debug, info, warn};

pub trait SubscriptionListener: Send + Sync {
    /// A new update for one item
    fn on_item_update(&self, update: &ItemUpdate);

    /// The feed confirmed the subscription
    fn on_subscription(&self) {
        info!("Subscription active");
    }

    /// The subscription ended, expectedly or not
    fn on_unsubscription(&self) {
        info!("Subscription ended");
    }

    fn on_subscription_error(&self, code: i32, message: &str) {
        warn!(code, message, "Subscription error");
    }

    fn on_unsubscription_error(&self, code: i32, message: &str) {
        warn!(code, message, "Unsubscription error");
    }

    fn on_clear_snapshot(&self, item: &str) {
        debug!(item, "Clear snapshot");
    }

    fn on_end_of_snapshot(&self, item: &str) {
        debug!(item, "End of snapshot");
    }

    fn on_item_lost_updates(&self, item: &str, lost: u32) {
        warn!(item, lost, "Feed reported lost updates");
    }

    fn on_second_level_lost_updates(&self, item: &str, lost: u32) {
        warn!(item, lost, "Feed reported lost second-level updates");
    }

    fn on_second_level_subscription_error(&self, item: &str, code: i32, message: &str) {
        warn!(item, code, message, "Second-level subscription error");
    }

    fn on_listen_start(&self) {
        debug!("Listener attached");
    }

    fn on_listen_end(&self) {
        debug!("Listener detached");
    }
}
