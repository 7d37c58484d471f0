pub mod errors;
pub mod types;

pub use errors::{ConfigurationError, DispatchError, LifecycleError, SinkError, SubscriptionError};
pub use types::{Instrument, MarketDataPoint, ITEM_PREFIX, ITEM_SUFFIX};
