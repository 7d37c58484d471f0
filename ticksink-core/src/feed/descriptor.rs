//! Subscription descriptors
//!
//! A descriptor is rebuilt from the instrument list on every (re)subscribe;
//! it is never mutated in place.

use crate::core::Instrument;
use std::fmt;

/// Update time, ms since epoch
pub const FIELD_UTM: &str = "UTM";
/// Bid price
pub const FIELD_BID: &str = "BID";
/// Offer price
pub const FIELD_OFR: &str = "OFR";
/// Last traded price
pub const FIELD_LTP: &str = "LTP";
/// Last traded volume
pub const FIELD_LTV: &str = "LTV";
/// Total traded volume
pub const FIELD_TTV: &str = "TTV";

/// Fields requested for every tick item, in wire order
pub const TICK_FIELDS: [&str; 6] = [FIELD_UTM, FIELD_BID, FIELD_OFR, FIELD_LTP, FIELD_LTV, FIELD_TTV];

/// Feed delivery mode. Tick items are only ever subscribed `DISTINCT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Every update delivered individually, no merging
    Distinct,
}

impl SubscriptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distinct => "DISTINCT",
        }
    }
}

impl fmt::Display for SubscriptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to subscribe to: item ids, fields and mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDescriptor {
    mode: SubscriptionMode,
    items: Vec<String>,
    fields: Vec<&'static str>,
}

impl SubscriptionDescriptor {
    /// Tick descriptor for `instruments`, preserving their order
    pub fn for_instruments(instruments: &[Instrument]) -> Self {
        Self {
            mode: SubscriptionMode::Distinct,
            items: instruments.iter().map(Instrument::item_id).collect(),
            fields: TICK_FIELDS.to_vec(),
        }
    }

    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn fields(&self) -> &[&'static str] {
        &self.fields
    }

    pub fn contains_item(&self, item: &str) -> bool {
        self.items.iter().any(|i| i == item)
    }
}
