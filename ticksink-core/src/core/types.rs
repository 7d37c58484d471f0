//! Core domain types
//!
//! An [`Instrument`] is the logical identifier persisted as the series tag.
//! A [`MarketDataPoint`] is the only thing the sink ever sees.

use super::errors::DispatchError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every tick item id on the feed
pub const ITEM_PREFIX: &str = "CHART:";
/// Suffix of every tick item id on the feed
pub const ITEM_SUFFIX: &str = ":TICK";

/// Logical instrument identifier (e.g. `CS.D.EURUSD.CFD.IP`)
///
/// Opaque token, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instrument(String);

impl Instrument {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw feed item id carrying tick updates for this instrument
    pub fn item_id(&self) -> String {
        format!("{ITEM_PREFIX}{}{ITEM_SUFFIX}", self.0)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Instrument {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One persisted tick
///
/// Only built when both bid and offer are present. Optional trade fields
/// stay `None` when the feed did not send them; they are never defaulted
/// to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub instrument: Instrument,
    /// Feed-provided timestamp, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    pub bid: Decimal,
    pub offer: Decimal,
    /// `offer - bid`
    pub spread: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_traded_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_traded_volume: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_traded_volume: Option<Decimal>,
}

impl MarketDataPoint {
    /// Create a point; the spread is derived here and nowhere else
    ///
    /// Fails when `offer - bid` is outside the decimal range.
    pub fn new(instrument: Instrument, timestamp_ms: u64, bid: Decimal, offer: Decimal) -> Result<Self, DispatchError> {
        let spread = offer
            .checked_sub(bid)
            .ok_or(DispatchError::SpreadOverflow { bid, offer })?;

        Ok(Self {
            instrument,
            timestamp_ms,
            bid,
            offer,
            spread,
            last_traded_price: None,
            last_traded_volume: None,
            total_traded_volume: None,
        })
    }

    pub fn with_trade(
        mut self,
        last_traded_price: Option<Decimal>,
        last_traded_volume: Option<Decimal>,
        total_traded_volume: Option<Decimal>,
    ) -> Self {
        self.last_traded_price = last_traded_price;
        self.last_traded_volume = last_traded_volume;
        self.total_traded_volume = total_traded_volume;
        self
    }
}
