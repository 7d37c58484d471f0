//! Update dispatcher
//!
//! Turns raw updates into points and hands them to the sink. Every failure
//! is contained here: nothing an individual update does can disturb the
//! subscription or the callback thread.
//!
//! Order of checks for each update:
//! 1. resolve the item id (unknown → warning, dropped)
//! 2. parse the typed fields (malformed → error, dropped)
//! 3. bid and offer both present (otherwise dropped silently)
//! 4. timestamp present (otherwise error, dropped)
//! 5. write to the sink (failure → error, dropped)

use super::fields::TickFields;
use super::registry::InstrumentRegistry;
use crate::core::{DispatchError, Instrument, MarketDataPoint};
use crate::feed::ItemUpdate;
use crate::monitoring::MetricsRegistry;
use crate::sink::TickSink;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to one update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Written,
    UnknownItem,
    Incomplete,
    Malformed,
    SinkFailed,
}

impl DispatchOutcome {
    /// Label used for the dropped-updates counter
    fn drop_reason(&self) -> Option<&'static str> {
        match self {
            Self::Written => None,
            Self::UnknownItem => Some("unknown_item"),
            Self::Incomplete => Some("incomplete"),
            Self::Malformed => Some("malformed"),
            Self::SinkFailed => Some("sink_error"),
        }
    }
}

pub struct UpdateDispatcher {
    registry: Arc<InstrumentRegistry>,
    sink: Arc<dyn TickSink>,
    metrics: MetricsRegistry,
}

impl UpdateDispatcher {
    pub fn new(registry: Arc<InstrumentRegistry>, sink: Arc<dyn TickSink>, metrics: MetricsRegistry) -> Self {
        Self {
            registry,
            sink,
            metrics,
        }
    }

    pub fn registry(&self) -> &Arc<InstrumentRegistry> {
        &self.registry
    }

    /// Process one update. Never fails; the outcome is informational.
    pub fn on_update(&self, update: &ItemUpdate) -> DispatchOutcome {
        let ingest = self.metrics.ingest();
        ingest.updates_received.inc();

        let outcome = self.dispatch(update);
        match outcome.drop_reason() {
            Some(reason) => ingest.updates_dropped.with_label_values(&[reason]).inc(),
            None => ingest.points_written.inc(),
        }
        outcome
    }

    fn dispatch(&self, update: &ItemUpdate) -> DispatchOutcome {
        let Some(instrument) = self.registry.resolve(&update.item) else {
            warn!(item = %update.item, "Update for unknown item");
            return DispatchOutcome::UnknownItem;
        };

        let point = match build_point(instrument, update) {
            Ok(Some(point)) => point,
            Ok(None) => {
                debug!(instrument = %instrument, "Update without bid/offer skipped");
                return DispatchOutcome::Incomplete;
            }
            Err(e) => {
                error!(instrument = %instrument, item = %update.item, error = %e, "Malformed update");
                return DispatchOutcome::Malformed;
            }
        };

        if let Err(e) = self.sink.write(&point) {
            let err = DispatchError::from(e);
            error!(
                instrument = %instrument,
                sink = self.sink.name(),
                timestamp_ms = point.timestamp_ms,
                error = %err,
                "Failed to write point"
            );
            return DispatchOutcome::SinkFailed;
        }

        debug!(
            instrument = %instrument,
            timestamp_ms = point.timestamp_ms,
            bid = %point.bid,
            offer = %point.offer,
            spread = %point.spread,
            "Point written"
        );
        DispatchOutcome::Written
    }
}

/// `Ok(None)` when the quote is incomplete
fn build_point(instrument: &Instrument, update: &ItemUpdate) -> Result<Option<MarketDataPoint>, DispatchError> {
    let fields = TickFields::parse(update)?;

    let (Some(bid), Some(offer)) = (fields.bid, fields.offer) else {
        return Ok(None);
    };
    let timestamp_ms = fields.timestamp_ms.ok_or(DispatchError::MissingTimestamp)?;

    Ok(Some(
        MarketDataPoint::new(instrument.clone(), timestamp_ms, bid, offer)?.with_trade(
            fields.last_traded_price,
            fields.last_traded_volume,
            fields.total_traded_volume,
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use rust_decimal_macros::dec;

    fn setup() -> (UpdateDispatcher, Arc<RecordingSink>, MetricsRegistry) {
        let registry = Arc::new(InstrumentRegistry::build(vec![Instrument::new("EURUSD")]).unwrap());
        let sink = Arc::new(RecordingSink::new());
        let metrics = MetricsRegistry::new().unwrap();
        let dispatcher = UpdateDispatcher::new(registry, sink.clone(), metrics.clone());
        (dispatcher, sink, metrics)
    }

    fn quote(bid: &str, offer: &str) -> ItemUpdate {
        ItemUpdate::new("CHART:EURUSD:TICK")
            .with_field("UTM", "1700000000000")
            .with_field("BID", bid)
            .with_field("OFR", offer)
    }

    #[test]
    fn test_complete_update_written() {
        let (dispatcher, sink, metrics) = setup();

        assert_eq!(dispatcher.on_update(&quote("1.0950", "1.0952")), DispatchOutcome::Written);

        let points = sink.points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].instrument, Instrument::new("EURUSD"));
        assert_eq!(points[0].spread, dec!(0.0002));
        assert_eq!(points[0].last_traded_price, None);
        assert_eq!(metrics.ingest().points_written.get(), 1);
    }

    #[test]
    fn test_missing_offer_skipped() {
        let (dispatcher, sink, metrics) = setup();
        let update = ItemUpdate::new("CHART:EURUSD:TICK")
            .with_field("UTM", "1700000000000")
            .with_field("BID", "1.0950");

        assert_eq!(dispatcher.on_update(&update), DispatchOutcome::Incomplete);
        assert!(sink.points().is_empty());
        assert_eq!(metrics.ingest().dropped("incomplete"), 1);
    }

    #[test]
    fn test_unknown_item_isolated() {
        let (dispatcher, sink, _) = setup();
        let unknown = ItemUpdate::new("CHART:UNKNOWN:TICK")
            .with_field("UTM", "1")
            .with_field("BID", "1")
            .with_field("OFR", "2");

        assert_eq!(dispatcher.on_update(&unknown), DispatchOutcome::UnknownItem);
        assert_eq!(dispatcher.on_update(&quote("1.0950", "1.0952")), DispatchOutcome::Written);
        assert_eq!(sink.points().len(), 1);
    }

    #[test]
    fn test_missing_timestamp_not_written() {
        let (dispatcher, sink, metrics) = setup();
        let update = ItemUpdate::new("CHART:EURUSD:TICK")
            .with_field("BID", "1")
            .with_field("OFR", "2");

        assert_eq!(dispatcher.on_update(&update), DispatchOutcome::Malformed);
        assert!(sink.points().is_empty());
        assert_eq!(metrics.ingest().dropped("malformed"), 1);
    }

    #[test]
    fn test_spread_overflow_dropped_as_malformed() {
        let (dispatcher, sink, metrics) = setup();
        let update = quote("-50000000000000000000000000000", "50000000000000000000000000000");

        assert_eq!(dispatcher.on_update(&update), DispatchOutcome::Malformed);
        assert!(sink.points().is_empty());
        assert_eq!(metrics.ingest().dropped("malformed"), 1);

        assert_eq!(dispatcher.on_update(&quote("1.0950", "1.0952")), DispatchOutcome::Written);
    }

    #[test]
    fn test_sink_failure_contained() {
        let (dispatcher, sink, metrics) = setup();
        sink.fail_next_writes(1);

        assert_eq!(dispatcher.on_update(&quote("1", "2")), DispatchOutcome::SinkFailed);
        assert_eq!(dispatcher.on_update(&quote("1", "2")), DispatchOutcome::Written);
        assert_eq!(metrics.ingest().dropped("sink_error"), 1);
        assert_eq!(sink.points().len(), 1);
    }

    #[test]
    fn test_optional_trade_fields_carried() {
        let (dispatcher, sink, _) = setup();
        let update = quote("1.0950", "1.0952").with_field("LTP", "1.0951").with_null("LTV");

        dispatcher.on_update(&update);
        let point = &sink.points()[0];
        assert_eq!(point.last_traded_price, Some(dec!(1.0951)));
        assert_eq!(point.last_traded_volume, None);
        assert_eq!(point.total_traded_volume, None);
    }
}
