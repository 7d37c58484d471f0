//! Instrument registry
//!
//! Maps raw feed item ids back to instruments. Built once at startup and
//! never mutated, so it is shared freely between the dispatcher, the
//! controller and any delivery thread.

use crate::core::{ConfigurationError, Instrument};
use crate::feed::SubscriptionDescriptor;
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct InstrumentRegistry {
    /// Subscription order
    instruments: Vec<Instrument>,
    by_item: HashMap<String, Instrument>,
}

impl InstrumentRegistry {
    /// Build the mapping. Duplicate instruments are collapsed to one entry.
    pub fn build(instruments: impl IntoIterator<Item = Instrument>) -> Result<Self, ConfigurationError> {
        let mut ordered = Vec::new();
        let mut by_item = HashMap::new();

        for instrument in instruments {
            let item = instrument.item_id();
            if by_item.contains_key(&item) {
                warn!(instrument = %instrument, "Duplicate instrument ignored");
                continue;
            }
            by_item.insert(item, instrument.clone());
            ordered.push(instrument);
        }

        if ordered.is_empty() {
            return Err(ConfigurationError::EmptyInstrumentList);
        }

        Ok(Self {
            instruments: ordered,
            by_item,
        })
    }

    /// Instrument for a raw item id, `None` if it was never subscribed
    #[inline]
    pub fn resolve(&self, item: &str) -> Option<&Instrument> {
        self.by_item.get(item)
    }

    pub fn instruments(&self) -> &[Instrument] {
        &self.instruments
    }

    /// Fresh tick descriptor covering every registered instrument
    pub fn descriptor(&self) -> SubscriptionDescriptor {
        SubscriptionDescriptor::for_instruments(&self.instruments)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// Always false for a successfully built registry
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_and_unknown() {
        let registry = InstrumentRegistry::build(vec![Instrument::new("EURUSD")]).unwrap();

        assert_eq!(registry.resolve("CHART:EURUSD:TICK"), Some(&Instrument::new("EURUSD")));
        assert_eq!(registry.resolve("CHART:GBPUSD:TICK"), None);
        assert_eq!(registry.resolve("EURUSD"), None);
    }

    #[test]
    fn test_empty_list_fails() {
        assert!(matches!(
            InstrumentRegistry::build(Vec::new()),
            Err(ConfigurationError::EmptyInstrumentList)
        ));
    }

    #[test]
    fn test_duplicates_collapsed() {
        let registry = InstrumentRegistry::build(vec![
            Instrument::new("A"),
            Instrument::new("B"),
            Instrument::new("A"),
        ])
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.descriptor().items(), &["CHART:A:TICK".to_string(), "CHART:B:TICK".to_string()]);
    }
}
