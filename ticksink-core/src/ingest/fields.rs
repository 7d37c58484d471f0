//! Typed view of a tick update
//!
//! The raw field map is parsed once, here. Missing, null and blank values
//! all become `None`; a value that is present but not a number is an error
//! for the whole update.

use crate::core::DispatchError;
use crate::feed::descriptor::{FIELD_BID, FIELD_LTP, FIELD_LTV, FIELD_OFR, FIELD_TTV, FIELD_UTM};
use crate::feed::{FieldValue, ItemUpdate};
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickFields {
    pub timestamp_ms: Option<u64>,
    pub bid: Option<Decimal>,
    pub offer: Option<Decimal>,
    pub last_traded_price: Option<Decimal>,
    pub last_traded_volume: Option<Decimal>,
    pub total_traded_volume: Option<Decimal>,
}

impl TickFields {
    pub fn parse(update: &ItemUpdate) -> Result<Self, DispatchError> {
        Ok(Self {
            timestamp_ms: update.value(FIELD_UTM).map(|v| parse_timestamp(FIELD_UTM, v)).transpose()?,
            bid: decimal(update, FIELD_BID)?,
            offer: decimal(update, FIELD_OFR)?,
            last_traded_price: decimal(update, FIELD_LTP)?,
            last_traded_volume: decimal(update, FIELD_LTV)?,
            total_traded_volume: decimal(update, FIELD_TTV)?,
        })
    }

    /// Both sides of the quote are present
    pub fn has_quote(&self) -> bool {
        self.bid.is_some() && self.offer.is_some()
    }
}

fn decimal(update: &ItemUpdate, field: &'static str) -> Result<Option<Decimal>, DispatchError> {
    update.value(field).map(|v| parse_decimal(field, v)).transpose()
}

fn malformed(field: &'static str, value: &FieldValue) -> DispatchError {
    DispatchError::MalformedField {
        field,
        value: value.to_string(),
    }
}

fn parse_decimal(field: &'static str, value: &FieldValue) -> Result<Decimal, DispatchError> {
    match value {
        FieldValue::Text(text) => {
            let text = text.trim();
            Decimal::from_str(text)
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|_| malformed(field, value))
        }
        // Display gives the shortest round-trip form, so 1.6 stays 1.6
        FieldValue::Number(n) if n.is_finite() => {
            Decimal::from_str(&n.to_string()).map_err(|_| malformed(field, value))
        }
        FieldValue::Number(_) => Err(malformed(field, value)),
    }
}

fn parse_timestamp(field: &'static str, value: &FieldValue) -> Result<u64, DispatchError> {
    match value {
        FieldValue::Text(text) => text.trim().parse::<u64>().map_err(|_| malformed(field, value)),
        FieldValue::Number(n) if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u64::MAX as f64 => {
            Ok(*n as u64)
        }
        FieldValue::Number(_) => Err(malformed(field, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_full_update() {
        let update = ItemUpdate::new("CHART:X:TICK")
            .with_field("UTM", "1700000000000")
            .with_field("BID", "1.0950")
            .with_field("OFR", "1.0952")
            .with_field("LTP", "1.0951")
            .with_field("LTV", "3")
            .with_field("TTV", "1200");

        let fields = TickFields::parse(&update).unwrap();
        assert_eq!(fields.timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(fields.bid, Some(dec!(1.0950)));
        assert_eq!(fields.offer, Some(dec!(1.0952)));
        assert_eq!(fields.last_traded_price, Some(dec!(1.0951)));
        assert_eq!(fields.last_traded_volume, Some(dec!(3)));
        assert_eq!(fields.total_traded_volume, Some(dec!(1200)));
        assert!(fields.has_quote());
    }

    #[test]
    fn test_absent_is_none_not_zero() {
        let update = ItemUpdate::new("CHART:X:TICK")
            .with_field("BID", "1.5")
            .with_null("OFR")
            .with_field("LTV", "");

        let fields = TickFields::parse(&update).unwrap();
        assert_eq!(fields.bid, Some(dec!(1.5)));
        assert_eq!(fields.offer, None);
        assert_eq!(fields.last_traded_volume, None);
        assert_eq!(fields.timestamp_ms, None);
        assert!(!fields.has_quote());
    }

    #[test]
    fn test_numeric_values() {
        let update = ItemUpdate::new("CHART:X:TICK")
            .with_field("UTM", 1_700_000_000_000.0)
            .with_field("BID", 1.5)
            .with_field("OFR", 1.6);

        let fields = TickFields::parse(&update).unwrap();
        assert_eq!(fields.timestamp_ms, Some(1_700_000_000_000));
        assert_eq!(fields.offer.unwrap() - fields.bid.unwrap(), dec!(0.1));
    }

    #[test]
    fn test_scientific_text() {
        let update = ItemUpdate::new("CHART:X:TICK").with_field("TTV", "1.2e3");
        assert_eq!(TickFields::parse(&update).unwrap().total_traded_volume, Some(dec!(1200)));
    }

    #[test]
    fn test_malformed_values() {
        let update = ItemUpdate::new("CHART:X:TICK").with_field("BID", "abc");
        assert!(matches!(
            TickFields::parse(&update),
            Err(DispatchError::MalformedField { field: "BID", .. })
        ));

        let update = ItemUpdate::new("CHART:X:TICK").with_field("UTM", "17000.5");
        assert!(matches!(
            TickFields::parse(&update),
            Err(DispatchError::MalformedField { field: "UTM", .. })
        ));

        let update = ItemUpdate::new("CHART:X:TICK").with_field("OFR", f64::NAN);
        assert!(matches!(
            TickFields::parse(&update),
            Err(DispatchError::MalformedField { field: "OFR", .. })
        ));
    }
}
