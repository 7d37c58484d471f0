// Dispatch path benchmarks
//
// Everything here runs on the feed's callback thread for every update:
// - Item resolution against the registry
// - Field parsing (text and numeric values)
// - Full dispatch into a no-op sink
// - Line protocol encoding for the Influx sink

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use ticksink_core::core::SinkError;
use ticksink_core::feed::ItemUpdate;
use ticksink_core::ingest::TickFields;
use ticksink_core::monitoring::MetricsRegistry;
use ticksink_core::sink::influx::line_protocol;
use ticksink_core::{Instrument, InstrumentRegistry, MarketDataPoint, TickSink, UpdateDispatcher};

struct NullSink;

impl TickSink for NullSink {
    fn write(&self, point: &MarketDataPoint) -> Result<(), SinkError> {
        black_box(point);
        Ok(())
    }

    fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

fn registry(size: usize) -> InstrumentRegistry {
    let mut instruments: Vec<Instrument> = (0..size)
        .map(|i| Instrument::new(format!("CS.D.SYM{i:04}.CFD.IP")))
        .collect();
    instruments.push(Instrument::new("CS.D.EURUSD.CFD.IP"));
    InstrumentRegistry::build(instruments).expect("non-empty")
}

fn text_quote() -> ItemUpdate {
    ItemUpdate::new("CHART:CS.D.EURUSD.CFD.IP:TICK")
        .with_field("UTM", "1700000000000")
        .with_field("BID", "1.0950")
        .with_field("OFR", "1.0952")
        .with_field("LTP", "1.0951")
        .with_null("LTV")
        .with_field("TTV", "1250")
}

fn numeric_quote() -> ItemUpdate {
    ItemUpdate::new("CHART:CS.D.EURUSD.CFD.IP:TICK")
        .with_field("UTM", 1_700_000_000_000.0)
        .with_field("BID", 1.0950)
        .with_field("OFR", 1.0952)
}

// ============================================================================
// RESOLUTION BENCHMARKS
// ============================================================================

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    group.measurement_time(Duration::from_secs(2));

    for size in [10usize, 100, 1000] {
        let registry = registry(size);
        group.bench_with_input(BenchmarkId::new("hit", size), &registry, |b, registry| {
            b.iter(|| registry.resolve(black_box("CHART:CS.D.EURUSD.CFD.IP:TICK")))
        });
        group.bench_with_input(BenchmarkId::new("miss", size), &registry, |b, registry| {
            b.iter(|| registry.resolve(black_box("CHART:CS.D.USDJPY.CFD.IP:TICK")))
        });
    }

    group.finish();
}

// ============================================================================
// FIELD PARSING BENCHMARKS
// ============================================================================

fn bench_field_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_parsing");
    group.measurement_time(Duration::from_secs(2));

    let text = text_quote();
    group.bench_function("text_fields", |b| b.iter(|| TickFields::parse(black_box(&text))));

    let numeric = numeric_quote();
    group.bench_function("numeric_fields", |b| b.iter(|| TickFields::parse(black_box(&numeric))));

    group.finish();
}

// ============================================================================
// DISPATCH BENCHMARKS
// ============================================================================

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(3));

    let metrics = MetricsRegistry::new().expect("metrics");
    let dispatcher = UpdateDispatcher::new(Arc::new(registry(100)), Arc::new(NullSink), metrics);

    let quote = text_quote();
    group.bench_function("complete_quote", |b| b.iter(|| dispatcher.on_update(black_box(&quote))));

    let incomplete = ItemUpdate::new("CHART:CS.D.EURUSD.CFD.IP:TICK")
        .with_field("UTM", "1700000000000")
        .with_field("LTP", "1.0951");
    group.bench_function("incomplete_quote", |b| {
        b.iter(|| dispatcher.on_update(black_box(&incomplete)))
    });

    group.finish();
}

// ============================================================================
// ENCODING BENCHMARKS
// ============================================================================

fn bench_line_protocol(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_protocol");
    group.measurement_time(Duration::from_secs(2));

    let bare = MarketDataPoint::new(
        Instrument::new("CS.D.EURUSD.CFD.IP"),
        1_700_000_000_000,
        dec!(1.0950),
        dec!(1.0952),
    )
    .expect("spread in range");
    let traded = bare
        .clone()
        .with_trade(Some(dec!(1.0951)), Some(dec!(3)), Some(dec!(1250)));

    group.bench_function("quote_only", |b| {
        b.iter(|| line_protocol(black_box(&bare), "market_data", "epic"))
    });
    group.bench_function("with_trade", |b| {
        b.iter(|| line_protocol(black_box(&traded), "market_data", "epic"))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_resolve,
    bench_field_parsing,
    bench_dispatch,
    bench_line_protocol
);
criterion_main!(benches);
