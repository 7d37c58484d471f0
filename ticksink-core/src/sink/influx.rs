//! InfluxDB v2 sink
//!
//! Each point becomes one line-protocol record posted synchronously to
//! `/api/v2/write` with millisecond precision:
//!
//! ```text
//! market_data,epic=CS.D.EURUSD.CFD.IP bid=1.0950,offer=1.0952,spread=0.0002 1700000000000
//! ```

use super::TickSink;
use crate::core::{MarketDataPoint, SinkError};
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, PartialEq)]
pub struct InfluxConfig {
    /// Base URL, e.g. `http://localhost:8086`
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: Option<String>,
    pub measurement: String,
    pub tag_key: String,
    pub timeout: Duration,
}

pub struct InfluxSink {
    client: Client,
    endpoint: String,
    config: InfluxConfig,
    closed: AtomicBool,
}

impl InfluxSink {
    pub fn new(config: InfluxConfig) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let endpoint = format!("{}/api/v2/write", config.url.trim_end_matches('/'));
        info!(
            endpoint = %endpoint,
            org = %config.org,
            bucket = %config.bucket,
            measurement = %config.measurement,
            "InfluxDB sink ready"
        );

        Ok(Self {
            client,
            endpoint,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Line-protocol record for `point`
    pub fn encode(&self, point: &MarketDataPoint) -> String {
        line_protocol(point, &self.config.measurement, &self.config.tag_key)
    }
}

impl TickSink for InfluxSink {
    fn write(&self, point: &MarketDataPoint) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }

        let mut request = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(self.encode(point));
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Token {token}"));
        }

        let response = request.send().map_err(|e| SinkError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = response.text().unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(SinkError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    fn close(&self) -> Result<(), SinkError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!("InfluxDB sink closed");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "influx"
    }
}

/// Encode one point. Optional trade fields are only emitted when present.
pub fn line_protocol(point: &MarketDataPoint, measurement: &str, tag_key: &str) -> String {
    let mut line = String::with_capacity(128);
    escape_into(&mut line, measurement, &[',', ' ']);
    line.push(',');
    escape_into(&mut line, tag_key, &[',', '=', ' ']);
    line.push('=');
    escape_into(&mut line, point.instrument.as_str(), &[',', '=', ' ']);
    line.push(' ');

    let fields: [(&str, Option<Decimal>); 6] = [
        ("bid", Some(point.bid)),
        ("offer", Some(point.offer)),
        ("spread", Some(point.spread)),
        ("ltp", point.last_traded_price),
        ("ltv", point.last_traded_volume),
        ("ttv", point.total_traded_volume),
    ];
    let mut first = true;
    for (name, value) in fields {
        let Some(value) = value else { continue };
        if !first {
            line.push(',');
        }
        first = false;
        let _ = write!(line, "{name}={value}");
    }

    let _ = write!(line, " {}", point.timestamp_ms);
    line
}

fn escape_into(out: &mut String, raw: &str, special: &[char]) {
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
