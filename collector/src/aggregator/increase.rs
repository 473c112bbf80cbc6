use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

/// Sums at the first and at the most recent timestamp of a cumulative
/// series. Updates must arrive in non-decreasing timestamp order.
#[derive(Debug, Clone, Copy)]
struct Span {
    initial_ts: OffsetDateTime,
    current_ts: OffsetDateTime,
    initial: f64,
    current: f64,
}

impl Span {
    fn start(timestamp: OffsetDateTime) -> Self {
        Self {
            initial_ts: timestamp,
            current_ts: timestamp,
            initial: 0.0,
            current: 0.0,
        }
    }

    fn update(span: &mut Option<Self>, value: f64, timestamp: OffsetDateTime) -> &mut Self {
        let span = span.get_or_insert_with(|| Self::start(timestamp));
        if timestamp == span.initial_ts {
            span.initial += value;
        }
        if timestamp > span.current_ts {
            span.current_ts = timestamp;
            span.current = 0.0;
        }
        span.current += value;
        span
    }

    fn increase(&self) -> f64 {
        self.current - self.initial
    }
}

/// Total growth between the first and the last timestamp.
#[derive(Debug, Clone, Default)]
pub struct Increase {
    span: Option<Span>,
}

impl Aggregate for Increase {
    fn update(&mut self, value: f64, timestamp: OffsetDateTime, _: Option<&Labels>) {
        Span::update(&mut self.span, value, timestamp);
    }

    fn values(&self) -> Vec<MetricValue> {
        self.span
            .iter()
            .map(|span| MetricValue::untimed(span.increase()))
            .collect()
    }
}

/// Per-second growth between the first and the last timestamp.
#[derive(Debug, Clone, Default)]
pub struct Rate {
    span: Option<Span>,
}

impl Aggregate for Rate {
    fn update(&mut self, value: f64, timestamp: OffsetDateTime, _: Option<&Labels>) {
        Span::update(&mut self.span, value, timestamp);
    }

    fn values(&self) -> Vec<MetricValue> {
        self.span
            .iter()
            .map(|span| {
                let seconds = (span.current_ts - span.initial_ts).as_seconds_f64();
                if seconds == 0.0 {
                    MetricValue::untimed(0.0)
                } else {
                    MetricValue::untimed(span.increase() / seconds)
                }
            })
            .collect()
    }
}
