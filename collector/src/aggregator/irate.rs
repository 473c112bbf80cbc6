use tally_common::types::{labels::Labels, metric::MetricValue};
use time::OffsetDateTime;

use super::Aggregate;

#[derive(Debug, Clone, Copy)]
struct Window {
    previous_ts: OffsetDateTime,
    current_ts: OffsetDateTime,
    previous: f64,
    current: f64,
    max: f64,
}

/// Largest per-second rate between two consecutive distinct timestamps.
#[derive(Debug, Clone, Default)]
pub struct IRateMax {
    window: Option<Window>,
}

impl Aggregate for IRateMax {
    fn update(&mut self, value: f64, timestamp: OffsetDateTime, _: Option<&Labels>) {
        let w = self.window.get_or_insert(Window {
            previous_ts: timestamp,
            current_ts: timestamp,
            previous: 0.0,
            current: 0.0,
            max: 0.0,
        });
        if timestamp > w.current_ts {
            w.previous_ts = w.current_ts;
            w.previous = w.current;
            w.current_ts = timestamp;
            w.current = 0.0;
        }
        w.current += value;
        let seconds = (w.current_ts - w.previous_ts).as_seconds_f64();
        if seconds > 0.0 {
            let rate = (w.current - w.previous) / seconds;
            w.max = w.max.max(rate);
        }
    }

    fn values(&self) -> Vec<MetricValue> {
        self.window
            .iter()
            .map(|w| MetricValue::untimed(w.max))
            .collect()
    }
}
