use compact_str::CompactString;
use tokio::sync::broadcast;

use crate::diagnostics::DiagnosticId;

const CAPACITY: usize = 256;

/// Outcome of one scraper within one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeEvent {
    pub scraper: CompactString,
    pub diagnostic: Option<DiagnosticId>,
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub errors: Vec<String>,
}

/// Process-wide broadcast of scrape events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScrapeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CAPACITY);
        Self { tx }
    }

    /// Publish to current subscribers; without subscribers the event is
    /// dropped.
    pub fn publish(&self, event: ScrapeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ScrapeEvent> {
        self.tx.subscribe()
    }
}
