//! Publish/subscribe channel for filtering outcomes.
//!
//! One bus per session, injected into the service; listeners (stats display,
//! UI) subscribe and never publish.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::engine::{FilterResult, FilterStats};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum FilterEvent {
  /// Emitted after every pass.
  VideosFiltered { result: FilterResult, stats: FilterStats },
}

impl FilterEvent {
  pub fn name(&self) -> &'static str {
    match self {
      FilterEvent::VideosFiltered { .. } => "videos-filtered",
    }
  }
}

#[derive(Debug, Clone)]
pub struct EventBus {
  tx: broadcast::Sender<FilterEvent>,
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(64)
  }
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<FilterEvent> {
    self.tx.subscribe()
  }

  /// Publish to current subscribers. Having none is not an error.
  pub fn emit(&self, event: FilterEvent) -> usize {
    let name = event.name();
    let delivered = self.tx.send(event).unwrap_or(0);
    trace!(event = name, delivered, "events: emitted");
    delivered
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn event(saved: u64) -> FilterEvent {
    FilterEvent::VideosFiltered {
      result: FilterResult { total_time_saved: saved, ..Default::default() },
      stats: FilterStats::default(),
    }
  }

  #[test]
  fn emit_without_subscribers_is_fine() {
    let bus = EventBus::default();
    assert_eq!(bus.emit(event(1)), 0);
  }

  #[test]
  fn subscribers_receive_events() {
    let bus = EventBus::default();
    let mut a = bus.subscribe();
    let mut b = bus.clone().subscribe();
    assert_eq!(bus.emit(event(42)), 2);
    assert_eq!(a.try_recv().unwrap(), event(42));
    assert_eq!(b.try_recv().unwrap(), event(42));
  }

  #[test]
  fn serializes_with_event_name() {
    let json = serde_json::to_value(event(5)).unwrap();
    assert_eq!(json["event"], "videos-filtered");
    assert_eq!(json["result"]["total_time_saved"], 5);
  }
}
