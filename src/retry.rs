//! One-shot re-evaluation of entries whose duration had not rendered yet.

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::constants;
use crate::page::EntryRef;

/// At most one timer is ever armed. Requests made while it is pending widen
/// its scope instead of arming another.
#[derive(Debug)]
pub struct RetryScheduler {
  delay: Duration,
  pending: BTreeSet<EntryRef>,
  fire_at: Option<Instant>,
}

impl Default for RetryScheduler {
  fn default() -> Self {
    Self::with_delay(constants().retry_delay())
  }
}

impl RetryScheduler {
  pub fn with_delay(delay: Duration) -> Self {
    Self { delay, pending: BTreeSet::new(), fire_at: None }
  }

  /// Queue `entries` for a retry, arming the timer if it is not already armed.
  pub fn request(&mut self, entries: impl IntoIterator<Item = EntryRef>, now: Instant) {
    self.pending.extend(entries);
    if !self.pending.is_empty() && self.fire_at.is_none() {
      self.fire_at = Some(now + self.delay);
      debug!(pending = self.pending.len(), delay_ms = self.delay.as_millis() as u64, "retry: scheduled");
    }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.fire_at
  }

  pub fn is_scheduled(&self) -> bool {
    self.fire_at.is_some()
  }

  pub fn pending(&self) -> usize {
    self.pending.len()
  }

  /// If the timer is due, disarm it and hand back everything queued so far.
  pub fn fire(&mut self, now: Instant) -> Option<Vec<EntryRef>> {
    if !self.fire_at.is_some_and(|at| at <= now) {
      return None;
    }
    self.fire_at = None;
    let entries: Vec<EntryRef> = std::mem::take(&mut self.pending).into_iter().collect();
    debug!(entries = entries.len(), "retry: firing");
    Some(entries)
  }

  /// Disarm and forget everything. Safe to call repeatedly.
  pub fn cancel(&mut self) {
    self.pending.clear();
    self.fire_at = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const DELAY: Duration = Duration::from_secs(2);

  #[test]
  fn second_request_does_not_rearm() {
    let mut retry = RetryScheduler::with_delay(DELAY);
    let t0 = Instant::now();
    retry.request([EntryRef(1)], t0);
    retry.request([EntryRef(2)], t0 + Duration::from_millis(1500));
    assert_eq!(retry.deadline(), Some(t0 + DELAY));
    assert_eq!(retry.pending(), 2);
  }

  #[test]
  fn firing_clears_later_additions_too() {
    let mut retry = RetryScheduler::with_delay(DELAY);
    let t0 = Instant::now();
    retry.request([EntryRef(1)], t0);
    retry.request([EntryRef(3), EntryRef(1)], t0 + Duration::from_secs(1));

    assert_eq!(retry.fire(t0 + Duration::from_millis(1999)), None);
    let fired = retry.fire(t0 + DELAY).unwrap();
    assert_eq!(fired, vec![EntryRef(1), EntryRef(3)]);
    assert_eq!(retry.pending(), 0);
    assert!(!retry.is_scheduled());
    assert_eq!(retry.fire(t0 + DELAY * 2), None);
  }

  #[test]
  fn empty_request_does_not_arm() {
    let mut retry = RetryScheduler::with_delay(DELAY);
    retry.request(Vec::<EntryRef>::new(), Instant::now());
    assert!(!retry.is_scheduled());
  }

  #[test]
  fn request_after_fire_arms_fresh_timer() {
    let mut retry = RetryScheduler::with_delay(DELAY);
    let t0 = Instant::now();
    retry.request([EntryRef(1)], t0);
    retry.fire(t0 + DELAY).unwrap();
    retry.request([EntryRef(2)], t0 + DELAY);
    assert_eq!(retry.deadline(), Some(t0 + DELAY * 2));
  }

  #[test]
  fn cancel_is_idempotent() {
    let mut retry = RetryScheduler::with_delay(DELAY);
    retry.request([EntryRef(1)], Instant::now());
    retry.cancel();
    retry.cancel();
    assert!(!retry.is_scheduled());
    assert_eq!(retry.pending(), 0);
  }
}
