//! Debounced, sliced delivery of newly inserted listing entries.
//!
//! The batcher is a plain state machine driven by the service loop: mutation
//! records go in through [`MutationBatcher::record`], the loop sleeps until
//! [`MutationBatcher::deadline`], then collects work with
//! [`MutationBatcher::poll`]. It never touches timers itself.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::constants::constants;
use crate::page::{EntryRef, MutationRecord, ObserveScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
  Idle,
  Accumulating,
  Draining,
}

/// A bounded chunk of one drain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
  /// Sequence number of the drain this slice belongs to.
  pub drain: u64,
  pub entries: Vec<EntryRef>,
  /// No further slices are queued after this one.
  pub last: bool,
}

#[derive(Debug)]
pub struct MutationBatcher {
  scope: Option<ObserveScope>,
  debounce: Duration,
  slice_size: usize,
  slice_yield: Duration,
  /// Accumulated since the last drain, in insertion order.
  pending: Vec<EntryRef>,
  /// Everything pending or queued for delivery, for deduplication.
  known: HashSet<EntryRef>,
  drain_at: Option<Instant>,
  queue: VecDeque<EntryRef>,
  next_slice_at: Option<Instant>,
  drains: u64,
}

impl Default for MutationBatcher {
  fn default() -> Self {
    let c = constants();
    Self::with_timing(c.batch_debounce(), c.batch_slice_size, c.batch_slice_yield())
  }
}

impl MutationBatcher {
  pub fn with_timing(debounce: Duration, slice_size: usize, slice_yield: Duration) -> Self {
    Self {
      scope: None,
      debounce,
      slice_size: slice_size.max(1),
      slice_yield,
      pending: Vec::new(),
      known: HashSet::new(),
      drain_at: None,
      queue: VecDeque::new(),
      next_slice_at: None,
      drains: 0,
    }
  }

  /// Start (or move) observation to `scope`.
  pub fn observe(&mut self, scope: ObserveScope) {
    info!(scope = ?scope, "batcher: observing");
    self.scope = Some(scope);
  }

  pub fn is_observing(&self) -> bool {
    self.scope.is_some()
  }

  pub fn phase(&self) -> BatchPhase {
    if !self.queue.is_empty() {
      BatchPhase::Draining
    } else if self.drain_at.is_some() {
      BatchPhase::Accumulating
    } else {
      BatchPhase::Idle
    }
  }

  /// Number of drains started so far.
  pub fn drains(&self) -> u64 {
    self.drains
  }

  /// Accumulate genuine entries from `records`. Returns how many were new.
  ///
  /// The drain deadline is armed by the first accumulation of a window and is
  /// not pushed back by later ones, so a steady insert storm still drains.
  pub fn record(&mut self, records: &[MutationRecord], now: Instant) -> usize {
    let Some(scope) = &self.scope else { return 0 };

    let mut found = Vec::new();
    for record in records.iter().filter(|r| r.is_within(scope)) {
      for node in &record.added {
        node.collect_entries(&mut found);
      }
    }

    let before = self.pending.len();
    for entry in found {
      if self.known.insert(entry) {
        self.pending.push(entry);
      }
    }
    let added = self.pending.len() - before;

    if added > 0 && self.drain_at.is_none() {
      self.drain_at = Some(now + self.debounce);
    }
    added
  }

  /// The next instant `poll` has work at, if any.
  pub fn deadline(&self) -> Option<Instant> {
    match (self.drain_at, self.next_slice_at) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  /// Hand out the next slice if one is due.
  pub fn poll(&mut self, now: Instant) -> Option<Slice> {
    if self.drain_at.is_some_and(|at| at <= now) {
      self.drain_at = None;
      self.drains += 1;
      debug!(drain = self.drains, entries = self.pending.len(), "batcher: draining");
      if self.queue.is_empty() {
        self.next_slice_at = Some(now);
      }
      self.queue.extend(self.pending.drain(..));
    }

    if !self.next_slice_at.is_some_and(|at| at <= now) {
      return None;
    }

    let take = self.slice_size.min(self.queue.len());
    let entries: Vec<EntryRef> = self.queue.drain(..take).collect();
    for entry in &entries {
      self.known.remove(entry);
    }

    let last = self.queue.is_empty();
    self.next_slice_at = if last { None } else { Some(now + self.slice_yield) };
    Some(Slice { drain: self.drains, entries, last })
  }

  /// Disconnect observation and drop all pending work. Safe to call repeatedly.
  pub fn stop(&mut self) {
    if self.scope.take().is_some() {
      info!("batcher: stopped");
    }
    self.pending.clear();
    self.known.clear();
    self.queue.clear();
    self.drain_at = None;
    self.next_slice_at = None;
  }
}
