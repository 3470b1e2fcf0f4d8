//! Short-lived memoization of extracted metadata.
//!
//! Two tables: records keyed by entry handle (expire after the TTL), and a
//! duration-text table shared across entries that is dropped wholesale once
//! it grows past its cap.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::constants;
use crate::metadata::{Metadata, entry_id, extract_with, parse_duration};
use crate::page::{EntryRef, EntrySnapshot};

#[derive(Debug, Clone)]
struct CacheEntry {
  metadata: Metadata,
  stored_at: Instant,
}

#[derive(Debug)]
pub struct MetadataCache {
  ttl: Duration,
  duration_cap: usize,
  entries: HashMap<EntryRef, CacheEntry>,
  durations: HashMap<String, u32>,
}

impl Default for MetadataCache {
  fn default() -> Self {
    let c = constants();
    Self::with_limits(c.cache_ttl(), c.duration_cache_max)
  }
}

impl MetadataCache {
  pub fn with_limits(ttl: Duration, duration_cap: usize) -> Self {
    Self { ttl, duration_cap, entries: HashMap::new(), durations: HashMap::new() }
  }

  /// Return cached metadata for `entry`, re-extracting on a miss or stale hit.
  ///
  /// A hit only counts if the entry still shows the same video: hosts recycle
  /// list nodes. Records with an unknown duration are never stored, so a
  /// later retry always re-reads the entry.
  pub fn get(
    &mut self,
    entry: EntryRef,
    snapshot: &EntrySnapshot,
    now: Instant,
    captured_at: DateTime<Utc>,
  ) -> Option<Metadata> {
    if let Some(hit) = self.entries.get(&entry)
      && now.saturating_duration_since(hit.stored_at) < self.ttl
      && hit.metadata.id == entry_id(entry, snapshot)
    {
      return Some(hit.metadata.clone());
    }

    let (durations, cap) = (&mut self.durations, self.duration_cap);
    let Some(metadata) = extract_with(entry, snapshot, captured_at, |text| memoized_duration(durations, cap, text)) else {
      self.entries.remove(&entry);
      return None;
    };

    if metadata.duration > 0 {
      self.entries.insert(entry, CacheEntry { metadata: metadata.clone(), stored_at: now });
    } else {
      self.entries.remove(&entry);
    }
    Some(metadata)
  }

  /// Drop expired records so entries removed from the page don't accumulate.
  pub fn sweep(&mut self, now: Instant) {
    let before = self.entries.len();
    let ttl = self.ttl;
    self.entries.retain(|_, e| now.saturating_duration_since(e.stored_at) < ttl);
    let removed = before - self.entries.len();
    if removed > 0 {
      debug!(removed, remaining = self.entries.len(), "cache: swept expired records");
    }
  }

  /// Drop the record for an entry that left the page.
  pub fn forget(&mut self, entry: EntryRef) {
    self.entries.remove(&entry);
  }

  pub fn ttl(&self) -> Duration {
    self.ttl
  }

  pub fn clear(&mut self) {
    self.entries.clear();
    self.durations.clear();
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn duration_table_len(&self) -> usize {
    self.durations.len()
  }
}

fn memoized_duration(table: &mut HashMap<String, u32>, cap: usize, text: &str) -> u32 {
  if let Some(&secs) = table.get(text) {
    return secs;
  }
  let secs = parse_duration(text);
  table.insert(text.to_string(), secs);
  if table.len() > cap {
    debug!(cap, "cache: duration table over capacity, clearing");
    table.clear();
  }
  secs
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snap(id: &str, title: &str, duration: &str) -> EntrySnapshot {
    EntrySnapshot {
      video_id: Some(id.to_string()),
      title: Some(title.to_string()),
      duration_text: Some(duration.to_string()),
      ..Default::default()
    }
  }

  #[test]
  fn fresh_hit_skips_reparse() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    let first = cache.get(EntryRef(1), &snap("a", "First", "1:00"), t0, Utc::now()).unwrap();
    assert_eq!(first.duration, 60);

    // Same video, re-rendered text changed: still served from cache within the TTL.
    let second = cache.get(EntryRef(1), &snap("a", "First (edited)", "9:99"), t0 + Duration::from_secs(10), Utc::now());
    assert_eq!(second.unwrap().title, "First");
  }

  #[test]
  fn stale_hit_reextracts() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    cache.get(EntryRef(1), &snap("a", "Old", "1:00"), t0, Utc::now());
    let later = cache.get(EntryRef(1), &snap("a", "New", "2:00"), t0 + Duration::from_secs(301), Utc::now()).unwrap();
    assert_eq!(later.title, "New");
    assert_eq!(later.duration, 120);
  }

  #[test]
  fn recycled_node_is_a_miss() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    cache.get(EntryRef(1), &snap("a", "Old", "1:00"), t0, Utc::now());
    let other = cache.get(EntryRef(1), &snap("b", "Other", "3:00"), t0, Utc::now()).unwrap();
    assert_eq!(other.id, "b");
    assert_eq!(other.duration, 180);
  }

  #[test]
  fn unknown_duration_is_not_cached() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    let pending = cache.get(EntryRef(1), &snap("a", "Loading", ""), t0, Utc::now()).unwrap();
    assert_eq!(pending.duration, 0);
    assert!(cache.is_empty());

    let rendered = cache.get(EntryRef(1), &snap("a", "Loading", "4:00"), t0, Utc::now()).unwrap();
    assert_eq!(rendered.duration, 240);
    assert_eq!(cache.len(), 1);
  }

  #[test]
  fn missing_title_evicts_and_returns_none() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    cache.get(EntryRef(1), &snap("a", "Title", "1:00"), t0, Utc::now());
    let mut blank = snap("b", "", "1:00");
    blank.title = None;
    assert!(cache.get(EntryRef(1), &blank, t0, Utc::now()).is_none());
    assert!(cache.is_empty());
  }

  #[test]
  fn duration_table_clears_past_cap() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 3);
    let t0 = Instant::now();
    for (i, text) in ["1:00", "2:00", "3:00"].iter().enumerate() {
      cache.get(EntryRef(i as u64), &snap(&format!("v{i}"), "t", text), t0, Utc::now());
    }
    assert_eq!(cache.duration_table_len(), 3);
    cache.get(EntryRef(9), &snap("v9", "t", "4:00"), t0, Utc::now());
    assert_eq!(cache.duration_table_len(), 0);
  }

  #[test]
  fn duration_table_shared_across_entries() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    cache.get(EntryRef(1), &snap("a", "t", "10:00"), t0, Utc::now());
    cache.get(EntryRef(2), &snap("b", "t", "10:00"), t0, Utc::now());
    assert_eq!(cache.duration_table_len(), 1);
  }

  #[test]
  fn sweep_drops_expired() {
    let mut cache = MetadataCache::with_limits(Duration::from_secs(300), 1000);
    let t0 = Instant::now();
    cache.get(EntryRef(1), &snap("a", "t", "1:00"), t0, Utc::now());
    cache.get(EntryRef(2), &snap("b", "t", "1:00"), t0 + Duration::from_secs(200), Utc::now());
    cache.sweep(t0 + Duration::from_secs(350));
    assert_eq!(cache.len(), 1);
  }
}
