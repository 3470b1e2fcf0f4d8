//! Filtering passes: extract, filter, apply visibility, account.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::MetadataCache;
use crate::events::{EventBus, FilterEvent};
use crate::filter::{CompositeFilter, FeatureGate, FilterCriteria};
use crate::page::{EntryRef, Page};
use crate::settings::Settings;

/// Outcome of one pass over some subset of the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
  pub shown: Vec<EntryRef>,
  pub hidden: Vec<EntryRef>,
  /// Seconds, summed over `hidden`.
  pub total_time_saved: u64,
}

/// Page-wide aggregate over the latest decision for every entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
  pub processed: usize,
  pub hidden: usize,
  /// Seconds.
  pub time_saved: u64,
}

/// Render seconds as `"1h 05m"`, `"12m 30s"` or `"45s"`.
pub fn format_time_saved(seconds: u64) -> String {
  let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
  match (h, m) {
    (0, 0) => format!("{s}s"),
    (0, _) => format!("{m}m {s:02}s"),
    _ => format!("{h}h {m:02}m"),
  }
}

#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
  pub result: FilterResult,
  /// Entries still without a duration that are not flagged live.
  pub unknown_duration: Vec<EntryRef>,
}

#[derive(Debug, Clone, Copy)]
struct Decision {
  hidden: bool,
  duration: u32,
}

pub struct FilterEngine<P> {
  page: P,
  enabled: bool,
  gate: FeatureGate,
  filter: CompositeFilter,
  cache: MetadataCache,
  decisions: HashMap<EntryRef, Decision>,
  /// Last time decisions were checked against the entries still on the page.
  pruned_at: Option<Instant>,
  bus: EventBus,
}

impl<P: Page> FilterEngine<P> {
  pub fn new(page: P, gate: FeatureGate, bus: EventBus) -> Self {
    Self {
      page,
      enabled: true,
      gate,
      filter: CompositeFilter::gated(FilterCriteria::default(), gate),
      cache: MetadataCache::default(),
      decisions: HashMap::new(),
      pruned_at: None,
      bus,
    }
  }

  /// Adopt new settings. Advanced predicates are dropped unless the gate allows them.
  pub fn configure(&mut self, settings: &Settings) {
    self.enabled = settings.enabled;
    self.filter = CompositeFilter::gated(settings.criteria.clone(), self.gate);
    let active: Vec<&str> = self.filter.active().iter().map(|p| p.label()).collect();
    info!(enabled = self.enabled, active = ?active, "engine: settings applied");
  }

  pub fn page(&self) -> &P {
    &self.page
  }

  pub fn stats(&self) -> FilterStats {
    self.decisions.values().fold(FilterStats::default(), |mut stats, d| {
      stats.processed += 1;
      if d.hidden {
        stats.hidden += 1;
        stats.time_saved += u64::from(d.duration);
      }
      stats
    })
  }

  /// Forget everything tied to the previous page content.
  pub fn reset(&mut self) {
    self.decisions.clear();
    self.cache.clear();
    self.pruned_at = None;
  }

  /// Pass over every entry currently on the page.
  pub fn full_pass(&mut self, now: Instant) -> PassOutcome {
    let entries = self.page.find_entries();
    self.prune(&entries, now);
    self.pass(&entries, now)
  }

  /// Forget decisions for entries no longer on the page.
  fn prune(&mut self, present: &[EntryRef], now: Instant) {
    let present: HashSet<EntryRef> = present.iter().copied().collect();
    let before = self.decisions.len();
    self.decisions.retain(|entry, _| present.contains(entry));
    self.pruned_at = Some(now);
    let removed = before - self.decisions.len();
    if removed > 0 {
      debug!(removed, remaining = self.decisions.len(), "engine: pruned departed entries");
    }
  }

  /// Expire cache records every pass; re-check decisions against the page once per cache TTL.
  fn housekeep(&mut self, now: Instant) {
    self.cache.sweep(now);
    let due = self.pruned_at.is_none_or(|at| now.saturating_duration_since(at) >= self.cache.ttl());
    if due {
      let entries = self.page.find_entries();
      self.prune(&entries, now);
    }
  }

  /// Pass over `entries` only.
  ///
  /// Entries that are gone or not rendered yet are skipped and keep whatever
  /// visibility they had.
  pub fn pass(&mut self, entries: &[EntryRef], now: Instant) -> PassOutcome {
    let captured_at = Utc::now();
    let mut outcome = PassOutcome::default();
    let mut skipped = 0usize;
    self.housekeep(now);

    for &entry in entries {
      let Some(snapshot) = self.page.snapshot(entry) else {
        self.decisions.remove(&entry);
        self.cache.forget(entry);
        skipped += 1;
        continue;
      };

      if !self.enabled {
        self.set_visible(entry, true);
        outcome.result.shown.push(entry);
        self.decisions.insert(entry, Decision { hidden: false, duration: 0 });
        continue;
      }

      let Some(meta) = self.cache.get(entry, &snapshot, now, captured_at) else {
        skipped += 1;
        continue;
      };

      let visible = self.filter.matches(&meta);
      self.set_visible(entry, visible);
      if visible {
        outcome.result.shown.push(entry);
      } else {
        outcome.result.hidden.push(entry);
        outcome.result.total_time_saved += u64::from(meta.duration);
      }
      self.decisions.insert(entry, Decision { hidden: !visible, duration: meta.duration });

      if meta.duration == 0 && !snapshot.is_live() {
        outcome.unknown_duration.push(entry);
      }
    }

    debug!(
      entries = entries.len(),
      shown = outcome.result.shown.len(),
      hidden = outcome.result.hidden.len(),
      skipped,
      unknown = outcome.unknown_duration.len(),
      "engine: pass complete"
    );

    if !entries.is_empty() {
      self.bus.emit(FilterEvent::VideosFiltered { result: outcome.result.clone(), stats: self.stats() });
    }
    outcome
  }

  fn set_visible(&mut self, entry: EntryRef, visible: bool) {
    if self.page.is_visible(entry) == visible {
      return;
    }
    if visible {
      self.page.show(entry);
    } else {
      self.page.hide(entry);
    }
  }
}
