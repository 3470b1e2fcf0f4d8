//! In-memory host page, driven from JSON fixtures.
//!
//! Stands in for the page-integration shell: it mints entry handles, answers
//! snapshot queries, applies visibility, and builds the mutation records a
//! real mutation source would report for each insertion.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use crate::page::{EntryRef, EntryShape, EntrySnapshot, MutationRecord, Page, PageNode};

// --- Fixture format ---

fn default_shape() -> EntryShape {
  EntryShape::RichItem
}

/// One listing item as described in a fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureEntry {
  #[serde(default = "default_shape")]
  pub shape: EntryShape,
  /// Placeholder node without title region or primary link.
  #[serde(default)]
  pub skeleton: bool,
  #[serde(flatten)]
  pub snapshot: EntrySnapshot,
}

/// Entries inserted together, `after_ms` into the replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureWave {
  pub after_ms: u64,
  pub entries: Vec<FixtureEntry>,
}

/// A duration overlay that finishes rendering late, without any insertion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LateRender {
  pub after_ms: u64,
  pub video_id: String,
  pub duration_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageFixture {
  /// Container selectors present on the page, innermost first.
  pub containers: Vec<String>,
  pub entries: Vec<FixtureEntry>,
  pub waves: Vec<FixtureWave>,
  pub renders: Vec<LateRender>,
  /// Content swaps that replace every entry, as in-app navigation does.
  pub navigations: Vec<FixtureWave>,
}

impl PageFixture {
  pub fn load(path: &Path) -> Result<Self> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read fixture {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse fixture {}", path.display()))
  }
}

// --- Simulated page ---

#[derive(Debug, Clone)]
struct SimEntry {
  snapshot: EntrySnapshot,
  hidden: bool,
  /// Host-owned presentation state that visibility changes must not disturb.
  style: String,
}

#[derive(Debug, Default)]
struct PageState {
  containers: Vec<String>,
  next_id: u64,
  entries: BTreeMap<EntryRef, SimEntry>,
  writes: usize,
}

/// Cheaply cloneable handle; clones share the same page.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPage {
  inner: Arc<StdMutex<PageState>>,
}

impl SimulatedPage {
  pub fn new(containers: Vec<String>) -> Self {
    let page = Self::default();
    page.state().containers = containers;
    page
  }

  /// Build a page holding the fixture's initial entries.
  pub fn from_fixture(fixture: &PageFixture) -> Self {
    let page = Self::new(fixture.containers.clone());
    page.insert_batch(&fixture.entries);
    page
  }

  fn state(&self) -> MutexGuard<'_, PageState> {
    self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// Insert one entry and return the node a mutation source would report.
  pub fn insert(&self, entry: &FixtureEntry) -> (EntryRef, PageNode) {
    let mut state = self.state();
    state.next_id += 1;
    let handle = EntryRef(state.next_id);
    let snapshot = if entry.skeleton { EntrySnapshot::default() } else { entry.snapshot.clone() };
    state.entries.insert(handle, SimEntry { snapshot, hidden: false, style: "display: block".to_string() });
    let node = PageNode {
      tag: entry.shape.tag().to_string(),
      entry: Some(handle),
      has_title: !entry.skeleton && entry.snapshot.title.is_some(),
      has_primary_link: !entry.skeleton && entry.snapshot.video_id.is_some(),
      children: Vec::new(),
    };
    (handle, node)
  }

  /// Insert entries under one wrapper node, as infinite scroll does.
  pub fn insert_batch(&self, entries: &[FixtureEntry]) -> MutationRecord {
    let children = entries.iter().map(|e| self.insert(e).1).collect();
    let wrapper = PageNode { tag: "ytd-continuation-item".to_string(), children, ..Default::default() };
    MutationRecord { within: self.state().containers.clone(), added: vec![wrapper] }
  }

  /// Finish rendering the duration overlay of every entry showing `video_id`.
  pub fn render_duration(&self, video_id: &str, text: &str) -> usize {
    let mut state = self.state();
    let mut updated = 0;
    for entry in state.entries.values_mut() {
      if entry.snapshot.video_id.as_deref() == Some(video_id) {
        entry.snapshot.duration_text = Some(text.to_string());
        updated += 1;
      }
    }
    updated
  }

  /// Swap out the primary content, as single-page navigation does.
  pub fn replace_content(&self, entries: &[FixtureEntry]) {
    self.state().entries.clear();
    self.insert_batch(entries);
  }

  pub fn is_hidden(&self, entry: EntryRef) -> bool {
    self.state().entries.get(&entry).is_some_and(|e| e.hidden)
  }

  pub fn style(&self, entry: EntryRef) -> Option<String> {
    self.state().entries.get(&entry).map(|e| e.style.clone())
  }

  /// Visibility writes that actually changed state.
  pub fn writes(&self) -> usize {
    self.state().writes
  }

  pub fn hidden_entries(&self) -> Vec<EntryRef> {
    self.state().entries.iter().filter(|(_, e)| e.hidden).map(|(r, _)| *r).collect()
  }

  /// Snapshot of every entry with its visibility, in page order.
  pub fn rows(&self) -> Vec<(EntryRef, EntrySnapshot, bool)> {
    self.state().entries.iter().map(|(r, e)| (*r, e.snapshot.clone(), e.hidden)).collect()
  }

  fn set_hidden(&self, entry: EntryRef, hidden: bool) {
    let mut state = self.state();
    let changed = match state.entries.get_mut(&entry) {
      Some(e) if e.hidden != hidden => {
        e.hidden = hidden;
        true
      }
      _ => false,
    };
    if changed {
      state.writes += 1;
    }
  }
}

impl Page for SimulatedPage {
  fn find_entries(&self) -> Vec<EntryRef> {
    self.state().entries.keys().copied().collect()
  }

  fn snapshot(&self, entry: EntryRef) -> Option<EntrySnapshot> {
    self.state().entries.get(&entry).map(|e| e.snapshot.clone())
  }

  fn show(&mut self, entry: EntryRef) {
    self.set_hidden(entry, false);
  }

  fn hide(&mut self, entry: EntryRef) {
    self.set_hidden(entry, true);
  }

  fn is_visible(&self, entry: EntryRef) -> bool {
    !self.is_hidden(entry)
  }

  fn find_container(&self, candidates: &[String]) -> Option<String> {
    let state = self.state();
    candidates.iter().find(|c| state.containers.contains(*c)).cloned()
  }
}
