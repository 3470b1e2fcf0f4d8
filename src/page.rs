//! Boundary types shared with the host page.
//!
//! The host owns the rendered listing. The core only ever sees opaque
//! [`EntryRef`] handles, read-only [`EntrySnapshot`]s, and the inserted-node
//! trees carried by [`MutationRecord`]s.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to one rendered listing item, minted by the host page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryRef(pub u64);

impl fmt::Display for EntryRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "entry-{}", self.0)
  }
}

/// The listing-item shapes the host renders videos as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryShape {
  RichItem,
  Video,
  GridVideo,
  CompactVideo,
}

impl EntryShape {
  pub const ALL: [EntryShape; 4] = [EntryShape::RichItem, EntryShape::Video, EntryShape::GridVideo, EntryShape::CompactVideo];

  pub fn tag(self) -> &'static str {
    match self {
      EntryShape::RichItem => "ytd-rich-item-renderer",
      EntryShape::Video => "ytd-video-renderer",
      EntryShape::GridVideo => "ytd-grid-video-renderer",
      EntryShape::CompactVideo => "ytd-compact-video-renderer",
    }
  }

  pub fn from_tag(tag: &str) -> Option<Self> {
    Self::ALL.into_iter().find(|shape| shape.tag().eq_ignore_ascii_case(tag))
  }
}

/// Where the mutation batcher listens for insertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveScope {
  /// A stable listing container, identified by the selector that found it.
  Container(String),
  /// Fallback when no listing container exists yet.
  Document,
}

/// A node inserted into the page, as reported by the host's mutation source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageNode {
  pub tag: String,
  /// Set when the host has minted a handle for this node.
  #[serde(default)]
  pub entry: Option<EntryRef>,
  #[serde(default)]
  pub has_title: bool,
  #[serde(default)]
  pub has_primary_link: bool,
  #[serde(default)]
  pub children: Vec<PageNode>,
}

impl PageNode {
  /// Returns the entry handle if this node is a genuine, rendered listing item.
  ///
  /// Skeleton placeholders share the tag of real items but carry neither a
  /// title region nor a primary link.
  pub fn as_entry(&self) -> Option<EntryRef> {
    EntryShape::from_tag(&self.tag)?;
    if !(self.has_title || self.has_primary_link) {
      return None;
    }
    self.entry
  }

  /// Collect genuine entries: the node itself, or else any matching descendants.
  pub fn collect_entries(&self, out: &mut Vec<EntryRef>) {
    if let Some(entry) = self.as_entry() {
      out.push(entry);
      return;
    }
    for child in &self.children {
      child.collect_entries(out);
    }
  }
}

/// One batch of structural insertions under a common parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MutationRecord {
  /// Selectors of the containers enclosing the mutation target, innermost first.
  #[serde(default)]
  pub within: Vec<String>,
  pub added: Vec<PageNode>,
}

impl MutationRecord {
  pub fn is_within(&self, scope: &ObserveScope) -> bool {
    match scope {
      ObserveScope::Document => true,
      ObserveScope::Container(selector) => self.within.iter().any(|s| s == selector),
    }
  }
}

/// Read-only text view of a rendered entry, captured by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
  /// Embedded content id (e.g. the `v=` parameter of the primary link).
  #[serde(default)]
  pub video_id: Option<String>,
  #[serde(default)]
  pub title: Option<String>,
  /// Raw text of the duration overlay, as rendered.
  #[serde(default)]
  pub duration_text: Option<String>,
  #[serde(default)]
  pub channel: Option<String>,
  /// Inline metadata texts such as "1.2M views" and "3 days ago".
  #[serde(default)]
  pub metadata_lines: Vec<String>,
  /// Overlay badge texts such as "LIVE" or "PREMIERE".
  #[serde(default)]
  pub badges: Vec<String>,
}

const LIVE_MARKERS: [&str; 3] = ["LIVE", "UPCOMING", "PREMIERE"];

/// Case-insensitive check for the live/upcoming/premiere markers.
pub fn has_live_marker(text: &str) -> bool {
  let upper = text.to_uppercase();
  LIVE_MARKERS.iter().any(|m| upper.contains(m))
}

impl EntrySnapshot {
  /// Whether the entry is flagged as a live broadcast or premiere.
  pub fn is_live(&self) -> bool {
    self.badges.iter().any(|b| has_live_marker(b)) || self.duration_text.as_deref().is_some_and(has_live_marker)
  }
}

/// The host page: entry source, snapshot reader and visibility sink.
///
/// `show` and `hide` must be idempotent: applying the same state twice leaves
/// every other property of the entry untouched.
pub trait Page {
  fn find_entries(&self) -> Vec<EntryRef>;
  /// `None` once the entry has been removed from the page.
  fn snapshot(&self, entry: EntryRef) -> Option<EntrySnapshot>;
  fn show(&mut self, entry: EntryRef);
  fn hide(&mut self, entry: EntryRef);
  fn is_visible(&self, entry: EntryRef) -> bool;
  /// The first candidate selector that resolves to a container, if any.
  fn find_container(&self, candidates: &[String]) -> Option<String>;
}

#[cfg(test)]
mod tests {
  use super::*;

  fn node(tag: &str, entry: Option<u64>, has_title: bool, children: Vec<PageNode>) -> PageNode {
    PageNode { tag: tag.to_string(), entry: entry.map(EntryRef), has_title, has_primary_link: false, children }
  }

  #[test]
  fn shape_from_tag_is_case_insensitive() {
    assert_eq!(EntryShape::from_tag("YTD-VIDEO-RENDERER"), Some(EntryShape::Video));
    assert_eq!(EntryShape::from_tag("div"), None);
  }

  #[test]
  fn skeleton_node_is_not_an_entry() {
    let skeleton = node("ytd-rich-item-renderer", Some(1), false, vec![]);
    assert_eq!(skeleton.as_entry(), None);
  }

  #[test]
  fn primary_link_alone_marks_an_entry() {
    let mut n = node("ytd-grid-video-renderer", Some(4), false, vec![]);
    n.has_primary_link = true;
    assert_eq!(n.as_entry(), Some(EntryRef(4)));
  }

  #[test]
  fn collect_scans_descendants_of_wrappers() {
    let wrapper = node(
      "div",
      None,
      false,
      vec![
        node("ytd-video-renderer", Some(1), true, vec![]),
        node("span", None, false, vec![node("ytd-compact-video-renderer", Some(2), true, vec![])]),
        node("ytd-video-renderer", Some(3), false, vec![]),
      ],
    );
    let mut out = Vec::new();
    wrapper.collect_entries(&mut out);
    assert_eq!(out, vec![EntryRef(1), EntryRef(2)]);
  }

  #[test]
  fn matched_entry_does_not_descend() {
    let outer = node("ytd-rich-item-renderer", Some(1), true, vec![node("ytd-video-renderer", Some(2), true, vec![])]);
    let mut out = Vec::new();
    outer.collect_entries(&mut out);
    assert_eq!(out, vec![EntryRef(1)]);
  }

  #[test]
  fn record_scope() {
    let record = MutationRecord { within: vec!["#primary".to_string()], added: vec![] };
    assert!(record.is_within(&ObserveScope::Document));
    assert!(record.is_within(&ObserveScope::Container("#primary".to_string())));
    assert!(!record.is_within(&ObserveScope::Container("#secondary #related".to_string())));
  }

  #[test]
  fn live_detection_uses_badges_and_duration_text() {
    let badge = EntrySnapshot { badges: vec!["Premiere".to_string()], ..Default::default() };
    assert!(badge.is_live());
    let overlay = EntrySnapshot { duration_text: Some("live".to_string()), ..Default::default() };
    assert!(overlay.is_live());
    let plain = EntrySnapshot { duration_text: Some("4:20".to_string()), ..Default::default() };
    assert!(!plain.is_live());
  }
}
