//! Metadata extraction from rendered listing entries.
//!
//! Everything here is tolerant of partially rendered entries: a missing title
//! means "not rendered yet" and yields `None`, every other missing field just
//! stays unknown.

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::page::{EntryRef, EntrySnapshot, has_live_marker};

/// Structured record for one entry, recomputed on every pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
  /// Embedded video id, or a synthetic `entry-<n>` when the entry has none.
  pub id: String,
  pub title: String,
  /// Seconds. `0` means unknown, live, or not rendered yet.
  pub duration: u32,
  pub channel: Option<String>,
  pub view_count: Option<u64>,
  /// Approximate, resolved from relative text against capture time.
  pub upload_date: Option<DateTime<Utc>>,
}

// --- Duration ---

/// Parse duration overlay text into seconds.
///
/// `"1:02:03"` → 3723, `"5:30"` → 330, `"45"` → 45. Live, upcoming and
/// premiere markers force 0, as does anything unparseable.
pub fn parse_duration(text: &str) -> u32 {
  if has_live_marker(text) {
    return 0;
  }
  let line = text.lines().next().unwrap_or_default().trim();
  let segments: Vec<u32> = line.split(':').map(|s| s.trim().parse().unwrap_or(0)).collect();
  match segments.as_slice() {
    [h, m, s] => h.saturating_mul(3600).saturating_add(m.saturating_mul(60)).saturating_add(*s),
    [m, s] => m.saturating_mul(60).saturating_add(*s),
    [s] => *s,
    _ => 0,
  }
}

// --- View count ---

static SUFFIXED_VIEWS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*([kmb])\s+views?\b").expect("static regex"));
static GROUPED_VIEWS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+)\s+views?\b").expect("static regex"));
static BARE_COUNT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(\d{1,3}(?:,\d{3})+|\d+)\s*$").expect("static regex"));

fn parse_grouped(digits: &str) -> Option<u64> {
  digits.replace(',', "").parse().ok()
}

/// Parse a view-count line: `"1.5M views"`, `"1,234 views"`, `"850 views"` or a bare `"1234"`.
pub fn parse_view_count(text: &str) -> Option<u64> {
  if let Some(caps) = SUFFIXED_VIEWS.captures(text) {
    let value: f64 = caps[1].parse().ok()?;
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
      "k" => 1e3,
      "m" => 1e6,
      "b" => 1e9,
      _ => return None,
    };
    return Some((value * multiplier).round() as u64);
  }
  if let Some(caps) = GROUPED_VIEWS.captures(text) {
    return parse_grouped(&caps[1]);
  }
  BARE_COUNT.captures(text).and_then(|caps| parse_grouped(&caps[1]))
}

// --- Upload date ---

static RELATIVE_AGE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"(?i)\b(?:streamed\s+)?(\d+)\s+(second|minute|hour|day|week|month|year)s?\s+ago\b").expect("static regex")
});

fn unit_seconds(unit: &str) -> i64 {
  match unit.to_ascii_lowercase().as_str() {
    "second" => 1,
    "minute" => 60,
    "hour" => 3_600,
    "day" => 86_400,
    "week" => 7 * 86_400,
    "month" => 30 * 86_400,
    _ => 365 * 86_400,
  }
}

/// Resolve `"3 days ago"` / `"Streamed 2 hours ago"` against `now`.
///
/// Fixed-width units: a month is 30 days and a year 365 days.
pub fn parse_upload_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
  let caps = RELATIVE_AGE.captures(text)?;
  let amount: i64 = caps[1].parse().ok()?;
  let seconds = amount.checked_mul(unit_seconds(&caps[2]))?;
  now.checked_sub_signed(TimeDelta::try_seconds(seconds)?)
}

// --- Extraction ---

/// Identity used for the record: the embedded video id, else `entry-<n>`.
pub fn entry_id(entry: EntryRef, snapshot: &EntrySnapshot) -> String {
  snapshot.video_id.as_deref().map(str::trim).filter(|s| !s.is_empty()).map_or_else(|| entry.to_string(), str::to_string)
}

/// Extract metadata, parsing duration text with `parse_duration`.
pub fn extract(entry: EntryRef, snapshot: &EntrySnapshot, now: DateTime<Utc>) -> Option<Metadata> {
  extract_with(entry, snapshot, now, parse_duration)
}

/// Extract metadata with a caller-supplied duration parser (the cache passes a memoized one).
///
/// Returns `None` when the title is missing or blank: the entry has not
/// finished rendering and should be retried on a later pass.
pub fn extract_with(
  entry: EntryRef,
  snapshot: &EntrySnapshot,
  now: DateTime<Utc>,
  mut duration_of: impl FnMut(&str) -> u32,
) -> Option<Metadata> {
  let title = snapshot.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;

  let duration = match snapshot.duration_text.as_deref() {
    _ if snapshot.is_live() => 0,
    Some(text) => duration_of(text),
    None => 0,
  };

  let trimmed = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

  Some(Metadata {
    id: entry_id(entry, snapshot),
    title: title.to_string(),
    duration,
    channel: trimmed(&snapshot.channel),
    view_count: snapshot.metadata_lines.iter().find_map(|l| parse_view_count(l)),
    upload_date: snapshot.metadata_lines.iter().find_map(|l| parse_upload_date(l, now)),
  })
}
