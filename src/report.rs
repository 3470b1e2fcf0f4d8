use serde::Serialize;
use std::fmt::Write as _;
use unicode_width::UnicodeWidthChar;

use crate::engine::{FilterStats, format_time_saved};
use crate::metadata::parse_duration;
use crate::page::{EntryRef, EntrySnapshot};

const TITLE_WIDTH: usize = 48;
const CHANNEL_WIDTH: usize = 20;

/// Final state of one entry after a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
  pub entry: EntryRef,
  pub video_id: Option<String>,
  pub title: String,
  pub channel: String,
  /// Seconds; 0 when unknown or live.
  pub duration: u32,
  pub hidden: bool,
}

impl ReportRow {
  pub fn new(entry: EntryRef, snapshot: &EntrySnapshot, hidden: bool) -> Self {
    Self {
      entry,
      video_id: snapshot.video_id.clone(),
      title: snapshot.title.clone().unwrap_or_default(),
      channel: snapshot.channel.clone().unwrap_or_default(),
      duration: if snapshot.is_live() { 0 } else { snapshot.duration_text.as_deref().map(parse_duration).unwrap_or(0) },
      hidden,
    }
  }
}

// --- Formatting helpers ---

/// Truncate to `max_width` terminal columns, then pad to exactly that width.
fn fit(s: &str, max_width: usize) -> String {
  let mut out = String::new();
  let mut used = 0;
  let total: usize = s.chars().map(|c| c.width().unwrap_or(0)).sum();
  let budget = if total > max_width { max_width.saturating_sub(1) } else { max_width };

  for c in s.chars() {
    let w = c.width().unwrap_or(0);
    if used + w > budget {
      break;
    }
    out.push(c);
    used += w;
  }
  if total > max_width {
    out.push('…');
    used += 1;
  }
  out.push_str(&" ".repeat(max_width.saturating_sub(used)));
  out
}

fn clock(seconds: u32) -> String {
  if seconds == 0 {
    return "--:--".to_string();
  }
  let (h, m, s) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
  if h > 0 { format!("{h}:{m:02}:{s:02}") } else { format!("{m}:{s:02}") }
}

// --- Rendering ---

pub fn render_table(rows: &[ReportRow], stats: &FilterStats, passes: usize) -> String {
  let mut out = String::new();
  let _ = writeln!(
    out,
    "{:<8}  {:>8}  {}  {}",
    "STATE",
    "LENGTH",
    fit("TITLE", TITLE_WIDTH),
    fit("CHANNEL", CHANNEL_WIDTH)
  );
  for row in rows {
    let state = if row.hidden { "hidden" } else { "shown" };
    let _ = writeln!(
      out,
      "{:<8}  {:>8}  {}  {}",
      state,
      clock(row.duration),
      fit(&row.title, TITLE_WIDTH),
      fit(&row.channel, CHANNEL_WIDTH)
    );
  }
  let _ = writeln!(
    out,
    "\n{} processed, {} hidden, {} saved over {} pass{}",
    stats.processed,
    stats.hidden,
    format_time_saved(stats.time_saved),
    passes,
    if passes == 1 { "" } else { "es" }
  );
  out
}

#[derive(Serialize)]
struct JsonReport<'a> {
  rows: &'a [ReportRow],
  stats: &'a FilterStats,
  passes: usize,
}

pub fn render_json(rows: &[ReportRow], stats: &FilterStats, passes: usize) -> serde_json::Result<String> {
  serde_json::to_string_pretty(&JsonReport { rows, stats, passes })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn row(title: &str, duration: u32, hidden: bool) -> ReportRow {
    ReportRow {
      entry: EntryRef(1),
      video_id: Some("abc".to_string()),
      title: title.to_string(),
      channel: "Chan".to_string(),
      duration,
      hidden,
    }
  }

  #[test]
  fn fit_pads_and_truncates_by_display_width() {
    assert_eq!(fit("abc", 5), "abc  ");
    assert_eq!(fit("abcdef", 4), "abc…");
    // Wide glyphs take two columns each.
    assert_eq!(fit("日本語の動画", 7), "日本語…");
    assert_eq!(fit("日本", 4), "日本");
  }

  #[test]
  fn clock_formats() {
    assert_eq!(clock(0), "--:--");
    assert_eq!(clock(75), "1:15");
    assert_eq!(clock(3725), "1:02:05");
  }

  #[test]
  fn table_lists_rows_and_summary() {
    let stats = FilterStats { processed: 2, hidden: 1, time_saved: 120 };
    let table = render_table(&[row("Short", 120, true), row("Mid", 600, false)], &stats, 1);
    assert!(table.contains("hidden"));
    assert!(table.contains("10:00"));
    assert!(table.ends_with("2 processed, 1 hidden, 2m 00s saved over 1 pass\n"));
  }

  #[test]
  fn row_from_snapshot() {
    let snapshot = EntrySnapshot {
      video_id: Some("v".to_string()),
      title: Some("T".to_string()),
      duration_text: Some("1:02:03".to_string()),
      ..Default::default()
    };
    let r = ReportRow::new(EntryRef(4), &snapshot, false);
    assert_eq!(r.duration, 3723);
    assert_eq!(r.channel, "");
  }

  #[test]
  fn live_badge_reports_unknown_length() {
    let snapshot = EntrySnapshot {
      title: Some("Stream".to_string()),
      duration_text: Some("12:00".to_string()),
      badges: vec!["LIVE".to_string()],
      ..Default::default()
    };
    assert_eq!(ReportRow::new(EntryRef(2), &snapshot, false).duration, 0);
  }

  #[test]
  fn json_report_shape() {
    let json = render_json(&[row("A", 60, true)], &FilterStats::default(), 3).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["passes"], 3);
    assert_eq!(value["rows"][0]["hidden"], true);
    assert_eq!(value["rows"][0]["entry"], 1);
  }
}
