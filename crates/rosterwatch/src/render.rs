//! Turning a roster snapshot into a chat report, and publishing it.
//!
//! [`format_roster`] builds the report; a [`RosterRenderer`] publishes it.
//! Renderers are expected to update or replace their previous output
//! rather than post a new one on every tick.

use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::UNIX_EPOCH;

use rosterwatch_session::{Presence, RosterSnapshot};
use serde::Serialize;
use tracing::info;

/// Title suffix when players are online.
const ONLINE_TITLE_SUFFIX: &str = "PLAYERS ONLINE :globe_with_meridians:";
/// Title when the roster is empty.
const EMPTY_TITLE: &str = "NO PLAYERS ONLINE :angry:";
/// Description when the roster is empty.
const EMPTY_DESCRIPTION: &str = ":sleeping::zzz::cricket::cactus:";

/// Characters chat markdown treats as formatting.
const MARKDOWN_SPECIAL: &[char] = &['\\', '*', '_', '`', '~', '|'];

/// Errors a renderer can report.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One formatted roster, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterReport {
    pub title: String,
    /// The player lines joined by newlines, or a placeholder when empty.
    pub description: String,
    /// One `:green_circle: name` / `:red_circle: name` line per player.
    pub lines: Vec<String>,
    pub player_count: usize,
    /// When the underlying query completed, in unix seconds.
    pub updated_at_unix: u64,
}

impl RosterReport {
    /// The "Last Updated" value as a chat timestamp tag.
    pub fn last_updated(&self) -> String {
        format!("<t:{}:F>", self.updated_at_unix)
    }
}

/// Publishes roster reports.
pub trait RosterRenderer: Send + Sync + 'static {
    /// Shows `report`, replacing whatever this renderer showed last.
    async fn render(&self, report: &RosterReport) -> Result<(), RenderError>;
}

/// Formats a snapshot: players sorted case-insensitively, each prefixed
/// with a here/away marker and escaped for markdown.
pub fn format_roster(snapshot: &RosterSnapshot) -> RosterReport {
    let mut entries: Vec<_> = snapshot.entries().iter().collect();
    entries.sort_by_key(|entry| entry.display_name.to_lowercase());

    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            let marker = match entry.presence {
                Presence::Here => ":green_circle:",
                Presence::Away => ":red_circle:",
            };
            format!("{marker} {}", escape_markdown(&entry.display_name))
        })
        .collect();

    let (title, description) = if lines.is_empty() {
        (EMPTY_TITLE.to_string(), EMPTY_DESCRIPTION.to_string())
    } else {
        (
            format!("{} {ONLINE_TITLE_SUFFIX}", lines.len()),
            lines.join("\n"),
        )
    };

    let updated_at_unix = snapshot
        .completed_at()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    RosterReport {
        title,
        description,
        player_count: lines.len(),
        lines,
        updated_at_unix,
    }
}

/// Backslash-escapes markdown formatting characters.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if MARKDOWN_SPECIAL.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Writes each report as one JSON object per line.
///
/// A consumer tailing the stream keeps only the last line, which gives
/// update-in-place semantics.
#[derive(Debug)]
pub struct JsonLinesRenderer<W> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Returns the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send + 'static> RosterRenderer for JsonLinesRenderer<W> {
    async fn render(&self, report: &RosterReport) -> Result<(), RenderError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *out, report)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

/// Emits each report through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRenderer;

impl RosterRenderer for LogRenderer {
    async fn render(&self, report: &RosterReport) -> Result<(), RenderError> {
        info!(
            title = %report.title,
            players = report.player_count,
            updated = report.updated_at_unix,
            "{}",
            report.description
        );
        Ok(())
    }
}
