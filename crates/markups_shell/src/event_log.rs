//! Bounded in-memory history of shell messages and node events.

use std::{
    fmt,
    sync::{Mutex, OnceLock},
    time::{SystemTime, UNIX_EPOCH},
};

use core_markups::{EventPayload, MarkupsEvent, MarkupsEventKind, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        })
    }
}

/// Who produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Shell,
    Node {
        node: NodeId,
        kind: MarkupsEventKind,
        payload: EventPayload,
    },
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp_secs: u64,
    pub level: LogLevel,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    fn shell(level: LogLevel, message: String) -> Self {
        Self {
            timestamp_secs: now_secs(),
            level,
            source: LogSource::Shell,
            message,
        }
    }

    fn from_event(event: &MarkupsEvent) -> Self {
        let message = match event.payload {
            EventPayload::Index(index) => format!("{:?} point {index}", event.kind),
            EventPayload::BulkReplace => format!("{:?} (bulk replace)", event.kind),
            EventPayload::None => format!("{:?}", event.kind),
        };
        Self {
            timestamp_secs: now_secs(),
            level: LogLevel::Info,
            source: LogSource::Node {
                node: event.node,
                kind: event.kind,
                payload: event.payload,
            },
            message,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self.source {
            LogSource::Node { node, .. } => Some(node),
            LogSource::Shell => None,
        }
    }
}

const MAX_ENTRIES: usize = 500;

static HISTORY: OnceLock<Mutex<Vec<LogEntry>>> = OnceLock::new();

fn history() -> &'static Mutex<Vec<LogEntry>> {
    HISTORY.get_or_init(|| Mutex::new(Vec::with_capacity(128)))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn push(entry: LogEntry) {
    let Ok(mut history) = history().lock() else {
        return;
    };
    history.push(entry);
    if history.len() > MAX_ENTRIES {
        let overflow = history.len() - MAX_ENTRIES;
        history.drain(0..overflow);
    }
}

pub fn entries() -> Vec<LogEntry> {
    history().lock().map(|v| v.clone()).unwrap_or_default()
}

/// Retained events reported by `node`, oldest first.
pub fn node_events(node: NodeId) -> Vec<LogEntry> {
    entries()
        .into_iter()
        .filter(|entry| entry.node() == Some(node))
        .collect()
}

pub fn info(message: impl Into<String>) {
    let message = message.into();
    tracing::info!("{message}");
    push(LogEntry::shell(LogLevel::Info, message));
}

pub fn warn(message: impl Into<String>) {
    let message = message.into();
    tracing::warn!("{message}");
    push(LogEntry::shell(LogLevel::Warn, message));
}

/// Records a node event without echoing it to the terminal.
pub fn record_event(event: &MarkupsEvent) {
    let entry = LogEntry::from_event(event);
    tracing::debug!(node = %event.node, "{}", entry.message);
    push(entry);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_recent_events_per_node() {
        let node = NodeId::new();
        let other = NodeId::new();
        let added = MarkupsEvent::new(node, MarkupsEventKind::PointAdded, EventPayload::Index(0));
        for _ in 0..MAX_ENTRIES + 20 {
            record_event(&added);
        }
        record_event(&MarkupsEvent::new(
            other,
            MarkupsEventKind::AllPointsRemoved,
            EventPayload::None,
        ));

        let entries = entries();
        assert!(entries.len() <= MAX_ENTRIES);
        assert_eq!(entries.last().and_then(LogEntry::node), Some(other));

        let events = node_events(node);
        assert!(!events.is_empty());
        assert!(events.iter().all(|entry| entry.message == "PointAdded point 0"));
        assert!(matches!(
            events[0].source,
            LogSource::Node {
                kind: MarkupsEventKind::PointAdded,
                payload: EventPayload::Index(0),
                ..
            }
        ));
    }
}
