//! Audit trail for plugin permission changes
//!
//! Sinks receive one event per effective registry change, per rejected
//! update, and per plugin permission that shadows a core one. Nothing on the
//! resolution path records audit events.

use chrono::{SecondsFormat, Utc};
use forum_acl_api::Mask;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use thiserror::Error;

use crate::registry::RegistryChange;

/// Timestamp type (RFC 3339 string)
pub type Timestamp = String;

fn now_rfc3339() -> Timestamp {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Audit event describing a change to the plugin permission namespace
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: Timestamp,
    pub event_type: AuditEventType,
    pub plugin: String,
    pub details: AuditDetails,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, plugin: impl Into<String>, details: AuditDetails) -> Self {
        Self {
            timestamp: now_rfc3339(),
            event_type,
            plugin: plugin.into(),
            details,
        }
    }

    /// Event for an effective registry change; `None` for `Unchanged`
    pub fn from_change(change: &RegistryChange, fingerprint: Option<String>) -> Option<Self> {
        let (event_type, details) = match change {
            RegistryChange::Registered { count, .. } => (
                AuditEventType::PermissionsRegistered,
                AuditDetails::Change {
                    count: *count,
                    previous: None,
                    fingerprint,
                },
            ),
            RegistryChange::Replaced {
                count, previous, ..
            } => (
                AuditEventType::PermissionsReplaced,
                AuditDetails::Change {
                    count: *count,
                    previous: Some(*previous),
                    fingerprint,
                },
            ),
            RegistryChange::Removed { count, .. } => (
                AuditEventType::PermissionsRemoved,
                AuditDetails::Change {
                    count: 0,
                    previous: Some(*count),
                    fingerprint: None,
                },
            ),
            RegistryChange::Unchanged { .. } => return None,
        };
        Some(Self::new(event_type, change.plugin(), details))
    }

    /// Event for an update the registry refused
    pub fn rejected(plugin: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            AuditEventType::RegistrationRejected,
            plugin,
            AuditDetails::Rejected {
                reason: reason.into(),
            },
        )
    }

    /// Event for a plugin permission hidden behind a core permission
    pub fn core_shadowed(plugin: impl Into<String>, name: impl Into<String>, mask: Mask) -> Self {
        Self::new(
            AuditEventType::CoreShadowed,
            plugin,
            AuditDetails::Shadowed {
                name: name.into(),
                mask,
            },
        )
    }
}

/// Type of audit event
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    PermissionsRegistered,
    PermissionsReplaced,
    PermissionsRemoved,
    RegistrationRejected,
    /// A plugin declared a mask or name the core namespace already owns
    CoreShadowed,
}

/// Details about the audit event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum AuditDetails {
    Change {
        count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        previous: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
    },
    Rejected {
        reason: String,
    },
    Shadowed {
        name: String,
        mask: Mask,
    },
}

/// Error type for audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to write audit log: {0}")]
    WriteError(#[from] std::io::Error),

    #[error("Failed to serialize audit event: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    /// Record an audit event
    fn record(&self, event: AuditEvent) -> Result<(), AuditError>;

    /// Flush any buffered events
    fn flush(&self) -> Result<(), AuditError>;

    /// Check if the sink is healthy/available
    fn is_healthy(&self) -> bool {
        true
    }
}

// ============================================================================
// Default Implementations
// ============================================================================

/// File-based audit sink (JSON Lines)
pub struct FileAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileAuditSink {
    /// Open (or create) the log file for appending
    pub fn new(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let json = serde_json::to_string(&event)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", json)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.path.parent().map(|p| p.exists()).unwrap_or(true)
    }
}

impl fmt::Debug for FileAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileAuditSink")
            .field("path", &self.path)
            .finish()
    }
}

/// Bounded in-memory audit sink
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    /// Create a new memory sink with default capacity (1000 events)
    pub fn new() -> Self {
        Self::with_capacity(1000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::with_capacity(max_events.min(1000))),
            max_events,
        }
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self) -> usize {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn find_by_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        if self.max_events == 0 {
            return Ok(());
        }
        if events.len() >= self.max_events {
            events.remove(0);
        }
        events.push(event);
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

impl fmt::Debug for MemoryAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryAuditSink")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

/// Audit sink that discards everything
#[derive(Debug, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Fans events out to several sinks
#[derive(Default)]
pub struct CompositeAuditSink {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl CompositeAuditSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with_sink(mut self, sink: impl AuditSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl AuditSink for CompositeAuditSink {
    fn record(&self, event: AuditEvent) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.record(event.clone())?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), AuditError> {
        for sink in &self.sinks {
            sink.flush()?;
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.sinks.iter().all(|s| s.is_healthy())
    }
}

impl fmt::Debug for CompositeAuditSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAuditSink")
            .field("sink_count", &self.sinks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(plugin: &str) -> AuditEvent {
        AuditEvent::from_change(
            &RegistryChange::Registered {
                plugin: plugin.to_string(),
                count: 2,
            },
            Some("abc".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_from_change() {
        let event = registered("kudos");
        assert_eq!(event.event_type, AuditEventType::PermissionsRegistered);
        assert_eq!(event.plugin, "kudos");

        let unchanged = RegistryChange::Unchanged {
            plugin: "kudos".to_string(),
        };
        assert!(AuditEvent::from_change(&unchanged, None).is_none());
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        sink.record(registered("kudos")).unwrap();
        sink.record(AuditEvent::rejected("poll", "mask conflict"))
            .unwrap();

        assert_eq!(sink.count(), 2);
        assert_eq!(
            sink.find_by_type(AuditEventType::RegistrationRejected).len(),
            1
        );

        sink.clear();
        assert_eq!(sink.count(), 0);
    }

    #[test]
    fn test_memory_sink_eviction() {
        let sink = MemoryAuditSink::with_capacity(2);
        for i in 0..3 {
            sink.record(registered(&format!("plugin-{}", i))).unwrap();
        }

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].plugin, "plugin-1");
        assert_eq!(events[1].plugin, "plugin-2");
    }

    #[test]
    fn test_composite_sink() {
        let sink = CompositeAuditSink::new()
            .with_sink(NullAuditSink)
            .with_sink(MemoryAuditSink::new());
        assert!(sink.record(registered("kudos")).is_ok());
        assert!(sink.flush().is_ok());
        assert!(sink.is_healthy());
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::core_shadowed("kudos", "ADMIN", Mask::new(16));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("core_shadowed"));
        assert!(json.contains(r#""type":"shadowed""#));
        assert!(json.contains(r#""mask":16"#));
    }

    #[test]
    fn test_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit").join("permissions.jsonl");

        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(registered("kudos")).unwrap();
        sink.record(AuditEvent::rejected("poll", "name conflict"))
            .unwrap();
        sink.flush().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("permissions_registered"));
        assert!(lines[1].contains("registration_rejected"));
    }
}
