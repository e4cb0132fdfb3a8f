//! Host-facing value types passed through the journal and snapshot backends.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::interfaces::{PersistenceError, Result};

/// Event payload as handed over by the host.
///
/// A tagged payload carries labels used for cross-identity subscriptions.
/// Tags are consumed by the writer for notification and are not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    Plain(Bytes),
    Tagged { payload: Bytes, tags: BTreeSet<String> },
}

impl EventPayload {
    pub fn tagged<I, S>(payload: impl Into<Bytes>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        EventPayload::Tagged {
            payload: payload.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }

    /// The application bytes, with any tag wrapper removed.
    pub fn bytes(&self) -> &Bytes {
        match self {
            EventPayload::Plain(payload) => payload,
            EventPayload::Tagged { payload, .. } => payload,
        }
    }

    pub fn tags(&self) -> Option<&BTreeSet<String>> {
        match self {
            EventPayload::Plain(_) => None,
            EventPayload::Tagged { tags, .. } => Some(tags),
        }
    }
}

impl From<Bytes> for EventPayload {
    fn from(payload: Bytes) -> Self {
        EventPayload::Plain(payload)
    }
}

impl From<Vec<u8>> for EventPayload {
    fn from(payload: Vec<u8>) -> Self {
        EventPayload::Plain(Bytes::from(payload))
    }
}

impl From<&'static str> for EventPayload {
    fn from(payload: &'static str) -> Self {
        EventPayload::Plain(Bytes::from_static(payload.as_bytes()))
    }
}

/// One event, either being written or recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistentRepr {
    pub persistence_id: String,
    pub sequence_nr: i64,
    pub payload: EventPayload,
    pub manifest: String,
    pub is_deleted: bool,
}

impl PersistentRepr {
    pub fn new(
        persistence_id: impl Into<String>,
        sequence_nr: i64,
        payload: impl Into<EventPayload>,
    ) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            payload: payload.into(),
            manifest: String::new(),
            is_deleted: false,
        }
    }

    pub fn with_manifest(mut self, manifest: impl Into<String>) -> Self {
        self.manifest = manifest.into();
        self
    }
}

/// Events for one identity that the host expects to succeed or fail together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomicWrite {
    persistence_id: String,
    events: Vec<PersistentRepr>,
}

impl AtomicWrite {
    /// Build a write group.
    ///
    /// Rejects empty groups and groups mixing persistence identities.
    /// Events are ordered by ascending sequence number.
    pub fn new(events: Vec<PersistentRepr>) -> Result<Self> {
        let persistence_id = match events.first() {
            Some(first) => first.persistence_id.clone(),
            None => {
                return Err(PersistenceError::InvalidWrite(
                    "atomic write group must not be empty".to_string(),
                ))
            }
        };
        if let Some(other) = events.iter().find(|e| e.persistence_id != persistence_id) {
            return Err(PersistenceError::InvalidWrite(format!(
                "atomic write group mixes persistence ids '{}' and '{}'",
                persistence_id, other.persistence_id
            )));
        }
        let mut events = events;
        events.sort_by_key(|e| e.sequence_nr);
        Ok(Self {
            persistence_id,
            events,
        })
    }

    pub fn persistence_id(&self) -> &str {
        &self.persistence_id
    }

    pub fn events(&self) -> &[PersistentRepr] {
        &self.events
    }

    pub fn lowest_sequence_nr(&self) -> i64 {
        self.events.first().map(|e| e.sequence_nr).unwrap_or(0)
    }

    pub fn highest_sequence_nr(&self) -> i64 {
        self.events.last().map(|e| e.sequence_nr).unwrap_or(0)
    }
}

/// Identifies a snapshot. `timestamp` is in 100ns ticks since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotMetadata {
    pub persistence_id: String,
    pub sequence_nr: i64,
    pub timestamp: i64,
}

impl SnapshotMetadata {
    pub fn new(persistence_id: impl Into<String>, sequence_nr: i64, timestamp: i64) -> Self {
        Self {
            persistence_id: persistence_id.into(),
            sequence_nr,
            timestamp,
        }
    }

    /// Metadata stamped with the current wall clock.
    pub fn now(persistence_id: impl Into<String>, sequence_nr: i64) -> Self {
        Self::new(persistence_id, sequence_nr, ticks_now())
    }

    /// Timestamp a delete must match, if any. Zero and `i64::MAX` mean unset.
    pub fn timestamp_filter(&self) -> Option<i64> {
        Some(self.timestamp).filter(|&t| t > 0 && t != i64::MAX)
    }
}

/// Current time in 100ns ticks since the Unix epoch.
pub fn ticks_now() -> i64 {
    chrono::Utc::now().timestamp_micros().saturating_mul(10)
}

/// A loaded snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSnapshot {
    pub metadata: SnapshotMetadata,
    pub snapshot: Bytes,
}

/// Upper bounds narrowing which snapshots apply. Both bounds are inclusive.
///
/// An unset bound, or a bound at `i64::MAX`, is unrestricted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSelectionCriteria {
    pub max_sequence_nr: Option<i64>,
    pub max_timestamp: Option<i64>,
}

impl SnapshotSelectionCriteria {
    /// No restriction: the newest snapshot wins.
    pub fn latest() -> Self {
        Self::default()
    }

    pub fn with_max_sequence_nr(mut self, max_sequence_nr: i64) -> Self {
        self.max_sequence_nr = Some(max_sequence_nr);
        self
    }

    pub fn with_max_timestamp(mut self, max_timestamp: i64) -> Self {
        self.max_timestamp = Some(max_timestamp);
        self
    }

    /// Sequence bound to apply, if any.
    pub fn sequence_bound(&self) -> Option<i64> {
        self.max_sequence_nr.filter(|&n| n != i64::MAX)
    }

    /// Timestamp bound to apply, if any.
    pub fn timestamp_bound(&self) -> Option<i64> {
        self.max_timestamp.filter(|&t| t != i64::MAX)
    }
}
