//! Persisted document layouts.
//!
//! These shapes are the on-disk format. Field names are camelCase and must
//! stay stable; query builders reference them through the constants below.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::interfaces::{PersistenceError, Result, StoreError};

/// Field names shared by journal and snapshot documents.
pub mod fields {
    pub const KEY: &str = "key";
    pub const PERSISTENCE_ID: &str = "persistenceId";
    pub const SEQUENCE_NR: &str = "sequenceNr";
    pub const HIGHEST_SEQUENCE_NR: &str = "highestSequenceNr";
    pub const DOCUMENT_TYPE: &str = "documentType";
    pub const TIMESTAMP: &str = "timestamp";
}

/// `documentType` discriminator values.
pub const JOURNAL_ENTRY_TYPE: &str = "JournalEntry";
pub const SNAPSHOT_ENTRY_TYPE: &str = "SnapshotEntry";

/// Document key for a journal or snapshot entry.
pub fn entry_key(persistence_id: &str, sequence_nr: i64) -> String {
    format!("{}_{}", persistence_id, sequence_nr)
}

/// One persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub key: String,
    pub persistence_id: String,
    pub sequence_nr: i64,
    #[serde(with = "payload_base64")]
    pub payload: Bytes,
    #[serde(default)]
    pub manifest: String,
    #[serde(default)]
    pub is_deleted: bool,
    pub document_type: String,
}

impl JournalEntry {
    pub fn new(
        persistence_id: &str,
        sequence_nr: i64,
        payload: Bytes,
        manifest: &str,
        is_deleted: bool,
    ) -> Self {
        Self {
            key: entry_key(persistence_id, sequence_nr),
            persistence_id: persistence_id.to_string(),
            sequence_nr,
            payload,
            manifest: manifest.to_string(),
            is_deleted,
            document_type: JOURNAL_ENTRY_TYPE.to_string(),
        }
    }
}

/// Per-identity high-water mark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    pub key: String,
    pub persistence_id: String,
    pub highest_sequence_nr: i64,
}

impl MetadataEntry {
    pub fn new(persistence_id: &str, highest_sequence_nr: i64) -> Self {
        Self {
            key: persistence_id.to_string(),
            persistence_id: persistence_id.to_string(),
            highest_sequence_nr,
        }
    }
}

/// One saved snapshot. `timestamp` is in 100ns ticks since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub key: String,
    pub persistence_id: String,
    pub sequence_nr: i64,
    #[serde(with = "payload_base64")]
    pub payload: Bytes,
    pub timestamp: i64,
    pub document_type: String,
}

impl SnapshotEntry {
    pub fn new(persistence_id: &str, sequence_nr: i64, timestamp: i64, payload: Bytes) -> Self {
        Self {
            key: entry_key(persistence_id, sequence_nr),
            persistence_id: persistence_id.to_string(),
            sequence_nr,
            payload,
            timestamp,
            document_type: SNAPSHOT_ENTRY_TYPE.to_string(),
        }
    }
}

/// Serialize an entry into a store document.
pub fn to_document<T: Serialize>(entry: &T) -> Result<Value> {
    serde_json::to_value(entry).map_err(|e| PersistenceError::Query(StoreError::Serialization(e)))
}

/// Decode a store document, naming the offending key on failure.
pub fn from_document<T: for<'de> Deserialize<'de>>(document: Value) -> Result<T> {
    let key = document
        .get(fields::KEY)
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    serde_json::from_value(document).map_err(|e| PersistenceError::Decode {
        key,
        reason: e.to_string(),
    })
}

/// Payload bytes stored as standard base64 text.
mod payload_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_entry_key_format() {
        assert_eq!(entry_key("order-1", 42), "order-1_42");
    }

    #[test]
    fn test_journal_entry_document_shape() {
        let entry = JournalEntry::new("p-1", 3, Bytes::from_static(b"hi"), "m", false);
        let doc = to_document(&entry).unwrap();
        assert_eq!(
            doc,
            json!({
                "key": "p-1_3",
                "persistenceId": "p-1",
                "sequenceNr": 3,
                "payload": "aGk=",
                "manifest": "m",
                "isDeleted": false,
                "documentType": "JournalEntry",
            })
        );
    }

    #[test]
    fn test_metadata_entry_document_shape() {
        let doc = to_document(&MetadataEntry::new("p-1", 9)).unwrap();
        assert_eq!(
            doc,
            json!({ "key": "p-1", "persistenceId": "p-1", "highestSequenceNr": 9 })
        );
    }

    #[test]
    fn test_snapshot_entry_decodes_from_document() {
        let doc = json!({
            "key": "p-1_5",
            "persistenceId": "p-1",
            "sequenceNr": 5,
            "payload": "AQID",
            "timestamp": 1000,
            "documentType": "SnapshotEntry",
        });
        let entry: SnapshotEntry = from_document(doc).unwrap();
        assert_eq!(entry.sequence_nr, 5);
        assert_eq!(entry.payload, Bytes::from_static(&[1, 2, 3]));
    }

    #[test]
    fn test_decode_failure_names_key() {
        let doc = json!({ "key": "p-1_5", "persistenceId": "p-1", "payload": "!!" });
        let err = from_document::<JournalEntry>(doc).unwrap_err();
        match err {
            PersistenceError::Decode { key, .. } => assert_eq!(key, "p-1_5"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
