//! docjournal - event journal and snapshot store for event-sourced actors.
//!
//! Persists events and snapshots as JSON documents in a document store that
//! also offers an indexed, parameterized query interface. The host runtime
//! drives the backends through the `JournalBackend` and `SnapshotBackend`
//! traits; the store is reached through the `DocumentStore` port.

pub mod config;
pub mod interfaces;
pub mod journal;
pub mod lifecycle;
pub mod persistent;
pub mod snapshot;
pub mod storage;
pub mod subscription;
pub mod utils;

pub use config::PersistenceConfig;
pub use interfaces::{
    DocumentStore, JournalBackend, PersistenceError, Result, SnapshotBackend, StoreConnector,
};
pub use journal::Journal;
pub use lifecycle::BackendState;
pub use persistent::{
    AtomicWrite, EventPayload, PersistentRepr, SelectedSnapshot, SnapshotMetadata,
    SnapshotSelectionCriteria,
};
pub use snapshot::SnapshotStore;
pub use storage::init_backends;
pub use subscription::{Notification, SubscriberHandle, SubscriptionRegistry};
