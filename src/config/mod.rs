//! Configuration for the journal and snapshot backends.
//!
//! Loaded once at startup from YAML plus `DOCJOURNAL__*` environment
//! overrides. Keys are kebab-case in files; snake_case aliases exist so the
//! environment source (which lowercases and keeps underscores) lands on the
//! same fields.

use std::fmt;

use serde::Deserialize;

use crate::interfaces::{Endpoint, PersistenceError, Result};

/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "DOCJOURNAL_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "DOCJOURNAL";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "DOCJOURNAL_LOG";
/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "docjournal.yaml";

const DEFAULT_CONNECTION_STRING: &str = "couchbase://localhost";
/// Metadata collection used when metadata lives in the journal bucket.
pub const DEFAULT_METADATA_COLLECTION: &str = "metadata";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub journal: JournalSettings,
    pub snapshot: SnapshotSettings,
}

impl PersistenceConfig {
    /// Load configuration from files and environment.
    ///
    /// Sources, later overriding earlier:
    /// 1. `docjournal.yaml` in the current directory (if it exists)
    /// 2. File at `path` (if provided)
    /// 3. File named by `DOCJOURNAL_CONFIG` (if set)
    /// 4. `DOCJOURNAL__SECTION__KEY` environment variables
    pub fn load(path: Option<&str>) -> Result<Self> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PersistenceError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| PersistenceError::Config(e.to_string()))
    }

    /// Parse configuration from a YAML document, without file or env lookup.
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| PersistenceError::Config(e.to_string()))
    }
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Connection retry policy applied when a backend starts.
///
/// `max-attempts` counts the first attempt, so the default of 1 never retries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySettings {
    #[serde(alias = "max_attempts")]
    pub max_attempts: u32,
    #[serde(alias = "min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(alias = "max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            min_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

/// Journal backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JournalSettings {
    #[serde(alias = "connection_string")]
    pub connection_string: String,
    pub username: String,
    pub password: Secret,
    /// Single-bucket form: journal and metadata share this bucket, in
    /// separate collections.
    pub bucket: Option<String>,
    #[serde(alias = "journal_bucket")]
    pub journal_bucket: Option<String>,
    #[serde(alias = "metadata_bucket")]
    pub metadata_bucket: Option<String>,
    pub collection: Option<String>,
    #[serde(alias = "metadata_collection")]
    pub metadata_collection: Option<String>,
    #[serde(alias = "connect_retry")]
    pub connect_retry: RetrySettings,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            username: String::new(),
            password: Secret::default(),
            bucket: None,
            journal_bucket: None,
            metadata_bucket: None,
            collection: None,
            metadata_collection: None,
            connect_retry: RetrySettings::default(),
        }
    }
}

impl JournalSettings {
    /// Single-bucket settings, mostly for tests and embedded use.
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    /// Bucket holding journal entries: `journal-bucket`, else `bucket`.
    pub fn journal_bucket(&self) -> Result<&str> {
        self.journal_bucket
            .as_deref()
            .or(self.bucket.as_deref())
            .ok_or_else(|| {
                PersistenceError::Config(
                    "journal requires `bucket` or `journal-bucket`".to_string(),
                )
            })
    }

    /// Bucket holding metadata entries: `metadata-bucket`, else the journal bucket.
    pub fn metadata_bucket(&self) -> Result<&str> {
        match self.metadata_bucket.as_deref() {
            Some(bucket) => Ok(bucket),
            None => self.journal_bucket(),
        }
    }

    pub fn journal_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint {
            connection_string: self.connection_string.clone(),
            username: self.username.clone(),
            password: self.password.expose().to_string(),
            bucket: self.journal_bucket()?.to_string(),
            collection: self.collection.clone(),
        })
    }

    /// Metadata endpoint.
    ///
    /// Metadata documents are keyed by the bare persistence id, which can
    /// equal a journal entry key (`order_1` vs `order` #1), so they must not
    /// share the journal keyspace. Inside the journal bucket the collection
    /// defaults to `metadata`; in a separate bucket it defaults to the
    /// journal collection. A keyspace that still matches the journal's is a
    /// configuration error.
    pub fn metadata_endpoint(&self) -> Result<Endpoint> {
        let journal_bucket = self.journal_bucket()?;
        let bucket = self.metadata_bucket()?;
        let collection = match &self.metadata_collection {
            Some(collection) => Some(collection.clone()),
            None if bucket == journal_bucket => Some(DEFAULT_METADATA_COLLECTION.to_string()),
            None => self.collection.clone(),
        };

        if bucket == journal_bucket && collection == self.collection {
            return Err(PersistenceError::Config(format!(
                "metadata keyspace {}.{} must differ from the journal keyspace",
                bucket,
                collection.as_deref().unwrap_or("_default")
            )));
        }

        Ok(Endpoint {
            connection_string: self.connection_string.clone(),
            username: self.username.clone(),
            password: self.password.expose().to_string(),
            bucket: bucket.to_string(),
            collection,
        })
    }
}

/// Snapshot backend settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SnapshotSettings {
    #[serde(alias = "connection_string")]
    pub connection_string: String,
    pub username: String,
    pub password: Secret,
    pub bucket: Option<String>,
    #[serde(alias = "snapshot_bucket")]
    pub snapshot_bucket: Option<String>,
    pub collection: Option<String>,
    #[serde(alias = "connect_retry")]
    pub connect_retry: RetrySettings,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING.to_string(),
            username: String::new(),
            password: Secret::default(),
            bucket: None,
            snapshot_bucket: None,
            collection: None,
            connect_retry: RetrySettings::default(),
        }
    }
}

impl SnapshotSettings {
    pub fn for_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            ..Self::default()
        }
    }

    /// Bucket holding snapshots: `snapshot-bucket`, else `bucket`.
    pub fn snapshot_bucket(&self) -> Result<&str> {
        self.snapshot_bucket
            .as_deref()
            .or(self.bucket.as_deref())
            .ok_or_else(|| {
                PersistenceError::Config(
                    "snapshot store requires `bucket` or `snapshot-bucket`".to_string(),
                )
            })
    }

    pub fn snapshot_endpoint(&self) -> Result<Endpoint> {
        Ok(Endpoint {
            connection_string: self.connection_string.clone(),
            username: self.username.clone(),
            password: self.password.expose().to_string(),
            bucket: self.snapshot_bucket()?.to_string(),
            collection: self.collection.clone(),
        })
    }
}
