//! Backup & restore subsystem
//!
//! Packages the four local record collections into a versioned, digest-stamped
//! envelope, stores it in a remote document store keyed by user id, and
//! restores the overwrite-safe collections from it. [`AutoBackupScheduler`]
//! debounces change notifications into trailing-edge backups.

mod digest;
mod engine;
mod envelope;
mod packager;
mod scheduler;
mod sealing;
mod snapshot;
mod validate;

use std::time::Duration;

use thiserror::Error;

pub use digest::{
    canonical_json, digest, digest_serializable, fallback_digest, verify_digest, DigestCheck,
    FALLBACK_DIGEST_PREFIX,
};
pub use engine::{BackupEngine, BackupOutcome, RestoreOutcome, RestoreReport};
pub use envelope::{BackupEnvelope, BackupInfo, DeviceInfo, EnvelopePayload};
pub use packager::{collect, Collected, CollectionFailure};
pub use scheduler::{AutoBackupScheduler, SchedulerState};
pub use sealing::{KdfDescriptor, KdfParams, SealedPayload, SEALING_ALGORITHM};
pub use snapshot::{BackupSnapshot, RecordCounts, SnapshotMetadata};
pub use validate::{is_supported_schema, validate_snapshot, ShapeIssue};

/// Schema version written into new envelopes and snapshots
pub const SCHEMA_VERSION: &str = "1.0";

/// Internal failures of the backup subsystem.
///
/// These never cross the public boolean/`Option` operations of
/// [`BackupEngine`]; they are logged there and flattened.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Remote store call failed
    #[error("transport failed: {0}")]
    Transport(#[source] crate::Error),

    /// Operations are keyed by user id; a blank one is refused
    #[error("user id must not be empty")]
    MissingUserId,

    /// Fetched document does not have the envelope shape
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope written by an incompatible schema
    #[error("unsupported schema version: {0}")]
    UnsupportedSchema(String),

    /// Sealing or unsealing the payload failed
    #[error("payload sealing failed: {0}")]
    Sealing(String),

    /// Serialization error
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation did not finish within its deadline
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}
