//! Remote backup envelope and its summary view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{BackupError, RecordCounts, SealedPayload};

/// Device that produced a backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub platform: String,
    pub app_version: String,
    pub device_id: String,
}

/// The unit stored remotely under a user id.
///
/// Every backup writes a fresh envelope that fully replaces the previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEnvelope {
    pub user_id: String,
    pub payload: Value,
    pub integrity_digest: String,
    pub schema_version: String,
    pub last_updated: DateTime<Utc>,
    pub device_info: DeviceInfo,
}

/// Interpreted envelope payload
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopePayload {
    /// Structured snapshot stored without protection
    Plain(Value),
    Sealed(SealedPayload),
}

#[derive(Serialize, Deserialize)]
struct SealedWrapper {
    sealed: SealedPayload,
}

impl EnvelopePayload {
    /// Wire form stored in [`BackupEnvelope::payload`]
    pub fn into_value(self) -> Result<Value, BackupError> {
        match self {
            Self::Plain(value) => Ok(value),
            Self::Sealed(sealed) => Ok(serde_json::to_value(SealedWrapper { sealed })?),
        }
    }
}

impl BackupEnvelope {
    /// Parse a fetched document, checking that it belongs to `user_id`.
    pub fn from_document(document: Value, user_id: &str) -> Result<Self, BackupError> {
        let envelope: Self = serde_json::from_value(document)
            .map_err(|e| BackupError::MalformedEnvelope(e.to_string()))?;
        if envelope.user_id != user_id {
            return Err(BackupError::MalformedEnvelope(format!(
                "envelope belongs to {}, expected {user_id}",
                envelope.user_id
            )));
        }
        Ok(envelope)
    }

    pub fn payload(&self) -> Result<EnvelopePayload, BackupError> {
        let Value::Object(map) = &self.payload else {
            return Err(BackupError::MalformedEnvelope(
                "payload is not an object".to_string(),
            ));
        };
        if map.len() == 1 && map.contains_key("sealed") {
            let wrapper: SealedWrapper = serde_json::from_value(self.payload.clone())
                .map_err(|e| BackupError::MalformedEnvelope(format!("sealed payload: {e}")))?;
            return Ok(EnvelopePayload::Sealed(wrapper.sealed));
        }
        Ok(EnvelopePayload::Plain(self.payload.clone()))
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self.payload(), Ok(EnvelopePayload::Sealed(_)))
    }

    /// Record counts without opening a sealed payload. Plain payloads report
    /// the stored `metadata.recordCount` for ledger entries when present.
    pub fn counts(&self) -> RecordCounts {
        match self.payload() {
            Ok(EnvelopePayload::Sealed(sealed)) => sealed.counts,
            _ => plain_counts(&self.payload),
        }
    }

    #[must_use]
    pub fn info(&self) -> BackupInfo {
        BackupInfo {
            last_updated: self.last_updated,
            schema_version: self.schema_version.clone(),
            device_info: self.device_info.clone(),
            counts: self.counts(),
            sealed: self.is_sealed(),
        }
    }
}

fn plain_counts(payload: &Value) -> RecordCounts {
    let len = |field: &str| match payload.get(field) {
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(map)) => map.len(),
        _ => 0,
    };
    let record_count = payload
        .get("metadata")
        .and_then(|metadata| metadata.get("recordCount"))
        .and_then(Value::as_u64)
        .and_then(|count| usize::try_from(count).ok());
    RecordCounts {
        ledger_entries: record_count.unwrap_or_else(|| len("ledgerEntries")),
        category_limits: len("categoryLimits"),
        savings_goals: len("savingsGoals"),
        has_savings_target: payload
            .get("savingsTarget")
            .is_some_and(|target| !target.is_null()),
    }
}

/// Summary of the stored backup for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    pub last_updated: DateTime<Utc>,
    pub schema_version: String,
    pub device_info: DeviceInfo,
    pub counts: RecordCounts,
    pub sealed: bool,
}
