//! Backup and restore orchestration over the local accessor and remote store.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::{
    canonical_json, collect, digest, fallback_digest, is_supported_schema, validate_snapshot,
    verify_digest, BackupEnvelope, BackupError, BackupInfo, BackupSnapshot, DeviceInfo,
    DigestCheck, EnvelopePayload, KdfParams, RecordCounts, SealedPayload, ShapeIssue,
    SCHEMA_VERSION,
};
use crate::accessor::LocalDataAccessor;
use crate::config::{BackupConfig, PayloadProtection};
use crate::remote::{RemoteBackupStore, BACKUP_COLLECTION};
use crate::util::unix_millis_now;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub digest: String,
    /// At least one collection was unreadable and uploaded as empty
    pub degraded: bool,
    pub sealed: bool,
    pub counts: RecordCounts,
}

/// What a restore changed locally and what it had to skip.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub digest_check: DigestCheck,
    pub snapshot_time: DateTime<Utc>,
    /// Counts of the fetched snapshot, including collections left untouched
    pub counts: RecordCounts,
    pub limits_applied: Vec<String>,
    pub limits_skipped: Vec<String>,
    pub savings_target_applied: bool,
    pub savings_target_skipped: bool,
    pub issues: Vec<ShapeIssue>,
    /// Local writes that failed after the backup was fetched
    pub write_failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    NoBackupFound,
    Restored(RestoreReport),
}

struct VerifiedSnapshot {
    snapshot: BackupSnapshot,
    digest_check: DigestCheck,
}

/// Packages, uploads, fetches and merges backups for one local dataset.
///
/// The public operations never return errors: failures are logged and
/// reported as `false` or `None`. The `try_*` variants expose the tagged
/// internal result.
#[derive(Debug)]
pub struct BackupEngine<A, R> {
    accessor: A,
    remote: R,
    config: BackupConfig,
    device_id: String,
}

impl<A, R> BackupEngine<A, R>
where
    A: LocalDataAccessor,
    R: RemoteBackupStore,
{
    pub fn new(accessor: A, remote: R, config: BackupConfig) -> Self {
        let device_id = config
            .device_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self {
            accessor,
            remote,
            config,
            device_id,
        }
    }

    pub const fn accessor(&self) -> &A {
        &self.accessor
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn config(&self) -> &BackupConfig {
        &self.config
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            platform: std::env::consts::OS.to_string(),
            app_version: self.config.app_version.clone(),
            device_id: self.device_id.clone(),
        }
    }

    /// Back up the full local dataset for `user_id`. Returns `false` on any failure.
    pub async fn backup(&self, user_id: &str, identity_key: &str) -> bool {
        match self.try_backup(user_id, identity_key).await {
            Ok(outcome) => {
                if outcome.degraded {
                    tracing::warn!("Backup for user {user_id} uploaded with unreadable collections");
                }
                true
            }
            Err(error) => {
                tracing::error!("Backup failed for user {user_id}: {error}");
                false
            }
        }
    }

    pub async fn try_backup(
        &self,
        user_id: &str,
        identity_key: &str,
    ) -> Result<BackupOutcome, BackupError> {
        let user_id = require_user_id(user_id)?;

        let collected = collect(&self.accessor).await;
        let degraded = collected.is_degraded();
        let snapshot = collected.into_snapshot();
        let counts = snapshot.counts();

        let plain = serde_json::to_value(&snapshot)?;
        let payload = match self.config.protection {
            PayloadProtection::Plaintext => EnvelopePayload::Plain(plain),
            PayloadProtection::Sealed => {
                let bytes = serde_json::to_vec(&plain)?;
                EnvelopePayload::Sealed(
                    seal_off_thread(bytes, identity_key, user_id, self.config.kdf, counts).await?,
                )
            }
        };
        let sealed = matches!(payload, EnvelopePayload::Sealed(_));
        let payload = payload.into_value()?;

        // Digest of the payload as stored: the sealed wrapper when sealed.
        let integrity_digest = match canonical_json(&payload) {
            Ok(canonical) => digest(&canonical),
            Err(error) => {
                tracing::warn!("Using fallback digest for user {user_id}: {error}");
                fallback_digest(unix_millis_now())
            }
        };

        let envelope = BackupEnvelope {
            user_id: user_id.to_string(),
            payload,
            integrity_digest: integrity_digest.clone(),
            schema_version: SCHEMA_VERSION.to_string(),
            last_updated: Utc::now(),
            device_info: self.device_info(),
        };
        let document = serde_json::to_value(&envelope)?;

        self.remote
            .upsert_document(BACKUP_COLLECTION, user_id, &document)
            .await
            .map_err(BackupError::Transport)?;

        tracing::info!(
            "Backed up {} ledger entries and {} category limits for user {user_id}",
            counts.ledger_entries,
            counts.category_limits
        );

        Ok(BackupOutcome {
            digest: integrity_digest,
            degraded,
            sealed,
            counts,
        })
    }

    /// Restore category limits and the savings target from the remote backup.
    ///
    /// Returns `false` when no backup exists or it cannot be fetched or read.
    pub async fn restore(&self, user_id: &str, identity_key: &str) -> bool {
        log_restore(user_id, self.try_restore(user_id, identity_key).await)
    }

    /// Like [`Self::restore`], giving up when fetching and verifying the
    /// backup takes longer than `timeout`. Local data is untouched on expiry.
    pub async fn restore_with_timeout(
        &self,
        user_id: &str,
        identity_key: &str,
        timeout: Duration,
    ) -> bool {
        log_restore(
            user_id,
            self.try_restore_with_timeout(user_id, identity_key, timeout)
                .await,
        )
    }

    pub async fn try_restore(
        &self,
        user_id: &str,
        identity_key: &str,
    ) -> Result<RestoreOutcome, BackupError> {
        match self.fetch_verified(user_id, identity_key).await? {
            Some(verified) => Ok(RestoreOutcome::Restored(self.apply(verified).await)),
            None => Ok(RestoreOutcome::NoBackupFound),
        }
    }

    pub async fn try_restore_with_timeout(
        &self,
        user_id: &str,
        identity_key: &str,
        timeout: Duration,
    ) -> Result<RestoreOutcome, BackupError> {
        let fetched = tokio::time::timeout(timeout, self.fetch_verified(user_id, identity_key))
            .await
            .map_err(|_| BackupError::TimedOut(timeout))??;
        match fetched {
            Some(verified) => Ok(RestoreOutcome::Restored(self.apply(verified).await)),
            None => Ok(RestoreOutcome::NoBackupFound),
        }
    }

    async fn fetch_verified(
        &self,
        user_id: &str,
        identity_key: &str,
    ) -> Result<Option<VerifiedSnapshot>, BackupError> {
        let user_id = require_user_id(user_id)?;
        let Some(document) = self
            .remote
            .get_document(BACKUP_COLLECTION, user_id)
            .await
            .map_err(BackupError::Transport)?
        else {
            return Ok(None);
        };

        let envelope = BackupEnvelope::from_document(document, user_id)?;
        if !is_supported_schema(&envelope.schema_version) {
            return Err(BackupError::UnsupportedSchema(envelope.schema_version));
        }

        let digest_check = verify_digest(&envelope.integrity_digest, &envelope.payload);
        match &digest_check {
            DigestCheck::Match => {
                tracing::debug!("Backup digest verified for user {user_id}");
            }
            DigestCheck::Mismatch { stored, computed } => {
                tracing::warn!(
                    "Backup digest mismatch for user {user_id} (stored {stored}, computed {computed}); restoring anyway"
                );
            }
            DigestCheck::Unverifiable => {
                tracing::warn!("Backup digest for user {user_id} cannot be verified");
            }
        }

        let plain: Value = match envelope.payload()? {
            EnvelopePayload::Plain(value) => value,
            EnvelopePayload::Sealed(sealed) => {
                let bytes = unseal_off_thread(sealed, identity_key, user_id).await?;
                serde_json::from_slice(&bytes).map_err(|e| {
                    BackupError::MalformedEnvelope(format!("sealed snapshot is not JSON: {e}"))
                })?
            }
        };

        let snapshot = serde_json::from_value(plain)
            .map_err(|e| BackupError::MalformedEnvelope(format!("snapshot: {e}")))?;

        Ok(Some(VerifiedSnapshot {
            snapshot,
            digest_check,
        }))
    }

    /// Overwrite category limits and the savings target. Ledger entries and
    /// savings goals stay as they are locally.
    async fn apply(&self, verified: VerifiedSnapshot) -> RestoreReport {
        let VerifiedSnapshot {
            snapshot,
            digest_check,
        } = verified;

        let issues = validate_snapshot(&snapshot);
        for issue in &issues {
            tracing::warn!("Restored snapshot: {issue}");
        }
        let skipped: HashSet<&str> = issues
            .iter()
            .filter_map(ShapeIssue::skipped_category)
            .collect();
        let target_invalid = issues
            .iter()
            .any(|issue| matches!(issue, ShapeIssue::InvalidSavingsTarget { .. }));

        let mut limits_applied = Vec::new();
        let mut limits_skipped = Vec::new();
        let mut write_failures = Vec::new();

        for (category, budget) in &snapshot.category_limits {
            if skipped.contains(category.as_str()) {
                limits_skipped.push(category.clone());
                continue;
            }
            match self.accessor.set_category_limit(category, budget).await {
                Ok(()) => limits_applied.push(category.clone()),
                Err(error) => {
                    tracing::warn!("Failed to restore category limit {category}: {error}");
                    write_failures.push(format!("category limit {category}: {error}"));
                }
            }
        }

        let mut savings_target_applied = false;
        let savings_target_skipped = snapshot.savings_target.is_some() && target_invalid;
        if let Some(target) = snapshot.savings_target.as_ref().filter(|_| !target_invalid) {
            match self.accessor.set_savings_target(target).await {
                Ok(()) => savings_target_applied = true,
                Err(error) => {
                    tracing::warn!("Failed to restore savings target: {error}");
                    write_failures.push(format!("savings target: {error}"));
                }
            }
        }

        RestoreReport {
            digest_check,
            snapshot_time: snapshot.metadata.snapshot_time,
            counts: snapshot.counts(),
            limits_applied,
            limits_skipped,
            savings_target_applied,
            savings_target_skipped,
            issues,
            write_failures,
        }
    }

    /// Whether a backup document exists for `user_id`. `false` on error.
    pub async fn has_backup(&self, user_id: &str) -> bool {
        let Ok(user_id) = require_user_id(user_id) else {
            return false;
        };
        match self
            .remote
            .document_exists(BACKUP_COLLECTION, user_id)
            .await
        {
            Ok(exists) => exists,
            Err(error) => {
                tracing::warn!("Failed to check backup for user {user_id}: {error}");
                false
            }
        }
    }

    /// Summary of the stored backup. `None` when absent or unreadable.
    pub async fn get_backup_info(&self, user_id: &str) -> Option<BackupInfo> {
        match self.try_get_backup_info(user_id).await {
            Ok(info) => info,
            Err(error) => {
                tracing::warn!("Failed to read backup info for user {user_id}: {error}");
                None
            }
        }
    }

    pub async fn try_get_backup_info(
        &self,
        user_id: &str,
    ) -> Result<Option<BackupInfo>, BackupError> {
        let user_id = require_user_id(user_id)?;
        let document = self
            .remote
            .get_document(BACKUP_COLLECTION, user_id)
            .await
            .map_err(BackupError::Transport)?;
        document
            .map(|document| BackupEnvelope::from_document(document, user_id).map(|e| e.info()))
            .transpose()
    }
}

/// Key derivation is CPU-bound; it runs on the blocking pool so restore
/// timeouts stay enforceable.
async fn seal_off_thread(
    plaintext: Vec<u8>,
    identity_key: &str,
    user_id: &str,
    kdf: KdfParams,
    counts: RecordCounts,
) -> Result<SealedPayload, BackupError> {
    let identity_key = Zeroizing::new(identity_key.to_string());
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        SealedPayload::seal(&plaintext, &identity_key, &user_id, kdf, counts)
    })
    .await
    .map_err(|e| BackupError::Sealing(format!("sealing task failed: {e}")))?
}

async fn unseal_off_thread(
    sealed: SealedPayload,
    identity_key: &str,
    user_id: &str,
) -> Result<Vec<u8>, BackupError> {
    let identity_key = Zeroizing::new(identity_key.to_string());
    let user_id = user_id.to_string();
    tokio::task::spawn_blocking(move || sealed.unseal(&identity_key, &user_id))
        .await
        .map_err(|e| BackupError::Sealing(format!("unsealing task failed: {e}")))?
}

fn require_user_id(user_id: &str) -> Result<&str, BackupError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        Err(BackupError::MissingUserId)
    } else {
        Ok(user_id)
    }
}

fn log_restore(user_id: &str, result: Result<RestoreOutcome, BackupError>) -> bool {
    match result {
        Ok(RestoreOutcome::Restored(report)) => {
            tracing::info!(
                "Restored {} category limits for user {user_id} from backup taken {}",
                report.limits_applied.len(),
                report.snapshot_time
            );
            true
        }
        Ok(RestoreOutcome::NoBackupFound) => {
            tracing::info!("No backup found for user {user_id}");
            false
        }
        Err(error) => {
            tracing::error!("Restore failed for user {user_id}: {error}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::accessor::MemoryLocalStore;
    use crate::backup::KdfParams;
    use crate::models::{
        Budget, EmergencyFund, Expense, ExpenseId, SavingsGoal, SavingsGoalId,
    };
    use crate::remote::MemoryBackupStore;
    use crate::{Error, Result};

    const USER: &str = "user-1";
    const KEY: &str = "identity-key";

    type MemoryEngine = BackupEngine<MemoryLocalStore, MemoryBackupStore>;

    fn config(protection: PayloadProtection) -> BackupConfig {
        BackupConfig::default()
            .with_protection(protection)
            .with_kdf(KdfParams::new(64, 1, 1))
    }

    fn engine(
        local: &MemoryLocalStore,
        remote: &MemoryBackupStore,
        protection: PayloadProtection,
    ) -> MemoryEngine {
        BackupEngine::new(local.clone(), remote.clone(), config(protection))
    }

    async fn limit(store: &MemoryLocalStore, category: &str) -> Option<f64> {
        store
            .category_limits()
            .await
            .unwrap()
            .get(category)
            .map(|budget| budget.amount)
    }

    async fn stored_document(remote: &MemoryBackupStore) -> Value {
        remote
            .get_document(BACKUP_COLLECTION, USER)
            .await
            .unwrap()
            .expect("backup document")
    }

    async fn seeded_store() -> MemoryLocalStore {
        let store = MemoryLocalStore::new();
        store
            .add_ledger_entry(&Expense::new(500.0, "Food & Dining"))
            .await
            .unwrap();
        store
            .set_category_limit("Food & Dining", &Budget::new(5000.0))
            .await
            .unwrap();
        store
            .set_savings_target(&EmergencyFund::new(60_000.0, 15_000.0))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn food_and_dining_limit_survives_device_change() {
        let remote = MemoryBackupStore::new();
        let phone = seeded_store().await;
        assert!(
            engine(&phone, &remote, PayloadProtection::Plaintext)
                .backup(USER, KEY)
                .await
        );

        let document = stored_document(&remote).await;
        assert_eq!(document["payload"]["metadata"]["recordCount"], 1);
        assert_eq!(document["payload"]["ledgerEntries"].as_array().unwrap().len(), 1);
        assert_eq!(
            document["payload"]["categoryLimits"]["Food & Dining"]["amount"],
            5000.0
        );
        assert_eq!(document["schemaVersion"], SCHEMA_VERSION);
        assert_eq!(document["userId"], USER);

        let tablet = MemoryLocalStore::new();
        tablet
            .set_category_limit("Food & Dining", &Budget::new(3000.0))
            .await
            .unwrap();
        assert!(
            engine(&tablet, &remote, PayloadProtection::Plaintext)
                .restore(USER, KEY)
                .await
        );

        assert_eq!(limit(&tablet, "Food & Dining").await, Some(5000.0));
        let target = tablet.savings_target().await.unwrap().unwrap();
        assert!((target.target_amount - 60_000.0).abs() < f64::EPSILON);
        assert!(tablet.ledger_entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_leaves_ledger_goals_and_local_only_limits() {
        let remote = MemoryBackupStore::new();
        let source = seeded_store().await;
        source
            .add_savings_goal(&SavingsGoal::new("Vacation", 2000.0))
            .await
            .unwrap();
        engine(&source, &remote, PayloadProtection::Plaintext)
            .backup(USER, KEY)
            .await;

        let target = MemoryLocalStore::new();
        let local_expense = Expense::new(12.5, "Transport");
        let local_goal = SavingsGoal::new("Laptop", 1500.0);
        target.add_ledger_entry(&local_expense).await.unwrap();
        target.add_savings_goal(&local_goal).await.unwrap();
        target
            .set_category_limit("Transport", &Budget::new(800.0))
            .await
            .unwrap();

        let outcome = engine(&target, &remote, PayloadProtection::Plaintext)
            .try_restore(USER, KEY)
            .await
            .unwrap();
        let RestoreOutcome::Restored(report) = outcome else {
            panic!("expected a restore");
        };

        assert_eq!(report.digest_check, DigestCheck::Match);
        assert_eq!(report.limits_applied, vec!["Food & Dining".to_string()]);
        assert!(report.savings_target_applied);
        assert_eq!(report.counts.savings_goals, 1);

        assert_eq!(target.ledger_entries().await.unwrap(), vec![local_expense]);
        assert_eq!(target.savings_goals().await.unwrap(), vec![local_goal]);
        assert_eq!(limit(&target, "Transport").await, Some(800.0));
        assert_eq!(limit(&target, "Food & Dining").await, Some(5000.0));
    }

    #[tokio::test]
    async fn restore_is_idempotent() {
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Plaintext)
            .backup(USER, KEY)
            .await;

        let target = MemoryLocalStore::new();
        let restorer = engine(&target, &remote, PayloadProtection::Plaintext);
        assert!(restorer.restore(USER, KEY).await);
        let limits_once = target.category_limits().await.unwrap();
        let fund_once = target.savings_target().await.unwrap();

        assert!(restorer.restore(USER, KEY).await);
        assert_eq!(target.category_limits().await.unwrap(), limits_once);
        assert_eq!(target.savings_target().await.unwrap(), fund_once);
    }

    #[tokio::test]
    async fn missing_backup_is_a_terminal_state() {
        let local = seeded_store().await;
        let engine = engine(&local, &MemoryBackupStore::new(), PayloadProtection::Sealed);

        assert_eq!(
            engine.try_restore(USER, KEY).await.unwrap(),
            RestoreOutcome::NoBackupFound
        );
        assert!(!engine.restore(USER, KEY).await);
        assert!(!engine.has_backup(USER).await);
        assert!(engine.get_backup_info(USER).await.is_none());
        assert_eq!(limit(&local, "Food & Dining").await, Some(5000.0));
    }

    /// Log output captured from a thread-local test subscriber
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn install(&self) -> tracing::subscriber::DefaultGuard {
            let sink = self.clone();
            let subscriber = tracing_subscriber::fmt()
                .with_writer(move || sink.clone())
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_default(subscriber)
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn digest_mismatch_still_restores() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Plaintext)
            .backup(USER, KEY)
            .await;

        let mut document = stored_document(&remote).await;
        document["payload"]["categoryLimits"]["Food & Dining"]["amount"] = json!(7000.0);
        remote
            .upsert_document(BACKUP_COLLECTION, USER, &document)
            .await
            .unwrap();

        let target = MemoryLocalStore::new();
        let outcome = engine(&target, &remote, PayloadProtection::Plaintext)
            .try_restore(USER, KEY)
            .await
            .unwrap();

        let RestoreOutcome::Restored(report) = outcome else {
            panic!("expected a restore");
        };
        assert!(report.digest_check.is_mismatch());
        assert_eq!(limit(&target, "Food & Dining").await, Some(7000.0));

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("Backup digest mismatch for user user-1"));
        assert!(output.contains("restoring anyway"));
    }

    #[tokio::test]
    async fn digest_covers_payload_as_stored() {
        for protection in [PayloadProtection::Plaintext, PayloadProtection::Sealed] {
            let remote = MemoryBackupStore::new();
            let outcome = engine(&seeded_store().await, &remote, protection)
                .try_backup(USER, KEY)
                .await
                .unwrap();

            let document = stored_document(&remote).await;
            let stored = canonical_json(&document["payload"]).unwrap();
            assert_eq!(outcome.digest, digest(&stored));
            assert_eq!(document["integrityDigest"], json!(outcome.digest));
        }
    }

    #[tokio::test]
    async fn tampered_ciphertext_is_flagged_and_refused() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Sealed)
            .backup(USER, KEY)
            .await;

        let mut document = stored_document(&remote).await;
        let ciphertext = document["payload"]["sealed"]["ciphertext"]
            .as_str()
            .unwrap()
            .to_string();
        let flipped = if ciphertext.starts_with('A') { "B" } else { "A" };
        document["payload"]["sealed"]["ciphertext"] =
            json!(format!("{flipped}{}", &ciphertext[1..]));
        remote
            .upsert_document(BACKUP_COLLECTION, USER, &document)
            .await
            .unwrap();

        let target = MemoryLocalStore::new();
        let result = engine(&target, &remote, PayloadProtection::Sealed)
            .try_restore(USER, KEY)
            .await;
        assert!(matches!(result, Err(BackupError::Sealing(_))));
        assert!(logs.contents().contains("Backup digest mismatch"));
        assert!(target.category_limits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_key_derivation_cost_is_refused() {
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Sealed)
            .backup(USER, KEY)
            .await;

        let mut document = stored_document(&remote).await;
        document["payload"]["sealed"]["kdf"]["iterations"] = json!(u32::MAX);
        document["payload"]["sealed"]["kdf"]["memoryKib"] = json!(1024 * 1024);
        remote
            .upsert_document(BACKUP_COLLECTION, USER, &document)
            .await
            .unwrap();

        let target = MemoryLocalStore::new();
        let started = std::time::Instant::now();
        let result = engine(&target, &remote, PayloadProtection::Sealed)
            .try_restore(USER, KEY)
            .await;
        assert!(matches!(result, Err(BackupError::Sealing(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(target.category_limits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restore_timeout_covers_key_derivation() {
        let remote = MemoryBackupStore::new();
        let source = BackupEngine::new(
            seeded_store().await,
            remote.clone(),
            config(PayloadProtection::Sealed).with_kdf(KdfParams::new(32 * 1024, 3, 1)),
        );
        assert!(source.backup(USER, KEY).await);

        let target = MemoryLocalStore::new();
        let restorer = engine(&target, &remote, PayloadProtection::Sealed);
        let result = restorer
            .try_restore_with_timeout(USER, KEY, Duration::from_millis(1))
            .await;

        assert!(matches!(result, Err(BackupError::TimedOut(_))));
        assert!(target.category_limits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_envelope_fails_without_touching_local_data() {
        let remote = MemoryBackupStore::new();
        remote
            .upsert_document(
                BACKUP_COLLECTION,
                USER,
                &json!({"userId": USER, "payload": "ZW5jb2RlZA=="}),
            )
            .await
            .unwrap();

        let local = seeded_store().await;
        let engine = engine(&local, &remote, PayloadProtection::Plaintext);

        assert!(matches!(
            engine.try_restore(USER, KEY).await,
            Err(BackupError::MalformedEnvelope(_))
        ));
        assert!(!engine.restore(USER, KEY).await);
        assert!(engine.has_backup(USER).await);
        assert_eq!(limit(&local, "Food & Dining").await, Some(5000.0));
    }

    #[tokio::test]
    async fn newer_major_schema_is_rejected() {
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Plaintext)
            .backup(USER, KEY)
            .await;
        let mut document = stored_document(&remote).await;
        document["schemaVersion"] = json!("2.0");
        remote
            .upsert_document(BACKUP_COLLECTION, USER, &document)
            .await
            .unwrap();

        let result = engine(&MemoryLocalStore::new(), &remote, PayloadProtection::Plaintext)
            .try_restore(USER, KEY)
            .await;
        assert!(matches!(result, Err(BackupError::UnsupportedSchema(v)) if v == "2.0"));
    }

    #[tokio::test]
    async fn sealed_backup_hides_payload_and_restores_with_key() {
        let remote = MemoryBackupStore::new();
        let outcome = engine(&seeded_store().await, &remote, PayloadProtection::Sealed)
            .try_backup(USER, KEY)
            .await
            .unwrap();
        assert!(outcome.sealed);
        assert_eq!(outcome.digest.len(), 64);

        let raw = stored_document(&remote).await.to_string();
        assert!(!raw.contains("Food & Dining"));

        let target = MemoryLocalStore::new();
        let restorer = engine(&target, &remote, PayloadProtection::Sealed);
        let info = restorer.get_backup_info(USER).await.unwrap();
        assert!(info.sealed);
        assert_eq!(info.counts.ledger_entries, 1);
        assert!(info.counts.has_savings_target);

        let RestoreOutcome::Restored(report) = restorer.try_restore(USER, KEY).await.unwrap()
        else {
            panic!("expected a restore");
        };
        assert_eq!(report.digest_check, DigestCheck::Match);
        assert_eq!(limit(&target, "Food & Dining").await, Some(5000.0));
    }

    #[tokio::test]
    async fn sealed_backup_with_wrong_key_fails() {
        let remote = MemoryBackupStore::new();
        engine(&seeded_store().await, &remote, PayloadProtection::Sealed)
            .backup(USER, KEY)
            .await;

        let target = MemoryLocalStore::new();
        let restorer = engine(&target, &remote, PayloadProtection::Sealed);
        assert!(matches!(
            restorer.try_restore(USER, "not-the-key").await,
            Err(BackupError::Sealing(_))
        ));
        assert!(!restorer.restore(USER, "not-the-key").await);
        assert!(target.category_limits().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sealed_backup_requires_identity_key() {
        let remote = MemoryBackupStore::new();
        let engine = engine(&seeded_store().await, &remote, PayloadProtection::Sealed);
        assert!(!engine.backup(USER, "").await);
        assert!(remote.is_empty().await);
    }

    #[tokio::test]
    async fn blank_user_id_is_refused() {
        let remote = MemoryBackupStore::new();
        let engine = engine(&seeded_store().await, &remote, PayloadProtection::Plaintext);
        assert!(matches!(
            engine.try_backup("  ", KEY).await,
            Err(BackupError::MissingUserId)
        ));
        assert!(!engine.has_backup("").await);
        assert!(remote.is_empty().await);
    }

    #[tokio::test]
    async fn invalid_limits_are_skipped_and_reported() {
        let remote = MemoryBackupStore::new();
        let source = seeded_store().await;
        source
            .set_category_limit("Shopping", &Budget::new(-250.0))
            .await
            .unwrap();
        engine(&source, &remote, PayloadProtection::Plaintext)
            .backup(USER, KEY)
            .await;

        let target = MemoryLocalStore::new();
        let RestoreOutcome::Restored(report) =
            engine(&target, &remote, PayloadProtection::Plaintext)
                .try_restore(USER, KEY)
                .await
                .unwrap()
        else {
            panic!("expected a restore");
        };

        assert_eq!(report.limits_skipped, vec!["Shopping".to_string()]);
        assert_eq!(report.limits_applied, vec!["Food & Dining".to_string()]);
        assert_eq!(limit(&target, "Shopping").await, None);
    }

    #[tokio::test]
    async fn backup_info_reports_device_and_counts() {
        let remote = MemoryBackupStore::new();
        let engine = BackupEngine::new(
            seeded_store().await,
            remote.clone(),
            config(PayloadProtection::Plaintext)
                .with_device_id("phone-1")
                .with_app_version("9.9.9"),
        );
        assert!(engine.backup(USER, KEY).await);
        assert!(engine.has_backup(USER).await);

        let info = engine.get_backup_info(USER).await.unwrap();
        assert_eq!(info.device_info.device_id, "phone-1");
        assert_eq!(info.device_info.app_version, "9.9.9");
        assert_eq!(info.schema_version, SCHEMA_VERSION);
        assert!(!info.sealed);
        assert_eq!(
            info.counts,
            RecordCounts {
                ledger_entries: 1,
                category_limits: 1,
                savings_goals: 0,
                has_savings_target: true,
            }
        );
    }

    #[tokio::test]
    async fn empty_dataset_backs_up_well_formed_snapshot() {
        let remote = MemoryBackupStore::new();
        let outcome = engine(&MemoryLocalStore::new(), &remote, PayloadProtection::Plaintext)
            .try_backup(USER, KEY)
            .await
            .unwrap();

        assert!(!outcome.degraded);
        assert_eq!(outcome.counts, RecordCounts::default());
        let document = stored_document(&remote).await;
        assert_eq!(document["payload"]["metadata"]["recordCount"], 0);
        assert!(document["payload"]["savingsTarget"].is_null());
    }

    /// Local store whose ledger cannot be read
    #[derive(Clone, Default)]
    struct UnreadableLedger {
        inner: MemoryLocalStore,
    }

    impl LocalDataAccessor for UnreadableLedger {
        async fn ledger_entries(&self) -> Result<Vec<Expense>> {
            Err(Error::Database("database is locked".to_string()))
        }
        async fn add_ledger_entry(&self, entry: &Expense) -> Result<()> {
            self.inner.add_ledger_entry(entry).await
        }
        async fn delete_ledger_entry(&self, id: &ExpenseId) -> Result<()> {
            self.inner.delete_ledger_entry(id).await
        }
        async fn category_limits(&self) -> Result<BTreeMap<String, Budget>> {
            self.inner.category_limits().await
        }
        async fn set_category_limit(&self, category: &str, budget: &Budget) -> Result<()> {
            self.inner.set_category_limit(category, budget).await
        }
        async fn delete_category_limit(&self, category: &str) -> Result<()> {
            self.inner.delete_category_limit(category).await
        }
        async fn savings_target(&self) -> Result<Option<EmergencyFund>> {
            self.inner.savings_target().await
        }
        async fn set_savings_target(&self, fund: &EmergencyFund) -> Result<()> {
            self.inner.set_savings_target(fund).await
        }
        async fn savings_goals(&self) -> Result<Vec<SavingsGoal>> {
            self.inner.savings_goals().await
        }
        async fn add_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
            self.inner.add_savings_goal(goal).await
        }
        async fn update_savings_goal(&self, goal: &SavingsGoal) -> Result<()> {
            self.inner.update_savings_goal(goal).await
        }
        async fn delete_savings_goal(&self, id: &SavingsGoalId) -> Result<()> {
            self.inner.delete_savings_goal(id).await
        }
    }

    #[tokio::test]
    async fn unreadable_collection_degrades_instead_of_failing() {
        let local = UnreadableLedger::default();
        local
            .set_category_limit("Food & Dining", &Budget::new(5000.0))
            .await
            .unwrap();
        let remote = MemoryBackupStore::new();
        let engine = BackupEngine::new(
            local,
            remote.clone(),
            config(PayloadProtection::Plaintext),
        );

        let outcome = engine.try_backup(USER, KEY).await.unwrap();
        assert!(outcome.degraded);
        assert_eq!(outcome.counts.ledger_entries, 0);
        assert_eq!(outcome.counts.category_limits, 1);
        assert!(engine.backup(USER, KEY).await);

        let document = stored_document(&remote).await;
        assert_eq!(document["payload"]["ledgerEntries"], json!([]));
    }

    /// Remote store that is unreachable
    struct OfflineRemote;

    impl RemoteBackupStore for OfflineRemote {
        async fn upsert_document(&self, _: &str, _: &str, _: &Value) -> Result<()> {
            Err(Error::Remote("network unreachable".to_string()))
        }
        async fn get_document(&self, _: &str, _: &str) -> Result<Option<Value>> {
            Err(Error::Remote("network unreachable".to_string()))
        }
        async fn document_exists(&self, _: &str, _: &str) -> Result<bool> {
            Err(Error::Remote("network unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn transport_failures_flatten_to_false_and_none() {
        let local = seeded_store().await;
        let engine = BackupEngine::new(
            local.clone(),
            OfflineRemote,
            config(PayloadProtection::Plaintext),
        );

        assert!(matches!(
            engine.try_backup(USER, KEY).await,
            Err(BackupError::Transport(_))
        ));
        assert!(!engine.backup(USER, KEY).await);
        assert!(!engine.restore(USER, KEY).await);
        assert!(!engine.has_backup(USER).await);
        assert!(engine.get_backup_info(USER).await.is_none());
        assert_eq!(limit(&local, "Food & Dining").await, Some(5000.0));
    }

    /// Remote store that takes a minute to answer reads
    #[derive(Clone, Default)]
    struct SlowRemote {
        inner: MemoryBackupStore,
    }

    impl RemoteBackupStore for SlowRemote {
        async fn upsert_document(&self, collection: &str, key: &str, value: &Value) -> Result<()> {
            self.inner.upsert_document(collection, key, value).await
        }
        async fn get_document(&self, collection: &str, key: &str) -> Result<Option<Value>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            self.inner.get_document(collection, key).await
        }
        async fn document_exists(&self, collection: &str, key: &str) -> Result<bool> {
            self.inner.document_exists(collection, key).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restore_timeout_leaves_local_data_untouched() {
        let remote = SlowRemote::default();
        let source = BackupEngine::new(
            seeded_store().await,
            remote.clone(),
            config(PayloadProtection::Plaintext),
        );
        assert!(source.backup(USER, KEY).await);

        let target = MemoryLocalStore::new();
        let restorer =
            BackupEngine::new(target.clone(), remote, config(PayloadProtection::Plaintext));

        let result = restorer
            .try_restore_with_timeout(USER, KEY, Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(BackupError::TimedOut(_))));
        assert!(
            !restorer
                .restore_with_timeout(USER, KEY, Duration::from_secs(1))
                .await
        );
        assert!(target.category_limits().await.unwrap().is_empty());

        assert!(
            restorer
                .restore_with_timeout(USER, KEY, Duration::from_secs(120))
                .await
        );
        assert_eq!(limit(&target, "Food & Dining").await, Some(5000.0));
    }
}
