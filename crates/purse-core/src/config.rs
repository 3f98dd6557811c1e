//! Backup subsystem configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backup::KdfParams;
use crate::util::normalize_text_option;

/// Quiet period the scheduler waits after the last change notification
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_secs(5 * 60);

/// Upper bound for the fetch stage of a profile-triggered restore
pub const DEFAULT_RESTORE_TIMEOUT: Duration = Duration::from_secs(30);

/// How the snapshot is stored inside the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayloadProtection {
    /// AES-256-GCM under a key derived from the user's identity key
    #[default]
    Sealed,
    /// Structured snapshot stored as-is. Provides no confidentiality.
    Plaintext,
}

/// Configuration for the backup engine and scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    /// Debounce interval before an automatic backup fires
    pub quiet_period: Duration,
    /// Timeout applied by [`crate::backup::BackupEngine::restore_with_timeout`]
    pub restore_timeout: Duration,
    /// Payload protection mode for new backups
    pub protection: PayloadProtection,
    /// Key-derivation cost used when sealing
    pub kdf: KdfParams,
    /// Fixed device id; a random one is generated per engine when unset
    pub device_id: Option<String>,
    /// Application version reported in envelope device info
    pub app_version: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
            restore_timeout: DEFAULT_RESTORE_TIMEOUT,
            protection: PayloadProtection::default(),
            kdf: KdfParams::default(),
            device_id: None,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BackupConfig {
    /// Set the scheduler quiet period
    #[must_use]
    pub const fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Set the restore fetch timeout
    #[must_use]
    pub const fn with_restore_timeout(mut self, timeout: Duration) -> Self {
        self.restore_timeout = timeout;
        self
    }

    /// Set the payload protection mode
    #[must_use]
    pub const fn with_protection(mut self, protection: PayloadProtection) -> Self {
        self.protection = protection;
        self
    }

    /// Set key-derivation parameters
    #[must_use]
    pub const fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    /// Pin the device id reported in envelopes; blank values are ignored
    #[must_use]
    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = normalize_text_option(Some(device_id.into()));
        self
    }

    /// Set the application version reported in envelopes
    #[must_use]
    pub fn with_app_version(mut self, app_version: impl Into<String>) -> Self {
        self.app_version = app_version.into();
        self
    }
}
