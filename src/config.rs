use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{LendingError, Result};

/// lending configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingConfig {
    /// loan period granted on confirmation
    pub loan_period_days: i64,
    /// additional period granted per extension
    pub extension_period_days: i64,
    /// maximum number of extensions per loan
    pub max_extensions: u32,
    /// unconfirmed requests older than this are cancelled by the reconciler
    pub request_grace_days: i64,
    /// ttl on idempotency locks guarding point movements
    pub guard_lock_ttl_minutes: i64,
    /// ttl on the reconciler's self-serialization lock
    pub reconciler_lock_ttl_minutes: i64,
}

impl LendingConfig {
    /// standard platform configuration: 14-day loans, one 7-day extension,
    /// 3-day confirmation window
    pub fn standard() -> Self {
        Self {
            loan_period_days: 14,
            extension_period_days: 7,
            max_extensions: 1,
            request_grace_days: 3,
            guard_lock_ttl_minutes: 10,
            reconciler_lock_ttl_minutes: 60,
        }
    }

    /// validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.loan_period_days <= 0 {
            return Err(LendingError::InvalidConfiguration {
                message: format!("loan period must be positive, got {}", self.loan_period_days),
            });
        }
        if self.extension_period_days <= 0 {
            return Err(LendingError::InvalidConfiguration {
                message: format!(
                    "extension period must be positive, got {}",
                    self.extension_period_days
                ),
            });
        }
        if self.request_grace_days <= 0 {
            return Err(LendingError::InvalidConfiguration {
                message: format!(
                    "request grace period must be positive, got {}",
                    self.request_grace_days
                ),
            });
        }
        if self.guard_lock_ttl_minutes <= 0 || self.reconciler_lock_ttl_minutes <= 0 {
            return Err(LendingError::InvalidConfiguration {
                message: "lock ttls must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn loan_period(&self) -> Duration {
        Duration::days(self.loan_period_days)
    }

    pub fn extension_period(&self) -> Duration {
        Duration::days(self.extension_period_days)
    }

    pub fn request_grace(&self) -> Duration {
        Duration::days(self.request_grace_days)
    }

    pub fn guard_lock_ttl(&self) -> Duration {
        Duration::minutes(self.guard_lock_ttl_minutes)
    }

    pub fn reconciler_lock_ttl(&self) -> Duration {
        Duration::minutes(self.reconciler_lock_ttl_minutes)
    }
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self::standard()
    }
}
