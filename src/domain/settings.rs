//! Runtime settings persisted alongside the queue.

use serde::{Deserialize, Serialize};

/// User-tunable behaviour of the queue engine.
///
/// Missing fields fall back to their defaults on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// When false, runs are skipped without touching the queue
    pub enabled: bool,

    /// Release the agent session after each job
    pub close_tab: bool,

    /// Pause between jobs in milliseconds
    pub throttle_ms: u64,

    /// How far back discovery should look (informational)
    pub lookback_days: u32,

    /// Ignore history and download again
    pub allow_redownload: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            close_tab: true,
            throttle_ms: 2000,
            lookback_days: 1,
            allow_redownload: false,
        }
    }
}

impl Settings {
    /// Overlay the fields present in `patch`
    pub fn merged(&self, patch: &SettingsPatch) -> Self {
        Self {
            enabled: patch.enabled.unwrap_or(self.enabled),
            close_tab: patch.close_tab.unwrap_or(self.close_tab),
            throttle_ms: patch.throttle_ms.unwrap_or(self.throttle_ms),
            lookback_days: patch.lookback_days.unwrap_or(self.lookback_days),
            allow_redownload: patch.allow_redownload.unwrap_or(self.allow_redownload),
        }
    }
}

/// Partial settings update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_tab: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_redownload: Option<bool>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
