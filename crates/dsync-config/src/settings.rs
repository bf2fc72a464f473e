//! Typed view over the merged config JSON.
//!
//! Unknown keys are ignored here; the unused-key lint reports them.
//! Wrong types are errors.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_JSON_DIR: &str = "reports/json";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            account_id: None,
            org_id: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub max_add: Option<usize>,
    #[serde(default)]
    pub max_delete: Option<usize>,
    #[serde(default)]
    pub skip_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_json_dir")]
    pub json_dir: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            json_dir: DEFAULT_JSON_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub registry: RegistrySettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_json_dir() -> String {
    DEFAULT_JSON_DIR.to_string()
}

impl Settings {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        let s: Settings =
            serde_json::from_value(config_json.clone()).context("CONFIG_INVALID: settings")?;
        if s.registry.page_size == 0 {
            bail!("CONFIG_INVALID: registry.page_size must be > 0");
        }
        Ok(s)
    }
}

impl RegistrySettings {
    /// `base_url`, or an error naming the missing key.
    pub fn require_base_url(&self) -> Result<&str> {
        let url = self.base_url.trim();
        if url.is_empty() {
            bail!("CONFIG_MISSING: registry.base_url is required");
        }
        Ok(url)
    }
}
