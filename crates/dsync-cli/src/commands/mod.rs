//! Command handlers for the dsync CLI.
//!
//! Shared config + registry bootstrap lives here; each command's logic lives
//! in its own submodule.

pub mod compare;
pub mod export;
pub mod sync;
pub mod verify;

use std::time::Duration;

use anyhow::{Context, Result};
use dsync_config::{report_unused_keys, ConfigMode, LoadedConfig, Settings, UnusedKeyPolicy};
use dsync_registry::{Credentials, HttpRegistryClient, RegistryEndpoint};
use tracing::{info, warn};

use crate::RegistryArgs;

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Effective config for one command invocation.
pub struct CommandContext {
    pub loaded: LoadedConfig,
    pub settings: Settings,
    pub account_id: String,
    pub org_id: String,
}

/// Load layered config, lint unused keys for `mode`, apply flag overrides.
pub fn load_context(args: &RegistryArgs, mode: ConfigMode) -> Result<CommandContext> {
    let path_refs: Vec<&str> = args.config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = dsync_config::load_layered_yaml(&path_refs)?;
    let settings = loaded.settings()?;

    let report = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        warn!(
            mode = mode.as_str(),
            unused_leaf_keys = report.unused_leaf_pointers.len(),
            "CONFIG_UNUSED_KEYS"
        );
        for p in &report.unused_leaf_pointers {
            warn!(unused = %p, "unused config key");
        }
    }

    let account_id = pick(args.account_id.as_deref(), settings.registry.account_id.as_deref())
        .context("registry.account_id is required (config or --account-id)")?;
    let org_id = pick(args.org_id.as_deref(), settings.registry.org_id.as_deref())
        .context("registry.org_id is required (config or --org-id)")?;

    info!(
        config_hash = %loaded.config_hash,
        account_id = %account_id,
        org_id = %org_id,
        "config loaded"
    );

    Ok(CommandContext {
        loaded,
        settings,
        account_id,
        org_id,
    })
}

/// Flag wins over config; blanks count as unset.
fn pick(flag: Option<&str>, config: Option<&str>) -> Option<String> {
    flag.or(config)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve credentials from the environment and log in once.
pub async fn connect(ctx: &CommandContext) -> Result<HttpRegistryClient> {
    let base_url = ctx.settings.registry.require_base_url()?;
    let mut endpoint = RegistryEndpoint::new(base_url, &ctx.account_id, &ctx.org_id);
    endpoint.request_timeout = Duration::from_secs(ctx.settings.registry.request_timeout_secs);

    let creds = dsync_config::resolve_credentials(&ctx.loaded.config_json)?;
    let client = HttpRegistryClient::login(
        endpoint,
        &Credentials {
            email: creds.email,
            password: creds.password,
        },
    )
    .await
    .context("registry login failed")?;
    Ok(client)
}
