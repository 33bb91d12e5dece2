use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::Address;
use crate::storage::Timeouts;
use crate::storage::gateway::DEFAULT_GATEWAYS;

/// Environment variable holding a comma-separated gateway list.
pub const GATEWAYS_ENV: &str = "LOTLINE_GATEWAYS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub custody: CustodyConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Blocks scanned by a full replay, counted back from the chain head.
    #[serde(default = "default_replay_window")]
    pub replay_window_blocks: u64,
    /// Blocks scanned by a single-item resync.
    #[serde(default = "default_resync_window")]
    pub resync_window_blocks: u64,
    #[serde(default = "default_dedup_tolerance_ms")]
    pub dedup_tolerance_ms: i64,
    /// Run a targeted resync after each live notification.
    #[serde(default = "default_true")]
    pub resync_on_live_event: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replay_window_blocks: default_replay_window(),
            resync_window_blocks: default_resync_window(),
            dedup_tolerance_ms: default_dedup_tolerance_ms(),
            resync_on_live_event: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Ordered gateway bases. Empty means the built-in list.
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default = "default_short_timeout")]
    pub metadata_timeout_secs: u64,
    #[serde(default = "default_short_timeout")]
    pub image_timeout_secs: u64,
    #[serde(default = "default_certificate_timeout")]
    pub certificate_timeout_secs: u64,
    /// Directory for `local://` documents, relative to the project root.
    #[serde(default)]
    pub local_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            gateways: Vec::new(),
            metadata_timeout_secs: default_short_timeout(),
            image_timeout_secs: default_short_timeout(),
            certificate_timeout_secs: default_certificate_timeout(),
            local_dir: None,
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            metadata: Duration::from_secs(self.metadata_timeout_secs),
            image: Duration::from_secs(self.image_timeout_secs),
            certificate: Duration::from_secs(self.certificate_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    #[serde(default = "default_quarantine_vault")]
    pub quarantine_vault: Address,
    #[serde(default = "default_archive_vault")]
    pub archive_vault: Address,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            quarantine_vault: default_quarantine_vault(),
            archive_vault: default_archive_vault(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Name prefix for items whose metadata could not be resolved.
    #[serde(default = "default_fallback_name_prefix")]
    pub fallback_name_prefix: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fallback_name_prefix: default_fallback_name_prefix(),
        }
    }
}

impl DisplayConfig {
    #[must_use]
    pub fn fallback_name(&self, id: crate::model::ItemId) -> String {
        format!("{}{id}", self.fallback_name_prefix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Used when the project does not set its own gateways.
    #[serde(default)]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub user: UserConfig,
    pub resolved_gateways: Vec<String>,
}

pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".lotline/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("lotline/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn resolve_config(project_root: &Path) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let user = load_user_config()?;

    let resolved_gateways = resolve_gateways(
        env::var(GATEWAYS_ENV).ok(),
        &project.storage.gateways,
        &user.gateways,
    );

    Ok(EffectiveConfig {
        project,
        user,
        resolved_gateways,
    })
}

/// Gateway precedence: environment, project file, user file, built-in list.
fn resolve_gateways(env_value: Option<String>, project: &[String], user: &[String]) -> Vec<String> {
    if let Some(raw) = env_value {
        let parsed: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect();
        if !parsed.is_empty() {
            return parsed;
        }
    }
    if !project.is_empty() {
        return project.to_vec();
    }
    if !user.is_empty() {
        return user.to_vec();
    }
    DEFAULT_GATEWAYS.iter().map(|g| (*g).to_string()).collect()
}

const fn default_true() -> bool {
    true
}

const fn default_replay_window() -> u64 {
    10_000
}

const fn default_resync_window() -> u64 {
    1_000
}

const fn default_dedup_tolerance_ms() -> i64 {
    crate::store::dedup::DEFAULT_TOLERANCE_MS
}

const fn default_short_timeout() -> u64 {
    10
}

const fn default_certificate_timeout() -> u64 {
    15
}

fn default_quarantine_vault() -> Address {
    Address::new(Address::QUARANTINE_VAULT)
}

fn default_archive_vault() -> Address {
    Address::new(Address::ARCHIVE_VAULT)
}

fn default_fallback_name_prefix() -> String {
    "Lot #".to_string()
}
