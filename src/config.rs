//! TOML-based configuration snapshot.
//!
//! Loads the navigation and filtering settings from a `config.toml` file.
//! Every struct implements `Default` so a missing or partial config file
//! still yields a working engine. Components are built from one snapshot
//! and never read the file again mid-evaluation; a reload builds new ones.
//!
//! ## Config file search order
//!
//! 1. `SURIBROWS_NAV_CONFIG` environment variable (explicit override)
//! 2. Next to the executable (`<exe_dir>/config.toml`)
//! 3. Platform config directory (`%APPDATA%\SuriBrows\nav.toml` on Windows)
//! 4. Current working directory (`./config.toml`)
//! 5. No file found → `Config::default()`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::filter::{FilterChain, FilterDataProvider, FilterStages};
use crate::mining::MiningList;
use crate::privacy::AdBlockSnapshot;
use crate::resblock::{ResourceRuleDefinition, load_checkers};
use crate::routing::{RoutingPreference, RoutingPreferences};
use crate::rules::RuleDefinition;
use crate::speeddial::{SpeedDial, SpeedDialResponder};

// ─────────────────────────────────────────────────────────────────────────────
// Config structs
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub navigation: NavigationConfig,
    pub filters: FiltersConfig,
    /// Pattern rules, in priority order.
    pub rules: Vec<RuleDefinition>,
    pub resource_rules: Vec<ResourceRuleDefinition>,
    pub speed_dial: Vec<SpeedDial>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub home_page: String,
    /// Scheme of the browser's own pages (`suri:settings`, `suri:speeddial`).
    pub internal_scheme: String,
}

/// Where links land.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub link: RoutingPreference,
    pub speed_dial: RoutingPreference,
    pub blank_window: RoutingPreference,
    /// Offer links with unknown schemes to installed apps.
    pub share_unknown_scheme: bool,
}

/// Filter chain toggles and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiltersConfig {
    pub ad_block: bool,
    pub mining_protect: bool,
    pub resource_block: bool,
    /// Directory of Adblock Plus `*.txt` lists. Unset = standard locations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters_dir: Option<PathBuf>,
    /// Hosts added to the built-in mining list.
    pub mining_hosts: Vec<String>,
    /// Served as `<scheme>:speeddial/custom.css`.
    pub custom_css: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Default impls
// ─────────────────────────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            home_page: "suri:speeddial".to_string(),
            internal_scheme: "suri".to_string(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        let prefs = RoutingPreferences::default();
        Self {
            link: prefs.link,
            speed_dial: prefs.speed_dial,
            blank_window: prefs.blank_window,
            share_unknown_scheme: false,
        }
    }
}

impl NavigationConfig {
    pub fn preferences(&self) -> RoutingPreferences {
        RoutingPreferences {
            link: self.link,
            speed_dial: self.speed_dial,
            blank_window: self.blank_window,
        }
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            ad_block: true,
            mining_protect: true,
            resource_block: false,
            filters_dir: None,
            mining_hosts: Vec::new(),
            custom_css: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config loading and saving
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Loads configuration from the standard locations. Never panics:
    /// returns defaults if no file is found or if parsing fails.
    pub fn load() -> Self {
        match find_config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Invalid config, using defaults");
                Config::default()
            }),
            None => {
                info!("No config file found, using defaults");
                Config::default()
            }
        }
    }

    /// Loads an explicit file; errors are reported, not defaulted.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config = toml::from_str::<Config>(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        info!(path = %path.display(), rules = config.rules.len(), "Configuration loaded");
        Ok(config)
    }

    /// Saves configuration to the platform config directory.
    /// Creates the directory if it doesn't exist.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(&save_path())
    }

    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(path, content)?;
        info!(path = %path.display(), "Configuration saved");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Building components from the snapshot
// ─────────────────────────────────────────────────────────────────────────────

impl Config {
    /// Filter stages enabled by `[filters]`. Malformed resource rules are
    /// dropped and returned.
    pub fn filter_stages(&self) -> (FilterStages, Vec<ConfigError>) {
        let responder = SpeedDialResponder::new(
            &self.general.internal_scheme,
            &self.speed_dial,
            &self.filters.custom_css,
        );

        let (checkers, errors) = if self.filters.resource_block {
            load_checkers(&self.resource_rules)
        } else {
            (Vec::new(), Vec::new())
        };

        let stages = FilterStages {
            responder: Some(Arc::new(responder)),
            ad_block: if self.filters.ad_block {
                self.filters.current_ad_block_rules()
            } else {
                None
            },
            mining: if self.filters.mining_protect {
                self.filters.current_mining_list()
            } else {
                None
            },
            checkers,
        };
        (stages, errors)
    }

    pub fn filter_chain(&self) -> (FilterChain, Vec<ConfigError>) {
        let (stages, errors) = self.filter_stages();
        (FilterChain::new(stages), errors)
    }
}

/// Re-reads the lists on every call; meant for reloads, not per request.
impl FilterDataProvider for FiltersConfig {
    fn current_ad_block_rules(&self) -> Option<Arc<AdBlockSnapshot>> {
        AdBlockSnapshot::from_dir(self.filters_dir.as_deref()).map(Arc::new)
    }

    fn current_mining_list(&self) -> Option<Arc<MiningList>> {
        Some(Arc::new(MiningList::with_extra_hosts(&self.mining_hosts)))
    }
}

/// Searches for a config file in the standard locations.
fn find_config_path() -> Option<PathBuf> {
    // 1. Explicit env var override
    if let Ok(path) = std::env::var("SURIBROWS_NAV_CONFIG") {
        let p = PathBuf::from(path);
        if p.is_file() {
            return Some(p);
        }
    }

    // 2. Next to the executable
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        let p = dir.join("config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // 3. Platform config directory
    if let Some(p) = platform_config_dir().map(|dir| dir.join("nav.toml"))
        && p.is_file()
    {
        return Some(p);
    }

    // 4. Current working directory
    let p = PathBuf::from("config.toml");
    if p.is_file() {
        return Some(p);
    }

    None
}

/// Returns the platform-specific save path for the config file.
fn save_path() -> PathBuf {
    platform_config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("nav.toml")
}

/// Returns the platform config directory without adding a dependency.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(windows)]
    {
        std::env::var("APPDATA")
            .ok()
            .map(|appdata| PathBuf::from(appdata).join("SuriBrows"))
    }
    #[cfg(not(windows))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| format!("{h}/.config")))
            .map(|dir| PathBuf::from(dir).join("suribrows"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleAction;

    #[test]
    fn test_default_values() {
        let c = Config::default();
        assert_eq!(c.general.internal_scheme, "suri");
        assert_eq!(c.general.home_page, "suri:speeddial");
        assert_eq!(c.navigation.link, RoutingPreference::CurrentTab);
        assert_eq!(c.navigation.blank_window, RoutingPreference::NewForeground);
        assert!(!c.navigation.share_unknown_scheme);
        assert!(c.filters.ad_block);
        assert!(c.filters.mining_protect);
        assert!(!c.filters.resource_block);
        assert!(c.rules.is_empty());
    }

    #[test]
    fn test_empty_toml_returns_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml = r#"
[navigation]
link = "new_background"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.navigation.link, RoutingPreference::NewBackground);
        assert_eq!(config.navigation.speed_dial, RoutingPreference::CurrentTab); // default
        assert!(config.filters.ad_block); // default
    }

    #[test]
    fn test_rules_section_parses_in_order() {
        let toml = r#"
[[rules]]
id = "nojs"
pattern = "*.news.test"
action = { type = "apply_settings", settings = { javascript = false } }

[[rules]]
id = "video"
pattern = "[^https://video\\.test/watch]"
action = { type = "open_in_external_app", app = { package = "com.video" } }

[[rules]]
id = "ban"
pattern = "bad.test"
enabled = false
action = { type = "block" }
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let ids: Vec<&str> = config.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["nojs", "video", "ban"]);
        assert!(matches!(config.rules[2].action, RuleAction::Block));
        assert!(!config.rules[2].enabled);
    }

    #[test]
    fn test_full_toml_roundtrip() {
        let mut config = Config::default();
        config.speed_dial.push(SpeedDial {
            title: "Example".into(),
            url: "https://example.com/".into(),
        });
        config.filters.mining_hosts.push("pool.test".into());
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_filter_stages_follow_toggles() {
        let mut config = Config::default();
        config.filters.ad_block = false;
        config.filters.mining_protect = false;
        config.filters.resource_block = true;
        config.resource_rules = vec![ResourceRuleDefinition {
            pattern: "[(".into(),
            action: crate::resblock::ResourceAction::EmptyText,
            enabled: true,
        }];

        let (stages, errors) = config.filter_stages();
        assert!(stages.responder.is_some());
        assert!(stages.ad_block.is_none());
        assert!(stages.mining.is_none());
        assert!(stages.checkers.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_mining_provider_includes_extra_hosts() {
        let filters = FiltersConfig {
            mining_hosts: vec!["pool.test".into()],
            ..FiltersConfig::default()
        };
        let list = filters.current_mining_list().unwrap();
        assert!(list.is_block(None, &url::Url::parse("https://pool.test/m.js").unwrap()));
    }

    #[test]
    fn test_load_from_reports_errors() {
        let missing = std::env::temp_dir().join("suribrows-nav-missing.toml");
        assert!(matches!(
            Config::load_from(&missing),
            Err(ConfigError::Unreadable { .. })
        ));

        let bad = std::env::temp_dir().join(format!("suribrows-nav-bad-{}.toml", std::process::id()));
        fs::write(&bad, "[navigation]\nlink = \"sideways\"\n").unwrap();
        assert!(matches!(Config::load_from(&bad), Err(ConfigError::Parse(_))));
        fs::remove_file(&bad).unwrap();
    }

    #[test]
    fn test_save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("suribrows-nav-save-{}", std::process::id()))
            .join("nav.toml");
        let mut config = Config::default();
        config.general.home_page = "https://home.test/".into();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_save_path_not_empty() {
        let path = save_path();
        assert!(!path.as_os_str().is_empty());
    }
}
