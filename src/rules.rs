//! Ordered pattern rules and their evaluation against a navigation.
//!
//! List order is priority. `ApplySettings` matches never stop the scan;
//! the first consuming match (`OpenInExternalApp`, `Block`) does. A rule
//! set is immutable once built and is replaced wholesale through
//! [`RuleSetHandle`] on reload.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{ConfigError, InvariantViolation};
use crate::host::{AppLauncher, Renderer, TabContext};
use crate::intent::{FLAG_NEW_TASK, IntentSpec};
use crate::pattern::PatternMatcher;
use crate::snapshot::{SettingsDelta, SettingsSnapshotGuard};

/// Which external application a rule hands matching URLs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSpec {
    pub package: Option<String>,
    pub component: Option<String>,
}

impl AppSpec {
    fn intent_for(&self, url: &Url) -> IntentSpec {
        let mut intent = IntentSpec::view(url);
        intent.package.clone_from(&self.package);
        intent.component.clone_from(&self.component);
        intent.add_flags(FLAG_NEW_TASK);
        intent
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Overrides tab settings while the tab stays on matching URLs.
    ApplySettings { settings: SettingsDelta },
    /// Hands the navigation to an external app and prevents the load.
    OpenInExternalApp {
        #[serde(default)]
        app: AppSpec,
    },
    /// Cancels the navigation.
    Block,
}

/// A rule as stored by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub pattern: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub action: RuleAction,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: String,
    pub matcher: PatternMatcher,
    pub action: RuleAction,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleEffect {
    LaunchedExternalApp(IntentSpec),
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Consumed { rule_id: String, effect: RuleEffect },
    SettingsChanged,
    NotConsumed,
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<PatternRule>,
}

impl RuleSet {
    /// Compiles `definitions`, dropping (and logging) the malformed ones.
    pub fn load(definitions: &[RuleDefinition]) -> (Self, Vec<ConfigError>) {
        let mut rules = Vec::with_capacity(definitions.len());
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for def in definitions {
            if !seen.insert(def.id.as_str()) {
                let err = ConfigError::DuplicateRule { id: def.id.clone() };
                warn!(error = %err, "rule dropped");
                errors.push(err);
                continue;
            }
            match PatternMatcher::compile(&def.id, &def.pattern) {
                Ok(matcher) => rules.push(PatternRule {
                    id: def.id.clone(),
                    matcher,
                    action: def.action.clone(),
                    enabled: def.enabled,
                }),
                Err(err) => {
                    warn!(error = %err, "rule dropped");
                    errors.push(err);
                }
            }
        }

        info!(
            loaded = rules.len(),
            dropped = errors.len(),
            "pattern rules compiled"
        );
        (Self { rules }, errors)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Evaluates the rules for a navigation of `tab` to `url`.
    ///
    /// `opening_in_new_tab` is set when the caller is only checking whether
    /// the URL may be opened in a new tab: external-app rules are skipped.
    pub fn evaluate<H>(
        &self,
        url: &Url,
        tab: &TabContext,
        opening_in_new_tab: bool,
        guard: &mut SettingsSnapshotGuard,
        host: &mut H,
    ) -> Result<RuleOutcome, InvariantViolation>
    where
        H: Renderer + AppLauncher + ?Sized,
    {
        let mut settings_matched = false;

        for rule in self
            .rules
            .iter()
            .filter(|r| r.enabled && r.matcher.is_match(url))
        {
            match &rule.action {
                RuleAction::ApplySettings { settings } => {
                    settings_matched = true;
                    if guard.is_owned_by(&rule.id) {
                        continue;
                    }
                    guard.claim(host, tab.id, &rule.id, settings)?;
                    debug!(tab = %tab.id, rule = %rule.id, url = %url, "settings rule applied");
                }
                RuleAction::OpenInExternalApp { .. } if opening_in_new_tab => continue,
                RuleAction::OpenInExternalApp { app } => {
                    let intent = app.intent_for(url);
                    match host.launch(&intent) {
                        Ok(()) => {
                            info!(rule = %rule.id, url = %url, "navigation handed to external app");
                            return Ok(RuleOutcome::Consumed {
                                rule_id: rule.id.clone(),
                                effect: RuleEffect::LaunchedExternalApp(intent),
                            });
                        }
                        Err(err) => {
                            warn!(rule = %rule.id, url = %url, error = %err, "external app rule could not launch");
                        }
                    }
                }
                RuleAction::Block => {
                    info!(rule = %rule.id, url = %url, "navigation blocked by rule");
                    return Ok(RuleOutcome::Consumed {
                        rule_id: rule.id.clone(),
                        effect: RuleEffect::Blocked,
                    });
                }
            }
        }

        if settings_matched {
            return Ok(RuleOutcome::SettingsChanged);
        }

        if guard.release(host, tab.id)? {
            debug!(tab = %tab.id, url = %url, "no settings rule matches, tab settings restored");
        }
        Ok(RuleOutcome::NotConsumed)
    }
}

/// Shared, atomically replaceable rule set.
#[derive(Debug)]
pub struct RuleSetHandle {
    current: ArcSwap<RuleSet>,
}

impl RuleSetHandle {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: ArcSwap::from_pointee(rules),
        }
    }

    /// The snapshot to use for one whole evaluation.
    pub fn load(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    pub fn replace(&self, rules: RuleSet) {
        info!(rules = rules.len(), "pattern rule set replaced");
        self.current.store(Arc::new(rules));
    }
}

impl Default for RuleSetHandle {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}
