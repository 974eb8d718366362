//! Tab-scoped web settings and the snapshot that rolls rule overrides back.
//!
//! A tab owns at most one [`SettingsSnapshot`]. It is created lazily the
//! first time an `ApplySettings` rule claims the tab, handed from rule to
//! rule without an intermediate restore, and released (restoring the
//! recorded values) once no rule claims the tab any more.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::InvariantViolation;
use crate::host::{Renderer, TabId};

/// The renderer settings a rule may override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub javascript: bool,
    pub load_images: bool,
    pub accept_cookies: bool,
    pub dom_storage: bool,
    pub geolocation: bool,
    pub wide_viewport: bool,
    pub text_zoom: u16,
    pub user_agent: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            javascript: true,
            load_images: true,
            accept_cookies: true,
            dom_storage: true,
            geolocation: false,
            wide_viewport: true,
            text_zoom: 100,
            user_agent: String::new(),
        }
    }
}

/// A partial set of settings. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_cookies: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_storage: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wide_viewport: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_zoom: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl SettingsDelta {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Copies every field set in `other` that is still `None` here.
    pub fn fill_missing_from(&mut self, other: &SettingsDelta) {
        fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }
        fill(&mut self.javascript, &other.javascript);
        fill(&mut self.load_images, &other.load_images);
        fill(&mut self.accept_cookies, &other.accept_cookies);
        fill(&mut self.dom_storage, &other.dom_storage);
        fill(&mut self.geolocation, &other.geolocation);
        fill(&mut self.wide_viewport, &other.wide_viewport);
        fill(&mut self.text_zoom, &other.text_zoom);
        fill(&mut self.user_agent, &other.user_agent);
    }
}

impl WebSettings {
    /// Applies `delta` and returns the previous values of the touched fields.
    pub fn apply(&mut self, delta: &SettingsDelta) -> SettingsDelta {
        fn swap<T: Clone>(field: &mut T, value: &Option<T>) -> Option<T> {
            value
                .as_ref()
                .map(|v| std::mem::replace(field, v.clone()))
        }
        SettingsDelta {
            javascript: swap(&mut self.javascript, &delta.javascript),
            load_images: swap(&mut self.load_images, &delta.load_images),
            accept_cookies: swap(&mut self.accept_cookies, &delta.accept_cookies),
            dom_storage: swap(&mut self.dom_storage, &delta.dom_storage),
            geolocation: swap(&mut self.geolocation, &delta.geolocation),
            wide_viewport: swap(&mut self.wide_viewport, &delta.wide_viewport),
            text_zoom: swap(&mut self.text_zoom, &delta.text_zoom),
            user_agent: swap(&mut self.user_agent, &delta.user_agent),
        }
    }

    pub fn restore(&mut self, prior: &SettingsDelta) {
        self.apply(prior);
    }
}

/// Which rule currently overrides a tab's settings, and what to put back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    pub tab: TabId,
    pub rule_id: String,
    pub prior: SettingsDelta,
}

/// Per-tab owner of the optional [`SettingsSnapshot`].
#[derive(Debug)]
pub struct SettingsSnapshotGuard {
    tab: TabId,
    active: Option<SettingsSnapshot>,
}

impl SettingsSnapshotGuard {
    pub fn new(tab: TabId) -> Self {
        Self { tab, active: None }
    }

    pub fn tab(&self) -> TabId {
        self.tab
    }

    pub fn active(&self) -> Option<&SettingsSnapshot> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// `true` if `rule_id` is the rule whose override is in effect.
    pub fn is_owned_by(&self, rule_id: &str) -> bool {
        self.active.as_ref().is_some_and(|s| s.rule_id == rule_id)
    }

    /// Hands the tab's settings to `rule_id` and applies `delta`.
    ///
    /// The recorded prior values always describe the tab before the first
    /// claim: on a rule-to-rule transfer only the fields the new rule touches
    /// for the first time are added.
    pub fn claim<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        tab: TabId,
        rule_id: &str,
        delta: &SettingsDelta,
    ) -> Result<(), InvariantViolation> {
        self.check_tab(tab)?;
        let returned = renderer.apply_settings_delta(tab, delta);
        match &mut self.active {
            Some(snapshot) => {
                debug!(tab = %tab, from = %snapshot.rule_id, to = rule_id, "settings ownership transferred");
                snapshot.prior.fill_missing_from(&returned);
                snapshot.rule_id = rule_id.to_string();
            }
            None => {
                debug!(tab = %tab, rule = rule_id, "settings snapshot created");
                self.active = Some(SettingsSnapshot {
                    tab,
                    rule_id: rule_id.to_string(),
                    prior: returned,
                });
            }
        }
        Ok(())
    }

    /// Restores the recorded values and clears the snapshot.
    /// Returns `false` when there was nothing to restore.
    pub fn release<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        tab: TabId,
    ) -> Result<bool, InvariantViolation> {
        self.check_tab(tab)?;
        let Some(snapshot) = self.active.take() else {
            return Ok(false);
        };
        renderer.restore_settings(tab, &snapshot.prior);
        debug!(tab = %tab, rule = %snapshot.rule_id, "settings restored");
        Ok(true)
    }

    fn check_tab(&self, tab: TabId) -> Result<(), InvariantViolation> {
        if self.tab != tab {
            return Err(InvariantViolation::SnapshotOwnedByOtherTab {
                owner: self.tab.0,
                tab: tab.0,
            });
        }
        Ok(())
    }
}
