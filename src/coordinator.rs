//! Navigation coordinator.
//!
//! Runs one navigation at a time per tab on the UI thread:
//! scheme routing, then the pattern rules, then tab placement. It owns the
//! per-tab settings snapshot guards; nothing else touches them.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{ConfigError, ExternalAppError, NavError, NavResult};
use crate::events::{HistoryDirection, NavigationEvent, QueuedEvent, TabEventQueue};
use crate::host::{BrowserHost, TabContext, TabId, UserNotice};
use crate::routing::{
    NavigationTarget, RoutingPreference, RoutingPreferences, TabRoutingPolicy, map_preference,
};
use crate::rules::{RuleEffect, RuleOutcome, RuleSet, RuleSetHandle};
use crate::scheme::{SchemeDispatch, SchemeOutcome, SchemeRouter};
use crate::snapshot::SettingsSnapshotGuard;

/// Scheme redirects followed for one navigation (home page, intent fallbacks).
const MAX_REDIRECTS: usize = 4;

/// What took over a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consumption {
    Scheme(SchemeDispatch),
    Rule { rule_id: String, effect: RuleEffect },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    /// The tab loads this URL itself (possibly rewritten from the request).
    LoadInPlace(Url),
    OpenedElsewhere {
        target: NavigationTarget,
        tab: TabId,
        /// The originating tab was empty and has been closed.
        closed_origin: bool,
    },
    Consumed(Consumption),
    /// Let the renderer step through its own history.
    StepInPlace(HistoryDirection),
    /// Nothing happens; the current page stays.
    Stay,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// Link, redirect or script navigation reported by the renderer.
    Renderer,
    /// Address bar, bookmark, home button.
    User { opening_in_new_tab: bool },
}

/// Result of scheme routing on a path that skips the rules.
enum Dispatched {
    /// Nothing took the URL; open it (possibly rewritten by a redirect).
    Open(Url),
    Decided(NavigationDecision),
}

#[derive(Debug)]
pub struct NavigationCoordinator {
    rules: Arc<RuleSetHandle>,
    schemes: SchemeRouter,
    routing: TabRoutingPolicy,
    preferences: RoutingPreferences,
    guards: HashMap<TabId, SettingsSnapshotGuard>,
}

impl NavigationCoordinator {
    pub fn new(
        rules: Arc<RuleSetHandle>,
        schemes: SchemeRouter,
        routing: TabRoutingPolicy,
        preferences: RoutingPreferences,
    ) -> Self {
        Self {
            rules,
            schemes,
            routing,
            preferences,
            guards: HashMap::new(),
        }
    }

    /// Handle shared with whoever reloads the rules.
    pub fn rules(&self) -> &Arc<RuleSetHandle> {
        &self.rules
    }

    pub fn replace_rules(&self, rules: RuleSet) {
        self.rules.replace(rules);
    }

    pub fn preferences(&self) -> RoutingPreferences {
        self.preferences
    }

    pub fn set_preferences(&mut self, preferences: RoutingPreferences) {
        self.preferences = preferences;
    }

    /// `true` while a settings rule overrides `tab`.
    pub fn has_settings_override(&self, tab: TabId) -> bool {
        self.guards.get(&tab).is_some_and(SettingsSnapshotGuard::is_active)
    }

    pub fn handle<H>(&mut self, host: &mut H, queued: QueuedEvent) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        let tab = queued.tab;
        match queued.event {
            NavigationEvent::NavigationRequested { url } => self.on_navigation_request(host, tab, &url),
            NavigationEvent::LoadUrl {
                url,
                opening_in_new_tab,
            } => self.load_url(host, tab, &url, opening_in_new_tab),
            NavigationEvent::LoadWithTarget { url, preference } => {
                self.load_with_target(host, tab, &url, preference)
            }
            NavigationEvent::HistoryStep { direction, entry } => {
                self.history_step(host, tab, direction, entry.as_ref())
            }
            NavigationEvent::NewWindow { url } => self.new_window(host, tab, &url),
            NavigationEvent::TabClosed => {
                self.tab_closed(tab);
                Ok(NavigationDecision::Closed)
            }
        }
    }

    /// Handles every queued event, oldest first.
    pub fn drain<H>(
        &mut self,
        host: &mut H,
        queue: &mut TabEventQueue,
    ) -> Vec<(TabId, NavResult<NavigationDecision>)>
    where
        H: BrowserHost + ?Sized,
    {
        let mut results = Vec::new();
        while let Some(queued) = queue.pop_next() {
            let tab = queued.tab;
            let result = self.handle(host, queued);
            if let Err(e) = &result {
                error!(tab = %tab, error = %e, "navigation aborted");
            }
            results.push((tab, result));
        }
        results
    }

    /// A navigation the renderer is about to perform.
    pub fn on_navigation_request<H>(
        &mut self,
        host: &mut H,
        tab: TabId,
        url: &Url,
    ) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        self.navigate(host, tab, url.clone(), Origin::Renderer, 0)
    }

    /// Explicit load requested by the user.
    pub fn load_url<H>(
        &mut self,
        host: &mut H,
        tab: TabId,
        url: &Url,
        opening_in_new_tab: bool,
    ) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        self.navigate(host, tab, url.clone(), Origin::User { opening_in_new_tab }, 0)
    }

    /// Load with a target the user chose. `CurrentTab`, or a URL the user
    /// exemption keeps in place, goes through [`Self::load_url`].
    pub fn load_with_target<H>(
        &mut self,
        host: &mut H,
        tab: TabId,
        url: &Url,
        preference: RoutingPreference,
    ) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        let context = self.context(host, tab)?;
        if preference != RoutingPreference::CurrentTab
            && self.routing.exemption(&context, url, true).is_none()
        {
            let target = map_preference(preference, context.index);
            return Ok(self.open_elsewhere(host, &context, target, url, false));
        }
        self.load_url(host, tab, url, false)
    }

    pub fn history_step<H>(
        &mut self,
        host: &mut H,
        tab: TabId,
        direction: HistoryDirection,
        entry: Option<&Url>,
    ) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        let context = self.context(host, tab)?;
        match (self.routing.history_step(&context, entry), entry) {
            (Some(target), Some(entry)) => {
                debug!(tab = %tab, ?direction, url = %entry, "nav-locked history step opens a tab");
                Ok(self.open_elsewhere(host, &context, target, entry, false))
            }
            _ => Ok(NavigationDecision::StepInPlace(direction)),
        }
    }

    /// Window opened by the page (`window.open`, `target=_blank`).
    pub fn new_window<H>(&mut self, host: &mut H, tab: TabId, url: &Url) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        let context = self.context(host, tab)?;
        let url = match self.dispatch_scheme(host, tab, url) {
            Dispatched::Open(url) => url,
            Dispatched::Decided(decision) => return Ok(decision),
        };
        match self.preferences.blank_window {
            RoutingPreference::CurrentTab => Ok(NavigationDecision::LoadInPlace(url)),
            preference => {
                let target = map_preference(preference, context.index);
                Ok(self.open_elsewhere(host, &context, target, &url, false))
            }
        }
    }

    /// Drops the tab's snapshot; its settings die with it.
    pub fn tab_closed(&mut self, tab: TabId) {
        if self.guards.remove(&tab).is_some_and(|g| g.is_active()) {
            debug!(tab = %tab, "settings snapshot discarded with its tab");
        }
    }

    fn navigate<H>(
        &mut self,
        host: &mut H,
        tab: TabId,
        url: Url,
        origin: Origin,
        depth: usize,
    ) -> NavResult<NavigationDecision>
    where
        H: BrowserHost + ?Sized,
    {
        let context = self.context(host, tab)?;

        if let Origin::User { .. } = origin
            && context.nav_locked
            && self.routing.exemption(&context, &url, true).is_none()
        {
            let target = NavigationTarget::NewForegroundRightOf(context.index);
            return Ok(self.open_elsewhere(host, &context, target, &url, false));
        }

        match self.schemes.route(&url, host) {
            SchemeOutcome::Continue => {}
            SchemeOutcome::Consumed(dispatch) => {
                self.present(host, tab, &dispatch);
                return Ok(NavigationDecision::Consumed(Consumption::Scheme(dispatch)));
            }
            SchemeOutcome::Redirect(next) => {
                if depth >= MAX_REDIRECTS {
                    warn!(tab = %tab, url = %next, "too many scheme redirects, navigation dropped");
                    return Ok(NavigationDecision::Stay);
                }
                debug!(tab = %tab, from = %url, to = %next, "scheme redirect");
                return self.navigate(host, tab, next, origin, depth + 1);
            }
        }

        let opening_in_new_tab = matches!(origin, Origin::User { opening_in_new_tab: true });
        let rules = self.rules.load();
        let guard = self
            .guards
            .entry(tab)
            .or_insert_with(|| SettingsSnapshotGuard::new(tab));
        let outcome = rules
            .evaluate(&url, &context, opening_in_new_tab, guard, host)
            .inspect_err(|e| error!(tab = %tab, url = %url, error = %e, "rule evaluation aborted"))?;

        if let RuleOutcome::Consumed { rule_id, effect } = outcome {
            if effect == RuleEffect::Blocked {
                let pattern = rules
                    .rules()
                    .iter()
                    .find(|r| r.id == rule_id)
                    .map(|r| r.matcher.source().to_string());
                host.notify(UserNotice::PageBlocked {
                    url: url.clone(),
                    pattern,
                });
            }
            if origin == Origin::Renderer {
                self.close_if_fresh(host, &context);
            }
            return Ok(NavigationDecision::Consumed(Consumption::Rule { rule_id, effect }));
        }

        match origin {
            Origin::Renderer => {
                let preference = self.routing.preference_for(&context, &self.preferences);
                match self.routing.decide(preference, &context, &url, context.user_gesture) {
                    Some(target) => Ok(self.open_elsewhere(host, &context, target, &url, true)),
                    None => Ok(NavigationDecision::LoadInPlace(url)),
                }
            }
            Origin::User { .. } => {
                host.load_url(tab, &url);
                Ok(NavigationDecision::LoadInPlace(url))
            }
        }
    }

    /// Scheme routing alone, for paths that skip the rules. Redirects are
    /// followed up to [`MAX_REDIRECTS`].
    fn dispatch_scheme<H>(&mut self, host: &mut H, tab: TabId, url: &Url) -> Dispatched
    where
        H: BrowserHost + ?Sized,
    {
        let mut current = url.clone();
        for _ in 0..=MAX_REDIRECTS {
            match self.schemes.route(&current, host) {
                SchemeOutcome::Continue => return Dispatched::Open(current),
                SchemeOutcome::Consumed(dispatch) => {
                    self.present(host, tab, &dispatch);
                    return Dispatched::Decided(NavigationDecision::Consumed(Consumption::Scheme(
                        dispatch,
                    )));
                }
                SchemeOutcome::Redirect(next) => {
                    debug!(tab = %tab, from = %current, to = %next, "scheme redirect");
                    current = next;
                }
            }
        }
        warn!(tab = %tab, url = %current, "too many scheme redirects, navigation dropped");
        Dispatched::Decided(NavigationDecision::Stay)
    }

    fn present<H>(&self, host: &mut H, tab: TabId, dispatch: &SchemeDispatch)
    where
        H: BrowserHost + ?Sized,
    {
        match dispatch {
            SchemeDispatch::Internal(destination) => host.open_internal(tab, destination),
            SchemeDispatch::ExternalApp(_) => {}
            SchemeDispatch::ExternalAppFailed(ExternalAppError::NotFound) => {
                host.notify(UserNotice::AppNotFound);
            }
            SchemeDispatch::ExternalAppFailed(ExternalAppError::SecurityDenied) => {
                warn!(tab = %tab, "external app launch denied, page kept");
            }
        }
    }

    fn open_elsewhere<H>(
        &mut self,
        host: &mut H,
        context: &TabContext,
        target: NavigationTarget,
        url: &Url,
        close_fresh_origin: bool,
    ) -> NavigationDecision
    where
        H: BrowserHost + ?Sized,
    {
        let closed_origin = close_fresh_origin && self.close_if_fresh(host, context);
        let tab = host.open_tab(target, url);
        info!(from = %context.id, tab = %tab, ?target, url = %url, "navigation opened elsewhere");
        NavigationDecision::OpenedElsewhere {
            target,
            tab,
            closed_origin,
        }
    }

    /// Closes a tab that never showed anything, so no blank tab is left.
    fn close_if_fresh<H>(&mut self, host: &mut H, context: &TabContext) -> bool
    where
        H: BrowserHost + ?Sized,
    {
        let tab = context.id;
        if host.navigation_history_empty(tab) && !host.pending_load_visible(tab) {
            host.close_tab(tab);
            self.tab_closed(tab);
            true
        } else {
            false
        }
    }

    fn context<H>(&self, host: &H, tab: TabId) -> NavResult<TabContext>
    where
        H: BrowserHost + ?Sized,
    {
        let mut context = host.tab_context(tab).ok_or(NavError::UnknownTab(tab.0))?;
        // The renderer knows about redirects the tab strip has not seen yet.
        if let Some(current) = host.current_url(tab) {
            context.current_url = Some(current);
        }
        context.user_gesture = host.current_gesture_is_user();
        Ok(context)
    }
}

/// Rule set, routers and preferences from a configuration snapshot.
impl NavigationCoordinator {
    pub fn from_config(config: &crate::config::Config) -> (Self, Vec<ConfigError>) {
        let (rules, errors) = RuleSet::load(&config.rules);
        let coordinator = Self::new(
            Arc::new(RuleSetHandle::new(rules)),
            SchemeRouter::new(
                &config.general.internal_scheme,
                config.navigation.share_unknown_scheme,
            ),
            TabRoutingPolicy::new(&config.general.internal_scheme),
            config.navigation.preferences(),
        );
        (coordinator, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Resolution;
    use crate::host::mock::MockHost;
    use crate::rules::{AppSpec, RuleAction, RuleDefinition};
    use crate::scheme::{InternalDestination, SAFE_HOME_PAGE};
    use crate::snapshot::{SettingsDelta, WebSettings};

    const TAB: TabId = TabId(1);

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn coordinator(defs: Vec<RuleDefinition>) -> NavigationCoordinator {
        let (rules, errors) = RuleSet::load(&defs);
        assert!(errors.is_empty());
        NavigationCoordinator::new(
            Arc::new(RuleSetHandle::new(rules)),
            SchemeRouter::new("suri", false),
            TabRoutingPolicy::new("suri"),
            RoutingPreferences::default(),
        )
    }

    fn no_js(id: &str, pattern: &str) -> RuleDefinition {
        RuleDefinition {
            id: id.into(),
            pattern: pattern.into(),
            enabled: true,
            action: RuleAction::ApplySettings {
                settings: SettingsDelta {
                    javascript: Some(false),
                    ..SettingsDelta::default()
                },
            },
        }
    }

    #[test]
    fn test_settings_restored_when_leaving_matching_urls() {
        let mut c = coordinator(vec![no_js("nojs", "*.news.test")]);
        let mut host = MockHost::with_tab(1, "https://start.test/");

        let first = c.on_navigation_request(&mut host, TAB, &url("https://www.news.test/a")).unwrap();
        assert_eq!(first, NavigationDecision::LoadInPlace(url("https://www.news.test/a")));
        assert!(!host.settings(TAB).javascript);
        assert!(c.has_settings_override(TAB));

        c.on_navigation_request(&mut host, TAB, &url("https://other.test/"))
            .unwrap();
        assert_eq!(host.settings(TAB), WebSettings::default());
        assert!(!c.has_settings_override(TAB));
        assert_eq!(host.restore_calls, 1);
    }

    #[test]
    fn test_mailto_without_app_keeps_page() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.resolution = Resolution::NotFound;

        let decision = c.load_url(&mut host, TAB, &url("mailto:a@b.com"), false).unwrap();
        assert_eq!(
            decision,
            NavigationDecision::Consumed(Consumption::Scheme(SchemeDispatch::ExternalAppFailed(
                ExternalAppError::NotFound
            )))
        );
        assert_eq!(host.notices, vec![UserNotice::AppNotFound]);
        assert!(host.loads.is_empty());
        assert!(host.opened.is_empty());
    }

    #[test]
    fn test_security_denied_is_not_shown() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.launch_result = Err(ExternalAppError::SecurityDenied);

        c.load_url(&mut host, TAB, &url("tel:+331234"), false).unwrap();
        assert!(host.notices.is_empty());
    }

    #[test]
    fn test_internal_destination_presented() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        c.on_navigation_request(&mut host, TAB, &url("suri:settings")).unwrap();
        assert_eq!(host.internal, vec![InternalDestination::Settings]);
    }

    #[test]
    fn test_user_gesture_follows_link_preference() {
        let mut c = coordinator(Vec::new());
        c.set_preferences(RoutingPreferences {
            link: RoutingPreference::NewBackground,
            ..RoutingPreferences::default()
        });
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.gesture_is_user = true;

        let decision = c.on_navigation_request(&mut host, TAB, &url("https://b.test/")).unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::OpenedElsewhere {
                target: NavigationTarget::NewBackground,
                closed_origin: false,
                ..
            }
        ));
        assert_eq!(host.opened, vec![(NavigationTarget::NewBackground, url("https://b.test/"))]);
    }

    #[test]
    fn test_automatic_same_url_stays_in_place() {
        let mut c = coordinator(Vec::new());
        c.set_preferences(RoutingPreferences {
            link: RoutingPreference::NewBackground,
            ..RoutingPreferences::default()
        });
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let decision = c.on_navigation_request(&mut host, TAB, &url("https://start.test/")).unwrap();
        assert_eq!(decision, NavigationDecision::LoadInPlace(url("https://start.test/")));
        assert!(host.opened.is_empty());
    }

    #[test]
    fn test_same_url_uses_renderer_committed_url() {
        let mut c = coordinator(Vec::new());
        c.set_preferences(RoutingPreferences {
            link: RoutingPreference::NewBackground,
            ..RoutingPreferences::default()
        });
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.tab_mut(1).committed_url = Some(url("https://moved.test/page"));

        let decision = c
            .on_navigation_request(&mut host, TAB, &url("https://moved.test/page"))
            .unwrap();
        assert_eq!(decision, NavigationDecision::LoadInPlace(url("https://moved.test/page")));
        assert!(host.opened.is_empty());
    }

    #[test]
    fn test_fresh_origin_tab_is_closed() {
        let mut c = coordinator(Vec::new());
        c.set_preferences(RoutingPreferences {
            link: RoutingPreference::NewForeground,
            ..RoutingPreferences::default()
        });
        let mut host = MockHost::with_tab(1, "about:blank");
        host.gesture_is_user = true;
        {
            let tab = host.tab_mut(1);
            tab.context.history_empty = true;
            tab.pending_visible = false;
        }

        let decision = c.on_navigation_request(&mut host, TAB, &url("https://b.test/")).unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::OpenedElsewhere { closed_origin: true, .. }
        ));
        assert_eq!(host.closed, vec![TAB]);
    }

    #[test]
    fn test_nav_locked_user_load_opens_right_of_tab() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.tab_mut(1).context.nav_locked = true;

        let decision = c.load_url(&mut host, TAB, &url("https://x.test/"), false).unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::OpenedElsewhere {
                target: NavigationTarget::NewForegroundRightOf(0),
                ..
            }
        ));
        assert!(host.loads.is_empty());
    }

    #[test]
    fn test_user_load_goes_to_renderer() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        c.load_url(&mut host, TAB, &url("https://x.test/"), false).unwrap();
        assert_eq!(host.loads, vec![(TAB, url("https://x.test/"))]);
    }

    #[test]
    fn test_block_rule_notifies_with_pattern() {
        let mut c = coordinator(vec![RuleDefinition {
            id: "ban".into(),
            pattern: "bad.test".into(),
            enabled: true,
            action: RuleAction::Block,
        }]);
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let decision = c.on_navigation_request(&mut host, TAB, &url("https://bad.test/")).unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::Consumed(Consumption::Rule { ref rule_id, effect: RuleEffect::Blocked })
                if rule_id == "ban"
        ));
        assert_eq!(
            host.notices,
            vec![UserNotice::PageBlocked {
                url: url("https://bad.test/"),
                pattern: Some("bad.test".into()),
            }]
        );
    }

    #[test]
    fn test_external_rule_skipped_when_opening_in_new_tab() {
        let mut c = coordinator(vec![RuleDefinition {
            id: "app".into(),
            pattern: "video.test".into(),
            enabled: true,
            action: RuleAction::OpenInExternalApp {
                app: AppSpec::default(),
            },
        }]);
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let decision = c.load_url(&mut host, TAB, &url("https://video.test/v"), true).unwrap();
        assert_eq!(decision, NavigationDecision::LoadInPlace(url("https://video.test/v")));
        assert!(host.launches.is_empty());

        let decision = c.load_url(&mut host, TAB, &url("https://video.test/v"), false).unwrap();
        assert!(matches!(decision, NavigationDecision::Consumed(Consumption::Rule { .. })));
        assert_eq!(host.launches.len(), 1);
    }

    #[test]
    fn test_looping_home_page_self_heals() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.home_page = "SURI:home".into();

        let decision = c.load_url(&mut host, TAB, &url("suri:home"), false).unwrap();
        assert_eq!(decision, NavigationDecision::LoadInPlace(url(SAFE_HOME_PAGE)));
        assert_eq!(host.persisted_home, vec![SAFE_HOME_PAGE.to_string()]);
        assert_eq!(host.loads, vec![(TAB, url(SAFE_HOME_PAGE))]);
    }

    fn escape_extra(s: &str) -> String {
        s.replace('%', "%25")
            .replace(';', "%3B")
            .replace('#', "%23")
            .replace('=', "%3D")
    }

    #[test]
    fn test_redirect_chain_is_bounded() {
        let mut target = "https://final.test/".to_string();
        for level in 0..6 {
            target = format!(
                "intent://hop{level}#Intent;scheme=app;S.browser_fallback_url={};end",
                escape_extra(&target)
            );
        }
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.resolution = Resolution::NotFound;

        let decision = c.load_url(&mut host, TAB, &url(&target), false).unwrap();
        assert_eq!(decision, NavigationDecision::Stay);
        assert!(host.loads.is_empty());
    }

    #[test]
    fn test_intent_fallback_loads() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.resolution = Resolution::NotFound;
        let intent = url("intent://scan/#Intent;scheme=zxing;S.browser_fallback_url=https%3A%2F%2Fdl.test%2F;end");

        let decision = c.on_navigation_request(&mut host, TAB, &intent).unwrap();
        assert_eq!(decision, NavigationDecision::LoadInPlace(url("https://dl.test/")));
    }

    #[test]
    fn test_load_with_target() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/page");

        let decision = c
            .load_with_target(&mut host, TAB, &url("https://x.test/"), RoutingPreference::NewBackgroundRightOfCurrent)
            .unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::OpenedElsewhere {
                target: NavigationTarget::NewBackgroundRightOf(0),
                ..
            }
        ));

        // Fragment-only change stays in place even with an explicit target.
        let decision = c
            .load_with_target(&mut host, TAB, &url("https://start.test/page#top"), RoutingPreference::NewForeground)
            .unwrap();
        assert!(matches!(decision, NavigationDecision::LoadInPlace(_)));
    }

    #[test]
    fn test_history_step() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let back = url("https://prev.test/");

        assert_eq!(
            c.history_step(&mut host, TAB, HistoryDirection::Back, Some(&back)).unwrap(),
            NavigationDecision::StepInPlace(HistoryDirection::Back)
        );

        host.tab_mut(1).context.nav_locked = true;
        let decision = c.history_step(&mut host, TAB, HistoryDirection::Back, Some(&back)).unwrap();
        assert!(matches!(decision, NavigationDecision::OpenedElsewhere { .. }));
        assert_eq!(host.opened, vec![(NavigationTarget::NewForegroundRightOf(0), back)]);
    }

    #[test]
    fn test_new_window_uses_blank_window_preference() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let decision = c.new_window(&mut host, TAB, &url("https://popup.test/")).unwrap();
        assert!(matches!(
            decision,
            NavigationDecision::OpenedElsewhere {
                target: NavigationTarget::NewForeground,
                ..
            }
        ));
    }

    #[test]
    fn test_new_window_follows_intent_fallback() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.resolution = Resolution::NotFound;
        let intent = url("intent://scan/#Intent;scheme=zxing;S.browser_fallback_url=https%3A%2F%2Fdl.test%2F;end");

        let decision = c.new_window(&mut host, TAB, &intent).unwrap();
        assert!(matches!(decision, NavigationDecision::OpenedElsewhere { .. }));
        assert_eq!(
            host.opened,
            vec![(NavigationTarget::NewForeground, url("https://dl.test/"))]
        );
    }

    #[test]
    fn test_new_window_to_home_opens_configured_page() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        host.home_page = "https://home.test/".into();

        c.new_window(&mut host, TAB, &url("suri:home")).unwrap();
        assert_eq!(
            host.opened,
            vec![(NavigationTarget::NewForeground, url("https://home.test/"))]
        );
    }

    #[test]
    fn test_unknown_tab_is_an_error() {
        let mut c = coordinator(Vec::new());
        let mut host = MockHost::with_tab(1, "https://start.test/");
        assert_eq!(
            c.on_navigation_request(&mut host, TabId(9), &url("https://x.test/")),
            Err(NavError::UnknownTab(9))
        );
    }

    #[test]
    fn test_queue_drain_applies_only_latest_navigation() {
        let mut c = coordinator(vec![no_js("nojs", "slow.test")]);
        let mut host = MockHost::with_tab(1, "https://start.test/");
        let mut queue = TabEventQueue::new();
        queue.push(
            TAB,
            NavigationEvent::NavigationRequested {
                url: url("https://slow.test/"),
            },
        );
        queue.push(
            TAB,
            NavigationEvent::NavigationRequested {
                url: url("https://fast.test/"),
            },
        );

        let results = c.drain(&mut host, &mut queue);
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].1,
            Ok(NavigationDecision::LoadInPlace(url("https://fast.test/")))
        );
        assert!(host.settings(TAB).javascript);
        assert!(!c.has_settings_override(TAB));
    }

    #[test]
    fn test_tab_closed_discards_snapshot() {
        let mut c = coordinator(vec![no_js("nojs", "news.test")]);
        let mut host = MockHost::with_tab(1, "https://start.test/");
        c.on_navigation_request(&mut host, TAB, &url("https://news.test/")).unwrap();
        assert!(c.has_settings_override(TAB));

        let mut queue = TabEventQueue::new();
        queue.push(TAB, NavigationEvent::TabClosed);
        let results = c.drain(&mut host, &mut queue);
        assert_eq!(results[0].1, Ok(NavigationDecision::Closed));
        assert!(!c.has_settings_override(TAB));
    }
}
