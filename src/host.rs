//! Interfaces consumed from the embedding browser.
//!
//! The core never renders, presents UI or persists anything itself; it
//! drives these narrow traits. A browser implements them once and hands
//! itself to the [`crate::coordinator::NavigationCoordinator`] as a
//! [`BrowserHost`].

use std::fmt;

use url::Url;

use crate::error::ExternalAppError;
use crate::intent::IntentSpec;
use crate::routing::NavigationTarget;
use crate::scheme::InternalDestination;
use crate::snapshot::SettingsDelta;

/// Identity of a tab, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TabId(pub u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of a tab, taken at the start of a navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabContext {
    pub id: TabId,
    /// Position in the tab strip, used for the "right of" targets.
    pub index: usize,
    pub current_url: Option<Url>,
    pub original_url: Option<Url>,
    pub nav_locked: bool,
    /// The navigation being evaluated comes from a user gesture.
    pub user_gesture: bool,
    /// The tab has no back/forward entries yet.
    pub history_empty: bool,
}

impl TabContext {
    pub fn new(id: TabId, index: usize) -> Self {
        Self {
            id,
            index,
            current_url: None,
            original_url: None,
            nav_locked: false,
            user_gesture: false,
            history_empty: true,
        }
    }
}

/// Whether an app able to handle an intent is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved,
    NotFound,
}

/// User-visible conditions the core reports. Everything else stays silent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNotice {
    AppNotFound,
    PageBlocked { url: Url, pattern: Option<String> },
}

pub trait Renderer {
    fn load_url(&mut self, tab: TabId, url: &Url);
    fn current_url(&self, tab: TabId) -> Option<Url>;
    fn navigation_history_empty(&self, tab: TabId) -> bool;
    /// `false` while the first load of a fresh tab has not committed yet.
    fn pending_load_visible(&self, tab: TabId) -> bool;
    /// Applies `delta` and returns the values it replaced.
    fn apply_settings_delta(&mut self, tab: TabId, delta: &SettingsDelta) -> SettingsDelta;
    fn restore_settings(&mut self, tab: TabId, prior: &SettingsDelta);
}

pub trait TabManager {
    fn tab_context(&self, tab: TabId) -> Option<TabContext>;
    fn open_tab(&mut self, target: NavigationTarget, url: &Url) -> TabId;
    fn close_tab(&mut self, tab: TabId);
    fn current_gesture_is_user(&self) -> bool;
}

pub trait AppLauncher {
    fn resolve_external_app(&self, intent: &IntentSpec) -> Resolution;
    fn launch(&mut self, intent: &IntentSpec) -> Result<(), ExternalAppError>;
}

/// Presentation side: internal pages and notices.
pub trait ChromeHost {
    fn open_internal(&mut self, tab: TabId, destination: &InternalDestination);
    fn notify(&mut self, notice: UserNotice);
}

pub trait PreferenceStore {
    fn home_page(&self) -> String;
    /// Replaces and persists the home page.
    fn set_home_page(&mut self, url: &str);
}

/// Everything the coordinator needs from the browser.
pub trait BrowserHost: Renderer + TabManager + AppLauncher + ChromeHost + PreferenceStore {}

impl<T> BrowserHost for T where T: Renderer + TabManager + AppLauncher + ChromeHost + PreferenceStore {}
