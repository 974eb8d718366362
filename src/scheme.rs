//! Scheme dispatch, evaluated before any rule.
//!
//! Classifies a navigation by scheme (case-insensitive) and either lets it
//! continue, consumes it (internal page, external app), or redirects it.
//! Launch failures are recoverable: the caller keeps the current page and
//! only "app not found" is shown to the user.

use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::ExternalAppError;
use crate::host::{AppLauncher, PreferenceStore, Resolution};
use crate::intent::{ACTION_DIAL, ACTION_SEND_TO, FLAG_NEW_TASK, IntentSpec};

/// Home page written back when the configured one loops onto itself.
pub const SAFE_HOME_PAGE: &str = "about:blank";

/// Schemes the renderer loads itself.
const RENDERABLE_SCHEMES: &[&str] = &[
    "http",
    "https",
    "file",
    "data",
    "about",
    "javascript",
    "blob",
    "view-source",
    "content",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalDestination {
    Settings,
    History,
    Downloads,
    Bookmarks,
    SearchBox { reverse: bool },
    AdBlockList,
    ResourceBlockList,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeDispatch {
    Internal(InternalDestination),
    ExternalApp(IntentSpec),
    /// Nothing launched; the current page stays.
    ExternalAppFailed(ExternalAppError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemeOutcome {
    Continue,
    Consumed(SchemeDispatch),
    Redirect(Url),
}

#[derive(Debug, Clone)]
pub struct SchemeRouter {
    internal_scheme: String,
    share_unknown_scheme: bool,
}

impl SchemeRouter {
    pub fn new(internal_scheme: &str, share_unknown_scheme: bool) -> Self {
        Self {
            internal_scheme: internal_scheme.to_ascii_lowercase(),
            share_unknown_scheme,
        }
    }

    pub fn internal_scheme(&self) -> &str {
        &self.internal_scheme
    }

    pub fn route<H>(&self, url: &Url, host: &mut H) -> SchemeOutcome
    where
        H: AppLauncher + PreferenceStore + ?Sized,
    {
        // `Url` normalise déjà le schéma en minuscules.
        let scheme = url.scheme();

        if scheme == self.internal_scheme {
            return self.route_internal(url, host);
        }

        match scheme {
            "intent" => match IntentSpec::parse(url.as_str()) {
                Ok(intent) => return launch_with_fallback(intent, host),
                Err(e) => error!(url = %url, error = %e, "cannot resolve intent URI"),
            },
            "mailto" => return launch_direct(IntentSpec::with_action(ACTION_SEND_TO, url), host),
            "tel" => return launch_direct(IntentSpec::with_action(ACTION_DIAL, url), host),
            _ => {}
        }

        if self.share_unknown_scheme && !RENDERABLE_SCHEMES.contains(&scheme) {
            debug!(url = %url, "unknown scheme offered to external apps");
            return launch_with_fallback(IntentSpec::view(url), host);
        }

        SchemeOutcome::Continue
    }

    fn route_internal<H>(&self, url: &Url, host: &mut H) -> SchemeOutcome
    where
        H: PreferenceStore + ?Sized,
    {
        let action = internal_action(url);
        let destination = match action.as_str() {
            "" => return SchemeOutcome::Continue,
            "settings" | "setting" => InternalDestination::Settings,
            "histories" | "history" => InternalDestination::History,
            "downloads" | "download" => InternalDestination::Downloads,
            "bookmarks" | "bookmark" => InternalDestination::Bookmarks,
            "debug" => InternalDestination::Debug,
            "adblock" => InternalDestination::AdBlockList,
            "resblock" => InternalDestination::ResourceBlockList,
            "search" => InternalDestination::SearchBox {
                reverse: url
                    .fragment()
                    .is_some_and(|f| f.eq_ignore_ascii_case("reverse")),
            },
            "home" => return self.route_home(host),
            // Servie par le répondeur interne lors du fetch.
            "speeddial" => return SchemeOutcome::Continue,
            other => {
                debug!(action = other, "unknown internal action");
                return SchemeOutcome::Continue;
            }
        };
        SchemeOutcome::Consumed(SchemeDispatch::Internal(destination))
    }

    fn route_home<H>(&self, host: &mut H) -> SchemeOutcome
    where
        H: PreferenceStore + ?Sized,
    {
        let configured = host.home_page();
        let parsed = Url::parse(configured.trim());
        let looping = parsed
            .as_ref()
            .is_ok_and(|u| u.scheme() == self.internal_scheme && internal_action(u) == "home");

        let target = match parsed {
            Ok(u) if !looping => u,
            _ => {
                warn!(home_page = %configured, "home page loops or is invalid, resetting");
                host.set_home_page(SAFE_HOME_PAGE);
                safe_home()
            }
        };
        SchemeOutcome::Redirect(target)
    }
}

/// `suri:settings`, `suri://settings`, `SURI:Settings` → `settings`.
pub(crate) fn internal_action(url: &Url) -> String {
    let mut action = String::new();
    if let Some(host) = url.host_str() {
        action.push_str(host);
    }
    action.push_str(url.path());
    action.trim_matches('/').to_ascii_lowercase()
}

fn safe_home() -> Url {
    Url::parse(SAFE_HOME_PAGE).expect("SAFE_HOME_PAGE is a valid URL")
}

fn launch_with_fallback<H>(mut intent: IntentSpec, host: &mut H) -> SchemeOutcome
where
    H: AppLauncher + ?Sized,
{
    let failure = match host.resolve_external_app(&intent) {
        Resolution::Resolved => {
            intent.add_flags(FLAG_NEW_TASK);
            match host.launch(&intent) {
                Ok(()) => {
                    info!(data = ?intent.data, "navigation handed to external app");
                    return SchemeOutcome::Consumed(SchemeDispatch::ExternalApp(intent));
                }
                Err(e) => e,
            }
        }
        Resolution::NotFound => ExternalAppError::NotFound,
    };

    match intent.fallback_url() {
        Some(fallback) => {
            info!(fallback = %fallback, error = %failure, "external app unavailable, loading fallback URL");
            SchemeOutcome::Redirect(fallback)
        }
        None => {
            warn!(data = ?intent.data, error = %failure, "external app unavailable");
            SchemeOutcome::Consumed(SchemeDispatch::ExternalAppFailed(failure))
        }
    }
}

fn launch_direct<H>(intent: IntentSpec, host: &mut H) -> SchemeOutcome
where
    H: AppLauncher + ?Sized,
{
    let result = match host.resolve_external_app(&intent) {
        Resolution::Resolved => host.launch(&intent),
        Resolution::NotFound => Err(ExternalAppError::NotFound),
    };
    match result {
        Ok(()) => SchemeOutcome::Consumed(SchemeDispatch::ExternalApp(intent)),
        Err(e) => {
            warn!(data = ?intent.data, error = %e, "no app for link");
            SchemeOutcome::Consumed(SchemeDispatch::ExternalAppFailed(e))
        }
    }
}
