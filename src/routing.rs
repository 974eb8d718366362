//! Politique de routage des onglets.
//!
//! Décide où une navigation atterrit : dans l'onglet courant (`None`) ou
//! dans un nouvel onglet (premier plan, arrière-plan, à droite de l'onglet
//! courant). Les navigations issues d'un geste utilisateur et celles lancées
//! par le moteur (redirections, `window.location`) n'utilisent pas la même
//! règle d'exemption : voir [`TabRoutingPolicy::exemption`].

use serde::{Deserialize, Serialize};
use url::Url;

use crate::host::TabContext;
use crate::scheme::internal_action;

/// Préférence configurée par l'utilisateur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPreference {
    CurrentTab,
    NewForeground,
    NewBackground,
    NewForegroundRightOfCurrent,
    NewBackgroundRightOfCurrent,
}

/// Destination produite une seule fois par navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationTarget {
    CurrentTab,
    NewForeground,
    NewBackground,
    NewForegroundRightOf(usize),
    NewBackgroundRightOf(usize),
}

/// Les préférences par contexte : liens ordinaires, liens depuis la page
/// de démarrage, fenêtres ouvertes par la page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingPreferences {
    pub link: RoutingPreference,
    pub speed_dial: RoutingPreference,
    pub blank_window: RoutingPreference,
}

impl Default for RoutingPreferences {
    fn default() -> Self {
        Self {
            link: RoutingPreference::CurrentTab,
            speed_dial: RoutingPreference::CurrentTab,
            blank_window: RoutingPreference::NewForeground,
        }
    }
}

/// Pourquoi une URL reste dans l'onglet courant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exemption {
    /// `javascript:`, `about:` ou le schéma interne.
    Scheme,
    /// Seul le fragment change.
    SameDocument,
    /// Schéma non web (`data:`, `blob:`, `file:`...) (automatique uniquement).
    NonWebScheme,
    /// Même URL que l'onglet (automatique uniquement).
    SameUrl,
    /// L'onglet n'a pas encore d'historique (automatique uniquement).
    EmptyHistory,
}

#[derive(Debug, Clone)]
pub struct TabRoutingPolicy {
    internal_scheme: String,
}

impl TabRoutingPolicy {
    pub fn new(internal_scheme: &str) -> Self {
        Self {
            internal_scheme: internal_scheme.to_ascii_lowercase(),
        }
    }

    /// `None` = charger dans l'onglet courant.
    pub fn decide(
        &self,
        preference: RoutingPreference,
        tab: &TabContext,
        url: &Url,
        user_initiated: bool,
    ) -> Option<NavigationTarget> {
        let exemption = self.exemption(tab, url, user_initiated);

        // 1. Nav-lock : tout ce qui n'est pas exempté part à droite.
        if tab.nav_locked && exemption.is_none() {
            return Some(NavigationTarget::NewForegroundRightOf(tab.index));
        }
        // 2.
        if preference == RoutingPreference::CurrentTab {
            return None;
        }
        // 3. et 4. (même URL / historique vide sont inclus dans la règle automatique)
        if exemption.is_some() {
            return None;
        }
        // 5.
        Some(map_preference(preference, tab.index))
    }

    /// Règle d'exemption applicable : stricte pour un geste utilisateur,
    /// élargie pour une navigation automatique.
    pub fn exemption(&self, tab: &TabContext, url: &Url, user_initiated: bool) -> Option<Exemption> {
        if self.is_scheme_exempt(url) {
            return Some(Exemption::Scheme);
        }
        if tab
            .current_url
            .as_ref()
            .is_some_and(|current| is_same_document(url, current))
        {
            return Some(Exemption::SameDocument);
        }
        if user_initiated {
            return None;
        }
        if !is_web_scheme(url) {
            return Some(Exemption::NonWebScheme);
        }
        if tab
            .current_url
            .as_ref()
            .is_some_and(|current| is_same_url(url, current))
        {
            return Some(Exemption::SameUrl);
        }
        if tab.history_empty {
            return Some(Exemption::EmptyHistory);
        }
        None
    }

    pub fn is_scheme_exempt(&self, url: &Url) -> bool {
        let scheme = url.scheme();
        scheme == "javascript" || scheme == "about" || scheme == self.internal_scheme
    }

    /// Préférence à utiliser pour les liens suivis depuis `tab`.
    pub fn preference_for(&self, tab: &TabContext, prefs: &RoutingPreferences) -> RoutingPreference {
        if tab
            .original_url
            .as_ref()
            .is_some_and(|u| self.is_speed_dial(u))
        {
            prefs.speed_dial
        } else {
            prefs.link
        }
    }

    /// Retour/avance dans l'historique d'un onglet verrouillé : l'entrée
    /// voisine s'ouvre à droite au lieu de remplacer la page.
    pub fn history_step(&self, tab: &TabContext, entry: Option<&Url>) -> Option<NavigationTarget> {
        match entry {
            Some(_) if tab.nav_locked => Some(NavigationTarget::NewForegroundRightOf(tab.index)),
            _ => None,
        }
    }

    pub fn is_speed_dial(&self, url: &Url) -> bool {
        url.scheme() == self.internal_scheme && internal_action(url) == "speeddial"
    }
}

pub fn map_preference(preference: RoutingPreference, index: usize) -> NavigationTarget {
    match preference {
        RoutingPreference::CurrentTab => NavigationTarget::CurrentTab,
        RoutingPreference::NewForeground => NavigationTarget::NewForeground,
        RoutingPreference::NewBackground => NavigationTarget::NewBackground,
        RoutingPreference::NewForegroundRightOfCurrent => NavigationTarget::NewForegroundRightOf(index),
        RoutingPreference::NewBackgroundRightOfCurrent => NavigationTarget::NewBackgroundRightOf(index),
    }
}

/// Même document : tout est identique hors fragment, et la cible a un fragment.
pub fn is_same_document(candidate: &Url, current: &Url) -> bool {
    if candidate.fragment().is_none() {
        return false;
    }
    let mut a = candidate.clone();
    let mut b = current.clone();
    a.set_fragment(None);
    b.set_fragment(None);
    a == b
}

/// Égalité stricte, query string et fragment compris.
pub fn is_same_url(candidate: &Url, current: &Url) -> bool {
    candidate == current
}

pub fn is_web_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
