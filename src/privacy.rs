//! Snapshot de filtrage publicitaire (ad-blocking, tracker blocking).
//!
//! Encapsule le moteur `adblock` de Brave pour filtrer les requêtes HTTP
//! en utilisant des listes de filtres au format Adblock Plus (EasyList,
//! EasyPrivacy, etc.).
//!
//! Un [`AdBlockSnapshot`] est immuable : une mise à jour des listes en
//! construit un nouveau, publié atomiquement par la
//! [`crate::filter::FilterChain`]. Les fetchs en cours gardent l'ancien.
//!
//! ## Listes de filtres recommandées
//!
//! - EasyList : <https://easylist.to/easylist/easylist.txt>
//! - EasyPrivacy : <https://easylist.to/easylist/easyprivacy.txt>

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use adblock::Engine;
use adblock::lists::{FilterSet, ParseOptions};
use adblock::request::Request;
use tracing::{info, warn};
use url::Url;

use crate::error::FilterError;

const STAGE: &str = "adblock";

/// Filtre ayant provoqué un blocage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdBlockMatch {
    /// Texte du filtre, quand le moteur le rapporte.
    pub pattern: Option<String>,
}

/// Wrapper autour du moteur `adblock::Engine`.
pub struct AdBlockSnapshot {
    engine: Engine,
    lists: usize,
}

impl std::fmt::Debug for AdBlockSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdBlockSnapshot")
            .field("lists", &self.lists)
            .finish_non_exhaustive()
    }
}

impl AdBlockSnapshot {
    /// Construit le moteur à partir du contenu de listes ABP.
    pub fn from_lists<I, S>(lists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // debug = true : le texte de chaque filtre est conservé pour
        // l'attacher au verdict d'un blocage de page principale.
        let mut filter_set = FilterSet::new(true);
        let mut count = 0;
        for list in lists {
            filter_set.add_filter_list(list.as_ref(), ParseOptions::default());
            count += 1;
        }
        // Sans optimisation : les filtres fusionnés perdraient leur texte.
        let engine = Engine::from_filter_set(filter_set, false);
        info!("Moteur adblock initialisé avec {} liste(s)", count);
        Self {
            engine,
            lists: count,
        }
    }

    /// Charge les listes `*.txt` du dossier de filtres.
    ///
    /// Retourne `None` si aucun fichier de filtres n'est trouvé (le
    /// navigateur fonctionnera sans ad-blocking).
    pub fn from_dir(configured: Option<&Path>) -> Option<Self> {
        let filters_dir = find_filters_dir(configured)?;

        let mut entries: Vec<_> = fs::read_dir(&filters_dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        entries.sort();

        if entries.is_empty() {
            warn!(
                "Dossier filters/ trouvé mais vide ({}). Ad-blocking désactivé.",
                filters_dir.display()
            );
            return None;
        }

        let mut contents = Vec::with_capacity(entries.len());
        for path in &entries {
            match fs::read_to_string(path) {
                Ok(content) => {
                    info!(
                        "Liste de filtres chargée : {} ({} lignes)",
                        path.display(),
                        content.lines().count()
                    );
                    contents.push(content);
                }
                Err(e) => {
                    warn!("Impossible de lire {} : {}", path.display(), e);
                }
            }
        }

        if contents.is_empty() {
            return None;
        }
        Some(Self::from_lists(contents))
    }

    pub fn list_count(&self) -> usize {
        self.lists
    }

    /// Vérifie si une requête doit être bloquée.
    ///
    /// - `url` : URL de la ressource demandée
    /// - `source` : URL de la page de l'onglet qui a initié la requête
    /// - `main_frame` : la requête est le document principal de l'onglet
    ///
    /// Seules les URLs http(s) sont soumises au moteur. Une requête que le
    /// moteur refuse de construire, ou un moteur qui panique, remonte comme
    /// [`FilterError::Evaluation`].
    pub fn check(
        &self,
        url: &Url,
        source: Option<&Url>,
        main_frame: bool,
    ) -> Result<Option<AdBlockMatch>, FilterError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Ok(None);
        }

        let source_url = source.map(Url::as_str).unwrap_or("");
        let request_type = if main_frame { "document" } else { "other" };

        let request = Request::new(url.as_str(), source_url, request_type)
            .or_else(|_| Request::new(url.as_str(), "", request_type))
            .map_err(|e| FilterError::Evaluation {
                stage: STAGE,
                url: url.to_string(),
                message: format!("{e:?}"),
            })?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.engine.check_network_request(&request)
        }))
        .map_err(|_| FilterError::Evaluation {
            stage: STAGE,
            url: url.to_string(),
            message: "matcher panicked".to_string(),
        })?;

        if !result.matched {
            return Ok(None);
        }
        Ok(Some(AdBlockMatch {
            pattern: result.filter,
        }))
    }
}

/// Cherche le dossier `filters/` :
///
/// 1. Chemin explicite de la configuration
/// 2. Variable d'environnement `SURIBROWS_NAV_FILTERS`
/// 3. À côté de l'exécutable (`<exe_dir>/resources/filters`)
/// 4. Répertoire courant (`./resources/filters`)
fn find_filters_dir(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_dir() {
            return Some(path.to_path_buf());
        }
        warn!("Dossier de filtres configuré introuvable : {}", path.display());
    }

    if let Ok(path) = std::env::var("SURIBROWS_NAV_FILTERS") {
        let path = PathBuf::from(path);
        if path.is_dir() {
            return Some(path);
        }
    }

    if let Ok(exe_path) = std::env::current_exe()
        && let Some(dir) = exe_path.parent()
    {
        let path = dir.join("resources").join("filters");
        if path.is_dir() {
            return Some(path);
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        let path = cwd.join("resources").join("filters");
        if path.is_dir() {
            return Some(path);
        }
    }

    warn!("Dossier resources/filters/ introuvable. Ad-blocking désactivé.");
    None
}
