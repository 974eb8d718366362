//! # SuriBrows — Routage de navigation et filtrage de contenu
//!
//! Cœur de décision du navigateur : pour chaque navigation, où elle
//! atterrit (onglet courant, nouvel onglet, application externe) ; pour
//! chaque requête de ressource, si elle part sur le réseau, est bloquée ou
//! est servie par un répondeur interne.
//!
//! Le cœur ne rend rien et ne persiste rien lui-même : il pilote le
//! navigateur à travers les traits de [`host`].
//!
//! ## Architecture des modules
//!
//! - [`coordinator`] : Orchestration d'une navigation — schéma, règles,
//!   placement de l'onglet. Un événement à la fois par onglet ([`events`]).
//!
//! - [`scheme`] : Dispatch par schéma (pages internes, `intent:`, `mailto:`,
//!   `tel:`, schémas inconnus). Évalué avant les règles ; [`intent`] parse
//!   les URIs `intent:`.
//!
//! - [`rules`] / [`pattern`] : Règles de motif ordonnées (réglages
//!   temporaires, application externe, blocage) et compilation des motifs.
//!   [`snapshot`] garantit la restauration des réglages d'un onglet.
//!
//! - [`routing`] : Politique de placement (préférences, nav-lock, exemptions
//!   geste utilisateur / navigation automatique).
//!
//! - [`filter`] : Chaîne de filtrage des requêtes, appelée en parallèle par
//!   les fetchs : [`speeddial`] → [`privacy`] (ad-block) → [`mining`] →
//!   [`resblock`].
//!
//! - [`config`] : Configuration TOML, source des composants.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod filter;
pub mod host;
pub mod intent;
pub mod mining;
pub mod pattern;
pub mod privacy;
pub mod resblock;
pub mod routing;
pub mod rules;
pub mod scheme;
pub mod snapshot;
pub mod speeddial;
