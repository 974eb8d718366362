//! Blocks in-browser crypto-mining scripts by host.
//!
//! The list is a set of registrable hosts; a request matches when its host
//! is one of them or a subdomain of one. A page served by a listed host
//! itself is not protected against (the user asked for it).

use std::collections::HashSet;

use url::Url;

/// Hosts of the common browser-mining services.
const BUILTIN_MINING_HOSTS: &[&str] = &[
    "coinhive.com",
    "coin-hive.com",
    "authedmine.com",
    "cnhv.co",
    "crypto-loot.com",
    "cryptoloot.pro",
    "cryptaloot.pro",
    "coinimp.com",
    "coinerra.com",
    "jsecoin.com",
    "minero.cc",
    "ppoi.org",
    "webmine.cz",
    "webminepool.com",
    "monerominer.rocks",
    "minemytraffic.com",
    "coin-have.com",
    "papoto.com",
    "cryptonoter.com",
    "mineralt.io",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MiningList {
    hosts: HashSet<String>,
}

impl Default for MiningList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl MiningList {
    pub fn builtin() -> Self {
        Self::with_extra_hosts(std::iter::empty::<&str>())
    }

    /// Built-in hosts plus `extra` (lowercased, leading `*.`/`.` ignored).
    pub fn with_extra_hosts<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut hosts: HashSet<String> =
            BUILTIN_MINING_HOSTS.iter().map(|h| (*h).to_string()).collect();
        for host in extra {
            let host = host
                .as_ref()
                .trim()
                .trim_start_matches("*.")
                .trim_start_matches('.')
                .to_ascii_lowercase();
            if !host.is_empty() {
                hosts.insert(host);
            }
        }
        Self { hosts }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// `true` when `request` must be short-circuited on `page`.
    pub fn is_block(&self, page: Option<&Url>, request: &Url) -> bool {
        let Some(listed) = request.host_str().and_then(|h| self.listed_as(h)) else {
            return false;
        };
        let first_party = page
            .and_then(Url::host_str)
            .and_then(|h| self.listed_as(h))
            .is_some_and(|page_listed| page_listed == listed);
        !first_party
    }

    /// The list entry `host` falls under, walking up its labels.
    fn listed_as(&self, host: &str) -> Option<&str> {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        let mut candidate = host.as_str();
        loop {
            if let Some(entry) = self.hosts.get(candidate) {
                return Some(entry.as_str());
            }
            let (_, parent) = candidate.split_once('.')?;
            candidate = parent;
        }
    }
}
