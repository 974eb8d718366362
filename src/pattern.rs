//! Compilation et évaluation d'un motif d'URL.
//!
//! Syntaxe des motifs (fixe, ce n'est pas un DSL) :
//!
//! - `[...]` : expression régulière appliquée à l'URL complète
//! - `scheme://...` : wildcard `*` sur l'URL complète
//! - `host/path...` : wildcard sur `host + path (+ ?query)`
//! - `host` : wildcard sur l'hôte seul ; `*.example.com` couvre aussi
//!   `example.com`
//!
//! Un motif invalide est rejeté à la compilation ([`PatternMatcher::compile`]).
//! L'évaluation est totale : une URL sans hôte ne correspond simplement à
//! aucun motif d'hôte.

use regex::{Regex, RegexBuilder};
use url::Url;

use crate::error::ConfigError;

/// Limite de taille d'un automate compilé (motifs fournis par l'utilisateur).
const REGEX_SIZE_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone)]
enum HostMatch {
    Exact(String),
    /// `*.example.com` : l'hôte lui-même ou un sous-domaine.
    Suffix(String),
    Wildcard(Regex),
}

#[derive(Debug, Clone)]
enum PatternKind {
    Host(HostMatch),
    HostPath(Regex),
    FullUrl(Regex),
    Regex(Regex),
}

/// Un motif compilé, immuable.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    source: String,
    kind: PatternKind,
}

impl PatternMatcher {
    /// Compile `pattern`. `id` ne sert qu'à identifier la règle dans l'erreur.
    pub fn compile(id: &str, pattern: &str) -> Result<Self, ConfigError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyPattern { id: id.to_string() });
        }

        let malformed = |reason| ConfigError::MalformedPattern {
            id: id.to_string(),
            pattern: trimmed.to_string(),
            reason,
        };

        let kind = if trimmed.starts_with('[') {
            if trimmed.len() < 2 || !trimmed.ends_with(']') {
                return Err(malformed("regex pattern must end with `]`"));
            }
            let body = &trimmed[1..trimmed.len() - 1];
            PatternKind::Regex(build_regex(id, body)?)
        } else if trimmed.contains(char::is_whitespace) {
            return Err(malformed("whitespace outside a regex pattern"));
        } else if let Some(idx) = trimmed.find("://") {
            // Le schéma et l'hôte sont insensibles à la casse, le chemin non.
            let authority_end = trimmed[idx + 3..]
                .find('/')
                .map_or(trimmed.len(), |p| idx + 3 + p);
            let normalized = format!(
                "{}{}",
                trimmed[..authority_end].to_ascii_lowercase(),
                &trimmed[authority_end..]
            );
            PatternKind::FullUrl(build_regex(id, &wildcard_to_regex(&normalized))?)
        } else if let Some(slash) = trimmed.find('/') {
            if !is_host_pattern(&trimmed[..slash]) {
                return Err(malformed("invalid character in host"));
            }
            let normalized = format!(
                "{}{}",
                trimmed[..slash].to_ascii_lowercase(),
                &trimmed[slash..]
            );
            PatternKind::HostPath(build_regex(id, &wildcard_to_regex(&normalized))?)
        } else {
            if !is_host_pattern(trimmed) {
                return Err(malformed("invalid character in host"));
            }
            let host = trimmed.to_ascii_lowercase();
            let matcher = match host.strip_prefix("*.") {
                Some(rest) if !rest.contains('*') => HostMatch::Suffix(rest.to_string()),
                _ if host.contains('*') => {
                    HostMatch::Wildcard(build_regex(id, &wildcard_to_regex(&host))?)
                }
                _ => HostMatch::Exact(host),
            };
            PatternKind::Host(matcher)
        };

        Ok(Self {
            source: trimmed.to_string(),
            kind,
        })
    }

    /// Texte du motif tel qu'il a été chargé.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, url: &Url) -> bool {
        match &self.kind {
            PatternKind::Regex(re) | PatternKind::FullUrl(re) => re.is_match(url.as_str()),
            PatternKind::HostPath(re) => {
                let Some(host) = url.host_str() else {
                    return false;
                };
                let mut target = String::with_capacity(host.len() + url.path().len());
                target.push_str(host);
                target.push_str(url.path());
                if let Some(query) = url.query() {
                    target.push('?');
                    target.push_str(query);
                }
                re.is_match(&target)
            }
            PatternKind::Host(host_match) => {
                let Some(host) = url.host_str() else {
                    return false;
                };
                match host_match {
                    HostMatch::Exact(expected) => host == expected,
                    HostMatch::Suffix(suffix) => {
                        host == suffix
                            || (host.len() > suffix.len()
                                && host.ends_with(suffix.as_str())
                                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.')
                    }
                    HostMatch::Wildcard(re) => re.is_match(host),
                }
            }
        }
    }
}

/// Lettres, chiffres, `-`, `_`, `.` et `*` uniquement.
fn is_host_pattern(host: &str) -> bool {
    !host.is_empty()
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'*'))
}

/// Convertit un wildcard (`*` = n'importe quelle suite) en regex ancrée.
fn wildcard_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^{body}$")
}

fn build_regex(id: &str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .size_limit(REGEX_SIZE_LIMIT)
        .build()
        .map_err(|e| ConfigError::InvalidRegex {
            id: id.to_string(),
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn compile(p: &str) -> PatternMatcher {
        PatternMatcher::compile("t", p).unwrap()
    }

    #[test]
    fn test_exact_host() {
        let m = compile("Example.COM");
        assert!(m.is_match(&url("https://example.com/a")));
        assert!(!m.is_match(&url("https://www.example.com/a")));
    }

    #[test]
    fn test_suffix_host_covers_apex_and_subdomains() {
        let m = compile("*.example.com");
        assert!(m.is_match(&url("https://example.com/")));
        assert!(m.is_match(&url("https://a.b.example.com/")));
        assert!(!m.is_match(&url("https://badexample.com/")));
    }

    #[test]
    fn test_host_wildcard_in_middle() {
        let m = compile("cdn*.example.net");
        assert!(m.is_match(&url("http://cdn42.example.net/x")));
        assert!(!m.is_match(&url("http://img.example.net/x")));
    }

    #[test]
    fn test_host_path_pattern() {
        let m = compile("example.com/news/*");
        assert!(m.is_match(&url("https://example.com/news/today?x=1")));
        assert!(!m.is_match(&url("https://example.com/sport/today")));
    }

    #[test]
    fn test_full_url_pattern_is_scheme_sensitive() {
        let m = compile("HTTP://Example.com/*");
        assert!(m.is_match(&url("http://example.com/page")));
        assert!(!m.is_match(&url("https://example.com/page")));
    }

    #[test]
    fn test_regex_pattern() {
        let m = compile(r"[^https?://[^/]+\.test/]");
        assert!(m.is_match(&url("https://a.test/x")));
        assert!(!m.is_match(&url("https://a.example/x")));
    }

    #[test]
    fn test_host_pattern_never_matches_hostless_url() {
        let m = compile("example.com");
        assert!(!m.is_match(&url("mailto:someone@example.com")));
        let hp = compile("example.com/*");
        assert!(!hp.is_match(&url("data:text/plain,example.com/")));
    }

    #[test]
    fn test_wildcard_escapes_regex_metacharacters() {
        let m = compile("example.com/a+b");
        assert!(m.is_match(&url("https://example.com/a+b")));
        assert!(!m.is_match(&url("https://example.com/aab")));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = PatternMatcher::compile("bad", "[(unclosed]").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRegex { ref id, .. } if id == "bad"));
    }

    #[test]
    fn test_unterminated_regex_rejected() {
        for bad in ["[(", "[", "[^https://a"] {
            assert!(
                matches!(
                    PatternMatcher::compile("u", bad),
                    Err(ConfigError::MalformedPattern { .. })
                ),
                "{bad} accepted"
            );
        }
    }

    #[test]
    fn test_host_with_invalid_characters_rejected() {
        for bad in ["exa mple.com", "ex(ample.com", "a]b.test/x", "/path/only", "h?st.test"] {
            assert!(
                matches!(
                    PatternMatcher::compile("h", bad),
                    Err(ConfigError::MalformedPattern { .. })
                ),
                "{bad} accepted"
            );
        }
        assert!(PatternMatcher::compile("h", "my_host-1.*.test/a?b=*").is_ok());
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(matches!(
            PatternMatcher::compile("e", "   "),
            Err(ConfigError::EmptyPattern { .. })
        ));
    }
}
