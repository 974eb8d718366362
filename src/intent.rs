//! Parsing of `intent:` URIs into an external application descriptor.
//!
//! Format: `intent://<data>#Intent;key=value;...;end`. Recognized keys are
//! `scheme`, `package`, `action`, `category`, `component`, `launchFlags` and
//! typed extras (`S.`, `B.`, `i.`, `l.`, `f.` prefixes). The escape hatch a
//! page can provide is the `S.browser_fallback_url` extra.

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

pub const ACTION_VIEW: &str = "view";
pub const ACTION_SEND_TO: &str = "send-to";
pub const ACTION_DIAL: &str = "dial";

/// Start the external app in its own task.
pub const FLAG_NEW_TASK: u32 = 0x1000_0000;

const FALLBACK_EXTRA: &str = "browser_fallback_url";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentParseError {
    #[error("not an intent: URI")]
    NotIntent,
    #[error("missing `#Intent;` section")]
    MissingSection,
    #[error("intent section is not terminated by `end`")]
    Unterminated,
    #[error("invalid launchFlags `{0}`")]
    InvalidFlags(String),
}

/// What the app-launch collaborator is asked to resolve and start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentSpec {
    pub action: Option<String>,
    pub data: Option<String>,
    pub package: Option<String>,
    pub component: Option<String>,
    pub categories: Vec<String>,
    pub extras: BTreeMap<String, String>,
    pub flags: u32,
}

impl IntentSpec {
    /// Generic "open this URI with whatever handles it".
    pub fn view(url: &Url) -> Self {
        Self::with_action(ACTION_VIEW, url)
    }

    pub fn with_action(action: &str, url: &Url) -> Self {
        Self {
            action: Some(action.to_string()),
            data: Some(url.as_str().to_string()),
            ..Default::default()
        }
    }

    pub fn add_flags(&mut self, flags: u32) {
        self.flags |= flags;
    }

    /// The fallback URL embedded by the page, if it is a loadable URL.
    pub fn fallback_url(&self) -> Option<Url> {
        self.extras
            .get(FALLBACK_EXTRA)
            .filter(|s| !s.is_empty())
            .and_then(|s| Url::parse(s).ok())
    }

    pub fn parse(uri: &str) -> Result<Self, IntentParseError> {
        let rest = strip_prefix_ignore_case(uri, "intent:").ok_or(IntentParseError::NotIntent)?;
        let marker = rest.find("#Intent;").ok_or(IntentParseError::MissingSection)?;
        let (data_part, section) = rest.split_at(marker);
        let section = &section["#Intent;".len()..];
        let body = section
            .strip_suffix("end")
            .or_else(|| section.strip_suffix("end;"))
            .ok_or(IntentParseError::Unterminated)?;

        let mut spec = IntentSpec {
            action: Some(ACTION_VIEW.to_string()),
            ..Default::default()
        };
        let mut scheme = None;

        for entry in body.split(';').filter(|e| !e.is_empty()) {
            let Some((key, value)) = entry.split_once('=') else {
                continue;
            };
            let value = percent_decode(value);
            match key {
                "scheme" => scheme = Some(value),
                "package" => spec.package = Some(value),
                "action" => spec.action = Some(value),
                "category" => spec.categories.push(value),
                "component" => spec.component = Some(value),
                "launchFlags" => {
                    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
                    spec.flags = u32::from_str_radix(digits, 16)
                        .map_err(|_| IntentParseError::InvalidFlags(value.clone()))?;
                }
                _ => {
                    if let Some((kind, name)) = key.split_once('.')
                        && matches!(kind, "S" | "B" | "i" | "l" | "f")
                    {
                        spec.extras.insert(name.to_string(), value);
                    }
                }
            }
        }

        let data = data_part.trim_start_matches("//");
        if !data.is_empty() {
            spec.data = Some(match scheme {
                Some(scheme) => format!("{scheme}://{data}"),
                None => data.to_string(),
            });
        }

        Ok(spec)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

/// Percent-decoding for intent values (`+` is kept as-is).
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(h), Some(l)) = (hex_val(bytes[i + 1]), hex_val(bytes[i + 2]))
        {
            out.push(h << 4 | l);
            i += 3;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
