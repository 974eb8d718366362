//! Resource checkers: last stage of the filter chain.
//!
//! Each checker answers with a [`CheckOutcome`] for a request URL. The
//! chain serves the checker's fixed resource on `ServeFixedResource`,
//! stops and lets the request through on `Stop`, and asks the next checker
//! on `Continue`.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;
use crate::filter::SyntheticResponse;
use crate::pattern::PatternMatcher;

/// 1x1 transparent GIF.
const EMPTY_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0xff, 0xff,
    0xff, 0x00, 0x00, 0x00, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    ServeFixedResource,
    Stop,
    Continue,
}

pub trait ResourceChecker: Send + Sync + fmt::Debug {
    fn check(&self, url: &Url) -> CheckOutcome;
    /// The response served when `check` returned `ServeFixedResource`.
    fn resource(&self) -> SyntheticResponse;
}

/// What a resource rule does with matching requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAction {
    /// Replace with a transparent 1x1 image.
    EmptyImage,
    /// Replace with an empty `text/plain` body.
    EmptyText,
    /// Whitelist: stop checking and let the request through.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRuleDefinition {
    pub pattern: String,
    pub action: ResourceAction,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone)]
pub struct PatternResourceChecker {
    matcher: PatternMatcher,
    action: ResourceAction,
}

impl PatternResourceChecker {
    pub fn new(matcher: PatternMatcher, action: ResourceAction) -> Self {
        Self { matcher, action }
    }
}

impl ResourceChecker for PatternResourceChecker {
    fn check(&self, url: &Url) -> CheckOutcome {
        if !self.matcher.is_match(url) {
            return CheckOutcome::Continue;
        }
        match self.action {
            ResourceAction::Allow => CheckOutcome::Stop,
            ResourceAction::EmptyImage | ResourceAction::EmptyText => {
                CheckOutcome::ServeFixedResource
            }
        }
    }

    fn resource(&self) -> SyntheticResponse {
        match self.action {
            ResourceAction::EmptyImage => SyntheticResponse::new("image/gif", None, EMPTY_GIF),
            ResourceAction::EmptyText | ResourceAction::Allow => {
                SyntheticResponse::new("text/plain", Some("utf-8"), &b""[..])
            }
        }
    }
}

/// Compiles the enabled definitions in order. Invalid patterns are dropped
/// and reported; the remaining checkers keep their relative order.
pub fn load_checkers(
    definitions: &[ResourceRuleDefinition],
) -> (Vec<Arc<dyn ResourceChecker>>, Vec<ConfigError>) {
    let mut checkers: Vec<Arc<dyn ResourceChecker>> = Vec::with_capacity(definitions.len());
    let mut errors = Vec::new();
    for (index, def) in definitions.iter().enumerate() {
        if !def.enabled {
            continue;
        }
        match PatternMatcher::compile(&format!("resource#{index}"), &def.pattern) {
            Ok(matcher) => checkers.push(Arc::new(PatternResourceChecker::new(matcher, def.action))),
            Err(e) => {
                warn!("Resource rule ignored: {}", e);
                errors.push(e);
            }
        }
    }
    (checkers, errors)
}
