//! Request filter chain.
//!
//! Every resource request is classified through a fixed sequence of
//! stages, the first decisive one wins:
//!
//! 1. internal responder (speed-dial page, stylesheets, tile icons)
//! 2. ad-block snapshot (main frame gets an explanation page)
//! 3. mining list
//! 4. resource checkers, in order
//!
//! The stages are published as one immutable [`FilterStages`] value
//! behind an `ArcSwap`: `classify` runs on many fetch threads at once and
//! each call sees either the old or the new stages, never a mix. Stages a
//! toggle disables are simply absent from the snapshot.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{debug, error};
use url::Url;

use crate::error::FilterError;
use crate::mining::MiningList;
use crate::privacy::AdBlockSnapshot;
use crate::resblock::{CheckOutcome, ResourceChecker};
use crate::speeddial::{SpeedDialResponder, html_escape};

/// A response produced without touching the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticResponse {
    pub mime_type: String,
    pub encoding: Option<String>,
    pub body: Arc<[u8]>,
}

impl SyntheticResponse {
    pub fn new(mime_type: &str, encoding: Option<&str>, body: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            encoding: encoding.map(str::to_string),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    AdBlock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterVerdict {
    Allow,
    /// The tab's document is blocked; `page` explains why.
    BlockMainFrame {
        reason: BlockReason,
        pattern: Option<String>,
        page: SyntheticResponse,
    },
    /// Answer with an empty dummy response.
    BlockSubresource,
    ServeSynthetic(SyntheticResponse),
}

/// Source of the current filter data (list downloads, user edits).
pub trait FilterDataProvider {
    fn current_ad_block_rules(&self) -> Option<Arc<AdBlockSnapshot>>;
    fn current_mining_list(&self) -> Option<Arc<MiningList>>;
}

/// One consistent set of stages. `None` / empty means the stage is off.
#[derive(Debug, Clone, Default)]
pub struct FilterStages {
    pub responder: Option<Arc<SpeedDialResponder>>,
    pub ad_block: Option<Arc<AdBlockSnapshot>>,
    pub mining: Option<Arc<MiningList>>,
    pub checkers: Vec<Arc<dyn ResourceChecker>>,
}

/// Per-verdict counters, updated with relaxed ordering.
#[derive(Debug, Default)]
pub struct FilterStats {
    classified: AtomicU64,
    synthetic: AtomicU64,
    ad_blocked: AtomicU64,
    mining_blocked: AtomicU64,
    resources_replaced: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStatsSnapshot {
    pub classified: u64,
    pub synthetic: u64,
    pub ad_blocked: u64,
    pub mining_blocked: u64,
    pub resources_replaced: u64,
    pub errors: u64,
}

impl FilterStats {
    pub fn snapshot(&self) -> FilterStatsSnapshot {
        FilterStatsSnapshot {
            classified: self.classified.load(Ordering::Relaxed),
            synthetic: self.synthetic.load(Ordering::Relaxed),
            ad_blocked: self.ad_blocked.load(Ordering::Relaxed),
            mining_blocked: self.mining_blocked.load(Ordering::Relaxed),
            resources_replaced: self.resources_replaced.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
pub struct FilterChain {
    stages: ArcSwap<FilterStages>,
    stats: FilterStats,
}

impl FilterChain {
    pub fn new(stages: FilterStages) -> Self {
        Self {
            stages: ArcSwap::from_pointee(stages),
            stats: FilterStats::default(),
        }
    }

    pub fn stages(&self) -> Arc<FilterStages> {
        self.stages.load_full()
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// Publishes a whole new set of stages.
    pub fn replace_stages(&self, stages: FilterStages) {
        self.stages.store(Arc::new(stages));
    }

    pub fn set_ad_block(&self, ad_block: Option<Arc<AdBlockSnapshot>>) {
        self.stages.rcu(|current| FilterStages {
            ad_block: ad_block.clone(),
            ..FilterStages::clone(current)
        });
    }

    pub fn set_mining(&self, mining: Option<Arc<MiningList>>) {
        self.stages.rcu(|current| FilterStages {
            mining: mining.clone(),
            ..FilterStages::clone(current)
        });
    }

    pub fn set_checkers(&self, checkers: Vec<Arc<dyn ResourceChecker>>) {
        self.stages.rcu(|current| FilterStages {
            checkers: checkers.clone(),
            ..FilterStages::clone(current)
        });
    }

    /// Pulls fresh ad-block and mining data from `provider`, keeping stages
    /// that were switched off switched off.
    pub fn refresh_from<P: FilterDataProvider + ?Sized>(&self, provider: &P) {
        let ad_block = provider.current_ad_block_rules();
        let mining = provider.current_mining_list();
        self.stages.rcu(|current| FilterStages {
            ad_block: current.ad_block.as_ref().and(ad_block.clone()),
            mining: current.mining.as_ref().and(mining.clone()),
            ..FilterStages::clone(current)
        });
    }

    /// Classifies one resource request.
    ///
    /// `referring_url` is the URL of the tab issuing the request; without
    /// it the ad-block and mining stages evaluate the request unscoped.
    /// A failing stage yields `Err`, never `Allow`.
    pub fn classify(
        &self,
        request_url: &Url,
        referring_url: Option<&Url>,
        is_main_frame: bool,
    ) -> Result<FilterVerdict, FilterError> {
        let stages = self.stages.load();
        FilterStats::bump(&self.stats.classified);

        if let Some(responder) = &stages.responder
            && let Some(response) = responder.respond(request_url)
        {
            FilterStats::bump(&self.stats.synthetic);
            return Ok(FilterVerdict::ServeSynthetic(response));
        }

        if let Some(ad_block) = &stages.ad_block {
            let hit = ad_block
                .check(request_url, referring_url, is_main_frame)
                .inspect_err(|e| self.record_error(e))?;
            if let Some(hit) = hit {
                FilterStats::bump(&self.stats.ad_blocked);
                debug!(url = %request_url, main_frame = is_main_frame, "request blocked by ad-block");
                return Ok(if is_main_frame {
                    let page = blocked_page(request_url, hit.pattern.as_deref());
                    FilterVerdict::BlockMainFrame {
                        reason: BlockReason::AdBlock,
                        pattern: hit.pattern,
                        page,
                    }
                } else {
                    FilterVerdict::BlockSubresource
                });
            }
        }

        if let Some(mining) = &stages.mining
            && mining.is_block(referring_url, request_url)
        {
            FilterStats::bump(&self.stats.mining_blocked);
            debug!(url = %request_url, "mining script blocked");
            return Ok(FilterVerdict::BlockSubresource);
        }

        for checker in &stages.checkers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| checker.check(request_url)))
                .map_err(|_| FilterError::Evaluation {
                    stage: "resource",
                    url: request_url.to_string(),
                    message: "checker panicked".to_string(),
                })
                .inspect_err(|e| self.record_error(e))?;
            match outcome {
                CheckOutcome::ServeFixedResource => {
                    FilterStats::bump(&self.stats.resources_replaced);
                    return Ok(FilterVerdict::ServeSynthetic(checker.resource()));
                }
                CheckOutcome::Stop => break,
                CheckOutcome::Continue => {}
            }
        }

        Ok(FilterVerdict::Allow)
    }

    fn record_error(&self, e: &FilterError) {
        FilterStats::bump(&self.stats.errors);
        error!(error = %e, "filter stage failed");
    }
}

/// Explanation page shown in place of a blocked document.
fn blocked_page(url: &Url, pattern: Option<&str>) -> SyntheticResponse {
    let rule = pattern
        .map(|p| format!("<p>Filter: <code>{}</code></p>", html_escape(p)))
        .unwrap_or_default();
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Page blocked</title>
<style>
body {{
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: #1a1a1a; color: #e0e0e0;
    max-width: 700px; margin: 0 auto; padding: 48px 24px;
}}
h1 {{ font-size: 22px; color: #ff8a65; margin-bottom: 16px; }}
code {{ font-family: monospace; color: #888; word-break: break-all; }}
</style>
</head>
<body>
<h1>Page blocked</h1>
<p><code>{url}</code></p>
{rule}
</body>
</html>"#,
        url = html_escape(url.as_str()),
    );
    SyntheticResponse::new("text/html", Some("utf-8"), html.into_bytes())
}
