//! Navigation events and the per-tab ordered queue feeding the coordinator.
//!
//! Events for one tab are delivered in arrival order; events of different
//! tabs are independent. A new navigation for a tab supersedes any of its
//! navigations still waiting in the queue, so a stale request can never
//! apply its settings after a newer one.

use std::collections::{BTreeMap, VecDeque};

use tracing::debug;
use url::Url;

use crate::host::TabId;
use crate::routing::RoutingPreference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryDirection {
    Back,
    Forward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// The renderer is about to follow a link, redirect or script navigation.
    NavigationRequested { url: Url },
    /// Address bar, bookmark or home button.
    LoadUrl { url: Url, opening_in_new_tab: bool },
    /// The user picked a target explicitly (link context menu).
    LoadWithTarget {
        url: Url,
        preference: RoutingPreference,
    },
    /// Back/forward; `entry` is the adjacent history entry, if any.
    HistoryStep {
        direction: HistoryDirection,
        entry: Option<Url>,
    },
    /// The page asked for a new window.
    NewWindow { url: Url },
    TabClosed,
}

impl NavigationEvent {
    /// Events that replace what the tab is about to show.
    fn is_navigation(&self) -> bool {
        matches!(
            self,
            Self::NavigationRequested { .. }
                | Self::LoadUrl { .. }
                | Self::LoadWithTarget { .. }
                | Self::HistoryStep { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEvent {
    pub tab: TabId,
    pub seq: u64,
    pub event: NavigationEvent,
}

#[derive(Debug, Default)]
pub struct TabEventQueue {
    queues: BTreeMap<TabId, VecDeque<QueuedEvent>>,
    next_seq: u64,
}

impl TabEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues `event` for `tab` and returns its sequence number.
    pub fn push(&mut self, tab: TabId, event: NavigationEvent) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;

        let queue = self.queues.entry(tab).or_default();
        if event == NavigationEvent::TabClosed {
            if !queue.is_empty() {
                debug!(tab = %tab, dropped = queue.len(), "tab closed, pending events dropped");
            }
            queue.clear();
        } else if event.is_navigation() {
            let before = queue.len();
            queue.retain(|queued| !queued.event.is_navigation());
            if queue.len() != before {
                debug!(tab = %tab, dropped = before - queue.len(), "superseded navigation dropped");
            }
        }
        queue.push_back(QueuedEvent { tab, seq, event });
        seq
    }

    /// Next event of `tab`.
    pub fn pop_tab(&mut self, tab: TabId) -> Option<QueuedEvent> {
        let queue = self.queues.get_mut(&tab)?;
        let event = queue.pop_front();
        if queue.is_empty() {
            self.queues.remove(&tab);
        }
        event
    }

    /// Oldest pending event across all tabs.
    pub fn pop_next(&mut self) -> Option<QueuedEvent> {
        let tab = self
            .queues
            .iter()
            .filter_map(|(tab, queue)| queue.front().map(|e| (e.seq, *tab)))
            .min()
            .map(|(_, tab)| tab)?;
        self.pop_tab(tab)
    }

    pub fn pending(&self, tab: TabId) -> usize {
        self.queues.get(&tab).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
