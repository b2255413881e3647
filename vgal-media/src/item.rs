//! Per-item load state machine
//!
//! Sans-IO: the loader decides transitions and hands out `LoadTicket`s; the
//! gallery performs the actual backend calls and feeds results back in.
//!
//! ```text
//! Idle ──begin_load──► Loading ──on_ready──► Loaded ◄──pause── Playing
//!   ▲                     │                    └──────play──────►┘
//!   │                     └─on_failure─► Errored(n, terminal=false) ──retry──► Loading
//!   │                                    Errored(n, terminal=true)
//!   └──────────── reset (eviction / unmount), from any state
//! ```
//!
//! Every attempt carries a generation number. `reset` bumps it, so a ready
//! or failure signal from a detached attempt no longer matches and is
//! reported as `Stale`.

use crate::catalog::CatalogItem;
use crate::error::{Error, Result};
use crate::failure::LoadFailure;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::source_url;
use std::time::Duration;
use uuid::Uuid;

/// Observable lifecycle state of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemLoadState {
    Idle,
    Loading,
    Loaded,
    Playing,
    /// Last attempt failed; `terminal` means no retry will follow
    Errored { attempt: u32, terminal: bool },
}

impl ItemLoadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemLoadState::Errored { terminal: true, .. })
    }
}

impl std::fmt::Display for ItemLoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemLoadState::Idle => write!(f, "Idle"),
            ItemLoadState::Loading => write!(f, "Loading"),
            ItemLoadState::Loaded => write!(f, "Loaded"),
            ItemLoadState::Playing => write!(f, "Playing"),
            ItemLoadState::Errored { attempt, terminal: true } => {
                write!(f, "Errored(attempt {}, terminal)", attempt)
            }
            ItemLoadState::Errored { attempt, terminal: false } => {
                write!(f, "Errored(attempt {}, retrying)", attempt)
            }
        }
    }
}

/// Everything the backend needs for one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub item_id: Uuid,
    pub generation: u64,
    /// 1-based
    pub attempt: u32,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Signal belongs to a detached attempt
    Stale,
    Loaded { play_pending: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Stale,
    /// Schedule a retry after `delay`
    Retry { failure: LoadFailure, delay: Duration },
    Terminal { failure: LoadFailure },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Loaded → Playing
    Started,
    AlreadyPlaying,
    /// Not loaded yet; playback starts when the load completes
    Pending,
}

#[derive(Debug)]
pub struct ItemLoader {
    item: CatalogItem,
    state: ItemLoadState,
    /// Attempts made in the current budget
    attempt: u32,
    generation: u64,
    /// Constructed once per item; identical for every attempt
    url: Option<String>,
    backoff_spent: Duration,
    play_pending: bool,
}

impl ItemLoader {
    pub fn new(item: CatalogItem) -> Self {
        Self {
            item,
            state: ItemLoadState::Idle,
            attempt: 0,
            generation: 0,
            url: None,
            backoff_spent: Duration::ZERO,
            play_pending: false,
        }
    }

    pub fn item(&self) -> &CatalogItem {
        &self.item
    }

    pub fn state(&self) -> ItemLoadState {
        self.state
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_idle(&self) -> bool {
        self.state == ItemLoadState::Idle
    }

    /// Loading, Loaded or Playing: a backend resource is attached
    pub fn has_resource(&self) -> bool {
        matches!(
            self.state,
            ItemLoadState::Loading | ItemLoadState::Loaded | ItemLoadState::Playing
        )
    }

    /// Resource URL for this item (built on first use)
    pub fn url(&mut self) -> &str {
        let item = &self.item;
        self.url.get_or_insert_with(|| source_url::resource_url(item))
    }

    /// Idle or retry-pending → Loading
    pub fn begin_load(&mut self) -> Result<LoadTicket> {
        match self.state {
            ItemLoadState::Idle | ItemLoadState::Errored { terminal: false, .. } => {}
            other => {
                return Err(Error::InvalidTransition {
                    item_id: self.item.id,
                    detail: format!("cannot begin a load from {}", other),
                })
            }
        }

        self.attempt += 1;
        self.generation += 1;
        self.state = ItemLoadState::Loading;
        let url = self.url().to_string();

        Ok(LoadTicket {
            item_id: self.item.id,
            generation: self.generation,
            attempt: self.attempt,
            url,
        })
    }

    /// Ready/metadata signal for attempt `generation`
    pub fn on_ready(&mut self, generation: u64) -> ReadyOutcome {
        if generation != self.generation || self.state != ItemLoadState::Loading {
            return ReadyOutcome::Stale;
        }
        self.state = ItemLoadState::Loaded;
        ReadyOutcome::Loaded {
            play_pending: std::mem::take(&mut self.play_pending),
        }
    }

    /// Failure signal for attempt `generation`
    pub fn on_failure(&mut self, generation: u64, code: u16, policy: &RetryPolicy) -> FailureOutcome {
        if generation != self.generation || self.state != ItemLoadState::Loading {
            return FailureOutcome::Stale;
        }

        let failure = LoadFailure::from_code(code, self.attempt);
        match policy.decide(&failure, self.item.is_local, self.backoff_spent) {
            RetryDecision::Retry { delay } => {
                self.backoff_spent += delay;
                self.state = ItemLoadState::Errored {
                    attempt: self.attempt,
                    terminal: false,
                };
                FailureOutcome::Retry { failure, delay }
            }
            RetryDecision::Terminal => {
                self.play_pending = false;
                self.state = ItemLoadState::Errored {
                    attempt: self.attempt,
                    terminal: true,
                };
                FailureOutcome::Terminal { failure }
            }
        }
    }

    /// Does a retry timer armed after attempt `generation` still apply?
    pub fn retry_due(&self, generation: u64) -> bool {
        generation == self.generation && matches!(self.state, ItemLoadState::Errored { terminal: false, .. })
    }

    /// Retry-pending → Idle without clearing the attempt budget
    ///
    /// Used when a retry fires but the item is no longer admitted; the next
    /// visibility-driven load continues counting attempts.
    pub fn park(&mut self) {
        if matches!(self.state, ItemLoadState::Errored { terminal: false, .. }) {
            self.state = ItemLoadState::Idle;
        }
    }

    /// Play request
    pub fn play(&mut self) -> Result<PlayOutcome> {
        match self.state {
            ItemLoadState::Loaded => {
                self.state = ItemLoadState::Playing;
                Ok(PlayOutcome::Started)
            }
            ItemLoadState::Playing => Ok(PlayOutcome::AlreadyPlaying),
            ItemLoadState::Idle | ItemLoadState::Loading | ItemLoadState::Errored { terminal: false, .. } => {
                self.play_pending = true;
                Ok(PlayOutcome::Pending)
            }
            ItemLoadState::Errored { terminal: true, .. } => Err(Error::InvalidTransition {
                item_id: self.item.id,
                detail: "cannot play an item that failed terminally".to_string(),
            }),
        }
    }

    /// Pause/stop request; returns true if the item was playing
    pub fn pause(&mut self) -> bool {
        self.play_pending = false;
        if self.state == ItemLoadState::Playing {
            self.state = ItemLoadState::Loaded;
            true
        } else {
            false
        }
    }

    /// Back to Idle with a fresh budget (eviction, unmount, manual retry)
    ///
    /// Invalidates any in-flight attempt and armed retry timer.
    pub fn reset(&mut self) {
        self.state = ItemLoadState::Idle;
        self.attempt = 0;
        self.generation += 1;
        self.backoff_spent = Duration::ZERO;
        self.play_pending = false;
    }

    /// Clear a terminal marker so the item may load again
    pub fn manual_retry(&mut self) -> Result<()> {
        if !self.state.is_terminal() {
            return Err(Error::InvalidTransition {
                item_id: self.item.id,
                detail: format!("manual retry needs a terminal failure, item is {}", self.state),
            });
        }
        self.reset();
        Ok(())
    }
}
