//! Scripted in-memory media backend
//!
//! Stands in for the host media stack in the simulation binary and in
//! tests. Outcomes are scripted per resource URL: a queue consumed one
//! entry per attempt, falling back to a sticky default (ready unless set
//! otherwise). Load latency is fixed plus optional random jitter.

use crate::backend::{BackendFailure, MediaBackend};
use async_trait::async_trait;
use rand::Rng;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

/// Scripted result of one load attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ready,
    Fail(u16),
}

#[derive(Debug, Default)]
struct ScriptState {
    queued: HashMap<String, VecDeque<Outcome>>,
    sticky: HashMap<String, Outcome>,
    load_attempts: HashMap<String, u32>,
    attached: HashSet<Uuid>,
    playing: HashSet<Uuid>,
    detaches: u32,
}

#[derive(Debug)]
pub struct ScriptedBackend {
    latency: Duration,
    jitter: Duration,
    state: Mutex<ScriptState>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

impl ScriptedBackend {
    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            jitter: Duration::ZERO,
            state: Mutex::new(ScriptState::default()),
        }
    }

    /// Add up to `jitter` of random extra latency per load
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Outcomes for the next attempts on `url`, in order
    pub fn script(&self, url: impl Into<String>, outcomes: impl IntoIterator<Item = Outcome>) {
        self.lock()
            .queued
            .entry(url.into())
            .or_default()
            .extend(outcomes);
    }

    /// Outcome for every attempt on `url` once its queue is empty
    pub fn set_default(&self, url: impl Into<String>, outcome: Outcome) {
        self.lock().sticky.insert(url.into(), outcome);
    }

    /// Number of load attempts issued for `url`
    pub fn load_attempts(&self, url: &str) -> u32 {
        self.lock().load_attempts.get(url).copied().unwrap_or(0)
    }

    pub fn total_load_attempts(&self) -> u32 {
        self.lock().load_attempts.values().sum()
    }

    pub fn detach_count(&self) -> u32 {
        self.lock().detaches
    }

    pub fn is_attached(&self, item_id: &Uuid) -> bool {
        self.lock().attached.contains(item_id)
    }

    pub fn attached_count(&self) -> usize {
        self.lock().attached.len()
    }

    pub fn is_playing(&self, item_id: &Uuid) -> bool {
        self.lock().playing.contains(item_id)
    }

    fn next_outcome(&self, item_id: Uuid, url: &str) -> Outcome {
        let mut state = self.lock();
        *state.load_attempts.entry(url.to_string()).or_insert(0) += 1;
        state.attached.insert(item_id);
        let queued = state.queued.get_mut(url).and_then(VecDeque::pop_front);
        queued
            .or_else(|| state.sticky.get(url).copied())
            .unwrap_or(Outcome::Ready)
    }

    fn latency(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.latency;
        }
        let extra = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
        self.latency + Duration::from_millis(extra)
    }
}

#[async_trait]
impl MediaBackend for ScriptedBackend {
    async fn load(&self, item_id: Uuid, url: &str) -> Result<(), BackendFailure> {
        let outcome = self.next_outcome(item_id, url);
        tokio::time::sleep(self.latency()).await;
        match outcome {
            Outcome::Ready => Ok(()),
            Outcome::Fail(code) => Err(BackendFailure::new(code, format!("scripted failure for {}", url))),
        }
    }

    fn detach(&self, item_id: Uuid) {
        let mut state = self.lock();
        if state.attached.remove(&item_id) {
            state.detaches += 1;
        }
        state.playing.remove(&item_id);
    }

    fn play(&self, item_id: Uuid) -> Result<(), BackendFailure> {
        let mut state = self.lock();
        if !state.attached.contains(&item_id) {
            return Err(BackendFailure::new(0, "no resource attached"));
        }
        state.playing.insert(item_id);
        Ok(())
    }

    fn pause(&self, item_id: Uuid) {
        self.lock().playing.remove(&item_id);
    }
}
