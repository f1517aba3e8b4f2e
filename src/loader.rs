//! Progressive load session for one pane/resolution tier
//!
//! **Why**: thousands of frames cannot be fetched up front. One Loader fills
//! a fixed capacity of slots over an ordered subset of the global frame
//! range, one fetch at a time, and survives the user yanking the session out
//! from under it (pause, refocus, reset) without ever spawning a second
//! concurrent fetch chain.
//!
//! **Used by**: Pane (frames + thumbs tiers), Viewer (pump loop)
//!
//! # Cancellation model
//!
//! There is no explicit cancel message. A session is soft-cancelled by
//! pausing (later continuations no-op against `state`) or by
//! `reset_to_capacity` bumping `generation`: any in-flight completion that
//! captured the old generation is discarded on arrival. The generation check
//! is the first statement of `complete` and the only defense against
//! duplicate chains feeding one slot array.
//!
//! # Fetch cycle
//!
//! The Loader never blocks. `poll_request` hands out at most one
//! `FetchRequest` at a time (the `in_flight` guard); the caller runs the
//! fetch elsewhere and feeds the result back through `complete`, which arms
//! the next request after the inter-fetch spacing delay. The delay keeps a
//! burst of completions from starving the control thread, and setting it
//! very high makes accidental duplicate fetch chains visible in diagnostics.

use log::{debug, info, warn};
use std::time::{Duration, Instant};

use crate::config::{ConfigError, LoadStrategy};
use crate::fetch::{FetchError, Resource};
use crate::order::LoadQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Paused,
}

/// Per-slot outcome. `Pending` forever is a legal state (the pane shows
/// "still loading") until an external reload decision.
#[derive(Debug, Default)]
pub enum SlotState {
    #[default]
    Pending,
    Loaded(Resource),
    Failed,
}

/// One fetch to run on behalf of this Loader. `generation` must be echoed
/// back through `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub slot: usize,
    pub global_index: usize,
}

/// Session bounds for `load`. `None` fields default to the full available
/// range / the computed stride.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadBounds {
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub step: Option<usize>,
}

/// What a completion did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Generation mismatch: the session this fetch belonged to is gone.
    /// Nothing was mutated.
    Stale,
    Ready { slot: usize, finished: bool },
    Failed { slot: usize, finished: bool },
}

#[derive(Debug)]
pub struct Loader {
    name: String,
    capacity: usize,
    strategy: LoadStrategy,
    delay: Duration,
    /// Length of the backing frame-name index.
    index_len: usize,

    slot_to_global: Vec<usize>,
    slots: Vec<SlotState>,
    order: LoadQueue,
    generation: u64,
    num_loaded: usize,
    state: LoadState,
    in_flight: bool,
    next_due: Option<Instant>,
}

impl Loader {
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        strategy: LoadStrategy,
        delay_ms: u64,
        index_len: usize,
    ) -> Self {
        Self {
            name: name.into(),
            capacity,
            strategy,
            delay: Duration::from_millis(delay_ms),
            index_len,
            slot_to_global: Vec::new(),
            slots: Vec::new(),
            order: LoadQueue::new(0),
            generation: 0,
            num_loaded: 0,
            state: LoadState::Idle,
            in_flight: false,
            next_due: None,
        }
    }

    /// Begin a new generation over `[start, end)` with the given stride.
    ///
    /// The stride defaults to `floor((end - start) / capacity)` and is
    /// clamped down to it; a degenerate short range clamps the stride up to
    /// 1 with global indices capped below `end`. Validation completes before
    /// any state mutation.
    pub fn load(&mut self, bounds: LoadBounds, now: Instant) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.index_len == 0 {
            return Err(ConfigError::EmptyFrameList);
        }

        self.reset_to_capacity(self.capacity);

        let start = match bounds.start {
            Some(s) if s < self.index_len => s,
            _ => 0,
        };
        let end = match bounds.end {
            Some(e) if e > start && e <= self.index_len => e,
            _ => self.index_len,
        };

        let calc_step = ((end - start) / self.capacity).max(1);
        let step = match bounds.step {
            Some(s) if s >= 1 && s <= calc_step => s,
            _ => calc_step,
        };

        let last = end - 1;
        self.slot_to_global = (0..self.capacity)
            .map(|slot| (start + slot * step).min(last))
            .collect();

        self.order = match self.strategy {
            LoadStrategy::Linear => LoadQueue::linear(self.capacity),
            LoadStrategy::Fill => LoadQueue::fill(self.capacity),
        };

        self.state = LoadState::Loading;
        self.next_due = Some(now + self.delay);
        info!(
            "initiating load of {}: {} slots over {}..{} step {} ({})",
            self.name, self.capacity, start, end, step, self.strategy
        );
        Ok(())
    }

    /// Re-prioritize a still-pending slot: front of the queue under "fill",
    /// rotation point under "linear". No-op for slots already loaded or
    /// dequeued; out-of-range slots are a configuration error.
    pub fn set_next_load(&mut self, slot: usize) -> Result<(), ConfigError> {
        if slot >= self.capacity {
            return Err(ConfigError::SlotOutOfRange { slot, capacity: self.capacity });
        }
        if !self.order.is_pending(slot) {
            return Ok(());
        }
        match self.strategy {
            LoadStrategy::Fill => self.order.promote(slot),
            LoadStrategy::Linear => self.order.rotate_to(slot),
        }
        Ok(())
    }

    /// Next fetch to issue, if the session is active, nothing is in flight,
    /// and the spacing delay has elapsed.
    pub fn poll_request(&mut self, now: Instant) -> Option<FetchRequest> {
        if self.state != LoadState::Loading || self.in_flight {
            return None;
        }
        let due = self.next_due?;
        if now < due {
            return None;
        }
        let slot = self.order.pop_front()?;
        self.in_flight = true;
        self.next_due = None;
        Some(FetchRequest {
            generation: self.generation,
            slot,
            global_index: self.slot_to_global[slot],
        })
    }

    /// Feed back a fetch result. The generation guard comes first: a stale
    /// completion mutates nothing.
    pub fn complete(
        &mut self,
        generation: u64,
        slot: usize,
        result: Result<Resource, FetchError>,
        now: Instant,
    ) -> Completion {
        if generation != self.generation {
            debug!(
                "{}: discarding stale completion for slot {} (generation {} != {})",
                self.name, slot, generation, self.generation
            );
            return Completion::Stale;
        }

        self.in_flight = false;
        let finished = self.order.is_empty();
        if finished {
            self.state = LoadState::Idle;
            self.next_due = None;
        } else {
            self.next_due = Some(now + self.delay);
        }

        match result {
            Ok(resource) => {
                self.slots[slot] = SlotState::Loaded(resource);
                self.num_loaded += 1;
                if finished {
                    info!(
                        "finished loading of {}: {}/{} slots",
                        self.name, self.num_loaded, self.capacity
                    );
                }
                Completion::Ready { slot, finished }
            }
            Err(err) => {
                // Record the failure and keep the chain moving; retry is an
                // external decision.
                warn!("{}: slot {} failed to load: {}", self.name, slot, err);
                self.slots[slot] = SlotState::Failed;
                Completion::Failed { slot, finished }
            }
        }
    }

    /// Suspend fetching without discarding the queue or completed slots.
    pub fn pause(&mut self) {
        if self.state == LoadState::Loading {
            self.state = LoadState::Paused;
            debug!("paused loading of {}", self.name);
        }
    }

    /// Clear a pause. Only a Loader that was actively mid-session gets a
    /// fetch continuation re-armed, and only when none is already in flight;
    /// anything else would risk a second concurrent chain.
    pub fn resume(&mut self, now: Instant) {
        if self.state != LoadState::Paused {
            return;
        }
        self.state = LoadState::Loading;
        debug!("resuming loading of {}", self.name);
        if !self.in_flight && self.next_due.is_none() && !self.order.is_empty() {
            self.next_due = Some(now);
        }
    }

    /// Reinitialize every array for `capacity` slots and bump the
    /// generation, voiding any in-flight completion.
    pub fn reset_to_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.slot_to_global = Vec::new();
        self.slots = (0..capacity).map(|_| SlotState::default()).collect();
        self.order = LoadQueue::new(capacity);
        self.generation += 1;
        self.num_loaded = 0;
        self.state = LoadState::Idle;
        self.in_flight = false;
        self.next_due = None;
    }

    /// Point the Loader at a different backing index (dataset change).
    pub fn set_index_len(&mut self, index_len: usize) {
        self.index_len = index_len;
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Still has work this session, whether running or paused.
    pub fn is_mid_session(&self) -> bool {
        matches!(self.state, LoadState::Loading | LoadState::Paused)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn num_loaded(&self) -> usize {
        self.num_loaded
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pending(&self) -> usize {
        self.order.len()
    }

    pub fn slot_state(&self, slot: usize) -> Option<&SlotState> {
        self.slots.get(slot)
    }

    pub fn resource(&self, slot: usize) -> Option<&Resource> {
        match self.slots.get(slot) {
            Some(SlotState::Loaded(res)) => Some(res),
            _ => None,
        }
    }

    pub fn global_index_of(&self, slot: usize) -> Option<usize> {
        self.slot_to_global.get(slot).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn res() -> Resource {
        Resource::new(2, 2, vec![0u8; 16])
    }

    fn loader(capacity: usize, strategy: LoadStrategy, index_len: usize) -> Loader {
        Loader::new("test", capacity, strategy, 0, index_len)
    }

    /// Drive a full session synchronously, returning the dequeue order.
    fn drain_session(ld: &mut Loader, now: Instant) -> Vec<usize> {
        let mut order = Vec::new();
        while let Some(req) = ld.poll_request(now) {
            order.push(req.slot);
            ld.complete(req.generation, req.slot, Ok(res()), now);
        }
        order
    }

    #[test]
    fn test_load_maps_slots_to_globals() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let globals: Vec<_> = (0..5).map(|s| ld.global_index_of(s).unwrap()).collect();
        assert_eq!(globals, vec![0, 20, 40, 60, 80]);
    }

    #[test]
    fn test_load_clamps_step_and_bounds() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        // Oversized step falls back to the computed stride.
        ld.load(LoadBounds { start: Some(10), end: Some(60), step: Some(999) }, now).unwrap();
        assert_eq!(ld.global_index_of(0), Some(10));
        assert_eq!(ld.global_index_of(4), Some(50));
        // Out-of-range bounds fall back to the full range.
        ld.load(LoadBounds { start: Some(500), end: Some(500), step: None }, now).unwrap();
        assert_eq!(ld.global_index_of(0), Some(0));
        assert_eq!(ld.global_index_of(4), Some(80));
    }

    #[test]
    fn test_load_short_range_caps_at_end() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds { start: Some(0), end: Some(3), step: None }, now).unwrap();
        let globals: Vec<_> = (0..5).map(|s| ld.global_index_of(s).unwrap()).collect();
        assert_eq!(globals, vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn test_load_preconditions_mutate_nothing() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Fill, 0);
        let gen_before = ld.generation();
        assert!(matches!(ld.load(LoadBounds::default(), now), Err(ConfigError::EmptyFrameList)));
        assert_eq!(ld.generation(), gen_before);
        assert_eq!(ld.state(), LoadState::Idle);

        let mut ld = loader(0, LoadStrategy::Fill, 100);
        assert!(matches!(ld.load(LoadBounds::default(), now), Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn test_fill_session_dequeue_order() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Fill, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        assert_eq!(drain_session(&mut ld, now), vec![2, 0, 4, 1, 3]);
        assert_eq!(ld.state(), LoadState::Idle);
        assert_eq!(ld.num_loaded(), 5);
    }

    #[test]
    fn test_single_chain_guard() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let req = ld.poll_request(now).unwrap();
        // One fetch in flight: nothing else is handed out.
        assert!(ld.poll_request(now).is_none());
        ld.complete(req.generation, req.slot, Ok(res()), now);
        assert!(ld.poll_request(now).is_some());
    }

    #[test]
    fn test_spacing_delay_gates_next_fetch() {
        let now = Instant::now();
        let mut ld = Loader::new("test", 3, LoadStrategy::Linear, 50, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        // First fetch is also spaced from load().
        assert!(ld.poll_request(now).is_none());
        let later = now + Duration::from_millis(51);
        let req = ld.poll_request(later).unwrap();
        ld.complete(req.generation, req.slot, Ok(res()), later);
        assert!(ld.poll_request(later).is_none());
        assert!(ld.poll_request(later + Duration::from_millis(51)).is_some());
    }

    #[test]
    fn test_generation_cancellation() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Fill, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let req = ld.poll_request(now).unwrap();
        let stale_gen = req.generation;

        // Reset mid-flight: new generation, old completion must be void.
        ld.reset_to_capacity(5);
        assert_eq!(ld.complete(stale_gen, req.slot, Ok(res()), now), Completion::Stale);
        assert_eq!(ld.num_loaded(), 0);
        assert!(matches!(ld.slot_state(req.slot), Some(SlotState::Pending)));
        assert_eq!(ld.pending(), 0); // fresh session, no order computed yet
    }

    #[test]
    fn test_pause_idempotence() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let req = ld.poll_request(now).unwrap();
        ld.complete(req.generation, req.slot, Ok(res()), now);

        ld.pause();
        ld.pause();
        assert!(ld.poll_request(now).is_none());
        ld.resume(now);
        // Exactly one continuation: one request, then the in-flight guard.
        assert!(ld.poll_request(now).is_some());
        assert!(ld.poll_request(now).is_none());
    }

    #[test]
    fn test_resume_without_pause_is_noop() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let _req = ld.poll_request(now).unwrap();
        ld.resume(now);
        // Still only the original fetch in flight.
        assert!(ld.poll_request(now).is_none());
    }

    #[test]
    fn test_completion_lands_while_paused() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        let req = ld.poll_request(now).unwrap();
        ld.pause();
        let c = ld.complete(req.generation, req.slot, Ok(res()), now);
        assert_eq!(c, Completion::Ready { slot: 0, finished: false });
        assert_eq!(ld.num_loaded(), 1);
        // Paused: no new fetch until resumed.
        assert!(ld.poll_request(now).is_none());
        ld.resume(now);
        assert!(ld.poll_request(now).is_some());
    }

    #[test]
    fn test_failed_fetch_keeps_chain_moving() {
        let now = Instant::now();
        let mut ld = loader(3, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();

        let req = ld.poll_request(now).unwrap();
        let c = ld.complete(
            req.generation,
            req.slot,
            Err(FetchError::Io("gone".into())),
            now,
        );
        assert_eq!(c, Completion::Failed { slot: 0, finished: false });
        assert_eq!(ld.num_loaded(), 0);
        assert!(matches!(ld.slot_state(0), Some(SlotState::Failed)));

        // Remaining slots still load; session ends with the failure recorded.
        let rest = drain_session(&mut ld, now);
        assert_eq!(rest, vec![1, 2]);
        assert_eq!(ld.state(), LoadState::Idle);
        assert_eq!(ld.num_loaded(), 2);
    }

    #[test]
    fn test_set_next_load_fill_promotes() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Fill, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        ld.set_next_load(3).unwrap();
        assert_eq!(ld.poll_request(now).unwrap().slot, 3);
    }

    #[test]
    fn test_set_next_load_linear_rotates() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Linear, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        ld.set_next_load(3).unwrap();
        assert_eq!(drain_session(&mut ld, now), vec![3, 4, 0, 1, 2]);
    }

    #[test]
    fn test_set_next_load_validation() {
        let now = Instant::now();
        let mut ld = loader(5, LoadStrategy::Fill, 100);
        ld.load(LoadBounds::default(), now).unwrap();
        assert!(matches!(
            ld.set_next_load(5),
            Err(ConfigError::SlotOutOfRange { slot: 5, capacity: 5 })
        ));
        // Already-dequeued slot: silent no-op.
        let req = ld.poll_request(now).unwrap();
        ld.complete(req.generation, req.slot, Ok(res()), now);
        ld.set_next_load(req.slot).unwrap();
        assert_ne!(ld.poll_request(now).unwrap().slot, req.slot);
    }

    #[test]
    fn test_permutation_over_full_session() {
        let now = Instant::now();
        for strategy in [LoadStrategy::Linear, LoadStrategy::Fill] {
            for n in [1, 2, 3, 7, 16, 33] {
                let mut ld = loader(n, strategy, 1000);
                ld.load(LoadBounds::default(), now).unwrap();
                let mut order = drain_session(&mut ld, now);
                assert_eq!(order.len(), n);
                order.sort_unstable();
                assert!(order.iter().copied().eq(0..n));
            }
        }
    }
}
