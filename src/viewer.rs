//! Viewer engine: the single logical thread of control
//!
//! **Why**: all application logic runs in `pump` — drain completions, route
//! them into Loaders, emit renderer notifications, hand out the next
//! fetches. Only the opaque fetch-and-decode runs elsewhere (the worker
//! lane), so every suspension point is exactly one of: a fetch in flight, or
//! the inter-fetch spacing delay. No locks around Loader or Scrollbar state.
//!
//! **Used by**: the CLI demo driver; any embedding renderer
//!
//! # Wiring
//!
//! ```text
//! input ──► Viewer ──► Scrollbar (index update)
//!   focus/finish ──► LoadCoordinator ──► Loader pause/resume
//!   Loader ──► FetchRequest ──► Workers ──► completion channel ──► pump
//!   pump ──► ViewerEvent channel ──► external renderer
//! ```

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::warn;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConfigError, PaneConfig};
use crate::coordinator::LoadCoordinator;
use crate::dataset::Dataset;
use crate::events::{Tier, ViewerEvent};
use crate::fetch::{FetchError, FetchResource, Resource};
use crate::loader::{Completion, LoadBounds};
use crate::pane::Pane;
use crate::workers::Workers;

/// Result of one fetch, travelling back from the worker lane.
struct CompletionMsg {
    pane: usize,
    tier: Tier,
    generation: u64,
    slot: usize,
    result: Result<Resource, FetchError>,
}

pub struct Viewer {
    dataset: Arc<Dataset>,
    panes: Vec<Pane>,
    coordinator: LoadCoordinator,
    workers: Workers,
    completion_tx: Sender<CompletionMsg>,
    completion_rx: Receiver<CompletionMsg>,
    event_tx: Sender<ViewerEvent>,
    event_rx: Receiver<ViewerEvent>,
    /// True while the user holds a scrub; suppresses background resumption.
    interacting: bool,
}

impl Viewer {
    pub fn new(dataset: Dataset) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        Self {
            dataset: Arc::new(dataset),
            panes: Vec::new(),
            coordinator: LoadCoordinator::new(),
            // One lane: bandwidth is a single shared pool.
            workers: Workers::new(1),
            completion_tx,
            completion_rx,
            event_tx,
            event_rx,
            interacting: false,
        }
    }

    /// Register a pane. Registration order is the coordinator's fixed
    /// priority order.
    pub fn add_pane(&mut self, config: &PaneConfig) -> Result<usize, ConfigError> {
        let id = self.panes.len();
        let pane = Pane::new(id, config, &self.dataset)?;
        self.panes.push(pane);
        Ok(id)
    }

    /// Register a pane with explicit fetch capabilities (custom transports,
    /// tests).
    pub fn add_pane_with_fetchers(
        &mut self,
        config: &PaneConfig,
        frames_fetcher: Arc<dyn FetchResource>,
        thumbs_fetcher: Option<Arc<dyn FetchResource>>,
    ) -> Result<usize, ConfigError> {
        config.validate()?;
        let id = self.panes.len();
        self.panes.push(Pane::with_fetchers(
            id,
            config,
            self.dataset.len(),
            frames_fetcher,
            thumbs_fetcher,
        ));
        Ok(id)
    }

    /// Begin a new session on a pane and hand it the load focus.
    pub fn start_load(
        &mut self,
        pane: usize,
        bounds: LoadBounds,
        now: Instant,
    ) -> Result<(), ConfigError> {
        let p = self.panes.get_mut(pane).ok_or(ConfigError::UnknownPane(pane))?;
        p.load(bounds, now)?;
        self.coordinator.give_focus(&mut self.panes, Some(pane), now);
        Ok(())
    }

    /// Explicit focus change (tab switch, hover focus).
    pub fn focus(&mut self, pane: Option<usize>, now: Instant) {
        self.coordinator.give_focus(&mut self.panes, pane, now);
    }

    /// Pointer went down on a pane's scrollbar.
    pub fn scrub_begin(&mut self, pane: usize, now: Instant) {
        self.interacting = true;
        self.coordinator.give_focus(&mut self.panes, Some(pane), now);
    }

    /// Pointer dragged to x (pane-local). Snaps the pane's index to the
    /// nearest loaded slot.
    pub fn scrub_to(&mut self, pane: usize, x: f32) -> Option<usize> {
        self.panes.get_mut(pane)?.scrollbar_mut().update_index_from_pointer(x)
    }

    /// Pointer released: background loading may continue.
    pub fn scrub_end(&mut self, now: Instant) {
        self.interacting = false;
        self.coordinator.release_focus_if_idle(&mut self.panes, now);
    }

    /// Hover hint: fetch the slot under the pointer next.
    pub fn hint_next_load(&mut self, pane: usize, x: f32) -> Result<(), ConfigError> {
        match self.panes.get_mut(pane) {
            Some(p) => p.set_next_load_from_pointer(x),
            None => Ok(()),
        }
    }

    /// Keyboard step to the next distinct loaded index.
    pub fn step_forward(&mut self, pane: usize) -> Option<usize> {
        self.panes.get_mut(pane)?.scrollbar_mut().increment_index()
    }

    /// Keyboard step to the previous distinct loaded index.
    pub fn step_back(&mut self, pane: usize) -> Option<usize> {
        self.panes.get_mut(pane)?.scrollbar_mut().decrement_index()
    }

    /// Drain completions, notify, and issue the next fetches. Returns the
    /// number of completions processed.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut processed = 0;
        while let Ok(msg) = self.completion_rx.try_recv() {
            self.handle_completion(msg, now);
            processed += 1;
        }
        self.dispatch(now);
        processed
    }

    /// Like `pump`, but parks on the completion channel up to `timeout`
    /// first. For headless drivers that have nothing else to do.
    pub fn pump_blocking(&mut self, timeout: Duration) -> usize {
        self.dispatch(Instant::now());
        let first = self.completion_rx.recv_timeout(timeout).ok();
        let now = Instant::now();
        let mut processed = 0;
        if let Some(msg) = first {
            self.handle_completion(msg, now);
            processed = 1;
        }
        processed + self.pump(now)
    }

    fn handle_completion(&mut self, msg: CompletionMsg, now: Instant) {
        let Some(pane) = self.panes.get_mut(msg.pane) else {
            warn!("completion for unknown pane {}", msg.pane);
            return;
        };
        let error_text = msg.result.as_ref().err().map(|e| e.to_string());
        let completion = pane.complete(msg.tier, msg.generation, msg.slot, msg.result, now);
        let finished = match completion {
            Completion::Stale => return,
            Completion::Ready { slot, finished } => {
                let _ = self.event_tx.send(ViewerEvent::ResourceReady {
                    pane: msg.pane,
                    tier: msg.tier,
                    slot,
                });
                finished
            }
            Completion::Failed { slot, finished } => {
                let _ = self.event_tx.send(ViewerEvent::FetchFailed {
                    pane: msg.pane,
                    tier: msg.tier,
                    slot,
                    error: error_text.unwrap_or_default(),
                });
                finished
            }
        };
        if finished {
            let _ = self
                .event_tx
                .send(ViewerEvent::SessionFinished { pane: msg.pane, tier: msg.tier });
            // Mid-scrub, background panes stay parked; the release happens
            // on scrub_end instead.
            if !self.interacting {
                self.coordinator.release_focus_if_idle(&mut self.panes, now);
            }
        }
    }

    /// Hand every due fetch to the worker lane. The per-Loader in-flight
    /// guard caps this at one per pane/tier.
    fn dispatch(&mut self, now: Instant) {
        for id in 0..self.panes.len() {
            while let Some((tier, req)) = self.panes[id].poll_request(now) {
                let Some(fetcher) = self.panes[id].fetcher(tier) else {
                    break;
                };
                let tx = self.completion_tx.clone();
                self.workers.execute(move || {
                    let result = fetcher.fetch(req.global_index);
                    let _ = tx.send(CompletionMsg {
                        pane: id,
                        tier,
                        generation: req.generation,
                        slot: req.slot,
                        result,
                    });
                });
            }
        }
    }

    /// Subscribe to renderer notifications. The receiver can be handed to
    /// another thread; it is independent of `pump`.
    pub fn events(&self) -> Receiver<ViewerEvent> {
        self.event_rx.clone()
    }

    pub fn pane(&self, id: usize) -> Option<&Pane> {
        self.panes.get(id)
    }

    pub fn pane_mut(&mut self, id: usize) -> Option<&mut Pane> {
        self.panes.get_mut(id)
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn focused(&self) -> Option<usize> {
        self.coordinator.focused()
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    /// Timestamp of the frame a pane currently displays.
    pub fn current_timestamp(&self, pane: usize) -> Option<&str> {
        let global = self.panes.get(pane)?.current_global_index()?;
        self.dataset.timestamp(global)
    }

    /// Any pane still mid-session?
    pub fn is_loading(&self) -> bool {
        self.panes.iter().any(|p| p.is_mid_session())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoadStrategy;
    use std::collections::HashSet;
    use std::path::PathBuf;

    struct MockFetcher {
        fail: HashSet<usize>,
    }

    impl MockFetcher {
        fn ok() -> Arc<dyn FetchResource> {
            Arc::new(Self { fail: HashSet::new() })
        }

        fn failing(indices: &[usize]) -> Arc<dyn FetchResource> {
            Arc::new(Self { fail: indices.iter().copied().collect() })
        }
    }

    impl FetchResource for MockFetcher {
        fn fetch(&self, global_index: usize) -> Result<Resource, FetchError> {
            if self.fail.contains(&global_index) {
                Err(FetchError::Io("mock failure".into()))
            } else {
                Ok(Resource::new(1, 1, vec![0, 0, 0, 255]))
            }
        }
    }

    fn viewer(frames: usize) -> Viewer {
        let names: Vec<String> = (0..frames).map(|i| format!("f{:04}.jpg", i)).collect();
        let stamps: Vec<String> = (0..frames).map(|i| format!("t{}", i)).collect();
        Viewer::new(Dataset::from_lists(PathBuf::from("."), names, stamps).unwrap())
    }

    fn run_until_idle(v: &mut Viewer) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while v.is_loading() {
            v.pump_blocking(Duration::from_millis(20));
            assert!(Instant::now() < deadline, "viewer failed to go idle");
        }
        v.pump(Instant::now());
    }

    #[test]
    fn test_end_to_end_fill_session() {
        let mut v = viewer(100);
        let cfg = PaneConfig::new(5, "img").with_delay_ms(0);
        let pane = v.add_pane_with_fetchers(&cfg, MockFetcher::ok(), None).unwrap();
        v.start_load(pane, LoadBounds::default(), Instant::now()).unwrap();
        run_until_idle(&mut v);

        let events = v.events();
        let mut ready_slots = Vec::new();
        let mut finished = 0;
        while let Ok(ev) = events.try_recv() {
            match ev {
                ViewerEvent::ResourceReady { slot, .. } => ready_slots.push(slot),
                ViewerEvent::SessionFinished { .. } => finished += 1,
                ViewerEvent::FetchFailed { .. } => panic!("unexpected failure"),
            }
        }
        // Fill order, one completion per slot, one finish.
        assert_eq!(ready_slots, vec![2, 0, 4, 1, 3]);
        assert_eq!(finished, 1);

        let p = v.pane(pane).unwrap();
        assert_eq!(p.frames().num_loaded(), 5);
        // First loaded segment became the index; partition settled evenly.
        assert_eq!(p.current_slot(), Some(2));
        for b in 0..5 {
            assert_eq!(p.scrollbar().owner_of(b), Some(b));
        }
        assert_eq!(v.current_timestamp(pane), Some("t40"));
    }

    #[test]
    fn test_two_panes_share_bandwidth_in_turn() {
        let mut v = viewer(60);
        let cfg = PaneConfig::new(4, "img").with_delay_ms(0);
        let a = v.add_pane_with_fetchers(&cfg, MockFetcher::ok(), None).unwrap();
        let b = v.add_pane_with_fetchers(&cfg, MockFetcher::ok(), None).unwrap();

        let now = Instant::now();
        v.start_load(a, LoadBounds::default(), now).unwrap();
        v.start_load(b, LoadBounds::default(), now).unwrap();
        // Last start stole the focus.
        assert_eq!(v.focused(), Some(b));
        run_until_idle(&mut v);

        assert_eq!(v.pane(a).unwrap().frames().num_loaded(), 4);
        assert_eq!(v.pane(b).unwrap().frames().num_loaded(), 4);

        // Pane b (focused) finished before pane a was allowed to.
        let order: Vec<usize> = v
            .events()
            .try_iter()
            .filter_map(|ev| match ev {
                ViewerEvent::SessionFinished { pane, .. } => Some(pane),
                _ => None,
            })
            .collect();
        assert_eq!(order, vec![b, a]);
    }

    #[test]
    fn test_fetch_failure_reported_not_fatal() {
        let mut v = viewer(3);
        let cfg = PaneConfig::new(3, "img")
            .with_strategy(LoadStrategy::Linear)
            .with_delay_ms(0);
        // capacity == range, step 1: slot i fetches global i. Fail global 1.
        let pane = v
            .add_pane_with_fetchers(&cfg, MockFetcher::failing(&[1]), None)
            .unwrap();
        v.start_load(pane, LoadBounds::default(), Instant::now()).unwrap();
        run_until_idle(&mut v);

        let mut failed = Vec::new();
        let mut ready = Vec::new();
        for ev in v.events().try_iter() {
            match ev {
                ViewerEvent::FetchFailed { slot, .. } => failed.push(slot),
                ViewerEvent::ResourceReady { slot, .. } => ready.push(slot),
                ViewerEvent::SessionFinished { .. } => {}
            }
        }
        assert_eq!(failed, vec![1]);
        assert_eq!(ready, vec![0, 2]);

        let p = v.pane(pane).unwrap();
        assert_eq!(p.frames().num_loaded(), 2);
        // Navigation still works around the hole.
        assert!(p.scrollbar().has_segment(0));
        assert!(!p.scrollbar().has_segment(1));
    }

    #[test]
    fn test_restart_mid_session_discards_stale_completions() {
        let mut v = viewer(100);
        let cfg = PaneConfig::new(6, "img").with_delay_ms(0);
        let pane = v.add_pane_with_fetchers(&cfg, MockFetcher::ok(), None).unwrap();

        let now = Instant::now();
        v.start_load(pane, LoadBounds::default(), now).unwrap();
        // Get a fetch in flight, then yank the session out from under it.
        v.pump(now);
        v.start_load(pane, LoadBounds::default(), now).unwrap();
        run_until_idle(&mut v);

        // The restarted session still filled completely; any stale arrival
        // was dropped without corrupting counts.
        assert_eq!(v.pane(pane).unwrap().frames().num_loaded(), 6);
        let ready = v
            .events()
            .try_iter()
            .filter(|ev| matches!(ev, ViewerEvent::ResourceReady { .. }))
            .count();
        assert_eq!(ready, 6);
    }
}
