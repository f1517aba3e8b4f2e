//! Load-focus arbitration across panes
//!
//! **Why**: fetch/decode bandwidth is one shared pool. Any number of panes
//! may sit primed with a computed load order, but at most one drives fetch
//! continuations at a time; when it finishes or is deprioritized, the next
//! mid-session pane takes over in fixed priority order (registration order).
//!
//! **Used by**: Viewer (focus changes, session-finished handling)

use log::debug;
use std::time::Instant;

use crate::pane::Pane;

#[derive(Debug, Default)]
pub struct LoadCoordinator {
    focused: Option<usize>,
}

impl LoadCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pane currently holding the load focus.
    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    /// Hand the load focus to `id`: every other pane pauses, then `id`
    /// resumes. `None` (or an invalid id) is the global stop: everything
    /// pauses.
    ///
    /// Others pause first; resuming before the old holder is parked could
    /// briefly run two fetch chains against the shared pool.
    pub fn give_focus(&mut self, panes: &mut [Pane], id: Option<usize>, now: Instant) {
        let id = id.filter(|&i| i < panes.len());

        for (i, pane) in panes.iter_mut().enumerate() {
            if Some(i) != id {
                pane.pause();
            }
        }
        match id {
            Some(i) => {
                debug!("load focus -> pane {}", i);
                panes[i].resume(now);
            }
            None => debug!("load focus released, all panes paused"),
        }
        self.focused = id;
    }

    /// Called whenever any Loader finishes: if the focus holder is done (or
    /// nobody holds it), hand focus to the first pane still mid-session so
    /// background loading continues one pane at a time.
    pub fn release_focus_if_idle(&mut self, panes: &mut [Pane], now: Instant) {
        let holder_busy = self
            .focused
            .and_then(|f| panes.get(f))
            .is_some_and(|p| p.is_mid_session());
        if holder_busy {
            return;
        }
        let next = panes.iter().position(|p| p.is_mid_session());
        self.give_focus(panes, next, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaneConfig;
    use crate::fetch::{FetchError, FetchResource, Resource};
    use crate::loader::{LoadBounds, LoadState};
    use std::sync::Arc;

    struct NullFetcher;

    impl FetchResource for NullFetcher {
        fn fetch(&self, _global_index: usize) -> Result<Resource, FetchError> {
            Ok(Resource::new(1, 1, vec![0; 4]))
        }
    }

    fn panes(n: usize) -> Vec<Pane> {
        let config = PaneConfig::new(4, "img").with_delay_ms(0);
        (0..n)
            .map(|id| Pane::with_fetchers(id, &config, 100, Arc::new(NullFetcher), None))
            .collect()
    }

    fn start_all(panes: &mut [Pane], now: Instant) {
        for p in panes.iter_mut() {
            p.load(LoadBounds::default(), now).unwrap();
        }
    }

    #[test]
    fn test_focus_is_exclusive() {
        let now = Instant::now();
        let mut panes = panes(3);
        start_all(&mut panes, now);
        let mut coord = LoadCoordinator::new();

        coord.give_focus(&mut panes, Some(1), now);
        assert_eq!(coord.focused(), Some(1));
        assert_eq!(panes[0].frames().state(), LoadState::Paused);
        assert_eq!(panes[1].frames().state(), LoadState::Loading);
        assert_eq!(panes[2].frames().state(), LoadState::Paused);
    }

    #[test]
    fn test_no_focus_pauses_everything() {
        let now = Instant::now();
        let mut panes = panes(2);
        start_all(&mut panes, now);
        let mut coord = LoadCoordinator::new();

        coord.give_focus(&mut panes, Some(0), now);
        coord.give_focus(&mut panes, None, now);
        assert_eq!(coord.focused(), None);
        assert!(panes.iter().all(|p| p.frames().state() == LoadState::Paused));

        // Invalid id behaves the same as None.
        coord.give_focus(&mut panes, Some(9), now);
        assert_eq!(coord.focused(), None);
    }

    #[test]
    fn test_release_hands_focus_to_next_loading_pane() {
        let now = Instant::now();
        let mut panes = panes(3);
        start_all(&mut panes, now);
        let mut coord = LoadCoordinator::new();
        coord.give_focus(&mut panes, Some(0), now);

        // Drain pane 0 to completion.
        while let Some((tier, req)) = panes[0].poll_request(now) {
            panes[0].complete(tier, req.generation, req.slot, Ok(Resource::new(1, 1, vec![0; 4])), now);
        }
        assert!(!panes[0].is_mid_session());

        coord.release_focus_if_idle(&mut panes, now);
        // Priority order: pane 1 before pane 2.
        assert_eq!(coord.focused(), Some(1));
        assert_eq!(panes[1].frames().state(), LoadState::Loading);
        assert_eq!(panes[2].frames().state(), LoadState::Paused);
    }

    #[test]
    fn test_release_keeps_busy_holder() {
        let now = Instant::now();
        let mut panes = panes(2);
        start_all(&mut panes, now);
        let mut coord = LoadCoordinator::new();
        coord.give_focus(&mut panes, Some(0), now);

        coord.release_focus_if_idle(&mut panes, now);
        assert_eq!(coord.focused(), Some(0));
        assert_eq!(panes[1].frames().state(), LoadState::Paused);
    }

    #[test]
    fn test_release_with_nothing_loading_parks_all() {
        let now = Instant::now();
        let mut panes = panes(2);
        let mut coord = LoadCoordinator::new();
        coord.release_focus_if_idle(&mut panes, now);
        assert_eq!(coord.focused(), None);
    }
}
