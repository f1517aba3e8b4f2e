//! One viewer pane: loaders for each resolution tier plus the scrollbar
//!
//! A pane couples its frames Loader, an optional thumbnail-tier Loader and
//! its Scrollbar behind a single shared capacity; `reset_to_capacity`
//! rebuilds all of them together so the two sides can never drift. The
//! pane-specific part of fetching (which directory, which decode) lives in
//! the injected `FetchResource` capabilities, not in subclasses.

use log::debug;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ConfigError, PaneConfig};
use crate::dataset::Dataset;
use crate::events::Tier;
use crate::fetch::{FetchError, FetchResource, FileFetcher, Resource};
use crate::loader::{Completion, FetchRequest, LoadBounds, Loader};
use crate::scrollbar::Scrollbar;

pub struct Pane {
    id: usize,
    frames: Loader,
    thumbs: Option<Loader>,
    scrollbar: Scrollbar,
    frames_fetcher: Arc<dyn FetchResource>,
    thumbs_fetcher: Option<Arc<dyn FetchResource>>,
}

impl Pane {
    /// Build a pane over a dataset from validated configuration. No state is
    /// created if validation fails.
    pub fn new(id: usize, config: &PaneConfig, dataset: &Arc<Dataset>) -> Result<Self, ConfigError> {
        config.validate()?;
        if dataset.is_empty() {
            return Err(ConfigError::EmptyFrameList);
        }

        let frames_fetcher: Arc<dyn FetchResource> = Arc::new(FileFetcher::new(
            dataset.tier_dir(&config.base_path),
            Arc::clone(dataset),
        ));
        let thumbs_fetcher: Option<Arc<dyn FetchResource>> = config.thumbs_path.as_ref().map(|p| {
            Arc::new(FileFetcher::new(dataset.tier_dir(p), Arc::clone(dataset)))
                as Arc<dyn FetchResource>
        });

        Ok(Self::with_fetchers(id, config, dataset.len(), frames_fetcher, thumbs_fetcher))
    }

    /// Assemble from explicit fetch capabilities (tests, custom transports).
    pub fn with_fetchers(
        id: usize,
        config: &PaneConfig,
        index_len: usize,
        frames_fetcher: Arc<dyn FetchResource>,
        thumbs_fetcher: Option<Arc<dyn FetchResource>>,
    ) -> Self {
        let frames = Loader::new(
            format!("pane{}/frames", id),
            config.capacity,
            config.strategy,
            config.inter_fetch_delay_ms,
            index_len,
        );
        let thumbs = thumbs_fetcher.as_ref().map(|_| {
            Loader::new(
                format!("pane{}/thumbs", id),
                config.capacity,
                config.strategy,
                config.inter_fetch_delay_ms,
                index_len,
            )
        });
        Self {
            id,
            frames,
            thumbs,
            scrollbar: Scrollbar::new(0.0, 1.0, config.capacity),
            frames_fetcher,
            thumbs_fetcher,
        }
    }

    /// Start a new session on every tier and wipe the scrollbar for it.
    pub fn load(&mut self, bounds: LoadBounds, now: Instant) -> Result<(), ConfigError> {
        self.frames.load(bounds, now)?;
        if let Some(thumbs) = &mut self.thumbs {
            thumbs.load(bounds, now)?;
        }
        self.scrollbar.reset_to_capacity(self.frames.capacity());
        Ok(())
    }

    /// Atomic resize: loaders and scrollbar rebuild together.
    pub fn reset_to_capacity(&mut self, capacity: usize) {
        debug!("pane {} resizing to capacity {}", self.id, capacity);
        self.frames.reset_to_capacity(capacity);
        if let Some(thumbs) = &mut self.thumbs {
            thumbs.reset_to_capacity(capacity);
        }
        self.scrollbar.reset_to_capacity(capacity);
    }

    pub fn pause(&mut self) {
        self.frames.pause();
        if let Some(thumbs) = &mut self.thumbs {
            thumbs.pause();
        }
    }

    pub fn resume(&mut self, now: Instant) {
        self.frames.resume(now);
        if let Some(thumbs) = &mut self.thumbs {
            thumbs.resume(now);
        }
    }

    pub fn is_mid_session(&self) -> bool {
        self.frames.is_mid_session()
            || self.thumbs.as_ref().is_some_and(|t| t.is_mid_session())
    }

    /// Next fetch to issue across this pane's tiers, frames first.
    pub fn poll_request(&mut self, now: Instant) -> Option<(Tier, FetchRequest)> {
        if let Some(req) = self.frames.poll_request(now) {
            return Some((Tier::Frames, req));
        }
        if let Some(thumbs) = &mut self.thumbs
            && let Some(req) = thumbs.poll_request(now)
        {
            return Some((Tier::Thumbs, req));
        }
        None
    }

    /// Route a completion to its tier. A frames slot that became ready also
    /// claims its scrollbar segment, synchronously.
    pub fn complete(
        &mut self,
        tier: Tier,
        generation: u64,
        slot: usize,
        result: Result<Resource, FetchError>,
        now: Instant,
    ) -> Completion {
        let loader = match tier {
            Tier::Frames => &mut self.frames,
            Tier::Thumbs => match &mut self.thumbs {
                Some(t) => t,
                None => return Completion::Stale,
            },
        };
        let completion = loader.complete(generation, slot, result, now);
        if tier == Tier::Frames
            && let Completion::Ready { slot, .. } = completion
        {
            self.scrollbar.add_segment(slot);
        }
        completion
    }

    /// Hover hint: prioritize the slot under the pointer in the frames tier.
    pub fn set_next_load_from_pointer(&mut self, x: f32) -> Result<(), ConfigError> {
        let slot = self.scrollbar.index_from_pointer(x);
        self.frames.set_next_load(slot)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn scrollbar(&self) -> &Scrollbar {
        &self.scrollbar
    }

    pub fn scrollbar_mut(&mut self) -> &mut Scrollbar {
        &mut self.scrollbar
    }

    pub fn frames(&self) -> &Loader {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut Loader {
        &mut self.frames
    }

    pub fn thumbs(&self) -> Option<&Loader> {
        self.thumbs.as_ref()
    }

    pub fn fetcher(&self, tier: Tier) -> Option<Arc<dyn FetchResource>> {
        match tier {
            Tier::Frames => Some(Arc::clone(&self.frames_fetcher)),
            Tier::Thumbs => self.thumbs_fetcher.as_ref().map(Arc::clone),
        }
    }

    /// Slot under the scrollbar position, if any segment has loaded.
    pub fn current_slot(&self) -> Option<usize> {
        self.scrollbar.index()
    }

    /// Global frame index of the displayed slot.
    pub fn current_global_index(&self) -> Option<usize> {
        self.frames.global_index_of(self.current_slot()?)
    }

    /// Decoded resource for the displayed slot, once loaded.
    pub fn current_resource(&self) -> Option<&Resource> {
        self.frames.resource(self.current_slot()?)
    }
}
