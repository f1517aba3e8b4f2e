//! Outbound notifications to the rendering layer
//!
//! The external renderer consumes these off a channel: redraw the slot that
//! just became available, stop the "loading" indicator on session end, or
//! surface a per-slot failure. The core never renders.

/// Resolution tier within one pane. Each tier runs its own Loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Frames,
    Thumbs,
}

#[derive(Debug, Clone)]
pub enum ViewerEvent {
    /// A slot finished decoding and can be drawn.
    ResourceReady { pane: usize, tier: Tier, slot: usize },
    /// A pane/tier session drained its load order.
    SessionFinished { pane: usize, tier: Tier },
    /// A slot failed to fetch or decode; not retried by the core.
    FetchFailed { pane: usize, tier: Tier, slot: usize, error: String },
}
