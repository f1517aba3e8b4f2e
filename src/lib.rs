//! LAPSA - progressive timelapse viewer core library
//!
//! Re-exports all modules for use by binary targets.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod dataset;
pub mod events;
pub mod fetch;
pub mod loader;
pub mod order;
pub mod pane;
pub mod scrollbar;
pub mod viewer;
pub mod workers;

// Re-export commonly used types
pub use config::{ConfigError, LoadStrategy, PaneConfig};
pub use coordinator::LoadCoordinator;
pub use dataset::Dataset;
pub use events::{Tier, ViewerEvent};
pub use fetch::{FetchError, FetchResource, FileFetcher, Resource};
pub use loader::{Completion, FetchRequest, LoadBounds, LoadState, Loader, SlotState};
pub use order::LoadQueue;
pub use pane::Pane;
pub use scrollbar::{IndexSpace, Scrollbar};
pub use viewer::Viewer;
pub use workers::Workers;
