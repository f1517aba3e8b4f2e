//! Resource fetch-and-decode capability
//!
//! **Why**: a Loader schedules *which* frame to fetch next; it never touches
//! the filesystem itself. The `FetchResource` capability (global index →
//! decoded resource) is injected per pane/tier, so an image pane and its
//! thumbnail strip differ only in the fetcher they carry, and tests can
//! substitute a synthetic one.
//!
//! **Used by**: Viewer (dispatches fetches onto the worker lane), Pane

use log::debug;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::dataset::Dataset;

/// A decoded frame, ready for an external renderer: RGBA8 pixels.
#[derive(Debug, Clone)]
pub struct Resource {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Resource {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self { width, height, rgba }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    /// Memory footprint in bytes.
    pub fn mem(&self) -> usize {
        self.rgba.len()
    }
}

/// Per-slot fetch failures. Recoverable at the system level, never retried
/// automatically by the core.
#[derive(Debug)]
pub enum FetchError {
    Io(String),
    Decode(String),
    OutOfRange(usize),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Io(e) => write!(f, "IO error: {}", e),
            FetchError::Decode(e) => write!(f, "Decode error: {}", e),
            FetchError::OutOfRange(i) => write!(f, "Global index {} out of range", i),
        }
    }
}

impl std::error::Error for FetchError {}

/// Capability handed to a Loader's fetch cycle: resolve a global frame index
/// to a decoded resource. Blocking; runs on the worker lane.
pub trait FetchResource: Send + Sync {
    fn fetch(&self, global_index: usize) -> Result<Resource, FetchError>;
}

/// Filesystem fetcher: `base_path + names[i]`, decoded via the `image` crate.
pub struct FileFetcher {
    base: PathBuf,
    dataset: Arc<Dataset>,
}

impl FileFetcher {
    pub fn new(base: PathBuf, dataset: Arc<Dataset>) -> Self {
        Self { base, dataset }
    }
}

impl FetchResource for FileFetcher {
    fn fetch(&self, global_index: usize) -> Result<Resource, FetchError> {
        let name = self
            .dataset
            .name(global_index)
            .ok_or(FetchError::OutOfRange(global_index))?;
        let path = self.base.join(name);
        debug!("fetching {}", path.display());

        let bytes = std::fs::read(&path).map_err(|e| FetchError::Io(e.to_string()))?;
        let img = image::load_from_memory(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

        let rgba = img.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        Ok(Resource::new(width, height, rgba.into_raw()))
    }
}
